//! TRI 文件内容：形状 -> Morph -> (位置偏移, UV 偏移)

use std::collections::HashMap;
use std::mem::size_of;

use crate::delta::VertexDeltas;
use crate::strings::FixedStr;

/// 一个 Morph 在一个形状上的位置与 UV 偏移，二者都可能缺失
#[derive(Clone, Debug, Default)]
pub struct TriShapeDeltaPair {
    pub position: Option<VertexDeltas>,
    pub uv: Option<VertexDeltas>,
}

impl TriShapeDeltaPair {
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>()
            + self.position.as_ref().map_or(0, VertexDeltas::memory_usage)
            + self.uv.as_ref().map_or(0, VertexDeltas::memory_usage)
    }
}

/// 单个形状上的全部 Morph
#[derive(Clone, Debug, Default)]
pub struct BodyMorphMap {
    morphs: HashMap<FixedStr, TriShapeDeltaPair>,
    has_uv: bool,
}

impl BodyMorphMap {
    pub fn insert_position(&mut self, morph: FixedStr, deltas: VertexDeltas) {
        self.morphs.entry(morph).or_default().position = Some(deltas);
    }

    pub fn insert_uv(&mut self, morph: FixedStr, deltas: VertexDeltas) {
        self.morphs.entry(morph).or_default().uv = Some(deltas);
        self.has_uv = true;
    }

    pub fn get(&self, morph: FixedStr) -> Option<&TriShapeDeltaPair> {
        self.morphs.get(&morph)
    }

    pub fn has_uv(&self) -> bool {
        self.has_uv
    }

    pub fn iter(&self) -> impl Iterator<Item = (FixedStr, &TriShapeDeltaPair)> {
        self.morphs.iter().map(|(name, pair)| (*name, pair))
    }

    pub fn len(&self) -> usize {
        self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty()
    }

    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.morphs.values().map(TriShapeDeltaPair::memory_usage).sum::<usize>()
    }
}

/// 一个 TRI 文件的全部形状
#[derive(Clone, Debug, Default)]
pub struct TriShapeMap {
    shapes: HashMap<FixedStr, BodyMorphMap>,
}

impl TriShapeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(&self, name: FixedStr) -> Option<&BodyMorphMap> {
        self.shapes.get(&name)
    }

    pub fn shape_mut(&mut self, name: FixedStr) -> &mut BodyMorphMap {
        self.shapes.entry(name).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FixedStr, &BodyMorphMap)> {
        self.shapes.iter().map(|(name, map)| (*name, map))
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// 估算内存占用（字节）
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.shapes.values().map(BodyMorphMap::memory_usage).sum::<usize>()
    }
}
