//! 顶点偏移数据
//!
//! 一个 Morph 在一个形状上的数据就是一组 (顶点索引, 偏移)。
//! 按精度与内存的取舍分三种存储方式：
//! - [`FullVertexData`]：f32 位置偏移
//! - [`PackedVertexData`]：i16 位置偏移 + 公共缩放系数
//! - [`PackedUvData`]：f16 UV 偏移 + 公共缩放系数
//!
//! 应用时只做加法：`顶点 += 偏移 * 权重`，不记录哪些顶点已被修改，
//! 幂等性由调用方从基准快照重新计算来保证。

mod layout;
mod packed;

pub use layout::{ComponentFormat, VertexAttribute, VertexLayout};

use std::mem::size_of;

use glam::{Vec2, Vec3};
use half::f16;

use crate::model::RuntimeVertex;
use crate::Result;

/// 全精度位置偏移
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexDelta {
    pub index: u16,
    pub delta: Vec3,
}

/// 定点位置偏移，实际值 = 分量 * multiplier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedVertexDelta {
    pub index: u16,
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// 半精度 UV 偏移，实际值 = 分量 * multiplier
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackedUvDelta {
    pub index: u16,
    pub u: f16,
    pub v: f16,
}

#[derive(Clone, Debug, Default)]
pub struct FullVertexData {
    pub max_index: u32,
    pub deltas: Vec<VertexDelta>,
}

#[derive(Clone, Debug, Default)]
pub struct PackedVertexData {
    pub multiplier: f32,
    pub max_index: u32,
    pub deltas: Vec<PackedVertexDelta>,
}

#[derive(Clone, Debug, Default)]
pub struct PackedUvData {
    pub multiplier: f32,
    pub max_index: u32,
    pub deltas: Vec<PackedUvDelta>,
}

/// 偏移作用的通道
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaChannel {
    Position,
    Uv,
}

/// 三种存储方式的统一入口
#[derive(Clone, Debug)]
pub enum VertexDeltas {
    Full(FullVertexData),
    PackedPosition(PackedVertexData),
    PackedUv(PackedUvData),
}

impl FullVertexData {
    pub fn new(deltas: Vec<VertexDelta>) -> Self {
        let max_index = deltas.iter().map(|d| d.index as u32).max().unwrap_or(0);
        Self { max_index, deltas }
    }
}

impl VertexDeltas {
    pub fn channel(&self) -> DeltaChannel {
        match self {
            VertexDeltas::Full(_) | VertexDeltas::PackedPosition(_) => DeltaChannel::Position,
            VertexDeltas::PackedUv(_) => DeltaChannel::Uv,
        }
    }

    pub fn max_index(&self) -> u32 {
        match self {
            VertexDeltas::Full(d) => d.max_index,
            VertexDeltas::PackedPosition(d) => d.max_index,
            VertexDeltas::PackedUv(d) => d.max_index,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            VertexDeltas::Full(d) => d.deltas.len(),
            VertexDeltas::PackedPosition(d) => d.deltas.len(),
            VertexDeltas::PackedUv(d) => d.deltas.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 估算内存占用（字节）
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>()
            + match self {
                VertexDeltas::Full(d) => d.deltas.len() * size_of::<VertexDelta>(),
                VertexDeltas::PackedPosition(d) => d.deltas.len() * size_of::<PackedVertexDelta>(),
                VertexDeltas::PackedUv(d) => d.deltas.len() * size_of::<PackedUvDelta>(),
            }
    }

    /// 逐条解码为全精度偏移，UV 偏移放在 x/y 分量
    pub fn for_each_decoded(&self, mut f: impl FnMut(usize, Vec3)) {
        match self {
            VertexDeltas::Full(d) => {
                for delta in &d.deltas {
                    f(delta.index as usize, delta.delta);
                }
            }
            VertexDeltas::PackedPosition(d) => {
                for delta in &d.deltas {
                    f(delta.index as usize, d.decode(delta));
                }
            }
            VertexDeltas::PackedUv(d) => {
                for delta in &d.deltas {
                    f(delta.index as usize, d.decode(delta).extend(0.0));
                }
            }
        }
    }

    /// 应用到静态类型的顶点数组，越界索引直接跳过
    pub fn apply_raw(&self, vertices: &mut [RuntimeVertex], factor: f32) {
        let count = vertices.len();
        let channel = self.channel();
        self.for_each_decoded(|index, delta| {
            if index >= count {
                return;
            }
            let vertex = &mut vertices[index];
            match channel {
                DeltaChannel::Position => vertex.position += delta * factor,
                DeltaChannel::Uv => vertex.uv += Vec2::new(delta.x, delta.y) * factor,
            }
        });
    }

    /// 应用到按布局描述的原始字节缓冲区
    ///
    /// 布局里没有对应通道时什么也不做。越界索引直接跳过。
    pub fn apply(
        &self,
        buffer: &mut [u8],
        layout: &VertexLayout,
        vertex_count: usize,
        factor: f32,
    ) -> Result<()> {
        layout.validate(buffer.len(), vertex_count)?;
        let channel = self.channel();
        self.for_each_decoded(|index, delta| {
            if index >= vertex_count {
                return;
            }
            match channel {
                DeltaChannel::Position => {
                    if let Some(pos) = layout.read_position(buffer, index) {
                        layout.write_position(buffer, index, pos + delta * factor);
                    }
                }
                DeltaChannel::Uv => {
                    if let Some(uv) = layout.read_uv(buffer, index) {
                        layout.write_uv(buffer, index, uv + Vec2::new(delta.x, delta.y) * factor);
                    }
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices(n: usize) -> Vec<RuntimeVertex> {
        (0..n)
            .map(|i| RuntimeVertex {
                position: Vec3::new(i as f32, 0.0, 0.0),
                normal: Vec3::Z,
                uv: Vec2::ZERO,
            })
            .collect()
    }

    #[test]
    fn test_apply_raw_scales_by_factor() {
        let deltas = VertexDeltas::Full(FullVertexData::new(vec![VertexDelta {
            index: 1,
            delta: Vec3::new(0.0, 2.0, 0.0),
        }]));
        let mut verts = vertices(3);
        deltas.apply_raw(&mut verts, 0.5);
        assert_eq!(verts[1].position, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(verts[0].position, Vec3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_out_of_range_index_skipped() {
        let deltas = VertexDeltas::Full(FullVertexData::new(vec![
            VertexDelta { index: 9, delta: Vec3::ONE },
            VertexDelta { index: 0, delta: Vec3::ONE },
        ]));
        assert_eq!(deltas.max_index(), 9);
        let mut verts = vertices(2);
        deltas.apply_raw(&mut verts, 1.0);
        assert_eq!(verts[0].position, Vec3::ONE);

        let layout = VertexLayout::full_precision();
        let mut buf = vec![0u8; layout.required_len(2)];
        deltas.apply(&mut buf, &layout, 2, 1.0).unwrap();
        assert_eq!(layout.read_position(&buf, 0), Some(Vec3::ONE));
        assert_eq!(layout.read_position(&buf, 1), Some(Vec3::ZERO));
    }

    #[test]
    fn test_apply_uv_to_buffer() {
        let uv = VertexDeltas::PackedUv(PackedUvData::encode(&[(1, Vec2::new(0.5, -0.25))]));
        assert_eq!(uv.channel(), DeltaChannel::Uv);

        let layout = VertexLayout::full_precision();
        let mut buf = vec![0u8; layout.required_len(2)];
        uv.apply(&mut buf, &layout, 2, 2.0).unwrap();
        let out = layout.read_uv(&buf, 1).unwrap();
        assert!((out.x - 1.0).abs() < 1e-3);
        assert!((out.y + 0.5).abs() < 1e-3);
        // 位置通道不受影响
        assert_eq!(layout.read_position(&buf, 1), Some(Vec3::ZERO));
    }

    #[test]
    fn test_packed_uses_less_memory_than_full() {
        let raw: Vec<VertexDelta> = (0..100u16)
            .map(|i| VertexDelta { index: i, delta: Vec3::splat(i as f32 * 0.01) })
            .collect();
        let full = VertexDeltas::Full(FullVertexData::new(raw.clone()));
        let packed = VertexDeltas::PackedPosition(PackedVertexData::encode(&raw));
        assert!(packed.memory_usage() < full.memory_usage());
    }
}
