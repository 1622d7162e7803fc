//! Morph 数值存储
//!
//! 每个角色持有 `名称 -> (键 -> 数值)` 的两级映射。同一名称下的不同键
//! 是互相独立的来源（手动设置、模板、其他插件……），查询有效权重时求和。

mod manager;
mod morph;

pub use manager::ActorMorphStore;
pub use morph::{MorphEntry, MorphValueSet};

use std::collections::HashMap;

use crate::strings::FixedStr;

/// 旧版存档（无键）加载后使用的键
pub const LEGACY_MORPH_KEY: &str = "Legacy";

/// 名称与键的最大字节数，存档以 u16 记录长度
pub const MAX_MORPH_STRING_LEN: usize = u16::MAX as usize;

/// 名称与键都能写入存档
pub fn is_storable(name: &str, key: &str) -> bool {
    name.len() <= MAX_MORPH_STRING_LEN && key.len() <= MAX_MORPH_STRING_LEN
}

/// 单个角色的 Morph 数值
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MorphValueMap {
    morphs: HashMap<FixedStr, HashMap<FixedStr, f32>>,
}

impl MorphValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖设置 (名称, 键) 的数值
    pub fn set(&mut self, name: FixedStr, key: FixedStr, value: f32) {
        self.morphs.entry(name).or_default().insert(key, value);
    }

    pub fn get(&self, name: FixedStr, key: FixedStr) -> Option<f32> {
        self.morphs.get(&name).and_then(|keys| keys.get(&key)).copied()
    }

    /// 删除 (名称, 键)，名称下没有键时一并删除名称
    pub fn clear(&mut self, name: FixedStr, key: FixedStr) -> bool {
        let Some(keys) = self.morphs.get_mut(&name) else {
            return false;
        };
        let removed = keys.remove(&key).is_some();
        if keys.is_empty() {
            self.morphs.remove(&name);
        }
        removed
    }

    /// 有效权重：名称下所有键的和
    pub fn sum(&self, name: FixedStr) -> f32 {
        self.morphs
            .get(&name)
            .map(|keys| keys.values().sum())
            .unwrap_or(0.0)
    }

    pub fn remove_name(&mut self, name: FixedStr) -> bool {
        self.morphs.remove(&name).is_some()
    }

    /// 从所有名称下删除该键
    pub fn remove_key(&mut self, key: FixedStr) -> usize {
        let mut removed = 0;
        self.morphs.retain(|_, keys| {
            if keys.remove(&key).is_some() {
                removed += 1;
            }
            !keys.is_empty()
        });
        removed
    }

    pub fn contains_name(&self, name: FixedStr) -> bool {
        self.morphs.contains_key(&name)
    }

    pub fn contains_key(&self, key: FixedStr) -> bool {
        self.morphs.values().any(|keys| keys.contains_key(&key))
    }

    pub fn keys(&self, name: FixedStr) -> Option<&HashMap<FixedStr, f32>> {
        self.morphs.get(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FixedStr, &HashMap<FixedStr, f32>)> {
        self.morphs.iter().map(|(name, keys)| (*name, keys))
    }

    /// 名称数量
    pub fn len(&self) -> usize {
        self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty()
    }
}
