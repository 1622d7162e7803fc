//! 旧版 Morph 条目
//!
//! 第一版存档每个角色只保存 (名称, 数值) 的有序集合，没有键的概念。

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::strings::FixedStr;

use super::MorphValueMap;

/// Morph 条目，相等与排序只看名称
#[derive(Clone, Copy, Debug)]
pub struct MorphEntry {
    pub name: FixedStr,
    pub value: f32,
}

impl PartialEq for MorphEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MorphEntry {}

impl PartialOrd for MorphEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MorphEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// 按名称去重的有序集合
#[derive(Clone, Debug, Default)]
pub struct MorphValueSet {
    entries: BTreeSet<MorphEntry>,
}

impl MorphValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入条目，已存在同名条目时覆盖
    pub fn insert(&mut self, entry: MorphEntry) {
        self.entries.replace(entry);
    }

    pub fn get(&self, name: FixedStr) -> Option<f32> {
        self.entries
            .get(&MorphEntry { name, value: 0.0 })
            .map(|e| e.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MorphEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 用有效权重构建（每个名称取所有键的和）
    pub fn from_value_map(map: &MorphValueMap) -> Self {
        let mut set = Self::new();
        for (name, _) in map.iter() {
            set.insert(MorphEntry {
                name,
                value: map.sum(name),
            });
        }
        set
    }

    /// 转换为带键的映射，所有数值放在同一个键下
    pub fn into_value_map(self, key: FixedStr) -> MorphValueMap {
        let mut map = MorphValueMap::new();
        for entry in self.entries {
            map.set(entry.name, key, entry.value);
        }
        map
    }
}
