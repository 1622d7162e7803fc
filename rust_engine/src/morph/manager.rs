//! 全局角色 Morph 存储
//!
//! 进程内唯一的一把锁保护所有角色。每次操作只在结构读写期间持锁，
//! 遍历时先复制快照再释放锁，回调里可以放心地再次访问存储。

use std::collections::{HashMap, HashSet};

use crate::host::ActorKey;
use crate::strings::FixedStr;
use crate::sync::GuardedContainer;

use super::{is_storable, MorphValueMap, MAX_MORPH_STRING_LEN};

/// 角色 Morph 存储
#[derive(Default)]
pub struct ActorMorphStore {
    actors: GuardedContainer<HashMap<ActorKey, MorphValueMap>>,
}

impl ActorMorphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 Morph 数值（覆盖，不是累加），返回是否写入
    ///
    /// 名称或键超过 [`MAX_MORPH_STRING_LEN`] 字节时拒绝。
    pub fn set_morph(&self, actor: ActorKey, name: FixedStr, key: FixedStr, value: f32) -> bool {
        if !is_storable(name.as_str(), key.as_str()) {
            log::warn!("Rejected morph for {:?}: name or key longer than {} bytes", actor, MAX_MORPH_STRING_LEN);
            return false;
        }
        self.actors
            .write(|actors| actors.entry(actor).or_default().set(name, key, value));
        true
    }

    /// 获取 Morph 数值，不存在时为 0
    pub fn get_morph(&self, actor: ActorKey, name: FixedStr, key: FixedStr) -> f32 {
        self.actors.read(|actors| {
            actors
                .get(&actor)
                .and_then(|m| m.get(name, key))
                .unwrap_or(0.0)
        })
    }

    /// 删除单个 (名称, 键)，清空的名称和角色一并删除
    pub fn clear_morph(&self, actor: ActorKey, name: FixedStr, key: FixedStr) {
        self.actors.write(|actors| {
            if let Some(map) = actors.get_mut(&actor) {
                map.clear(name, key);
                if map.is_empty() {
                    actors.remove(&actor);
                }
            }
        });
    }

    /// 有效权重：名称下所有键的和
    pub fn get_body_morphs(&self, actor: ActorKey, name: FixedStr) -> f32 {
        self.actors
            .read(|actors| actors.get(&actor).map(|m| m.sum(name)).unwrap_or(0.0))
    }

    /// 删除名称下的所有键
    pub fn clear_body_morph_names(&self, actor: ActorKey, name: FixedStr) {
        self.actors.write(|actors| {
            if let Some(map) = actors.get_mut(&actor) {
                map.remove_name(name);
                if map.is_empty() {
                    actors.remove(&actor);
                }
            }
        });
    }

    /// 从所有名称下删除该键，返回删除的条目数
    pub fn clear_body_morph_keys(&self, actor: ActorKey, key: FixedStr) -> usize {
        self.actors.write(|actors| {
            let Some(map) = actors.get_mut(&actor) else {
                return 0;
            };
            let removed = map.remove_key(key);
            if map.is_empty() {
                actors.remove(&actor);
            }
            removed
        })
    }

    /// 删除角色的全部数据
    pub fn clear_morphs(&self, actor: ActorKey) {
        self.actors.write(|actors| {
            actors.remove(&actor);
        });
    }

    pub fn has_morphs(&self, actor: ActorKey) -> bool {
        self.actors
            .read(|actors| actors.get(&actor).is_some_and(|m| !m.is_empty()))
    }

    pub fn has_body_morph(&self, actor: ActorKey, name: FixedStr, key: FixedStr) -> bool {
        self.actors
            .read(|actors| actors.get(&actor).is_some_and(|m| m.get(name, key).is_some()))
    }

    pub fn has_body_morph_name(&self, actor: ActorKey, name: FixedStr) -> bool {
        self.actors
            .read(|actors| actors.get(&actor).is_some_and(|m| m.contains_name(name)))
    }

    pub fn has_body_morph_key(&self, actor: ActorKey, key: FixedStr) -> bool {
        self.actors
            .read(|actors| actors.get(&actor).is_some_and(|m| m.contains_key(key)))
    }

    /// 角色数据的快照
    pub fn snapshot(&self, actor: ActorKey) -> Option<MorphValueMap> {
        self.actors.read(|actors| actors.get(&actor).cloned())
    }

    /// 全部角色的快照，按角色排序
    pub fn snapshot_all(&self) -> Vec<(ActorKey, MorphValueMap)> {
        let mut all: Vec<_> = self
            .actors
            .read(|actors| actors.iter().map(|(k, v)| (*k, v.clone())).collect());
        all.sort_by_key(|(k, _)| *k);
        all
    }

    /// 替换角色的全部数据（加载存档时使用），空映射等同删除
    pub fn insert_actor(&self, actor: ActorKey, map: MorphValueMap) {
        self.actors.write(|actors| {
            if map.is_empty() {
                actors.remove(&actor);
            } else {
                actors.insert(actor, map);
            }
        });
    }

    /// 遍历角色的每个名称及其键值
    pub fn visit_morphs(&self, actor: ActorKey, mut f: impl FnMut(FixedStr, &HashMap<FixedStr, f32>)) {
        if let Some(map) = self.snapshot(actor) {
            for (name, keys) in map.iter() {
                f(name, keys);
            }
        }
    }

    /// 遍历某个名称下的键值
    pub fn visit_keys(&self, actor: ActorKey, name: FixedStr, mut f: impl FnMut(FixedStr, f32)) {
        let keys = self.actors.read(|actors| {
            actors
                .get(&actor)
                .and_then(|m| m.keys(name))
                .cloned()
        });
        for (key, value) in keys.into_iter().flatten() {
            f(key, value);
        }
    }

    /// 遍历存储中出现过的所有名称与键（去重）
    pub fn visit_strings(&self, mut f: impl FnMut(FixedStr)) {
        let strings: HashSet<FixedStr> = self.actors.read(|actors| {
            let mut set = HashSet::new();
            for map in actors.values() {
                for (name, keys) in map.iter() {
                    set.insert(name);
                    set.extend(keys.keys().copied());
                }
            }
            set
        });
        for s in strings {
            f(s);
        }
    }

    /// 遍历所有有数据的角色
    pub fn visit_actors(&self, mut f: impl FnMut(ActorKey)) {
        let actors: Vec<ActorKey> = self.actors.read(|actors| actors.keys().copied().collect());
        for actor in actors {
            f(actor);
        }
    }

    /// 角色被删除
    pub fn remove_actor(&self, actor: ActorKey) -> bool {
        self.actors.write(|actors| actors.remove(&actor).is_some())
    }

    pub fn actor_count(&self) -> usize {
        self.actors.read(|actors| actors.len())
    }

    /// 清空全部数据
    pub fn revert(&self) {
        self.actors.write(|actors| actors.clear());
    }
}
