//! 句柄注册表宿主
//!
//! Java 侧把角色、形状和 NPC 注册进来，注册表作为 [`MorphHost`] 供接口查询。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::host::{ActorKey, MorphHost, NpcId, NpcInfo};
use crate::model::{MeshNode, TriShape};

/// 插件内局部 ID 占低 24 位
const LOCAL_ID_MASK: u32 = 0x00FF_FFFF;

/// 已注册角色
#[derive(Clone, Default)]
pub struct ActorEntry {
    pub tri_path: String,
    pub root: Arc<MeshNode>,
    pub npc: Option<NpcInfo>,
}

/// 由 Java 侧填充的宿主
#[derive(Default)]
pub struct RegistryHost {
    actors: RwLock<HashMap<ActorKey, ActorEntry>>,
    npcs: RwLock<HashMap<NpcId, NpcInfo>>,
    weight_updates: AtomicU64,
}

impl RegistryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册角色，重复注册时更新路径并保留已有形状
    pub fn register_actor(&self, actor: ActorKey, tri_path: &str) {
        let mut actors = self.actors.write();
        let entry = actors.entry(actor).or_default();
        entry.tri_path = tri_path.to_string();
    }

    pub fn unregister_actor(&self, actor: ActorKey) -> bool {
        self.actors.write().remove(&actor).is_some()
    }

    /// 添加或替换形状，返回是否找到角色
    pub fn register_shape(&self, actor: ActorKey, shape: TriShape) -> bool {
        let mut actors = self.actors.write();
        match actors.get_mut(&actor) {
            Some(entry) => {
                entry.root = Arc::new(entry.root.with_shape(shape));
                true
            }
            None => false,
        }
    }

    /// 注册 NPC，同时作为 BodyGen 人口
    pub fn register_npc(&self, npc: NpcInfo) {
        self.npcs.write().insert(npc.id, npc);
    }

    /// 绑定角色对应的 NPC（NPC 需已注册）
    pub fn set_actor_npc(&self, actor: ActorKey, npc: NpcId) -> bool {
        let Some(info) = self.npcs.read().get(&npc).cloned() else {
            return false;
        };
        match self.actors.write().get_mut(&actor) {
            Some(entry) => {
                entry.npc = Some(info);
                true
            }
            None => false,
        }
    }

    pub fn actor_count(&self) -> usize {
        self.actors.read().len()
    }

    /// 宿主被要求重建体重模型的次数
    pub fn weight_update_count(&self) -> u64 {
        self.weight_updates.load(Ordering::Relaxed)
    }
}

impl MorphHost for RegistryHost {
    fn is_actor_valid(&self, actor: ActorKey) -> bool {
        self.actors.read().contains_key(&actor)
    }

    fn actor_tri_path(&self, actor: ActorKey) -> Option<String> {
        self.actors
            .read()
            .get(&actor)
            .map(|e| e.tri_path.clone())
            .filter(|p| !p.is_empty())
    }

    fn root_node(&self, actor: ActorKey) -> Option<Arc<MeshNode>> {
        self.actors.read().get(&actor).map(|e| e.root.clone())
    }

    fn actor_npc(&self, actor: ActorKey) -> Option<NpcInfo> {
        self.actors.read().get(&actor).and_then(|e| e.npc.clone())
    }

    fn npc_population(&self) -> Vec<NpcInfo> {
        let mut npcs: Vec<_> = self.npcs.read().values().cloned().collect();
        npcs.sort_by_key(|n| n.id);
        npcs
    }

    fn lookup_npc(&self, mod_name: &str, local_id: u32) -> Option<NpcId> {
        self.npcs
            .read()
            .values()
            .find(|n| n.mod_name.as_str().eq_ignore_ascii_case(mod_name) && (n.id & LOCAL_ID_MASK) == local_id)
            .map(|n| n.id)
    }

    fn update_model_weight(&self, actor: ActorKey) {
        self.weight_updates.fetch_add(1, Ordering::Relaxed);
        log::debug!("Model weight update requested for {:?}", actor);
    }
}
