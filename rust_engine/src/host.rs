//! 宿主接口
//!
//! 角色、NPC、种族以及实际网格都属于宿主程序，这里只定义需要的查询。

use std::fmt;
use std::sync::Arc;

use crate::model::MeshNode;
use crate::strings::FixedStr;

/// 角色标识：高 32 位为对象引用句柄，低 32 位为表单 ID
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorKey(pub u64);

impl ActorKey {
    pub const fn from_parts(handle: u32, form_id: u32) -> Self {
        ActorKey(((handle as u64) << 32) | form_id as u64)
    }

    pub const fn handle(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn form_id(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Debug for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorKey({:08X}:{:08X})", self.handle(), self.form_id())
    }
}

/// 性别，同时作为 BodyGen 数据的分区下标
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gender {
    Male = 0,
    Female = 1,
}

impl Gender {
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 解析 "Male"/"Female"（忽略大小写）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

pub type NpcId = u32;

/// NPC 人口统计信息
#[derive(Clone, Debug, PartialEq)]
pub struct NpcInfo {
    pub id: NpcId,
    /// 定义该 NPC 的插件文件名
    pub mod_name: FixedStr,
    pub gender: Gender,
    pub race: FixedStr,
}

/// 宿主程序提供的查询
pub trait MorphHost: Send + Sync {
    /// 角色是否仍然存在（延迟任务执行前会再次确认）
    fn is_actor_valid(&self, actor: ActorKey) -> bool;

    /// 把存档里的旧句柄映射为当前句柄，无法映射时返回 None
    fn resolve_actor(&self, saved: ActorKey) -> Option<ActorKey> {
        Some(saved)
    }

    /// 角色身体网格对应的 TRI 文件相对路径
    fn actor_tri_path(&self, actor: ActorKey) -> Option<String>;

    /// 角色当前的根网格节点
    fn root_node(&self, actor: ActorKey) -> Option<Arc<MeshNode>>;

    /// 角色对应的 NPC
    fn actor_npc(&self, actor: ActorKey) -> Option<NpcInfo>;

    /// 全部 NPC，用于 BodyGen 人口筛选
    fn npc_population(&self) -> Vec<NpcInfo>;

    /// 通过插件名与插件内局部 ID 查找 NPC
    fn lookup_npc(&self, _mod_name: &str, _local_id: u32) -> Option<NpcId> {
        None
    }

    /// 重建角色的体重模型
    fn update_model_weight(&self, _actor: ActorKey) {}
}
