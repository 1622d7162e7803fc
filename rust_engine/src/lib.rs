//! BodyMorph Engine - 角色身体 Morph 运行时
//!
//! 提供：
//! - 按角色、名称、键存储的 Morph 数值与多版本存档
//! - TRI 顶点偏移文件的解析与按内存上限淘汰的缓存
//! - 基于基准快照的网格偏移应用（CPU 顶点数组或按布局描述的缓冲区）
//! - BodyGen 模板解析与随机求值
//! - JNI 接口

pub mod cache;
pub mod config;
pub mod delta;
pub mod host;
pub mod interface;
pub mod jni_bridge;
pub mod model;
pub mod morph;
pub mod serialization;
pub mod strings;
pub mod sync;
pub mod task;
pub mod template;
pub mod tri;

pub use cache::{MorphCache, TriShapeMap};
pub use config::MorphConfig;
pub use host::{ActorKey, Gender, MorphHost, NpcInfo};
pub use interface::{BodyMorphInterface, PLUGIN_VERSION, TEMPLATE_MORPH_KEY};
pub use model::{MeshNode, RuntimeVertex, TriShape};
pub use morph::{ActorMorphStore, MorphValueMap};
pub use strings::FixedStr;
pub use tri::{FsTriSource, MemoryTriSource, TriFileSource};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MorphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TRI parse error: {0}")]
    TriParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown string table index: {0}")]
    StringTable(u32),

    #[error("Vertex layout mismatch: {0}")]
    LayoutMismatch(String),

    #[error("Buffer lock failed: {0}")]
    BufferLock(String),

    #[error("Template parse error: {0}")]
    TemplateParse(String),
}

pub type Result<T> = std::result::Result<T, MorphError>;
