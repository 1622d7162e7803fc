//! BodyMorph 配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use std::path::PathBuf;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// BodyMorph 配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct MorphConfig {
    // ========== 缓存 ==========
    /// TRI 缓存内存上限（字节），默认 256 MiB
    pub cache_memory_limit: usize,

    // ========== 数据目录 ==========
    /// BodyGen 数据目录，每个子目录可包含 templates.ini 与 morphs.ini
    pub data_directory: PathBuf,

    // ========== 应用 ==========
    /// 是否并行处理同一网格下的多个形状，默认 true
    pub parallel_apply: bool,

    // ========== 模板 ==========
    /// 模板随机数种子，None 表示使用系统熵
    pub rng_seed: Option<u64>,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            // ====== 缓存 ======
            // 超过上限时按最近访问时间淘汰最旧的 TRI 文件
            // 设得太小会导致换装时反复读盘
            cache_memory_limit: 256 * 1024 * 1024,

            // ====== 数据目录 ======
            data_directory: PathBuf::from("meshes/actors/character/BodyGenData"),

            // ====== 应用 ======
            // 每个形状有独立的锁，并行不会互相阻塞
            parallel_apply: true,

            // ====== 模板 ======
            rng_seed: None,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static MORPH_CONFIG: Lazy<RwLock<MorphConfig>> = Lazy::new(|| RwLock::new(MorphConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> MorphConfig {
    MORPH_CONFIG.read().clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: MorphConfig) {
    *MORPH_CONFIG.write() = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *MORPH_CONFIG.write() = MorphConfig::default();
}
