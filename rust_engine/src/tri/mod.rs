//! TRI Morph 文件
//!
//! 解析、写出，以及文件来源抽象。缓存只通过 [`TriFileSource`] 取数据，
//! 不直接访问文件系统。

mod reader;
mod writer;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use parking_lot::RwLock;

pub use reader::{load_from_reader, parse_tri, TRI_MAGIC};
pub use writer::TriBuilder;

use crate::Result;

/// 规范化 TRI 相对路径
///
/// 小写、统一为 `\` 分隔、去掉开头分隔符，并加上 `meshes\` 前缀。
/// 已带前缀的路径不会重复添加。
pub fn normalize_tri_path(relative: &str) -> String {
    let lowered = relative.to_lowercase().replace('/', "\\");
    let trimmed = lowered.trim_start_matches('\\');
    if trimmed.starts_with("meshes\\") {
        trimmed.to_string()
    } else {
        format!("meshes\\{}", trimmed)
    }
}

/// TRI 文件来源
pub trait TriFileSource: Send + Sync {
    /// 读取规范化路径对应的文件；不存在时返回 `Ok(None)`
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// 文件版本标记，变化时缓存项失效
    fn stamp(&self, _path: &str) -> Option<u64> {
        None
    }
}

/// 文件系统来源，路径相对于游戏数据根目录
pub struct FsTriSource {
    root: PathBuf,
}

impl FsTriSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for part in path.split(['\\', '/']).filter(|p| !p.is_empty()) {
            full.push(part);
        }
        full
    }
}

impl TriFileSource for FsTriSource {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn stamp(&self, path: &str) -> Option<u64> {
        let modified = std::fs::metadata(self.resolve(path)).ok()?.modified().ok()?;
        modified
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_nanos() as u64)
    }
}

/// 内存来源，主要用于测试和宿主直接提供数据
#[derive(Default)]
pub struct MemoryTriSource {
    files: RwLock<HashMap<String, (Vec<u8>, u64)>>,
}

impl MemoryTriSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入文件，覆盖时版本标记递增
    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        let key = normalize_tri_path(path);
        let mut files = self.files.write();
        let stamp = files.get(&key).map_or(0, |(_, s)| s + 1);
        files.insert(key, (bytes, stamp));
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(&normalize_tri_path(path)).is_some()
    }
}

impl TriFileSource for MemoryTriSource {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.read().get(path).map(|(bytes, _)| bytes.clone()))
    }

    fn stamp(&self, path: &str) -> Option<u64> {
        self.files.read().get(path).map(|(_, s)| *s)
    }
}
