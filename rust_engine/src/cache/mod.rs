//! TRI 文件缓存
//!
//! 按规范化路径缓存解析后的 TRI 数据，总内存超过上限时按最近访问时间
//! 淘汰最旧的文件。文件读取与解析都在锁外进行。

mod apply;
mod map;

pub use apply::{apply_morphs, has_morphs};
pub use map::{BodyMorphMap, TriShapeDeltaPair, TriShapeMap};

use std::collections::HashMap;
use std::sync::Arc;

use crate::sync::GuardedContainer;
use crate::tri::{self, TriFileSource};
use crate::Result;

/// 一个已缓存的 TRI 文件
struct MorphFileEntry {
    shapes: Arc<TriShapeMap>,
    /// 最近访问的逻辑时钟
    accessed: u64,
    memory_usage: usize,
    /// 加载时来源给出的版本标记
    stamp: Option<u64>,
}

struct CacheState {
    files: HashMap<String, MorphFileEntry>,
    total_memory: usize,
    memory_limit: usize,
    clock: u64,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn insert(&mut self, path: String, entry: MorphFileEntry) {
        self.total_memory += entry.memory_usage;
        if let Some(old) = self.files.insert(path, entry) {
            self.total_memory -= old.memory_usage;
        }
    }

    fn remove(&mut self, path: &str) -> bool {
        match self.files.remove(path) {
            Some(entry) => {
                self.total_memory -= entry.memory_usage;
                true
            }
            None => false,
        }
    }

    /// 淘汰最久未访问的文件直到不超过上限，返回淘汰数量
    fn shrink(&mut self) -> usize {
        let mut evicted = 0;
        while self.total_memory > self.memory_limit {
            let oldest = self
                .files
                .iter()
                .min_by_key(|(_, entry)| entry.accessed)
                .map(|(path, _)| path.clone());
            let Some(path) = oldest else {
                break;
            };
            if let Some(entry) = self.files.remove(&path) {
                self.total_memory -= entry.memory_usage;
                evicted += 1;
                log::debug!("Evicted {} ({} bytes)", path, entry.memory_usage);
            }
        }
        evicted
    }
}

/// TRI 文件缓存
pub struct MorphCache {
    state: GuardedContainer<CacheState>,
}

impl MorphCache {
    pub fn new(memory_limit: usize) -> Self {
        Self {
            state: GuardedContainer::new(CacheState {
                files: HashMap::new(),
                total_memory: 0,
                memory_limit,
                clock: 0,
            }),
        }
    }

    /// 规范化相对路径，作为缓存键
    pub fn create_tri_path(relative: &str) -> String {
        tri::normalize_tri_path(relative)
    }

    /// 获取文件，未缓存或来源已更新时重新加载
    ///
    /// 文件不存在时返回 `Ok(None)`。返回的数据即使随后被淘汰也仍可使用。
    pub fn cache_file(&self, relative: &str, source: &dyn TriFileSource) -> Result<Option<Arc<TriShapeMap>>> {
        let path = Self::create_tri_path(relative);
        let stamp = source.stamp(&path);

        let hit = self.state.write(|state| {
            let tick = state.tick();
            match state.files.get_mut(&path) {
                Some(entry) if entry.stamp == stamp => {
                    entry.accessed = tick;
                    Some(entry.shapes.clone())
                }
                _ => None,
            }
        });
        if hit.is_some() {
            return Ok(hit);
        }

        let loaded = source
            .read(&path)
            .and_then(|bytes| bytes.map(|b| tri::parse_tri(&b)).transpose());
        let shapes = match loaded {
            Ok(Some(shapes)) => Arc::new(shapes),
            Ok(None) => {
                log::debug!("TRI file not found: {}", path);
                self.forget_stale(&path);
                return Ok(None);
            }
            Err(e) => {
                self.forget_stale(&path);
                return Err(e);
            }
        };
        let memory_usage = shapes.memory_usage();

        let evicted = self.state.write(|state| {
            let accessed = state.tick();
            state.insert(
                path.clone(),
                MorphFileEntry {
                    shapes: shapes.clone(),
                    accessed,
                    memory_usage,
                    stamp,
                },
            );
            state.shrink()
        });

        log::debug!(
            "Cached {} ({} shapes, {} bytes, {} evicted)",
            path,
            shapes.shape_count(),
            memory_usage,
            evicted
        );
        Ok(Some(shapes))
    }

    /// 来源已变更但无法重新加载时，移除旧数据
    fn forget_stale(&self, path: &str) {
        if self.state.write(|state| state.remove(path)) {
            log::debug!("Dropped stale cache entry {}", path);
        }
    }

    /// 强制执行一次淘汰，返回淘汰数量
    pub fn shrink(&self) -> usize {
        self.state.write(CacheState::shrink)
    }

    /// 设置内存上限并立即淘汰
    pub fn set_memory_limit(&self, limit: usize) {
        let evicted = self.state.write(|state| {
            state.memory_limit = limit;
            state.shrink()
        });
        log::info!("TRI cache limit set to {} bytes ({} evicted)", limit, evicted);
    }

    pub fn memory_limit(&self) -> usize {
        self.state.read(|state| state.memory_limit)
    }

    pub fn total_memory(&self) -> usize {
        self.state.read(|state| state.total_memory)
    }

    pub fn is_cached(&self, relative: &str) -> bool {
        let path = Self::create_tri_path(relative);
        self.state.read(|state| state.files.contains_key(&path))
    }

    pub fn file_count(&self) -> usize {
        self.state.read(|state| state.files.len())
    }

    pub fn clear(&self) {
        self.state.write(|state| {
            state.files.clear();
            state.total_memory = 0;
        });
    }
}

impl Default for MorphCache {
    fn default() -> Self {
        Self::new(crate::config::get_config().cache_memory_limit)
    }
}
