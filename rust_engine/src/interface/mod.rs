//! BodyMorph 对外接口
//!
//! 协调数值存储、TRI 缓存、延迟任务和 BodyGen 模板。
//! 宿主相关的查询全部经由 [`MorphHost`]。

mod apply;
mod bodygen;

pub use bodygen::BodyGenLoadReport;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cache::MorphCache;
use crate::config::{get_config, MorphConfig};
use crate::host::{ActorKey, MorphHost};
use crate::morph::{self, ActorMorphStore};
use crate::serialization::{self, LoadReport};
use crate::strings::{FixedStr, StringIdMap, StringTable};
use crate::sync::GuardedContainer;
use crate::task::TaskQueue;
use crate::template::{BodyGenData, BodyGenTemplateTable};
use crate::tri::TriFileSource;
use crate::Result;

/// 接口版本
pub const PLUGIN_VERSION: u32 = 3;

/// BodyGen 写入数值时使用的保留键
pub const TEMPLATE_MORPH_KEY: &str = "BodyGen";

/// BodyMorph 接口
pub struct BodyMorphInterface<H: MorphHost> {
    host: Arc<H>,
    source: Arc<dyn TriFileSource>,
    store: ActorMorphStore,
    cache: MorphCache,
    tasks: TaskQueue,
    templates: GuardedContainer<BodyGenTemplateTable>,
    body_gen: GuardedContainer<BodyGenData>,
    rng: Mutex<StdRng>,
    data_directory: PathBuf,
    parallel_apply: bool,
    debug_log: bool,
}

impl<H: MorphHost> BodyMorphInterface<H> {
    /// 使用当前全局配置创建
    pub fn new(host: Arc<H>, source: Arc<dyn TriFileSource>) -> Self {
        Self::with_config(host, source, &get_config())
    }

    pub fn with_config(host: Arc<H>, source: Arc<dyn TriFileSource>, config: &MorphConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            host,
            source,
            store: ActorMorphStore::new(),
            cache: MorphCache::new(config.cache_memory_limit),
            tasks: TaskQueue::new(),
            templates: GuardedContainer::new(HashMap::new()),
            body_gen: GuardedContainer::new(BodyGenData::new()),
            rng: Mutex::new(rng),
            data_directory: config.data_directory.clone(),
            parallel_apply: config.parallel_apply,
            debug_log: config.debug_log,
        }
    }

    pub fn get_version(&self) -> u32 {
        PLUGIN_VERSION
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn store(&self) -> &ActorMorphStore {
        &self.store
    }

    pub fn cache(&self) -> &MorphCache {
        &self.cache
    }

    // ========== Morph 数值 ==========

    /// 设置数值，名称或键过长时拒绝并返回 false
    pub fn set_morph(&self, actor: ActorKey, name: &str, key: &str, value: f32) -> bool {
        if !morph::is_storable(name, key) {
            log::warn!("Rejected morph for {:?}: name or key too long", actor);
            return false;
        }
        self.store.set_morph(actor, FixedStr::new(name), FixedStr::new(key), value)
    }

    pub fn get_morph(&self, actor: ActorKey, name: &str, key: &str) -> f32 {
        match (FixedStr::lookup(name), FixedStr::lookup(key)) {
            (Some(name), Some(key)) => self.store.get_morph(actor, name, key),
            _ => 0.0,
        }
    }

    pub fn clear_morph(&self, actor: ActorKey, name: &str, key: &str) {
        if let (Some(name), Some(key)) = (FixedStr::lookup(name), FixedStr::lookup(key)) {
            self.store.clear_morph(actor, name, key);
        }
    }

    /// 有效权重（全部键之和）
    pub fn get_body_morphs(&self, actor: ActorKey, name: &str) -> f32 {
        FixedStr::lookup(name).map_or(0.0, |name| self.store.get_body_morphs(actor, name))
    }

    pub fn clear_body_morph_names(&self, actor: ActorKey, name: &str) {
        if let Some(name) = FixedStr::lookup(name) {
            self.store.clear_body_morph_names(actor, name);
        }
    }

    pub fn clear_body_morph_keys(&self, actor: ActorKey, key: &str) -> usize {
        FixedStr::lookup(key).map_or(0, |key| self.store.clear_body_morph_keys(actor, key))
    }

    pub fn clear_morphs(&self, actor: ActorKey) {
        self.store.clear_morphs(actor);
    }

    pub fn has_morphs(&self, actor: ActorKey) -> bool {
        self.store.has_morphs(actor)
    }

    pub fn has_body_morph(&self, actor: ActorKey, name: &str, key: &str) -> bool {
        match (FixedStr::lookup(name), FixedStr::lookup(key)) {
            (Some(name), Some(key)) => self.store.has_body_morph(actor, name, key),
            _ => false,
        }
    }

    pub fn has_body_morph_name(&self, actor: ActorKey, name: &str) -> bool {
        FixedStr::lookup(name).is_some_and(|name| self.store.has_body_morph_name(actor, name))
    }

    pub fn has_body_morph_key(&self, actor: ActorKey, key: &str) -> bool {
        FixedStr::lookup(key).is_some_and(|key| self.store.has_body_morph_key(actor, key))
    }

    pub fn visit_morphs(&self, actor: ActorKey, f: impl FnMut(FixedStr, &HashMap<FixedStr, f32>)) {
        self.store.visit_morphs(actor, f);
    }

    pub fn visit_keys(&self, actor: ActorKey, name: &str, f: impl FnMut(FixedStr, f32)) {
        if let Some(name) = FixedStr::lookup(name) {
            self.store.visit_keys(actor, name, f);
        }
    }

    pub fn visit_actors(&self, f: impl FnMut(ActorKey)) {
        self.store.visit_actors(f);
    }

    pub fn visit_strings(&self, f: impl FnMut(FixedStr)) {
        self.store.visit_strings(f);
    }

    /// 角色被删除
    pub fn on_actor_deleted(&self, actor: ActorKey) {
        if self.store.remove_actor(actor) {
            log::debug!("Removed morphs of deleted actor {:?}", actor);
        }
    }

    // ========== 存档 ==========

    /// 保存全部角色，字符串写入 `table`
    pub fn save<W: Write>(&self, writer: &mut W, table: &mut StringTable) -> Result<()> {
        serialization::save_actor_morphs(&self.store, writer, table)
    }

    /// 加载存档，角色键经宿主重新映射
    pub fn load<R: Read>(&self, reader: &mut R, strings: &StringIdMap) -> Result<LoadReport> {
        serialization::load_actor_morphs(&self.store, reader, strings, |saved| self.host.resolve_actor(saved))
    }

    /// 保存为自包含数据：字符串表在前，Morph 数据在后
    pub fn save_bundle<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut table = StringTable::new();
        let mut payload = Vec::new();
        self.save(&mut payload, &mut table)?;
        table.write(writer)?;
        writer.write_all(&payload)?;
        Ok(())
    }

    /// 加载 [`save_bundle`](Self::save_bundle) 写出的数据
    pub fn load_bundle<R: Read>(&self, reader: &mut R) -> Result<LoadReport> {
        let strings = StringIdMap::read(reader)?;
        self.load(reader, &strings)
    }

    /// 清空全部数值（读档前调用）
    pub fn revert(&self) {
        self.store.revert();
        self.tasks.drain();
    }
}
