//! 网格应用、延迟任务与缓存控制

use crate::cache;
use crate::host::{ActorKey, MorphHost};
use crate::model::MeshNode;
use crate::task::MorphTask;

use super::BodyMorphInterface;

impl<H: MorphHost> BodyMorphInterface<H> {
    /// 立即把角色的数值应用到给定网格，返回更新的形状数量
    ///
    /// `erase` 时写回基准。角色没有 TRI 文件或文件无法加载时不做任何事。
    pub fn apply_vertex_diff(&self, actor: ActorKey, root: &MeshNode, erase: bool) -> usize {
        let Some(path) = self.host.actor_tri_path(actor) else {
            return 0;
        };
        let shapes = match self.cache.cache_file(&path, self.source.as_ref()) {
            Ok(Some(shapes)) => shapes,
            Ok(None) => return 0,
            Err(e) => {
                log::warn!("Failed to load {} for {:?}: {}", path, actor, e);
                return 0;
            }
        };

        let values = self.store.snapshot(actor).unwrap_or_default();
        let updated = cache::apply_morphs(&shapes, &values, root, erase, self.parallel_apply);
        if self.debug_log {
            log::debug!(
                "{} morphs for {:?}: {} names, {} shapes updated",
                if erase { "Erased" } else { "Applied" },
                actor,
                values.len(),
                updated
            );
        }
        updated
    }

    /// 应用角色的全部 Morph
    ///
    /// TRI 文件在调用线程预先加载；`defer` 时网格写入排队到
    /// [`run_pending_tasks`](Self::run_pending_tasks)，否则立即执行。
    pub fn apply_body_morphs(&self, actor: ActorKey, defer: bool) {
        self.schedule_apply(actor, false, defer);
    }

    /// 把角色网格恢复到基准
    pub fn erase_body_morphs(&self, actor: ActorKey, defer: bool) {
        self.schedule_apply(actor, true, defer);
    }

    fn schedule_apply(&self, actor: ActorKey, erase: bool, defer: bool) {
        if let Some(path) = self.host.actor_tri_path(actor) {
            if let Err(e) = self.cache.cache_file(&path, self.source.as_ref()) {
                log::warn!("Failed to preload {} for {:?}: {}", path, actor, e);
            }
        }

        let task = MorphTask::ApplyMorphs { actor, erase };
        if defer {
            self.tasks.push(task);
        } else {
            self.run_task(task);
        }
    }

    /// 重建体重模型，`immediate` 为 false 时排队
    pub fn update_model_weight(&self, actor: ActorKey, immediate: bool) {
        let task = MorphTask::UpdateModelWeight { actor };
        if immediate {
            self.run_task(task);
        } else {
            self.tasks.push(task);
        }
    }

    /// 在渲染线程执行全部排队任务，返回实际执行的数量
    ///
    /// 角色已失效的任务直接丢弃。
    pub fn run_pending_tasks(&self) -> usize {
        self.tasks.drain().into_iter().filter(|task| self.run_task(*task)).count()
    }

    pub fn pending_task_count(&self) -> usize {
        self.tasks.len()
    }

    fn run_task(&self, task: MorphTask) -> bool {
        let actor = task.actor();
        if !self.host.is_actor_valid(actor) {
            log::debug!("Discarding {:?}: actor no longer valid", task);
            return false;
        }

        match task {
            MorphTask::ApplyMorphs { erase, .. } => match self.host.root_node(actor) {
                Some(root) => {
                    self.apply_vertex_diff(actor, &root, erase);
                    true
                }
                None => {
                    log::debug!("Discarding {:?}: actor has no mesh", task);
                    false
                }
            },
            MorphTask::UpdateModelWeight { .. } => {
                self.host.update_model_weight(actor);
                true
            }
        }
    }

    /// 角色当前的数值中是否有任意一个在其 TRI 文件里有数据
    pub fn has_applicable_morphs(&self, actor: ActorKey) -> bool {
        let Some(values) = self.store.snapshot(actor) else {
            return false;
        };
        let Some(path) = self.host.actor_tri_path(actor) else {
            return false;
        };
        match self.cache.cache_file(&path, self.source.as_ref()) {
            Ok(Some(shapes)) => cache::has_morphs(&shapes, &values),
            _ => false,
        }
    }

    // ========== 缓存 ==========

    pub fn set_cache_limit(&self, limit: usize) {
        self.cache.set_memory_limit(limit);
    }

    /// 强制淘汰一次，返回淘汰的文件数量
    pub fn shrink_cache(&self) -> usize {
        self.cache.shrink()
    }
}
