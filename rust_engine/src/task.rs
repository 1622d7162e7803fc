//! 延迟到渲染线程执行的任务
//!
//! 任务只保存角色键，执行前由调用方重新确认角色仍然有效。

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::host::ActorKey;

/// 待执行任务
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MorphTask {
    /// 应用（或擦除）角色的全部 Morph
    ApplyMorphs { actor: ActorKey, erase: bool },
    /// 重建角色体重模型
    UpdateModelWeight { actor: ActorKey },
}

impl MorphTask {
    pub fn actor(&self) -> ActorKey {
        match self {
            MorphTask::ApplyMorphs { actor, .. } | MorphTask::UpdateModelWeight { actor } => *actor,
        }
    }
}

/// 任务队列，多个生产者，渲染线程单一消费者
#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<MorphTask>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入队列，返回队列长度是否增加
    ///
    /// 同一角色的应用/擦除以最后一次请求为准：旧请求被移除，新请求排到队尾。
    /// 体重更新已排队时忽略。
    pub fn push(&self, task: MorphTask) -> bool {
        let mut tasks = self.tasks.lock();
        match task {
            MorphTask::ApplyMorphs { actor, .. } => {
                let before = tasks.len();
                tasks.retain(|t| !matches!(t, MorphTask::ApplyMorphs { actor: a, .. } if *a == actor));
                let replaced = tasks.len() != before;
                tasks.push_back(task);
                !replaced
            }
            MorphTask::UpdateModelWeight { .. } => {
                if tasks.contains(&task) {
                    return false;
                }
                tasks.push_back(task);
                true
            }
        }
    }

    /// 取出全部任务（按加入顺序）
    pub fn drain(&self) -> Vec<MorphTask> {
        self.tasks.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedup_and_drain_order() {
        let queue = TaskQueue::new();
        let a = ActorKey::from_parts(1, 0x14);
        let b = ActorKey::from_parts(2, 0x20);

        assert!(queue.push(MorphTask::ApplyMorphs { actor: a, erase: false }));
        assert!(queue.push(MorphTask::UpdateModelWeight { actor: b }));
        assert!(!queue.push(MorphTask::UpdateModelWeight { actor: b }));
        assert!(!queue.push(MorphTask::ApplyMorphs { actor: a, erase: false }));
        assert_eq!(queue.len(), 2);

        let tasks = queue.drain();
        assert_eq!(tasks[0], MorphTask::UpdateModelWeight { actor: b });
        assert_eq!(tasks[1], MorphTask::ApplyMorphs { actor: a, erase: false });
        assert!(queue.is_empty());
    }

    #[test]
    fn test_last_apply_request_wins() {
        let queue = TaskQueue::new();
        let a = ActorKey::from_parts(1, 0x14);
        let b = ActorKey::from_parts(2, 0x20);

        queue.push(MorphTask::ApplyMorphs { actor: a, erase: false });
        queue.push(MorphTask::ApplyMorphs { actor: b, erase: false });
        queue.push(MorphTask::ApplyMorphs { actor: a, erase: true });
        queue.push(MorphTask::ApplyMorphs { actor: a, erase: false });

        assert_eq!(
            queue.drain(),
            vec![
                MorphTask::ApplyMorphs { actor: b, erase: false },
                MorphTask::ApplyMorphs { actor: a, erase: false },
            ]
        );
    }
}
