//! 带锁容器
//!
//! 所有访问都通过闭包完成，锁守卫不会离开闭包作用域。

use parking_lot::RwLock;

/// 读写锁保护的容器
///
/// 回调内部不要再次访问同一个容器，否则会死锁。
#[derive(Debug, Default)]
pub struct GuardedContainer<T> {
    inner: RwLock<T>,
}

impl<T> GuardedContainer<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    /// 持读锁执行回调
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.read();
        f(&guard)
    }

    /// 持写锁执行回调
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_scoped_access() {
        let container = GuardedContainer::new(Vec::<u32>::new());
        container.write(|v| v.push(3));
        container.write(|v| v.push(4));
        assert_eq!(container.read(|v| v.iter().sum::<u32>()), 7);
    }

    #[test]
    fn test_concurrent_writers() {
        let container = Arc::new(GuardedContainer::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&container);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.write(|n| *n += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(container.read(|n| *n), 8000);
    }
}
