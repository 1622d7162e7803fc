//! 全局字符串驻留表
//!
//! Morph 名称、键名、形状名称统一以 [`FixedStr`] 句柄保存。
//! 相同字符串（忽略大小写）总是得到同一个句柄，比较与哈希只看句柄，
//! 不比较字符串内容。驻留的字符串在进程生命周期内不会释放。

mod table;

pub use table::{StringIdMap, StringTable};

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// 驻留字符串句柄
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedStr(u32);

struct Interner {
    /// 小写形式 -> 句柄
    lookup: HashMap<String, u32>,
    /// 句柄 -> 首次出现时的原始拼写
    strings: Vec<&'static str>,
}

static INTERNER: Lazy<RwLock<Interner>> = Lazy::new(|| {
    RwLock::new(Interner {
        lookup: HashMap::new(),
        strings: Vec::new(),
    })
});

impl FixedStr {
    /// 驻留字符串并返回句柄
    pub fn new(s: &str) -> Self {
        let folded = s.to_lowercase();
        if let Some(&id) = INTERNER.read().lookup.get(&folded) {
            return FixedStr(id);
        }

        let mut interner = INTERNER.write();
        // 读锁释放后其他线程可能已经插入
        if let Some(&id) = interner.lookup.get(&folded) {
            return FixedStr(id);
        }
        let id = interner.strings.len() as u32;
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        interner.strings.push(leaked);
        interner.lookup.insert(folded, id);
        FixedStr(id)
    }

    /// 查找已驻留的字符串，不存在时不会插入
    pub fn lookup(s: &str) -> Option<Self> {
        INTERNER
            .read()
            .lookup
            .get(&s.to_lowercase())
            .map(|&id| FixedStr(id))
    }

    /// 获取字符串内容
    pub fn as_str(&self) -> &'static str {
        INTERNER
            .read()
            .strings
            .get(self.0 as usize)
            .copied()
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    /// 原始句柄值，仅用于调试输出
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl Default for FixedStr {
    fn default() -> Self {
        FixedStr::new("")
    }
}

impl From<&str> for FixedStr {
    fn from(s: &str) -> Self {
        FixedStr::new(s)
    }
}

impl From<&String> for FixedStr {
    fn from(s: &String) -> Self {
        FixedStr::new(s)
    }
}

impl fmt::Display for FixedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FixedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.as_str(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_string_same_handle() {
        let a = FixedStr::new("Breasts");
        let b = FixedStr::new("Breasts");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Breasts");
    }

    #[test]
    fn test_case_insensitive_identity() {
        let a = FixedStr::new("ButtShape_Test");
        let b = FixedStr::new("buttshape_test");
        assert_eq!(a, b);
        // 保留首次出现的拼写
        assert_eq!(b.as_str(), "ButtShape_Test");
    }

    #[test]
    fn test_lookup_does_not_insert() {
        assert!(FixedStr::lookup("never-interned-string-xyz").is_none());
        let s = FixedStr::new("now-interned-string-xyz");
        assert_eq!(FixedStr::lookup("NOW-interned-string-xyz"), Some(s));
    }
}
