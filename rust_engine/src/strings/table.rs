//! 存档字符串表
//!
//! 存档中的字符串只写入索引，字符串本体集中写入一张表。
//! 保存时用 [`StringTable`] 收集，加载时用 [`StringIdMap`] 把索引解析回句柄。

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::serialization::{read_string, write_string};
use crate::{MorphError, Result};

use super::FixedStr;

/// 保存侧字符串表：句柄 -> 索引（按首次插入顺序分配）
#[derive(Default, Debug)]
pub struct StringTable {
    ids: HashMap<FixedStr, u32>,
    order: Vec<FixedStr>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入字符串并返回其索引，重复插入返回同一索引
    pub fn insert(&mut self, s: FixedStr) -> u32 {
        if let Some(&id) = self.ids.get(&s) {
            return id;
        }
        let id = self.order.len() as u32;
        self.ids.insert(s, id);
        self.order.push(s);
        id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 写出字符串表：[数量 u32] 然后 (索引 u32, 字符串)*
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.order.len() as u32)?;
        for (id, s) in self.order.iter().enumerate() {
            writer.write_u32::<LittleEndian>(id as u32)?;
            write_string(writer, s.as_str())?;
        }
        Ok(())
    }

    /// 直接转换为加载侧映射（同进程内往返时使用）
    pub fn to_id_map(&self) -> StringIdMap {
        let mut map = StringIdMap::new();
        for (id, s) in self.order.iter().enumerate() {
            map.insert(id as u32, *s);
        }
        map
    }
}

/// 加载侧字符串表：索引 -> 句柄
#[derive(Default, Clone, Debug)]
pub struct StringIdMap {
    strings: HashMap<u32, FixedStr>,
}

impl StringIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, s: FixedStr) {
        self.strings.insert(id, s);
    }

    pub fn get(&self, id: u32) -> Option<FixedStr> {
        self.strings.get(&id).copied()
    }

    /// 解析索引，无法解析时返回 [`MorphError::StringTable`]
    pub fn resolve(&self, id: u32) -> Result<FixedStr> {
        self.get(id).ok_or(MorphError::StringTable(id))
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// 读取 [`StringTable::write`] 写出的字符串表
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| MorphError::Serialization(format!("Failed to read string count: {}", e)))?;

        let mut map = StringIdMap::new();
        for _ in 0..count {
            let id = reader.read_u32::<LittleEndian>().map_err(|e| {
                MorphError::Serialization(format!("Failed to read string id: {}", e))
            })?;
            let s = read_string(reader)?;
            map.insert(id, FixedStr::new(&s));
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_insert_deduplicates() {
        let mut table = StringTable::new();
        let a = table.insert(FixedStr::new("Breasts"));
        let b = table.insert(FixedStr::new("Butt"));
        let c = table.insert(FixedStr::new("breasts"));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(c, 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_write_then_read() {
        let mut table = StringTable::new();
        table.insert(FixedStr::new("Thighs"));
        table.insert(FixedStr::new("RaceMenu"));

        let mut bytes = Vec::new();
        table.write(&mut bytes).unwrap();

        let map = StringIdMap::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(map.get(0), Some(FixedStr::new("Thighs")));
        assert_eq!(map.get(1), Some(FixedStr::new("RaceMenu")));
        assert!(matches!(map.resolve(7), Err(MorphError::StringTable(7))));
    }
}
