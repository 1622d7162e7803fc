//! Morph 存档读写
//!
//! 存档格式：`[版本 u8][角色数 u32]`，之后每个角色
//! `[角色键 u64][记录长度 u32][记录]`。记录带长度前缀，
//! 单个角色的记录损坏时跳过该角色，其余角色照常加载。
//! 加载支持全部历史版本，保存总是写当前版本。

mod record;

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::host::ActorKey;
use crate::morph::ActorMorphStore;
use crate::strings::{StringIdMap, StringTable};
use crate::{MorphError, Result};

/// 存档版本
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SerializationVersion {
    /// 无键，(名称, 数值) 集合
    V1 = 1,
    /// 带键，字符串内联
    V2 = 2,
    /// 带键，字符串写为字符串表索引
    V3 = 3,
}

impl SerializationVersion {
    pub const CURRENT: SerializationVersion = SerializationVersion::V3;

    pub const ALL: [SerializationVersion; 3] = [
        SerializationVersion::V1,
        SerializationVersion::V2,
        SerializationVersion::V3,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(SerializationVersion::V1),
            2 => Some(SerializationVersion::V2),
            3 => Some(SerializationVersion::V3),
            _ => None,
        }
    }
}

/// 加载结果统计
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    /// 记录损坏或角色已不存在而跳过的数量
    pub skipped: usize,
    /// 数据流在中途结束
    pub truncated: bool,
}

/// 写入字符串：`[长度 u16][UTF-8]`
pub(crate) fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let len = u16::try_from(bytes.len())
        .map_err(|_| MorphError::Serialization(format!("String too long: {} bytes", bytes.len())))?;
    writer.write_u16::<LittleEndian>(len)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// 读取 [`write_string`] 写入的字符串
pub(crate) fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader
        .read_u16::<LittleEndian>()
        .map_err(|e| MorphError::Serialization(format!("Failed to read string length: {}", e)))?;
    let mut bytes = vec![0u8; len as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| MorphError::Serialization(format!("Failed to read string: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| MorphError::Serialization(format!("Invalid UTF-8 string: {}", e)))
}

/// 以当前版本保存全部角色
pub fn save_actor_morphs<W: Write>(store: &ActorMorphStore, writer: &mut W, table: &mut StringTable) -> Result<()> {
    save_versioned(store, writer, SerializationVersion::CURRENT, table)
}

/// 以指定版本保存全部角色
///
/// v1 没有键，每个名称只保存有效权重。
pub fn save_versioned<W: Write>(
    store: &ActorMorphStore,
    writer: &mut W,
    version: SerializationVersion,
    table: &mut StringTable,
) -> Result<()> {
    let actors = store.snapshot_all();
    writer.write_u8(version as u8)?;
    writer.write_u32::<LittleEndian>(actors.len() as u32)?;

    for (actor, map) in &actors {
        let mut payload = Vec::new();
        record::encode_record(&mut payload, map, version, table)?;
        writer.write_u64::<LittleEndian>(actor.0)?;
        writer.write_u32::<LittleEndian>(payload.len() as u32)?;
        writer.write_all(&payload)?;
    }

    log::debug!("Saved morphs for {} actors (v{})", actors.len(), version as u8);
    Ok(())
}

/// 加载存档到存储中
///
/// `resolve` 把存档中的角色键映射为当前角色，返回 None 的角色被丢弃。
/// 未知版本或头部无法读取时返回错误；单个记录损坏只跳过该记录。
pub fn load_actor_morphs<R: Read>(
    store: &ActorMorphStore,
    reader: &mut R,
    strings: &StringIdMap,
    resolve: impl Fn(ActorKey) -> Option<ActorKey>,
) -> Result<LoadReport> {
    let raw_version = reader
        .read_u8()
        .map_err(|e| MorphError::Serialization(format!("Failed to read version: {}", e)))?;
    let version = SerializationVersion::from_u8(raw_version)
        .ok_or_else(|| MorphError::Serialization(format!("Unsupported version {}", raw_version)))?;
    let count = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MorphError::Serialization(format!("Failed to read actor count: {}", e)))?;

    let mut report = LoadReport::default();
    for index in 0..count {
        let header = reader
            .read_u64::<LittleEndian>()
            .and_then(|key| reader.read_u32::<LittleEndian>().map(|len| (key, len)));
        let (key, len) = match header {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Morph data truncated at actor {}/{}: {}", index, count, e);
                report.truncated = true;
                break;
            }
        };

        let mut payload = Vec::new();
        let read = reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
        if read != len as usize {
            log::warn!(
                "Morph record for {:?} truncated: expected {} bytes, got {}",
                ActorKey(key),
                len,
                read
            );
            report.truncated = true;
            break;
        }

        let map = match record::decode_record(&mut Cursor::new(payload), version, strings) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("Failed to load morphs for {:?}: {}", ActorKey(key), e);
                report.skipped += 1;
                continue;
            }
        };

        match resolve(ActorKey(key)) {
            Some(actor) => {
                store.insert_actor(actor, map);
                report.loaded += 1;
            }
            None => {
                log::debug!("Dropping morphs for unresolved actor {:?}", ActorKey(key));
                report.skipped += 1;
            }
        }
    }

    log::info!(
        "Loaded morphs (v{}): {} actors, {} skipped{}",
        raw_version,
        report.loaded,
        report.skipped,
        if report.truncated { ", truncated" } else { "" }
    );
    Ok(report)
}
