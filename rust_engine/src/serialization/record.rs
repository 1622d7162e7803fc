//! 单个角色记录的编码与解码
//!
//! - v1：`[条目数 u32]` 然后 `(名称, f32)*`，字符串内联
//! - v2：`[名称数 u32]` 然后 `(名称, [键数 u32], (键, f32)*)*`，字符串内联
//! - v3：与 v2 相同，字符串写为字符串表索引 `u32`

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::morph::{MorphEntry, MorphValueMap, MorphValueSet, LEGACY_MORPH_KEY};
use crate::strings::{FixedStr, StringIdMap, StringTable};
use crate::{MorphError, Result};

use super::{read_string, write_string, SerializationVersion};

/// 记录中的字符串写法
enum StringCodec<'a> {
    Inline,
    Table(&'a mut StringTable),
}

impl StringCodec<'_> {
    fn write<W: Write>(&mut self, writer: &mut W, s: FixedStr) -> Result<()> {
        match self {
            StringCodec::Inline => write_string(writer, s.as_str()),
            StringCodec::Table(table) => {
                let id = table.insert(s);
                writer.write_u32::<LittleEndian>(id)?;
                Ok(())
            }
        }
    }
}

fn read_fixed<R: Read>(reader: &mut R, version: SerializationVersion, strings: &StringIdMap) -> Result<FixedStr> {
    match version {
        SerializationVersion::V1 | SerializationVersion::V2 => Ok(FixedStr::new(&read_string(reader)?)),
        SerializationVersion::V3 => {
            let id = reader
                .read_u32::<LittleEndian>()
                .map_err(|e| MorphError::Serialization(format!("Failed to read string index: {}", e)))?;
            strings.resolve(id)
        }
    }
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32> {
    reader
        .read_f32::<LittleEndian>()
        .map_err(|e| MorphError::Serialization(format!("Failed to read value: {}", e)))
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MorphError::Serialization(format!("Failed to read {} count: {}", what, e)))
}

/// 编码角色记录
pub(super) fn encode_record<W: Write>(
    writer: &mut W,
    map: &MorphValueMap,
    version: SerializationVersion,
    table: &mut StringTable,
) -> Result<()> {
    match version {
        SerializationVersion::V1 => {
            let set = MorphValueSet::from_value_map(map);
            writer.write_u32::<LittleEndian>(set.len() as u32)?;
            for entry in set.iter() {
                write_string(writer, entry.name.as_str())?;
                writer.write_f32::<LittleEndian>(entry.value)?;
            }
            Ok(())
        }
        SerializationVersion::V2 => encode_keyed(writer, map, StringCodec::Inline),
        SerializationVersion::V3 => encode_keyed(writer, map, StringCodec::Table(table)),
    }
}

fn encode_keyed<W: Write>(writer: &mut W, map: &MorphValueMap, mut codec: StringCodec<'_>) -> Result<()> {
    // 按字符串排序，保证相同数据写出相同字节
    let mut names: Vec<_> = map.iter().collect();
    names.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

    writer.write_u32::<LittleEndian>(names.len() as u32)?;
    for (name, keys) in names {
        codec.write(writer, name)?;
        let mut keys: Vec<_> = keys.iter().collect();
        keys.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        writer.write_u32::<LittleEndian>(keys.len() as u32)?;
        for (key, value) in keys {
            codec.write(writer, *key)?;
            writer.write_f32::<LittleEndian>(*value)?;
        }
    }
    Ok(())
}

/// 解码角色记录
pub(super) fn decode_record<R: Read>(
    reader: &mut R,
    version: SerializationVersion,
    strings: &StringIdMap,
) -> Result<MorphValueMap> {
    match version {
        SerializationVersion::V1 => {
            let count = read_count(reader, "entry")?;
            let mut set = MorphValueSet::new();
            for _ in 0..count {
                let name = read_fixed(reader, version, strings)?;
                let value = read_f32(reader)?;
                set.insert(MorphEntry { name, value });
            }
            Ok(set.into_value_map(FixedStr::new(LEGACY_MORPH_KEY)))
        }
        SerializationVersion::V2 | SerializationVersion::V3 => {
            let mut map = MorphValueMap::new();
            let name_count = read_count(reader, "name")?;
            for _ in 0..name_count {
                let name = read_fixed(reader, version, strings)?;
                let key_count = read_count(reader, "key")?;
                for _ in 0..key_count {
                    let key = read_fixed(reader, version, strings)?;
                    let value = read_f32(reader)?;
                    map.set(name, key, value);
                }
            }
            Ok(map)
        }
    }
}
