//! TRI 文件解析
//!
//! 格式（小端）：
//! - 魔数 `PIRT`
//! - 位置段：`[形状数 u32]`，每个形状 `(名称, [Morph 数 u32], Morph*)`，
//!   每个 Morph `(名称, multiplier f32, [数量 u32], 记录*)`。
//!   multiplier > 0 时记录为 `(u16 索引, i16 x, i16 y, i16 z)`，
//!   multiplier == 0 时记录为全精度 `(u16 索引, f32 x, f32 y, f32 z)`
//! - UV 段（可选）：同样的形状/Morph 结构，记录为 `(u16 索引, u16 u, u16 v)`，
//!   u/v 为 f16 位模式
//! - 名称：`[长度 u8][字节]`

use std::io::{Cursor, ErrorKind, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use half::f16;

use crate::cache::TriShapeMap;
use crate::delta::{
    FullVertexData, PackedUvData, PackedUvDelta, PackedVertexData, PackedVertexDelta, VertexDelta,
    VertexDeltas,
};
use crate::strings::FixedStr;
use crate::{MorphError, Result};

/// TRI 文件魔数
pub const TRI_MAGIC: &[u8; 4] = b"PIRT";

/// 预分配上限，防止损坏的数量字段导致巨量分配
const MAX_PREALLOC: usize = 1 << 16;

/// 从字节切片解析 TRI
pub fn parse_tri(bytes: &[u8]) -> Result<TriShapeMap> {
    let mut reader = Cursor::new(bytes);
    load_from_reader(&mut reader)
}

/// 从 Reader 解析 TRI
pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<TriShapeMap> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|e| MorphError::TriParse(format!("Failed to read header: {}", e)))?;
    if &magic != TRI_MAGIC {
        return Err(MorphError::TriParse("Invalid TRI header".to_string()));
    }

    let mut map = TriShapeMap::new();

    // 位置段
    let shape_count = read_u32(reader, "shape count")?;
    for _ in 0..shape_count {
        let shape = read_name(reader)?;
        let morph_count = read_u32(reader, "morph count")?;
        for _ in 0..morph_count {
            let morph = read_name(reader)?;
            let deltas = read_position_morph(reader)?;
            map.shape_mut(shape).insert_position(morph, deltas);
        }
    }

    // UV 段可能不存在（只含位置的旧文件）
    let uv_shape_count = match reader.read_u32::<LittleEndian>() {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(map),
        Err(e) => return Err(MorphError::TriParse(format!("Failed to read uv shape count: {}", e))),
    };
    for _ in 0..uv_shape_count {
        let shape = read_name(reader)?;
        let morph_count = read_u32(reader, "uv morph count")?;
        for _ in 0..morph_count {
            let morph = read_name(reader)?;
            let deltas = read_uv_morph(reader)?;
            map.shape_mut(shape).insert_uv(morph, deltas);
        }
    }

    Ok(map)
}

fn read_position_morph<R: Read>(reader: &mut R) -> Result<VertexDeltas> {
    let multiplier = read_f32(reader, "multiplier")?;
    let count = read_u32(reader, "delta count")? as usize;

    if multiplier > 0.0 {
        let mut data = PackedVertexData {
            multiplier,
            max_index: 0,
            deltas: Vec::with_capacity(count.min(MAX_PREALLOC)),
        };
        for _ in 0..count {
            let delta = PackedVertexDelta {
                index: read_u16(reader)?,
                x: read_i16(reader)?,
                y: read_i16(reader)?,
                z: read_i16(reader)?,
            };
            data.max_index = data.max_index.max(delta.index as u32);
            data.deltas.push(delta);
        }
        Ok(VertexDeltas::PackedPosition(data))
    } else if multiplier == 0.0 {
        let mut deltas = Vec::with_capacity(count.min(MAX_PREALLOC));
        for _ in 0..count {
            let index = read_u16(reader)?;
            let delta = Vec3::new(
                read_f32(reader, "delta")?,
                read_f32(reader, "delta")?,
                read_f32(reader, "delta")?,
            );
            deltas.push(VertexDelta { index, delta });
        }
        Ok(VertexDeltas::Full(FullVertexData::new(deltas)))
    } else {
        Err(MorphError::TriParse(format!("Invalid multiplier {}", multiplier)))
    }
}

fn read_uv_morph<R: Read>(reader: &mut R) -> Result<VertexDeltas> {
    let multiplier = read_f32(reader, "uv multiplier")?;
    if !(multiplier > 0.0) {
        return Err(MorphError::TriParse(format!("Invalid uv multiplier {}", multiplier)));
    }
    let count = read_u32(reader, "uv delta count")? as usize;

    let mut data = PackedUvData {
        multiplier,
        max_index: 0,
        deltas: Vec::with_capacity(count.min(MAX_PREALLOC)),
    };
    for _ in 0..count {
        let delta = PackedUvDelta {
            index: read_u16(reader)?,
            u: f16::from_bits(read_u16(reader)?),
            v: f16::from_bits(read_u16(reader)?),
        };
        data.max_index = data.max_index.max(delta.index as u32);
        data.deltas.push(delta);
    }
    Ok(VertexDeltas::PackedUv(data))
}

fn read_name<R: Read>(reader: &mut R) -> Result<FixedStr> {
    let len = reader
        .read_u8()
        .map_err(|e| MorphError::TriParse(format!("Failed to read name length: {}", e)))?;
    let mut bytes = vec![0u8; len as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| MorphError::TriParse(format!("Failed to read name: {}", e)))?;
    Ok(FixedStr::new(&String::from_utf8_lossy(&bytes)))
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| MorphError::TriParse(format!("Failed to read {}: {}", what, e)))
}

fn read_f32<R: Read>(reader: &mut R, what: &str) -> Result<f32> {
    reader
        .read_f32::<LittleEndian>()
        .map_err(|e| MorphError::TriParse(format!("Failed to read {}: {}", what, e)))
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    reader
        .read_u16::<LittleEndian>()
        .map_err(|e| MorphError::TriParse(format!("Failed to read vertex index: {}", e)))
}

fn read_i16<R: Read>(reader: &mut R) -> Result<i16> {
    reader
        .read_i16::<LittleEndian>()
        .map_err(|e| MorphError::TriParse(format!("Failed to read packed delta: {}", e)))
}
