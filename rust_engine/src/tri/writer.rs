//! TRI 文件写出
//!
//! 供工具和测试生成 TRI 数据，格式见 [`reader`](super::reader)。

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use glam::Vec2;

use crate::delta::{PackedUvData, PackedVertexData, VertexDelta};
use crate::{MorphError, Result};

use super::TRI_MAGIC;

enum PositionRecords {
    Packed(PackedVertexData),
    Full(Vec<VertexDelta>),
}

type Section<T> = Vec<(String, Vec<(String, T)>)>;

/// TRI 构建器
#[derive(Default)]
pub struct TriBuilder {
    positions: Section<PositionRecords>,
    uvs: Section<PackedUvData>,
}

fn push_morph<T>(section: &mut Section<T>, shape: &str, morph: &str, records: T) {
    match section.iter_mut().find(|(name, _)| name == shape) {
        Some((_, morphs)) => morphs.push((morph.to_string(), records)),
        None => section.push((shape.to_string(), vec![(morph.to_string(), records)])),
    }
}

impl TriBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加定点压缩的位置 Morph
    pub fn position_morph(mut self, shape: &str, morph: &str, deltas: &[VertexDelta]) -> Self {
        push_morph(
            &mut self.positions,
            shape,
            morph,
            PositionRecords::Packed(PackedVertexData::encode(deltas)),
        );
        self
    }

    /// 添加全精度位置 Morph
    pub fn full_position_morph(mut self, shape: &str, morph: &str, deltas: &[VertexDelta]) -> Self {
        push_morph(&mut self.positions, shape, morph, PositionRecords::Full(deltas.to_vec()));
        self
    }

    /// 添加 UV Morph
    pub fn uv_morph(mut self, shape: &str, morph: &str, deltas: &[(u16, Vec2)]) -> Self {
        push_morph(&mut self.uvs, shape, morph, PackedUvData::encode(deltas));
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_all(TRI_MAGIC)?;

        out.write_u32::<LittleEndian>(self.positions.len() as u32)?;
        for (shape, morphs) in &self.positions {
            write_name(&mut out, shape)?;
            out.write_u32::<LittleEndian>(morphs.len() as u32)?;
            for (morph, records) in morphs {
                write_name(&mut out, morph)?;
                match records {
                    PositionRecords::Packed(data) => {
                        out.write_f32::<LittleEndian>(data.multiplier)?;
                        out.write_u32::<LittleEndian>(data.deltas.len() as u32)?;
                        for d in &data.deltas {
                            out.write_u16::<LittleEndian>(d.index)?;
                            out.write_i16::<LittleEndian>(d.x)?;
                            out.write_i16::<LittleEndian>(d.y)?;
                            out.write_i16::<LittleEndian>(d.z)?;
                        }
                    }
                    PositionRecords::Full(deltas) => {
                        out.write_f32::<LittleEndian>(0.0)?;
                        out.write_u32::<LittleEndian>(deltas.len() as u32)?;
                        for d in deltas {
                            out.write_u16::<LittleEndian>(d.index)?;
                            out.write_f32::<LittleEndian>(d.delta.x)?;
                            out.write_f32::<LittleEndian>(d.delta.y)?;
                            out.write_f32::<LittleEndian>(d.delta.z)?;
                        }
                    }
                }
            }
        }

        if !self.uvs.is_empty() {
            out.write_u32::<LittleEndian>(self.uvs.len() as u32)?;
            for (shape, morphs) in &self.uvs {
                write_name(&mut out, shape)?;
                out.write_u32::<LittleEndian>(morphs.len() as u32)?;
                for (morph, data) in morphs {
                    write_name(&mut out, morph)?;
                    out.write_f32::<LittleEndian>(data.multiplier)?;
                    out.write_u32::<LittleEndian>(data.deltas.len() as u32)?;
                    for d in &data.deltas {
                        out.write_u16::<LittleEndian>(d.index)?;
                        out.write_u16::<LittleEndian>(d.u.to_bits())?;
                        out.write_u16::<LittleEndian>(d.v.to_bits())?;
                    }
                }
            }
        }

        Ok(out)
    }
}

fn write_name<W: Write>(writer: &mut W, name: &str) -> Result<()> {
    let bytes = name.as_bytes();
    let len = u8::try_from(bytes.len())
        .map_err(|_| MorphError::TriParse(format!("Name too long: {}", name)))?;
    writer.write_u8(len)?;
    writer.write_all(bytes)?;
    Ok(())
}
