//! 顶点缓冲布局描述
//!
//! GPU 顶点格式不固定：位置可能是 f32x3 也可能是 f16x3，UV 通常是 f16x2。
//! 布局描述给出步长与各通道的字节偏移，运行时据此读写，无需为每种格式重新编译。

use byteorder::{ByteOrder, LittleEndian};
use glam::{Vec2, Vec3};
use half::f16;

use crate::{MorphError, Result};

/// 分量格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentFormat {
    Float32,
    Float16,
}

impl ComponentFormat {
    /// 单个分量的字节数
    pub const fn size(self) -> usize {
        match self {
            ComponentFormat::Float32 => 4,
            ComponentFormat::Float16 => 2,
        }
    }
}

/// 顶点属性：在单个顶点内的字节偏移 + 分量格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub offset: usize,
    pub format: ComponentFormat,
}

/// 顶点缓冲布局
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: usize,
    pub position: Option<VertexAttribute>,
    pub uv: Option<VertexAttribute>,
}

impl VertexLayout {
    /// 全精度位置 (f32x3) + 半精度 UV (f16x2)，步长 16
    pub const fn full_precision() -> Self {
        Self {
            stride: 16,
            position: Some(VertexAttribute {
                offset: 0,
                format: ComponentFormat::Float32,
            }),
            uv: Some(VertexAttribute {
                offset: 12,
                format: ComponentFormat::Float16,
            }),
        }
    }

    /// 半精度位置 (f16x3 + 2 字节填充) + 半精度 UV，步长 12
    pub const fn compressed() -> Self {
        Self {
            stride: 12,
            position: Some(VertexAttribute {
                offset: 0,
                format: ComponentFormat::Float16,
            }),
            uv: Some(VertexAttribute {
                offset: 8,
                format: ComponentFormat::Float16,
            }),
        }
    }

    /// 缓冲区至少需要的字节数
    pub fn required_len(&self, vertex_count: usize) -> usize {
        self.stride * vertex_count
    }

    /// 检查属性不越出步长、缓冲区足够容纳全部顶点
    pub fn validate(&self, buffer_len: usize, vertex_count: usize) -> Result<()> {
        if let Some(pos) = self.position {
            if pos.offset + pos.format.size() * 3 > self.stride {
                return Err(MorphError::LayoutMismatch(format!(
                    "position attribute at {} exceeds stride {}",
                    pos.offset, self.stride
                )));
            }
        }
        if let Some(uv) = self.uv {
            if uv.offset + uv.format.size() * 2 > self.stride {
                return Err(MorphError::LayoutMismatch(format!(
                    "uv attribute at {} exceeds stride {}",
                    uv.offset, self.stride
                )));
            }
        }
        let required = self.required_len(vertex_count);
        if buffer_len < required {
            return Err(MorphError::LayoutMismatch(format!(
                "buffer holds {} bytes, {} vertices need {}",
                buffer_len, vertex_count, required
            )));
        }
        Ok(())
    }

    /// 读取位置，调用方需先 [`validate`](Self::validate)
    pub fn read_position(&self, buffer: &[u8], index: usize) -> Option<Vec3> {
        let attr = self.position?;
        let base = index * self.stride + attr.offset;
        let step = attr.format.size();
        Some(Vec3::new(
            read_component(buffer, base, attr.format),
            read_component(buffer, base + step, attr.format),
            read_component(buffer, base + step * 2, attr.format),
        ))
    }

    pub fn write_position(&self, buffer: &mut [u8], index: usize, value: Vec3) {
        if let Some(attr) = self.position {
            let base = index * self.stride + attr.offset;
            let step = attr.format.size();
            write_component(buffer, base, attr.format, value.x);
            write_component(buffer, base + step, attr.format, value.y);
            write_component(buffer, base + step * 2, attr.format, value.z);
        }
    }

    pub fn read_uv(&self, buffer: &[u8], index: usize) -> Option<Vec2> {
        let attr = self.uv?;
        let base = index * self.stride + attr.offset;
        let step = attr.format.size();
        Some(Vec2::new(
            read_component(buffer, base, attr.format),
            read_component(buffer, base + step, attr.format),
        ))
    }

    pub fn write_uv(&self, buffer: &mut [u8], index: usize, value: Vec2) {
        if let Some(attr) = self.uv {
            let base = index * self.stride + attr.offset;
            let step = attr.format.size();
            write_component(buffer, base, attr.format, value.x);
            write_component(buffer, base + step, attr.format, value.y);
        }
    }
}

fn read_component(buffer: &[u8], at: usize, format: ComponentFormat) -> f32 {
    match format {
        ComponentFormat::Float32 => LittleEndian::read_f32(&buffer[at..at + 4]),
        ComponentFormat::Float16 => f16::from_bits(LittleEndian::read_u16(&buffer[at..at + 2])).to_f32(),
    }
}

fn write_component(buffer: &mut [u8], at: usize, format: ComponentFormat, value: f32) {
    match format {
        ComponentFormat::Float32 => LittleEndian::write_f32(&mut buffer[at..at + 4], value),
        ComponentFormat::Float16 => {
            LittleEndian::write_u16(&mut buffer[at..at + 2], f16::from_f32(value).to_bits())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_precision_roundtrip() {
        let layout = VertexLayout::full_precision();
        let mut buf = vec![0u8; layout.required_len(2)];
        layout.write_position(&mut buf, 1, Vec3::new(1.5, -2.25, 3.0));
        layout.write_uv(&mut buf, 1, Vec2::new(0.25, 0.75));
        assert_eq!(layout.read_position(&buf, 1), Some(Vec3::new(1.5, -2.25, 3.0)));
        assert_eq!(layout.read_uv(&buf, 1), Some(Vec2::new(0.25, 0.75)));
        assert_eq!(layout.read_position(&buf, 0), Some(Vec3::ZERO));
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let layout = VertexLayout::compressed();
        assert!(layout.validate(24, 2).is_ok());
        assert!(matches!(layout.validate(23, 2), Err(MorphError::LayoutMismatch(_))));
    }

    #[test]
    fn test_validate_rejects_attribute_past_stride() {
        let layout = VertexLayout {
            stride: 8,
            position: Some(VertexAttribute {
                offset: 0,
                format: ComponentFormat::Float32,
            }),
            uv: None,
        };
        assert!(layout.validate(64, 2).is_err());
    }
}
