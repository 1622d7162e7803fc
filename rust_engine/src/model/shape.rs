//! 形状（子网格）运行时数据
//!
//! 每个形状在注册时保存一份基准快照，之后的每次应用都从基准重新计算：
//! `当前 = 基准 + Σ 权重 * 偏移`。重复应用不会叠加，擦除即写回基准。

use glam::{Vec2, Vec3};

use crate::delta::VertexDeltas;
use crate::strings::FixedStr;
use crate::{MorphError, Result};

use super::{GeometryBuffer, RuntimeVertex};

/// 形状几何数据
pub enum ShapeGeometry {
    /// 静态类型顶点数组（CPU 侧网格）
    Raw(Vec<RuntimeVertex>),
    /// 按布局描述的顶点缓冲区（GPU 侧网格）
    Described(Box<dyn GeometryBuffer>),
}

enum ShapeBaseline {
    Raw(Vec<RuntimeVertex>),
    Bytes(Vec<u8>),
}

/// 网格中的一个具名形状
pub struct TriShape {
    name: FixedStr,
    baseline: ShapeBaseline,
    geometry: ShapeGeometry,
}

impl TriShape {
    /// 从顶点数组创建
    pub fn from_vertices(name: FixedStr, vertices: Vec<RuntimeVertex>) -> Self {
        Self {
            name,
            baseline: ShapeBaseline::Raw(vertices.clone()),
            geometry: ShapeGeometry::Raw(vertices),
        }
    }

    /// 从顶点缓冲区创建，读取当前内容作为基准
    pub fn from_buffer(name: FixedStr, buffer: Box<dyn GeometryBuffer>) -> Result<Self> {
        let snapshot = buffer.read()?;
        buffer.layout().validate(snapshot.len(), buffer.vertex_count())?;
        Ok(Self {
            name,
            baseline: ShapeBaseline::Bytes(snapshot),
            geometry: ShapeGeometry::Described(buffer),
        })
    }

    pub fn name(&self) -> FixedStr {
        self.name
    }

    pub fn vertex_count(&self) -> usize {
        match &self.geometry {
            ShapeGeometry::Raw(v) => v.len(),
            ShapeGeometry::Described(b) => b.vertex_count(),
        }
    }

    /// 从基准重新计算并写入全部偏移
    ///
    /// 缓冲区锁定失败时返回错误，当前内容不变。
    pub fn apply(&mut self, deltas: &[(&VertexDeltas, f32)]) -> Result<()> {
        match (&mut self.geometry, &self.baseline) {
            (ShapeGeometry::Raw(vertices), ShapeBaseline::Raw(base)) => {
                let mut work = base.clone();
                for (delta, weight) in deltas {
                    delta.apply_raw(&mut work, *weight);
                }
                *vertices = work;
                Ok(())
            }
            (ShapeGeometry::Described(buffer), ShapeBaseline::Bytes(base)) => {
                let layout = buffer.layout();
                let count = buffer.vertex_count();
                let mut work = base.clone();
                for (delta, weight) in deltas {
                    delta.apply(&mut work, &layout, count, *weight)?;
                }
                write_all(buffer.as_mut(), &work)
            }
            _ => Err(MorphError::LayoutMismatch(format!(
                "shape {} baseline does not match its geometry",
                self.name
            ))),
        }
    }

    /// 写回基准
    pub fn reset(&mut self) -> Result<()> {
        self.apply(&[])
    }

    /// 当前全部顶点位置
    pub fn positions(&self) -> Result<Vec<Vec3>> {
        match &self.geometry {
            ShapeGeometry::Raw(v) => Ok(v.iter().map(|v| v.position).collect()),
            ShapeGeometry::Described(buffer) => {
                let layout = buffer.layout();
                let data = buffer.read()?;
                Ok((0..buffer.vertex_count())
                    .map(|i| layout.read_position(&data, i).unwrap_or(Vec3::ZERO))
                    .collect())
            }
        }
    }

    /// 当前全部 UV
    pub fn uvs(&self) -> Result<Vec<Vec2>> {
        match &self.geometry {
            ShapeGeometry::Raw(v) => Ok(v.iter().map(|v| v.uv).collect()),
            ShapeGeometry::Described(buffer) => {
                let layout = buffer.layout();
                let data = buffer.read()?;
                Ok((0..buffer.vertex_count())
                    .map(|i| layout.read_uv(&data, i).unwrap_or(Vec2::ZERO))
                    .collect())
            }
        }
    }
}

fn write_all(buffer: &mut dyn GeometryBuffer, work: &[u8]) -> Result<()> {
    let mut mismatch = None;
    buffer.write(&mut |dst: &mut [u8]| {
        if dst.len() == work.len() {
            dst.copy_from_slice(work);
        } else {
            mismatch = Some(dst.len());
        }
    })?;
    match mismatch {
        Some(len) => Err(MorphError::LayoutMismatch(format!(
            "locked buffer holds {} bytes, baseline holds {}",
            len,
            work.len()
        ))),
        None => Ok(()),
    }
}
