//! 角色网格运行时数据

mod buffer;
mod shape;

pub use buffer::{CpuGeometryBuffer, GeometryBuffer};
pub use shape::{ShapeGeometry, TriShape};

use std::sync::Arc;

use glam::{Vec2, Vec3};
use parking_lot::Mutex;

use crate::strings::FixedStr;

/// 运行时顶点数据
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RuntimeVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// 角色的根网格节点
///
/// 每个形状各自加锁，不同形状的写入互不阻塞。
#[derive(Default, Clone)]
pub struct MeshNode {
    shapes: Vec<Arc<Mutex<TriShape>>>,
}

impl MeshNode {
    pub fn new(shapes: Vec<TriShape>) -> Self {
        Self {
            shapes: shapes.into_iter().map(|s| Arc::new(Mutex::new(s))).collect(),
        }
    }

    /// 返回追加了一个形状的新节点，已有形状共享
    pub fn with_shape(&self, shape: TriShape) -> Self {
        let mut shapes = self.shapes.clone();
        shapes.retain(|s| s.lock().name() != shape.name());
        shapes.push(Arc::new(Mutex::new(shape)));
        Self { shapes }
    }

    pub fn shapes(&self) -> &[Arc<Mutex<TriShape>>] {
        &self.shapes
    }

    /// 获取形状数量
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// 通过名称查找形状
    pub fn find_shape(&self, name: FixedStr) -> Option<Arc<Mutex<TriShape>>> {
        self.shapes.iter().find(|s| s.lock().name() == name).cloned()
    }
}
