//! 顶点缓冲区抽象
//!
//! 真实的 GPU 缓冲区由宿主提供，只能在渲染线程锁定写入。

use crate::delta::VertexLayout;
use crate::{MorphError, Result};

/// 可锁定写入的顶点缓冲区
pub trait GeometryBuffer: Send {
    fn layout(&self) -> VertexLayout;

    fn vertex_count(&self) -> usize;

    /// 读取当前内容的副本
    fn read(&self) -> Result<Vec<u8>>;

    /// 锁定缓冲区并在回调中写入
    ///
    /// 锁定失败时返回错误，回调不会被调用，缓冲区保持原样。
    fn write(&mut self, f: &mut dyn FnMut(&mut [u8])) -> Result<()>;
}

/// 内存中的顶点缓冲区
#[derive(Clone, Debug)]
pub struct CpuGeometryBuffer {
    layout: VertexLayout,
    vertex_count: usize,
    data: Vec<u8>,
}

impl CpuGeometryBuffer {
    pub fn new(layout: VertexLayout, vertex_count: usize, data: Vec<u8>) -> Result<Self> {
        layout.validate(data.len(), vertex_count)?;
        Ok(Self {
            layout,
            vertex_count,
            data,
        })
    }

    /// 创建全零缓冲区
    pub fn zeroed(layout: VertexLayout, vertex_count: usize) -> Self {
        Self {
            layout,
            vertex_count,
            data: vec![0u8; layout.required_len(vertex_count)],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl GeometryBuffer for CpuGeometryBuffer {
    fn layout(&self) -> VertexLayout {
        self.layout
    }

    fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }

    fn write(&mut self, f: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        if self.data.len() < self.layout.required_len(self.vertex_count) {
            return Err(MorphError::BufferLock("buffer shorter than its layout".to_string()));
        }
        f(&mut self.data);
        Ok(())
    }
}
