//! 把 Morph 数值应用到角色网格

use rayon::prelude::*;

use crate::delta::VertexDeltas;
use crate::model::{MeshNode, TriShape};
use crate::morph::MorphValueMap;

use super::{BodyMorphMap, TriShapeMap};

/// 应用到根节点下的全部形状，返回成功更新的形状数量
///
/// 每个形状写入 `基准 + Σ 有效权重 * 偏移`，`erase` 时写回基准。
/// 单个形状缓冲区锁定失败只跳过该形状。
pub fn apply_morphs(
    shapes: &TriShapeMap,
    values: &MorphValueMap,
    root: &MeshNode,
    erase: bool,
    parallel: bool,
) -> usize {
    let apply_one = |slot: &parking_lot::Mutex<TriShape>| -> usize {
        let mut shape = slot.lock();
        let Some(morphs) = shapes.shape(shape.name()) else {
            return 0;
        };

        let result = if erase {
            shape.reset()
        } else {
            shape.apply(&weighted_deltas(morphs, values))
        };

        match result {
            Ok(()) => 1,
            Err(e) => {
                log::warn!("Failed to apply morphs to shape {}: {}", shape.name(), e);
                0
            }
        }
    };

    if parallel {
        root.shapes().par_iter().map(|s| apply_one(s.as_ref())).sum()
    } else {
        root.shapes().iter().map(|s| apply_one(s.as_ref())).sum()
    }
}

/// 形状上有效权重非零的全部偏移
fn weighted_deltas<'a>(morphs: &'a BodyMorphMap, values: &MorphValueMap) -> Vec<(&'a VertexDeltas, f32)> {
    let mut deltas = Vec::new();
    for (name, pair) in morphs.iter() {
        let weight = values.sum(name);
        if weight == 0.0 {
            continue;
        }
        if let Some(position) = &pair.position {
            deltas.push((position, weight));
        }
        if let Some(uv) = &pair.uv {
            deltas.push((uv, weight));
        }
    }
    deltas
}

/// 角色的 Morph 名称中是否有任意一个在文件中有数据
pub fn has_morphs(shapes: &TriShapeMap, values: &MorphValueMap) -> bool {
    values
        .iter()
        .any(|(name, _)| shapes.iter().any(|(_, morphs)| morphs.get(name).is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::VertexDelta;
    use crate::model::{GeometryBuffer, RuntimeVertex};
    use crate::strings::FixedStr;
    use crate::tri::{parse_tri, TriBuilder};
    use crate::{MorphError, Result};
    use glam::{Vec2, Vec3};

    fn vertices(n: usize) -> Vec<RuntimeVertex> {
        (0..n)
            .map(|i| RuntimeVertex {
                position: Vec3::new(i as f32, 0.0, 0.0),
                normal: Vec3::Z,
                uv: Vec2::ZERO,
            })
            .collect()
    }

    fn torso_file() -> TriShapeMap {
        let bytes = TriBuilder::new()
            .position_morph(
                "Torso",
                "Bust",
                &[VertexDelta {
                    index: 3,
                    delta: Vec3::new(0.0, 0.0, 0.5),
                }],
            )
            .uv_morph("Torso", "Bust", &[(3, Vec2::new(0.5, 0.0))])
            .full_position_morph(
                "Torso",
                "Waist",
                &[VertexDelta {
                    index: 1,
                    delta: Vec3::new(1.0, 0.0, 0.0),
                }],
            )
            .build()
            .unwrap();
        parse_tri(&bytes).unwrap()
    }

    fn values(entries: &[(&str, &str, f32)]) -> MorphValueMap {
        let mut map = MorphValueMap::new();
        for (name, key, value) in entries {
            map.set(FixedStr::new(name), FixedStr::new(key), *value);
        }
        map
    }

    fn position(root: &MeshNode, shape: &str, index: usize) -> Vec3 {
        root.find_shape(FixedStr::new(shape)).unwrap().lock().positions().unwrap()[index]
    }

    #[test]
    fn test_apply_weights_and_erase() {
        let file = torso_file();
        let root = MeshNode::new(vec![TriShape::from_vertices(FixedStr::new("Torso"), vertices(5))]);
        let map = values(&[("Bust", "user", 0.5), ("Bust", "ModX", 0.3)]);

        for parallel in [false, true] {
            assert_eq!(apply_morphs(&file, &map, &root, false, parallel), 1);
            let moved = position(&root, "Torso", 3);
            assert!((moved - Vec3::new(3.0, 0.0, 0.4)).length() < 1e-3);
            // Waist 权重为零，不移动
            assert_eq!(position(&root, "Torso", 1), Vec3::new(1.0, 0.0, 0.0));

            let uv = root.find_shape(FixedStr::new("Torso")).unwrap().lock().uvs().unwrap()[3];
            assert!((uv.x - 0.4).abs() < 1e-3);
        }

        assert_eq!(apply_morphs(&file, &map, &root, true, true), 1);
        assert_eq!(position(&root, "Torso", 3), Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_shapes_without_data_untouched() {
        let file = torso_file();
        let root = MeshNode::new(vec![
            TriShape::from_vertices(FixedStr::new("Torso"), vertices(5)),
            TriShape::from_vertices(FixedStr::new("Hands"), vertices(5)),
        ]);
        let map = values(&[("Waist", "user", 1.0)]);
        assert_eq!(apply_morphs(&file, &map, &root, false, true), 1);
        assert_eq!(position(&root, "Torso", 1), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(position(&root, "Hands", 1), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_out_of_range_index_skipped() {
        let file = torso_file();
        // 只有 2 个顶点，Bust 的索引 3 越界
        let root = MeshNode::new(vec![TriShape::from_vertices(FixedStr::new("Torso"), vertices(2))]);
        let map = values(&[("Bust", "user", 1.0), ("Waist", "user", 1.0)]);
        assert_eq!(apply_morphs(&file, &map, &root, false, false), 1);
        assert_eq!(position(&root, "Torso", 1), Vec3::new(2.0, 0.0, 0.0));
    }

    struct LockedBuffer {
        inner: crate::model::CpuGeometryBuffer,
        locked: bool,
    }

    impl GeometryBuffer for LockedBuffer {
        fn layout(&self) -> crate::delta::VertexLayout {
            self.inner.layout()
        }

        fn vertex_count(&self) -> usize {
            self.inner.vertex_count()
        }

        fn read(&self) -> Result<Vec<u8>> {
            self.inner.read()
        }

        fn write(&mut self, f: &mut dyn FnMut(&mut [u8])) -> Result<()> {
            if self.locked {
                return Err(MorphError::BufferLock("busy".to_string()));
            }
            self.inner.write(f)
        }
    }

    #[test]
    fn test_lock_failure_skips_only_that_shape() {
        let file = torso_file();
        let layout = crate::delta::VertexLayout::full_precision();
        let locked = TriShape::from_buffer(
            FixedStr::new("Torso"),
            Box::new(LockedBuffer {
                inner: crate::model::CpuGeometryBuffer::zeroed(layout, 5),
                locked: true,
            }),
        )
        .unwrap();
        let root = MeshNode::new(vec![locked]);
        let map = values(&[("Bust", "user", 1.0)]);

        assert_eq!(apply_morphs(&file, &map, &root, false, true), 0);
        assert_eq!(position(&root, "Torso", 3), Vec3::ZERO);
    }

    #[test]
    fn test_has_morphs() {
        let file = torso_file();
        assert!(has_morphs(&file, &values(&[("bust", "user", 1.0)])));
        assert!(!has_morphs(&file, &values(&[("Thighs", "user", 1.0)])));
        assert!(!has_morphs(&file, &MorphValueMap::new()));
    }
}
