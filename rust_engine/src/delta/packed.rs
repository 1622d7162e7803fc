//! 压缩偏移的编码与解码
//!
//! 位置：分量 = round(值 / multiplier)，multiplier = 最大绝对分量 / 32767，
//! 单分量误差不超过 multiplier / 2。
//! UV：分量以 f16 保存 值 / multiplier，multiplier = 最大绝对分量，
//! 归一化后落在 [-1, 1]，单分量误差不超过 multiplier * 2^-11。

use glam::{Vec2, Vec3};
use half::f16;

use super::{PackedUvData, PackedUvDelta, PackedVertexData, PackedVertexDelta, VertexDelta};

impl PackedVertexData {
    /// 从全精度偏移编码
    pub fn encode(deltas: &[VertexDelta]) -> Self {
        let max_abs = deltas
            .iter()
            .map(|d| d.delta.abs().max_element())
            .fold(0.0f32, f32::max);
        let multiplier = if max_abs > 0.0 { max_abs / i16::MAX as f32 } else { 1.0 };

        let quantize = |v: f32| (v / multiplier).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        let packed = deltas
            .iter()
            .map(|d| PackedVertexDelta {
                index: d.index,
                x: quantize(d.delta.x),
                y: quantize(d.delta.y),
                z: quantize(d.delta.z),
            })
            .collect::<Vec<_>>();

        Self {
            multiplier,
            max_index: deltas.iter().map(|d| d.index as u32).max().unwrap_or(0),
            deltas: packed,
        }
    }

    /// 解码单条偏移
    pub fn decode(&self, delta: &PackedVertexDelta) -> Vec3 {
        Vec3::new(delta.x as f32, delta.y as f32, delta.z as f32) * self.multiplier
    }
}

impl PackedUvData {
    /// 从 (顶点索引, UV 偏移) 编码
    pub fn encode(deltas: &[(u16, Vec2)]) -> Self {
        let max_abs = deltas
            .iter()
            .map(|(_, d)| d.abs().max_element())
            .fold(0.0f32, f32::max);
        let multiplier = if max_abs > 0.0 { max_abs } else { 1.0 };

        let packed = deltas
            .iter()
            .map(|(index, d)| PackedUvDelta {
                index: *index,
                u: f16::from_f32(d.x / multiplier),
                v: f16::from_f32(d.y / multiplier),
            })
            .collect::<Vec<_>>();

        Self {
            multiplier,
            max_index: deltas.iter().map(|(i, _)| *i as u32).max().unwrap_or(0),
            deltas: packed,
        }
    }

    pub fn decode(&self, delta: &PackedUvDelta) -> Vec2 {
        Vec2::new(delta.u.to_f32(), delta.v.to_f32()) * self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_position_within_tolerance() {
        let source = vec![
            VertexDelta { index: 0, delta: Vec3::new(0.5, -0.125, 0.0) },
            VertexDelta { index: 7, delta: Vec3::new(-1.75, 0.3333, 0.01) },
            VertexDelta { index: 42, delta: Vec3::new(0.0001, 1.0, -0.9) },
        ];
        let packed = PackedVertexData::encode(&source);
        assert_eq!(packed.max_index, 42);

        let tolerance = packed.multiplier * 0.5 + 1e-6;
        for (orig, enc) in source.iter().zip(&packed.deltas) {
            assert_eq!(orig.index, enc.index);
            let decoded = packed.decode(enc);
            let err = (decoded - orig.delta).abs().max_element();
            assert!(err <= tolerance, "error {} > {}", err, tolerance);
        }
    }

    #[test]
    fn test_packed_uv_within_half_ulp() {
        let source = vec![(3u16, Vec2::new(0.02, -0.015)), (5u16, Vec2::new(-0.004, 0.0125))];
        let packed = PackedUvData::encode(&source);

        // f16 有 11 位有效精度
        let tolerance = packed.multiplier * 2.0f32.powi(-11) + 1e-7;
        for ((_, orig), enc) in source.iter().zip(&packed.deltas) {
            let decoded = packed.decode(enc);
            assert!((decoded.x - orig.x).abs() <= tolerance);
            assert!((decoded.y - orig.y).abs() <= tolerance);
        }
    }

    #[test]
    fn test_all_zero_deltas() {
        let packed = PackedVertexData::encode(&[VertexDelta { index: 2, delta: Vec3::ZERO }]);
        assert_eq!(packed.multiplier, 1.0);
        assert_eq!(packed.decode(&packed.deltas[0]), Vec3::ZERO);
    }
}
