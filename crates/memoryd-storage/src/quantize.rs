use crate::record::QuantizedVector;

/// Symmetric per-vector INT8 quantization: scale = max(|v|) / 127,
/// each component rounded to the nearest representable level. The
/// resulting L2 error versus the original vector is bounded by
/// `scale / 2` per component (spec §3 invariant).
pub fn quantize_int8(values: &[f32]) -> QuantizedVector {
    let max_abs = values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
    if max_abs == 0.0 {
        return QuantizedVector { values: vec![0i8; values.len()], scale: 0.0 };
    }
    let scale = max_abs / i8::MAX as f32;
    let quantized = values
        .iter()
        .map(|v| (v / scale).round().clamp(i8::MIN as f32, i8::MAX as f32) as i8)
        .collect();
    QuantizedVector { values: quantized, scale }
}

pub fn dequantize(vector: &QuantizedVector) -> Vec<f32> {
    vector.values.iter().map(|v| *v as f32 * vector.scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_within_half_a_scale_step() {
        let original = vec![0.9, -0.5, 0.0, 0.33, -1.0];
        let quantized = quantize_int8(&original);
        let dequantized = dequantize(&quantized);
        for (a, b) in original.iter().zip(dequantized.iter()) {
            assert!((a - b).abs() <= quantized.scale / 2.0 + 1e-6);
        }
    }

    #[test]
    fn all_zero_vector_has_zero_scale() {
        let quantized = quantize_int8(&[0.0, 0.0, 0.0]);
        assert_eq!(quantized.scale, 0.0);
        assert_eq!(dequantize(&quantized), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn max_component_maps_to_i8_max() {
        let quantized = quantize_int8(&[2.0, -2.0, 1.0]);
        assert!(quantized.values.contains(&127) || quantized.values.contains(&-127));
    }
}
