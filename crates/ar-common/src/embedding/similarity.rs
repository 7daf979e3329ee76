use super::EncodingError;

/// 内積。単位ベクトル同士ならコサイン類似度（-1.0〜1.0）と一致する。
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2正規化（in place）
pub fn l2_normalize(vector: &mut [f32]) -> Result<(), EncodingError> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(EncodingError::ZeroNorm);
    }

    for v in vector.iter_mut() {
        *v /= norm;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_product_of_identical_unit_vectors_is_one() {
        let a = vec![0.6, 0.8];

        let sim = inner_product(&a, &a);

        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn inner_product_of_opposite_vectors_is_negative() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];

        assert_eq!(inner_product(&a, &b), -1.0);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];

        l2_normalize(&mut v).unwrap();

        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_rejects_zero_vectors() {
        let mut v = vec![0.0, 0.0];

        assert_eq!(l2_normalize(&mut v), Err(EncodingError::ZeroNorm));
    }
}
