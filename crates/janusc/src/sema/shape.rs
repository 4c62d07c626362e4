//! Tensor shape algebra
//!
//! Pure functions over dimension lists. Broadcasting follows the
//! right-aligned convention: trailing dimensions are compared first, and two
//! dimensions are compatible iff they are equal or either is 1.

use thiserror::Error;

/// Shape-level failures, surfaced as `IncompatibleShapes` diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("incompatible shapes {lhs:?} and {rhs:?}")]
    IncompatibleShapes { lhs: Vec<u64>, rhs: Vec<u64> },

    #[error("tile size must be non-zero in dimension {dim}")]
    ZeroTile { dim: usize },
}

/// Exact shape equality: same rank, same dimensions
pub fn shapes_equal(a: &[u64], b: &[u64]) -> bool {
    a == b
}

/// Whether two shapes broadcast together
pub fn is_broadcastable(a: &[u64], b: &[u64]) -> bool {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .all(|(&x, &y)| x == y || x == 1 || y == 1)
}

/// The shape produced by broadcasting `a` against `b`
pub fn compute_broadcast_shape(a: &[u64], b: &[u64]) -> Result<Vec<u64>, ShapeError> {
    if !is_broadcastable(a, b) {
        return Err(ShapeError::IncompatibleShapes {
            lhs: a.to_vec(),
            rhs: b.to_vec(),
        });
    }

    let rank = a.len().max(b.len());
    let mut out = vec![0u64; rank];
    for i in 0..rank {
        let x = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let y = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        out[rank - 1 - i] = x.max(y);
    }
    Ok(out)
}

/// Per-dimension tiling check: every dimension of `shape` divides evenly
/// into the corresponding tile size. Rank mismatch is simply not divisible;
/// a zero tile is a caller error.
pub fn is_shape_divisible_by(shape: &[u64], tile: &[u64]) -> Result<bool, ShapeError> {
    if let Some(dim) = tile.iter().position(|&t| t == 0) {
        return Err(ShapeError::ZeroTile { dim });
    }
    if shape.len() != tile.len() {
        return Ok(false);
    }
    Ok(shape.iter().zip(tile.iter()).all(|(&s, &t)| s % t == 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn broadcast_with_ones() {
        assert!(is_broadcastable(&[8, 1, 32], &[1, 16, 32]));
        assert_eq!(
            compute_broadcast_shape(&[8, 1, 32], &[1, 16, 32]).unwrap(),
            vec![8, 16, 32]
        );
    }

    #[test]
    fn broadcast_rejects_mismatched_dims() {
        assert!(!is_broadcastable(&[7, 16, 33], &[8, 16, 32]));
        assert_eq!(
            compute_broadcast_shape(&[7, 16, 33], &[8, 16, 32]),
            Err(ShapeError::IncompatibleShapes {
                lhs: vec![7, 16, 33],
                rhs: vec![8, 16, 32],
            })
        );
    }

    #[test]
    fn broadcast_right_aligns_different_ranks() {
        assert!(is_broadcastable(&[16, 32], &[4, 1, 32]));
        assert_eq!(
            compute_broadcast_shape(&[16, 32], &[4, 1, 32]).unwrap(),
            vec![4, 16, 32]
        );
        // scalar against anything
        assert_eq!(
            compute_broadcast_shape(&[], &[3, 5]).unwrap(),
            vec![3, 5]
        );
    }

    #[test]
    fn shape_equality() {
        assert!(shapes_equal(&[2, 3], &[2, 3]));
        assert!(!shapes_equal(&[2, 3], &[3, 2]));
        assert!(!shapes_equal(&[2, 3], &[2, 3, 1]));
    }

    #[test]
    fn tiling_divisibility() {
        assert_eq!(is_shape_divisible_by(&[8, 16], &[4, 4]), Ok(true));
        assert_eq!(is_shape_divisible_by(&[8, 18], &[4, 4]), Ok(false));
        assert_eq!(is_shape_divisible_by(&[8, 16], &[4]), Ok(false));
        assert_eq!(
            is_shape_divisible_by(&[8, 16], &[4, 0]),
            Err(ShapeError::ZeroTile { dim: 1 })
        );
    }
}
