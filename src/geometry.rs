use ndarray::Array2;
use thiserror::Error;

/// Errors raised while constructing or applying image geometry.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Image must have at least one axis.")]
    ZeroDimensional,

    #[error(
        "Axis count mismatch: size has {size} axes but {what} has {found}; all geometry vectors must agree."
    )]
    AxisCountMismatch {
        what: &'static str,
        size: usize,
        found: usize,
    },

    #[error("Spacing must be strictly positive and finite; axis {axis} has spacing {value}.")]
    InvalidSpacing { axis: usize, value: f64 },

    #[error("Direction matrix must be {expected}x{expected}, got {rows}x{cols}.")]
    DirectionShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Direction matrix is singular and cannot be inverted.")]
    SingularDirection,
}

/// Physical-space metadata of a regular N-dimensional grid: per-axis size,
/// origin, spacing, and an orientation (direction) matrix.
///
/// The inverse direction matrix is computed once at construction so that
/// physical-point to continuous-index mapping is a cheap linear transform
/// during per-pixel evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry {
    size: Vec<usize>,
    origin: Vec<f64>,
    spacing: Vec<f64>,
    direction: Array2<f64>,
    inverse_direction: Array2<f64>,
}

impl ImageGeometry {
    pub fn new(
        size: Vec<usize>,
        origin: Vec<f64>,
        spacing: Vec<f64>,
        direction: Array2<f64>,
    ) -> Result<Self, GeometryError> {
        let ndim = size.len();
        if ndim == 0 {
            return Err(GeometryError::ZeroDimensional);
        }
        if origin.len() != ndim {
            return Err(GeometryError::AxisCountMismatch {
                what: "origin",
                size: ndim,
                found: origin.len(),
            });
        }
        if spacing.len() != ndim {
            return Err(GeometryError::AxisCountMismatch {
                what: "spacing",
                size: ndim,
                found: spacing.len(),
            });
        }
        for (axis, &s) in spacing.iter().enumerate() {
            if !(s.is_finite() && s > 0.0) {
                return Err(GeometryError::InvalidSpacing { axis, value: s });
            }
        }
        if direction.nrows() != ndim || direction.ncols() != ndim {
            return Err(GeometryError::DirectionShape {
                expected: ndim,
                rows: direction.nrows(),
                cols: direction.ncols(),
            });
        }
        let inverse_direction = invert(&direction).ok_or(GeometryError::SingularDirection)?;
        Ok(Self {
            size,
            origin,
            spacing,
            direction,
            inverse_direction,
        })
    }

    /// Unit spacing, zero origin, identity direction.
    pub fn axis_aligned(size: Vec<usize>) -> Self {
        let ndim = size.len();
        assert!(ndim > 0, "image must have at least one axis");
        Self {
            size,
            origin: vec![0.0; ndim],
            spacing: vec![1.0; ndim],
            direction: Array2::eye(ndim),
            inverse_direction: Array2::eye(ndim),
        }
    }

    pub fn ndim(&self) -> usize {
        self.size.len()
    }

    pub fn size(&self) -> &[usize] {
        &self.size
    }

    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    pub fn spacing(&self) -> &[f64] {
        &self.spacing
    }

    pub fn direction(&self) -> &Array2<f64> {
        &self.direction
    }

    pub fn num_pixels(&self) -> usize {
        self.size.iter().product()
    }

    /// Physical point of an integer pixel index.
    pub fn index_to_point(&self, index: &[usize]) -> Vec<f64> {
        let ci: Vec<f64> = index.iter().map(|&i| i as f64).collect();
        self.continuous_index_to_point(&ci)
    }

    /// Physical point of a continuous (fractional) pixel index:
    /// `p = origin + D * (ci .* spacing)`.
    pub fn continuous_index_to_point(&self, ci: &[f64]) -> Vec<f64> {
        let ndim = self.ndim();
        debug_assert_eq!(ci.len(), ndim);
        let mut point = self.origin.clone();
        for (i, p) in point.iter_mut().enumerate() {
            for j in 0..ndim {
                *p += self.direction[[i, j]] * ci[j] * self.spacing[j];
            }
        }
        point
    }

    /// Continuous pixel index of a physical point:
    /// `ci = (D^-1 * (p - origin)) ./ spacing`.
    pub fn point_to_continuous_index(&self, point: &[f64]) -> Vec<f64> {
        let ndim = self.ndim();
        debug_assert_eq!(point.len(), ndim);
        let mut ci = vec![0.0; ndim];
        for (j, c) in ci.iter_mut().enumerate() {
            for i in 0..ndim {
                *c += self.inverse_direction[[j, i]] * (point[i] - self.origin[i]);
            }
            *c /= self.spacing[j];
        }
        ci
    }
}

/// Gauss-Jordan inverse for the small direction matrices (N is the image
/// dimension, so 2 to 4 in practice). Returns `None` when singular.
fn invert(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut inv = Array2::<f64>::eye(n);
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        let pivot_value = a[[pivot, col]];
        if pivot_value.abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                a.swap([pivot, j], [col, j]);
                inv.swap([pivot, j], [col, j]);
            }
        }
        let scale = 1.0 / a[[col, col]];
        for j in 0..n {
            a[[col, j]] *= scale;
            inv[[col, j]] *= scale;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                let ac = a[[col, j]];
                let ic = inv[[col, j]];
                a[[row, j]] -= factor * ac;
                inv[[row, j]] -= factor * ic;
            }
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn index_point_roundtrip_axis_aligned() {
        let geom = ImageGeometry::new(
            vec![8, 6],
            vec![-2.0, 3.5],
            vec![0.5, 2.0],
            Array2::eye(2),
        )
        .unwrap();
        let p = geom.index_to_point(&[4, 2]);
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 7.5, epsilon = 1e-12);
        let ci = geom.point_to_continuous_index(&p);
        assert_abs_diff_eq!(ci[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ci[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn index_point_roundtrip_rotated_direction() {
        // 90-degree rotation.
        let direction = array![[0.0, -1.0], [1.0, 0.0]];
        let geom =
            ImageGeometry::new(vec![5, 5], vec![1.0, 1.0], vec![1.0, 2.0], direction).unwrap();
        let p = geom.continuous_index_to_point(&[1.5, 2.0]);
        let ci = geom.point_to_continuous_index(&p);
        assert_abs_diff_eq!(ci[0], 1.5, epsilon = 1e-10);
        assert_abs_diff_eq!(ci[1], 2.0, epsilon = 1e-10);
    }

    #[test]
    fn singular_direction_is_rejected() {
        let direction = array![[1.0, 2.0], [2.0, 4.0]];
        let result = ImageGeometry::new(vec![4, 4], vec![0.0; 2], vec![1.0; 2], direction);
        assert!(matches!(result, Err(GeometryError::SingularDirection)));
    }

    #[test]
    fn zero_spacing_is_rejected() {
        let result =
            ImageGeometry::new(vec![4, 4], vec![0.0; 2], vec![1.0, 0.0], Array2::eye(2));
        assert!(matches!(
            result,
            Err(GeometryError::InvalidSpacing { axis: 1, .. })
        ));
    }
}
