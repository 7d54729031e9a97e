use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SPLINE_ORDER: usize = 3;
pub const DEFAULT_NUMBER_OF_LEVELS: usize = 1;
pub const DEFAULT_SPACING_RATIO: f64 = 2.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Axis count mismatch: configuration describes {found} axes for {what} but the image has {expected}."
    )]
    AxisCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Number of levels must be at least 1; axis {axis} has 0 levels.")]
    ZeroLevels { axis: usize },

    #[error(
        "Control-point spacing ratio must be strictly positive and finite; axis {axis} has ratio {value}."
    )]
    InvalidSpacingRatio { axis: usize, value: f64 },

    #[error("Explicit control-point count must be positive; axis {axis} has count 0.")]
    ZeroControlPoints { axis: usize },
}

/// Per-axis B-spline fitting parameters.
///
/// `control_points` is the *top-level* count; when `None`, it is derived
/// from the image size via [`control_point_count`]. The invariant that the
/// top-level count is at least `order + 1` is a precondition of the fitter,
/// not repaired here (see [`control_point_count`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplineConfig {
    pub order: Vec<usize>,
    pub levels: Vec<usize>,
    pub spacing_ratio: Vec<f64>,
    #[serde(default)]
    pub control_points: Option<Vec<usize>>,
}

impl SplineConfig {
    /// Defaults on every axis: order 3, one level, ratio 2.0, derived counts.
    pub fn uniform(ndim: usize) -> Self {
        Self {
            order: vec![DEFAULT_SPLINE_ORDER; ndim],
            levels: vec![DEFAULT_NUMBER_OF_LEVELS; ndim],
            spacing_ratio: vec![DEFAULT_SPACING_RATIO; ndim],
            control_points: None,
        }
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = vec![order; self.order.len()];
        self
    }

    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = vec![levels; self.levels.len()];
        self
    }

    pub fn with_spacing_ratio(mut self, ratio: f64) -> Self {
        self.spacing_ratio = vec![ratio; self.spacing_ratio.len()];
        self
    }

    /// Fix the top-level control-point count explicitly, bypassing the
    /// spacing-ratio policy.
    pub fn with_control_points(mut self, count: usize) -> Self {
        self.control_points = Some(vec![count; self.order.len()]);
        self
    }

    pub fn with_control_points_per_axis(mut self, counts: Vec<usize>) -> Self {
        self.control_points = Some(counts);
        self
    }

    pub fn ndim(&self) -> usize {
        self.order.len()
    }

    pub fn validate(&self, ndim: usize) -> Result<(), ConfigError> {
        if self.order.len() != ndim {
            return Err(ConfigError::AxisCountMismatch {
                what: "spline order",
                expected: ndim,
                found: self.order.len(),
            });
        }
        if self.levels.len() != ndim {
            return Err(ConfigError::AxisCountMismatch {
                what: "number of levels",
                expected: ndim,
                found: self.levels.len(),
            });
        }
        if self.spacing_ratio.len() != ndim {
            return Err(ConfigError::AxisCountMismatch {
                what: "spacing ratio",
                expected: ndim,
                found: self.spacing_ratio.len(),
            });
        }
        for (axis, &l) in self.levels.iter().enumerate() {
            if l == 0 {
                return Err(ConfigError::ZeroLevels { axis });
            }
        }
        for (axis, &r) in self.spacing_ratio.iter().enumerate() {
            if !(r.is_finite() && r > 0.0) {
                return Err(ConfigError::InvalidSpacingRatio { axis, value: r });
            }
        }
        if let Some(counts) = &self.control_points {
            if counts.len() != ndim {
                return Err(ConfigError::AxisCountMismatch {
                    what: "control-point counts",
                    expected: ndim,
                    found: counts.len(),
                });
            }
            for (axis, &c) in counts.iter().enumerate() {
                if c == 0 {
                    return Err(ConfigError::ZeroControlPoints { axis });
                }
            }
        }
        Ok(())
    }

    /// Per-axis top-level control-point counts: the explicit counts when
    /// set, otherwise the spacing-ratio policy applied to `size`.
    pub fn resolved_control_points(&self, size: &[usize]) -> Vec<usize> {
        match &self.control_points {
            Some(counts) => counts.clone(),
            None => (0..size.len())
                .map(|i| control_point_count(size[i], self.spacing_ratio[i], self.levels[i]))
                .collect(),
        }
    }

    /// Per-axis nominal interval counts of the finest conceptual grid,
    /// `ncp * 2^(levels-1) - 1` (see [`nominal_intervals`]).
    pub fn resolved_nominal_intervals(&self, size: &[usize]) -> Vec<usize> {
        let counts = self.resolved_control_points(size);
        (0..size.len())
            .map(|i| nominal_intervals(counts[i], self.levels[i]))
            .collect()
    }
}

/// Control-point policy: `floor(size / (ratio * 2^(levels-1)))`.
///
/// Pure arithmetic, no clamping. The result is only a legal top-level count
/// when it is at least `order + 1`; choosing a ratio/levels combination
/// that keeps it legal is the caller's responsibility, and the fitter
/// rejects illegal counts. A degenerate `size` of 0 yields a count of 0,
/// which the fitter likewise rejects.
pub fn control_point_count(size: usize, ratio: f64, levels: usize) -> usize {
    let refinement = (1u64 << (levels.saturating_sub(1))) as f64;
    (size as f64 / (ratio * refinement)).floor() as usize
}

/// Interval count of the nominal finest-level control grid: the top-level
/// count doubled once per refinement level, minus one.
pub fn nominal_intervals(control_points: usize, levels: usize) -> usize {
    (control_points << (levels.saturating_sub(1))).saturating_sub(1)
}

/// Effective control-point spacing:
/// `(size - 1) * pixel_spacing / (ncp * 2^(levels-1) - 1)`.
///
/// Converts a unit change of the lattice's nominal grid coordinate into
/// physical distance. Recomputed per call; never cached across executions.
pub fn control_point_spacing(
    size: usize,
    pixel_spacing: f64,
    control_points: usize,
    levels: usize,
) -> f64 {
    (size.saturating_sub(1)) as f64 * pixel_spacing
        / nominal_intervals(control_points, levels) as f64
}
