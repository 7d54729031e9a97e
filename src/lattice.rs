//! The hierarchical B-spline control-point lattice produced by the
//! scattered-data fit, and its analytic evaluation.
//!
//! Each refinement level stores its own coefficient grid; evaluation sums
//! the levels. Raw gradients are reported per *nominal control-point
//! interval* (`ncp * 2^(levels-1) - 1` intervals per axis, fixed when the
//! lattice is fitted), which is the convention the effective control-point
//! spacing of the gradient evaluator rescales into physical units.

use ndarray::{Array1, Array2, ArrayD, IxDyn};

use crate::geometry::ImageGeometry;
use crate::kernel::{span_weight_derivatives, span_weights};

/// One refinement level: a coefficient grid of `spans + order` control
/// points per axis, with a trailing component axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeLevel {
    spans: Vec<usize>,
    coefficients: ArrayD<f64>,
}

impl LatticeLevel {
    pub(crate) fn new(spans: Vec<usize>, coefficients: ArrayD<f64>) -> Self {
        Self {
            spans,
            coefficients,
        }
    }

    pub fn spans(&self) -> &[usize] {
        &self.spans
    }

    /// Per-axis span index and local parameter for a normalized parametric
    /// coordinate in `[0, 1]`. Exact domain-edge coordinates are folded
    /// into the last span.
    pub(crate) fn locate(&self, u: &[f64]) -> (Vec<usize>, Vec<f64>) {
        let mut span_index = Vec::with_capacity(u.len());
        let mut local = Vec::with_capacity(u.len());
        for (axis, &coord) in u.iter().enumerate() {
            let spans = self.spans[axis];
            let s = coord.clamp(0.0, 1.0) * spans as f64;
            let mut i0 = s.floor() as usize;
            if i0 >= spans {
                i0 = spans - 1;
            }
            span_index.push(i0);
            local.push(s - i0 as f64);
        }
        (span_index, local)
    }

    /// Value of this level's surface at parametric `u`, accumulated into
    /// `value` (one slot per component).
    pub(crate) fn accumulate_value(&self, orders: &[usize], u: &[f64], value: &mut [f64]) {
        let ndim = self.spans.len();
        let (span_index, local) = self.locate(u);
        let weights: Vec<Vec<f64>> = (0..ndim)
            .map(|axis| span_weights(orders[axis], local[axis]))
            .collect();
        let bounds: Vec<usize> = orders.iter().map(|&o| o + 1).collect();
        let components = value.len();
        let mut coefficient_index = vec![0usize; ndim + 1];
        for_each_offset(&bounds, |offset| {
            let mut w = 1.0;
            for axis in 0..ndim {
                w *= weights[axis][offset[axis]];
                coefficient_index[axis] = span_index[axis] + offset[axis];
            }
            if w == 0.0 {
                return;
            }
            for (c, slot) in value.iter_mut().enumerate().take(components) {
                coefficient_index[ndim] = c;
                *slot += w * self.coefficients[IxDyn(&coefficient_index)];
            }
        });
    }

    /// Gradient of this level's surface at parametric `u`, in span units of
    /// this level, scaled per axis by `scale` and accumulated into the
    /// `components x ndim` matrix `gradient`.
    pub(crate) fn accumulate_gradient(
        &self,
        orders: &[usize],
        u: &[f64],
        scale: &[f64],
        gradient: &mut Array2<f64>,
    ) {
        let ndim = self.spans.len();
        let (span_index, local) = self.locate(u);
        let weights: Vec<Vec<f64>> = (0..ndim)
            .map(|axis| span_weights(orders[axis], local[axis]))
            .collect();
        let derivatives: Vec<Vec<f64>> = (0..ndim)
            .map(|axis| span_weight_derivatives(orders[axis], local[axis]))
            .collect();
        let bounds: Vec<usize> = orders.iter().map(|&o| o + 1).collect();
        let components = gradient.nrows();
        let mut coefficient_index = vec![0usize; ndim + 1];
        for_each_offset(&bounds, |offset| {
            let mut value_weight = 1.0;
            for axis in 0..ndim {
                value_weight *= weights[axis][offset[axis]];
                coefficient_index[axis] = span_index[axis] + offset[axis];
            }
            for j in 0..ndim {
                let wj = weights[j][offset[j]];
                let dj = derivatives[j][offset[j]];
                // Product of the value weights on every axis but j, times
                // the derivative weight on j.
                let dw = if wj != 0.0 {
                    value_weight / wj * dj
                } else {
                    let mut partial = dj;
                    for axis in 0..ndim {
                        if axis != j {
                            partial *= weights[axis][offset[axis]];
                        }
                    }
                    partial
                };
                if dw == 0.0 {
                    continue;
                }
                let scaled = dw * scale[j];
                for c in 0..components {
                    coefficient_index[ndim] = c;
                    gradient[[c, j]] += scaled * self.coefficients[IxDyn(&coefficient_index)];
                }
            }
        });
    }
}

/// The fitted multi-level control-point lattice. Immutable once built;
/// shared read-only across evaluation workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPointLattice {
    orders: Vec<usize>,
    components: usize,
    geometry: ImageGeometry,
    nominal_intervals: Vec<usize>,
    levels: Vec<LatticeLevel>,
}

impl ControlPointLattice {
    pub(crate) fn new(
        orders: Vec<usize>,
        components: usize,
        geometry: ImageGeometry,
        nominal_intervals: Vec<usize>,
        levels: Vec<LatticeLevel>,
    ) -> Self {
        Self {
            orders,
            components,
            geometry,
            nominal_intervals,
            levels,
        }
    }

    pub fn ndim(&self) -> usize {
        self.orders.len()
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn orders(&self) -> &[usize] {
        &self.orders
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[LatticeLevel] {
        &self.levels
    }

    /// Interval count of the nominal finest-level grid per axis; raw
    /// gradients are derivatives with respect to this grid coordinate.
    pub fn nominal_intervals(&self) -> &[usize] {
        &self.nominal_intervals
    }

    /// Normalized parametric coordinate of a physical point: the
    /// continuous index scaled into `[0, 1]` per axis.
    pub fn parametric(&self, point: &[f64]) -> Vec<f64> {
        let ci = self.geometry.point_to_continuous_index(point);
        ci.iter()
            .zip(self.geometry.size().iter())
            .map(|(&c, &len)| c / (len - 1) as f64)
            .collect()
    }

    /// Fitted surface value at a physical point, one entry per component.
    pub fn evaluate(&self, point: &[f64]) -> Array1<f64> {
        let u = self.parametric(point);
        let mut value = vec![0.0; self.components];
        for level in &self.levels {
            level.accumulate_value(&self.orders, &u, &mut value);
        }
        Array1::from_vec(value)
    }

    /// Analytic gradient at a physical point: a `components x ndim` matrix
    /// of derivatives per nominal control-point interval.
    pub fn evaluate_gradient(&self, point: &[f64]) -> Array2<f64> {
        let u = self.parametric(point);
        let ndim = self.ndim();
        let mut gradient = Array2::zeros((self.components, ndim));
        for level in &self.levels {
            // d/d(nominal) = d/d(level span) * spans_level / nominal.
            let scale: Vec<f64> = (0..ndim)
                .map(|j| level.spans[j] as f64 / self.nominal_intervals[j] as f64)
                .collect();
            level.accumulate_gradient(&self.orders, &u, &scale, &mut gradient);
        }
        gradient
    }
}

/// Visit every multi-index in the box `[0, bounds[0]) x ... x [0, bounds[n))`.
pub(crate) fn for_each_offset(bounds: &[usize], mut visit: impl FnMut(&[usize])) {
    let ndim = bounds.len();
    if bounds.iter().any(|&b| b == 0) {
        return;
    }
    let mut offset = vec![0usize; ndim];
    loop {
        visit(&offset);
        let mut axis = ndim;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            offset[axis] += 1;
            if offset[axis] < bounds[axis] {
                break;
            }
            offset[axis] = 0;
        }
    }
}
