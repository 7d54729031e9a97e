//! Multilevel B-spline scattered-data approximation.
//!
//! The fit is the local accumulation scheme of Lee-style multilevel
//! B-spline approximation: each sample distributes a candidate coefficient
//! to the control points supporting it, weighted by the squared basis
//! weight, and each refinement level re-fits the residual of the levels
//! before it on a span grid of doubled resolution.

use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ConfigError, SplineConfig, nominal_intervals};
use crate::geometry::ImageGeometry;
use crate::image::VectorImage;
use crate::kernel::span_weights;
use crate::lattice::{ControlPointLattice, LatticeLevel, for_each_offset};
use crate::region::Region;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Cannot fit a lattice to an empty sample set.")]
    EmptySamples,

    #[error("Sample {sample} has {found} value components, expected {expected}.")]
    ComponentMismatch {
        sample: usize,
        expected: usize,
        found: usize,
    },

    #[error("Sample {sample} has {found} coordinates, expected {expected}.")]
    PointDimensionMismatch {
        sample: usize,
        expected: usize,
        found: usize,
    },

    #[error(
        "Axis {axis} has {count} top-level control points but a spline of order {order} needs at least {required}. Choose a smaller spacing ratio, fewer levels, or an explicit count."
    )]
    TooFewControlPoints {
        axis: usize,
        count: usize,
        order: usize,
        required: usize,
    },

    #[error("Axis {axis} has size {size}; the parametric domain needs at least 2 pixels per axis.")]
    DegenerateAxis { axis: usize, size: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// One scatter sample: a physical coordinate and its value vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterSample {
    pub point: Vec<f64>,
    pub value: Vec<f64>,
}

/// Convert an image into scatter samples, one per pixel, with the pixel's
/// physical point as the coordinate and its value vector as the data.
pub fn scatter_points(image: &VectorImage) -> Vec<ScatterSample> {
    let geometry = image.geometry();
    Region::from_size(geometry.size())
        .indices()
        .map(|index| ScatterSample {
            point: geometry.index_to_point(&index),
            value: image.pixel(&index),
        })
        .collect()
}

/// Fit a hierarchical control-point lattice approximating the samples over
/// the parametric domain described by `geometry`.
pub fn fit_scattered_data(
    samples: &[ScatterSample],
    config: &SplineConfig,
    geometry: &ImageGeometry,
) -> Result<ControlPointLattice, FitError> {
    let ndim = geometry.ndim();
    config.validate(ndim)?;
    if samples.is_empty() {
        return Err(FitError::EmptySamples);
    }
    for (axis, &len) in geometry.size().iter().enumerate() {
        if len < 2 {
            return Err(FitError::DegenerateAxis { axis, size: len });
        }
    }
    let components = samples[0].value.len();
    for (i, sample) in samples.iter().enumerate() {
        if sample.point.len() != ndim {
            return Err(FitError::PointDimensionMismatch {
                sample: i,
                expected: ndim,
                found: sample.point.len(),
            });
        }
        if sample.value.len() != components {
            return Err(FitError::ComponentMismatch {
                sample: i,
                expected: components,
                found: sample.value.len(),
            });
        }
    }

    let control_points = config.resolved_control_points(geometry.size());
    for axis in 0..ndim {
        let order = config.order[axis];
        let required = order + 1;
        if control_points[axis] < required {
            return Err(FitError::TooFewControlPoints {
                axis,
                count: control_points[axis],
                order,
                required,
            });
        }
    }
    log::debug!(
        "fitting lattice: {} samples, {components} components, control points {control_points:?}, levels {:?}",
        samples.len(),
        config.levels
    );

    // Normalized parametric coordinate of every sample, computed once.
    let parametric: Vec<Vec<f64>> = samples
        .iter()
        .map(|sample| {
            let ci = geometry.point_to_continuous_index(&sample.point);
            ci.iter()
                .zip(geometry.size().iter())
                .map(|(&c, &len)| (c / (len - 1) as f64).clamp(0.0, 1.0))
                .collect()
        })
        .collect();

    let base_spans: Vec<usize> = (0..ndim)
        .map(|axis| control_points[axis] - config.order[axis])
        .collect();
    let max_levels = *config.levels.iter().max().unwrap_or(&1);

    let mut residuals: Vec<Vec<f64>> = samples.iter().map(|s| s.value.clone()).collect();
    let mut levels: Vec<LatticeLevel> = Vec::with_capacity(max_levels);
    for level in 1..=max_levels {
        // Axes whose refinement is exhausted stop doubling.
        let spans: Vec<usize> = (0..ndim)
            .map(|axis| base_spans[axis] << (level.min(config.levels[axis]) - 1))
            .collect();
        let fitted = fit_single_level(&parametric, &residuals, &spans, &config.order, components);
        if level < max_levels {
            residuals
                .par_iter_mut()
                .zip(parametric.par_iter())
                .for_each(|(residual, u)| {
                    let mut value = vec![0.0; components];
                    fitted.accumulate_value(&config.order, u, &mut value);
                    for (r, v) in residual.iter_mut().zip(value.iter()) {
                        *r -= v;
                    }
                });
        }
        levels.push(fitted);
    }

    let nominal: Vec<usize> = (0..ndim)
        .map(|axis| nominal_intervals(control_points[axis], config.levels[axis]))
        .collect();
    Ok(ControlPointLattice::new(
        config.order.clone(),
        components,
        geometry.clone(),
        nominal,
        levels,
    ))
}

/// One level of the accumulation fit: for every sample, each supporting
/// control point receives the candidate coefficient `w * v / sum(w^2)`
/// weighted by `w^2`; the final coefficient is the weighted average over
/// all samples touching it.
fn fit_single_level(
    parametric: &[Vec<f64>],
    values: &[Vec<f64>],
    spans: &[usize],
    orders: &[usize],
    components: usize,
) -> LatticeLevel {
    let ndim = spans.len();
    let mut lattice_shape: Vec<usize> = (0..ndim).map(|axis| spans[axis] + orders[axis]).collect();
    let denominator_shape = lattice_shape.clone();
    lattice_shape.push(components);

    let mut numerator = ArrayD::<f64>::zeros(IxDyn(&lattice_shape));
    let mut denominator = ArrayD::<f64>::zeros(IxDyn(&denominator_shape));
    let bounds: Vec<usize> = orders.iter().map(|&o| o + 1).collect();

    for (u, value) in parametric.iter().zip(values.iter()) {
        // Span index and local parameter per axis.
        let mut span_index = Vec::with_capacity(ndim);
        let mut weights = Vec::with_capacity(ndim);
        for axis in 0..ndim {
            let s = u[axis] * spans[axis] as f64;
            let mut i0 = s.floor() as usize;
            if i0 >= spans[axis] {
                i0 = spans[axis] - 1;
            }
            span_index.push(i0);
            weights.push(span_weights(orders[axis], s - i0 as f64));
        }

        let mut total_squared = 0.0;
        for_each_offset(&bounds, |offset| {
            let mut w = 1.0;
            for axis in 0..ndim {
                w *= weights[axis][offset[axis]];
            }
            total_squared += w * w;
        });
        if total_squared <= 0.0 {
            continue;
        }

        let mut node_index = vec![0usize; ndim + 1];
        for_each_offset(&bounds, |offset| {
            let mut w = 1.0;
            for axis in 0..ndim {
                w *= weights[axis][offset[axis]];
                node_index[axis] = span_index[axis] + offset[axis];
            }
            if w == 0.0 {
                return;
            }
            let w2 = w * w;
            denominator[IxDyn(&node_index[..ndim])] += w2;
            for (c, v) in value.iter().enumerate() {
                node_index[ndim] = c;
                // w^2 * (w * v / W): the candidate coefficient this sample
                // would assign, weighted by its own influence.
                numerator[IxDyn(&node_index)] += w2 * (w * v / total_squared);
            }
        });
    }

    let mut coefficients = numerator;
    let mut node_index = vec![0usize; ndim + 1];
    for_each_offset(&denominator_shape, |node| {
        let den = denominator[IxDyn(node)];
        node_index[..ndim].copy_from_slice(node);
        for c in 0..components {
            node_index[ndim] = c;
            if den > f64::EPSILON {
                coefficients[IxDyn(&node_index)] /= den;
            } else {
                // Control point unsupported by any sample.
                coefficients[IxDyn(&node_index)] = 0.0;
            }
        }
    });

    LatticeLevel::new(spans.to_vec(), coefficients)
}
