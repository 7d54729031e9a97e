//! The direct interpolation gradient path: one interpolating spline over
//! the intensities, differentiated at every pixel's continuous index.

use approx::assert_abs_diff_eq;
use bspline_gradient::{
    BSplineInterpolator, ImageGeometry, Region, VectorImage, compute_interpolated_gradient,
};

fn ramp_image(size: usize, slope: f64, spacing: f64) -> VectorImage {
    let geometry = ImageGeometry::new(
        vec![size, size],
        vec![0.0, 0.0],
        vec![spacing, spacing],
        ndarray::Array2::eye(2),
    )
    .unwrap();
    let mut image = VectorImage::zeros(geometry, 1);
    for index in Region::from_size(&[size, size]).indices() {
        image.set_value(&index, 0, slope * index[0] as f64);
    }
    image
}

#[test]
fn output_shape_matches_the_input_grid() {
    let image = ramp_image(12, 1.0, 1.0);
    let field = compute_interpolated_gradient(&image, 3).unwrap();
    assert_eq!(field.geometry().size(), &[12, 12]);
    assert_eq!(field.data().shape(), &[12, 12, 2]);
}

#[test]
fn linear_ramp_derivative_is_exact_away_from_borders() {
    let slope = 1.5;
    let image = ramp_image(16, slope, 1.0);
    let field = compute_interpolated_gradient(&image, 3).unwrap();
    for i in 5..11 {
        for j in 5..11 {
            let g = field.vector(&[i, j]);
            assert_abs_diff_eq!(g[0], slope, epsilon = 1e-3);
            assert_abs_diff_eq!(g[1], 0.0, epsilon = 1e-3);
        }
    }
}

#[test]
fn derivative_is_reported_in_physical_units() {
    // Value slope per index is 1.5; with pixel spacing 0.5 the physical
    // slope is 3.0.
    let image = ramp_image(16, 1.5, 0.5);
    let field = compute_interpolated_gradient(&image, 3).unwrap();
    let g = field.vector(&[8, 8]);
    assert_abs_diff_eq!(g[0], 3.0, epsilon = 1e-2);
}

#[test]
fn quadratic_order_matches_the_analytic_derivative() {
    let size = 20;
    let geometry = ImageGeometry::axis_aligned(vec![size, size]);
    let mut image = VectorImage::zeros(geometry, 1);
    for index in Region::from_size(&[size, size]).indices() {
        let x = index[0] as f64;
        image.set_value(&index, 0, 0.1 * x * x);
    }
    let field = compute_interpolated_gradient(&image, 2).unwrap();
    for i in 6..14 {
        let g = field.vector(&[i, 10]);
        // d/dx of 0.1 x^2 is 0.2 x; quadratic splines reproduce quadratics.
        assert_abs_diff_eq!(g[0], 0.2 * i as f64, epsilon = 1e-2);
    }
}

#[test]
fn interpolator_is_reused_across_evaluations() {
    let image = ramp_image(16, 1.0, 1.0);
    let interpolator = BSplineInterpolator::new(&image, 3).unwrap();
    assert_eq!(interpolator.order(), 3);
    let a = interpolator.evaluate_derivative(&[7.0, 7.0]);
    let b = interpolator.evaluate_derivative(&[7.0, 7.0]);
    assert_eq!(a, b);
    // Evaluation between samples is defined as well.
    let mid = interpolator.evaluate_derivative(&[7.5, 7.25]);
    assert!(mid.iter().all(|g| g.is_finite()));
}
