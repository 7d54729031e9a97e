//! Behavior of the fitted-lattice gradient evaluator on its own, for
//! callers that hold a lattice directly.

use bspline_gradient::{
    ImageGeometry, Region, SplineConfig, VectorImage, compute_fitted_gradient, fit_scattered_data,
    scatter_points,
};
use bspline_gradient::gradient::GradientError;

fn wavy_image(size: usize) -> VectorImage {
    let geometry = ImageGeometry::axis_aligned(vec![size, size]);
    let mut image = VectorImage::zeros(geometry, 1);
    for index in Region::from_size(&[size, size]).indices() {
        let x = index[0] as f64;
        let y = index[1] as f64;
        image.set_value(&index, 0, (0.4 * x).sin() * (0.3 * y).cos());
    }
    image
}

#[test]
fn boundary_pixels_are_sampled_one_pixel_inward() {
    let image = wavy_image(16);
    let config = SplineConfig::uniform(2);
    let samples = scatter_points(&image);
    let lattice = fit_scattered_data(&samples, &config, image.geometry()).unwrap();
    let field = &compute_fitted_gradient(&lattice, &config, image.geometry()).unwrap()[0];

    // A corner pixel clamps both axes, so it must carry exactly the value
    // computed at the diagonal interior neighbor.
    assert_eq!(field.vector(&[0, 0]), field.vector(&[1, 1]));
    assert_eq!(field.vector(&[15, 15]), field.vector(&[14, 14]));
    assert_eq!(field.vector(&[0, 15]), field.vector(&[1, 14]));

    // An edge pixel clamps only the edge axis.
    assert_eq!(field.vector(&[0, 7]), field.vector(&[1, 7]));
    assert_eq!(field.vector(&[7, 15]), field.vector(&[7, 14]));
}

#[test]
fn evaluation_is_idempotent_given_the_same_lattice() {
    let image = wavy_image(16);
    let config = SplineConfig::uniform(2);
    let samples = scatter_points(&image);
    let lattice = fit_scattered_data(&samples, &config, image.geometry()).unwrap();

    let first = compute_fitted_gradient(&lattice, &config, image.geometry()).unwrap();
    let second = compute_fitted_gradient(&lattice, &config, image.geometry()).unwrap();
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.data(), b.data());
    }
}

#[test]
fn mismatched_configuration_is_a_configuration_error() {
    let image = wavy_image(16);
    let config = SplineConfig::uniform(2);
    let samples = scatter_points(&image);
    let lattice = fit_scattered_data(&samples, &config, image.geometry()).unwrap();

    // Evaluating with a different refinement than the lattice was fitted
    // with must fail up front, before any pixel is produced.
    let other = SplineConfig::uniform(2).with_control_points(8).with_levels(2);
    let result = compute_fitted_gradient(&lattice, &other, image.geometry());
    assert!(matches!(
        result,
        Err(GradientError::LatticeConfigMismatch { .. })
    ));
}

#[test]
fn every_component_gets_its_own_field() {
    let size = 16;
    let geometry = ImageGeometry::axis_aligned(vec![size, size]);
    let mut image = VectorImage::zeros(geometry, 2);
    for index in Region::from_size(&[size, size]).indices() {
        image.set_value(&index, 0, index[0] as f64);
        image.set_value(&index, 1, index[1] as f64);
    }
    let config = SplineConfig::uniform(2);
    let samples = scatter_points(&image);
    let lattice = fit_scattered_data(&samples, &config, image.geometry()).unwrap();
    let fields = compute_fitted_gradient(&lattice, &config, image.geometry()).unwrap();

    assert_eq!(fields.len(), 2);
    // Component 0 ramps along axis 0, component 1 along axis 1; the
    // dominant derivative of each field must sit on its own axis.
    let g0 = fields[0].vector(&[8, 8]);
    let g1 = fields[1].vector(&[8, 8]);
    assert!(g0[0].abs() > g0[1].abs());
    assert!(g1[1].abs() > g1[0].abs());
}
