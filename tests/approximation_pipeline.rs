use bspline_gradient::{
    BSplineApproximationGradient, ImageGeometry, Region, SplineConfig, VectorImage,
    compute_gradient_field,
};
use ndarray::{ArrayD, IxDyn};

fn constant_image(size: usize, value: f64) -> VectorImage {
    let geometry = ImageGeometry::axis_aligned(vec![size, size]);
    let channel = ArrayD::from_elem(IxDyn(&[size, size]), value);
    VectorImage::from_scalar_channels(geometry, &[channel]).unwrap()
}

#[test]
fn sixteen_by_sixteen_derives_eight_control_points_per_axis() {
    // order 3, levels 1, ratio 2.0 on a 16x16 image: floor(16 / 2) = 8.
    let config = SplineConfig::uniform(2);
    assert_eq!(config.resolved_control_points(&[16, 16]), vec![8, 8]);

    let image = constant_image(16, 1.0);
    let mut pipeline = BSplineApproximationGradient::new(config);
    pipeline.set_input(image);
    let outputs = pipeline.update().unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].geometry().size(), &[16, 16]);
}

#[test]
fn outputs_inherit_the_input_geometry() {
    let geometry = ImageGeometry::new(
        vec![16, 16],
        vec![-3.0, 2.0],
        vec![0.5, 0.25],
        ndarray::Array2::eye(2),
    )
    .unwrap();
    let channel = ArrayD::from_elem(IxDyn(&[16, 16]), 4.0);
    let image = VectorImage::from_scalar_channels(geometry.clone(), &[channel]).unwrap();

    let outputs = compute_gradient_field(&image, &SplineConfig::uniform(2)).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].geometry(), &geometry);
}

#[test]
fn three_component_image_produces_three_fields() {
    // Direct-configuration variant: explicit control-point count and three
    // refinement levels.
    let size = 20;
    let geometry = ImageGeometry::axis_aligned(vec![size, size]);
    let mut channels = Vec::new();
    for c in 0..3 {
        let mut channel = ArrayD::zeros(IxDyn(&[size, size]));
        for i in 0..size {
            for j in 0..size {
                channel[[i, j]] = (c + 1) as f64 * (i as f64 - 0.5 * j as f64);
            }
        }
        channels.push(channel);
    }
    let image = VectorImage::from_scalar_channels(geometry, &channels).unwrap();

    let config = SplineConfig::uniform(2)
        .with_control_points(16)
        .with_levels(3);
    let outputs = compute_gradient_field(&image, &config).unwrap();
    assert_eq!(outputs.len(), 3);
    for field in &outputs {
        assert_eq!(field.geometry().size(), &[size, size]);
        // Each pixel carries one derivative per spatial axis.
        assert_eq!(field.data().shape(), &[size, size, 2]);
    }
}

#[test]
fn constant_image_has_nearly_zero_gradient() {
    // 19 pixels put exactly 3 samples in each of the 6 spans, so the
    // interior of the fit is exactly flat.
    let image = constant_image(19, 5.0);
    let outputs = compute_gradient_field(&image, &SplineConfig::uniform(2)).unwrap();
    let field = &outputs[0];

    for index in Region::from_size(&[19, 19]).indices() {
        for g in field.vector(&index) {
            assert!(g.is_finite());
            assert!(g.abs() < 2.0, "gradient {g} at {index:?} is out of tolerance");
        }
    }
    // Central block: only small leakage from the lattice-border
    // coefficients remains.
    for i in 7..12 {
        for j in 7..12 {
            for g in field.vector(&[i, j]) {
                assert!(
                    g.abs() < 0.1,
                    "interior gradient {g} at ({i}, {j}) should nearly vanish"
                );
            }
        }
    }
    // The exact center only touches fully supported coefficients.
    for g in field.vector(&[9, 9]) {
        assert!(g.abs() < 1e-8, "center gradient {g} should vanish");
    }
}

#[test]
fn repeated_updates_are_bit_identical() {
    let mut image = constant_image(16, 0.0);
    for index in Region::from_size(&[16, 16]).indices() {
        let x = index[0] as f64;
        let y = index[1] as f64;
        image.set_value(&index, 0, (0.3 * x).sin() + 0.1 * x * y);
    }
    let mut pipeline = BSplineApproximationGradient::new(SplineConfig::uniform(2));
    pipeline.set_input(image);

    let first = pipeline.update().unwrap();
    let second = pipeline.update().unwrap();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.data(), b.data());
    }
}

#[test]
fn gradient_magnitude_of_a_constant_image_is_small() {
    // Scalar image -> one-component vector image -> gradient -> magnitude,
    // the classic downstream use of the pipeline.
    let image = constant_image(19, 3.0);
    let outputs = compute_gradient_field(&image, &SplineConfig::uniform(2)).unwrap();
    let magnitude = outputs[0].magnitude();
    assert_eq!(magnitude.shape(), &[19, 19]);
    assert!(magnitude[[9, 9]] < 1e-6);
}
