//! Uniform (cardinal) B-spline kernels of arbitrary order, their
//! derivatives, and the blending weights over one knot span.

/// Centered cardinal B-spline `B_n(x)`, supported on
/// `(-(n+1)/2, (n+1)/2)`, evaluated by the Cox-de Boor recursion
/// `B_n(x) = ((x + h) B_{n-1}(x + 1/2) + (h - x) B_{n-1}(x - 1/2)) / n`
/// with `h = (n + 1) / 2`.
pub fn bspline_kernel(order: usize, x: f64) -> f64 {
    if order == 0 {
        return if (-0.5..0.5).contains(&x) { 1.0 } else { 0.0 };
    }
    let half = (order as f64 + 1.0) / 2.0;
    if x <= -half || x >= half {
        return 0.0;
    }
    ((x + half) * bspline_kernel(order - 1, x + 0.5)
        + (half - x) * bspline_kernel(order - 1, x - 0.5))
        / order as f64
}

/// `d/dx B_n(x) = B_{n-1}(x + 1/2) - B_{n-1}(x - 1/2)`; zero for order 0.
pub fn bspline_kernel_derivative(order: usize, x: f64) -> f64 {
    if order == 0 {
        return 0.0;
    }
    bspline_kernel(order - 1, x + 0.5) - bspline_kernel(order - 1, x - 0.5)
}

/// Blending weights of the `order + 1` control points supporting the local
/// span parameter `t` in `[0, 1)`: weight `m` is
/// `B_order(t + (order - 1)/2 - m)`. The weights sum to one.
pub fn span_weights(order: usize, t: f64) -> Vec<f64> {
    let shift = (order as f64 - 1.0) / 2.0;
    (0..=order)
        .map(|m| bspline_kernel(order, t + shift - m as f64))
        .collect()
}

/// Derivatives of [`span_weights`] with respect to `t`; they sum to zero.
pub fn span_weight_derivatives(order: usize, t: f64) -> Vec<f64> {
    let shift = (order as f64 - 1.0) / 2.0;
    (0..=order)
        .map(|m| bspline_kernel_derivative(order, t + shift - m as f64))
        .collect()
}
