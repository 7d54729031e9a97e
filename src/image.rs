use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use thiserror::Error;

use crate::geometry::ImageGeometry;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error(
        "Pixel data shape {data_shape:?} does not match the geometry size {size:?} plus a trailing component axis."
    )]
    ShapeMismatch {
        data_shape: Vec<usize>,
        size: Vec<usize>,
    },

    #[error("At least one scalar channel is required to assemble a vector image.")]
    NoChannels,

    #[error(
        "Scalar channel {channel} has shape {found:?}, expected the geometry size {expected:?}."
    )]
    ChannelShapeMismatch {
        channel: usize,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

/// An N-dimensional image of fixed-length value vectors.
///
/// Storage is a single `ArrayD<f64>` whose shape is the grid size followed
/// by one trailing component axis, paired with the physical geometry of the
/// grid.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorImage {
    geometry: ImageGeometry,
    data: ArrayD<f64>,
}

impl VectorImage {
    /// Zero-filled image with `components` values per pixel.
    pub fn zeros(geometry: ImageGeometry, components: usize) -> Self {
        let mut shape = geometry.size().to_vec();
        shape.push(components);
        Self {
            geometry,
            data: ArrayD::zeros(IxDyn(&shape)),
        }
    }

    pub fn from_data(geometry: ImageGeometry, data: ArrayD<f64>) -> Result<Self, ImageError> {
        let expected_ndim = geometry.ndim() + 1;
        if data.ndim() != expected_ndim || data.shape()[..geometry.ndim()] != *geometry.size() {
            return Err(ImageError::ShapeMismatch {
                data_shape: data.shape().to_vec(),
                size: geometry.size().to_vec(),
            });
        }
        Ok(Self { geometry, data })
    }

    /// Stack scalar images into one vector image, channel `c` becoming
    /// component `c` of every pixel.
    pub fn from_scalar_channels(
        geometry: ImageGeometry,
        channels: &[ArrayD<f64>],
    ) -> Result<Self, ImageError> {
        if channels.is_empty() {
            return Err(ImageError::NoChannels);
        }
        for (channel, data) in channels.iter().enumerate() {
            if data.shape() != geometry.size() {
                return Err(ImageError::ChannelShapeMismatch {
                    channel,
                    expected: geometry.size().to_vec(),
                    found: data.shape().to_vec(),
                });
            }
        }
        let mut image = Self::zeros(geometry, channels.len());
        let component_axis = Axis(image.geometry.ndim());
        for (channel, data) in channels.iter().enumerate() {
            image
                .data
                .index_axis_mut(component_axis, channel)
                .assign(data);
        }
        Ok(image)
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn components(&self) -> usize {
        *self.data.shape().last().unwrap_or(&0)
    }

    pub fn data(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    pub fn value(&self, index: &[usize], component: usize) -> f64 {
        let mut ix = index.to_vec();
        ix.push(component);
        self.data[IxDyn(&ix)]
    }

    pub fn set_value(&mut self, index: &[usize], component: usize, value: f64) {
        let mut ix = index.to_vec();
        ix.push(component);
        self.data[IxDyn(&ix)] = value;
    }

    /// The full value vector at a pixel.
    pub fn pixel(&self, index: &[usize]) -> Vec<f64> {
        (0..self.components())
            .map(|c| self.value(index, c))
            .collect()
    }
}

/// A dense gradient field: one N-component derivative vector per pixel,
/// with the same grid geometry as the image it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    geometry: ImageGeometry,
    data: ArrayD<f64>,
}

impl GradientField {
    pub fn zeros(geometry: ImageGeometry) -> Self {
        let mut shape = geometry.size().to_vec();
        shape.push(geometry.ndim());
        Self {
            data: ArrayD::zeros(IxDyn(&shape)),
            geometry,
        }
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn data(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    /// Derivative along `axis` at a pixel.
    pub fn component(&self, index: &[usize], axis: usize) -> f64 {
        let mut ix = index.to_vec();
        ix.push(axis);
        self.data[IxDyn(&ix)]
    }

    pub fn vector(&self, index: &[usize]) -> Vec<f64> {
        (0..self.geometry.ndim())
            .map(|axis| self.component(index, axis))
            .collect()
    }

    pub fn set_vector(&mut self, index: &[usize], gradient: &[f64]) {
        debug_assert_eq!(gradient.len(), self.geometry.ndim());
        let mut ix = index.to_vec();
        ix.push(0);
        let last = ix.len() - 1;
        for (axis, &g) in gradient.iter().enumerate() {
            ix[last] = axis;
            self.data[IxDyn(&ix)] = g;
        }
    }

    /// Per-pixel Euclidean norm of the gradient vector.
    pub fn magnitude(&self) -> ArrayD<f64> {
        self.data
            .map_axis(Axis(self.geometry.ndim()), |v| {
                v.iter().map(|g| g * g).sum::<f64>().sqrt()
            })
    }
}
