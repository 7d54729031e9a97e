//! N-dimensional index regions, row-major iteration, and the boundary
//! face decomposition used by the gradient evaluators.

/// A rectangular block of pixel indices: a start index and a per-axis size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub index: Vec<usize>,
    pub size: Vec<usize>,
}

impl Region {
    pub fn from_size(size: &[usize]) -> Self {
        Self {
            index: vec![0; size.len()],
            size: size.to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.size.len()
    }

    pub fn num_pixels(&self) -> usize {
        self.size.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size.iter().any(|&s| s == 0)
    }

    pub fn contains(&self, index: &[usize]) -> bool {
        index.len() == self.ndim()
            && index
                .iter()
                .zip(self.index.iter().zip(self.size.iter()))
                .all(|(&i, (&start, &len))| i >= start && i < start + len)
    }

    /// Row-major iteration (last axis fastest), matching the memory order
    /// of the image arrays.
    pub fn indices(&self) -> RegionIndices {
        RegionIndices {
            region: self.clone(),
            next: if self.is_empty() {
                None
            } else {
                Some(self.index.clone())
            },
        }
    }
}

pub struct RegionIndices {
    region: Region,
    next: Option<Vec<usize>>,
}

impl Iterator for RegionIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.clone()?;
        let mut following = current.clone();
        let mut axis = self.region.ndim();
        loop {
            if axis == 0 {
                self.next = None;
                break;
            }
            axis -= 1;
            following[axis] += 1;
            if following[axis] < self.region.index[axis] + self.region.size[axis] {
                self.next = Some(following);
                break;
            }
            following[axis] = self.region.index[axis];
        }
        Some(current)
    }
}

/// A region split into an interior block and the boundary slabs around it.
///
/// The faces are pairwise disjoint and, together with the interior, cover
/// the original region exactly. `interior` is `None` when the region is too
/// thin on some axis to leave anything strictly inside.
#[derive(Debug, Clone)]
pub struct FaceDecomposition {
    pub interior: Option<Region>,
    pub boundary: Vec<Region>,
}

/// Split `region` into an interior shrunk by `radius` pixels on every side
/// and a list of boundary faces of thickness `radius`.
///
/// Axis by axis: peel a low slab and a high slab off the remaining block,
/// then shrink the block along that axis. Peeling from an already-shrunk
/// block keeps the faces disjoint.
pub fn decompose_with_boundary(region: &Region, radius: usize) -> FaceDecomposition {
    let mut inner = region.clone();
    let mut boundary = Vec::new();
    if region.is_empty() {
        return FaceDecomposition {
            interior: None,
            boundary,
        };
    }
    for axis in 0..region.ndim() {
        let len = inner.size[axis];
        if len <= 2 * radius {
            // Nothing strictly interior along this axis; the whole
            // remaining block is boundary.
            boundary.push(inner);
            return FaceDecomposition {
                interior: None,
                boundary,
            };
        }
        let mut low = inner.clone();
        low.size[axis] = radius;
        boundary.push(low);

        let mut high = inner.clone();
        high.index[axis] = inner.index[axis] + len - radius;
        high.size[axis] = radius;
        boundary.push(high);

        inner.index[axis] += radius;
        inner.size[axis] = len - 2 * radius;
    }
    FaceDecomposition {
        interior: Some(inner),
        boundary,
    }
}

/// Move an index one pixel inward on every axis where it touches the
/// domain edge: 0 becomes 1 and `size-1` becomes `size-2`. Axes away from
/// the edge are untouched, as are axes of extent 1 (there is no interior
/// to move into).
///
/// The fitted-surface gradient is distorted exactly at the parametric
/// domain edge, so boundary pixels are *sampled* one pixel inward while
/// the output is still written at the original index.
pub fn clamp_to_interior(index: &[usize], size: &[usize]) -> Vec<usize> {
    debug_assert_eq!(index.len(), size.len());
    index
        .iter()
        .zip(size.iter())
        .map(|(&i, &len)| {
            if len < 2 {
                i
            } else if i == 0 {
                1
            } else if i == len - 1 {
                len - 2
            } else {
                i
            }
        })
        .collect()
}
