//! Density fields steering where seeds land
//!
//! A density field maps normalized coordinates inside the source bounds to
//! an acceptance probability in `[0, 1]`. High density means more seeds and
//! therefore smaller fragments in that region.

mod noise;

pub use noise::{gradient_noise, NoiseDensity};

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShatterError};

/// Trait for sampling seed density inside the source bounds
pub trait DensityField {
    /// Density at normalized coordinates `uvw` in `[0, 1]^3`
    ///
    /// Values outside `[0, 1]` are clamped by the sampler.
    fn sample(&self, uvw: Vec3) -> f32;
}

impl<F> DensityField for F
where
    F: Fn(Vec3) -> f32,
{
    fn sample(&self, uvw: Vec3) -> f32 {
        self(uvw)
    }
}

/// Density 1 everywhere: every candidate becomes a seed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformDensity;

impl DensityField for UniformDensity {
    #[inline]
    fn sample(&self, _uvw: Vec3) -> f32 {
        1.0
    }
}

/// In-memory 3D texture of density values
///
/// Texel `(x, y, z)` covers the normalized box centered at
/// `((x + 0.5) / width, (y + 0.5) / height, (z + 0.5) / depth)`. Sampling is
/// trilinear with clamp-to-edge addressing.
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// // Dense near the floor, sparse near the top
/// let texture = VolumeTexture::from_fn(1, 8, 1, |_, y, _| 1.0 - y as f32 / 7.0);
/// assert!(texture.sample(Vec3::new(0.5, 0.0, 0.5)) > texture.sample(Vec3::new(0.5, 1.0, 0.5)));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "TextureData"))]
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTexture {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<f32>,
}

impl VolumeTexture {
    /// Create a texture from `width * height * depth` values, x fastest
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero dimension, a data length mismatch
    /// or non-finite values.
    pub fn new(width: usize, height: usize, depth: usize, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(ShatterError::InvalidConfig(format!(
                "density texture dimensions must be positive (got {}x{}x{})",
                width, height, depth
            )));
        }
        let expected = width * height * depth;
        if data.len() != expected {
            return Err(ShatterError::InvalidConfig(format!(
                "density texture expects {} values, got {}",
                expected,
                data.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ShatterError::InvalidConfig(
                "density texture contains non-finite values".to_string(),
            ));
        }
        Ok(Self {
            width,
            height,
            depth,
            data,
        })
    }

    /// Create a texture from 8-bit luminance values (0 → 0.0, 255 → 1.0)
    ///
    /// # Errors
    ///
    /// Same as [`VolumeTexture::new`].
    pub fn from_luma8(width: usize, height: usize, depth: usize, data: &[u8]) -> Result<Self> {
        Self::new(width, height, depth, data.iter().map(|&v| f32::from(v) / 255.0).collect())
    }

    /// Create a texture by evaluating `f(x, y, z)` for every texel
    ///
    /// Zero dimensions are raised to 1.
    pub fn from_fn<F>(width: usize, height: usize, depth: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let (width, height, depth) = (width.max(1), height.max(1), depth.max(1));
        let mut data = Vec::with_capacity(width * height * depth);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    data.push(f(x, y, z));
                }
            }
        }
        Self {
            width,
            height,
            depth,
            data,
        }
    }

    /// Texture dimensions `(width, height, depth)`
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    /// Raw texel values, x fastest
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    fn texel(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[(z * self.height + y) * self.width + x]
    }
}

/// Serialized form of a [`VolumeTexture`], checked by [`VolumeTexture::new`]
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct TextureData {
    width: usize,
    height: usize,
    depth: usize,
    data: Vec<f32>,
}

#[cfg(feature = "serde")]
impl TryFrom<TextureData> for VolumeTexture {
    type Error = ShatterError;

    fn try_from(raw: TextureData) -> Result<Self> {
        Self::new(raw.width, raw.height, raw.depth, raw.data)
    }
}

/// Split a normalized coordinate into the two texels around it and the blend weight
#[inline]
fn axis_lookup(coord: f32, size: usize) -> (usize, usize, f32) {
    let t = (coord.clamp(0.0, 1.0) * size as f32 - 0.5).max(0.0);
    let i0 = (t.floor() as usize).min(size - 1);
    let i1 = (i0 + 1).min(size - 1);
    (i0, i1, t - i0 as f32)
}

impl DensityField for VolumeTexture {
    fn sample(&self, uvw: Vec3) -> f32 {
        let (x0, x1, fx) = axis_lookup(uvw.x, self.width);
        let (y0, y1, fy) = axis_lookup(uvw.y, self.height);
        let (z0, z1, fz) = axis_lookup(uvw.z, self.depth);
        let fx = if x0 == x1 { 0.0 } else { fx };
        let fy = if y0 == y1 { 0.0 } else { fy };
        let fz = if z0 == z1 { 0.0 } else { fz };

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let plane = |z: usize| {
            let low = lerp(self.texel(x0, y0, z), self.texel(x1, y0, z), fx);
            let high = lerp(self.texel(x0, y1, z), self.texel(x1, y1, z), fx);
            lerp(low, high, fy)
        };
        lerp(plane(z0), plane(z1), fz)
    }
}
