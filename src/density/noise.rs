//! Seeded gradient noise density
//!
//! Improved-Perlin style gradient noise over a permutation table shuffled
//! from the seed, layered as fractal Brownian motion. Useful for clustered,
//! organic-looking fragment size variation without authoring a texture.

use glam::Vec3;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::DensityField;

/// Gradient noise fBm mapped to `[0, 1]`
///
/// # Example
///
/// ```
/// use voronoi_shatter::*;
///
/// let noise = NoiseDensity::new(7).with_frequency(3.0);
/// let value = noise.sample(Vec3::new(0.2, 0.4, 0.6));
/// assert!((0.0..=1.0).contains(&value));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "NoiseParams", into = "NoiseParams"))]
#[derive(Debug, Clone)]
pub struct NoiseDensity {
    seed: u64,
    /// Base frequency over the unit cube (lower = larger clusters)
    pub frequency: f32,
    /// Number of fBm octaves
    pub octaves: usize,
    /// Amplitude decay per octave
    pub persistence: f32,
    /// Frequency multiplier per octave
    pub lacunarity: f32,
    /// Built from `seed`, so it never takes part in comparisons
    perm: Box<[u8; 512]>,
}

impl PartialEq for NoiseDensity {
    fn eq(&self, other: &Self) -> bool {
        self.seed == other.seed
            && self.frequency == other.frequency
            && self.octaves == other.octaves
            && self.persistence == other.persistence
            && self.lacunarity == other.lacunarity
    }
}

/// Serialized form of a [`NoiseDensity`], without the permutation table
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct NoiseParams {
    seed: u64,
    frequency: f32,
    octaves: usize,
    persistence: f32,
    lacunarity: f32,
}

#[cfg(feature = "serde")]
impl From<NoiseParams> for NoiseDensity {
    fn from(params: NoiseParams) -> Self {
        NoiseDensity::new(params.seed)
            .with_frequency(params.frequency)
            .with_octaves(params.octaves)
            .with_falloff(params.persistence, params.lacunarity)
    }
}

#[cfg(feature = "serde")]
impl From<NoiseDensity> for NoiseParams {
    fn from(noise: NoiseDensity) -> Self {
        Self {
            seed: noise.seed,
            frequency: noise.frequency,
            octaves: noise.octaves,
            persistence: noise.persistence,
            lacunarity: noise.lacunarity,
        }
    }
}

impl NoiseDensity {
    /// Noise with frequency 4, 3 octaves, persistence 0.5, lacunarity 2
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            frequency: 4.0,
            octaves: 3,
            persistence: 0.5,
            lacunarity: 2.0,
            perm: permutation(seed),
        }
    }

    /// Seed the permutation table was shuffled with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Set the base frequency
    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the number of octaves (at least 1)
    pub fn with_octaves(mut self, octaves: usize) -> Self {
        self.octaves = octaves.max(1);
        self
    }

    /// Set persistence and lacunarity
    pub fn with_falloff(mut self, persistence: f32, lacunarity: f32) -> Self {
        self.persistence = persistence;
        self.lacunarity = lacunarity;
        self
    }

    /// Raw fBm value, roughly in `[-1, 1]`
    pub fn fbm(&self, position: Vec3) -> f32 {
        let perm: &[u8; 512] = &self.perm;
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_value = 0.0;
        for _ in 0..self.octaves.max(1) {
            total += noise_with(perm, position * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }
        if max_value > 0.0 {
            total / max_value
        } else {
            0.0
        }
    }
}

impl DensityField for NoiseDensity {
    fn sample(&self, uvw: Vec3) -> f32 {
        (0.5 + 0.5 * self.fbm(uvw)).clamp(0.0, 1.0)
    }
}

/// Single octave of gradient noise at `position` for `seed`, in `[-1, 1]`
pub fn gradient_noise(position: Vec3, seed: u64) -> f32 {
    noise_with(&permutation(seed), position)
}

/// 0..256 shuffled by ChaCha8 and doubled to avoid index wrapping
fn permutation(seed: u64) -> Box<[u8; 512]> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut base: Vec<u8> = (0..=255).collect();
    base.shuffle(&mut rng);

    let mut table = Box::new([0u8; 512]);
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = base[i & 255];
    }
    table
}

/// Dot product of `(x, y, z)` with one of the 12 cube edge gradients
#[inline]
fn gradient(hash: u8, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

/// Quintic fade 6t^5 - 15t^4 + 10t^3
#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

fn noise_with(perm: &[u8; 512], position: Vec3) -> f32 {
    let floor = position.floor();
    let cell = |v: f32| (v as i64).rem_euclid(256) as usize;
    let (xi, yi, zi) = (cell(floor.x), cell(floor.y), cell(floor.z));
    let Vec3 { x, y, z } = position - floor;
    let (u, v, w) = (fade(x), fade(y), fade(z));

    let p = |i: usize| perm[i] as usize;
    let a = p(xi) + yi;
    let aa = p(a) + zi;
    let ab = p(a + 1) + zi;
    let b = p(xi + 1) + yi;
    let ba = p(b) + zi;
    let bb = p(b + 1) + zi;

    let g = |i: usize, dx: f32, dy: f32, dz: f32| gradient(perm[i], dx, dy, dz);

    let x00 = lerp(g(aa, x, y, z), g(ba, x - 1.0, y, z), u);
    let x10 = lerp(g(ab, x, y - 1.0, z), g(bb, x - 1.0, y - 1.0, z), u);
    let x01 = lerp(g(aa + 1, x, y, z - 1.0), g(ba + 1, x - 1.0, y, z - 1.0), u);
    let x11 = lerp(g(ab + 1, x, y - 1.0, z - 1.0), g(bb + 1, x - 1.0, y - 1.0, z - 1.0), u);

    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w).clamp(-1.0, 1.0)
}
