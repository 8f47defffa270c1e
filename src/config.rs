//! Fracture configuration and builder
//!
//! This module provides the configuration consumed by a single
//! [`VoronoiGenerator`](crate::VoronoiGenerator) call.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::density::VolumeTexture;
use crate::error::{Result, ShatterError};

/// Upper limit for relaxation iterations accepted by the builder
pub const MAX_RELAX_ITERATIONS: usize = 20;

/// Numerical options for clipping the source mesh against cells
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipOptions {
    /// Plane-side tolerance, as a fraction of the source bounds diagonal
    pub epsilon: f64,
    /// Largest accepted share of boundary or non-manifold edges per fragment
    ///
    /// 0.0 requires every fragment to be closed and manifold.
    pub manifold_tolerance: f64,
    /// Vertex weld distance applied to the source before clipping, as a
    /// fraction of the source bounds diagonal (0.0 disables welding)
    pub weld_epsilon: f32,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            manifold_tolerance: 0.0,
            weld_epsilon: 1e-6,
        }
    }
}

impl ClipOptions {
    fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0 && self.epsilon < 0.1) {
            return Err(ShatterError::InvalidConfig(format!(
                "clip epsilon must be in (0, 0.1) (got {})",
                self.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.manifold_tolerance) {
            return Err(ShatterError::InvalidConfig(format!(
                "manifold tolerance must be in [0, 1] (got {})",
                self.manifold_tolerance
            )));
        }
        if !(self.weld_epsilon.is_finite() && self.weld_epsilon >= 0.0) {
            return Err(ShatterError::InvalidConfig(format!(
                "weld epsilon must be >= 0 (got {})",
                self.weld_epsilon
            )));
        }
        Ok(())
    }
}

/// Configuration for one fracture
///
/// The same configuration applied to the same source always produces the
/// same fragments.
///
/// # Example
///
/// ```rust
/// use voronoi_shatter::*;
///
/// let config = GeneratorConfigBuilder::new()
///     .seed(42)
///     .num_samples(16)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// # #[cfg(feature = "serde")]
/// # {
/// let json = serde_json::to_string(&config).unwrap();
/// let restored: GeneratorConfig = serde_json::from_str(&json).unwrap();
/// assert_eq!(config, restored);
/// # }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Seed for the sampling stream
    pub random_seed: i64,

    /// Number of seed candidates drawn inside the source bounds
    ///
    /// With a density texture fewer seeds may survive. Negative values are
    /// rejected with `InvalidConfig` when generation starts.
    pub num_samples: i32,

    /// Optional density texture over the source bounds
    ///
    /// `None` means uniform density.
    pub density: Option<VolumeTexture>,

    /// Lloyd relaxation iterations applied to the seeds (0 = raw random seeds)
    pub relax_iterations: usize,

    /// Early-exit threshold for relaxation, as a fraction of the bounds diagonal
    pub relax_convergence: f32,

    /// Reject seeds outside the source surface
    ///
    /// Only meaningful for concave sources, where bounding-box seeds in
    /// empty space would be wasted.
    pub interior_only: bool,

    /// Store fragment vertices relative to the fragment position
    pub recenter: bool,

    /// Clipping tolerances
    pub clip: ClipOptions,
}

impl GeneratorConfig {
    /// Check every field
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.num_samples < 0 {
            return Err(ShatterError::InvalidConfig(format!(
                "num_samples must be >= 0 (got {})",
                self.num_samples
            )));
        }
        if self.relax_iterations > MAX_RELAX_ITERATIONS {
            return Err(ShatterError::InvalidConfig(format!(
                "relax iterations must be <= {} (got {})",
                MAX_RELAX_ITERATIONS, self.relax_iterations
            )));
        }
        if !(self.relax_convergence.is_finite() && self.relax_convergence >= 0.0) {
            return Err(ShatterError::InvalidConfig(format!(
                "relax convergence must be >= 0 (got {})",
                self.relax_convergence
            )));
        }
        self.clip.validate()
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            num_samples: 16,
            density: None,
            relax_iterations: 0,
            relax_convergence: 0.001,
            interior_only: false,
            recenter: true,
            clip: ClipOptions::default(),
        }
    }
}

/// Builder for creating GeneratorConfig with validation
///
/// # Example
///
/// ```rust
/// use voronoi_shatter::*;
///
/// let config = GeneratorConfigBuilder::new()
///     .seed(7)
///     .num_samples(32)
///     .unwrap()
///     .relax_iterations(2)
///     .unwrap()
///     .interior_only(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.num_samples, 32);
/// ```
#[derive(Debug, Clone)]
pub struct GeneratorConfigBuilder {
    seed: Option<i64>,
    num_samples: i32,
    density: Option<VolumeTexture>,
    relax_iterations: usize,
    relax_convergence: f32,
    interior_only: bool,
    recenter: bool,
    clip: ClipOptions,
}

impl GeneratorConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - seed: Random (generated from thread_rng)
    /// - num_samples: 16
    /// - density: uniform
    /// - relax_iterations: 0
    /// - relax_convergence: 0.001
    /// - interior_only: false
    /// - recenter: true
    pub fn new() -> Self {
        let defaults = GeneratorConfig::default();
        Self {
            seed: None,
            num_samples: defaults.num_samples,
            density: None,
            relax_iterations: defaults.relax_iterations,
            relax_convergence: defaults.relax_convergence,
            interior_only: defaults.interior_only,
            recenter: defaults.recenter,
            clip: defaults.clip,
        }
    }

    /// Set the random seed
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of seed candidates
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `count` is negative
    pub fn num_samples(mut self, count: i32) -> Result<Self> {
        if count < 0 {
            return Err(ShatterError::InvalidConfig(format!(
                "num_samples must be >= 0 (got {})",
                count
            )));
        }
        self.num_samples = count;
        Ok(self)
    }

    /// Set a density texture steering seed placement
    pub fn density(mut self, texture: VolumeTexture) -> Self {
        self.density = Some(texture);
        self
    }

    /// Set the number of Lloyd relaxation iterations
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if iterations > 20
    pub fn relax_iterations(mut self, iterations: usize) -> Result<Self> {
        if iterations > MAX_RELAX_ITERATIONS {
            return Err(ShatterError::InvalidConfig(format!(
                "relax iterations must be <= {} (got {})",
                MAX_RELAX_ITERATIONS, iterations
            )));
        }
        self.relax_iterations = iterations;
        Ok(self)
    }

    /// Set the relaxation convergence threshold
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if threshold is negative
    pub fn relax_convergence(mut self, threshold: f32) -> Result<Self> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(ShatterError::InvalidConfig(format!(
                "relax convergence must be >= 0 (got {})",
                threshold
            )));
        }
        self.relax_convergence = threshold;
        Ok(self)
    }

    /// Only keep seeds inside the source surface
    pub fn interior_only(mut self, enabled: bool) -> Self {
        self.interior_only = enabled;
        self
    }

    /// Store fragment vertices relative to the fragment position
    pub fn recenter(mut self, enabled: bool) -> Self {
        self.recenter = enabled;
        self
    }

    /// Set the clipping tolerances
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range tolerances
    pub fn clip_options(mut self, options: ClipOptions) -> Result<Self> {
        options.validate()?;
        self.clip = options;
        Ok(self)
    }

    /// Build the configuration
    ///
    /// If no seed was provided, generates a random seed using thread_rng.
    pub fn build(self) -> Result<GeneratorConfig> {
        let config = GeneratorConfig {
            random_seed: self.seed.unwrap_or_else(rand::random),
            num_samples: self.num_samples,
            density: self.density,
            relax_iterations: self.relax_iterations,
            relax_convergence: self.relax_convergence,
            interior_only: self.interior_only,
            recenter: self.recenter,
            clip: self.clip,
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for GeneratorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
