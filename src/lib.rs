//! Voronoi fracturing of closed triangle meshes
//!
//! A standalone library that breaks a closed mesh into convex-cell
//! fragments, suitable for use with any game engine (Bevy, Godot, etc.)
//!
//! # Quick Start
//!
//! ```rust
//! use voronoi_shatter::*;
//!
//! // Describe the fracture
//! let config = GeneratorConfigBuilder::new()
//!     .seed(42)
//!     .num_samples(12).unwrap()
//!     .build().unwrap();
//!
//! // Shatter a unit cube placed in the world
//! let source = SourceMesh::new(TriMesh::cuboid(Vec3::splat(0.5)), SourceHandle(1))
//!     .with_transform(Affine3A::from_translation(Vec3::new(0.0, 2.0, 0.0)));
//! let shatter = VoronoiGenerator::new().shatter(&source, &config).unwrap();
//!
//! for fragment in shatter.fragments() {
//!     println!("fragment {} at {} with {} triangles",
//!         fragment.seed_index, fragment.position, fragment.mesh.triangle_count());
//! }
//! assert!((shatter.total_volume() - 1.0).abs() < 0.01);
//! ```
//!
//! # Pipeline
//!
//! 1. [`SampleGenerator`] draws seeds inside the source bounds, thinned by a
//!    [`DensityField`]
//! 2. [`VoronoiPartitioner`] builds one bounded convex [`Cell`] per seed
//! 3. [`MeshClipper`] intersects the source with every cell and caps the cuts
//! 4. [`FragmentAssembler`] turns clip results into [`Fragment`]s
//!
//! [`VoronoiGenerator`] runs all four and returns a [`Shatter`].
//!
//! # Features
//!
//! - `spatial-index` (default): Enables O(log n) point-to-fragment lookups using KD-tree,
//!   and KD-tree neighbor search while partitioning
//! - `parallel` (default): Partitions and clips cells on the rayon thread pool
//! - `serde`: Enables serialization support for configuration, meshes and fragments

// Modules
pub mod error;
pub mod config;
pub mod cancel;
pub mod cell;
pub mod density;
pub mod generation;
pub mod clip;
pub mod fragment;
pub mod shatter;
pub mod mesh;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{ShatterError, Result};
pub use config::{ClipOptions, GeneratorConfig, GeneratorConfigBuilder};
pub use cancel::CancelToken;
pub use cell::{Cell, CellPlane, HalfSpace, PlaneSource};
pub use density::{DensityField, NoiseDensity, UniformDensity, VolumeTexture};
pub use generation::{relax_seeds, RelaxOptions, SampleGenerator, SeedPoint, VoronoiPartitioner};
pub use clip::MeshClipper;
pub use fragment::{Assembly, ClipOutcome, DroppedCell, Fragment, FragmentAssembler};
pub use shatter::{Shatter, Stage, VoronoiGenerator};
pub use mesh::{Bounds, EdgeReport, SourceHandle, SourceMesh, TriMesh};

#[cfg(feature = "spatial-index")]
pub use spatial::SpatialIndex;

// Re-export glam types used in the public API
pub use glam::{Affine3A, DVec3, Vec3};
