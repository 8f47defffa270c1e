//! Fragments and their assembly from clip results

use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::error::ShatterError;
use crate::mesh::{SourceHandle, TriMesh};

/// One piece of the fractured source
///
/// `mesh` is closed and outward wound. When recentered (the default) its
/// vertices are relative to `position`, so placing the fragment at
/// `position` reproduces its place in the source.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Index of the seed whose cell produced this fragment
    pub seed_index: usize,
    /// Fragment geometry
    pub mesh: TriMesh,
    /// Volume centroid in world space
    pub position: Vec3,
    /// Source mesh instance the fragment was cut from
    pub source: SourceHandle,
    recentered: bool,
}

impl Fragment {
    /// Enclosed volume of the fragment mesh
    pub fn volume(&self) -> f32 {
        self.mesh.volume()
    }

    /// Check whether mesh vertices are stored relative to `position`
    pub fn is_recentered(&self) -> bool {
        self.recentered
    }

    /// Fragment geometry in world space
    pub fn world_mesh(&self) -> TriMesh {
        if self.recentered {
            self.mesh.translated(self.position)
        } else {
            self.mesh.clone()
        }
    }
}

/// Result of clipping the source against one cell
#[derive(Debug, Clone, PartialEq)]
pub enum ClipOutcome {
    /// Non-empty closed piece in world space
    Clipped(TriMesh),
    /// Cell does not intersect the source
    Empty,
    /// Clipping failed; the cell is dropped
    Failed(ShatterError),
}

impl From<crate::error::Result<TriMesh>> for ClipOutcome {
    fn from(result: crate::error::Result<TriMesh>) -> Self {
        match result {
            Ok(mesh) if mesh.is_empty() => ClipOutcome::Empty,
            Ok(mesh) => ClipOutcome::Clipped(mesh),
            Err(error) => ClipOutcome::Failed(error),
        }
    }
}

/// A cell that produced no fragment because clipping failed
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedCell {
    /// Seed index of the cell
    pub seed_index: usize,
    /// Why it was dropped
    pub error: ShatterError,
}

/// Fragments and diagnostics produced by [`FragmentAssembler::assemble`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    /// Fragments in seed order
    pub fragments: Vec<Fragment>,
    /// Cells whose clipping failed
    pub dropped: Vec<DroppedCell>,
}

/// Turns per-cell clip results into fragments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentAssembler {
    source: SourceHandle,
    recenter: bool,
}

impl FragmentAssembler {
    /// Assembler tagging fragments with `source`, recentering by default
    pub fn new(source: SourceHandle) -> Self {
        Self {
            source,
            recenter: true,
        }
    }

    /// Store vertices relative to the fragment position
    pub fn recenter(mut self, enabled: bool) -> Self {
        self.recenter = enabled;
        self
    }

    /// Combine clip outcomes with their cells
    ///
    /// # Arguments
    ///
    /// * `cells` - Cells in seed order
    /// * `outcomes` - `outcomes[i]` is the clip result for `cells[i]`
    ///
    /// # Returns
    ///
    /// Fragments in seed order. Empty outcomes are skipped, failed ones
    /// become [`DroppedCell`] entries.
    pub fn assemble(&self, cells: &[Cell], outcomes: Vec<ClipOutcome>) -> Assembly {
        let mut assembly = Assembly::default();

        for (cell, outcome) in cells.iter().zip(outcomes) {
            match outcome {
                ClipOutcome::Clipped(mesh) => assembly.fragments.push(self.fragment(cell, mesh)),
                ClipOutcome::Empty => {}
                ClipOutcome::Failed(error) => {
                    log::warn!("dropping cell {}: {}", cell.seed_index, error);
                    assembly.dropped.push(DroppedCell {
                        seed_index: cell.seed_index,
                        error,
                    });
                }
            }
        }

        assembly
    }

    fn fragment(&self, cell: &Cell, mesh: TriMesh) -> Fragment {
        // Volume centroid, vertex average for flat slivers
        let position = mesh
            .centroid()
            .or_else(|| mesh.vertex_centroid())
            .unwrap_or(cell.seed);
        let mesh = if self.recenter { mesh.translated(-position) } else { mesh };

        Fragment {
            seed_index: cell.seed_index,
            mesh,
            position,
            source: self.source,
            recentered: self.recenter,
        }
    }
}
