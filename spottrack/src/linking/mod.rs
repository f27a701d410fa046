//! Frame-to-frame linking with gap closing as one global assignment.
//!
//! All visible spots of a run are linked in a single sparse assignment
//! problem: each spot may take at most one successor and at most one
//! predecessor, so the solution is a set of vertex-disjoint paths. Spots left
//! unmatched start or end their own tracks.


pub mod cost;
pub mod lap;
pub mod spatial;

use crate::config::LinkerConfig;
use crate::error::ValidationError;
use crate::model::{SpotCollection, SpotId, TrackModel};

use self::cost::{alternative_cost, assignment_matrix, candidate_links};

/// Sparse LAP tracker.
#[derive(Debug, Clone, Default)]
pub struct SparseLapLinker {
    config: LinkerConfig,
}

impl SparseLapLinker {
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Link the visible spots of `spots` into tracks.
    ///
    /// Needs the complete run; the solve is not incremental.
    pub fn link(&self, spots: SpotCollection) -> Result<TrackModel, ValidationError> {
        let links = self.solve_links(&spots)?;
        let model = TrackModel::from_links(spots, &links)?;
        tracing::info!("Linked {}", model);
        Ok(model)
    }

    /// Optimal `(source, target)` links, in ascending source id.
    pub fn solve_links(
        &self,
        spots: &SpotCollection,
    ) -> Result<Vec<(SpotId, SpotId)>, ValidationError> {
        let graph = candidate_links(spots, &self.config);
        if graph.n_edges() == 0 {
            return Ok(Vec::new());
        }

        let b = alternative_cost(&graph, &self.config);
        let matrix = assignment_matrix(&graph, b)?;
        tracing::debug!(
            "Solving {}x{} assignment with {} entries (alternative cost {:.4})",
            matrix.n_rows(),
            matrix.n_cols(),
            matrix.nnz(),
            b
        );
        let assignment = lap::solve(&matrix)?;

        let n = graph.spots.len();
        let links: Vec<_> = assignment[..n]
            .iter()
            .enumerate()
            .filter(|&(_, &target)| target < n)
            .map(|(source, &target)| (graph.spots[source], graph.spots[target]))
            .collect();
        tracing::debug!("{} links selected", links.len());
        Ok(links)
    }
}
