//! Candidate links and the block assignment matrix built from them.
//!
//! With `n` visible spots acting both as link sources and link targets, the
//! square `2n x 2n` matrix is
//!
//! ```text
//! [ C      b·I ]   rows: sources, then "target not linked"
//! [ b·I    Cᵀ' ]   cols: targets, then "source not linked"
//! ```
//!
//! where `C` holds the candidate link costs, `b` is the cost of leaving a
//! spot unlinked and `Cᵀ'` has the sparsity of `Cᵀ` filled with the minimum
//! link cost, so every chosen link can be balanced in the lower-right block.

use glam::DVec2;

use common::EPSILON;

use crate::config::LinkerConfig;
use crate::model::{SpotCollection, SpotId};

use super::lap::{LapError, SparseCostMatrix};
use super::spatial::KdTree;

/// Sparse candidate links between the visible spots of a run.
#[derive(Debug, Clone, Default)]
pub struct CandidateGraph {
    /// Visible spots in ascending id; position in this list is the matrix index.
    pub spots: Vec<SpotId>,
    /// `(target index, cost)` per source index, sorted by target index.
    pub edges: Vec<Vec<(usize, f64)>>,
}

impl CandidateGraph {
    pub fn n_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn costs(&self) -> impl Iterator<Item = f64> + '_ {
        self.edges.iter().flatten().map(|&(_, cost)| cost)
    }
}

/// Cost of a link of length `distance` spanning `frame_delta` frames.
#[inline]
pub fn link_cost(distance_sq: f64, frame_delta: usize, gap_penalty: f64) -> f64 {
    distance_sq * (1.0 + gap_penalty * frame_delta.saturating_sub(1) as f64)
}

/// Enumerate every admissible link between visible spots.
///
/// A spot in frame `t` may link to frames `t + 1 ..= t + G`; consecutive
/// frames use the linking distance, larger gaps the gap-closing distance.
pub fn candidate_links(spots: &SpotCollection, config: &LinkerConfig) -> CandidateGraph {
    let ids: Vec<SpotId> = spots.iter_visible().map(|s| s.id).collect();
    let mut index_of = vec![usize::MAX; spots.len()];
    for (index, id) in ids.iter().enumerate() {
        index_of[id.0] = index;
    }

    // Per-frame trees over visible spots, with their matrix indices.
    let frames: Vec<Option<(KdTree, Vec<usize>)>> = (0..spots.n_frames())
        .map(|frame| {
            let visible: Vec<_> = spots.frame(frame).iter().filter(|s| s.is_visible()).collect();
            let points: Vec<DVec2> = visible.iter().map(|s| s.position.truncate()).collect();
            let indices = visible.iter().map(|s| index_of[s.id.0]).collect();
            KdTree::build(&points).map(|tree| (tree, indices))
        })
        .collect();

    let max_gap = config.effective_frame_gap();
    let mut found = Vec::new();
    let edges: Vec<Vec<(usize, f64)>> = ids
        .iter()
        .map(|&id| {
            let source = &spots[id];
            let mut row = Vec::new();
            let frames_after = frames.len().saturating_sub(source.frame + 1);
            for frame_delta in 1..=max_gap.min(frames_after) {
                let Some(Some((tree, indices))) = frames.get(source.frame + frame_delta) else {
                    continue;
                };
                found.clear();
                tree.radius_indices_into(
                    source.position.truncate(),
                    config.max_distance(frame_delta),
                    &mut found,
                );
                for &local in &found {
                    let target = ids[indices[local]];
                    let cost = link_cost(
                        source.distance_squared(&spots[target]),
                        frame_delta,
                        config.gap_penalty,
                    );
                    row.push((indices[local], cost));
                }
            }
            row.sort_by_key(|&(target, _)| target);
            row
        })
        .collect();

    let graph = CandidateGraph { spots: ids, edges };
    tracing::debug!(
        "{} candidate links between {} visible spots (max frame gap {})",
        graph.n_edges(),
        graph.spots.len(),
        max_gap
    );
    graph
}

/// Value at fraction `p` of the sorted values (nearest rank); 0 when empty.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(f64::total_cmp);
    let last = values.len() - 1;
    let index = ((last as f64) * p).round().clamp(0.0, last as f64) as usize;
    values[index]
}

/// Cost of leaving a spot unlinked, always strictly positive.
pub fn alternative_cost(graph: &CandidateGraph, config: &LinkerConfig) -> f64 {
    let mut costs: Vec<f64> = graph.costs().collect();
    let cutoff = percentile(&mut costs, config.cutoff_percentile);
    (config.alternative_cost_factor * cutoff).max(EPSILON)
}

/// Build the `2n x 2n` block matrix for `graph` with no-link cost `b`.
pub fn assignment_matrix(graph: &CandidateGraph, b: f64) -> Result<SparseCostMatrix, LapError> {
    let n = graph.spots.len();
    let min_cost = graph.costs().fold(f64::INFINITY, f64::min);

    // Transpose of C: sources (as columns n + i) per target row.
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (source, row) in graph.edges.iter().enumerate() {
        for &(target, _) in row {
            incoming[target].push(source);
        }
    }

    let mut matrix = SparseCostMatrix::with_columns(2 * n);
    for (source, row) in graph.edges.iter().enumerate() {
        matrix.push_row(row.iter().copied().chain([(n + source, b)]))?;
    }
    for (target, sources) in incoming.iter().enumerate() {
        matrix.push_row(
            [(target, b)]
                .into_iter()
                .chain(sources.iter().map(|&source| (n + source, min_cost))),
        )?;
    }
    Ok(matrix)
}
