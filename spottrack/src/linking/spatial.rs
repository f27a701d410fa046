//! 2-D k-d tree for candidate link queries.
//!
//! One tree is built per frame over the spots' (x, y) positions; every spot
//! of an earlier frame then asks for the targets within the link distance.

use glam::DVec2;

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<DVec2>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into the points array
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// 0 = x, 1 = y
    split_dim: usize,
}

impl KdTree {
    /// Build a balanced tree by median splits; `None` for no points.
    pub fn build(points: &[DVec2]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let points = points.to_vec();
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        Self::build_recursive(&points, &mut indices, 0, &mut nodes);

        Some(Self { nodes, points })
    }

    fn build_recursive(
        points: &[DVec2],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % 2;
        indices.sort_by(|&a, &b| {
            points[a][split_dim]
                .total_cmp(&points[b][split_dim])
                .then(a.cmp(&b))
        });

        let median = indices.len() / 2;
        let node_idx = nodes.len();
        nodes.push(KdNode {
            point_idx: indices[median],
            left: None,
            right: None,
            split_dim,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let left = Self::build_recursive(points, left_indices, depth + 1, nodes);
        let right = Self::build_recursive(points, &mut right_part[1..], depth + 1, nodes);

        nodes[node_idx].left = left;
        nodes[node_idx].right = right;
        Some(node_idx)
    }

    /// Append the indices of all points with `distance <= radius` to `out`.
    ///
    /// Order follows the tree walk; callers that need a stable order sort.
    pub fn radius_indices_into(&self, query: DVec2, radius: f64, out: &mut Vec<usize>) {
        if !self.nodes.is_empty() {
            self.radius_search_recursive(0, query, radius * radius, out);
        }
    }

    fn radius_search_recursive(
        &self,
        node_idx: usize,
        query: DVec2,
        radius_sq: f64,
        out: &mut Vec<usize>,
    ) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        if query.distance_squared(point) <= radius_sq {
            out.push(node.point_idx);
        }

        let diff = query[node.split_dim] - point[node.split_dim];
        let diff_sq = diff * diff;

        if let Some(left_idx) = node.left
            && (diff <= 0.0 || diff_sq <= radius_sq)
        {
            self.radius_search_recursive(left_idx, query, radius_sq, out);
        }
        if let Some(right_idx) = node.right
            && (diff >= 0.0 || diff_sq <= radius_sq)
        {
            self.radius_search_recursive(right_idx, query, radius_sq, out);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(tree: &KdTree, query: DVec2, radius: f64) -> Vec<usize> {
        let mut buf = Vec::new();
        tree.radius_indices_into(query, radius, &mut buf);
        buf.sort_unstable();
        buf
    }

    #[test]
    fn test_build_empty() {
        assert!(KdTree::build(&[]).is_none());
    }

    #[test]
    fn test_radius_is_inclusive() {
        let points = [DVec2::new(0.0, 0.0), DVec2::new(3.0, 4.0), DVec2::new(6.0, 8.0)];
        let tree = KdTree::build(&points).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(search(&tree, DVec2::ZERO, 5.0), vec![0, 1]);
        assert_eq!(search(&tree, DVec2::ZERO, 4.999), vec![0]);
    }

    #[test]
    fn test_duplicate_points_are_all_found() {
        let points = vec![DVec2::new(2.0, 2.0); 5];
        let tree = KdTree::build(&points).unwrap();
        assert_eq!(search(&tree, DVec2::new(2.0, 2.0), 0.0), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_matches_brute_force() {
        // Deterministic pseudo-random scatter.
        let mut state = 12345u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64 * 100.0
        };
        let points: Vec<DVec2> = (0..300).map(|_| DVec2::new(next(), next())).collect();
        let tree = KdTree::build(&points).unwrap();

        for query in [DVec2::new(50.0, 50.0), DVec2::new(3.0, 97.0), DVec2::new(-5.0, 20.0)] {
            for radius in [0.5, 7.0, 25.0] {
                let expected: Vec<usize> = points
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.distance_squared(query) <= radius * radius)
                    .map(|(i, _)| i)
                    .collect();
                assert_eq!(search(&tree, query, radius), expected);
            }
        }
    }
}
