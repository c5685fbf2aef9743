//! # k-d Tree
//!
//! Balanced 2D spatial partition over agent positions, used to find the
//! neighbors each agent has to avoid.
//!
//! ## Lifecycle
//!
//! Every position changes every tick, so the tree is never updated in place:
//! `rebuild` throws the old tree away and partitions the new positions from
//! scratch in O(N log N). Each node holds exactly one agent (the median along
//! the node's splitting axis) plus the bounding box of its subtree, which lets
//! queries skip whole subtrees that lie outside the search range.
//!
//! ## Queries
//!
//! - `query_radius`: every agent within a distance of a point
//! - `query_nearest`: the `k` closest agents within a distance of a point. The
//!   running result set is a max-priority queue keyed by distance, so once it
//!   is full the farthest entry is evicted and the search range shrinks.
//!
//! Results are sorted by ascending distance, ties broken by agent index, so
//! the output does not depend on the tree's internal layout.

use crate::structs::Point;
use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl Axis {
    fn coordinate(self, point: &Point) -> f64 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
        }
    }
}

#[derive(Debug, Clone)]
struct KdNode {
    agent: usize,
    axis: Axis,
    split: f64,
    min: Point,
    max: Point,
    left: Option<usize>,
    right: Option<usize>,
}

impl KdNode {
    /// Squared distance from `point` to this subtree's bounding box.
    fn box_distance_squared(&self, point: &Point) -> f64 {
        let dx = (self.min.x - point.x).max(0.0).max(point.x - self.max.x);
        let dy = (self.min.y - point.y).max(0.0).max(point.y - self.max.y);
        dx * dx + dy * dy
    }
}

type NeighborQueue = PriorityQueue<usize, (OrderedFloat<f64>, usize)>;

#[derive(Debug, Clone, Default)]
pub struct KdTree {
    positions: Vec<Point>,
    nodes: Vec<KdNode>,
    root: Option<usize>,
}

impl KdTree {
    pub fn new() -> Self {
        KdTree::default()
    }

    /// Builds a tree over `positions`; agent `i` is `positions[i]`.
    pub fn build(positions: &[Point]) -> Self {
        let mut tree = KdTree::new();
        tree.rebuild(positions);
        tree
    }

    /// Replaces the whole tree with one built over `positions`.
    pub fn rebuild(&mut self, positions: &[Point]) {
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.nodes.clear();
        self.nodes.reserve(positions.len());

        let mut indices: Vec<usize> = (0..positions.len()).collect();
        self.root = self.build_recursive(&mut indices);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn build_recursive(&mut self, indices: &mut [usize]) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let first = self.positions[indices[0]];
        let (min, max) = indices.iter().fold((first, first), |(min, max), &i| {
            let p = self.positions[i];
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        });
        let axis = if max.x - min.x >= max.y - min.y { Axis::X } else { Axis::Y };

        let mid = indices.len() / 2;
        let positions = &self.positions;
        indices.select_nth_unstable_by_key(mid, |&i| {
            (OrderedFloat(axis.coordinate(&positions[i])), i)
        });
        let agent = indices[mid];
        let split = axis.coordinate(&self.positions[agent]);

        let node_index = self.nodes.len();
        self.nodes.push(KdNode {
            agent,
            axis,
            split,
            min,
            max,
            left: None,
            right: None,
        });

        let (lower, upper) = indices.split_at_mut(mid);
        let left = self.build_recursive(lower);
        let right = self.build_recursive(&mut upper[1..]);
        self.nodes[node_index].left = left;
        self.nodes[node_index].right = right;

        Some(node_index)
    }

    /// All agents within `radius` of `point`, nearest first.
    pub fn query_radius(&self, point: Point, radius: f64, exclude: Option<usize>) -> Vec<usize> {
        self.query_nearest(point, radius, usize::MAX, exclude)
    }

    /// At most `max_count` agents within `radius` of `point`, nearest first.
    /// `exclude` (usually the querying agent itself) is never returned.
    pub fn query_nearest(
        &self,
        point: Point,
        radius: f64,
        max_count: usize,
        exclude: Option<usize>,
    ) -> Vec<usize> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        if max_count == 0 || radius < 0.0 {
            return Vec::new();
        }

        let mut queue = NeighborQueue::new();
        let mut range_squared = radius * radius;
        self.search(root, &point, max_count, exclude, &mut range_squared, &mut queue);

        let mut found: Vec<(usize, (OrderedFloat<f64>, usize))> = queue.into_iter().collect();
        found.sort_by_key(|&(_, key)| key);
        found.into_iter().map(|(agent, _)| agent).collect()
    }

    fn search(
        &self,
        node_index: usize,
        point: &Point,
        max_count: usize,
        exclude: Option<usize>,
        range_squared: &mut f64,
        queue: &mut NeighborQueue,
    ) {
        let node = &self.nodes[node_index];

        if exclude != Some(node.agent) {
            let distance_squared = self.positions[node.agent].distance_squared(point);
            if distance_squared <= *range_squared {
                queue.push(node.agent, (OrderedFloat(distance_squared), node.agent));
                if queue.len() > max_count {
                    queue.pop();
                }
                if queue.len() == max_count {
                    if let Some((_, (farthest, _))) = queue.peek() {
                        *range_squared = farthest.0;
                    }
                }
            }
        }

        let (near, far) = if node.axis.coordinate(point) < node.split {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        for child in [near, far].into_iter().flatten() {
            if self.nodes[child].box_distance_squared(point) <= *range_squared {
                self.search(child, point, max_count, exclude, range_squared, queue);
            }
        }
    }
}
