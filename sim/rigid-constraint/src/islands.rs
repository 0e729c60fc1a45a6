//! Island partitioning.
//!
//! An island is a maximal set of enabled bodies connected through joints,
//! together with the joints acting on them. Islands share no state and are
//! solved independently.
//!
//! # Algorithm
//!
//! 1. Each enabled body starts in its own set
//! 2. Every joint whose two endpoints are both enabled bodies unions them
//! 3. Sets become islands, ordered by their smallest body index
//!
//! A joint with one endpoint absent ties its body to the environment and is
//! not an edge. Joints touching a disabled body, and joints with no bodies
//! at all, belong to no island.
//!
//! # Example
//!
//! ```
//! use rigid_constraint::{ConstraintIslands, JointLink};
//!
//! let enabled = [true, true, true, true, true];
//! let links = [
//!     JointLink::pair(0, 1),
//!     JointLink::pair(1, 2),
//!     // Gap - bodies 3 and 4 form a separate island
//!     JointLink::pair(3, 4),
//! ];
//!
//! let islands = ConstraintIslands::build(&enabled, &links);
//! assert_eq!(islands.num_islands(), 2);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Endpoints of one joint, as dense body indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointLink {
    /// First body.
    pub body1: Option<usize>,
    /// Second body.
    pub body2: Option<usize>,
}

impl JointLink {
    /// Joint between two bodies.
    #[must_use]
    pub const fn pair(body1: usize, body2: usize) -> Self {
        Self {
            body1: Some(body1),
            body2: Some(body2),
        }
    }

    /// Joint from one body to the environment.
    #[must_use]
    pub const fn to_static(body: usize) -> Self {
        Self {
            body1: Some(body),
            body2: None,
        }
    }

    /// Joint attached to nothing.
    #[must_use]
    pub const fn limbo() -> Self {
        Self {
            body1: None,
            body2: None,
        }
    }

    /// Check if the joint is attached to no body.
    #[must_use]
    pub const fn is_limbo(&self) -> bool {
        self.body1.is_none() && self.body2.is_none()
    }
}

/// One independent solve set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Island {
    /// Bodies, ascending.
    pub bodies: Vec<usize>,
    /// Indices into the link slice, ascending.
    pub joints: Vec<usize>,
}

impl Island {
    /// Number of bodies.
    #[must_use]
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Number of joints.
    #[must_use]
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// Check if `body` is in this island.
    #[must_use]
    pub fn contains_body(&self, body: usize) -> bool {
        self.bodies.binary_search(&body).is_ok()
    }
}

/// Partition of the enabled bodies into islands.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintIslands {
    islands: Vec<Island>,
    /// Island of each body, `None` for disabled bodies.
    body_to_island: Vec<Option<usize>>,
}

impl ConstraintIslands {
    /// Partition bodies `0..enabled.len()` using the joint `links`.
    #[must_use]
    pub fn build(enabled: &[bool], links: &[JointLink]) -> Self {
        let n = enabled.len();
        let is_active = |b: usize| enabled.get(b).copied().unwrap_or(false);

        let mut uf = UnionFind::new(n);
        for link in links {
            if let (Some(a), Some(b)) = (link.body1, link.body2) {
                if is_active(a) && is_active(b) {
                    uf.union(a, b);
                }
            }
        }

        let mut root_to_island: Vec<Option<usize>> = vec![None; n];
        let mut body_to_island: Vec<Option<usize>> = vec![None; n];
        let mut islands: Vec<Island> = Vec::new();

        for body in (0..n).filter(|&b| enabled[b]) {
            let root = uf.find(body);
            let island = *root_to_island[root].get_or_insert_with(|| {
                islands.push(Island::default());
                islands.len() - 1
            });
            islands[island].bodies.push(body);
            body_to_island[body] = Some(island);
        }

        for (index, link) in links.iter().enumerate() {
            let ends = [link.body1, link.body2];
            let present = ends.iter().flatten();
            if link.is_limbo() || present.clone().any(|&b| !is_active(b)) {
                continue;
            }
            if let Some(island) = present.filter_map(|&b| body_to_island[b]).next() {
                islands[island].joints.push(index);
            }
        }

        Self {
            islands,
            body_to_island,
        }
    }

    /// Number of islands.
    #[must_use]
    pub fn num_islands(&self) -> usize {
        self.islands.len()
    }

    /// All islands.
    #[must_use]
    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    /// Consume into the island list.
    #[must_use]
    pub fn into_islands(self) -> Vec<Island> {
        self.islands
    }

    /// Island containing `body`.
    #[must_use]
    pub fn island_for_body(&self, body: usize) -> Option<usize> {
        self.body_to_island.get(body).copied().flatten()
    }

    /// Check if two bodies are in the same island.
    #[must_use]
    pub fn same_island(&self, a: usize, b: usize) -> bool {
        match (self.island_for_body(a), self.island_for_body(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Statistics about island sizes.
    #[must_use]
    pub fn statistics(&self) -> IslandStatistics {
        IslandStatistics {
            num_islands: self.islands.len(),
            total_bodies: self.islands.iter().map(Island::num_bodies).sum(),
            total_joints: self.islands.iter().map(Island::num_joints).sum(),
            max_bodies_per_island: self.islands.iter().map(Island::num_bodies).max().unwrap_or(0),
            max_joints_per_island: self.islands.iter().map(Island::num_joints).max().unwrap_or(0),
        }
    }
}

/// Island size summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IslandStatistics {
    /// Number of islands.
    pub num_islands: usize,
    /// Enabled bodies across all islands.
    pub total_bodies: usize,
    /// Joints across all islands.
    pub total_joints: usize,
    /// Largest island by bodies.
    pub max_bodies_per_island: usize,
    /// Largest island by joints.
    pub max_joints_per_island: usize,
}

/// Disjoint-set forest with union by rank and path halving.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return;
        }

        match self.rank[root_x].cmp(&self.rank[root_y]) {
            std::cmp::Ordering::Less => self.parent[root_x] = root_y,
            std::cmp::Ordering::Greater => self.parent[root_y] = root_x,
            std::cmp::Ordering::Equal => {
                self.parent[root_y] = root_x;
                self.rank[root_x] = self.rank[root_x].saturating_add(1);
            }
        }
    }
}
