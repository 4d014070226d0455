//! Grouping matches into connected structures (portals, veins, ...).
//!
//! Matches are partitioned by (dimension, block type, orientation) first and
//! only then flood-filled, so differently oriented blocks never merge even
//! when they touch. Clustering is a partition of a set: input order does not
//! affect the result.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use serde::Serialize;

use crate::scan::BlockMatch;
use crate::world::position::{Axis, BlockPos, Dimension};

/// How members of a structure connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// A flat structure. For `x` and `z` the plane is vertical and runs
    /// along that axis, as a nether portal with that `axis` does: neighbours
    /// step along it or along y and are equal on the remaining axis. `Plane(Y)`
    /// lies flat in x and z.
    Plane(Axis),
    /// No declared axis: the six cardinal neighbours in 3D.
    Volume,
}

impl Orientation {
    /// From the block's `axis` state property; blocks without one are
    /// volumes.
    pub fn of(found: &BlockMatch) -> Orientation {
        found
            .property("axis")
            .and_then(Axis::parse)
            .map(Orientation::Plane)
            .unwrap_or(Orientation::Volume)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Orientation::Plane(axis) => axis.label(),
            Orientation::Volume => "volume",
        }
    }

    fn step_axes(&self) -> &'static [Axis] {
        match self {
            Orientation::Plane(Axis::X) => &[Axis::X, Axis::Y],
            Orientation::Plane(Axis::Z) => &[Axis::Z, Axis::Y],
            Orientation::Plane(Axis::Y) => &[Axis::X, Axis::Z],
            Orientation::Volume => &Axis::ALL,
        }
    }
}

/// A connected group of same-type, same-orientation matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Structure {
    pub dimension: Dimension,
    pub block: Arc<str>,
    pub orientation: Orientation,
    /// Minimum coordinate on every axis.
    pub anchor: BlockPos,
    /// `max - min + 1` along x, y, z.
    pub size: [u64; 3],
    /// Arithmetic mean of member coordinates.
    pub centroid: [f64; 3],
    /// Member positions, sorted.
    pub members: Vec<BlockPos>,
}

impl Structure {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn axis_label(&self) -> &'static str {
        self.orientation.label()
    }

    /// Width and height in the structure's plane.
    ///
    /// For vertical planes width runs along the plane's axis and height is
    /// y; for `Plane(Y)` they are x and z. Volumes report x and y (z is in
    /// `size[2]`).
    pub fn extents(&self) -> (u64, u64) {
        let [sx, sy, sz] = self.size;
        match self.orientation {
            Orientation::Plane(Axis::X) => (sx, sy),
            Orientation::Plane(Axis::Z) => (sz, sy),
            Orientation::Plane(Axis::Y) => (sx, sz),
            Orientation::Volume => (sx, sy),
        }
    }

    fn from_members(dimension: Dimension, block: Arc<str>, orientation: Orientation, mut members: Vec<BlockPos>) -> Self {
        members.sort();
        let mut min = members[0];
        let mut max = members[0];
        let mut sum = [0f64; 3];
        for pos in &members {
            min = BlockPos::new(min.x.min(pos.x), min.y.min(pos.y), min.z.min(pos.z));
            max = BlockPos::new(max.x.max(pos.x), max.y.max(pos.y), max.z.max(pos.z));
            sum[0] += pos.x as f64;
            sum[1] += pos.y as f64;
            sum[2] += pos.z as f64;
        }
        let n = members.len() as f64;
        Self {
            dimension,
            block,
            orientation,
            anchor: min,
            size: [
                (max.x - min.x + 1) as u64,
                (max.y - min.y + 1) as u64,
                (max.z - min.z + 1) as u64,
            ],
            centroid: [sum[0] / n, sum[1] / n, sum[2] / n],
            members,
        }
    }
}

/// Flood-fill `matches` (assumed to share a dimension) under `orientation`.
///
/// Iterative BFS over a position lookup table; every match is visited once.
/// Duplicate positions count once.
pub fn cluster(matches: &[BlockMatch], orientation: Orientation) -> Vec<Structure> {
    let mut lookup: HashMap<BlockPos, usize> = HashMap::with_capacity(matches.len());
    for (i, m) in matches.iter().enumerate() {
        lookup.entry(m.pos()).or_insert(i);
    }

    let mut visited = vec![false; matches.len()];
    let mut queue = VecDeque::new();
    let mut structures = Vec::new();

    for start in 0..matches.len() {
        if visited[start] || lookup.get(&matches[start].pos()) != Some(&start) {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let mut members = Vec::new();
        while let Some(i) = queue.pop_front() {
            let pos = matches[i].pos();
            members.push(pos);
            for &axis in orientation.step_axes() {
                for delta in [-1, 1] {
                    if let Some(&j) = lookup.get(&pos.offset(axis, delta)) {
                        if !visited[j] {
                            visited[j] = true;
                            queue.push_back(j);
                        }
                    }
                }
            }
        }

        let first = &matches[start];
        structures.push(Structure::from_members(
            first.dimension().clone(),
            first.block.clone(),
            orientation,
            members,
        ));
    }

    structures.sort_by(|a, b| a.anchor.cmp(&b.anchor));
    structures
}

/// Partition by (dimension, block type, orientation), then cluster each part.
///
/// Output is sorted by dimension, block type, orientation, then anchor.
pub fn detect_structures(matches: &[BlockMatch]) -> Vec<Structure> {
    let mut groups: BTreeMap<(Dimension, Arc<str>, Orientation), Vec<BlockMatch>> = BTreeMap::new();
    for m in matches {
        groups
            .entry((m.dimension().clone(), m.block.clone(), Orientation::of(m)))
            .or_default()
            .push(m.clone());
    }

    let structures: Vec<Structure> = groups
        .into_iter()
        .flat_map(|((_, _, orientation), members)| cluster(&members, orientation))
        .collect();
    tracing::debug!("Grouped {} matches into {} structures", matches.len(), structures.len());
    structures
}
