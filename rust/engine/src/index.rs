// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! R-tree broad phase over element bounds
//!
//! The tree is bulk-loaded once per query set and never mutated while a scan
//! runs. Queries use closed intervals, so touching boxes are candidates; the
//! exact kernels decide whether they really overlap.

use bimq_geometry::{Aabb, Rect2};
use rstar::{Point, RTree, RTreeObject, AABB};

/// Envelope tagged with the caller's slot index
#[derive(Debug, Clone)]
pub struct IndexedBox<P: Point> {
    pub slot: usize,
    envelope: AABB<P>,
}

impl<P: Point> RTreeObject for IndexedBox<P> {
    type Envelope = AABB<P>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope.clone()
    }
}

/// Broad-phase index mapping boxes back to positions in a caller slice
#[derive(Debug)]
pub struct SpatialIndex<P: Point> {
    tree: RTree<IndexedBox<P>>,
}

/// 3D index for clash scans
pub type BoxIndex3 = SpatialIndex<[f64; 3]>;
/// 2D index for plan-overlap scans
pub type RectIndex2 = SpatialIndex<[f64; 2]>;

impl<P: Point> SpatialIndex<P> {
    /// Bulk-load (sort-tile-recursive) from `(slot, envelope)` pairs
    pub fn build(boxes: impl IntoIterator<Item = (usize, AABB<P>)>) -> Self {
        let items = boxes
            .into_iter()
            .map(|(slot, envelope)| IndexedBox { slot, envelope })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Slots whose envelope intersects `query`, ascending
    ///
    /// Never omits an intersecting envelope; may include touching ones.
    pub fn candidates_near(&self, query: &AABB<P>) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(query)
            .map(|b| b.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Every unordered pair of intersecting envelopes as `(i, j)` with `i < j`
    ///
    /// Each pair appears once, ascending.
    pub fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = self
            .tree
            .iter()
            .flat_map(|a| {
                self.tree
                    .locate_in_envelope_intersecting(&a.envelope)
                    .filter(move |b| b.slot > a.slot)
                    .map(move |b| (a.slot, b.slot))
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

pub fn envelope3(bounds: &Aabb) -> AABB<[f64; 3]> {
    AABB::from_corners(
        [bounds.min.x, bounds.min.y, bounds.min.z],
        [bounds.max.x, bounds.max.y, bounds.max.z],
    )
}

pub fn envelope2(rect: &Rect2) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimq_geometry::{Point2, Point3};

    fn cube(x: f64, y: f64, z: f64, size: f64) -> Aabb {
        Aabb::new(Point3::new(x, y, z), Point3::new(x + size, y + size, z + size))
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect2 {
        Rect2 {
            min: Point2::new(x0, y0),
            max: Point2::new(x1, y1),
        }
    }

    /// Quadratic reference used to check the tree never drops a pair
    fn brute_force(boxes: &[Aabb]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..boxes.len() {
            for j in i + 1..boxes.len() {
                if boxes[i].intersects(&boxes[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_pairs_match_brute_force() {
        // Deterministic pseudo-random layout on a 10x10x3 grid
        let boxes: Vec<Aabb> = (0..300)
            .map(|i| {
                let h = (i * 7919 + 17) % 1000;
                let x = (h % 10) as f64 * 0.9;
                let y = ((h / 10) % 10) as f64 * 0.9;
                let z = ((h / 100) % 3) as f64 * 1.1;
                cube(x, y, z, 1.0 + (i % 3) as f64 * 0.1)
            })
            .collect();
        let index = BoxIndex3::build(boxes.iter().enumerate().map(|(i, b)| (i, envelope3(b))));
        assert_eq!(index.len(), 300);
        assert_eq!(index.candidate_pairs(), brute_force(&boxes));
    }

    #[test]
    fn test_disjoint_boxes_are_never_candidates() {
        let boxes = [cube(0.0, 0.0, 0.0, 1.0), cube(5.0, 0.0, 0.0, 1.0)];
        let index = BoxIndex3::build(boxes.iter().enumerate().map(|(i, b)| (i, envelope3(b))));
        assert!(index.candidate_pairs().is_empty());
        assert_eq!(index.candidates_near(&envelope3(&boxes[1])), [1]);
    }

    #[test]
    fn test_touching_boxes_are_candidates() {
        let boxes = [cube(0.0, 0.0, 0.0, 1.0), cube(1.0, 0.0, 0.0, 1.0)];
        let index = BoxIndex3::build(boxes.iter().enumerate().map(|(i, b)| (i, envelope3(b))));
        assert_eq!(index.candidate_pairs(), [(0, 1)]);
    }

    #[test]
    fn test_rect_index_queries() {
        let rects = [
            rect(0.0, 0.0, 2.0, 2.0),
            rect(1.0, 1.0, 3.0, 3.0),
            rect(10.0, 10.0, 11.0, 11.0),
        ];
        let index = RectIndex2::build(rects.iter().enumerate().map(|(i, r)| (i, envelope2(r))));
        assert_eq!(index.candidates_near(&envelope2(&rects[0])), [0, 1]);
        assert_eq!(index.candidate_pairs(), [(0, 1)]);
    }
}
