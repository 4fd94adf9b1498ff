//! Ordered queue of triangles awaiting refinement.
//!
//! Every live triangle has exactly one [`QueueEntry`]. Entries are kept in a
//! `BTreeSet`, so insertion, removal and access to the worst triangle are
//! logarithmic. Triangles in the `Waiting` state (front strategies only) are
//! parked in a secondary set until the front reaches them.
//!
//! # Ordering
//!
//! 1. tier ascending: triangles that still miss the target first;
//! 2. priority descending: worst first, penalized triangles later;
//! 3. circumcenter `x` descending, only to make runs reproducible;
//! 4. triangle key ascending, which makes the order total.
//!
//! The tier is judged on the true quality, never on the penalized priority,
//! so a penalty can reorder the queue but never settle a triangle.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

use crate::core::triangle::{Triangle, TriangleKey};

/// Coarse ordering class of a queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QueueTier {
    /// Still misses the size target.
    Eligible,
    /// Meets the acceptance criterion or the convergence threshold.
    Accepted,
}

/// Snapshot of the ordering data of one triangle.
#[derive(Clone, Copy, Debug)]
pub struct QueueEntry {
    /// Ordering class.
    pub tier: QueueTier,
    /// Quality value (larger is worse).
    pub quality: f64,
    /// Ordering value: the quality after penalties.
    pub priority: f64,
    /// Circumcenter abscissa.
    pub xc: f64,
    /// The triangle.
    pub key: TriangleKey,
}

impl QueueEntry {
    /// Builds the entry for a live triangle.
    ///
    /// The triangle is settled if its position is accepted, or if `threshold`
    /// is given and its quality is below it.
    #[must_use]
    pub fn for_triangle(key: TriangleKey, triangle: &Triangle, threshold: Option<f64>) -> Self {
        let settled = triangle.position().is_accepted()
            || threshold.is_some_and(|t| triangle.quality() < t);
        Self {
            tier: if settled {
                QueueTier::Accepted
            } else {
                QueueTier::Eligible
            },
            quality: triangle.quality(),
            priority: triangle.priority(),
            xc: triangle.circle().center()[0],
            key,
        }
    }

    /// Returns `true` if the triangle still needs refinement.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.tier == QueueTier::Eligible
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| other.priority.total_cmp(&self.priority))
            .then_with(|| other.xc.total_cmp(&self.xc))
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

// =============================================================================
// PRIORITY QUEUE
// =============================================================================

/// Worst-first queue over all live triangles.
#[derive(Clone, Debug, Default)]
pub struct PriorityQueue {
    threshold: Option<f64>,
    entries: BTreeSet<QueueEntry>,
    waiting: BTreeSet<QueueEntry>,
    index: SecondaryMap<TriangleKey, (QueueEntry, bool)>,
}

impl PriorityQueue {
    /// Creates an empty queue that settles triangles on acceptance only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue that also settles triangles whose quality is
    /// below `threshold`.
    #[must_use]
    pub fn with_threshold(threshold: Option<f64>) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Convergence threshold applied by [`QueueEntry::for_triangle`].
    #[must_use]
    pub const fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Inserts `entry`, replacing any previous entry for the same triangle.
    ///
    /// `waiting` parks the entry in the secondary set.
    pub fn insert(&mut self, entry: QueueEntry, waiting: bool) {
        self.remove_key(entry.key);
        if waiting {
            self.waiting.insert(entry);
        } else {
            self.entries.insert(entry);
        }
        self.index.insert(entry.key, (entry, waiting));
    }

    /// Removes `entry`. Returns `false` if it was not queued as given.
    pub fn remove(&mut self, entry: &QueueEntry) -> bool {
        match self.index.get(entry.key) {
            Some((queued, _)) if queued == entry => self.remove_key(entry.key).is_some(),
            _ => false,
        }
    }

    /// Removes whatever entry the triangle has.
    pub fn remove_key(&mut self, key: TriangleKey) -> Option<QueueEntry> {
        let (entry, waiting) = self.index.remove(key)?;
        if waiting {
            self.waiting.remove(&entry);
        } else {
            self.entries.remove(&entry);
        }
        Some(entry)
    }

    /// Moves a waiting triangle into the main set.
    ///
    /// Returns `false` if the triangle was not waiting.
    pub fn promote(&mut self, key: TriangleKey) -> bool {
        match self.index.get(key) {
            Some(&(entry, true)) => {
                self.insert(entry, false);
                true
            }
            _ => false,
        }
    }

    /// The queued entry of a triangle, if any.
    #[must_use]
    pub fn entry(&self, key: TriangleKey) -> Option<&QueueEntry> {
        self.index.get(key).map(|(entry, _)| entry)
    }

    /// Returns `true` if the triangle is queued (in either set).
    #[must_use]
    pub fn contains(&self, key: TriangleKey) -> bool {
        self.index.contains_key(key)
    }

    /// Returns `true` if the triangle sits in the waiting set.
    #[must_use]
    pub fn is_waiting(&self, key: TriangleKey) -> bool {
        matches!(self.index.get(key), Some((_, true)))
    }

    /// First eligible main-set entry in order that `accept` admits.
    ///
    /// Starts at the overall worst entry and walks forward only while
    /// `accept` rejects. Settled entries are never returned. Does not mutate
    /// the queue, so repeated calls return the same entry.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mesh2d::core::priority::{PriorityQueue, QueueEntry, QueueTier};
    /// use mesh2d::core::triangle::TriangleKey;
    /// use slotmap::SlotMap;
    ///
    /// let mut keys = SlotMap::<TriangleKey, ()>::with_key();
    /// let (a, b) = (keys.insert(()), keys.insert(()));
    /// let entry = |key, quality| QueueEntry {
    ///     tier: QueueTier::Eligible,
    ///     quality,
    ///     priority: quality,
    ///     xc: 0.0,
    ///     key,
    /// };
    ///
    /// let mut queue = PriorityQueue::new();
    /// queue.insert(entry(a, 2.0), false);
    /// queue.insert(entry(b, 5.0), false);
    ///
    /// assert_eq!(queue.worst(|_| true).map(|e| e.key), Some(b));
    /// assert_eq!(queue.worst(|e| e.key != b).map(|e| e.key), Some(a));
    /// ```
    pub fn worst<F>(&self, mut accept: F) -> Option<QueueEntry>
    where
        F: FnMut(&QueueEntry) -> bool,
    {
        self.entries
            .iter()
            .take_while(|entry| entry.is_eligible())
            .find(|entry| accept(entry))
            .copied()
    }

    /// Number of triangles, waiting ones included, that still miss the target.
    #[must_use]
    pub fn unsettled_len(&self) -> usize {
        let main = self
            .entries
            .iter()
            .take_while(|entry| entry.is_eligible())
            .count();
        main + self.waiting.iter().filter(|entry| entry.is_eligible()).count()
    }

    /// Returns `true` once every queued triangle is settled.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.unsettled_len() == 0
    }

    /// Number of queued triangles, waiting ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Number of waiting triangles.
    #[must_use]
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Main-set entries, worst first.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Waiting entries, worst first.
    pub fn iter_waiting(&self) -> impl Iterator<Item = &QueueEntry> {
        self.waiting.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<TriangleKey> {
        let mut arena = SlotMap::<TriangleKey, ()>::with_key();
        (0..n).map(|_| arena.insert(())).collect()
    }

    fn entry(key: TriangleKey, tier: QueueTier, quality: f64, xc: f64) -> QueueEntry {
        QueueEntry {
            tier,
            quality,
            priority: quality,
            xc,
            key,
        }
    }

    #[test]
    fn ordering_is_tier_then_worst_quality_then_xc() {
        let k = keys(4);
        let mut queue = PriorityQueue::new();
        queue.insert(entry(k[0], QueueTier::Accepted, 100.0, 0.0), false);
        queue.insert(entry(k[1], QueueTier::Eligible, 1.0, 0.0), false);
        queue.insert(entry(k[2], QueueTier::Eligible, 3.0, -1.0), false);
        queue.insert(entry(k[3], QueueTier::Eligible, 3.0, 2.0), false);

        let order: Vec<_> = queue.iter().map(|e| e.key).collect();
        assert_eq!(order, vec![k[3], k[2], k[1], k[0]]);
    }

    #[test]
    fn worst_is_idempotent() {
        let k = keys(3);
        let mut queue = PriorityQueue::new();
        for (&key, quality) in k.iter().zip([0.0, 1.0, 2.0]) {
            queue.insert(entry(key, QueueTier::Eligible, quality, 0.0), false);
        }
        let first = queue.worst(|_| true);
        assert_eq!(first, queue.worst(|_| true));
        assert_eq!(first.map(|e| e.key), Some(k[2]));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn reinsert_replaces_previous_entry() {
        let k = keys(2);
        let mut queue = PriorityQueue::new();
        queue.insert(entry(k[0], QueueTier::Eligible, 5.0, 0.0), false);
        queue.insert(entry(k[1], QueueTier::Eligible, 4.0, 0.0), false);
        queue.insert(entry(k[0], QueueTier::Eligible, 0.5, 0.0), false);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.worst(|_| true).map(|e| e.key), Some(k[1]));

        let stale = entry(k[0], QueueTier::Eligible, 5.0, 0.0);
        assert!(!queue.remove(&stale));
        assert!(queue.remove(&entry(k[0], QueueTier::Eligible, 0.5, 0.0)));
        assert!(!queue.contains(k[0]));
    }

    #[test]
    fn convergence_counts_every_unsettled_entry() {
        let k = keys(3);
        let mut queue = PriorityQueue::new();
        assert!(queue.is_converged());

        queue.insert(entry(k[0], QueueTier::Eligible, 0.9, 0.0), false);
        assert!(!queue.is_converged());
        // A filter that rejects everything leaves the entry unsettled
        assert_eq!(queue.worst(|_| false), None);
        assert_eq!(queue.unsettled_len(), 1);

        queue.insert(entry(k[1], QueueTier::Eligible, 3.0, 0.0), true);
        assert_eq!(queue.unsettled_len(), 2);

        queue.insert(entry(k[0], QueueTier::Accepted, 0.9, 0.0), false);
        queue.insert(entry(k[2], QueueTier::Accepted, 0.1, 0.0), false);
        assert_eq!(queue.worst(|_| true), None);
        assert_eq!(queue.unsettled_len(), 1);
        queue.remove_key(k[1]);
        assert!(queue.is_converged());
    }

    #[test]
    fn penalized_entries_sort_later_but_stay_eligible() {
        let k = keys(2);
        let mut queue = PriorityQueue::new();
        queue.insert(entry(k[0], QueueTier::Eligible, 5.0, 0.0), false);
        queue.insert(entry(k[1], QueueTier::Eligible, 2.0, 0.0), false);
        let penalized = QueueEntry {
            priority: 0.5,
            ..entry(k[0], QueueTier::Eligible, 5.0, 0.0)
        };
        queue.insert(penalized, false);

        assert_eq!(queue.worst(|_| true).map(|e| e.key), Some(k[1]));
        assert_eq!(queue.worst(|e| e.key != k[1]).map(|e| e.quality), Some(5.0));
        assert_eq!(queue.unsettled_len(), 2);
    }

    #[test]
    fn threshold_settles_entries_on_true_quality() {
        let mut arena = SlotMap::<TriangleKey, Triangle>::with_key();
        let circle =
            crate::geometry::predicates::Circumcircle::through([0.0, 0.0], [1.0, 0.0], [0.0, 1.0])
                .unwrap();
        let mut triangle =
            Triangle::new([0, 1, 2], circle, crate::core::triangle::TrianglePosition::Intern);
        triangle.set_quality(2.0);
        triangle.penalize(10.0);
        let key = arena.insert(triangle.clone());

        let queue = PriorityQueue::with_threshold(Some(0.8));
        let entry = QueueEntry::for_triangle(key, &triangle, queue.threshold());
        assert!(entry.is_eligible());
        assert!((entry.priority - 0.2).abs() < 1e-12);

        triangle.set_quality(0.5);
        assert!(!QueueEntry::for_triangle(key, &triangle, queue.threshold()).is_eligible());
        assert!(QueueEntry::for_triangle(key, &triangle, None).is_eligible());
    }

    #[test]
    fn waiting_entries_are_invisible_until_promoted() {
        let k = keys(2);
        let mut queue = PriorityQueue::new();
        queue.insert(entry(k[0], QueueTier::Eligible, 9.0, 0.0), true);
        queue.insert(entry(k[1], QueueTier::Eligible, 1.0, 0.0), false);
        assert_eq!(queue.waiting_len(), 1);
        assert!(queue.is_waiting(k[0]));
        assert_eq!(queue.worst(|_| true).map(|e| e.key), Some(k[1]));

        assert!(queue.promote(k[0]));
        assert!(!queue.promote(k[0]));
        assert_eq!(queue.waiting_len(), 0);
        assert_eq!(queue.worst(|_| true).map(|e| e.key), Some(k[0]));
        assert_eq!(queue.remove_key(k[0]).map(|e| e.quality), Some(9.0));
        assert_eq!(queue.len(), 1);
    }
}
