
use std::cmp::Ordering;
use std::sync::Arc;

/// Interned contig identifier, cheap to clone and compare.
pub type ContigName = Arc<str>;

/// A half-open, zero-based interval `[start, end)` tagged with a contig.
/// An empty region (`start == end`) denotes an insertion point between two bases.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GenomicRegion {
    /// The contig this region lives on
    contig: ContigName,
    /// The 0-based start coordinate, inclusive
    start: u64,
    /// The 0-based end coordinate, exclusive
    end: u64
}

impl std::fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

impl GenomicRegion {
    /// Creates a new region on a contig.
    /// # Arguments
    /// * `contig` - the contig name
    /// * `start` - 0-based inclusive start
    /// * `end` - 0-based exclusive end
    /// # Panics
    /// * if `start > end`
    pub fn new(contig: ContigName, start: u64, end: u64) -> GenomicRegion {
        assert!(start <= end, "start > end: {start} > {end}");
        GenomicRegion { contig, start, end }
    }

    /// Convenience constructor for an empty region (insertion point) at a position.
    pub fn at_position(contig: ContigName, position: u64) -> GenomicRegion {
        GenomicRegion::new(contig, position, position)
    }

    pub fn contig(&self) -> &ContigName {
        &self.contig
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True if this region spans exactly one base.
    pub fn is_position(&self) -> bool {
        self.len() == 1
    }

    fn same_contig(&self, other: &GenomicRegion) -> bool {
        self.contig == other.contig
    }

    /// Overlap test with insertion-aware boundary handling.
    /// Two non-empty regions overlap under the usual half-open rule.
    /// An empty region at `p` overlaps a non-empty one iff `start <= p <= end`,
    /// so an insertion adjacent to a region counts as overlapped.
    /// Two empty regions overlap iff they sit at the same position.
    pub fn overlaps(&self, other: &GenomicRegion) -> bool {
        if !self.same_contig(other) {
            return false;
        }
        match (self.is_empty(), other.is_empty()) {
            (false, false) => self.start < other.end && other.start < self.end,
            (true, false) => other.start <= self.start && self.start <= other.end,
            (false, true) => self.start <= other.start && other.start <= self.end,
            (true, true) => self.start == other.start
        }
    }

    /// Containment test. A non-empty inner region must lie within `[start, end]`.
    /// An empty inner region must be strictly interior: an insertion adjacent to
    /// either boundary of this region is not contained.
    pub fn contains(&self, other: &GenomicRegion) -> bool {
        if !self.same_contig(other) {
            return false;
        }
        if other.is_empty() {
            if self.is_empty() {
                self.start == other.start
            } else {
                self.start < other.start && other.start < self.end
            }
        } else {
            self.start <= other.start && other.end <= self.end
        }
    }

    /// True if this region ends at or before `other` starts without overlapping it.
    pub fn is_before(&self, other: &GenomicRegion) -> bool {
        debug_assert!(self.same_contig(other));
        self.end <= other.start && !self.overlaps(other)
    }

    /// True if this region starts at or after `other` ends without overlapping it.
    pub fn is_after(&self, other: &GenomicRegion) -> bool {
        debug_assert!(self.same_contig(other));
        self.start >= other.end && !self.overlaps(other)
    }

    pub fn begins_before(&self, other: &GenomicRegion) -> bool {
        debug_assert!(self.same_contig(other));
        self.start < other.start
    }

    pub fn ends_before(&self, other: &GenomicRegion) -> bool {
        debug_assert!(self.same_contig(other));
        self.end < other.end
    }

    /// The smallest region covering both inputs.
    pub fn encompass(&self, other: &GenomicRegion) -> GenomicRegion {
        debug_assert!(self.same_contig(other));
        GenomicRegion::new(self.contig.clone(), self.start.min(other.start), self.end.max(other.end))
    }

    /// The intersection of two regions, or `None` when they do not overlap.
    pub fn intersect(&self, other: &GenomicRegion) -> Option<GenomicRegion> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        Some(GenomicRegion::new(self.contig.clone(), start, end))
    }

    /// The part of this region before `other` begins.
    pub fn left_overhang(&self, other: &GenomicRegion) -> GenomicRegion {
        debug_assert!(self.same_contig(other));
        let end = other.start.clamp(self.start, self.end);
        GenomicRegion::new(self.contig.clone(), self.start, end)
    }

    /// The part of this region after `other` ends.
    pub fn right_overhang(&self, other: &GenomicRegion) -> GenomicRegion {
        debug_assert!(self.same_contig(other));
        let start = other.end.clamp(self.start, self.end);
        GenomicRegion::new(self.contig.clone(), start, self.end)
    }

    /// Expands both boundaries outward, saturating the left boundary at 0.
    pub fn expand(&self, amount: u64) -> GenomicRegion {
        self.expand_asymmetric(amount, amount)
    }

    /// Expands each boundary by its own amount, saturating the left boundary at 0.
    pub fn expand_asymmetric(&self, lhs: u64, rhs: u64) -> GenomicRegion {
        GenomicRegion::new(self.contig.clone(), self.start.saturating_sub(lhs), self.end + rhs)
    }

    /// Moves the right boundary by a signed amount; the result never crosses the left boundary.
    pub fn expand_rhs(&self, amount: i64) -> GenomicRegion {
        let end = (self.end as i64 + amount).max(self.start as i64) as u64;
        GenomicRegion::new(self.contig.clone(), self.start, end)
    }

    /// Moves the left boundary by a signed amount, saturating at 0; the result never
    /// crosses the right boundary.
    pub fn expand_lhs(&self, amount: i64) -> GenomicRegion {
        let start = (self.start as i64 - amount).clamp(0, self.end as i64) as u64;
        GenomicRegion::new(self.contig.clone(), start, self.end)
    }

    /// Translates the region by a signed offset, saturating at position 0 while
    /// preserving the region length.
    pub fn shift(&self, offset: i64) -> GenomicRegion {
        let start = (self.start as i64 + offset).max(0) as u64;
        GenomicRegion::new(self.contig.clone(), start, start + self.len())
    }

    /// The empty region at this region's start.
    pub fn head_region(&self) -> GenomicRegion {
        GenomicRegion::at_position(self.contig.clone(), self.start)
    }

    /// The empty region at this region's end.
    pub fn tail_region(&self) -> GenomicRegion {
        GenomicRegion::at_position(self.contig.clone(), self.end)
    }
}

impl PartialOrd for GenomicRegion {
    fn partial_cmp(&self, other: &GenomicRegion) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GenomicRegion {
    fn cmp(&self, other: &GenomicRegion) -> Ordering {
        debug_assert!(self.same_contig(other), "ordering regions across contigs");
        self.contig.cmp(&other.contig)
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contig() -> ContigName {
        ContigName::from("chr1")
    }

    fn region(start: u64, end: u64) -> GenomicRegion {
        GenomicRegion::new(contig(), start, end)
    }

    #[test]
    fn test_basic_accessors() {
        let r = region(10, 20);
        assert_eq!(r.start(), 10);
        assert_eq!(r.end(), 20);
        assert_eq!(r.len(), 10);
        assert!(!r.is_empty());
        assert!(region(5, 5).is_empty());
        assert!(region(5, 6).is_position());
    }

    #[test]
    fn test_overlaps_non_empty() {
        assert!(region(0, 10).overlaps(&region(9, 15)));
        assert!(!region(0, 10).overlaps(&region(10, 15)));
        assert!(region(0, 10).overlaps(&region(0, 10)));
        assert!(!region(0, 5).overlaps(&region(6, 8)));
    }

    #[test]
    fn test_overlaps_insertions() {
        // insertions adjacent to a region boundary count as overlapped
        let insertion = region(10, 10);
        assert!(insertion.overlaps(&region(5, 10)));
        assert!(insertion.overlaps(&region(10, 15)));
        assert!(insertion.overlaps(&region(5, 15)));
        assert!(!insertion.overlaps(&region(11, 15)));
        assert!(!insertion.overlaps(&region(5, 9)));

        // symmetric form
        assert!(region(5, 10).overlaps(&insertion));

        // two insertions only overlap at the same point
        assert!(insertion.overlaps(&region(10, 10)));
        assert!(!insertion.overlaps(&region(9, 9)));
    }

    #[test]
    fn test_contains() {
        assert!(region(0, 10).contains(&region(0, 10)));
        assert!(region(0, 10).contains(&region(3, 7)));
        assert!(!region(0, 10).contains(&region(3, 11)));

        // adjacent insertions are not contained, interior ones are
        assert!(region(0, 10).contains(&region(5, 5)));
        assert!(!region(0, 10).contains(&region(0, 0)));
        assert!(!region(0, 10).contains(&region(10, 10)));
        assert!(region(5, 5).contains(&region(5, 5)));
    }

    #[test]
    fn test_before_after() {
        assert!(region(0, 5).is_before(&region(5, 10)));
        assert!(region(5, 10).is_after(&region(0, 5)));
        // an insertion at the boundary is overlapped, so not before/after
        assert!(!region(5, 5).is_after(&region(0, 5)));
        assert!(!region(5, 5).is_before(&region(5, 10)));
        assert!(region(6, 6).is_after(&region(0, 5)));
    }

    #[test]
    fn test_overhangs() {
        let lagged = region(10, 30);
        let active = region(5, 20);
        assert_eq!(lagged.right_overhang(&active), region(20, 30));
        assert_eq!(active.left_overhang(&lagged), region(5, 10));
        // degenerate cases clamp to empty
        assert_eq!(region(0, 10).right_overhang(&region(0, 15)), region(10, 10));
        assert_eq!(region(5, 10).left_overhang(&region(0, 15)), region(5, 5));
    }

    #[test]
    fn test_expand_shift() {
        assert_eq!(region(10, 20).expand(5), region(5, 25));
        assert_eq!(region(2, 20).expand(5), region(0, 25));
        assert_eq!(region(10, 20).expand_rhs(-1), region(10, 19));
        assert_eq!(region(10, 10).expand_rhs(-1), region(10, 10));
        assert_eq!(region(10, 20).shift(-3), region(7, 17));
        assert_eq!(region(1, 4).shift(-3), region(0, 3));
        assert_eq!(region(10, 10).shift(2), region(12, 12));
    }

    #[test]
    fn test_head_tail() {
        let r = region(10, 20);
        assert_eq!(r.head_region(), region(10, 10));
        assert_eq!(r.tail_region(), region(20, 20));
        assert_eq!(r.intersect(&region(15, 25)), Some(region(15, 20)));
        assert_eq!(r.intersect(&region(25, 30)), None);
        assert_eq!(r.encompass(&region(15, 25)), region(10, 25));
    }
}
