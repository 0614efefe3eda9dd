
use crate::data_types::genomic_region::GenomicRegion;
use crate::data_types::mappable_set::{Mappable, MappableSet};

use rustc_hash::FxHashMap as HashMap;
use std::cmp::Ordering;

/// The mapped extent of a single aligned read. The walker and the haplotype-region
/// calculation only consume coordinates, so no bases are carried here.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AlignedRead {
    /// the mapped region of the read
    region: GenomicRegion,
    /// the read name, used only for tie-breaking and debugging
    name: String
}

impl AlignedRead {
    pub fn new(region: GenomicRegion, name: String) -> AlignedRead {
        AlignedRead { region, name }
    }

    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Mappable for AlignedRead {
    fn region(&self) -> &GenomicRegion {
        &self.region
    }
}

impl PartialOrd for AlignedRead {
    fn partial_cmp(&self, other: &AlignedRead) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AlignedRead {
    fn cmp(&self, other: &AlignedRead) -> Ordering {
        self.region.cmp(&other.region).then_with(|| self.name.cmp(&other.name))
    }
}

/// Reads for one or more samples, each sample's reads held in mapped order.
pub type ReadMap = HashMap<String, MappableSet<AlignedRead>>;

/// True if any sample has a read overlapping `region`.
pub fn has_overlapped_reads(reads: &ReadMap, region: &GenomicRegion) -> bool {
    reads.values().any(|sample_reads| sample_reads.has_overlapped(region))
}

/// The number of reads overlapping `region` across all samples.
pub fn count_overlapped_reads(reads: &ReadMap, region: &GenomicRegion) -> usize {
    reads.values().map(|sample_reads| sample_reads.count_overlapped(region)).sum()
}

/// The overlapping read with the smallest start coordinate across all samples.
pub fn leftmost_overlapped_read<'a>(reads: &'a ReadMap, region: &'a GenomicRegion) -> Option<&'a AlignedRead> {
    reads.values()
        .filter_map(|sample_reads| sample_reads.overlapped(region).next())
        .min_by_key(|read| read.region().start())
}

/// The overlapping read with the largest end coordinate across all samples.
pub fn rightmost_overlapped_read<'a>(reads: &'a ReadMap, region: &'a GenomicRegion) -> Option<&'a AlignedRead> {
    reads.values()
        .filter_map(|sample_reads| {
            sample_reads.overlapped(region).max_by_key(|read| read.region().end())
        })
        .max_by_key(|read| read.region().end())
}

/// True if some read overlaps both regions, i.e. the two sites share direct read support.
pub fn any_read_spans(reads: &ReadMap, lhs: &GenomicRegion, rhs: &GenomicRegion) -> bool {
    reads.values().any(|sample_reads| {
        sample_reads.overlapped(lhs).any(|read| read.region().overlaps(rhs))
    })
}

/// The prefix of `region` that is contiguously covered by reads, starting from the
/// region start. Coverage is pooled across samples. If the region start itself is
/// uncovered the full region is returned, leaving the caller's plan untouched.
pub fn find_covered_subregion(reads: &ReadMap, region: &GenomicRegion) -> GenomicRegion {
    let mut overlapping: Vec<&AlignedRead> = reads.values()
        .flat_map(|sample_reads| sample_reads.overlapped(region))
        .collect();
    if overlapping.is_empty() {
        return region.clone();
    }
    overlapping.sort_by_key(|read| (read.region().start(), read.region().end()));

    let mut covered_end = region.start();
    for read in overlapping {
        if read.region().start() > covered_end {
            break;
        }
        covered_end = covered_end.max(read.region().end());
    }
    if covered_end == region.start() {
        return region.clone();
    }
    GenomicRegion::new(region.contig().clone(), region.start(), covered_end.min(region.end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genomic_region::ContigName;

    fn region(start: u64, end: u64) -> GenomicRegion {
        GenomicRegion::new(ContigName::from("chr1"), start, end)
    }

    fn read_map(extents: &[(u64, u64)]) -> ReadMap {
        let mut reads = ReadMap::default();
        let sample_reads: MappableSet<AlignedRead> = extents.iter()
            .enumerate()
            .map(|(i, &(start, end))| AlignedRead::new(region(start, end), format!("read{i}")))
            .collect();
        reads.insert("sample1".to_string(), sample_reads);
        reads
    }

    #[test]
    fn test_overlap_helpers() {
        let reads = read_map(&[(0, 50), (40, 90), (100, 150)]);
        assert!(has_overlapped_reads(&reads, &region(45, 60)));
        assert!(!has_overlapped_reads(&reads, &region(90, 100)));
        assert_eq!(count_overlapped_reads(&reads, &region(45, 120)), 2);
        assert_eq!(leftmost_overlapped_read(&reads, &region(45, 120)).unwrap().region(), &region(40, 90));
        assert_eq!(rightmost_overlapped_read(&reads, &region(45, 120)).unwrap().region(), &region(100, 150));
    }

    #[test]
    fn test_any_read_spans() {
        let reads = read_map(&[(0, 50), (100, 150)]);
        assert!(any_read_spans(&reads, &region(10, 11), &region(40, 41)));
        assert!(!any_read_spans(&reads, &region(10, 11), &region(110, 111)));
    }

    #[test]
    fn test_find_covered_subregion() {
        let reads = read_map(&[(0, 50), (40, 90), (200, 250)]);
        // contiguous coverage runs out at 90
        assert_eq!(find_covered_subregion(&reads, &region(10, 300)), region(10, 90));
        // fully covered regions are untouched
        assert_eq!(find_covered_subregion(&reads, &region(10, 80)), region(10, 80));
        // an uncovered start leaves the region alone
        assert_eq!(find_covered_subregion(&reads, &region(95, 99)), region(95, 99));
        // no reads at all leaves the region alone
        let empty = ReadMap::default();
        assert_eq!(find_covered_subregion(&empty, &region(10, 20)), region(10, 20));
    }
}
