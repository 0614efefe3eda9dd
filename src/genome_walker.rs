
use crate::data_types::alleles::Allele;
use crate::data_types::genomic_region::GenomicRegion;
use crate::data_types::mappable_set::MappableSet;
use crate::data_types::reads::{any_read_spans, find_covered_subregion, has_overlapped_reads, ReadMap};

use log::trace;

/// How alleles already inside the active region ("indicators") are treated when
/// choosing the next active region.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndicatorPolicy {
    /// never carry indicators forward
    IncludeNone,
    /// carry the indicator suffix that shares a read with the first novel allele
    IncludeIfSharedWithNovelRegion,
    /// carry the indicator suffix linked to the novel region by chained read overlap
    IncludeIfLinkableToNovelRegion,
    /// carry every indicator
    IncludeAll
}

/// The number of alleles worth considering at once for a given haplotype target.
pub fn max_included(target_haplotypes: usize) -> usize {
    debug_assert!(target_haplotypes > 0);
    let log2 = (usize::BITS - 1 - target_haplotypes.leading_zeros()) as usize;
    2 * log2.max(1) - 1
}

/// A pure function object proposing the next active window over the allele stream,
/// balancing allele density, read support, and the haplotype target.
#[derive(Clone, Copy, Debug)]
pub struct GenomeWalker {
    max_included: usize,
    indicator_policy: IndicatorPolicy
}

impl GenomeWalker {
    pub fn new(max_included: usize, indicator_policy: IndicatorPolicy) -> GenomeWalker {
        GenomeWalker {
            max_included,
            indicator_policy
        }
    }

    /// Proposes the region to process next.
    /// When no alleles remain past `active_region`, returns an empty terminal
    /// region shifted past it.
    /// # Arguments
    /// * `active_region` - the region most recently processed
    /// * `reads` - all aligned reads, used for linkage and coverage decisions
    /// * `alleles` - the candidate allele set, in sorted order
    pub fn walk(&self, active_region: &GenomicRegion, reads: &ReadMap, alleles: &MappableSet<Allele>) -> GenomicRegion {
        let novel: Vec<&Allele> = alleles.iter()
            .filter(|allele| allele.region().is_after(active_region))
            .collect();
        if novel.is_empty() {
            return active_region.tail_region().shift(2);
        }
        let first_novel_region = novel[0].region();

        let indicators: Vec<&Allele> = alleles.contained(active_region).collect();
        let num_indicators = match self.indicator_policy {
            IndicatorPolicy::IncludeNone => 0,
            IndicatorPolicy::IncludeAll => indicators.len(),
            IndicatorPolicy::IncludeIfSharedWithNovelRegion => {
                match indicators.iter().position(|indicator| {
                    any_read_spans(reads, indicator.region(), first_novel_region)
                }) {
                    Some(first_shared) => indicators.len() - first_shared,
                    None => 0
                }
            },
            IndicatorPolicy::IncludeIfLinkableToNovelRegion => {
                // walk left while consecutive sites are joined by read overlap
                let mut first_linked = indicators.len();
                let mut target = first_novel_region;
                while first_linked > 0 && any_read_spans(reads, indicators[first_linked - 1].region(), target) {
                    first_linked -= 1;
                    target = indicators[first_linked].region();
                }
                indicators.len() - first_linked
            }
        };

        // always make forward progress with at least one novel allele
        let novel_budget = self.max_included.saturating_sub(num_indicators).max(1);
        let mut num_included = novel_budget.min(novel.len());
        // alternatives at one site always travel together
        while num_included < novel.len()
            && novel[num_included].region() == novel[num_included - 1].region() {
            num_included += 1;
        }

        let first_region = if num_indicators > 0 {
            indicators[indicators.len() - num_indicators].region()
        } else {
            first_novel_region
        };
        let proposed = first_region.encompass(novel[num_included - 1].region());
        trace!("Walker proposing {proposed} with {num_indicators} indicators and {num_included} novel alleles");

        if has_overlapped_reads(reads, &proposed) {
            // cap the window by contiguous read coverage, but never cut the first
            // novel allele out of it
            let covered = find_covered_subregion(reads, &proposed);
            let end = covered.end().max(first_novel_region.end());
            GenomicRegion::new(proposed.contig().clone(), proposed.start(), end)
        } else {
            proposed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genomic_region::ContigName;
    use crate::data_types::reads::AlignedRead;

    fn region(start: u64, end: u64) -> GenomicRegion {
        GenomicRegion::new(ContigName::from("chr1"), start, end)
    }

    fn snv_pair(start: u64, reference: u8, alt: u8) -> Vec<Allele> {
        vec![
            Allele::new(region(start, start + 1), vec![reference]),
            Allele::new(region(start, start + 1), vec![alt])
        ]
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
    fn test_max_included_formula() {
        assert_eq!(max_included(1), 1);
        assert_eq!(max_included(2), 1);
        assert_eq!(max_included(4), 3);
        assert_eq!(max_included(64), 11);
        assert_eq!(max_included(100), 11);
        assert_eq!(max_included(128), 13);
    }

    #[test]
    fn test_walk_terminal_when_no_novel_alleles() {
        let walker = GenomeWalker::new(11, IndicatorPolicy::IncludeNone);
        let alleles: MappableSet<Allele> = snv_pair(100, b'A', b'C').into_iter().collect();
        let reads = ReadMap::default();

        let next = walker.walk(&region(90, 110), &reads, &alleles);
        assert!(next.is_empty());
        assert_eq!(next.start(), 112);
    }

    #[test]
    fn test_walk_picks_next_site_without_reads() {
        let walker = GenomeWalker::new(11, IndicatorPolicy::IncludeNone);
        let mut alleles: MappableSet<Allele> = snv_pair(100, b'A', b'C').into_iter().collect();
        alleles.insert_all(snv_pair(400, b'G', b'T'));

        let reads = ReadMap::default();
        let initial = region(100, 100).shift(-1);
        let first = walker.walk(&initial, &reads, &alleles);
        // both sites fit the allele budget
        assert_eq!(first, region(100, 401));
    }

    #[test]
    fn test_walk_budget_limits_sites() {
        // max_included of 1 keeps the window to a single site (both alternatives)
        let walker = GenomeWalker::new(1, IndicatorPolicy::IncludeNone);
        let mut alleles: MappableSet<Allele> = snv_pair(100, b'A', b'C').into_iter().collect();
        alleles.insert_all(snv_pair(400, b'G', b'T'));

        let reads = ReadMap::default();
        let next = walker.walk(&region(99, 99), &reads, &alleles);
        assert_eq!(next, region(100, 101));
    }

    #[test]
    fn test_walk_linkable_indicators() {
        let walker = GenomeWalker::new(11, IndicatorPolicy::IncludeIfLinkableToNovelRegion);
        let mut alleles: MappableSet<Allele> = snv_pair(100, b'A', b'C').into_iter().collect();
        alleles.insert_all(snv_pair(150, b'G', b'T'));

        // a read spanning both sites links the indicator into the next window
        let linking_reads = read_map(&[(80, 200)]);
        let next = walker.walk(&region(95, 110), &linking_reads, &alleles);
        assert_eq!(next.start(), 100);
        assert!(next.end() >= 151);

        // without read linkage the indicator is left behind
        let broken_reads = read_map(&[(80, 110), (140, 200)]);
        let next = walker.walk(&region(95, 110), &broken_reads, &alleles);
        assert_eq!(next.start(), 150);
    }

    #[test]
    fn test_walk_truncates_to_read_coverage() {
        let walker = GenomeWalker::new(11, IndicatorPolicy::IncludeNone);
        let mut alleles: MappableSet<Allele> = snv_pair(100, b'A', b'C').into_iter().collect();
        alleles.insert_all(snv_pair(400, b'G', b'T'));

        // coverage runs out at 180, so the second site is deferred
        let reads = read_map(&[(90, 180)]);
        let next = walker.walk(&region(99, 99), &reads, &alleles);
        assert_eq!(next, region(100, 180));
    }
}
