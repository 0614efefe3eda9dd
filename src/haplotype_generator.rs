
use crate::data_types::alleles::{Allele, Haplotype, Variant};
use crate::data_types::genomic_region::GenomicRegion;
use crate::data_types::mappable_set::MappableSet;
use crate::data_types::reads::{has_overlapped_reads, leftmost_overlapped_read, rightmost_overlapped_read, ReadMap};
use crate::data_types::reference_genome::ReferenceGenome;
use crate::genome_walker::{max_included, GenomeWalker, IndicatorPolicy};
use crate::haplotype_tree::HaplotypeTree;

use log::{debug, trace};
use priority_queue::PriorityQueue;
use simple_error::bail;
use std::cell::RefCell;

#[derive(thiserror::Error, Debug)]
pub enum GeneratorError {
    #[error("haplotype generator was not supplied with any candidates")]
    NoCandidates,
    #[error("haplotype count {size} overflowed the hard limit in {region}")]
    HaplotypeOverflow { region: GenomicRegion, size: usize }
}

/// How aggressively the generator lags the active region behind the allele
/// stream to keep linked sites in one batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LaggingPolicy {
    None,
    Conservative,
    Normal,
    Aggressive
}

/// Soft, holdout-triggering, and hard haplotype count limits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HaplotypeLimits {
    pub target: usize,
    pub holdout: usize,
    pub overflow: usize
}

#[derive(Clone, Copy, Debug)]
pub struct Policies {
    pub lagging: LaggingPolicy,
    pub haplotype_limits: HaplotypeLimits,
    pub max_holdout_depth: usize
}

impl Default for Policies {
    fn default() -> Policies {
        Policies {
            lagging: LaggingPolicy::None,
            haplotype_limits: HaplotypeLimits {
                target: 128,
                holdout: 2048,
                overflow: 8192
            },
            max_holdout_depth: 20
        }
    }
}

const DEFAULT_MIN_FLANK_PAD: u64 = 30;

/// Chainable configuration for a `HaplotypeGenerator`.
#[derive(Clone, Debug)]
pub struct PoliciesBuilder {
    policies: Policies,
    min_flank_pad: u64
}

impl Default for PoliciesBuilder {
    fn default() -> PoliciesBuilder {
        PoliciesBuilder::new()
    }
}

impl PoliciesBuilder {
    pub fn new() -> PoliciesBuilder {
        PoliciesBuilder {
            policies: Policies::default(),
            min_flank_pad: DEFAULT_MIN_FLANK_PAD
        }
    }

    pub fn set_lagging_policy(mut self, policy: LaggingPolicy) -> PoliciesBuilder {
        self.policies.lagging = policy;
        self
    }

    /// Sets the target haplotype count. If the holdout or overflow limits no
    /// longer exceed the new target they are lifted to one past it.
    pub fn set_target_limit(mut self, n: usize) -> PoliciesBuilder {
        self.policies.haplotype_limits.target = n;
        if self.policies.haplotype_limits.holdout <= n {
            self.policies.haplotype_limits.holdout = n + 1;
        }
        if self.policies.haplotype_limits.overflow <= n {
            self.policies.haplotype_limits.overflow = n + 1;
        }
        self
    }

    pub fn set_holdout_limit(mut self, n: usize) -> PoliciesBuilder {
        self.policies.haplotype_limits.holdout = n;
        self
    }

    pub fn set_overflow_limit(mut self, n: usize) -> PoliciesBuilder {
        self.policies.haplotype_limits.overflow = n;
        self
    }

    pub fn set_max_holdout_depth(mut self, n: usize) -> PoliciesBuilder {
        self.policies.max_holdout_depth = n;
        self
    }

    pub fn set_min_flank_pad(mut self, n: u64) -> PoliciesBuilder {
        self.min_flank_pad = n;
        self
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    /// Builds a generator over the given inputs.
    /// # Errors
    /// * if the candidate set is empty or the policies are inconsistent
    pub fn build<'a>(
        &self,
        reference: &'a ReferenceGenome,
        candidates: &MappableSet<Variant>,
        reads: &'a ReadMap
    ) -> Result<HaplotypeGenerator<'a>, Box<dyn std::error::Error>> {
        HaplotypeGenerator::new(reference, candidates, reads, self.policies, self.min_flank_pad)
    }
}

/// One entry on the holdout stack: alleles sharing a region that were removed
/// from play to keep the haplotype count bounded.
#[derive(Clone, Debug)]
struct HoldoutFrame {
    alleles: Vec<Allele>,
    region: GenomicRegion
}

/// A batch of candidate haplotypes together with the active region they cover.
pub type HaplotypeBatch = (Vec<Haplotype>, GenomicRegion);

/// Streams batches of candidate haplotypes over a contig by walking the genome,
/// growing a haplotype tree with candidate alleles, and spilling dense sites onto
/// a holdout stack.
pub struct HaplotypeGenerator<'a> {
    policies: Policies,
    min_flank_pad: u64,
    tree: HaplotypeTree<'a>,
    default_walker: GenomeWalker,
    holdout_walker: GenomeWalker,
    lagged_walker: Option<GenomeWalker>,
    alleles: MappableSet<Allele>,
    reads: &'a ReadMap,
    active_region: GenomicRegion,
    /// plan cache consumed by the next `generate`, filled by peeking
    next_active_region: RefCell<Option<GenomicRegion>>,
    active_holdouts: Vec<HoldoutFrame>,
    holdout_region: Option<GenomicRegion>,
    rightmost_allele: Allele
}

fn decompose(candidates: &MappableSet<Variant>) -> MappableSet<Allele> {
    let mut alleles: Vec<Allele> = Vec::with_capacity(2 * candidates.len());
    for variant in candidates {
        alleles.push(variant.ref_allele());
        alleles.push(variant.alt_allele());
    }
    MappableSet::from_items(alleles)
}

fn rightmost_region(alleles: &[Allele]) -> Option<&GenomicRegion> {
    alleles.iter().map(|a| a.region()).max_by_key(|r| r.end())
}

fn can_remove_entire_passed_region(next_active_region: &GenomicRegion, passed_alleles: &[Allele]) -> bool {
    match rightmost_region(passed_alleles) {
        Some(rightmost) => !rightmost.overlaps(next_active_region),
        None => true
    }
}

/// True when the passed region ends in insertion(s) directly preceded by a single
/// base allele: the insertion belongs to the upcoming region and must survive the
/// first removal stage.
fn requires_staged_removal(passed_alleles: &[Allele]) -> bool {
    let last = match passed_alleles.last() {
        Some(allele) => allele,
        None => return false
    };
    if !last.region().is_empty() {
        return false;
    }
    passed_alleles.iter().rev()
        .find(|allele| allele.region() != last.region())
        .map(|allele| allele.region().is_position())
        .unwrap_or(false)
}

/// Merges a sorted allele run into maximal groups of mutually overlapping
/// alleles, returning each group's encompassing region.
fn extract_mutually_exclusive_regions(alleles: &[Allele]) -> Vec<GenomicRegion> {
    let mut result: Vec<GenomicRegion> = vec![];
    for allele in alleles {
        match result.last_mut() {
            Some(last) if last.overlaps(allele.region()) => {
                *last = last.encompass(allele.region());
            },
            _ => result.push(allele.region().clone())
        }
    }
    result
}

fn sum_indel_sizes(alleles: &[Allele]) -> u64 {
    alleles.iter()
        .map(|allele| {
            if allele.is_insertion() {
                allele.sequence().len() as u64
            } else if allele.is_deletion() {
                allele.region().len()
            } else {
                0
            }
        })
        .sum()
}

fn estimate_num_haplotypes(num_alleles: usize) -> usize {
    1usize.checked_shl(num_alleles as u32).unwrap_or(usize::MAX)
}

fn require_more_holdouts(alleles: &MappableSet<Allele>, next_active_region: &GenomicRegion, holdout_limit: usize) -> bool {
    !alleles.is_empty()
        && estimate_num_haplotypes(alleles.count_overlapped(next_active_region)) > holdout_limit
}

impl<'a> HaplotypeGenerator<'a> {
    /// Creates a generator for one contig's worth of candidates.
    /// # Arguments
    /// * `reference` - the reference genome
    /// * `candidates` - candidate variants, all on one contig, in sorted order
    /// * `reads` - the aligned reads informing walking decisions
    /// * `policies` - lagging, limit, and holdout configuration
    /// * `min_flank_pad` - minimum reference flank added around each batch
    /// # Errors
    /// * if `candidates` is empty
    /// * if the haplotype limits or holdout depth are inconsistent
    pub fn new(
        reference: &'a ReferenceGenome,
        candidates: &MappableSet<Variant>,
        reads: &'a ReadMap,
        policies: Policies,
        min_flank_pad: u64
    ) -> Result<HaplotypeGenerator<'a>, Box<dyn std::error::Error>> {
        if candidates.is_empty() {
            return Err(Box::new(GeneratorError::NoCandidates));
        }
        let limits = policies.haplotype_limits;
        if limits.target == 0 || limits.target > limits.holdout || limits.holdout > limits.overflow {
            bail!(
                "haplotype limits must satisfy 0 < target <= holdout <= overflow, got {}/{}/{}",
                limits.target, limits.holdout, limits.overflow
            );
        }
        if policies.max_holdout_depth == 0 {
            bail!("max_holdout_depth must be at least 1");
        }

        let alleles = decompose(candidates);
        let leftmost = alleles.leftmost().expect("non-empty allele set");
        let rightmost_allele = alleles.rightmost().expect("non-empty allele set").clone();
        let contig = leftmost.region().contig().clone();
        let active_region = leftmost.region().head_region().shift(-1);

        let walker_budget = max_included(limits.target);
        let lagged_walker = match policies.lagging {
            LaggingPolicy::None => None,
            LaggingPolicy::Conservative => {
                Some(GenomeWalker::new(walker_budget, IndicatorPolicy::IncludeIfSharedWithNovelRegion))
            },
            LaggingPolicy::Normal | LaggingPolicy::Aggressive => {
                Some(GenomeWalker::new(walker_budget, IndicatorPolicy::IncludeIfLinkableToNovelRegion))
            }
        };

        Ok(HaplotypeGenerator {
            policies,
            min_flank_pad,
            tree: HaplotypeTree::new(contig, reference),
            default_walker: GenomeWalker::new(walker_budget, IndicatorPolicy::IncludeNone),
            holdout_walker: GenomeWalker::new(walker_budget, IndicatorPolicy::IncludeAll),
            lagged_walker,
            alleles,
            reads,
            active_region,
            next_active_region: RefCell::new(None),
            active_holdouts: vec![],
            holdout_region: None,
            rightmost_allele
        })
    }

    /// Produces the next batch of haplotypes and the region they were generated
    /// over. An empty batch with the region advanced past the rightmost allele
    /// signals completion.
    /// # Errors
    /// * `HaplotypeOverflow` when even holdout extraction cannot keep the
    ///   haplotype count under the hard limit; callers may skip the region
    pub fn generate(&mut self) -> Result<HaplotypeBatch, GeneratorError> {
        if self.alleles.is_empty() {
            return Ok((vec![], self.active_region.clone()));
        }
        if self.in_holdout_mode() && self.can_reintroduce_holdouts() {
            self.reintroduce_holdouts();
            let num_haplotypes = self.tree.num_haplotypes();
            if num_haplotypes > self.policies.haplotype_limits.overflow {
                return Err(GeneratorError::HaplotypeOverflow {
                    region: self.active_region.clone(),
                    size: num_haplotypes
                });
            }
            self.active_region = self.tree.encompassing_region().expect("non-empty tree");
            self.reset_next_active_region();
        } else {
            self.update_next_active_region();
            let next_active = self.next_active_region.borrow().clone().expect("planned region");
            if next_active.is_after(self.rightmost_allele.region()) {
                // nothing left to do
                return Ok((vec![], next_active));
            }

            self.progress(next_active.clone());

            let novel_active_region = if self.tree.is_empty() {
                next_active.clone()
            } else {
                next_active.right_overhang(&self.active_region)
            };
            let novel_active_alleles = self.alleles.copy_overlapped(&novel_active_region);
            let applied = self.tree.extend_until(&novel_active_alleles, self.policies.haplotype_limits.holdout);

            if applied != novel_active_alleles.len() {
                self.reset_next_active_region();
                if self.can_extract_holdouts() {
                    self.extract_holdouts(novel_active_region.clone());
                    self.tree.clear(&novel_active_region);

                    self.update_next_active_region();
                    let new_active = self.next_active_region.borrow().clone().expect("planned region");
                    self.active_region = new_active;
                    self.reset_next_active_region();

                    let new_novel_alleles = self.alleles.copy_overlapped(&self.active_region);
                    let applied = self.tree.extend_until(&new_novel_alleles, self.policies.haplotype_limits.overflow);
                    if applied != new_novel_alleles.len() {
                        return Err(GeneratorError::HaplotypeOverflow {
                            region: self.active_region.clone(),
                            size: self.tree.num_haplotypes()
                        });
                    }
                } else {
                    let more = self.tree.extend_until(
                        &novel_active_alleles[applied..],
                        self.policies.haplotype_limits.overflow
                    );
                    self.active_region = self.tree.encompassing_region().expect("non-empty tree");
                    if applied + more != novel_active_alleles.len() {
                        return Err(GeneratorError::HaplotypeOverflow {
                            region: self.active_region.clone(),
                            size: self.tree.num_haplotypes()
                        });
                    }
                }
            } else {
                self.active_region = next_active;
                self.reset_next_active_region();
            }
        }
        let haplotypes = self.tree.extract_haplotypes(&self.calculate_haplotype_region());
        if !self.is_lagging_enabled() {
            self.tree.clear_all();
        }
        Ok((haplotypes, self.active_region.clone()))
    }

    /// The region the next `generate` call would process, or `None` in holdout
    /// mode. Does not change observable state.
    pub fn peek_next_active_region(&self) -> Option<GenomicRegion> {
        if self.in_holdout_mode() {
            return None;
        }
        self.update_next_active_region();
        self.next_active_region.borrow().clone()
    }

    /// Drops the tree, the plan cache, and any holdouts.
    pub fn clear_progress(&mut self) {
        self.tree.clear_all();
        self.reset_next_active_region();
        if self.in_holdout_mode() {
            self.clear_holdouts();
        }
    }

    /// Resets progress and fast-forwards to `region`.
    pub fn jump(&mut self, region: GenomicRegion) {
        self.clear_progress();
        self.progress(region);
    }

    /// Whether clearing tree state and re-planning can gain anything right now.
    pub fn removal_has_impact(&self) -> bool {
        if self.in_holdout_mode() {
            return true;
        }
        if !self.is_lagging_enabled() || self.active_region.contains(self.rightmost_allele.region()) {
            return false;
        }
        let walker = self.lagged_walker.as_ref().expect("lagging enabled");
        let max_lagged_region = walker.walk(&self.active_region, self.reads, &self.alleles);
        max_lagged_region.overlaps(&self.active_region)
    }

    /// Estimates how many haplotypes a tree clear would discard.
    pub fn max_removal_impact(&self) -> usize {
        if self.in_holdout_mode() {
            return self.tree.num_haplotypes();
        }
        if !self.is_lagging_enabled() || self.active_region.contains(self.rightmost_allele.region()) {
            return 0;
        }
        let walker = self.lagged_walker.as_ref().expect("lagging enabled");
        let max_lagged_region = walker.walk(&self.active_region, self.reads, &self.alleles);
        if !max_lagged_region.overlaps(&self.active_region) {
            return 0;
        }
        let novel_region = max_lagged_region.right_overhang(&self.active_region);
        let num_novel_alleles = self.alleles.count_overlapped(&novel_region);
        if num_novel_alleles == 0 {
            return 0;
        }
        let max_new_haplotypes = estimate_num_haplotypes(num_novel_alleles / 2).max(1);
        let num_leftover_haplotypes = self.policies.haplotype_limits.target / max_new_haplotypes;
        let cur_num_haplotypes = self.tree.num_haplotypes();
        if cur_num_haplotypes > num_leftover_haplotypes {
            cur_num_haplotypes - num_leftover_haplotypes
        } else {
            cur_num_haplotypes
        }
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    // planning

    fn is_lagging_enabled(&self) -> bool {
        self.lagged_walker.is_some()
    }

    fn in_holdout_mode(&self) -> bool {
        !self.active_holdouts.is_empty()
    }

    fn reset_next_active_region(&self) {
        *self.next_active_region.borrow_mut() = None;
    }

    fn update_next_active_region(&self) {
        if self.next_active_region.borrow().is_some() {
            return;
        }
        let next = if self.is_lagging_enabled() || self.in_holdout_mode() {
            // holdout mode requires lagging to revisit the held-out region
            self.compute_lagged_next_active_region()
        } else {
            self.default_walker.walk(&self.active_region, self.reads, &self.alleles)
        };
        debug_assert!(self.in_holdout_mode() || self.active_region <= next);
        *self.next_active_region.borrow_mut() = Some(next);
    }

    fn compute_lagged_next_active_region(&self) -> GenomicRegion {
        if self.active_region.contains(self.rightmost_allele.region()) {
            // nothing more to do
            return self.rightmost_allele.region().tail_region().shift(2);
        }
        let max_lagged_region = if self.in_holdout_mode() {
            self.holdout_walker.walk(&self.active_region, self.reads, &self.alleles)
        } else {
            let walker = self.lagged_walker.as_ref().expect("lagging enabled");
            walker.walk(&self.active_region, self.reads, &self.alleles)
        };
        if !self.active_region.overlaps(&max_lagged_region) {
            return max_lagged_region;
        }

        // plan on a trial tree to see how much lag the limits allow
        let mut test_tree = self.tree.clone();
        let limits = self.policies.haplotype_limits;

        if self.active_region.begins_before(&max_lagged_region) {
            let novel_region = max_lagged_region.right_overhang(&self.active_region);
            let novel_alleles = self.alleles.copy_overlapped(&novel_region);
            let applied = test_tree.extend_until(&novel_alleles, limits.target);
            if applied == novel_alleles.len() {
                // everything fits, ignore the walker as we have better information
                return test_tree.encompassing_region().expect("non-empty tree");
            }
            test_tree.clear(&novel_region);

            let passed_region = self.active_region.left_overhang(&max_lagged_region);
            let passed_alleles = self.alleles.copy_overlapped(&passed_region);
            if can_remove_entire_passed_region(&max_lagged_region, &passed_alleles) {
                test_tree.clear(&passed_region);
            } else if requires_staged_removal(&passed_alleles) {
                let first_removal_region = passed_region.expand_rhs(-1);
                test_tree.clear(&first_removal_region);
                test_tree.clear(&first_removal_region.tail_region());
            } else {
                test_tree.clear(&passed_region.expand_rhs(-1));
            }
        }

        let novel_region = max_lagged_region.right_overhang(&self.active_region);
        let novel_alleles = self.alleles.copy_overlapped(&novel_region);
        debug_assert!(!novel_alleles.is_empty());
        let mut novel_regions = extract_mutually_exclusive_regions(&novel_alleles);

        let indicator_region = self.active_region.intersect(&max_lagged_region).expect("lagged region overlaps");
        let indicator_alleles = self.alleles.copy_overlapped(&indicator_region);
        let indicator_regions = extract_mutually_exclusive_regions(&indicator_alleles);
        if indicator_regions.last().is_some() && indicator_regions.last() == novel_regions.first() {
            // a boundary insertion appears on both sides, keep it with the indicators
            debug_assert!(novel_regions[0].is_empty());
            novel_regions.remove(0);
        }
        if !self.in_holdout_mode() {
            for region in indicator_regions.iter() {
                if test_tree.num_haplotypes() < limits.target {
                    break;
                }
                test_tree.clear(region);
            }
        }

        let mut num_novel_regions_added = 0;
        for (i, region) in novel_regions.iter().enumerate() {
            let interacting: Vec<Allele> = novel_alleles.iter()
                .filter(|allele| allele.region().overlaps(region))
                .cloned()
                .collect();
            let applied = test_tree.extend_until(&interacting, limits.overflow);
            if applied != interacting.len() {
                test_tree.clear_all();
                break;
            }
            num_novel_regions_added += 1;
            if test_tree.num_haplotypes() > limits.target {
                if num_novel_regions_added > 1 {
                    test_tree.clear(region);
                    num_novel_regions_added -= 1;
                    let prev_novel_region = &novel_regions[i - 1];
                    if prev_novel_region.is_empty() {
                        // watch out for the edge case where good insertions also get cleared
                        for allele in novel_alleles.iter().filter(|a| a.region().overlaps(prev_novel_region)) {
                            test_tree.extend(allele);
                        }
                    }
                }
                break;
            } else if test_tree.num_haplotypes() == limits.target {
                break;
            }
        }

        let next = if !test_tree.is_empty() {
            debug_assert!(num_novel_regions_added > 0);
            test_tree.encompassing_region().expect("non-empty tree")
        } else {
            // revert to non-lagged behaviour
            novel_region
        };
        if next == self.active_region {
            self.default_walker.walk(&self.active_region, self.reads, &self.alleles)
        } else {
            next
        }
    }

    /// Commits to processing `to` next: erases alleles the generator has passed
    /// for good, staging the removal when a boundary insertion must survive.
    fn progress(&mut self, to: GenomicRegion) {
        if to == self.active_region {
            return;
        }
        *self.next_active_region.borrow_mut() = Some(to.clone());
        if self.in_holdout_mode() {
            return;
        }
        if self.active_region.begins_before(&to) {
            let passed_region = self.active_region.left_overhang(&to);
            let passed_alleles = self.alleles.copy_overlapped(&passed_region);
            if passed_alleles.is_empty() {
                return;
            }
            if can_remove_entire_passed_region(&to, &passed_alleles) {
                self.alleles.erase_overlapped(&passed_region);
                self.tree.clear(&passed_region);
            } else if requires_staged_removal(&passed_alleles) {
                // insertions adjacent to the passed region belong to the next
                // active region; remove everything else first, then the trailing
                // position on its own
                let first_removal_region = passed_region.expand_rhs(-1);
                self.alleles.erase_overlapped(&first_removal_region);
                self.tree.clear(&first_removal_region);

                let second_removal_region = first_removal_region.tail_region();
                self.alleles.erase_overlapped(&second_removal_region);
                self.tree.clear(&second_removal_region);
            } else {
                let removal_region = passed_region.expand_rhs(-1);
                self.alleles.erase_overlapped(&removal_region);
                self.tree.clear(&removal_region);
            }
        } else if to.is_after(&self.active_region) {
            self.tree.clear_all();
        }
    }

    // holdouts

    fn can_extract_holdouts(&self) -> bool {
        self.active_holdouts.len() < self.policies.max_holdout_depth
    }

    fn extract_holdouts(&mut self, mut next_active_region: GenomicRegion) {
        debug_assert!(self.can_extract_holdouts());
        let mut active_alleles = self.alleles.copy_contained(&next_active_region);
        debug_assert!(!active_alleles.is_empty());

        let mut interaction_counts: PriorityQueue<GenomicRegion, usize> = PriorityQueue::new();
        for allele in active_alleles.iter() {
            let region = allele.region();
            if interaction_counts.get(region).is_none() {
                let count = active_alleles.iter()
                    .filter(|other| other.region().overlaps(region))
                    .count();
                interaction_counts.push(region.clone(), count);
            }
        }

        let mut new_holdouts: Vec<Allele> = vec![];
        loop {
            let (chosen_region, _) = interaction_counts.pop().expect("interaction counts remain");
            let (holdouts, remaining): (Vec<Allele>, Vec<Allele>) = active_alleles.into_iter()
                .partition(|allele| allele.region() == &chosen_region);
            debug_assert!(!holdouts.is_empty());
            self.active_holdouts.push(HoldoutFrame {
                alleles: holdouts.clone(),
                region: chosen_region
            });
            new_holdouts.extend(holdouts);
            active_alleles = remaining;

            let surviving: MappableSet<Allele> = active_alleles.iter().cloned().collect();
            next_active_region = self.default_walker.walk(&next_active_region.head_region(), self.reads, &surviving);

            if !self.can_extract_holdouts()
                || !require_more_holdouts(&surviving, &next_active_region, self.policies.haplotype_limits.holdout) {
                break;
            }
        }

        new_holdouts.sort();
        debug!("Adding {} alleles to the holdout stack", new_holdouts.len());
        for allele in new_holdouts.iter() {
            trace!("Holding out {} {:?}", allele.region(), String::from_utf8_lossy(allele.sequence()));
        }

        let new_region = rightmost_region(&new_holdouts)
            .expect("non-empty holdouts")
            .encompass(new_holdouts[0].region());
        self.holdout_region = Some(match self.holdout_region.take() {
            Some(region) => region.encompass(&new_region),
            None => new_region
        });
        self.alleles.erase_all(&new_holdouts);
    }

    fn can_reintroduce_holdouts(&self) -> bool {
        if !self.in_holdout_mode() {
            return true;
        }
        let holdout_region = self.holdout_region.as_ref().expect("holdout region in holdout mode");
        if !self.active_region.ends_before(holdout_region) {
            return true;
        }
        let remaining = holdout_region.right_overhang(&self.active_region);
        !self.alleles.has_overlapped(&remaining)
    }

    fn reintroduce_holdouts(&mut self) {
        debug_assert!(!self.active_holdouts.is_empty());
        let frame = self.active_holdouts.last().expect("non-empty holdout stack");
        debug!("Reintroducing {} holdout alleles from {}", frame.alleles.len(), frame.region);
        let frame_alleles = frame.alleles.clone();
        self.tree.splice(&frame_alleles);

        let holdout_region = self.holdout_region.clone().expect("holdout region in holdout mode");
        if holdout_region.ends_before(&self.active_region) {
            let extended_region = self.active_region.right_overhang(&holdout_region);
            let extension_alleles = self.alleles.copy_contained(&extended_region);
            for allele in extension_alleles.iter() {
                self.tree.extend(allele);
            }
        }

        let frame = self.active_holdouts.pop().expect("non-empty holdout stack");
        self.alleles.insert_all(frame.alleles);
        if self.active_holdouts.is_empty() {
            self.holdout_region = None;
        }
    }

    fn clear_holdouts(&mut self) {
        self.active_holdouts.clear();
        self.holdout_region = None;
    }

    /// The region haplotypes are materialized over: wide enough that every read
    /// overlapping the active region is fully contained, plus indel-aware padding.
    fn calculate_haplotype_region(&self) -> GenomicRegion {
        let overlapped = self.alleles.copy_overlapped(&self.active_region);

        // We want to keep haplotypes as small as possible, while allowing
        // sufficient flanking reference sequence for full read re-mapping. The
        // sum of indel sizes alone may not be enough as the candidate generator
        // may not propose all variation in the reads.
        let additional_padding = 2 * sum_indel_sizes(&overlapped) + self.min_flank_pad;

        if has_overlapped_reads(self.reads, &self.active_region) {
            let lhs_read = leftmost_overlapped_read(self.reads, &self.active_region)
                .expect("overlapping read");
            let rhs_read = rightmost_overlapped_read(self.reads, &self.active_region)
                .expect("overlapping read");
            let unpadded_region = lhs_read.region().encompass(rhs_read.region());

            if lhs_read.region().start() < additional_padding / 2 {
                let lhs_padding = lhs_read.region().start();
                let rhs_padding = additional_padding - lhs_padding;
                return unpadded_region.expand_asymmetric(lhs_padding, rhs_padding);
            }
            return unpadded_region.expand(additional_padding / 2);
        }
        self.active_region.expand(additional_padding / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genomic_region::ContigName;
    use crate::data_types::reads::AlignedRead;

    fn contig() -> ContigName {
        ContigName::from("1")
    }

    fn region(start: u64, end: u64) -> GenomicRegion {
        GenomicRegion::new(contig(), start, end)
    }

    fn test_reference() -> ReferenceGenome {
        ReferenceGenome::from_sequences(vec![("1".to_string(), b"ACGT".repeat(175))])
    }

    /// A heterozygous SNV at `pos` whose reference base matches the test reference.
    fn snv(reference: &ReferenceGenome, pos: u64) -> Variant {
        let ref_base = reference.fetch_sequence(&region(pos, pos + 1)).to_vec();
        let alt_base = if ref_base[0] == b'T' { b"G".to_vec() } else { b"T".to_vec() };
        Variant::new(region(pos, pos + 1), ref_base, alt_base).unwrap()
    }

    fn snv_candidates(reference: &ReferenceGenome, positions: &[u64]) -> MappableSet<Variant> {
        positions.iter().map(|&pos| snv(reference, pos)).collect()
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
    fn test_single_site_generates_then_terminates() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100]);
        let reads = ReadMap::default();
        let mut generator = PoliciesBuilder::new()
            .set_target_limit(64)
            .set_holdout_limit(128)
            .set_overflow_limit(256)
            .build(&reference, &candidates, &reads)
            .unwrap();

        let (haplotypes, active) = generator.generate().unwrap();
        assert_eq!(active, region(100, 101));
        assert_eq!(haplotypes.len(), 2);
        // both haplotypes cover the padded region around the site and differ at it
        let expected_region = region(85, 116);
        assert_eq!(haplotypes[0].region(), &expected_region);
        let sequences: Vec<&[u8]> = haplotypes.iter().map(|h| h.sequence()).collect();
        assert!(sequences.contains(&reference.fetch_sequence(&expected_region)));
        assert_ne!(sequences[0], sequences[1]);

        let (empty, terminal) = generator.generate().unwrap();
        assert!(empty.is_empty());
        assert!(terminal.start() > 101);

        // termination is stable
        let (again, _) = generator.generate().unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_two_sites_in_separate_batches() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100, 400]);
        let reads = ReadMap::default();
        // a tiny target keeps the walker to one site per batch
        let mut generator = PoliciesBuilder::new()
            .set_target_limit(2)
            .set_holdout_limit(4)
            .set_overflow_limit(8)
            .build(&reference, &candidates, &reads)
            .unwrap();

        let (batch1, active1) = generator.generate().unwrap();
        assert_eq!(active1, region(100, 101));
        assert_eq!(batch1.len(), 2);

        let (batch2, active2) = generator.generate().unwrap();
        assert_eq!(active2, region(400, 401));
        assert_eq!(batch2.len(), 2);

        let (batch3, terminal) = generator.generate().unwrap();
        assert!(batch3.is_empty());
        assert!(terminal.start() > 401);
    }

    #[test]
    fn test_peek_matches_generate() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100, 400]);
        let reads = ReadMap::default();
        let mut generator = PoliciesBuilder::new()
            .set_target_limit(2)
            .set_holdout_limit(4)
            .set_overflow_limit(8)
            .build(&reference, &candidates, &reads)
            .unwrap();

        let peeked = generator.peek_next_active_region().unwrap();
        let (_, active) = generator.generate().unwrap();
        assert_eq!(peeked, active);

        let peeked = generator.peek_next_active_region().unwrap();
        let (_, active) = generator.generate().unwrap();
        assert_eq!(peeked, active);
    }

    #[test]
    fn test_clear_progress_restores_first_batch() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100, 400]);
        let reads = ReadMap::default();
        let builder = PoliciesBuilder::new()
            .set_target_limit(2)
            .set_holdout_limit(4)
            .set_overflow_limit(8);

        let mut primed = builder.build(&reference, &candidates, &reads).unwrap();
        primed.peek_next_active_region();
        primed.clear_progress();

        let mut fresh = builder.build(&reference, &candidates, &reads).unwrap();
        assert_eq!(primed.generate().unwrap(), fresh.generate().unwrap());
    }

    #[test]
    fn test_jump_skips_ahead() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100, 400]);
        let reads = ReadMap::default();
        let mut generator = PoliciesBuilder::new()
            .set_target_limit(2)
            .set_holdout_limit(4)
            .set_overflow_limit(8)
            .build(&reference, &candidates, &reads)
            .unwrap();

        generator.jump(region(400, 401));
        let (haplotypes, active) = generator.generate().unwrap();
        assert_eq!(active, region(400, 401));
        assert_eq!(haplotypes.len(), 2);

        let (empty, terminal) = generator.generate().unwrap();
        assert!(empty.is_empty());
        assert!(terminal.start() > 401);
    }

    #[test]
    fn test_dense_cluster_with_spanning_deletion_uses_holdouts() {
        let reference = test_reference();
        // a 14 base deletion over four SNV sites: every SNV conflicts with the
        // deletion's reference allele, so the site interactions explode
        let deletion = Variant::new(
            region(100, 114),
            reference.fetch_sequence(&region(100, 114)).to_vec(),
            vec![]
        ).unwrap();
        let mut candidates = snv_candidates(&reference, &[102, 105, 108, 111]);
        candidates.insert(deletion);
        let reads = ReadMap::default();

        let mut generator = PoliciesBuilder::new()
            .set_target_limit(8)
            .set_holdout_limit(16)
            .set_overflow_limit(64)
            .set_max_holdout_depth(1)
            .build(&reference, &candidates, &reads)
            .unwrap();

        // the deletion pair goes onto the holdout stack and the SNVs process alone
        let (batch1, active1) = generator.generate().unwrap();
        assert_eq!(active1, region(102, 109));
        assert_eq!(batch1.len(), 8);

        let (batch2, active2) = generator.generate().unwrap();
        assert_eq!(active2, region(111, 112));
        assert_eq!(batch2.len(), 2);

        // once the active region passes the remaining holdout alleles they are
        // spliced back in over their original region
        let (batch3, active3) = generator.generate().unwrap();
        assert_eq!(active3, region(100, 114));
        assert_eq!(batch3.len(), 2);
        let deletion_haplotype_len = (batch3[0].sequence().len()).min(batch3[1].sequence().len());
        let full_len = batch3[0].region().len() as usize;
        assert_eq!(deletion_haplotype_len, full_len - 14);

        let (batch4, terminal) = generator.generate().unwrap();
        assert!(batch4.is_empty());
        assert!(terminal.start() >= 114);
    }

    #[test]
    fn test_dense_snv_cluster_respects_limits() {
        let reference = test_reference();
        // 40 SNVs packed into 30 bases: one per position plus a second alternate
        // over the first ten positions
        let mut variant_list: Vec<Variant> = (100..130).map(|pos| snv(&reference, pos)).collect();
        for pos in 100..110 {
            let ref_base = reference.fetch_sequence(&region(pos, pos + 1)).to_vec();
            let alt_base = if ref_base[0] == b'C' { b"A".to_vec() } else { b"C".to_vec() };
            variant_list.push(Variant::new(region(pos, pos + 1), ref_base, alt_base).unwrap());
        }
        let candidates: MappableSet<Variant> = variant_list.into_iter().collect();
        let reads = ReadMap::default();

        let mut generator = PoliciesBuilder::new()
            .set_target_limit(64)
            .set_holdout_limit(128)
            .set_overflow_limit(256)
            .set_max_holdout_depth(1)
            .build(&reference, &candidates, &reads)
            .unwrap();

        let mut batches = 0;
        loop {
            match generator.generate() {
                Ok((haplotypes, active)) => {
                    if haplotypes.is_empty() {
                        assert!(active.start() >= 130);
                        break;
                    }
                    assert!(haplotypes.len() <= 256);
                },
                Err(GeneratorError::HaplotypeOverflow { region: overflowed, size }) => {
                    // allowed outcome: the offending region must enclose part of
                    // the cluster and really be over the limit
                    assert!(overflowed.start() >= 100 && overflowed.end() <= 130);
                    assert!(size > 256);
                    break;
                },
                Err(e) => panic!("unexpected generator error: {e}")
            }
            batches += 1;
            assert!(batches < 50, "generator failed to terminate");
        }
    }

    #[test]
    fn test_lagged_generation_carries_indicators() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100, 105, 110, 115, 120, 610, 620]);
        // reads chain the first cluster together and across the gap
        let reads = read_map(&[(90, 130), (105, 612), (600, 650)]);

        let mut generator = PoliciesBuilder::new()
            .set_lagging_policy(LaggingPolicy::Normal)
            .set_target_limit(16)
            .set_holdout_limit(128)
            .set_overflow_limit(256)
            .build(&reference, &candidates, &reads)
            .unwrap();

        let (batch1, active1) = generator.generate().unwrap();
        assert_eq!(active1, region(100, 116));
        assert_eq!(batch1.len(), 16);

        // with the tree at target, re-planning has something to reclaim
        assert!(generator.removal_has_impact());
        assert_eq!(generator.max_removal_impact(), 8);

        // the second batch drops the leftmost site and carries the rest forward
        let (batch2, active2) = generator.generate().unwrap();
        assert_eq!(active2, region(105, 121));
        assert_eq!(batch2.len(), 16);
        assert!(active2.start() < active1.end());

        let mut last_start = active2.start();
        for _ in 0..30 {
            let (haplotypes, active) = generator.generate().unwrap();
            assert!(active.start() >= last_start);
            last_start = active.start();
            if haplotypes.is_empty() {
                assert!(active.start() > 621);
                return;
            }
        }
        panic!("lagged generator failed to terminate");
    }

    #[test]
    fn test_unlagged_generator_reports_no_removal_impact() {
        let reference = test_reference();
        let candidates = snv_candidates(&reference, &[100, 400]);
        let reads = ReadMap::default();
        let mut generator = PoliciesBuilder::new()
            .set_target_limit(2)
            .set_holdout_limit(4)
            .set_overflow_limit(8)
            .build(&reference, &candidates, &reads)
            .unwrap();
        generator.generate().unwrap();
        assert!(!generator.removal_has_impact());
        assert_eq!(generator.max_removal_impact(), 0);
    }

    #[test]
    fn test_construction_errors() {
        let reference = test_reference();
        let reads = ReadMap::default();

        let empty: MappableSet<Variant> = MappableSet::new();
        let result = PoliciesBuilder::new().build(&reference, &empty, &reads);
        assert!(result.is_err());

        let candidates = snv_candidates(&reference, &[100]);
        let result = PoliciesBuilder::new()
            .set_holdout_limit(10)
            .set_overflow_limit(5)
            .build(&reference, &candidates, &reads);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_target_limit_lifts_stale_limits() {
        let builder = PoliciesBuilder::new()
            .set_holdout_limit(100)
            .set_overflow_limit(200)
            .set_target_limit(150);
        let limits = builder.policies().haplotype_limits;
        assert_eq!(limits.target, 150);
        assert_eq!(limits.holdout, 151);
        assert_eq!(limits.overflow, 200);

        // limits that still exceed the target are left alone
        let builder = PoliciesBuilder::new().set_target_limit(50);
        let limits = builder.policies().haplotype_limits;
        assert_eq!(limits.holdout, 2048);
        assert_eq!(limits.overflow, 8192);
    }

    #[test]
    fn test_requires_staged_removal() {
        let single_base = Allele::new(region(109, 110), b"A".to_vec());
        let insertion = Allele::new(region(110, 110), b"GG".to_vec());
        let spanning = Allele::new(region(105, 110), b"".to_vec());

        assert!(requires_staged_removal(&[single_base.clone(), insertion.clone()]));
        // a trailing non-insertion never needs staging
        assert!(!requires_staged_removal(&[insertion.clone(), single_base.clone()]));
        // insertions preceded by a multi-base allele do not need staging
        assert!(!requires_staged_removal(&[spanning, insertion.clone()]));
        assert!(!requires_staged_removal(&[insertion]));
        assert!(!requires_staged_removal(&[]));
    }

    #[test]
    fn test_extract_mutually_exclusive_regions() {
        let alleles = vec![
            Allele::new(region(10, 11), b"A".to_vec()),
            Allele::new(region(10, 11), b"C".to_vec()),
            Allele::new(region(10, 15), b"".to_vec()),
            Allele::new(region(20, 21), b"G".to_vec())
        ];
        let regions = extract_mutually_exclusive_regions(&alleles);
        assert_eq!(regions, vec![region(10, 15), region(20, 21)]);
    }
}
