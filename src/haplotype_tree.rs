
use crate::data_types::alleles::{Allele, Haplotype};
use crate::data_types::genomic_region::{ContigName, GenomicRegion};
use crate::data_types::reference_genome::ReferenceGenome;

use log::trace;

/// An incremental prefix tree over alleles. Each root-to-leaf path is a mutually
/// compatible allele subset; materializing a path against the reference yields one
/// candidate haplotype. Alleles must be added in sorted order.
///
/// The tree is represented by its leaf paths directly: every operation keeps the
/// path list sorted and deduplicated, so the state after any `clear`/`splice` is
/// identical to replaying the surviving alleles through `extend` in order.
#[derive(Clone)]
pub struct HaplotypeTree<'a> {
    contig: ContigName,
    reference: &'a ReferenceGenome,
    /// each path is a sorted, pairwise-compatible allele list
    paths: Vec<Vec<Allele>>
}

impl<'a> HaplotypeTree<'a> {
    pub fn new(contig: ContigName, reference: &'a ReferenceGenome) -> HaplotypeTree<'a> {
        HaplotypeTree {
            contig,
            reference,
            paths: vec![]
        }
    }

    pub fn contig(&self) -> &ContigName {
        &self.contig
    }

    pub fn num_haplotypes(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Grows every branch that can accept `allele`; mutually exclusive alleles
    /// branch at the deepest compatible ancestor. Returns whether the tree grew.
    pub fn extend(&mut self, allele: &Allele) -> bool {
        debug_assert_eq!(allele.region().contig(), &self.contig);
        if self.paths.is_empty() {
            self.paths.push(vec![allele.clone()]);
            return true;
        }
        let mut next_paths: Vec<Vec<Allele>> = Vec::with_capacity(2 * self.paths.len());
        let mut grown = false;
        for path in self.paths.iter() {
            // drop the suffix of alleles the new allele conflicts with; alleles
            // arrive sorted, so conflicts are always a trailing run
            let mut keep = path.len();
            while keep > 0 && path[keep - 1].region().overlaps(allele.region()) {
                keep -= 1;
            }
            let mut candidate = path[..keep].to_vec();
            candidate.push(allele.clone());
            if keep < path.len() {
                // branched at an ancestor, the original leaf survives
                next_paths.push(path.clone());
            } else {
                grown = true;
            }
            next_paths.push(candidate);
        }
        next_paths.sort();
        next_paths.dedup();
        grown = grown || next_paths.len() > self.paths.len();
        self.paths = next_paths;
        grown
    }

    /// Extends with `alleles` in order, stopping before any allele whose addition
    /// would push the haplotype count past `limit`. Returns the number of alleles
    /// applied; the count never exceeds `limit` on return.
    pub fn extend_until(&mut self, alleles: &[Allele], limit: usize) -> usize {
        for (applied, allele) in alleles.iter().enumerate() {
            let before = self.paths.clone();
            self.extend(allele);
            if self.num_haplotypes() > limit {
                self.paths = before;
                trace!("Tree extension stopped at {applied}/{} alleles by limit {limit}", alleles.len());
                return applied;
            }
        }
        alleles.len()
    }

    /// Removes every allele intersecting `region`; branches that become identical
    /// collapse together and emptied branches disappear.
    pub fn clear(&mut self, region: &GenomicRegion) {
        for path in self.paths.iter_mut() {
            path.retain(|allele| !allele.region().overlaps(region));
        }
        self.paths.retain(|path| !path.is_empty());
        self.paths.sort();
        self.paths.dedup();
    }

    /// Resets the tree to empty.
    pub fn clear_all(&mut self) {
        self.paths.clear();
    }

    /// Bulk-reintroduces alleles (typically returning holdouts) by replaying the
    /// union of the current tree's alleles and the new ones.
    pub fn splice(&mut self, alleles: &[Allele]) {
        let mut union: Vec<Allele> = self.paths.iter().flatten().cloned().collect();
        union.extend(alleles.iter().cloned());
        union.sort();
        union.dedup();
        self.paths.clear();
        for allele in union.iter() {
            self.extend(allele);
        }
    }

    /// The smallest region covering every allele in the tree.
    pub fn encompassing_region(&self) -> Option<GenomicRegion> {
        let mut result: Option<GenomicRegion> = None;
        for allele in self.paths.iter().flatten() {
            result = Some(match result {
                Some(region) => region.encompass(allele.region()),
                None => allele.region().clone()
            });
        }
        result
    }

    /// Materializes one haplotype per branch over `bounding_region`, flanking and
    /// gap-filling with reference sequence. Alleles that stick out of the bounding
    /// region are replaced by reference.
    pub fn extract_haplotypes(&self, bounding_region: &GenomicRegion) -> Vec<Haplotype> {
        let mut result: Vec<Haplotype> = Vec::with_capacity(self.paths.len());
        for path in self.paths.iter() {
            let mut sequence: Vec<u8> = vec![];
            let mut cursor = bounding_region.start();
            for allele in path.iter() {
                let allele_region = allele.region();
                if allele_region.start() < cursor || allele_region.end() > bounding_region.end() {
                    trace!("Skipping allele at {} outside haplotype region {}", allele_region, bounding_region);
                    continue;
                }
                let gap = GenomicRegion::new(self.contig.clone(), cursor, allele_region.start());
                sequence.extend_from_slice(self.reference.fetch_sequence(&gap));
                sequence.extend_from_slice(allele.sequence());
                cursor = allele_region.end();
            }
            let tail = GenomicRegion::new(self.contig.clone(), cursor, bounding_region.end());
            sequence.extend_from_slice(self.reference.fetch_sequence(&tail));
            result.push(Haplotype::new(bounding_region.clone(), sequence));
        }
        result
    }
}
