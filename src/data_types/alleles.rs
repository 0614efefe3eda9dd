
use crate::data_types::genomic_region::GenomicRegion;
use crate::data_types::mappable_set::Mappable;

use std::cmp::Ordering;

#[derive(thiserror::Error, Debug)]
pub enum VariantError {
    #[error("reference sequence length ({seq_len}) must match region length ({region_len})")]
    RefLengthMismatch { region_len: u64, seq_len: usize },
    #[error("reference and alternate sequences are identical")]
    IdenticalAlleles
}

/// A candidate sequence at a region: a substitution when the sequence length equals
/// the region length, an insertion when the region is empty, and a deletion when the
/// sequence is empty. Two alleles with the same region are alternatives at that site.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Allele {
    /// the region this allele replaces
    region: GenomicRegion,
    /// the replacement sequence
    sequence: Vec<u8>
}

impl Allele {
    pub fn new(region: GenomicRegion, sequence: Vec<u8>) -> Allele {
        Allele { region, sequence }
    }

    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn is_insertion(&self) -> bool {
        self.region.is_empty() && !self.sequence.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        !self.region.is_empty() && self.sequence.is_empty()
    }

    pub fn is_substitution(&self) -> bool {
        !self.region.is_empty() && self.region.len() == self.sequence.len() as u64
    }

    /// The number of bases this allele inserts or deletes, 0 for balanced alleles.
    pub fn indel_size(&self) -> u64 {
        let region_len = self.region.len();
        let seq_len = self.sequence.len() as u64;
        region_len.abs_diff(seq_len)
    }
}

impl Mappable for Allele {
    fn region(&self) -> &GenomicRegion {
        &self.region
    }
}

impl PartialOrd for Allele {
    fn partial_cmp(&self, other: &Allele) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Allele {
    fn cmp(&self, other: &Allele) -> Ordering {
        self.region.cmp(&other.region).then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// A reference/alternate allele pair sharing one region.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Variant {
    region: GenomicRegion,
    ref_sequence: Vec<u8>,
    alt_sequence: Vec<u8>
}

impl Variant {
    /// Creates a new variant after validating the allele pair.
    /// # Arguments
    /// * `region` - the replaced reference region
    /// * `ref_sequence` - the reference bases at `region`
    /// * `alt_sequence` - the alternate bases
    /// # Errors
    /// * if the reference sequence length does not match the region length
    /// * if the two sequences are identical
    pub fn new(region: GenomicRegion, ref_sequence: Vec<u8>, alt_sequence: Vec<u8>) -> Result<Variant, VariantError> {
        if region.len() != ref_sequence.len() as u64 {
            return Err(VariantError::RefLengthMismatch {
                region_len: region.len(),
                seq_len: ref_sequence.len()
            });
        }
        if ref_sequence == alt_sequence {
            return Err(VariantError::IdenticalAlleles);
        }
        Ok(Variant { region, ref_sequence, alt_sequence })
    }

    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    pub fn ref_sequence(&self) -> &[u8] {
        &self.ref_sequence
    }

    pub fn alt_sequence(&self) -> &[u8] {
        &self.alt_sequence
    }

    pub fn ref_allele(&self) -> Allele {
        Allele::new(self.region.clone(), self.ref_sequence.clone())
    }

    pub fn alt_allele(&self) -> Allele {
        Allele::new(self.region.clone(), self.alt_sequence.clone())
    }

    /// Splits the variant into its two alleles.
    pub fn decompose(self) -> (Allele, Allele) {
        let ref_allele = Allele::new(self.region.clone(), self.ref_sequence);
        let alt_allele = Allele::new(self.region, self.alt_sequence);
        (ref_allele, alt_allele)
    }
}

impl Mappable for Variant {
    fn region(&self) -> &GenomicRegion {
        &self.region
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Variant) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variant {
    fn cmp(&self, other: &Variant) -> Ordering {
        self.region.start().cmp(&other.region.start())
            .then_with(|| self.ref_sequence.len().cmp(&other.ref_sequence.len()))
            .then_with(|| self.alt_sequence.cmp(&other.alt_sequence))
            .then_with(|| self.region.contig().cmp(other.region.contig()))
    }
}

/// A candidate haplotype: the reference region it maps over plus the literal
/// sequence obtained by applying a consistent set of alleles to the reference.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Haplotype {
    region: GenomicRegion,
    sequence: Vec<u8>
}

impl Haplotype {
    pub fn new(region: GenomicRegion, sequence: Vec<u8>) -> Haplotype {
        Haplotype { region, sequence }
    }

    pub fn region(&self) -> &GenomicRegion {
        &self.region
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }
}

impl Mappable for Haplotype {
    fn region(&self) -> &GenomicRegion {
        &self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genomic_region::ContigName;

    fn region(start: u64, end: u64) -> GenomicRegion {
        GenomicRegion::new(ContigName::from("chr1"), start, end)
    }

    #[test]
    fn test_allele_classification() {
        let snv = Allele::new(region(5, 6), b"A".to_vec());
        assert!(snv.is_substitution());
        assert!(!snv.is_insertion());
        assert!(!snv.is_deletion());
        assert_eq!(snv.indel_size(), 0);

        let insertion = Allele::new(region(5, 5), b"ACG".to_vec());
        assert!(insertion.is_insertion());
        assert_eq!(insertion.indel_size(), 3);

        let deletion = Allele::new(region(5, 8), vec![]);
        assert!(deletion.is_deletion());
        assert_eq!(deletion.indel_size(), 3);
    }

    #[test]
    fn test_variant_validation() {
        assert!(Variant::new(region(5, 6), b"A".to_vec(), b"C".to_vec()).is_ok());
        assert!(matches!(
            Variant::new(region(5, 6), b"AC".to_vec(), b"C".to_vec()),
            Err(VariantError::RefLengthMismatch { .. })
        ));
        assert!(matches!(
            Variant::new(region(5, 6), b"A".to_vec(), b"A".to_vec()),
            Err(VariantError::IdenticalAlleles)
        ));
    }

    #[test]
    fn test_variant_decompose() {
        let variant = Variant::new(region(5, 6), b"A".to_vec(), b"C".to_vec()).unwrap();
        let (ref_allele, alt_allele) = variant.decompose();
        assert_eq!(ref_allele, Allele::new(region(5, 6), b"A".to_vec()));
        assert_eq!(alt_allele, Allele::new(region(5, 6), b"C".to_vec()));
    }

    #[test]
    fn test_allele_ordering_is_region_major() {
        let a = Allele::new(region(5, 6), b"C".to_vec());
        let b = Allele::new(region(5, 6), b"A".to_vec());
        let c = Allele::new(region(4, 6), b"TT".to_vec());
        let mut alleles = vec![a.clone(), b.clone(), c.clone()];
        alleles.sort();
        assert_eq!(alleles, vec![c, b, a]);
    }
}
