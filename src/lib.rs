
/// Local de Bruijn assembly of candidate variants from a reference window and reads
pub mod assembler;
/// Contains the value types shared across the crate: regions, alleles, reads, reference
pub mod data_types;
/// Decides the next active window over the allele stream from density and read support
pub mod genome_walker;
/// Streams batches of candidate haplotypes, bounding combinatorial blow-up with holdouts
pub mod haplotype_generator;
/// Incremental prefix tree over alleles; each branch is one candidate haplotype
pub mod haplotype_tree;
