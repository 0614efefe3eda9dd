
use crate::data_types::genomic_region::GenomicRegion;

use bio::io::fasta;
use flate2::bufread::MultiGzDecoder;
use log::{debug, info, warn};
use rustc_hash::FxHashMap as HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Wrapper structure for a reference genome held fully in memory
pub struct ReferenceGenome {
    /// The filename we loaded, if any
    filename: Option<PathBuf>,
    /// Contains the keys in order of the reference load
    contig_keys: Vec<String>,
    /// Map where keys are contig names and value is ASCII formatted sequence
    contig_map: HashMap<String, Vec<u8>>
}

impl ReferenceGenome {
    /// Loads a reference genome from a given FASTA file
    /// # Arguments
    /// * `fasta_fn` - the FASTA filename, gzip is allowed
    /// # Errors
    /// This will pass through any error detected from loading the provided FASTA file.
    /// This includes file reading and/or record reading errors.
    pub fn from_fasta(fasta_fn: &Path) -> Result<ReferenceGenome, Box<dyn std::error::Error>> {
        info!("Loading {:?}...", fasta_fn);
        let mut contig_keys: Vec<String> = Default::default();
        let mut contig_map: HashMap<String, Vec<u8>> = Default::default();

        let fasta_file: std::fs::File = std::fs::File::open(fasta_fn)?;
        let file_reader = BufReader::new(fasta_file);
        let fasta_reader: fasta::Reader<Box<dyn BufRead>> = if fasta_fn.extension().unwrap_or_default() == "gz" {
            debug!("Detected gzip extension, loading reference with MultiGzDecoder...");
            let gz_decoder = MultiGzDecoder::new(file_reader);
            let bufreader = BufReader::new(gz_decoder);
            fasta::Reader::from_bufread(Box::new(bufreader))
        } else {
            debug!("Loading reference as plain-text file...");
            fasta::Reader::from_bufread(Box::new(file_reader))
        };

        for entry in fasta_reader.records() {
            let record: fasta::Record = entry?;
            let seq_id: String = record.id().to_string();
            let sequence: Vec<u8> = record.seq().to_ascii_uppercase();

            contig_keys.push(seq_id.clone());
            contig_map.insert(seq_id, sequence);
        }
        info!("Finished loading {} contigs.", contig_map.len());

        Ok(ReferenceGenome {
            filename: Some(fasta_fn.to_path_buf()),
            contig_keys,
            contig_map
        })
    }

    /// Builds a reference genome directly from named sequences, mostly for tests and
    /// callers that already hold the contigs in memory.
    pub fn from_sequences(contigs: Vec<(String, Vec<u8>)>) -> ReferenceGenome {
        let contig_keys: Vec<String> = contigs.iter().map(|(name, _)| name.clone()).collect();
        let contig_map: HashMap<String, Vec<u8>> = contigs.into_iter().collect();
        ReferenceGenome {
            filename: None,
            contig_keys,
            contig_map
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn contig_names(&self) -> &[String] {
        &self.contig_keys
    }

    /// The length of a contig, or `None` for an unknown contig name.
    pub fn contig_size(&self, contig: &str) -> Option<u64> {
        self.contig_map.get(contig).map(|seq| seq.len() as u64)
    }

    /// Retrieves the reference bases over a region.
    /// If the region runs past the contig end it is truncated to the contig.
    /// # Arguments
    /// * `region` - the region to slice out
    /// # Panics
    /// * if the region's contig was not loaded
    pub fn fetch_sequence(&self, region: &GenomicRegion) -> &[u8] {
        let full_contig = self.contig_map.get(region.contig().as_ref())
            .expect("a contig from the reference");
        let start = region.start() as usize;
        let end = region.end() as usize;
        let truncated_start = if start <= full_contig.len() { start } else {
            warn!("Received fetch_sequence({}), truncated start to {}", region, full_contig.len());
            full_contig.len()
        };
        let truncated_end = if end <= full_contig.len() { end } else {
            warn!("Received fetch_sequence({}), truncated end to {}", region, full_contig.len());
            full_contig.len()
        };
        &full_contig[truncated_start..truncated_end]
    }

    /// Retrieves a full contig by name
    /// # Arguments
    /// * `contig` - the contig to slice from
    /// # Panics
    /// * if `contig` was not loaded
    pub fn full_contig(&self, contig: &str) -> &[u8] {
        let full_contig = self.contig_map.get(contig).expect("a contig from the reference");
        full_contig
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genomic_region::ContigName;

    #[test]
    fn test_from_sequences() {
        let reference = ReferenceGenome::from_sequences(vec![
            ("chr1".to_string(), b"ACGTACGT".to_vec()),
            ("chr2".to_string(), b"ACCATGTA".to_vec())
        ]);

        assert_eq!(reference.contig_names(), &["chr1".to_string(), "chr2".to_string()]);
        assert_eq!(reference.contig_size("chr1"), Some(8));
        assert_eq!(reference.contig_size("chrX"), None);

        let contig = ContigName::from("chr1");
        for i in 0..8 {
            let query = GenomicRegion::new(contig.clone(), i, 8);
            assert_eq!(reference.fetch_sequence(&query), &b"ACGTACGT"[i as usize..]);
        }

        // regions past the contig end are clamped
        let past_end = GenomicRegion::new(contig, 6, 20);
        assert_eq!(reference.fetch_sequence(&past_end), b"GT");
    }
}
