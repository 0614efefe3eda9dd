
use crate::data_types::alleles::Variant;
use crate::data_types::genomic_region::GenomicRegion;

use bit_vec::BitVec;
use log::{debug, trace};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

/// Transition score marking an intentionally removed edge. Vertices only reachable
/// through blocked edges drop out of shortest-path relaxation entirely.
const BLOCKED_SCORE: f64 = f64::INFINITY;

/// Transition score for a zero-weight edge when its source has other outgoing weight.
const MAX_TRANSITION_SCORE: f64 = 100.0;

/// Bound on edge blockings per extraction call, guarding against the rare
/// non-terminating block/unblock oscillation.
const MAX_BLOCKINGS: usize = 50;

#[derive(thiserror::Error, Debug)]
pub enum AssemblerError {
    #[error("reference sequence contains non-canonical bases")]
    BadReferenceSequence,
    #[error("reference length ({length}) must be >= kmer size ({kmer_size})")]
    ReferenceTooShort { length: usize, kmer_size: usize },
    #[error("only one reference sequence can be inserted into the graph")]
    MultipleReferenceSequences,
    #[error("kmer graph is inconsistent and has been cleared")]
    GraphInconsistency
}

/// A raw variant in window coordinates: `begin_pos` is an offset into the inserted
/// reference sequence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssembledVariant {
    pub begin_pos: usize,
    pub ref_sequence: Vec<u8>,
    pub alt_sequence: Vec<u8>
}

/// A fixed-length sequence window with its hash computed once at construction.
/// Equality is sequence equality; hashing replays the cached value.
#[derive(Clone, Debug, Eq)]
struct Kmer {
    bytes: Box<[u8]>,
    hash: u64
}

impl Kmer {
    fn new(bytes: &[u8]) -> Kmer {
        let mut hasher = rustc_hash::FxHasher::default();
        bytes.hash(&mut hasher);
        Kmer {
            bytes: bytes.into(),
            hash: hasher.finish()
        }
    }

    fn back(&self) -> u8 {
        *self.bytes.last().expect("non-empty kmer")
    }
}

impl PartialEq for Kmer {
    fn eq(&self, other: &Kmer) -> bool {
        self.bytes == other.bytes
    }
}

impl Hash for Kmer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

fn is_canonical_dna(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| matches!(b, b'A' | b'C' | b'G' | b'T'))
}

fn count_kmers(sequence_len: usize, kmer_size: usize) -> usize {
    if sequence_len >= kmer_size {
        sequence_len - kmer_size + 1
    } else {
        0
    }
}

fn sequence_length(num_kmers: usize, kmer_size: usize) -> usize {
    num_kmers + kmer_size - 1
}

/// Stable handle to a vertex slot; slots are reused after removal.
type VertexId = usize;

#[derive(Clone, Debug)]
struct EdgeData {
    target: VertexId,
    weight: u32,
    is_reference: bool,
    transition_score: f64
}

#[derive(Clone, Debug)]
struct VertexData {
    /// compact index for external property maps, regenerated after deletions
    index: usize,
    kmer: Kmer,
    is_reference: bool,
    out_edges: Vec<EdgeData>,
    /// one entry per incoming edge
    in_edges: Vec<VertexId>
}

/// Local de Bruijn assembler: builds a weighted kmer graph over one reference
/// window plus reads, prunes it, and extracts the highest-scoring bubble paths
/// relative to the reference as candidate variants.
pub struct Assembler {
    k: usize,
    vertices: Vec<Option<VertexData>>,
    free_ids: Vec<VertexId>,
    num_vertices: usize,
    /// upper bound on the compact indices currently in use
    index_bound: usize,
    vertex_cache: HashMap<Kmer, VertexId>,
    reference_kmers: VecDeque<Kmer>,
    reference_head_position: usize
}

impl Assembler {
    /// Creates an empty assembler.
    /// # Arguments
    /// * `kmer_size` - the kmer length, must be at least 3
    /// # Panics
    /// * if `kmer_size < 3`
    pub fn new(kmer_size: usize) -> Assembler {
        assert!(kmer_size >= 3, "kmer_size must be >= 3, got {kmer_size}");
        Assembler {
            k: kmer_size,
            vertices: vec![],
            free_ids: vec![],
            num_vertices: 0,
            index_bound: 0,
            vertex_cache: Default::default(),
            reference_kmers: Default::default(),
            reference_head_position: 0
        }
    }

    /// Creates an assembler seeded with a reference sequence.
    /// # Arguments
    /// * `kmer_size` - the kmer length, must be at least 3
    /// * `reference` - the reference bases for this window
    /// # Errors
    /// * if the reference is shorter than `kmer_size` or contains non-canonical bases
    pub fn new_with_reference(kmer_size: usize, reference: &[u8]) -> Result<Assembler, AssemblerError> {
        let mut assembler = Assembler::new(kmer_size);
        assembler.insert_reference(reference)?;
        Ok(assembler)
    }

    pub fn kmer_size(&self) -> usize {
        self.k
    }

    pub fn num_kmers(&self) -> usize {
        self.vertex_cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_cache.is_empty()
    }

    /// Inserts the reference sequence for this window, marking its kmers and the
    /// edges joining them as reference. Only one reference can be inserted.
    /// # Errors
    /// * if a reference was already inserted
    /// * if the sequence is shorter than the kmer size
    /// * if any kmer contains a non-canonical base
    pub fn insert_reference(&mut self, sequence: &[u8]) -> Result<(), AssemblerError> {
        if !self.reference_kmers.is_empty() {
            return Err(AssemblerError::MultipleReferenceSequences);
        }
        if sequence.len() < self.k {
            return Err(AssemblerError::ReferenceTooShort {
                length: sequence.len(),
                kmer_size: self.k
            });
        }
        let populated = !self.is_empty();

        let mut prev_id: Option<VertexId> = None;
        for window in sequence.windows(self.k) {
            let kmer = Kmer::new(window);
            let v = match self.vertex_cache.get(&kmer) {
                Some(&v) => {
                    self.vertex_mut(v).is_reference = true;
                    v
                },
                None => {
                    match self.add_vertex(kmer.clone(), true) {
                        Some(v) => v,
                        None => {
                            self.clear();
                            return Err(AssemblerError::BadReferenceSequence);
                        }
                    }
                }
            };
            if let Some(u) = prev_id {
                match self.find_edge_position(u, v) {
                    Some(pos) => {
                        self.vertex_mut(u).out_edges[pos].is_reference = true;
                    },
                    None => {
                        self.add_edge(u, v, 0, true);
                    }
                }
            }
            self.reference_kmers.push_back(kmer);
            prev_id = Some(v);
        }
        if populated {
            self.regenerate_vertex_indices();
        }
        self.reference_head_position = 0;
        Ok(())
    }

    /// Inserts a read sequence, adding kmer vertices and incrementing edge weights.
    /// Kmers with non-canonical bases are dropped, breaking the read's kmer chain.
    /// Reads shorter than the kmer size are ignored.
    pub fn insert_read(&mut self, sequence: &[u8]) {
        if sequence.len() < self.k {
            return;
        }
        let mut windows = sequence.windows(self.k);
        let first = Kmer::new(windows.next().expect("at least one kmer"));
        let mut prev_good = match self.vertex_cache.get(&first) {
            Some(_) => true,
            None => self.add_vertex(first.clone(), false).is_some()
        };
        let mut prev_kmer = first;
        for window in windows {
            let kmer = Kmer::new(window);
            match self.vertex_cache.get(&kmer) {
                None => {
                    match self.add_vertex(kmer.clone(), false) {
                        Some(v) => {
                            if prev_good {
                                let u = self.vertex_cache[&prev_kmer];
                                self.add_edge(u, v, 1, false);
                            }
                            prev_good = true;
                        },
                        None => {
                            prev_good = false;
                        }
                    }
                },
                Some(&v) => {
                    if prev_good {
                        let u = self.vertex_cache[&prev_kmer];
                        match self.find_edge_position(u, v) {
                            Some(pos) => {
                                self.vertex_mut(u).out_edges[pos].weight += 1;
                            },
                            None => {
                                self.add_edge(u, v, 1, false);
                            }
                        }
                    } else {
                        prev_good = true;
                    }
                }
            }
            prev_kmer = kmer;
        }
    }

    /// Drops all graph state.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.free_ids.clear();
        self.num_vertices = 0;
        self.index_bound = 0;
        self.vertex_cache.clear();
        self.reference_kmers.clear();
        self.reference_head_position = 0;
    }

    /// True if the graph has no cycles (self-loops included).
    pub fn is_acyclic(&self) -> bool {
        self.topological_order().is_ok()
    }

    /// True if every edge lies on the reference path.
    pub fn is_all_reference(&self) -> bool {
        self.live_vertices().all(|(_, vd)| vd.out_edges.iter().all(|e| e.is_reference))
    }

    /// Prunes the graph: trivial cycles, low-weight edges, disconnected and
    /// unreachable vertices, and reference-only flanks. Returns `false` if the
    /// graph was found inconsistent, in which case it has been cleared.
    pub fn prune(&mut self, min_weight: u32) -> bool {
        if self.is_empty() {
            return true;
        }
        if self.reference_kmers.is_empty() || !self.is_reference_unique_path() {
            debug!("Pruning found a non-unique reference path, clearing graph");
            self.clear();
            return false;
        }
        let mut old_size = self.num_vertices;
        if old_size < 2 {
            return true;
        }

        self.remove_trivial_nonreference_cycles();
        let mut new_size = self.num_vertices;
        if new_size != old_size {
            self.regenerate_vertex_indices();
            if new_size < 2 {
                return true;
            }
            old_size = new_size;
        }
        debug_assert!(self.is_reference_unique_path());

        self.remove_low_weight_edges(min_weight);
        self.remove_disconnected_vertices();
        new_size = self.num_vertices;
        if new_size != old_size {
            self.regenerate_vertex_indices();
            if new_size < 2 {
                return true;
            }
            old_size = new_size;
        }
        debug_assert!(self.is_reference_unique_path());

        self.remove_vertices_unreachable_from(self.reference_head());
        new_size = self.num_vertices;
        if new_size != old_size {
            self.regenerate_vertex_indices();
            if new_size < 2 {
                return true;
            }
            old_size = new_size;
        }
        debug_assert!(self.is_reference_unique_path());

        self.remove_vertices_past(self.reference_tail());
        new_size = self.num_vertices;
        if new_size != old_size {
            self.regenerate_vertex_indices();
            if new_size < 2 {
                return true;
            }
            old_size = new_size;
        }
        debug_assert!(self.is_reference_unique_path());

        self.remove_vertices_that_cant_reach(self.reference_tail());
        new_size = self.num_vertices;
        if new_size != old_size {
            self.regenerate_vertex_indices();
            if new_size < 2 {
                return true;
            }
            old_size = new_size;
        }
        debug_assert!(self.is_reference_unique_path());

        if self.can_prune_reference_flanks() {
            if !self.is_acyclic() {
                debug!("Pruning found a cycle while trimming reference flanks, clearing graph");
                self.clear();
                return false;
            }
            self.prune_reference_flanks();
        }
        debug_assert!(self.is_reference_unique_path());
        if self.reference_kmers.is_empty() {
            self.clear();
            return true;
        }
        if self.can_prune_reference_flanks() {
            // something is wrong, have seen cases, bug?
            self.clear();
            return false;
        }
        new_size = self.num_vertices;
        debug_assert!(new_size != 0);
        if new_size != old_size {
            self.regenerate_vertex_indices();
        }
        true
    }

    /// Extracts up to `max` candidate variants from the highest-scoring bubble
    /// paths, sorted by `(begin_pos, ref length, alt)` and deduplicated by
    /// `(begin_pos, alt)`.
    /// # Errors
    /// * `GraphInconsistency` if a cycle prevents shortest-path scoring; the graph
    ///   is cleared before returning
    pub fn extract_variants(&mut self, max: usize) -> Result<VecDeque<AssembledVariant>, AssemblerError> {
        if self.is_empty() || self.is_all_reference() {
            return Ok(VecDeque::new());
        }
        self.set_all_edge_transition_scores();
        let mut result = match self.extract_k_highest_scoring_bubble_paths(max) {
            Ok(variants) => variants,
            Err(e) => {
                self.clear();
                return Err(e);
            }
        };
        let mut sorted: Vec<AssembledVariant> = result.drain(..).collect();
        sorted.sort_by(|lhs, rhs| {
            lhs.begin_pos.cmp(&rhs.begin_pos)
                .then(lhs.ref_sequence.len().cmp(&rhs.ref_sequence.len()))
                .then(lhs.alt_sequence.cmp(&rhs.alt_sequence))
        });
        sorted.dedup_by(|a, b| a.begin_pos == b.begin_pos && a.alt_sequence == b.alt_sequence);
        Ok(sorted.into_iter().collect())
    }

    /// Extracts variants and lifts them into genome coordinates over `region`,
    /// trimming the shared kmer padding from each allele pair.
    /// # Arguments
    /// * `region` - the genomic region the inserted reference sequence came from
    /// * `max` - the maximum number of bubble paths to extract
    /// # Errors
    /// * passes through any `extract_variants` error
    pub fn extract_region_variants(&mut self, region: &GenomicRegion, max: usize) -> Result<Vec<Variant>, AssemblerError> {
        let raw = self.extract_variants(max)?;
        let mut result: Vec<Variant> = Vec::with_capacity(raw.len());
        for assembled in raw {
            let mut begin = region.start() + assembled.begin_pos as u64;
            let mut ref_seq = assembled.ref_sequence;
            let mut alt_seq = assembled.alt_sequence;

            // strip the shared prefix, advancing the position
            let shared_prefix = ref_seq.iter().zip(alt_seq.iter())
                .take_while(|(r, a)| r == a)
                .count();
            ref_seq.drain(..shared_prefix);
            alt_seq.drain(..shared_prefix);
            begin += shared_prefix as u64;

            // strip the shared suffix
            let shared_suffix = ref_seq.iter().rev().zip(alt_seq.iter().rev())
                .take_while(|(r, a)| r == a)
                .count();
            ref_seq.truncate(ref_seq.len() - shared_suffix);
            alt_seq.truncate(alt_seq.len() - shared_suffix);

            let variant_region = GenomicRegion::new(region.contig().clone(), begin, begin + ref_seq.len() as u64);
            match Variant::new(variant_region, ref_seq, alt_seq) {
                Ok(variant) => result.push(variant),
                Err(e) => trace!("Dropping degenerate assembled allele pair: {e}")
            }
        }
        result.sort();
        result.dedup();
        Ok(result)
    }

    // vertex and edge plumbing

    fn vertex(&self, v: VertexId) -> &VertexData {
        self.vertices[v].as_ref().expect("live vertex")
    }

    fn vertex_mut(&mut self, v: VertexId) -> &mut VertexData {
        self.vertices[v].as_mut().expect("live vertex")
    }

    fn live_vertices(&self) -> impl Iterator<Item = (VertexId, &VertexData)> + '_ {
        self.vertices.iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|vd| (id, vd)))
    }

    fn live_vertex_ids(&self) -> Vec<VertexId> {
        self.live_vertices().map(|(id, _)| id).collect()
    }

    fn add_vertex(&mut self, kmer: Kmer, is_reference: bool) -> Option<VertexId> {
        if !is_canonical_dna(&kmer.bytes) {
            return None;
        }
        let data = VertexData {
            index: self.index_bound,
            kmer: kmer.clone(),
            is_reference,
            out_edges: vec![],
            in_edges: vec![]
        };
        let id = match self.free_ids.pop() {
            Some(id) => {
                self.vertices[id] = Some(data);
                id
            },
            None => {
                self.vertices.push(Some(data));
                self.vertices.len() - 1
            }
        };
        self.index_bound += 1;
        self.num_vertices += 1;
        self.vertex_cache.insert(kmer, id);
        Some(id)
    }

    fn remove_vertex(&mut self, v: VertexId) {
        debug_assert!(self.vertex(v).out_edges.is_empty() && self.vertex(v).in_edges.is_empty());
        let kmer = self.vertex(v).kmer.clone();
        let removed = self.vertex_cache.remove(&kmer);
        debug_assert!(removed.is_some());
        self.vertices[v] = None;
        self.free_ids.push(v);
        self.num_vertices -= 1;
    }

    fn clear_and_remove_vertex(&mut self, v: VertexId) {
        let in_sources: Vec<VertexId> = self.vertex(v).in_edges.clone();
        for u in in_sources {
            if u != v {
                self.remove_edge(u, v);
            }
        }
        let out_targets: Vec<VertexId> = self.vertex(v).out_edges.iter().map(|e| e.target).collect();
        for t in out_targets {
            self.remove_edge(v, t);
        }
        self.remove_vertex(v);
    }

    fn add_edge(&mut self, u: VertexId, v: VertexId, weight: u32, is_reference: bool) {
        self.vertex_mut(u).out_edges.push(EdgeData {
            target: v,
            weight,
            is_reference,
            transition_score: 0.0
        });
        self.vertex_mut(v).in_edges.push(u);
    }

    fn remove_edge(&mut self, u: VertexId, v: VertexId) {
        let pos = self.find_edge_position(u, v).expect("edge to remove");
        self.vertex_mut(u).out_edges.remove(pos);
        let in_pos = self.vertex(v).in_edges.iter().position(|&s| s == u).expect("in-edge to remove");
        self.vertex_mut(v).in_edges.remove(in_pos);
    }

    fn clear_out_edges(&mut self, v: VertexId) {
        let targets: Vec<VertexId> = self.vertex(v).out_edges.iter().map(|e| e.target).collect();
        for t in targets {
            self.remove_edge(v, t);
        }
    }

    fn find_edge_position(&self, u: VertexId, v: VertexId) -> Option<usize> {
        self.vertex(u).out_edges.iter().position(|e| e.target == v)
    }

    fn edge(&self, u: VertexId, v: VertexId) -> Option<&EdgeData> {
        self.vertex(u).out_edges.iter().find(|e| e.target == v)
    }

    fn out_degree(&self, v: VertexId) -> usize {
        self.vertex(v).out_edges.len()
    }

    fn in_degree(&self, v: VertexId) -> usize {
        self.vertex(v).in_edges.len()
    }

    fn is_reference_vertex(&self, v: VertexId) -> bool {
        self.vertex(v).is_reference
    }

    fn reference_head(&self) -> VertexId {
        self.vertex_cache[self.reference_kmers.front().expect("non-empty reference")]
    }

    fn reference_tail(&self) -> VertexId {
        self.vertex_cache[self.reference_kmers.back().expect("non-empty reference")]
    }

    fn next_reference(&self, u: VertexId) -> VertexId {
        self.vertex(u).out_edges.iter()
            .find(|e| e.is_reference)
            .map(|e| e.target)
            .expect("a reference out-edge")
    }

    fn num_reference_kmers(&self) -> usize {
        self.live_vertices().filter(|(_, vd)| vd.is_reference).count()
    }

    fn reference_size(&self) -> usize {
        sequence_length(self.reference_kmers.len(), self.k)
    }

    fn regenerate_vertex_indices(&mut self) {
        let mut index = 0;
        for slot in self.vertices.iter_mut() {
            if let Some(vd) = slot {
                vd.index = index;
                index += 1;
            }
        }
        self.index_bound = index;
    }

    /// Checks that the recorded reference kmer list describes a simple path: every
    /// consecutive pair is joined by a reference edge and no reference vertex has
    /// more than one outgoing reference edge.
    fn is_reference_unique_path(&self) -> bool {
        for (prev, next) in self.reference_kmers.iter().zip(self.reference_kmers.iter().skip(1)) {
            let u = match self.vertex_cache.get(prev) {
                Some(&u) => u,
                None => return false
            };
            let v = match self.vertex_cache.get(next) {
                Some(&v) => v,
                None => return false
            };
            match self.edge(u, v) {
                Some(e) if e.is_reference => {},
                _ => return false
            }
        }
        self.live_vertices().all(|(_, vd)| {
            vd.out_edges.iter().filter(|e| e.is_reference).count() <= 1
        })
    }

    // prune steps

    fn remove_trivial_nonreference_cycles(&mut self) {
        for v in self.live_vertex_ids() {
            if self.vertex(v).out_edges.iter().any(|e| e.target == v && !e.is_reference) {
                self.remove_edge(v, v);
            }
        }
    }

    fn sum_in_edge_weight(&self, v: VertexId) -> u64 {
        self.vertex(v).in_edges.iter()
            .map(|&u| self.edge(u, v).expect("in-edge").weight as u64)
            .sum()
    }

    fn sum_out_edge_weight(&self, v: VertexId) -> u64 {
        self.vertex(v).out_edges.iter().map(|e| e.weight as u64).sum()
    }

    fn remove_low_weight_edges(&mut self, min_weight: u32) {
        let min_weight = min_weight as u64;
        let mut to_remove: Vec<(VertexId, VertexId)> = vec![];
        for (u, vd) in self.live_vertices() {
            for e in vd.out_edges.iter() {
                if e.is_reference || e.weight as u64 >= min_weight {
                    continue;
                }
                let source_weight = self.sum_in_edge_weight(u);
                let low = if source_weight < min_weight {
                    true
                } else {
                    let target_weight = self.sum_out_edge_weight(e.target);
                    source_weight + e.weight as u64 + target_weight < 3 * min_weight
                };
                if low {
                    to_remove.push((u, e.target));
                }
            }
        }
        for (u, v) in to_remove {
            self.remove_edge(u, v);
        }
    }

    fn remove_disconnected_vertices(&mut self) {
        for v in self.live_vertex_ids() {
            if self.out_degree(v) == 0 && self.in_degree(v) == 0 {
                self.remove_vertex(v);
            }
        }
    }

    /// Forward BFS over out-edges; the result is indexed by vertex slot id.
    fn find_reachable_from(&self, from: VertexId) -> BitVec {
        let mut reached = BitVec::from_elem(self.vertices.len(), false);
        reached.set(from, true);
        let mut queue = VecDeque::from([from]);
        while let Some(u) = queue.pop_front() {
            for e in self.vertex(u).out_edges.iter() {
                if !reached[e.target] {
                    reached.set(e.target, true);
                    queue.push_back(e.target);
                }
            }
        }
        reached
    }

    /// Reverse BFS over in-edges, accumulating into an existing slot-indexed set.
    fn find_reverse_reachable_from(&self, from: VertexId, reached: &mut BitVec) {
        reached.set(from, true);
        let mut queue = VecDeque::from([from]);
        while let Some(u) = queue.pop_front() {
            for &s in self.vertex(u).in_edges.iter() {
                if !reached[s] {
                    reached.set(s, true);
                    queue.push_back(s);
                }
            }
        }
    }

    fn remove_vertices_unreachable_from(&mut self, from: VertexId) -> Vec<VertexId> {
        let reachable = self.find_reachable_from(from);
        let mut removed = vec![];
        for v in self.live_vertex_ids() {
            if !reachable[v] {
                removed.push(v);
                self.clear_and_remove_vertex(v);
            }
        }
        removed
    }

    fn remove_vertices_that_cant_reach(&mut self, to: VertexId) {
        if self.reference_kmers.is_empty() {
            return;
        }
        let mut reachable = BitVec::from_elem(self.vertices.len(), false);
        self.find_reverse_reachable_from(to, &mut reachable);
        for v in self.live_vertex_ids() {
            if !reachable[v] {
                self.clear_and_remove_vertex(v);
            }
        }
    }

    /// Removes everything forward of `v`, handling cycles that loop back into the
    /// reference via a reverse-reachability intersection.
    fn remove_vertices_past(&mut self, v: VertexId) {
        let reached = self.find_reachable_from(v);
        let mut reachables: HashSet<VertexId> = self.live_vertex_ids().into_iter()
            .filter(|&u| reached[u] && u != v)
            .collect();
        self.clear_out_edges(v);

        let cycle_tails: Vec<VertexId> = reachables.iter()
            .copied()
            .filter(|&u| self.edge(u, v).is_some())
            .collect();
        if !cycle_tails.is_empty() {
            // back edges can be followed safely as the links from v were just cut
            let mut back_reachable = BitVec::from_elem(self.vertices.len(), false);
            for &u in cycle_tails.iter() {
                self.find_reverse_reachable_from(u, &mut back_reachable);
                reachables.remove(&u);
            }
            let mut has_intersects = false;
            reachables.retain(|&u| {
                if back_reachable[u] {
                    has_intersects = true;
                    false
                } else {
                    true
                }
            });
            if has_intersects {
                let removed = self.remove_vertices_unreachable_from(self.reference_head());
                for u in removed {
                    reachables.remove(&u);
                }
            }
        }
        for u in reachables {
            self.clear_and_remove_vertex(u);
        }
    }

    fn can_prune_reference_flanks(&self) -> bool {
        if self.reference_kmers.len() < 2 {
            return false;
        }
        let head = self.reference_head();
        let tail = self.reference_tail();
        let head_ok = self.out_degree(head) == 1 && {
            let e = &self.vertex(head).out_edges[0];
            e.is_reference && e.target != head
        };
        let tail_ok = self.in_degree(tail) == 1 && {
            let s = self.vertex(tail).in_edges[0];
            s != tail && self.edge(s, tail).map(|e| e.is_reference).unwrap_or(false)
        };
        head_ok || tail_ok
    }

    /// Pops reference-only vertices off both flanks, advancing the head position
    /// for each head pop. Only safe on an acyclic graph.
    fn prune_reference_flanks(&mut self) {
        while self.reference_kmers.len() > 1 {
            let head = self.reference_head();
            if self.out_degree(head) != 1 {
                break;
            }
            let e = &self.vertex(head).out_edges[0];
            if !e.is_reference || e.target == head {
                break;
            }
            self.clear_and_remove_vertex(head);
            self.reference_kmers.pop_front();
            self.reference_head_position += 1;
        }
        while self.reference_kmers.len() > 1 {
            let tail = self.reference_tail();
            if self.in_degree(tail) != 1 {
                break;
            }
            let s = self.vertex(tail).in_edges[0];
            if s == tail || !self.edge(s, tail).map(|e| e.is_reference).unwrap_or(false) {
                break;
            }
            self.clear_and_remove_vertex(tail);
            self.reference_kmers.pop_back();
        }
    }

    // scoring

    fn transition_score(edge_weight: u64, total_out_weight: u64) -> f64 {
        if total_out_weight == 0 {
            0.0
        } else if edge_weight == 0 {
            MAX_TRANSITION_SCORE
        } else {
            (edge_weight as f64 / total_out_weight as f64).ln().abs()
        }
    }

    fn set_out_edge_transition_scores(&mut self, v: VertexId) {
        let total = self.sum_out_edge_weight(v);
        for e in self.vertex_mut(v).out_edges.iter_mut() {
            e.transition_score = Assembler::transition_score(e.weight as u64, total);
        }
    }

    fn set_all_edge_transition_scores(&mut self) {
        for v in self.live_vertex_ids() {
            self.set_out_edge_transition_scores(v);
        }
    }

    fn is_blocked(&self, u: VertexId, v: VertexId) -> bool {
        self.edge(u, v).map(|e| e.transition_score >= BLOCKED_SCORE).unwrap_or(false)
    }

    fn block_edge(&mut self, u: VertexId, v: VertexId) {
        let pos = self.find_edge_position(u, v).expect("edge to block");
        self.vertex_mut(u).out_edges[pos].transition_score = BLOCKED_SCORE;
    }

    fn block_all_in_edges(&mut self, v: VertexId) {
        let sources: Vec<VertexId> = self.vertex(v).in_edges.clone();
        for u in sources {
            self.block_edge(u, v);
        }
    }

    fn all_in_edges_are_blocked(&self, v: VertexId) -> bool {
        self.vertex(v).in_edges.iter().all(|&u| self.is_blocked(u, v))
    }

    fn all_out_edges_are_blocked(&self, v: VertexId) -> bool {
        self.vertex(v).out_edges.iter().all(|e| e.transition_score >= BLOCKED_SCORE)
    }

    // graph algorithms

    fn topological_order(&self) -> Result<Vec<VertexId>, ()> {
        let mut in_counts: Vec<usize> = vec![0; self.vertices.len()];
        let mut order = Vec::with_capacity(self.num_vertices);
        let mut queue: VecDeque<VertexId> = VecDeque::new();
        for (id, vd) in self.live_vertices() {
            in_counts[id] = vd.in_edges.len();
            if vd.in_edges.is_empty() {
                queue.push_back(id);
            }
        }
        while let Some(u) = queue.pop_front() {
            order.push(u);
            for e in self.vertex(u).out_edges.iter() {
                in_counts[e.target] -= 1;
                if in_counts[e.target] == 0 {
                    queue.push_back(e.target);
                }
            }
        }
        if order.len() == self.num_vertices {
            Ok(order)
        } else {
            Err(())
        }
    }

    /// Single-source shortest paths by transition score over a DAG, returning the
    /// predecessor map. Unreached vertices are their own predecessor.
    fn find_shortest_scoring_paths(&self, from: VertexId) -> Result<HashMap<VertexId, VertexId>, AssemblerError> {
        let order = self.topological_order().map_err(|_| AssemblerError::GraphInconsistency)?;
        let mut dist: Vec<f64> = vec![f64::INFINITY; self.index_bound];
        dist[self.vertex(from).index] = 0.0;
        let mut preds: HashMap<VertexId, VertexId> = self.live_vertices()
            .map(|(id, _)| (id, id))
            .collect();
        for u in order {
            let du = dist[self.vertex(u).index];
            if !du.is_finite() {
                continue;
            }
            for e in self.vertex(u).out_edges.iter() {
                let target_index = self.vertex(e.target).index;
                let candidate = du + e.transition_score;
                if candidate < dist[target_index] {
                    dist[target_index] = candidate;
                    preds.insert(e.target, u);
                }
            }
        }
        Ok(preds)
    }

    fn is_vertex_on_path(&self, v: VertexId, preds: &HashMap<VertexId, VertexId>, from: VertexId) -> bool {
        if v == from {
            return true;
        }
        let mut current = from;
        loop {
            let prev = preds[&current];
            if prev == current {
                return false;
            }
            if prev == v {
                return true;
            }
            current = prev;
        }
    }

    /// Builds the immediate-dominator map for everything reachable from `root`
    /// using the iterative reverse-postorder algorithm. The root itself is not a key.
    fn build_dominator_tree(&self, root: VertexId) -> HashMap<VertexId, VertexId> {
        // reverse postorder over the reachable subgraph
        let mut visited = BitVec::from_elem(self.vertices.len(), false);
        let mut postorder: Vec<VertexId> = Vec::with_capacity(self.num_vertices);
        let mut stack: Vec<(VertexId, usize)> = vec![(root, 0)];
        visited.set(root, true);
        while let Some(top) = stack.last_mut() {
            let (u, next_edge) = *top;
            if next_edge < self.out_degree(u) {
                top.1 += 1;
                let t = self.vertex(u).out_edges[next_edge].target;
                if !visited[t] {
                    visited.set(t, true);
                    stack.push((t, 0));
                }
            } else {
                postorder.push(u);
                stack.pop();
            }
        }
        let rpo: Vec<VertexId> = postorder.into_iter().rev().collect();
        let rpo_number: HashMap<VertexId, usize> = rpo.iter()
            .enumerate()
            .map(|(i, &v)| (v, i))
            .collect();

        let mut idom: HashMap<VertexId, VertexId> = HashMap::default();
        idom.insert(root, root);
        let mut changed = true;
        while changed {
            changed = false;
            for &v in rpo.iter().skip(1) {
                let mut new_idom: Option<VertexId> = None;
                for &p in self.vertex(v).in_edges.iter() {
                    if !idom.contains_key(&p) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(current) => {
                            // walk both up the dominator tree until they meet
                            let mut a = p;
                            let mut b = current;
                            while a != b {
                                while rpo_number[&a] > rpo_number[&b] {
                                    a = idom[&a];
                                }
                                while rpo_number[&b] > rpo_number[&a] {
                                    b = idom[&b];
                                }
                            }
                            a
                        }
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&v) != Some(&new_idom) {
                        idom.insert(v, new_idom);
                        changed = true;
                    }
                }
            }
        }
        idom.remove(&root);
        idom
    }

    /// Reference vertices (other than the tail) that dominate nothing.
    fn extract_nondominant_reference(&self, dominator_tree: &HashMap<VertexId, VertexId>) -> Vec<VertexId> {
        let dominators: HashSet<VertexId> = dominator_tree.values().copied().collect();
        let tail = self.reference_tail();
        let mut result: Vec<VertexId> = dominator_tree.keys()
            .copied()
            .filter(|&v| self.is_reference_vertex(v) && v != tail && !dominators.contains(&v))
            .collect();
        result.sort_unstable();
        result
    }

    // path utilities

    fn is_bridge(&self, v: VertexId) -> bool {
        self.in_degree(v) == 1 && self.out_degree(v) == 1
    }

    fn joins_reference_only(&self, v: VertexId) -> bool {
        self.out_degree(v) == 1 && self.vertex(v).out_edges[0].is_reference
    }

    fn is_simple_deletion(&self, u: VertexId, v: VertexId) -> bool {
        match self.edge(u, v) {
            Some(e) => !e.is_reference && self.is_reference_vertex(u) && self.is_reference_vertex(v),
            None => false
        }
    }

    fn is_edge_on_path(&self, edge: (VertexId, VertexId), path: &VecDeque<VertexId>) -> bool {
        path.iter().zip(path.iter().skip(1)).any(|(&a, &b)| (a, b) == edge)
    }

    fn connects_to_path(&self, edge: (VertexId, VertexId), path: &VecDeque<VertexId>) -> bool {
        let front = *path.front().expect("non-empty path");
        let back = *path.back().expect("non-empty path");
        let front_in = self.vertex(front).in_edges.first().map(|&s| (s, front));
        let back_out = self.vertex(back).out_edges.first().map(|e| (back, e.target));
        front_in == Some(edge) || back_out == Some(edge)
    }

    fn is_dependent_on_path(&self, edge: (VertexId, VertexId), path: &VecDeque<VertexId>) -> bool {
        self.connects_to_path(edge, path) || self.is_edge_on_path(edge, path)
    }

    /// Removes a bridge-only path and its boundary edges.
    fn remove_path(&mut self, path: &VecDeque<VertexId>) {
        debug_assert!(!path.is_empty());
        if path.len() == 1 {
            self.clear_and_remove_vertex(path[0]);
            return;
        }
        let front = path[0];
        debug_assert_eq!(self.in_degree(front), 1);
        let in_source = self.vertex(front).in_edges[0];
        self.remove_edge(in_source, front);
        for (&prev, &v) in path.iter().zip(path.iter().skip(1)) {
            self.remove_edge(prev, v);
            self.remove_vertex(prev);
        }
        let back = *path.back().expect("non-empty path");
        debug_assert_eq!(self.out_degree(back), 1);
        let out_target = self.vertex(back).out_edges[0].target;
        self.remove_edge(back, out_target);
        self.remove_vertex(back);
    }

    /// Walks back from `from` while the traversed edges are reference, returning
    /// the first vertex reached over a non-reference edge, the reference vertex it
    /// feeds, and the number of backtracked steps.
    fn backtrack_until_nonreference(&self, preds: &HashMap<VertexId, VertexId>, mut from: VertexId) -> (VertexId, VertexId, usize) {
        let head = self.reference_head();
        let mut v = preds[&from];
        let mut count = 1;
        while v != head {
            debug_assert!(v != from, "vertex was not reachable from the source");
            let e = self.edge(v, from).expect("predecessor edge");
            if !e.is_reference {
                break;
            }
            from = v;
            v = preds[&from];
            count += 1;
        }
        (v, from, count)
    }

    /// The maximal chain of non-reference predecessors ending at `from`, in
    /// forward order.
    fn extract_nonreference_path(&self, preds: &HashMap<VertexId, VertexId>, from: VertexId) -> VecDeque<VertexId> {
        let mut path = VecDeque::from([from]);
        let mut v = preds[&from];
        while !self.is_reference_vertex(v) {
            path.push_front(v);
            v = preds[&v];
        }
        path
    }

    /// The sequence spelled by a path: the first kmer plus the last base of each
    /// following kmer.
    fn make_sequence(&self, path: &VecDeque<VertexId>) -> Vec<u8> {
        debug_assert!(!path.is_empty());
        let mut result = self.vertex(path[0]).kmer.bytes.to_vec();
        for &v in path.iter().skip(1) {
            result.push(self.vertex(v).kmer.back());
        }
        result
    }

    /// The reference sequence along the reference path from `from` up to but not
    /// including `to`.
    fn make_reference(&self, from: VertexId, to: VertexId) -> Vec<u8> {
        if from == to {
            return vec![];
        }
        let mut result = self.vertex(from).kmer.bytes.to_vec();
        let mut current = self.next_reference(from);
        let mut steps = self.reference_kmers.len();
        while current != to && steps > 0 {
            result.push(self.vertex(current).kmer.back());
            current = self.next_reference(current);
            steps -= 1;
        }
        debug_assert!(current == to, "reference walk did not terminate at the target");
        result
    }

    // bubble extraction

    fn extract_k_highest_scoring_bubble_paths(&mut self, mut k: usize) -> Result<VecDeque<AssembledVariant>, AssemblerError> {
        let mut dominator_tree = self.build_dominator_tree(self.reference_head());
        let mut num_remaining_alt_kmers = self.num_kmers() - self.num_reference_kmers();

        let mut blocked_edge: Option<(VertexId, VertexId)> = None;
        let mut result: VecDeque<AssembledVariant> = VecDeque::new();
        let mut max_blockings = MAX_BLOCKINGS;

        while k > 0 && num_remaining_alt_kmers > 0 {
            let preds = self.find_shortest_scoring_paths(self.reference_head())?;

            if let Some((bu, bv)) = blocked_edge {
                if max_blockings == 0 {
                    return Ok(result);
                }
                max_blockings -= 1;
                if !self.is_vertex_on_path(bv, &preds, self.reference_tail()) {
                    self.set_out_edge_transition_scores(bu);
                    blocked_edge = None;
                } else if self.all_out_edges_are_blocked(bv) {
                    // forward progress is impossible past this vertex
                    return Ok(result);
                }
            }
            let head = self.reference_head();
            let tail = self.reference_tail();
            if preds[&tail] == tail {
                return Ok(result);
            }

            let (mut alt, mut ref_v, mut rhs_kmer_count) = self.backtrack_until_nonreference(&preds, tail);

            if alt == head {
                // the complete reference path is the shortest path
                let nondominant_reference = self.extract_nondominant_reference(&dominator_tree);
                if nondominant_reference.iter().all(|&v| self.all_in_edges_are_blocked(v)) {
                    return Ok(result);
                }
                for v in nondominant_reference {
                    self.block_all_in_edges(v);
                }
                continue;
            }

            while alt != head {
                let mut alt_path = self.extract_nonreference_path(&preds, alt);
                debug_assert!(!alt_path.is_empty());
                let ref_before_bubble = preds[&alt_path[0]];
                let ref_seq = self.make_reference(ref_before_bubble, ref_v);
                alt_path.push_front(ref_before_bubble);
                let alt_seq = self.make_sequence(&alt_path);
                alt_path.pop_front();
                rhs_kmer_count += count_kmers(ref_seq.len(), self.k);
                let pos = self.reference_head_position + self.reference_size()
                    - sequence_length(rhs_kmer_count, self.k);
                trace!("Assembled bubble at offset {pos}: {} -> {} bases", ref_seq.len(), alt_seq.len());
                result.push_front(AssembledVariant {
                    begin_pos: pos,
                    ref_sequence: ref_seq,
                    alt_sequence: alt_seq
                });
                // one reference kmer was padded onto the front of ref_seq
                rhs_kmer_count -= 1;

                if alt_path.len() == 1 && self.is_simple_deletion(alt_path[0], ref_v) {
                    if blocked_edge == Some((alt_path[0], ref_v)) {
                        blocked_edge = None;
                    }
                    self.remove_edge(alt_path[0], ref_v);
                    self.set_out_edge_transition_scores(alt_path[0]);
                } else {
                    let mut vertex_before_bridge = ref_before_bubble;
                    while !alt_path.is_empty() {
                        let bifurcation = alt_path.iter().position(|&v| !self.is_bridge(v));
                        match bifurcation {
                            None => {
                                if let Some(edge) = blocked_edge {
                                    if self.is_dependent_on_path(edge, &alt_path) {
                                        blocked_edge = None;
                                    }
                                }
                                self.remove_path(&alt_path);
                                self.regenerate_vertex_indices();
                                self.set_out_edge_transition_scores(vertex_before_bridge);
                                for v in alt_path.iter() {
                                    dominator_tree.remove(v);
                                }
                                num_remaining_alt_kmers = num_remaining_alt_kmers.saturating_sub(alt_path.len());
                                alt_path.clear();
                            },
                            Some(bi) if self.joins_reference_only(alt_path[bi]) => {
                                alt_path.truncate(bi);
                                if !alt_path.is_empty() {
                                    if let Some(edge) = blocked_edge {
                                        if self.is_dependent_on_path(edge, &alt_path) {
                                            blocked_edge = None;
                                        }
                                    }
                                    self.remove_path(&alt_path);
                                    self.regenerate_vertex_indices();
                                    self.set_out_edge_transition_scores(vertex_before_bridge);
                                    for v in alt_path.iter() {
                                        dominator_tree.remove(v);
                                    }
                                    num_remaining_alt_kmers = num_remaining_alt_kmers.saturating_sub(alt_path.len());
                                }
                                break;
                            },
                            Some(bi) if self.is_dominated_by_prefix(alt_path[bi], &alt_path, bi, &dominator_tree) => {
                                // the prefix feeds other surviving paths, step past it and keep scanning
                                vertex_before_bridge = alt_path[bi];
                                alt_path.drain(..=bi);
                            },
                            Some(bi) => {
                                if bi > 0 {
                                    let edge = (alt_path[bi - 1], alt_path[bi]);
                                    self.block_edge(edge.0, edge.1);
                                    blocked_edge = Some(edge);
                                } else {
                                    self.block_all_in_edges(alt_path[0]);
                                }
                                break;
                            }
                        }
                    }
                }
                let (next_alt, next_ref, kmer_count_to_alt) =
                    self.backtrack_until_nonreference(&preds, ref_before_bubble);
                alt = next_alt;
                ref_v = next_ref;
                rhs_kmer_count += kmer_count_to_alt;
                if k > 0 {
                    k -= 1;
                }
            }
            debug_assert!(self.out_degree(self.reference_head()) > 0);
            debug_assert!(self.in_degree(self.reference_tail()) > 0);
            if self.can_prune_reference_flanks() {
                self.prune_reference_flanks();
                self.regenerate_vertex_indices();
                dominator_tree = self.build_dominator_tree(self.reference_head());
            }
        }
        Ok(result)
    }

    fn is_dominated_by_prefix(&self, v: VertexId, path: &VecDeque<VertexId>, end: usize, dominator_tree: &HashMap<VertexId, VertexId>) -> bool {
        match dominator_tree.get(&v) {
            Some(dominator) => path.iter().take(end).any(|p| p == dominator),
            None => false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genomic_region::ContigName;

    // All 5-mers of this sequence are distinct, as are the 5-mers introduced by
    // the alternate reads below.
    const REFERENCE: &[u8] = b"ATCGACTGATC";

    fn region(start: u64, end: u64) -> GenomicRegion {
        GenomicRegion::new(ContigName::from("1"), start, end)
    }

    fn build_assembler(reads: &[(&[u8], usize)]) -> Assembler {
        let mut assembler = Assembler::new_with_reference(5, REFERENCE).unwrap();
        for &(read, count) in reads {
            for _ in 0..count {
                assembler.insert_read(read);
            }
        }
        assembler
    }

    #[test]
    fn test_single_snv() {
        // 20x reference reads, 10x reads with a C>A at offset 5
        let mut assembler = build_assembler(&[
            (REFERENCE, 20),
            (b"ATCGAATGATC", 10)
        ]);
        assert!(assembler.prune(2));
        assert!(!assembler.is_all_reference());

        let variants = assembler.extract_variants(10).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0], AssembledVariant {
            begin_pos: 0,
            ref_sequence: b"ATCGACTGAT".to_vec(),
            alt_sequence: b"ATCGAATGAT".to_vec()
        });
    }

    #[test]
    fn test_single_snv_region_variants() {
        let mut assembler = build_assembler(&[
            (REFERENCE, 20),
            (b"ATCGAATGATC", 10)
        ]);
        assert!(assembler.prune(2));

        // the kmer padding trims down to the bare SNV in genome coordinates
        let variants = assembler.extract_region_variants(&region(100, 111), 10).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].region(), &region(105, 106));
        assert_eq!(variants[0].ref_sequence(), b"C");
        assert_eq!(variants[0].alt_sequence(), b"A");
    }

    #[test]
    fn test_multiallelic_site() {
        // two alternates at the same site: C>A at 10x and C>G at 8x
        let mut assembler = build_assembler(&[
            (REFERENCE, 20),
            (b"ATCGAATGATC", 10),
            (b"ATCGAGTGATC", 8)
        ]);
        assert!(assembler.prune(2));

        let variants = assembler.extract_region_variants(&region(0, 11), 10).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].region(), &region(5, 6));
        assert_eq!(variants[0].alt_sequence(), b"A");
        assert_eq!(variants[1].region(), &region(5, 6));
        assert_eq!(variants[1].alt_sequence(), b"G");
    }

    #[test]
    fn test_two_linked_snvs() {
        // both substitutions sit on the same read type, far enough apart that the
        // bubbles rejoin the reference between them
        let reference = b"ATCGACTGATCGTCATGGA";
        let alt_read = b"ATCGAATGATCGTGATGGA";
        let mut assembler = Assembler::new_with_reference(5, reference).unwrap();
        for _ in 0..20 {
            assembler.insert_read(reference);
        }
        for _ in 0..10 {
            assembler.insert_read(alt_read);
        }
        assert!(assembler.prune(2));

        let variants = assembler.extract_region_variants(&region(0, 19), 10).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].region(), &region(5, 6));
        assert_eq!(variants[0].ref_sequence(), b"C");
        assert_eq!(variants[0].alt_sequence(), b"A");
        assert_eq!(variants[1].region(), &region(13, 14));
        assert_eq!(variants[1].ref_sequence(), b"C");
        assert_eq!(variants[1].alt_sequence(), b"G");
    }

    #[test]
    fn test_duplicate_reference_kmers() {
        // "AAAA" at k=3 collapses onto a single vertex with a reference self-loop
        let mut assembler = Assembler::new_with_reference(3, b"AAAA").unwrap();
        assembler.insert_read(b"AAAA");
        assert_eq!(assembler.num_kmers(), 1);
        assert!(assembler.prune(2));
        assert!(assembler.is_all_reference());
        assert!(assembler.extract_variants(10).unwrap().is_empty());
    }

    #[test]
    fn test_bad_reference() {
        assert!(matches!(
            Assembler::new_with_reference(4, b"ACNTACGT"),
            Err(AssemblerError::BadReferenceSequence)
        ));
        assert!(matches!(
            Assembler::new_with_reference(4, b"ACG"),
            Err(AssemblerError::ReferenceTooShort { length: 3, kmer_size: 4 })
        ));

        let mut assembler = Assembler::new_with_reference(5, REFERENCE).unwrap();
        assert!(matches!(
            assembler.insert_reference(REFERENCE),
            Err(AssemblerError::MultipleReferenceSequences)
        ));
    }

    #[test]
    fn test_short_and_noncanonical_reads() {
        let mut assembler = Assembler::new(5);
        // shorter than k is a no-op
        assembler.insert_read(b"ACGT");
        assert!(assembler.is_empty());

        // non-canonical kmers are dropped, breaking the chain silently
        assembler.insert_read(b"ACGTNACGTA");
        assert_eq!(assembler.num_kmers(), 1);
    }

    #[test]
    fn test_low_weight_noise_is_pruned() {
        // a single erroneous read cannot survive prune(2)
        let mut assembler = build_assembler(&[
            (REFERENCE, 20),
            (b"ATCGAATGATC", 1)
        ]);
        assert!(assembler.prune(2));
        assert!(assembler.is_all_reference());
        assert!(assembler.extract_variants(10).unwrap().is_empty());
    }

    #[test]
    fn test_prune_without_reference_clears() {
        let mut assembler = Assembler::new(5);
        assembler.insert_read(b"ATCGACTGATC");
        assert!(!assembler.prune(2));
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_is_acyclic() {
        let assembler = build_assembler(&[(REFERENCE, 5)]);
        assert!(assembler.is_acyclic());

        // the reference self-loop on "AAAA" is a cycle
        let looped = Assembler::new_with_reference(3, b"AAAA").unwrap();
        assert!(!looped.is_acyclic());
    }

    #[test]
    fn test_extract_on_empty() {
        let mut assembler = Assembler::new(5);
        assert!(assembler.extract_variants(10).unwrap().is_empty());
        assert!(assembler.prune(2));
    }
}
