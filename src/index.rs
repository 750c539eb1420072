// Index build, persistence, and query
//
// The index is a file set sharing a prefix. Array files (.sqf .sqr .edge
// .nref .kpref .kptab) carry a header padded to one page so the payload
// starts page-aligned, and are borrowed read-only straight out of the
// memory map; nothing is copied at load time. The remaining files (.meta
// .sbv .mphf) are small and parsed eagerly. A build writes every file to
// a .tmp sibling and renames the whole set into place only after all
// payloads are flushed, so a half-written build is never observable to
// queries.
//
// Layout per array file: 8-byte magic, u32 version, u64 payload length,
// zero padding to 4096 bytes, then the raw little-endian element array.

use crate::dna::{canonical_kmer_hash, revcomp, MAX_K};
use crate::error::{IndexError, INDEX_MAGIC, INDEX_VERSION};
use crate::graph::GraphAccess;
use crate::kmer::{enumerate_kmers, node_seq_starts};
use crate::seqpos::{Handle, SeqPos};
use boomphf::Mphf;
use memmap2::Mmap;
use rayon::prelude::*;
use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank};
use simple_sds::raw_vector::{AccessRaw, RawVector};
use simple_sds::serialize::Serialize as SdsSerialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

const ARRAY_HEADER: usize = 4096;
const SMALL_HEADER: usize = 12;
const MPHF_GAMMA: f64 = 1.7;

/// Per-node record: where the node's sequence and edge span live.
///
/// The `n_incoming` leading entries of the edge span point into the node;
/// the rest (up to the next node's `edge_start`) point out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct NodeRef {
    pub seq_start: u64,
    pub edge_start: u64,
    pub n_incoming: u64,
}

/// One stored k-mer occurrence: the oriented span of its walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct KmerSpan {
    pub begin: SeqPos,
    pub end: SeqPos,
}

//-----------------------------------------------------------------------------
// Build

/// Build the index file set for `graph` under `prefix`.
pub fn build<G: GraphAccess + Sync>(
    graph: &G,
    k: usize,
    max_furcations: u64,
    max_degree: usize,
    prefix: &Path,
) -> Result<(), IndexError> {
    if k == 0 || k > MAX_K {
        return Err(IndexError::UnsupportedK { k, max: MAX_K });
    }
    let start = Instant::now();
    let n_nodes = graph.node_count() as u64;
    let seq_starts = node_seq_starts(graph);
    let seq_length = graph.total_length() as u64;

    // linear strand arrays
    let mut seq_fwd = Vec::with_capacity(seq_length as usize);
    for rank in 0..n_nodes {
        seq_fwd.extend_from_slice(graph.node_sequence(rank));
    }
    let seq_rev = revcomp(&seq_fwd);

    // node start marks with rank support
    let mut raw = RawVector::with_len(seq_length as usize, false);
    for &s in &seq_starts {
        raw.set_bit(s as usize, true);
    }
    let mut seq_bv = BitVector::from(raw);
    seq_bv.enable_rank();

    // edge table: incoming entries first, then outgoing
    let mut edges: Vec<Handle> = Vec::new();
    let mut node_refs: Vec<NodeRef> = Vec::with_capacity(n_nodes as usize + 1);
    for rank in 0..n_nodes {
        let fwd = Handle::pack(rank, false);
        let incoming = graph.predecessors(fwd);
        let outgoing = graph.successors(fwd);
        node_refs.push(NodeRef {
            seq_start: seq_starts[rank as usize],
            edge_start: edges.len() as u64,
            n_incoming: incoming.len() as u64,
        });
        edges.extend(incoming);
        edges.extend(outgoing);
    }
    node_refs.push(NodeRef {
        seq_start: seq_length,
        edge_start: edges.len() as u64,
        n_incoming: 0,
    });
    let n_edges = edges.len() as u64;

    log::info!(
        "enumerating k-mers (k={}, max_furcations={}, max_degree={})",
        k,
        max_furcations,
        max_degree
    );
    let mut kmers = enumerate_kmers(graph, k, max_furcations, max_degree);
    kmers.par_sort_unstable_by_key(|p| (p.hash, p.begin.to_u64(), p.end.to_u64()));
    let n_kmer_positions = kmers.len() as u64;

    let mut keys: Vec<u64> = kmers.iter().map(|p| p.hash).collect();
    keys.dedup();
    let n_kmers = keys.len() as u64;
    log::info!(
        "{} k-mer positions over {} distinct hashes ({:.2}s)",
        n_kmer_positions,
        n_kmers,
        start.elapsed().as_secs_f64()
    );

    let mphf = Mphf::new_parallel(MPHF_GAMMA, &keys, None);

    // occurrence lists in MPHF rank order
    let mut kmer_pos_ref = vec![0u64; n_kmers as usize + 1];
    for group in kmers.chunk_by(|a, b| a.hash == b.hash) {
        let rank = mphf.hash(&group[0].hash) as usize;
        kmer_pos_ref[rank + 1] = group.len() as u64;
    }
    for i in 1..kmer_pos_ref.len() {
        kmer_pos_ref[i] += kmer_pos_ref[i - 1];
    }
    let mut kmer_pos_table = vec![KmerSpan::default(); n_kmer_positions as usize];
    for group in kmers.chunk_by(|a, b| a.hash == b.hash) {
        let rank = mphf.hash(&group[0].hash) as usize;
        let slot = kmer_pos_ref[rank] as usize;
        for (i, p) in group.iter().enumerate() {
            kmer_pos_table[slot + i] = KmerSpan {
                begin: p.begin,
                end: p.end,
            };
        }
    }

    // persist: everything to .tmp files, then rename the set into place
    let mut pending = PendingFiles::new();

    {
        let path = file_path(prefix, ".meta");
        let mut w = pending.create(path.clone())?;
        write_small_header(&mut w, &path)?;
        for value in [k as u64, seq_length, n_nodes, n_edges, n_kmers, n_kmer_positions] {
            w.write_all(&value.to_le_bytes())
                .map_err(|e| IndexError::io(&path, e))?;
        }
        w.flush().map_err(|e| IndexError::io(&path, e))?;
    }
    write_array(&mut pending, prefix, ".sqf", &seq_fwd, |w, &b| w.write_all(&[b]))?;
    write_array(&mut pending, prefix, ".sqr", &seq_rev, |w, &b| w.write_all(&[b]))?;
    {
        let path = file_path(prefix, ".sbv");
        let mut w = pending.create(path.clone())?;
        write_small_header(&mut w, &path)?;
        seq_bv
            .serialize(&mut w)
            .map_err(|e| IndexError::io(&path, e))?;
        w.flush().map_err(|e| IndexError::io(&path, e))?;
    }
    write_array(&mut pending, prefix, ".edge", &edges, |w, h| {
        w.write_all(&h.to_u64().to_le_bytes())
    })?;
    write_array(&mut pending, prefix, ".nref", &node_refs, |w, r| {
        w.write_all(&r.seq_start.to_le_bytes())?;
        w.write_all(&r.edge_start.to_le_bytes())?;
        w.write_all(&r.n_incoming.to_le_bytes())
    })?;
    {
        let path = file_path(prefix, ".mphf");
        let mut w = pending.create(path.clone())?;
        write_small_header(&mut w, &path)?;
        bincode::serialize_into(&mut w, &mphf).map_err(|e| IndexError::BadMphf {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        w.flush().map_err(|e| IndexError::io(&path, e))?;
    }
    write_array(&mut pending, prefix, ".kpref", &kmer_pos_ref, |w, v| {
        w.write_all(&v.to_le_bytes())
    })?;
    write_array(&mut pending, prefix, ".kptab", &kmer_pos_table, |w, s| {
        w.write_all(&s.begin.to_u64().to_le_bytes())?;
        w.write_all(&s.end.to_u64().to_le_bytes())
    })?;

    pending.commit()?;
    log::info!(
        "index written to {}.* in {:.2}s",
        prefix.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn file_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn write_small_header<W: Write>(w: &mut W, path: &Path) -> Result<(), IndexError> {
    w.write_all(&INDEX_MAGIC)
        .and_then(|_| w.write_all(&INDEX_VERSION.to_le_bytes()))
        .map_err(|e| IndexError::io(path, e))
}

fn write_array<T, F>(
    pending: &mut PendingFiles,
    prefix: &Path,
    suffix: &str,
    items: &[T],
    mut write_item: F,
) -> Result<(), IndexError>
where
    F: FnMut(&mut BufWriter<File>, &T) -> std::io::Result<()>,
{
    let path = file_path(prefix, suffix);
    let mut w = pending.create(path.clone())?;
    let payload = (items.len() * std::mem::size_of::<T>()) as u64;
    w.write_all(&INDEX_MAGIC)
        .and_then(|_| w.write_all(&INDEX_VERSION.to_le_bytes()))
        .and_then(|_| w.write_all(&payload.to_le_bytes()))
        .and_then(|_| w.write_all(&[0u8; ARRAY_HEADER - 20]))
        .map_err(|e| IndexError::io(&path, e))?;
    for item in items {
        write_item(&mut w, item).map_err(|e| IndexError::io(&path, e))?;
    }
    w.flush().map_err(|e| IndexError::io(&path, e))
}

/// Temporary build files; unlinked on drop unless committed.
struct PendingFiles {
    pairs: Vec<(PathBuf, PathBuf)>,
    committed: bool,
}

impl PendingFiles {
    fn new() -> Self {
        PendingFiles {
            pairs: Vec::new(),
            committed: false,
        }
    }

    fn create(&mut self, final_path: PathBuf) -> Result<BufWriter<File>, IndexError> {
        let mut tmp = final_path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let file = File::create(&tmp).map_err(|e| IndexError::io(&tmp, e))?;
        self.pairs.push((tmp, final_path));
        Ok(BufWriter::new(file))
    }

    fn commit(mut self) -> Result<(), IndexError> {
        for (tmp, final_path) in &self.pairs {
            fs::rename(tmp, final_path).map_err(|e| IndexError::io(final_path, e))?;
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingFiles {
    fn drop(&mut self) {
        if !self.committed {
            for (tmp, _) in &self.pairs {
                let _ = fs::remove_file(tmp);
            }
        }
    }
}

//-----------------------------------------------------------------------------
// Load and query

struct ArrayFile {
    path: PathBuf,
    map: Mmap,
    payload_len: usize,
}

impl ArrayFile {
    fn open(path: PathBuf) -> Result<Self, IndexError> {
        let file = File::open(&path).map_err(|e| IndexError::io(&path, e))?;
        let map = unsafe { Mmap::map(&file) }.map_err(|e| IndexError::io(&path, e))?;
        if map.len() < ARRAY_HEADER {
            return Err(IndexError::Truncated {
                path,
                needed: ARRAY_HEADER,
                got: map.len(),
            });
        }
        check_header(&map[..SMALL_HEADER], &path)?;
        let payload_len = u64::from_le_bytes(map[12..20].try_into().unwrap()) as usize;
        if map.len() < ARRAY_HEADER + payload_len {
            return Err(IndexError::Truncated {
                path,
                needed: ARRAY_HEADER + payload_len,
                got: map.len(),
            });
        }
        Ok(ArrayFile {
            path,
            map,
            payload_len,
        })
    }

    fn bytes(&self) -> &[u8] {
        &self.map[ARRAY_HEADER..ARRAY_HEADER + self.payload_len]
    }

    /// Borrow the payload as a typed slice. The payload starts one page
    /// into a page-aligned mapping, so alignment always holds for the
    /// plain u64-based records stored here.
    fn slice<T: Copy>(&self) -> &[T] {
        let size = std::mem::size_of::<T>();
        let bytes = self.bytes();
        debug_assert_eq!(bytes.len() % size, 0);
        debug_assert_eq!(bytes.as_ptr() as usize % std::mem::align_of::<T>(), 0);
        unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const T, bytes.len() / size) }
    }
}

fn check_header(header: &[u8], path: &Path) -> Result<(), IndexError> {
    if header.len() < SMALL_HEADER {
        return Err(IndexError::Truncated {
            path: path.to_path_buf(),
            needed: SMALL_HEADER,
            got: header.len(),
        });
    }
    if header[..8] != INDEX_MAGIC {
        return Err(IndexError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let version = u32::from_le_bytes(header[8..12].try_into().unwrap());
    if version != INDEX_VERSION {
        return Err(IndexError::VersionMismatch {
            path: path.to_path_buf(),
            found: version,
        });
    }
    Ok(())
}

/// A loaded, immutable index. The struct owns the memory maps; queries
/// borrow read-only slices from them for the lifetime of the index.
pub struct GraphIndex {
    pub k: u64,
    pub seq_length: u64,
    pub n_nodes: u64,
    pub n_edges: u64,
    pub n_kmers: u64,
    pub n_kmer_positions: u64,
    seq_bv: BitVector,
    mphf: Mphf<u64>,
    sqf: ArrayFile,
    sqr: ArrayFile,
    edge: ArrayFile,
    nref: ArrayFile,
    kpref: ArrayFile,
    kptab: ArrayFile,
}

impl GraphIndex {
    /// Open and validate an index file set. Only headers are parsed
    /// eagerly; array payloads stay behind the memory maps.
    pub fn load(prefix: &Path) -> Result<Self, IndexError> {
        let meta_path = file_path(prefix, ".meta");
        let meta = fs::read(&meta_path).map_err(|e| IndexError::io(&meta_path, e))?;
        check_header(&meta, &meta_path)?;
        if meta.len() < SMALL_HEADER + 6 * 8 {
            return Err(IndexError::Truncated {
                path: meta_path,
                needed: SMALL_HEADER + 48,
                got: meta.len(),
            });
        }
        let word = |i: usize| {
            u64::from_le_bytes(
                meta[SMALL_HEADER + 8 * i..SMALL_HEADER + 8 * (i + 1)]
                    .try_into()
                    .unwrap(),
            )
        };
        let (k, seq_length, n_nodes, n_edges, n_kmers, n_kmer_positions) =
            (word(0), word(1), word(2), word(3), word(4), word(5));

        let sbv_path = file_path(prefix, ".sbv");
        let mut sbv_reader =
            BufReader::new(File::open(&sbv_path).map_err(|e| IndexError::io(&sbv_path, e))?);
        let mut header = [0u8; SMALL_HEADER];
        sbv_reader
            .read_exact(&mut header)
            .map_err(|e| IndexError::io(&sbv_path, e))?;
        check_header(&header, &sbv_path)?;
        let mut seq_bv =
            BitVector::load(&mut sbv_reader).map_err(|e| IndexError::io(&sbv_path, e))?;
        seq_bv.enable_rank();

        let mphf_path = file_path(prefix, ".mphf");
        let mut mphf_reader =
            BufReader::new(File::open(&mphf_path).map_err(|e| IndexError::io(&mphf_path, e))?);
        mphf_reader
            .read_exact(&mut header)
            .map_err(|e| IndexError::io(&mphf_path, e))?;
        check_header(&header, &mphf_path)?;
        let mphf: Mphf<u64> =
            bincode::deserialize_from(&mut mphf_reader).map_err(|e| IndexError::BadMphf {
                path: mphf_path.clone(),
                reason: e.to_string(),
            })?;

        let index = GraphIndex {
            k,
            seq_length,
            n_nodes,
            n_edges,
            n_kmers,
            n_kmer_positions,
            seq_bv,
            mphf,
            sqf: ArrayFile::open(file_path(prefix, ".sqf"))?,
            sqr: ArrayFile::open(file_path(prefix, ".sqr"))?,
            edge: ArrayFile::open(file_path(prefix, ".edge"))?,
            nref: ArrayFile::open(file_path(prefix, ".nref"))?,
            kpref: ArrayFile::open(file_path(prefix, ".kpref"))?,
            kptab: ArrayFile::open(file_path(prefix, ".kptab"))?,
        };
        index.validate()?;
        log::debug!(
            "loaded index {}: k={}, {} bp, {} nodes, {} kmers, {} positions",
            prefix.display(),
            index.k,
            index.seq_length,
            index.n_nodes,
            index.n_kmers,
            index.n_kmer_positions
        );
        Ok(index)
    }

    fn validate(&self) -> Result<(), IndexError> {
        let expect = |file: &ArrayFile, needed: usize| -> Result<(), IndexError> {
            if file.payload_len != needed {
                Err(IndexError::Truncated {
                    path: file.path.clone(),
                    needed,
                    got: file.payload_len,
                })
            } else {
                Ok(())
            }
        };
        expect(&self.sqf, self.seq_length as usize)?;
        expect(&self.sqr, self.seq_length as usize)?;
        expect(&self.edge, self.n_edges as usize * 8)?;
        expect(&self.nref, (self.n_nodes as usize + 1) * 24)?;
        expect(&self.kpref, (self.n_kmers as usize + 1) * 8)?;
        expect(&self.kptab, self.n_kmer_positions as usize * 16)?;
        if self.seq_bv.len() as u64 != self.seq_length
            || self.seq_bv.count_ones() as u64 != self.n_nodes
        {
            return Err(IndexError::Truncated {
                path: self.sqf.path.with_extension("sbv"),
                needed: self.seq_length as usize,
                got: self.seq_bv.len(),
            });
        }
        Ok(())
    }

    pub fn seq_fwd(&self) -> &[u8] {
        self.sqf.bytes()
    }

    pub fn seq_rev(&self) -> &[u8] {
        self.sqr.bytes()
    }

    pub fn edges(&self) -> &[Handle] {
        self.edge.slice()
    }

    pub fn node_refs(&self) -> &[NodeRef] {
        self.nref.slice()
    }

    pub fn kmer_pos_ref(&self) -> &[u64] {
        self.kpref.slice()
    }

    pub fn kmer_pos_table(&self) -> &[KmerSpan] {
        self.kptab.slice()
    }

    //-------------------------------------------------------------------------
    // topology over the packed arrays

    /// Rank of the node covering a forward-strand offset.
    pub fn node_rank_at(&self, fwd_offset: u64) -> u64 {
        debug_assert!(fwd_offset < self.seq_length);
        self.seq_bv.rank(fwd_offset as usize + 1) as u64 - 1
    }

    pub fn node_start(&self, rank: u64) -> u64 {
        self.node_refs()[rank as usize].seq_start
    }

    pub fn node_length(&self, rank: u64) -> usize {
        let refs = self.node_refs();
        (refs[rank as usize + 1].seq_start - refs[rank as usize].seq_start) as usize
    }

    /// First position of `h` on its strand's coordinate line.
    pub fn seq_pos_of(&self, h: Handle) -> SeqPos {
        let start = self.node_start(h.rank());
        if !h.is_rev() {
            SeqPos::encode(start, false)
        } else {
            let len = self.node_length(h.rank()) as u64;
            SeqPos::encode(self.seq_length - start - len, true)
        }
    }

    /// Handle covering `p`, plus the offset of `p` within that handle.
    pub fn handle_at(&self, p: SeqPos) -> Option<(Handle, usize)> {
        let offset = p.offset();
        if offset >= self.seq_length {
            return None;
        }
        if !p.is_rev() {
            let rank = self.node_rank_at(offset);
            Some((
                Handle::pack(rank, false),
                (offset - self.node_start(rank)) as usize,
            ))
        } else {
            let rank = self.node_rank_at(self.seq_length - 1 - offset);
            let h = Handle::pack(rank, true);
            Some((h, (offset - self.seq_pos_of(h).offset()) as usize))
        }
    }

    /// Sequence of `h` on its strand, borrowed from the linear arrays.
    pub fn handle_sequence(&self, h: Handle) -> &[u8] {
        let start = self.seq_pos_of(h).offset() as usize;
        let len = self.node_length(h.rank());
        if !h.is_rev() {
            &self.seq_fwd()[start..start + len]
        } else {
            &self.seq_rev()[start..start + len]
        }
    }

    /// Handles reachable by one step from `h`.
    pub fn successors(&self, h: Handle) -> Vec<Handle> {
        let refs = self.node_refs();
        let r = h.rank() as usize;
        let lo = refs[r].edge_start as usize;
        let split = lo + refs[r].n_incoming as usize;
        let hi = refs[r + 1].edge_start as usize;
        let edges = self.edges();
        if !h.is_rev() {
            edges[split..hi].to_vec()
        } else {
            edges[lo..split].iter().map(|&e| e.flip()).collect()
        }
    }

    /// Reconstruct the k bases of a stored walk. Spans that are contiguous
    /// on the strand line are sliced directly; the rest are recovered by a
    /// bounded search over the topology.
    pub fn walk_sequence(&self, begin: SeqPos, end: SeqPos, k: usize) -> Option<Vec<u8>> {
        if begin.is_rev() != end.is_rev() {
            return None;
        }
        let (b, e) = (begin.offset(), end.offset());
        if b >= self.seq_length || e >= self.seq_length {
            return None;
        }
        if e >= b && (e - b + 1) as usize == k {
            let strand = if begin.is_rev() {
                self.seq_rev()
            } else {
                self.seq_fwd()
            };
            return Some(strand[b as usize..=e as usize].to_vec());
        }
        let (h, offset) = self.handle_at(begin)?;
        let mut buf = Vec::with_capacity(k);
        if self.walk_to(h, offset, end, k, &mut buf) {
            Some(buf)
        } else {
            None
        }
    }

    fn walk_to(&self, h: Handle, offset: usize, end: SeqPos, k: usize, buf: &mut Vec<u8>) -> bool {
        let seq = self.handle_sequence(h);
        let take = (seq.len() - offset).min(k - buf.len());
        buf.extend_from_slice(&seq[offset..offset + take]);
        if buf.len() == k {
            let last = SeqPos::encode(
                self.seq_pos_of(h).offset() + (offset + take - 1) as u64,
                h.is_rev(),
            );
            if last == end {
                return true;
            }
        } else {
            for succ in self.successors(h) {
                if self.walk_to(succ, 0, end, k, buf) {
                    return true;
                }
            }
        }
        buf.truncate(buf.len() - take);
        false
    }

    //-------------------------------------------------------------------------
    // k-mer lookup

    /// Verified occurrence list for a canonical k-mer hash.
    ///
    /// The MPHF is not a dictionary: a hash outside the training set maps
    /// to an arbitrary rank. The first stored occurrence is re-spelled
    /// from the topology and its canonical hash compared before the list
    /// is handed out; a mismatch means "not in the index".
    pub fn occurrences(&self, hash: u64) -> Option<&[KmerSpan]> {
        let rank = self.mphf.try_hash(&hash)? as usize;
        if rank >= self.n_kmers as usize {
            return None;
        }
        let pos_ref = self.kmer_pos_ref();
        let lo = pos_ref[rank] as usize;
        let hi = pos_ref[rank + 1] as usize;
        if lo >= hi {
            return None;
        }
        let spans = &self.kmer_pos_table()[lo..hi];
        let first = spans[0];
        let spelled = self.walk_sequence(first.begin, first.end, self.k as usize)?;
        if canonical_kmer_hash(&spelled)? != hash {
            return None;
        }
        Some(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VariationGraph;

    fn scratch_prefix(name: &str) -> PathBuf {
        let dir = PathBuf::from("target/test_index");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn two_node_graph() -> VariationGraph {
        let mut g = VariationGraph::new();
        let a = g.add_node(b"ACGT".to_vec());
        let b = g.add_node(b"GGGA".to_vec());
        g.add_edge(Handle::pack(a, false), Handle::pack(b, false));
        g
    }

    #[test]
    fn build_load_round_trip() {
        let g = two_node_graph();
        let prefix = scratch_prefix("round_trip");
        build(&g, 3, 8, 8, &prefix).unwrap();
        let idx = GraphIndex::load(&prefix).unwrap();
        assert_eq!(idx.k, 3);
        assert_eq!(idx.seq_length, 8);
        assert_eq!(idx.n_nodes, 2);
        assert_eq!(idx.seq_fwd(), b"ACGTGGGA");
        assert_eq!(idx.seq_rev(), b"TCCCACGT");

        // every enumerated k-mer must be findable through the MPHF
        let kmers = enumerate_kmers(&g, 3, 8, 8);
        assert!(!kmers.is_empty());
        for p in &kmers {
            let spans = idx.occurrences(p.hash).expect("stored k-mer not found");
            assert!(spans.iter().any(|s| s.begin == p.begin && s.end == p.end));
        }
    }

    #[test]
    fn rank_maps_offsets_to_nodes() {
        let g = two_node_graph();
        let prefix = scratch_prefix("rank");
        build(&g, 3, 8, 8, &prefix).unwrap();
        let idx = GraphIndex::load(&prefix).unwrap();
        for off in 0..4 {
            assert_eq!(idx.node_rank_at(off), 0);
        }
        for off in 4..8 {
            assert_eq!(idx.node_rank_at(off), 1);
        }
        assert_eq!(idx.node_start(1), 4);
        assert_eq!(idx.node_length(1), 4);
    }

    #[test]
    fn strand_arrays_are_complementary() {
        let g = two_node_graph();
        let prefix = scratch_prefix("strands");
        build(&g, 3, 8, 8, &prefix).unwrap();
        let idx = GraphIndex::load(&prefix).unwrap();
        let (fwd, rev) = (idx.seq_fwd(), idx.seq_rev());
        for i in 0..idx.seq_length as usize {
            assert_eq!(
                fwd[i],
                crate::dna::complement(rev[idx.seq_length as usize - 1 - i])
            );
        }
    }

    #[test]
    fn kmer_pos_ref_is_monotone() {
        let g = two_node_graph();
        let prefix = scratch_prefix("monotone");
        build(&g, 3, 8, 8, &prefix).unwrap();
        let idx = GraphIndex::load(&prefix).unwrap();
        let pos_ref = idx.kmer_pos_ref();
        assert!(pos_ref.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*pos_ref.last().unwrap(), idx.n_kmer_positions);
        assert_eq!(pos_ref.len() as u64, idx.n_kmers + 1);
    }

    #[test]
    fn reverse_handles_read_from_rev_strand() {
        let g = two_node_graph();
        let prefix = scratch_prefix("rev_handles");
        build(&g, 3, 8, 8, &prefix).unwrap();
        let idx = GraphIndex::load(&prefix).unwrap();
        assert_eq!(idx.handle_sequence(Handle::pack(0, false)), b"ACGT");
        assert_eq!(idx.handle_sequence(Handle::pack(0, true)), b"ACGT");
        assert_eq!(idx.handle_sequence(Handle::pack(1, true)), b"TCCC");
        // successor lists survive the round trip, both orientations
        assert_eq!(
            idx.successors(Handle::pack(0, false)),
            vec![Handle::pack(1, false)]
        );
        assert_eq!(
            idx.successors(Handle::pack(1, true)),
            vec![Handle::pack(0, true)]
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        let g = two_node_graph();
        let prefix = scratch_prefix("bad_magic");
        build(&g, 3, 8, 8, &prefix).unwrap();
        let meta = file_path(&prefix, ".meta");
        let mut bytes = fs::read(&meta).unwrap();
        bytes[0] = b'X';
        fs::write(&meta, bytes).unwrap();
        match GraphIndex::load(&prefix) {
            Err(IndexError::BadMagic { path }) => assert_eq!(path, meta),
            other => panic!("expected BadMagic, got {:?}", other.err()),
        }
    }

    #[test]
    fn unsupported_k_is_rejected() {
        let g = two_node_graph();
        let prefix = scratch_prefix("bad_k");
        assert!(matches!(
            build(&g, 0, 8, 8, &prefix),
            Err(IndexError::UnsupportedK { .. })
        ));
        assert!(matches!(
            build(&g, 33, 8, 8, &prefix),
            Err(IndexError::UnsupportedK { .. })
        ));
    }
}
