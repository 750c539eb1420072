// Alignment driver
//
// For each superchain the driver induces a path through the graph region
// the chains point at, hands the query and the path's sequence to the
// gap-affine local aligner, and assembles a GAF record from the
// traceback. The induced path starts at the node covering the
// superchain's reference interval (extended by flanks sized from the
// unanchored query tails) and follows successors, preferring nodes that
// the superchain's anchors touch; in a bubble this steers the walk
// through the anchored allele.

use crate::index::GraphIndex;
use crate::map_opt::MapOpt;
use crate::seqpos::{Handle, SeqPos};
use crate::superchain::SuperChain;
use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::io::{self, Write};

// slack added to the unanchored query tails when sizing target flanks
const FLANK_SLACK: usize = 16;

/// One output record in GAF column order.
#[derive(Debug, Clone)]
pub struct GafRecord {
    pub name: String,
    pub query_len: usize,
    /// 0-based, half-open.
    pub query_start: usize,
    pub query_end: usize,
    pub strand: char,
    pub path: Vec<Handle>,
    pub path_len: usize,
    pub path_start: usize,
    pub path_end: usize,
    pub residue_matches: usize,
    pub block_len: usize,
    pub mapq: u8,
    pub score: i64,
    pub cigar: Option<String>,
}

impl GafRecord {
    /// Terminal record for a read that produced no alignment.
    pub fn unmapped(name: &str, query_len: usize) -> Self {
        GafRecord {
            name: name.to_string(),
            query_len,
            query_start: 0,
            query_end: 0,
            strand: '+',
            path: Vec::new(),
            path_len: 0,
            path_start: 0,
            path_end: 0,
            residue_matches: 0,
            block_len: 0,
            mapq: 0,
            score: 0,
            cigar: None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        self.path.is_empty()
    }

    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "*".to_string();
        }
        let mut s = String::with_capacity(self.path.len() * 4);
        for h in &self.path {
            let _ = write!(
                s,
                "{}{}",
                if h.is_rev() { '<' } else { '>' },
                h.rank() + 1
            );
        }
        s
    }

    pub fn write_gaf<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        write!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\tAS:i:{}",
            self.name,
            self.query_len,
            self.query_start,
            self.query_end,
            self.strand,
            self.path_string(),
            self.path_len,
            self.path_start,
            self.path_end,
            self.residue_matches,
            self.block_len,
            self.mapq,
            self.score
        )?;
        if let Some(ref cigar) = self.cigar {
            write!(w, "\tcg:Z:{}", cigar)?;
        }
        writeln!(w)
    }
}

/// Mapping quality from the best and second-best superchain scores.
pub fn mapq_from_scores(s1: i64, s2: i64) -> u8 {
    if s1 <= 0 {
        return 0;
    }
    if s2 <= 0 {
        return 60;
    }
    let ratio = s1 as f64 / (s1 + s2) as f64;
    let q = -10.0 * (1.0 - ratio).log10();
    q.clamp(0.0, 60.0) as u8
}

/// Path induced from the graph for one target interval, with the slice of
/// its concatenated sequence that covers the interval.
struct InducedPath {
    handles: Vec<Handle>,
    seq: Vec<u8>,
    slice_start: usize,
    slice_end: usize,
}

/// Walk the strand's topology from the node covering `target_begin` until
/// `target_end` is covered, preferring anchored successors and never
/// stepping back along the strand line.
fn induce_path(
    index: &GraphIndex,
    is_rev: bool,
    anchored: &HashSet<u64>,
    target_begin: u64,
    target_end: u64,
    budget: usize,
) -> Option<InducedPath> {
    let (first, _) = index.handle_at(SeqPos::encode(target_begin, is_rev))?;
    let mut handles = vec![first];
    let mut seq = index.handle_sequence(first).to_vec();
    let mut last = first;
    let mut walked_end = index.seq_pos_of(first).offset() + index.node_length(first.rank()) as u64;

    while walked_end <= target_end && seq.len() < budget {
        let next = index
            .successors(last)
            .into_iter()
            .filter(|s| index.seq_pos_of(*s).offset() >= walked_end)
            .min_by_key(|s| (!anchored.contains(&s.rank()), index.seq_pos_of(*s).offset()));
        let Some(next) = next else { break };
        handles.push(next);
        seq.extend_from_slice(index.handle_sequence(next));
        walked_end = index.seq_pos_of(next).offset() + index.node_length(next.rank()) as u64;
        last = next;
    }

    let slice_start = (target_begin - index.seq_pos_of(first).offset()) as usize;
    let mut slice_end = seq.len();
    let last_start = index.seq_pos_of(last).offset();
    if walked_end > target_end + 1 && target_end >= last_start {
        slice_end -= (walked_end - 1 - target_end) as usize;
    }
    if slice_start >= slice_end {
        return None;
    }
    Some(InducedPath {
        handles,
        seq,
        slice_start,
        slice_end,
    })
}

/// Align `query` against the region a superchain points at and assemble
/// the record. `mapq` is the caller's business (it needs the score of the
/// runner-up superchain).
pub fn superalign(
    index: &GraphIndex,
    name: &str,
    query: &[u8],
    sc: &SuperChain,
    opt: &MapOpt,
) -> GafRecord {
    let query_len = query.len();
    let left_flank = (sc.query_begin + FLANK_SLACK) as u64;
    let right_flank = (query_len - 1 - sc.query_end + FLANK_SLACK) as u64;
    let target_begin = match sc.ref_begin.retreat(left_flank) {
        Ok(p) => p.offset(),
        Err(_) => 0, // flank runs off the strand start
    };
    let target_end = match sc.ref_end.advance(right_flank) {
        Ok(p) => p.offset().min(index.seq_length - 1),
        Err(_) => index.seq_length - 1,
    };
    let budget = (target_end - target_begin + 1) as usize + 2 * opt.max_gap as usize;

    let mut anchored = HashSet::new();
    for chain in &sc.chains {
        for anchor in &chain.anchors {
            if let Some((h, _)) = index.handle_at(anchor.ref_begin) {
                anchored.insert(h.rank());
            }
            if let Some((h, _)) = index.handle_at(anchor.ref_end) {
                anchored.insert(h.rank());
            }
        }
    }

    let induced = match induce_path(index, sc.is_rev, &anchored, target_begin, target_end, budget)
    {
        Some(p) => p,
        None => return GafRecord::unmapped(name, query_len),
    };
    let target = &induced.seq[induced.slice_start..induced.slice_end];

    let match_score = opt.match_score;
    let mismatch = opt.mismatch_penalty;
    let score_fn =
        |a: u8, b: u8| if a == b { match_score } else { -mismatch };
    let mut aligner = Aligner::with_capacity(
        query_len,
        target.len(),
        -opt.gap_open,
        -opt.gap_extend,
        &score_fn,
    );
    let aln = aligner.local(query, target);
    if aln.yend <= aln.ystart || aln.xend <= aln.xstart {
        return GafRecord::unmapped(name, query_len);
    }

    // CIGAR and residue accounting over the aligned block
    let mut cigar = String::new();
    let mut matches = 0usize;
    let mut block_len = 0usize;
    let mut run_op = ' ';
    let mut run_len = 0usize;
    for op in &aln.operations {
        let c = match op {
            AlignmentOperation::Match => {
                matches += 1;
                '='
            }
            AlignmentOperation::Subst => 'X',
            AlignmentOperation::Ins => 'I',
            AlignmentOperation::Del => 'D',
            _ => continue,
        };
        block_len += 1;
        if c == run_op {
            run_len += 1;
        } else {
            if run_len > 0 {
                let _ = write!(cigar, "{}{}", run_len, run_op);
            }
            run_op = c;
            run_len = 1;
        }
    }
    if run_len > 0 {
        let _ = write!(cigar, "{}{}", run_len, run_op);
    }

    // drop path nodes the alignment never reaches
    let aln_path_begin = induced.slice_start + aln.ystart;
    let aln_path_end = induced.slice_start + aln.yend;
    let mut kept: Vec<Handle> = Vec::new();
    let mut kept_first_offset = 0usize;
    let mut offset = 0usize;
    for h in &induced.handles {
        let len = index.node_length(h.rank());
        if offset + len > aln_path_begin && offset < aln_path_end {
            if kept.is_empty() {
                kept_first_offset = offset;
            }
            kept.push(*h);
        }
        offset += len;
    }
    let path_len: usize = kept.iter().map(|h| index.node_length(h.rank())).sum();

    GafRecord {
        name: name.to_string(),
        query_len,
        query_start: aln.xstart,
        query_end: aln.xend,
        strand: if sc.is_rev { '-' } else { '+' },
        path: kept,
        path_len,
        path_start: aln_path_begin - kept_first_offset,
        path_end: aln_path_end - kept_first_offset,
        residue_matches: matches,
        block_len,
        mapq: 0,
        score: aln.score as i64,
        cigar: Some(cigar),
    }
}

/// Chain/superchain debug record: the region a chain points at, without
/// base-level alignment.
pub fn region_record(
    index: &GraphIndex,
    name: String,
    query_len: usize,
    query_begin: usize,
    query_end: usize,
    ref_begin: SeqPos,
    ref_end: SeqPos,
    is_rev: bool,
    score: i64,
) -> GafRecord {
    let anchored = HashSet::new();
    let span = ref_end.offset() - ref_begin.offset() + 1;
    let induced = induce_path(
        index,
        is_rev,
        &anchored,
        ref_begin.offset(),
        ref_end.offset(),
        span as usize * 2,
    );
    let (path, path_len, path_start, path_end) = match induced {
        Some(p) => {
            let len: usize = p.handles.iter().map(|h| index.node_length(h.rank())).sum();
            (p.handles, len, p.slice_start, p.slice_end)
        }
        None => (Vec::new(), 0, 0, 0),
    };
    let matched = score.max(0) as usize;
    GafRecord {
        name,
        query_len,
        query_start: query_begin,
        query_end: query_end + 1,
        strand: if is_rev { '-' } else { '+' },
        path,
        path_len,
        path_start,
        path_end,
        residue_matches: matched,
        block_len: query_end - query_begin + 1,
        mapq: 255,
        score,
        cigar: None,
    }
}
