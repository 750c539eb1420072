// K-mer enumeration over graph walks
//
// Every length-k walk that starts at a base of some node (on either
// strand) and stays within the furcation budget is emitted as a
// (hash, begin, end) record. `begin` and `end` are oriented positions on
// the linearized strand of the walk's starting handle; the path between
// them is implicit in the topology and is reconstructed from the index
// when needed.
//
// Branching is the resource being budgeted: a step taken from a handle
// with more than one successor costs one furcation, and a walk is
// abandoned once the budget is spent. Handles whose degree exceeds
// max_degree are never used as walk sources; they would produce a
// combinatorial pile of low-specificity anchors. Cycles need no special
// bookkeeping since a walk collects at most k bases.

use crate::dna::{canonical_kmer_hash, revcomp};
use crate::graph::GraphAccess;
use crate::seqpos::{Handle, SeqPos};
use rayon::prelude::*;

/// One k-length walk: canonical hash plus its oriented span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerPos {
    pub hash: u64,
    pub begin: SeqPos,
    pub end: SeqPos,
}

/// Forward-strand start offset of every node, in rank order.
pub fn node_seq_starts<G: GraphAccess + ?Sized>(graph: &G) -> Vec<u64> {
    let mut starts = Vec::with_capacity(graph.node_count());
    let mut offset = 0u64;
    for rank in 0..graph.node_count() as u64 {
        starts.push(offset);
        offset += graph.node_length(rank) as u64;
    }
    starts
}

/// Enumerate all k-mers reachable within the furcation budget,
/// parallelized across node ranks.
pub fn enumerate_kmers<G: GraphAccess + Sync>(
    graph: &G,
    k: usize,
    max_furcations: u64,
    max_degree: usize,
) -> Vec<KmerPos> {
    let seq_starts = node_seq_starts(graph);
    let total = graph.total_length() as u64;
    let walker = Walker {
        graph,
        seq_starts: &seq_starts,
        total,
        k,
    };

    let per_node: Vec<Vec<KmerPos>> = (0..graph.node_count() as u64)
        .into_par_iter()
        .map(|rank| {
            let mut out = Vec::new();
            for &is_rev in &[false, true] {
                let h = Handle::pack(rank, is_rev);
                if graph.degree(h) > max_degree {
                    log::debug!("skipping high-degree seed {:?}", h);
                    continue;
                }
                let len = graph.node_length(rank);
                let mut buf = Vec::with_capacity(k);
                for start in 0..len {
                    let begin =
                        SeqPos::encode(walker.strand_start(h) + start as u64, is_rev);
                    walker.extend(h, start, begin, &mut buf, max_furcations as i64, &mut out);
                    debug_assert!(buf.is_empty());
                }
            }
            out
        })
        .collect();

    let mut kmers = Vec::with_capacity(per_node.iter().map(Vec::len).sum());
    for mut chunk in per_node {
        kmers.append(&mut chunk);
    }
    kmers
}

struct Walker<'a, G: GraphAccess> {
    graph: &'a G,
    seq_starts: &'a [u64],
    total: u64,
    k: usize,
}

impl<'a, G: GraphAccess> Walker<'a, G> {
    /// Offset of the first base of `h` on its strand's coordinate line.
    fn strand_start(&self, h: Handle) -> u64 {
        let r = h.rank() as usize;
        if !h.is_rev() {
            self.seq_starts[r]
        } else {
            self.total - self.seq_starts[r] - self.graph.node_length(h.rank()) as u64
        }
    }

    fn handle_sequence(&self, h: Handle) -> Vec<u8> {
        let seq = self.graph.node_sequence(h.rank());
        if h.is_rev() {
            revcomp(seq)
        } else {
            seq.to_vec()
        }
    }

    fn extend(
        &self,
        h: Handle,
        offset: usize,
        begin: SeqPos,
        buf: &mut Vec<u8>,
        budget: i64,
        out: &mut Vec<KmerPos>,
    ) {
        let seq = self.handle_sequence(h);
        let take = (seq.len() - offset).min(self.k - buf.len());
        buf.extend_from_slice(&seq[offset..offset + take]);

        if buf.len() == self.k {
            let end = SeqPos::encode(
                self.strand_start(h) + (offset + take - 1) as u64,
                h.is_rev(),
            );
            if let Some(hash) = canonical_kmer_hash(buf) {
                out.push(KmerPos { hash, begin, end });
            }
        } else {
            let successors = self.graph.successors(h);
            let cost = if successors.len() > 1 { 1 } else { 0 };
            if budget - cost >= 0 {
                for succ in successors {
                    self.extend(succ, 0, begin, buf, budget - cost, out);
                }
            }
        }
        buf.truncate(buf.len() - take);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VariationGraph;

    #[test]
    fn single_node_kmers() {
        let mut g = VariationGraph::new();
        g.add_node(b"ACGTACGT".to_vec());
        let kmers = enumerate_kmers(&g, 4, 8, 8);
        // 5 starts per strand
        assert_eq!(kmers.len(), 10);
        let fwd: Vec<_> = kmers.iter().filter(|p| !p.begin.is_rev()).collect();
        assert_eq!(fwd.len(), 5);
        for p in &fwd {
            assert_eq!(p.end.offset() - p.begin.offset() + 1, 4);
        }
    }

    #[test]
    fn kmers_cross_edges() {
        let mut g = VariationGraph::new();
        let a = g.add_node(b"ACGT".to_vec());
        let b = g.add_node(b"GGGA".to_vec());
        g.add_edge(Handle::pack(a, false), Handle::pack(b, false));
        let kmers = enumerate_kmers(&g, 3, 8, 8);
        // forward starts: 4 from node a (two crossing), 2 inside node b
        let fwd: Vec<_> = kmers.iter().filter(|p| !p.begin.is_rev()).collect();
        assert_eq!(fwd.len(), 6);
        // the walk starting at offset 3 spells "TGG" and ends inside node b
        let crossing = fwd.iter().find(|p| p.begin.offset() == 3).unwrap();
        assert_eq!(crossing.end.offset(), 5);
        assert_eq!(
            crossing.hash,
            canonical_kmer_hash(b"TGG").unwrap()
        );
    }

    #[test]
    fn furcation_budget_prunes_branches() {
        // a -> {b, c}; with budget 0 no walk may take the branching step
        let mut g = VariationGraph::new();
        let a = g.add_node(b"AC".to_vec());
        let b = g.add_node(b"GG".to_vec());
        let c = g.add_node(b"TT".to_vec());
        g.add_edge(Handle::pack(a, false), Handle::pack(b, false));
        g.add_edge(Handle::pack(a, false), Handle::pack(c, false));
        let pruned = enumerate_kmers(&g, 3, 0, 8);
        assert!(pruned
            .iter()
            .all(|p| p.begin.is_rev() || p.begin.offset() >= 2));
        let full = enumerate_kmers(&g, 3, 1, 8);
        assert!(full.len() > pruned.len());
    }

    #[test]
    fn high_degree_sources_are_skipped() {
        let mut g = VariationGraph::new();
        let hub = g.add_node(b"AAAA".to_vec());
        for seq in [b"CC".to_vec(), b"GG".to_vec(), b"TT".to_vec()] {
            let n = g.add_node(seq);
            g.add_edge(Handle::pack(hub, false), Handle::pack(n, false));
        }
        // degree 3 > max_degree 2: the hub's forward strand seeds nothing
        let kmers = enumerate_kmers(&g, 2, 8, 2);
        assert!(kmers
            .iter()
            .all(|p| p.begin.is_rev() || p.begin.offset() >= 4));
        // the cap is strict: degree 3 == max_degree 3 still seeds
        let seeded = enumerate_kmers(&g, 2, 8, 3);
        assert!(seeded
            .iter()
            .any(|p| !p.begin.is_rev() && p.begin.offset() < 4));
    }

    #[test]
    fn ambiguous_bases_emit_nothing() {
        let mut g = VariationGraph::new();
        g.add_node(b"ACNGT".to_vec());
        // every 3-mer on either strand spans the N
        let kmers = enumerate_kmers(&g, 3, 8, 8);
        assert_eq!(kmers.len(), 0);
    }
}
