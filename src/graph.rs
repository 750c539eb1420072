// Read-only graph accessor
//
// The index builder consumes the input graph through the `GraphAccess`
// trait: node ranks are dense, sequences are fetched per node in forward
// orientation, and topology is exposed as oriented successor sets. The
// core never mutates the graph it is given.
//
// `VariationGraph` is the in-memory implementation used by the GFA loader
// and the tests. Edges are bidirected: an edge joins two handles, so a
// traversal entering a node in reverse leaves through the flipped incoming
// set.

use crate::seqpos::Handle;

/// Read-only view over a variation graph.
pub trait GraphAccess {
    /// Number of nodes; ranks are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Total length of all node sequences.
    fn total_length(&self) -> usize;

    fn node_length(&self, rank: u64) -> usize;

    /// Forward-orientation sequence of a node.
    fn node_sequence(&self, rank: u64) -> &[u8];

    /// Handles reachable by one step from `h`, respecting orientation.
    fn successors(&self, h: Handle) -> Vec<Handle>;

    /// Handles with an edge into `h`.
    fn predecessors(&self, h: Handle) -> Vec<Handle> {
        self.successors(h.flip())
            .into_iter()
            .map(Handle::flip)
            .collect()
    }

    fn degree(&self, h: Handle) -> usize {
        self.successors(h).len()
    }
}

/// In-memory bidirected sequence graph.
#[derive(Debug, Default, Clone)]
pub struct VariationGraph {
    seqs: Vec<Vec<u8>>,
    // edges leaving the forward orientation of each node
    fwd_out: Vec<Vec<Handle>>,
    // handles with an edge into the forward orientation of each node
    fwd_in: Vec<Vec<Handle>>,
}

impl VariationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node; returns its rank.
    pub fn add_node(&mut self, sequence: Vec<u8>) -> u64 {
        assert!(!sequence.is_empty(), "zero-length node");
        self.seqs.push(sequence);
        self.fwd_out.push(Vec::new());
        self.fwd_in.push(Vec::new());
        (self.seqs.len() - 1) as u64
    }

    /// Add the bidirected edge `from -> to`.
    pub fn add_edge(&mut self, from: Handle, to: Handle) {
        assert!((from.rank() as usize) < self.seqs.len());
        assert!((to.rank() as usize) < self.seqs.len());
        // successor set of `from`
        if !from.is_rev() {
            self.fwd_out[from.rank() as usize].push(to);
        } else {
            // leaving a node in reverse is entering its forward side
            self.fwd_in[from.rank() as usize].push(to.flip());
        }
        // predecessor set of `to`
        if !to.is_rev() {
            self.fwd_in[to.rank() as usize].push(from);
        } else {
            self.fwd_out[to.rank() as usize].push(from.flip());
        }
    }

    pub fn edge_count(&self) -> usize {
        self.fwd_out.iter().map(Vec::len).sum()
    }
}

impl GraphAccess for VariationGraph {
    fn node_count(&self) -> usize {
        self.seqs.len()
    }

    fn total_length(&self) -> usize {
        self.seqs.iter().map(Vec::len).sum()
    }

    fn node_length(&self, rank: u64) -> usize {
        self.seqs[rank as usize].len()
    }

    fn node_sequence(&self, rank: u64) -> &[u8] {
        &self.seqs[rank as usize]
    }

    fn successors(&self, h: Handle) -> Vec<Handle> {
        if !h.is_rev() {
            self.fwd_out[h.rank() as usize].clone()
        } else {
            self.fwd_in[h.rank() as usize]
                .iter()
                .map(|&n| n.flip())
                .collect()
        }
    }
}
