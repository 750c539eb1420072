// Anchor extraction
//
// An anchor is an exact k-mer match between the query and a graph walk.
// The query is scanned once; each clean ACGT window is hashed canonically
// and looked up through the MPHF. Because hashing is canonical, a stored
// occurrence may spell the reverse complement of the query window; such
// occurrences are skipped here, since the mirror walk on the opposite
// strand line is stored separately and anchors the reverse-strand
// mapping.

use crate::dna::canonical_kmer_hash;
use crate::index::GraphIndex;
use crate::seqpos::SeqPos;

/// Exact k-mer match between query and graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// First matched query offset.
    pub query_begin: usize,
    /// Last matched query offset (inclusive).
    pub query_end: usize,
    pub ref_begin: SeqPos,
    pub ref_end: SeqPos,
}

impl Anchor {
    pub fn is_rev(&self) -> bool {
        self.ref_begin.is_rev()
    }
}

/// All verified anchors for `query`, sorted by reference position then
/// query position.
pub fn anchors_for_query(index: &GraphIndex, query: &[u8]) -> Vec<Anchor> {
    let k = index.k as usize;
    let mut anchors = Vec::new();
    if query.len() < k {
        return anchors;
    }
    for i in 0..=query.len() - k {
        let window = &query[i..i + k];
        let hash = match canonical_kmer_hash(window) {
            Some(h) => h,
            None => continue, // ambiguous base inside the window
        };
        let spans = match index.occurrences(hash) {
            Some(s) => s,
            None => continue,
        };
        for span in spans {
            // drop reverse-complement occurrences and stray collisions
            match index.walk_sequence(span.begin, span.end, k) {
                Some(spelled) if spelled.eq_ignore_ascii_case(window) => {
                    anchors.push(Anchor {
                        query_begin: i,
                        query_end: i + k - 1,
                        ref_begin: span.begin,
                        ref_end: span.end,
                    });
                }
                _ => {}
            }
        }
    }
    anchors.sort_by_key(|a| (a.ref_begin, a.query_begin));
    log::debug!("{} anchors for {} bp query", anchors.len(), query.len());
    anchors
}
