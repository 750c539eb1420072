// Superchain selection
//
// Chains are admitted in score order as long as their query interval does
// not overlap the already-covered part of the query by more than
// chain_overlap_max of their own length. Admitted chains that sit on the
// same strand within max_gap of each other on the reference line are
// grouped into one superchain, which is what the alignment driver works
// on. Selection is deterministic and idempotent: re-running it on its own
// output changes nothing.

use crate::chain::Chain;
use crate::seqpos::SeqPos;

#[derive(Debug, Clone)]
pub struct SuperChain {
    pub chains: Vec<Chain>,
    pub score: i64,
    pub query_begin: usize,
    /// Inclusive.
    pub query_end: usize,
    pub ref_begin: SeqPos,
    pub ref_end: SeqPos,
    pub is_rev: bool,
}

impl SuperChain {
    pub fn query_span(&self) -> usize {
        self.query_end - self.query_begin + 1
    }
}

/// Select low-overlap chains and group them into superchains.
pub fn superchains(chains: &[Chain], max_gap: u64, chain_overlap_max: f64) -> Vec<SuperChain> {
    if chains.is_empty() {
        return Vec::new();
    }

    // score-descending admission, deterministic tie-breaks
    let mut order: Vec<usize> = (0..chains.len()).collect();
    order.sort_by(|&a, &b| {
        chains[b]
            .score
            .cmp(&chains[a].score)
            .then(chains[a].ref_begin.cmp(&chains[b].ref_begin))
            .then(chains[a].query_begin.cmp(&chains[b].query_begin))
    });

    let mut covered: Vec<(usize, usize)> = Vec::new(); // disjoint, sorted, inclusive
    let mut accepted: Vec<&Chain> = Vec::new();
    for &i in &order {
        let chain = &chains[i];
        let overlap = covered_overlap(&covered, chain.query_begin, chain.query_end);
        if overlap as f64 > chain_overlap_max * chain.query_span() as f64 {
            log::debug!(
                "chain [{}..{}] rejected: {} of {} bases already covered",
                chain.query_begin,
                chain.query_end,
                overlap,
                chain.query_span()
            );
            continue;
        }
        insert_interval(&mut covered, chain.query_begin, chain.query_end);
        accepted.push(chain);
    }

    // group by strand and reference proximity
    accepted.sort_by_key(|c| (c.is_rev, c.ref_begin));
    let mut out: Vec<SuperChain> = Vec::new();
    for chain in accepted {
        let extend = out.last().map_or(false, |sc: &SuperChain| {
            sc.is_rev == chain.is_rev
                && chain.ref_begin.offset() <= sc.ref_end.offset().saturating_add(max_gap)
        });
        if extend {
            let sc = out.last_mut().unwrap();
            sc.score += chain.score;
            sc.query_begin = sc.query_begin.min(chain.query_begin);
            sc.query_end = sc.query_end.max(chain.query_end);
            sc.ref_end = sc.ref_end.max(chain.ref_end);
            sc.chains.push(chain.clone());
        } else {
            out.push(SuperChain {
                score: chain.score,
                query_begin: chain.query_begin,
                query_end: chain.query_end,
                ref_begin: chain.ref_begin,
                ref_end: chain.ref_end,
                is_rev: chain.is_rev,
                chains: vec![chain.clone()],
            });
        }
    }
    for sc in &mut out {
        sc.chains.sort_by_key(|c| c.query_begin);
    }

    out.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.ref_begin.cmp(&b.ref_begin))
    });
    log::debug!("{} chains -> {} superchains", chains.len(), out.len());
    out
}

fn covered_overlap(covered: &[(usize, usize)], begin: usize, end: usize) -> usize {
    covered
        .iter()
        .map(|&(b, e)| {
            let lo = b.max(begin);
            let hi = e.min(end);
            hi.saturating_sub(lo) + usize::from(hi >= lo)
        })
        .sum()
}

fn insert_interval(covered: &mut Vec<(usize, usize)>, begin: usize, end: usize) {
    covered.push((begin, end));
    covered.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(covered.len());
    for &(b, e) in covered.iter() {
        match merged.last_mut() {
            Some(last) if b <= last.1 + 1 => last.1 = last.1.max(e),
            _ => merged.push((b, e)),
        }
    }
    *covered = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;

    fn chain(qb: usize, qe: usize, rb: u64, re: u64, score: i64, rev: bool) -> Chain {
        Chain {
            score,
            anchors: vec![Anchor {
                query_begin: qb,
                query_end: qe,
                ref_begin: SeqPos::encode(rb, rev),
                ref_end: SeqPos::encode(re, rev),
            }],
            query_begin: qb,
            query_end: qe,
            ref_begin: SeqPos::encode(rb, rev),
            ref_end: SeqPos::encode(re, rev),
            is_rev: rev,
        }
    }

    #[test]
    fn nearby_chains_merge() {
        // two chains flanking a mismatch, close on the reference
        let chains = vec![
            chain(0, 20, 100, 120, 21, false),
            chain(25, 49, 125, 149, 25, false),
        ];
        let scs = superchains(&chains, 1000, 0.75);
        assert_eq!(scs.len(), 1);
        assert_eq!(scs[0].chains.len(), 2);
        assert_eq!(scs[0].score, 46);
        assert_eq!(scs[0].query_begin, 0);
        assert_eq!(scs[0].query_end, 49);
    }

    #[test]
    fn distant_regions_stay_separate() {
        let chains = vec![
            chain(0, 20, 100, 120, 21, false),
            chain(25, 49, 90_000, 90_024, 25, false),
        ];
        let scs = superchains(&chains, 1000, 0.75);
        assert_eq!(scs.len(), 2);
        // higher score first
        assert!(scs[0].score >= scs[1].score);
    }

    #[test]
    fn heavy_overlap_is_rejected() {
        let chains = vec![
            chain(0, 49, 100, 149, 50, false),
            // same query interval, far away on the graph
            chain(0, 49, 90_000, 90_049, 40, false),
        ];
        let scs = superchains(&chains, 1000, 0.75);
        assert_eq!(scs.len(), 1);
        assert_eq!(scs[0].score, 50);
    }

    #[test]
    fn equal_scores_tie_break_on_smaller_start() {
        let chains = vec![
            chain(0, 9, 500, 509, 10, false),
            chain(0, 9, 40, 49, 10, false),
        ];
        let scs = superchains(&chains, 100, 0.0);
        // zero overlap budget: only one survives, the smaller start
        assert_eq!(scs.len(), 1);
        assert_eq!(scs[0].ref_begin.offset(), 40);
    }

    #[test]
    fn selection_is_idempotent() {
        let chains = vec![
            chain(0, 20, 100, 120, 21, false),
            chain(25, 49, 125, 149, 25, false),
            chain(0, 49, 90_000, 90_049, 30, true),
        ];
        let first = superchains(&chains, 1000, 0.75);
        let flattened: Vec<Chain> = first.iter().flat_map(|sc| sc.chains.clone()).collect();
        let second = superchains(&flattened, 1000, 0.75);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.score, b.score);
            assert_eq!(a.query_begin, b.query_begin);
            assert_eq!(a.query_end, b.query_end);
            assert_eq!(a.ref_begin, b.ref_begin);
            assert_eq!(a.ref_end, b.ref_end);
        }
    }
}
