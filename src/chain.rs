// Colinear anchor chaining
//
// Chaining runs on the (query offset, strand offset) plane, separately
// per strand. A predecessor is chainable when it precedes the anchor in
// both coordinates, the diagonal gap stays within max_gap, and the gap
// implies a mismatch rate no worse than max_mismatch_rate. Scores count
// matched bases and pay the gap linearly. Chains are peeled off the DP
// table highest peak first; anchors already claimed by a chain are not
// reused.

use crate::anchor::Anchor;
use crate::seqpos::SeqPos;

#[derive(Debug, Clone)]
pub struct Chain {
    pub score: i64,
    pub anchors: Vec<Anchor>,
    pub query_begin: usize,
    /// Inclusive, like the anchors it spans.
    pub query_end: usize,
    pub ref_begin: SeqPos,
    pub ref_end: SeqPos,
    pub is_rev: bool,
}

impl Chain {
    pub fn query_span(&self) -> usize {
        self.query_end - self.query_begin + 1
    }
}

// keep pathological repeat regions from flooding downstream stages
const MAX_CHAINS: usize = 100;

/// Group anchors into colinear chains.
///
/// The anchor list is re-sorted internally, so input order does not
/// affect the result.
pub fn chains(
    anchors: &[Anchor],
    k: usize,
    max_gap: u64,
    max_mismatch_rate: f64,
    chain_min_n_anchors: usize,
) -> Vec<Chain> {
    if anchors.is_empty() {
        return Vec::new();
    }
    let mut anchors: Vec<Anchor> = anchors.to_vec();
    anchors.sort_by_key(|a| (a.ref_begin, a.query_begin));

    let n = anchors.len();
    let mut dp = vec![k as i64; n];
    let mut best_gap = vec![0u64; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        for j in 0..i {
            let (a, b) = (&anchors[j], &anchors[i]);
            if a.is_rev() != b.is_rev() {
                continue;
            }
            if b.ref_begin <= a.ref_begin || b.query_begin <= a.query_begin {
                continue;
            }
            let dq = (b.query_begin - a.query_begin) as u64;
            let dr = b.ref_begin.offset() - a.ref_begin.offset();
            let gap = dq.abs_diff(dr);
            if gap > max_gap {
                continue;
            }
            // the gap is the cheapest explanation in mismatches
            let span = dq.max(dr);
            if gap as f64 / span as f64 > max_mismatch_rate {
                continue;
            }
            let gain = dq.min(dr).min(k as u64) as i64;
            let score = dp[j] + gain - gap as i64;
            let better = score > dp[i]
                || (score == dp[i]
                    && prev[i].is_some()
                    && (gap < best_gap[i]
                        || (gap == best_gap[i]
                            && a.ref_begin < anchors[prev[i].unwrap()].ref_begin)));
            if better {
                dp[i] = score;
                best_gap[i] = gap;
                prev[i] = Some(j);
            }
        }
    }

    // peel chains off the DP table, best peak first
    let mut used = vec![false; n];
    let mut out = Vec::new();
    loop {
        let mut best: Option<usize> = None;
        for i in 0..n {
            if !used[i] && best.map_or(true, |b| dp[i] > dp[b]) {
                best = Some(i);
            }
        }
        let Some(peak) = best else { break };
        if dp[peak] <= 0 {
            break;
        }

        let mut members = Vec::new();
        let mut cursor = Some(peak);
        let mut truncated = false;
        while let Some(i) = cursor {
            if used[i] {
                // tail already claimed by a previous chain
                truncated = true;
                break;
            }
            used[i] = true;
            members.push(i);
            cursor = prev[i];
        }
        members.reverse();

        if members.len() < chain_min_n_anchors {
            continue;
        }
        let first = &anchors[members[0]];
        let last = &anchors[*members.last().unwrap()];
        let score = if truncated {
            // score the surviving prefix only
            members.len() as i64 * k as i64
        } else {
            dp[peak]
        };
        out.push(Chain {
            score,
            anchors: members.iter().map(|&i| anchors[i]).collect(),
            query_begin: first.query_begin,
            query_end: last.query_end,
            ref_begin: first.ref_begin,
            ref_end: last.ref_end,
            is_rev: first.is_rev(),
        });
        if out.len() >= MAX_CHAINS {
            log::debug!("stopping chain extraction at {} chains", MAX_CHAINS);
            break;
        }
    }

    log::debug!("{} anchors -> {} chains", n, out.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(q: usize, r: u64, k: usize, rev: bool) -> Anchor {
        Anchor {
            query_begin: q,
            query_end: q + k - 1,
            ref_begin: SeqPos::encode(r, rev),
            ref_end: SeqPos::encode(r + k as u64 - 1, rev),
        }
    }

    #[test]
    fn colinear_anchors_form_one_chain() {
        let anchors: Vec<Anchor> = (0..5).map(|i| anchor(i, 10 + i as u64, 4, false)).collect();
        let chains = chains(&anchors, 4, 1000, 0.2, 3);
        assert_eq!(chains.len(), 1);
        let c = &chains[0];
        assert_eq!(c.anchors.len(), 5);
        assert_eq!(c.query_begin, 0);
        assert_eq!(c.query_end, 7);
        assert_eq!(c.ref_begin.offset(), 10);
        assert_eq!(c.ref_end.offset(), 17);
        // 5 anchors, each step gains one matched base
        assert_eq!(c.score, 8);
    }

    #[test]
    fn strands_never_mix() {
        let mut anchors: Vec<Anchor> = (0..3).map(|i| anchor(i, 10 + i as u64, 4, false)).collect();
        anchors.extend((0..3).map(|i| anchor(i, 10 + i as u64, 4, true)));
        let chains = chains(&anchors, 4, 1000, 0.2, 3);
        assert_eq!(chains.len(), 2);
        assert_ne!(chains[0].is_rev, chains[1].is_rev);
    }

    #[test]
    fn large_gaps_break_chains() {
        let mut anchors: Vec<Anchor> = (0..3).map(|i| anchor(i, 10 + i as u64, 4, false)).collect();
        // same diagonal offset far downstream, but query barely moves
        anchors.extend((0..3).map(|i| anchor(10 + i, 5000 + i as u64, 4, false)));
        let got = chains(&anchors, 4, 100, 0.2, 3);
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn short_chains_are_discarded() {
        let anchors: Vec<Anchor> = (0..2).map(|i| anchor(i, 10 + i as u64, 4, false)).collect();
        assert!(chains(&anchors, 4, 1000, 0.2, 3).is_empty());
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut anchors: Vec<Anchor> = (0..6).map(|i| anchor(i, 10 + i as u64, 4, false)).collect();
        let forward = chains(&anchors, 4, 1000, 0.2, 3);
        anchors.reverse();
        anchors.swap(0, 3);
        let shuffled = chains(&anchors, 4, 1000, 0.2, 3);
        assert_eq!(forward.len(), shuffled.len());
        for (a, b) in forward.iter().zip(&shuffled) {
            assert_eq!(a.score, b.score);
            assert_eq!(a.anchors, b.anchors);
        }
    }

    #[test]
    fn mismatch_rate_gate() {
        // one anchor pair with a gap of 3 over a span of 10
        let a = anchor(0, 10, 4, false);
        let b = anchor(10, 23, 4, false);
        let strict = chains(&[a, b], 4, 1000, 0.2, 2);
        assert!(strict.iter().all(|c| c.anchors.len() == 1) || strict.is_empty());
        let loose = chains(&[a, b], 4, 1000, 0.5, 2);
        assert!(loose.iter().any(|c| c.anchors.len() == 2));
    }
}
