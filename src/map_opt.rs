// Mapping options
//
// One flat options struct shared by the chaining, superchaining, and
// alignment stages, with the command-line defaults baked into Default.

/// Tunables for the map pipeline.
#[derive(Debug, Clone)]
pub struct MapOpt {
    /// Maximum diagonal gap between chained anchors.
    pub max_gap: u64,
    /// Maximum implied mismatch rate when chaining.
    pub max_mismatch_rate: f64,
    /// Minimum anchors per chain.
    pub chain_min_n_anchors: usize,
    /// Maximum fraction of a chain's query interval that may already be
    /// covered by better chains.
    pub chain_overlap_max: f64,
    /// Align this many best superchains.
    pub align_best_n: usize,

    // base-level alignment scoring
    pub match_score: i32,
    pub mismatch_penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,

    // record emission
    pub write_chains: bool,
    pub write_superchains: bool,
    pub dont_align: bool,

    pub n_threads: usize,
}

impl Default for MapOpt {
    fn default() -> Self {
        MapOpt {
            max_gap: 1000,
            max_mismatch_rate: 0.2,
            chain_min_n_anchors: 3,
            chain_overlap_max: 0.75,
            align_best_n: 1,
            match_score: 1,
            mismatch_penalty: 4,
            gap_open: 6,
            gap_extend: 1,
            write_chains: false,
            write_superchains: false,
            dont_align: false,
            n_threads: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opt = MapOpt::default();
        assert_eq!(opt.max_gap, 1000);
        assert_eq!(opt.max_mismatch_rate, 0.2);
        assert_eq!(opt.chain_min_n_anchors, 3);
        assert_eq!(opt.chain_overlap_max, 0.75);
        assert_eq!(opt.align_best_n, 1);
        assert_eq!(opt.match_score, 1);
        assert_eq!(opt.mismatch_penalty, 4);
        assert_eq!(opt.gap_open, 6);
        assert_eq!(opt.gap_extend, 1);
        assert!(!opt.dont_align);
    }
}
