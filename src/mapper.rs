// Read mapping pipeline
//
// One reader thread streams batches over a bounded channel; the consumer
// fans each batch out across the rayon pool and writes the resulting
// records sequentially, so output order always equals input order. The
// loaded index is shared read-only and needs no synchronization. A read
// moves through anchored -> chained -> superchained -> aligned; empty
// output at any stage drops it to a terminal UNMAPPED record, as do
// per-read errors and panics escaping the base aligner.
//
// Shutdown is cooperative: SIGINT/SIGTERM raise a flag which is checked
// between batches, so in-flight reads finish and the output stays a
// prefix of what a full run would produce.

use crate::align::{mapq_from_scores, region_record, superalign, GafRecord};
use crate::anchor::anchors_for_query;
use crate::chain::{chains, Chain};
use crate::dna::is_query_base;
use crate::error::MapError;
use crate::fastx::{FastxReader, ReadBatch};
use crate::index::GraphIndex;
use crate::map_opt::MapOpt;
use crate::superchain::superchains;
use crossbeam_channel::{bounded, Sender};
use rayon::prelude::*;
use std::io::{self, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

const READS_PER_BATCH: usize = 4096;
const BATCH_QUEUE_DEPTH: usize = 4;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Route SIGINT/SIGTERM to the cooperative shutdown flag.
pub fn install_signal_handlers() {
    let handler = on_signal as extern "C" fn(libc::c_int);
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
    }
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Map every read in `inputs`, writing records in input order.
pub fn map_reads(
    inputs: &[String],
    index: &GraphIndex,
    opt: &MapOpt,
    out: &mut dyn Write,
) -> io::Result<()> {
    install_signal_handlers();
    let start = Instant::now();
    // size batches so every worker gets a full slice of each one
    let reads_per_batch = READS_PER_BATCH * opt.n_threads.max(1);
    let (tx, rx) = bounded::<Option<(u64, ReadBatch)>>(BATCH_QUEUE_DEPTH);
    let files: Vec<String> = inputs.to_vec();
    let reader = thread::spawn(move || reader_thread(files, reads_per_batch, tx));

    let mut total_reads = 0usize;
    let mut total_bases = 0usize;
    let mut next_ordinal = 0u64;
    loop {
        let (ordinal, batch) = match rx.recv() {
            Ok(Some(message)) => message,
            Ok(None) | Err(_) => break,
        };
        // single consumer: batches arrive already serialized by ordinal
        debug_assert_eq!(ordinal, next_ordinal);
        next_ordinal = ordinal + 1;

        let batch_bp: usize = batch.seqs.iter().map(Vec::len).sum();
        total_reads += batch.len();
        total_bases += batch_bp;
        log::info!("batch {}: {} reads ({} bp)", ordinal, batch.len(), batch_bp);

        let records: Vec<Vec<GafRecord>> = batch
            .names
            .par_iter()
            .zip(batch.seqs.par_iter())
            .map(|(name, seq)| {
                catch_unwind(AssertUnwindSafe(|| map_one_read(index, name, seq, opt)))
                    .unwrap_or_else(|_| {
                        log::warn!("{}: aligner panicked, read left unmapped", name);
                        vec![GafRecord::unmapped(name, seq.len())]
                    })
            })
            .collect();

        for read_records in &records {
            for record in read_records {
                record.write_gaf(&mut *out)?;
            }
        }

        if shutdown_requested() {
            log::warn!("interrupted, draining after batch {}", ordinal);
            break;
        }
    }
    drop(rx);
    let _ = reader.join();
    out.flush()?;
    log::info!(
        "mapped {} reads ({} bp) in {:.2}s",
        total_reads,
        total_bases,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn reader_thread(files: Vec<String>, reads_per_batch: usize, tx: Sender<Option<(u64, ReadBatch)>>) {
    let mut ordinal = 0u64;
    for file in &files {
        let mut reader = match FastxReader::new(file) {
            Ok(r) => r,
            Err(e) => {
                log::error!("{}: {}", file, e);
                break;
            }
        };
        loop {
            if shutdown_requested() {
                let _ = tx.send(None);
                return;
            }
            let batch = match reader.read_batch(reads_per_batch) {
                Ok(b) => b,
                Err(e) => {
                    log::error!("{}: {}", file, e);
                    let _ = tx.send(None);
                    return;
                }
            };
            if batch.is_empty() {
                break;
            }
            let partial = batch.len() < reads_per_batch;
            if tx.send(Some((ordinal, batch))).is_err() {
                return; // consumer is gone
            }
            ordinal += 1;
            if partial {
                break;
            }
        }
    }
    let _ = tx.send(None);
}

/// Map a single read; always returns at least one record.
pub fn map_one_read(
    index: &GraphIndex,
    name: &str,
    seq: &[u8],
    opt: &MapOpt,
) -> Vec<GafRecord> {
    match try_map(index, name, seq, opt) {
        Ok(records) => records,
        Err(e) => {
            log::debug!("{}: {}", name, e);
            vec![GafRecord::unmapped(name, seq.len())]
        }
    }
}

fn try_map(
    index: &GraphIndex,
    name: &str,
    seq: &[u8],
    opt: &MapOpt,
) -> Result<Vec<GafRecord>, MapError> {
    if seq.is_empty() {
        return Err(MapError::EmptyQuery);
    }
    if let Some(&bad) = seq.iter().find(|&&b| !is_query_base(b)) {
        return Err(MapError::InvalidBase(bad));
    }
    let query = seq.to_ascii_uppercase();
    let unmapped = || vec![GafRecord::unmapped(name, query.len())];

    let anchors = anchors_for_query(index, &query);
    if anchors.is_empty() {
        return Ok(unmapped());
    }
    let query_chains: Vec<Chain> = chains(
        &anchors,
        index.k as usize,
        opt.max_gap,
        opt.max_mismatch_rate,
        opt.chain_min_n_anchors,
    );
    if query_chains.is_empty() {
        return Ok(unmapped());
    }
    let scs = superchains(&query_chains, opt.max_gap, opt.chain_overlap_max);
    if scs.is_empty() {
        return Ok(unmapped());
    }

    let mut records = Vec::new();
    if opt.write_chains {
        for (i, chain) in query_chains.iter().enumerate() {
            records.push(region_record(
                index,
                format!("{}.chain.{}", name, i),
                query.len(),
                chain.query_begin,
                chain.query_end,
                chain.ref_begin,
                chain.ref_end,
                chain.is_rev,
                chain.score,
            ));
        }
    }
    if opt.write_superchains || opt.dont_align {
        for (i, sc) in scs.iter().enumerate() {
            records.push(region_record(
                index,
                format!("{}.superchain.{}", name, i),
                query.len(),
                sc.query_begin,
                sc.query_end,
                sc.ref_begin,
                sc.ref_end,
                sc.is_rev,
                sc.score,
            ));
        }
    }

    if !opt.dont_align {
        let best_n = scs.len().min(opt.align_best_n.max(1));
        let mut aligned = Vec::with_capacity(best_n);
        for (i, sc) in scs[..best_n].iter().enumerate() {
            let runner_up = scs
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| other.score)
                .max()
                .unwrap_or(0);
            let mut record = superalign(index, name, &query, sc, opt);
            if !record.is_unmapped() {
                record.mapq = mapq_from_scores(sc.score, runner_up);
                aligned.push(record);
            }
        }
        if aligned.is_empty() {
            records.extend(unmapped());
        } else {
            records.extend(aligned);
        }
    }
    Ok(records)
}

/// Map one ad-hoc sequence (the -s command line path).
pub fn map_sequence(
    index: &GraphIndex,
    name: &str,
    seq: &str,
    opt: &MapOpt,
    out: &mut dyn Write,
) -> io::Result<()> {
    for record in map_one_read(index, name, seq.as_bytes(), opt) {
        record.write_gaf(&mut *out)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VariationGraph;
    use crate::index::build;
    use crate::seqpos::Handle;
    use std::path::PathBuf;

    fn indexed(name: &str, g: &VariationGraph, k: usize) -> GraphIndex {
        let dir = PathBuf::from("target/test_mapper");
        std::fs::create_dir_all(&dir).unwrap();
        let prefix = dir.join(name);
        build(g, k, 8, 8, &prefix).unwrap();
        GraphIndex::load(&prefix).unwrap()
    }

    fn linear_graph() -> VariationGraph {
        let mut g = VariationGraph::new();
        let a = g.add_node(b"ACGTACGTGG".to_vec());
        let b = g.add_node(b"TTACCGGAAC".to_vec());
        g.add_edge(Handle::pack(a, false), Handle::pack(b, false));
        g
    }

    #[test]
    fn empty_query_is_unmapped() {
        let idx = indexed("empty", &linear_graph(), 5);
        let records = map_one_read(&idx, "r", b"", &MapOpt::default());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_unmapped());
    }

    #[test]
    fn invalid_base_is_unmapped() {
        let idx = indexed("invalid", &linear_graph(), 5);
        let records = map_one_read(&idx, "r", b"ACGT@CGT", &MapOpt::default());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_unmapped());
    }

    #[test]
    fn foreign_sequence_is_unmapped() {
        let idx = indexed("foreign", &linear_graph(), 5);
        // no 5-mer of this query occurs in the graph
        let records = map_one_read(&idx, "r", b"TGTGTGTGTGTGTGTG", &MapOpt::default());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_unmapped());
        assert_eq!(records[0].mapq, 0);
    }

    #[test]
    fn exact_read_maps() {
        let idx = indexed("exact", &linear_graph(), 5);
        let mut opt = MapOpt::default();
        opt.chain_min_n_anchors = 2;
        let records = map_one_read(&idx, "r", b"ACGTACGTGGTTACCGGAAC", &opt);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert!(!rec.is_unmapped());
        assert_eq!(rec.strand, '+');
        assert_eq!(rec.query_start, 0);
        assert_eq!(rec.query_end, 20);
        assert_eq!(rec.residue_matches, 20);
        assert_eq!(rec.path_string(), ">1>2");
        assert_eq!(rec.mapq, 60);
        assert_eq!(rec.cigar.as_deref(), Some("20="));
    }

    #[test]
    fn dont_align_emits_superchain_records() {
        let idx = indexed("dont_align", &linear_graph(), 5);
        let mut opt = MapOpt::default();
        opt.chain_min_n_anchors = 2;
        opt.dont_align = true;
        let records = map_one_read(&idx, "r", b"ACGTACGTGGTTACCGGAAC", &opt);
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| r.name.contains(".superchain.")));
        assert!(records.iter().all(|r| r.cigar.is_none()));
    }
}
