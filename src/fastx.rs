// Read input
//
// FASTA/FASTQ batch reader on top of bio's parsers, with gzip detected by
// extension. Batches keep names and sequences in parallel vectors so the
// worker pool can fan out over them without reshuffling.

use bio::io::{fasta, fastq};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};

/// Batch of reads.
pub struct ReadBatch {
    pub names: Vec<String>,
    pub seqs: Vec<Vec<u8>>,
}

impl ReadBatch {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            seqs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ReadBatch {
    fn default() -> Self {
        Self::new()
    }
}

enum Records {
    Fasta(fasta::Records<BufReader<Box<dyn Read + Send>>>),
    Fastq(fastq::Records<BufReader<Box<dyn Read + Send>>>),
}

/// FASTA/FASTQ reader with automatic gzip detection.
pub struct FastxReader {
    records: Records,
}

impl FastxReader {
    /// Open a read file; `.fq`/`.fastq` (optionally `.gz`) parse as
    /// FASTQ, everything else as FASTA.
    pub fn new(path: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        let stem = path.strip_suffix(".gz").unwrap_or(path);
        let reader: Box<dyn Read + Send> = if path.ends_with(".gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let records = if stem.ends_with(".fq") || stem.ends_with(".fastq") {
            Records::Fastq(fastq::Reader::new(reader).records())
        } else {
            Records::Fasta(fasta::Reader::new(reader).records())
        };
        Ok(Self { records })
    }

    /// Read up to `batch_size` reads; an empty batch means EOF.
    pub fn read_batch(&mut self, batch_size: usize) -> io::Result<ReadBatch> {
        let mut batch = ReadBatch::new();
        for _ in 0..batch_size {
            match &mut self.records {
                Records::Fasta(records) => match records.next() {
                    Some(Ok(record)) => {
                        batch.names.push(record.id().to_string());
                        batch.seqs.push(record.seq().to_vec());
                    }
                    Some(Err(e)) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                    None => break,
                },
                Records::Fastq(records) => match records.next() {
                    Some(Ok(record)) => {
                        batch.names.push(record.id().to_string());
                        batch.seqs.push(record.seq().to_vec());
                    }
                    Some(Err(e)) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                    None => break,
                },
            }
        }
        Ok(batch)
    }
}
