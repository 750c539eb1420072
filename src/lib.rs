pub mod align;
pub mod anchor;
pub mod chain;
pub mod dna;
pub mod error;
pub mod fastx; // FASTA/FASTQ batch input (query reads)
pub mod gfa; // GFA v1 input adapter for index building
pub mod graph;
pub mod index; // index build / mmap load / k-mer lookup
pub mod kmer;
pub mod map_opt;
pub mod mapper; // worker pool and per-read pipeline
pub mod seqpos;
pub mod superchain;
