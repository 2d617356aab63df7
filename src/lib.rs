//! hashalign - hash-index seed-and-extend short-read DNA aligner
//!
//! The crate is organized around a per-read alignment engine
//! ([`aligner::SingleAligner`]) that consumes a pre-built k-mer hash index
//! ([`index::KmerHashIndex`]) over a padded reference ([`genome::Genome`])
//! and produces located, MAPQ-scored results ([`result::SingleAlignmentResult`]).
//! The surrounding layers (FASTA/FASTQ ingestion, SAM output, the rayon batch
//! driver) are thin; the engine itself does no heap allocation per read.

pub mod aligner;
pub mod batch;
pub mod defaults;
pub mod fasta;
pub mod genome;
pub mod index;
pub mod io;
pub mod read;
pub mod result;
pub mod scoring;
