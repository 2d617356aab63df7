// Shared helpers for the end-to-end alignment tests.

use hashalign::aligner::{AlignerConfig, SeedBudget, SingleAligner};
use hashalign::genome::Genome;
use hashalign::index::KmerHashIndex;
use hashalign::read::Read;
use hashalign::result::AlignmentResultSet;

pub const TEST_PADDING: u64 = 64;
pub const TEST_SEED_LEN: usize = 8;

/// Build a padded genome from (name, bases, is_alt) contigs.
pub fn genome_with(contigs: &[(&str, &[u8], bool)]) -> Genome {
    let mut genome = Genome::with_padding(TEST_PADDING);
    for &(name, bases, is_alt) in contigs {
        genome.add_contig(name, bases, is_alt);
    }
    genome.finish();
    genome
}

/// A small configuration that keeps the candidate pool modest for tests.
pub fn test_config() -> AlignerConfig {
    AlignerConfig {
        max_hits_to_consider: 32,
        max_k: 8,
        max_read_size: 64,
        seed_budget: SeedBudget::MaxSeeds(16),
        ..AlignerConfig::default()
    }
}

pub fn index_for(genome: &Genome) -> KmerHashIndex {
    KmerHashIndex::build(genome, TEST_SEED_LEN).unwrap()
}

/// Align one read and hand back the refilled result set.
pub fn align_one(
    genome: &Genome,
    index: &KmerHashIndex,
    config: &AlignerConfig,
    bases: &[u8],
) -> AlignmentResultSet {
    let mut aligner = SingleAligner::new(genome, index, config.clone()).unwrap();
    let mut rs = AlignmentResultSet::new();
    let read = Read::with_uniform_quality("test-read", bases, b'I');
    aligner.align_read(&read, &mut rs);
    rs
}

pub fn revcomp(bases: &[u8]) -> Vec<u8> {
    bases
        .iter()
        .rev()
        .map(|&b| match b {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            b'T' => b'A',
            other => other,
        })
        .collect()
}
