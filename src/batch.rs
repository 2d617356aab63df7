// Outer batch driver: one aligner per rayon worker over the shared genome
// and index. The engine is single-threaded by contract, so parallelism is
// purely data parallelism across reads; results come back in input order.

use crate::aligner::stats::AlignerStats;
use crate::aligner::{AlignerConfig, SingleAligner};
use crate::genome::Genome;
use crate::index::SeedIndex;
use crate::read::Read;
use crate::result::{AlignmentResultSet, SingleAlignmentResult};
use rayon::prelude::*;

/// Minimum reads handed to one worker; smaller chunks are not worth the
/// per-chunk aligner construction.
const MIN_CHUNK: usize = 16;

#[derive(Debug)]
pub struct AlignedRead {
    pub read: Read,
    pub primary: SingleAlignmentResult,
    pub first_alt: Option<SingleAlignmentResult>,
    pub secondary: Vec<SingleAlignmentResult>,
    pub had_room_for_all: bool,
}

/// Align a batch of reads in parallel. Construction is validated once up
/// front so per-worker construction cannot fail afterwards.
pub fn align_batch(
    genome: &Genome,
    index: &dyn SeedIndex,
    config: &AlignerConfig,
    reads: Vec<Read>,
) -> Result<(Vec<AlignedRead>, AlignerStats), String> {
    // Surface configuration errors before any worker spawns.
    SingleAligner::new(genome, index, config.clone())?;

    if reads.is_empty() {
        return Ok((Vec::new(), AlignerStats::default()));
    }

    let workers = rayon::current_num_threads().max(1);
    let chunk_size = reads.len().div_ceil(workers * 4).max(MIN_CHUNK);

    let chunk_results: Vec<(Vec<AlignedRead>, AlignerStats)> = reads
        .into_par_iter()
        .chunks(chunk_size)
        .map(|chunk| {
            let mut aligner = SingleAligner::new(genome, index, config.clone())
                .expect("aligner construction validated before the parallel phase");
            let mut rs = AlignmentResultSet::new();
            let mut aligned = Vec::with_capacity(chunk.len());
            for read in chunk {
                aligner.align_read(&read, &mut rs);
                aligned.push(AlignedRead {
                    read,
                    primary: rs.primary,
                    first_alt: rs.first_alt,
                    secondary: rs.secondary.clone(),
                    had_room_for_all: rs.had_room_for_all,
                });
            }
            (aligned, aligner.stats().clone())
        })
        .collect();

    let mut results = Vec::new();
    let mut stats = AlignerStats::default();
    for (aligned, chunk_stats) in chunk_results {
        results.extend(aligned);
        stats.merge(&chunk_stats);
    }
    Ok((results, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::SeedBudget;
    use crate::index::KmerHashIndex;

    fn small_config() -> AlignerConfig {
        AlignerConfig {
            max_hits_to_consider: 16,
            max_read_size: 64,
            seed_budget: SeedBudget::MaxSeeds(8),
            ..AlignerConfig::default()
        }
    }

    #[test]
    fn batch_matches_serial_alignment() {
        let mut genome = Genome::with_padding(32);
        genome.add_contig(
            "chr1",
            b"TTGACCAGATTACAGGGTTTACACGTGAGTCTGACCCAGTTTCACTGAAT",
            false,
        );
        genome.finish();
        let index = KmerHashIndex::build(&genome, 8).unwrap();
        let config = small_config();

        let reads: Vec<Read> = (0..8)
            .map(|i| {
                let start = 32 + i * 2;
                Read::with_uniform_quality(
                    format!("r{}", i),
                    &genome.data()[start..start + 20],
                    b'I',
                )
            })
            .collect();

        let (parallel, stats) =
            align_batch(&genome, &index, &config, reads.clone()).unwrap();
        assert_eq!(stats.total_reads, 8);

        let mut aligner = SingleAligner::new(&genome, &index, config).unwrap();
        let mut rs = AlignmentResultSet::new();
        for (i, read) in reads.iter().enumerate() {
            aligner.align_read(read, &mut rs);
            assert_eq!(parallel[i].primary.status, rs.primary.status);
            assert_eq!(parallel[i].primary.location, rs.primary.location);
            assert_eq!(parallel[i].primary.direction, rs.primary.direction);
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_spawning() {
        let genome = {
            let mut g = Genome::with_padding(8);
            g.add_contig("c", b"ACGTACGTACGT", false);
            g.finish();
            g
        };
        let index = KmerHashIndex::build(&genome, 8).unwrap();
        let mut config = small_config();
        config.max_read_size = 4; // shorter than the seed
        assert!(align_batch(&genome, &index, &config, Vec::new()).is_err());
    }
}
