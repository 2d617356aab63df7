// Property-style checks on the engine: determinism across runs, strand
// symmetry, score bounds, secondary-result budgets, early stopping, and
// invalid-read handling.

mod common;

use common::*;
use hashalign::aligner::SingleAligner;
use hashalign::read::{Direction, Read};
use hashalign::result::{AlignmentResultSet, AlignmentStatus};

const REFERENCE: &[u8] = b"TTGACCAGATTACAGGGTTTACACGTGAGTCTGACCCAGTTTCACTGAATCGGTAAGCCT";

#[test]
fn alignment_is_deterministic_across_runs() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);
    let config = test_config();

    let mut aligner = SingleAligner::new(&genome, &index, config.clone()).unwrap();
    let read = Read::with_uniform_quality("r", &REFERENCE[12..44], b'I');

    let mut first = AlignmentResultSet::new();
    aligner.align_read(&read, &mut first);
    // Same aligner again: epoch reset must leave no state behind.
    let mut second = AlignmentResultSet::new();
    aligner.align_read(&read, &mut second);
    // And a freshly built aligner.
    let mut fresh = SingleAligner::new(&genome, &index, config).unwrap();
    let mut third = AlignmentResultSet::new();
    fresh.align_read(&read, &mut third);

    for other in [&second, &third] {
        assert_eq!(first.primary.status, other.primary.status);
        assert_eq!(first.primary.location, other.primary.location);
        assert_eq!(first.primary.direction, other.primary.direction);
        assert_eq!(first.primary.score, other.primary.score);
        assert_eq!(first.primary.mapq, other.primary.mapq);
    }
}

#[test]
fn reverse_complement_invariance() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);
    let config = test_config();

    let fragment = &REFERENCE[8..40];
    let forward = align_one(&genome, &index, &config, fragment);
    let reverse = align_one(&genome, &index, &config, &revcomp(fragment));

    assert!(forward.primary.is_mapped());
    assert!(reverse.primary.is_mapped());
    assert_eq!(forward.primary.location, reverse.primary.location);
    assert_eq!(forward.primary.direction, Direction::Forward);
    assert_eq!(reverse.primary.direction, Direction::Rc);
    assert_eq!(forward.primary.score, reverse.primary.score);
}

#[test]
fn scattered_substitutions_stay_within_max_k() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);

    // Two substitutions still leave clean seed windows in a 32bp read.
    let mut bases = REFERENCE[12..44].to_vec();
    bases[5] = if bases[5] == b'A' { b'C' } else { b'A' };
    bases[20] = if bases[20] == b'G' { b'T' } else { b'G' };
    let rs = align_one(&genome, &index, &test_config(), &bases);

    assert!(rs.primary.is_mapped());
    assert_eq!(rs.primary.location, TEST_PADDING + 12);
    assert_eq!(rs.primary.score, 2);
    assert!(rs.primary.score as u32 <= test_config().max_k);
}

#[test]
fn mapq_stays_within_bounds() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);
    let rs = align_one(&genome, &index, &test_config(), &REFERENCE[4..36]);
    assert!(rs.primary.is_mapped());
    assert!(rs.primary.mapq <= 70);
    // A unique exact match should be called confidently.
    assert!(rs.primary.mapq >= 10);
    assert_eq!(rs.primary.status, AlignmentStatus::SingleHit);
}

#[test]
fn secondary_results_respect_budgets() {
    // Three copies of the same 20bp locus, spaced beyond the merge window.
    let unit = b"TACAGGGTTTACACGTGAGT";
    let spacer1 = b"CCATGGATCCGGAAGCTTGGCATAATCGAT";
    let spacer2 = b"GGTACCTCGAGAATTCCTGCAGGAGCTCAA";
    let mut contig = Vec::new();
    contig.extend_from_slice(unit);
    contig.extend_from_slice(spacer1);
    contig.extend_from_slice(unit);
    contig.extend_from_slice(spacer2);
    contig.extend_from_slice(unit);
    let genome = genome_with(&[("chr1", &contig, false)]);
    let index = index_for(&genome);

    let mut config = test_config();
    config.max_edit_distance_for_secondary_results = 2;
    config.max_secondary_results = 2;
    config.use_affine_gap = false;
    let rs = align_one(&genome, &index, &config, unit);

    assert!(rs.primary.is_mapped());
    assert!(rs.secondary.len() <= 2);
    assert!(!rs.secondary.is_empty());
    for secondary in &rs.secondary {
        assert!(secondary.score <= rs.primary.score + 2);
        assert!(secondary.location != rs.primary.location);
    }

    // A per-contig budget of one tightens it further.
    config.max_secondary_alignments_per_contig = 1;
    let rs = align_one(&genome, &index, &config, unit);
    assert!(rs.secondary.len() <= 1);
}

#[test]
fn stop_on_first_hit_scores_nothing_else() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);
    let mut config = test_config();
    config.stop_on_first_hit = true;

    let mut aligner = SingleAligner::new(&genome, &index, config).unwrap();
    let mut rs = AlignmentResultSet::new();
    let read = Read::with_uniform_quality("r", &REFERENCE[16..48], b'I');
    aligner.align_read(&read, &mut rs);

    assert!(rs.primary.is_mapped());
    assert!(rs.primary.score as u32 <= aligner.config().max_k);
    // The first acceptable hit ends the read: one location scored, and the
    // affine-gap pass never runs.
    assert_eq!(aligner.stats().locations_scored_landau_vishkin, 1);
    assert_eq!(aligner.stats().locations_scored_affine_gap, 0);
}

#[test]
fn invalid_reads_are_counted_not_aligned() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);
    let mut aligner = SingleAligner::new(&genome, &index, test_config()).unwrap();
    let mut rs = AlignmentResultSet::new();

    // More Ns than maxK.
    let many_ns = Read::with_uniform_quality("n", b"NNNNNNNNNNNNNNNNACGTACGTACGT", b'I');
    aligner.align_read(&many_ns, &mut rs);
    assert_eq!(rs.primary.status, AlignmentStatus::NotFound);
    assert_eq!(aligner.stats().reads_ignored_because_of_too_many_ns, 1);

    // Longer than the configured buffer.
    let long = vec![b'A'; 65];
    aligner.align_read(&Read::with_uniform_quality("l", &long, b'I'), &mut rs);
    assert_eq!(rs.primary.status, AlignmentStatus::NotFound);
    assert_eq!(aligner.stats().reads_ignored_because_too_long, 1);

    // Shorter than one seed.
    aligner.align_read(&Read::with_uniform_quality("s", b"ACGT", b'I'), &mut rs);
    assert_eq!(rs.primary.status, AlignmentStatus::NotFound);
    assert_eq!(aligner.stats().reads_ignored_because_too_short, 1);
}

#[test]
fn construction_rejects_broken_configurations() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);

    let mut config = test_config();
    config.max_read_size = 4; // shorter than the seed
    assert!(SingleAligner::new(&genome, &index, config).is_err());

    let mut config = test_config();
    config.max_edit_distance_for_secondary_results = 1;
    config.max_secondary_results = 0;
    assert!(SingleAligner::new(&genome, &index, config).is_err());
}

#[test]
fn memory_footprint_matches_between_queries() {
    let genome = genome_with(&[("chr1", REFERENCE, false)]);
    let index = index_for(&genome);
    let mut aligner = SingleAligner::new(&genome, &index, test_config()).unwrap();
    let before = aligner.memory_footprint();
    let mut rs = AlignmentResultSet::new();
    for start in 0..8 {
        let read = Read::with_uniform_quality("r", &REFERENCE[start..start + 24], b'I');
        aligner.align_read(&read, &mut rs);
    }
    assert_eq!(aligner.memory_footprint(), before);
}
