// Running record of the best alignment seen and the probability mass of
// everything scored so far. The aligner keeps two: one over all alignments
// and one restricted to non-ALT contigs.

use crate::aligner::candidates::UNSCORED;
use crate::genome::GenomeLocation;
use crate::read::Direction;
use crate::result::{AlignmentStatus, SingleAlignmentResult};

/// A freshly scored candidate, in whichever score space produced it.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate {
    pub location: GenomeLocation,
    pub orig_location: GenomeLocation,
    pub direction: Direction,
    pub score: u16,
    pub ag_score: i32,
    pub match_probability: f64,
    pub bases_clipped_before: usize,
    pub bases_clipped_after: usize,
    pub seed_offset: u16,
    pub used_affine_gap_scoring: bool,
}

#[derive(Debug, Clone)]
pub struct ScoreSet {
    pub best_score: u16,
    pub best_ag_score: i32,
    pub best_score_genome_location: GenomeLocation,
    pub best_score_orig_genome_location: GenomeLocation,
    pub best_score_direction: Direction,
    pub best_score_used_affine_gap: bool,
    pub best_score_bases_clipped_before: usize,
    pub best_score_bases_clipped_after: usize,
    pub best_score_seed_offset: u16,
    pub best_score_match_probability: f64,

    pub probability_of_all_candidates: f64,
    pub probability_of_best_candidate: f64,
}

impl ScoreSet {
    pub fn new() -> ScoreSet {
        ScoreSet {
            best_score: UNSCORED,
            best_ag_score: i32::MIN,
            best_score_genome_location: 0,
            best_score_orig_genome_location: 0,
            best_score_direction: Direction::Forward,
            best_score_used_affine_gap: false,
            best_score_bases_clipped_before: 0,
            best_score_bases_clipped_after: 0,
            best_score_seed_offset: 0,
            best_score_match_probability: 0.0,
            probability_of_all_candidates: 0.0,
            probability_of_best_candidate: 0.0,
        }
    }

    pub fn init(&mut self) {
        *self = ScoreSet::new();
    }

    #[inline]
    pub fn has_best(&self) -> bool {
        self.best_score != UNSCORED
    }

    /// Add a candidate's probability to the running total.
    #[inline]
    pub fn add_probability(&mut self, probability: f64) {
        self.probability_of_all_candidates += probability;
    }

    /// Withdraw the contribution of a nearby candidate being replaced.
    /// Floating subtraction can drive the sum below zero; clamp rather than
    /// propagate the negative.
    #[inline]
    pub fn remove_probability_of_nearby_match(&mut self, probability: f64) {
        self.probability_of_all_candidates =
            (self.probability_of_all_candidates - probability).max(0.0);
    }

    /// Adopt `candidate` as the new best if it wins the tie-break chain:
    /// higher match probability, then lower edit distance, then higher
    /// affine-gap score.
    pub fn try_update_best(&mut self, candidate: &ScoredCandidate) -> bool {
        let better = candidate.match_probability > self.best_score_match_probability
            || (candidate.match_probability == self.best_score_match_probability
                && (candidate.score < self.best_score
                    || (candidate.score == self.best_score
                        && candidate.ag_score > self.best_ag_score)));
        if !better {
            return false;
        }
        self.best_score = candidate.score;
        self.best_ag_score = candidate.ag_score;
        self.best_score_genome_location = candidate.location;
        self.best_score_orig_genome_location = candidate.orig_location;
        self.best_score_direction = candidate.direction;
        self.best_score_used_affine_gap = candidate.used_affine_gap_scoring;
        self.best_score_bases_clipped_before = candidate.bases_clipped_before;
        self.best_score_bases_clipped_after = candidate.bases_clipped_after;
        self.best_score_seed_offset = candidate.seed_offset;
        self.best_score_match_probability = candidate.match_probability;
        self.probability_of_best_candidate = candidate.match_probability;
        true
    }

    /// Affine-gap-space comparator used by the rescoring pass: higher
    /// affine-gap score wins, ties broken by match probability.
    pub fn try_update_best_affine(&mut self, candidate: &ScoredCandidate) -> bool {
        let better = !self.has_best()
            || candidate.ag_score > self.best_ag_score
            || (candidate.ag_score == self.best_ag_score
                && candidate.match_probability > self.best_score_match_probability);
        if !better {
            return false;
        }
        self.best_score = candidate.score;
        self.best_ag_score = candidate.ag_score;
        self.best_score_genome_location = candidate.location;
        self.best_score_orig_genome_location = candidate.orig_location;
        self.best_score_direction = candidate.direction;
        self.best_score_used_affine_gap = candidate.used_affine_gap_scoring;
        self.best_score_bases_clipped_before = candidate.bases_clipped_before;
        self.best_score_bases_clipped_after = candidate.bases_clipped_after;
        self.best_score_seed_offset = candidate.seed_offset;
        self.best_score_match_probability = candidate.match_probability;
        self.probability_of_best_candidate = candidate.match_probability;
        true
    }

    /// Materialize this set's best as a result. The caller supplies MAPQ
    /// (computed against the all-candidates mass) and the status rule.
    pub fn fill_result(&self, mapq: u8, popular_seeds_skipped: u32) -> SingleAlignmentResult {
        SingleAlignmentResult {
            status: AlignmentStatus::NotFound,
            location: self.best_score_genome_location,
            orig_location: self.best_score_orig_genome_location,
            direction: self.best_score_direction,
            mapq,
            score: self.best_score,
            ag_score: self.best_ag_score,
            match_probability: self.best_score_match_probability,
            bases_clipped_before: self.best_score_bases_clipped_before,
            bases_clipped_after: self.best_score_bases_clipped_after,
            used_affine_gap_scoring: self.best_score_used_affine_gap,
            seed_offset: self.best_score_seed_offset,
            popular_seeds_skipped,
        }
    }
}

impl Default for ScoreSet {
    fn default() -> ScoreSet {
        ScoreSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: u16, prob: f64) -> ScoredCandidate {
        ScoredCandidate {
            location: 100,
            orig_location: 100,
            direction: Direction::Forward,
            score,
            ag_score: 0,
            match_probability: prob,
            bases_clipped_before: 0,
            bases_clipped_after: 0,
            seed_offset: 0,
            used_affine_gap_scoring: false,
        }
    }

    #[test]
    fn first_candidate_becomes_best() {
        let mut set = ScoreSet::new();
        assert!(set.try_update_best(&candidate(2, 0.5)));
        assert!(set.has_best());
        assert_eq!(set.best_score, 2);
        assert_eq!(set.probability_of_best_candidate, 0.5);
    }

    #[test]
    fn higher_probability_wins() {
        let mut set = ScoreSet::new();
        set.try_update_best(&candidate(2, 0.5));
        assert!(set.try_update_best(&candidate(3, 0.6)));
        assert_eq!(set.best_score, 3);
    }

    #[test]
    fn probability_tie_falls_back_to_score() {
        let mut set = ScoreSet::new();
        set.try_update_best(&candidate(2, 0.5));
        assert!(set.try_update_best(&candidate(1, 0.5)));
        assert!(!set.try_update_best(&candidate(2, 0.5)));
    }

    #[test]
    fn full_tie_falls_back_to_ag_score() {
        let mut set = ScoreSet::new();
        let mut a = candidate(2, 0.5);
        a.ag_score = 10;
        set.try_update_best(&a);
        let mut b = candidate(2, 0.5);
        b.ag_score = 15;
        assert!(set.try_update_best(&b));
        assert_eq!(set.best_ag_score, 15);
    }

    #[test]
    fn probability_sum_clamps_at_zero() {
        let mut set = ScoreSet::new();
        set.add_probability(0.25);
        set.remove_probability_of_nearby_match(0.5);
        assert_eq!(set.probability_of_all_candidates, 0.0);
    }

    #[test]
    fn affine_comparator_ranks_by_ag_score() {
        let mut set = ScoreSet::new();
        let mut a = candidate(3, 0.4);
        a.ag_score = 20;
        assert!(set.try_update_best_affine(&a));
        let mut b = candidate(2, 0.3);
        b.ag_score = 25;
        assert!(set.try_update_best_affine(&b));
        assert_eq!(set.best_score, 2);
        let mut c = candidate(1, 0.9);
        c.ag_score = 10;
        assert!(!set.try_update_best_affine(&c));
    }
}
