//! The per-read seed-and-extend engine.
//!
//! [`SingleAligner`] owns every buffer it needs (candidate table, element
//! pool, scorer scratch, reverse-complement views), all sized at
//! construction, and aligns one read at a time with no heap allocation on
//! the happy path. Discovery pulls seed hits out of the index under a
//! popularity cap; scoring drains candidate groups in seed-vote order under
//! a monotonically tightening score limit; finalization reconciles the
//! ALT-aware score sets into a primary result with a calibrated MAPQ.
//!
//! One instance is strictly single-threaded; callers wanting parallelism
//! build one aligner per worker over the same shared genome and index.

pub mod adjuster;
pub mod candidates;
pub mod score_set;
pub mod stats;

use crate::aligner::adjuster::AlignmentAdjuster;
use crate::aligner::candidates::{
    CandidateTable, SeedUsedBitmap, MAX_MERGE_DIST, UNSCORED,
};
use crate::aligner::score_set::{ScoreSet, ScoredCandidate};
use crate::aligner::stats::AlignerStats;
use crate::defaults::*;
use crate::genome::{Genome, GenomeLocation};
use crate::index::SeedIndex;
use crate::read::{
    reverse_complement_into, reverse_into, Direction, Read, NUM_DIRECTIONS, RC_TRANSLATION_TABLE,
};
use crate::result::{AlignmentResultSet, AlignmentStatus, SingleAlignmentResult};
use crate::scoring::affine_gap::{AffineGapParams, AffineGapScorer};
use crate::scoring::landau_vishkin::LandauVishkin;
use crate::scoring::probability::{mapq_from_probabilities, phred_tables};

/// Seed budget: an absolute cap, or a multiple of `readLen / seedLen`.
#[derive(Debug, Clone, Copy)]
pub enum SeedBudget {
    MaxSeeds(usize),
    Coverage(f64),
}

/// Coarse switches that turn pruning heuristics off, for testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOptimizations {
    /// Keep scoring even long after the best stopped improving.
    pub no_score_truncation: bool,
    /// Never stop on probability dominance.
    pub no_confidence_stop: bool,
    /// Never stop discovery on the unseen-location lower bound.
    pub no_unseen_pruning: bool,
}

#[derive(Debug, Clone)]
pub struct AlignerConfig {
    pub max_hits_to_consider: usize,
    pub max_k: u32,
    pub max_read_size: usize,
    pub seed_budget: SeedBudget,
    pub min_weight_to_check: u32,
    pub extra_search_depth: u32,
    pub disabled_optimizations: DisabledOptimizations,
    pub use_affine_gap: bool,
    pub ignore_alignment_adjustments_for_om: bool,
    pub alt_awareness: bool,
    pub emit_alt_alignments: bool,
    /// Scorer-specific units: edit distance under Landau-Vishkin, affine-gap
    /// score otherwise.
    pub max_score_gap_to_prefer_non_alt_alignment: i32,
    /// Negative means unlimited.
    pub max_secondary_alignments_per_contig: i32,
    pub max_secondary_results: usize,
    /// Negative disables secondary reporting entirely.
    pub max_edit_distance_for_secondary_results: i32,
    pub explore_popular_seeds: bool,
    pub stop_on_first_hit: bool,
    pub do_aligner_prefetch: bool,
    pub affine_gap: AffineGapParams,
}

impl Default for AlignerConfig {
    fn default() -> AlignerConfig {
        AlignerConfig {
            max_hits_to_consider: MAX_HITS_TO_CONSIDER,
            max_k: MAX_K,
            max_read_size: MAX_READ_SIZE,
            seed_budget: SeedBudget::Coverage(SEED_COVERAGE),
            min_weight_to_check: MIN_WEIGHT_TO_CHECK,
            extra_search_depth: EXTRA_SEARCH_DEPTH,
            disabled_optimizations: DisabledOptimizations::default(),
            use_affine_gap: true,
            ignore_alignment_adjustments_for_om: false,
            alt_awareness: true,
            emit_alt_alignments: false,
            max_score_gap_to_prefer_non_alt_alignment: MAX_SCORE_GAP_TO_PREFER_NON_ALT,
            max_secondary_alignments_per_contig: -1,
            max_secondary_results: MAX_SECONDARY_RESULTS,
            max_edit_distance_for_secondary_results: -1,
            explore_popular_seeds: false,
            stop_on_first_hit: false,
            do_aligner_prefetch: false,
            affine_gap: AffineGapParams::default(),
        }
    }
}

impl AlignerConfig {
    /// Secondary-buffer slots reserved in the result set (the reported list
    /// is trimmed to `max_secondary_results` at finalize).
    pub fn secondary_buffer_size(&self) -> usize {
        if self.max_edit_distance_for_secondary_results < 0 {
            0
        } else {
            (self.max_secondary_results * 4).max(64)
        }
    }

    pub fn affine_gap_buffer_size(&self) -> usize {
        if self.use_affine_gap {
            128
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HitsPerContigCount {
    epoch: u64,
    hits: i32,
}

pub struct SingleAligner<'a> {
    genome: &'a Genome,
    index: &'a dyn SeedIndex,
    config: AlignerConfig,
    seed_len: usize,
    max_seeds_cap: usize,

    lv: LandauVishkin,
    ag: AffineGapScorer,
    max_ag_slack: usize,

    table: CandidateTable,
    seed_used: SeedUsedBitmap,
    rc_read: Vec<u8>,
    rc_quals: Vec<u8>,
    reversed_read: [Vec<u8>; NUM_DIRECTIONS],
    reversed_quals: [Vec<u8>; NUM_DIRECTIONS],
    ref_scratch: Vec<u8>,
    hits_per_contig: Vec<HitsPerContigCount>,

    stats: AlignerStats,

    // Per-read state, reset by begin_read_state.
    scores_all: ScoreSet,
    scores_non_alt: ScoreSet,
    read_len: usize,
    popular_seeds_skipped: u32,
    n_seeds_applied: [u32; NUM_DIRECTIONS],
    most_seeds_containing_any_particular_base: [u32; NUM_DIRECTIONS],
    lowest_possible_score_of_any_unseen_location: [u32; NUM_DIRECTIONS],
    lv_scores_after_best_found: u32,
    weight_of_best_element: u32,
    total_seeds_applied: u32,
    next_seed_to_test: usize,
    wrap_count: u32,
    seed_selection_exhausted: bool,
}

impl<'a> SingleAligner<'a> {
    pub fn new(
        genome: &'a Genome,
        index: &'a dyn SeedIndex,
        config: AlignerConfig,
    ) -> Result<SingleAligner<'a>, String> {
        let seed_len = index.seed_length();
        if seed_len == 0 {
            return Err("index reports a zero seed length".to_string());
        }
        if config.max_read_size < seed_len {
            return Err(format!(
                "max read size {} is shorter than the seed length {}",
                config.max_read_size, seed_len
            ));
        }
        if config.max_hits_to_consider == 0 {
            return Err("max hits to consider must be positive".to_string());
        }
        if config.max_edit_distance_for_secondary_results >= 0
            && config.max_secondary_results == 0
        {
            return Err(
                "secondary results requested with a zero-sized secondary buffer".to_string()
            );
        }

        let max_possible_seeds = config.max_read_size - seed_len + 1;
        let max_seeds_cap = match config.seed_budget {
            SeedBudget::MaxSeeds(n) => n.max(1),
            SeedBudget::Coverage(c) => {
                ((config.max_read_size as f64 * c / seed_len as f64).ceil() as usize).max(1)
            }
        }
        .min(max_possible_seeds);

        let max_ag_slack = (config.max_k + config.extra_search_depth + 1) as usize;
        let max_read = config.max_read_size;

        Ok(SingleAligner {
            genome,
            index,
            seed_len,
            max_seeds_cap,
            lv: LandauVishkin::new(config.max_k as usize),
            ag: AffineGapScorer::new(config.affine_gap, max_read, max_ag_slack),
            max_ag_slack,
            table: CandidateTable::new(config.max_hits_to_consider, max_seeds_cap),
            seed_used: SeedUsedBitmap::new(max_read),
            rc_read: Vec::with_capacity(max_read),
            rc_quals: Vec::with_capacity(max_read),
            reversed_read: [Vec::with_capacity(max_read), Vec::with_capacity(max_read)],
            reversed_quals: [Vec::with_capacity(max_read), Vec::with_capacity(max_read)],
            ref_scratch: Vec::with_capacity(max_read + 2 * max_ag_slack),
            hits_per_contig: if config.max_secondary_alignments_per_contig > 0 {
                vec![HitsPerContigCount { epoch: 0, hits: 0 }; genome.contigs().len()]
            } else {
                Vec::new()
            },
            stats: AlignerStats::default(),
            scores_all: ScoreSet::new(),
            scores_non_alt: ScoreSet::new(),
            read_len: 0,
            popular_seeds_skipped: 0,
            n_seeds_applied: [0; NUM_DIRECTIONS],
            most_seeds_containing_any_particular_base: [1; NUM_DIRECTIONS],
            lowest_possible_score_of_any_unseen_location: [0; NUM_DIRECTIONS],
            lv_scores_after_best_found: 0,
            weight_of_best_element: 0,
            total_seeds_applied: 0,
            next_seed_to_test: 0,
            wrap_count: 0,
            seed_selection_exhausted: false,
            config,
        })
    }

    pub fn stats(&self) -> &AlignerStats {
        &self.stats
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Bytes of pooled storage held by this aligner. The size-only query for
    /// arena pre-sizing: what this reports is exactly what construction
    /// allocated.
    pub fn memory_footprint(&self) -> usize {
        let max_read = self.config.max_read_size;
        self.table.memory_footprint()
            + max_read / 64 * 8
            + 4 * max_read
            + self.ref_scratch.capacity()
            + self.hits_per_contig.capacity() * std::mem::size_of::<HitsPerContigCount>()
    }

    /// Align one read, refilling `rs`. `rs.had_room_for_all` reports soft
    /// buffer overflows; the primary (and listed secondaries) stay valid
    /// either way.
    pub fn align_read(&mut self, read: &Read, rs: &mut AlignmentResultSet) {
        rs.reset();
        self.ensure_result_capacity(rs);
        self.stats.total_reads += 1;

        let read_len = read.len();
        if read_len < self.seed_len {
            self.stats.reads_ignored_because_too_short += 1;
            return;
        }
        if read_len > self.config.max_read_size {
            self.stats.reads_ignored_because_too_long += 1;
            return;
        }
        if read.count_of_ns() as u32 > self.config.max_k {
            self.stats.reads_ignored_because_of_too_many_ns += 1;
            return;
        }

        self.prepare_read_buffers(read);
        self.begin_read_state(read_len);

        let n_possible_seeds = read_len - self.seed_len + 1;
        let max_seeds = self.max_seeds_cap.min(n_possible_seeds) as u32;

        // Discovery interleaved with bounded scoring rounds.
        loop {
            if self.total_seeds_applied >= max_seeds {
                break;
            }
            if !self.config.disabled_optimizations.no_unseen_pruning
                && self.total_seeds_applied >= MIN_SEEDS_APPLIED_BEFORE_PRUNING
            {
                let limit = self.score_limit(false);
                if self.lowest_possible_score_of_any_unseen_location[0] > limit
                    && self.lowest_possible_score_of_any_unseen_location[1] > limit
                {
                    break;
                }
            }
            let Some(offset) = self.next_seed_offset(read, n_possible_seeds) else {
                break;
            };
            self.apply_seed(read, offset);
            self.total_seeds_applied += 1;

            if self.first_hit_found() {
                break;
            }
            for _ in 0..SCORING_STEPS_PER_SEED {
                if self.first_hit_found()
                    || self.scoring_should_stop()
                    || !self.score_one_element(read, rs)
                {
                    break;
                }
            }
            if self.first_hit_found() {
                break;
            }
        }

        // Drain the weight lists.
        if !self.first_hit_found() {
            while !self.scoring_should_stop() {
                if !self.score_one_element(read, rs) {
                    break;
                }
                if self.first_hit_found() {
                    break;
                }
            }
        }

        self.finalize(rs);
        if self.config.use_affine_gap && !self.config.stop_on_first_hit {
            self.align_affine_gap(read, rs);
        }
        if !self.config.ignore_alignment_adjustments_for_om && rs.primary.is_mapped() {
            AlignmentAdjuster::adjust(self.genome, read_len, &mut rs.primary);
            if let Some(alt) = rs.first_alt.as_mut() {
                AlignmentAdjuster::adjust(self.genome, read_len, alt);
            }
        }
        self.finalize_secondary_results(rs);
    }

    fn ensure_result_capacity(&self, rs: &mut AlignmentResultSet) {
        let secondary = self.config.secondary_buffer_size();
        if rs.secondary.capacity() < secondary {
            rs.secondary.reserve_exact(secondary - rs.secondary.capacity());
        }
        let affine = self.config.affine_gap_buffer_size();
        if rs.candidates_for_affine_gap.capacity() < affine {
            rs.candidates_for_affine_gap
                .reserve_exact(affine - rs.candidates_for_affine_gap.capacity());
        }
    }

    fn prepare_read_buffers(&mut self, read: &Read) {
        let fwd = Direction::Forward.index();
        let rc = Direction::Rc.index();
        reverse_complement_into(read.bases(), &mut self.rc_read);
        reverse_into(read.quals(), &mut self.rc_quals);
        reverse_into(read.bases(), &mut self.reversed_read[fwd]);
        reverse_into(read.quals(), &mut self.reversed_quals[fwd]);
        // Reversing the RC strand lands back on the plain complement in
        // forward order, with the original quality order.
        self.reversed_read[rc].clear();
        self.reversed_read[rc].extend(
            read.bases()
                .iter()
                .map(|&b| RC_TRANSLATION_TABLE[b as usize]),
        );
        self.reversed_quals[rc].clear();
        self.reversed_quals[rc].extend_from_slice(read.quals());
    }

    fn begin_read_state(&mut self, read_len: usize) {
        self.table.begin_read();
        self.seed_used.clear(read_len);
        self.scores_all.init();
        self.scores_non_alt.init();
        self.read_len = read_len;
        self.popular_seeds_skipped = 0;
        self.n_seeds_applied = [0; NUM_DIRECTIONS];
        self.most_seeds_containing_any_particular_base = [1; NUM_DIRECTIONS];
        self.lowest_possible_score_of_any_unseen_location = [0; NUM_DIRECTIONS];
        self.lv_scores_after_best_found = 0;
        self.weight_of_best_element = 0;
        self.total_seeds_applied = 0;
        self.next_seed_to_test = 0;
        self.wrap_count = 0;
        self.seed_selection_exhausted = false;
    }

    #[inline]
    fn first_hit_found(&self) -> bool {
        self.config.stop_on_first_hit
            && self.scores_all.has_best()
            && (self.scores_all.best_score as u32) <= self.config.max_k
            && self.scores_all.best_score_match_probability > 0.0
    }

    /// Current score limit. With ALT awareness on, non-ALT candidates are
    /// admitted against the non-ALT best so a tight ALT hit cannot shut down
    /// exploration of the primary assembly.
    fn score_limit(&self, for_alt: bool) -> u32 {
        let set = if self.config.alt_awareness && !for_alt {
            &self.scores_non_alt
        } else {
            &self.scores_all
        };
        if !set.has_best() {
            self.config.max_k
        } else {
            (set.best_score as u32 + self.config.extra_search_depth).min(self.config.max_k)
        }
    }

    /// Seed offsets follow a wrapped spreading schedule: stride seedLen on
    /// the first pass, then passes starting at successively bisected
    /// offsets (S/2, S/4, 3S/4, S/8, ...). Offsets already used and windows
    /// containing N are skipped.
    fn next_seed_offset(&mut self, read: &Read, n_possible_seeds: usize) -> Option<usize> {
        if self.seed_selection_exhausted {
            return None;
        }
        loop {
            if self.next_seed_to_test >= n_possible_seeds {
                self.wrap_count += 1;
                match wrap_start_offset(self.wrap_count, self.seed_len) {
                    Some(offset) => {
                        self.next_seed_to_test = offset;
                        continue;
                    }
                    None => {
                        self.seed_selection_exhausted = true;
                        return None;
                    }
                }
            }
            let offset = self.next_seed_to_test;
            self.next_seed_to_test += self.seed_len;
            if self.seed_used.is_set(offset) {
                continue;
            }
            self.seed_used.set(offset);
            let window = &read.bases()[offset..offset + self.seed_len];
            if window.contains(&b'N') {
                continue;
            }
            return Some(offset);
        }
    }

    fn apply_seed(&mut self, read: &Read, offset: usize) {
        let index = self.index;
        let read_len = read.len();
        let seed_len = self.seed_len;

        // Seeds overlapping this one dilute the pigeonhole argument; the
        // unseen-location lower bound divides by the worst overlap seen.
        let overlap = self.seed_overlap_count(offset, read_len - seed_len + 1);

        // Forward strand.
        self.stats.hash_table_lookups += 1;
        if let Some(hits) = index.lookup(&read.bases()[offset..offset + seed_len]) {
            self.admit_hits(hits, Direction::Forward, offset, overlap);
        }

        // Reverse-complement strand: the seed's RC lives in the rc buffer at
        // the mirrored offset, which is also the seed offset scoring uses in
        // the RC frame.
        let rc_offset = read_len - seed_len - offset;
        let mut rc_seed = [0u8; 32];
        rc_seed[..seed_len].copy_from_slice(&self.rc_read[rc_offset..rc_offset + seed_len]);
        self.stats.hash_table_lookups += 1;
        if let Some(hits) = index.lookup(&rc_seed[..seed_len]) {
            self.admit_hits(hits, Direction::Rc, rc_offset, overlap);
        }
    }

    /// Number of applied seed offsets whose windows overlap `offset`,
    /// including itself.
    fn seed_overlap_count(&self, offset: usize, n_possible_seeds: usize) -> u32 {
        let from = offset.saturating_sub(self.seed_len - 1);
        let to = (offset + self.seed_len).min(n_possible_seeds);
        let mut count = 1u32; // this seed
        for o in from..to {
            if o != offset && self.seed_used.is_set(o) {
                count += 1;
            }
        }
        count
    }

    fn admit_hits(&mut self, hits: &[GenomeLocation], direction: Direction, frame_offset: usize, overlap: u32) {
        let dir = direction.index();
        if hits.len() > self.config.max_hits_to_consider {
            self.popular_seeds_skipped += 1;
            self.stats.hits_ignored_because_of_too_high_popularity += hits.len() as u64;
            if !self.config.explore_popular_seeds {
                return;
            }
        }

        let lowest = self.lowest_possible_score_of_any_unseen_location[dir];
        let take = hits.len().min(self.config.max_hits_to_consider);
        for &hit in &hits[..take] {
            let Some(location) = hit.checked_sub(frame_offset as u64) else {
                continue;
            };
            if location >= self.genome.len() {
                continue;
            }
            self.prefetch_genome(location);
            if self
                .table
                .note_seed_hit(location, direction, lowest, frame_offset as u16)
                .is_err()
            {
                // Pool exhaustion means the maxHits*maxSeeds sizing contract
                // was broken; the aligner state is indeterminate.
                log::error!(
                    "candidate pool exhausted ({} elements); configuration overflow, aborting",
                    self.table.elements_in_use()
                );
                std::process::exit(1);
            }
        }

        self.n_seeds_applied[dir] += 1;
        if overlap > self.most_seeds_containing_any_particular_base[dir] {
            self.most_seeds_containing_any_particular_base[dir] = overlap;
        }
        self.lowest_possible_score_of_any_unseen_location[dir] =
            self.n_seeds_applied[dir] / self.most_seeds_containing_any_particular_base[dir];
    }

    #[inline]
    #[allow(unused_variables)]
    fn prefetch_genome(&self, location: GenomeLocation) {
        if !self.config.do_aligner_prefetch {
            return;
        }
        #[cfg(target_arch = "x86_64")]
        if let Some(bases) = self.genome.substring(location, 1) {
            unsafe {
                use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
                _mm_prefetch(bases.as_ptr() as *const i8, _MM_HINT_T0);
            }
        }
    }

    fn scoring_should_stop(&self) -> bool {
        if !self.scores_all.has_best() {
            return false;
        }
        let opts = &self.config.disabled_optimizations;
        if !opts.no_score_truncation && self.lv_scores_after_best_found > LV_SCORES_AFTER_BEST_CAP
        {
            return true;
        }
        if !opts.no_confidence_stop {
            let all = self.scores_all.probability_of_all_candidates;
            if all > 0.0
                && self.scores_all.probability_of_best_candidate / all
                    >= PROB_DOMINANCE_THRESHOLD
            {
                // Only stop when nothing still queued has as much seed
                // support as the element that produced the best.
                match self
                    .table
                    .peek_highest_weight(self.config.min_weight_to_check.max(1))
                {
                    None => return true,
                    Some(w) if w < self.weight_of_best_element => return true,
                    _ => {}
                }
            }
        }
        false
    }

    /// Pop and score one element. Returns false when no element qualifies.
    fn score_one_element(&mut self, read: &Read, rs: &mut AlignmentResultSet) -> bool {
        let min_weight = self.config.min_weight_to_check.max(1);
        let Some(idx) = self.table.pop_highest(min_weight) else {
            return false;
        };

        let element_base = self.table.element(idx).base_genome_location;
        let element_is_alt = self.genome.is_alt_location(element_base);
        if self.table.element(idx).lowest_possible_score > self.score_limit(element_is_alt) {
            // Every location in this group already implies more edits than
            // the limit admits.
            return true;
        }

        loop {
            let (bit, seed_offset, direction) = {
                let element = self.table.element(idx);
                let unscored = element.unscored_candidates();
                if unscored == 0 {
                    break;
                }
                let bit = unscored.trailing_zeros();
                (
                    bit,
                    element.candidates[bit as usize].seed_offset,
                    element.direction,
                )
            };
            self.table.element_mut(idx).candidates_scored |= 1u64 << bit;

            let genome_location = element_base + bit as u64;
            let limit = self.score_limit(self.genome.is_alt_location(genome_location));
            let scored =
                self.score_location_lv(read, direction, genome_location, seed_offset as usize, limit);
            self.stats.locations_scored_landau_vishkin += 1;
            self.lv_scores_after_best_found += 1;

            if let Some((score, probability, adjusted_location)) = scored {
                self.record_scored_candidate(
                    idx,
                    bit,
                    direction,
                    genome_location,
                    adjusted_location,
                    score,
                    probability,
                    seed_offset,
                    rs,
                );
            }
            // A rejected candidate updates the all-candidates probability by
            // its (zero) mass; nothing to do.

            if self.first_hit_found() {
                break;
            }
        }
        true
    }

    /// Landau-Vishkin scoring anchored at the seed: the seed span matches by
    /// construction, the tail extends forward, and the head extends through
    /// the reversed views.
    fn score_location_lv(
        &mut self,
        read: &Read,
        direction: Direction,
        genome_location: GenomeLocation,
        seed_offset: usize,
        limit: u32,
    ) -> Option<(u16, f64, GenomeLocation)> {
        let genome = self.genome;
        let seed_len = self.seed_len;
        let read_len = self.read_len;
        let dir = direction.index();

        let (data, quals): (&[u8], &[u8]) = match direction {
            Direction::Forward => (read.bases(), read.quals()),
            Direction::Rc => (&self.rc_read, &self.rc_quals),
        };

        let seed_start = genome_location + seed_offset as u64;
        if seed_start + seed_len as u64 > genome.len() {
            return None;
        }

        let tables = phred_tables();
        let mut probability = 1.0f64;
        for &q in &quals[seed_offset..seed_offset + seed_len] {
            probability *= tables.match_factor[q as usize];
        }

        // Tail: seed end to read end, left to right.
        let tail_offset = seed_offset + seed_len;
        let text_start = seed_start + seed_len as u64;
        let text_len = (read_len - tail_offset) + limit as usize + 1;
        let text = genome.substring(text_start, text_len).unwrap_or(&[]);
        let right = self.lv.compute(
            text,
            &data[tail_offset..],
            &quals[tail_offset..],
            limit,
        )?;

        // Head: read start to seed start, scored right to left over the
        // reversed views.
        let left_limit = limit - right.edit_distance;
        let head_len = seed_offset;
        let left_text_len = (head_len + left_limit as usize + 1).min(seed_start as usize);
        let left_text_start = seed_start - left_text_len as u64;
        self.ref_scratch.clear();
        if let Some(window) = genome.substring(left_text_start, left_text_len) {
            self.ref_scratch.extend(window.iter().rev());
        }
        let scratch = &self.ref_scratch;
        let rev_data = &self.reversed_read[dir];
        let rev_quals = &self.reversed_quals[dir];
        let left = self.lv.compute(
            scratch,
            &rev_data[read_len - head_len..],
            &rev_quals[read_len - head_len..],
            left_limit,
        )?;

        let score = right.edit_distance + left.edit_distance;
        probability *= right.match_probability * left.match_probability;
        let adjusted_location =
            (genome_location as i64 - left.net_indel as i64).max(0) as GenomeLocation;
        Some((score as u16, probability, adjusted_location))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_scored_candidate(
        &mut self,
        idx: u32,
        bit: u32,
        direction: Direction,
        orig_location: GenomeLocation,
        adjusted_location: GenomeLocation,
        score: u16,
        probability: f64,
        seed_offset: u16,
        rs: &mut AlignmentResultSet,
    ) {
        let is_alt = self.config.alt_awareness && self.genome.is_alt_location(adjusted_location);

        let (had_previous, previous_probability, previous_location, element_weight) = {
            let element = self.table.element(idx);
            (
                element.best_score != UNSCORED,
                element.match_probability_for_best_score,
                element.best_score_genome_location,
                element.weight,
            )
        };

        {
            let element = self.table.element_mut(idx);
            let candidate = &mut element.candidates[bit as usize];
            candidate.score = score;
            candidate.match_probability = probability;
        }

        // Indel neighbors collapse onto the same adjusted location.
        if had_previous && adjusted_location == previous_location {
            self.stats.indels_merged += 1;
        }

        // Nearby-match re-attribution: one element contributes the mass of
        // its best candidate only. A worse neighbor is subsumed.
        let replaces_element_best = !had_previous || probability > previous_probability;
        if !replaces_element_best {
            return;
        }
        if had_previous {
            self.scores_all
                .remove_probability_of_nearby_match(previous_probability);
            if !is_alt {
                self.scores_non_alt
                    .remove_probability_of_nearby_match(previous_probability);
            }
        }
        self.scores_all.add_probability(probability);
        if !is_alt {
            self.scores_non_alt.add_probability(probability);
        }

        {
            let element = self.table.element_mut(idx);
            element.best_score = score;
            element.match_probability_for_best_score = probability;
            element.best_score_genome_location = adjusted_location;
            element.best_score_orig_genome_location = orig_location;
        }

        let candidate = ScoredCandidate {
            location: adjusted_location,
            orig_location,
            direction,
            score,
            ag_score: i32::MIN,
            match_probability: probability,
            bases_clipped_before: 0,
            bases_clipped_after: 0,
            seed_offset,
            used_affine_gap_scoring: false,
        };
        if self.scores_all.try_update_best(&candidate) {
            self.lv_scores_after_best_found = 0;
            self.weight_of_best_element = element_weight;
        }
        if !is_alt {
            self.scores_non_alt.try_update_best(&candidate);
        }

        // Secondary capture; the list is re-filtered against the final best
        // at finalize.
        if self.config.max_edit_distance_for_secondary_results >= 0 {
            let bound = self.scores_all.best_score as i32
                + self.config.max_edit_distance_for_secondary_results;
            if (score as i32) <= bound {
                let mut secondary = SingleAlignmentResult::not_found();
                secondary.status = AlignmentStatus::MultipleHits;
                secondary.location = adjusted_location;
                secondary.orig_location = orig_location;
                secondary.direction = direction;
                secondary.score = score;
                secondary.match_probability = probability;
                secondary.seed_offset = seed_offset;
                if !push_capped(&mut rs.secondary, secondary) {
                    rs.had_room_for_all = false;
                    self.stats.secondary_buffer_overflows += 1;
                }
            }
        }

        // Affine-gap deferral: anything accepted by the first pass may be
        // re-scored precisely later.
        if self.config.use_affine_gap {
            let mut deferred = SingleAlignmentResult::not_found();
            deferred.status = AlignmentStatus::MultipleHits;
            deferred.location = adjusted_location;
            deferred.orig_location = orig_location;
            deferred.direction = direction;
            deferred.score = score;
            deferred.match_probability = probability;
            deferred.seed_offset = seed_offset;
            if !push_capped(&mut rs.candidates_for_affine_gap, deferred) {
                rs.had_room_for_all = false;
            }
        }
    }

    fn finalize(&mut self, rs: &mut AlignmentResultSet) {
        let popular = self.popular_seeds_skipped;
        if !self.scores_all.has_best() || self.scores_all.best_score as u32 > self.config.max_k {
            rs.primary = SingleAlignmentResult::not_found();
            rs.primary.popular_seeds_skipped = popular;
            return;
        }

        let overall_is_alt = self
            .genome
            .is_alt_location(self.scores_all.best_score_genome_location);
        let mut primary_from_all = true;
        let mut first_alt = None;

        if self.config.alt_awareness && overall_is_alt {
            let non_alt_ok = self.scores_non_alt.has_best()
                && (self.scores_non_alt.best_score as u32) <= self.config.max_k;
            if non_alt_ok {
                let gap =
                    self.scores_non_alt.best_score as i32 - self.scores_all.best_score as i32;
                if gap <= self.config.max_score_gap_to_prefer_non_alt_alignment {
                    primary_from_all = false;
                    if self.config.emit_alt_alignments {
                        first_alt = Some(&self.scores_all);
                    }
                }
            }
        }

        let primary_set = if primary_from_all {
            &self.scores_all
        } else {
            &self.scores_non_alt
        };
        let mapq = mapq_from_probabilities(
            primary_set.probability_of_best_candidate,
            self.scores_all.probability_of_all_candidates,
        );
        rs.primary = primary_set.fill_result(mapq, popular);
        rs.primary.status = status_for_mapq(mapq);

        rs.first_alt = first_alt.map(|set| {
            let alt_mapq = mapq_from_probabilities(
                set.probability_of_best_candidate,
                self.scores_all.probability_of_all_candidates,
            );
            let mut result = set.fill_result(alt_mapq, popular);
            result.status = status_for_mapq(alt_mapq);
            result
        });
    }

    /// Second pass: re-score the captured candidate list with affine gaps
    /// and re-resolve the primary/ALT decision in affine-gap score space.
    /// The probability mass from the first pass is kept for MAPQ so the
    /// estimator stays consistent with the pruning that already happened.
    pub fn align_affine_gap(&mut self, read: &Read, rs: &mut AlignmentResultSet) {
        if !rs.primary.is_mapped() || rs.candidates_for_affine_gap.is_empty() {
            return;
        }

        rs.candidates_for_affine_gap.sort_unstable_by_key(|c| {
            (c.direction.index(), c.orig_location, c.score)
        });
        rs.candidates_for_affine_gap
            .dedup_by_key(|c| (c.direction.index(), c.orig_location));

        let bound = self.scores_all.best_score as u32 + self.config.extra_search_depth;
        let read_len = self.read_len;
        let slack = self.max_ag_slack;

        let mut ag_all = ScoreSet::new();
        let mut ag_non_alt = ScoreSet::new();
        ag_all.probability_of_all_candidates = self.scores_all.probability_of_all_candidates;
        ag_non_alt.probability_of_all_candidates =
            self.scores_non_alt.probability_of_all_candidates;

        for i in 0..rs.candidates_for_affine_gap.len() {
            let cand = rs.candidates_for_affine_gap[i];
            if cand.score as u32 > bound {
                continue;
            }
            let window_start = cand.orig_location.saturating_sub(slack as u64);
            let left_slack = (cand.orig_location - window_start) as usize;
            let window_len = read_len + left_slack + slack;
            let Some(refr) = self.genome.substring(window_start, window_len) else {
                continue;
            };
            let (data, quals): (&[u8], &[u8]) = match cand.direction {
                Direction::Forward => (read.bases(), read.quals()),
                Direction::Rc => (&self.rc_read, &self.rc_quals),
            };
            let Some(agr) = self.ag.score(data, quals, refr, left_slack) else {
                continue;
            };
            self.stats.locations_scored_affine_gap += 1;
            if agr.edit_distance > self.config.max_k {
                continue;
            }

            let aligned_location = window_start + agr.ref_start_in_window as u64;
            let rescored = ScoredCandidate {
                location: aligned_location,
                orig_location: cand.orig_location,
                direction: cand.direction,
                score: agr.edit_distance as u16,
                ag_score: agr.ag_score,
                // First-pass probability: the mass MAPQ already accounts for.
                match_probability: cand.match_probability,
                bases_clipped_before: agr.bases_clipped_before,
                bases_clipped_after: agr.bases_clipped_after,
                seed_offset: cand.seed_offset,
                used_affine_gap_scoring: true,
            };
            ag_all.try_update_best_affine(&rescored);
            if !(self.config.alt_awareness && self.genome.is_alt_location(aligned_location)) {
                ag_non_alt.try_update_best_affine(&rescored);
            }
        }

        if !ag_all.has_best() {
            return;
        }

        let overall_is_alt = self.genome.is_alt_location(ag_all.best_score_genome_location);
        let mut primary_from_all = true;
        let mut first_alt = None;
        if self.config.alt_awareness && overall_is_alt && ag_non_alt.has_best() {
            // ALT preference gap compared in affine-gap score space here.
            let gap = ag_all.best_ag_score - ag_non_alt.best_ag_score;
            if gap <= self.config.max_score_gap_to_prefer_non_alt_alignment {
                primary_from_all = false;
                if self.config.emit_alt_alignments {
                    first_alt = Some(&ag_all);
                }
            }
        }

        let primary_set = if primary_from_all { &ag_all } else { &ag_non_alt };
        let mapq = mapq_from_probabilities(
            primary_set.probability_of_best_candidate,
            self.scores_all.probability_of_all_candidates,
        );
        let popular = self.popular_seeds_skipped;
        rs.primary = primary_set.fill_result(mapq, popular);
        rs.primary.status = status_for_mapq(mapq);
        rs.first_alt = first_alt.map(|set| {
            let alt_mapq = mapq_from_probabilities(
                set.probability_of_best_candidate,
                self.scores_all.probability_of_all_candidates,
            );
            let mut result = set.fill_result(alt_mapq, popular);
            result.status = status_for_mapq(alt_mapq);
            result
        });
    }

    fn finalize_secondary_results(&mut self, rs: &mut AlignmentResultSet) {
        if self.config.max_edit_distance_for_secondary_results < 0 || !rs.primary.is_mapped() {
            rs.secondary.clear();
            return;
        }
        let bound =
            rs.primary.score as i64 + self.config.max_edit_distance_for_secondary_results as i64;
        let primary_location = rs.primary.location;
        let primary_direction = rs.primary.direction;
        rs.secondary.retain(|s| {
            (s.score as i64) <= bound
                && !(s.direction == primary_direction
                    && s.location.abs_diff(primary_location) <= MAX_MERGE_DIST as u64)
        });

        // Deduplicate within the merge window, keeping the better score.
        rs.secondary
            .sort_unstable_by_key(|s| (s.direction.index(), s.location, s.score));
        let mut kept: usize = 0;
        for i in 0..rs.secondary.len() {
            if kept > 0 {
                let prev = rs.secondary[kept - 1];
                let cur = rs.secondary[i];
                if prev.direction == cur.direction
                    && cur.location.abs_diff(prev.location) <= MAX_MERGE_DIST as u64
                {
                    if cur.score < prev.score {
                        rs.secondary[kept - 1] = cur;
                    }
                    continue;
                }
            }
            rs.secondary[kept] = rs.secondary[i];
            kept += 1;
        }
        rs.secondary.truncate(kept);

        // Best ones first, deterministic order.
        rs.secondary
            .sort_unstable_by_key(|s| (s.score, s.location, s.direction.index()));

        // Optional per-contig budget, epoch-guarded like the hash table.
        let per_contig = self.config.max_secondary_alignments_per_contig;
        if per_contig > 0 {
            let epoch = self.table.epoch();
            let genome = self.genome;
            let counts = &mut self.hits_per_contig;
            rs.secondary.retain(|s| {
                let Some(contig_index) = genome.contig_index_at(s.location) else {
                    return false;
                };
                let entry = &mut counts[contig_index];
                if entry.epoch != epoch {
                    entry.epoch = epoch;
                    entry.hits = 0;
                }
                entry.hits += 1;
                entry.hits <= per_contig
            });
        }

        if rs.secondary.len() > self.config.max_secondary_results {
            rs.secondary.truncate(self.config.max_secondary_results);
        }
    }
}

#[inline]
fn status_for_mapq(mapq: u8) -> AlignmentStatus {
    if mapq >= MAPQ_SINGLE_HIT_THRESHOLD {
        AlignmentStatus::SingleHit
    } else {
        AlignmentStatus::MultipleHits
    }
}

#[inline]
fn push_capped(buffer: &mut Vec<SingleAlignmentResult>, item: SingleAlignmentResult) -> bool {
    if buffer.len() < buffer.capacity() {
        buffer.push(item);
        true
    } else {
        false
    }
}

/// Starting offset for wrap number `wrap` of the seed spreading schedule.
/// Wrap 1 starts at S/2, wraps 2..4 at S/4 and 3S/4, and so on by repeated
/// bisection; `None` once the stride drops below one base.
fn wrap_start_offset(wrap: u32, seed_len: usize) -> Option<usize> {
    let level = 32 - wrap.leading_zeros() as usize;
    if (1usize << level) > seed_len {
        return None;
    }
    let first_of_level = 1u32 << (level - 1);
    let k = (wrap - first_of_level) as usize;
    Some(((2 * k + 1) * seed_len) >> level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_offsets_bisect_the_stride() {
        assert_eq!(wrap_start_offset(1, 16), Some(8));
        assert_eq!(wrap_start_offset(2, 16), Some(4));
        assert_eq!(wrap_start_offset(3, 16), Some(12));
        assert_eq!(wrap_start_offset(4, 16), Some(2));
        assert_eq!(wrap_start_offset(7, 16), Some(14));
        assert_eq!(wrap_start_offset(8, 16), Some(1));
        assert_eq!(wrap_start_offset(15, 16), Some(15));
        assert_eq!(wrap_start_offset(16, 16), None);
    }

    #[test]
    fn wrap_offsets_exhaust_for_tiny_seeds() {
        assert_eq!(wrap_start_offset(1, 2), Some(1));
        assert_eq!(wrap_start_offset(2, 2), None);
    }

    #[test]
    fn status_threshold() {
        assert_eq!(status_for_mapq(10), AlignmentStatus::SingleHit);
        assert_eq!(status_for_mapq(9), AlignmentStatus::MultipleHits);
    }
}
