// Affine-gap scoring: banded Needleman-Wunsch over a reference window with
// free soft clips at the read ends and bonuses for reaching them unclipped.
//
// The band covers diagonals [0, 2*slack] of the window, where window index
// `slack` corresponds to the candidate genome location. Three score grids
// (H, plus the two gap-extension grids) are kept in full so the traceback
// recovers a CIGAR, the mismatch/indel inventory, and the quality-derived
// match probability in one walk.

use crate::scoring::bases_match;
use crate::scoring::probability::{indel_probability, phred_tables};

const NEG_INF: i32 = i32::MIN / 2;

// H-grid origins.
const FROM_NONE: u8 = 0;
const FROM_DIAG: u8 = 1;
const FROM_E: u8 = 2; // ref-consuming gap (CIGAR D)
const FROM_F: u8 = 3; // read-consuming gap (CIGAR I)
const FROM_START: u8 = 4;

// Gap-grid origins.
const GAP_OPEN: u8 = 1;
const GAP_EXTEND: u8 = 2;

#[derive(Debug, Clone, Copy)]
pub struct AffineGapParams {
    pub match_reward: i32,
    pub sub_penalty: i32,
    pub gap_open_penalty: i32,
    pub gap_extend_penalty: i32,
    pub five_prime_end_bonus: i32,
    pub three_prime_end_bonus: i32,
}

impl Default for AffineGapParams {
    fn default() -> AffineGapParams {
        use crate::defaults::*;
        AffineGapParams {
            match_reward: MATCH_REWARD,
            sub_penalty: SUB_PENALTY,
            gap_open_penalty: GAP_OPEN_PENALTY,
            gap_extend_penalty: GAP_EXTEND_PENALTY,
            five_prime_end_bonus: FIVE_PRIME_END_BONUS,
            three_prime_end_bonus: THREE_PRIME_END_BONUS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgResult {
    pub ag_score: i32,
    /// Substitutions plus indel bases on the traceback path; comparable to
    /// the Landau-Vishkin edit distance for the unclipped read span.
    pub edit_distance: u32,
    /// Window index where the aligned reference span begins.
    pub ref_start_in_window: usize,
    pub bases_clipped_before: usize,
    pub bases_clipped_after: usize,
    pub match_probability: f64,
}

pub struct AffineGapScorer {
    params: AffineGapParams,
    max_read: usize,
    max_slack: usize,
    h: Vec<i32>,
    e: Vec<i32>,
    f: Vec<i32>,
    tb_h: Vec<u8>,
    tb_e: Vec<u8>,
    tb_f: Vec<u8>,
    cigar: Vec<(u8, u32)>,
}

impl AffineGapScorer {
    pub fn new(params: AffineGapParams, max_read: usize, max_slack: usize) -> AffineGapScorer {
        let cells = (max_read + 1) * (2 * max_slack + 1);
        AffineGapScorer {
            params,
            max_read,
            max_slack,
            h: vec![NEG_INF; cells],
            e: vec![NEG_INF; cells],
            f: vec![NEG_INF; cells],
            tb_h: vec![FROM_NONE; cells],
            tb_e: vec![0; cells],
            tb_f: vec![0; cells],
            cigar: Vec::with_capacity(8),
        }
    }

    /// CIGAR of the most recent successful [`score`](Self::score) call.
    pub fn last_cigar(&self) -> &[(u8, u32)] {
        &self.cigar
    }

    /// Score `read` against `refr`, a reference window whose index `slack`
    /// corresponds to the candidate location. Returns `None` when nothing
    /// aligns (no diagonal step survives).
    pub fn score(
        &mut self,
        read: &[u8],
        quals: &[u8],
        refr: &[u8],
        slack: usize,
    ) -> Option<AgResult> {
        debug_assert_eq!(read.len(), quals.len());
        debug_assert!(read.len() <= self.max_read);
        debug_assert!(slack <= self.max_slack);
        let n = read.len();
        let m = refr.len();
        let band = 2 * slack + 1;
        if n == 0 || m == 0 {
            return None;
        }

        let used = (n + 1) * band;
        self.h[..used].fill(NEG_INF);
        self.e[..used].fill(NEG_INF);
        self.f[..used].fill(NEG_INF);
        self.tb_h[..used].fill(FROM_NONE);

        let open_cost = self.params.gap_open_penalty + self.params.gap_extend_penalty;
        let extend_cost = self.params.gap_extend_penalty;

        let mut best_score = NEG_INF;
        let mut best_i = 0usize;
        let mut best_b = 0usize;

        for i in 0..=n {
            let row = i * band;
            let prev_row = row.wrapping_sub(band);
            for b in 0..band {
                let j = i + b; // reference bases consumed
                if j > m {
                    continue;
                }
                let cell = row + b;

                // Ref-consuming gap, left neighbor in the same row.
                if b >= 1 && j >= 1 {
                    let left = row + b - 1;
                    let open = self.h[left] - open_cost;
                    let extend = self.e[left] - extend_cost;
                    if open >= extend {
                        self.e[cell] = open;
                        self.tb_e[cell] = GAP_OPEN;
                    } else {
                        self.e[cell] = extend;
                        self.tb_e[cell] = GAP_EXTEND;
                    }
                }

                // Read-consuming gap, upper-right neighbor.
                if i >= 1 && b + 1 < band {
                    let up = prev_row + b + 1;
                    let open = self.h[up] - open_cost;
                    let extend = self.f[up] - extend_cost;
                    if open >= extend {
                        self.f[cell] = open;
                        self.tb_f[cell] = GAP_OPEN;
                    } else {
                        self.f[cell] = extend;
                        self.tb_f[cell] = GAP_EXTEND;
                    }
                }

                // Fresh start: unclipped at i == 0 (5' bonus), clipped later.
                let mut best_h = if i == 0 {
                    self.params.five_prime_end_bonus
                } else {
                    0
                };
                let mut origin = FROM_START;

                if i >= 1 && j >= 1 {
                    let diag = self.h[prev_row + b];
                    if diag > NEG_INF {
                        let step = if bases_match(read[i - 1], refr[j - 1]) {
                            self.params.match_reward
                        } else {
                            -self.params.sub_penalty
                        };
                        if diag + step > best_h {
                            best_h = diag + step;
                            origin = FROM_DIAG;
                        }
                    }
                }
                if self.e[cell] > best_h {
                    best_h = self.e[cell];
                    origin = FROM_E;
                }
                if self.f[cell] > best_h {
                    best_h = self.f[cell];
                    origin = FROM_F;
                }

                self.h[cell] = best_h;
                self.tb_h[cell] = origin;

                // Candidate alignment end: full read earns the 3' bonus,
                // anything earlier soft-clips the rest. Ties prefer the
                // longer read span, then the central diagonal.
                if origin == FROM_DIAG {
                    let end_value = best_h
                        + if i == n {
                            self.params.three_prime_end_bonus
                        } else {
                            0
                        };
                    let better = end_value > best_score
                        || (end_value == best_score
                            && (i > best_i
                                || (i == best_i
                                    && b.abs_diff(slack) < best_b.abs_diff(slack))));
                    if better {
                        best_score = end_value;
                        best_i = i;
                        best_b = b;
                    }
                }
            }
        }

        if best_score == NEG_INF {
            return None;
        }
        Some(self.traceback(read, quals, refr, band, best_score, best_i, best_b))
    }

    #[allow(clippy::too_many_arguments)]
    fn traceback(
        &mut self,
        read: &[u8],
        quals: &[u8],
        refr: &[u8],
        band: usize,
        best_score: i32,
        best_i: usize,
        best_b: usize,
    ) -> AgResult {
        let tables = phred_tables();
        let n = read.len();
        self.cigar.clear();
        let mut rev_ops: Vec<(u8, u32)> = Vec::with_capacity(8);

        let mut prob = 1.0f64;
        let mut edit_distance = 0u32;
        let mut i = best_i;
        let mut b = best_b;
        let mut state = FROM_DIAG; // we always end on a diagonal step

        let push = |ops: &mut Vec<(u8, u32)>, op: u8| {
            if let Some(last) = ops.last_mut() {
                if last.0 == op {
                    last.1 += 1;
                    return;
                }
            }
            ops.push((op, 1));
        };

        loop {
            let cell = i * band + b;
            match state {
                FROM_DIAG => {
                    // In H; decide where this H value came from.
                    match self.tb_h[cell] {
                        FROM_DIAG => {
                            let j = i + b;
                            push(&mut rev_ops, b'M');
                            if bases_match(read[i - 1], refr[j - 1]) {
                                prob *= tables.match_factor[quals[i - 1] as usize];
                            } else {
                                prob *= tables.mismatch_factor[quals[i - 1] as usize];
                                edit_distance += 1;
                            }
                            i -= 1;
                        }
                        FROM_E => state = FROM_E,
                        FROM_F => state = FROM_F,
                        FROM_START | FROM_NONE => break,
                        _ => unreachable!(),
                    }
                }
                FROM_E => {
                    push(&mut rev_ops, b'D');
                    edit_distance += 1;
                    let origin = self.tb_e[cell];
                    b -= 1;
                    if origin == GAP_OPEN {
                        state = FROM_DIAG;
                    }
                }
                FROM_F => {
                    push(&mut rev_ops, b'I');
                    edit_distance += 1;
                    let origin = self.tb_f[cell];
                    i -= 1;
                    b += 1;
                    if origin == GAP_OPEN {
                        state = FROM_DIAG;
                    }
                }
                _ => unreachable!(),
            }
        }

        // Indel runs contribute one open + extends each.
        for &(op, len) in rev_ops.iter() {
            if op == b'I' || op == b'D' {
                prob *= indel_probability(len);
            }
        }

        let bases_clipped_before = i;
        let bases_clipped_after = n - best_i;
        let ref_start_in_window = i + b;

        self.cigar.clear();
        if bases_clipped_before > 0 {
            self.cigar.push((b'S', bases_clipped_before as u32));
        }
        self.cigar.extend(rev_ops.iter().rev());
        if bases_clipped_after > 0 {
            self.cigar.push((b'S', bases_clipped_after as u32));
        }

        AgResult {
            ag_score: best_score,
            edit_distance,
            ref_start_in_window,
            bases_clipped_before,
            bases_clipped_after,
            match_probability: prob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> AffineGapScorer {
        AffineGapScorer::new(AffineGapParams::default(), 64, 16)
    }

    fn quals(n: usize) -> Vec<u8> {
        vec![b'I'; n]
    }

    #[test]
    fn exact_match_earns_both_bonuses() {
        let mut ag = scorer();
        // Window: 4 slack bases, the read, 4 slack bases.
        let refr = b"TTTTACGTACGTTTTT";
        let r = ag.score(b"ACGTACGT", &quals(8), refr, 4).unwrap();
        assert_eq!(r.ag_score, 8 + 10 + 5);
        assert_eq!(r.edit_distance, 0);
        assert_eq!(r.ref_start_in_window, 4);
        assert_eq!(r.bases_clipped_before, 0);
        assert_eq!(r.bases_clipped_after, 0);
        assert_eq!(ag.last_cigar(), &[(b'M', 8)]);
    }

    #[test]
    fn single_substitution_costs_sub_penalty() {
        let mut ag = scorer();
        let refr = b"TTTTACGTACGTTTTT";
        let r = ag.score(b"ACGAACGT", &quals(8), refr, 4).unwrap();
        assert_eq!(r.ag_score, 7 - 4 + 10 + 5);
        assert_eq!(r.edit_distance, 1);
        assert_eq!(ag.last_cigar(), &[(b'M', 8)]);
    }

    #[test]
    fn insertion_opens_one_gap() {
        let mut ag = scorer();
        // Read has an extra A relative to the reference.
        let refr = b"TTTTACGTACGTTTTT";
        let r = ag.score(b"ACGTAACGT", &quals(9), refr, 4).unwrap();
        assert_eq!(r.edit_distance, 1);
        assert_eq!(r.ag_score, 8 - 7 + 10 + 5);
        let cigar = ag.last_cigar();
        assert!(cigar.iter().any(|&(op, len)| op == b'I' && len == 1));
    }

    #[test]
    fn deletion_consumes_reference() {
        let mut ag = scorer();
        // Read is missing one reference base.
        let refr = b"TTTTACGTAACGTTTT";
        let r = ag.score(b"ACGTACGT", &quals(8), refr, 4).unwrap();
        assert_eq!(r.edit_distance, 1);
        assert!(ag.last_cigar().iter().any(|&(op, _)| op == b'D'));
        assert_eq!(r.ref_start_in_window, 4);
    }

    #[test]
    fn garbage_tail_is_clipped() {
        let mut ag = scorer();
        // Last 4 read bases have no counterpart in the window.
        let refr = b"TTTTACGTACGTTTTT";
        let r = ag.score(b"ACGTACGTGGGG", &quals(12), refr, 4);
        // Clipping the GGGG tail (losing the 3' bonus) beats 4 substitutions
        // only if the window offers no matches; against the T run the G's
        // mismatch, so the clip wins.
        let r = r.unwrap();
        assert_eq!(r.bases_clipped_after, 4);
        assert_eq!(ag.last_cigar().last().copied(), Some((b'S', 4)));
    }

    #[test]
    fn leading_deletion_shifts_ref_start() {
        let mut ag = scorer();
        // The read matches one base to the right of the candidate location.
        let refr = b"TTTTGACGTACGTTTT";
        let r = ag.score(b"ACGTACGT", &quals(8), refr, 4).unwrap();
        assert_eq!(r.edit_distance, 0);
        assert_eq!(r.ref_start_in_window, 5);
        assert_eq!(r.bases_clipped_before, 0);
    }

    #[test]
    fn probability_tracks_path_quality() {
        let mut ag = scorer();
        let refr = b"TTTTACGTACGTTTTT";
        let exact = ag.score(b"ACGTACGT", &quals(8), refr, 4).unwrap();
        let sub = ag.score(b"ACGAACGT", &quals(8), refr, 4).unwrap();
        assert!(exact.match_probability > sub.match_probability);
    }

    #[test]
    fn empty_inputs_yield_none() {
        let mut ag = scorer();
        assert!(ag.score(b"", &[], b"ACGT", 2).is_none());
        assert!(ag.score(b"ACGT", &quals(4), b"", 2).is_none());
    }
}
