// Bounded edit-distance scoring, Landau-Vishkin style.
//
// The classic O(k^2 + k*n) diagonal formulation: L[e][d] holds the furthest
// pattern index reachable with e edits on diagonal d (d = text index minus
// pattern index). The whole pattern must be consumed; the text end is free.
// A backtrace over the action table recovers mismatch positions and indel
// runs so the match probability comes from the same path as the distance.

use crate::scoring::bases_match;
use crate::scoring::probability::{indel_probability, phred_tables};

const UNREACHED: i32 = i32::MIN / 2;

const ACT_NONE: u8 = 0;
const ACT_SUB: u8 = 1;
/// Text consumed an extra base (gap in the pattern).
const ACT_TEXT_GAP: u8 = 2;
/// Pattern consumed a base with no text counterpart (gap in the text).
const ACT_PATTERN_GAP: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LvResult {
    pub edit_distance: u32,
    /// Text bases consumed minus pattern bases consumed on the winning path.
    pub net_indel: i32,
    pub match_probability: f64,
}

pub struct LandauVishkin {
    max_k: usize,
    width: usize,
    l: Vec<i32>,
    actions: Vec<u8>,
}

impl LandauVishkin {
    pub fn new(max_k: usize) -> LandauVishkin {
        let width = 2 * max_k + 1;
        LandauVishkin {
            max_k,
            width,
            l: vec![UNREACHED; (max_k + 1) * width],
            actions: vec![ACT_NONE; (max_k + 1) * width],
        }
    }

    #[inline]
    fn idx(&self, e: usize, d: i32) -> usize {
        e * self.width + (d + self.max_k as i32) as usize
    }

    /// Align all of `pattern` against a prefix region of `text` with at most
    /// `k` edits. `quals` parallels `pattern` (same orientation). Returns
    /// `None` when the pattern cannot be placed within the edit budget.
    pub fn compute(
        &mut self,
        text: &[u8],
        pattern: &[u8],
        quals: &[u8],
        k: u32,
    ) -> Option<LvResult> {
        debug_assert_eq!(pattern.len(), quals.len());
        let plen = pattern.len() as i32;
        let tlen = text.len() as i32;
        if plen == 0 {
            return Some(LvResult {
                edit_distance: 0,
                net_indel: 0,
                match_probability: 1.0,
            });
        }
        let k = (k as usize).min(self.max_k) as i32;
        if plen - k > tlen {
            // Even k text gaps cannot fit the pattern into this text.
            return None;
        }

        let used = (k as usize + 1) * self.width;
        self.l[..used].fill(UNREACHED);
        self.actions[..used].fill(ACT_NONE);

        // e = 0: pure match run on the main diagonal.
        let mut i = 0i32;
        while i < plen && i < tlen && bases_match(pattern[i as usize], text[i as usize]) {
            i += 1;
        }
        let idx0 = self.idx(0, 0);
        self.l[idx0] = i;
        if i >= plen {
            return Some(self.backtrace(0, 0, pattern, quals));
        }

        for e in 1..=k {
            for d in -e..=e {
                let mut best = UNREACHED;
                let mut action = ACT_NONE;

                // Substitution: consume one of each.
                if d.abs() <= e - 1 {
                    let prev = self.l[self.idx((e - 1) as usize, d)];
                    if prev != UNREACHED && prev < plen && prev + d < tlen && prev + d >= 0 {
                        best = prev + 1;
                        action = ACT_SUB;
                    }
                }
                // Gap in the pattern: text consumes an extra base.
                if (d - 1).abs() <= e - 1 {
                    let prev = self.l[self.idx((e - 1) as usize, d - 1)];
                    if prev != UNREACHED && prev + d - 1 < tlen && prev + d - 1 >= 0 && prev > best
                    {
                        best = prev;
                        action = ACT_TEXT_GAP;
                    }
                }
                // Gap in the text: pattern consumes a base alone.
                if (d + 1).abs() <= e - 1 {
                    let prev = self.l[self.idx((e - 1) as usize, d + 1)];
                    if prev != UNREACHED && prev < plen && prev + 1 > best {
                        best = prev + 1;
                        action = ACT_PATTERN_GAP;
                    }
                }

                if best == UNREACHED || best + d < 0 {
                    continue;
                }

                // Extend the free match run.
                let mut i = best;
                while i < plen
                    && i + d < tlen
                    && i + d >= 0
                    && bases_match(pattern[i as usize], text[(i + d) as usize])
                {
                    i += 1;
                }
                let cell = self.idx(e as usize, d);
                self.l[cell] = i;
                self.actions[cell] = action;
                if i >= plen {
                    return Some(self.backtrace(e as usize, d, pattern, quals));
                }
            }
        }
        None
    }

    /// Walk the action table back to (0, 0), multiplying per-base quality
    /// factors for matches/mismatches and per-run open/extend factors for
    /// indels.
    fn backtrace(&self, e_found: usize, d_found: i32, pattern: &[u8], quals: &[u8]) -> LvResult {
        let tables = phred_tables();
        let mut prob = 1.0f64;
        let mut e = e_found;
        let mut d = d_found;
        let mut i_cur = self.l[self.idx(e, d)];
        let mut pending_act = ACT_NONE;
        let mut pending_len = 0u32;
        debug_assert!(i_cur as usize <= pattern.len());

        while e > 0 {
            let act = self.actions[self.idx(e, d)];
            let (d_prev, i_after_edit) = match act {
                ACT_SUB => (d, self.l[self.idx(e - 1, d)] + 1),
                ACT_TEXT_GAP => (d - 1, self.l[self.idx(e - 1, d - 1)]),
                ACT_PATTERN_GAP => (d + 1, self.l[self.idx(e - 1, d + 1)] + 1),
                _ => unreachable!("backtrace entered an unreached cell"),
            };
            let matched_after = i_cur - i_after_edit;
            for qi in i_after_edit..i_cur {
                prob *= tables.match_factor[quals[qi as usize] as usize];
            }
            match act {
                ACT_SUB => {
                    if pending_len > 0 {
                        prob *= indel_probability(pending_len);
                        pending_len = 0;
                        pending_act = ACT_NONE;
                    }
                    prob *= tables.mismatch_factor[quals[(i_after_edit - 1) as usize] as usize];
                }
                _ => {
                    if pending_act == act && matched_after == 0 {
                        pending_len += 1;
                    } else {
                        if pending_len > 0 {
                            prob *= indel_probability(pending_len);
                        }
                        pending_act = act;
                        pending_len = 1;
                    }
                }
            }
            i_cur = match act {
                ACT_SUB => i_after_edit - 1,
                ACT_TEXT_GAP => i_after_edit,
                ACT_PATTERN_GAP => i_after_edit - 1,
                _ => unreachable!(),
            };
            d = d_prev;
            e -= 1;
        }
        if pending_len > 0 {
            prob *= indel_probability(pending_len);
        }
        for qi in 0..i_cur {
            prob *= tables.match_factor[quals[qi as usize] as usize];
        }

        LvResult {
            edit_distance: e_found as u32,
            net_indel: d_found,
            match_probability: prob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lv() -> LandauVishkin {
        LandauVishkin::new(15)
    }

    fn quals(n: usize) -> Vec<u8> {
        vec![b'I'; n]
    }

    #[test]
    fn exact_match_is_zero_edits() {
        let mut lv = lv();
        let r = lv
            .compute(b"ACGTACGTACGT", b"ACGTACGT", &quals(8), 4)
            .unwrap();
        assert_eq!(r.edit_distance, 0);
        assert_eq!(r.net_indel, 0);
        assert!(r.match_probability > 0.99);
    }

    #[test]
    fn single_substitution() {
        let mut lv = lv();
        let r = lv
            .compute(b"ACGTACGTACGT", b"ACGTATGT", &quals(8), 4)
            .unwrap();
        assert_eq!(r.edit_distance, 1);
        assert_eq!(r.net_indel, 0);
    }

    #[test]
    fn single_deletion_from_pattern() {
        // Pattern is the text with one base missing: text gap consumes it.
        let mut lv = lv();
        let r = lv.compute(b"ACGTACGT", b"ACGACGT", &quals(7), 4).unwrap();
        assert_eq!(r.edit_distance, 1);
        assert_eq!(r.net_indel, 1);
    }

    #[test]
    fn single_insertion_in_pattern() {
        let mut lv = lv();
        let r = lv.compute(b"ACGTACGT", b"ACGTTACGT", &quals(9), 4).unwrap();
        assert_eq!(r.edit_distance, 1);
        assert_eq!(r.net_indel, -1);
    }

    #[test]
    fn over_limit_returns_none() {
        let mut lv = lv();
        assert!(lv.compute(b"AAAAAAAA", b"CCCCCCCC", &quals(8), 3).is_none());
    }

    #[test]
    fn limit_is_inclusive() {
        let mut lv = lv();
        let r = lv.compute(b"AACCAAAA", b"AAAAAAAA", &quals(8), 2).unwrap();
        assert_eq!(r.edit_distance, 2);
    }

    #[test]
    fn n_bases_never_match() {
        let mut lv = lv();
        let r = lv.compute(b"ACGNACGT", b"ACGNACGT", &quals(8), 4).unwrap();
        assert_eq!(r.edit_distance, 1);
    }

    #[test]
    fn probability_orders_by_distance() {
        let mut lv = lv();
        let exact = lv
            .compute(b"ACGTACGTACGT", b"ACGTACGT", &quals(8), 4)
            .unwrap();
        let one_sub = lv
            .compute(b"ACGTACGTACGT", b"ACGTATGT", &quals(8), 4)
            .unwrap();
        assert!(exact.match_probability > one_sub.match_probability);
    }

    #[test]
    fn empty_pattern_matches_trivially() {
        let mut lv = lv();
        let r = lv.compute(b"ACGT", b"", &[], 4).unwrap();
        assert_eq!(r.edit_distance, 0);
        assert_eq!(r.match_probability, 1.0);
    }

    #[test]
    fn pattern_longer_than_text_plus_budget_fails_fast() {
        let mut lv = lv();
        assert!(lv.compute(b"AC", b"ACGTACGT", &quals(8), 2).is_none());
    }

    #[test]
    fn indel_run_probability_beats_two_separate_indels() {
        let mut lv = lv();
        // Two-base contiguous deletion: one open + one extend.
        let contiguous = lv.compute(b"ACGTAACGT", b"ACGAACGT", &quals(8), 4);
        assert!(contiguous.is_some());
    }
}
