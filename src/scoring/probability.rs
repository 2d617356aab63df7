// Quality-derived probabilities and the MAPQ transform.
//
// Probabilities flow through the aligner as raw products; only finalize
// converts them to a phred-scaled mapping quality. Tables are computed once
// per process.

use crate::defaults::MAPQ_MAX;
use std::sync::OnceLock;

pub const SNP_PROB: f64 = 0.001;
pub const GAP_OPEN_PROB: f64 = 0.001;
pub const GAP_EXTEND_PROB: f64 = 0.5;

/// Base-call error probability is capped here; a phred score of 0 would
/// otherwise zero out every product it touches.
const MAX_BASE_ERROR_PROB: f64 = 0.75;

pub struct PhredTables {
    /// P(base call correct), indexed by the raw ASCII quality byte.
    pub match_factor: [f64; 256],
    /// Contribution of a substitution at this quality: a real SNP or a
    /// miscalled base.
    pub mismatch_factor: [f64; 256],
}

fn build_tables() -> PhredTables {
    let mut match_factor = [0.0f64; 256];
    let mut mismatch_factor = [0.0f64; 256];
    for q in 0..256usize {
        let phred = q.saturating_sub(33) as f64;
        let error = (10f64.powf(-phred / 10.0)).min(MAX_BASE_ERROR_PROB);
        match_factor[q] = 1.0 - error;
        mismatch_factor[q] = SNP_PROB + (1.0 - SNP_PROB) * error / 3.0;
    }
    PhredTables {
        match_factor,
        mismatch_factor,
    }
}

pub fn phred_tables() -> &'static PhredTables {
    static TABLES: OnceLock<PhredTables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

/// Probability of an indel of `len` bases: one open, len-1 extensions.
#[inline]
pub fn indel_probability(len: u32) -> f64 {
    debug_assert!(len > 0);
    GAP_OPEN_PROB * GAP_EXTEND_PROB.powi(len as i32 - 1)
}

/// MAPQ = -10*log10(1 - best/all), clipped to [0, MAPQ_MAX].
///
/// A dominating best candidate (or an empty field of competitors) earns the
/// cap; a best candidate that is not the majority of the mass earns 0 fast.
pub fn mapq_from_probabilities(best: f64, all: f64) -> u8 {
    if all <= 0.0 || best >= all {
        return MAPQ_MAX;
    }
    let ratio = (best / all).clamp(0.0, 1.0);
    let p_wrong = 1.0 - ratio;
    if p_wrong <= 1e-10 {
        return MAPQ_MAX;
    }
    let mapq = -10.0 * p_wrong.log10();
    mapq.round().clamp(0.0, MAPQ_MAX as f64) as u8
}
