// src/defaults.rs

// Seeding and candidate admission
pub const MAX_HITS_TO_CONSIDER: usize = 300;
pub const SEED_COVERAGE: f64 = 4.0;
pub const MIN_WEIGHT_TO_CHECK: u32 = 1;
pub const EXTRA_SEARCH_DEPTH: u32 = 2;
pub const MIN_SEEDS_APPLIED_BEFORE_PRUNING: u32 = 4;

// Scoring
pub const MAX_K: u32 = 14;
pub const MAX_READ_SIZE: usize = 400;
pub const MATCH_REWARD: i32 = 1;
pub const SUB_PENALTY: i32 = 4;
pub const GAP_OPEN_PENALTY: i32 = 6;
pub const GAP_EXTEND_PENALTY: i32 = 1;
pub const FIVE_PRIME_END_BONUS: i32 = 10;
pub const THREE_PRIME_END_BONUS: i32 = 5;

// Scoring-loop truncation
pub const LV_SCORES_AFTER_BEST_CAP: u32 = 64;
pub const PROB_DOMINANCE_THRESHOLD: f64 = 0.999;
pub const SCORING_STEPS_PER_SEED: usize = 2;

// Result selection
pub const MAX_SCORE_GAP_TO_PREFER_NON_ALT: i32 = 20;
pub const MAX_SECONDARY_RESULTS: usize = 32;
pub const MAPQ_MAX: u8 = 70;
pub const MAPQ_SINGLE_HIT_THRESHOLD: u8 = 10;

// Index
pub const SEED_LENGTH: usize = 16;

// Output
pub const VERBOSITY: i32 = 3;
