//! Scoring back-ends for the alignment engine.
//!
//! Two independent estimators of the same objective: a bounded edit-distance
//! Landau-Vishkin pass (fast, first pass) and a banded affine-gap DP
//! (precise, used to re-score indel-bearing candidates). Both report a match
//! probability derived from per-base qualities so that mapping quality stays
//! consistent with whichever back-end scored a candidate.

pub mod affine_gap;
pub mod landau_vishkin;
pub mod probability;

/// Two read bases (or a read base and a reference base) match only when they
/// are the same ACGT letter. N never matches, and lowercase padding never
/// matches an uppercase read base.
#[inline]
pub fn bases_match(a: u8, b: u8) -> bool {
    a == b && a != b'N'
}
