// Post-scoring alignment adjustment at contig boundaries.
//
// Scoring happily extends into the inter-contig padding (padding matches
// nothing, so it only costs edits or clips). Before a result is reported,
// any read bases that fall outside the owning contig are converted into
// soft clips and the location is nudged back inside. The padding constant
// bounds how far an alignment can have strayed.

use crate::genome::Genome;
use crate::result::SingleAlignmentResult;

pub struct AlignmentAdjuster;

impl AlignmentAdjuster {
    /// Clamp `result` to the contig that owns it. Returns true when the
    /// result was modified.
    pub fn adjust(genome: &Genome, read_len: usize, result: &mut SingleAlignmentResult) -> bool {
        let aligned_len = read_len
            .saturating_sub(result.bases_clipped_before + result.bases_clipped_after)
            as u64;

        if let Some(contig) = genome.contig_at(result.location) {
            let contig_end = contig.beginning_location + contig.length;
            let result_end = result.location + aligned_len;
            if result_end > contig_end {
                let overrun = (result_end - contig_end) as usize;
                if (overrun as u64) <= genome.padding() {
                    result.bases_clipped_after += overrun;
                    return true;
                }
            }
            return false;
        }

        // Location in padding: shift forward to the next contig start and
        // clip the leading overhang.
        let next = genome
            .contigs()
            .iter()
            .find(|c| c.beginning_location > result.location);
        if let Some(contig) = next {
            let shift = contig.beginning_location - result.location;
            if shift <= genome.padding() && (shift as u64) < aligned_len {
                result.bases_clipped_before += shift as usize;
                result.location = contig.beginning_location;
                return true;
            }
        }
        false
    }
}
