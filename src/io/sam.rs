// SAM-style record output.
//
// The engine reports locations and scores, not alignments; the CIGAR and NM
// for a record are recomputed at write time by re-running the affine-gap
// scorer at the reported location. Unmapped reads get the star fields the
// format requires.

use crate::genome::Genome;
use crate::read::{reverse_complement_into, Direction, Read};
use crate::result::SingleAlignmentResult;
use crate::scoring::affine_gap::AffineGapScorer;
use std::io::{self, Write};

/// SAM flag bits used by single-end output.
pub mod sam_flags {
    pub const UNMAPPED: u16 = 0x4;
    pub const REVERSE: u16 = 0x10;
    pub const SECONDARY: u16 = 0x100;
}

/// Formats records for one output stream. Holds the affine-gap scorer used
/// for write-time CIGAR recovery plus a reverse-complement scratch buffer.
pub struct SamWriter {
    ag: AffineGapScorer,
    slack: usize,
    rc_scratch: Vec<u8>,
    qual_scratch: Vec<u8>,
}

impl SamWriter {
    pub fn new(ag: AffineGapScorer, slack: usize) -> SamWriter {
        SamWriter {
            ag,
            slack,
            rc_scratch: Vec::new(),
            qual_scratch: Vec::new(),
        }
    }

    /// @HD/@SQ/@PG header from the genome's contig table.
    pub fn write_header<W: Write>(
        &self,
        out: &mut W,
        genome: &Genome,
        command_line: &str,
    ) -> io::Result<()> {
        writeln!(out, "@HD\tVN:1.6\tSO:unknown")?;
        for contig in genome.contigs() {
            let mut line = format!("@SQ\tSN:{}\tLN:{}", contig.name, contig.length);
            if contig.is_alt {
                line.push_str("\tAH:*");
            }
            writeln!(out, "{}", line)?;
        }
        writeln!(
            out,
            "@PG\tID:hashalign\tPN:hashalign\tVN:{}\tCL:{}",
            env!("CARGO_PKG_VERSION"),
            command_line
        )
    }

    pub fn write_record<W: Write>(
        &mut self,
        out: &mut W,
        genome: &Genome,
        read: &Read,
        result: &SingleAlignmentResult,
        secondary: bool,
    ) -> io::Result<()> {
        if !result.is_mapped() {
            return writeln!(
                out,
                "{}\t{}\t*\t0\t0\t*\t*\t0\t0\t{}\t{}",
                read.name,
                sam_flags::UNMAPPED,
                String::from_utf8_lossy(read.bases()),
                String::from_utf8_lossy(read.quals())
            );
        }

        let mut flag = 0u16;
        if result.direction == Direction::Rc {
            flag |= sam_flags::REVERSE;
        }
        if secondary {
            flag |= sam_flags::SECONDARY;
        }

        // SEQ/QUAL are reported on the aligned strand.
        let (seq, qual): (&[u8], &[u8]) = match result.direction {
            Direction::Forward => (read.bases(), read.quals()),
            Direction::Rc => {
                reverse_complement_into(read.bases(), &mut self.rc_scratch);
                self.qual_scratch.clear();
                self.qual_scratch.extend(read.quals().iter().rev());
                (&self.rc_scratch, &self.qual_scratch)
            }
        };

        // Recover the alignment shape at the reported location.
        let window_start = result.location.saturating_sub(self.slack as u64);
        let left_slack = (result.location - window_start) as usize;
        let window_len = seq.len() + left_slack + self.slack;
        let rescored = genome
            .substring(window_start, window_len)
            .and_then(|refr| self.ag.score(seq, qual, refr, left_slack));

        let (pos_location, cigar, nm, as_tag) = match rescored {
            Some(agr) => (
                window_start + agr.ref_start_in_window as u64,
                cigar_string(self.ag.last_cigar()),
                agr.edit_distance as i64,
                agr.ag_score as i64,
            ),
            // The scorer has no business failing at a location the engine
            // reported, but degrade to an ungapped record if it does.
            None => (
                result.location,
                format!("{}M", seq.len()),
                result.score as i64,
                result.ag_score.max(0) as i64,
            ),
        };

        let (ref_name, ref_pos) = match genome.contig_at(pos_location) {
            Some(contig) => (
                contig.name.as_str(),
                pos_location - contig.beginning_location + 1,
            ),
            None => ("*", 0),
        };

        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t*\t0\t0\t{}\t{}\tNM:i:{}\tAS:i:{}",
            read.name,
            flag,
            ref_name,
            ref_pos,
            result.mapq,
            cigar,
            String::from_utf8_lossy(seq),
            String::from_utf8_lossy(qual),
            nm,
            as_tag
        )
    }
}

fn cigar_string(ops: &[(u8, u32)]) -> String {
    if ops.is_empty() {
        return "*".to_string();
    }
    let mut s = String::with_capacity(ops.len() * 4);
    for &(op, len) in ops {
        s.push_str(&len.to_string());
        s.push(op as char);
    }
    s
}
