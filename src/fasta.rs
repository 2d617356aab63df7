// FASTA reference ingestion using bio::io::fasta.
//
// Gzip input is detected by the .gz extension. Contigs are appended to the
// padded genome in file order; ALT status is decided per contig by the
// marking policy below.

use crate::genome::Genome;
use bio::io::fasta;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// How contigs get their ALT flag.
///
/// An opt-out name wins over everything; an opt-in name or a length at most
/// `max_size_for_automatic_alt` marks the contig ALT. The two name lists are
/// expected to be mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct AltMarkingPolicy {
    pub opt_in_names: Vec<String>,
    pub opt_out_names: Vec<String>,
    pub max_size_for_automatic_alt: u64,
}

impl AltMarkingPolicy {
    fn is_alt(&self, name: &str, length: u64) -> bool {
        if self
            .opt_out_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
        {
            return false;
        }
        if length <= self.max_size_for_automatic_alt {
            return true;
        }
        self.opt_in_names
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }
}

fn open_reader(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().map_or(false, |e| e == "gz") {
        log::debug!("reading gzip-compressed FASTA: {}", path.display());
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            GzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

/// Load a reference FASTA into a padded [`Genome`].
///
/// Contig names are the first whitespace-delimited token of the record id.
pub fn load_reference(path: &Path, policy: &AltMarkingPolicy) -> io::Result<Genome> {
    let reader = fasta::Reader::new(open_reader(path)?);
    let mut genome = Genome::new();
    let mut n_contigs = 0usize;
    let mut n_bases = 0u64;

    for record in reader.records() {
        let record = record.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let name = record.id().to_string();
        let seq = record.seq();
        let is_alt = policy.is_alt(&name, seq.len() as u64);
        genome.add_contig(&name, seq, is_alt);
        n_contigs += 1;
        n_bases += seq.len() as u64;
    }

    if n_contigs == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no FASTA records in {}", path.display()),
        ));
    }

    genome.finish();
    log::info!(
        "loaded reference {}: {} contigs, {} bases",
        path.display(),
        n_contigs,
        n_bases
    );
    Ok(genome)
}
