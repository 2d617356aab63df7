// FASTQ reader using bio::io::fastq, with gzip detection by extension.
// Reads come out in batches sized for the outer pipeline.

use crate::read::Read as SequenceRead;
use bio::io::fastq;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub struct ReadBatch {
    pub reads: Vec<SequenceRead>,
}

impl ReadBatch {
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }
}

pub struct FastqReader {
    records: fastq::Records<BufReader<Box<dyn Read>>>,
}

impl FastqReader {
    /// Open a FASTQ file; `.gz` paths are decompressed on the fly.
    pub fn new(path: &Path) -> io::Result<FastqReader> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
            log::debug!("reading gzip-compressed FASTQ: {}", path.display());
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let fastq_reader = fastq::Reader::with_capacity(BUFFER_SIZE, reader);
        Ok(FastqReader {
            records: fastq_reader.records(),
        })
    }

    /// Pull up to `max_reads` records. An empty batch means end of input.
    pub fn read_batch(&mut self, max_reads: usize) -> io::Result<ReadBatch> {
        let mut reads = Vec::with_capacity(max_reads);
        while reads.len() < max_reads {
            match self.records.next() {
                Some(Ok(record)) => {
                    let read = SequenceRead::new(record.id(), record.seq(), record.qual())
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    reads.push(read);
                }
                Some(Err(e)) => {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, e));
                }
                None => break,
            }
        }
        Ok(ReadBatch { reads })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_fastq(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".fq").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_batches_in_order() {
        let file = write_temp_fastq(
            "@r1\nACGT\n+\nIIII\n@r2\nTTTT\n+\nJJJJ\n@r3\nGGGG\n+\nKKKK\n",
        );
        let mut reader = FastqReader::new(file.path()).unwrap();
        let batch = reader.read_batch(2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.reads[0].name, "r1");
        assert_eq!(batch.reads[0].bases(), b"ACGT");
        assert_eq!(batch.reads[1].name, "r2");
        let rest = reader.read_batch(2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.reads[0].name, "r3");
        assert!(reader.read_batch(2).unwrap().is_empty());
    }

    #[test]
    fn malformed_fastq_is_an_error() {
        let file = write_temp_fastq("@r1\nACGT\nnot-a-plus\nIIII\n");
        let mut reader = FastqReader::new(file.path()).unwrap();
        assert!(reader.read_batch(1).is_err());
    }
}
