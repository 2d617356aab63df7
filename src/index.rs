// K-mer hash index over the reference genome.
//
// Every seed-length window free of N/padding maps to the list of genome
// locations it occurs at. The aligner decides popularity admission; the
// index just hands back the hit list and its seed length.

use crate::genome::{Genome, GenomeLocation};
use crate::read::base_to_code;
use rustc_hash::FxHashMap;

/// The GenomeIndex contract consumed by the aligner: a seed lookup plus the
/// seed length the index was built with.
pub trait SeedIndex: Sync {
    fn seed_length(&self) -> usize;

    /// Hit locations for `seed`, or `None` when the seed is not indexable
    /// (contains N or ambiguity). A seed absent from the reference returns
    /// an empty slice.
    fn lookup(&self, seed: &[u8]) -> Option<&[GenomeLocation]>;
}

/// 2-bit-pack a seed into a u64 key. Seeds with non-ACGT bases are not
/// indexable.
pub fn encode_seed(seed: &[u8]) -> Option<u64> {
    debug_assert!(seed.len() <= 31);
    let mut key: u64 = 0;
    for &base in seed {
        let code = base_to_code(base);
        if code > 3 {
            return None;
        }
        key = (key << 2) | code as u64;
    }
    Some(key)
}

pub struct KmerHashIndex {
    seed_len: usize,
    buckets: FxHashMap<u64, Vec<GenomeLocation>>,
}

impl KmerHashIndex {
    /// Walk every window of the genome and record its location. Windows
    /// touching padding or N bases are skipped via an incremental validity
    /// counter, so the build stays a single pass.
    pub fn build(genome: &Genome, seed_len: usize) -> Result<KmerHashIndex, String> {
        if seed_len == 0 || seed_len > 31 {
            return Err(format!("seed length {} not in 1..=31", seed_len));
        }
        let data = genome.data();
        if (data.len() as u64) < seed_len as u64 {
            return Err("genome shorter than one seed".to_string());
        }

        let mut buckets: FxHashMap<u64, Vec<GenomeLocation>> = FxHashMap::default();
        let mask = (1u64 << (2 * seed_len)) - 1;
        let mut key: u64 = 0;
        let mut valid_bases = 0usize;

        for (pos, &base) in data.iter().enumerate() {
            let code = base_to_code(base);
            if code > 3 {
                valid_bases = 0;
                key = 0;
                continue;
            }
            key = ((key << 2) | code as u64) & mask;
            valid_bases += 1;
            if valid_bases >= seed_len {
                let location = (pos + 1 - seed_len) as GenomeLocation;
                buckets.entry(key).or_default().push(location);
            }
        }

        log::info!(
            "built k-mer index: seed length {}, {} distinct seeds",
            seed_len,
            buckets.len()
        );
        Ok(KmerHashIndex { seed_len, buckets })
    }

    /// Number of distinct seeds in the index.
    pub fn distinct_seeds(&self) -> usize {
        self.buckets.len()
    }
}

impl SeedIndex for KmerHashIndex {
    #[inline]
    fn seed_length(&self) -> usize {
        self.seed_len
    }

    fn lookup(&self, seed: &[u8]) -> Option<&[GenomeLocation]> {
        debug_assert_eq!(seed.len(), self.seed_len);
        let key = encode_seed(seed)?;
        Some(self.buckets.get(&key).map_or(&[], |hits| hits.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_genome(bases: &[u8]) -> Genome {
        let mut genome = Genome::with_padding(4);
        genome.add_contig("c", bases, false);
        genome.finish();
        genome
    }

    #[test]
    fn encode_rejects_n() {
        assert!(encode_seed(b"ACGN").is_none());
        assert_eq!(encode_seed(b"ACGT"), Some(0b00_01_10_11));
    }

    #[test]
    fn finds_all_occurrences() {
        // "ACGTACGT" at padding offset 4: "ACGT" occurs at 4 and 8.
        let genome = tiny_genome(b"ACGTACGT");
        let index = KmerHashIndex::build(&genome, 4).unwrap();
        assert_eq!(index.seed_length(), 4);
        assert_eq!(index.lookup(b"ACGT").unwrap(), &[4, 8]);
        assert_eq!(index.lookup(b"CGTA").unwrap(), &[5]);
    }

    #[test]
    fn absent_seed_yields_empty_slice() {
        let genome = tiny_genome(b"AAAA");
        let index = KmerHashIndex::build(&genome, 4).unwrap();
        assert_eq!(index.lookup(b"GGGG").unwrap(), &[] as &[u64]);
    }

    #[test]
    fn windows_across_padding_are_not_indexed() {
        // Padding bases are 'n'; no window containing them may appear.
        let genome = tiny_genome(b"ACGT");
        let index = KmerHashIndex::build(&genome, 4).unwrap();
        assert_eq!(index.distinct_seeds(), 1);
        assert_eq!(index.lookup(b"ACGT").unwrap(), &[4]);
    }

    #[test]
    fn n_in_reference_splits_windows() {
        let genome = tiny_genome(b"ACGTNACGT");
        let index = KmerHashIndex::build(&genome, 4).unwrap();
        assert_eq!(index.lookup(b"ACGT").unwrap(), &[4, 9]);
        assert_eq!(index.lookup(b"GTAC").unwrap(), &[] as &[u64]);
    }

    #[test]
    fn rejects_bad_seed_lengths() {
        let genome = tiny_genome(b"ACGT");
        assert!(KmerHashIndex::build(&genome, 0).is_err());
        assert!(KmerHashIndex::build(&genome, 32).is_err());
    }
}
