// Concatenated, padded reference genome.
//
// All genome locations are offsets into one contiguous base array. Contigs
// are separated by runs of lowercase 'n' padding so that an alignment can
// never silently span two contigs: padding matches nothing the read can
// contain (reads are normalized to uppercase).

pub type GenomeLocation = u64;

/// Padding bases inserted before each contig and after the last one. Bounds
/// how far clipping adjustments may move an alignment at contig edges.
pub const CONTIG_PADDING: u64 = 512;

pub const PADDING_BASE: u8 = b'n';

#[derive(Debug, Clone)]
pub struct Contig {
    pub name: String,
    pub beginning_location: GenomeLocation,
    pub length: u64,
    pub is_alt: bool,
}

#[derive(Debug)]
pub struct Genome {
    bases: Vec<u8>,
    contigs: Vec<Contig>,
    padding: u64,
}

impl Genome {
    pub fn new() -> Genome {
        Genome::with_padding(CONTIG_PADDING)
    }

    pub fn with_padding(padding: u64) -> Genome {
        Genome {
            bases: Vec::new(),
            contigs: Vec::new(),
            padding,
        }
    }

    /// Append a contig. Padding is inserted before the contig body; bases
    /// outside ACGT are stored as 'N'.
    pub fn add_contig(&mut self, name: impl Into<String>, bases: &[u8], is_alt: bool) {
        self.bases
            .extend(std::iter::repeat(PADDING_BASE).take(self.padding as usize));
        let beginning_location = self.bases.len() as u64;
        self.bases.extend(bases.iter().map(|&b| match b {
            b'A' | b'C' | b'G' | b'T' => b,
            b'a' => b'A',
            b'c' => b'C',
            b'g' => b'G',
            b't' => b'T',
            _ => b'N',
        }));
        self.contigs.push(Contig {
            name: name.into(),
            beginning_location,
            length: bases.len() as u64,
            is_alt,
        });
    }

    /// Terminate the genome with trailing padding. Call once, after the last
    /// contig.
    pub fn finish(&mut self) {
        self.bases
            .extend(std::iter::repeat(PADDING_BASE).take(self.padding as usize));
        log::debug!(
            "genome finished: {} contigs, {} bases ({} ALT)",
            self.contigs.len(),
            self.bases.len(),
            self.contigs.iter().filter(|c| c.is_alt).count()
        );
    }

    /// Mark an existing contig as an alternate locus.
    pub fn mark_contig_alt(&mut self, name: &str) -> bool {
        for contig in &mut self.contigs {
            if contig.name == name {
                contig.is_alt = true;
                return true;
            }
        }
        false
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.bases.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.bases
    }

    #[inline]
    pub fn padding(&self) -> u64 {
        self.padding
    }

    #[inline]
    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    /// A view of `len` bases starting at `location`, clamped to the genome
    /// end. Returns `None` only when `location` itself is out of range.
    pub fn substring(&self, location: GenomeLocation, len: usize) -> Option<&[u8]> {
        let start = location as usize;
        if start >= self.bases.len() {
            return None;
        }
        let end = (start + len).min(self.bases.len());
        Some(&self.bases[start..end])
    }

    /// The contig owning `location`, or `None` for padding before the first
    /// contig or past the end. Locations in the padding run following a
    /// contig resolve to that contig's successor boundary check, i.e. they
    /// are not owned by any contig.
    pub fn contig_at(&self, location: GenomeLocation) -> Option<&Contig> {
        let idx = self
            .contigs
            .partition_point(|c| c.beginning_location <= location);
        if idx == 0 {
            return None;
        }
        let contig = &self.contigs[idx - 1];
        if location < contig.beginning_location + contig.length {
            Some(contig)
        } else {
            None
        }
    }

    /// Whether `location` falls on an ALT contig. Padding counts as non-ALT.
    #[inline]
    pub fn is_alt_location(&self, location: GenomeLocation) -> bool {
        self.contig_at(location).map_or(false, |c| c.is_alt)
    }

    /// Index into [`contigs`](Self::contigs) of the contig owning `location`.
    pub fn contig_index_at(&self, location: GenomeLocation) -> Option<usize> {
        let idx = self
            .contigs
            .partition_point(|c| c.beginning_location <= location);
        if idx == 0 {
            return None;
        }
        let contig = &self.contigs[idx - 1];
        if location < contig.beginning_location + contig.length {
            Some(idx - 1)
        } else {
            None
        }
    }
}

impl Default for Genome {
    fn default() -> Genome {
        Genome::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_contig_genome() -> Genome {
        let mut genome = Genome::with_padding(8);
        genome.add_contig("chr1", b"ACGTACGT", false);
        genome.add_contig("chr1_alt", b"TTTTCCCC", true);
        genome.finish();
        genome
    }

    #[test]
    fn padding_surrounds_contigs() {
        let genome = two_contig_genome();
        // 8 pad + 8 chr1 + 8 pad + 8 alt + 8 pad
        assert_eq!(genome.len(), 40);
        assert_eq!(&genome.data()[0..8], b"nnnnnnnn");
        assert_eq!(&genome.data()[8..16], b"ACGTACGT");
        assert_eq!(&genome.data()[16..24], b"nnnnnnnn");
    }

    #[test]
    fn contig_lookup_resolves_boundaries() {
        let genome = two_contig_genome();
        assert!(genome.contig_at(0).is_none());
        assert_eq!(genome.contig_at(8).unwrap().name, "chr1");
        assert_eq!(genome.contig_at(15).unwrap().name, "chr1");
        assert!(genome.contig_at(16).is_none()); // padding after chr1
        assert_eq!(genome.contig_at(24).unwrap().name, "chr1_alt");
    }

    #[test]
    fn alt_flag_is_per_contig() {
        let genome = two_contig_genome();
        assert!(!genome.is_alt_location(8));
        assert!(genome.is_alt_location(24));
        assert!(!genome.is_alt_location(0)); // padding
    }

    #[test]
    fn substring_clamps_at_end() {
        let genome = two_contig_genome();
        let tail = genome.substring(36, 100).unwrap();
        assert_eq!(tail.len(), 4);
        assert!(genome.substring(40, 1).is_none());
    }

    #[test]
    fn mark_contig_alt_by_name() {
        let mut genome = two_contig_genome();
        assert!(genome.mark_contig_alt("chr1"));
        assert!(genome.is_alt_location(8));
        assert!(!genome.mark_contig_alt("chrMissing"));
    }

    #[test]
    fn non_acgt_bases_become_n() {
        let mut genome = Genome::with_padding(2);
        genome.add_contig("c", b"acgtRYK", false);
        genome.finish();
        assert_eq!(&genome.data()[2..9], b"ACGTNNN");
    }
}
