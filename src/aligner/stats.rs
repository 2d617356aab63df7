// Counter sink for the aligner. The engine only ever increments these;
// callers read them after a batch and merge across worker threads.

#[derive(Debug, Default, Clone)]
pub struct AlignerStats {
    pub total_reads: u64,
    pub hash_table_lookups: u64,
    pub locations_scored_landau_vishkin: u64,
    pub locations_scored_affine_gap: u64,
    pub hits_ignored_because_of_too_high_popularity: u64,
    pub reads_ignored_because_of_too_many_ns: u64,
    pub reads_ignored_because_too_long: u64,
    pub reads_ignored_because_too_short: u64,
    pub indels_merged: u64,
    pub secondary_buffer_overflows: u64,
}

impl AlignerStats {
    pub fn merge(&mut self, other: &AlignerStats) {
        self.total_reads += other.total_reads;
        self.hash_table_lookups += other.hash_table_lookups;
        self.locations_scored_landau_vishkin += other.locations_scored_landau_vishkin;
        self.locations_scored_affine_gap += other.locations_scored_affine_gap;
        self.hits_ignored_because_of_too_high_popularity +=
            other.hits_ignored_because_of_too_high_popularity;
        self.reads_ignored_because_of_too_many_ns += other.reads_ignored_because_of_too_many_ns;
        self.reads_ignored_because_too_long += other.reads_ignored_because_too_long;
        self.reads_ignored_because_too_short += other.reads_ignored_because_too_short;
        self.indels_merged += other.indels_merged;
        self.secondary_buffer_overflows += other.secondary_buffer_overflows;
    }

    pub fn log_summary(&self) {
        log::info!(
            "aligner: {} reads, {} index lookups, {} LV scorings, {} affine-gap scorings",
            self.total_reads,
            self.hash_table_lookups,
            self.locations_scored_landau_vishkin,
            self.locations_scored_affine_gap
        );
        if self.reads_ignored_because_of_too_many_ns
            + self.reads_ignored_because_too_long
            + self.reads_ignored_because_too_short
            > 0
        {
            log::info!(
                "aligner: ignored reads: {} too many Ns, {} too long, {} too short",
                self.reads_ignored_because_of_too_many_ns,
                self.reads_ignored_because_too_long,
                self.reads_ignored_because_too_short
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_counters() {
        let mut a = AlignerStats::default();
        a.total_reads = 3;
        a.indels_merged = 1;
        let mut b = AlignerStats::default();
        b.total_reads = 2;
        b.hash_table_lookups = 10;
        a.merge(&b);
        assert_eq!(a.total_reads, 5);
        assert_eq!(a.hash_table_lookups, 10);
        assert_eq!(a.indels_merged, 1);
    }
}
