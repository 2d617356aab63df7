// Candidate bookkeeping: the epoch-reset hash table, the element pool, and
// the weight-bucket priority lists.
//
// Clearing the hash table between reads would dwarf the alignment itself,
// so every bucket anchor carries an epoch tag and the whole table is
// invalidated by bumping the aligner's epoch. Elements live in a pool sized
// at construction and are linked by u32 indices, never pointers: each element
// sits on one hash-bucket chain and (while its weight qualifies) in exactly
// one weight list.

use crate::genome::GenomeLocation;
use crate::read::Direction;

/// Width of the genome window one element covers. Nearby candidates that
/// differ only by small indels land in the same element and merge there.
/// Must be even and at most 64 (the candidate bitmasks are u64).
#[cfg(not(feature = "long-reads"))]
pub const MAX_MERGE_DIST: usize = 48;
#[cfg(feature = "long-reads")]
pub const MAX_MERGE_DIST: usize = 64;

/// Candidate score sentinel: not scored yet.
pub const UNSCORED: u16 = 0xffff;

const NULL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub score: u16,
    pub seed_offset: u16,
    pub match_probability: f64,
    pub orig_genome_location: GenomeLocation,
}

impl Candidate {
    const EMPTY: Candidate = Candidate {
        score: UNSCORED,
        seed_offset: 0,
        match_probability: 0.0,
        orig_genome_location: 0,
    };
}

#[derive(Debug, Clone)]
pub struct HashTableElement {
    // Weight-bucket doubly-linked list.
    weight_next: u32,
    weight_prev: u32,
    in_weight_list: bool,
    // Hash-bucket singly-linked chain.
    next: u32,

    /// Bit set for each in-use candidate slot within the merge window.
    pub candidates_used: u64,
    /// Subset of `candidates_used` that has been scored.
    pub candidates_scored: u64,

    pub base_genome_location: GenomeLocation,
    pub direction: Direction,
    pub weight: u32,
    pub lowest_possible_score: u32,

    // Best result seen inside this element, for nearby-match probability
    // re-attribution and indel merging.
    pub best_score: u16,
    pub best_ag_score: i32,
    pub best_score_genome_location: GenomeLocation,
    pub best_score_orig_genome_location: GenomeLocation,
    pub match_probability_for_best_score: f64,

    pub candidates: [Candidate; MAX_MERGE_DIST],
}

impl HashTableElement {
    fn empty() -> HashTableElement {
        HashTableElement {
            weight_next: NULL,
            weight_prev: NULL,
            in_weight_list: false,
            next: NULL,
            candidates_used: 0,
            candidates_scored: 0,
            base_genome_location: 0,
            direction: Direction::Forward,
            weight: 0,
            lowest_possible_score: 0,
            best_score: UNSCORED,
            best_ag_score: i32::MIN,
            best_score_genome_location: 0,
            best_score_orig_genome_location: 0,
            match_probability_for_best_score: 0.0,
            candidates: [Candidate::EMPTY; MAX_MERGE_DIST],
        }
    }

    fn init(&mut self, base: GenomeLocation, direction: Direction, lowest_possible_score: u32) {
        self.weight_next = NULL;
        self.weight_prev = NULL;
        self.in_weight_list = false;
        self.next = NULL;
        self.candidates_used = 0;
        self.candidates_scored = 0;
        self.base_genome_location = base;
        self.direction = direction;
        self.weight = 0;
        self.lowest_possible_score = lowest_possible_score;
        self.best_score = UNSCORED;
        self.best_ag_score = i32::MIN;
        self.best_score_genome_location = 0;
        self.best_score_orig_genome_location = 0;
        self.match_probability_for_best_score = 0.0;
    }

    /// Bits still awaiting a score.
    #[inline]
    pub fn unscored_candidates(&self) -> u64 {
        self.candidates_used & !self.candidates_scored
    }
}

#[derive(Debug, Clone, Copy)]
struct HashTableAnchor {
    element: u32,
    epoch: u64,
}

/// What a seed hit did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedHitDisposition {
    NewElement,
    NewCandidate,
    Revote,
}

/// The element pool was sized from the configuration; running out means the
/// configuration was violated, not the input.
#[derive(Debug)]
pub struct PoolExhausted;

pub struct CandidateTable {
    epoch: u64,
    pool: Vec<HashTableElement>,
    n_used: u32,
    /// Direction-major anchor arrays: `dir * table_size + slot`.
    anchors: Vec<HashTableAnchor>,
    table_size: usize,
    weight_heads: Vec<u32>,
    highest_used_weight_list: u32,
}

impl CandidateTable {
    /// `max_hits * max_seeds` bounds the candidates one direction can admit;
    /// the table is oversized 2x to keep the deliberately weak hash cheap.
    pub fn new(max_hits: usize, max_seeds: usize) -> CandidateTable {
        let pool_size = max_hits * max_seeds * 2;
        let table_size = (2 * max_hits * max_seeds).next_power_of_two();
        let num_weight_lists = max_seeds + 1;
        CandidateTable {
            epoch: 0,
            pool: vec![HashTableElement::empty(); pool_size],
            n_used: 0,
            anchors: vec![
                HashTableAnchor {
                    element: NULL,
                    epoch: 0,
                };
                2 * table_size
            ],
            table_size,
            weight_heads: vec![NULL; num_weight_lists],
            highest_used_weight_list: 0,
        }
    }

    /// Bytes of pooled storage; equals what construction allocated.
    pub fn memory_footprint(&self) -> usize {
        self.pool.capacity() * std::mem::size_of::<HashTableElement>()
            + self.anchors.capacity() * std::mem::size_of::<HashTableAnchor>()
            + self.weight_heads.capacity() * std::mem::size_of::<u32>()
    }

    /// O(1) logical reset: stale anchors fail the epoch comparison.
    pub fn begin_read(&mut self) {
        self.epoch += 1;
        self.n_used = 0;
        self.weight_heads.fill(NULL);
        self.highest_used_weight_list = 0;
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn elements_in_use(&self) -> usize {
        self.n_used as usize
    }

    #[inline]
    pub fn element(&self, idx: u32) -> &HashTableElement {
        &self.pool[idx as usize]
    }

    #[inline]
    pub fn element_mut(&mut self, idx: u32) -> &mut HashTableElement {
        &mut self.pool[idx as usize]
    }

    #[inline]
    fn decompose(location: GenomeLocation) -> (GenomeLocation, u32) {
        let low = location % MAX_MERGE_DIST as u64;
        (location - low, low as u32)
    }

    // A single multiply; the oversized bucket count absorbs the collisions.
    #[inline]
    fn slot(&self, base: GenomeLocation, direction: Direction) -> usize {
        let key = (base / MAX_MERGE_DIST as u64).wrapping_mul(131);
        direction.index() * self.table_size + (key as usize & (self.table_size - 1))
    }

    pub fn find_element(&self, location: GenomeLocation, direction: Direction) -> Option<u32> {
        let (base, _) = Self::decompose(location);
        let anchor = self.anchors[self.slot(base, direction)];
        if anchor.epoch != self.epoch {
            return None;
        }
        let mut idx = anchor.element;
        while idx != NULL {
            let element = &self.pool[idx as usize];
            if element.base_genome_location == base {
                return Some(idx);
            }
            idx = element.next;
        }
        None
    }

    /// Record one seed hit at `location`: allocate the element and/or
    /// candidate slot as needed, and add this seed's vote to the element's
    /// weight.
    pub fn note_seed_hit(
        &mut self,
        location: GenomeLocation,
        direction: Direction,
        lowest_possible_score: u32,
        seed_offset: u16,
    ) -> Result<(u32, SeedHitDisposition), PoolExhausted> {
        let (base, bit) = Self::decompose(location);

        if let Some(idx) = self.find_element(location, direction) {
            let mask = 1u64 << bit;
            let element = &mut self.pool[idx as usize];
            let disposition = if element.candidates_used & mask == 0 {
                element.candidates_used |= mask;
                element.candidates[bit as usize] = Candidate {
                    score: UNSCORED,
                    seed_offset,
                    match_probability: 0.0,
                    orig_genome_location: location,
                };
                SeedHitDisposition::NewCandidate
            } else {
                SeedHitDisposition::Revote
            };
            self.increment_weight(idx);
            return Ok((idx, disposition));
        }

        if self.n_used as usize >= self.pool.len() {
            return Err(PoolExhausted);
        }
        let idx = self.n_used;
        self.n_used += 1;

        let slot = self.slot(base, direction);
        let anchor = self.anchors[slot];
        let chain_head = if anchor.epoch == self.epoch {
            anchor.element
        } else {
            NULL
        };

        let element = &mut self.pool[idx as usize];
        element.init(base, direction, lowest_possible_score);
        element.next = chain_head;
        element.candidates_used = 1u64 << bit;
        element.candidates[bit as usize] = Candidate {
            score: UNSCORED,
            seed_offset,
            match_probability: 0.0,
            orig_genome_location: location,
        };
        self.anchors[slot] = HashTableAnchor {
            element: idx,
            epoch: self.epoch,
        };
        self.increment_weight(idx);
        Ok((idx, SeedHitDisposition::NewElement))
    }

    /// Move the element one weight bucket up (relinking it if a scoring pass
    /// already drained it; a later vote re-queues the element).
    pub fn increment_weight(&mut self, idx: u32) {
        self.unlink_from_weight_list(idx);
        let max_weight = self.weight_heads.len() as u32 - 1;
        let element = &mut self.pool[idx as usize];
        element.weight = (element.weight + 1).min(max_weight);
        let weight = element.weight;
        self.link_into_weight_list(idx, weight);
    }

    fn link_into_weight_list(&mut self, idx: u32, weight: u32) {
        let head = self.weight_heads[weight as usize];
        {
            let element = &mut self.pool[idx as usize];
            element.weight_prev = NULL;
            element.weight_next = head;
            element.in_weight_list = true;
        }
        if head != NULL {
            self.pool[head as usize].weight_prev = idx;
        }
        self.weight_heads[weight as usize] = idx;
        if weight > self.highest_used_weight_list {
            self.highest_used_weight_list = weight;
        }
    }

    fn unlink_from_weight_list(&mut self, idx: u32) {
        let (prev, next, weight, linked) = {
            let element = &self.pool[idx as usize];
            (
                element.weight_prev,
                element.weight_next,
                element.weight,
                element.in_weight_list,
            )
        };
        if !linked {
            return;
        }
        if prev != NULL {
            self.pool[prev as usize].weight_next = next;
        } else {
            self.weight_heads[weight as usize] = next;
        }
        if next != NULL {
            self.pool[next as usize].weight_prev = prev;
        }
        let element = &mut self.pool[idx as usize];
        element.weight_prev = NULL;
        element.weight_next = NULL;
        element.in_weight_list = false;
    }

    /// Weight of the heaviest queued element with weight at least
    /// `min_weight`, without popping it.
    pub fn peek_highest_weight(&self, min_weight: u32) -> Option<u32> {
        let mut list = self.highest_used_weight_list;
        loop {
            if self.weight_heads[list as usize] != NULL {
                let weight = self.pool[self.weight_heads[list as usize] as usize].weight;
                return if weight >= min_weight {
                    Some(weight)
                } else {
                    None
                };
            }
            if list == 0 || list <= min_weight {
                return None;
            }
            list -= 1;
        }
    }

    /// Pop the heaviest element with weight at least `min_weight`, or `None`
    /// when every remaining list below the cursor is empty or too light.
    pub fn pop_highest(&mut self, min_weight: u32) -> Option<u32> {
        loop {
            let head = self.weight_heads[self.highest_used_weight_list as usize];
            if head != NULL {
                if self.pool[head as usize].weight < min_weight {
                    return None;
                }
                self.unlink_from_weight_list(head);
                return Some(head);
            }
            if self.highest_used_weight_list == 0 || self.highest_used_weight_list <= min_weight {
                return None;
            }
            self.highest_used_weight_list -= 1;
        }
    }
}

/// One bit per read offset, recording which seeds were already applied.
pub struct SeedUsedBitmap {
    words: Vec<u64>,
}

impl SeedUsedBitmap {
    pub fn new(max_read_size: usize) -> SeedUsedBitmap {
        SeedUsedBitmap {
            words: vec![0; max_read_size / 64 + 1],
        }
    }

    /// Reset is O(readLen/8): only the words covering this read are touched.
    pub fn clear(&mut self, read_len: usize) {
        let words = (read_len / 64 + 1).min(self.words.len());
        self.words[..words].fill(0);
    }

    #[inline]
    pub fn is_set(&self, offset: usize) -> bool {
        self.words[offset / 64] & (1 << (offset % 64)) != 0
    }

    #[inline]
    pub fn set(&mut self, offset: usize) {
        self.words[offset / 64] |= 1 << (offset % 64);
    }
}
