use std::cmp::Reverse;
use thiserror::Error;

/// One group of agents within a partition, as local indices into the
/// enclosing instance. Kept sorted ascending by construction.
pub type Block = Vec<usize>;

/// An ordered sequence of disjoint, non-empty blocks covering `0..n`
/// exactly once. Overlaps and gaps are rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    blocks: Vec<Block>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("block {0} is empty")]
    EmptyBlock(usize),
    #[error("agent {0} out of range for {1} agents")]
    OutOfRange(usize, usize),
    #[error("agent {0} appears in more than one block")]
    Overlap(usize),
    #[error("agent {0} is missing from the partition")]
    Gap(usize),
}

impl Partition {
    pub fn new(blocks: Vec<Block>, n: usize) -> Result<Self, PartitionError> {
        let mut seen = vec![false; n];
        for (bi, block) in blocks.iter().enumerate() {
            if block.is_empty() {
                return Err(PartitionError::EmptyBlock(bi));
            }
            for &agent in block {
                if agent >= n {
                    return Err(PartitionError::OutOfRange(agent, n));
                }
                if seen[agent] {
                    return Err(PartitionError::Overlap(agent));
                }
                seen[agent] = true;
            }
        }
        if let Some(agent) = seen.iter().position(|&s| !s) {
            return Err(PartitionError::Gap(agent));
        }
        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// True for the single block containing all `n` agents. The generator
    /// never emits it; the search checks anyway before recursing.
    pub fn is_whole(&self, n: usize) -> bool {
        self.blocks.len() == 1 && self.blocks[0].len() == n
    }
}

/// Every set partition of `0..n` except the trivial all-in-one-block one,
/// ordered by non-increasing block count (finest first). The count is
/// Bell(n) - 1, which grows super-exponentially: callers must keep n small
/// (tens, not hundreds) for enumeration to stay tractable.
///
/// The order is deterministic for a fixed n: construction order is fixed and
/// the sort is stable.
pub fn all_partitions(n: usize) -> Vec<Partition> {
    if n == 0 {
        return Vec::new();
    }
    let mut raw = partitions_from(0, n);
    raw.retain(|p| p.len() != 1);
    raw.sort_by_key(|p| Reverse(p.len()));
    // Construction yields exact covers of 0..n, so the validated constructor
    // is bypassed here.
    raw.into_iter().map(|blocks| Partition { blocks }).collect()
}

/// Partitions of the element set `first..n`: take each partition of the rest
/// and either add `first` as a new singleton block or insert it into each
/// existing block in turn.
fn partitions_from(first: usize, n: usize) -> Vec<Vec<Block>> {
    if first == n {
        return vec![vec![]];
    }
    let rest = partitions_from(first + 1, n);
    let mut result = Vec::new();
    for p in &rest {
        let mut with_singleton = Vec::with_capacity(p.len() + 1);
        with_singleton.push(vec![first]);
        with_singleton.extend(p.iter().cloned());
        result.push(with_singleton);
        for i in 0..p.len() {
            let mut q = p.clone();
            q[i].insert(0, first);
            result.push(q);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bell numbers for n = 0..=7.
    const BELL: [usize; 8] = [1, 1, 2, 5, 15, 52, 203, 877];

    #[test]
    fn counts_match_bell_minus_one() {
        for n in 1..=7 {
            assert_eq!(all_partitions(n).len(), BELL[n] - 1, "n = {}", n);
        }
        assert_eq!(all_partitions(0).len(), 0);
    }

    #[test]
    fn every_partition_is_an_exact_cover() {
        for n in 1..=6 {
            for p in all_partitions(n) {
                Partition::new(p.blocks().to_vec(), n).expect("generated partition must validate");
            }
        }
    }

    #[test]
    fn ordered_finest_first() {
        for n in 2..=6 {
            let ps = all_partitions(n);
            assert_eq!(ps[0].num_blocks(), n, "first must be all singletons");
            for w in ps.windows(2) {
                assert!(w[0].num_blocks() >= w[1].num_blocks());
            }
        }
    }

    #[test]
    fn whole_set_partition_is_excluded() {
        for n in 1..=6 {
            assert!(all_partitions(n).iter().all(|p| !p.is_whole(n)));
        }
    }

    #[test]
    fn enumeration_is_deterministic() {
        assert_eq!(all_partitions(5), all_partitions(5));
    }

    #[test]
    fn three_agents_enumerates_expected_partitions() {
        let ps = all_partitions(3);
        let blocks: Vec<_> = ps.iter().map(|p| p.blocks().to_vec()).collect();
        assert_eq!(
            blocks,
            vec![
                vec![vec![0], vec![1], vec![2]],
                vec![vec![0, 1], vec![2]],
                vec![vec![1], vec![0, 2]],
                vec![vec![0], vec![1, 2]],
            ]
        );
    }

    #[test]
    fn construction_rejects_bad_shapes() {
        assert_eq!(
            Partition::new(vec![vec![0], vec![]], 1),
            Err(PartitionError::EmptyBlock(1))
        );
        assert_eq!(
            Partition::new(vec![vec![0, 2]], 2),
            Err(PartitionError::OutOfRange(2, 2))
        );
        assert_eq!(
            Partition::new(vec![vec![0, 1], vec![1]], 2),
            Err(PartitionError::Overlap(1))
        );
        assert_eq!(
            Partition::new(vec![vec![0], vec![2]], 3),
            Err(PartitionError::Gap(1))
        );
        assert!(Partition::new(vec![vec![1], vec![0, 2]], 3).is_ok());
    }
}
