//! Work partitions: which unit indices this process runs and how.
//!
//! Both backends run a pure `job(index)` over a subset of `0..total`; output
//! names are functions of the index, so partitions never coordinate.
#[cfg(feature = "parallel")]
use log::warn;
use std::env;

pub trait WorkPartition {
    /// Unit indices handled by this process, ascending.
    fn assigned(&self, total: usize) -> Vec<usize>;

    /// Run `job` for every assigned index; results are in index order.
    fn execute<T, F>(&self, total: usize, job: F) -> Vec<(usize, T)>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync;
}

/// Every unit in this process, spread over a thread pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreadPoolPartition {
    /// 0 uses every logical CPU.
    pub threads: usize,
}

impl ThreadPoolPartition {
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }
}

impl WorkPartition for ThreadPoolPartition {
    fn assigned(&self, total: usize) -> Vec<usize> {
        (0..total).collect()
    }

    fn execute<T, F>(&self, total: usize, job: F) -> Vec<(usize, T)>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            if self.threads != 1 {
                match execute_pooled(self.threads, total, &job) {
                    Ok(results) => return results,
                    Err(err) => warn!("thread pool unavailable ({err}), running sequentially"),
                }
            }
        }
        execute_sequential(self.assigned(total), job)
    }
}

#[cfg(feature = "parallel")]
fn execute_pooled<T, F>(
    threads: usize,
    total: usize,
    job: &F,
) -> Result<Vec<(usize, T)>, rayon::ThreadPoolBuildError>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    use rayon::prelude::*;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    Ok(pool.install(|| (0..total).into_par_iter().map(|i| (i, job(i))).collect()))
}

fn execute_sequential<T, F>(indices: Vec<usize>, job: F) -> Vec<(usize, T)>
where
    F: Fn(usize) -> T,
{
    indices.into_iter().map(|i| (i, job(i))).collect()
}

/// Rank `rank` of `size` independent processes; takes indices
/// `rank, rank + size, ...`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankPartition {
    pub rank: usize,
    pub size: usize,
}

/// Environment variables launchers use for (rank, size), in lookup order.
const RANK_ENV: [(&str, &str); 3] = [
    ("OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI_RANK", "PMI_SIZE"),
    ("SLURM_PROCID", "SLURM_NTASKS"),
];

impl RankPartition {
    /// `None` for `size == 0` or `rank >= size`.
    pub fn new(rank: usize, size: usize) -> Option<Self> {
        (size > 0 && rank < size).then_some(Self { rank, size })
    }

    /// Rank and size from the first launcher variable pair that is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        RANK_ENV.iter().find_map(|(rank_key, size_key)| {
            let rank = lookup(rank_key)?.trim().parse().ok()?;
            let size = lookup(size_key)?.trim().parse().ok()?;
            Self::new(rank, size)
        })
    }

    /// Number of units this rank owns out of `total`.
    pub fn share(&self, total: usize) -> usize {
        total / self.size + usize::from(total % self.size > self.rank)
    }
}

impl WorkPartition for RankPartition {
    fn assigned(&self, total: usize) -> Vec<usize> {
        (self.rank..total).step_by(self.size).collect()
    }

    fn execute<T, F>(&self, total: usize, job: F) -> Vec<(usize, T)>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        execute_sequential(self.assigned(total), job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn ranks_cover_every_index_exactly_once() {
        for size in 1..6 {
            for total in [0usize, 1, 7, 12] {
                let mut seen = vec![0; total];
                for rank in 0..size {
                    let p = RankPartition::new(rank, size).unwrap();
                    let mine = p.assigned(total);
                    assert_eq!(mine.len(), p.share(total));
                    for i in mine {
                        assert_eq!(i % size, rank);
                        seen[i] += 1;
                    }
                }
                assert!(seen.iter().all(|&c| c == 1), "size={size} total={total}");
            }
        }
    }

    #[test]
    fn invalid_rank_is_rejected() {
        assert!(RankPartition::new(0, 0).is_none());
        assert!(RankPartition::new(3, 3).is_none());
    }

    #[test]
    fn environment_lookup_takes_the_first_complete_pair() {
        let vars: HashMap<&str, &str> = [
            ("OMPI_COMM_WORLD_RANK", "2"),
            ("PMI_RANK", "1"),
            ("PMI_SIZE", "4"),
        ]
        .into_iter()
        .collect();
        let p = RankPartition::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(p, RankPartition { rank: 1, size: 4 });
        assert!(RankPartition::from_lookup(|_| None).is_none());
    }

    #[test]
    fn thread_pool_runs_everything_in_order() {
        for threads in [0, 1, 3] {
            let out = ThreadPoolPartition::new(threads).execute(10, |i| i * i);
            let expected: Vec<_> = (0..10).map(|i| (i, i * i)).collect();
            assert_eq!(out, expected);
        }
    }
}
