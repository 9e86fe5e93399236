//! Parallel key generation over shards of the corpus.
//!
//! Normalization and key generation are pure per name, so the corpus is cut
//! into fixed-size shards and fanned out over a bounded worker pool. Results
//! are slotted back by shard index, so output order always equals input order
//! and the single-threaded union-find merge that follows is deterministic.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::error::BuildError;
use crate::keys::{KeyGenerator, KeySet};
use crate::normalize::normalize;

struct Job {
    shard: usize,
    names: Vec<String>,
}

struct ShardOutput {
    shard: usize,
    keys: Vec<KeySet>,
}

/// Worker pool for one key-generation pass.
///
/// The job queue is closed once every shard is submitted; workers drain it
/// and exit, so a lost worker surfaces as a disconnect rather than a hang.
struct ShardPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ShardPool {
    fn start(
        workers: usize,
        queue_capacity: usize,
        generator: KeyGenerator,
        results: &Sender<ShardOutput>,
    ) -> Result<Self, BuildError> {
        let workers = workers.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity.max(1));

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let results = results.clone();
            let handle = thread::Builder::new()
                .name(format!("player-registry-shard-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        let keys = job.names.iter().map(|n| generator.generate(&normalize(n))).collect();
                        if results.send(ShardOutput { shard: job.shard, keys }).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| BuildError::WorkerSpawn {
                    reason: e.to_string(),
                })?;
            handles.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            workers: handles,
        })
    }

    fn submit(&self, job: Job) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(job).is_ok())
    }

    /// Closes the queue; workers finish what is queued and exit.
    fn close(&mut self) {
        self.tx.take();
    }

    fn shutdown(mut self) {
        self.close();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ShardPool {
    fn drop(&mut self) {
        self.close();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Computes key sets for every name, in input order.
///
/// Runs inline when `workers <= 1` or the corpus fits in one shard.
pub(crate) fn generate_all<S: AsRef<str>>(
    names: &[S],
    generator: KeyGenerator,
    workers: usize,
    shard_size: usize,
    queue_capacity: usize,
) -> Result<Vec<KeySet>, BuildError> {
    let shard_size = shard_size.max(1);
    if workers <= 1 || names.len() <= shard_size {
        return Ok(names
            .iter()
            .map(|n| generator.generate(&normalize(n.as_ref())))
            .collect());
    }

    let shard_count = names.len().div_ceil(shard_size);
    debug!(names = names.len(), shards = shard_count, workers, "generating keys on shard pool");

    // Sized to hold every result, so workers never block on reply.
    let (results_tx, results_rx) = bounded::<ShardOutput>(shard_count);
    let mut pool = ShardPool::start(workers.min(shard_count), queue_capacity, generator, &results_tx)?;
    drop(results_tx);

    let mut submitted = 0usize;
    for (shard, chunk) in names.chunks(shard_size).enumerate() {
        let job = Job {
            shard,
            names: chunk.iter().map(|n| n.as_ref().to_string()).collect(),
        };
        if !pool.submit(job) {
            break;
        }
        submitted += 1;
    }
    pool.close();

    let mut slots: Vec<Option<Vec<KeySet>>> = (0..shard_count).map(|_| None).collect();
    let mut completed = 0usize;
    while completed < shard_count {
        match results_rx.recv() {
            Ok(output) => {
                slots[output.shard] = Some(output.keys);
                completed += 1;
            }
            Err(_) => break,
        }
    }
    pool.shutdown();

    if completed < shard_count || submitted < shard_count {
        return Err(BuildError::PoolDisconnected {
            completed,
            expected: shard_count,
        });
    }

    let mut out = Vec::with_capacity(names.len());
    for slot in slots {
        match slot {
            Some(keys) => out.extend(keys),
            None => {
                return Err(BuildError::PoolDisconnected {
                    completed,
                    expected: shard_count,
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Player{i} Surname{}", i % 7)).collect()
    }

    #[test]
    fn test_inline_path_matches_input_order() {
        let names = vec!["Anna Lee", "", "John Smith"];
        let keys = generate_all(&names, KeyGenerator::default(), 1, 16, 4).unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys[0].contains("annalee"));
        assert!(keys[1].is_empty());
        assert!(keys[2].contains("smithjohn"));
    }

    #[test]
    fn test_pool_matches_inline() {
        let names = corpus(500);
        let inline = generate_all(&names, KeyGenerator::default(), 1, 16, 4).unwrap();
        let pooled = generate_all(&names, KeyGenerator::default(), 4, 16, 2).unwrap();
        assert_eq!(inline, pooled);
    }

    #[test]
    fn test_pool_with_ragged_last_shard() {
        let names = corpus(33);
        let pooled = generate_all(&names, KeyGenerator::default(), 3, 10, 1).unwrap();
        assert_eq!(pooled.len(), 33);
        assert!(pooled[32].contains("player32surname4"));
    }

    #[test]
    fn test_more_workers_than_shards() {
        let names = corpus(5);
        let pooled = generate_all(&names, KeyGenerator::default(), 16, 2, 8).unwrap();
        assert_eq!(pooled.len(), 5);
    }
}
