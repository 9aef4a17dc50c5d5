//! Rank-based message-passing backend
//!
//! A world of `size` ranks cooperates through exactly two collective
//! operations: a barrier after rank 0 resets the output tree, and a gather of
//! every rank's results to rank 0 at the end. Ranks never share mutable state;
//! each computes its own contiguous slice of the frame list from its rank index.
//!
//! [`Communicator`] is the seam for the transport. [`ThreadComm`] implements it
//! in-process, one OS thread per rank, over crossbeam channels.

use anyhow::{Context, Result, anyhow};
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Instant;
use thiserror::Error;

use super::{BatchJob, ExecutionBackend};
use crate::frames::partition_bounds;
use crate::processing::ObjectRecord;
use crate::storage::reset_directory;

/// Rank that resets the output tree and receives the gather
pub const ROOT_RANK: usize = 0;

/// Collective operation failures. These abort the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("rank world was aborted by another rank")]
    Aborted,

    #[error("rank {0} left the world before the gather completed")]
    Disconnected(usize),

    #[error("gather received a payload from unknown rank {0}")]
    UnknownRank(usize),
}

/// Collective operations available to a rank
pub trait Communicator {
    type Payload;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank has arrived
    fn barrier(&self) -> Result<(), CommError>;

    /// Poison the world so that the next barrier fails on every rank
    fn abort(&self);

    /// Send `value` to the root. The root gets every rank's value in rank
    /// order; other ranks get `None`.
    fn gather(&self, value: Self::Payload) -> Result<Option<Vec<Self::Payload>>, CommError>;
}

/// In-process communicator, one per rank thread
pub struct ThreadComm<T> {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
    aborted: Arc<AtomicBool>,
    gather_tx: Option<Sender<(usize, T)>>,
    gather_rx: Option<Receiver<(usize, T)>>,
}

impl<T: Send> ThreadComm<T> {
    /// Build a world of `size` communicators, indexed by rank
    pub fn world(size: usize) -> Vec<Self> {
        let size = size.max(1);
        let barrier = Arc::new(Barrier::new(size));
        let aborted = Arc::new(AtomicBool::new(false));
        let (tx, rx) = unbounded();

        let mut rx = Some(rx);
        (0..size)
            .map(|rank| {
                let is_root = rank == ROOT_RANK;
                Self {
                    rank,
                    size,
                    barrier: barrier.clone(),
                    aborted: aborted.clone(),
                    // The root holds no sender so a vanished rank is observable
                    gather_tx: (!is_root).then(|| tx.clone()),
                    gather_rx: if is_root { rx.take() } else { None },
                }
            })
            .collect()
    }
}

impl<T: Send> Communicator for ThreadComm<T> {
    type Payload = T;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.barrier.wait();
        if self.aborted.load(Ordering::SeqCst) {
            return Err(CommError::Aborted);
        }
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn gather(&self, value: T) -> Result<Option<Vec<T>>, CommError> {
        if let Some(tx) = &self.gather_tx {
            tx.send((self.rank, value))
                .map_err(|_| CommError::Disconnected(ROOT_RANK))?;
            return Ok(None);
        }

        let Some(rx) = &self.gather_rx else {
            return Err(CommError::Disconnected(ROOT_RANK));
        };

        let mut slots: Vec<Option<T>> = (0..self.size).map(|_| None).collect();
        slots[self.rank] = Some(value);

        for _ in 1..self.size {
            let (rank, payload) = rx.recv().map_err(|_| {
                let missing = slots.iter().position(Option::is_none).unwrap_or(ROOT_RANK);
                CommError::Disconnected(missing)
            })?;
            let slot = slots.get_mut(rank).ok_or(CommError::UnknownRank(rank))?;
            *slot = Some(payload);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(rank, slot)| slot.ok_or(CommError::Disconnected(rank)))
            .collect::<Result<Vec<T>, _>>()
            .map(Some)
    }
}

/// Per-rank payload: one record list per processed frame
type RankResults = Vec<Vec<ObjectRecord>>;

/// One rank's share of the batch.
///
/// Returns the gathered per-frame lists on the root and `None` elsewhere.
pub fn rank_main<C>(comm: &C, job: &BatchJob) -> Result<Option<RankResults>>
where
    C: Communicator<Payload = RankResults>,
{
    let started = Instant::now();
    let rank = comm.rank();

    if rank == ROOT_RANK
        && let Err(e) = reset_directory(&job.output_dir)
    {
        comm.abort();
        // Release the other ranks; they will see the abort
        let _ = comm.barrier();
        return Err(e).with_context(|| {
            format!("Failed to reset output directory {}", job.output_dir.display())
        });
    }

    comm.barrier()
        .with_context(|| format!("Rank {rank} failed at the start barrier"))?;

    let range = partition_bounds(job.files.len(), comm.size(), rank);
    let local_files = &job.files[range];
    tracing::debug!(rank, files = local_files.len(), "Rank assignment");

    let mut local = Vec::with_capacity(local_files.len());
    for file in local_files {
        let outcome = job.processor.process(file, &job.output_dir);
        job.reporter.file_finished(rank, file, &outcome);
        local.push(outcome.unwrap_or_default());
    }

    let gathered = comm
        .gather(local)
        .with_context(|| format!("Rank {rank} failed to gather results"))?;

    Ok(gathered.map(|all| {
        tracing::info!(
            ranks = comm.size(),
            "Total execution time: {:.3} seconds",
            started.elapsed().as_secs_f64()
        );
        all.into_iter().flatten().collect()
    }))
}

/// Message-passing backend over an in-process world of rank threads.
///
/// Rank 0 runs on the calling thread and is the coordinator.
#[derive(Debug, Clone)]
pub struct RankWorld {
    size: usize,
}

impl RankWorld {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl ExecutionBackend for RankWorld {
    fn name(&self) -> &'static str {
        "ranks"
    }

    fn run(&self, job: &BatchJob) -> Result<Vec<Vec<ObjectRecord>>> {
        let mut comms = ThreadComm::<RankResults>::world(self.size).into_iter();
        let root = comms
            .next()
            .ok_or_else(|| anyhow!("Rank world has no root rank"))?;

        tracing::debug!(ranks = self.size, files = job.files.len(), "Starting rank world");

        crossbeam::thread::scope(|s| -> Result<RankResults> {
            let handles: Vec<_> = comms
                .map(|comm| s.spawn(move |_| rank_main(&comm, job)))
                .collect();

            let root_result = rank_main(&root, job);
            // The root's sender-less comm must not outlive the gather
            drop(root);

            let mut peer_error = None;
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        peer_error.get_or_insert(e);
                    }
                    Err(_) => {
                        peer_error.get_or_insert(anyhow!("Rank {} panicked", index + 1));
                    }
                }
            }

            let gathered = root_result?;
            if let Some(e) = peer_error {
                return Err(e);
            }
            gathered.ok_or_else(|| anyhow!("Root rank returned no gathered results"))
        })
        .map_err(|_| anyhow!("Rank thread panicked during execution"))?
    }
}
