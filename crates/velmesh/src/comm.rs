//! Message passing between worker threads.
//!
//! Every worker owns a [`Communicator`] holding one point-to-point channel to each other
//! worker. Channels are FIFO per ordered pair, so as long as all workers issue the same
//! sequence of collective operations, messages match up without tags. A worker that fails
//! drops its channels; peers waiting on it observe the disconnect as
//! [`Error::Communication`], which makes the whole run fail.
use std::any::Any;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{Error, Result};

type Packet = Box<dyn Any + Send>;

/// One worker's endpoint in a fully connected channel mesh.
pub struct Communicator {
    rank: usize,
    size: usize,
    /// Outgoing channels indexed by destination rank.
    outboxes: Vec<Sender<Packet>>,
    /// Incoming channels indexed by source rank.
    inboxes: Vec<Receiver<Packet>>,
}

impl Communicator {
    /// Creates `size` connected communicators, ordered by rank.
    pub fn mesh(size: usize) -> Vec<Communicator> {
        let mut outboxes: Vec<Vec<Sender<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<Receiver<Packet>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        for src_outboxes in outboxes.iter_mut() {
            for dst_inboxes in inboxes.iter_mut() {
                let (tx, rx) = unbounded();
                src_outboxes.push(tx);
                dst_inboxes.push(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| Communicator {
                rank,
                size,
                outboxes,
                inboxes,
            })
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    /// Sends `value` to worker `dest`.
    pub fn send<T: Send + 'static>(&self, dest: usize, value: T) -> Result<()> {
        let outbox = self
            .outboxes
            .get(dest)
            .ok_or_else(|| Error::Communication(format!("no worker with rank {dest}")))?;
        outbox
            .send(Box::new(value))
            .map_err(|_| Error::Communication(format!("worker {dest} is no longer running")))
    }

    /// Receives the next message from worker `src`, which must be of type `T`.
    pub fn recv<T: 'static>(&self, src: usize) -> Result<T> {
        let inbox = self
            .inboxes
            .get(src)
            .ok_or_else(|| Error::Communication(format!("no worker with rank {src}")))?;
        let packet = inbox
            .recv()
            .map_err(|_| Error::Communication(format!("worker {src} disconnected")))?;
        packet.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            Error::Communication(format!(
                "worker {} received an unexpected message type from worker {src}",
                self.rank
            ))
        })
    }

    /// Sends every `(dest, value)` pair, then receives one message from each rank in `sources`.
    pub fn exchange<T: Send + 'static>(
        &self,
        outgoing: Vec<(usize, T)>,
        sources: &[usize],
    ) -> Result<Vec<(usize, T)>> {
        for (dest, value) in outgoing {
            self.send(dest, value)?;
        }
        sources
            .iter()
            .map(|&src| self.recv(src).map(|value| (src, value)))
            .collect()
    }

    /// Sends one message to every other worker and receives one from each of them.
    ///
    /// `outgoing[r]` goes to rank `r`; the entry for this worker's own rank is returned in place.
    pub fn all_to_all<T: Send + 'static>(&self, outgoing: Vec<T>) -> Result<Vec<T>> {
        if outgoing.len() != self.size {
            return Err(Error::Other(format!(
                "all_to_all expects {} messages, got {}",
                self.size,
                outgoing.len()
            )));
        }
        let mut own = None;
        for (dest, value) in outgoing.into_iter().enumerate() {
            if dest == self.rank {
                own = Some(value);
            } else {
                self.send(dest, value)?;
            }
        }
        let mut received = Vec::with_capacity(self.size);
        for src in 0..self.size {
            if src == self.rank {
                received.push(own.take().ok_or_else(|| {
                    Error::Other("all_to_all lost the local message".to_string())
                })?);
            } else {
                received.push(self.recv(src)?);
            }
        }
        Ok(received)
    }

    /// Collects one value from every worker, ordered by rank, on every worker.
    pub fn all_gather<T: Clone + Send + 'static>(&self, value: T) -> Result<Vec<T>> {
        for dest in (0..self.size).filter(|&r| r != self.rank) {
            self.send(dest, value.clone())?;
        }
        let mut all = Vec::with_capacity(self.size);
        for src in 0..self.size {
            if src == self.rank {
                all.push(value.clone());
            } else {
                all.push(self.recv(src)?);
            }
        }
        Ok(all)
    }

    /// Folds one value per worker with `op` in rank order. Every worker gets the same result.
    pub fn all_reduce<T, F>(&self, value: T, op: F) -> Result<T>
    where
        T: Clone + Send + 'static,
        F: Fn(T, T) -> T,
    {
        self.all_gather(value)?
            .into_iter()
            .reduce(op)
            .ok_or_else(|| Error::Communication("reduction over zero workers".to_string()))
    }

    pub fn all_reduce_max(&self, value: f64) -> Result<f64> {
        self.all_reduce(value, f64::max)
    }

    pub fn all_reduce_min(&self, value: f64) -> Result<f64> {
        self.all_reduce(value, f64::min)
    }

    pub fn all_reduce_sum(&self, value: f64) -> Result<f64> {
        self.all_reduce(value, |a, b| a + b)
    }

    pub fn all_reduce_sum_usize(&self, value: usize) -> Result<usize> {
        self.all_reduce(value, |a, b| a + b)
    }

    /// Collects one value per worker on `root`. Other workers get `None`.
    pub fn gather<T: Send + 'static>(&self, root: usize, value: T) -> Result<Option<Vec<T>>> {
        if self.rank != root {
            self.send(root, value)?;
            return Ok(None);
        }
        let mut own = Some(value);
        let mut all = Vec::with_capacity(self.size);
        for src in 0..self.size {
            if src == root {
                all.extend(own.take());
            } else {
                all.push(self.recv(src)?);
            }
        }
        Ok(Some(all))
    }

    /// Distributes `value` from `root` to every worker.
    pub fn broadcast<T: Clone + Send + 'static>(&self, root: usize, value: Option<T>) -> Result<T> {
        if self.rank == root {
            let value = value
                .ok_or_else(|| Error::Other("broadcast root has no value to send".to_string()))?;
            for dest in (0..self.size).filter(|&r| r != root) {
                self.send(dest, value.clone())?;
            }
            Ok(value)
        } else {
            self.recv(root)
        }
    }
}

/// Runs `root` on the calling thread as rank 0 and `peer` on `size - 1` scoped threads.
///
/// Returns the root's result. When any worker fails, the error reported by that worker is
/// preferred over the disconnects it caused elsewhere.
pub fn run_workers<R, F, G>(size: usize, root: F, peer: G) -> Result<R>
where
    F: FnOnce(Communicator) -> Result<R>,
    G: Fn(Communicator) -> Result<()> + Sync,
{
    if size == 0 {
        return Err(Error::InvalidConfig("worker count must be > 0".into()));
    }

    let mut comms = Communicator::mesh(size);
    let root_comm = comms.remove(0);
    let peer = &peer;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(comms.len());
        for comm in comms {
            let rank = comm.rank();
            let handle = thread::Builder::new()
                .name(format!("velmesh-worker-{rank}"))
                .spawn_scoped(scope, move || peer(comm))?;
            handles.push((rank, handle));
        }

        let root_result = root(root_comm);

        let mut peer_errors = Vec::new();
        for (rank, handle) in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => peer_errors.push(e),
                Err(_) => {
                    peer_errors.push(Error::Communication(format!("worker {rank} panicked")))
                }
            }
        }

        match root_result {
            Ok(value) if peer_errors.is_empty() => Ok(value),
            Ok(_) => Err(pick_root_cause(peer_errors)),
            Err(e) if !e.is_communication() => Err(e),
            Err(e) => {
                peer_errors.insert(0, e);
                Err(pick_root_cause(peer_errors))
            }
        }
    })
}

fn pick_root_cause(mut errors: Vec<Error>) -> Error {
    match errors.iter().position(|e| !e.is_communication()) {
        Some(pos) => errors.swap_remove(pos),
        None => errors
            .into_iter()
            .next()
            .unwrap_or_else(|| Error::Communication("unknown worker failure".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_assigns_ranks_in_order() {
        let comms = Communicator::mesh(3);
        let ranks: Vec<_> = comms.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(comms.iter().all(|c| c.size() == 3));
        assert!(comms[0].is_root());
    }

    #[test]
    fn reductions_agree_on_every_worker() {
        let result = run_workers(
            4,
            |comm| {
                let max = comm.all_reduce_max(comm.rank() as f64)?;
                let sum = comm.all_reduce_sum(1.5)?;
                let min = comm.all_reduce_min(10.0 - comm.rank() as f64)?;
                Ok((max, sum, min))
            },
            |comm| {
                let max = comm.all_reduce_max(comm.rank() as f64)?;
                let sum = comm.all_reduce_sum(1.5)?;
                let min = comm.all_reduce_min(10.0 - comm.rank() as f64)?;
                assert_eq!((max, sum, min), (3.0, 6.0, 7.0));
                Ok(())
            },
        )
        .expect("run succeeds");
        assert_eq!(result, (3.0, 6.0, 7.0));
    }

    #[test]
    fn exchange_passes_messages_between_neighbours() {
        let ring = |comm: &Communicator| -> Result<Vec<(usize, String)>> {
            let next = (comm.rank() + 1) % comm.size();
            let prev = (comm.rank() + comm.size() - 1) % comm.size();
            comm.exchange(vec![(next, format!("from {}", comm.rank()))], &[prev])
        };
        let got = run_workers(
            3,
            |comm| ring(&comm),
            |comm| {
                let got = ring(&comm)?;
                let prev = (comm.rank() + 2) % 3;
                assert_eq!(got, vec![(prev, format!("from {prev}"))]);
                Ok(())
            },
        )
        .expect("run succeeds");
        assert_eq!(got, vec![(2, "from 2".to_string())]);
    }

    #[test]
    fn gather_and_broadcast_roundtrip() {
        let total = run_workers(
            3,
            |comm| {
                let all = comm.gather(0, vec![comm.rank()])?.expect("root gathers");
                let flat: Vec<usize> = all.into_iter().flatten().collect();
                comm.broadcast(0, Some(flat.iter().sum::<usize>()))
            },
            |comm| {
                assert!(comm.gather(0, vec![comm.rank()])?.is_none());
                assert_eq!(comm.broadcast::<usize>(0, None)?, 3);
                Ok(())
            },
        )
        .expect("run succeeds");
        assert_eq!(total, 3);
    }

    #[test]
    fn all_to_all_routes_by_destination() {
        let route = |comm: &Communicator| -> Result<Vec<usize>> {
            let outgoing = (0..comm.size()).map(|d| comm.rank() * 10 + d).collect();
            comm.all_to_all(outgoing)
        };
        let got = run_workers(
            3,
            |comm| route(&comm),
            |comm| {
                let got = route(&comm)?;
                let r = comm.rank();
                assert_eq!(got, vec![r, 10 + r, 20 + r]);
                Ok(())
            },
        )
        .expect("run succeeds");
        assert_eq!(got, vec![0, 10, 20]);
    }

    #[test]
    fn peer_failure_is_reported_over_disconnects() {
        let err = run_workers(
            3,
            |comm| comm.all_reduce_sum(1.0),
            |comm| {
                if comm.rank() == 2 {
                    return Err(Error::InvalidConfig("bad worker".into()));
                }
                comm.all_reduce_sum(1.0).map(|_| ())
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref m) if m == "bad worker"));
    }

    #[test]
    fn peer_panic_becomes_communication_error() {
        let err = run_workers(
            2,
            |comm| comm.recv::<u32>(1),
            |_comm| -> Result<()> { panic!("worker crashed") },
        )
        .unwrap_err();
        assert!(err.is_communication());
    }

    #[test]
    fn unexpected_message_type_is_rejected() {
        let comms = Communicator::mesh(2);
        comms[1].send(0, 5u8).unwrap();
        assert!(comms[0].recv::<String>(1).unwrap_err().is_communication());
    }

    #[test]
    fn zero_workers_is_invalid() {
        let err = run_workers(0, |_c| Ok(()), |_c| Ok(())).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
