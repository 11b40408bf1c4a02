//! In-process cluster: each rank is an OS thread, messages travel over
//! channels.
//!
//! This runs the same SPMD program as the MPI backend without an MPI
//! installation, and is what the integration tests use to simulate several
//! processes.
//!
//! A rank's endpoint announces its departure to every peer when it is
//! dropped, whether the program returned or unwound. A rank still waiting on
//! a departed peer gets [`MatvecError::Communication`] instead of blocking.

use std::cell::RefCell;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use crate::collective::{
    check_count, check_layout, displacements, Collective, ROOT, TAG_BARRIER, TAG_DIMENSIONS,
    TAG_RESULT_DATA, TAG_VECTOR_DATA,
};
use crate::config::Dimensions;
use crate::error::{MatvecError, Result};

#[derive(Debug)]
enum Payload {
    Values(Vec<f64>),
    Dimensions(Dimensions),
    Token,
    // Last message a rank ever sends.
    Departed,
}

#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: u32,
    payload: Payload,
}

/// One rank's endpoint into a [`LocalCluster`].
pub struct LocalCollective {
    rank: usize,
    // No sender to our own inbox, so it disconnects once every peer is gone.
    peers: Vec<Option<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    // Messages that arrived before anyone asked for them.
    pending: RefCell<Vec<Envelope>>,
    departed: RefCell<Vec<usize>>,
}

impl LocalCollective {
    fn send(&self, dest: usize, tag: u32, payload: Payload) -> Result<()> {
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload,
        };
        let peer = self.peers[dest].as_ref().ok_or_else(|| {
            MatvecError::Communication(format!("rank {} cannot send to itself", dest))
        })?;
        peer.send(envelope).map_err(|_| {
            MatvecError::Communication(format!("rank {} is no longer reachable", dest))
        })
    }

    fn lost(&self, source: usize) -> MatvecError {
        MatvecError::Communication(format!(
            "rank {} left while rank {} was waiting on it",
            source, self.rank
        ))
    }

    /// Block until a message from `source` with `tag` arrives.
    ///
    /// Channels keep each sender's order, so anything `source` sent before
    /// departing is delivered before its departure is noticed.
    fn receive(&self, source: usize, tag: u32) -> Result<Payload> {
        {
            let mut pending = self.pending.borrow_mut();
            if let Some(pos) = pending
                .iter()
                .position(|m| m.source == source && m.tag == tag)
            {
                return Ok(pending.remove(pos).payload);
            }
        }
        if self.departed.borrow().contains(&source) {
            return Err(self.lost(source));
        }

        loop {
            let envelope = self.inbox.recv().map_err(|_| self.lost(source))?;
            if let Payload::Departed = envelope.payload {
                if envelope.source == source {
                    return Err(self.lost(source));
                }
                self.departed.borrow_mut().push(envelope.source);
                continue;
            }
            if envelope.source == source && envelope.tag == tag {
                return Ok(envelope.payload);
            }
            self.pending.borrow_mut().push(envelope);
        }
    }

    fn receive_values(&self, source: usize, tag: u32) -> Result<Vec<f64>> {
        match self.receive(source, tag)? {
            Payload::Values(values) => Ok(values),
            other => Err(MatvecError::Communication(format!(
                "expected values from rank {}, got {:?}",
                source, other
            ))),
        }
    }

    fn check_root(&self, root: usize) -> Result<()> {
        if root >= self.peers.len() {
            return Err(MatvecError::Communication(format!(
                "root {} outside communicator of size {}",
                root,
                self.peers.len()
            )));
        }
        Ok(())
    }
}

impl Drop for LocalCollective {
    fn drop(&mut self) {
        for peer in self.peers.iter().flatten() {
            // A peer that is already gone needs no notice.
            let _ = peer.send(Envelope {
                source: self.rank,
                tag: 0,
                payload: Payload::Departed,
            });
        }
    }
}

impl Collective for LocalCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    /// Every rank checks in with the root, then the root releases them all.
    fn barrier(&self) -> Result<()> {
        if self.rank != ROOT {
            self.send(ROOT, TAG_BARRIER, Payload::Token)?;
            self.receive(ROOT, TAG_BARRIER)?;
            return Ok(());
        }

        for source in 1..self.size() {
            self.receive(source, TAG_BARRIER)?;
        }
        for dest in 1..self.size() {
            self.send(dest, TAG_BARRIER, Payload::Token)?;
        }
        Ok(())
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<()> {
        self.check_root(root)?;
        if self.rank == root {
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.send(dest, TAG_VECTOR_DATA, Payload::Values(buf.to_vec()))?;
            }
            return Ok(());
        }

        let values = self.receive_values(root, TAG_VECTOR_DATA)?;
        if values.len() != buf.len() {
            return Err(MatvecError::Communication(format!(
                "broadcast of {} values into buffer of {}",
                values.len(),
                buf.len()
            )));
        }
        buf.copy_from_slice(&values);
        Ok(())
    }

    fn broadcast_dimensions(&self, dims: Dimensions, root: usize) -> Result<Dimensions> {
        self.check_root(root)?;
        if self.rank == root {
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.send(dest, TAG_DIMENSIONS, Payload::Dimensions(dims))?;
            }
            return Ok(dims);
        }

        match self.receive(root, TAG_DIMENSIONS)? {
            Payload::Dimensions(dims) => Ok(dims),
            other => Err(MatvecError::Communication(format!(
                "expected dimensions from rank {}, got {:?}",
                root, other
            ))),
        }
    }

    fn gather_varcount(
        &self,
        local: &[f64],
        counts: &[usize],
        root: usize,
    ) -> Result<Option<Vec<f64>>> {
        self.check_root(root)?;
        check_layout(counts, self.size())?;
        check_count(self.rank, local.len(), counts)?;

        if self.rank != root {
            self.send(root, TAG_RESULT_DATA, Payload::Values(local.to_vec()))?;
            return Ok(None);
        }

        let displs = displacements(counts);
        let mut gathered = vec![0.0; counts.iter().sum()];
        for source in 0..self.size() {
            let start = displs[source];
            if source == root {
                gathered[start..start + local.len()].copy_from_slice(local);
                continue;
            }
            let values = self.receive_values(source, TAG_RESULT_DATA)?;
            check_count(source, values.len(), counts)?;
            gathered[start..start + values.len()].copy_from_slice(&values);
        }
        Ok(Some(gathered))
    }
}

/// A fixed-size group of in-process ranks.
pub struct LocalCluster;

impl LocalCluster {
    /// Connected endpoints for `size` ranks, in rank order.
    pub fn endpoints(size: usize) -> Vec<LocalCollective> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| channel()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalCollective {
                rank,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(dest, sender)| (dest != rank).then(|| sender.clone()))
                    .collect(),
                inbox,
                pending: RefCell::new(Vec::new()),
                departed: RefCell::new(Vec::new()),
            })
            .collect()
    }

    /// Run `program` once per rank, each on its own thread, and return the
    /// per-rank outputs in rank order.
    pub fn run<T, F>(size: usize, program: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LocalCollective) -> T + Sync,
    {
        if size == 0 {
            return Err(MatvecError::Config("cluster needs at least one rank".into()));
        }

        let program = &program;
        thread::scope(|scope| {
            let handles = LocalCluster::endpoints(size)
                .into_iter()
                .map(|endpoint| {
                    thread::Builder::new()
                        .name(format!("rank-{}", endpoint.rank))
                        .spawn_scoped(scope, move || program(endpoint))
                        .map_err(|e| MatvecError::Communication(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;

            // Every rank is joined before any failure is reported.
            let joined: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            joined
                .into_iter()
                .enumerate()
                .map(|(rank, outcome)| {
                    outcome.map_err(|_| {
                        MatvecError::Communication(format!("rank {} panicked", rank))
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_every_rank() {
        let copies = LocalCluster::run(4, |comm| {
            let mut buf = if comm.is_root() {
                vec![1.5, 2.5, 3.5]
            } else {
                vec![0.0; 3]
            };
            comm.broadcast(&mut buf, 0).unwrap();
            buf
        })
        .unwrap();
        assert!(copies.iter().all(|c| c == &[1.5, 2.5, 3.5]));
    }

    #[test]
    fn test_broadcast_dimensions() {
        let dims = LocalCluster::run(3, |comm| {
            let mine = if comm.is_root() {
                Dimensions { rows: 7, cols: 5 }
            } else {
                Dimensions { rows: 0, cols: 0 }
            };
            comm.broadcast_dimensions(mine, 0).unwrap()
        })
        .unwrap();
        assert!(dims.iter().all(|d| *d == Dimensions { rows: 7, cols: 5 }));
    }

    #[test]
    fn test_gather_varcount_orders_by_rank() {
        let counts = vec![3, 0, 1, 2];
        let outputs = LocalCluster::run(4, |comm| {
            let local = vec![comm.rank() as f64; counts[comm.rank()]];
            comm.gather_varcount(&local, &counts, 0).unwrap()
        })
        .unwrap();

        assert_eq!(outputs[0], Some(vec![0.0, 0.0, 0.0, 2.0, 3.0, 3.0]));
        assert!(outputs[1..].iter().all(Option::is_none));
    }

    #[test]
    fn test_gather_to_non_zero_root() {
        let counts = vec![1, 1, 1];
        let outputs = LocalCluster::run(3, |comm| {
            comm.gather_varcount(&[comm.rank() as f64 * 10.0], &counts, 2)
                .unwrap()
        })
        .unwrap();
        assert_eq!(outputs[2], Some(vec![0.0, 10.0, 20.0]));
        assert!(outputs[0].is_none());
    }

    #[test]
    fn test_gather_rejects_wrong_count() {
        let outputs = LocalCluster::run(1, |comm| comm.gather_varcount(&[1.0, 2.0], &[1], 0))
            .unwrap();
        assert!(matches!(outputs[0], Err(MatvecError::Communication(_))));
    }

    #[test]
    fn test_early_messages_wait_in_pending() {
        // Sends never block, so all three ranks can be driven from one thread.
        // Rank 2's contribution reaches root before rank 1's.
        let endpoints = LocalCluster::endpoints(3);
        let counts = [1, 2, 1];
        assert!(endpoints[2].gather_varcount(&[5.0], &counts, 0).unwrap().is_none());
        assert!(endpoints[1].gather_varcount(&[3.0, 4.0], &counts, 0).unwrap().is_none());

        let gathered = endpoints[0].gather_varcount(&[1.0], &counts, 0).unwrap();
        assert_eq!(gathered, Some(vec![1.0, 3.0, 4.0, 5.0]));
    }

    #[test]
    fn test_gather_rejects_short_counts() {
        let outputs = LocalCluster::run(3, |comm| {
            comm.gather_varcount(&[comm.rank() as f64], &[1, 1], 0)
        })
        .unwrap();
        assert!(outputs
            .iter()
            .all(|o| matches!(o, Err(MatvecError::Communication(_)))));
    }

    #[test]
    fn test_departed_peer_fails_gather() {
        let outputs = LocalCluster::run(2, |comm| {
            if comm.rank() == 1 {
                return Err(MatvecError::Config("rank 1 gave up".into()));
            }
            comm.gather_varcount(&[1.0], &[1, 1], 0)
        })
        .unwrap();
        assert!(matches!(outputs[0], Err(MatvecError::Communication(_))));
        assert!(matches!(outputs[1], Err(MatvecError::Config(_))));
    }

    #[test]
    fn test_messages_sent_before_departure_are_delivered() {
        let endpoints = LocalCluster::endpoints(2);
        let mut endpoints = endpoints.into_iter();
        let root = endpoints.next().unwrap();
        let peer = endpoints.next().unwrap();

        assert!(peer.gather_varcount(&[7.0], &[1, 1], 0).unwrap().is_none());
        drop(peer);

        assert_eq!(
            root.gather_varcount(&[6.0], &[1, 1], 0).unwrap(),
            Some(vec![6.0, 7.0])
        );
        assert!(matches!(
            root.broadcast_dimensions(Dimensions { rows: 1, cols: 1 }, 0),
            Err(MatvecError::Communication(_))
        ));
    }

    #[test]
    fn test_zero_ranks_rejected() {
        assert!(LocalCluster::run(0, |comm| comm.rank()).is_err());
    }
}
