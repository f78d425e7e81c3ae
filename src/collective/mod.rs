//! Collective operations between the ranks of a distributed k-means run.
//!
//! Ranks never share memory: everything a rank learns about the others arrives through
//! one of the collectives of [`Collective`]. Rank 0 is the root of every collective.
//!
//! [`Endpoint`] implements the collectives on a star topology (every rank talks to the
//! root only) over any [`Link`] transport:
//! - [`local::LocalLink`]: in-process channels, one thread per rank
//! - [`tcp::TcpLink`]: TCP streams, one process per rank

use crate::{KMeansError, Result};
use serde::{Deserialize, Serialize};

pub mod local;
pub mod tcp;

/// Collective communication capability of one rank.
///
/// Every rank of a group has to call the same collectives in the same order.
pub trait Collective {
    fn rank(&self) -> usize;
    fn world_size(&self) -> usize;

    /// Distribute one chunk per rank from the root. The root passes `Some(chunks)` with
    /// `chunks.len() == world_size()` and keeps `chunks[0]`; all other ranks pass `None`.
    fn scatter(&mut self, chunks: Option<Vec<Vec<i64>>>) -> Result<Vec<i64>>;

    /// Replace `values` on every rank with the root's `values`.
    fn broadcast(&mut self, values: &mut Vec<i64>) -> Result<()>;

    /// Combine the equally long `local` buffers of all ranks element-wise with `combine`,
    /// folded by the root in rank order, and deliver the identical result to every rank.
    fn all_reduce(&mut self, local: &[i64], combine: fn(i64, i64) -> i64) -> Result<Vec<i64>>;

    /// Return only after every rank entered the barrier.
    fn barrier(&mut self) -> Result<()>;
}

/// Message exchanged between a rank and the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    Hello { rank: usize, world: usize },
    Scatter(Vec<i64>),
    Broadcast(Vec<i64>),
    Reduce(Vec<i64>),
    Barrier,
}
impl Frame {
    fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::Scatter(_) => "scatter",
            Frame::Broadcast(_) => "broadcast",
            Frame::Reduce(_) => "reduce",
            Frame::Barrier => "barrier",
        }
    }
}

/// Bidirectional, ordered connection between a rank and the root.
pub trait Link {
    fn send(&mut self, frame: Frame) -> Result<()>;
    fn recv(&mut self) -> Result<Frame>;
}

fn unexpected(expected: &str, got: &Frame) -> KMeansError {
    KMeansError::Collective(format!("expected {} frame, received {} frame", expected, got.kind()))
}

/// One rank's end of a star-shaped group.
///
/// The root holds one link per other rank (`links[r - 1]` leads to rank `r`), every other
/// rank holds a single link to the root.
pub struct Endpoint<L: Link> {
    rank: usize,
    world: usize,
    links: Vec<L>,
}
impl<L: Link> Endpoint<L> {
    pub(crate) fn root(world: usize, links: Vec<L>) -> Self {
        debug_assert_eq!(links.len() + 1, world);
        Self { rank: 0, world, links }
    }

    pub(crate) fn member(rank: usize, world: usize, root_link: L) -> Self {
        debug_assert!(rank > 0 && rank < world);
        Self { rank, world, links: vec![root_link] }
    }

    fn is_root(&self) -> bool {
        self.rank == 0
    }

    fn root_link(&mut self) -> &mut L {
        &mut self.links[0]
    }
}

impl<L: Link> Collective for Endpoint<L> {
    fn rank(&self) -> usize { self.rank }
    fn world_size(&self) -> usize { self.world }

    fn scatter(&mut self, chunks: Option<Vec<Vec<i64>>>) -> Result<Vec<i64>> {
        if !self.is_root() {
            return match self.root_link().recv()? {
                Frame::Scatter(chunk) => Ok(chunk),
                other => Err(unexpected("scatter", &other)),
            };
        }
        let chunks = chunks.ok_or_else(|| KMeansError::Collective("root has to provide the scatter chunks".into()))?;
        if chunks.len() != self.world {
            return Err(KMeansError::Collective(format!(
                "scatter needs {} chunks, root provided {}", self.world, chunks.len())));
        }
        let mut chunks = chunks.into_iter();
        let own = chunks.next().unwrap_or_default();
        for (link, chunk) in self.links.iter_mut().zip(chunks) {
            link.send(Frame::Scatter(chunk))?;
        }
        Ok(own)
    }

    fn broadcast(&mut self, values: &mut Vec<i64>) -> Result<()> {
        if !self.is_root() {
            return match self.root_link().recv()? {
                Frame::Broadcast(received) => { *values = received; Ok(()) }
                other => Err(unexpected("broadcast", &other)),
            };
        }
        for link in self.links.iter_mut() {
            link.send(Frame::Broadcast(values.clone()))?;
        }
        Ok(())
    }

    fn all_reduce(&mut self, local: &[i64], combine: fn(i64, i64) -> i64) -> Result<Vec<i64>> {
        if !self.is_root() {
            self.root_link().send(Frame::Reduce(local.to_vec()))?;
            return match self.root_link().recv()? {
                Frame::Broadcast(reduced) => Ok(reduced),
                other => Err(unexpected("broadcast", &other)),
            };
        }
        let mut reduced = local.to_vec();
        for (idx, link) in self.links.iter_mut().enumerate() {
            match link.recv()? {
                Frame::Reduce(values) if values.len() == reduced.len() => {
                    reduced.iter_mut().zip(values).for_each(|(acc, v)| *acc = combine(*acc, v));
                }
                Frame::Reduce(values) => return Err(KMeansError::Collective(format!(
                    "rank {} contributed {} values to a reduction of {}", idx + 1, values.len(), reduced.len()))),
                other => return Err(unexpected("reduce", &other)),
            }
        }
        for link in self.links.iter_mut() {
            link.send(Frame::Broadcast(reduced.clone()))?;
        }
        Ok(reduced)
    }

    fn barrier(&mut self) -> Result<()> {
        if !self.is_root() {
            self.root_link().send(Frame::Barrier)?;
            return match self.root_link().recv()? {
                Frame::Barrier => Ok(()),
                other => Err(unexpected("barrier", &other)),
            };
        }
        for link in self.links.iter_mut() {
            match link.recv()? {
                Frame::Barrier => {}
                other => return Err(unexpected("barrier", &other)),
            }
        }
        for link in self.links.iter_mut() {
            link.send(Frame::Barrier)?;
        }
        Ok(())
    }
}
