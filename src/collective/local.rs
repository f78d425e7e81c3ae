use super::{Endpoint, Frame, Link};
use crate::{KMeansError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// In-process link: a pair of channels between one rank and the root.
/// Frames are moved, never shared, between the rank threads.
pub struct LocalLink {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

impl Link for LocalLink {
    fn send(&mut self, frame: Frame) -> Result<()> {
        self.tx.send(frame)
            .map_err(|_| KMeansError::Collective("peer rank hung up".into()))
    }

    fn recv(&mut self) -> Result<Frame> {
        self.rx.recv()
            .map_err(|_| KMeansError::Collective("peer rank hung up".into()))
    }
}

pub type LocalCollective = Endpoint<LocalLink>;

/// Create the endpoints of an in-process group of `world` ranks, index = rank.
/// Move each endpoint into the thread running that rank.
pub fn local_group(world: usize) -> Vec<LocalCollective> {
    assert!(world > 0, "a group needs at least one rank");
    let mut root_links = Vec::with_capacity(world - 1);
    let mut members = Vec::with_capacity(world - 1);
    for rank in 1..world {
        let (to_root_tx, to_root_rx) = unbounded();
        let (to_member_tx, to_member_rx) = unbounded();
        root_links.push(LocalLink { tx: to_member_tx, rx: to_root_rx });
        members.push(Endpoint::member(rank, world, LocalLink { tx: to_root_tx, rx: to_member_rx }));
    }
    std::iter::once(Endpoint::root(world, root_links)).chain(members).collect()
}
