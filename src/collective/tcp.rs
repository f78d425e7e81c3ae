use super::{Endpoint, Frame, Link};
use crate::{KMeansError, Result};
use std::{
    io::{self, BufReader, BufWriter, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};

const CONNECT_ATTEMPTS: usize = 50;
const CONNECT_BACKOFF: Duration = Duration::from_millis(100);
const ACCEPT_POLL: Duration = Duration::from_millis(10);

fn network_error(what: &str, err: impl std::fmt::Display) -> KMeansError {
    KMeansError::Collective(format!("{}: {}", what, err))
}

/// Link over a TCP stream, frames are bincode-encoded.
pub struct TcpLink {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}
impl TcpLink {
    fn new(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true).map_err(|e| network_error("failed to configure stream", e))?;
        let reader = BufReader::new(stream.try_clone().map_err(|e| network_error("failed to clone stream", e))?);
        Ok(Self { reader, writer: BufWriter::new(stream) })
    }
}

impl Link for TcpLink {
    fn send(&mut self, frame: Frame) -> Result<()> {
        bincode::serialize_into(&mut self.writer, &frame).map_err(|e| network_error("failed to send frame", e))?;
        self.writer.flush().map_err(|e| network_error("failed to send frame", e))
    }

    fn recv(&mut self) -> Result<Frame> {
        bincode::deserialize_from(&mut self.reader).map_err(|e| network_error("failed to receive frame", e))
    }
}

pub type TcpCollective = Endpoint<TcpLink>;

/// Listening side of rank 0, waiting for the other ranks of a group to connect.
pub struct TcpRoot {
    listener: TcpListener,
    world: usize,
}
impl TcpRoot {
    pub fn bind(addr: impl ToSocketAddrs, world: usize) -> Result<Self> {
        if world == 0 {
            return Err(KMeansError::InvalidArgument("a group needs at least one rank".into()));
        }
        let listener = TcpListener::bind(addr).map_err(|e| network_error("failed to bind root listener", e))?;
        Ok(Self { listener, world })
    }

    /// Address the other ranks have to connect to (resolves a requested port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|e| network_error("failed to query root address", e))
    }

    /// Wait until all `world - 1` other ranks connected and introduced themselves.
    ///
    /// Peers that do not introduce themselves in time, or claim a rank that is invalid or
    /// already taken, are disconnected and do not count as connected ranks.
    ///
    /// ## Errors
    /// [`KMeansError::Collective`] if not every rank connected within `timeout`.
    pub fn accept_group(self, timeout: Duration) -> Result<TcpCollective> {
        let deadline = Instant::now() + timeout;
        self.listener.set_nonblocking(true).map_err(|e| network_error("failed to configure listener", e))?;

        let mut slots: Vec<Option<TcpLink>> = (1..self.world).map(|_| None).collect();
        while slots.iter().any(Option::is_none) {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        let missing = slots.iter().filter(|s| s.is_none()).count();
                        return Err(KMeansError::Collective(format!(
                            "{} rank(s) did not connect within {:?}", missing, timeout)));
                    }
                    thread::sleep(ACCEPT_POLL);
                    continue;
                }
                Err(e) => return Err(network_error("failed to accept rank", e)),
            };
            stream.set_nonblocking(false).map_err(|e| network_error("failed to configure stream", e))?;
            // the introduction has to arrive before the deadline as well
            let remaining = deadline.saturating_duration_since(Instant::now()).max(Duration::from_millis(1));
            stream.set_read_timeout(Some(remaining)).map_err(|e| network_error("failed to configure stream", e))?;
            let mut link = TcpLink::new(stream)?;
            match link.recv() {
                Ok(Frame::Hello { rank, world }) if world == self.world && rank > 0 && rank < world && slots[rank - 1].is_none() => {
                    link.writer.get_ref().set_read_timeout(None)
                        .map_err(|e| network_error("failed to configure stream", e))?;
                    debug!(rank, %peer, "rank connected");
                    slots[rank - 1] = Some(link);
                }
                Ok(Frame::Hello { rank, world }) => warn!(%peer, rank, world, expected_world = self.world,
                    "dropping peer that introduced itself with a taken or invalid rank"),
                Ok(other) => warn!(%peer, error = %super::unexpected("hello", &other), "dropping peer"),
                Err(e) => warn!(%peer, error = %e, "dropping peer that did not introduce itself"),
            }
        }
        Ok(Endpoint::root(self.world, slots.into_iter().flatten().collect()))
    }
}

/// Connect rank `rank` of a group of `world` ranks to the root listening on `root`.
/// Connection attempts are retried for a few seconds, to tolerate a root that is still starting.
pub fn connect(root: SocketAddr, rank: usize, world: usize) -> Result<TcpCollective> {
    if rank == 0 || rank >= world {
        return Err(KMeansError::InvalidArgument(format!("rank {} can not join a group of {} as member", rank, world)));
    }
    let mut attempt = 0;
    let stream = loop {
        match TcpStream::connect(root) {
            Ok(stream) => break stream,
            Err(e) if attempt + 1 < CONNECT_ATTEMPTS => {
                trace!(rank, attempt, error = %e, "root not reachable yet");
                attempt += 1;
                thread::sleep(CONNECT_BACKOFF);
            }
            Err(e) => return Err(network_error("failed to connect to root", e)),
        }
    };
    let mut link = TcpLink::new(stream)?;
    link.send(Frame::Hello { rank, world })?;
    Ok(Endpoint::member(rank, world, link))
}
