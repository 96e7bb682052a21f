use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer rank {rank} is outside a world of {size} processes")]
    PeerOutOfRange { rank: usize, size: usize },

    #[error("Connection with rank {0} has been closed")]
    Disconnected(usize),
}

/// Typed contents of a single point-to-point message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    Text(String),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Int(_) => "int",
            Payload::Long(_) => "long",
            Payload::Double(_) => "double",
            Payload::Bool(_) => "bool",
            Payload::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Identifies the communicator scope the message was sent within.
    pub tag: u32,
    pub payload: Payload,
}

/// Blocking, ordered, point-to-point delivery between the processes of a world.
///
/// Messages between one sender and one receiver arrive in the order they were sent. No
/// ordering holds across different pairs.
pub trait Transport: Send + Sync + fmt::Debug {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn send(&self, target: usize, message: Message) -> Result<(), TransportError>;
    fn receive(&self, source: usize) -> Result<Message, TransportError>;
}

/// The transport of a world containing a single process.
///
/// Messages addressed to rank 0 are queued and handed back by the next receive. Receiving
/// from an empty queue fails instead of blocking, since nothing else could ever fill it.
#[derive(Debug)]
pub struct SoloTransport {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl SoloTransport {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl Default for SoloTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SoloTransport {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, target: usize, message: Message) -> Result<(), TransportError> {
        if target != 0 {
            return Err(TransportError::PeerOutOfRange {
                rank: target,
                size: 1,
            });
        }
        self.tx
            .send(message)
            .map_err(|_| TransportError::Disconnected(0))
    }

    fn receive(&self, source: usize) -> Result<Message, TransportError> {
        if source != 0 {
            return Err(TransportError::PeerOutOfRange {
                rank: source,
                size: 1,
            });
        }
        match self.rx.try_recv() {
            Ok(message) => Ok(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                Err(TransportError::Disconnected(0))
            }
        }
    }
}

/// One endpoint of a fully connected mesh of in-process channels.
///
/// Every ordered pair of ranks has its own FIFO channel, so each endpoint can be moved onto
/// its own thread and driven as an independent process.
#[derive(Debug)]
pub struct ChannelTransport {
    rank: usize,
    outgoing: Vec<Sender<Message>>,
    incoming: Vec<Receiver<Message>>,
}

impl ChannelTransport {
    /// Creates `size` connected endpoints, ordered by rank.
    pub fn mesh(size: usize) -> Vec<ChannelTransport> {
        let mut outgoing: Vec<Vec<Sender<Message>>> = (0..size).map(|_| Vec::new()).collect();
        let mut incoming: Vec<Vec<Receiver<Message>>> = (0..size).map(|_| Vec::new()).collect();
        for source in 0..size {
            for target in 0..size {
                let (tx, rx) = unbounded();
                outgoing[source].push(tx);
                incoming[target].push(rx);
            }
        }
        outgoing
            .into_iter()
            .zip(incoming)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| ChannelTransport {
                rank,
                outgoing,
                incoming,
            })
            .collect()
    }

    fn check_peer(&self, rank: usize) -> Result<(), TransportError> {
        if rank >= self.outgoing.len() {
            return Err(TransportError::PeerOutOfRange {
                rank,
                size: self.outgoing.len(),
            });
        }
        Ok(())
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outgoing.len()
    }

    fn send(&self, target: usize, message: Message) -> Result<(), TransportError> {
        self.check_peer(target)?;
        self.outgoing[target]
            .send(message)
            .map_err(|_| TransportError::Disconnected(target))
    }

    fn receive(&self, source: usize) -> Result<Message, TransportError> {
        self.check_peer(source)?;
        self.incoming[source]
            .recv()
            .map_err(|_| TransportError::Disconnected(source))
    }
}
