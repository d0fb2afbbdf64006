//! In-process transport: two connected endpoints sharing a pair of queues.
//!
//! [`MemorySocket::pair`] returns a client end and a server end. Whatever one end sends
//! the other receives, losslessly and in order. Combine with
//! [`ChaosSocket`](crate::ChaosSocket) to make the link unreliable.

use std::collections::VecDeque;

use crate::sync::{Arc, Mutex};
use crate::{PlayerId, Socket};

#[derive(Debug)]
struct Queues<M> {
    to_server: VecDeque<M>,
    to_client: VecDeque<M>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Client,
    Server,
}

/// One end of an in-memory link.
///
/// Both ends carry the same id: the id of the player on the client side.
///
/// ```
/// use predictive_sync::{MemorySocket, Socket};
///
/// let (mut client, mut server) = MemorySocket::<u32>::pair("A");
/// client.send(1);
/// client.send(2);
/// client.send(3);
///
/// assert_eq!(server.receive(), Some(1));
/// assert_eq!(server.receive_latest(), Some(3));
/// assert_eq!(server.receive(), None);
/// assert_eq!(server.id().as_str(), "A");
/// ```
#[derive(Debug)]
pub struct MemorySocket<M> {
    id: PlayerId,
    end: End,
    queues: Arc<Mutex<Queues<M>>>,
}

impl<M> MemorySocket<M> {
    /// Creates a connected `(client, server)` pair for player `id`.
    #[must_use]
    pub fn pair(id: impl Into<PlayerId>) -> (Self, Self) {
        let id = id.into();
        let queues = Arc::new(Mutex::new(Queues {
            to_server: VecDeque::new(),
            to_client: VecDeque::new(),
        }));
        let client = Self {
            id: id.clone(),
            end: End::Client,
            queues: Arc::clone(&queues),
        };
        let server = Self {
            id,
            end: End::Server,
            queues,
        };
        (client, server)
    }

    /// Number of messages waiting to be received at this end.
    #[must_use]
    pub fn pending(&self) -> usize {
        let queues = self.queues.lock();
        match self.end {
            End::Client => queues.to_client.len(),
            End::Server => queues.to_server.len(),
        }
    }

    fn push(&self, message: M) {
        let mut queues = self.queues.lock();
        match self.end {
            End::Client => queues.to_server.push_back(message),
            End::Server => queues.to_client.push_back(message),
        }
    }

    fn pop_oldest(&self) -> Option<M> {
        let mut queues = self.queues.lock();
        match self.end {
            End::Client => queues.to_client.pop_front(),
            End::Server => queues.to_server.pop_front(),
        }
    }

    fn pop_newest(&self) -> Option<M> {
        let mut queues = self.queues.lock();
        let inbox = match self.end {
            End::Client => &mut queues.to_client,
            End::Server => &mut queues.to_server,
        };
        let newest = inbox.pop_back();
        inbox.clear();
        newest
    }
}

#[cfg(feature = "sync-send")]
impl<M: Send> Socket<M> for MemorySocket<M> {
    fn id(&self) -> &PlayerId {
        &self.id
    }

    fn send(&mut self, message: M) {
        self.push(message);
    }

    fn receive(&mut self) -> Option<M> {
        self.pop_oldest()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.pop_newest()
    }
}

#[cfg(not(feature = "sync-send"))]
impl<M> Socket<M> for MemorySocket<M> {
    fn id(&self) -> &PlayerId {
        &self.id
    }

    fn send(&mut self, message: M) {
        self.push(message);
    }

    fn receive(&mut self) -> Option<M> {
        self.pop_oldest()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.pop_newest()
    }
}
