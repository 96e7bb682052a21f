use super::transport::{ChannelTransport, SoloTransport, Transport};
use std::sync::Arc;

/// The set of all cooperating processes, created once at program start.
///
/// A `World` is a cheap handle; clones share the same transport.
#[derive(Debug, Clone)]
pub struct World {
    transport: Arc<dyn Transport>,
}

impl World {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// A world containing only this process.
    pub fn solo() -> Self {
        Self::new(SoloTransport::new())
    }

    /// `size` worlds connected by in-process channels, one per rank, for driving from threads.
    pub fn threaded(size: usize) -> Vec<World> {
        ChannelTransport::mesh(size)
            .into_iter()
            .map(World::new)
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn size(&self) -> usize {
        self.transport.size()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}
