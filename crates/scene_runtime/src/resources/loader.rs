//! Streamed geometry sources
//!
//! A loader receives a [`LoadCompletion`] and calls it whenever the data is
//! ready, possibly from another thread. Completions travel over a channel
//! owned by the surface cache and are only applied when the cache polls at
//! the start of the next compile pass. If the surface is gone by then, the
//! send fails and the data is dropped.

use std::fmt;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

use crate::resources::MorphGeometryData;

/// Opaque identifier understood by an external loader service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamSource {
    /// Location of the geometry
    pub uri: String,
}

impl StreamSource {
    /// Create a stream source
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Ticket for one in-flight load, unique for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub(crate) u64);

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// Message sent from a loader back to the cache
#[derive(Debug)]
pub(crate) struct CompletedLoad {
    pub ticket: LoadTicket,
    pub result: Result<MorphGeometryData, String>,
}

/// One-shot continuation handed to a loader
#[derive(Debug)]
pub struct LoadCompletion {
    ticket: LoadTicket,
    sender: Sender<CompletedLoad>,
}

impl LoadCompletion {
    pub(crate) fn new(ticket: LoadTicket, sender: Sender<CompletedLoad>) -> Self {
        Self { ticket, sender }
    }

    /// Ticket this completion answers
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Deliver loaded data; false if the surface that asked is gone
    pub fn complete(self, data: MorphGeometryData) -> bool {
        self.send(Ok(data))
    }

    /// Report a load failure; false if the surface that asked is gone
    pub fn fail(self, reason: impl Into<String>) -> bool {
        self.send(Err(reason.into()))
    }

    fn send(self, result: Result<MorphGeometryData, String>) -> bool {
        let ticket = self.ticket;
        let delivered = self.sender.send(CompletedLoad { ticket, result }).is_ok();
        if !delivered {
            log::warn!("Dropping result of {}: surface no longer exists", ticket);
        }
        delivered
    }
}

/// External service resolving stream sources into geometry data
pub trait GeometryLoader {
    /// Start loading; call `completion` once the data (or an error) is available
    fn load(&self, source: &StreamSource, completion: LoadCompletion);
}
