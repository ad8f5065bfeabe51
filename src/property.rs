//! Optimistic cache for one remotely-owned value.
//!
//! Writes land in the cache immediately and are reverted if the device
//! refuses them. Reads answer from the cache and are corrected when the
//! device replies. Every write bumps a counter; a completion that was
//! issued before the latest write is stale and is dropped, so a slow
//! reply can never overwrite a newer user request. Every confirmed read
//! bumps a second counter; a failed write never reverts past a value the
//! device reported after the write was sent.

use crate::error::Result;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// What a failed read leaves in the cache
#[derive(Debug, Clone)]
pub enum Fallback<T> {
    /// Overwrite the cache with this value
    Value(T),
    /// Keep (and re-report) the cached value
    Cached,
}

#[derive(Debug)]
struct Slot<T> {
    value: T,
    writes: u64,
    confirmed: u64,
}

/// Issued when a read starts
#[derive(Debug, Clone, Copy)]
pub struct ReadTicket {
    writes: u64,
}

/// Issued when a write is applied optimistically
#[derive(Debug, Clone)]
pub struct WriteTicket<T> {
    previous: T,
    generation: u64,
    confirmed: u64,
}

#[derive(Debug)]
pub struct RemoteProperty<T> {
    slot: Mutex<Slot<T>>,
    fallback: Fallback<T>,
}

impl<T: Clone + Send + Sync + 'static> RemoteProperty<T> {
    pub fn new(initial: T, fallback: Fallback<T>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot {
                value: initial,
                writes: 0,
                confirmed: 0,
            }),
            fallback,
        })
    }

    /// Cached value
    pub fn get(&self) -> T {
        self.slot.lock().value.clone()
    }

    pub fn begin_read(&self) -> ReadTicket {
        ReadTicket {
            writes: self.slot.lock().writes,
        }
    }

    /// Apply a read outcome. Returns the value to report, or `None` if
    /// a write happened since the read was issued.
    pub fn finish_read(&self, ticket: ReadTicket, outcome: Result<T>) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.writes != ticket.writes {
            tracing::debug!("Discarding stale read completion");
            return None;
        }
        match (outcome, &self.fallback) {
            (Ok(value), _) => {
                slot.value = value;
                slot.confirmed += 1;
            }
            (Err(_), Fallback::Value(value)) => slot.value = value.clone(),
            (Err(_), Fallback::Cached) => {}
        }
        Some(slot.value.clone())
    }

    /// Apply `value` optimistically
    pub fn begin_write(&self, value: T) -> WriteTicket<T> {
        let mut slot = self.slot.lock();
        slot.writes += 1;
        let previous = std::mem::replace(&mut slot.value, value);
        WriteTicket {
            previous,
            generation: slot.writes,
            confirmed: slot.confirmed,
        }
    }

    /// Settle a write. On failure the previous value is restored and
    /// returned for reporting, unless a newer write superseded this one
    /// or the device reported its value since.
    pub fn finish_write(&self, ticket: WriteTicket<T>, outcome: Result<()>) -> Option<T> {
        if outcome.is_ok() {
            return None;
        }
        let mut slot = self.slot.lock();
        if slot.writes != ticket.generation {
            tracing::debug!("Failed write already superseded, not reverting");
            return None;
        }
        if slot.confirmed != ticket.confirmed {
            tracing::debug!("Device reported a value since the failed write, keeping it");
            return None;
        }
        slot.value = ticket.previous;
        Some(slot.value.clone())
    }

    /// Start a device read now; the returned future settles it.
    pub fn refresh<F>(self: &Arc<Self>, fetch: F) -> impl Future<Output = Option<T>> + Send + 'static
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let ticket = self.begin_read();
        let this = Arc::clone(self);
        async move {
            let outcome = fetch.await;
            this.finish_read(ticket, outcome)
        }
    }

    /// Apply `value` now and send it; the returned future yields the
    /// reverted value if the device refused it.
    pub fn store<F, Fut>(self: &Arc<Self>, value: T, send: F) -> impl Future<Output = Option<T>> + Send + 'static
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let ticket = self.begin_write(value.clone());
        let request = send(value);
        let this = Arc::clone(self);
        async move {
            let outcome = request.await;
            this.finish_write(ticket, outcome)
        }
    }
}
