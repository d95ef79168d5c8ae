//! One-directional rendezvous channel.
//!
//! A sender posts an offer; the receiver inspects the oldest offer and
//! either copies it out (delivered) or rejects it (dropped). A synchronous
//! sender stays suspended until its own offer is settled. Offers are served
//! strictly in arrival order.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use dlt_frame::{EncodingError, Packet};

use crate::config::{SendMode, Timeout};
use crate::error::{LinkError, Result};

/// Which way packets flow through a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to the endpoint's Link.
    ToLink,
    /// The endpoint's Link to the Device.
    ToDevice,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ToLink => "device->link",
            Direction::ToDevice => "link->device",
        }
    }
}

/// Outcome of a send as seen by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The receiver copied the packet.
    Delivered,
    /// The receiver's buffer was too small; the packet was discarded.
    Dropped,
    /// Asynchronous send: the packet waits in the channel.
    Queued,
}

/// Wakes a reader waiting on several channels at once.
#[derive(Debug, Default)]
pub(crate) struct Doorbell {
    rings: Mutex<u64>,
    cv: Condvar,
}

impl Doorbell {
    pub(crate) fn ring(&self) {
        let mut rings = self.rings.lock().unwrap_or_else(PoisonError::into_inner);
        *rings = rings.wrapping_add(1);
        self.cv.notify_all();
    }

    pub(crate) fn generation(&self) -> u64 {
        *self.rings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the bell rings past `seen`. Returns false on deadline.
    pub(crate) fn wait_past(&self, seen: u64, deadline: Option<Instant>) -> bool {
        let mut rings = self.rings.lock().unwrap_or_else(PoisonError::into_inner);
        while *rings == seen {
            rings = match deadline {
                None => self.cv.wait(rings).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.cv
                        .wait_timeout(rings, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Delivered,
    Dropped,
}

struct Offer {
    ticket: u64,
    packet: Packet,
    mode: SendMode,
}

#[derive(Default)]
struct State {
    offers: VecDeque<Offer>,
    settled: Vec<(u64, Settlement)>,
    next_ticket: u64,
    queued_async: usize,
    receiver_closed: bool,
    sender_closed: bool,
}

pub(crate) struct Rendezvous {
    endpoint: u8,
    direction: Direction,
    async_backlog: usize,
    state: Mutex<State>,
    offer_cv: Condvar,
    settle_cv: Condvar,
    doorbell: Option<Arc<Doorbell>>,
}

impl Rendezvous {
    pub(crate) fn new(
        endpoint: u8,
        direction: Direction,
        async_backlog: usize,
        doorbell: Option<Arc<Doorbell>>,
    ) -> Self {
        Self {
            endpoint,
            direction,
            async_backlog,
            state: Mutex::new(State::default()),
            offer_cv: Condvar::new(),
            settle_cv: Condvar::new(),
            doorbell,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disconnected(&self) -> LinkError {
        LinkError::Disconnected {
            endpoint: self.endpoint,
            direction: self.direction.as_str(),
        }
    }

    /// Post a packet.
    ///
    /// `Sync` returns once the receiver settled this offer. `Async` returns
    /// `Queued` immediately, or `BacklogFull` when too many asynchronous
    /// offers are still unclaimed.
    pub(crate) fn send(&self, packet: Packet, mode: SendMode) -> Result<SendStatus> {
        let mut state = self.lock();
        if state.receiver_closed {
            return Err(self.disconnected());
        }
        if mode == SendMode::Async && state.queued_async >= self.async_backlog {
            return Err(LinkError::BacklogFull {
                endpoint: self.endpoint,
                direction: self.direction.as_str(),
                capacity: self.async_backlog,
            });
        }

        let ticket = state.next_ticket;
        state.next_ticket = state.next_ticket.wrapping_add(1);
        state.offers.push_back(Offer {
            ticket,
            packet,
            mode,
        });
        if mode == SendMode::Async {
            state.queued_async += 1;
        }
        self.offer_cv.notify_all();
        drop(state);

        tracing::debug!(
            endpoint = self.endpoint,
            direction = self.direction.as_str(),
            ticket,
            mode = mode.as_str(),
            len = packet.wire_size(),
            "offer posted"
        );
        if let Some(doorbell) = &self.doorbell {
            doorbell.ring();
        }

        if mode == SendMode::Async {
            return Ok(SendStatus::Queued);
        }

        let mut state = self.lock();
        loop {
            if let Some(pos) = state.settled.iter().position(|(t, _)| *t == ticket) {
                let (_, settlement) = state.settled.swap_remove(pos);
                return Ok(match settlement {
                    Settlement::Delivered => SendStatus::Delivered,
                    Settlement::Dropped => {
                        tracing::warn!(
                            endpoint = self.endpoint,
                            direction = self.direction.as_str(),
                            len = packet.wire_size(),
                            "packet dropped: receiver buffer too small"
                        );
                        SendStatus::Dropped
                    }
                });
            }
            if state.receiver_closed {
                state.offers.retain(|offer| offer.ticket != ticket);
                return Err(self.disconnected());
            }
            state = self
                .settle_cv
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait for an offer, hand it to `accept`, and settle it.
    ///
    /// `accept` sees the waiting packet before anything is consumed; if it
    /// fails the offer is dropped and the error returned. Returns `Ok(None)`
    /// when the timeout elapses with nothing offered.
    pub(crate) fn receive_with<R>(
        &self,
        timeout: Timeout,
        accept: impl FnOnce(&Packet) -> std::result::Result<R, EncodingError>,
    ) -> Result<Option<R>> {
        let Some(mut state) = self.wait_for_offer(timeout)? else {
            return Ok(None);
        };
        let Some(offer) = state.offers.pop_front() else {
            return Ok(None);
        };
        if offer.mode == SendMode::Async {
            state.queued_async = state.queued_async.saturating_sub(1);
        }

        let result = accept(&offer.packet);
        let settlement = if result.is_ok() {
            Settlement::Delivered
        } else {
            Settlement::Dropped
        };
        if offer.mode == SendMode::Sync {
            state.settled.push((offer.ticket, settlement));
            self.settle_cv.notify_all();
        }
        drop(state);

        match result {
            Ok(value) => {
                tracing::debug!(
                    endpoint = self.endpoint,
                    direction = self.direction.as_str(),
                    ticket = offer.ticket,
                    "offer delivered"
                );
                Ok(Some(value))
            }
            Err(err) => {
                tracing::error!(
                    endpoint = self.endpoint,
                    direction = self.direction.as_str(),
                    error = %err,
                    "receive aborted"
                );
                Err(err.into())
            }
        }
    }

    /// Wire size of the oldest waiting packet, without consuming it.
    pub(crate) fn peek(&self, timeout: Timeout) -> Result<Option<usize>> {
        Ok(self
            .wait_for_offer(timeout)?
            .and_then(|state| state.offers.front().map(|offer| offer.packet.wire_size())))
    }

    fn wait_for_offer(&self, timeout: Timeout) -> Result<Option<MutexGuard<'_, State>>> {
        let deadline = timeout.deadline();
        let mut state = self.lock();
        loop {
            if !state.offers.is_empty() {
                return Ok(Some(state));
            }
            if state.sender_closed {
                return Err(self.disconnected());
            }
            state = match deadline {
                None => self
                    .offer_cv
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.offer_cv
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Number of offers not yet taken.
    pub(crate) fn pending(&self) -> usize {
        self.lock().offers.len()
    }

    /// The receiving party is gone: fail waiting and future senders.
    pub(crate) fn close_receiver(&self) {
        let mut state = self.lock();
        state.receiver_closed = true;
        state.offers.retain(|offer| offer.mode == SendMode::Sync);
        state.queued_async = 0;
        self.settle_cv.notify_all();
    }

    /// The sending party is gone: wake receivers once the queue drains.
    pub(crate) fn close_sender(&self) {
        let mut state = self.lock();
        state.sender_closed = true;
        self.offer_cv.notify_all();
        drop(state);
        if let Some(doorbell) = &self.doorbell {
            doorbell.ring();
        }
    }
}
