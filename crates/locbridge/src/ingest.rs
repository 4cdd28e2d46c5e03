// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event ingestion on the transport callback thread.
//!
//! Every entry point takes the state lock only long enough to queue its
//! payload or flag and wake the worker. No domain logic runs here and nothing
//! calls back into the transport.

use std::sync::{Arc, Weak};

use crate::event::{ModemEvent, RestartEvent};
use crate::state::{DeferredActions, EngineShared};
use crate::types::ClientHandle;

/// Handle the transport uses to deliver events into the engine.
///
/// Cheap to clone and safe to call from any thread, concurrently. Calls made
/// after the engine is dropped are ignored.
#[derive(Clone)]
pub struct ModemIngress {
    shared: Weak<EngineShared>,
}

impl std::fmt::Debug for ModemIngress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModemIngress")
            .field("alive", &(self.shared.strong_count() > 0))
            .finish()
    }
}

impl ModemIngress {
    pub(crate) fn new(shared: &Arc<EngineShared>) -> Self {
        Self {
            shared: Arc::downgrade(shared),
        }
    }

    /// Deliver an event reported for `client`.
    ///
    /// Events for a client other than the engine's current one, events
    /// arriving while the engine is not initialized, and IOCTL completion
    /// reports are dropped. Events arriving while a client open is in flight
    /// are held and kept if they belong to the client the open returns.
    pub fn report(&self, client: ClientHandle, event: ModemEvent) {
        if matches!(event, ModemEvent::IoctlReport { .. }) {
            log::trace!("[ingest] ioctl report ignored");
            return;
        }

        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let mut state = shared.state.lock();
        if !state.inited {
            log::debug!("[ingest] {} event before init dropped", event.kind());
            return;
        }
        if state.opening {
            log::debug!("[ingest] {} event held until open returns", event.kind());
            state.early_events.push((client, event));
            return;
        }
        if state.client != Some(client) {
            log::warn!(
                "[ingest] {} event for stale client {:?} dropped (current {:?})",
                event.kind(),
                client,
                state.client
            );
            return;
        }

        state.push_event(event);
        shared.wake.notify_one();
    }

    /// Transport-level restart notification.
    pub fn on_restart(&self, event: RestartEvent) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let bits = match event {
            RestartEvent::Begin => DeferredActions::MODEM_DOWN,
            RestartEvent::End => DeferredActions::MODEM_UP,
        };
        log::info!("[ingest] modem restart {:?}", event);
        shared.post(bits);
    }
}
