// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulated modem transport.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use locbridge::{
    ClientHandle, EventMask, FixSessionState, IoctlCommand, LocTransport, ModemEvent,
    ModemIngress, PositionReport, RestartEvent, SessionStatus, StatusEvent, TransportError,
};
use parking_lot::Mutex;

/// Modem that answers every call and produces a fix on `start_fix`.
pub struct SimModem {
    ingress: Mutex<Option<ModemIngress>>,
    client: Mutex<Option<ClientHandle>>,
    next_client: AtomicI32,
    ioctls: AtomicU64,
}

impl SimModem {
    pub fn new() -> Self {
        Self {
            ingress: Mutex::new(None),
            client: Mutex::new(None),
            next_client: AtomicI32::new(1),
            ioctls: AtomicU64::new(0),
        }
    }

    pub fn ioctl_count(&self) -> u64 {
        self.ioctls.load(Ordering::Relaxed)
    }

    /// Deliver an event as the current client.
    pub fn emit(&self, event: ModemEvent) {
        let ingress = self.ingress.lock().clone();
        let client = *self.client.lock();
        match (ingress, client) {
            (Some(ingress), Some(client)) => ingress.report(client, event),
            _ => log::warn!("[sim] no client open, event dropped"),
        }
    }

    pub fn restart(&self, event: RestartEvent) {
        if let Some(ingress) = self.ingress.lock().clone() {
            ingress.on_restart(event);
        }
    }
}

impl LocTransport for SimModem {
    fn open(&self, events: EventMask, ingress: ModemIngress) -> Result<ClientHandle, TransportError> {
        let client = ClientHandle(self.next_client.fetch_add(1, Ordering::Relaxed));
        log::info!("[sim] open client {} with events {:?}", client.0, events);
        *self.ingress.lock() = Some(ingress);
        *self.client.lock() = Some(client);
        Ok(client)
    }

    fn close(&self, client: ClientHandle) -> Result<(), TransportError> {
        log::info!("[sim] close client {}", client.0);
        let mut current = self.client.lock();
        if *current == Some(client) {
            *current = None;
        }
        Ok(())
    }

    fn clear(&self, client: ClientHandle) -> Result<(), TransportError> {
        log::info!("[sim] clear client {}", client.0);
        Ok(())
    }

    fn start_fix(&self, client: ClientHandle) -> Result<(), TransportError> {
        log::info!("[sim] start fix on client {}", client.0);
        self.emit(ModemEvent::Status(StatusEvent::FixSessionState(
            FixSessionState::Begin,
        )));
        self.emit(ModemEvent::Position(PositionReport {
            session_status: Some(SessionStatus::Success),
            timestamp_utc: Some(1_700_000_000_000),
            latitude: Some(45.5017),
            longitude: Some(-73.5673),
            altitude_wrt_ellipsoid: Some(36.0),
            hor_unc_circular: Some(8.5),
            ..PositionReport::default()
        }));
        self.emit(ModemEvent::Nmea(
            "$GPGGA,120000.00,4530.10,N,07334.04,W,1,08,0.9,36.0,M,,M,,*47".into(),
        ));
        Ok(())
    }

    fn stop_fix(&self, client: ClientHandle) -> Result<(), TransportError> {
        log::info!("[sim] stop fix on client {}", client.0);
        self.emit(ModemEvent::Status(StatusEvent::FixSessionState(
            FixSessionState::End,
        )));
        Ok(())
    }

    fn ioctl(&self, client: ClientHandle, command: IoctlCommand) -> Result<(), TransportError> {
        self.ioctls.fetch_add(1, Ordering::Relaxed);
        log::info!("[sim] client {} ioctl {:?}", client.0, command);
        Ok(())
    }
}
