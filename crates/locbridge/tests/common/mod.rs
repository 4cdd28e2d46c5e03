// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixtures: a recording modem transport and a channel-backed host.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;

use locbridge::{
    AgpsStatus, ChannelCallbacks, ClientHandle, EngineConfig, EngineStatus, EventMask,
    HostNotification, IoctlCommand, LocEngine, LocTransport, ModemEvent, ModemIngress,
    RestartEvent, TransportError,
};

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// One call received by the fake modem.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(ClientHandle),
    Close(ClientHandle),
    Clear(ClientHandle),
    StartFix(ClientHandle),
    StopFix(ClientHandle),
    Ioctl(ClientHandle, IoctlCommand),
}

/// Transport operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open,
    StartFix,
    StopFix,
    Ioctl,
}

/// Modem stand-in that records every call and lets tests inject events.
#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    ingress: Mutex<Option<ModemIngress>>,
    client: Mutex<Option<ClientHandle>>,
    next_client: AtomicI32,
    failures: Mutex<VecDeque<(Op, TransportError)>>,
    /// Reported from inside the next `open`; `None` means the new client.
    during_open: Mutex<Vec<(Option<ClientHandle>, ModemEvent)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_client: AtomicI32::new(1),
            ..Self::default()
        })
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: Op, err: TransportError) {
        self.failures.lock().push_back((op, err));
    }

    fn scripted(&self, op: Op) -> Result<(), TransportError> {
        let mut failures = self.failures.lock();
        match failures.iter().position(|(o, _)| *o == op) {
            Some(index) => Err(failures.remove(index).map_or(TransportError::Timeout, |f| f.1)),
            None => Ok(()),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    /// Most recently opened client.
    pub fn client(&self) -> Option<ClientHandle> {
        *self.client.lock()
    }

    /// Deliver an event as the current client.
    pub fn emit(&self, event: ModemEvent) {
        let client = self.client().expect("no client open");
        self.emit_as(client, event);
    }

    pub fn emit_as(&self, client: ClientHandle, event: ModemEvent) {
        let ingress = self.ingress.lock().clone().expect("no ingress registered");
        ingress.report(client, event);
    }

    /// Report `event` for the new client before the next `open` returns.
    pub fn emit_during_open(&self, event: ModemEvent) {
        self.during_open.lock().push((None, event));
    }

    /// Report `event` for `client` before the next `open` returns.
    pub fn emit_as_during_open(&self, client: ClientHandle, event: ModemEvent) {
        self.during_open.lock().push((Some(client), event));
    }

    pub fn restart(&self, event: RestartEvent) {
        let ingress = self.ingress.lock().clone().expect("no ingress registered");
        ingress.on_restart(event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn ioctls(&self) -> Vec<IoctlCommand> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Ioctl(_, command) => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl LocTransport for FakeTransport {
    fn open(&self, _events: EventMask, ingress: ModemIngress) -> Result<ClientHandle, TransportError> {
        let upcoming = ClientHandle(self.next_client.load(Ordering::SeqCst));
        let early = std::mem::take(&mut *self.during_open.lock());
        for (from, event) in early {
            ingress.report(from.unwrap_or(upcoming), event);
        }

        self.scripted(Op::Open)?;
        let client = ClientHandle(self.next_client.fetch_add(1, Ordering::SeqCst));
        *self.ingress.lock() = Some(ingress);
        *self.client.lock() = Some(client);
        self.record(Call::Open(client));
        Ok(client)
    }

    fn close(&self, client: ClientHandle) -> Result<(), TransportError> {
        self.record(Call::Close(client));
        Ok(())
    }

    fn clear(&self, client: ClientHandle) -> Result<(), TransportError> {
        self.record(Call::Clear(client));
        Ok(())
    }

    fn start_fix(&self, client: ClientHandle) -> Result<(), TransportError> {
        self.scripted(Op::StartFix)?;
        self.record(Call::StartFix(client));
        Ok(())
    }

    fn stop_fix(&self, client: ClientHandle) -> Result<(), TransportError> {
        self.scripted(Op::StopFix)?;
        self.record(Call::StopFix(client));
        Ok(())
    }

    fn ioctl(&self, client: ClientHandle, command: IoctlCommand) -> Result<(), TransportError> {
        self.scripted(Op::Ioctl)?;
        self.record(Call::Ioctl(client, command));
        Ok(())
    }
}

/// Engine wired to a fake modem and a channel host.
pub struct Harness {
    pub engine: LocEngine,
    pub transport: Arc<FakeTransport>,
    pub notifications: Receiver<HostNotification>,
}

impl Harness {
    /// Initialized engine with no ack delay.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default().with_ack_delay_ms(0))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let transport = FakeTransport::new();
        let engine = LocEngine::new(config, transport.clone()).expect("valid config");
        let (host, notifications) = ChannelCallbacks::new();
        engine.init(Arc::new(host)).expect("init");
        Self {
            engine,
            transport,
            notifications,
        }
    }

    /// Initialized engine with AGPS enabled.
    pub fn with_agps() -> Self {
        let harness = Self::new();
        harness.engine.agps_init();
        harness
    }

    /// Wait for the worker to drain everything queued so far.
    pub fn settle(&self) {
        assert!(
            self.engine.wait_idle(SETTLE_TIMEOUT),
            "worker did not go idle"
        );
    }

    /// Everything the host received since the last drain, wake locks excluded.
    pub fn drain(&self) -> Vec<HostNotification> {
        self.notifications
            .try_iter()
            .filter(|n| {
                !matches!(
                    n,
                    HostNotification::WakelockAcquired | HostNotification::WakelockReleased
                )
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<EngineStatus> {
        self.drain()
            .into_iter()
            .filter_map(|n| match n {
                HostNotification::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn agps(&self) -> Vec<AgpsStatus> {
        self.drain()
            .into_iter()
            .filter_map(|n| match n {
                HostNotification::Agps(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    /// Emit an event and wait for the worker to handle it.
    pub fn deliver(&self, event: ModemEvent) {
        self.transport.emit(event);
        self.settle();
    }
}
