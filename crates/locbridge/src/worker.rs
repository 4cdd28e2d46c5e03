// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Deferred-action worker.
//!
//! A single named thread that waits on the state condvar, copies out the
//! queued events and action flags under the lock, and runs every handler
//! with the lock released.
//!
//! ## Pass order
//!
//! ```text
//! WAITING ──wake──▶ QUIT? ──yes──▶ SHUT_DOWN
//!                     │no
//!                     ▼
//!                 DRAINING (lock held: copy + clear)
//!                     │
//!                     ▼
//!                 PROCESSING (lock released)
//!                   1. queued modem events
//!                   2. aiding-data deletion (engine not ON)
//!                   3. data-connection outcome + deferred stop
//!                   4. modem down/up recovery
//!                   5. pending ATL requests
//!                     │
//!                     └──────────▶ WAITING
//! ```

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::atl::{AtlEffect, AtlRequest, ConnKind};
use crate::event::{AssistanceDataRequest, ModemEvent, NiNotification, ServerConnectionType, ServerRequest};
use crate::host::HostCallbacks;
use crate::mute::should_deliver_status;
use crate::recovery::ModemRecovery;
use crate::report::{self, PositionFilter};
use crate::state::{DeferredActions, EngineShared, Pass, SharedState};
use crate::transport::{IoctlCommand, PdpType};
use crate::types::{AgpsStatus, AgpsStatusValue, AgpsType, BearerType, ClientHandle, EngineStatus};

/// Handle to the worker thread.
///
/// When dropped, posts QUIT and waits for the thread to join.
pub struct WorkerHandle {
    shared: Arc<EngineShared>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn the worker thread.
    pub fn spawn(shared: Arc<EngineShared>) -> io::Result<Self> {
        let worker_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(shared.config.worker_thread_name.clone())
            .spawn(move || worker_loop(worker_shared))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Post QUIT and join. In-flight handlers finish first.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shared.post(DeferredActions::QUIT);
        if thread.join().is_err() {
            log::error!("[worker] thread panicked");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<EngineShared>) {
    log::debug!("[worker] started");
    let mut worker = Worker {
        shared,
        recovery: ModemRecovery::new(),
    };

    while let Some(pass) = worker.next_pass() {
        worker.run_pass(pass);
    }

    log::debug!("[worker] exiting");
}

/// Data needed to acknowledge ATL requests, copied under the lock.
struct AckContext {
    host: Option<Arc<dyn HostCallbacks>>,
    client: Option<ClientHandle>,
    agps_enabled: bool,
    apn: String,
    bearer: BearerType,
}

impl AckContext {
    fn capture(state: &SharedState) -> Self {
        Self {
            host: state.host.clone(),
            client: state.client,
            agps_enabled: state.agps_enabled,
            apn: state.apn.clone(),
            bearer: state.bearer,
        }
    }
}

struct Worker {
    shared: Arc<EngineShared>,
    recovery: ModemRecovery,
}

impl Worker {
    /// Block until there is work; `None` once QUIT is observed.
    fn next_pass(&self) -> Option<Pass> {
        let mut state = self.shared.state.lock();

        while !state.has_work() {
            state.release_wakelock();
            state.worker_waiting = true;
            self.shared.idle.notify_all();
            log::trace!("[worker] waiting for events");
            self.shared.wake.wait(&mut state);
            state.worker_waiting = false;
        }

        if state.actions().contains(DeferredActions::QUIT) {
            state.release_wakelock();
            state.worker_waiting = true;
            self.shared.idle.notify_all();
            return None;
        }

        state.acquire_wakelock();
        Some(state.take_pass())
    }

    fn run_pass(&mut self, pass: Pass) {
        log::trace!(
            "[worker] pass {:?}, {} event(s)",
            pass.actions,
            pass.events.len()
        );

        for event in pass.events {
            self.dispatch(event);
        }

        self.delete_aiding_data();

        if pass.actions.intersects(DeferredActions::AGPS_OUTCOME) {
            self.agps_outcome(pass.actions);
        }

        self.recovery.run(&self.shared, pass.actions);

        self.process_atl_requests();
    }

    fn dispatch(&self, event: ModemEvent) {
        match event {
            ModemEvent::Position(report) => self.report_position(&report),
            ModemEvent::Satellite(report) => self.report_sv(&report),
            ModemEvent::Status(status) => self.shared.report_status(report::status_of(status)),
            ModemEvent::Nmea(sentence) => self.report_nmea(&sentence),
            ModemEvent::ServerRequest(request) => self.queue_conn_request(request),
            ModemEvent::AssistanceData(request) => self.assistance_data(request),
            ModemEvent::NiNotifyVerify(notification) => self.ni_request(notification),
            ModemEvent::IoctlReport { .. } => {}
        }
    }

    fn report_position(&self, position: &crate::event::PositionReport) {
        let (host, muted) = {
            let state = self.shared.state.lock();
            (state.host.clone(), state.mute.drops_reports())
        };
        if muted {
            log::trace!("[worker] position muted");
            return;
        }

        let filter = PositionFilter {
            intermediate_pos: self.shared.config.intermediate_pos,
            accuracy_threshold_m: self.shared.config.accuracy_threshold_m,
        };
        if let (Some(host), Some(location)) = (host, report::translate_position(position, filter)) {
            host.location(&location);
        }
    }

    fn report_sv(&self, gnss: &crate::event::GnssReport) {
        let (host, muted) = {
            let state = self.shared.state.lock();
            (state.host.clone(), state.mute.drops_reports())
        };
        if muted {
            log::trace!("[worker] satellite report muted");
            return;
        }

        if let (Some(host), Some(sv_status)) = (host, report::translate_sv(gnss)) {
            host.sv_status(&sv_status);
        }
    }

    fn report_nmea(&self, sentence: &str) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        if let Some(host) = self.shared.host() {
            host.nmea(now_ms, sentence);
        }
    }

    fn queue_conn_request(&self, request: ServerRequest) {
        let request = match request {
            ServerRequest::Open { handle } => AtlRequest::Open {
                handle,
                kind: ConnKind::Single,
            },
            ServerRequest::MultiOpen {
                handle,
                connection_type,
            } => AtlRequest::Open {
                handle,
                kind: ConnKind::Multi(match connection_type {
                    ServerConnectionType::Lbs => AgpsType::Supl,
                    ServerConnectionType::Wwan => AgpsType::WwanAny,
                }),
            },
            ServerRequest::Close { handle } => AtlRequest::Close { handle },
        };

        log::debug!("[worker] location server request {:?}", request);
        let mut state = self.shared.state.lock();
        state.atl_requests.push_back(request);
    }

    fn assistance_data(&self, request: AssistanceDataRequest) {
        match request {
            AssistanceDataRequest::PredictedOrbits => {
                log::debug!("[worker] XTRA download request");
                if let Some(host) = self.shared.host() {
                    host.xtra_download_request();
                }
            }
            AssistanceDataRequest::Time => {
                log::debug!("[worker] time assistance request not supported");
            }
        }
    }

    fn ni_request(&self, notification: NiNotification) {
        let host = {
            let mut state = self.shared.state.lock();
            if !state.ni_pending.contains(&notification.id) {
                state.ni_pending.push(notification.id);
            }
            state.host.clone()
        };
        log::info!(
            "[worker] network-initiated request {:?} from '{}'",
            notification.id,
            notification.requestor_id
        );
        if let Some(host) = host {
            host.ni_notify(&notification);
        }
    }

    /// Delete pending aiding data while the engine is not ON.
    fn delete_aiding_data(&self) {
        let (mask, client) = {
            let state = self.shared.state.lock();
            if state.engine_on_off == EngineStatus::EngineOn || state.aiding_mask.is_empty() {
                return;
            }
            let Some(client) = state.client else {
                return;
            };
            (state.aiding_mask, client)
        };

        log::debug!("[worker] deleting aiding data {:#06x}", mask.0);
        let _ = self.shared.check(
            self.shared
                .transport
                .ioctl(client, IoctlCommand::DeleteAssistData(mask)),
            "DELETE_ASSIST_DATA",
        );

        self.shared.state.lock().aiding_mask.remove(mask);
    }

    /// Host outcome for the data connection, then any deferred stop.
    fn agps_outcome(&self, actions: DeferredActions) {
        let (effects, ctx) = {
            let mut state = self.shared.state.lock();
            let ctx = AckContext::capture(&state);

            let effects = if actions.contains(DeferredActions::AGPS_DATA_OPEN_SUCCESS) {
                if actions.contains(DeferredActions::AGPS_DATA_CLOSED) {
                    log::error!("[worker] data connection reported both open and closed");
                }
                state.atl.on_host_opened(true)
            } else if actions.contains(DeferredActions::AGPS_DATA_CLOSED) {
                state.bearer = BearerType::Invalid;
                state.atl.on_host_closed(true)
            } else {
                state.bearer = BearerType::Invalid;
                state.atl.on_host_failed()
            };

            (effects, ctx)
        };

        self.run_effects(effects, &ctx);
        self.update_agps_request();
    }

    /// Recompute whether the modem waits on a host data connection and, once
    /// it no longer does, issue a stop deferred meanwhile.
    fn update_agps_request(&self) {
        let deferred_stop = {
            let mut state = self.shared.state.lock();
            state.agps_request_pending = state.atl.open_pending();
            if state.agps_request_pending {
                return;
            }
            std::mem::take(&mut state.stop_request_pending)
                .then_some(state.client)
                .flatten()
        };

        if let Some(client) = deferred_stop {
            log::debug!("[worker] handling deferred stop");
            let _ = self
                .shared
                .check(self.shared.transport.stop_fix(client), "deferred stop_fix");
        }
    }

    fn process_atl_requests(&self) {
        loop {
            let (result, ctx) = {
                let mut state = self.shared.state.lock();
                let Some(request) = state.atl_requests.pop_front() else {
                    break;
                };
                let result = state.atl.on_request(request);
                (result, AckContext::capture(&state))
            };

            match result {
                Ok(effects) => self.run_effects(effects, &ctx),
                Err(err) => log::error!("[atl] {}, request dropped", err),
            }
        }
        self.update_agps_request();
    }

    fn run_effects(&self, effects: Vec<AtlEffect>, ctx: &AckContext) {
        for effect in effects {
            match effect {
                AtlEffect::Host { agps_type, status } => match (&ctx.host, ctx.agps_enabled) {
                    (Some(host), true) => {
                        log::debug!("[atl] host {:?} for {:?}", status, agps_type);
                        host.agps_status(&AgpsStatus {
                            agps_type,
                            status,
                            ipv4_addr: None,
                        });
                    }
                    _ => {
                        log::error!("[atl] AGPS not initialized, {:?} not delivered", status);
                        // Answer in the host's place so the modem is not left waiting.
                        let answers = {
                            let mut state = self.shared.state.lock();
                            match status {
                                AgpsStatusValue::RequestDataConn => state.atl.on_host_opened(false),
                                AgpsStatusValue::ReleaseDataConn => state.atl.on_host_closed(true),
                            }
                        };
                        self.run_effects(answers, ctx);
                    }
                },
                AtlEffect::AckOpen {
                    handle,
                    kind,
                    success,
                } => {
                    let command = match kind {
                        ConnKind::Single => IoctlCommand::InformServerOpenStatus {
                            handle,
                            success,
                            apn: ctx.apn.clone(),
                        },
                        ConnKind::Multi(_) => IoctlCommand::InformServerMultiOpenStatus {
                            handle,
                            success,
                            apn: ctx.apn.clone(),
                            pdp: pdp_type(ctx.bearer),
                        },
                    };
                    self.ack(ctx.client, command);
                }
                AtlEffect::AckClose { handle, success } => {
                    self.ack(
                        ctx.client,
                        IoctlCommand::InformServerCloseStatus { handle, success },
                    );
                }
            }
        }
    }

    /// Send one acknowledgment after the configured delay.
    fn ack(&self, client: Option<ClientHandle>, command: IoctlCommand) {
        let Some(client) = client else {
            log::warn!("[atl] no client, {} dropped", command.name());
            return;
        };

        let delay = self.shared.config.atl_ack_delay_ms;
        if delay > 0 {
            // Let the transport finish the request that triggered this ack.
            thread::sleep(Duration::from_millis(delay));
        }

        log::debug!("[atl] {:?}", command);
        let name = command.name();
        let _ = self.shared.check(self.shared.transport.ioctl(client, command), name);
    }
}

/// PDP type reported for a bearer.
pub fn pdp_type(bearer: BearerType) -> PdpType {
    match bearer {
        BearerType::Ipv4 => PdpType::Ip,
        BearerType::Ipv6 => PdpType::Ipv6,
        BearerType::Ipv4v6 => PdpType::Ipv4v6,
        BearerType::Invalid => PdpType::Ppp,
    }
}

/// Statuses to emit for a delivered `status`, updating the restore tracker.
///
/// ENGINE_ON right after SESSION_BEGIN re-emits SESSION_BEGIN.
fn status_emissions(state: &mut SharedState, status: EngineStatus) -> Vec<EngineStatus> {
    let mut emissions = vec![status];
    if status == EngineStatus::EngineOn && state.last_delivered == EngineStatus::SessionBegin {
        emissions.push(EngineStatus::SessionBegin);
    }
    state.last_delivered = status;
    emissions
}

impl EngineShared {
    /// Process an engine/session status: mute transitions, projections,
    /// aiding-deletion trigger and filtered delivery to the host.
    pub(crate) fn report_status(&self, status: EngineStatus) {
        let (host, emissions) = {
            let mut state = self.state.lock();

            state.mute.on_status(status);
            let deliver = should_deliver_status(status, state.navigating);

            if status.is_engine_state() {
                state.engine_on_off = status;
            }
            if status.is_session_state() {
                state.session_begin_end = status;
            }

            if state.engine_on_off != EngineStatus::EngineOn && !state.aiding_mask.is_empty() {
                state.set_actions(DeferredActions::DELETE_AIDING);
                self.wake.notify_one();
            }

            let emissions = if deliver {
                status_emissions(&mut state, status)
            } else {
                log::debug!("[worker] status {} suppressed", status);
                Vec::new()
            };
            (state.host.clone(), emissions)
        };

        if let Some(host) = host {
            for status in emissions {
                host.status(status);
            }
        }
    }

    /// Deliver a status directly, bypassing the filter.
    pub(crate) fn inform_status(&self, status: EngineStatus) {
        let (host, emissions) = {
            let mut state = self.state.lock();
            let emissions = status_emissions(&mut state, status);
            (state.host.clone(), emissions)
        };

        if let Some(host) = host {
            for status in emissions {
                host.status(status);
            }
        }
    }
}
