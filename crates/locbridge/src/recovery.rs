// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Modem restart recovery.
//!
//! ```text
//!            MODEM_DOWN                      MODEM_UP
//!   unset ──────────────▶ OFF ◀────────▶ ON ◀──────────── unset
//!            (report OFF,        (report ON, reopen client,
//!             reset NI)           replay servers, resume fix)
//! ```
//!
//! A notification matching the last reported state is ignored, so duplicate
//! restart notifications re-initialize the client once.
//!
//! This module also owns the client (re)initialization steps shared with
//! `init` and `agps_init`.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::event::EngineState;
use crate::ingest::ModemIngress;
use crate::state::{DeferredActions, EngineShared};
use crate::transport::{EventMask, IoctlCommand, TransportError};
use crate::types::{AgpsType, BearerType, ClientHandle, EngineStatus};

/// Longest `host:port` URL the modem accepts.
pub const MAX_SERVER_URL_LEN: usize = 255;

/// Worker-owned restart tracker.
#[derive(Debug, Default)]
pub struct ModemRecovery {
    last_reported: Option<EngineState>,
}

impl ModemRecovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service the restart flags of one worker pass. Down runs before up.
    pub fn run(&mut self, shared: &Arc<EngineShared>, actions: DeferredActions) {
        if actions.contains(DeferredActions::MODEM_DOWN) {
            self.on_modem_down(shared);
        }
        if actions.contains(DeferredActions::MODEM_UP) {
            self.on_modem_up(shared);
        }
    }

    fn on_modem_down(&mut self, shared: &Arc<EngineShared>) {
        if self.last_reported == Some(EngineState::Off) {
            log::debug!("[recovery] modem down already reported");
            return;
        }
        self.last_reported = Some(EngineState::Off);
        log::warn!("[recovery] modem down");

        shared.state.lock().ni_pending.clear();
        shared.report_status(EngineStatus::EngineOff);
    }

    fn on_modem_up(&mut self, shared: &Arc<EngineShared>) {
        if self.last_reported == Some(EngineState::On) {
            log::debug!("[recovery] modem up already reported");
            return;
        }
        self.last_reported = Some(EngineState::On);
        log::info!("[recovery] modem up, re-initializing");

        shared.report_status(EngineStatus::EngineOn);

        let (inited, stale_client, agps_enabled) = {
            let state = shared.state.lock();
            (state.inited, state.client, state.agps_enabled)
        };

        if inited {
            if let Some(client) = stale_client {
                let _ = shared.check(shared.transport.clear(client), "clear");
            }
            if let Err(err) = shared.open_client() {
                log::error!("[recovery] client reopen failed: {}", err);
            }
        }

        if agps_enabled {
            shared.agps_reinit();
        }

        let (navigating, criteria, client) = {
            let state = shared.state.lock();
            (state.navigating, state.fix_criteria, state.client)
        };

        if !navigating {
            return;
        }
        let Some(client) = client else {
            log::warn!("[recovery] fix was active but no client is open");
            return;
        };

        log::info!("[recovery] resuming interrupted fix");
        if let Some(criteria) = criteria {
            let _ = shared.check(
                shared
                    .transport
                    .ioctl(client, IoctlCommand::SetFixCriteria(criteria)),
                "SET_FIX_CRITERIA",
            );
        }
        let _ = shared.check(shared.transport.start_fix(client), "start_fix");
    }
}

impl EngineShared {
    /// Log a failed transport call; a modem restart also queues recovery.
    pub(crate) fn check<T>(
        &self,
        result: std::result::Result<T, TransportError>,
        what: &str,
    ) -> std::result::Result<T, TransportError> {
        if let Err(err) = &result {
            log::error!("[engine] {} failed: {}", what, err);
            if *err == TransportError::ModemRestart {
                self.post(DeferredActions::MODEM_DOWN);
            }
        }
        result
    }

    /// Open a client session and push the initial configuration.
    ///
    /// Events the transport delivers before `open` returns are held, then
    /// queued once the new handle is known.
    pub(crate) fn open_client(self: &Arc<Self>) -> std::result::Result<ClientHandle, TransportError> {
        {
            let mut state = self.state.lock();
            state.opening = true;
            state.early_events.clear();
        }

        let ingress = ModemIngress::new(self);
        let opened = self.check(
            self.transport.open(EventMask::ENGINE_DEFAULT, ingress),
            "open",
        );

        let client = {
            let mut state = self.state.lock();
            state.opening = false;
            let early = std::mem::take(&mut state.early_events);
            let client = match opened {
                Ok(client) => client,
                Err(err) => {
                    if !early.is_empty() {
                        log::warn!("[engine] open failed, {} early event(s) dropped", early.len());
                    }
                    return Err(err);
                }
            };

            state.client = Some(client);
            for (from, event) in early {
                if from == client {
                    state.push_event(event);
                } else {
                    log::warn!(
                        "[engine] early {} event for client {:?} dropped",
                        event.kind(),
                        from
                    );
                }
            }
            if state.has_work() {
                self.wake.notify_one();
            }
            client
        };
        log::debug!("[engine] client opened, id = {}", client.0);

        let _ = self.check(
            self.transport
                .ioctl(client, IoctlCommand::SetSuplVersion(self.config.supl_version)),
            "SET_SUPL_VERSION",
        );
        Ok(client)
    }

    /// Reset the ATL table and re-issue buffered server addresses.
    pub(crate) fn agps_reinit(&self) {
        let (supl, c2k) = {
            let mut state = self.state.lock();
            state.bearer = BearerType::Invalid;
            state.atl.reset();
            state.atl_requests.clear();
            state.agps_request_pending = false;
            state.stop_request_pending = false;
            (state.supl_server.clone(), state.c2k_server.clone())
        };

        if let Some(server) = supl {
            if let Err(err) = self.apply_server(AgpsType::Supl, &server.host, server.port) {
                log::error!("[engine] SUPL server replay failed: {}", err);
            }
        }
        if let Some(server) = c2k {
            if let Err(err) = self.apply_server(AgpsType::C2k, &server.host, server.port) {
                log::error!("[engine] C2K server replay failed: {}", err);
            }
        }
    }

    /// Send a server address to the modem.
    pub(crate) fn apply_server(&self, agps_type: AgpsType, host: &str, port: u16) -> Result<()> {
        let command = match agps_type {
            AgpsType::Supl => IoctlCommand::SetUmtsSlpServer {
                url: server_url(host, port)?,
            },
            AgpsType::C2k => IoctlCommand::SetCdmaPdeServer {
                addr: resolve_ipv4(host)?,
                port,
            },
            other => {
                log::error!("[engine] unknown server type {:?}", other);
                return Ok(());
            }
        };

        let client = self.state.lock().client.ok_or(Error::NotReady)?;
        let name = command.name();
        log::debug!("[engine] {} {}:{}", name, host, port);
        self.check(self.transport.ioctl(client, command), name)?;
        Ok(())
    }
}

/// Build the `host:port` URL for a SUPL server.
pub fn server_url(host: &str, port: u16) -> Result<String> {
    let url = format!("{}:{}", host, port);
    if url.len() > MAX_SERVER_URL_LEN {
        return Err(Error::UrlTooLong { len: url.len() });
    }
    Ok(url)
}

/// Resolve a host name or dotted quad to an IPv4 address.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|_| Error::UnresolvedHost(host.to_string()))?;

    for addr in addrs {
        if let IpAddr::V4(v4) = addr.ip() {
            return Ok(v4);
        }
    }
    Err(Error::UnresolvedHost(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url() {
        assert_eq!(
            server_url("supl.example.net", 7275).unwrap(),
            "supl.example.net:7275"
        );

        // 250 + ":7275" fits exactly.
        let host = "a".repeat(250);
        assert_eq!(server_url(&host, 7275).unwrap().len(), MAX_SERVER_URL_LEN);

        let host = "a".repeat(251);
        let err = server_url(&host, 7275).unwrap_err();
        assert!(matches!(err, Error::UrlTooLong { len: 256 }));
    }

    #[test]
    fn test_resolve_dotted_quad() {
        assert_eq!(
            resolve_ipv4("10.0.0.42").unwrap(),
            Ipv4Addr::new(10, 0, 0, 42)
        );
    }

    #[test]
    fn test_resolve_failure() {
        let err = resolve_ipv4("no-such-host.invalid").unwrap_err();
        assert!(matches!(err, Error::UnresolvedHost(h) if h == "no-such-host.invalid"));
    }
}
