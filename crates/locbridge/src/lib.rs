// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # locbridge - modem location engine adapter
//!
//! Bridges an asynchronous, event-driven modem location service to a
//! synchronous, callback-oriented host API.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use locbridge::{ChannelCallbacks, EngineConfig, LocEngine, LocTransport, PositionMode, Recurrence, Result};
//!
//! fn run(transport: Arc<dyn LocTransport>) -> Result<()> {
//!     let engine = LocEngine::new(EngineConfig::default(), transport)?;
//!     let (host, notifications) = ChannelCallbacks::new();
//!     engine.init(Arc::new(host))?;
//!
//!     engine.set_position_mode(PositionMode::MsBased, Recurrence::Periodic, 1000, 0, 0)?;
//!     engine.start()?;
//!
//!     for notification in notifications.iter().take(10) {
//!         println!("{:?}", notification);
//!     }
//!     engine.stop()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |                     Host (HostCallbacks)                          |
//! +-------------------------------------------------------------------+
//! |  LocEngine commands       |   worker thread ("loc_api")           |
//! |  start/stop/inject/...    |   reports, ATL, aiding, recovery      |
//! +---------------------------+---------------------------------------+
//! |                 SharedState (Mutex + Condvar)                     |
//! +-------------------------------------------------------------------+
//! |  ModemIngress (transport callback thread, queue + wake only)      |
//! +-------------------------------------------------------------------+
//! |                     Modem (LocTransport)                          |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`engine`] - host command surface
//! - [`transport`] - modem transport trait and command set
//! - [`event`] - modem event payloads
//! - [`host`] - host callback trait
//! - [`atl`] - data-connection (ATL) state machine
//! - [`report`] - modem report translation
//! - [`mute`] - single-session mute filter

pub mod atl;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod host;
pub mod ingest;
pub mod mute;
pub mod report;
pub mod transport;
pub mod types;

mod recovery;
mod state;
mod worker;

pub use atl::{ConnKind, ConnState, MAX_NUM_ATL_CONNECTIONS};
pub use config::{ConfigError, EngineConfig, ServerConfig};
pub use engine::{LocEngine, MAX_APN_LEN};
pub use error::{Error, Result};
pub use event::{
    AssistanceDataRequest, EngineState, FixSessionState, GnssReport, ModemEvent, NiNotification,
    NiRequestId, NiResponse, NiType, PositionReport, RestartEvent, ServerConnectionType,
    ServerRequest, SessionStatus, StatusEvent, SvProcessStatus, SvReport, SvSystem,
};
pub use host::{ChannelCallbacks, HostCallbacks, HostNotification};
pub use ingest::ModemIngress;
pub use mute::MuteSessionState;
pub use recovery::MAX_SERVER_URL_LEN;
pub use transport::{EventMask, IoctlCommand, LocTransport, PdpType, TransportError};
pub use types::{
    capabilities, AgpsStatus, AgpsStatusValue, AgpsType, AidingDataMask, BearerType,
    ClientHandle, ConnectionHandle, EngineStatus, FixCriteria, Location, OperationMode,
    PositionMode, Recurrence, SvInfo, SvStatus,
};
pub use worker::pdp_type;
