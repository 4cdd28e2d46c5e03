// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! locbridge-sim - Scenario runner for the locbridge adapter
//!
//! Wires a [`LocEngine`] to a simulated modem and a channel host, then plays
//! scripted scenarios and prints what the host receives.

mod modem;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use crossbeam::channel::Receiver;
use locbridge::{
    AgpsStatusValue, AgpsType, AidingDataMask, BearerType, ChannelCallbacks, ConnectionHandle,
    EngineConfig, EngineState, HostNotification, LocEngine, ModemEvent, PositionMode, Recurrence,
    RestartEvent, ServerRequest, StatusEvent,
};

use crate::modem::SimModem;

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// locbridge scenario simulator
#[derive(Parser, Debug)]
#[command(name = "locbridge-sim")]
#[command(version = "0.1.0")]
#[command(about = "Play modem/host scenarios against the locbridge adapter")]
struct Args {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value = "all")]
    scenario: Scenario,

    /// Engine configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data-connection acknowledgment delay
    #[arg(long)]
    ack_delay_ms: Option<u64>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Scenario {
    /// Data connection open/close through the host
    Atl,
    /// Modem subsystem restart during an active fix
    Restart,
    /// Single-session mute
    Mute,
    /// Aiding data deletion deferred until engine off
    Aiding,
    /// Every scenario in turn
    All,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(delay) = args.ack_delay_ms {
        config = config.with_ack_delay_ms(delay);
    }
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;

    let scenarios: &[Scenario] = match args.scenario {
        Scenario::All => &[
            Scenario::Atl,
            Scenario::Restart,
            Scenario::Mute,
            Scenario::Aiding,
        ],
        ref one => std::slice::from_ref(one),
    };

    for scenario in scenarios {
        let mut sim = Sim::new(config.clone())?;
        println!("=== locbridge-sim: {:?} ===", scenario);
        match scenario {
            Scenario::Atl => run_atl(&mut sim)?,
            Scenario::Restart => run_restart(&mut sim)?,
            Scenario::Mute => run_mute(&mut sim)?,
            Scenario::Aiding => run_aiding(&mut sim)?,
            Scenario::All => {}
        }
        sim.engine.cleanup();
        println!(
            "    {} host notification(s), {} modem ioctl(s)\n",
            sim.delivered,
            sim.modem.ioctl_count()
        );
    }
    Ok(())
}

struct Sim {
    engine: LocEngine,
    modem: Arc<SimModem>,
    host: Receiver<HostNotification>,
    delivered: usize,
}

impl Sim {
    fn new(config: EngineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let modem = Arc::new(SimModem::new());
        let engine = LocEngine::new(config, modem.clone())?;
        let (callbacks, host) = ChannelCallbacks::new();
        engine.init(Arc::new(callbacks))?;
        Ok(Self {
            engine,
            modem,
            host,
            delivered: 0,
        })
    }

    /// Wait for the worker, then print and return what the host received.
    fn step(&mut self, label: &str) -> Vec<HostNotification> {
        if !self.engine.wait_idle(IDLE_TIMEOUT) {
            log::warn!("[sim] worker still busy after {:?}", IDLE_TIMEOUT);
        }
        println!("--> {}", label);
        let received: Vec<_> = self
            .host
            .try_iter()
            .filter(|n| {
                !matches!(
                    n,
                    HostNotification::WakelockAcquired | HostNotification::WakelockReleased
                )
            })
            .collect();
        for notification in &received {
            println!("    host <- {:?}", notification);
        }
        self.delivered += received.len();
        received
    }
}

fn requested(notifications: &[HostNotification], value: AgpsStatusValue) -> bool {
    notifications
        .iter()
        .any(|n| matches!(n, HostNotification::Agps(status) if status.status == value))
}

fn run_atl(sim: &mut Sim) -> Result<(), Box<dyn std::error::Error>> {
    let handle = ConnectionHandle(1);

    sim.engine.agps_init();
    sim.engine.set_server(AgpsType::Supl, "supl.example.net", 7275)?;
    sim.step("agps initialized");

    sim.modem
        .emit(ModemEvent::ServerRequest(ServerRequest::Open { handle }));
    let received = sim.step("modem asks for a data connection");
    if requested(&received, AgpsStatusValue::RequestDataConn) {
        sim.engine.data_conn_open("internet", BearerType::Ipv4)?;
    }
    sim.step("host brought the connection up");
    println!("    handle {} is {:?}", handle, sim.engine.atl_state(handle));

    sim.modem
        .emit(ModemEvent::ServerRequest(ServerRequest::Close { handle }));
    let received = sim.step("modem releases the connection");
    if requested(&received, AgpsStatusValue::ReleaseDataConn) {
        sim.engine.data_conn_closed()?;
    }
    sim.step("host tore the connection down");
    println!("    handle {} is {:?}", handle, sim.engine.atl_state(handle));
    Ok(())
}

fn run_restart(sim: &mut Sim) -> Result<(), Box<dyn std::error::Error>> {
    sim.engine
        .set_position_mode(PositionMode::Standalone, Recurrence::Periodic, 1000, 0, 0)?;
    sim.engine.start()?;
    sim.step("fix started");

    sim.modem.restart(RestartEvent::Begin);
    sim.step("modem subsystem went down");

    sim.modem.restart(RestartEvent::End);
    sim.modem.restart(RestartEvent::End);
    sim.step("modem back (reported twice), fix resumed");

    sim.engine.stop()?;
    sim.step("fix stopped");
    Ok(())
}

fn run_mute(sim: &mut Sim) -> Result<(), Box<dyn std::error::Error>> {
    sim.engine.mute_one_session()?;
    sim.engine.start()?;
    let received = sim.step("muted session started");
    let locations = received
        .iter()
        .filter(|n| matches!(n, HostNotification::Location(_)))
        .count();
    println!("    {} location(s) during the muted session", locations);

    sim.engine.stop()?;
    sim.step("muted session ended");
    println!("    mute state {:?}", sim.engine.mute_state());

    sim.engine.start()?;
    sim.step("next session reports normally");
    sim.engine.stop()?;
    sim.step("fix stopped");
    Ok(())
}

fn run_aiding(sim: &mut Sim) -> Result<(), Box<dyn std::error::Error>> {
    sim.modem
        .emit(ModemEvent::Status(StatusEvent::EngineState(EngineState::On)));
    sim.step("engine on");

    sim.engine
        .delete_aiding_data(AidingDataMask::EPHEMERIS | AidingDataMask::ALMANAC)?;
    sim.step("deletion requested while engine on");
    println!(
        "    pending aiding data {:#06x}",
        sim.engine.pending_aiding_data().0
    );

    sim.modem
        .emit(ModemEvent::Status(StatusEvent::EngineState(EngineState::Off)));
    sim.step("engine off, deletion performed");
    println!(
        "    pending aiding data {:#06x}",
        sim.engine.pending_aiding_data().0
    );
    Ok(())
}
