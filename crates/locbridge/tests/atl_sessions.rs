// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test readability over pedantic
#![allow(clippy::too_many_lines)] // Scenario tests

//! Data-connection (ATL) sessions driven end to end through the engine.

mod common;

use common::{Call, Harness};
use locbridge::{
    AgpsStatus, AgpsStatusValue, AgpsType, BearerType, ConnState, ConnectionHandle, IoctlCommand,
    ModemEvent, PdpType, ServerConnectionType, ServerRequest,
};

const H1: ConnectionHandle = ConnectionHandle(5);
const H2: ConnectionHandle = ConnectionHandle(6);

fn open(handle: ConnectionHandle) -> ModemEvent {
    ModemEvent::ServerRequest(ServerRequest::Open { handle })
}

fn multi_open(handle: ConnectionHandle) -> ModemEvent {
    ModemEvent::ServerRequest(ServerRequest::MultiOpen {
        handle,
        connection_type: ServerConnectionType::Lbs,
    })
}

fn close(handle: ConnectionHandle) -> ModemEvent {
    ModemEvent::ServerRequest(ServerRequest::Close { handle })
}

fn host_status(agps_type: AgpsType, status: AgpsStatusValue) -> AgpsStatus {
    AgpsStatus {
        agps_type,
        status,
        ipv4_addr: None,
    }
}

fn is_ack_for(command: &IoctlCommand, handle: ConnectionHandle) -> bool {
    match command {
        IoctlCommand::InformServerOpenStatus { handle: h, .. }
        | IoctlCommand::InformServerMultiOpenStatus { handle: h, .. }
        | IoctlCommand::InformServerCloseStatus { handle: h, .. } => *h == handle,
        _ => false,
    }
}

fn acks_for(h: &Harness, handle: ConnectionHandle) -> Vec<IoctlCommand> {
    h.transport
        .ioctls()
        .into_iter()
        .filter(|command| is_ack_for(command, handle))
        .collect()
}

#[test]
fn test_single_open_close_cycle() {
    let h = Harness::with_agps();
    h.drain();

    h.deliver(open(H1));
    assert_eq!(
        h.agps(),
        vec![host_status(AgpsType::Supl, AgpsStatusValue::RequestDataConn)]
    );
    assert_eq!(h.engine.atl_state(H1), Some(ConnState::OpenRequested));
    assert!(acks_for(&h, H1).is_empty());

    h.engine.data_conn_open("internet", BearerType::Ipv4).unwrap();
    h.settle();
    assert_eq!(h.engine.atl_state(H1), Some(ConnState::Open));
    assert_eq!(
        acks_for(&h, H1),
        vec![IoctlCommand::InformServerOpenStatus {
            handle: H1,
            success: true,
            apn: "internet".into(),
        }]
    );
    assert!(h
        .transport
        .ioctls()
        .contains(&IoctlCommand::SetApnProfile {
            apn: "internet".into()
        }));

    h.deliver(close(H1));
    assert_eq!(
        h.agps(),
        vec![host_status(AgpsType::Supl, AgpsStatusValue::ReleaseDataConn)]
    );
    assert_eq!(h.engine.atl_state(H1), Some(ConnState::CloseRequested));

    h.engine.data_conn_closed().unwrap();
    h.settle();
    assert_eq!(h.engine.atl_state(H1), None);
    assert_eq!(
        acks_for(&h, H1).last(),
        Some(&IoctlCommand::InformServerCloseStatus {
            handle: H1,
            success: true
        })
    );
}

#[test]
fn test_second_handle_shares_connection() {
    let h = Harness::with_agps();
    h.deliver(open(H1));
    h.engine.data_conn_open("lbs", BearerType::Ipv4v6).unwrap();
    h.settle();
    h.drain();

    h.deliver(multi_open(H2));
    assert!(h.agps().is_empty(), "no second connection request");
    assert_eq!(
        acks_for(&h, H2),
        vec![IoctlCommand::InformServerMultiOpenStatus {
            handle: H2,
            success: true,
            apn: "lbs".into(),
            pdp: PdpType::Ipv4v6,
        }]
    );

    // H2 still uses the connection: H1 is released without tearing it down.
    h.deliver(close(H1));
    assert!(h.agps().is_empty());
    assert_eq!(h.engine.atl_state(H1), None);
    assert_eq!(
        acks_for(&h, H1).last(),
        Some(&IoctlCommand::InformServerCloseStatus {
            handle: H1,
            success: true
        })
    );

    h.deliver(close(H2));
    assert_eq!(
        h.agps(),
        vec![host_status(AgpsType::Supl, AgpsStatusValue::ReleaseDataConn)]
    );
    assert_eq!(h.engine.atl_state(H2), Some(ConnState::CloseRequested));
}

#[test]
fn test_pending_open_is_shared() {
    let h = Harness::with_agps();
    h.drain();

    h.deliver(open(H1));
    h.deliver(open(H2));
    assert_eq!(h.agps().len(), 1, "one host request for both handles");

    h.engine.data_conn_open("internet", BearerType::Ipv4).unwrap();
    h.settle();
    assert_eq!(acks_for(&h, H1).len(), 1);
    assert_eq!(acks_for(&h, H2).len(), 1);
    assert_eq!(h.engine.atl_state(H1), Some(ConnState::Open));
    assert_eq!(h.engine.atl_state(H2), Some(ConnState::Open));
}

#[test]
fn test_failed_connection_fails_pending_open() {
    let h = Harness::with_agps();
    h.deliver(open(H1));

    h.engine.data_conn_failed().unwrap();
    h.settle();
    assert_eq!(h.engine.atl_state(H1), None);
    assert_eq!(
        acks_for(&h, H1),
        vec![IoctlCommand::InformServerOpenStatus {
            handle: H1,
            success: false,
            apn: String::new(),
        }]
    );
}

#[test]
fn test_request_without_agps_init_answered_with_failure() {
    let h = Harness::new();
    h.engine.start().unwrap();
    h.drain();

    h.deliver(open(H1));
    h.deliver(multi_open(H2));
    assert!(h.agps().is_empty(), "host never asked");
    assert_eq!(h.engine.atl_state(H1), None);
    assert_eq!(h.engine.atl_state(H2), None);
    assert_eq!(
        acks_for(&h, H1),
        vec![IoctlCommand::InformServerOpenStatus {
            handle: H1,
            success: false,
            apn: String::new(),
        }]
    );
    assert_eq!(
        acks_for(&h, H2),
        vec![IoctlCommand::InformServerMultiOpenStatus {
            handle: H2,
            success: false,
            apn: String::new(),
            pdp: PdpType::Ppp,
        }]
    );

    // Nothing is pending, so stop goes straight to the modem.
    h.engine.stop().unwrap();
    assert_eq!(h.transport.count(|c| matches!(c, Call::StopFix(_))), 1);
}

#[test]
fn test_stop_not_deferred_after_immediate_open_ack() {
    let h = Harness::with_agps();
    h.engine.start().unwrap();
    h.deliver(open(H1));
    h.engine.data_conn_open("internet", BearerType::Ipv4).unwrap();
    h.settle();

    // Answered from the shared connection, no host round trip.
    h.deliver(open(H2));
    assert_eq!(acks_for(&h, H2).len(), 1);

    h.engine.stop().unwrap();
    assert!(!h.engine.is_navigating());
    assert_eq!(
        h.transport.count(|c| matches!(c, Call::StopFix(_))),
        1,
        "stop issued at once"
    );

    h.settle();
    assert_eq!(h.transport.count(|c| matches!(c, Call::StopFix(_))), 1);
}

#[test]
fn test_deferred_stop_after_data_call() {
    let h = Harness::with_agps();
    h.engine.start().unwrap();
    h.deliver(open(H1));

    h.engine.stop().unwrap();
    assert!(!h.engine.is_navigating());
    assert_eq!(
        h.transport.count(|c| matches!(c, Call::StopFix(_))),
        0,
        "stop deferred while the data call is pending"
    );

    h.engine.data_conn_open("internet", BearerType::Ipv4).unwrap();
    h.settle();

    let calls = h.transport.calls();
    let ack = calls
        .iter()
        .position(|c| matches!(c, Call::Ioctl(_, command) if is_ack_for(command, H1)))
        .expect("open acknowledged");
    let stop = calls
        .iter()
        .position(|c| matches!(c, Call::StopFix(_)))
        .expect("deferred stop issued");
    assert!(ack < stop);
}

#[test]
fn test_start_cancels_deferred_stop() {
    let h = Harness::with_agps();
    h.engine.start().unwrap();
    h.deliver(open(H1));

    h.engine.stop().unwrap();
    h.engine.start().unwrap();
    h.engine.data_conn_open("internet", BearerType::Ipv4).unwrap();
    h.settle();

    assert_eq!(h.transport.count(|c| matches!(c, Call::StopFix(_))), 0);
    assert!(h.engine.is_navigating());
}

/// Expected state of one handle, mirrored from the acknowledgments the
/// modem should have received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Model {
    Free,
    OpenRequested,
    Open,
    CloseRequested,
}

impl Model {
    fn conn_state(self) -> Option<ConnState> {
        match self {
            Model::Free => None,
            Model::OpenRequested => Some(ConnState::OpenRequested),
            Model::Open => Some(ConnState::Open),
            Model::CloseRequested => Some(ConnState::CloseRequested),
        }
    }
}

/// Drives a single handle through random modem requests and host outcomes.
/// Every request gets exactly one acknowledgment, except a repeat of the
/// pending request, which shares the acknowledgment already owed.
#[test]
fn test_random_single_handle_sequences() {
    for seed in 0..32_u64 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let h = Harness::with_agps();
        let mut model = Model::Free;
        let mut requests = 0_usize;
        let mut shared = 0_usize;
        let mut acked = 0_usize;

        for step in 0..16 {
            let op = rng.u8(0..5);
            match op {
                0 => {
                    h.transport.emit(open(H1));
                    requests += 1;
                    match model {
                        Model::Free => model = Model::OpenRequested,
                        Model::OpenRequested => shared += 1,
                        Model::Open | Model::CloseRequested => acked += 1,
                    }
                }
                1 => {
                    h.transport.emit(close(H1));
                    requests += 1;
                    match model {
                        Model::Open => model = Model::CloseRequested,
                        Model::CloseRequested => shared += 1,
                        Model::Free | Model::OpenRequested => acked += 1,
                    }
                }
                2 => {
                    h.engine
                        .data_conn_open("internet", BearerType::Ipv4)
                        .unwrap();
                    if model == Model::OpenRequested {
                        acked += 1;
                        model = Model::Open;
                    }
                }
                3 => {
                    h.engine.data_conn_closed().unwrap();
                    if model == Model::CloseRequested {
                        acked += 1;
                        model = Model::Free;
                    }
                }
                _ => {
                    h.engine.data_conn_failed().unwrap();
                    if matches!(model, Model::OpenRequested | Model::CloseRequested) {
                        acked += 1;
                        model = Model::Free;
                    }
                }
            }
            h.settle();

            assert_eq!(
                h.engine.atl_state(H1),
                model.conn_state(),
                "seed {} step {} op {}",
                seed,
                step,
                op
            );
            assert_eq!(
                acks_for(&h, H1).len(),
                acked,
                "seed {} step {} op {}",
                seed,
                step,
                op
            );
        }

        match model {
            Model::OpenRequested => {
                h.engine
                    .data_conn_open("internet", BearerType::Ipv4)
                    .unwrap();
                acked += 1;
            }
            Model::CloseRequested => {
                h.engine.data_conn_closed().unwrap();
                acked += 1;
            }
            Model::Free | Model::Open => {}
        }
        h.settle();

        assert_eq!(acks_for(&h, H1).len(), acked, "seed {}", seed);
        assert_eq!(acked, requests - shared, "seed {}", seed);
        assert!(
            matches!(h.engine.atl_state(H1), None | Some(ConnState::Open)),
            "seed {}",
            seed
        );
    }
}
