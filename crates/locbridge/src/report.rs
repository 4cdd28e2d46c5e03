// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Translation of modem reports into host records.

use std::ops::RangeInclusive;

use crate::event::{
    EngineState, FixSessionState, GnssReport, PositionReport, SessionStatus, StatusEvent,
    SvProcessStatus, SvSystem,
};
use crate::types::{location_flags, EngineStatus, Location, SvInfo, SvStatus, GPS_MAX_SVS};

/// First SBAS PRN as reported by the modem.
const SBAS_PRN_BASE: i32 = 120;
/// First SBAS PRN in NMEA numbering.
const SBAS_NMEA_BASE: i32 = 33;
/// First GLONASS slot in NMEA numbering (slot 1).
const GLONASS_NMEA_BASE: i32 = 65;
/// NMEA numbers reserved for each system.
const SBAS_NMEA_RANGE: RangeInclusive<i32> = 33..=64;
const GLONASS_NMEA_RANGE: RangeInclusive<i32> = 65..=96;

/// Position filter settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionFilter {
    pub intermediate_pos: bool,
    /// Meters; 0 disables.
    pub accuracy_threshold_m: u32,
}

/// Translate a position report, or `None` if it must not reach the host.
pub fn translate_position(report: &PositionReport, filter: PositionFilter) -> Option<Location> {
    let session_status = match report.session_status {
        Some(status) => status,
        None => {
            log::trace!("[report] position without session status ignored");
            return None;
        }
    };

    let in_progress = session_status == SessionStatus::InProgress;
    if session_status != SessionStatus::Success && !(in_progress && filter.intermediate_pos) {
        log::trace!("[report] position ignored, session status {:?}", session_status);
        return None;
    }

    let mut location = Location {
        timestamp: report.timestamp_utc.unwrap_or(0),
        ..Location::default()
    };

    if let (Some(lat), Some(lon)) = (report.latitude, report.longitude) {
        location.flags |= location_flags::HAS_LAT_LONG;
        location.latitude = lat;
        location.longitude = lon;
    }

    if let Some(altitude) = report.altitude_wrt_ellipsoid {
        location.flags |= location_flags::HAS_ALTITUDE;
        location.altitude = altitude;
    }

    if let (Some(h), Some(v)) = (report.speed_horizontal, report.speed_vertical) {
        location.flags |= location_flags::HAS_SPEED;
        location.speed = h.hypot(v);
    }

    if let Some(heading) = report.heading {
        location.flags |= location_flags::HAS_BEARING;
        location.bearing = heading;
    }

    if let Some(unc) = report.hor_unc_circular {
        location.flags |= location_flags::HAS_ACCURACY;
        location.accuracy = unc;
    }

    if location.latitude == 0.0 && location.longitude == 0.0 {
        log::trace!("[report] (0,0) position dropped");
        return None;
    }

    if filter.accuracy_threshold_m != 0 && in_progress {
        if let Some(unc) = report.hor_unc_circular {
            if unc > filter.accuracy_threshold_m as f32 {
                log::warn!(
                    "[report] ignore intermediate position with error {:.2} > {} meters",
                    unc,
                    filter.accuracy_threshold_m
                );
                return None;
            }
        }
    }

    Some(location)
}

/// Translate a satellite report, or `None` when no satellite survives.
pub fn translate_sv(report: &GnssReport) -> Option<SvStatus> {
    let max = report.sv_count.unwrap_or(0).min(GPS_MAX_SVS);
    let list = report.sv_list.as_deref()?;

    let mut status = SvStatus::default();

    for sv in list.iter().take(max) {
        let mut info = SvInfo::default();

        match sv.system {
            Some(SvSystem::Gps) => {
                info.prn = sv.prn;
                let bit = gps_prn_bit(sv.prn);
                if sv.has_eph == Some(true) {
                    status.ephemeris_mask |= bit;
                }
                if sv.has_alm == Some(true) {
                    status.almanac_mask |= bit;
                }
                if sv.process_status == Some(SvProcessStatus::Track) {
                    status.used_in_fix_mask |= bit;
                }
            }
            Some(system @ (SvSystem::Sbas | SvSystem::Glonass)) => {
                let (shift, range) = if system == SvSystem::Sbas {
                    (SBAS_NMEA_BASE - SBAS_PRN_BASE, SBAS_NMEA_RANGE)
                } else {
                    (GLONASS_NMEA_BASE - 1, GLONASS_NMEA_RANGE)
                };
                match sv.prn.checked_add(shift).filter(|prn| range.contains(prn)) {
                    Some(prn) => info.prn = prn,
                    None => {
                        log::warn!("[report] {:?} PRN {} out of range, skipped", system, sv.prn);
                        continue;
                    }
                }
            }
            Some(_) => continue,
            None => {}
        }

        info.snr = sv.snr.unwrap_or(0.0);
        info.elevation = sv.elevation.unwrap_or(0.0);
        info.azimuth = sv.azimuth.unwrap_or(0.0);
        status.sv_list.push(info);
    }

    if status.sv_list.is_empty() {
        None
    } else {
        Some(status)
    }
}

/// Mask bit for a GPS PRN (1..=32); out-of-range PRNs map to no bit.
fn gps_prn_bit(prn: i32) -> u32 {
    match u32::try_from(prn) {
        Ok(p @ 1..=32) => 1u32 << (p - 1),
        _ => 0,
    }
}

/// Map a modem status event to a host status.
pub fn status_of(event: StatusEvent) -> EngineStatus {
    match event {
        StatusEvent::EngineState(EngineState::On) => EngineStatus::EngineOn,
        StatusEvent::EngineState(EngineState::Off) => EngineStatus::EngineOff,
        StatusEvent::FixSessionState(FixSessionState::Begin) => EngineStatus::SessionBegin,
        StatusEvent::FixSessionState(FixSessionState::End) => EngineStatus::SessionEnd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SvReport;

    fn fix(status: SessionStatus) -> PositionReport {
        PositionReport {
            session_status: Some(status),
            timestamp_utc: Some(1_700_000_000_000),
            latitude: Some(48.85),
            longitude: Some(2.35),
            speed_horizontal: Some(3.0),
            speed_vertical: Some(4.0),
            hor_unc_circular: Some(800.0),
            ..PositionReport::default()
        }
    }

    #[test]
    fn test_final_position() {
        let loc = translate_position(&fix(SessionStatus::Success), PositionFilter::default())
            .expect("final fix delivered");
        assert!(loc.has(location_flags::HAS_LAT_LONG));
        assert!(loc.has(location_flags::HAS_SPEED));
        assert!(loc.has(location_flags::HAS_ACCURACY));
        assert!(!loc.has(location_flags::HAS_ALTITUDE));
        assert!((loc.speed - 5.0).abs() < f32::EPSILON);
        assert_eq!(loc.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_intermediate_position_needs_opt_in() {
        let report = fix(SessionStatus::InProgress);
        assert!(translate_position(&report, PositionFilter::default()).is_none());

        let filter = PositionFilter {
            intermediate_pos: true,
            accuracy_threshold_m: 0,
        };
        assert!(translate_position(&report, filter).is_some());
    }

    #[test]
    fn test_intermediate_accuracy_threshold() {
        let filter = PositionFilter {
            intermediate_pos: true,
            accuracy_threshold_m: 500,
        };
        assert!(translate_position(&fix(SessionStatus::InProgress), filter).is_none());
        // Threshold applies only to intermediate reports.
        assert!(translate_position(&fix(SessionStatus::Success), filter).is_some());
    }

    #[test]
    fn test_position_filters() {
        let mut report = fix(SessionStatus::Success);
        report.session_status = None;
        assert!(translate_position(&report, PositionFilter::default()).is_none());

        let mut report = fix(SessionStatus::Success);
        report.latitude = Some(0.0);
        report.longitude = Some(0.0);
        assert!(translate_position(&report, PositionFilter::default()).is_none());

        let report = fix(SessionStatus::Failed);
        assert!(translate_position(&report, PositionFilter::default()).is_none());
    }

    #[test]
    fn test_sv_translation() {
        let report = GnssReport {
            sv_count: Some(4),
            sv_list: Some(vec![
                SvReport {
                    system: Some(SvSystem::Gps),
                    prn: 3,
                    has_eph: Some(true),
                    has_alm: Some(true),
                    process_status: Some(SvProcessStatus::Track),
                    snr: Some(38.0),
                    ..SvReport::default()
                },
                SvReport {
                    system: Some(SvSystem::Sbas),
                    prn: 120,
                    ..SvReport::default()
                },
                SvReport {
                    system: Some(SvSystem::Galileo),
                    prn: 11,
                    ..SvReport::default()
                },
                SvReport {
                    system: Some(SvSystem::Glonass),
                    prn: 1,
                    elevation: Some(45.0),
                    ..SvReport::default()
                },
            ]),
        };

        let status = translate_sv(&report).expect("svs delivered");
        let prns: Vec<i32> = status.sv_list.iter().map(|sv| sv.prn).collect();
        assert_eq!(prns, vec![3, 33, 65]);
        assert_eq!(status.ephemeris_mask, 1 << 2);
        assert_eq!(status.almanac_mask, 1 << 2);
        assert_eq!(status.used_in_fix_mask, 1 << 2);
        assert_eq!(status.sv_list[0].snr, 38.0);
        assert_eq!(status.sv_list[2].elevation, 45.0);
    }

    #[test]
    fn test_sv_count_caps_list() {
        let sv = SvReport {
            system: Some(SvSystem::Gps),
            prn: 5,
            ..SvReport::default()
        };
        let report = GnssReport {
            sv_count: Some(40),
            sv_list: Some(vec![sv; 40]),
        };
        assert_eq!(translate_sv(&report).unwrap().sv_list.len(), GPS_MAX_SVS);

        let report = GnssReport {
            sv_count: None,
            sv_list: Some(vec![sv; 3]),
        };
        assert!(translate_sv(&report).is_none());
    }

    #[test]
    fn test_sv_prn_overflow_skipped() {
        let report = GnssReport {
            sv_count: Some(3),
            sv_list: Some(vec![
                SvReport {
                    system: Some(SvSystem::Sbas),
                    prn: i32::MAX,
                    ..SvReport::default()
                },
                SvReport {
                    system: Some(SvSystem::Glonass),
                    prn: i32::MAX,
                    ..SvReport::default()
                },
                SvReport {
                    system: Some(SvSystem::Sbas),
                    prn: 122,
                    ..SvReport::default()
                },
            ]),
        };

        let status = translate_sv(&report).expect("in-range sv delivered");
        let prns: Vec<i32> = status.sv_list.iter().map(|sv| sv.prn).collect();
        assert_eq!(prns, vec![35]);

        let report = GnssReport {
            sv_count: Some(1),
            sv_list: Some(vec![SvReport {
                system: Some(SvSystem::Sbas),
                prn: i32::MIN,
                ..SvReport::default()
            }]),
        };
        assert!(translate_sv(&report).is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(StatusEvent::EngineState(EngineState::Off)),
            EngineStatus::EngineOff
        );
        assert_eq!(
            status_of(StatusEvent::FixSessionState(FixSessionState::Begin)),
            EngineStatus::SessionBegin
        );
    }
}
