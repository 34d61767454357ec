//! # Drive Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use log::LevelFilter;
use serde::Deserialize;

use crate::drive_loop::LoopConfig;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the drive executable, loaded from `drive_exec.toml`.
///
/// Any key missing from the file takes its default value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveExecParams {

    /// Address to bind the command socket to
    pub bind_addr: IpAddr,

    /// Port to listen for commands on
    pub port: u16,

    /// Time without a valid command after which the motors are stopped.
    ///
    /// Units: seconds
    pub watchdog_timeout_s: f64,

    /// Maximum time a single recieve waits for a datagram.
    ///
    /// Units: milliseconds
    pub recv_timeout_ms: u64,

    /// Sleep at the end of each loop iteration.
    ///
    /// Units: milliseconds
    pub poll_period_ms: u64,

    /// Number of consecutive transient socket errors tolerated before the loop gives up
    pub max_consec_transport_errors: u64,

    /// Minimum level of log messages, at least `info`
    pub log_level: LevelFilter,

    /// Motor configuration
    pub motors: MotorParams,
}

/// Motor parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorParams {

    /// If true simulated motors are used instead of the GPIO driven MX1508
    pub simulated: bool,

    /// BCM pin numbers of the left motor's (IN1, IN2) inputs
    pub left_pins: [u8; 2],

    /// BCM pin numbers of the right motor's (IN1, IN2) inputs
    pub right_pins: [u8; 2],

    /// Frequency of the software PWM on the motor inputs.
    ///
    /// Units: hertz
    pub pwm_frequency_hz: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reasons a set of parameters is rejected.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParamsError {
    #[error("watchdog_timeout_s must be positive and finite, found {0}")]
    InvalidWatchdogTimeout(f64),

    #[error("recv_timeout_ms must be greater than zero")]
    ZeroRecvTimeout,

    #[error("pwm_frequency_hz must be positive and finite, found {0}")]
    InvalidPwmFrequency(f64),

    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    LogLevelTooLow(LevelFilter),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveExecParams {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.watchdog_timeout_s.is_finite() && self.watchdog_timeout_s > 0.0) {
            return Err(ParamsError::InvalidWatchdogTimeout(self.watchdog_timeout_s))
        }

        // A zero read timeout is rejected by the socket
        if self.recv_timeout_ms == 0 {
            return Err(ParamsError::ZeroRecvTimeout)
        }

        if !(self.motors.pwm_frequency_hz.is_finite() && self.motors.pwm_frequency_hz > 0.0) {
            return Err(ParamsError::InvalidPwmFrequency(self.motors.pwm_frequency_hz))
        }

        if self.log_level < LevelFilter::Info {
            return Err(ParamsError::LogLevelTooLow(self.log_level))
        }

        Ok(())
    }

    /// Address the command socket binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Maximum time a single recieve waits for a datagram.
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Loop configuration described by these parameters.
    ///
    /// The parameters must have been validated first.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            watchdog_timeout: Duration::from_secs_f64(self.watchdog_timeout_s),
            poll_period: Duration::from_millis(self.poll_period_ms),
            max_consec_transport_errors: self.max_consec_transport_errors,
        }
    }
}

impl Default for DriveExecParams {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 9999,
            watchdog_timeout_s: 10.0,
            recv_timeout_ms: 100,
            poll_period_ms: 10,
            max_consec_transport_errors: 50,
            log_level: LevelFilter::Debug,
            motors: MotorParams::default(),
        }
    }
}

impl Default for MotorParams {
    fn default() -> Self {
        Self {
            simulated: true,
            left_pins: [2, 4],
            right_pins: [19, 18],
            pwm_frequency_hz: 1000.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = DriveExecParams::default();
        assert_eq!(p.validate(), Ok(()));
        assert_eq!(p.socket_addr(), "0.0.0.0:9999".parse().unwrap());

        let cfg = p.loop_config();
        assert_eq!(cfg.watchdog_timeout, Duration::from_secs(10));
        assert_eq!(cfg.poll_period, Duration::from_millis(10));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let p: DriveExecParams = toml::from_str(
            "port = 4000\nlog_level = \"trace\"\n\n[motors]\nsimulated = false\n"
        ).unwrap();

        assert_eq!(p.port, 4000);
        assert_eq!(p.log_level, LevelFilter::Trace);
        assert!(!p.motors.simulated);
        assert_eq!(p.motors.left_pins, [2, 4]);
        assert_eq!(p.watchdog_timeout_s, 10.0);
    }

    #[test]
    fn test_shipped_file_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/drive_exec.toml");
        let p: DriveExecParams = util::params::load_path(path).unwrap();
        let d = DriveExecParams::default();

        assert_eq!(p.validate(), Ok(()));
        assert_eq!(p.socket_addr(), d.socket_addr());
        assert_eq!(p.loop_config(), d.loop_config());
        assert_eq!(p.recv_timeout(), d.recv_timeout());
        assert_eq!(p.log_level, d.log_level);
        assert_eq!(p.motors.simulated, d.motors.simulated);
        assert_eq!(p.motors.left_pins, d.motors.left_pins);
        assert_eq!(p.motors.right_pins, d.motors.right_pins);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut p = DriveExecParams::default();
        p.watchdog_timeout_s = 0.0;
        assert_eq!(p.validate(), Err(ParamsError::InvalidWatchdogTimeout(0.0)));

        let mut p = DriveExecParams::default();
        p.watchdog_timeout_s = f64::INFINITY;
        assert!(p.validate().is_err());

        let mut p = DriveExecParams::default();
        p.recv_timeout_ms = 0;
        assert_eq!(p.validate(), Err(ParamsError::ZeroRecvTimeout));

        let mut p = DriveExecParams::default();
        p.motors.pwm_frequency_hz = -1.0;
        assert_eq!(p.validate(), Err(ParamsError::InvalidPwmFrequency(-1.0)));

        let mut p = DriveExecParams::default();
        p.log_level = LevelFilter::Warn;
        assert_eq!(p.validate(), Err(ParamsError::LogLevelTooLow(LevelFilter::Warn)));
    }
}
