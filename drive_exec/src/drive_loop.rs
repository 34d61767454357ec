//! # Drive Loop
//!
//! The drive loop owns the command transport, the drive controller and the command watchdog. Each
//! iteration it:
//!
//! 1. Recieves at most one datagram, waiting no longer than the transport's recieve timeout.
//! 2. Decodes it, executes it and replies to the sender. Datagrams which don't decode are dropped
//!    without a reply and don't count as activity.
//! 3. Stops the motors if the watchdog has expired.
//! 4. Sleeps for the poll period.
//!
//! The motors are stopped when the loop shuts down, whatever the reason.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io,
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};
use comms_if::drive::{Command, DecodeError, MAX_DATAGRAM_LEN};
use log::{debug, error, info, trace, warn};
use serde::Serialize;

use crate::{
    drive_server::{DatagramTransport, TransportError},
    motor_ctrl::{DriveCtrl, DriveState, MotorDriver},
    watchdog::{Clock, Watchdog},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Size of the recieve buffer. One byte larger than the longest valid datagram so that oversized
/// datagrams, which are truncated by the socket, can still be detected.
const RECV_BUF_LEN: usize = MAX_DATAGRAM_LEN + 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Timing configuration of the loop.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoopConfig {
    /// Time without a valid command after which the motors are stopped
    pub watchdog_timeout: Duration,

    /// Sleep at the end of each iteration
    pub poll_period: Duration,

    /// Number of consecutive transient transport errors tolerated
    pub max_consec_transport_errors: u64,
}

/// Counters describing what the loop has done.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Number of loop iterations
    pub num_iterations: u64,

    /// Number of datagrams recieved
    pub num_datagrams: u64,

    /// Number of datagrams which decoded into a command
    pub num_commands: u64,

    /// Number of datagrams dropped because they didn't decode
    pub num_dropped: u64,

    /// Number of times the watchdog stopped the motors
    pub num_watchdog_trips: u64,

    /// Number of transient transport errors on recieve
    pub num_transport_errors: u64,

    /// Number of replies which could not be sent
    pub num_reply_failures: u64,
}

/// The drive loop context.
pub struct DriveLoop<T, M, C>
where
    T: DatagramTransport,
    M: MotorDriver,
    C: Clock
{
    transport: T,
    drive: DriveCtrl<M>,
    clock: C,
    watchdog: Watchdog,
    config: LoopConfig,

    state: LoopState,
    stats: LoopStats,

    /// True while the motors are held stopped by the watchdog
    watchdog_tripped: bool,

    num_consec_transport_errors: u64,

    recv_buf: [u8; RECV_BUF_LEN],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// State of the loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown,
}

/// Errors which end the loop.
#[derive(thiserror::Error, Debug)]
pub enum DriveLoopError {
    #[error("Command socket failed: {0}")]
    Transport(io::Error),

    #[error("{0} consecutive transient socket errors, last: {1}")]
    TooManyTransportErrors(u64, io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<T, M, C> DriveLoop<T, M, C>
where
    T: DatagramTransport,
    M: MotorDriver,
    C: Clock
{
    /// Create a new loop. The motors are stopped and the watchdog starts now.
    pub fn new(transport: T, mut drive: DriveCtrl<M>, clock: C, config: LoopConfig) -> Self {
        drive.stop();
        let watchdog = Watchdog::new(clock.now());

        Self {
            transport,
            drive,
            clock,
            watchdog,
            config,
            state: LoopState::Running,
            stats: LoopStats::default(),
            watchdog_tripped: false,
            num_consec_transport_errors: 0,
            recv_buf: [0u8; RECV_BUF_LEN],
        }
    }

    /// Run the loop until `shutdown` is set or a fatal error occurs.
    ///
    /// The motors are always stopped on return.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), DriveLoopError> {
        info!(
            "Drive loop running, watchdog timeout {:.3} s, poll period {} ms",
            self.config.watchdog_timeout.as_secs_f64(),
            self.config.poll_period.as_millis()
        );

        while self.state == LoopState::Running {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested");
                break
            }

            if let Err(e) = self.step() {
                error!("{}", e);
                self.shutdown();
                return Err(e)
            }

            thread::sleep(self.config.poll_period);
        }

        self.shutdown();
        Ok(())
    }

    /// Perform a single iteration of the loop, without the poll sleep.
    pub fn step(&mut self) -> Result<(), DriveLoopError> {
        self.stats.num_iterations += 1;

        match self.transport.recv_datagram(&mut self.recv_buf) {
            Ok(Some((len, src))) => {
                self.num_consec_transport_errors = 0;
                self.handle_datagram(len, src);
            },
            Ok(None) => self.num_consec_transport_errors = 0,
            Err(TransportError::Transient(e)) => {
                self.stats.num_transport_errors += 1;
                self.num_consec_transport_errors += 1;

                if self.num_consec_transport_errors > self.config.max_consec_transport_errors {
                    return Err(DriveLoopError::TooManyTransportErrors(
                        self.num_consec_transport_errors,
                        e
                    ))
                }

                debug!("Transient socket error: {}", e);
            },
            Err(TransportError::Fatal(e)) => return Err(DriveLoopError::Transport(e))
        }

        self.check_watchdog();

        Ok(())
    }

    /// Move to the shutting down state, stopping the motors.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::Running {
            info!("Drive loop shutting down, stopping motors");
        }
        self.state = LoopState::ShuttingDown;
        self.drive.stop();
    }

    /// Current state of the loop.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Current demand on the motors.
    pub fn drive_state(&self) -> DriveState {
        self.drive.state()
    }

    /// Counters describing what the loop has done so far.
    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Access the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn handle_datagram(&mut self, len: usize, src: SocketAddr) {
        self.stats.num_datagrams += 1;

        let cmd = match Command::decode(&self.recv_buf[..len]) {
            Ok(c) => c,
            Err(DecodeError::Empty) => {
                trace!("Ignoring empty datagram from {}", src);
                self.stats.num_dropped += 1;
                return
            },
            Err(e) => {
                warn!("Dropping datagram from {}: {}", src, e);
                self.stats.num_dropped += 1;
                return
            }
        };

        trace!("Recieved {:?} from {}", cmd, src);

        self.watchdog.touch(self.clock.now());
        self.stats.num_commands += 1;

        match (cmd, cmd.resolved_intensity()) {
            (Command::Forward(_), Some(i)) => self.drive.forward(i),
            (Command::Backward(_), Some(i)) => self.drive.backward(i),
            (Command::Stop, _) => self.drive.stop(),
            _ => ()
        }

        // The command has already been executed, so a failed reply is only worth a warning
        if let Err(e) = self.transport.send_reply(cmd.reply(), src) {
            warn!("Could not reply to {}: {}", src, e);
            self.stats.num_reply_failures += 1;
        }
    }

    fn check_watchdog(&mut self) {
        let now = self.clock.now();

        if self.watchdog.expired(now, self.config.watchdog_timeout) {
            if !self.watchdog_tripped {
                warn!(
                    "No valid command for {:.3} s, stopping motors",
                    self.watchdog.since_activity(now).as_secs_f64()
                );
                self.watchdog_tripped = true;
                self.stats.num_watchdog_trips += 1;
            }

            self.drive.stop();
        }
        else if self.watchdog_tripped {
            info!("Valid command recieved, watchdog cleared");
            self.watchdog_tripped = false;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
