//! # Motor Control Module
//!
//! This module provides the drive interface for the two drive channels (left and right). Each
//! channel is driven by a [`MotorDriver`], which can abstract over different motor driver boards or
//! a simulated motor.
//!
//! Duties are expressed on a fixed `[0, MAX_DUTY]` scale regardless of the underlying hardware.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`MotorDriver`] implementation for the MX1508 dual H-bridge.
pub mod mx1508;

/// Simulated [`MotorDriver`] for hosts without motor hardware.
pub mod sim;

/// Software PWM on Raspberry Pi GPIO pins.
#[cfg(all(target_arch = "arm", target_os = "linux"))]
pub mod gpio_pwm;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::drive::Intensity;
use log::debug;
use serde::Serialize;

use crate::params::MotorParams;

pub use mx1508::Mx1508;
pub use sim::{SimMotor, SimMotorProbe};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The maximum duty that can be demanded of a channel.
pub const MAX_DUTY: u16 = 1023;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for a single motor channel.
///
/// Implementations must accept any call in any order, in particular `stop` before any drive
/// demand and `stop` repeatedly.
pub trait MotorDriver {
    /// Drive the motor forwards at the given duty, in `[0, MAX_DUTY]`.
    fn forward(&mut self, duty: u16);

    /// Drive the motor in reverse at the given duty, in `[0, MAX_DUTY]`.
    fn reverse(&mut self, duty: u16);

    /// Remove all drive from the motor.
    fn stop(&mut self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Current demand on both drive channels.
///
/// Each value is a signed duty: zero is stopped, positive is forwards, negative is reverse. The
/// magnitude never exceeds [`MAX_DUTY`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriveState {
    pub left: i16,
    pub right: i16,
}

/// Controller for the left and right drive channels.
///
/// The channels are always stopped when the controller is created and when it is dropped.
pub struct DriveCtrl<M: MotorDriver> {
    left: M,
    right: M,
    state: DriveState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while setting up the motors.
#[derive(thiserror::Error, Debug)]
pub enum MotorCtrlError {
    #[error("Motor hardware is not available on this platform, use simulated motors instead")]
    HardwareUnavailable,

    #[cfg(all(target_arch = "arm", target_os = "linux"))]
    #[error("Could not set up GPIO pin: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveState {
    /// Both channels stopped.
    pub const STOPPED: DriveState = DriveState { left: 0, right: 0 };

    /// Returns true if neither channel has any drive.
    pub fn is_stopped(&self) -> bool {
        *self == Self::STOPPED
    }
}

impl<M: MotorDriver> DriveCtrl<M> {
    /// Create a new controller from the two channel drivers, stopping both.
    pub fn new(left: M, right: M) -> Self {
        let mut ctrl = Self {
            left,
            right,
            state: DriveState::STOPPED,
        };
        ctrl.stop();
        ctrl
    }

    /// Drive both channels forwards at the given intensity.
    pub fn forward(&mut self, intensity: Intensity) {
        let duty = duty_from_intensity(intensity);
        self.left.forward(duty);
        self.right.forward(duty);
        self.set_state(duty as i16);
    }

    /// Drive both channels backwards at the given intensity.
    pub fn backward(&mut self, intensity: Intensity) {
        let duty = duty_from_intensity(intensity);
        self.left.reverse(duty);
        self.right.reverse(duty);
        self.set_state(-(duty as i16));
    }

    /// Stop both channels.
    pub fn stop(&mut self) {
        self.left.stop();
        self.right.stop();
        self.set_state(0);
    }

    /// Get the current demand on the channels.
    pub fn state(&self) -> DriveState {
        self.state
    }

    fn set_state(&mut self, duty: i16) {
        let state = DriveState { left: duty, right: duty };
        if state != self.state {
            debug!("Drive state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}

impl<M: MotorDriver> Drop for DriveCtrl<M> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<M: MotorDriver + ?Sized> MotorDriver for Box<M> {
    fn forward(&mut self, duty: u16) {
        (**self).forward(duty)
    }

    fn reverse(&mut self, duty: u16) {
        (**self).reverse(duty)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert an intensity percentage into a duty, rounding to the nearest integer duty.
pub fn duty_from_intensity(intensity: Intensity) -> u16 {
    let pct = intensity.percent().min(100) as u32;
    ((MAX_DUTY as u32 * pct + 50) / 100) as u16
}

/// Build the left and right motor drivers described by the parameters.
pub fn init_motors(
    params: &MotorParams
) -> Result<(Box<dyn MotorDriver + Send>, Box<dyn MotorDriver + Send>), MotorCtrlError> {
    if params.simulated {
        return Ok((Box::new(SimMotor::new("left")), Box::new(SimMotor::new("right"))))
    }

    init_hw_motors(params)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

#[cfg(all(target_arch = "arm", target_os = "linux"))]
fn init_hw_motors(
    params: &MotorParams
) -> Result<(Box<dyn MotorDriver + Send>, Box<dyn MotorDriver + Send>), MotorCtrlError> {
    use gpio_pwm::GpioPwm;

    let gpio = rppal::gpio::Gpio::new()?;
    let freq = params.pwm_frequency_hz;

    let left = Mx1508::new(
        GpioPwm::new(&gpio, params.left_pins[0], freq)?,
        GpioPwm::new(&gpio, params.left_pins[1], freq)?,
    );
    let right = Mx1508::new(
        GpioPwm::new(&gpio, params.right_pins[0], freq)?,
        GpioPwm::new(&gpio, params.right_pins[1], freq)?,
    );

    Ok((Box::new(left), Box::new(right)))
}

#[cfg(not(all(target_arch = "arm", target_os = "linux")))]
fn init_hw_motors(
    _params: &MotorParams
) -> Result<(Box<dyn MotorDriver + Send>, Box<dyn MotorDriver + Send>), MotorCtrlError> {
    Err(MotorCtrlError::HardwareUnavailable)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn ctrl() -> (DriveCtrl<SimMotor>, SimMotorProbe, SimMotorProbe) {
        let left = SimMotor::new("left");
        let right = SimMotor::new("right");
        let (lp, rp) = (left.probe(), right.probe());
        (DriveCtrl::new(left, right), lp, rp)
    }

    #[test]
    fn test_duty_from_intensity() {
        assert_eq!(duty_from_intensity(Intensity::new(0)), 0);
        assert_eq!(duty_from_intensity(Intensity::new(50)), 512);
        assert_eq!(duty_from_intensity(Intensity::new(60)), 614);
        assert_eq!(duty_from_intensity(Intensity::new(70)), 716);
        assert_eq!(duty_from_intensity(Intensity::new(100)), MAX_DUTY);

        // Out of range percentages are clamped before they get here
        assert_eq!(duty_from_intensity(Intensity::new(-5)), 0);
        assert_eq!(duty_from_intensity(Intensity::new(150)), MAX_DUTY);
    }

    #[test]
    fn test_forward_backward() {
        let (mut ctrl, lp, rp) = ctrl();
        assert!(ctrl.state().is_stopped());

        ctrl.forward(Intensity::new(50));
        assert_eq!(ctrl.state(), DriveState { left: 512, right: 512 });
        assert_eq!((lp.duty(), rp.duty()), (512, 512));

        ctrl.backward(Intensity::new(100));
        assert_eq!(ctrl.state(), DriveState { left: -1023, right: -1023 });
        assert_eq!((lp.duty(), rp.duty()), (-1023, -1023));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut ctrl, lp, rp) = ctrl();

        // Stop before any drive demand
        ctrl.stop();
        assert!(ctrl.state().is_stopped());

        ctrl.forward(Intensity::new(30));
        ctrl.stop();
        let once = ctrl.state();
        ctrl.stop();
        assert_eq!(ctrl.state(), once);
        assert!(once.is_stopped());
        assert_eq!((lp.duty(), rp.duty()), (0, 0));
    }

    #[test]
    fn test_drop_stops_motors() {
        let (mut ctrl, lp, rp) = ctrl();
        ctrl.backward(Intensity::new(80));
        assert_ne!(lp.duty(), 0);

        drop(ctrl);
        assert_eq!((lp.duty(), rp.duty()), (0, 0));
    }

    #[test]
    fn test_init_simulated_motors() {
        let params = MotorParams {
            simulated: true,
            ..Default::default()
        };
        assert!(init_motors(&params).is_ok());
    }
}
