//! Simulated [`MotorDriver`]

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};
use log::trace;

use super::{MotorDriver, MAX_DUTY};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A simulated motor which records the signed duty demanded of it.
pub struct SimMotor {
    name: &'static str,
    duty: Arc<AtomicI32>,
}

/// Read-only handle onto a [`SimMotor`]'s duty, which outlives the motor itself.
#[derive(Clone)]
pub struct SimMotorProbe {
    duty: Arc<AtomicI32>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimMotor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            duty: Arc::new(AtomicI32::new(0)),
        }
    }

    /// Get a probe which can observe this motor's duty.
    pub fn probe(&self) -> SimMotorProbe {
        SimMotorProbe {
            duty: self.duty.clone(),
        }
    }

    fn set(&mut self, duty: i32) {
        let prev = self.duty.swap(duty, Ordering::Relaxed);
        if prev != duty {
            trace!("SimMotor {}: {} -> {}", self.name, prev, duty);
        }
    }
}

impl MotorDriver for SimMotor {
    fn forward(&mut self, duty: u16) {
        self.set(duty.min(MAX_DUTY) as i32);
    }

    fn reverse(&mut self, duty: u16) {
        self.set(-(duty.min(MAX_DUTY) as i32));
    }

    fn stop(&mut self) {
        self.set(0);
    }
}

impl SimMotorProbe {
    /// The last signed duty demanded of the motor.
    pub fn duty(&self) -> i32 {
        self.duty.load(Ordering::Relaxed)
    }
}
