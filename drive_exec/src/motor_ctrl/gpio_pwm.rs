//! Software PWM on a Raspberry Pi GPIO pin, exposed as an [`embedded_hal::PwmPin`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::PwmPin;
use log::warn;
use rppal::gpio::{Gpio, OutputPin};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Resolution of the duty exposed by [`GpioPwm`].
const GPIO_MAX_DUTY: u16 = 1023;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A GPIO output pin driven with software PWM.
pub struct GpioPwm {
    pin: OutputPin,
    bcm_pin: u8,
    frequency_hz: f64,
    duty: u16,
    enabled: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GpioPwm {
    /// Claim the given BCM pin as a low output.
    pub fn new(gpio: &Gpio, bcm_pin: u8, frequency_hz: f64) -> Result<Self, rppal::gpio::Error> {
        let pin = gpio.get(bcm_pin)?.into_output_low();

        Ok(Self {
            pin,
            bcm_pin,
            frequency_hz,
            duty: 0,
            enabled: false,
        })
    }

    /// Push the current duty out to the pin.
    fn apply(&mut self) {
        if !self.enabled || self.duty == 0 {
            if let Err(e) = self.pin.clear_pwm() {
                warn!("Could not clear PWM on GPIO {}: {}", self.bcm_pin, e);
            }
            self.pin.set_low();
            return
        }

        let duty_cycle = self.duty as f64 / GPIO_MAX_DUTY as f64;
        if let Err(e) = self.pin.set_pwm_frequency(self.frequency_hz, duty_cycle) {
            warn!("Could not set PWM on GPIO {}: {}", self.bcm_pin, e);
        }
    }
}

impl PwmPin for GpioPwm {
    type Duty = u16;

    fn disable(&mut self) {
        self.enabled = false;
        self.apply();
    }

    fn enable(&mut self) {
        self.enabled = true;
        self.apply();
    }

    fn get_duty(&self) -> u16 {
        self.duty
    }

    fn get_max_duty(&self) -> u16 {
        GPIO_MAX_DUTY
    }

    fn set_duty(&mut self, duty: u16) {
        let duty = duty.min(GPIO_MAX_DUTY);
        if duty != self.duty {
            self.duty = duty;
            self.apply();
        }
    }
}
