//! [`MotorDriver`] implementation for the MX1508 dual H-bridge.
//!
//! Each motor on the MX1508 has two inputs. Driving IN1 with a PWM signal while IN2 is held low
//! turns the motor forwards, swapping the inputs turns it in reverse, and holding both low lets the
//! motor coast to a stop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::PwmPin;

use super::{MotorDriver, MAX_DUTY};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One motor channel of an MX1508.
pub struct Mx1508<P>
where
    P: PwmPin<Duty = u16>
{
    in1: P,
    in2: P,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P> Mx1508<P>
where
    P: PwmPin<Duty = u16>
{
    /// Create a new channel from its two input pins. Both inputs are enabled and held low.
    pub fn new(mut in1: P, mut in2: P) -> Self {
        in1.set_duty(0);
        in2.set_duty(0);
        in1.enable();
        in2.enable();

        Self { in1, in2 }
    }

    /// Release the input pins, leaving them low.
    pub fn release(mut self) -> (P, P) {
        self.stop();
        (self.in1, self.in2)
    }

    /// Scale a duty on the `[0, MAX_DUTY]` scale to the pin's own duty range.
    fn scale(pin: &P, duty: u16) -> u16 {
        let duty = duty.min(MAX_DUTY) as u32;
        (duty * pin.get_max_duty() as u32 / MAX_DUTY as u32) as u16
    }
}

impl<P> MotorDriver for Mx1508<P>
where
    P: PwmPin<Duty = u16>
{
    fn forward(&mut self, duty: u16) {
        let duty = Self::scale(&self.in1, duty);
        self.in2.set_duty(0);
        self.in1.set_duty(duty);
    }

    fn reverse(&mut self, duty: u16) {
        let duty = Self::scale(&self.in2, duty);
        self.in1.set_duty(0);
        self.in2.set_duty(duty);
    }

    fn stop(&mut self) {
        self.in1.set_duty(0);
        self.in2.set_duty(0);
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// PWM pin which just remembers what it was told.
    struct MockPin {
        duty: u16,
        max_duty: u16,
        enabled: bool,
    }

    impl MockPin {
        fn new(max_duty: u16) -> Self {
            Self { duty: 0xFFFF, max_duty, enabled: false }
        }
    }

    impl PwmPin for MockPin {
        type Duty = u16;

        fn disable(&mut self) {
            self.enabled = false;
        }

        fn enable(&mut self) {
            self.enabled = true;
        }

        fn get_duty(&self) -> u16 {
            self.duty
        }

        fn get_max_duty(&self) -> u16 {
            self.max_duty
        }

        fn set_duty(&mut self, duty: u16) {
            self.duty = duty;
        }
    }

    fn duties(m: &Mx1508<MockPin>) -> (u16, u16) {
        (m.in1.get_duty(), m.in2.get_duty())
    }

    #[test]
    fn test_new_holds_inputs_low() {
        let m = Mx1508::new(MockPin::new(MAX_DUTY), MockPin::new(MAX_DUTY));
        assert_eq!(duties(&m), (0, 0));
        assert!(m.in1.enabled && m.in2.enabled);
    }

    #[test]
    fn test_direction_selects_input() {
        let mut m = Mx1508::new(MockPin::new(MAX_DUTY), MockPin::new(MAX_DUTY));

        m.forward(512);
        assert_eq!(duties(&m), (512, 0));

        m.reverse(300);
        assert_eq!(duties(&m), (0, 300));

        m.stop();
        assert_eq!(duties(&m), (0, 0));
        m.stop();
        assert_eq!(duties(&m), (0, 0));
    }

    #[test]
    fn test_duty_scaled_to_pin_range() {
        let mut m = Mx1508::new(MockPin::new(4095), MockPin::new(4095));

        m.forward(MAX_DUTY);
        assert_eq!(duties(&m), (4095, 0));

        // Demands beyond the maximum are limited
        m.reverse(u16::MAX);
        assert_eq!(duties(&m), (0, 4095));
    }

    #[test]
    fn test_release_leaves_pins_low() {
        let mut m = Mx1508::new(MockPin::new(MAX_DUTY), MockPin::new(MAX_DUTY));
        m.forward(100);

        let (in1, in2) = m.release();
        assert_eq!((in1.get_duty(), in2.get_duty()), (0, 0));
    }
}
