//! L298N dual H-bridge on Raspberry Pi GPIO.
//!
//! Each channel has two direction inputs and an enable line driven with
//! software PWM.

use rppal::gpio::{Gpio, OutputPin};
use rover_traits::{Direction, MotorBridge, Wheel};

use crate::error::Result;

pub const PWM_FREQUENCY_HZ: f64 = 1000.0;

/// BCM pin numbers of one bridge channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPins {
    pub enable: u8,
    pub in_a: u8,
    pub in_b: u8,
}

struct Channel {
    enable: OutputPin,
    in_a: OutputPin,
    in_b: OutputPin,
}

impl Channel {
    fn open(gpio: &Gpio, pins: ChannelPins) -> Result<Self> {
        Ok(Self {
            enable: gpio.get(pins.enable)?.into_output_low(),
            in_a: gpio.get(pins.in_a)?.into_output_low(),
            in_b: gpio.get(pins.in_b)?.into_output_low(),
        })
    }

    fn apply(&mut self, direction: Direction, duty: u8) -> Result<()> {
        let (a, b) = direction.lines();
        set_level(&mut self.in_a, a);
        set_level(&mut self.in_b, b);
        if duty == 0 {
            self.enable.clear_pwm()?;
            self.enable.set_low();
        } else {
            self.enable
                .set_pwm_frequency(PWM_FREQUENCY_HZ, f64::from(duty) / 255.0)?;
        }
        Ok(())
    }
}

fn set_level(pin: &mut OutputPin, high: bool) {
    if high {
        pin.set_high();
    } else {
        pin.set_low();
    }
}

pub struct L298nBridge {
    left: Channel,
    right: Channel,
}

impl L298nBridge {
    pub fn new(left: ChannelPins, right: ChannelPins) -> Result<Self> {
        let gpio = Gpio::new()?;
        let bridge = Self {
            left: Channel::open(&gpio, left)?,
            right: Channel::open(&gpio, right)?,
        };
        tracing::info!(?left, ?right, "L298N bridge ready");
        Ok(bridge)
    }

    fn channel(&mut self, wheel: Wheel) -> &mut Channel {
        match wheel {
            Wheel::Left => &mut self.left,
            Wheel::Right => &mut self.right,
        }
    }
}

impl MotorBridge for L298nBridge {
    fn write(
        &mut self,
        wheel: Wheel,
        direction: Direction,
        duty: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.channel(wheel).apply(direction, duty)?;
        Ok(())
    }
}

impl Drop for L298nBridge {
    fn drop(&mut self) {
        for wheel in Wheel::BOTH {
            if let Err(e) = self.channel(wheel).apply(Direction::Coast, 0) {
                tracing::warn!(wheel = wheel.name(), error = %e, "failed to release bridge");
            }
        }
    }
}
