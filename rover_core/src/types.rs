//! Small value types shared across the control modules.

use rover_traits::Wheel;
use std::fmt;
use std::ops::{Index, IndexMut};

/// One value per wheel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> WheelPair<T> {
    pub const fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> WheelPair<U> {
        WheelPair {
            left: f(self.left),
            right: f(self.right),
        }
    }

    pub fn as_mut(&mut self) -> WheelPair<&mut T> {
        WheelPair {
            left: &mut self.left,
            right: &mut self.right,
        }
    }
}

impl<T: Clone> WheelPair<T> {
    pub fn splat(v: T) -> Self {
        Self {
            left: v.clone(),
            right: v,
        }
    }
}

impl<T> Index<Wheel> for WheelPair<T> {
    type Output = T;

    fn index(&self, wheel: Wheel) -> &T {
        match wheel {
            Wheel::Left => &self.left,
            Wheel::Right => &self.right,
        }
    }
}

impl<T> IndexMut<Wheel> for WheelPair<T> {
    fn index_mut(&mut self, wheel: Wheel) -> &mut T {
        match wheel {
            Wheel::Left => &mut self.left,
            Wheel::Right => &mut self.right,
        }
    }
}

/// Identifier the transport assigns to a remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which motors a calibration sweep drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorSelect {
    Left,
    Right,
    #[default]
    Both,
}

impl MotorSelect {
    pub fn drives(self, wheel: Wheel) -> bool {
        matches!(
            (self, wheel),
            (MotorSelect::Both, _)
                | (MotorSelect::Left, Wheel::Left)
                | (MotorSelect::Right, Wheel::Right)
        )
    }
}

impl std::str::FromStr for MotorSelect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown motor selection '{other}'")),
        }
    }
}

impl fmt::Display for MotorSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
        })
    }
}
