//! GPIO collaborator contract
//!
//! Register-level pin access lives in the board crate. The RTU engine only
//! needs to switch a pin's direction and level, so that is all this trait
//! asks for. An input pin on a line with an external pull-up reads as high;
//! releasing a line means switching it to input.

use crate::config::PinId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    Low,
    High,
}

/// A single claimed pin
pub trait Gpio {
    fn set_direction(&mut self, direction: Direction);
    fn write(&mut self, state: PinState);
    fn read(&self) -> PinState;
}

/// Source of pins addressed by [`PinId`]
pub trait GpioPort {
    type Pin: Gpio;

    /// Claim a pin; `None` if the board has no such pin
    fn claim(&mut self, id: PinId) -> Option<Self::Pin>;
}
