//! # Power Levels
//!
//! Ordered transmit power levels and the power-management seam the dynamic
//! power controller drives.

use std::fmt;

/// Supported transmit power levels, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PowerLevel {
    Mw10 = 0,
    Mw25,
    Mw50,
    Mw100,
    Mw250,
    Mw500,
    Mw1000,
    Mw2000,
}

impl PowerLevel {
    /// Every level in ascending order
    pub const ALL: [PowerLevel; 8] = [
        PowerLevel::Mw10,
        PowerLevel::Mw25,
        PowerLevel::Mw50,
        PowerLevel::Mw100,
        PowerLevel::Mw250,
        PowerLevel::Mw500,
        PowerLevel::Mw1000,
        PowerLevel::Mw2000,
    ];

    pub const MIN: PowerLevel = PowerLevel::Mw10;
    pub const MAX: PowerLevel = PowerLevel::Mw2000;

    /// Ordinal of this level (0 = lowest)
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn milliwatts(self) -> u16 {
        match self {
            PowerLevel::Mw10 => 10,
            PowerLevel::Mw25 => 25,
            PowerLevel::Mw50 => 50,
            PowerLevel::Mw100 => 100,
            PowerLevel::Mw250 => 250,
            PowerLevel::Mw500 => 500,
            PowerLevel::Mw1000 => 1000,
            PowerLevel::Mw2000 => 2000,
        }
    }

    /// Output power in dBm, rounded
    pub fn dbm(self) -> i8 {
        match self {
            PowerLevel::Mw10 => 10,
            PowerLevel::Mw25 => 14,
            PowerLevel::Mw50 => 17,
            PowerLevel::Mw100 => 20,
            PowerLevel::Mw250 => 24,
            PowerLevel::Mw500 => 27,
            PowerLevel::Mw1000 => 30,
            PowerLevel::Mw2000 => 33,
        }
    }

    pub fn from_milliwatts(mw: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|level| level.milliwatts() == mw)
    }

    /// Next level up, if any
    pub fn up(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Next level down, if any
    pub fn down(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mW", self.milliwatts())
    }
}

/// Power-management collaborator
///
/// Implementations clamp every change to their configured bounds.
#[cfg_attr(test, mockall::automock)]
pub trait PowerManagement {
    fn current_level(&self) -> PowerLevel;
    fn set_level(&mut self, level: PowerLevel);
    fn inc_level(&mut self);
    fn dec_level(&mut self);
}

/// Clamping power manager bounded by a floor and a ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerManager {
    current: PowerLevel,
    floor: PowerLevel,
    ceiling: PowerLevel,
}

impl PowerManager {
    /// Start at `ceiling`; `floor` above `ceiling` is lowered to it
    pub fn new(floor: PowerLevel, ceiling: PowerLevel) -> Self {
        Self {
            current: ceiling,
            floor: floor.min(ceiling),
            ceiling,
        }
    }

    pub fn floor(&self) -> PowerLevel {
        self.floor
    }

    pub fn ceiling(&self) -> PowerLevel {
        self.ceiling
    }
}

impl PowerManagement for PowerManager {
    fn current_level(&self) -> PowerLevel {
        self.current
    }

    fn set_level(&mut self, level: PowerLevel) {
        self.current = level.clamp(self.floor, self.ceiling);
    }

    fn inc_level(&mut self) {
        if let Some(next) = self.current.up() {
            self.set_level(next);
        }
    }

    fn dec_level(&mut self) {
        if let Some(next) = self.current.down() {
            self.set_level(next);
        }
    }
}
