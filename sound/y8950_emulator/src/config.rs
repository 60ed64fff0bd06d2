use nanoserde::{DeRon, SerRon};

use crate::{ChannelMask, Error};

/// Master clock of an MSX-AUDIO cartridge
pub const DEFAULT_CLOCK: u32 = 3_579_545;
pub const DEFAULT_RATE: u32 = 44_100;

/// Construction parameters of a [`crate::Chip`], stored as RON
#[derive(Debug, Clone, PartialEq, Eq, DeRon, SerRon)]
pub struct ChipConfig {
    /// Master clock in Hz
    pub clock: u32,
    /// Output sample rate in Hz
    pub rate: u32,
    /// Initial channel mask, see [`ChannelMask`]
    pub mask: u32,
}

impl Default for ChipConfig {
    fn default() -> Self {
        ChipConfig {
            clock: DEFAULT_CLOCK,
            rate: DEFAULT_RATE,
            mask: 0,
        }
    }
}

impl ChipConfig {
    pub fn from_ron(text: &str) -> Result<Self, Error> {
        DeRon::deserialize_ron(text).map_err(|e| Error::config(format!("{e:?}")))
    }

    pub fn to_ron(&self) -> String {
        SerRon::serialize_ron(self)
    }

    pub fn channel_mask(&self) -> ChannelMask {
        ChannelMask::from_bits_retain(self.mask)
    }
}
