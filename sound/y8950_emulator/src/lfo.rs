//! # Low Frequency Oscillator
//!
//! One LFO is shared by every operator of the chip. It produces the vibrato
//! multiplier and the tremolo attenuation for the current sample, and also
//! clocks the 16-bit noise generator used by the rhythm section.

use crate::*;

/// Initial state of the noise shift register
const NOISE_SEED: u32 = 0xffff;

/// Shared vibrato/tremolo modulator and noise generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lfo {
    /// Vibrato phase accumulator (16 bits)
    pm_phase: u32,
    /// Tremolo phase accumulator (16 bits)
    am_phase: u32,
    /// Deep vibrato selected by register 0xBD
    pm_mode: bool,
    /// Deep tremolo selected by register 0xBD
    am_mode: bool,
    /// Noise shift register
    noise_seed: u32,
    /// Last noise bit
    noise: u32,
    /// Current tremolo attenuation, in envelope steps
    am: u32,
    /// Current vibrato multiplier (256 = unity)
    pm: i32,
}

impl Default for Lfo {
    fn default() -> Self {
        Self {
            pm_phase: 0,
            am_phase: 0,
            pm_mode: false,
            am_mode: false,
            noise_seed: NOISE_SEED,
            noise: 0,
            am: 0,
            pm: 0,
        }
    }
}

impl Lfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the LFO to its power-on state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Selects the deep tremolo and deep vibrato tables
    pub fn set_modes(&mut self, am_mode: bool, pm_mode: bool) {
        self.am_mode = am_mode;
        self.pm_mode = pm_mode;
    }

    /// Advances both modulators and the noise generator by one sample
    ///
    /// # Arguments
    /// * `tables` - Table bank providing the LFO speeds and depth tables
    pub fn tick(&mut self, tables: &TableBank) {
        self.pm_phase = (self.pm_phase + tables.pm_dphase()) & (PM_DP_WIDTH - 1);
        self.am_phase = (self.am_phase + tables.am_dphase()) & (AM_DP_WIDTH - 1);
        self.am = tables.am(
            self.am_mode,
            (self.am_phase >> (AM_DP_BITS - AM_PG_BITS)) as usize,
        );
        self.pm = tables.pm(
            self.pm_mode,
            (self.pm_phase >> (PM_DP_BITS - PM_PG_BITS)) as usize,
        );
        self.step_noise();
    }

    fn step_noise(&mut self) {
        let seed = self.noise_seed;
        self.noise_seed = ((seed >> 15) ^ ((seed >> 12) & 1)) | ((seed << 1) & 0xffff);
        self.noise = self.noise_seed & 1;
    }

    pub fn pm_phase(&self) -> u32 {
        self.pm_phase
    }

    pub fn am_phase(&self) -> u32 {
        self.am_phase
    }

    pub fn pm_mode(&self) -> bool {
        self.pm_mode
    }

    pub fn am_mode(&self) -> bool {
        self.am_mode
    }

    pub fn noise(&self) -> u32 {
        self.noise
    }

    pub fn noise_seed(&self) -> u32 {
        self.noise_seed
    }

    /// Tremolo attenuation for the current sample
    pub fn am(&self) -> u32 {
        self.am
    }

    /// Vibrato multiplier for the current sample
    pub fn pm(&self) -> i32 {
        self.pm
    }
}
