//! # Channel Implementation
//!
//! A channel pairs a modulator with a carrier to form one FM voice. The
//! connection between the two is selected by the algorithm bit of register
//! 0xC0: in serial mode the modulator drives the carrier's phase, in additive
//! mode both are heard directly.

use crate::*;

impl Channel {
    /// Creates a silent channel with zeroed patches
    pub fn new() -> Self {
        Self {
            modulator: Operator::new(Role::Modulator),
            carrier: Operator::new(Role::Carrier),
            algorithm: Algorithm::Serial,
            key_on: false,
        }
    }

    /// Resets both operators and the connection
    ///
    /// # Arguments
    /// * `tables` - Table bank of the owning chip
    pub fn reset(&mut self, tables: &TableBank) {
        self.modulator.reset(tables);
        self.carrier.reset(tables);
        self.algorithm = Algorithm::Serial;
        self.key_on = false;
    }

    pub fn modulator(&self) -> &Operator {
        &self.modulator
    }

    pub fn carrier(&self) -> &Operator {
        &self.carrier
    }

    pub fn modulator_mut(&mut self) -> &mut Operator {
        &mut self.modulator
    }

    pub fn carrier_mut(&mut self) -> &mut Operator {
        &mut self.carrier
    }

    /// Operator playing `role` in this channel
    pub fn operator(&self, role: Role) -> &Operator {
        match role {
            Role::Modulator => &self.modulator,
            Role::Carrier => &self.carrier,
        }
    }

    pub(crate) fn operator_mut(&mut self, role: Role) -> &mut Operator {
        match role {
            Role::Modulator => &mut self.modulator,
            Role::Carrier => &mut self.carrier,
        }
    }

    /// Keys both operators on
    pub fn key_on(&mut self, tables: &TableBank) {
        self.modulator.key_on(tables);
        self.carrier.key_on(tables);
        self.key_on = true;
    }

    /// Keys both operators off, starting their release
    pub fn key_off(&mut self, tables: &TableBank) {
        self.modulator.key_off(tables);
        self.carrier.key_off(tables);
        self.key_on = false;
    }

    /// Key state last written through register 0xB0
    pub fn is_keyed(&self) -> bool {
        self.key_on
    }

    /// Sets the frequency number of both operators; derived values are left
    /// for the caller to recompute
    pub fn set_fnumber(&mut self, fnum: u32) {
        self.modulator.set_fnumber(fnum);
        self.carrier.set_fnumber(fnum);
    }

    /// Sets the block of both operators; derived values are left for the
    /// caller to recompute
    pub fn set_block(&mut self, block: u32) {
        self.modulator.set_block(block);
        self.carrier.set_block(block);
    }

    /// Recomputes derived values of the modulator, then the carrier
    pub fn recompute_all(&mut self, tables: &TableBank) {
        self.modulator.recompute_all(tables);
        self.carrier.recompute_all(tables);
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        self.algorithm = algorithm;
    }

    /// A channel is skipped by the mixer once its carrier has finished
    pub fn is_active(&self) -> bool {
        self.carrier.eg_mode() != EnvelopeMode::Finish
    }

    /// Computes one sample of this channel
    ///
    /// The modulator is always evaluated before the carrier.
    ///
    /// # Arguments
    /// * `tables` - Table bank of the owning chip
    /// * `lfo` - LFO state for the current sample
    ///
    /// # Returns
    /// The channel's contribution before accumulation and halving
    pub fn render(&mut self, tables: &TableBank, lfo: &Lfo) -> i32 {
        let modulation = self.modulator.compute_modulator_sample(tables, lfo);
        match self.algorithm {
            Algorithm::Serial => self.carrier.compute_carrier_sample(tables, lfo, modulation),
            Algorithm::Additive => {
                self.carrier.compute_carrier_sample(tables, lfo, 0) + modulation
            }
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}
