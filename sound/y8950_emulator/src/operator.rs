//! # Operator Implementation
//!
//! An operator (slot) is the basic building block of the FM engine: a phase
//! generator walking the log-sine table and an envelope generator shaping its
//! attenuation. A modulator operator additionally feeds its own averaged output
//! back into its phase.

use crate::*;

/// Sustain level step expressed in envelope steps
const SL_UNIT: u32 = (SL_STEP as f64 / EG_STEP) as u32;

/// Envelope phase at which decay hands over to sustain, for sustain level `sl`.
/// The top level (15) maps to 93 dB rather than 45 dB.
fn sustain_phase(sl: u8) -> u32 {
    let level = if sl == 15 { 31 } else { sl as u32 };
    (level * SL_UNIT) << EG_SHIFT
}

impl Operator {
    /// Creates an operator with a zeroed patch in the `Finish` state
    ///
    /// # Arguments
    /// * `role` - Modulator or carrier; fixed for the operator's lifetime
    pub fn new(role: Role) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    /// Returns the operator to its power-on state
    ///
    /// Phase, feedback and output history are cleared, the patch is zeroed and
    /// the envelope is parked in `Finish` at full attenuation. Derived values
    /// are recomputed from the cleared state.
    ///
    /// # Arguments
    /// * `tables` - Table bank of the owning chip
    pub fn reset(&mut self, tables: &TableBank) {
        *self = Self::new(self.role);
        self.recompute_all(tables);
    }

    /// Refreshes every derived value after a frequency or patch change
    ///
    /// Phase increment first, then total level, key scale rate and finally the
    /// envelope increment, which depends on the key scale rate.
    pub fn recompute_all(&mut self, tables: &TableBank) {
        self.update_pg(tables);
        self.update_tll(tables);
        self.update_rks(tables);
        self.update_eg(tables);
    }

    fn update_pg(&mut self, tables: &TableBank) {
        self.dphase = tables.dphase(self.fnum, self.block, self.patch.multiplier);
    }

    fn update_tll(&mut self, tables: &TableBank) {
        self.tll = tables.tll(
            self.fnum >> 6,
            self.block,
            self.patch.total_level,
            self.patch.key_scale_level,
        );
    }

    fn update_rks(&mut self, tables: &TableBank) {
        self.rks = tables.rks(self.fnum >> 9, self.block, self.patch.key_scale_rate);
    }

    /// Refreshes the envelope increment for the current mode and rates
    pub(crate) fn update_eg(&mut self, tables: &TableBank) {
        self.eg_dphase = match self.eg_mode {
            EnvelopeMode::Attack => tables.attack_rate(self.patch.attack_rate, self.rks),
            EnvelopeMode::Decay => tables.decay_rate(self.patch.decay_rate, self.rks),
            EnvelopeMode::Sustain => tables.decay_rate(self.patch.release_rate, self.rks),
            EnvelopeMode::Release if self.patch.sustain_hold => {
                tables.decay_rate(self.patch.release_rate, self.rks)
            }
            EnvelopeMode::Release => tables.decay_rate(7, self.rks),
            EnvelopeMode::SusHold | EnvelopeMode::Settle | EnvelopeMode::Finish => 0,
        };
    }

    /// Starts the envelope from the attack phase
    ///
    /// Both the waveform phase and the envelope phase restart from zero.
    pub fn key_on(&mut self, tables: &TableBank) {
        self.eg_mode = EnvelopeMode::Attack;
        self.phase = 0;
        self.eg_phase = 0;
        self.update_eg(tables);
    }

    /// Moves the envelope to the release phase
    ///
    /// An attack in progress is converted to the equivalent linear position so
    /// the release continues from the level actually reached.
    pub fn key_off(&mut self, tables: &TableBank) {
        if self.eg_mode == EnvelopeMode::Attack {
            self.eg_phase = tables.ar_adjust((self.eg_phase >> EG_SHIFT) as usize) << EG_SHIFT;
        }
        self.eg_mode = EnvelopeMode::Release;
        self.update_eg(tables);
    }

    pub(crate) fn set_fnumber(&mut self, fnum: u32) {
        self.fnum = fnum & 0x3ff;
    }

    pub(crate) fn set_block(&mut self, block: u32) {
        self.block = block & 7;
    }

    pub(crate) fn set_feedback(&mut self, feedback: u8) {
        self.patch.feedback = feedback & 7;
    }

    /// Decodes register 0x20: AM, PM, EG type, KSR and multiplier
    pub(crate) fn write_20(&mut self, val: u8) {
        self.patch.tremolo = val & MASK_TREMOLO != 0;
        self.patch.vibrato = val & MASK_VIBRATO != 0;
        self.patch.sustain_hold = val & MASK_SUSTAIN != 0;
        self.patch.key_scale_rate = val & MASK_KSR != 0;
        self.patch.multiplier = val & 0x0f;
    }

    /// Decodes register 0x40: key scale level and total level
    pub(crate) fn write_40(&mut self, val: u8) {
        self.patch.key_scale_level = (val >> 6) & 3;
        self.patch.total_level = val & 0x3f;
    }

    /// Decodes register 0x60: attack rate and decay rate
    pub(crate) fn write_60(&mut self, val: u8) {
        self.patch.attack_rate = (val >> 4) & 0x0f;
        self.patch.decay_rate = val & 0x0f;
    }

    /// Decodes register 0x80: sustain level and release rate
    pub(crate) fn write_80(&mut self, val: u8) {
        self.patch.sustain_level = (val >> 4) & 0x0f;
        self.patch.release_rate = val & 0x0f;
    }

    /// Advances the phase generator and returns the waveform index
    fn calc_phase(&mut self, lfo: &Lfo) -> u32 {
        if self.patch.vibrato {
            self.phase = self
                .phase
                .wrapping_add(self.dphase.wrapping_mul(lfo.pm() as u32) >> PM_AMP_BITS);
        } else {
            self.phase = self.phase.wrapping_add(self.dphase);
        }
        self.phase &= DP_WIDTH - 1;
        self.phase >> DP_BASE_BITS
    }

    /// Advances the envelope generator and returns the total attenuation
    fn calc_envelope(&mut self, tables: &TableBank, lfo: &Lfo) -> u32 {
        let mut out = match self.eg_mode {
            EnvelopeMode::Attack => {
                self.eg_phase = (self.eg_phase + self.eg_dphase) & EG_PHASE_MASK;
                if self.eg_phase & EG_DP_WIDTH != 0 {
                    self.eg_phase = 0;
                    self.eg_mode = EnvelopeMode::Decay;
                    self.update_eg(tables);
                    0
                } else {
                    tables.ar_adjust((self.eg_phase >> EG_SHIFT) as usize)
                }
            }
            EnvelopeMode::Decay => {
                self.eg_phase = (self.eg_phase + self.eg_dphase) & EG_PHASE_MASK;
                let sustain = sustain_phase(self.patch.sustain_level);
                if self.eg_phase >= sustain {
                    self.eg_phase = sustain;
                    self.eg_mode = if self.patch.sustain_hold {
                        EnvelopeMode::SusHold
                    } else {
                        EnvelopeMode::Sustain
                    };
                    self.update_eg(tables);
                }
                self.eg_phase >> EG_SHIFT
            }
            EnvelopeMode::SusHold => {
                if !self.patch.sustain_hold {
                    self.eg_mode = EnvelopeMode::Sustain;
                    self.update_eg(tables);
                }
                self.eg_phase >> EG_SHIFT
            }
            EnvelopeMode::Sustain | EnvelopeMode::Release => {
                self.eg_phase = (self.eg_phase + self.eg_dphase) & EG_PHASE_MASK;
                let out = self.eg_phase >> EG_SHIFT;
                if out >= 1 << EG_BITS {
                    self.eg_mode = EnvelopeMode::Finish;
                    self.eg_phase = EG_DP_WIDTH;
                    self.update_eg(tables);
                    (1 << EG_BITS) - 1
                } else {
                    out
                }
            }
            EnvelopeMode::Settle | EnvelopeMode::Finish => (1 << EG_BITS) - 1,
        };

        out += self.tll;
        if self.patch.tremolo {
            out += lfo.am();
        }
        out.min(DB_MUTE - 1)
    }

    /// Produces one carrier sample
    ///
    /// # Arguments
    /// * `tables` - Table bank of the owning chip
    /// * `lfo` - LFO state for the current sample
    /// * `fm` - Modulator output, or 0 for additive channels
    ///
    /// # Returns
    /// Signed linear amplitude, 0 when fully attenuated
    pub fn compute_carrier_sample(&mut self, tables: &TableBank, lfo: &Lfo, fm: i32) -> i32 {
        self.eg_out = self.calc_envelope(tables, lfo);
        self.pg_out = self.calc_phase(lfo);
        if self.eg_out >= DB_MUTE - 1 {
            return 0;
        }
        let index = (self.pg_out as i32).wrapping_add(fm << 1) & PG_MASK;
        tables.db2lin((tables.sin(index as usize) + self.eg_out) as usize)
    }

    /// Produces one modulator sample, applying self-feedback
    ///
    /// The returned value is the average of the last two outputs, which is
    /// also what is fed back into the next sample.
    pub fn compute_modulator_sample(&mut self, tables: &TableBank, lfo: &Lfo) -> i32 {
        self.output[1] = self.output[0];
        self.eg_out = self.calc_envelope(tables, lfo);
        self.pg_out = self.calc_phase(lfo);

        self.output[0] = if self.eg_out >= DB_MUTE - 1 {
            0
        } else {
            let index = if self.patch.feedback != 0 {
                let fm = self.feedback >> (7 - self.patch.feedback);
                (self.pg_out as i32).wrapping_add(fm) & PG_MASK
            } else {
                self.pg_out as i32
            };
            tables.db2lin((tables.sin(index as usize) + self.eg_out) as usize)
        };

        self.feedback = (self.output[1] + self.output[0]) >> 1;
        self.feedback
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn eg_mode(&self) -> EnvelopeMode {
        self.eg_mode
    }

    /// Phase accumulator
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Phase increment per sample
    pub fn dphase(&self) -> u32 {
        self.dphase
    }

    /// Envelope phase accumulator
    pub fn eg_phase(&self) -> u32 {
        self.eg_phase
    }

    /// Attenuation computed for the last sample
    pub fn eg_out(&self) -> u32 {
        self.eg_out
    }

    pub fn fnumber(&self) -> u32 {
        self.fnum
    }

    pub fn block(&self) -> u32 {
        self.block
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }
}
