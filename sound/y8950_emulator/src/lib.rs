//! # Y8950 Emulator
//!
//! A Rust implementation of the Yamaha Y8950 (MSX-AUDIO) sound chip: a nine
//! channel, two-operator FM synthesiser from the OPL family with an integrated
//! delta-T ADPCM playback unit.
//!
//! The model is table driven and integer-only at run time. Lookup tables are
//! computed once from the clock and sample rate, after which the output is
//! reproducible sample for sample.
//!
//! ## Features
//!
//! - Full FM register map (0x20-0xC8 and 0xBD)
//! - Serial FM and additive channel algorithms with modulator self-feedback
//! - Six-state envelope generator with key scale rate and key scale level
//! - Shared vibrato/tremolo LFO with two depths each
//! - Indirect address/data I/O port emulation
//! - Per-channel output taps and channel masking for debugging
//! - Pluggable ADPCM collaborator with a delta-T default implementation
//!
//! Rhythm (percussion) synthesis is not modelled: register 0xBD only records
//! the rhythm flag and trigger bits, channels 6-8 keep playing melodically.
//!
//! ## Architecture
//!
//! - **TableBank**: waveform/level tables shared process wide plus per-chip
//!   timing tables derived from the clock and sample rate
//! - **Lfo**: pitch and amplitude modulators and the noise generator
//! - **Operator**: phase generator, envelope generator and patch of one slot
//! - **Channel**: a modulator and a carrier operator
//! - **Chip**: register decoding and the sample mixer
//!
//! ## Usage
//!
//! ```rust
//! use y8950_emulator::Chip;
//!
//! let mut chip = Chip::new(3_579_545, 44_100).expect("out of memory");
//!
//! chip.write_register(0x20, 0x01); // Modulator: multiplier 1
//! chip.write_register(0x23, 0x01); // Carrier: multiplier 1
//! chip.write_register(0x40, 0x10); // Modulator total level
//! chip.write_register(0x43, 0x00); // Carrier at full volume
//! chip.write_register(0x60, 0xF0); // Modulator attack/decay
//! chip.write_register(0x63, 0xF0); // Carrier attack/decay
//! chip.write_register(0xA0, 0x41); // Frequency number low byte
//! chip.write_register(0xB0, 0x32); // Block 4, key on
//!
//! let mut output = vec![0i16; 1024];
//! chip.render_block(&mut output);
//! ```
//!
//! ## Register Reference
//!
//! - `0x07-0x12`: ADPCM unit
//! - `0x20-0x35`: Operator parameters (AM/VIB/EG/KSR/MULT)
//! - `0x40-0x55`: Operator volume (KSL/TL)
//! - `0x60-0x75`: Operator envelope (AR/DR)
//! - `0x80-0x95`: Operator sustain/release (SL/RR)
//! - `0xA0-0xA8`: Channel frequency low byte
//! - `0xB0-0xB8`: Channel frequency high bits, block, key on/off
//! - `0xBD`: LFO depths and rhythm mode
//! - `0xC0-0xC8`: Channel feedback and connection

use bitflags::bitflags;

pub mod adpcm;
pub mod channel;
pub mod chip;
pub mod config;
pub mod error;
pub mod lfo;
pub mod operator;
pub mod tables;

pub use adpcm::{Adpcm, AdpcmStatus, AdpcmUnit};
pub use config::ChipConfig;
pub use error::Error;
pub use lfo::Lfo;
pub use tables::TableBank;

/// Bits of the phase generator output (size of the sine table)
const PG_BITS: u32 = 10;
/// Number of entries in the sine table
const PG_WIDTH: usize = 1 << PG_BITS;
/// Mask applied to waveform table indices
const PG_MASK: i32 = PG_WIDTH as i32 - 1;

/// Bits of the phase accumulator
const DP_BITS: u32 = 19;
/// Modulus of the phase accumulator
const DP_WIDTH: u32 = 1 << DP_BITS;
/// Fractional bits dropped when the phase becomes a table index
const DP_BASE_BITS: u32 = DP_BITS - PG_BITS;

/// Attenuation step of the dB tables
const DB_STEP: f64 = 0.1875;
/// Bits of attenuation
const DB_BITS: u32 = 9;
/// First attenuation value that is inaudible
const DB_MUTE: u32 = 1 << DB_BITS;

/// Attenuation step of the envelope generator
const EG_STEP: f64 = 0.1875;
/// Bits of the envelope output
const EG_BITS: u32 = 9;

/// Attenuation step of the total level register
const TL_STEP: f64 = 0.75;
/// Bits of the total level register
const TL_BITS: u32 = 6;

/// Attenuation step of the sustain level register
const SL_STEP: u32 = 3;

/// Bits of the linear amplitude produced by the dB-to-linear table
const DB2LIN_AMP_BITS: u32 = 11;

/// Bits of the envelope phase accumulator
const EG_DP_BITS: u32 = 23;
/// Envelope phase value at which attack completes and release goes silent
const EG_DP_WIDTH: u32 = 1 << EG_DP_BITS;
/// Mask of the envelope phase accumulator, including the overflow bit
const EG_PHASE_MASK: u32 = (EG_DP_WIDTH << 1) - 1;
/// Shift from envelope phase to envelope output
const EG_SHIFT: u32 = EG_DP_BITS - EG_BITS;

/// Bits of the pitch modulator table index
const PM_PG_BITS: u32 = 8;
/// Entries in the pitch modulator table
const PM_PG_WIDTH: usize = 1 << PM_PG_BITS;
/// Bits of the pitch modulator phase accumulator
const PM_DP_BITS: u32 = 16;
/// Modulus of the pitch modulator phase accumulator
const PM_DP_WIDTH: u32 = 1 << PM_DP_BITS;
/// Bits of the amplitude modulator table index
const AM_PG_BITS: u32 = 8;
/// Entries in the amplitude modulator table
const AM_PG_WIDTH: usize = 1 << AM_PG_BITS;
/// Bits of the amplitude modulator phase accumulator
const AM_DP_BITS: u32 = 16;
/// Modulus of the amplitude modulator phase accumulator
const AM_DP_WIDTH: u32 = 1 << AM_DP_BITS;

/// Fixed point scale of the pitch modulator table
const PM_AMP_BITS: u32 = 8;
const PM_AMP: f64 = (1 << PM_AMP_BITS) as f64;

/// Vibrato speed in Hz
const PM_SPEED: f64 = 6.4;
/// Shallow vibrato depth in cents
const PM_DEPTH: f64 = 13.75 / 2.0;
/// Deep vibrato depth in cents
const PM_DEPTH2: f64 = 13.75;

/// Tremolo speed in Hz
const AM_SPEED: f64 = 3.7;
/// Shallow tremolo depth in dB
const AM_DEPTH: f64 = 1.0;
/// Deep tremolo depth in dB
const AM_DEPTH2: f64 = 4.8;

/// Number of FM channels
pub const CHANNELS: usize = 9;
/// Number of operator slots
pub const SLOTS: usize = CHANNELS * 2;
/// Output accumulators: 0-8 FM, 9-13 rhythm (reserved), 14 ADPCM
pub const OUTPUT_SLOTS: usize = 15;
/// Output accumulator used by the ADPCM unit
pub const PCM_OUTPUT: usize = 14;

/// Register 0x20 bit: amplitude modulation enable
const MASK_TREMOLO: u8 = 0x80;
/// Register 0x20 bit: pitch modulation enable
const MASK_VIBRATO: u8 = 0x40;
/// Register 0x20 bit: envelope type (held sustain)
const MASK_SUSTAIN: u8 = 0x20;
/// Register 0x20 bit: key scale rate
const MASK_KSR: u8 = 0x10;
/// Register 0xB0 bit: key on
const MASK_KEY_ON: u8 = 0x20;
/// Register 0xBD bit: rhythm mode
const MASK_RHYTHM: u8 = 0x20;

/// Envelope generator state of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeMode {
    /// Defined by the hardware but never entered by this chip
    Settle,
    /// Level rising towards full volume
    Attack,
    /// Level falling towards the sustain level
    Decay,
    /// Level held at the sustain level while the key is down
    SusHold,
    /// Level falling at the release rate while the key is down
    Sustain,
    /// Level falling after key off
    Release,
    /// Silent until the next key on
    Finish,
}

/// Role of an operator within its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Feeds the carrier (serial) or the output (additive); owns feedback
    Modulator,
    /// Always audible
    Carrier,
}

/// How the two operators of a channel are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Modulator output phase-modulates the carrier
    #[default]
    Serial,
    /// Modulator and carrier outputs are summed
    Additive,
}

bitflags! {
    /// Channel mute mask used by [`Chip::set_mask`] and [`Chip::toggle_mask`].
    /// A muted channel is skipped entirely, its phase and envelope do not
    /// advance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChannelMask: u32 {
        const CH0 = 1 << 0;
        const CH1 = 1 << 1;
        const CH2 = 1 << 2;
        const CH3 = 1 << 3;
        const CH4 = 1 << 4;
        const CH5 = 1 << 5;
        const CH6 = 1 << 6;
        const CH7 = 1 << 7;
        const CH8 = 1 << 8;
        /// Hi-hat (reserved)
        const HH = 1 << 9;
        /// Cymbal (reserved)
        const CYM = 1 << 10;
        /// Tom-tom (reserved)
        const TOM = 1 << 11;
        /// Snare drum (reserved)
        const SD = 1 << 12;
        /// Bass drum (reserved)
        const BD = 1 << 13;
        const RHYTHM = Self::HH.bits()
            | Self::CYM.bits()
            | Self::TOM.bits()
            | Self::SD.bits()
            | Self::BD.bits();
        /// ADPCM unit
        const PCM = 1 << 14;
    }
}

impl ChannelMask {
    /// Mask bit of FM channel `channel` (0-8), empty for any other index
    pub const fn channel(channel: usize) -> Self {
        if channel < CHANNELS {
            Self::from_bits_retain(1 << channel)
        } else {
            Self::empty()
        }
    }
}

/// Typed index of one of the 18 operator slots.
///
/// Slot `2c` is the modulator and slot `2c + 1` the carrier of channel `c`;
/// the mapping is kept as an explicit table rather than computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u8);

/// (channel, role) of every slot
static SLOT_LOCATION: [(usize, Role); SLOTS] = [
    (0, Role::Modulator),
    (0, Role::Carrier),
    (1, Role::Modulator),
    (1, Role::Carrier),
    (2, Role::Modulator),
    (2, Role::Carrier),
    (3, Role::Modulator),
    (3, Role::Carrier),
    (4, Role::Modulator),
    (4, Role::Carrier),
    (5, Role::Modulator),
    (5, Role::Carrier),
    (6, Role::Modulator),
    (6, Role::Carrier),
    (7, Role::Modulator),
    (7, Role::Carrier),
    (8, Role::Modulator),
    (8, Role::Carrier),
];

impl SlotId {
    /// Returns the slot with index `index`, if it exists
    pub const fn new(index: usize) -> Option<Self> {
        if index < SLOTS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Slot index (0-17)
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Channel owning this slot
    pub fn channel(self) -> usize {
        SLOT_LOCATION[self.index()].0
    }

    /// Role of this slot within its channel
    pub fn role(self) -> Role {
        SLOT_LOCATION[self.index()].1
    }
}

/// Timbre parameters of one operator, as decoded from its registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Patch {
    /// Total level, 0.75 dB steps (0-63)
    pub total_level: u8,
    /// Feedback shift of the modulator (0 disables feedback)
    pub feedback: u8,
    /// Envelope type: hold the sustain level while the key is down
    pub sustain_hold: bool,
    /// Frequency multiplier code (0-15)
    pub multiplier: u8,
    /// Attack rate (0-15)
    pub attack_rate: u8,
    /// Decay rate (0-15)
    pub decay_rate: u8,
    /// Sustain level, 3 dB steps (0-15)
    pub sustain_level: u8,
    /// Release rate (0-15)
    pub release_rate: u8,
    /// Key scale rate enable
    pub key_scale_rate: bool,
    /// Key scale level code (0-3)
    pub key_scale_level: u8,
    /// Amplitude modulation (tremolo) enable
    pub tremolo: bool,
    /// Pitch modulation (vibrato) enable
    pub vibrato: bool,
    /// Waveform select; the Y8950 only has the sine wave
    pub waveform: u8,
}

/// A single FM operator (slot)
///
/// An operator combines a phase generator reading the log-sine table with an
/// envelope generator. The derived fields (`dphase`, `tll`, `rks`,
/// `eg_dphase`) are refreshed by [`Operator::recompute_all`] whenever the
/// frequency or the patch changes.
#[derive(Debug, Clone)]
pub struct Operator {
    /// Modulator or carrier, fixed at creation
    role: Role,
    /// Averaged output of the last two samples, fed back into the modulator
    feedback: i32,
    /// Current and previous output sample
    output: [i32; 2],
    /// Phase accumulator (`DP_BITS` wide)
    phase: u32,
    /// Phase increment per sample
    dphase: u32,
    /// Current waveform table index
    pg_out: u32,
    /// Frequency number (10 bits)
    fnum: u32,
    /// Block / octave (3 bits)
    block: u32,
    /// Total level plus key scale level, in envelope steps
    tll: u32,
    /// Key scale rate offset
    rks: u32,
    /// Current envelope generator state
    eg_mode: EnvelopeMode,
    /// Envelope phase accumulator
    eg_phase: u32,
    /// Envelope phase increment per sample
    eg_dphase: u32,
    /// Current attenuation after envelope, level and tremolo
    eg_out: u32,
    /// Timbre parameters
    patch: Patch,
}

impl Default for Operator {
    fn default() -> Self {
        Self {
            role: Role::Modulator,
            feedback: 0,
            output: [0, 0],
            phase: 0,
            dphase: 0,
            pg_out: 0,
            fnum: 0,
            block: 0,
            tll: 0,
            rks: 0,
            eg_mode: EnvelopeMode::Finish,
            eg_phase: EG_DP_WIDTH,
            eg_dphase: 0,
            eg_out: 0,
            patch: Patch::default(),
        }
    }
}

/// A single FM channel made of a modulator and a carrier
#[derive(Debug, Clone)]
pub struct Channel {
    /// First operator; owns the feedback network
    modulator: Operator,
    /// Second operator; always reaches the output
    carrier: Operator,
    /// Operator connection
    algorithm: Algorithm,
    /// Key on state from register 0xB0
    key_on: bool,
}

/// The Y8950 chip
///
/// Owns nine channels, the register image, the LFO and the ADPCM unit. The
/// ADPCM unit is a type parameter so hosts can substitute their own; the
/// default is the built-in delta-T [`Adpcm`].
pub struct Chip<A: AdpcmUnit = Adpcm> {
    /// Lookup tables for this chip's clock and sample rate
    tables: TableBank,
    /// ADPCM collaborator, created and dropped with the chip
    adpcm: A,
    /// Register latched by the address port
    address: u8,
    /// Last value written to every register
    reg: [u8; 256],
    /// Rhythm trigger bits per slot (recorded, not synthesised)
    slot_on_flag: [bool; SLOTS],
    /// Rhythm mode bit of register 0xBD
    rhythm_mode: bool,
    /// Vibrato, tremolo and noise
    lfo: Lfo,
    /// The nine FM channels
    channels: [Channel; CHANNELS],
    /// Muted channels
    mask: ChannelMask,
    /// Per-channel output accumulators
    ch_out: [i16; OUTPUT_SLOTS],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(PG_WIDTH, 1024);
        assert_eq!(DP_BASE_BITS, 9);
        assert_eq!(DB_MUTE, 512);
        assert_eq!(EG_SHIFT, 14);
        assert_eq!(EG_PHASE_MASK, 0x00FF_FFFF);
    }

    #[test]
    fn test_operator_default() {
        let op = Operator::default();
        assert_eq!(op.eg_mode, EnvelopeMode::Finish);
        assert_eq!(op.eg_phase, EG_DP_WIDTH);
        assert_eq!(op.patch, Patch::default());
    }

    #[test]
    fn test_slot_location() {
        for index in 0..SLOTS {
            let slot = SlotId::new(index).unwrap();
            assert_eq!(slot.channel(), index / 2);
            let role = if index % 2 == 0 {
                Role::Modulator
            } else {
                Role::Carrier
            };
            assert_eq!(slot.role(), role);
        }
        assert!(SlotId::new(SLOTS).is_none());
    }

    #[test]
    fn test_channel_mask() {
        assert_eq!(ChannelMask::channel(0), ChannelMask::CH0);
        assert_eq!(ChannelMask::channel(8), ChannelMask::CH8);
        assert!(ChannelMask::channel(9).is_empty());
        assert!(ChannelMask::channel(40).is_empty());
        assert!(ChannelMask::channel(usize::MAX).is_empty());
        assert_eq!(ChannelMask::RHYTHM.bits(), 0x3E00);
        assert_eq!(ChannelMask::PCM.bits(), 1 << 14);
    }

    #[test]
    fn test_register_masks() {
        assert_eq!(MASK_TREMOLO, 0x80);
        assert_eq!(MASK_VIBRATO, 0x40);
        assert_eq!(MASK_SUSTAIN, 0x20);
        assert_eq!(MASK_KSR, 0x10);
    }
}
