//! # Chip Implementation
//!
//! The chip ties the nine channels, the LFO and the ADPCM unit together. It
//! decodes register writes into operator patches, drives the per-sample
//! update and mixes everything into one signed 16-bit sample.

use log::{debug, info, trace};

use crate::*;

/// Operator slot addressed by the low five bits of the 0x20-0x95 registers
static SLOT_TABLE: [Option<u8>; 32] = [
    Some(0),
    Some(2),
    Some(4),
    Some(1),
    Some(3),
    Some(5),
    None,
    None,
    Some(6),
    Some(8),
    Some(10),
    Some(7),
    Some(9),
    Some(11),
    None,
    None,
    Some(12),
    Some(14),
    Some(16),
    Some(13),
    Some(15),
    Some(17),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
];

/// Rhythm trigger bits of register 0xBD and the slots they key
static RHYTHM_TRIGGERS: [(u8, &[usize]); 5] = [
    (0x10, &[12, 13]), // Bass drum
    (0x08, &[15]),     // Snare drum
    (0x04, &[16]),     // Tom-tom
    (0x02, &[17]),     // Top cymbal
    (0x01, &[14]),     // Hi-hat
];

fn slot_for_register(reg: u32) -> Option<SlotId> {
    SLOT_TABLE[(reg & 0x1f) as usize].and_then(|slot| SlotId::new(slot as usize))
}

fn slot_operator(channels: &mut [Channel; CHANNELS], slot: SlotId) -> &mut Operator {
    channels[slot.channel()].operator_mut(slot.role())
}

/// Channel addressed by registers 0xA0-0xC8, if any
fn channel_for_register(reg: u32) -> Option<usize> {
    let channel = (reg & 0x0f) as usize;
    (channel < CHANNELS).then_some(channel)
}

impl Chip {
    /// Creates a chip with the built-in ADPCM unit
    ///
    /// # Arguments
    /// * `clock` - Master clock in Hz, typically 3579545
    /// * `rate` - Output sample rate in Hz
    ///
    /// # Errors
    /// [`Error::Allocation`] if the tables or the sample RAM cannot be
    /// allocated, [`Error::Config`] if `clock` or `rate` is zero.
    pub fn new(clock: u32, rate: u32) -> Result<Self, Error> {
        Self::with_adpcm(clock, rate)
    }

    /// Creates a chip from a stored configuration, applying its mask
    pub fn from_config(config: &ChipConfig) -> Result<Self, Error> {
        let mut chip = Self::new(config.clock, config.rate)?;
        chip.set_mask(config.channel_mask());
        Ok(chip)
    }
}

impl<A: AdpcmUnit> Chip<A> {
    /// Creates a chip with a caller supplied ADPCM unit type
    pub fn with_adpcm(clock: u32, rate: u32) -> Result<Self, Error> {
        let tables = TableBank::new(clock, rate)?;
        let adpcm = A::new(clock, rate)?;
        let mut chip = Self {
            tables,
            adpcm,
            address: 0,
            reg: [0; 256],
            slot_on_flag: [false; SLOTS],
            rhythm_mode: false,
            lfo: Lfo::new(),
            channels: std::array::from_fn(|_| Channel::new()),
            mask: ChannelMask::empty(),
            ch_out: [0; OUTPUT_SLOTS],
        };
        chip.reset();
        info!("Y8950 initialised: clock {clock} Hz, rate {rate} Hz");
        Ok(chip)
    }

    /// Changes the output sample rate
    ///
    /// The timing tables are rebuilt, every operator picks up the new phase
    /// and envelope increments, and the ADPCM unit is informed. Envelope and
    /// phase positions are kept. A zero rate is ignored.
    pub fn set_rate(&mut self, rate: u32) {
        if self.tables.set_rate(rate) {
            for channel in self.channels.iter_mut() {
                channel.recompute_all(&self.tables);
            }
            debug!("Sample rate changed to {rate} Hz");
        }
        self.adpcm.set_rate(rate);
    }

    /// Resets all runtime state
    ///
    /// Every patch is zeroed and every operator parked in `Finish`. The mask,
    /// the address latch and the ADPCM sample RAM are kept.
    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset(&self.tables);
        }
        self.rhythm_mode = false;
        self.lfo.reset();
        self.reg = [0; 256];
        self.slot_on_flag = [false; SLOTS];
        self.ch_out = [0; OUTPUT_SLOTS];
        self.adpcm.reset();
        debug!("Y8950 reset");
    }

    /// Writes `val` to register `reg`
    ///
    /// Register ranges:
    /// - 0x07-0x12: ADPCM unit
    /// - 0x20-0x95: operator parameters, see [`Operator`]
    /// - 0xA0-0xC8: channel frequency, key and connection
    /// - 0xBD: LFO depths and rhythm mode
    ///
    /// # Arguments
    /// * `reg` - Register number, masked to 8 bits
    /// * `val` - Value to write
    pub fn write_register(&mut self, reg: u32, val: u8) {
        let reg = reg & 0xff;
        match (reg & 0xF0) >> 4 {
            0x00 | 0x01 => {
                if (0x07..=0x12).contains(&reg) {
                    self.adpcm.write_register(reg as u8, val);
                }
            }
            0x02 | 0x03 => {
                if let Some(slot) = slot_for_register(reg) {
                    let op = slot_operator(&mut self.channels, slot);
                    op.write_20(val);
                    op.recompute_all(&self.tables);
                }
            }
            0x04 | 0x05 => {
                if let Some(slot) = slot_for_register(reg) {
                    let op = slot_operator(&mut self.channels, slot);
                    op.write_40(val);
                    op.recompute_all(&self.tables);
                }
            }
            0x06 | 0x07 => {
                if let Some(slot) = slot_for_register(reg) {
                    let op = slot_operator(&mut self.channels, slot);
                    op.write_60(val);
                    op.update_eg(&self.tables);
                }
            }
            0x08 | 0x09 => {
                if let Some(slot) = slot_for_register(reg) {
                    let op = slot_operator(&mut self.channels, slot);
                    op.write_80(val);
                    op.update_eg(&self.tables);
                }
            }
            0x0A => {
                if let Some(c) = channel_for_register(reg) {
                    let high = u32::from(self.reg[reg as usize + 0x10]) & 3;
                    let fnum = u32::from(val) + (high << 8);
                    let channel = &mut self.channels[c];
                    channel.set_fnumber(fnum);
                    channel.recompute_all(&self.tables);
                }
            }
            0x0B => {
                if reg == 0xBD {
                    self.write_bd(val);
                } else if let Some(c) = channel_for_register(reg) {
                    self.write_b0(c, reg, val);
                }
            }
            0x0C => {
                if let Some(c) = channel_for_register(reg) {
                    let channel = &mut self.channels[c];
                    channel.modulator_mut().set_feedback((val >> 1) & 7);
                    channel.set_algorithm(if val & 1 != 0 {
                        Algorithm::Additive
                    } else {
                        Algorithm::Serial
                    });
                }
            }
            _ => {}
        }
        self.reg[reg as usize] = val;
    }

    /// Frequency high bits, block and key of channel `c`
    fn write_b0(&mut self, c: usize, reg: u32, val: u8) {
        let fnum = (u32::from(val & 3) << 8) + u32::from(self.reg[reg as usize - 0x10]);
        let was_keyed = self.reg[reg as usize] & MASK_KEY_ON != 0;
        let channel = &mut self.channels[c];
        channel.set_fnumber(fnum);
        channel.set_block(u32::from(val >> 2) & 7);

        if !was_keyed && val & MASK_KEY_ON != 0 {
            trace!("Key on channel {c}, fnum {fnum:#05x}");
            channel.key_on(&self.tables);
        } else if val & MASK_KEY_ON == 0 {
            if was_keyed {
                trace!("Key off channel {c}");
            }
            channel.key_off(&self.tables);
        }
        channel.recompute_all(&self.tables);
    }

    /// LFO depths, rhythm mode and rhythm triggers
    fn write_bd(&mut self, val: u8) {
        let rhythm_mode = val & MASK_RHYTHM != 0;
        if rhythm_mode != self.rhythm_mode {
            debug!("Rhythm mode {}", if rhythm_mode { "on" } else { "off" });
        }
        self.rhythm_mode = rhythm_mode;
        self.lfo.set_modes(val & 0x80 != 0, val & 0x40 != 0);

        if self.rhythm_mode {
            for (bit, slots) in RHYTHM_TRIGGERS.iter() {
                for &slot in slots.iter() {
                    self.slot_on_flag[slot] = val & bit != 0;
                }
            }
        } else {
            self.slot_on_flag = [false; SLOTS];
        }
    }

    /// Indirect port access: an even address latches the register number, an
    /// odd address writes the latched register
    pub fn write_io(&mut self, address: u32, val: u8) {
        if address & 1 != 0 {
            self.write_register(u32::from(self.address), val);
        } else {
            self.address = val;
        }
    }

    /// Last value written to the latched register
    pub fn read_io(&self) -> u8 {
        self.reg[self.address as usize]
    }

    /// ADPCM status register
    pub fn status(&self) -> u8 {
        self.adpcm.status()
    }

    /// Computes one output sample
    ///
    /// Each accumulator adds its source and is then halved with an arithmetic
    /// shift. A masked or idle accumulator therefore decays to 0 when it was
    /// non-negative and to -1 when it was negative.
    pub fn render(&mut self) -> i16 {
        self.lfo.tick(&self.tables);

        for (i, channel) in self.channels.iter_mut().enumerate() {
            if !self.mask.contains(ChannelMask::channel(i)) && channel.is_active() {
                let sample = channel.render(&self.tables, &self.lfo);
                self.ch_out[i] = self.ch_out[i].wrapping_add(sample as i16);
            }
            self.ch_out[i] >>= 1;
        }

        if !self.mask.contains(ChannelMask::PCM) {
            self.ch_out[PCM_OUTPUT] = self.ch_out[PCM_OUTPUT].wrapping_add(self.adpcm.render());
        }
        self.ch_out[PCM_OUTPUT] >>= 1;

        let out: i32 = self.ch_out.iter().map(|&s| i32::from(s)).sum();
        out.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    /// Fills `output` with consecutive samples
    pub fn render_block(&mut self, output: &mut [i16]) {
        for sample in output.iter_mut() {
            *sample = self.render();
        }
    }

    /// Replaces the channel mask, returning the previous one
    pub fn set_mask(&mut self, mask: ChannelMask) -> ChannelMask {
        std::mem::replace(&mut self.mask, mask)
    }

    /// Flips the bits of `mask`, returning the previous mask
    pub fn toggle_mask(&mut self, mask: ChannelMask) -> ChannelMask {
        let previous = self.mask;
        self.mask.toggle(mask);
        previous
    }

    pub fn mask(&self) -> ChannelMask {
        self.mask
    }

    pub fn clock(&self) -> u32 {
        self.tables.clock()
    }

    pub fn rate(&self) -> u32 {
        self.tables.rate()
    }

    pub fn tables(&self) -> &TableBank {
        &self.tables
    }

    /// Channel `index`, if it exists
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn operator(&self, slot: SlotId) -> &Operator {
        self.channels[slot.channel()].operator(slot.role())
    }

    /// Output accumulator `index` (0-8 FM, 9-13 rhythm, 14 ADPCM)
    pub fn channel_output(&self, index: usize) -> i16 {
        self.ch_out.get(index).copied().unwrap_or(0)
    }

    pub fn rhythm_mode(&self) -> bool {
        self.rhythm_mode
    }

    /// Whether the rhythm trigger for `slot` was set by the last 0xBD write
    pub fn rhythm_triggered(&self, slot: SlotId) -> bool {
        self.slot_on_flag[slot.index()]
    }

    pub fn lfo(&self) -> &Lfo {
        &self.lfo
    }

    pub fn adpcm(&self) -> &A {
        &self.adpcm
    }

    pub fn adpcm_mut(&mut self) -> &mut A {
        &mut self.adpcm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOCK: u32 = 3_579_545;
    const RATE: u32 = 44_100;

    fn chip() -> Chip {
        Chip::new(CLOCK, RATE).unwrap()
    }

    /// A plain sine voice on channel `c`: quiet modulator, loud carrier
    fn program_voice(chip: &mut Chip, c: u32) {
        let op = [0x00, 0x01, 0x02, 0x08, 0x09, 0x0A, 0x10, 0x11, 0x12][c as usize];
        chip.write_register(0x20 + op, 0x01);
        chip.write_register(0x23 + op, 0x01);
        chip.write_register(0x40 + op, 0x3f);
        chip.write_register(0x43 + op, 0x00);
        chip.write_register(0x60 + op, 0xF2);
        chip.write_register(0x63 + op, 0xF2);
        chip.write_register(0x80 + op, 0x04);
        chip.write_register(0x83 + op, 0x04);
        chip.write_register(0xA0 + c, 0x41);
    }

    fn key_on(chip: &mut Chip, c: u32) {
        chip.write_register(0xB0 + c, 0x32);
    }

    fn key_off(chip: &mut Chip, c: u32) {
        chip.write_register(0xB0 + c, 0x12);
    }

    fn carrier(c: usize) -> SlotId {
        SlotId::new(c * 2 + 1).unwrap()
    }

    #[test]
    fn test_new_chip_is_silent() {
        let _ = simplelog::SimpleLogger::init(log::LevelFilter::Trace, simplelog::Config::default());
        let mut chip = chip();
        assert_eq!(chip.clock(), CLOCK);
        assert_eq!(chip.rate(), RATE);
        for _ in 0..1000 {
            assert_eq!(chip.render(), 0);
        }
        for c in 0..CHANNELS {
            assert!(!chip.channel(c).unwrap().is_active());
        }
    }

    #[test]
    fn test_slot_table_decode() {
        let mut chip = chip();
        chip.write_register(0x2B, 0x05);
        let slot = SlotId::new(7).unwrap();
        assert_eq!(slot.channel(), 3);
        assert_eq!(slot.role(), Role::Carrier);
        assert_eq!(chip.operator(slot).patch().multiplier, 5);

        // Holes in the slot table are ignored but latched
        chip.write_register(0x26, 0xFF);
        assert_eq!(chip.reg[0x26], 0xFF);
        for index in 0..SLOTS {
            if index != 7 {
                assert_eq!(chip.operator(SlotId::new(index).unwrap()).patch().multiplier, 0);
            }
        }
    }

    #[test]
    fn test_frequency_registers() {
        let mut chip = chip();
        chip.write_register(0xB2, 0x11);
        chip.write_register(0xA2, 0x80);
        let channel = chip.channel(2).unwrap();
        assert_eq!(channel.carrier().fnumber(), 0x180);
        assert_eq!(channel.modulator().block(), 4);
        // Key bit was never set
        assert!(!channel.is_keyed());
    }

    #[test]
    fn test_connection_register() {
        let mut chip = chip();
        chip.write_register(0xC4, 0x0B);
        let channel = chip.channel(4).unwrap();
        assert_eq!(channel.algorithm(), Algorithm::Additive);
        assert_eq!(channel.modulator().patch().feedback, 5);
        assert_eq!(channel.carrier().patch().feedback, 0);
    }

    #[test]
    fn test_key_edges() {
        let mut chip = chip();
        program_voice(&mut chip, 0);
        key_on(&mut chip, 0);
        assert_eq!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Attack);

        for _ in 0..100 {
            chip.render();
        }
        // Rewriting with the key still set is not a new key on
        chip.write_register(0xA0, 0x50);
        key_on(&mut chip, 0);
        assert_ne!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Attack);
        assert_ne!(chip.operator(carrier(0)).phase(), 0);

        key_off(&mut chip, 0);
        assert_eq!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Release);
        assert!(!chip.channel(0).unwrap().is_keyed());

        key_on(&mut chip, 0);
        assert_eq!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Attack);
    }

    #[test]
    fn test_end_to_end_voice() {
        let mut chip = chip();
        program_voice(&mut chip, 0);
        key_on(&mut chip, 0);

        let mut block = vec![0i16; RATE as usize];
        chip.render_block(&mut block);
        let peak = block.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > 500);
        assert!(block.iter().any(|&s| s > 0) && block.iter().any(|&s| s < 0));
        // Still sounding while the key is held
        assert!(block[block.len() - 2048..].iter().any(|&s| s != 0));

        key_off(&mut chip, 0);
        let mut tail = vec![0i16; RATE as usize];
        chip.render_block(&mut tail);
        assert_eq!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Finish);
        // Only channel 0 ever sounded, so the tail is its settled residue
        let residue = if chip.channel_output(0) < 0 { -1 } else { 0 };
        assert_eq!(chip.channel_output(0), residue);
        assert!(tail[tail.len() - 64..].iter().all(|&s| s == residue));
    }

    #[test]
    fn test_sustained_voice_until_key_off() {
        let mut chip = chip();
        // Modulator silent, carrier AR 15, DR 0, SL 0, RR 0, TL 0
        chip.write_register(0x20, 0x01);
        chip.write_register(0x23, 0x01);
        chip.write_register(0x40, 0x3f);
        chip.write_register(0x43, 0x00);
        chip.write_register(0x60, 0xF0);
        chip.write_register(0x63, 0xF0);
        chip.write_register(0x80, 0x00);
        chip.write_register(0x83, 0x00);
        chip.write_register(0xA0, 0x41);
        key_on(&mut chip, 0);

        let mut block = vec![0i16; RATE as usize];
        chip.render_block(&mut block);
        let op = chip.operator(carrier(0));
        assert_eq!(op.eg_mode(), EnvelopeMode::Sustain);
        assert_eq!(op.eg_phase(), 0);
        let peak = block.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > 500);
        let late = block[block.len() - 2048..].iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(late > 500);

        // Release falls back to rate 7 since the EG type bit is clear
        key_off(&mut chip, 0);
        assert_eq!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Release);
        let mut tail = vec![0i16; RATE as usize];
        chip.render_block(&mut tail);
        assert_eq!(chip.operator(carrier(0)).eg_mode(), EnvelopeMode::Finish);
        let residue = if chip.channel_output(0) < 0 { -1 } else { 0 };
        assert!(tail[tail.len() - 64..].iter().all(|&s| s == residue));
    }

    #[test]
    fn test_mask_freezes_channel() {
        let mut chip = chip();
        program_voice(&mut chip, 1);
        key_on(&mut chip, 1);
        for _ in 0..64 {
            chip.render();
        }

        let previous = chip.set_mask(ChannelMask::CH1);
        assert!(previous.is_empty());
        let residue = if chip.channel_output(1) < 0 { -1 } else { 0 };
        let phase = chip.operator(carrier(1)).phase();
        let eg_phase = chip.operator(carrier(1)).eg_phase();
        for _ in 0..64 {
            chip.render();
        }
        assert_eq!(chip.operator(carrier(1)).phase(), phase);
        assert_eq!(chip.operator(carrier(1)).eg_phase(), eg_phase);
        assert_eq!(chip.channel_output(1), residue);

        let previous = chip.toggle_mask(ChannelMask::CH1);
        assert_eq!(previous, ChannelMask::CH1);
        assert!(chip.mask().is_empty());
        chip.render();
        assert_ne!(chip.operator(carrier(1)).phase(), phase);
    }

    #[test]
    fn test_rhythm_mode_toggle() {
        let mut chip = chip();
        program_voice(&mut chip, 7);
        key_on(&mut chip, 7);

        chip.write_register(0xBD, 0x20 | 0x10 | 0x01);
        assert!(chip.rhythm_mode());
        assert!(chip.rhythm_triggered(SlotId::new(12).unwrap()));
        assert!(chip.rhythm_triggered(SlotId::new(13).unwrap()));
        assert!(chip.rhythm_triggered(SlotId::new(14).unwrap()));
        assert!(!chip.rhythm_triggered(SlotId::new(15).unwrap()));

        let mut block = [0i16; 256];
        chip.render_block(&mut block);
        assert!(block.iter().any(|&s| s != 0));

        chip.write_register(0xBD, 0xC0);
        assert!(!chip.rhythm_mode());
        assert!(chip.lfo().am_mode() && chip.lfo().pm_mode());
        assert!(!chip.rhythm_triggered(SlotId::new(12).unwrap()));
        chip.render_block(&mut block);
        assert!(block.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_io_ports() {
        let mut chip = chip();
        chip.write_io(0, 0x43);
        chip.write_io(1, 0x2A);
        assert_eq!(chip.read_io(), 0x2A);
        assert_eq!(chip.operator(carrier(0)).patch().total_level, 0x2A);

        chip.write_io(0, 0xA5);
        assert_eq!(chip.read_io(), 0);
        chip.write_io(3, 0x99);
        assert_eq!(chip.read_io(), 0x99);
        assert_eq!(chip.channel(5).unwrap().carrier().fnumber(), 0x99);
    }

    #[test]
    fn test_phase_widths_after_render() {
        let mut chip = chip();
        for c in 0..CHANNELS as u32 {
            program_voice(&mut chip, c);
            chip.write_register(0xA0 + c, 0xFF);
            chip.write_register(0xB0 + c, 0x3F);
        }
        chip.write_register(0x20, 0xCF);
        chip.write_register(0xBD, 0xC0);
        for _ in 0..20_000 {
            chip.render();
            for index in 0..SLOTS {
                let op = chip.operator(SlotId::new(index).unwrap());
                assert_eq!(op.phase() & (DP_WIDTH - 1), op.phase());
                assert_eq!(op.eg_phase() & EG_PHASE_MASK, op.eg_phase());
            }
        }
    }

    #[test]
    fn test_reset_idempotent() {
        let mut once = chip();
        let mut twice = chip();
        for chip in [&mut once, &mut twice] {
            program_voice(chip, 0);
            key_on(chip, 0);
            chip.write_register(0xBD, 0xE0);
            chip.render_block(&mut [0; 512]);
        }
        once.reset();
        twice.reset();
        twice.reset();

        assert_eq!(once.reg, twice.reg);
        assert_eq!(once.ch_out, twice.ch_out);
        assert_eq!(once.lfo, twice.lfo);
        assert_eq!(once.rhythm_mode, twice.rhythm_mode);
        assert!(once.reg.iter().all(|&r| r == 0));
        for index in 0..SLOTS {
            let slot = SlotId::new(index).unwrap();
            let (a, b) = (once.operator(slot), twice.operator(slot));
            assert_eq!(a.eg_mode(), EnvelopeMode::Finish);
            assert_eq!(a.eg_mode(), b.eg_mode());
            assert_eq!(a.eg_phase(), b.eg_phase());
            assert_eq!(a.patch(), b.patch());
        }

        let mut a = [0i16; 128];
        let mut b = [0i16; 128];
        once.render_block(&mut a);
        twice.render_block(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_masked_accumulator_residue() {
        let mut chip = chip();
        chip.set_mask(ChannelMask::CH1 | ChannelMask::CH2);
        chip.ch_out[1] = -300;
        chip.ch_out[2] = 300;
        for _ in 0..16 {
            chip.render();
        }
        assert_eq!(chip.channel_output(1), -1);
        assert_eq!(chip.channel_output(2), 0);
    }

    #[test]
    fn test_set_rate() {
        let mut chip = chip();
        program_voice(&mut chip, 0);
        key_on(&mut chip, 0);
        let before = chip.operator(carrier(0)).clone();
        chip.set_rate(22_050);
        assert_eq!(chip.rate(), 22_050);
        assert_eq!(chip.clock(), CLOCK);

        // Configured operators pick up the new increments immediately
        let op = chip.operator(carrier(0));
        assert_eq!(op.dphase(), chip.tables().dphase(0x241, 4, 1));
        assert_ne!(op.dphase(), before.dphase());
        assert_eq!(op.eg_mode(), before.eg_mode());

        chip.set_rate(0);
        assert_eq!(chip.rate(), 22_050);
    }

    #[test]
    fn test_from_config() {
        let config = ChipConfig {
            mask: ChannelMask::PCM.bits(),
            ..ChipConfig::default()
        };
        let chip = Chip::from_config(&config).unwrap();
        assert_eq!(chip.mask(), ChannelMask::PCM);
        assert_eq!(chip.rate(), 44_100);
    }

    #[test]
    fn test_adpcm_through_chip() {
        let mut chip = chip();
        chip.write_register(0x09, 0);
        chip.write_register(0x0A, 0);
        chip.write_register(0x0B, 0);
        chip.write_register(0x0C, 0);
        chip.write_register(0x07, 0x60);
        for _ in 0..32 {
            chip.write_register(0x0F, 0x77);
        }
        assert_ne!(chip.status() & AdpcmStatus::EOS.bits(), 0);

        chip.write_register(0x07, 0x00);
        chip.write_register(0x10, 0x00);
        chip.write_register(0x11, 0x80);
        chip.write_register(0x12, 0xFF);
        chip.write_register(0x07, 0xA0);
        assert_ne!(chip.status() & AdpcmStatus::PCM_BUSY.bits(), 0);
        assert!(chip.adpcm().is_playing());

        let mut block = [0i16; 64];
        chip.render_block(&mut block);
        assert!(block.iter().any(|&s| s > 0));

        // Masked PCM decays to silence in the accumulator
        chip.set_mask(ChannelMask::PCM);
        chip.render_block(&mut block);
        assert_eq!(chip.channel_output(PCM_OUTPUT), 0);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(Chip::new(CLOCK, 0), Err(Error::Config(_))));
    }
}
