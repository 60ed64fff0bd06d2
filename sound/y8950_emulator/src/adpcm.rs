//! # ADPCM Unit
//!
//! The Y8950 carries a delta-T ADPCM decoder next to its FM section. The chip
//! talks to it through [`AdpcmUnit`]: registers 0x07-0x12 are forwarded
//! verbatim, one sample is pulled per rendered FM sample, and the status
//! register is read back through the chip.
//!
//! [`Adpcm`] is the built-in implementation. It owns 256 KiB of sample RAM
//! which the host fills through the data register, and plays 4-bit delta-T
//! ADPCM either from that RAM or straight from bytes written by the CPU.

use bitflags::bitflags;
use log::debug;

use crate::Error;

/// Size of the sample RAM in bytes
pub const MEMORY_SIZE: usize = 256 * 1024;
const MEMORY_MASK: u32 = MEMORY_SIZE as u32 - 1;

/// Address registers count in 32-byte units
const ADDRESS_SHIFT: u32 = 5;

const REG_CONTROL1: u8 = 0x07;
const REG_CONTROL2: u8 = 0x08;
const REG_START_LO: u8 = 0x09;
const REG_START_HI: u8 = 0x0A;
const REG_STOP_LO: u8 = 0x0B;
const REG_STOP_HI: u8 = 0x0C;
const REG_DATA: u8 = 0x0F;
const REG_DELTA_N_LO: u8 = 0x10;
const REG_DELTA_N_HI: u8 = 0x11;
const REG_LEVEL: u8 = 0x12;

const CTRL_START: u8 = 0x80;
const CTRL_REC: u8 = 0x40;
const CTRL_MEMDATA: u8 = 0x20;
const CTRL_REPEAT: u8 = 0x10;
const CTRL_RESET: u8 = 0x01;

const STEP_MIN: i32 = 127;
const STEP_MAX: i32 = 24576;

/// Step size scale per nibble magnitude, in 1/64ths
static STEP_SCALE: [i32; 8] = [57, 57, 57, 57, 77, 102, 128, 153];

bitflags! {
    /// Bits of the ADPCM status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AdpcmStatus: u8 {
        /// End of sample data reached
        const EOS = 0x10;
        /// Ready for the next data byte
        const BUF_RDY = 0x08;
        /// Playback in progress
        const PCM_BUSY = 0x01;
    }
}

/// Sample playback collaborator of the chip
///
/// The chip creates one unit alongside itself and drops it with itself.
pub trait AdpcmUnit {
    /// Creates a unit for the given master clock and output sample rate
    fn new(clock: u32, rate: u32) -> Result<Self, Error>
    where
        Self: Sized;

    /// Changes the output sample rate
    fn set_rate(&mut self, rate: u32);

    /// Stops playback and clears the registers
    fn reset(&mut self);

    /// Receives a write to one of the registers 0x07-0x12
    fn write_register(&mut self, reg: u8, value: u8);

    /// Produces the next output sample
    fn render(&mut self) -> i16;

    /// Current status register value
    fn status(&self) -> u8;
}

/// Where the decoder takes its nibbles from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Memory,
    Cpu,
}

/// Delta-T ADPCM decoder with sample RAM
pub struct Adpcm {
    clock: u32,
    rate: u32,
    reg: [u8; 0x20],
    memory: Vec<u8>,
    status: AdpcmStatus,
    /// First byte of the sample, from 0x09/0x0A
    start_addr: u32,
    /// One past the last byte of the sample, from 0x0B/0x0C
    stop_addr: u32,
    /// Next byte written through the data register
    write_addr: u32,
    /// Next nibble to decode
    play_addr: u32,
    source: Source,
    playing: bool,
    /// Byte written by the CPU for direct playback
    cpu_data: Option<u8>,
    /// Sample clock accumulator, one nibble per `rate << 16`
    phase: u64,
    acc: i32,
    step: i32,
    /// Newest and previous decoded samples
    output: [i32; 2],
}

impl Adpcm {
    fn delta_n(&self) -> u32 {
        u32::from(self.reg[REG_DELTA_N_LO as usize])
            | (u32::from(self.reg[REG_DELTA_N_HI as usize]) << 8)
    }

    fn register_address(&self, lo: u8, hi: u8) -> u32 {
        (u32::from(self.reg[lo as usize]) | (u32::from(self.reg[hi as usize]) << 8))
            << ADDRESS_SHIFT
    }

    fn update_addresses(&mut self) {
        self.start_addr = self.register_address(REG_START_LO, REG_START_HI) & MEMORY_MASK;
        self.stop_addr = (self.register_address(REG_STOP_LO, REG_STOP_HI)
            + (1 << ADDRESS_SHIFT))
            .min(MEMORY_SIZE as u32);
    }

    fn write_control(&mut self, val: u8) {
        if val & CTRL_RESET != 0 {
            self.stop();
            return;
        }
        if val & CTRL_START != 0 && val & CTRL_REC == 0 {
            self.source = if val & CTRL_MEMDATA != 0 {
                Source::Memory
            } else {
                Source::Cpu
            };
            self.play_addr = self.start_addr << 1;
            self.restart_decoder();
            self.phase = 0;
            self.output = [0, 0];
            self.cpu_data = None;
            self.playing = true;
            self.status.insert(AdpcmStatus::PCM_BUSY);
            self.status.remove(AdpcmStatus::EOS);
            if self.source == Source::Cpu {
                self.status.insert(AdpcmStatus::BUF_RDY);
            }
            debug!(
                "ADPCM playback started from {:?} at {:#07x}, delta-N {}",
                self.source,
                self.start_addr,
                self.delta_n()
            );
        } else if val & (CTRL_REC | CTRL_MEMDATA) == CTRL_REC | CTRL_MEMDATA {
            self.write_addr = self.start_addr;
            self.status.insert(AdpcmStatus::BUF_RDY);
            self.status.remove(AdpcmStatus::EOS);
        }
    }

    fn write_data(&mut self, val: u8) {
        let control = self.reg[REG_CONTROL1 as usize];
        if control & (CTRL_REC | CTRL_MEMDATA) == CTRL_REC | CTRL_MEMDATA {
            if self.write_addr < self.stop_addr {
                self.memory[(self.write_addr & MEMORY_MASK) as usize] = val;
                self.write_addr += 1;
                self.status.insert(AdpcmStatus::BUF_RDY);
            }
            if self.write_addr >= self.stop_addr {
                self.status.insert(AdpcmStatus::EOS);
            }
        } else if self.playing && self.source == Source::Cpu {
            self.cpu_data = Some(val);
            self.status.remove(AdpcmStatus::BUF_RDY);
        }
    }

    fn restart_decoder(&mut self) {
        self.acc = 0;
        self.step = STEP_MIN;
    }

    fn stop(&mut self) {
        if self.playing {
            debug!("ADPCM playback stopped at {:#07x}", self.play_addr >> 1);
        }
        self.playing = false;
        self.status.remove(AdpcmStatus::PCM_BUSY);
    }

    /// Fetches the next nibble, handling end of data. `None` when nothing is
    /// available this sample.
    fn next_nibble(&mut self) -> Option<u8> {
        match self.source {
            Source::Memory => {
                if self.play_addr >= self.stop_addr << 1 {
                    self.status.insert(AdpcmStatus::EOS);
                    if self.reg[REG_CONTROL1 as usize] & CTRL_REPEAT != 0 {
                        self.play_addr = self.start_addr << 1;
                        self.restart_decoder();
                    } else {
                        self.stop();
                        return None;
                    }
                }
                let byte = self.memory[((self.play_addr >> 1) & MEMORY_MASK) as usize];
                let nibble = if self.play_addr & 1 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0f
                };
                self.play_addr += 1;
                Some(nibble)
            }
            Source::Cpu => {
                let byte = self.cpu_data?;
                let nibble = if self.play_addr & 1 == 0 {
                    byte >> 4
                } else {
                    self.cpu_data = None;
                    self.status.insert(AdpcmStatus::BUF_RDY);
                    byte & 0x0f
                };
                self.play_addr += 1;
                Some(nibble)
            }
        }
    }

    fn decode(&mut self, nibble: u8) {
        let magnitude = (nibble & 7) as i32;
        let delta = ((2 * magnitude + 1) * self.step) >> 3;
        let acc = if nibble & 8 != 0 {
            self.acc - delta
        } else {
            self.acc + delta
        };
        self.acc = acc.clamp(i16::MIN as i32, i16::MAX as i32);
        self.step = ((self.step * STEP_SCALE[magnitude as usize]) >> 6).clamp(STEP_MIN, STEP_MAX);
        self.output[1] = self.output[0];
        self.output[0] = self.acc;
    }

    /// Sample RAM contents
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Value of control register 2 (latched only)
    pub fn control2(&self) -> u8 {
        self.reg[REG_CONTROL2 as usize]
    }
}

impl AdpcmUnit for Adpcm {
    fn new(clock: u32, rate: u32) -> Result<Self, Error> {
        let mut memory = Vec::new();
        memory.try_reserve_exact(MEMORY_SIZE)?;
        memory.resize(MEMORY_SIZE, 0);
        Ok(Self {
            clock,
            rate,
            reg: [0; 0x20],
            memory,
            status: AdpcmStatus::empty(),
            start_addr: 0,
            stop_addr: 0,
            write_addr: 0,
            play_addr: 0,
            source: Source::Memory,
            playing: false,
            cpu_data: None,
            phase: 0,
            acc: 0,
            step: STEP_MIN,
            output: [0, 0],
        })
    }

    fn set_rate(&mut self, rate: u32) {
        if rate != 0 {
            self.rate = rate;
        }
    }

    /// Sample RAM survives a reset
    fn reset(&mut self) {
        self.stop();
        self.reg = [0; 0x20];
        self.status = AdpcmStatus::empty();
        self.start_addr = 0;
        self.stop_addr = 0;
        self.write_addr = 0;
        self.play_addr = 0;
        self.source = Source::Memory;
        self.cpu_data = None;
        self.phase = 0;
        self.restart_decoder();
        self.output = [0, 0];
    }

    fn write_register(&mut self, reg: u8, value: u8) {
        let reg = reg & 0x1f;
        self.reg[reg as usize] = value;
        match reg {
            REG_CONTROL1 => self.write_control(value),
            REG_START_LO | REG_START_HI | REG_STOP_LO | REG_STOP_HI => self.update_addresses(),
            REG_DATA => self.write_data(value),
            _ => {}
        }
    }

    fn render(&mut self) -> i16 {
        if !self.playing {
            return 0;
        }

        let period = u64::from(self.rate) << 16;
        self.phase += u64::from(self.delta_n()) * u64::from(self.clock / 72);
        while self.phase >= period {
            match self.next_nibble() {
                Some(nibble) => {
                    self.phase -= period;
                    self.decode(nibble);
                }
                None => {
                    self.phase = period;
                    break;
                }
            }
        }

        let frac = (self.phase * 256 / period).min(256) as i32;
        let sample = (self.output[1] * (256 - frac) + self.output[0] * frac) >> 8;
        let level = i32::from(self.reg[REG_LEVEL as usize]);
        ((sample * level) >> 8 >> 2) as i16
    }

    fn status(&self) -> u8 {
        self.status.bits()
    }
}
