//! # Lookup tables
//!
//! All synthesis arithmetic goes through precomputed tables. They fall into two
//! groups:
//!
//! - [`WaveTables`]: log-sine, dB-to-linear, attack curve, key scale level and
//!   rate, and the LFO depth tables. None of them depend on the clock or the
//!   sample rate, so a single immutable copy is built on first use and shared by
//!   every chip through an `Arc`.
//! - [`TimingTables`]: phase increments, envelope rates and LFO speeds. These
//!   are derived from the clock and the sample rate and are owned by each chip.

use std::collections::TryReserveError;
use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

use log::debug;

use crate::*;

/// Entries of the dB-to-linear table (positive and negative halves)
const DB2LIN_LEN: usize = (DB_MUTE as usize) * 4;
/// Entries of the attack adjust table
const EG_WIDTH: usize = 1 << EG_BITS;
/// Key scale level table dimensions: fnum high bits, block, TL, KSL
const TLL_LEN: usize = 16 * 8 * (1 << TL_BITS) * 4;
/// Phase increment table dimensions: fnum, block, multiplier
const DPHASE_LEN: usize = 1024 * 8 * 16;

/// Frequency multipliers, doubled
static ML_TABLE: [u32; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

/// Key scale level attenuation per fnum band, in 0.5 dB steps
static KL_TABLE: [u32; 16] = [
    db2(0.000),
    db2(9.000),
    db2(12.000),
    db2(13.875),
    db2(15.000),
    db2(16.125),
    db2(16.875),
    db2(17.625),
    db2(18.000),
    db2(18.750),
    db2(19.125),
    db2(19.500),
    db2(19.875),
    db2(20.250),
    db2(20.625),
    db2(21.000),
];

static WAVE_TABLES: OnceLock<Arc<WaveTables>> = OnceLock::new();

const fn db2(x: f64) -> u32 {
    (x * 2.0) as u32
}

/// Scales a per-clock-cycle increment to a per-sample increment, rounding.
fn rate_adjust(x: f64, clock: u32, rate: u32) -> u32 {
    (x * clock as f64 / 72.0 / rate as f64 + 0.5) as u32
}

/// Linear amplitude (0.0 - 1.0) to attenuation steps (511 - 0)
fn lin2db(d: f64) -> u32 {
    if d == 0.0 {
        DB_MUTE - 1
    } else {
        (-((20.0 * d.log10() / DB_STEP) as i32)).min(DB_MUTE as i32 - 1) as u32
    }
}

/// Allocates a zeroed table, reporting allocation failure instead of aborting
fn try_table<T: Copy + Default>(len: usize) -> Result<Vec<T>, TryReserveError> {
    let mut table = Vec::new();
    table.try_reserve_exact(len)?;
    table.resize(len, T::default());
    Ok(table)
}

/// Tables that depend on neither the clock nor the sample rate
#[derive(Clone, PartialEq)]
pub struct WaveTables {
    /// Log-sine waveform: attenuation per phase index, negative half offset
    sin: [u32; PG_WIDTH],
    /// Attenuation to signed linear amplitude
    db2lin: [i32; DB2LIN_LEN],
    /// Linear attack phase to logarithmic attenuation
    ar_adjust: [u32; EG_WIDTH],
    /// Total level + key scale level
    tll: Vec<u32>,
    /// Key scale rate offsets, [fnum bit 9][block][ksr flag]
    rks: [[[u32; 2]; 8]; 2],
    /// Vibrato multipliers per depth
    pm: [[i32; PM_PG_WIDTH]; 2],
    /// Tremolo attenuation per depth
    am: [[u32; AM_PG_WIDTH]; 2],
}

impl WaveTables {
    /// Builds every clock independent table
    pub fn new() -> Result<Self, TryReserveError> {
        let mut tables = Self {
            sin: [0; PG_WIDTH],
            db2lin: [0; DB2LIN_LEN],
            ar_adjust: [0; EG_WIDTH],
            tll: try_table(TLL_LEN)?,
            rks: [[[0; 2]; 8]; 2],
            pm: [[0; PM_PG_WIDTH]; 2],
            am: [[0; AM_PG_WIDTH]; 2],
        };
        tables.make_pm_table();
        tables.make_am_table();
        tables.make_db2lin_table();
        tables.make_adjust_table();
        tables.make_tll_table();
        tables.make_rks_table();
        tables.make_sin_table();
        Ok(tables)
    }

    fn make_adjust_table(&mut self) {
        let width = EG_WIDTH as f64;
        self.ar_adjust[0] = EG_WIDTH as u32;
        for i in 1..EG_WIDTH {
            self.ar_adjust[i] = ((width - 1.0 - width * (i as f64).ln() / width.ln()) as u32) >> 1;
        }
    }

    fn make_db2lin_table(&mut self) {
        let mute = DB_MUTE as usize;
        let amp = ((1 << DB2LIN_AMP_BITS) - 1) as f64;
        for i in 0..mute * 2 {
            self.db2lin[i] = if i >= mute {
                0
            } else {
                (amp * 10f64.powf(-(i as f64) * DB_STEP / 20.0)) as i32
            };
            self.db2lin[i + mute * 2] = -self.db2lin[i];
        }
    }

    fn make_sin_table(&mut self) {
        for i in 0..PG_WIDTH / 4 {
            self.sin[i] = lin2db((2.0 * PI * i as f64 / PG_WIDTH as f64).sin());
        }
        for i in 0..PG_WIDTH / 4 {
            self.sin[PG_WIDTH / 2 - 1 - i] = self.sin[i];
        }
        for i in 0..PG_WIDTH / 2 {
            self.sin[PG_WIDTH / 2 + i] = DB_MUTE + DB_MUTE + self.sin[i];
        }
    }

    fn make_pm_table(&mut self) {
        for (depth, table) in [PM_DEPTH, PM_DEPTH2].into_iter().zip(self.pm.iter_mut()) {
            for (i, value) in table.iter_mut().enumerate() {
                let x = 2.0 * PI * i as f64 / PM_PG_WIDTH as f64;
                *value = (PM_AMP * 2f64.powf(depth * x.sin() / 1200.0)) as i32;
            }
        }
    }

    fn make_am_table(&mut self) {
        // Both depths step through the table at the pitch modulator's width
        for (depth, table) in [AM_DEPTH, AM_DEPTH2].into_iter().zip(self.am.iter_mut()) {
            for (i, value) in table.iter_mut().enumerate() {
                let x = 2.0 * PI * i as f64 / PM_PG_WIDTH as f64;
                *value = (depth / 2.0 / DB_STEP * (1.0 + x.sin())) as u32;
            }
        }
    }

    fn make_tll_table(&mut self) {
        let align = (TL_STEP / EG_STEP) as u32;
        for fnum in 0..16 {
            for block in 0..8 {
                for tl in 0..(1 << TL_BITS) {
                    for kl in 0..4 {
                        let base = tl as u32 * align;
                        let value = if kl == 0 {
                            base
                        } else {
                            let tmp = KL_TABLE[fnum] as i32 - db2(3.000) as i32 * (7 - block as i32);
                            if tmp <= 0 {
                                base
                            } else {
                                ((tmp >> (3 - kl)) as f64 / EG_STEP) as u32 + base
                            }
                        };
                        self.tll[tll_index(fnum, block, tl, kl)] = value;
                    }
                }
            }
        }
    }

    fn make_rks_table(&mut self) {
        for fnum9 in 0..2 {
            for block in 0..8 {
                self.rks[fnum9][block][0] = 0;
                self.rks[fnum9][block][1] = ((block as u32) << 1) + fnum9 as u32;
            }
        }
    }
}

fn tll_index(fnum_hi: usize, block: usize, tl: usize, kl: usize) -> usize {
    ((fnum_hi * 8 + block) * (1 << TL_BITS) + tl) * 4 + kl
}

/// Tables derived from the clock and the sample rate
#[derive(Clone, PartialEq)]
pub struct TimingTables {
    /// Phase increment, [fnum][block][multiplier]
    dphase: Vec<u32>,
    /// Attack envelope increment, [rate][rks]
    attack: [[u32; 16]; 16],
    /// Decay/release envelope increment, [rate][rks]
    decay: [[u32; 16]; 16],
    /// Vibrato phase increment
    pm_dphase: u32,
    /// Tremolo phase increment
    am_dphase: u32,
}

impl TimingTables {
    /// Allocates and fills the timing tables for `clock` and `rate`
    pub fn new(clock: u32, rate: u32) -> Result<Self, TryReserveError> {
        let mut tables = Self {
            dphase: try_table(DPHASE_LEN)?,
            attack: [[0; 16]; 16],
            decay: [[0; 16]; 16],
            pm_dphase: 0,
            am_dphase: 0,
        };
        tables.refresh(clock, rate);
        Ok(tables)
    }

    /// Recomputes every entry in place
    pub fn refresh(&mut self, clock: u32, rate: u32) {
        debug!("Building timing tables for clock {clock} Hz at {rate} Hz");
        self.make_dphase_table(clock, rate);
        self.make_dphase_ar_table(clock, rate);
        self.make_dphase_dr_table(clock, rate);
        // LFO steps per chip cycle; only the cycle count is whole
        let cycles = f64::from((clock / 72).max(1));
        self.pm_dphase = rate_adjust(PM_SPEED * f64::from(PM_DP_WIDTH) / cycles, clock, rate);
        self.am_dphase = rate_adjust(AM_SPEED * f64::from(AM_DP_WIDTH) / cycles, clock, rate);
    }

    fn make_dphase_table(&mut self, clock: u32, rate: u32) {
        for fnum in 0..1024u32 {
            for block in 0..8u32 {
                for (ml, mul) in ML_TABLE.iter().enumerate() {
                    let base = ((fnum * mul) << block) >> (21 - DP_BITS);
                    self.dphase[dphase_index(fnum, block, ml as u32)] =
                        rate_adjust(base as f64, clock, rate);
                }
            }
        }
    }

    fn make_dphase_ar_table(&mut self, clock: u32, rate: u32) {
        for ar in 0..16u32 {
            for rks in 0..16u32 {
                let rm = (ar + (rks >> 2)).min(15);
                let rl = rks & 3;
                self.attack[ar as usize][rks as usize] = match ar {
                    0 => 0,
                    15 => EG_DP_WIDTH,
                    _ => rate_adjust(((3 * (rl + 4)) << (rm + 1)) as f64, clock, rate),
                };
            }
        }
    }

    fn make_dphase_dr_table(&mut self, clock: u32, rate: u32) {
        for dr in 0..16u32 {
            for rks in 0..16u32 {
                let rm = (dr + (rks >> 2)).min(15);
                let rl = rks & 3;
                self.decay[dr as usize][rks as usize] = match dr {
                    0 => 0,
                    _ => rate_adjust(((rl + 4) << (rm - 1)) as f64, clock, rate),
                };
            }
        }
    }
}

fn dphase_index(fnum: u32, block: u32, ml: u32) -> usize {
    ((fnum as usize * 8) + block as usize) * 16 + ml as usize
}

/// Returns the process wide wave tables, building them on first use
fn shared_wave_tables() -> Result<Arc<WaveTables>, TryReserveError> {
    if let Some(tables) = WAVE_TABLES.get() {
        return Ok(Arc::clone(tables));
    }
    let tables = Arc::new(WaveTables::new()?);
    Ok(Arc::clone(WAVE_TABLES.get_or_init(|| tables)))
}

/// Every table one chip needs, for a given clock and sample rate
#[derive(Clone)]
pub struct TableBank {
    clock: u32,
    rate: u32,
    wave: Arc<WaveTables>,
    timing: TimingTables,
}

impl TableBank {
    /// Builds the tables for `clock` and `rate`. Both must be non-zero.
    pub fn new(clock: u32, rate: u32) -> Result<Self, Error> {
        if clock == 0 || rate == 0 {
            return Err(Error::config(format!(
                "clock ({clock}) and rate ({rate}) must be non-zero"
            )));
        }
        Ok(Self {
            clock,
            rate,
            wave: shared_wave_tables()?,
            timing: TimingTables::new(clock, rate)?,
        })
    }

    /// Brings the tables up to date with `clock` and `rate`.
    ///
    /// Only the timing tables are recomputed, and only if one of the inputs
    /// changed. A zero clock or rate is ignored. Returns `true` if anything was
    /// rebuilt.
    pub fn build(&mut self, clock: u32, rate: u32) -> bool {
        if clock == 0 || rate == 0 || (clock == self.clock && rate == self.rate) {
            return false;
        }
        self.clock = clock;
        self.rate = rate;
        self.timing.refresh(clock, rate);
        true
    }

    /// Changes the sample rate, keeping the clock
    pub fn set_rate(&mut self, rate: u32) -> bool {
        self.build(self.clock, rate)
    }

    pub fn clock(&self) -> u32 {
        self.clock
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// The shared clock independent tables
    pub fn wave(&self) -> &Arc<WaveTables> {
        &self.wave
    }

    /// Attenuation of the log-sine wave at `index` (0-1023)
    #[inline]
    pub fn sin(&self, index: usize) -> u32 {
        self.wave.sin[index]
    }

    /// Linear amplitude of attenuation `db` (0-2047)
    #[inline]
    pub fn db2lin(&self, db: usize) -> i32 {
        self.wave.db2lin[db]
    }

    /// Logarithmic attack attenuation for linear attack position `index`
    #[inline]
    pub fn ar_adjust(&self, index: usize) -> u32 {
        self.wave.ar_adjust[index]
    }

    /// Total level plus key scale level, indexed by `fnum >> 6`
    #[inline]
    pub fn tll(&self, fnum_hi: u32, block: u32, tl: u8, kl: u8) -> u32 {
        self.wave.tll[tll_index(
            fnum_hi as usize,
            block as usize,
            tl as usize,
            kl as usize,
        )]
    }

    /// Key scale rate offset, indexed by `fnum >> 9`
    #[inline]
    pub fn rks(&self, fnum9: u32, block: u32, ksr: bool) -> u32 {
        self.wave.rks[fnum9 as usize][block as usize][ksr as usize]
    }

    /// Vibrato multiplier (256 = unity)
    #[inline]
    pub fn pm(&self, deep: bool, index: usize) -> i32 {
        self.wave.pm[deep as usize][index]
    }

    /// Tremolo attenuation in envelope steps
    #[inline]
    pub fn am(&self, deep: bool, index: usize) -> u32 {
        self.wave.am[deep as usize][index]
    }

    /// Phase increment for a frequency number, block and multiplier
    #[inline]
    pub fn dphase(&self, fnum: u32, block: u32, ml: u8) -> u32 {
        self.timing.dphase[dphase_index(fnum, block, ml as u32)]
    }

    #[inline]
    pub fn attack_rate(&self, rate: u8, rks: u32) -> u32 {
        self.timing.attack[rate as usize][rks as usize]
    }

    #[inline]
    pub fn decay_rate(&self, rate: u8, rks: u32) -> u32 {
        self.timing.decay[rate as usize][rks as usize]
    }

    pub fn pm_dphase(&self) -> u32 {
        self.timing.pm_dphase
    }

    pub fn am_dphase(&self) -> u32 {
        self.timing.am_dphase
    }
}
