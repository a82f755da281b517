/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Register map and the bit packing of the parameter blocks.

use crate::divider::{OutputDivider, RationalDivider};
use crate::spread::{SpreadLeg, SpreadMode, SpreadSpectrum};
use crate::vcxo::VcxoPull;
use crate::Error;

pub const ADDRESS: u8 = 0b0110_0000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PLL {
    A,
    B,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FeedbackMultisynth {
    MSNA,
    MSNB,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Multisynth {
    MS0,
    MS1,
    MS2,
    MS3,
    MS4,
    MS5,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
    Clk3,
    Clk4,
    Clk5,
    Clk6,
    Clk7,
}

impl PLL {
    pub fn multisynth(&self) -> FeedbackMultisynth {
        match *self {
            PLL::A => FeedbackMultisynth::MSNA,
            PLL::B => FeedbackMultisynth::MSNB,
        }
    }
}

/// A fractional divider with an 8-register parameter block.
pub trait FractionalMultisynth {
    fn base_addr(&self) -> u8;
}

impl FractionalMultisynth for FeedbackMultisynth {
    fn base_addr(&self) -> u8 {
        match *self {
            FeedbackMultisynth::MSNA => 26,
            FeedbackMultisynth::MSNB => 34,
        }
    }
}

impl FeedbackMultisynth {
    /// Register holding `FBx_INT` at bit 6 (shared with CLK6/CLK7 control).
    pub fn int_register(&self) -> Register {
        match *self {
            FeedbackMultisynth::MSNA => Register::Clk6,
            FeedbackMultisynth::MSNB => Register::Clk7,
        }
    }
}

impl FractionalMultisynth for Multisynth {
    fn base_addr(&self) -> u8 {
        match *self {
            Multisynth::MS0 => 42,
            Multisynth::MS1 => 50,
            Multisynth::MS2 => 58,
            Multisynth::MS3 => 66,
            Multisynth::MS4 => 74,
            Multisynth::MS5 => 82,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    DeviceStatus = 0,
    OutputEnable = 3,
    PllInputSource = 15,
    Clk0 = 16,
    Clk1 = 17,
    Clk2 = 18,
    Clk3 = 19,
    Clk4 = 20,
    Clk5 = 21,
    Clk6 = 22,
    Clk7 = 23,
    SpreadSpectrum = 149,
    VcxoParam = 162,
    Clk0PhaseOffset = 165,
    Clk1PhaseOffset = 166,
    Clk2PhaseOffset = 167,
    Clk3PhaseOffset = 168,
    Clk4PhaseOffset = 169,
    Clk5PhaseOffset = 170,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS = 0b0001_0000;
    }
}

bitflags! {
    pub struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_MASK = 0b11_000000;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    pub struct PllInputSourceBits: u8 {
        const CLKIN_DIV_MASK = 0b1100_0000;
        const PLLB_SRC = 0b0000_1000;
        const PLLA_SRC = 0b0000_0100;
    }
}

bitflags! {
    pub struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_INV = 0b0001_0000;
        const CLK_SRC_MASK = 0b0000_1100;
        const CLK_SRC_XTAL = 0b0000_0000;
        const CLK_SRC_CLKIN = 0b0000_0100;
        const CLK_SRC_MS_ALT = 0b0000_1000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_MASK = 0b0000_0011;
        const CLK_DRV_2 = 0b0000_0000;
        const CLK_DRV_4 = 0b0000_0001;
        const CLK_DRV_6 = 0b0000_0010;
        const CLK_DRV_8 = 0b0000_0011;
    }
}

bitflags! {
    pub struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

bitflags! {
    pub struct SpreadSpectrumBits: u8 {
        const SSC_EN = 0b1000_0000;
        const SSC_MODE = 0b1000_0000;
    }
}

impl ClockOutput {
    pub fn register(self) -> Register {
        match self {
            ClockOutput::Clk0 => Register::Clk0,
            ClockOutput::Clk1 => Register::Clk1,
            ClockOutput::Clk2 => Register::Clk2,
            ClockOutput::Clk3 => Register::Clk3,
            ClockOutput::Clk4 => Register::Clk4,
            ClockOutput::Clk5 => Register::Clk5,
            ClockOutput::Clk6 => Register::Clk6,
            ClockOutput::Clk7 => Register::Clk7,
        }
    }

    pub fn ix(&self) -> u8 {
        *self as u8
    }

    /// `CLKx_PHOFF`; CLK6/CLK7 have no phase offset.
    pub fn phase_register(&self) -> Option<Register> {
        match *self {
            ClockOutput::Clk0 => Some(Register::Clk0PhaseOffset),
            ClockOutput::Clk1 => Some(Register::Clk1PhaseOffset),
            ClockOutput::Clk2 => Some(Register::Clk2PhaseOffset),
            ClockOutput::Clk3 => Some(Register::Clk3PhaseOffset),
            ClockOutput::Clk4 => Some(Register::Clk4PhaseOffset),
            ClockOutput::Clk5 => Some(Register::Clk5PhaseOffset),
            ClockOutput::Clk6 | ClockOutput::Clk7 => None,
        }
    }

    /// The fractional Multisynth driving this output; CLK6/CLK7 have none.
    pub fn multisynth(&self) -> Option<Multisynth> {
        match *self {
            ClockOutput::Clk0 => Some(Multisynth::MS0),
            ClockOutput::Clk1 => Some(Multisynth::MS1),
            ClockOutput::Clk2 => Some(Multisynth::MS2),
            ClockOutput::Clk3 => Some(Multisynth::MS3),
            ClockOutput::Clk4 => Some(Multisynth::MS4),
            ClockOutput::Clk5 => Some(Multisynth::MS5),
            ClockOutput::Clk6 | ClockOutput::Clk7 => None,
        }
    }
}

impl Multisynth {
    pub fn clock_output(&self) -> ClockOutput {
        match *self {
            Multisynth::MS0 => ClockOutput::Clk0,
            Multisynth::MS1 => ClockOutput::Clk1,
            Multisynth::MS2 => ClockOutput::Clk2,
            Multisynth::MS3 => ClockOutput::Clk3,
            Multisynth::MS4 => ClockOutput::Clk4,
            Multisynth::MS5 => ClockOutput::Clk5,
        }
    }
}

/// Size of a Multisynth parameter block.
pub const MULTISYNTH_BLOCK_LEN: usize = 8;
/// Registers 149..=161.
pub const SPREAD_SPECTRUM_BLOCK_LEN: usize = 13;
/// Registers 162..=164.
pub const VCXO_BLOCK_LEN: usize = 3;

const MS_DIVBY4: u8 = 0b0000_1100;

/// `CLKx_PHOFF[6:0]`, the upper bit is reserved.
pub const PHASE_OFFSET_MASK: u8 = 0x7F;

/// Packs the P1/P2/P3, R divider and divide-by-4 fields of a Multisynth.
///
/// The integer mode bit lives in a control register and is not part of the
/// block.
pub fn pack_multisynth(divider: &RationalDivider) -> Result<[u8; MULTISYNTH_BLOCK_LEN], Error> {
    if !divider.fits_registers() {
        return Err(Error::InconsistentEncoding);
    }
    let (p1, p2, p3) = (divider.p1, divider.p2, divider.p3);
    let divby4 = if divider.divide_by_4 { MS_DIVBY4 } else { 0 };

    Ok([
        ((p3 & 0x0000FF00) >> 8) as u8,
        p3 as u8,
        (divider.r_div.exponent() << 4) | divby4 | ((p1 & 0x00030000) >> 16) as u8,
        ((p1 & 0x0000FF00) >> 8) as u8,
        p1 as u8,
        (((p3 & 0x000F0000) >> 12) | ((p2 & 0x000F0000) >> 16)) as u8,
        ((p2 & 0x0000FF00) >> 8) as u8,
        p2 as u8,
    ])
}

pub fn unpack_multisynth(
    block: &[u8; MULTISYNTH_BLOCK_LEN],
    integer_mode: bool,
) -> Result<RationalDivider, Error> {
    let p1 = (u32::from(block[2] & 0x03) << 16) | (u32::from(block[3]) << 8) | u32::from(block[4]);
    let p2 = (u32::from(block[5] & 0x0F) << 16) | (u32::from(block[6]) << 8) | u32::from(block[7]);
    let p3 = (u32::from(block[5] & 0xF0) << 12) | (u32::from(block[0]) << 8) | u32::from(block[1]);

    Ok(RationalDivider {
        integer_mode,
        p1,
        p2,
        p3,
        r_div: OutputDivider::from_exponent((block[2] >> 4) & 0x07)?,
        divide_by_4: block[2] & MS_DIVBY4 == MS_DIVBY4,
    })
}

fn leg_fits(leg: &SpreadLeg) -> bool {
    leg.p1 <= 0x0FFF && leg.p2 <= 0x7FFF && leg.p3 <= 0x7FFF
}

/// Packs registers 149..=161. `tail` is the current value of register 161,
/// whose upper nibble is not part of the spread spectrum settings.
pub fn pack_spread_spectrum(
    ssc: &SpreadSpectrum,
    enabled: bool,
    tail: u8,
) -> Result<[u8; SPREAD_SPECTRUM_BLOCK_LEN], Error> {
    if ssc.up_down_period > 0x0FFF || !leg_fits(&ssc.down) || !leg_fits(&ssc.up) {
        return Err(Error::InconsistentEncoding);
    }
    let en = if enabled {
        SpreadSpectrumBits::SSC_EN.bits()
    } else {
        0
    };
    let mode = match ssc.mode {
        SpreadMode::Down => 0,
        SpreadMode::Center => SpreadSpectrumBits::SSC_MODE.bits(),
    };
    let (dn, up, udp) = (&ssc.down, &ssc.up, ssc.up_down_period);

    Ok([
        en | (dn.p2 >> 8) as u8,
        dn.p2 as u8,
        mode | (dn.p3 >> 8) as u8,
        dn.p3 as u8,
        dn.p1 as u8,
        ((udp >> 4) & 0xF0) as u8 | ((dn.p1 >> 8) & 0x0F) as u8,
        udp as u8,
        (up.p2 >> 8) as u8,
        up.p2 as u8,
        (up.p3 >> 8) as u8,
        up.p3 as u8,
        up.p1 as u8,
        (tail & 0xF0) | ((up.p1 >> 8) & 0x0F) as u8,
    ])
}

/// Unpacks registers 149..=161 into the settings and the `SSC_EN` bit.
pub fn unpack_spread_spectrum(block: &[u8; SPREAD_SPECTRUM_BLOCK_LEN]) -> (SpreadSpectrum, bool) {
    let word = |hi: u8, lo: u8| (u16::from(hi) << 8) | u16::from(lo);

    let enabled = block[0] & SpreadSpectrumBits::SSC_EN.bits() != 0;
    let mode = if block[2] & SpreadSpectrumBits::SSC_MODE.bits() != 0 {
        SpreadMode::Center
    } else {
        SpreadMode::Down
    };

    let ssc = SpreadSpectrum {
        mode,
        up_down_period: (u16::from(block[5] & 0xF0) << 4) | u16::from(block[6]),
        down: SpreadLeg {
            p1: word(block[5] & 0x0F, block[4]),
            p2: word(block[0] & 0x7F, block[1]),
            p3: word(block[2] & 0x7F, block[3]),
        },
        up: SpreadLeg {
            p1: word(block[12] & 0x0F, block[11]),
            p2: word(block[7] & 0x7F, block[8]),
            p3: word(block[9] & 0x7F, block[10]),
        },
    };
    (ssc, enabled)
}

pub fn pack_vcxo(pull: VcxoPull) -> [u8; VCXO_BLOCK_LEN] {
    let bits = pull.bits();
    [bits as u8, (bits >> 8) as u8, ((bits >> 16) & 0x3F) as u8]
}

pub fn unpack_vcxo(block: &[u8; VCXO_BLOCK_LEN]) -> VcxoPull {
    let bits =
        (u32::from(block[2] & 0x3F) << 16) | (u32::from(block[1]) << 8) | u32::from(block[0]);
    VcxoPull::truncate(bits)
}
