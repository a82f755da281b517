/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Driver Tests
//!
//! Drives `Si5351Device` against an in-memory register file that behaves
//! like the chip's I²C interface (register pointer, auto-increment).

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::blocking::i2c::{Write, WriteRead};
use si5351_fracn::{
    multisynth, spread, vcxo, ClkIn, ClkInDivider, ClockOutput, Config, Error, Multisynth,
    OutputDivider, PllSource, RationalDivider, Si5351, Si5351Device, SpreadMode, Variant, PLL,
};

const ADDRESS: u8 = 0x60;

#[derive(Debug, PartialEq)]
struct BusError;

struct FakeI2c {
    regs: [u8; 256],
    address: u8,
    /// Status reads that still report `SYS_INIT`.
    init_reads: u32,
    broken: bool,
    /// Shared with the test so writes can fail while the driver owns the bus.
    writes_fail: Rc<Cell<bool>>,
}

impl FakeI2c {
    fn new() -> Self {
        FakeI2c {
            regs: [0; 256],
            address: ADDRESS,
            init_reads: 0,
            broken: false,
            writes_fail: Rc::new(Cell::new(false)),
        }
    }

    fn check(&self, address: u8) -> Result<(), BusError> {
        if self.broken || address != self.address {
            return Err(BusError);
        }
        Ok(())
    }
}

impl Write for FakeI2c {
    type Error = BusError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.check(address)?;
        if self.writes_fail.get() {
            return Err(BusError);
        }
        let (&reg, data) = bytes.split_first().ok_or(BusError)?;
        for (i, &byte) in data.iter().enumerate() {
            self.regs[reg as usize + i] = byte;
        }
        Ok(())
    }
}

impl WriteRead for FakeI2c {
    type Error = BusError;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), BusError> {
        self.check(address)?;
        let reg = *bytes.first().ok_or(BusError)? as usize;
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.regs[reg + i];
        }
        if reg == 0 && self.init_reads > 0 {
            self.init_reads -= 1;
            buffer[0] |= 0x80;
        }
        Ok(())
    }
}

fn device(config: Config) -> Si5351Device<FakeI2c> {
    let mut clock = Si5351Device::new(FakeI2c::new(), config).unwrap();
    clock.init().unwrap();
    clock
}

fn eight_outputs() -> Config {
    Config::new(Variant::A8, 25_000_000)
}

// =============================================================================
// Construction and init
// =============================================================================

#[test]
fn test_new_rejects_invalid_config() {
    let result = Si5351Device::new(FakeI2c::new(), Config::new(Variant::A8, 26_000_000));
    assert!(matches!(result, Err(Error::InvalidInput)));
}

#[test]
fn test_address_bit_selects_0x61() {
    let mut bus = FakeI2c::new();
    bus.address = 0x61;
    let mut clock =
        Si5351Device::new(bus, Config::adafruit_module().with_address_bit(true)).unwrap();
    assert_eq!(clock.init(), Ok(()));
}

#[test]
fn test_init_powers_down_everything() {
    let mut bus = FakeI2c::new();
    bus.init_reads = 3;
    let mut clock = Si5351Device::new(bus, Config::adafruit_module()).unwrap();
    clock.init().unwrap();

    let bus = clock.release();
    assert_eq!(bus.init_reads, 0, "init should wait for SYS_INIT to clear");
    assert_eq!(bus.regs[3], 0xFF);
    for reg in 16..=23 {
        assert_eq!(bus.regs[reg], 0x80, "CLK{} control", reg - 16);
    }
    // reserved bits plus 10 pF
    assert_eq!(bus.regs[183], 0xD2);
    assert_eq!(bus.regs[15], 0x00);
}

#[test]
fn test_bus_failure_is_a_communication_error() {
    let mut bus = FakeI2c::new();
    bus.broken = true;
    let mut clock = Si5351Device::new(bus, Config::adafruit_module()).unwrap();
    assert_eq!(clock.init(), Err(Error::CommunicationError));
    assert_eq!(clock.read_device_status(), Err(Error::CommunicationError));
}

// =============================================================================
// Output configuration
// =============================================================================

#[test]
fn test_configure_output_reads_back() {
    let mut clock = device(Config::adafruit_module());
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 800_000_000.0, 10_000_000.0)
        .unwrap();

    assert_eq!(clock.vco_frequency(PLL::A), Ok(800_000_000.0));
    assert_eq!(clock.output_frequency(ClockOutput::Clk0), Ok(10_000_000.0));

    let ms = clock.read_multisynth(Multisynth::MS0).unwrap();
    assert_eq!(ms.r_div, OutputDivider::Div16);
    assert!(ms.integer_mode);
    assert_eq!(ms, multisynth::solve(800e6, 10e6).unwrap());

    let bus = clock.release();
    // 32 is an integer feedback ratio: FBA_INT on top of CLK6's power down
    assert_eq!(bus.regs[22], 0xC0);
    // powered up, MS_INT, MultiSynth source, 8 mA
    assert_eq!(bus.regs[16], 0x4F);
    assert_eq!(bus.regs[3], 0xFE);
    assert_eq!(bus.regs[177], 0x20);
}

#[test]
fn test_pll_b_sets_ms_src() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::B, ClockOutput::Clk2, 875_000_000.0, 14_000_000.0)
        .unwrap();

    assert_eq!(clock.output_frequency(ClockOutput::Clk2), Ok(14_000_000.0));
    let ms = clock.read_multisynth(Multisynth::MS2).unwrap();
    assert_eq!(ms.r_div, OutputDivider::Div8);

    let bus = clock.release();
    assert_eq!(bus.regs[18] & 0x20, 0x20);
    assert_eq!(bus.regs[177], 0x80);
}

#[test]
fn test_fractional_feedback_clears_fb_int() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 800_000_000.0, 10_000_000.0)
        .unwrap();
    clock
        .configure_output(PLL::A, ClockOutput::Clk1, 812_500_000.0, 10_000_000.0)
        .unwrap();

    assert!(!clock.read_pll(PLL::A).unwrap().integer_mode);
    assert_eq!(clock.vco_frequency(PLL::A), Ok(812_500_000.0));
    assert_eq!(clock.output_frequency(ClockOutput::Clk1), Ok(10_000_000.0));
}

#[test]
fn test_divide_by_4_above_150_mhz() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::A, ClockOutput::Clk1, 900_000_000.0, 162_500_000.0)
        .unwrap();

    let ms = clock.read_multisynth(Multisynth::MS1).unwrap();
    assert!(ms.divide_by_4);
    assert!(ms.integer_mode);
    assert_eq!(clock.vco_frequency(PLL::A), Ok(650_000_000.0));
    assert_eq!(clock.output_frequency(ClockOutput::Clk1), Ok(162_500_000.0));
}

#[test]
fn test_150_mhz_stays_fractional() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 900_000_000.0, 150_000_000.0)
        .unwrap();
    assert!(!clock.read_multisynth(Multisynth::MS0).unwrap().divide_by_4);
    assert_eq!(clock.output_frequency(ClockOutput::Clk0), Ok(150_000_000.0));
}

#[test]
fn test_out_of_range_requests_leave_outputs_alone() {
    let mut clock = device(eight_outputs());
    assert_eq!(
        clock.configure_output(PLL::A, ClockOutput::Clk0, 300_000_000.0, 10_000_000.0),
        Err(Error::OutOfRange)
    );
    assert_eq!(
        clock.configure_output(PLL::A, ClockOutput::Clk0, 800_000_000.0, 400_000.0),
        Err(Error::OutOfRange)
    );
    assert_eq!(
        clock.configure_output(PLL::A, ClockOutput::Clk0, 800_000_000.0, 0.0),
        Err(Error::InvalidInput)
    );
    assert_eq!(clock.release().regs[3], 0xFF);
}

#[test]
fn test_clock_outputs_depend_on_variant() {
    let mut clock = device(Config::adafruit_module());
    assert_eq!(
        clock.configure_output(PLL::A, ClockOutput::Clk3, 800e6, 10e6),
        Err(Error::InvalidInput)
    );
    assert_eq!(
        clock.set_clock_enabled(ClockOutput::Clk3, true),
        Err(Error::InvalidInput)
    );
    assert_eq!(clock.output_frequency(ClockOutput::Clk5), Err(Error::InvalidInput));

    let mut clock = device(eight_outputs());
    // CLK6 and CLK7 have no fractional Multisynth
    assert_eq!(
        clock.configure_output(PLL::A, ClockOutput::Clk6, 800e6, 10e6),
        Err(Error::InvalidInput)
    );
    assert_eq!(clock.set_clock_enabled(ClockOutput::Clk6, true), Ok(()));
}

#[test]
fn test_clock_enable_and_flush() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();
    clock.set_clock_enabled(ClockOutput::Clk0, false).unwrap();
    clock.set_clock_enabled(ClockOutput::Clk7, true).unwrap();
    clock.flush_output_enabled().unwrap();

    let bus = clock.release();
    assert_eq!(bus.regs[3], 0x7F);
    assert_eq!(bus.regs[16] & 0x80, 0x80);
}

#[test]
fn test_failed_configure_leaves_output_disabled() {
    let bus = FakeI2c::new();
    let writes_fail = bus.writes_fail.clone();
    let mut clock = Si5351Device::new(bus, eight_outputs()).unwrap();
    clock.init().unwrap();

    writes_fail.set(true);
    assert_eq!(
        clock.configure_output(PLL::B, ClockOutput::Clk0, 800e6, 10e6),
        Err(Error::CommunicationError)
    );
    writes_fail.set(false);

    // later flushes must not enable the unprogrammed output
    clock.set_clock_enabled(ClockOutput::Clk1, false).unwrap();
    clock.flush_output_enabled().unwrap();
    let bus = clock.release();
    assert_eq!(bus.regs[3], 0xFF);
    assert_eq!(bus.regs[16], 0x80);
}

#[test]
fn test_failed_configure_keeps_previous_source() {
    let bus = FakeI2c::new();
    let writes_fail = bus.writes_fail.clone();
    let mut clock = Si5351Device::new(bus, eight_outputs()).unwrap();
    clock.init().unwrap();
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();

    writes_fail.set(true);
    assert_eq!(
        clock.configure_output(PLL::B, ClockOutput::Clk0, 875e6, 14e6),
        Err(Error::CommunicationError)
    );
    writes_fail.set(false);

    clock.set_clock_enabled(ClockOutput::Clk0, true).unwrap();
    assert_eq!(clock.output_frequency(ClockOutput::Clk0), Ok(10e6));
    assert_eq!(clock.release().regs[16] & 0x20, 0);
}

#[test]
fn test_write_multisynth_checks_divide_by_4_fields() {
    let mut clock = device(eight_outputs());
    let mut broken = RationalDivider::divide_by_4(OutputDivider::Div1);
    broken.p1 = 128;
    assert_eq!(
        clock.write_multisynth(Multisynth::MS0, &broken),
        Err(Error::InconsistentEncoding)
    );
    assert_eq!(clock.release().regs[44], 0);
}

#[test]
fn test_reset_pll_keeps_low_nibble() {
    let mut bus = FakeI2c::new();
    bus.regs[177] = 0x0C;
    let mut clock = Si5351Device::new(bus, eight_outputs()).unwrap();
    clock.reset_pll(PLL::A).unwrap();
    assert_eq!(clock.release().regs[177], 0x2C);
}

#[test]
fn test_reset_pll() {
    let mut clock = device(eight_outputs());
    clock.reset_pll(PLL::B).unwrap();
    assert_eq!(clock.release().regs[177], 0x80);
}

#[test]
fn test_unprogrammed_pll_does_not_decode() {
    let mut clock = device(eight_outputs());
    assert_eq!(clock.vco_frequency(PLL::A), Err(Error::InconsistentEncoding));
}

// =============================================================================
// Spread spectrum
// =============================================================================

#[test]
fn test_spread_spectrum_on_plla() {
    let mut bus = FakeI2c::new();
    bus.regs[161] = 0xA0;
    let mut clock = Si5351Device::new(bus, eight_outputs()).unwrap();
    clock.init().unwrap();
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();

    let ssc = clock.set_spread_spectrum(SpreadMode::Down, -0.01).unwrap();
    assert_eq!(ssc, spread::solve(SpreadMode::Down, 25e6, 32.0, -0.01).unwrap());
    assert_eq!(clock.read_spread_spectrum(), Ok(Some(ssc)));

    clock.disable_spread_spectrum().unwrap();
    assert_eq!(clock.read_spread_spectrum(), Ok(None));

    let bus = clock.release();
    assert_eq!(bus.regs[161] & 0xF0, 0xA0);
}

#[test]
fn test_center_spread_spectrum() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::A, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();
    let ssc = clock.set_spread_spectrum(SpreadMode::Center, 0.01).unwrap();
    assert_eq!(ssc.mode, SpreadMode::Center);
    assert_eq!(clock.read_spread_spectrum(), Ok(Some(ssc)));
    assert_eq!(
        clock.set_spread_spectrum(SpreadMode::Center, 0.02),
        Err(Error::OutOfRange)
    );
}

#[test]
fn test_spread_spectrum_needs_a_programmed_plla() {
    let mut clock = device(eight_outputs());
    assert_eq!(
        clock.set_spread_spectrum(SpreadMode::Down, -0.01),
        Err(Error::InconsistentEncoding)
    );
}

// =============================================================================
// VCXO (Si5351B)
// =============================================================================

#[test]
fn test_vcxo_pull_on_si5351b() {
    let mut clock = device(Config::new(Variant::B, 25_000_000));
    clock
        .configure_output(PLL::B, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();
    assert_eq!(clock.read_pll(PLL::B).unwrap().p3, 1_000_000);

    let pull = clock.set_vcxo_pull(30).unwrap();
    assert_eq!(pull, vcxo::solve(32.0, 30).unwrap());
    assert_eq!(clock.read_vcxo_pull(), Ok(pull));
}

#[test]
fn test_vcxo_feedback_keeps_the_fraction_over_a_million() {
    let mut clock = device(Config::new(Variant::B, 25_000_000));
    clock
        .configure_output(PLL::B, ClockOutput::Clk0, 812_500_000.0, 10e6)
        .unwrap();
    let feedback = clock.read_pll(PLL::B).unwrap();
    assert_eq!(feedback.p3, 1_000_000);
    assert_eq!(clock.vco_frequency(PLL::B), Ok(812_500_000.0));
}

#[test]
fn test_vcxo_needs_si5351b() {
    let mut clock = device(eight_outputs());
    clock
        .configure_output(PLL::B, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();
    assert_eq!(clock.set_vcxo_pull(30), Err(Error::InvalidInput));
    assert_eq!(clock.read_vcxo_pull(), Err(Error::InvalidInput));
}

// =============================================================================
// PLL source (Si5351C)
// =============================================================================

#[test]
fn test_clkin_source_on_si5351c() {
    let clkin = ClkIn {
        freq: 40_000_000,
        divider: ClkInDivider::Div2,
    };
    let mut clock = device(Config::new(Variant::C, 25_000_000).with_clkin(clkin));
    clock.set_pll_source(PLL::B, PllSource::ClkIn).unwrap();
    clock
        .configure_output(PLL::B, ClockOutput::Clk0, 800e6, 10e6)
        .unwrap();

    // 20 MHz after the CLKIN divider: feedback ratio 40
    assert_eq!(clock.read_pll(PLL::B).unwrap().p1, 128 * 40 - 512);
    assert_eq!(clock.vco_frequency(PLL::B), Ok(800e6));
    assert_eq!(clock.output_frequency(ClockOutput::Clk0), Ok(10e6));

    clock.set_pll_source(PLL::A, PllSource::Xtal).unwrap();
    assert_eq!(clock.release().regs[15], 0x48);
}

#[test]
fn test_clkin_needs_si5351c() {
    let mut clock = device(eight_outputs());
    assert_eq!(
        clock.set_pll_source(PLL::A, PllSource::ClkIn),
        Err(Error::InvalidInput)
    );
    assert_eq!(clock.set_pll_source(PLL::A, PllSource::Xtal), Ok(()));
}

// =============================================================================
// Phase offset
// =============================================================================

#[test]
fn test_phase_offset_is_seven_bits() {
    let mut clock = device(eight_outputs());
    clock.set_phase(ClockOutput::Clk1, 0xFF).unwrap();
    clock.set_phase(ClockOutput::Clk5, 42).unwrap();
    assert_eq!(clock.read_phase(ClockOutput::Clk1), Ok(0x7F));
    assert_eq!(clock.read_phase(ClockOutput::Clk5), Ok(42));

    let bus = clock.release();
    assert_eq!(bus.regs[166], 0x7F);
    assert_eq!(bus.regs[170], 42);
}

#[test]
fn test_phase_offset_outputs() {
    let mut clock = device(eight_outputs());
    assert_eq!(clock.set_phase(ClockOutput::Clk6, 1), Err(Error::InvalidInput));
    assert_eq!(clock.read_phase(ClockOutput::Clk7), Err(Error::InvalidInput));

    let mut clock = device(Config::adafruit_module());
    assert_eq!(clock.set_phase(ClockOutput::Clk3, 1), Err(Error::InvalidInput));
    assert_eq!(clock.set_phase(ClockOutput::Clk2, 1), Ok(()));
}
