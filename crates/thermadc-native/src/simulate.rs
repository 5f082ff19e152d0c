//! MCP3008 simulator
//!
//! [`Mcp3008Model`] reproduces the chip's serial state machine clock by
//! clock: it waits for the start bit, shifts in SGL/DIFF and D2..D0, converts,
//! then shifts out a null bit and B9..B0. Input voltages come from a
//! deterministic signal function of `(input, conversion_index)`.
//!
//! The model is exposed two ways:
//! - [`SimulatedSpiDevice`]: an `embedded-hal` [`SpiDevice`] for
//!   [`HardwareSpi`](thermadc_embedded::HardwareSpi)
//! - [`SimulatedPins`]: four GPIO lines for
//!   [`BitBangSpi`](thermadc_embedded::BitBangSpi), decoded on CLK rising edges
//!
//! ```text
//! clock after start:  1    2  3  4    5       6     7 .. 16
//! MOSI:              SGL  D2 D1 D0    x       x     x
//! MISO:               -    -  -  -  sample  null   B9 .. B0
//! ```

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};
use thermadc_core::protocol::{differential_pair, MAX_RAW};
use thermadc_core::types::InputMode;
use thermadc_core::RawSample;

/// Input voltage as a function of `(input, conversion_index)`.
pub type Signal = Box<dyn FnMut(u8, u64) -> f64 + Send>;

// ============================================================================
// Chip Model
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// Waiting for the start bit
    Idle,
    /// Shifting in SGL/DIFF and D2..D0
    Command { bits: u8, count: u8 },
    /// Shifting out the result
    Output { raw: u16, clock: u8 },
}

/// Bit-level MCP3008 model.
pub struct Mcp3008Model {
    reference_voltage: f64,
    signal: Signal,
    conversions: u64,
    phase: Phase,
}

impl Mcp3008Model {
    /// Model driven by an arbitrary signal.
    pub fn new(reference_voltage: f64, signal: impl FnMut(u8, u64) -> f64 + Send + 'static) -> Self {
        Self {
            reference_voltage,
            signal: Box::new(signal),
            conversions: 0,
            phase: Phase::Idle,
        }
    }

    /// Every input held at `volts`.
    pub fn constant(reference_voltage: f64, volts: f64) -> Self {
        Self::new(reference_voltage, move |_, _| volts)
    }

    /// Slow sine on every input, phase-shifted per input, within the rails.
    #[allow(clippy::cast_precision_loss)]
    pub fn drifting(reference_voltage: f64) -> Self {
        Self::new(reference_voltage, move |input, tick| {
            let phase = tick as f64 / 500.0 + f64::from(input);
            reference_voltage * (0.5 + 0.25 * phase.sin())
        })
    }

    /// Conversions performed so far.
    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    /// Sample the inputs for `channel` in `mode`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn convert(&mut self, channel: u8, mode: InputMode) -> RawSample {
        let tick = self.conversions;
        self.conversions += 1;

        let volts = match mode {
            InputMode::SingleEnded => (self.signal)(channel, tick),
            InputMode::Differential => {
                let (plus, minus) = differential_pair(channel);
                (self.signal)(plus, tick) - (self.signal)(minus, tick)
            }
        };
        let max = f64::from(MAX_RAW);
        let counts = (volts / self.reference_voltage * max).round().clamp(0.0, max);
        RawSample::from_bits_truncate(counts as u16)
    }

    /// Chip-select asserted: restart the serial state machine.
    pub fn select(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Chip-select released: abort any conversion in progress.
    pub fn deselect(&mut self) {
        self.phase = Phase::Idle;
    }

    /// One clock: consume `mosi`, return the level presented on MISO.
    pub fn clock_bit(&mut self, mosi: bool) -> bool {
        match self.phase {
            Phase::Idle => {
                if mosi {
                    self.phase = Phase::Command { bits: 0, count: 0 };
                }
                false
            }
            Phase::Command { bits, count } => {
                let bits = (bits << 1) | u8::from(mosi);
                let count = count + 1;
                if count == 4 {
                    let mode = if bits & 0b1000 != 0 {
                        InputMode::SingleEnded
                    } else {
                        InputMode::Differential
                    };
                    let raw = self.convert(bits & 0b111, mode).value();
                    self.phase = Phase::Output { raw, clock: 0 };
                } else {
                    self.phase = Phase::Command { bits, count };
                }
                false
            }
            Phase::Output { raw, clock } => {
                let clock = clock.saturating_add(1);
                self.phase = Phase::Output { raw, clock };
                // 1: sample, 2: null bit, 3..=12: B9..B0
                match clock {
                    3..=12 => (raw >> (12 - clock)) & 1 != 0,
                    _ => false,
                }
            }
        }
    }

    /// Eight clocks, MSB first.
    pub fn exchange_byte(&mut self, out: u8) -> u8 {
        let mut received = 0u8;
        for bit in (0..8).rev() {
            if self.clock_bit(out & (1 << bit) != 0) {
                received |= 1 << bit;
            }
        }
        received
    }
}

// ============================================================================
// Byte-Level Device
// ============================================================================

/// The model behind an `embedded-hal` SPI device; each transaction is one
/// chip-select cycle.
pub struct SimulatedSpiDevice {
    model: Mcp3008Model,
}

impl SimulatedSpiDevice {
    /// Wrap a model.
    pub fn new(model: Mcp3008Model) -> Self {
        Self { model }
    }

    /// Borrow the model.
    pub fn model(&self) -> &Mcp3008Model {
        &self.model
    }
}

impl SpiErrorType for SimulatedSpiDevice {
    type Error = Infallible;
}

impl SpiDevice for SimulatedSpiDevice {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        self.model.select();
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.model.exchange_byte(0);
                    }
                }
                Operation::Write(buf) => {
                    for &byte in buf.iter() {
                        self.model.exchange_byte(byte);
                    }
                }
                Operation::Transfer(read, write) => {
                    for i in 0..read.len().max(write.len()) {
                        let received = self.model.exchange_byte(write.get(i).copied().unwrap_or(0));
                        if let Some(slot) = read.get_mut(i) {
                            *slot = received;
                        }
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = self.model.exchange_byte(*byte);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        self.model.deselect();
        Ok(())
    }
}

// ============================================================================
// Pin-Level Device
// ============================================================================

struct PinBus {
    model: Mcp3008Model,
    clk: bool,
    mosi: bool,
    miso: bool,
    selected: bool,
}

/// The model behind four GPIO lines.
///
/// Call [`SimulatedPins::split`] to get the CLK, MOSI, MISO and CS handles
/// for a bit-banged bus. Single-threaded only.
pub struct SimulatedPins {
    bus: Rc<RefCell<PinBus>>,
}

impl SimulatedPins {
    /// Wire up a model; CS starts deasserted.
    pub fn new(model: Mcp3008Model) -> Self {
        Self {
            bus: Rc::new(RefCell::new(PinBus {
                model,
                clk: false,
                mosi: false,
                miso: false,
                selected: false,
            })),
        }
    }

    /// Handles for `(CLK, MOSI, MISO, CS)`.
    pub fn split(&self) -> (SimClk, SimMosi, SimMiso, SimCs) {
        (
            SimClk(Rc::clone(&self.bus)),
            SimMosi(Rc::clone(&self.bus)),
            SimMiso(Rc::clone(&self.bus)),
            SimCs(Rc::clone(&self.bus)),
        )
    }

    /// Conversions performed so far.
    pub fn conversions(&self) -> u64 {
        self.bus.borrow().model.conversions()
    }
}

/// Simulated clock line (output).
pub struct SimClk(Rc<RefCell<PinBus>>);

/// Simulated host-to-chip data line (output).
pub struct SimMosi(Rc<RefCell<PinBus>>);

/// Simulated chip-to-host data line (input).
pub struct SimMiso(Rc<RefCell<PinBus>>);

/// Simulated chip-select line (output, active low).
pub struct SimCs(Rc<RefCell<PinBus>>);

impl PinErrorType for SimClk {
    type Error = Infallible;
}

impl PinErrorType for SimMosi {
    type Error = Infallible;
}

impl PinErrorType for SimMiso {
    type Error = Infallible;
}

impl PinErrorType for SimCs {
    type Error = Infallible;
}

impl OutputPin for SimClk {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().clk = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut bus = self.0.borrow_mut();
        let rising = !bus.clk;
        bus.clk = true;
        if rising && bus.selected {
            let mosi = bus.mosi;
            let miso = bus.model.clock_bit(mosi);
            bus.miso = miso;
        }
        Ok(())
    }
}

impl OutputPin for SimMosi {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().mosi = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.borrow_mut().mosi = true;
        Ok(())
    }
}

impl InputPin for SimMiso {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.borrow().miso)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.borrow().miso)
    }
}

impl OutputPin for SimCs {
    fn set_low(&mut self) -> Result<(), Infallible> {
        let mut bus = self.0.borrow_mut();
        if !bus.selected {
            bus.selected = true;
            bus.miso = false;
            bus.model.select();
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        let mut bus = self.0.borrow_mut();
        bus.selected = false;
        bus.model.deselect();
        Ok(())
    }
}
