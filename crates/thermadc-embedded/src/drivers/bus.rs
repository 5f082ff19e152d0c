//! SPI transports for the ADC
//!
//! Two interchangeable transports implement [`SpiTransfer`]:
//! - [`BitBangSpi`]: software SPI clocked out on four GPIO lines
//! - [`HardwareSpi`]: any `embedded-hal` [`SpiDevice`] (e.g. `/dev/spidev0.0`)
//!
//! [`BusTransport`] holds one of the two, picked once at construction.
//!
//! # Bit-banged timing (SPI mode 0,0)
//!
//! ```text
//! CS   ‾‾\_____________________________ ... ______/‾‾
//! CLK  ______/‾\_/‾\_/‾\_/‾\_/‾\_/‾\_/‾\_/‾\ ...
//! MOSI  <b7> <b6> <b5> <b4> <b3> <b2> <b1> <b0>
//! MISO   sampled while CLK is high, MSB first
//! ```

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, SpiDevice};

/// Transport-level failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusError {
    /// A GPIO line could not be driven or read
    Pin(digital::ErrorKind),
    /// The SPI controller reported an error
    Spi(spi::ErrorKind),
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Pin(kind) => write!(f, "GPIO error: {kind:?}"),
            Self::Spi(kind) => write!(f, "SPI error: {kind:?}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BusError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Pin(_) => defmt::write!(f, "GPIO error"),
            Self::Spi(_) => defmt::write!(f, "SPI error"),
        }
    }
}

fn pin_fault<E: digital::Error>(err: E) -> BusError {
    BusError::Pin(err.kind())
}

/// Full-duplex byte exchange.
pub trait SpiTransfer {
    /// Clock `frame` out MSB first, replacing each byte with the byte
    /// clocked in at the same time.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the underlying lines or controller fail.
    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), BusError>;
}

impl<T: SpiTransfer + ?Sized> SpiTransfer for &mut T {
    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), BusError> {
        (**self).transfer(frame)
    }
}

// ============================================================================
// Software SPI
// ============================================================================

/// Software SPI over four GPIO lines.
pub struct BitBangSpi<CLK, MOSI, MISO, CS> {
    clk: CLK,
    mosi: MOSI,
    miso: MISO,
    cs: CS,
}

impl<CLK, MOSI, MISO, CS> BitBangSpi<CLK, MOSI, MISO, CS>
where
    CLK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    CS: OutputPin,
{
    /// Take ownership of the lines and drive them to idle (CS high, CLK low).
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Pin`] if an idle level cannot be set.
    pub fn new(clk: CLK, mosi: MOSI, miso: MISO, cs: CS) -> Result<Self, BusError> {
        let mut bus = Self { clk, mosi, miso, cs };
        bus.cs.set_high().map_err(pin_fault)?;
        bus.clk.set_low().map_err(pin_fault)?;
        Ok(bus)
    }

    /// Give the lines back.
    pub fn release(self) -> (CLK, MOSI, MISO, CS) {
        (self.clk, self.mosi, self.miso, self.cs)
    }

    fn exchange_byte(&mut self, out: u8) -> Result<u8, BusError> {
        let mut received = 0u8;
        for bit in (0..8).rev() {
            let mask = 1u8 << bit;
            if out & mask != 0 {
                self.mosi.set_high().map_err(pin_fault)?;
            } else {
                self.mosi.set_low().map_err(pin_fault)?;
            }
            self.clk.set_high().map_err(pin_fault)?;
            if self.miso.is_high().map_err(pin_fault)? {
                received |= mask;
            }
            self.clk.set_low().map_err(pin_fault)?;
        }
        Ok(received)
    }

    fn exchange(&mut self, frame: &mut [u8]) -> Result<(), BusError> {
        self.clk.set_low().map_err(pin_fault)?;
        self.cs.set_low().map_err(pin_fault)?;
        for byte in frame.iter_mut() {
            *byte = self.exchange_byte(*byte)?;
        }
        Ok(())
    }
}

impl<CLK, MOSI, MISO, CS> SpiTransfer for BitBangSpi<CLK, MOSI, MISO, CS>
where
    CLK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    CS: OutputPin,
{
    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), BusError> {
        let result = self.exchange(frame);
        // CS is released even when the exchange failed part way.
        let deselect = self.cs.set_high().map_err(pin_fault);
        result.and(deselect)
    }
}

// ============================================================================
// Hardware SPI
// ============================================================================

/// Hardware SPI controller; chip-select is handled by the device.
pub struct HardwareSpi<D> {
    device: D,
}

impl<D: SpiDevice> HardwareSpi<D> {
    /// Wrap an SPI device.
    #[must_use]
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Give the device back.
    pub fn release(self) -> D {
        self.device
    }
}

impl<D: SpiDevice> SpiTransfer for HardwareSpi<D> {
    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), BusError> {
        self.device
            .transfer_in_place(frame)
            .map_err(|e| BusError::Spi(spi::Error::kind(&e)))
    }
}

// ============================================================================
// Transport Selection
// ============================================================================

/// Which transport a [`BusTransport`] holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Dedicated SPI controller
    Hardware,
    /// Bit-banged GPIO
    Software,
}

impl TransportKind {
    /// Short name for logs and file headers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
        }
    }
}

/// Hardware or software transport, fixed for the life of the value.
pub enum BusTransport<H, S> {
    /// Dedicated SPI controller
    Hardware(H),
    /// Bit-banged GPIO
    Software(S),
}

impl<H, S> BusTransport<H, S> {
    /// Which variant this is.
    pub const fn kind(&self) -> TransportKind {
        match self {
            Self::Hardware(_) => TransportKind::Hardware,
            Self::Software(_) => TransportKind::Software,
        }
    }
}

impl<H: SpiTransfer, S: SpiTransfer> SpiTransfer for BusTransport<H, S> {
    fn transfer(&mut self, frame: &mut [u8]) -> Result<(), BusError> {
        match self {
            Self::Hardware(bus) => bus.transfer(frame),
            Self::Software(bus) => bus.transfer(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};
    use embedded_hal_mock::eh1::MockError;

    fn level(bit: bool) -> PinState {
        if bit {
            PinState::High
        } else {
            PinState::Low
        }
    }

    /// Expected pin traffic for one bit-banged transfer.
    fn expectations(
        out: &[u8],
        response: &[u8],
    ) -> (
        Vec<PinTransaction>,
        Vec<PinTransaction>,
        Vec<PinTransaction>,
        Vec<PinTransaction>,
    ) {
        // Constructor idles CS high, CLK low; transfer re-asserts CLK low
        let mut clk = vec![PinTransaction::set(PinState::Low), PinTransaction::set(PinState::Low)];
        let mut cs = vec![PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)];
        let mut mosi = Vec::new();
        let mut miso = Vec::new();

        for (&o, &r) in out.iter().zip(response) {
            for bit in (0..8).rev() {
                mosi.push(PinTransaction::set(level(o & (1 << bit) != 0)));
                clk.push(PinTransaction::set(PinState::High));
                clk.push(PinTransaction::set(PinState::Low));
                miso.push(PinTransaction::get(level(r & (1 << bit) != 0)));
            }
        }
        cs.push(PinTransaction::set(PinState::High));
        (clk, mosi, miso, cs)
    }

    #[test]
    fn test_bitbang_transfer_msb_first() {
        let out = [0x01, 0xA0, 0x00];
        let response = [0x00, 0x02, 0xFF];
        let (clk, mosi, miso, cs) = expectations(&out, &response);

        let mut bus = BitBangSpi::new(
            PinMock::new(&clk),
            PinMock::new(&mosi),
            PinMock::new(&miso),
            PinMock::new(&cs),
        )
        .unwrap();

        let mut frame = out;
        bus.transfer(&mut frame).unwrap();
        assert_eq!(frame, response);

        let (mut clk, mut mosi, mut miso, mut cs) = bus.release();
        clk.done();
        mosi.done();
        miso.done();
        cs.done();
    }

    #[test]
    fn test_bitbang_empty_frame_toggles_cs_only() {
        let (clk, mosi, miso, cs) = expectations(&[], &[]);
        let mut bus = BitBangSpi::new(
            PinMock::new(&clk),
            PinMock::new(&mosi),
            PinMock::new(&miso),
            PinMock::new(&cs),
        )
        .unwrap();

        let mut frame: [u8; 0] = [];
        bus.transfer(&mut frame).unwrap();

        let (mut clk, mut mosi, mut miso, mut cs) = bus.release();
        clk.done();
        mosi.done();
        miso.done();
        cs.done();
    }

    #[test]
    fn test_bitbang_pin_fault_releases_cs() {
        // First bit of 0x80: MOSI high, CLK high, then the MISO read fails
        let clk = [
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ];
        let mosi = [PinTransaction::set(PinState::High)];
        let miso = [PinTransaction::get(PinState::High)
            .with_error(MockError::Io(std::io::ErrorKind::Other))];
        let cs = [
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ];

        let mut bus = BitBangSpi::new(
            PinMock::new(&clk),
            PinMock::new(&mosi),
            PinMock::new(&miso),
            PinMock::new(&cs),
        )
        .unwrap();

        let mut frame = [0x80, 0x00];
        let err = bus.transfer(&mut frame).unwrap_err();
        assert_eq!(err, BusError::Pin(digital::ErrorKind::Other));

        // done() checks the trailing CS release was consumed
        let (mut clk, mut mosi, mut miso, mut cs) = bus.release();
        clk.done();
        mosi.done();
        miso.done();
        cs.done();
    }

    #[test]
    fn test_bitbang_idle_failure_reported() {
        let cs = [PinTransaction::set(PinState::High)
            .with_error(MockError::Io(std::io::ErrorKind::Other))];
        let (mut clk, mut mosi, mut miso, mut cs) = (
            PinMock::new(&[]),
            PinMock::new(&[]),
            PinMock::new(&[]),
            PinMock::new(&cs),
        );
        let result = BitBangSpi::new(clk.clone(), mosi.clone(), miso.clone(), cs.clone());
        assert!(matches!(result, Err(BusError::Pin(_))));

        clk.done();
        mosi.done();
        miso.done();
        cs.done();
    }

    #[test]
    fn test_hardware_transfer_in_place() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0x01, 0x80, 0x00], vec![0x00, 0x01, 0x23]),
            SpiTransaction::transaction_end(),
        ];
        let mut bus = HardwareSpi::new(SpiMock::new(&expectations));

        let mut frame = [0x01, 0x80, 0x00];
        bus.transfer(&mut frame).unwrap();
        assert_eq!(frame, [0x00, 0x01, 0x23]);

        bus.release().done();
    }

    #[test]
    fn test_transport_dispatch() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::transfer_in_place(vec![0xAB], vec![0xCD]),
            SpiTransaction::transaction_end(),
        ];
        let mut transport: BusTransport<_, HardwareSpi<SpiMock<u8>>> =
            BusTransport::Hardware(HardwareSpi::new(SpiMock::new(&expectations)));
        assert_eq!(transport.kind(), TransportKind::Hardware);

        let mut frame = [0xAB];
        transport.transfer(&mut frame).unwrap();
        assert_eq!(frame, [0xCD]);

        if let BusTransport::Hardware(bus) = transport {
            bus.release().done();
        }
    }
}
