//! ADC construction for the selected device and transport

use clap::{Args, ValueEnum};
use thermadc_core::math::constants::DEFAULT_REFERENCE_VOLTAGE;
use thermadc_embedded::{BitBangSpi, BusTransport, HardwareSpi, Mcp3008};
use thermadc_native::simulate::{SimCs, SimClk, SimMiso, SimMosi};
use thermadc_native::{Mcp3008Model, SimulatedPins, SimulatedSpiDevice};
use tracing::info;

/// Where conversions come from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    /// Bit-accurate MCP3008 simulator
    Simulate,
    /// Raspberry Pi GPIO / spidev (requires the `rpi` feature)
    Gpio,
}

/// How bytes reach the ADC.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    /// Bit-banged over four GPIO lines
    Software,
    /// Dedicated SPI controller
    Hardware,
}

/// Supported converter chips.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum AdcModel {
    /// Microchip MCP3008, 8 channels, 10 bits
    Mcp3008,
}

/// Device selection flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// ADC chip
    #[arg(long, value_enum, default_value_t = AdcModel::Mcp3008)]
    pub adc: AdcModel,

    /// Device backend
    #[arg(long, value_enum, default_value_t = DeviceKind::Simulate)]
    pub device: DeviceKind,

    /// Bus transport
    #[arg(long, value_enum, default_value_t = TransportArg::Software)]
    pub transport: TransportArg,

    /// ADC reference voltage (V)
    #[arg(long, default_value_t = DEFAULT_REFERENCE_VOLTAGE)]
    pub vref: f64,

    /// Software SPI clock pin (BCM)
    #[arg(long, default_value_t = 18)]
    pub clk_pin: u8,

    /// Software SPI data-in pin (BCM)
    #[arg(long, default_value_t = 23)]
    pub miso_pin: u8,

    /// Software SPI data-out pin (BCM)
    #[arg(long, default_value_t = 24)]
    pub mosi_pin: u8,

    /// Software SPI chip-select pin (BCM)
    #[arg(long, default_value_t = 25)]
    pub cs_pin: u8,

    /// Hardware SPI clock (Hz)
    #[arg(long, default_value_t = 1_000_000)]
    pub spi_clock_hz: u32,
}

/// Transport for the simulator.
pub type SimulatedTransport =
    BusTransport<HardwareSpi<SimulatedSpiDevice>, BitBangSpi<SimClk, SimMosi, SimMiso, SimCs>>;

/// MCP3008 backed by the simulator on the requested transport.
pub fn open_simulated(args: &DeviceArgs) -> anyhow::Result<Mcp3008<SimulatedTransport>> {
    let model = Mcp3008Model::drifting(args.vref);
    let transport = match args.transport {
        TransportArg::Hardware => {
            BusTransport::Hardware(HardwareSpi::new(SimulatedSpiDevice::new(model)))
        }
        TransportArg::Software => {
            let pins = SimulatedPins::new(model);
            let (clk, mosi, miso, cs) = pins.split();
            let bus = BitBangSpi::new(clk, mosi, miso, cs).map_err(|e| anyhow::anyhow!("{}", e))?;
            BusTransport::Software(bus)
        }
    };
    info!("Simulated {:?} on {} transport", args.adc, transport.kind().name());
    Ok(Mcp3008::new(transport, args.vref))
}

#[cfg(feature = "rpi")]
pub use rpi::{open_gpio, GpioTransport};

#[cfg(feature = "rpi")]
mod rpi {
    use anyhow::Context;
    use rppal::gpio::{Gpio, InputPin, OutputPin};
    use rppal::spi::{Bus, Mode, SimpleHalSpiDevice, SlaveSelect, Spi};
    use thermadc_embedded::{BitBangSpi, BusTransport, HardwareSpi, Mcp3008};
    use tracing::info;

    use super::{DeviceArgs, TransportArg};

    /// Transport on Raspberry Pi peripherals.
    pub type GpioTransport = BusTransport<
        HardwareSpi<SimpleHalSpiDevice>,
        BitBangSpi<OutputPin, OutputPin, InputPin, OutputPin>,
    >;

    /// MCP3008 on the Pi's GPIO header.
    pub fn open_gpio(args: &DeviceArgs) -> anyhow::Result<Mcp3008<GpioTransport>> {
        let transport = match args.transport {
            TransportArg::Hardware => {
                let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, args.spi_clock_hz, Mode::Mode0)
                    .context("failed to open /dev/spidev0.0")?;
                info!("Hardware SPI0 CE0 at {} Hz", args.spi_clock_hz);
                BusTransport::Hardware(HardwareSpi::new(SimpleHalSpiDevice::new(spi)))
            }
            TransportArg::Software => {
                let gpio = Gpio::new().context("failed to open GPIO")?;
                let clk = gpio.get(args.clk_pin)?.into_output();
                let mosi = gpio.get(args.mosi_pin)?.into_output();
                let miso = gpio.get(args.miso_pin)?.into_input();
                let cs = gpio.get(args.cs_pin)?.into_output();
                info!(
                    "Software SPI on BCM CLK={} MISO={} MOSI={} CS={}",
                    args.clk_pin, args.miso_pin, args.mosi_pin, args.cs_pin
                );
                let bus =
                    BitBangSpi::new(clk, mosi, miso, cs).map_err(|e| anyhow::anyhow!("{}", e))?;
                BusTransport::Software(bus)
            }
        };
        Ok(Mcp3008::new(transport, args.vref))
    }
}
