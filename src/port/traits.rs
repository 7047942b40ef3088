//! Core traits and link parameters for serial port abstraction.
//!
//! Defines the `PortHandle` trait that allows both real serial ports and
//! mock implementations to be driven by the same event pump, plus the
//! `PortOpener` seam that creates them.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Link parameters applied when a port is opened.
///
/// Immutable once applied: reconfiguring means closing and reopening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,
}

impl PortConfig {
    /// Create a configuration with the given baud rate and 8N1 framing.
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }

    /// Set the number of data bits.
    pub fn data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    /// Set the parity mode.
    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the number of stop bits.
    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

impl fmt::Display for PortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} baud {}{}{}",
            self.baud_rate,
            u8::from(self.data_bits),
            self.parity.letter(),
            self.stop_bits
        )
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = PortError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(PortError::config(format!(
                "data bits must be 5, 6, 7 or 8, got {other}"
            ))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl FromStr for DataBits {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: u8 = s
            .trim()
            .parse()
            .map_err(|_| PortError::config(format!("invalid data bits '{s}'")))?;
        Self::try_from(bits)
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
    /// Parity bit always 0.
    Space,
    /// Parity bit always 1.
    Mark,
}

impl Parity {
    fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Even => 'E',
            Self::Odd => 'O',
            Self::Space => 'S',
            Self::Mark => 'M',
        }
    }
}

impl FromStr for Parity {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "even" | "e" => Ok(Self::Even),
            "odd" | "o" => Ok(Self::Odd),
            "space" | "s" => Ok(Self::Space),
            "mark" | "m" => Ok(Self::Mark),
            _ => Err(PortError::config(format!("invalid parity '{s}'"))),
        }
    }
}

impl TryFrom<Parity> for serialport::Parity {
    type Error = PortError;

    fn try_from(parity: Parity) -> Result<Self, Self::Error> {
        match parity {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Even => Ok(serialport::Parity::Even),
            Parity::Space => Err(PortError::unsupported("space parity")),
            Parity::Mark => Err(PortError::unsupported("mark parity")),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "1.5")]
    OnePointFive,
    #[serde(rename = "2")]
    Two,
}

impl TryFrom<f32> for StopBits {
    type Error = PortError;

    fn try_from(bits: f32) -> Result<Self, Self::Error> {
        if bits == 1.0 {
            Ok(Self::One)
        } else if bits == 1.5 {
            Ok(Self::OnePointFive)
        } else if bits == 2.0 {
            Ok(Self::Two)
        } else {
            Err(PortError::config(format!(
                "stop bits must be 1, 1.5 or 2, got {bits}"
            )))
        }
    }
}

impl FromStr for StopBits {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits: f32 = s
            .trim()
            .parse()
            .map_err(|_| PortError::config(format!("invalid stop bits '{s}'")))?;
        Self::try_from(bits)
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::One => "1",
            Self::OnePointFive => "1.5",
            Self::Two => "2",
        })
    }
}

impl TryFrom<StopBits> for serialport::StopBits {
    type Error = PortError;

    fn try_from(bits: StopBits) -> Result<Self, Self::Error> {
        match bits {
            StopBits::One => Ok(serialport::StopBits::One),
            StopBits::Two => Ok(serialport::StopBits::Two),
            StopBits::OnePointFive => Err(PortError::unsupported("1.5 stop bits")),
        }
    }
}

/// An open serial device exclusively owned by one session.
///
/// Implementations must tolerate short timeouts: a read or write that
/// transfers nothing within the handle's I/O timeout reports an error for
/// which [`PortError::is_pending`] is true.
pub trait PortHandle: Send + fmt::Debug {
    /// Read bytes from the device into `buffer`.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Write bytes to the device.
    ///
    /// Returns the number of bytes actually written, which may be fewer
    /// than `data.len()`.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Get the device name this handle was opened with.
    fn name(&self) -> &str;

    /// Abandon pending transfers, discarding unsent and unread bytes.
    fn cancel(&mut self) -> Result<(), PortError>;

    /// Release the device.
    fn close(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}

/// Creates port handles from a device name and link parameters.
pub trait PortOpener: Send + Sync + fmt::Debug {
    /// Open `device` with `config` applied and reads/writes bounded by
    /// `io_timeout`.
    fn open(
        &self,
        device: &str,
        config: &PortConfig,
        io_timeout: Duration,
    ) -> Result<Box<dyn PortHandle>, PortError>;
}
