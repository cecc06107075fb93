use std::sync::Arc;

use crate::clock::{FrameClock, Timestamp};
use crate::config::{AudioConfig, SampleFormat};
use crate::error::EngineError;

pub mod hw;
pub mod null;
pub mod pcm;
pub mod tone;

/// Producer capability of a port endpoint. `read` fills `buf` (a whole
/// number of frames) and returns the bytes transferred.
pub trait SourcePort: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, String>;
    fn position(&mut self) -> (u64, Timestamp);
}

/// Consumer capability of a port endpoint.
pub trait SinkPort: Send {
    fn write(&mut self, buf: &[u8]) -> Result<usize, String>;
    fn position(&mut self) -> (u64, Timestamp);
}

/// Where a stream's bytes actually come from or go to, resolved once from
/// the device address string at stream-open time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortAddress {
    /// Physical PCM device, e.g. `hw:0,0`.
    Hw { card: u32, device: u32 },
    /// Voice-call downlink; no physical microphone, serves a busy-signal
    /// pattern.
    TelephonyRx,
    /// Voice-call uplink; no physical speaker, drains on a simulated clock.
    TelephonyTx,
    /// Tuner stand-in; serves a continuous sine table.
    FmTuner,
}

impl PortAddress {
    pub fn parse(address: &str) -> Result<Self, EngineError> {
        match address {
            "telephony-rx" => return Ok(Self::TelephonyRx),
            "telephony-tx" => return Ok(Self::TelephonyTx),
            "fm-tuner" => return Ok(Self::FmTuner),
            _ => {}
        }
        if let Some(rest) = address.strip_prefix("hw:") {
            let mut parts = rest.splitn(2, ',');
            let card = parts.next().and_then(|p| p.parse::<u32>().ok());
            let device = parts.next().and_then(|p| p.parse::<u32>().ok());
            if let (Some(card), Some(device)) = (card, device) {
                return Ok(Self::Hw { card, device });
            }
        }
        Err(EngineError::NotSupported(format!(
            "device address '{address}'"
        )))
    }

    /// Whether this address can serve as a capture source.
    pub fn has_source(&self) -> bool {
        matches!(self, Self::Hw { .. } | Self::TelephonyRx | Self::FmTuner)
    }

    /// Whether this address can serve as a playback sink.
    pub fn has_sink(&self) -> bool {
        matches!(self, Self::Hw { .. } | Self::TelephonyTx)
    }
}

fn check_format(config: &AudioConfig) -> Result<(), EngineError> {
    match config.format {
        SampleFormat::S16Le => Ok(()),
    }
}

/// Construct the source endpoint for `address`. Fails when the address maps
/// to no source variant or the format is not 16-bit PCM; callers treat this
/// as fatal to the transfer.
pub fn open_source(
    address: PortAddress,
    config: &AudioConfig,
    clock: Arc<FrameClock>,
) -> Result<Box<dyn SourcePort>, EngineError> {
    check_format(config)?;
    match address {
        PortAddress::Hw { card, device } => {
            Ok(Box::new(hw::HwSource::open(card, device, config, clock)?))
        }
        PortAddress::TelephonyRx => Ok(Box::new(tone::ToneSource::busy(config, clock))),
        PortAddress::FmTuner => Ok(Box::new(tone::ToneSource::sine(config, clock))),
        PortAddress::TelephonyTx => Err(EngineError::NotSupported(
            "telephony-tx has no source".to_string(),
        )),
    }
}

/// Construct the sink endpoint for `address`.
pub fn open_sink(
    address: PortAddress,
    config: &AudioConfig,
    clock: Arc<FrameClock>,
) -> Result<Box<dyn SinkPort>, EngineError> {
    check_format(config)?;
    match address {
        PortAddress::Hw { card, device } => {
            Ok(Box::new(hw::HwSink::open(card, device, config, clock)?))
        }
        PortAddress::TelephonyTx => Ok(Box::new(null::NullSink::new(config, clock))),
        PortAddress::TelephonyRx | PortAddress::FmTuner => Err(EngineError::NotSupported(
            "address has no sink".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_addresses() {
        assert_eq!(
            PortAddress::parse("hw:1,3").expect("hw address"),
            PortAddress::Hw { card: 1, device: 3 }
        );
        assert_eq!(
            PortAddress::parse("telephony-rx").expect("telephony-rx"),
            PortAddress::TelephonyRx
        );
        assert!(PortAddress::parse("bluetooth-sco").is_err());
        assert!(PortAddress::parse("hw:x,y").is_err());
    }

    #[test]
    fn direction_capabilities() {
        assert!(PortAddress::TelephonyRx.has_source());
        assert!(!PortAddress::TelephonyRx.has_sink());
        assert!(PortAddress::TelephonyTx.has_sink());
        assert!(!PortAddress::TelephonyTx.has_source());
        assert!(PortAddress::Hw { card: 0, device: 0 }.has_source());
        assert!(PortAddress::Hw { card: 0, device: 0 }.has_sink());
    }
}
