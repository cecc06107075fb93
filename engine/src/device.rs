//! Device-level state shared by all streams opened on it.

use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::config::{self, AudioConfig};
use crate::error::EngineError;
use crate::port::PortAddress;
use crate::stream::{StreamIn, StreamOut};

#[derive(Debug)]
struct MixerState {
    master_volume_pct: u8,
    master_muted: bool,
    mic_muted: bool,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            master_volume_pct: 100,
            master_muted: false,
            mic_muted: false,
        }
    }
}

/// The audio device streams are opened on. Cheap to clone; clones share the
/// open-stream refcount and mixer state. Mixer controls are only touched at
/// open/close time, never from the data path.
#[derive(Clone, Debug, Default)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

#[derive(Debug, Default)]
struct DeviceInner {
    open_streams: AtomicUsize,
    mixer: Mutex<MixerState>,
}

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_streams(&self) -> usize {
        self.inner.open_streams.load(Ordering::Acquire)
    }

    pub fn open_output_stream(
        &self,
        io_handle: i32,
        address: &str,
        config: AudioConfig,
    ) -> Result<StreamOut, EngineError> {
        config::validate(&config)?;
        let port = PortAddress::parse(address)?;
        if !port.has_sink() {
            return Err(EngineError::NotSupported(format!(
                "no output endpoint at '{address}'"
            )));
        }
        self.inner.open_streams.fetch_add(1, Ordering::AcqRel);
        Ok(StreamOut::new(
            io_handle,
            address.to_string(),
            port,
            config,
            self.clone(),
        ))
    }

    pub fn open_input_stream(
        &self,
        io_handle: i32,
        address: &str,
        config: AudioConfig,
    ) -> Result<StreamIn, EngineError> {
        config::validate(&config)?;
        let port = PortAddress::parse(address)?;
        if !port.has_source() {
            return Err(EngineError::NotSupported(format!(
                "no input endpoint at '{address}'"
            )));
        }
        self.inner.open_streams.fetch_add(1, Ordering::AcqRel);
        Ok(StreamIn::new(
            io_handle,
            address.to_string(),
            port,
            config,
            self.clone(),
        ))
    }

    pub(crate) fn release_stream(&self) {
        let prev = self.inner.open_streams.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            // Refcount underflow is a logic error, not a runtime condition.
            error!("open-stream refcount went negative");
            process::abort();
        }
    }

    pub fn set_master_volume(&self, pct: u8) -> Result<(), EngineError> {
        if pct > 100 {
            return Err(EngineError::InvalidArguments(format!(
                "master volume {pct}% above 100%"
            )));
        }
        self.inner
            .mixer
            .lock()
            .expect("mixer state poisoned")
            .master_volume_pct = pct;
        Ok(())
    }

    pub fn master_volume(&self) -> u8 {
        self.inner
            .mixer
            .lock()
            .expect("mixer state poisoned")
            .master_volume_pct
    }

    pub fn set_master_mute(&self, muted: bool) {
        self.inner
            .mixer
            .lock()
            .expect("mixer state poisoned")
            .master_muted = muted;
    }

    pub fn master_mute(&self) -> bool {
        self.inner
            .mixer
            .lock()
            .expect("mixer state poisoned")
            .master_muted
    }

    pub fn set_mic_mute(&self, muted: bool) {
        self.inner
            .mixer
            .lock()
            .expect("mixer state poisoned")
            .mic_muted = muted;
    }

    pub fn mic_mute(&self) -> bool {
        self.inner
            .mixer
            .lock()
            .expect("mixer state poisoned")
            .mic_muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcount_follows_open_and_close() {
        let device = Device::new();
        assert_eq!(device.open_streams(), 0);
        let mut out = device
            .open_output_stream(1, "telephony-tx", AudioConfig::default())
            .expect("open output");
        let stream_in = device
            .open_input_stream(2, "telephony-rx", AudioConfig::default())
            .expect("open input");
        assert_eq!(device.open_streams(), 2);
        out.close();
        assert_eq!(device.open_streams(), 1);
        // Dropping releases the remaining stream.
        drop(stream_in);
        assert_eq!(device.open_streams(), 0);
        // close() after close is silent.
        out.close();
        assert_eq!(device.open_streams(), 0);
    }

    #[test]
    fn open_rejects_wrong_direction_addresses() {
        let device = Device::new();
        assert!(matches!(
            device.open_output_stream(1, "telephony-rx", AudioConfig::default()),
            Err(EngineError::NotSupported(_))
        ));
        assert!(matches!(
            device.open_input_stream(2, "telephony-tx", AudioConfig::default()),
            Err(EngineError::NotSupported(_))
        ));
        assert_eq!(device.open_streams(), 0);
    }

    #[test]
    fn mixer_state_round_trips() {
        let device = Device::new();
        assert_eq!(device.master_volume(), 100);
        device.set_master_volume(40).expect("set volume");
        assert_eq!(device.master_volume(), 40);
        assert!(device.set_master_volume(101).is_err());
        device.set_master_mute(true);
        assert!(device.master_mute());
        device.set_mic_mute(true);
        assert!(device.mic_mute());
    }
}
