//! PCM hardware backend boundary.
//!
//! The engine consumes the backend purely as open/read/write/close; the
//! Linux implementation sits on the `alsa` crate. Backend errors and
//! zero-length successes are both passed through as-is; the endpoint layer
//! decides what to do with them.

/// One opened PCM device direction. `read`/`write` move whole frames and
/// return the number of frames actually transferred.
pub trait PcmDevice: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, String>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, String>;
}

#[cfg(target_os = "linux")]
pub fn open(
    card: u32,
    device: u32,
    channels: usize,
    rate: u32,
    period_frames: usize,
    is_output: bool,
) -> Result<Box<dyn PcmDevice>, String> {
    let dev = linux::AlsaPcm::open(card, device, channels, rate, period_frames, is_output)?;
    Ok(Box::new(dev))
}

#[cfg(not(target_os = "linux"))]
pub fn open(
    _card: u32,
    _device: u32,
    _channels: usize,
    _rate: u32,
    _period_frames: usize,
    _is_output: bool,
) -> Result<Box<dyn PcmDevice>, String> {
    Err("PCM hardware backend is not available on this platform".to_string())
}

#[cfg(target_os = "linux")]
mod linux {
    use alsa::pcm::{Access, Format, HwParams, PCM, State};
    use alsa::{Direction, ValueOr};

    use super::PcmDevice;

    pub struct AlsaPcm {
        pcm: PCM,
        channels: usize,
        is_output: bool,
        // Interleaved i16 staging between the byte-oriented engine and the
        // typed ALSA io object.
        staging: Vec<i16>,
    }

    impl AlsaPcm {
        pub fn open(
            card: u32,
            device: u32,
            channels: usize,
            rate: u32,
            period_frames: usize,
            is_output: bool,
        ) -> Result<Self, String> {
            let name = format!("hw:{card},{device}");
            let direction = if is_output {
                Direction::Playback
            } else {
                Direction::Capture
            };
            let pcm = PCM::new(&name, direction, false)
                .map_err(|e| format!("failed to open ALSA device '{name}': {e}"))?;
            configure_pcm(&pcm, rate, channels, period_frames)?;
            Ok(Self {
                pcm,
                channels,
                is_output,
                staging: vec![0; period_frames * channels],
            })
        }

        fn recover_xrun(&self) {
            if self.pcm.state() == State::XRun {
                let _ = self.pcm.prepare();
            }
        }
    }

    impl PcmDevice for AlsaPcm {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, String> {
            if self.is_output {
                return Err("read on a playback device".to_string());
            }
            let frames = buf.len() / (2 * self.channels);
            let samples = frames * self.channels;
            if self.staging.len() < samples {
                self.staging.resize(samples, 0);
            }
            let io = self
                .pcm
                .io_i16()
                .map_err(|e| format!("ALSA capture io error: {e}"))?;
            let got = match io.readi(&mut self.staging[..samples]) {
                Ok(n) => n,
                Err(e) => {
                    self.recover_xrun();
                    return Err(format!("ALSA capture read failed: {e}"));
                }
            };
            for (chunk, sample) in buf.chunks_exact_mut(2).zip(&self.staging[..samples]) {
                chunk.copy_from_slice(&sample.to_le_bytes());
            }
            Ok(got)
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize, String> {
            if !self.is_output {
                return Err("write on a capture device".to_string());
            }
            let frames = buf.len() / (2 * self.channels);
            let samples = frames * self.channels;
            if self.staging.len() < samples {
                self.staging.resize(samples, 0);
            }
            for (sample, chunk) in self.staging[..samples].iter_mut().zip(buf.chunks_exact(2)) {
                *sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            }
            let io = self
                .pcm
                .io_i16()
                .map_err(|e| format!("ALSA playback io error: {e}"))?;
            match io.writei(&self.staging[..samples]) {
                Ok(n) => Ok(n),
                Err(e) => {
                    self.recover_xrun();
                    Err(format!("ALSA playback write failed: {e}"))
                }
            }
        }
    }

    fn configure_pcm(
        pcm: &PCM,
        rate: u32,
        channels: usize,
        period_frames: usize,
    ) -> Result<(), String> {
        let hwp = HwParams::any(pcm).map_err(|e| e.to_string())?;
        hwp.set_access(Access::RWInterleaved)
            .map_err(|e| e.to_string())?;
        hwp.set_format(Format::s16()).map_err(|e| e.to_string())?;
        hwp.set_channels(channels as u32)
            .map_err(|e| e.to_string())?;
        hwp.set_rate(rate, ValueOr::Nearest)
            .map_err(|e| e.to_string())?;
        hwp.set_period_size_near(period_frames as i64, ValueOr::Nearest)
            .map_err(|e| e.to_string())?;
        hwp.set_buffer_size_near(period_frames as i64 * 4)
            .map_err(|e| e.to_string())?;
        pcm.hw_params(&hwp).map_err(|e| e.to_string())?;

        let swp = pcm.sw_params_current().map_err(|e| e.to_string())?;
        let cur = pcm.hw_params_current().map_err(|e| e.to_string())?;
        let actual_period = cur.get_period_size().map_err(|e| e.to_string())?;
        swp.set_avail_min(actual_period).map_err(|e| e.to_string())?;
        pcm.sw_params(&swp).map_err(|e| e.to_string())?;
        pcm.prepare().map_err(|e| e.to_string())?;
        Ok(())
    }
}
