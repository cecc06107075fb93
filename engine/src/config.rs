use crate::error::EngineError;

/// Sample rates the engine accepts. Everything else is adjusted to the
/// nearest entry before a stream can be opened.
pub const SUPPORTED_RATES: [u32; 8] = [
    8000, 11025, 16000, 22050, 24000, 32000, 44100, 48000,
];

pub const CHANNEL_MASK_MONO: u32 = 0x1;
pub const CHANNEL_MASK_STEREO: u32 = 0x3;

/// Default period size handed out when a caller asks for an unsupported
/// frame count.
pub const DEFAULT_FRAME_COUNT: u32 = 240;

/// The engine carries signed 16-bit little-endian PCM only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channel_mask: u32,
    pub format: SampleFormat,
    /// Period size in frames.
    pub frame_count: u32,
}

impl AudioConfig {
    pub fn channel_count(&self) -> usize {
        self.channel_mask.count_ones() as usize
    }

    /// Bytes per frame: one 16-bit sample per channel.
    pub fn frame_size(&self) -> usize {
        2 * self.channel_count()
    }

    /// Bytes in one period.
    pub fn buffer_size(&self) -> usize {
        self.frame_size() * self.frame_count as usize
    }

    /// Period length in milliseconds. Widened so the largest admissible
    /// frame count cannot overflow the multiplication.
    pub fn period_ms(&self) -> u32 {
        (self.frame_count as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channel_mask: CHANNEL_MASK_STEREO,
            format: SampleFormat::S16Le,
            frame_count: DEFAULT_FRAME_COUNT,
        }
    }
}

/// Admission check for a requested stream configuration. Pure, never called
/// on the data path.
pub fn validate(config: &AudioConfig) -> Result<(), EngineError> {
    if !SUPPORTED_RATES.contains(&config.sample_rate) {
        return Err(EngineError::NotSupported(format!(
            "sample rate {} Hz",
            config.sample_rate
        )));
    }
    if config.channel_mask != CHANNEL_MASK_MONO && config.channel_mask != CHANNEL_MASK_STEREO {
        return Err(EngineError::NotSupported(format!(
            "channel mask {:#x}",
            config.channel_mask
        )));
    }
    if config.frame_count == 0 {
        return Err(EngineError::InvalidArguments(
            "frame count must be non-zero".to_string(),
        ));
    }
    Ok(())
}

/// Nearest supported configuration for a rejected request. The caller is
/// expected to retry the open with the returned config.
pub fn adjust(config: &AudioConfig) -> AudioConfig {
    let sample_rate = *SUPPORTED_RATES
        .iter()
        .min_by_key(|r| r.abs_diff(config.sample_rate))
        .unwrap_or(&48000);
    let channel_mask = if config.channel_mask.count_ones() <= 1 {
        CHANNEL_MASK_MONO
    } else {
        CHANNEL_MASK_STEREO
    };
    let frame_count = if config.frame_count == 0 {
        DEFAULT_FRAME_COUNT
    } else {
        config.frame_count
    };
    AudioConfig {
        sample_rate,
        channel_mask,
        format: SampleFormat::S16Le,
        frame_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_follows_channel_count() {
        let mono = AudioConfig {
            channel_mask: CHANNEL_MASK_MONO,
            ..AudioConfig::default()
        };
        assert_eq!(mono.frame_size(), 2);
        let stereo = AudioConfig::default();
        assert_eq!(stereo.frame_size(), 4);
        assert_eq!(stereo.buffer_size(), 4 * 240);
    }

    #[test]
    fn validate_rejects_odd_rates_and_masks() {
        let mut config = AudioConfig::default();
        assert!(validate(&config).is_ok());

        config.sample_rate = 44056;
        assert!(matches!(
            validate(&config),
            Err(EngineError::NotSupported(_))
        ));

        config.sample_rate = 48000;
        config.channel_mask = 0x7;
        assert!(matches!(
            validate(&config),
            Err(EngineError::NotSupported(_))
        ));
    }

    #[test]
    fn period_ms_handles_large_frame_counts() {
        let config = AudioConfig {
            sample_rate: 8000,
            channel_mask: CHANNEL_MASK_MONO,
            format: SampleFormat::S16Le,
            frame_count: 5_000_000,
        };
        assert!(validate(&config).is_ok());
        assert_eq!(config.period_ms(), 625_000);
    }

    #[test]
    fn adjust_lands_on_supported_values() {
        let config = AudioConfig {
            sample_rate: 44056,
            channel_mask: 0x3f,
            format: SampleFormat::S16Le,
            frame_count: 0,
        };
        let adjusted = adjust(&config);
        assert_eq!(adjusted.sample_rate, 44100);
        assert_eq!(adjusted.channel_mask, CHANNEL_MASK_STEREO);
        assert_eq!(adjusted.frame_count, DEFAULT_FRAME_COUNT);
        assert!(validate(&adjusted).is_ok());
    }
}
