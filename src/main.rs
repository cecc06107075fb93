use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use pcmio_engine::config::{CHANNEL_MASK_MONO, SampleFormat};
use pcmio_engine::{AudioConfig, Device};

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let device = Device::new();

    // Playback towards the simulated telephony uplink.
    let config = AudioConfig::default();
    let mut out = match device.open_output_stream(1, "telephony-tx", config) {
        Ok(stream) => stream,
        Err(e) => {
            error!("open output stream: {e}");
            return;
        }
    };
    let frame_size = out.frame_size();
    let frame_count = config.frame_count as usize;
    let mut channels = match out.prepare_for_io(frame_size, frame_count) {
        Ok(channels) => channels,
        Err(e) => {
            error!("prepare output stream: {e}");
            return;
        }
    };
    info!(
        rate = out.sample_rate(),
        frame_size,
        frame_count,
        latency_ms = out.latency_ms(),
        "output stream ready"
    );
    let silence = vec![0u8; frame_size * frame_count];
    for _ in 0..10 {
        match channels.write(&silence) {
            Ok(written) => info!(written, "period written"),
            Err(e) => error!("write: {e}"),
        }
    }
    match channels.position() {
        Ok((frames, ts)) => info!(frames, secs = ts.secs, nanos = ts.nanos, "playback position"),
        Err(e) => error!("position: {e}"),
    }
    out.close();

    // Capture from the telephony downlink busy signal.
    let config = AudioConfig {
        sample_rate: 8000,
        channel_mask: CHANNEL_MASK_MONO,
        format: SampleFormat::S16Le,
        frame_count: 400,
    };
    let mut stream_in = match device.open_input_stream(2, "telephony-rx", config) {
        Ok(stream) => stream,
        Err(e) => {
            error!("open input stream: {e}");
            return;
        }
    };
    let mut channels = match stream_in.prepare_for_io(2, 400) {
        Ok(channels) => channels,
        Err(e) => {
            error!("prepare input stream: {e}");
            return;
        }
    };
    let mut buf = vec![0u8; 800];
    for _ in 0..10 {
        match channels.read(&mut buf) {
            Ok(got) => info!(got, "period read"),
            Err(e) => error!("read: {e}"),
        }
    }
    match channels.position() {
        Ok((frames, _)) => info!(frames, "capture position"),
        Err(e) => error!("position: {e}"),
    }
    stream_in.close();
}
