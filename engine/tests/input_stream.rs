use pcmio_engine::config::{CHANNEL_MASK_MONO, SampleFormat};
use pcmio_engine::port::tone::busy_tone_table;
use pcmio_engine::{AudioConfig, Device};

fn telephony_config() -> AudioConfig {
    AudioConfig {
        sample_rate: 8000,
        channel_mask: CHANNEL_MASK_MONO,
        format: SampleFormat::S16Le,
        frame_count: 400,
    }
}

fn assert_matches_table(buf: &[u8], table: &[i16]) {
    for (i, (chunk, expected)) in buf.chunks_exact(2).zip(table).enumerate() {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        assert_eq!(sample, *expected, "sample {i} diverges from the tone table");
    }
}

#[test]
fn busy_signal_reaches_the_client_bitwise() {
    let device = Device::new();
    let mut stream = device
        .open_input_stream(7, "telephony-rx", telephony_config())
        .expect("open input stream");
    let mut channels = stream.prepare_for_io(2, 400).expect("prepare for io");

    // One 50 ms period: 400 mono frames, 800 bytes.
    let mut buf = vec![0u8; 800];
    let got = channels.read(&mut buf).expect("read");
    assert_eq!(got, 800);
    assert_matches_table(&buf, &busy_tone_table(8000));
}

#[test]
fn position_survives_standby() {
    let device = Device::new();
    let mut stream = device
        .open_input_stream(8, "telephony-rx", telephony_config())
        .expect("open input stream");
    let mut channels = stream.prepare_for_io(2, 400).expect("prepare for io");

    let mut buf = vec![0u8; 800];
    channels.read(&mut buf).expect("first read");
    let (before, _) = channels.position().expect("position before standby");
    assert_eq!(before, 400);

    stream.standby().expect("standby");

    // The endpoint is rebuilt on the next transfer; the frame clock keeps
    // counting from where it was.
    channels.read(&mut buf).expect("read after standby");
    let (after, ts) = channels.position().expect("position after standby");
    assert_eq!(after, 800);
    assert!(ts.secs > 0 || ts.nanos > 0);

    // A fresh endpoint restarts its pattern from the table head.
    assert_matches_table(&buf, &busy_tone_table(8000));
}

#[test]
fn tuner_sine_repeats_every_period() {
    let device = Device::new();
    let config = AudioConfig {
        sample_rate: 16000,
        ..telephony_config()
    };
    let mut stream = device
        .open_input_stream(9, "fm-tuner", config)
        .expect("open tuner stream");
    let mut channels = stream.prepare_for_io(2, 800).expect("prepare for io");

    // 1 kHz completes 50 cycles per 50 ms table, so consecutive periods
    // are identical.
    let mut first = vec![0u8; 1600];
    let mut second = vec![0u8; 1600];
    channels.read(&mut first).expect("first period");
    channels.read(&mut second).expect("second period");
    assert_eq!(first, second);
}

#[test]
fn reads_are_paced_against_real_time() {
    let device = Device::new();
    let mut stream = device
        .open_input_stream(10, "telephony-rx", telephony_config())
        .expect("open input stream");
    let mut channels = stream.prepare_for_io(2, 400).expect("prepare for io");

    let started = std::time::Instant::now();
    let mut buf = vec![0u8; 800];
    // 200 ms of audio back to back must take at least ~150 ms of wall
    // clock: the source allows at most half a request of lead.
    for _ in 0..4 {
        channels.read(&mut buf).expect("read");
    }
    assert!(started.elapsed() >= std::time::Duration::from_millis(150));
}
