pub mod channels;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod message;
pub mod port;
mod signal;
pub mod stream;
mod worker;

pub use channels::{InputChannels, OutputChannels};
pub use config::{AudioConfig, SampleFormat};
pub use device::Device;
pub use error::EngineError;
pub use stream::{StreamIn, StreamOut};
pub use worker::VOLUME_UNITY;
