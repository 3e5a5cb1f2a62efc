//! Acoustic soft-modem receiver for short text messages
//!
//! Listens to a mono 16-bit PCM stream, finds the dominant tone in each
//! fixed-size sample block, and reconstructs framed text messages from the
//! detected tone sequence despite noise and timing jitter.
//!
//! Receive chain: capture pipeline (producer/consumer threads around a
//! single-slot hand-off buffer), frame analyzer (FFT plus peak search with a
//! confidence gate), symbol decoder (repetition-consensus framing, median
//! smoothing, run-length collapse), notification sink.

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod decoder;
pub mod error;
pub mod fft;

pub use analyzer::FrameAnalyzer;
pub use capture::{AudioSource, CapturePipeline};
pub use config::ModemConfig;
pub use decoder::{Decoder, NotificationSink, END_TOKEN, START_TOKEN};
pub use error::{ModemError, Result};
pub use fft::Fft;
