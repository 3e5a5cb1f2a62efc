use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use sonotext_core::{
    AudioSource, CapturePipeline, Decoder, FrameAnalyzer, ModemConfig, NotificationSink,
};
use std::fs::File;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "sonotext")]
#[command(about = "Acoustic soft-modem receiver for short text messages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen on the default input device and print decoded messages
    Listen {
        /// Stop after this many seconds instead of waiting for Enter
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Decode a recorded WAV file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },
}

/// Errors raised while setting up the capture stream
#[derive(Debug, Error)]
enum ListenError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Listen { duration } => listen_command(duration)?,
        Commands::Decode { input } => decode_command(&input)?,
    }

    Ok(())
}

/// Prints decoder events to stdout
///
/// Repeated start tokens within one transmission announce only once.
struct ConsoleSink {
    announced: bool,
}

impl ConsoleSink {
    fn new() -> Self {
        Self { announced: false }
    }
}

impl NotificationSink for ConsoleSink {
    fn on_transmission_start(&mut self) {
        if !self.announced {
            println!("incoming transmission...");
            self.announced = true;
        }
    }

    fn on_message_decoded(&mut self, text: &str) {
        println!("message: {text}");
        self.announced = false;
    }
}

/// Microphone samples handed over from the cpal callback thread
///
/// The cpal callback pushes converted chunks into an mpsc channel; this end
/// hands them to the capture pipeline. Once the stream (and with it the
/// sender) is dropped, `read` reports end of stream and the pipeline winds
/// down on its own.
struct MicSource {
    rx: mpsc::Receiver<Vec<i16>>,
    pending: Vec<i16>,
    offset: usize,
}

impl MicSource {
    fn new(rx: mpsc::Receiver<Vec<i16>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl AudioSource for MicSource {
    fn read(&mut self, buf: &mut [i16]) -> sonotext_core::Result<usize> {
        while self.offset >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                // Sender gone: the stream was torn down
                Err(mpsc::RecvError) => return Ok(0),
            }
        }
        let count = buf.len().min(self.pending.len() - self.offset);
        buf[..count].copy_from_slice(&self.pending[self.offset..self.offset + count]);
        self.offset += count;
        Ok(count)
    }
}

fn build_input_stream(
    config: &ModemConfig,
    tx: mpsc::Sender<Vec<i16>>,
) -> Result<cpal::Stream, ListenError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(ListenError::NoDevice)?;
    log::info!(
        "capturing from {}",
        device.name().unwrap_or_else(|_| "unknown device".into())
    );

    let stream_config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let chunk: Vec<i16> = data
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                .collect();
            // Ignore send errors; the receiver may have been dropped
            let _ = tx.send(chunk);
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

fn listen_command(duration: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ModemConfig::default();

    let (tx, rx) = mpsc::channel();
    let stream = build_input_stream(&config, tx)?;

    let decoder = Decoder::new(config, Box::new(ConsoleSink::new()));
    let analyzer = FrameAnalyzer::new(config, decoder)?;
    let mut pipeline = CapturePipeline::start(config, Box::new(MicSource::new(rx)), analyzer);

    match duration {
        Some(secs) => {
            println!("Listening for {secs} seconds...");
            std::thread::sleep(Duration::from_secs(secs));
        }
        None => {
            println!("Listening; press Enter to stop.");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
        }
    }

    // Tearing down the stream disconnects the channel, which unblocks the
    // reader thread before the pipeline is stopped.
    drop(stream);
    pipeline.stop();
    Ok(())
}

fn decode_command(input_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ModemConfig::default();

    // Read WAV file
    let file = File::open(input_path)?;
    let mut reader = hound::WavReader::new(file)?;

    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );
    if spec.sample_rate != config.sample_rate {
        log::warn!(
            "sample rate {} differs from the configured {}; decoded symbols may be wrong",
            spec.sample_rate,
            config.sample_rate
        );
    }
    if spec.channels != 1 {
        log::warn!("expected a mono stream, got {} channels", spec.channels);
    }

    // Extract samples (handle both 16-bit and 32-bit float formats)
    let samples: Vec<i16> = match spec.bits_per_sample {
        16 => {
            let int_samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            int_samples?
        }
        32 => {
            let float_samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            float_samples?
                .into_iter()
                .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                .collect()
        }
        _ => {
            return Err(format!("Unsupported bit depth: {}", spec.bits_per_sample).into());
        }
    };
    println!("Extracted {} samples", samples.len());

    let decoder = Decoder::new(config, Box::new(ConsoleSink::new()));
    let mut analyzer = FrameAnalyzer::new(config, decoder)?;
    for block in samples.chunks_exact(config.block_size) {
        analyzer.analyze(block);
    }

    Ok(())
}
