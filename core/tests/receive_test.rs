//! End-to-end receive tests over synthesized tone blocks
//!
//! Each block carries a pure sine centered on a transmit-grid bin, the way
//! the transmit side would send it: every symbol repeated `repeat` times,
//! the whole payload wrapped in start/end tokens.

use sonotext_core::{
    AudioSource, CapturePipeline, Decoder, FrameAnalyzer, ModemConfig, NotificationSink, Result,
    END_TOKEN, START_TOKEN,
};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingSink {
    messages: Arc<Mutex<Vec<String>>>,
    starts: Arc<AtomicUsize>,
}

impl NotificationSink for RecordingSink {
    fn on_transmission_start(&mut self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message_decoded(&mut self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

/// Bin on the transmit grid for a symbol byte
fn bin_for(symbol: u8) -> usize {
    (symbol as usize - 45) * 5 + 60
}

fn tone_block(config: &ModemConfig, bin: usize) -> Vec<i16> {
    let freq = bin as f64 * config.sample_rate as f64 / config.block_size as f64;
    (0..config.block_size)
        .map(|i| {
            let t = i as f64 / config.sample_rate as f64;
            (8_000.0 * (2.0 * PI * freq * t).sin()) as i16
        })
        .collect()
}

fn transmission(config: &ModemConfig, text: &str) -> Vec<Vec<i16>> {
    let mut blocks = Vec::new();
    for _ in 0..config.repeat {
        blocks.push(tone_block(config, bin_for(START_TOKEN)));
    }
    for &symbol in text.as_bytes() {
        for _ in 0..config.repeat {
            blocks.push(tone_block(config, bin_for(symbol)));
        }
    }
    for _ in 0..config.repeat {
        blocks.push(tone_block(config, bin_for(END_TOKEN)));
    }
    blocks
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_analyzer() -> (FrameAnalyzer, RecordingSink) {
    init_logs();
    let config = ModemConfig::default();
    let sink = RecordingSink::default();
    let decoder = Decoder::new(config, Box::new(sink.clone()));
    let analyzer = FrameAnalyzer::new(config, decoder).expect("Failed to create analyzer");
    (analyzer, sink)
}

#[test]
fn analyzer_decodes_a_transmission() {
    let config = ModemConfig::default();
    let (mut analyzer, sink) = new_analyzer();

    for block in transmission(&config, "HELLO") {
        analyzer.analyze(&block);
    }

    assert_eq!(sink.messages(), ["HELLO"]);
    // every observed start token announces a transmission
    assert_eq!(sink.starts.load(Ordering::SeqCst), config.repeat);
}

#[test]
fn median_smoothing_corrects_single_block_noise() {
    let config = ModemConfig::default();
    let (mut analyzer, sink) = new_analyzer();

    let mut blocks = transmission(&config, "42");
    // corrupt the middle block of the '4' run with an off-message tone
    blocks[4] = tone_block(&config, bin_for(b'Q'));

    for block in blocks {
        analyzer.analyze(&block);
    }

    assert_eq!(sink.messages(), ["42"]);
}

#[test]
fn back_to_back_transmissions_decode_independently() {
    let config = ModemConfig::default();
    let (mut analyzer, sink) = new_analyzer();

    let mut blocks = transmission(&config, "ONE");
    blocks.extend(transmission(&config, "GO"));
    for block in blocks {
        analyzer.analyze(&block);
    }

    assert_eq!(sink.messages(), ["ONE", "GO"]);
}

/// Plays back a canned list of blocks in small chunks, then signals end of
/// stream; exercises the partial-read assembly in the capture pipeline.
struct PlaybackSource {
    blocks: Vec<Vec<i16>>,
    index: usize,
    offset: usize,
}

impl AudioSource for PlaybackSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        let Some(block) = self.blocks.get(self.index) else {
            return Ok(0);
        };
        let count = buf.len().min(block.len() - self.offset).min(100);
        buf[..count].copy_from_slice(&block[self.offset..self.offset + count]);
        self.offset += count;
        if self.offset == block.len() {
            self.index += 1;
            self.offset = 0;
        }
        Ok(count)
    }
}

#[test]
fn pipeline_decodes_live_stream() {
    init_logs();
    let config = ModemConfig::default();
    let sink = RecordingSink::default();
    let decoder = Decoder::new(config, Box::new(sink.clone()));
    let analyzer = FrameAnalyzer::new(config, decoder).expect("Failed to create analyzer");
    let source = PlaybackSource {
        blocks: transmission(&config, "PIPE"),
        index: 0,
        offset: 0,
    };

    let mut pipeline = CapturePipeline::start(config, Box::new(source), analyzer);
    pipeline.wait();

    assert_eq!(sink.messages(), ["PIPE"]);
}
