use crate::config::ModemConfig;
use crate::decoder::{Decoder, START_TOKEN};
use crate::error::Result;
use crate::fft::Fft;
use log::trace;

/// Scale factor applied to raw samples before the transform
const AMPLIFICATION: f64 = 100.0 / 32768.0;

/// Analyzes one block of samples at a time and feeds the dominant frequency
/// bin to the symbol decoder
///
/// Owns its transform work buffers; they are reused across calls and never
/// leave this struct, so the analyzer is safe to drive from a single
/// consumer thread without any locking.
pub struct FrameAnalyzer {
    config: ModemConfig,
    fft: Fft,
    decoder: Decoder,
    re: Vec<f64>,
    im: Vec<f64>,
    mag: Vec<f64>,
}

impl FrameAnalyzer {
    pub fn new(config: ModemConfig, decoder: Decoder) -> Result<Self> {
        config.validate()?;
        let fft = Fft::new(config.fft_bits)?;
        Ok(Self {
            config,
            fft,
            decoder,
            re: vec![0.0; config.block_size],
            im: vec![0.0; config.block_size],
            mag: vec![0.0; config.block_size / 2],
        })
    }

    /// Analyze one full block of samples
    ///
    /// `block` must hold exactly `block_size` samples.
    pub fn analyze(&mut self, block: &[i16]) {
        debug_assert_eq!(block.len(), self.config.block_size);

        for (i, &sample) in block.iter().enumerate() {
            self.re[i] = AMPLIFICATION * sample as f64;
            self.im[i] = 0.0;
        }

        // Unscaled transform branch; peak selection below is invariant to a
        // constant scale.
        self.fft.transform(&mut self.re, &mut self.im, true);

        let half = self.config.block_size / 2;
        let mut mi = 0;
        for i in 0..half {
            self.mag[i] = self.re[i] * self.re[i] + self.im[i] * self.im[i];
            if self.mag[mi] < self.mag[i] {
                mi = i;
            }
        }

        // A peak that sits perfectly flat against both neighbors is no peak
        let d0 = if mi > 0 {
            (self.mag[mi] - self.mag[mi - 1]).abs()
        } else {
            0.0
        };
        let d1 = if mi + 1 < half {
            (self.mag[mi] - self.mag[mi + 1]).abs()
        } else {
            0.0
        };
        if d0 + d1 > 0.0 {
            let b = self.decoder.put(mi);
            if b == START_TOKEN {
                self.decoder.sink_mut().on_transmission_start();
            }
            let resolution = self.config.sample_rate as f64 / self.config.block_size as f64;
            trace!(
                "bin {mi}, symbol {b}, freq {:.0} Hz",
                resolution * mi as f64 + resolution / 2.0
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::NotificationSink;
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

    fn new_analyzer() -> (FrameAnalyzer, RecordingSink) {
        let config = ModemConfig::default();
        let sink = RecordingSink::default();
        let decoder = Decoder::new(config, Box::new(sink.clone()));
        let analyzer = FrameAnalyzer::new(config, decoder).unwrap();
        (analyzer, sink)
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

    #[test]
    fn silent_block_produces_no_events() {
        let (mut analyzer, sink) = new_analyzer();
        let block = vec![0i16; 512];
        analyzer.analyze(&block);
        assert_eq!(sink.starts.load(Ordering::SeqCst), 0);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn start_token_tone_raises_transmission_start() {
        let config = ModemConfig::default();
        let (mut analyzer, sink) = new_analyzer();
        // bin 150 decodes to the start token
        let block = tone_block(&config, 150);
        analyzer.analyze(&block);
        assert_eq!(sink.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_mismatched_configuration() {
        let config = ModemConfig {
            block_size: 1024,
            ..ModemConfig::default()
        };
        let decoder = Decoder::new(config, Box::new(RecordingSink::default()));
        assert!(FrameAnalyzer::new(config, decoder).is_err());
    }
}
