use crate::config::ModemConfig;
use log::debug;

/// Start-of-frame token byte
pub const START_TOKEN: u8 = b'?';
/// End-of-frame token byte
pub const END_TOKEN: u8 = b'@';

/// Bins between adjacent symbols on the transmit-side frequency grid
const BIN_SPACING: f64 = 5.0;
/// Bias added during quantization so the grid lands on printable bytes
const SYMBOL_BIAS: f64 = 45.0;

/// Receives decoder events
///
/// This is the seam to the host UI: `on_transmission_start` fires for every
/// observed start token (any displayed message is stale at that point),
/// `on_message_decoded` fires exactly once per completed frame and may carry
/// an empty string.
pub trait NotificationSink: Send {
    fn on_transmission_start(&mut self);
    fn on_message_decoded(&mut self, text: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Idle,
    Receiving,
}

/// Symbol decoder: quantizes dominant bins to bytes and reassembles framed
/// messages
///
/// A frame opens once the start token has been observed `repeat - 1` times
/// and closes the same way on the end token; in between, every other decoded
/// byte is accumulated as payload. While `Idle`, the start-token tally is
/// deliberately not reset by unrelated symbols, matching the transmitter
/// this protocol was built against.
pub struct Decoder {
    config: ModemConfig,
    sink: Box<dyn NotificationSink>,
    state: DecoderState,
    counter: usize,
    payload: Vec<u8>,
}

impl Decoder {
    pub fn new(config: ModemConfig, sink: Box<dyn NotificationSink>) -> Self {
        let capacity = config.max_message_len;
        Self {
            config,
            sink,
            state: DecoderState::Idle,
            counter: 0,
            payload: Vec::with_capacity(capacity),
        }
    }

    /// Reverse the transmit-side mapping from frequency bin to symbol byte
    pub fn decode(&self, bin: usize) -> u8 {
        let k = ((bin as f64 - self.config.bin_offset as f64) / BIN_SPACING + SYMBOL_BIAS)
            .round() as i64;
        (k & 0x7F) as u8
    }

    /// Feed one dominant-bin observation through the framing state machine
    ///
    /// Returns the raw decoded byte in all cases so the caller can watch for
    /// the start token.
    pub fn put(&mut self, bin: usize) -> u8 {
        let b = self.decode(bin);
        match b {
            START_TOKEN => {
                self.counter += 1;
                if self.counter + 1 >= self.config.repeat {
                    debug!("start-of-frame consensus reached");
                    self.state = DecoderState::Receiving;
                    self.counter = 0;
                    self.payload.clear();
                }
            }
            END_TOKEN if self.state == DecoderState::Receiving => {
                self.counter += 1;
                if self.counter + 1 >= self.config.repeat {
                    debug!(
                        "end-of-frame consensus reached, {} payload bytes",
                        self.payload.len()
                    );
                    self.state = DecoderState::Idle;
                    self.counter = 0;
                    self.finish_frame();
                }
            }
            // End token with no open frame: out of sync, ignore
            END_TOKEN => {}
            _ => {
                if self.state == DecoderState::Receiving
                    && self.payload.len() < self.config.max_message_len
                {
                    self.counter = 0;
                    self.payload.push(b);
                }
            }
        }
        b
    }

    /// Sink access for notifications raised by the caller
    pub fn sink_mut(&mut self) -> &mut dyn NotificationSink {
        self.sink.as_mut()
    }

    fn finish_frame(&mut self) {
        let text = if self.payload.is_empty() {
            String::new()
        } else {
            let smoothed = median_smooth(&self.payload);
            let collapsed = collapse_runs(&smoothed);
            // Symbols are masked to 7 bits, so this is plain ASCII
            String::from_utf8_lossy(&collapsed).into_owned()
        };
        self.payload.clear();
        self.sink.on_message_decoded(&text);
    }
}

/// 3-tap median filter with edge retention
///
/// Each interior value becomes the median of itself and its two neighbors,
/// removing single-sample outliers; the true symbol was transmitted as a
/// short repeated run, so an isolated deviation is noise.
fn median_smooth(bb: &[u8]) -> Vec<u8> {
    let n = bb.len();
    let mut ta = vec![0u8; n];
    ta[0] = bb[0];
    ta[n - 1] = bb[n - 1];
    for i in 1..n.saturating_sub(1) {
        ta[i] = median3(bb[i - 1], bb[i], bb[i + 1]);
    }
    ta
}

fn median3(a: u8, b: u8, c: u8) -> u8 {
    if a <= b {
        if b <= c {
            b
        } else {
            a.max(c)
        }
    } else if c <= b {
        b
    } else {
        a.min(c)
    }
}

/// Collapse repeated values into single bytes, dropping singletons
///
/// Two consecutive equal values emit one copy; a third consecutive equal
/// value is absorbed into the same run. A value that never repeats is
/// discarded as noise.
fn collapse_runs(ta: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ta.len() / 2);
    let mut i = 0;
    while i + 1 < ta.len() {
        if ta[i] == ta[i + 1] {
            out.push(ta[i]);
            i += 2;
            if i < ta.len() && ta[i] == ta[i - 1] {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    out
}
