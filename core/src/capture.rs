use crate::analyzer::FrameAnalyzer;
use crate::config::ModemConfig;
use crate::error::Result;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// A mono 16-bit PCM sample stream, read in arbitrary-size chunks
///
/// The narrow seam to the audio device. `read` fills a prefix of `buf` and
/// returns the number of samples written; `Ok(0)` signals end of stream.
/// Implementations should return within a bounded time so a stop request is
/// honored promptly.
pub trait AudioSource: Send {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize>;
}

struct SlotState {
    block: Vec<i16>,
    available: bool,
    shutdown: bool,
}

/// Single-slot hand-off cell between the reader and analyzer threads
///
/// Each transfer is a full-block copy, so the two sides never alias the same
/// memory. The producer blocks while the slot is occupied; throughput is
/// bounded by the consumer's pace and memory by the one slot.
struct BlockSlot {
    state: Mutex<SlotState>,
    space: Condvar,
    data: Condvar,
}

impl BlockSlot {
    fn new(block_size: usize) -> Self {
        Self {
            state: Mutex::new(SlotState {
                block: vec![0; block_size],
                available: false,
                shutdown: false,
            }),
            space: Condvar::new(),
            data: Condvar::new(),
        }
    }

    /// Copy `block` into the slot, waiting for space
    ///
    /// Returns false once the slot has been shut down.
    fn put(&self, block: &[i16]) -> bool {
        let mut state = self.state.lock().unwrap();
        while state.available && !state.shutdown {
            state = self.space.wait(state).unwrap();
        }
        if state.shutdown {
            return false;
        }
        state.block.copy_from_slice(block);
        state.available = true;
        self.data.notify_one();
        true
    }

    /// Copy the next block out of the slot, waiting for data
    ///
    /// A block already pending is still delivered after shutdown; returns
    /// false once the slot is shut down and drained.
    fn take(&self, out: &mut [i16]) -> bool {
        let mut state = self.state.lock().unwrap();
        while !state.available && !state.shutdown {
            state = self.data.wait(state).unwrap();
        }
        if !state.available {
            return false;
        }
        out.copy_from_slice(&state.block);
        state.available = false;
        self.space.notify_one();
        true
    }

    /// Refuse further transfers and wake every blocked wait
    fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.shutdown = true;
        self.space.notify_all();
        self.data.notify_all();
    }
}

/// Producer/consumer pair that pulls sample blocks from an audio source and
/// drives the frame analyzer
///
/// The reader thread owns the audio source for its whole life, so the
/// source is dropped (and the device released) exactly once when that
/// thread exits, no matter how often [`CapturePipeline::stop`] is called.
/// Blocks reach the analyzer in capture order; the analyzer and decoder are
/// touched by the consumer thread only.
pub struct CapturePipeline {
    slot: Arc<BlockSlot>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    analyzer: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Spawn the reader and analyzer threads and start consuming the source
    pub fn start(
        config: ModemConfig,
        source: Box<dyn AudioSource>,
        analyzer: FrameAnalyzer,
    ) -> Self {
        let slot = Arc::new(BlockSlot::new(config.block_size));
        let stop = Arc::new(AtomicBool::new(false));

        let reader = {
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            thread::spawn(move || read_loop(source, &slot, &stop, config.block_size))
        };

        let analyzer = {
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            thread::spawn(move || analyze_loop(analyzer, &slot, &stop, config.block_size))
        };

        Self {
            slot,
            stop,
            reader: Some(reader),
            analyzer: Some(analyzer),
        }
    }

    /// Request both threads to stop and wait for them to finish
    ///
    /// Idempotent; wakes any wait blocked on the hand-off slot, so neither
    /// thread can stay stuck on a condition that will never be signaled.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.slot.shutdown();
        if self.join() {
            info!("capture pipeline stopped");
        }
    }

    /// Wait for the pipeline to wind down on its own
    ///
    /// Returns once the source has reached end of stream and every captured
    /// block has been analyzed.
    pub fn wait(&mut self) {
        self.join();
    }

    fn join(&mut self) -> bool {
        let mut joined = false;
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
            joined = true;
        }
        if let Some(handle) = self.analyzer.take() {
            let _ = handle.join();
            joined = true;
        }
        joined
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop(
    mut source: Box<dyn AudioSource>,
    slot: &BlockSlot,
    stop: &AtomicBool,
    block_size: usize,
) {
    let mut block = vec![0i16; block_size];
    'capture: while !stop.load(Ordering::SeqCst) {
        let mut filled = 0;
        while filled < block_size {
            if stop.load(Ordering::SeqCst) {
                break 'capture;
            }
            match source.read(&mut block[filled..]) {
                Ok(0) => {
                    info!("audio source reached end of stream");
                    break 'capture;
                }
                Ok(count) => filled += count,
                Err(err) => {
                    warn!("audio read failed: {err}");
                    break 'capture;
                }
            }
        }
        if !slot.put(&block) {
            break;
        }
    }
    // No more blocks are coming; unblock the analyzer side. Dropping the
    // source here releases the device.
    slot.shutdown();
}

fn analyze_loop(
    mut analyzer: FrameAnalyzer,
    slot: &BlockSlot,
    stop: &AtomicBool,
    block_size: usize,
) {
    let mut block = vec![0i16; block_size];
    while !stop.load(Ordering::SeqCst) {
        if !slot.take(&mut block) {
            break;
        }
        analyzer.analyze(&block);
    }
}
