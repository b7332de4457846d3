//! Asynchronous frame encoding.
//!
//! Rendered frames go into a bounded queue that a dedicated encoder thread
//! drains into a [`FrameSink`]. Pushing never blocks: when the queue is full
//! the frame is dropped and counted. The encoder exits once the stop signal
//! is set and the queue is empty (or every producer is gone), and always
//! finalizes the sink, so a cancelled run still produces a playable file.
//!
//! ```ignore
//! let stop = StopSignal::new();
//! let recorder = Recorder::spawn(open_sink("out.mp4", 1920, 1080, 60)?, 1000, stop.clone())?;
//! let producer = recorder.producer();
//! producer.try_push(frame);
//! stop.signal();
//! let stats = recorder.finish()?;
//! ```

use crate::error::RecordError;
use crate::render::Frame;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the encoder waits for a frame before rechecking the stop signal.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Destination for encoded frames.
pub trait FrameSink: Send {
    /// Append one frame.
    fn write(&mut self, frame: &Frame) -> Result<(), RecordError>;

    /// Flush and close the output. Called exactly once, after the last write.
    fn finish(&mut self) -> Result<(), RecordError>;
}

/// Pipes raw `rgb24` frames into an `ffmpeg` child process.
pub struct FfmpegSink {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    width: u32,
    height: u32,
}

impl FfmpegSink {
    /// Start `ffmpeg` writing an MPEG-4 video to `path`.
    pub fn spawn(path: impl AsRef<Path>, width: u32, height: u32, fps: u32) -> Result<Self, RecordError> {
        let mut child = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &fps.to_string()])
            .args(["-i", "-"])
            .args(["-c:v", "mpeg4", "-q:v", "2"])
            .arg(path.as_ref())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecordError::Encoder("ffmpeg stdin is not available".into()))?;

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            width,
            height,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordError> {
        check_size(frame, self.width, self.height)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RecordError::Encoder("write after finish".into()))?;
        stdin.write_all(frame.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
            // Dropping stdin closes the pipe so ffmpeg can finalize the file.
        }
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(RecordError::Encoder(format!("ffmpeg exited with {}", status)))
        }
    }
}

/// Writes an animated GIF.
pub struct GifSink {
    encoder: Option<GifEncoder<BufWriter<File>>>,
    delay: Delay,
    width: u32,
    height: u32,
}

impl GifSink {
    pub fn create(path: impl AsRef<Path>, width: u32, height: u32, fps: u32) -> Result<Self, RecordError> {
        let file = File::create(path)?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            encoder: Some(encoder),
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
            width,
            height,
        })
    }
}

impl FrameSink for GifSink {
    fn write(&mut self, frame: &Frame) -> Result<(), RecordError> {
        check_size(frame, self.width, self.height)?;
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| RecordError::Encoder("write after finish".into()))?;
        let image = RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba())
            .ok_or_else(|| RecordError::Encoder("frame buffer has the wrong length".into()))?;
        encoder.encode_frame(image::Frame::from_parts(image, 0, 0, self.delay))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RecordError> {
        // The encoder writes the trailer when dropped.
        self.encoder.take();
        Ok(())
    }
}

fn check_size(frame: &Frame, width: u32, height: u32) -> Result<(), RecordError> {
    if frame.width != width || frame.height != height {
        return Err(RecordError::Encoder(format!(
            "frame is {}x{}, expected {}x{}",
            frame.width, frame.height, width, height
        )));
    }
    Ok(())
}

/// Open the sink matching `path`'s extension: `.gif` or anything ffmpeg handles.
pub fn open_sink(path: impl AsRef<Path>, width: u32, height: u32, fps: u32) -> Result<Box<dyn FrameSink>, RecordError> {
    let path = path.as_ref();
    let is_gif = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gif"));
    if is_gif {
        Ok(Box::new(GifSink::create(path, width, height, fps)?))
    } else {
        Ok(Box::new(FfmpegSink::spawn(path, width, height, fps)?))
    }
}

/// Shared "stop recording" flag.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_signalled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Frame counts for a finished recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordStats {
    /// Frames handed to the sink.
    pub written: u64,
    /// Frames dropped because the queue was full.
    pub dropped: u64,
}

/// Non-blocking handle for submitting frames.
#[derive(Clone)]
pub struct FrameProducer {
    tx: SyncSender<Frame>,
    dropped: Arc<AtomicU64>,
}

impl FrameProducer {
    /// Queue a frame. Returns `false` if it was dropped.
    pub fn try_push(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) | Err(TrySendError::Disconnected(frame)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 100 == 0 {
                    log::warn!(
                        "Frame queue full, dropped frame {} ({} dropped so far)",
                        frame.sequence,
                        dropped
                    );
                }
                false
            }
        }
    }

    /// Frames dropped so far by every clone of this producer.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// A running encoder thread.
pub struct Recorder {
    producer: FrameProducer,
    stop: StopSignal,
    handle: JoinHandle<Result<u64, RecordError>>,
    output: Option<PathBuf>,
}

impl Recorder {
    /// Start the encoder thread with a queue of `capacity` frames.
    pub fn spawn(sink: Box<dyn FrameSink>, capacity: usize, stop: StopSignal) -> Result<Self, RecordError> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("encoder".into())
            .spawn(move || encode_loop(rx, sink, &thread_stop))?;

        Ok(Self {
            producer: FrameProducer {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            stop,
            handle,
            output: None,
        })
    }

    /// Open a sink for `path` and start recording into it.
    pub fn to_file(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        fps: u32,
        capacity: usize,
        stop: StopSignal,
    ) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let sink = open_sink(path, width, height, fps)?;
        log::info!("Recording {}x{} at {} fps to {}", width, height, fps, path.display());
        let mut recorder = Self::spawn(sink, capacity, stop)?;
        recorder.output = Some(path.to_path_buf());
        Ok(recorder)
    }

    pub fn producer(&self) -> FrameProducer {
        self.producer.clone()
    }

    /// Signal stop, wait for the queue to drain and the sink to close.
    pub fn finish(self) -> Result<RecordStats, RecordError> {
        self.stop.signal();
        let dropped = self.producer.dropped();
        drop(self.producer);

        let written = self.handle.join().map_err(|_| RecordError::ThreadPanicked)??;
        let stats = RecordStats { written, dropped };
        match &self.output {
            Some(path) => log::info!(
                "Recording finished: {} frames written, {} dropped, saved to {}",
                stats.written,
                stats.dropped,
                path.display()
            ),
            None => log::info!(
                "Recording finished: {} frames written, {} dropped",
                stats.written,
                stats.dropped
            ),
        }
        Ok(stats)
    }
}

fn encode_loop(rx: Receiver<Frame>, mut sink: Box<dyn FrameSink>, stop: &StopSignal) -> Result<u64, RecordError> {
    let drained = drain(&rx, sink.as_mut(), stop);
    if let Err(e) = &drained {
        log::error!("Encoding failed: {}", e);
    }
    let finished = sink.finish();
    let written = drained?;
    finished?;
    Ok(written)
}

fn drain(rx: &Receiver<Frame>, sink: &mut dyn FrameSink, stop: &StopSignal) -> Result<u64, RecordError> {
    let mut written = 0;
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                sink.write(&frame)?;
                written += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.is_signalled() {
                    return Ok(written);
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(written),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct Collect {
        seen: Arc<Mutex<Vec<u64>>>,
        finished: Arc<AtomicBool>,
    }

    impl FrameSink for Collect {
        fn write(&mut self, frame: &Frame) -> Result<(), RecordError> {
            self.seen.lock().unwrap().push(frame.sequence);
            Ok(())
        }

        fn finish(&mut self) -> Result<(), RecordError> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn frame(sequence: u64) -> Frame {
        let mut frame = Frame::new(2, 2, [0, 0, 0]);
        frame.sequence = sequence;
        frame
    }

    #[test]
    fn test_drains_queue_before_exit() {
        let sink = Collect::default();
        let stop = StopSignal::new();
        let recorder = Recorder::spawn(Box::new(sink.clone()), 16, stop.clone()).unwrap();
        let producer = recorder.producer();
        for i in 0..10 {
            assert!(producer.try_push(frame(i)));
        }
        drop(producer);
        stop.signal();

        let stats = recorder.finish().unwrap();
        assert_eq!(stats, RecordStats { written: 10, dropped: 0 });
        assert_eq!(*sink.seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert!(sink.finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_full_queue_drops() {
        let (tx, _rx) = mpsc::sync_channel(2);
        let producer = FrameProducer {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        assert!(producer.try_push(frame(0)));
        assert!(producer.try_push(frame(1)));
        assert!(!producer.try_push(frame(2)));
        assert_eq!(producer.dropped(), 1);
    }

    #[test]
    fn test_sink_error_still_finishes() {
        struct Failing(Arc<AtomicBool>);
        impl FrameSink for Failing {
            fn write(&mut self, _frame: &Frame) -> Result<(), RecordError> {
                Err(RecordError::Encoder("boom".into()))
            }
            fn finish(&mut self) -> Result<(), RecordError> {
                self.0.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        let finished = Arc::new(AtomicBool::new(false));
        let recorder = Recorder::spawn(Box::new(Failing(finished.clone())), 4, StopSignal::new()).unwrap();
        recorder.producer().try_push(frame(0));
        assert!(matches!(recorder.finish(), Err(RecordError::Encoder(_))));
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn test_gif_sink_writes_file() {
        let path = std::env::temp_dir().join(format!("spoutfill-test-{}.gif", std::process::id()));
        let mut sink = open_sink(&path, 2, 2, 30).unwrap();
        sink.write(&frame(0)).unwrap();
        sink.write(&frame(1)).unwrap();
        sink.finish().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], b"GIF");
        std::fs::remove_file(&path).ok();
    }
}
