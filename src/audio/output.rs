//! The single narration output device
//!
//! Uses a channel-based architecture to handle rodio's non-Send stream.
//! A dedicated audio thread owns the device; it starts dormant and only
//! opens the device when resumed.

use super::clip::Clip;
use crate::error::{NarrationError, NarrationResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// How often the audio thread checks whether the sink drained
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Reference to the clip currently sounding
pub struct PlaybackHandle {
    finished: oneshot::Receiver<Result<(), String>>,
    halt: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle").finish()
    }
}

impl PlaybackHandle {
    /// `finished` carries `Ok` on natural end, or why the clip never sounded;
    /// `halt` silences the clip immediately
    pub fn new(
        finished: oneshot::Receiver<Result<(), String>>,
        halt: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            finished,
            halt: Some(Box::new(halt)),
        }
    }

    /// Wait for the clip to end. A clip the device could not start, or an
    /// audio thread that went away, is `ResourceUnavailable`.
    pub async fn finished(&mut self) -> NarrationResult<()> {
        match (&mut self.finished).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NarrationError::ResourceUnavailable(e)),
            Err(_) => {
                debug!("Playback ended without completion signal");
                Err(NarrationError::ResourceUnavailable(
                    "audio thread gone".to_string(),
                ))
            }
        }
    }

    /// Stop and disconnect the clip
    pub fn halt(mut self) {
        if let Some(halt) = self.halt.take() {
            halt();
        }
    }
}

/// The shared audio output resource
#[async_trait]
pub trait AudioOutput: Send + Sync + std::fmt::Debug {
    /// Whether the device has been resumed and is usable
    fn is_active(&self) -> bool;

    /// Leave the dormant phase. Idempotent.
    async fn resume(&self) -> NarrationResult<()>;

    /// Start playing a clip on the (resumed) device
    fn play(&self, clip: Clip) -> NarrationResult<PlaybackHandle>;

    fn name(&self) -> &str;
}

/// Commands sent to the audio thread
enum OutputCommand {
    Resume(oneshot::Sender<Result<(), String>>),
    Play {
        id: u64,
        clip: Clip,
        done: oneshot::Sender<Result<(), String>>,
    },
    Halt(u64),
}

/// Thread-safe handle to the rodio output thread
#[derive(Clone)]
pub struct RodioOutput {
    sender: mpsc::Sender<OutputCommand>,
    active: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for RodioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioOutput")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioOutput {
    /// Spawn the audio thread in its dormant phase; no device is opened yet
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<OutputCommand>();
        let active = Arc::new(AtomicBool::new(false));

        let thread_active = active.clone();
        thread::spawn(move || {
            Self::audio_thread(receiver, thread_active);
        });

        Self {
            sender,
            active,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn audio_thread(receiver: mpsc::Receiver<OutputCommand>, active: Arc<AtomicBool>) {
        use rodio::{OutputStream, OutputStreamHandle, Sink};

        let mut device: Option<(OutputStream, OutputStreamHandle)> = None;
        let mut sink: Option<Sink> = None;
        let mut current: Option<(u64, oneshot::Sender<Result<(), String>>)> = None;

        debug!("🔈 Narration audio thread started (dormant)");

        loop {
            let cmd = match receiver.recv_timeout(DRAIN_POLL) {
                Ok(cmd) => Some(cmd),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };

            match cmd {
                Some(OutputCommand::Resume(reply)) => {
                    if device.is_none() {
                        match OutputStream::try_default() {
                            Ok(opened) => {
                                info!("🔊 Narration output resumed");
                                device = Some(opened);
                            }
                            Err(e) => {
                                warn!("🔇 Failed to open audio output: {}", e);
                                let _ = reply.send(Err(e.to_string()));
                                continue;
                            }
                        }
                    }
                    active.store(true, Ordering::SeqCst);
                    let _ = reply.send(Ok(()));
                }
                Some(OutputCommand::Play { id, clip, done }) => {
                    let Some((_, handle)) = device.as_ref() else {
                        warn!("🔇 Play requested before output was resumed");
                        let _ = done.send(Err("output not resumed".to_string()));
                        continue;
                    };
                    // A fresh sink per clip; only one clip is ever current
                    match Sink::try_new(handle) {
                        Ok(new_sink) => {
                            new_sink.append(clip.into_source());
                            sink = Some(new_sink);
                            current = Some((id, done));
                        }
                        Err(e) => {
                            error!("❌ Failed to create audio sink: {}", e);
                            let _ = done.send(Err(e.to_string()));
                        }
                    }
                }
                Some(OutputCommand::Halt(id)) => {
                    if matches!(current, Some((cur, _)) if cur == id) {
                        info!("🛑 Halting narration clip");
                        if let Some(s) = sink.take() {
                            s.stop();
                        }
                        current = None;
                    }
                }
                None => {}
            }

            let drained = sink.as_ref().map(|s| s.empty()).unwrap_or(true);
            if drained {
                if let Some((_, done)) = current.take() {
                    let _ = done.send(Ok(()));
                }
            }
        }

        active.store(false, Ordering::SeqCst);
        info!("🔇 Narration audio thread stopped");
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> NarrationResult<()> {
        if self.is_active() {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OutputCommand::Resume(tx))
            .map_err(|e| NarrationError::ResourceUnavailable(format!("audio thread gone: {}", e)))?;

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(NarrationError::ResourceUnavailable(e)),
            Err(_) => Err(NarrationError::ResourceUnavailable(
                "audio thread gone".to_string(),
            )),
        }
    }

    fn play(&self, clip: Clip) -> NarrationResult<PlaybackHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (done, finished) = oneshot::channel();

        self.sender
            .send(OutputCommand::Play { id, clip, done })
            .map_err(|e| NarrationError::ResourceUnavailable(format!("audio thread gone: {}", e)))?;

        let sender = self.sender.clone();
        Ok(PlaybackHandle::new(finished, move || {
            let _ = sender.send(OutputCommand::Halt(id));
        }))
    }

    fn name(&self) -> &str {
        "rodio"
    }
}
