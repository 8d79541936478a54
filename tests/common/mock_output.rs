//! Mock audio output for testing
//!
//! Clips either finish by themselves after a fixed time or wait for
//! `finish_all()`. Halts are counted.

use async_trait::async_trait;
use narrator::audio::{AudioOutput, Clip, PlaybackHandle};
use narrator::error::{NarrationError, NarrationResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
pub struct MockOutput {
    active: AtomicBool,
    fail_resume: AtomicBool,
    resume_calls: AtomicUsize,
    auto_finish: Mutex<Option<Duration>>,
    pending: Mutex<Vec<oneshot::Sender<Result<(), String>>>>,
    played: Mutex<Vec<Duration>>,
    halted: Arc<AtomicUsize>,
}

impl MockOutput {
    /// Clips end on their own after `after`
    pub fn auto(after: Duration) -> Arc<Self> {
        let output = Self::default();
        *output.auto_finish.lock().unwrap() = Some(after);
        Arc::new(output)
    }

    /// Clips play until `finish_all()` or a halt
    pub fn manual() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_auto_finish(&self, after: Option<Duration>) {
        *self.auto_finish.lock().unwrap() = after;
    }

    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Let every clip that is waiting end naturally
    pub fn finish_all(&self) -> usize {
        let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        let count = pending.len();
        for done in pending {
            let _ = done.send(Ok(()));
        }
        count
    }

    /// Report every waiting clip as never having sounded
    pub fn fail_all(&self, reason: &str) -> usize {
        let pending: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        let count = pending.len();
        for done in pending {
            let _ = done.send(Err(reason.to_string()));
        }
        count
    }

    pub fn played(&self) -> usize {
        self.played.lock().unwrap().len()
    }

    pub fn halted(&self) -> usize {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for MockOutput {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn resume(&self) -> NarrationResult<()> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(NarrationError::ResourceUnavailable(
                "waiting for a user gesture".into(),
            ));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self, clip: Clip) -> NarrationResult<PlaybackHandle> {
        if !self.is_active() {
            return Err(NarrationError::ResourceUnavailable("output dormant".into()));
        }
        self.played.lock().unwrap().push(clip.duration());

        let (done, finished) = oneshot::channel();
        match *self.auto_finish.lock().unwrap() {
            Some(after) => {
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = done.send(Ok(()));
                });
            }
            None => self.pending.lock().unwrap().push(done),
        }

        let halted = self.halted.clone();
        Ok(PlaybackHandle::new(finished, move || {
            halted.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
