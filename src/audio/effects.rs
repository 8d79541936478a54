//! Sound effects for quick game feedback
//!
//! Fire-and-forget and uncoordinated with the narration queue: effects may
//! overlap narration and each other. A pool groups variants of one effect,
//! e.g. `correct_1.wav` and `correct_2.wav` form the pool `correct`.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const EFFECT_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum PlaybackMode {
    #[default]
    Random,
    Sequential,
}

/// Commands sent to the effects thread
enum EffectCommand {
    Play(PathBuf),
}

/// Thread-safe handle to the effects player
#[derive(Clone)]
pub struct SoundEffects {
    sender: mpsc::Sender<EffectCommand>,
    pools: Arc<HashMap<String, Vec<PathBuf>>>,
    cursors: Arc<std::sync::Mutex<HashMap<String, usize>>>,
    mode: PlaybackMode,
    enabled: Arc<AtomicBool>,
}

impl std::fmt::Debug for SoundEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEffects")
            .field("pools", &self.pools.len())
            .field("mode", &self.mode)
            .finish()
    }
}

impl SoundEffects {
    /// Scan `dir` for effect pools and start the effects thread
    pub fn new(dir: &Path, mode: PlaybackMode) -> Self {
        let pools = discover_pools(dir);
        info!(
            "🔔 {} sound effect pools loaded from {:?}",
            pools.len(),
            dir
        );

        let (sender, receiver) = mpsc::channel::<EffectCommand>();
        thread::spawn(move || {
            Self::effects_thread(receiver);
        });

        Self {
            sender,
            pools: Arc::new(pools),
            cursors: Arc::new(std::sync::Mutex::new(HashMap::new())),
            mode,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    fn effects_thread(receiver: mpsc::Receiver<EffectCommand>) {
        use rodio::OutputStream;

        // Opened lazily on the first effect so an idle player holds no device
        let mut device = None;

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                EffectCommand::Play(path) => {
                    if device.is_none() {
                        match OutputStream::try_default() {
                            Ok(opened) => device = Some(opened),
                            Err(e) => {
                                warn!("🔇 Failed to open effects output: {}", e);
                                continue;
                            }
                        }
                    }
                    if let Some((_, handle)) = device.as_ref() {
                        if let Err(e) = Self::play_detached(handle, &path) {
                            error!("❌ Effect playback failed for {:?}: {}", path, e);
                        }
                    }
                }
            }
        }

        info!("🔇 Effects thread stopped");
    }

    fn play_detached(handle: &rodio::OutputStreamHandle, path: &Path) -> anyhow::Result<()> {
        use rodio::{Decoder, Sink};
        use std::fs::File;
        use std::io::BufReader;

        let file = File::open(path)?;
        let source = Decoder::new(BufReader::new(file))?;

        // Own sink per effect so effects overlap instead of queueing
        let sink = Sink::try_new(handle)?;
        sink.append(source);
        sink.detach();

        debug!("🔔 Effect: {:?}", path.file_name().unwrap_or_default());
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Pick the next variant of a pool according to the playback mode
    pub fn pick(&self, pool: &str) -> Option<PathBuf> {
        let files = self.pools.get(pool).filter(|f| !f.is_empty())?;
        match self.mode {
            PlaybackMode::Random => files.choose(&mut rand::thread_rng()).cloned(),
            PlaybackMode::Sequential => {
                let mut cursors = self
                    .cursors
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let idx = cursors.entry(pool.to_string()).or_insert(0);
                let file = files[*idx % files.len()].clone();
                *idx = (*idx + 1) % files.len();
                Some(file)
            }
        }
    }

    /// Play an effect from a pool; unknown pools are ignored
    pub fn play(&self, pool: &str) -> anyhow::Result<()> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Ok(());
        }

        let Some(file) = self.pick(pool) else {
            warn!("⚠️ Sound effect pool '{}' is empty", pool);
            return Ok(());
        };

        self.sender
            .send(EffectCommand::Play(file))
            .map_err(|e| anyhow::anyhow!("Effects thread disconnected: {}", e))
    }
}

/// Group audio files by the stem before a trailing `_<n>` variant suffix
pub fn discover_pools(dir: &Path) -> HashMap<String, Vec<PathBuf>> {
    let mut pools: HashMap<String, Vec<PathBuf>> = HashMap::new();

    for entry in WalkDir::new(dir)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| EFFECT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_audio {
            continue;
        }

        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            pools
                .entry(pool_name(stem))
                .or_default()
                .push(path.to_path_buf());
        }
    }

    for files in pools.values_mut() {
        files.sort();
    }
    pools
}

fn pool_name(stem: &str) -> String {
    match stem.rsplit_once('_') {
        Some((base, suffix)) if !base.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => {
            base.to_lowercase()
        }
        _ => stem.to_lowercase(),
    }
}
