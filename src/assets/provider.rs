// Asset providers - Map a tempo to a decoded loop

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::assets::AssetLoadError;
use crate::assets::loader::decode_file;
use crate::audio::buffer::AudioBuffer;
use crate::config::AssetConfig;
use crate::sequencer::tempo::Bpm;

/// Source of tempo-matched music loops
///
/// The mapping from tempo to asset is deterministic. Implementations may
/// suspend (file I/O, decoding) but must not block the calling task.
pub trait AssetProvider: Send + Sync + 'static {
    fn load(
        &self,
        bpm: Bpm,
    ) -> impl Future<Output = Result<Arc<AudioBuffer>, AssetLoadError>> + Send;
}

/// Loops stored on disk as `<directory>/<bpm>.<extension>`
#[derive(Debug, Clone)]
pub struct DirectoryAssetProvider {
    directory: PathBuf,
    extension: String,
}

impl DirectoryAssetProvider {
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(config.directory.clone(), config.extension.clone())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, bpm: Bpm) -> PathBuf {
        self.directory
            .join(format!("{}.{}", bpm.value(), self.extension))
    }
}

impl AssetProvider for DirectoryAssetProvider {
    fn load(
        &self,
        bpm: Bpm,
    ) -> impl Future<Output = Result<Arc<AudioBuffer>, AssetLoadError>> + Send {
        let path = self.path_for(bpm);

        async move {
            log::debug!("Loading {} from {}", bpm, path.display());
            let buffer = tokio::task::spawn_blocking(move || decode_file(&path))
                .await
                .map_err(|e| AssetLoadError::Join(e.to_string()))??;

            log::info!(
                "Loaded {} loop ({:.1}s, {} ch, {} Hz)",
                bpm,
                buffer.duration_seconds(),
                buffer.channels(),
                buffer.sample_rate()
            );
            Ok(Arc::new(buffer))
        }
    }
}

#[derive(Default)]
struct MemoryAssets {
    buffers: HashMap<Bpm, Arc<AudioBuffer>>,
    failures: HashMap<Bpm, String>,
    latency: Duration,
    requests: Vec<Bpm>,
}

/// In-memory loops, for embedding hosts that decode themselves
///
/// Latency and per-tempo failures can be injected. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryAssetProvider {
    inner: Arc<Mutex<MemoryAssets>>,
}

impl MemoryAssetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryAssets> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every load completes only after `latency`
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    pub fn insert(&self, bpm: Bpm, buffer: AudioBuffer) {
        self.lock().buffers.insert(bpm, Arc::new(buffer));
    }

    /// Make loads of `bpm` fail with `reason` until [`recover`](Self::recover)
    pub fn fail(&self, bpm: Bpm, reason: impl Into<String>) {
        self.lock().failures.insert(bpm, reason.into());
    }

    pub fn recover(&self, bpm: Bpm) {
        self.lock().failures.remove(&bpm);
    }

    /// Tempos requested so far, in request order
    pub fn requests(&self) -> Vec<Bpm> {
        self.lock().requests.clone()
    }
}

impl AssetProvider for MemoryAssetProvider {
    fn load(
        &self,
        bpm: Bpm,
    ) -> impl Future<Output = Result<Arc<AudioBuffer>, AssetLoadError>> + Send {
        let provider = self.clone();

        async move {
            let latency = {
                let mut assets = provider.lock();
                assets.requests.push(bpm);
                assets.latency
            };
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            let assets = provider.lock();
            if let Some(reason) = assets.failures.get(&bpm) {
                return Err(AssetLoadError::Rejected(format!("{}: {}", bpm, reason)));
            }
            assets
                .buffers
                .get(&bpm)
                .cloned()
                .ok_or_else(|| AssetLoadError::NotFound(bpm.to_string()))
        }
    }
}
