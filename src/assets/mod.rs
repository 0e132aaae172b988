// Assets - Tempo-matched music loops
//
// One decoded, loop-ready buffer per tempo. The engine asks a provider for a
// tempo and never caches buffers itself.

pub mod loader;
pub mod provider;

pub use loader::decode_file;
pub use provider::{AssetProvider, DirectoryAssetProvider, MemoryAssetProvider};

#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Unsupported file format: {0}")]
    Unsupported(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder task failed: {0}")]
    Join(String),

    #[error("Asset contains no audio: {0}")]
    Empty(String),

    #[error("Asset unavailable: {0}")]
    Rejected(String),
}
