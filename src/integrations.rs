//! Collaborator boundaries
//!
//! Downloading and speech synthesis are external collaborators: the engine
//! only needs a file on disk and a name to register in the library. These
//! traits are the whole contract; implementations (yt-dlp wrappers, cloud
//! TTS, whatever) are wired in by the embedding application and their errors
//! pass through opaquely.

use std::path::PathBuf;

/// Result of fetching a remote clip.
#[derive(Debug, Clone)]
pub struct FetchedClip {
    /// Local file containing the extracted audio
    pub file_path: PathBuf,
    /// Human-readable title to offer as the library name
    pub title: String,
}

/// Fetches a remote source (e.g. a video URL) and extracts its audio.
pub trait Downloader: Send + Sync {
    fn fetch(&self, url: &str) -> anyhow::Result<FetchedClip>;
}

/// Generates a spoken clip from text.
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in `language`, naming the output after
    /// `target_name`. Returns the path of the generated file.
    fn synthesize(&self, text: &str, target_name: &str, language: &str)
        -> anyhow::Result<PathBuf>;
}
