use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::error::Result;

/// A corpus file picked up by a scan pass.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Canonical absolute path; doubles as the index identity.
    pub path: PathBuf,
    /// String form of `path`, used as the join key against the index.
    pub identity: String,
    /// Last modification time as seconds since the Unix epoch.
    pub fingerprint: u64,
}

/// File name suffix accepted by the scanner, compared case-insensitively.
const CORPUS_SUFFIX: &str = ".txt";

/// List the corpus files directly inside `dir`.
///
/// Only regular files whose names end in `.txt` (any case) are
/// candidates; subdirectories are not descended into. A directory that
/// cannot be listed is an error, never an empty scan. Results are
/// sorted by identity so runs over the same corpus are deterministic.
pub fn scan_corpus(dir: &Path) -> Result<Vec<ScannedFile>> {
    let mut results = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name();
        if !is_corpus_file(&name.to_string_lossy()) {
            continue;
        }

        let path = entry.path().canonicalize()?;
        let fingerprint = mtime_seconds(&path)?;
        let identity = path.to_string_lossy().to_string();
        results.push(ScannedFile {
            path,
            identity,
            fingerprint,
        });
    }

    results.sort_by(|a, b| a.identity.cmp(&b.identity));
    tracing::debug!(dir = %dir.display(), files = results.len(), "scanned corpus");
    Ok(results)
}

fn is_corpus_file(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(CORPUS_SUFFIX)
}

fn mtime_seconds(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs())
}
