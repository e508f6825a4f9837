//! Content fingerprints.
//!
//! Everything the cache compares is a SHA-256 hex digest: file contents,
//! command strings, and accumulators over the files matched by a set of glob
//! patterns.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Walk(#[from] pace_globwalk::WalkError),
    #[error("failed to hash {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

/// Hash a single file by streaming its bytes through SHA-256.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hash every regular file matched by `patterns` under `base`.
///
/// Pattern order is significant, and files within one pattern arrive in the
/// expander's lexicographic order, so the digest is deterministic. Each file
/// contributes `relative-path + ":" + file-digest` to the accumulator; paths
/// use `/` separators regardless of platform. Matches that vanish between
/// expansion and hashing are skipped, as are directories.
///
/// An empty pattern list produces an empty string, not a digest.
pub fn hash_pattern_set(base: &Path, patterns: &[String]) -> Result<String, Error> {
    if patterns.is_empty() {
        return Ok(String::new());
    }

    let mut hasher = Sha256::new();
    for pattern in patterns {
        for relative in pace_globwalk::globwalk(base, pattern)? {
            let path = base.join(&relative);
            match path.metadata() {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {}
                Err(_) => continue,
            }
            let file_hash = match hash_file(&path) {
                Ok(digest) => digest,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(Error::Io { path, source }),
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(file_hash.as_bytes());
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash the UTF-8 bytes of a string.
pub fn hash_string(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}
