use color_eyre::{Result, eyre::Context};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 1024 * 1024;

/// Compute the SHA-256 hash of a file as lowercase hex
///
/// The file is streamed in 1 MiB chunks, so equal bytes give equal digests
/// no matter what the file is called or where it lives.
pub fn compute_sha256(path: &Path) -> Result<String> {
    tracing::debug!("Computing SHA-256 hash for: {}", path.display());

    let mut file =
        File::open(path).wrap_err_with(|| format!("Failed to open file: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .wrap_err_with(|| format!("Failed to read file: {}", path.display()))?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.mp3");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            compute_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_identity_ignores_name_and_location() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.mp3");
        let nested = dir.path().join("Album").join("Disc 1");
        std::fs::create_dir_all(&nested).unwrap();
        let second = nested.join("completely different.m4a");

        let bytes: Vec<u8> = (0..3 * CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&first, &bytes).unwrap();
        std::fs::write(&second, &bytes).unwrap();

        let first_hash = compute_sha256(&first).unwrap();
        assert_eq!(first_hash.len(), 64);
        assert_eq!(first_hash, compute_sha256(&second).unwrap());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = compute_sha256(&dir.path().join("missing.mp3"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to open file"));
    }
}
