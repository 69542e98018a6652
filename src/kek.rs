//! Key encryption key generation.
//!
//! The KEK is the one secret the pipeline creates itself: 32 bytes from the
//! system CSPRNG, written verbatim for the worker to reference as `file:<path>`.
use crate::util::sha256_hex;
use anyhow::{anyhow, Context, Result};
use ring::rand::{SecureRandom, SystemRandom};
use std::fs;
use std::path::Path;

pub(crate) const KEK_LEN: usize = 32;

pub(crate) fn generate_kek() -> Result<[u8; KEK_LEN]> {
    let rng = SystemRandom::new();
    let mut kek = [0u8; KEK_LEN];
    rng.fill(&mut kek)
        .map_err(|_| anyhow!("system random source failed to produce KEK bytes"))?;
    Ok(kek)
}

/// Write the KEK, replacing any previous one, and return its SHA-256
/// fingerprint for logging.
pub(crate) fn write_kek(path: &Path, kek: &[u8; KEK_LEN]) -> Result<String> {
    fs::write(path, kek).with_context(|| format!("write KEK {}", path.display()))?;
    Ok(sha256_hex(kek))
}
