//! Signing key storage.
//!
//! A keyfile holds the 32-byte ed25519 seed as hex on a single line.

use anyhow::{bail, Context, Result};
use ed25519_dalek::SigningKey;
use std::fs;
use std::path::Path;

pub fn write_key(path: &Path, key: &SigningKey, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", hex::encode(key.to_bytes())))
        .with_context(|| format!("failed to write keyfile {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}

pub fn read_key(path: &Path) -> Result<SigningKey> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read keyfile {}", path.display()))?;
    let mut seed = [0u8; 32];
    hex::decode_to_slice(raw.trim().trim_start_matches("0x"), &mut seed)
        .with_context(|| format!("{} does not contain a 32-byte hex seed", path.display()))?;
    Ok(SigningKey::from_bytes(&seed))
}
