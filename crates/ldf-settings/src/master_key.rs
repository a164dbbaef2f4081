//! Loads or generates the 32-byte AEAD master key, enforcing 0600/0700
//! permissions on Unix. On other platforms the permission enforcement is a
//! no-op — there's no portable equivalent, and the file still lives wherever
//! the caller's OS-level ACLs put it.

use std::path::Path;

use rand::RngCore;

pub const KEY_LEN: usize = 32;

/// Reads the master key at `path`, generating and persisting a fresh random
/// one if the file doesn't exist yet.
pub fn load_or_create(path: &Path) -> anyhow::Result<[u8; KEY_LEN]> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        set_dir_permissions(parent, 0o700)?;
    }

    if path.exists() {
        let bytes = std::fs::read(path)?;
        if bytes.len() != KEY_LEN {
            anyhow::bail!("master key file {} has unexpected length", path.display());
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    std::fs::write(path, key)?;
    set_file_permissions(path, 0o600)?;
    Ok(key)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path, mode: u32) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path, _mode: u32) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_fresh_key_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/master.key");
        let key = load_or_create(&path).unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert!(path.exists());
    }

    #[test]
    fn reuses_an_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        let first = load_or_create(&path).unwrap();
        let second = load_or_create(&path).unwrap();
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        load_or_create(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn rejects_a_truncated_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        std::fs::write(&path, b"too-short").unwrap();
        assert!(load_or_create(&path).is_err());
    }
}
