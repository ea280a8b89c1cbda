//! Local SSH key resolution — scan-or-generate.
//!
//! The public key is injected into workspace containers as the login
//! credential. When no key exists, a fresh ed25519 keypair is generated
//! once via `ssh-keygen`; subsequent calls find and reuse it, so the
//! resolution is deterministic given the same key-store state.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::SshKeys;

/// Public key files probed in priority order.
const KEY_CANDIDATES: &[&str] = &["id_rsa.pub", "id_ed25519.pub", "id_ecdsa.pub"];

/// Basename of the keypair generated when none is found.
const GENERATED_KEY: &str = "id_ed25519";

/// SSH key resolver rooted at a key directory (normally `~/.ssh`).
pub struct LocalSshKeys {
    ssh_dir: PathBuf,
}

impl LocalSshKeys {
    /// Create a resolver for the user's `~/.ssh` directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
        Ok(Self::with_dir(home.join(".ssh")))
    }

    /// Create a resolver with an explicit key directory (used in tests).
    #[must_use]
    pub fn with_dir(ssh_dir: PathBuf) -> Self {
        Self { ssh_dir }
    }

    fn read_key(&self, file: &str) -> Result<Option<String>> {
        let path = self.ssh_dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading SSH key {}", path.display()))?;
        Ok(Some(content.trim().to_string()))
    }
}

impl SshKeys for LocalSshKeys {
    async fn ensure_public_key(&self) -> Result<String> {
        for candidate in KEY_CANDIDATES {
            if let Some(key) = self.read_key(candidate)? {
                return Ok(key);
            }
        }

        // One-time bootstrap: no key found anywhere, generate one.
        std::fs::create_dir_all(&self.ssh_dir)
            .with_context(|| format!("creating {}", self.ssh_dir.display()))?;
        let key_path = self.ssh_dir.join(GENERATED_KEY);
        let output = tokio::process::Command::new("ssh-keygen")
            .args(["-t", "ed25519", "-f"])
            .arg(&key_path)
            .args(["-N", ""])
            .output()
            .await
            .context("running ssh-keygen")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ssh-keygen failed: {stderr}");
        }

        self.read_key(&format!("{GENERATED_KEY}.pub"))?
            .ok_or_else(|| anyhow::anyhow!("ssh-keygen produced no public key"))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_key(dir: &TempDir, file: &str, content: &str) {
        std::fs::write(dir.path().join(file), content).expect("write key");
    }

    #[tokio::test]
    async fn ensure_public_key_returns_existing_key_trimmed() {
        let dir = TempDir::new().expect("tempdir");
        write_key(&dir, "id_ed25519.pub", "ssh-ed25519 AAAA dev@host\n");

        let keys = LocalSshKeys::with_dir(dir.path().to_path_buf());
        let key = keys.ensure_public_key().await.expect("key");
        assert_eq!(key, "ssh-ed25519 AAAA dev@host");
    }

    #[tokio::test]
    async fn ensure_public_key_prefers_rsa_over_ed25519() {
        let dir = TempDir::new().expect("tempdir");
        write_key(&dir, "id_rsa.pub", "ssh-rsa RSAKEY dev@host");
        write_key(&dir, "id_ed25519.pub", "ssh-ed25519 EDKEY dev@host");

        let keys = LocalSshKeys::with_dir(dir.path().to_path_buf());
        let key = keys.ensure_public_key().await.expect("key");
        assert!(key.starts_with("ssh-rsa"), "id_rsa.pub has priority: {key}");
    }

    #[tokio::test]
    async fn ensure_public_key_is_deterministic_across_calls() {
        let dir = TempDir::new().expect("tempdir");
        write_key(&dir, "id_ecdsa.pub", "ecdsa-sha2-nistp256 KEY dev@host");

        let keys = LocalSshKeys::with_dir(dir.path().to_path_buf());
        let first = keys.ensure_public_key().await.expect("first");
        let second = keys.ensure_public_key().await.expect("second");
        assert_eq!(first, second);
    }
}
