//! API key storage: a YAML file with environment variable fallback.

use deskpilot_core::{CredentialError, CredentialStore};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable consulted when the file has no key.
pub fn env_var_for(provider_id: &str) -> String {
    format!("{}_API_KEY", provider_id.to_uppercase())
}

/// Keys in a `provider: secret` YAML map, written with owner-only permissions.
pub struct FileCredentialStore {
    path: PathBuf,
    env_fallback: bool,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env_fallback: true,
            write_lock: Mutex::new(()),
        }
    }

    pub fn without_env_fallback(mut self) -> Self {
        self.env_fallback = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| CredentialError::Unreadable(e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_yaml::from_str(&content).map_err(|e| CredentialError::Unreadable(e.to_string()))
    }

    fn persist(&self, keys: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CredentialError::WriteFailed(e.to_string()))?;
        }
        let content =
            serde_yaml::to_string(keys).map_err(|e| CredentialError::WriteFailed(e.to_string()))?;
        let write_failed = |e: std::io::Error| CredentialError::WriteFailed(e.to_string());

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(write_failed)?;

        // The creation mode does not apply to a file that already exists.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(write_failed)?;
        }
        file.write_all(content.as_bytes()).map_err(write_failed)?;
        file.sync_all().map_err(write_failed)
    }
}

impl CredentialStore for FileCredentialStore {
    fn read_key(&self, provider_id: &str) -> Result<Option<String>, CredentialError> {
        if let Some(key) = self.load()?.remove(provider_id) {
            return Ok(Some(key));
        }
        if self.env_fallback {
            return Ok(std::env::var(env_var_for(provider_id)).ok());
        }
        Ok(None)
    }

    fn write_key(&self, provider_id: &str, secret: &str) -> Result<(), CredentialError> {
        let _guard = self.write_lock.lock();
        let mut keys = self.load()?;
        keys.insert(provider_id.to_string(), secret.trim().to_string());
        self.persist(&keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested/credentials.yaml"))
            .without_env_fallback();
        assert_eq!(store.read_key("anthropic").unwrap(), None);

        store.write_key("anthropic", "sk-one\n").unwrap();
        store.write_key("openai", "sk-two").unwrap();
        assert_eq!(store.read_key("anthropic").unwrap().as_deref(), Some("sk-one"));
        assert_eq!(store.read_key("openai").unwrap().as_deref(), Some("sk-two"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_readable_file_is_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.yaml");
        std::fs::write(&path, "openai: sk-old-and-longer\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileCredentialStore::new(&path).without_env_fallback();
        store.write_key("anthropic", "sk-new").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.read_key("openai").unwrap().as_deref(), Some("sk-old-and-longer"));
        assert_eq!(store.read_key("anthropic").unwrap().as_deref(), Some("sk-new"));
    }

    #[test]
    fn test_corrupt_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.yaml");
        std::fs::write(&path, "- not\n- a map\n").unwrap();
        let store = FileCredentialStore::new(path).without_env_fallback();
        assert!(matches!(
            store.read_key("anthropic"),
            Err(CredentialError::Unreadable(_))
        ));
    }

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_for("anthropic"), "ANTHROPIC_API_KEY");
        assert_eq!(env_var_for("openai"), "OPENAI_API_KEY");
    }
}
