use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the preference store inside the state directory.
const PREFS_FILE: &str = "prefs.json";
/// URL used when neither the command line nor saved preferences name one.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:4455";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid preferences file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connection preferences remembered between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    /// Whether the last URL is saved.
    pub remember_url: bool,
    /// Whether the password is saved. Off unless asked for.
    pub remember_password: bool,
    pub url: Option<String>,
    pub password: Option<String>,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            remember_url: true,
            remember_password: false,
            url: None,
            password: None,
        }
    }
}

impl Prefs {
    /// Explicit URL, else the remembered one, else [`DEFAULT_URL`].
    pub fn resolve_url(&self, explicit: Option<String>) -> String {
        explicit
            .filter(|url| !url.trim().is_empty())
            .map(|url| url.trim().to_string())
            .or_else(|| self.remember_url.then(|| self.url.clone()).flatten())
            .unwrap_or_else(|| DEFAULT_URL.to_string())
    }

    /// Explicit password, else one from the environment, else the remembered
    /// one.
    pub fn resolve_password(
        &self,
        explicit: Option<String>,
        from_env: Option<String>,
    ) -> Option<String> {
        explicit
            .or(from_env)
            .or_else(|| self.remember_password.then(|| self.password.clone()).flatten())
            .filter(|password| !password.is_empty())
    }

    /// Stores what was used for a connection, honoring the remember flags.
    pub fn record(&mut self, url: &str, password: Option<&str>) {
        self.url = self.remember_url.then(|| url.to_string());
        self.password = if self.remember_password {
            password.map(str::to_string)
        } else {
            None
        };
    }
}

/// JSON-file backed preference storage.
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(PREFS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads saved preferences; a missing file yields the defaults.
    pub fn load(&self) -> Result<Prefs, PrefsError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Prefs::default()),
            Err(err) => Err(PrefsError::Io(err)),
        }
    }

    pub fn save(&self, prefs: &Prefs) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(prefs)?;
        let mut file = open_private(&self.path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Drops the saved URL and password and resets the remember flags.
    pub fn forget(&self) -> Result<(), PrefsError> {
        self.save(&Prefs::default())
    }
}

/// Opens `path` for rewriting, readable by the owner only. A file left
/// behind with wider permissions is narrowed before anything is written.
#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
