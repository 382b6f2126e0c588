/*
[INPUT]:  Session file location
[OUTPUT]: Sessions restored across process restarts
[POS]:    Auth layer - persistent storage for the signed-in session
[UPDATE]: When session file format or location changes
*/

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::types::Session;

const SESSION_FILE: &str = "session.json";

/// Persists the signed-in session as JSON inside a directory
#[derive(Debug, Clone)]
pub struct PersistentSessionStore {
    dir: PathBuf,
}

impl PersistentSessionStore {
    /// Create a store rooted at the given directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load the stored session. Unreadable files are treated as absent.
    pub fn load(&self) -> Option<Session> {
        let path = self.file_path();
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding unreadable session file");
                None
            }
        }
    }

    /// Save the session, readable only by the current user on unix
    pub fn save(&self, session: &Session) -> io::Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let path = self.file_path();
        let encoded = serde_json::to_string_pretty(session)?;
        fs::write(&path, encoded)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Remove the stored session
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(self.file_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn file_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}
