use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::models::AuthSession;
use crate::error::AppResult;

/// Keeps the auth session on disk so a restart resumes where the user left off
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// A store that never touches the filesystem
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the persisted session. A corrupt file is logged and treated as absent.
    pub async fn load(&self) -> AppResult<Option<AuthSession>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<AuthSession>(&content) {
            Ok(session) => {
                debug!("Loaded persisted session from {}", path.display());
                Ok(Some(session))
            }
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, session: &AuthSession) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string(session)?;
        write_private(path, json.as_bytes()).await?;
        Ok(())
    }

    pub async fn clear(&self) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write `contents` so only the owner can read them; the file holds a refresh token
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    // A file left by an older version keeps its mode on open
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(contents).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::backend::models::User;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("daybook-test-{}", Uuid::new_v4()))
            .join("session.json")
    }

    fn session() -> AuthSession {
        AuthSession {
            access_token: "access".into(),
            token_type: "bearer".into(),
            expires_in: 3600,
            expires_at: Some(1_900_000_000),
            refresh_token: "refresh".into(),
            user: User { id: Uuid::new_v4(), email: Some("me@example.com".into()) },
        }
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let path = temp_path();
        let store = SessionStore::new(Some(path.clone()));

        assert!(store.load().await.unwrap().is_none());

        let saved = session();
        store.save(&saved).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.user, saved.user);
        assert_eq!(loaded.refresh_token, "refresh");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // Clearing twice is fine
        store.clear().await.unwrap();

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_ignored() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = SessionStore::new(Some(path.clone()));
        assert!(store.load().await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_disabled_store() {
        let store = SessionStore::disabled();
        store.save(&session()).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = SessionStore::new(Some(path.clone()));
        store.save(&session()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(store.load().await.unwrap().is_some());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
