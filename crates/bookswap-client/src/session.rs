use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use bookswap_types::api::UserInfo;

use crate::error::ClientError;

/// JSON file holding the logged-in identity between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nobody is logged in.
    pub fn load(&self) -> Result<Option<UserInfo>, ClientError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    pub fn save(&self, user: &UserInfo) -> Result<(), ClientError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        // Readers never see a partially written file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(user)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The authenticated identity, mirrored to a [`SessionStore`].
#[derive(Debug)]
pub struct Session {
    store: SessionStore,
    current: Option<UserInfo>,
}

impl Session {
    /// Restore whatever session the store holds. A corrupt file is discarded
    /// and treated as logged out.
    pub fn restore(store: SessionStore) -> Result<Self, ClientError> {
        let current = match store.load() {
            Ok(current) => current,
            Err(ClientError::SessionFormat(e)) => {
                warn!("Discarding unreadable session at {}: {}", store.path().display(), e);
                store.clear()?;
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self { store, current })
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.current.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|u| u.token.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn login(&mut self, user: UserInfo) -> Result<(), ClientError> {
        self.store.save(&user)?;
        debug!("Session started for {}", user.email);
        self.current = Some(user);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.store.clear()?;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store() -> SessionStore {
        SessionStore::new(
            std::env::temp_dir()
                .join(format!("bookswap-session-{}", Uuid::new_v4()))
                .join("session.json"),
        )
    }

    fn alice() -> UserInfo {
        UserInfo {
            id: Uuid::new_v4(),
            name: "Alice".into(),
            email: "alice@campus.test".into(),
            token: "tok".into(),
        }
    }

    #[test]
    fn session_survives_a_restart() {
        let store = temp_store();
        let mut session = Session::restore(store.clone()).unwrap();
        assert!(!session.is_active());

        let user = alice();
        session.login(user.clone()).unwrap();
        assert_eq!(session.token(), Some("tok"));

        let restored = Session::restore(store.clone()).unwrap();
        assert_eq!(restored.user(), Some(&user));

        std::fs::remove_dir_all(store.path().parent().unwrap()).ok();
    }

    #[test]
    fn logout_removes_the_file() {
        let store = temp_store();
        let mut session = Session::restore(store.clone()).unwrap();
        session.login(alice()).unwrap();
        session.logout().unwrap();

        assert!(session.user().is_none());
        assert!(store.load().unwrap().is_none());
        // Logging out twice is harmless.
        session.logout().unwrap();

        std::fs::remove_dir_all(store.path().parent().unwrap()).ok();
    }

    #[test]
    fn corrupt_session_is_dropped() {
        let store = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{ not json").unwrap();

        let session = Session::restore(store.clone()).unwrap();
        assert!(!session.is_active());
        assert!(!store.path().exists());

        std::fs::remove_dir_all(store.path().parent().unwrap()).ok();
    }
}
