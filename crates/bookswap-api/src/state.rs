use std::path::PathBuf;
use std::sync::Arc;

use tracing::error;

use bookswap_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>, upload_dir: impl Into<PathBuf>) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
            upload_dir: upload_dir.into(),
        })
    }

    /// Run a blocking DB closure off the async runtime.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.into())
            })?
            .map_err(ApiError::Internal)
    }
}
