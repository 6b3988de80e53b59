use std::path::PathBuf;
use std::sync::Arc;

use crate::db::Database;

/// Shared application state passed to all Axum handlers via `.with_state()`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub static_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(db: Database, static_dir: PathBuf) -> Self {
        Self {
            db,
            static_dir: Arc::new(static_dir),
        }
    }
}
