//! Shared process state handed to every request handler.
//!
//! Holds no per-record state: each request opens its own database
//! connection and the attachment store is a thin wrapper around a
//! directory, so handlers never contend on a lock here.

use std::path::{Path, PathBuf};

use crate::attachments::AttachmentStore;
use crate::config::ServerConfig;
use crate::db;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

pub struct CoreState {
    db_path: PathBuf,
    attachments: AttachmentStore,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            attachments: AttachmentStore::new(public_dir),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(&config.database_path, &config.public_dir)
    }

    /// Open a database connection (runs pending migrations).
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_db_creates_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::new(tmp.path().join("tests.db"), tmp.path().join("public"));
        let conn = core.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 2);
        assert!(core.db_path().exists());
    }

    #[test]
    fn open_db_fails_for_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::new(tmp.path().join("missing/dir/tests.db"), tmp.path());
        assert!(matches!(core.open_db(), Err(CoreError::Database(_))));
    }

    #[test]
    fn attachments_live_under_public_dir() {
        let core = CoreState::new("/tmp/x.db", "/srv/public");
        assert_eq!(
            core.attachments().uploads_dir(),
            PathBuf::from("/srv/public/uploads")
        );
    }
}
