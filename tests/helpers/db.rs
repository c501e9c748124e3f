use std::sync::Arc;

use permissions::authz::AuthorizationEngine;
use permissions::storage::DbTupleStore;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        // Create temporary SQLite database file
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        // Connect to database
        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        // Run migrations
        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn store(&self) -> Arc<DbTupleStore> {
        Arc::new(DbTupleStore::new(self.connection.clone()))
    }

    /// A fresh engine over whatever this database currently holds, as a restarted
    /// process would see it.
    pub async fn engine(&self, admins_csv: &str) -> AuthorizationEngine {
        AuthorizationEngine::init(self.store(), admins_csv)
            .await
            .expect("Failed to init engine")
    }
}
