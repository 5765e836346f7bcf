use crate::api;
use crate::auth::SessionService;
use crate::bootstrap::{self, BootstrapResources};
use crate::config::ForumConfig;
use crate::database::Database;
use crate::users::UserService;
use anyhow::Result;

/// Bootstraps the backend once and hands out the handles each entrypoint
/// (HTTP server, admin subcommands) needs.
pub struct ForumNode {
    config: ForumConfig,
    bootstrap: BootstrapResources,
}

impl ForumNode {
    pub fn start(config: ForumConfig) -> Result<Self> {
        let bootstrap = bootstrap::initialize(&config)?;

        tracing::info!(
            directories_created = ?bootstrap.directories_created,
            database_initialized = bootstrap.database_initialized,
            db_path = %config.paths.db_path.display(),
            "academiq node initialized"
        );

        Ok(Self { config, bootstrap })
    }

    /// Runs the REST API server until shutdown.
    pub async fn run_http_server(&self) -> Result<()> {
        api::serve_http(self.config.clone(), self.database()).await
    }

    /// Returns a clone of the database handle.
    pub fn database(&self) -> Database {
        self.bootstrap.database.clone()
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.database())
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(self.database())
    }
}
