//! Slashstep Server - Main Entry Point
//!
//! Applies migrations, installs the built-in action catalog, and grants the
//! configured bootstrap admin.

use anyhow::Result;
use tracing::info;

use slashstep_server::slashstepql::TableKeyRegistry;
use slashstep_server::{actions, config, db, observability};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Slashstep Server"
    );

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let registry = TableKeyRegistry::builtin();
    let builtin_actions = actions::ensure_builtin_actions(&db_pool).await?;

    if let Some(user_id) = config.bootstrap_admin_user_id {
        actions::grant_bootstrap_admin(&db_pool, &registry, user_id, &builtin_actions).await?;
    }

    db_pool.close().await;
    info!("Bootstrap complete");

    Ok(())
}
