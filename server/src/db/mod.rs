//! Database Layer
//!
//! `PostgreSQL` connection pool, migrations, and binding of compiled filter
//! parameters.

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{Arguments, Encode, PgPool, Postgres, Type};
use tracing::info;

use crate::config::Config;
use crate::slashstepql::{CompileOptions, FilterParameter, FilterValue};

/// Page size used by list queries when the filter has no `limit`.
pub const DEFAULT_LIST_LIMIT: i64 = 1000;

/// Page size bounds for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default_limit: i64,
    pub maximum_limit: Option<i64>,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIST_LIMIT,
            maximum_limit: None,
        }
    }
}

impl ListLimits {
    /// Compile options for a paginated list.
    #[must_use]
    pub const fn compile_options(self) -> CompileOptions {
        CompileOptions {
            default_limit: Some(self.default_limit),
            maximum_limit: self.maximum_limit,
            ignore_limit: false,
            ignore_offset: false,
        }
    }
}

/// Create `PostgreSQL` connection pool with health configuration.
///
/// Each store operation takes one connection for one statement and returns it
/// when the statement finishes, on success or failure.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(config.database_min_connections)
        .max_connections(config.database_max_connections)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(&config.database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Append one value to a positional argument list.
pub fn push_argument<T>(arguments: &mut PgArguments, value: T) -> Result<(), sqlx::Error>
where
    T: for<'q> Encode<'q, Postgres> + Type<Postgres> + Send + 'static,
{
    arguments.add(value).map_err(sqlx::Error::Encode)
}

/// Build the argument list for a compiled filter's `$1..$n` placeholders.
///
/// Numbers and booleans are bound as `float8` and `bool`. String values are
/// handed to `bind_string` with their key so the caller can bind the column's
/// real type (UUID, enum, or text).
pub fn filter_arguments<E, F>(
    parameters: &[FilterParameter],
    mut bind_string: F,
) -> Result<PgArguments, E>
where
    E: From<sqlx::Error>,
    F: FnMut(&mut PgArguments, &str, &str) -> Result<(), E>,
{
    let mut arguments = PgArguments::default();

    for parameter in parameters {
        match &parameter.value {
            FilterValue::String(value) => bind_string(&mut arguments, &parameter.key, value)?,
            FilterValue::Number(value) => push_argument(&mut arguments, *value)?,
            FilterValue::Boolean(value) => push_argument(&mut arguments, *value)?,
        }
    }

    Ok(arguments)
}
