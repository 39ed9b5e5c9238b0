//! Process setup shared by the binaries.

use std::{env, path::Path};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Compact subscriber filtered by `RUST_LOG`, or by `default_directive` when
/// the variable is unset, blank or unparsable.
pub fn init_tracing(default_directive: &str) {
    let from_env = env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(from_env.as_deref(), default_directive))
        .with_target(false)
        .compact()
        .init();
}

fn env_filter(from_env: Option<&str>, default_directive: &str) -> EnvFilter {
    from_env
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive))
}

/// Loads `path`, or the nearest `.env` when `None`. A missing file is logged,
/// not fatal: secrets may already be in the environment.
pub fn load_env_file(path: Option<&Path>) -> bool {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|_| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => {
            info!(path = %path.display(), "environment file loaded");
            true
        }
        Err(err) => {
            warn!(error = %err, "no .env file loaded");
            false
        }
    }
}
