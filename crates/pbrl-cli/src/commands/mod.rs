//! CLI command modules

pub mod config;
pub mod inspect;
pub mod judge;
pub mod seed;

use anyhow::{Context, Result};

/// Run synchronous engine work (file I/O, seeding) off the async runtime
pub async fn blocking<T, F>(what: String, f: F) -> Result<T>
where
    F: FnOnce() -> pbrl_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .with_context(|| format!("{what}: task panicked"))?;
    result.context(what)
}
