//! # Profiling
//!
//! Mutation points log through `tracing` unconditionally. With the
//! `profiling` feature enabled, `flush_destroyed`, `undo` and `redo` also
//! open `info_span`s, and [`init_profiling`] installs a subscriber writing
//! JSON lines to a file.
//!
//! ```toml
//! [dependencies]
//! cog_core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! let _guard = cog_core::profiling::init_profiling("trace.json")?;
//!
//! let mut space = Space::new();
//! // edits, undo, redo...
//! ```
//!
//! Keep the returned guard alive until the end of `main`; dropping it
//! flushes the background writer. Filtering honours `RUST_LOG`
//! (defaults to `cog_core=trace`).

#[cfg(feature = "profiling")]
pub use enabled::init_profiling;

#[cfg(feature = "profiling")]
mod enabled {
    use std::fs::File;
    use std::path::Path;

    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    use crate::error::{CogError, Result};

    /// Install a global JSON subscriber writing to `path`
    pub fn init_profiling(path: impl AsRef<Path>) -> Result<WorkerGuard> {
        let file = File::create(path.as_ref())
            .map_err(|e| CogError::ConfigError(format!("cannot create trace file: {e}")))?;
        let (writer, guard) = tracing_appender::non_blocking(file);

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cog_core=trace"));
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(writer).with_ansi(false))
            .try_init()
            .map_err(|e| CogError::ConfigError(e.to_string()))?;
        Ok(guard)
    }
}
