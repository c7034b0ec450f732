//! Tracing subscriber setup for the relay binary.
//!
//! `RUST_LOG` replaces the default directives entirely when it is set and
//! parses; otherwise the relay logs its own crates at `info`.

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset, empty or invalid
pub const DEFAULT_DIRECTIVES: &str = "courierd=info,courier_core=info";

/// Builds the filter from a `RUST_LOG`-style value.
pub fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global fmt subscriber, reading `RUST_LOG`.
pub fn init() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directives.as_deref()))
        .init();
}
