use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber: one fmt layer on stderr filtered by
/// `RUST_LOG` when set, otherwise by `default_filter`.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_filter)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .try_init()
        .context("logging: install subscriber")
}

fn build_filter(rust_log: Option<&str>, default_filter: &str) -> Result<EnvFilter> {
    let directives = rust_log
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default_filter);
    EnvFilter::try_new(directives)
        .with_context(|| format!("logging: invalid filter {directives:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins_over_config() {
        let filter = build_filter(Some("lemmy_cache=trace"), "warn").unwrap();
        assert_eq!(filter.to_string(), "lemmy_cache=trace");
    }

    #[test]
    fn blank_rust_log_falls_back() {
        let filter = build_filter(Some("  "), "info").unwrap();
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn invalid_directive_is_reported() {
        assert!(build_filter(None, "lemmy_cache=notalevel").is_err());
    }
}
