//! tracing subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Install a JSON subscriber. `RUST_LOG` wins over `default_level` when set.
pub fn init_tracing(default_level: &str) -> InitResult {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;
    Ok(())
}

/// Plain output captured by the test harness. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing_test() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_reports_error() {
        init_tracing_test();
        assert!(init_tracing("info").is_err());
        tracing::info!(component = "logging", "subscriber already installed");
    }
}
