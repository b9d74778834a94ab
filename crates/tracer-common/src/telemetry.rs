use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', available: text, json")),
        }
    }
}

/// Initialize tracing for a process.
///
/// - `service_name`: identifies this component in the startup event
/// - `format`: human-readable lines or one JSON object per event
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Events go to stderr
/// so command output on stdout stays clean. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::debug!(service_name, ?format, "tracing initialized"),
        Err(err) => eprintln!("tracing already initialized for {service_name}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("TEXT".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_tracing("tracer-test", LogFormat::Text);
        init_tracing("tracer-test", LogFormat::Json);
    }
}
