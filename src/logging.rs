//! Tracing initialisation and helpers for keeping customer identifiers out of logs

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL` so operators can raise verbosity for a
/// single module without touching the service configuration.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},sqlx=warn,tower_http=info",
            config.level.to_lowercase()
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    // Tests and embedding binaries may have installed a subscriber already.
    if let Err(e) = result {
        eprintln!("tracing subscriber already initialised: {}", e);
    }
}

/// Mask a phone number, e-mail, meter or smartcard number for logging.
///
/// Keeps the first three and last two characters of plain identifiers and
/// the first character of an e-mail's local part.
pub fn mask_identifier(value: &str) -> String {
    if let Some((local, domain)) = value.split_once('@') {
        let first = local.chars().next().map(String::from).unwrap_or_default();
        return format!("{}***@{}", first, domain);
    }

    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 5 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 5), tail)
}
