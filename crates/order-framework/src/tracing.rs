//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide `tracing` subscriber.
//!
//! ## Configuration
//!
//! - **Levels** come from `RUST_LOG` and default to `info`.
//! - **Format** is either compact (development, spans inline, no module prefix)
//!   or JSON (one object per line, for log shippers).
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info cargo run
//!
//! # Show request payloads
//! RUST_LOG=debug cargo run
//!
//! # Only the store
//! RUST_LOG=order_authority::store=debug cargo run
//! ```
//!
//! ## Workflow Trace Example
//!
//! ```text
//! INFO Server started service="OrderHandler"
//! INFO order_processing:create_order: Items validated item_count=1
//! INFO order_processing:create_order: Order created order_id="0192..." total=19.98
//! WARN get_order: User enrichment unavailable order_id="0192..." error=...
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops, which keeps tests
/// that each set up tracing from fighting over the global default.
pub fn setup_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false); // entity fields carry the context, module paths are noise

    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
