//! Tracing subscriber setup.
//!
//! Library crates only emit events; the binary decides where they go.
//! Everything is written to stderr so stdout stays reserved for entry
//! listings.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map the `-v` count to a level: 0 = INFO, 1 = DEBUG, 2+ = TRACE.
fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` is honoured; the verbosity flag raises the `nodezip*`
/// targets on top of it. With `json` set, each event is one JSON line:
///
/// ```json
/// {"timestamp":"...","level":"INFO","fields":{"message":"installing packages","command":"npm ci"},"target":"nodezip_core::install"}
/// ```
pub fn init(verbosity: u8, json: bool) {
    let level = level_for(verbosity);

    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Ok(directive) = format!("nodezip={level}").parse() {
        filter = filter.add_directive(directive);
    }

    let registry = tracing_subscriber::registry().with(filter);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), Level::INFO);
        assert_eq!(level_for(1), Level::DEBUG);
        assert_eq!(level_for(2), Level::TRACE);
        assert_eq!(level_for(7), Level::TRACE);
    }
}
