use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable selecting the bridge log level when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "FRAMELINK_LOG";

/// Initialize tracing on stderr.
///
/// `RUST_LOG` wins when set. Otherwise `FRAMELINK_LOG` (debug, info, warn,
/// error) sets the level for the bridge crates. `LOG_FORMAT=json` switches to
/// JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = base_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());
        EnvFilter::new(filter_directives(level))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn base_level(value: Option<&str>) -> &'static str {
    match value {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

fn filter_directives(level: &str) -> String {
    format!("framelink={level},framelink_notebook={level},framelink_demo={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_defaults_to_info() {
        assert_eq!(base_level(None), "info");
        assert_eq!(base_level(Some("verbose")), "info");
        assert_eq!(base_level(Some("warning")), "warn");
        assert_eq!(base_level(Some("debug")), "debug");
    }

    #[test]
    fn directives_cover_bridge_crates() {
        let directives = filter_directives("debug");
        assert_eq!(
            directives,
            "framelink=debug,framelink_notebook=debug,framelink_demo=debug"
        );
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
