use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

const QUIET_TARGETS: &[&str] = &["aws_smithy_runtime", "aws_config", "hyper"];

/// Maps the configured log level onto a tracing level name.
pub fn level_name(raw: Option<&str>) -> &'static str {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("debug") => "debug",
        Some("warn") | Some("warning") => "warn",
        Some("error") | Some("fatal") | Some("panic") => "error",
        _ => "info",
    }
}

pub fn filter_directives(raw: Option<&str>) -> String {
    let mut directives = level_name(raw).to_string();
    for target in QUIET_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push_str("=warn");
    }
    directives
}

/// Installs JSON logging to stdout. Safe to call more than once; only the
/// first call takes effect.
pub fn init_tracing() {
    let level = std::env::var(ENV_LOG_LEVEL).ok();
    let directives = filter_directives(level.as_deref());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(std::io::stdout)
                .with_filter(filter),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_levels_map_directly() {
        assert_eq!(level_name(Some("debug")), "debug");
        assert_eq!(level_name(Some("WARN")), "warn");
        assert_eq!(level_name(Some(" error ")), "error");
    }

    #[test]
    fn fatal_and_panic_map_to_error() {
        assert_eq!(level_name(Some("fatal")), "error");
        assert_eq!(level_name(Some("panic")), "error");
    }

    #[test]
    fn anything_else_is_info() {
        assert_eq!(level_name(None), "info");
        assert_eq!(level_name(Some("verbose")), "info");
    }

    #[test]
    fn sdk_targets_are_capped_at_warn() {
        assert_eq!(
            filter_directives(Some("debug")),
            "debug,aws_smithy_runtime=warn,aws_config=warn,hyper=warn"
        );
    }
}
