use env_logger::{Builder, Env};
use log::LevelFilter;

/// Overrides the default filter, e.g. `REBRAND_LOG=apk_rebrand=trace`.
pub const LOG_ENV: &str = "REBRAND_LOG";
pub const LOG_STYLE_ENV: &str = "REBRAND_LOG_STYLE";

/// Stderr logger filtered by `REBRAND_LOG` (default `info`). `verbose` forces `debug`.
pub fn builder(verbose: bool) -> Builder {
    let env = Env::new()
        .filter_or(LOG_ENV, "info")
        .write_style(LOG_STYLE_ENV);

    let mut builder = Builder::from_env(env);
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder
}

/// Installs the logger. Only the first call in a process has any effect.
pub fn init(verbose: bool) {
    let _ = builder(verbose).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Metadata};

    #[test]
    fn should_lower_level_when_verbose() {
        let logger = builder(true).build();
        assert_eq!(logger.filter(), LevelFilter::Debug);
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(logger.enabled(&debug));
    }

    #[test]
    fn should_default_to_info() {
        if std::env::var_os(LOG_ENV).is_some() {
            return;
        }
        let logger = builder(false).build();
        assert_eq!(logger.filter(), LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).build();
        assert!(!logger.enabled(&debug));
    }
}
