//! Logger setup for the binaries.

use log::{LevelFilter, debug};

/// Level selected by `--verbose` count and `--quiet`.
///
/// Quiet runs only log errors; otherwise the level starts at `warn` and each
/// `--verbose` raises it one step.
#[must_use]
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs `env_logger` writing to stderr.
///
/// `RUST_LOG`, when set, takes precedence over the flag-derived level.
/// Returns `false` when a logger was already installed, in which case the
/// existing one is kept.
pub fn init_logging(verbosity: u8, quiet: bool) -> bool {
    match env_logger::Builder::new()
        .filter_level(level_for(verbosity, quiet))
        .format_target(false)
        .parse_default_env()
        .try_init()
    {
        Ok(()) => true,
        Err(err) => {
            debug!("keeping the existing logger: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false, LevelFilter::Warn)]
    #[case(1, false, LevelFilter::Info)]
    #[case(2, false, LevelFilter::Debug)]
    #[case(7, false, LevelFilter::Trace)]
    #[case(2, true, LevelFilter::Error)]
    fn maps_flags_to_level(#[case] verbosity: u8, #[case] quiet: bool, #[case] expected: LevelFilter) {
        assert_eq!(level_for(verbosity, quiet), expected);
    }

    #[test]
    fn second_initialisation_keeps_the_existing_logger() {
        init_logging(0, false);
        assert!(!init_logging(3, false));
    }
}
