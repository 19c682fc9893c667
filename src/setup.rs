//! Logging setup, `RUST_LOG` overrides the default level
use env_logger::Builder;
use log::LevelFilter;
pub use log::{debug, info, trace, warn};

/// Install the logger, panics if a logger is already installed
pub fn init() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Install a test logger, can be called many times
pub fn init_test() {
    let _ = Builder::new()
        .filter(Some("impala_compiler"), LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .try_init();
}
