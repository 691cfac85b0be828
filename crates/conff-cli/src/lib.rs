// crates/conff-cli/src/lib.rs

pub mod options;
pub mod pipeline;

pub use options::{parse_assignment, Args, ConfigError, FileConfig, Options, OutputFormat};
pub use pipeline::{render, run, CliError};

/// `env_logger` driven by `RUST_LOG`, raised by each `-v`.
pub fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        2 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    let _ = builder.try_init();
}
