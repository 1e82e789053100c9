use clap::{ArgGroup, Parser};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[clap(group = ArgGroup::new("logging"))]
pub struct LoggingOpts {
    /// A level of verbosity, can be used multiple times
    #[arg(short, long, action = clap::ArgAction::Count, global(true))]
    pub verbose: u8,

    #[arg(skip = LevelFilter::WARN)]
    default_level: LevelFilter,
}

impl LoggingOpts {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => self.default_level,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn configure_logging(&self) {
        tracing_subscriber::fmt()
            .with_max_level(self.to_level_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
