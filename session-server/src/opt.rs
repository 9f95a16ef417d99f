use clap::Parser;
use clio::Input;

/// Session timer service
#[derive(Debug, Parser)]
#[command(name = "session-server", about = "Time-boxed session timer service")]
pub struct Opt {
    /// Config file path
    #[arg(short, long, value_parser, default_value = "config.toml")]
    pub config: Input,
}
