use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::admin_token::{AdminGate, INSECURE_DEFAULT_ADMIN_KEY};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "raffled",
    about = "Raffle registry server",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server (default).
    Run,

    /// Create the data file with an empty raffle collection if it is missing.
    Init,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        global = true,
        env = "RAFFLED_BIND",
        value_name = "ADDR",
        default_value = "0.0.0.0:3000"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        global = true,
        env = "RAFFLED_DATA_FILE",
        value_name = "PATH",
        default_value = "./data/raffles.json"
    )]
    pub data_file: PathBuf,

    #[arg(
        long,
        global = true,
        env = "RAFFLED_ADMIN_KEY",
        value_name = "KEY",
        default_value = INSECURE_DEFAULT_ADMIN_KEY,
        hide_env_values = true,
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub admin_key: String,
}

impl Config {
    pub fn admin_gate(&self) -> AdminGate {
        AdminGate::new(self.admin_key.clone())
    }
}
