//! Command line configuration.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";
pub const DEFAULT_AOF_FILENAME: &str = "appendonly.aof";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// When the append-only file is forced to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FsyncPolicy {
    /// Leave it to the operating system.
    #[value(name = "no")]
    No,
    /// From a background task once per second.
    #[default]
    #[value(name = "everysec")]
    EverySec,
    /// After every write to the file.
    #[value(name = "always")]
    Always,
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "redis-aof", version, about = "In-memory key-value server with an append-only file")]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Append-only file replayed at startup and appended to afterwards
    #[arg(long, default_value = DEFAULT_AOF_FILENAME)]
    pub appendfilename: PathBuf,

    /// How often the append-only file is synced to disk
    #[arg(long, value_enum, default_value_t = FsyncPolicy::EverySec)]
    pub appendfsync: FsyncPolicy,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Config {
    /// Parses flags from an argv-style iterator whose first item is the
    /// program name.
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            appendfilename: PathBuf::from(DEFAULT_AOF_FILENAME),
            appendfsync: FsyncPolicy::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}
