use thiserror::Error;

use crate::resp::RespValue;

/// Per-request failures. Reported to the client; the connection stays open.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(&'static str),
}

impl CommandError {
    pub fn to_resp(&self) -> RespValue {
        RespValue::Error(format!("ERR {}", self))
    }
}
