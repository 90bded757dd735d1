use bytes::Bytes;

use crate::{commands::command_error::CommandError, key_value_store::KeyValueStore, resp::RespValue};

pub struct DelArguments<'a> {
    keys: &'a [Bytes],
}

impl<'a> DelArguments<'a> {
    pub fn parse(arguments: &'a [Bytes]) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("del"));
        }

        Ok(Self { keys: arguments })
    }
}

/// Handles the DEL command.
///
/// Replies with the number of keys that existed and were removed.
pub fn del(store: &mut KeyValueStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let del_arguments = DelArguments::parse(arguments)?;

    let removed = del_arguments
        .keys
        .iter()
        .filter(|key| store.delete(key).is_some())
        .count();

    Ok(RespValue::Integer(removed as i64))
}
