use bytes::Bytes;

use crate::{
    commands::command_error::CommandError,
    key_value_store::{DataType, KeyValueStore},
    resp::RespValue,
};

/// Represents the parsed arguments for GET command
pub struct GetArguments {
    /// The key name to retrieve from the store
    key: Bytes,
}

impl GetArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let [key] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("get"));
        };

        Ok(Self { key: key.clone() })
    }
}

/// Handles the GET command.
///
/// # Returns
///
/// * `Ok(RespValue::BulkString)` - The value stored under the key
/// * `Ok(RespValue::NullBulkString)` - If the key does not exist
/// * `Err(CommandError::WrongNumberOfArguments)` - If not given exactly one key
pub fn get(store: &KeyValueStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    match store.get(&get_arguments.key) {
        Some(DataType::String(value)) => Ok(RespValue::BulkString(value.clone())),
        None => Ok(RespValue::NullBulkString),
    }
}
