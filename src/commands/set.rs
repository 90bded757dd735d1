use bytes::Bytes;

use crate::{
    commands::command_error::CommandError,
    key_value_store::{DataType, KeyValueStore},
    resp::RespValue,
};

/// Represents the parsed arguments for SET command
pub struct SetArguments {
    /// The key name to store the value under
    key: Bytes,
    /// The value to be stored under the given key
    value: Bytes,
}

impl SetArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let [key, value] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("set"));
        };

        // Arguments are slices of the connection's read buffer; stored
        // entries get their own allocation so they do not pin it.
        Ok(Self {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        })
    }
}

/// Handles the SET command, replacing any previous value.
pub fn set(store: &mut KeyValueStore, arguments: &[Bytes]) -> Result<RespValue, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    store.set(set_arguments.key, DataType::String(set_arguments.value));

    Ok(RespValue::SimpleString("OK".to_string()))
}
