use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::{
    commands::command_error::CommandError, key_value_store::KeyValueStore, resp::RespValue,
};

pub type ReadHandler = fn(&KeyValueStore, &[Bytes]) -> Result<RespValue, CommandError>;
pub type WriteHandler = fn(&mut KeyValueStore, &[Bytes]) -> Result<RespValue, CommandError>;

/// How a command touches the keyspace, and therefore which lock it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// A command implementation. Read handlers only ever see a shared
/// reference to the store.
#[derive(Clone, Copy)]
pub enum CommandHandler {
    Read(ReadHandler),
    Write(WriteHandler),
}

#[derive(Clone, Copy)]
pub struct CommandSpec {
    name: &'static str,
    handler: CommandHandler,
}

impl CommandSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn access_mode(&self) -> AccessMode {
        match self.handler {
            CommandHandler::Read(_) => AccessMode::Read,
            CommandHandler::Write(_) => AccessMode::Write,
        }
    }

    pub fn handler(&self) -> CommandHandler {
        self.handler
    }

    /// Runs the command against a store the caller owns exclusively.
    ///
    /// Used by replay, where no lock is needed.
    pub fn apply(
        &self,
        store: &mut KeyValueStore,
        arguments: &[Bytes],
    ) -> Result<RespValue, CommandError> {
        match self.handler {
            CommandHandler::Read(handler) => handler(store, arguments),
            CommandHandler::Write(handler) => handler(store, arguments),
        }
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("access_mode", &self.access_mode())
            .finish()
    }
}

/// Command name to implementation table.
///
/// Filled once at startup and only read afterwards, so connections share it
/// without synchronization.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`. Names are matched case-insensitively.
    pub fn register(&mut self, name: &'static str, handler: CommandHandler) {
        self.commands
            .insert(name.to_ascii_lowercase(), CommandSpec { name, handler });
    }

    /// Finds the command named by the first request argument, ignoring case.
    pub fn lookup(&self, name: &[u8]) -> Option<&CommandSpec> {
        let name = std::str::from_utf8(name).ok()?.to_ascii_lowercase();
        self.commands.get(&name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
