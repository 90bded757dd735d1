mod command_error;
mod del;
mod get;
mod registry;
mod set;

pub use command_error::CommandError;
pub use del::del;
pub use get::get;
pub use registry::{
    AccessMode, CommandHandler, CommandRegistry, CommandSpec, ReadHandler, WriteHandler,
};
pub use set::set;

/// Builds the table of commands served by the server.
pub fn command_table() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("get", CommandHandler::Read(get));
    registry.register("set", CommandHandler::Write(set));
    registry.register("del", CommandHandler::Write(del));

    registry
}
