//! Built-in management commands.

pub mod check;
pub mod migrate;
pub mod serve;

pub use check::CheckCommand;
pub use migrate::MigrateCommand;
pub use serve::ServeCommand;

use crate::command::CommandRegistry;

/// A registry holding every built-in command.
pub fn default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(Box::new(CheckCommand));
    registry.register(Box::new(MigrateCommand));
    registry.register(Box::new(ServeCommand));
    registry
}
