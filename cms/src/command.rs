//! Management command framework.
//!
//! A [`ManagementCommand`] names a subcommand, declares its arguments and
//! handles a parsed invocation. The [`CommandRegistry`] builds the clap CLI
//! from the registered commands and dispatches to them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use cms_core::{CmsError, CmsResult, Settings};

/// A management command invoked through the `cms` binary.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// The subcommand name.
    fn name(&self) -> &'static str;

    /// A short help description.
    fn help(&self) -> &'static str;

    /// Adds arguments to the subcommand. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Runs the command.
    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> CmsResult<()>;
}

/// The registered management commands, keyed by name.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn ManagementCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command, replacing one with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        self.commands.insert(command.name(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Command names in sorted order.
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the top-level CLI with a global `--settings <path>` option.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("cms")
            .about("cms-rs management utility")
            .subcommand_required(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .global(true)
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Path to a TOML settings file"),
            );
        for command in self.commands.values() {
            let sub = clap::Command::new(command.name()).about(command.help());
            app = app.subcommand(command.add_arguments(sub));
        }
        app
    }

    /// Dispatches to the subcommand selected in `matches`.
    pub async fn execute(&self, matches: &clap::ArgMatches, settings: &Settings) -> CmsResult<()> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| CmsError::ConfigurationError("No subcommand specified".to_string()))?;
        let command = self
            .get(name)
            .ok_or_else(|| CmsError::ConfigurationError(format!("Unknown command: {name}")))?;
        tracing::debug!(command = name, "running management command");
        command.handle(sub_matches, settings).await
    }
}

/// Loads settings from `--settings` if given, then applies `CMS_*`
/// environment overrides.
pub fn load_settings(matches: &clap::ArgMatches) -> CmsResult<Settings> {
    match matches.get_one::<PathBuf>("settings") {
        Some(path) => cms_core::settings_loader::from_toml_file_with_env(path),
        None => Ok(cms_core::settings_loader::from_env()),
    }
}
