//! The `migrate` command: creates the database tables.

use async_trait::async_trait;
use cms_core::{CmsResult, Database, Settings};

use crate::command::ManagementCommand;

pub struct MigrateCommand;

#[async_trait]
impl ManagementCommand for MigrateCommand {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn help(&self) -> &'static str {
        "Create the database tables"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> CmsResult<()> {
        let db = Database::from_settings(&settings.database)?;
        crate::app::migrate(&db).await?;
        tracing::info!(database = %settings.database.name, "database is up to date");
        Ok(())
    }
}
