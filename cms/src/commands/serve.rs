//! The `serve` command: runs the HTTP server.

use async_trait::async_trait;
use cms_core::{CmsError, CmsResult, Settings};

use crate::command::ManagementCommand;

pub struct ServeCommand;

#[async_trait]
impl ManagementCommand for ServeCommand {
    fn name(&self) -> &'static str {
        "serve"
    }

    fn help(&self) -> &'static str {
        "Run the admin server"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("bind")
                .long("bind")
                .help("Address to bind to, overriding the settings"),
        )
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> CmsResult<()> {
        let bind = matches
            .get_one::<String>("bind")
            .map_or(settings.bind.as_str(), String::as_str);
        let app = crate::app::build_app(settings).await?;
        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .map_err(|e| CmsError::ConfigurationError(format!("Cannot bind to {bind}: {e}")))?;

        tracing::info!(
            "Serving the admin at http://{bind}{}/ (debug={})",
            settings.admin_url_prefix.trim_end_matches('/'),
            settings.debug
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
