//! The `check` command: validates the configuration before serving.

use std::collections::HashSet;

use async_trait::async_trait;
use cms_core::settings::UserSettings;
use cms_core::{CmsError, CmsResult, Settings};

use crate::command::ManagementCommand;

pub struct CheckCommand;

/// One finding of [`run_checks`].
#[derive(Debug, Clone)]
pub struct CheckMessage {
    pub level: CheckLevel,
    pub msg: String,
    /// How to resolve the issue.
    pub hint: Option<String>,
    /// A stable identifier, e.g. "admin.E001".
    pub id: String,
}

impl CheckMessage {
    fn new(level: CheckLevel, id: &str, msg: impl Into<String>, hint: Option<&str>) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: hint.map(str::to_string),
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Inspects the settings for misconfigurations.
pub fn run_checks(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if !settings.admin_url_prefix.starts_with('/') {
        messages.push(CheckMessage::new(
            CheckLevel::Error,
            "admin.E001",
            format!("admin_url_prefix '{}' is not an absolute path", settings.admin_url_prefix),
            Some("Start the prefix with '/', e.g. \"/admin\""),
        ));
    }

    let media_prefix = settings.media_url.trim_end_matches('/');
    if media_prefix.is_empty() && settings.media_url.starts_with('/') {
        messages.push(CheckMessage::new(
            CheckLevel::Error,
            "media.E002",
            "media_url cannot be the site root",
            Some("Serve uploads below a prefix such as \"/media/\""),
        ));
    } else if !media_prefix.starts_with('/') {
        messages.push(CheckMessage::new(
            CheckLevel::Error,
            "media.E001",
            format!("media_url '{}' is not an absolute path", settings.media_url),
            Some("Start media_url with '/', e.g. \"/media/\""),
        ));
    }

    if settings.users.is_empty() {
        messages.push(CheckMessage::new(
            CheckLevel::Warning,
            "auth.W001",
            "No admin users are configured",
            Some("Add a [[users]] table with a username and token"),
        ));
    }

    let mut tokens = HashSet::new();
    for user in &settings.users {
        if !tokens.insert(user.token.as_str()) {
            messages.push(CheckMessage::new(
                CheckLevel::Error,
                "auth.E001",
                format!("User '{}' shares its token with another user", user.username),
                Some("Give every user a distinct token"),
            ));
        }
        if is_locked_out(user) {
            messages.push(CheckMessage::new(
                CheckLevel::Warning,
                "auth.W002",
                format!("User '{}' cannot sign in to the admin", user.username),
                Some("Set is_active and is_staff to true, or remove the user"),
            ));
        }
    }

    messages
}

const fn is_locked_out(user: &UserSettings) -> bool {
    !user.is_active || !user.is_staff
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Check the configuration for problems"
    }

    async fn handle(&self, _matches: &clap::ArgMatches, settings: &Settings) -> CmsResult<()> {
        let messages = run_checks(settings);
        if messages.is_empty() {
            tracing::info!("System check identified no issues");
            return Ok(());
        }

        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        for msg in &messages {
            let hint = msg.hint.as_ref().map_or(String::new(), |h| format!("\n\tHINT: {h}"));
            tracing::warn!("{} ({}): {}{}", msg.level, msg.id, msg.msg, hint);
        }
        tracing::info!(
            "System check identified {} issue(s) ({} error(s))",
            messages.len(),
            errors
        );

        if errors > 0 {
            return Err(CmsError::ConfigurationError(format!(
                "System check found {errors} error(s)"
            )));
        }
        Ok(())
    }
}
