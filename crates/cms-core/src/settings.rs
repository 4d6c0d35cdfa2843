//! Settings for cms-rs.
//!
//! [`Settings`] holds the server, storage, media, admin, logging and user
//! configuration with sensible defaults. See
//! [`settings_loader`](crate::settings_loader) for loading from TOML and the
//! environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The SQLite file path, or `:memory:`.
    pub name: String,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "cms.sqlite3".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

/// An admin account.
///
/// Accounts authenticate with a bearer token. Permissions use the
/// `"app_label.codename"` format, e.g. `"pages.change_page"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    /// The login name.
    pub username: String,
    /// The bearer token presented in the `Authorization` header.
    pub token: String,
    /// Whether the account is active.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Whether the account may use the admin at all.
    #[serde(default = "default_true")]
    pub is_staff: bool,
    /// Whether the account implicitly holds every permission.
    #[serde(default)]
    pub is_superuser: bool,
    /// Explicit permissions.
    #[serde(default)]
    pub permissions: Vec<String>,
}

const fn default_true() -> bool {
    true
}

/// The complete set of settings.
///
/// # Examples
///
/// ```
/// use cms_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.admin_url_prefix, "/admin");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// The socket address the server binds to.
    pub bind: String,

    // ── Database ─────────────────────────────────────────────────────

    /// The database configuration.
    pub database: DatabaseSettings,

    // ── Media ────────────────────────────────────────────────────────

    /// URL prefix for uploaded media files.
    pub media_url: String,
    /// Directory holding uploaded media files.
    pub media_root: PathBuf,

    // ── Admin ────────────────────────────────────────────────────────

    /// The URL prefix the admin site is mounted under.
    pub admin_url_prefix: String,
    /// The admin site title.
    pub site_name: String,
    /// Admin accounts.
    pub users: Vec<UserSettings>,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter (e.g. "info", "cms_pages=debug").
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            bind: "127.0.0.1:8000".to_string(),
            database: DatabaseSettings::default(),
            media_url: "/media/".to_string(),
            media_root: PathBuf::from("media"),
            admin_url_prefix: "/admin".to_string(),
            site_name: "Site administration".to_string(),
            users: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.bind, "127.0.0.1:8000");
        assert_eq!(s.media_url, "/media/");
        assert_eq!(s.media_root, PathBuf::from("media"));
        assert_eq!(s.admin_url_prefix, "/admin");
        assert_eq!(s.log_level, "info");
        assert!(s.users.is_empty());
    }

    #[test]
    fn test_default_database() {
        let db = Settings::default().database;
        assert_eq!(db.name, "cms.sqlite3");
        assert_eq!(db.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_user_settings_defaults_from_json() {
        let user: UserSettings =
            serde_json::from_str(r#"{"username": "editor", "token": "t"}"#).unwrap();
        assert!(user.is_active);
        assert!(user.is_staff);
        assert!(!user.is_superuser);
        assert!(user.permissions.is_empty());
    }
}
