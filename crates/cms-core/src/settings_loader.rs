//! Loading [`Settings`] from TOML and the environment.
//!
//! A file only needs the keys it changes: its tables are merged over the
//! defaults, nested tables included. `CMS_*` variables are applied last.
//!
//! | Variable | Setting |
//! |---|---|
//! | `CMS_DEBUG` | `debug` |
//! | `CMS_BIND` | `bind` |
//! | `CMS_DATABASE` | `database.name` |
//! | `CMS_LOG_LEVEL` | `log_level` |
//! | `CMS_MEDIA_ROOT` | `media_root` |
//! | `CMS_MEDIA_URL` | `media_url` |
//! | `CMS_ADMIN_PREFIX` | `admin_url_prefix` |

use std::path::Path;

use toml::Table;

use crate::error::{CmsError, CmsResult};
use crate::settings::Settings;

fn config_error(context: &str, err: impl std::fmt::Display) -> CmsError {
    CmsError::ConfigurationError(format!("{context}: {err}"))
}

/// Parses settings from TOML text.
pub fn from_toml_str(source: &str) -> CmsResult<Settings> {
    let overrides: Table = toml::from_str(source).map_err(|e| config_error("Invalid settings TOML", e))?;
    let mut merged = match toml::Value::try_from(Settings::default()) {
        Ok(toml::Value::Table(table)) => table,
        Ok(_) => Table::new(),
        Err(e) => return Err(config_error("Cannot encode default settings", e)),
    };
    merge_tables(&mut merged, overrides);
    toml::Value::Table(merged)
        .try_into()
        .map_err(|e| config_error("Invalid settings", e))
}

/// Reads a settings file.
pub fn from_toml_file(path: impl AsRef<Path>) -> CmsResult<Settings> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|e| config_error(&format!("Cannot read settings file {}", path.display()), e))?;
    from_toml_str(&source)
}

/// Reads a settings file, then applies `CMS_*` variables.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> CmsResult<Settings> {
    from_toml_file(path).map(with_env)
}

/// The defaults with `CMS_*` variables applied.
pub fn from_env() -> Settings {
    with_env(Settings::default())
}

fn with_env(mut settings: Settings) -> Settings {
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `CMS_*` variables.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(flag) = var("CMS_DEBUG") {
        settings.debug = ["1", "true", "yes", "on"].contains(&flag.trim().to_ascii_lowercase().as_str());
    }

    if let Some(val) = var("CMS_BIND") {
        settings.bind = val;
    }

    if let Some(val) = var("CMS_DATABASE") {
        settings.database.name = val;
    }

    if let Some(val) = var("CMS_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = var("CMS_MEDIA_ROOT") {
        settings.media_root = val.into();
    }

    if let Some(val) = var("CMS_MEDIA_URL") {
        settings.media_url = val;
    }

    if let Some(val) = var("CMS_ADMIN_PREFIX") {
        settings.admin_url_prefix = val;
    }
}

/// Merges `overrides` into `base`. Tables merge key by key, anything else
/// replaces the base value.
fn merge_tables(base: &mut Table, overrides: Table) {
    for (key, value) in overrides {
        let toml::Value::Table(table) = value else {
            base.insert(key, value);
            continue;
        };
        if let Some(toml::Value::Table(inner)) = base.get_mut(&key) {
            merge_tables(inner, table);
            continue;
        }
        base.insert(key, toml::Value::Table(table));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_file_overrides_top_level_keys() {
        let toml = r#"
            debug = false
            bind = "0.0.0.0:9000"
            site_name = "Example"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.site_name, "Example");
        // Defaults preserved
        assert_eq!(settings.media_url, "/media/");
    }

    #[test]
    fn test_from_toml_str_nested_database_keeps_defaults() {
        let toml = r#"
            [database]
            name = "/var/lib/cms/site.db"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.database.name, "/var/lib/cms/site.db");
        assert_eq!(settings.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_toml_str_users() {
        let toml = r#"
            [[users]]
            username = "admin"
            token = "secret"
            is_superuser = true

            [[users]]
            username = "editor"
            token = "editor-token"
            permissions = ["pages.change_page", "pages.view_page"]
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert_eq!(settings.users.len(), 2);
        assert!(settings.users[0].is_superuser);
        assert!(settings.users[1].is_staff);
        assert_eq!(settings.users[1].permissions.len(), 2);
    }

    #[test]
    fn test_empty_file_keeps_defaults() {
        let settings = from_toml_str("").unwrap();
        assert!(settings.debug);
        assert_eq!(settings.admin_url_prefix, "/admin");
    }

    #[test]
    fn test_malformed_toml() {
        let result = from_toml_str("debug = ");
        assert!(matches!(result, Err(CmsError::ConfigurationError(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();
        let settings = from_toml_file(file.path()).unwrap();
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = from_toml_file("/nonexistent/cms.toml");
        assert!(matches!(result, Err(CmsError::ConfigurationError(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CMS_DEBUG", "false"),
            ("CMS_DATABASE", ":memory:"),
            ("CMS_MEDIA_ROOT", "/srv/media"),
            ("CMS_ADMIN_PREFIX", "/manage"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_overrides(&mut settings, |key| vars.get(key).map(|v| (*v).to_string()));
        assert!(!settings.debug);
        assert_eq!(settings.database.name, ":memory:");
        assert_eq!(settings.media_root, std::path::PathBuf::from("/srv/media"));
        assert_eq!(settings.admin_url_prefix, "/manage");
        assert_eq!(settings.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_merge_tables_is_deep() {
        let mut base: Table = toml::from_str("d = 3\n[a]\nb = 1\nc = 2\n").unwrap();
        merge_tables(&mut base, toml::from_str("[a]\nb = 10\n").unwrap());
        let expected: Table = toml::from_str("d = 3\n[a]\nb = 10\nc = 2\n").unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_unknown_debug_values_are_false() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, |_| Some("maybe".to_string()));
        assert!(!settings.debug);
    }
}
