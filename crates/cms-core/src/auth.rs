//! Admin users, permissions, and request authentication.
//!
//! Users are configured in [`Settings::users`](crate::settings::Settings) and
//! authenticate with a bearer token. Permissions use the
//! `"app_label.codename"` format (e.g. `"pages.add_page"`); superusers hold
//! every permission and inactive users hold none.
//!
//! [`admin_view`] is the middleware that guards every admin route. It resolves
//! the token to a [`User`] and stores it in the request extensions, where
//! handlers pick it up with the [`User`] extractor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::CmsError;
use crate::settings::UserSettings;

/// An authenticated admin user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The login name.
    pub username: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// Whether the account may use the admin.
    pub is_staff: bool,
    /// Whether the account holds every permission.
    pub is_superuser: bool,
    /// Explicit permissions in `"app_label.codename"` format.
    pub permissions: HashSet<String>,
}

impl User {
    /// Creates an active staff user without permissions.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            permissions: HashSet::new(),
        }
    }

    /// Creates an active superuser.
    pub fn superuser(username: impl Into<String>) -> Self {
        Self {
            is_superuser: true,
            ..Self::new(username)
        }
    }

    /// Adds permissions to this user.
    #[must_use]
    pub fn with_perms(mut self, perms: &[&str]) -> Self {
        self.permissions
            .extend(perms.iter().map(|p| (*p).to_string()));
        self
    }

    /// Checks if the user holds a permission.
    pub fn has_perm(&self, perm: &str) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_superuser || self.permissions.contains(perm)
    }

    /// Checks if the user holds any permission for the given app label.
    pub fn has_module_perms(&self, app_label: &str) -> bool {
        if !self.is_active {
            return false;
        }
        if self.is_superuser {
            return true;
        }
        let prefix = format!("{app_label}.");
        self.permissions.iter().any(|p| p.starts_with(&prefix))
    }
}

impl From<&UserSettings> for User {
    fn from(settings: &UserSettings) -> Self {
        Self {
            username: settings.username.clone(),
            is_active: settings.is_active,
            is_staff: settings.is_staff,
            is_superuser: settings.is_superuser,
            permissions: settings.permissions.iter().cloned().collect(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for User {
    type Rejection = CmsError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| CmsError::Unauthorized("Authentication credentials were not provided.".into()))
    }
}

/// Resolves bearer tokens to users.
#[derive(Debug, Default)]
pub struct UserStore {
    by_token: HashMap<String, User>,
}

impl UserStore {
    /// Builds a store from configured accounts.
    pub fn new(users: &[UserSettings]) -> Self {
        let mut store = Self::default();
        for settings in users {
            store.insert(settings.token.clone(), User::from(settings));
        }
        store
    }

    /// Adds or replaces the user for a token.
    pub fn insert(&mut self, token: impl Into<String>, user: User) {
        self.by_token.insert(token.into(), user);
    }

    /// Returns the user owning `token`, if any.
    pub fn authenticate(&self, token: &str) -> Option<&User> {
        self.by_token
            .iter()
            .find(|(candidate, _)| constant_time_eq(candidate.as_bytes(), token.as_bytes()))
            .map(|(_, user)| user)
    }

    /// Returns the number of configured users.
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Returns `true` if no users are configured.
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

/// Middleware guarding admin routes.
///
/// Missing or unknown tokens are rejected with 401; inactive or non-staff
/// users with 403.
pub async fn admin_view(
    State(users): State<Arc<UserStore>>,
    mut request: Request,
    next: Next,
) -> Result<Response, CmsError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| CmsError::Unauthorized("Authentication credentials were not provided.".into()))?;

    let user = users
        .authenticate(token)
        .cloned()
        .ok_or_else(|| CmsError::Unauthorized("Invalid token.".into()))?;

    if !user.is_active || !user.is_staff {
        tracing::warn!(username = %user.username, "non-staff user denied admin access");
        return Err(CmsError::PermissionDenied(
            "You are not allowed to access the admin site.".into(),
        ));
    }

    tracing::debug!(username = %user.username, path = %request.uri().path(), "admin request");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Compares two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
