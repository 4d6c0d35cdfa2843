//! The admin site: model registration, per-model options and bulk actions.

pub mod actions;
pub mod options;
pub mod site;

pub use actions::{ActionDescription, ActionRegistry, ActionResult, AdminAction};
pub use options::{Fieldset, ModelAdmin, ModelOptions};
pub use site::AdminSite;
