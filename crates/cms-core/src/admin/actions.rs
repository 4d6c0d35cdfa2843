//! Admin actions for bulk operations on selected objects.
//!
//! An [`ActionRegistry`] is usually assembled per request, because some
//! actions are derived from data (one action per category, for example).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{CmsError, CmsResult};

/// The result of executing an admin action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// A message describing the outcome.
    pub message: String,
    /// The number of objects affected by the action.
    pub affected_count: usize,
}

impl ActionResult {
    /// Creates an action result.
    pub fn new(message: impl Into<String>, affected_count: usize) -> Self {
        Self {
            message: message.into(),
            affected_count,
        }
    }
}

/// The public description of an available action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescription {
    /// The unique action key.
    pub name: String,
    /// The label shown to the user.
    pub description: String,
}

/// An action executed on the selected objects of a changelist.
#[async_trait]
pub trait AdminAction: Send + Sync {
    /// Returns the unique identifier for this action.
    fn name(&self) -> &str;

    /// Returns a human-readable description of what this action does.
    fn description(&self) -> &str;

    /// Executes the action on the objects with the given primary keys.
    async fn execute(&self, db: &Database, selected_ids: &[i64]) -> CmsResult<ActionResult>;
}

/// An ordered set of actions keyed by name.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn AdminAction>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action.
    ///
    /// Names are unique: if an action with the same name is already present
    /// the new one is rejected and `false` is returned.
    pub fn register(&mut self, action: Box<dyn AdminAction>) -> bool {
        if self.actions.iter().any(|a| a.name() == action.name()) {
            tracing::warn!(
                action = action.name(),
                description = action.description(),
                "duplicate admin action name, keeping the first registration"
            );
            return false;
        }
        self.actions.push(action);
        true
    }

    /// Returns the names of all registered actions.
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Returns all registered actions as descriptions.
    pub fn action_descriptions(&self) -> Vec<ActionDescription> {
        self.actions
            .iter()
            .map(|a| ActionDescription {
                name: a.name().to_string(),
                description: a.description().to_string(),
            })
            .collect()
    }

    /// Finds and executes an action by name.
    pub async fn execute(
        &self,
        action_name: &str,
        db: &Database,
        selected_ids: &[i64],
    ) -> CmsResult<ActionResult> {
        let action = self
            .actions
            .iter()
            .find(|a| a.name() == action_name)
            .ok_or_else(|| CmsError::NotFound(format!("Action '{action_name}' not found")))?;

        if selected_ids.is_empty() {
            return Err(CmsError::BadRequest(
                "Items must be selected in order to perform actions on them.".into(),
            ));
        }

        tracing::info!(action = action_name, count = selected_ids.len(), "executing admin action");
        action.execute(db, selected_ids).await
    }

    /// Returns the number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.action_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountAction(&'static str);

    #[async_trait]
    impl AdminAction for CountAction {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Count selected"
        }

        async fn execute(&self, _db: &Database, selected_ids: &[i64]) -> CmsResult<ActionResult> {
            Ok(ActionResult::new("counted", selected_ids.len()))
        }
    }

    #[test]
    fn test_register_rejects_duplicate_names() {
        let mut registry = ActionRegistry::new();
        assert!(registry.register(Box::new(CountAction("count"))));
        assert!(!registry.register(Box::new(CountAction("count"))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_action_descriptions() {
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(CountAction("a")));
        registry.register(Box::new(CountAction("b")));
        let names: Vec<String> = registry
            .action_descriptions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_execute() {
        let db = Database::memory().unwrap();
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(CountAction("count")));
        let result = registry.execute("count", &db, &[1, 2, 3]).await.unwrap();
        assert_eq!(result.affected_count, 3);
    }

    #[tokio::test]
    async fn test_execute_unknown_action() {
        let db = Database::memory().unwrap();
        let registry = ActionRegistry::new();
        let err = registry.execute("missing", &db, &[1]).await.unwrap_err();
        assert!(matches!(err, CmsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_execute_without_selection() {
        let db = Database::memory().unwrap();
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(CountAction("count")));
        let err = registry.execute("count", &db, &[]).await.unwrap_err();
        assert!(matches!(err, CmsError::BadRequest(_)));
    }
}
