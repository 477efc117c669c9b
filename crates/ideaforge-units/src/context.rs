use ideaforge_utils::error::UnitError;
use ideaforge_utils::types::{Task, TechStack, UnitName};

/// Everything one unit sees when it runs.
///
/// Built once per task from the immutable run input; units never see each
/// other's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitContext {
    pub user_idea: String,
    pub tech_stack: TechStack,
    pub goal: String,
    pub focus: String,
    pub reference_docs: String,
}

impl UnitContext {
    pub fn new(
        user_idea: impl Into<String>,
        tech_stack: TechStack,
        goal: impl Into<String>,
        focus: impl Into<String>,
    ) -> Self {
        Self {
            user_idea: user_idea.into(),
            tech_stack,
            goal: goal.into(),
            focus: focus.into(),
            reference_docs: String::new(),
        }
    }

    /// Context for `task` against the run input.
    pub fn for_task(user_idea: impl Into<String>, tech_stack: TechStack, task: &Task) -> Self {
        Self::new(user_idea, tech_stack, task.goal.clone(), task.focus.clone())
    }

    #[must_use]
    pub fn with_reference_docs(mut self, docs: impl Into<String>) -> Self {
        self.reference_docs = docs.into();
        self
    }

    /// Refuse to run on degraded input.
    ///
    /// # Errors
    ///
    /// `UnitError::InvalidInput` naming the first missing piece.
    pub fn validate(&self, unit: UnitName) -> Result<(), UnitError> {
        let reason = if self.user_idea.trim().is_empty() {
            Some("user idea is empty")
        } else if !self.tech_stack.is_present() {
            Some("tech stack is missing a framework or backend")
        } else if self.goal.trim().is_empty() {
            Some("task goal is empty")
        } else if self.focus.trim().is_empty() {
            Some("task focus is empty")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(UnitError::InvalidInput {
                unit,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}
