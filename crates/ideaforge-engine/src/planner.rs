//! Turns the requested documents into an ordered list of tasks.
//!
//! The planning model proposes the tasks; its answer is checked against the
//! closed unit set and the requested documents. Anything unusable falls back
//! to the deterministic one-task-per-document plan, which needs no I/O and
//! cannot fail.

use ideaforge_llm::{ApiRequest, RequestOptions, ResilientClient};
use ideaforge_prompt_template::{Bindings, TemplateCatalog, TemplateId, placeholders};
use ideaforge_utils::error::PlanError;
use ideaforge_utils::redaction::redact;
use ideaforge_utils::types::{DocumentType, PlanSource, Task, TechStack, UnitName};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sampling temperature of the planning call.
pub const PLANNER_TEMPERATURE: f32 = 0.3;

/// Label of the planning call in progress events.
pub const PLANNER_LABEL: &str = "planner";

/// Tasks to execute, and where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTasks {
    pub tasks: Vec<Task>,
    pub source: PlanSource,
}

pub struct Planner {
    client: Arc<ResilientClient>,
    catalog: Arc<TemplateCatalog>,
    disabled: BTreeSet<UnitName>,
}

impl Planner {
    pub fn new(client: Arc<ResilientClient>, catalog: Arc<TemplateCatalog>) -> Self {
        Self {
            client,
            catalog,
            disabled: BTreeSet::new(),
        }
    }

    /// Units that must never be planned.
    #[must_use]
    pub fn with_disabled_units(mut self, disabled: BTreeSet<UnitName>) -> Self {
        self.disabled = disabled;
        self
    }

    /// Plan the run.
    ///
    /// Never fails: a failed or invalid model plan is replaced by
    /// [`fallback_plan`] and reported through [`PlanSource::Fallback`].
    /// Documents whose unit is disabled are dropped before planning.
    pub async fn plan(
        &self,
        user_idea: &str,
        tech_stack: &TechStack,
        requested: &[DocumentType],
    ) -> PlannedTasks {
        let active = self.active_documents(requested);
        if active.is_empty() {
            return PlannedTasks {
                tasks: Vec::new(),
                source: PlanSource::Fallback {
                    reason: "no enabled unit covers the requested documents".to_string(),
                },
            };
        }

        match self.plan_with_model(user_idea, tech_stack, &active).await {
            Ok(tasks) => {
                info!(tasks = tasks.len(), "Using model plan");
                PlannedTasks {
                    tasks,
                    source: PlanSource::Model,
                }
            }
            Err(err) => {
                let reason = redact(&err.to_string());
                warn!(reason = %reason, "Planning failed, using fallback plan");
                PlannedTasks {
                    tasks: fallback_plan(&active),
                    source: PlanSource::Fallback { reason },
                }
            }
        }
    }

    fn active_documents(&self, requested: &[DocumentType]) -> Vec<DocumentType> {
        let mut seen = BTreeSet::new();
        let mut active = Vec::new();
        for &doc in requested {
            if !seen.insert(doc) {
                continue;
            }
            if self.disabled.contains(&doc.unit()) {
                warn!(unit = %doc.unit(), document = %doc, "Unit is disabled, skipping document");
                continue;
            }
            active.push(doc);
        }
        active
    }

    async fn plan_with_model(
        &self,
        user_idea: &str,
        tech_stack: &TechStack,
        requested: &[DocumentType],
    ) -> Result<Vec<Task>, PlanError> {
        let prompt = self.prompt(user_idea, tech_stack, requested)?;
        let request = ApiRequest::new(PLANNER_LABEL, prompt).with_options(
            RequestOptions::default()
                .with_schema(plan_schema())
                .with_temperature(PLANNER_TEMPERATURE),
        );
        let value = self.client.execute(request).await?.into_json()?;
        validate_plan(&value, requested)
    }

    /// Render the planning prompt.
    ///
    /// # Errors
    ///
    /// `PlanError::Template` when an override leaves placeholders unbound.
    pub fn prompt(
        &self,
        user_idea: &str,
        tech_stack: &TechStack,
        requested: &[DocumentType],
    ) -> Result<String, PlanError> {
        let mut documents = String::new();
        for doc in requested {
            documents.push_str(&format!("- {} ({})\n", doc.as_str(), doc.title()));
        }
        let mut units = String::new();
        for unit in UnitName::all().filter(|u| !self.disabled.contains(u)) {
            units.push_str(&format!("- {} -> {}\n", unit.as_str(), unit.document().as_str()));
        }
        let bindings = Bindings::new()
            .bind(placeholders::USER_IDEA, user_idea.trim())
            .bind_json(placeholders::TECH_STACK, tech_stack)
            .bind(placeholders::REQUESTED_DOCUMENTS, documents.trim_end())
            .bind(placeholders::AVAILABLE_UNITS, units.trim_end());
        Ok(self.catalog.build(TemplateId::Planner, &bindings)?)
    }
}

/// JSON Schema of a plan: an array of tasks, optionally wrapped as
/// `{"tasks": [...]}` for providers whose JSON mode requires an object.
#[must_use]
pub fn plan_schema() -> Value {
    let tasks = json!({
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "required": ["unit", "goal", "focus"],
            "properties": {
                "unit": {"type": "string"},
                "goal": {"type": "string"},
                "focus": {"type": "string"}
            }
        }
    });
    json!({
        "anyOf": [
            tasks,
            {
                "type": "object",
                "required": ["tasks"],
                "properties": {"tasks": tasks}
            }
        ]
    })
}

/// Check a model plan against the closed unit set and the requested
/// documents.
///
/// Requested documents with no task are only logged; the bundle will simply
/// lack them.
///
/// # Errors
///
/// - `PlanError::Malformed` when the value is not a task array
/// - `PlanError::EmptyPlan` for an empty array
/// - `PlanError::UnknownUnit` for a unit outside the known set
/// - `PlanError::UnrequestedDocument` for a unit whose document was not asked for
/// - `PlanError::DuplicateUnit` when a unit is planned twice
/// - `PlanError::InvalidTask` for a task without a unit, goal or focus
pub fn validate_plan(value: &Value, requested: &[DocumentType]) -> Result<Vec<Task>, PlanError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("tasks") {
            Some(Value::Array(items)) => items,
            _ => return Err(PlanError::Malformed("object without a 'tasks' array".to_string())),
        },
        other => {
            return Err(PlanError::Malformed(format!(
                "expected a task array, got {}",
                json_kind(other)
            )));
        }
    };
    if items.is_empty() {
        return Err(PlanError::EmptyPlan);
    }

    let mut tasks = Vec::with_capacity(items.len());
    let mut planned = BTreeSet::new();
    for (index, item) in items.iter().enumerate() {
        let field = |name: &str| {
            item.get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| PlanError::InvalidTask {
                    index,
                    reason: format!("missing or empty '{name}'"),
                })
        };
        let name = field("unit")?;
        let unit: UnitName = name
            .parse()
            .map_err(|_| PlanError::UnknownUnit(name.to_string()))?;
        let document = unit.document();
        if !requested.contains(&document) {
            return Err(PlanError::UnrequestedDocument { unit, document });
        }
        if !planned.insert(unit) {
            return Err(PlanError::DuplicateUnit(unit));
        }
        tasks.push(Task::new(unit, field("goal")?, field("focus")?));
    }

    for doc in requested {
        if !planned.contains(&doc.unit()) {
            warn!(document = %doc, "Model plan does not cover requested document");
        }
    }
    debug!(tasks = tasks.len(), "Model plan validated");
    Ok(tasks)
}

/// One task per requested document, through the fixed document to unit
/// table, in request order.
#[must_use]
pub fn fallback_plan(requested: &[DocumentType]) -> Vec<Task> {
    let mut seen = BTreeSet::new();
    requested
        .iter()
        .filter(|doc| seen.insert(**doc))
        .map(|doc| {
            Task::new(
                doc.unit(),
                format!("Write the {} for this product", doc.title().to_lowercase()),
                "The product idea as described and the chosen technology stack",
            )
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_llm::test_support::ScriptedBackend;
    use ideaforge_llm::{CircuitBreaker, LlmError, ResilienceOptions};
    use ideaforge_utils::test_support::sample_stack;
    use std::time::Duration;

    fn planner(backend: Arc<ScriptedBackend>) -> Planner {
        let client = ResilientClient::new(backend, Arc::new(CircuitBreaker::default()))
            .with_options(ResilienceOptions {
                timeout: Duration::from_secs(5),
                retry_attempts: 1,
                backoff_base: Duration::from_millis(1),
            });
        Planner::new(Arc::new(client), Arc::new(TemplateCatalog::builtin()))
    }

    #[test]
    fn test_validate_accepts_good_plan() {
        let value = json!([
            {"unit": "SchemaAgent", "goal": "Model todos", "focus": "Convex tables"},
            {"unit": "ProjectBriefAgent", "goal": "Pitch it", "focus": "MVP"}
        ]);
        let requested = [DocumentType::ProjectBrief, DocumentType::DatabaseSchema];
        let tasks = validate_plan(&value, &requested).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].unit, UnitName::Schema);
        assert_eq!(tasks[1].goal, "Pitch it");
    }

    #[test]
    fn test_validate_accepts_wrapped_plan() {
        let value = json!({"tasks": [{"unit": "RoadmapAgent", "goal": "g", "focus": "f"}]});
        let tasks = validate_plan(&value, &[DocumentType::DevelopmentRoadmap]).unwrap();
        assert_eq!(tasks[0].unit, UnitName::Roadmap);
    }

    #[test]
    fn test_validate_rejects_unknown_unit() {
        let value = json!([{"unit": "FooAgent", "goal": "g", "focus": "f"}]);
        match validate_plan(&value, &[DocumentType::ProjectBrief]) {
            Err(PlanError::UnknownUnit(name)) => assert_eq!(name, "FooAgent"),
            other => panic!("Expected UnknownUnit, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_unrequested_and_duplicate() {
        let unrequested = json!([{"unit": "SchemaAgent", "goal": "g", "focus": "f"}]);
        assert!(matches!(
            validate_plan(&unrequested, &[DocumentType::ProjectBrief]),
            Err(PlanError::UnrequestedDocument { .. })
        ));

        let duplicate = json!([
            {"unit": "SchemaAgent", "goal": "g", "focus": "f"},
            {"unit": "SchemaAgent", "goal": "g2", "focus": "f2"}
        ]);
        assert!(matches!(
            validate_plan(&duplicate, &[DocumentType::DatabaseSchema]),
            Err(PlanError::DuplicateUnit(UnitName::Schema))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_goal_and_bad_shapes() {
        let blank = json!([{"unit": "SchemaAgent", "goal": "  ", "focus": "f"}]);
        assert!(matches!(
            validate_plan(&blank, &[DocumentType::DatabaseSchema]),
            Err(PlanError::InvalidTask { index: 0, .. })
        ));
        assert!(matches!(validate_plan(&json!([]), &[DocumentType::ApiDesign]), Err(PlanError::EmptyPlan)));
        assert!(matches!(validate_plan(&json!("x"), &[DocumentType::ApiDesign]), Err(PlanError::Malformed(_))));
    }

    #[test]
    fn test_partial_coverage_is_not_fatal() {
        let value = json!([{"unit": "SchemaAgent", "goal": "g", "focus": "f"}]);
        let requested = [DocumentType::DatabaseSchema, DocumentType::ApiDesign];
        assert_eq!(validate_plan(&value, &requested).unwrap().len(), 1);
    }

    #[test]
    fn test_fallback_follows_request_order() {
        let tasks = fallback_plan(&[
            DocumentType::DevelopmentRoadmap,
            DocumentType::ProjectBrief,
            DocumentType::DevelopmentRoadmap,
        ]);
        let units: Vec<_> = tasks.iter().map(|t| t.unit).collect();
        assert_eq!(units, vec![UnitName::Roadmap, UnitName::ProjectBrief]);
        assert!(tasks.iter().all(|t| !t.goal.is_empty() && !t.focus.is_empty()));
    }

    #[tokio::test]
    async fn test_model_plan_used_when_valid() {
        let backend = Arc::new(ScriptedBackend::new("primary").then_ok(
            r#"```json
[{"unit": "ProjectBriefAgent", "goal": "Pitch a todo app", "focus": "Simplicity"}]
```"#,
        ));
        let planned = planner(backend.clone())
            .plan("A simple todo app", &sample_stack(), &[DocumentType::ProjectBrief])
            .await;
        assert_eq!(planned.source, PlanSource::Model);
        assert_eq!(planned.tasks[0].goal, "Pitch a todo app");

        let inv = backend.last_invocation().unwrap();
        assert_eq!(inv.temperature(), Some(PLANNER_TEMPERATURE));
        assert!(inv.messages[0].content.contains("projectBrief (Project Brief)"));
    }

    #[tokio::test]
    async fn test_unknown_unit_falls_back() {
        let backend = Arc::new(
            ScriptedBackend::new("primary")
                .then_ok(r#"[{"unit": "FooAgent", "goal": "g", "focus": "f"}]"#),
        );
        let planned = planner(backend)
            .plan("A simple todo app", &sample_stack(), &[DocumentType::ProjectBrief])
            .await;
        assert!(planned.source.is_fallback());
        assert_eq!(planned.tasks.len(), 1);
        assert_eq!(planned.tasks[0].unit, UnitName::ProjectBrief);
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let backend = Arc::new(
            ScriptedBackend::new("primary").always_err(LlmError::ProviderOutage("502".into())),
        );
        let planned = planner(backend)
            .plan("idea", &sample_stack(), &[DocumentType::ApiDesign, DocumentType::UserFlow])
            .await;
        match planned.source {
            PlanSource::Fallback { reason } => assert!(reason.contains("502")),
            other => panic!("Expected fallback, got {:?}", other),
        }
        assert_eq!(planned.tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_units_are_never_planned() {
        let backend = Arc::new(ScriptedBackend::new("primary").always_err(LlmError::Transport("down".into())));
        let planned = planner(backend.clone())
            .with_disabled_units(BTreeSet::from([UnitName::Persona]))
            .plan("idea", &sample_stack(), &[DocumentType::UserPersonas, DocumentType::UserFlow])
            .await;
        let units: Vec<_> = planned.tasks.iter().map(|t| t.unit).collect();
        assert_eq!(units, vec![UnitName::UserFlow]);
        assert!(!backend.prompts()[0].contains("PersonaAgent"));
    }

    #[tokio::test]
    async fn test_everything_disabled_skips_the_call() {
        let backend = Arc::new(ScriptedBackend::new("primary"));
        let planned = planner(backend.clone())
            .with_disabled_units(BTreeSet::from([UnitName::Roadmap]))
            .plan("idea", &sample_stack(), &[DocumentType::DevelopmentRoadmap])
            .await;
        assert!(planned.tasks.is_empty());
        assert_eq!(backend.calls(), 0);
    }
}
