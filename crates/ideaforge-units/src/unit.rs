//! The one generic generation unit, instantiated eight times from data.

use ideaforge_llm::{ApiRequest, RequestOptions, ResilientClient};
use ideaforge_prompt_template::{Bindings, TemplateCatalog, TemplateId, placeholders};
use ideaforge_utils::error::UnitError;
use ideaforge_utils::redaction::redact;
use ideaforge_utils::types::{DocumentType, UnitName};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::context::UnitContext;
use crate::documents::{
    ApiDesign, ComponentArchitecture, DatabaseSchema, MarkdownDoc, ProjectBrief, Roadmap,
    TechRationale, UserFlow, UserPersonas, render_as,
};
use crate::reference::NO_SPECIFIC_DOCS;

type Formatter = fn(&Value) -> Result<String, serde_json::Error>;

/// Per-unit parameters of [`GenerationUnit`].
#[derive(Clone, Copy)]
pub struct UnitSpec {
    pub unit: UnitName,
    /// Sampling temperature; lower for structured documents.
    pub temperature: f32,
    schema: fn() -> Value,
    format: Formatter,
}

impl UnitSpec {
    fn of<T: MarkdownDoc>(unit: UnitName, temperature: f32) -> Self {
        Self {
            unit,
            temperature,
            schema: T::schema,
            format: render_as::<T>,
        }
    }

    /// JSON Schema the model's answer must satisfy.
    #[must_use]
    pub fn schema(&self) -> Value {
        (self.schema)()
    }

    /// Deterministic JSON to markdown.
    ///
    /// # Errors
    ///
    /// The value does not have this unit's document shape.
    pub fn format(&self, value: &Value) -> Result<String, serde_json::Error> {
        (self.format)(value)
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        TemplateId::Unit(self.unit)
    }

    #[must_use]
    pub fn document(&self) -> DocumentType {
        self.unit.document()
    }
}

impl std::fmt::Debug for UnitSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitSpec")
            .field("unit", &self.unit)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

/// Parameters for `unit`.
#[must_use]
pub fn spec_for(unit: UnitName) -> UnitSpec {
    match unit {
        UnitName::ProjectBrief => UnitSpec::of::<ProjectBrief>(unit, 0.7),
        UnitName::Persona => UnitSpec::of::<UserPersonas>(unit, 0.7),
        UnitName::UserFlow => UnitSpec::of::<UserFlow>(unit, 0.5),
        UnitName::Schema => UnitSpec::of::<DatabaseSchema>(unit, 0.3),
        UnitName::ApiDesign => UnitSpec::of::<ApiDesign>(unit, 0.3),
        UnitName::ComponentArchitecture => UnitSpec::of::<ComponentArchitecture>(unit, 0.4),
        UnitName::TechRationale => UnitSpec::of::<TechRationale>(unit, 0.5),
        UnitName::Roadmap => UnitSpec::of::<Roadmap>(unit, 0.5),
    }
}

/// A runnable generation unit.
#[derive(Debug, Clone, Copy)]
pub struct GenerationUnit {
    spec: UnitSpec,
}

impl GenerationUnit {
    #[must_use]
    pub fn new(unit: UnitName) -> Self {
        Self {
            spec: spec_for(unit),
        }
    }

    #[must_use]
    pub fn name(&self) -> UnitName {
        self.spec.unit
    }

    #[must_use]
    pub fn spec(&self) -> &UnitSpec {
        &self.spec
    }

    /// True when `ctx` carries everything this unit needs.
    #[must_use]
    pub fn validate_input(&self, ctx: &UnitContext) -> bool {
        ctx.validate(self.spec.unit).is_ok()
    }

    /// Render this unit's prompt.
    ///
    /// # Errors
    ///
    /// `UnitError::Generation` when the template (possibly a user override)
    /// leaves placeholders unresolved.
    pub fn prompt(&self, catalog: &TemplateCatalog, ctx: &UnitContext) -> Result<String, UnitError> {
        let reference_docs = if ctx.reference_docs.trim().is_empty() {
            NO_SPECIFIC_DOCS
        } else {
            ctx.reference_docs.as_str()
        };
        let bindings = Bindings::new()
            .bind(placeholders::USER_IDEA, ctx.user_idea.trim())
            .bind_json(placeholders::TECH_STACK, &ctx.tech_stack)
            .bind(placeholders::GOAL, ctx.goal.trim())
            .bind(placeholders::FOCUS, ctx.focus.trim())
            .bind(placeholders::REFERENCE_DOCS, reference_docs)
            .bind_json(placeholders::OUTPUT_SCHEMA, &self.spec.schema());
        catalog
            .build(self.spec.template_id(), &bindings)
            .map_err(|err| self.failure(err.to_string()))
    }

    /// Generate this unit's markdown document.
    ///
    /// # Errors
    ///
    /// - `UnitError::InvalidInput` before any call when `ctx` is incomplete
    /// - `UnitError::Generation` when the prompt cannot be built, the call
    ///   fails or the answer does not have the document's shape
    pub async fn execute(
        &self,
        client: &ResilientClient,
        catalog: &TemplateCatalog,
        ctx: &UnitContext,
    ) -> Result<String, UnitError> {
        ctx.validate(self.spec.unit)?;
        let prompt = self.prompt(catalog, ctx)?;
        let started = Instant::now();

        let request = ApiRequest::new(self.spec.unit.as_str(), prompt).with_options(
            RequestOptions::default()
                .with_schema(self.spec.schema())
                .with_temperature(self.spec.temperature),
        );
        let response = client.execute(request).await.map_err(|err| {
            warn!(unit = %self.spec.unit, error = %redact(&err.to_string()), "Unit call failed");
            self.failure(err.to_string())
        })?;
        if response.used_fallback {
            info!(unit = %self.spec.unit, provider = %response.provider, "Unit served by fallback provider");
        }

        let value = response
            .into_json()
            .map_err(|err| self.failure(err.to_string()))?;
        let markdown = self
            .spec
            .format(&value)
            .map_err(|err| self.failure(format!("unexpected document shape: {err}")))?;

        debug!(
            unit = %self.spec.unit,
            duration_ms = started.elapsed().as_millis() as u64,
            bytes = markdown.len(),
            "Unit produced document"
        );
        Ok(markdown)
    }

    fn failure(&self, reason: String) -> UnitError {
        UnitError::Generation {
            unit: self.spec.unit,
            reason: redact(&reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_llm::CircuitBreaker;
    use ideaforge_llm::LlmError;
    use ideaforge_llm::ResilienceOptions;
    use ideaforge_llm::test_support::ScriptedBackend;
    use ideaforge_utils::types::TechStack;
    use std::sync::Arc;
    use std::time::Duration;

    const BRIEF: &str = r#"{"title": "Todo", "summary": "Track tasks.", "problemStatement": "Forgetting.",
        "solution": "A list.", "coreFeatures": [{"name": "Add", "description": "Create todos"}]}"#;

    fn ctx() -> UnitContext {
        UnitContext::new(
            "A simple todo app",
            TechStack::new("React", "Convex"),
            "Define the product",
            "MVP",
        )
    }

    fn client(backend: Arc<ScriptedBackend>) -> ResilientClient {
        ResilientClient::new(backend, Arc::new(CircuitBreaker::default())).with_options(
            ResilienceOptions {
                timeout: Duration::from_secs(5),
                retry_attempts: 1,
                backoff_base: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn test_every_unit_has_a_spec() {
        for unit in UnitName::all() {
            let spec = spec_for(unit);
            assert_eq!(spec.unit, unit);
            assert!((0.3..=0.7).contains(&spec.temperature));
            assert_eq!(spec.schema()["type"], "object");
            assert_eq!(spec.document().unit(), unit);
        }
    }

    #[test]
    fn test_structured_units_run_cooler() {
        assert!(spec_for(UnitName::Schema).temperature < spec_for(UnitName::ProjectBrief).temperature);
        assert!(spec_for(UnitName::ApiDesign).temperature < spec_for(UnitName::Persona).temperature);
    }

    #[test]
    fn test_prompt_binds_everything() {
        let unit = GenerationUnit::new(UnitName::Schema);
        let prompt = unit
            .prompt(&TemplateCatalog::builtin(), &ctx().with_reference_docs("use defineTable"))
            .unwrap();
        assert!(prompt.contains("A simple todo app"));
        assert!(prompt.contains("\"framework\": \"React\""));
        assert!(prompt.contains("Define the product"));
        assert!(prompt.contains("use defineTable"));
        assert!(prompt.contains("\"relationships\""));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_prompt_without_docs_uses_placeholder() {
        let unit = GenerationUnit::new(UnitName::Persona);
        let prompt = unit.prompt(&TemplateCatalog::builtin(), &ctx()).unwrap();
        assert!(prompt.contains(NO_SPECIFIC_DOCS));
    }

    #[test]
    fn test_override_with_unknown_placeholder_fails() {
        let catalog = TemplateCatalog::builtin()
            .with_override(TemplateId::Unit(UnitName::Roadmap), "Plan {{USER_IDEA}} by {{DEADLINE}}");
        match GenerationUnit::new(UnitName::Roadmap).prompt(&catalog, &ctx()) {
            Err(UnitError::Generation { unit, reason }) => {
                assert_eq!(unit, UnitName::Roadmap);
                assert!(reason.contains("DEADLINE"));
            }
            other => panic!("Expected Generation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_formats_markdown() {
        let backend = Arc::new(ScriptedBackend::new("primary").then_ok(BRIEF));
        let unit = GenerationUnit::new(UnitName::ProjectBrief);
        let md = unit
            .execute(&client(backend.clone()), &TemplateCatalog::builtin(), &ctx())
            .await
            .unwrap();
        assert!(md.starts_with("# Project Brief: Todo"));

        let inv = backend.last_invocation().unwrap();
        assert_eq!(inv.temperature(), Some(0.7));
        assert!(inv.response_format.is_json());
    }

    #[tokio::test]
    async fn test_invalid_input_never_calls_llm() {
        let backend = Arc::new(ScriptedBackend::new("primary").always_ok(BRIEF));
        let unit = GenerationUnit::new(UnitName::ProjectBrief);
        let bad = UnitContext { goal: String::new(), ..ctx() };
        assert!(!unit.validate_input(&bad));
        let result = unit
            .execute(&client(backend.clone()), &TemplateCatalog::builtin(), &bad)
            .await;
        assert!(matches!(result, Err(UnitError::InvalidInput { .. })));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_call_failure_is_typed() {
        let backend = Arc::new(
            ScriptedBackend::new("primary").always_err(LlmError::ProviderOutage("503".into())),
        );
        let unit = GenerationUnit::new(UnitName::UserFlow);
        let err = unit
            .execute(&client(backend), &TemplateCatalog::builtin(), &ctx())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("UserFlowAgent generation failed:"));
    }

    #[tokio::test]
    async fn test_schema_violation_is_generation_failure() {
        let backend = Arc::new(ScriptedBackend::new("primary").always_ok(r#"{"title": "only"}"#));
        let unit = GenerationUnit::new(UnitName::ProjectBrief);
        let result = unit
            .execute(&client(backend.clone()), &TemplateCatalog::builtin(), &ctx())
            .await;
        assert!(matches!(result, Err(UnitError::Generation { .. })));
        assert_eq!(backend.calls(), 1, "structural errors are not retried");
    }
}
