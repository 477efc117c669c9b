//! Folding task results into the plan, and the final assembly call that
//! turns the plan into the document bundle.

use ideaforge_llm::{ApiRequest, RequestOptions, ResilientClient};
use ideaforge_prompt_template::{Bindings, TemplateCatalog, TemplateId, placeholders};
use ideaforge_utils::error::AssemblyError;
use ideaforge_utils::types::{DevelopmentPlan, DocumentBundle, DocumentType, TaskResult};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Label of the final assembly call in progress events.
pub const ASSEMBLY_LABEL: &str = "assembly";

pub const ASSEMBLY_TEMPERATURE: f32 = 0.2;

/// Record every successful result into `plan` under its unit's document.
///
/// # Errors
///
/// `AssemblyError::DuplicateResult` when two successful results target the
/// same document, which the planner never produces.
pub fn aggregate(mut plan: DevelopmentPlan, results: &[TaskResult]) -> Result<DevelopmentPlan, AssemblyError> {
    for result in results {
        let Some(output) = result.output() else {
            continue;
        };
        let unit = result.unit();
        plan.record(unit.document(), output)
            .map_err(|_| AssemblyError::DuplicateResult(unit))?;
    }
    debug!(documents = plan.document_count(), "Aggregated task results");
    Ok(plan)
}

/// Requested documents that have content in `plan`, deduplicated, in
/// request order. These are the only files a bundle may contain.
#[must_use]
pub fn expected_documents(plan: &DevelopmentPlan, requested: &[DocumentType]) -> Vec<DocumentType> {
    let mut seen = BTreeSet::new();
    requested
        .iter()
        .copied()
        .filter(|doc| seen.insert(*doc) && plan.has(*doc))
        .collect()
}

/// One line of the `{{EXPECTED_FILES}}` list.
pub(crate) fn expected_file_line(doc: DocumentType) -> String {
    format!("- {} <- {}", doc.filename(), doc.as_str())
}

/// JSON Schema of the assembly answer: filename to markdown, either flat
/// or wrapped as `{"files": {...}}`.
#[must_use]
pub fn bundle_schema() -> Value {
    let files = json!({
        "type": "object",
        "additionalProperties": {"type": "string"}
    });
    json!({
        "anyOf": [
            files,
            {
                "type": "object",
                "required": ["files"],
                "properties": {"files": files},
                "additionalProperties": false
            }
        ]
    })
}

pub struct Assembler {
    client: Arc<ResilientClient>,
    catalog: Arc<TemplateCatalog>,
}

impl Assembler {
    pub fn new(client: Arc<ResilientClient>, catalog: Arc<TemplateCatalog>) -> Self {
        Self { client, catalog }
    }

    /// Render the assembly prompt.
    ///
    /// # Errors
    ///
    /// `AssemblyError::Template` when an override leaves placeholders unbound.
    pub fn prompt(&self, plan: &DevelopmentPlan, requested: &[DocumentType]) -> Result<String, AssemblyError> {
        let mut documents = String::new();
        for doc in requested {
            documents.push_str(&format!("- {} ({})\n", doc.as_str(), doc.title()));
        }
        let mut files = String::new();
        for doc in expected_documents(plan, requested) {
            files.push_str(&expected_file_line(doc));
            files.push('\n');
        }
        let bindings = Bindings::new()
            .bind(placeholders::PLAN, plan.to_pretty_json())
            .bind(placeholders::REQUESTED_DOCUMENTS, documents.trim_end())
            .bind(placeholders::EXPECTED_FILES, files.trim_end());
        Ok(self.catalog.build(TemplateId::Assembly, &bindings)?)
    }

    /// Produce the final bundle.
    ///
    /// With nothing to assemble no call is made and the bundle is empty.
    ///
    /// # Errors
    ///
    /// Any failure of the assembly call or an unreadable answer. There is
    /// no partial substitute, so callers treat this as fatal.
    pub async fn assemble(
        &self,
        plan: &DevelopmentPlan,
        requested: &[DocumentType],
    ) -> Result<DocumentBundle, AssemblyError> {
        let expected = expected_documents(plan, requested);
        if expected.is_empty() {
            warn!("Nothing to assemble");
            return Ok(DocumentBundle::new());
        }

        let prompt = self.prompt(plan, requested)?;
        let request = ApiRequest::new(ASSEMBLY_LABEL, prompt).with_options(
            RequestOptions::default()
                .with_schema(bundle_schema())
                .with_temperature(ASSEMBLY_TEMPERATURE),
        );
        let value = self.client.execute(request).await?.into_json()?;
        let bundle = bundle_from_response(&value, plan, &expected)?;
        info!(files = bundle.len(), expected = expected.len(), "Bundle assembled");
        Ok(bundle)
    }
}

/// Keep only the expected files from the assembly answer.
///
/// Unexpected filenames are dropped. An expected file the answer left out
/// or left blank is taken from the unit's own draft in `plan`; a document
/// with no draft never appears.
///
/// # Errors
///
/// `AssemblyError::Malformed` when the answer is not a JSON object.
pub fn bundle_from_response(
    value: &Value,
    plan: &DevelopmentPlan,
    expected: &[DocumentType],
) -> Result<DocumentBundle, AssemblyError> {
    let files = as_file_map(value)?;

    for name in files.keys() {
        let allowed = DocumentType::from_filename(name).is_some_and(|doc| expected.contains(&doc));
        if !allowed {
            warn!(filename = %name, "Dropping unexpected file from assembly answer");
        }
    }

    let mut bundle = DocumentBundle::new();
    for &doc in expected {
        let assembled = files
            .get(doc.filename())
            .and_then(Value::as_str)
            .filter(|body| !body.trim().is_empty());
        match (assembled, plan.get(doc).filter(|d| !d.trim().is_empty())) {
            (Some(body), _) => bundle.insert(doc.filename(), body.trim()),
            (None, Some(draft)) => {
                warn!(filename = doc.filename(), "Assembly omitted file, using the unit draft");
                bundle.insert(doc.filename(), draft.trim());
            }
            (None, None) => {}
        }
    }
    Ok(bundle)
}

fn as_file_map(value: &Value) -> Result<&Map<String, Value>, AssemblyError> {
    let Value::Object(map) = value else {
        return Err(AssemblyError::Malformed(format!(
            "expected an object, got {}",
            excerpt(value)
        )));
    };
    // Some models wrap the answer as {"files": {...}}.
    if map.len() == 1
        && let Some(Value::Object(inner)) = map.get("files")
    {
        return Ok(inner);
    }
    Ok(map)
}

fn excerpt(value: &Value) -> String {
    value.to_string().chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_llm::test_support::ScriptedBackend;
    use ideaforge_llm::{CircuitBreaker, LlmError, ResilienceOptions};
    use ideaforge_utils::test_support::sample_stack;
    use ideaforge_utils::types::UnitName;
    use std::time::Duration;

    fn plan_with(docs: &[(DocumentType, &str)]) -> DevelopmentPlan {
        let mut plan = DevelopmentPlan::new("A simple todo app", sample_stack());
        for (doc, text) in docs {
            plan.record(*doc, *text).unwrap();
        }
        plan
    }

    fn assembler(backend: Arc<ScriptedBackend>) -> Assembler {
        let client = ResilientClient::new(backend, Arc::new(CircuitBreaker::default()))
            .with_options(ResilienceOptions {
                timeout: Duration::from_secs(5),
                retry_attempts: 1,
                backoff_base: Duration::from_millis(1),
            });
        Assembler::new(Arc::new(client), Arc::new(TemplateCatalog::builtin()))
    }

    #[test]
    fn test_aggregate_records_only_successes() {
        let results = vec![
            TaskResult::succeeded(UnitName::ProjectBrief, "# Brief", Duration::ZERO),
            TaskResult::failed(UnitName::Schema, "SchemaAgent generation failed: x", Duration::ZERO),
            TaskResult::succeeded(UnitName::Roadmap, "# Roadmap", Duration::ZERO),
        ];
        let plan = aggregate(plan_with(&[]), &results).unwrap();
        assert_eq!(plan.get(DocumentType::ProjectBrief), Some("# Brief"));
        assert_eq!(plan.get(DocumentType::DevelopmentRoadmap), Some("# Roadmap"));
        assert!(!plan.has(DocumentType::DatabaseSchema));
    }

    #[test]
    fn test_aggregate_rejects_duplicates() {
        let results = vec![
            TaskResult::succeeded(UnitName::Persona, "a", Duration::ZERO),
            TaskResult::succeeded(UnitName::Persona, "b", Duration::ZERO),
        ];
        assert!(matches!(
            aggregate(plan_with(&[]), &results),
            Err(AssemblyError::DuplicateResult(UnitName::Persona))
        ));
    }

    #[test]
    fn test_expected_documents_need_content() {
        let plan = plan_with(&[(DocumentType::ProjectBrief, "# Brief"), (DocumentType::UserFlow, "  ")]);
        let expected = expected_documents(
            &plan,
            &[DocumentType::UserFlow, DocumentType::ProjectBrief, DocumentType::ProjectBrief],
        );
        assert_eq!(expected, vec![DocumentType::ProjectBrief]);
    }

    #[test]
    fn test_bundle_drops_unexpected_and_fills_omitted() {
        let plan = plan_with(&[
            (DocumentType::ProjectBrief, "# Brief draft"),
            (DocumentType::ApiDesign, "# API draft"),
        ]);
        let expected = [DocumentType::ProjectBrief, DocumentType::ApiDesign];
        let answer = json!({
            "Project_Brief.md": "# Project Brief\n\nPolished.",
            "Database_Schema.md": "# Invented",
            "notes.txt": "hi"
        });
        let bundle = bundle_from_response(&answer, &plan, &expected).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle.get("Project_Brief.md"), Some("# Project Brief\n\nPolished."));
        assert_eq!(bundle.get("API_Design.md"), Some("# API draft"));
        assert!(!bundle.contains("Database_Schema.md"));
    }

    #[test]
    fn test_bundle_accepts_wrapped_answer() {
        let plan = plan_with(&[(DocumentType::UserFlow, "# Flow")]);
        let answer = json!({"files": {"User_Flow.md": "# User Flow"}});
        let bundle = bundle_from_response(&answer, &plan, &[DocumentType::UserFlow]).unwrap();
        assert_eq!(bundle.get("User_Flow.md"), Some("# User Flow"));
    }

    #[test]
    fn test_non_object_answer_is_malformed() {
        let plan = plan_with(&[(DocumentType::UserFlow, "# Flow")]);
        assert!(matches!(
            bundle_from_response(&json!(["User_Flow.md"]), &plan, &[DocumentType::UserFlow]),
            Err(AssemblyError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompt_lists_only_documents_with_content() {
        let plan = plan_with(&[(DocumentType::ProjectBrief, "# Brief")]);
        let prompt = assembler(Arc::new(ScriptedBackend::new("p")))
            .prompt(&plan, &[DocumentType::ProjectBrief, DocumentType::DatabaseSchema])
            .unwrap();
        assert!(prompt.contains(&expected_file_line(DocumentType::ProjectBrief)));
        assert!(!prompt.contains(&expected_file_line(DocumentType::DatabaseSchema)));
        assert!(prompt.contains("\"projectBrief\": \"# Brief\""));
    }

    #[tokio::test]
    async fn test_assemble_calls_model_once() {
        let backend = Arc::new(
            ScriptedBackend::new("p").then_ok(r##"{"Project_Brief.md": "# Project Brief: Todo"}"##),
        );
        let plan = plan_with(&[(DocumentType::ProjectBrief, "# Brief")]);
        let bundle = assembler(backend.clone())
            .assemble(&plan, &[DocumentType::ProjectBrief])
            .await
            .unwrap();
        assert_eq!(bundle.get("Project_Brief.md"), Some("# Project Brief: Todo"));
        assert_eq!(backend.calls(), 1);
        assert_eq!(backend.last_invocation().unwrap().label, ASSEMBLY_LABEL);
    }

    #[tokio::test]
    async fn test_assemble_accepts_wrapped_answer() {
        let backend = Arc::new(
            ScriptedBackend::new("p").then_ok(r##"{"files": {"User_Flow.md": "# User Flow"}}"##),
        );
        let plan = plan_with(&[(DocumentType::UserFlow, "# Flow")]);
        let bundle = assembler(backend)
            .assemble(&plan, &[DocumentType::UserFlow])
            .await
            .unwrap();
        assert_eq!(bundle.get("User_Flow.md"), Some("# User Flow"));
    }

    #[tokio::test]
    async fn test_assemble_keeps_code_blocks_in_documents() {
        let api = "# API Design\n\n```json\n{\"id\": \"string\"}\n```";
        let answer = json!({"API_Design.md": api}).to_string();
        let plan = plan_with(&[(DocumentType::ApiDesign, api)]);

        for text in [answer.clone(), format!("```json\n{answer}\n```")] {
            let backend = Arc::new(ScriptedBackend::new("p").then_ok(text));
            let bundle = assembler(backend)
                .assemble(&plan, &[DocumentType::ApiDesign])
                .await
                .unwrap();
            assert_eq!(bundle.get("API_Design.md"), Some(api));
        }
    }

    #[tokio::test]
    async fn test_assembly_failure_is_an_error() {
        let backend = Arc::new(ScriptedBackend::new("p").always_ok("I cannot do that."));
        let plan = plan_with(&[(DocumentType::ProjectBrief, "# Brief")]);
        let result = assembler(backend).assemble(&plan, &[DocumentType::ProjectBrief]).await;
        assert!(matches!(result, Err(AssemblyError::Llm(LlmError::InvalidJson(_)))));
    }

    #[tokio::test]
    async fn test_nothing_to_assemble_makes_no_call() {
        let backend = Arc::new(ScriptedBackend::new("p"));
        let bundle = assembler(backend.clone())
            .assemble(&plan_with(&[]), &[DocumentType::ProjectBrief])
            .await
            .unwrap();
        assert!(bundle.is_empty());
        assert_eq!(backend.calls(), 0);
    }
}
