//! Scripted whole-run fixtures: a backend that answers the planner, every
//! unit and the final assembly the way a well-behaved model would.

use ideaforge_llm::LlmInvocation;
use ideaforge_llm::test_support::ScriptedBackend;
use ideaforge_units::spec_for;
use ideaforge_utils::error::LlmError;
use ideaforge_utils::types::{DocumentType, UnitName};
use serde_json::{Map, Value, json};

use crate::aggregator::{ASSEMBLY_LABEL, expected_file_line};
use crate::planner::PLANNER_LABEL;

/// A minimal valid answer for `unit`.
#[must_use]
pub fn sample_document(unit: UnitName) -> Value {
    match unit {
        UnitName::ProjectBrief => json!({
            "title": "Todo",
            "summary": "A simple todo app.",
            "problemStatement": "People lose track of small tasks.",
            "solution": "A fast shared list.",
            "coreFeatures": [{"name": "Add todo", "description": "Capture a task in one tap"}],
            "successMetrics": ["Weekly active users"]
        }),
        UnitName::Persona => json!({
            "personas": [{
                "name": "Sam", "role": "Busy parent",
                "goals": ["Remember errands"], "painPoints": ["Forgets things"],
                "quote": "I just need a list."
            }]
        }),
        UnitName::UserFlow => json!({
            "flows": [{
                "name": "Add a todo",
                "steps": [{"screen": "List", "action": "Tap add"}, {"screen": "Editor", "action": "Save"}]
            }]
        }),
        UnitName::Schema => json!({
            "entities": [{"name": "todos", "fields": [{"name": "text", "type": "string", "required": true}]}],
            "relationships": []
        }),
        UnitName::ApiDesign => json!({
            "endpoints": [{
                "name": "List todos", "method": "query", "path": "todos.list", "description": "All todos",
                "request": {"status": "open | done"},
                "response": {"todos": "Todo[]"}
            }]
        }),
        UnitName::ComponentArchitecture => json!({
            "components": [{"name": "TodoList", "responsibility": "Render todos"}],
            "stateManagement": "Server state through reactive queries"
        }),
        UnitName::TechRationale => json!({
            "choices": [{"technology": "React", "reason": "Team knows it"}]
        }),
        UnitName::Roadmap => json!({
            "phases": [{"name": "MVP", "duration": "2 weeks", "deliverables": ["CRUD"]}]
        }),
    }
}

/// The plan a model would emit for the documents listed in a planning
/// prompt: one task per requested document.
#[must_use]
pub fn plan_answer(prompt: &str) -> Value {
    let tasks: Vec<Value> = DocumentType::all()
        .filter(|doc| prompt.contains(&format!("- {} ({})", doc.as_str(), doc.title())))
        .map(|doc| {
            json!({
                "unit": doc.unit().as_str(),
                "goal": format!("Cover the {}", doc.title()),
                "focus": "The MVP"
            })
        })
        .collect();
    Value::Array(tasks)
}

/// The bundle a model would emit for an assembly prompt: every listed file.
#[must_use]
pub fn assembly_answer(prompt: &str) -> Value {
    let mut files = Map::new();
    for doc in DocumentType::all() {
        if prompt.contains(&expected_file_line(doc)) {
            files.insert(
                doc.filename().to_string(),
                Value::String(format!("# {}\n\nAssembled.", doc.title())),
            );
        }
    }
    Value::Object(files)
}

/// The bundle a model would emit if it passed every listed unit draft
/// through unchanged. Drafts keep their own fenced code blocks.
#[must_use]
pub fn echoed_assembly_answer(prompt: &str) -> Value {
    let mut files = Map::new();
    for doc in DocumentType::all() {
        if prompt.contains(&expected_file_line(doc))
            && let Ok(draft) = unit_draft(doc.unit())
        {
            files.insert(doc.filename().to_string(), Value::String(draft));
        }
    }
    Value::Object(files)
}

/// The markdown `unit` produces from its [`sample_document`].
///
/// # Errors
///
/// When the sample does not match the unit's document shape.
pub fn unit_draft(unit: UnitName) -> Result<String, serde_json::Error> {
    spec_for(unit).format(&sample_document(unit))
}

/// `answer` wrapped in a ```json fence, as chatty models reply.
#[must_use]
pub fn fenced(answer: &Value) -> String {
    format!("```json\n{answer}\n```")
}

/// Answer any invocation of a run by its label.
///
/// # Errors
///
/// A transport error for an unknown label.
pub fn answer(inv: &LlmInvocation) -> Result<String, LlmError> {
    let prompt = inv
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let value = match inv.label.as_str() {
        PLANNER_LABEL => plan_answer(&prompt),
        ASSEMBLY_LABEL => assembly_answer(&prompt),
        other => match other.parse::<UnitName>() {
            Ok(unit) => sample_document(unit),
            Err(_) => return Err(LlmError::Transport(format!("no scripted answer for '{other}'"))),
        },
    };
    Ok(value.to_string())
}

/// A backend that plays a cooperative model for a whole run.
#[must_use]
pub fn cooperative_backend(name: &str) -> ScriptedBackend {
    ScriptedBackend::new(name).with_responder(answer)
}
