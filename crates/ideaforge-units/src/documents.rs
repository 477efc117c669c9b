//! Typed shapes of the JSON each unit asks for, their JSON Schemas and the
//! deterministic markdown rendering of each.
//!
//! Rendering never looks at anything but the value itself, so the same JSON
//! always yields byte-identical markdown.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// A document shape that can describe itself and render as markdown.
pub trait MarkdownDoc: DeserializeOwned {
    /// JSON Schema sent to the model and used to validate its answer.
    fn schema() -> Value;

    fn to_markdown(&self) -> String;
}

/// Deserialize `value` as `T` and render it.
///
/// # Errors
///
/// The value does not have the shape of `T`.
pub fn render_as<T: MarkdownDoc>(value: &Value) -> Result<String, serde_json::Error> {
    let doc: T = serde_json::from_value(value.clone())?;
    Ok(doc.to_markdown())
}

fn bullet_list(out: &mut String, items: &[String]) {
    for item in items {
        out.push_str(&format!("- {}\n", item.trim()));
    }
}

fn section(out: &mut String, heading: &str, body: &str) {
    out.push_str(&format!("## {heading}\n\n{}\n\n", body.trim()));
}

fn finish(mut out: String) -> String {
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

fn string_array() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

// ---------------------------------------------------------------------------
// Project brief
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBrief {
    pub title: String,
    pub summary: String,
    pub problem_statement: String,
    pub solution: String,
    #[serde(default)]
    pub target_audience: Option<String>,
    pub core_features: Vec<Feature>,
    #[serde(default)]
    pub success_metrics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    pub name: String,
    pub description: String,
}

impl MarkdownDoc for ProjectBrief {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["title", "summary", "problemStatement", "solution", "coreFeatures"],
            "properties": {
                "title": {"type": "string"},
                "summary": {"type": "string"},
                "problemStatement": {"type": "string"},
                "solution": {"type": "string"},
                "targetAudience": {"type": "string"},
                "coreFeatures": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "description"],
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"}
                        }
                    }
                },
                "successMetrics": string_array()
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = format!("# Project Brief: {}\n\n", self.title.trim());
        section(&mut out, "Summary", &self.summary);
        section(&mut out, "Problem Statement", &self.problem_statement);
        section(&mut out, "Solution", &self.solution);
        if let Some(audience) = self.target_audience.as_deref().filter(|a| !a.trim().is_empty()) {
            section(&mut out, "Target Audience", audience);
        }
        out.push_str("## Core Features\n\n");
        for feature in &self.core_features {
            out.push_str(&format!(
                "- **{}**: {}\n",
                feature.name.trim(),
                feature.description.trim()
            ));
        }
        out.push('\n');
        if !self.success_metrics.is_empty() {
            out.push_str("## Success Metrics\n\n");
            bullet_list(&mut out, &self.success_metrics);
            out.push('\n');
        }
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// User personas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserPersonas {
    pub personas: Vec<Persona>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub background: Option<String>,
    pub goals: Vec<String>,
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub quote: Option<String>,
}

impl MarkdownDoc for UserPersonas {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["personas"],
            "properties": {
                "personas": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "role", "goals", "painPoints"],
                        "properties": {
                            "name": {"type": "string"},
                            "role": {"type": "string"},
                            "background": {"type": "string"},
                            "goals": string_array(),
                            "painPoints": string_array(),
                            "quote": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# User Personas\n\n");
        for persona in &self.personas {
            out.push_str(&format!(
                "## {} ({})\n\n",
                persona.name.trim(),
                persona.role.trim()
            ));
            if let Some(quote) = persona.quote.as_deref().filter(|q| !q.trim().is_empty()) {
                out.push_str(&format!("> \"{}\"\n\n", quote.trim().trim_matches('"')));
            }
            if let Some(background) = persona.background.as_deref().filter(|b| !b.trim().is_empty()) {
                out.push_str(&format!("{}\n\n", background.trim()));
            }
            out.push_str("**Goals**\n\n");
            bullet_list(&mut out, &persona.goals);
            out.push_str("\n**Pain points**\n\n");
            bullet_list(&mut out, &persona.pain_points);
            out.push('\n');
        }
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// User flow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserFlow {
    pub flows: Vec<Flow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub name: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub entry_point: Option<String>,
    pub steps: Vec<FlowStep>,
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowStep {
    pub screen: String,
    pub action: String,
}

impl MarkdownDoc for UserFlow {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["flows"],
            "properties": {
                "flows": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "steps"],
                        "properties": {
                            "name": {"type": "string"},
                            "actor": {"type": "string"},
                            "entryPoint": {"type": "string"},
                            "steps": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "required": ["screen", "action"],
                                    "properties": {
                                        "screen": {"type": "string"},
                                        "action": {"type": "string"}
                                    }
                                }
                            },
                            "outcome": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# User Flow\n\n");
        for flow in &self.flows {
            out.push_str(&format!("## {}\n\n", flow.name.trim()));
            if let Some(actor) = flow.actor.as_deref().filter(|a| !a.trim().is_empty()) {
                out.push_str(&format!("**Actor:** {}\n\n", actor.trim()));
            }
            if let Some(entry) = flow.entry_point.as_deref().filter(|e| !e.trim().is_empty()) {
                out.push_str(&format!("**Entry point:** {}\n\n", entry.trim()));
            }
            for (i, step) in flow.steps.iter().enumerate() {
                out.push_str(&format!(
                    "{}. **{}**: {}\n",
                    i + 1,
                    step.screen.trim(),
                    step.action.trim()
                ));
            }
            out.push('\n');
            if let Some(outcome) = flow.outcome.as_deref().filter(|o| !o.trim().is_empty()) {
                out.push_str(&format!("**Outcome:** {}\n\n", outcome.trim()));
            }
        }
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// Database schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseSchema {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Index {
    pub entity: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

impl MarkdownDoc for DatabaseSchema {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["entities", "relationships"],
            "properties": {
                "entities": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "fields"],
                        "properties": {
                            "name": {"type": "string"},
                            "description": {"type": "string"},
                            "fields": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "required": ["name", "type"],
                                    "properties": {
                                        "name": {"type": "string"},
                                        "type": {"type": "string"},
                                        "required": {"type": "boolean"},
                                        "description": {"type": "string"}
                                    }
                                }
                            }
                        }
                    }
                },
                "relationships": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["from", "to", "type"],
                        "properties": {
                            "from": {"type": "string"},
                            "to": {"type": "string"},
                            "type": {"type": "string"},
                            "description": {"type": "string"}
                        }
                    }
                },
                "indexes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["entity", "fields"],
                        "properties": {
                            "entity": {"type": "string"},
                            "fields": string_array(),
                            "purpose": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# Database Schema\n\n## Entities\n\n");
        for entity in &self.entities {
            out.push_str(&format!("### {}\n\n", entity.name.trim()));
            if let Some(desc) = entity.description.as_deref().filter(|d| !d.trim().is_empty()) {
                out.push_str(&format!("{}\n\n", desc.trim()));
            }
            out.push_str("| Field | Type | Required | Description |\n");
            out.push_str("|-------|------|----------|-------------|\n");
            for field in &entity.fields {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    field.name.trim(),
                    field.field_type.trim(),
                    if field.required { "yes" } else { "no" },
                    field.description.as_deref().unwrap_or("").trim()
                ));
            }
            out.push('\n');
        }

        out.push_str("## Relationships\n\n");
        if self.relationships.is_empty() {
            out.push_str("None.\n\n");
        }
        for rel in &self.relationships {
            let mut line = format!("- {} → {} ({})", rel.from.trim(), rel.to.trim(), rel.kind.trim());
            if let Some(desc) = rel.description.as_deref().filter(|d| !d.trim().is_empty()) {
                line.push_str(&format!(": {}", desc.trim()));
            }
            out.push_str(&line);
            out.push('\n');
        }
        if !self.relationships.is_empty() {
            out.push('\n');
        }

        if !self.indexes.is_empty() {
            out.push_str("## Indexes\n\n");
            for index in &self.indexes {
                let mut line = format!("- `{}` on ({})", index.entity.trim(), index.fields.join(", "));
                if let Some(purpose) = index.purpose.as_deref().filter(|p| !p.trim().is_empty()) {
                    line.push_str(&format!(": {}", purpose.trim()));
                }
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// API design
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiDesign {
    #[serde(default)]
    pub overview: Option<String>,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub method: String,
    pub path: String,
    pub description: String,
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub request: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
}

fn shape_block(out: &mut String, label: &str, shape: Option<&Value>) {
    match shape {
        None | Some(Value::Null) => {}
        Some(Value::String(text)) if text.trim().is_empty() => {}
        Some(Value::String(text)) => out.push_str(&format!("**{label}:** {}\n\n", text.trim())),
        Some(other) => {
            let pretty = serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string());
            out.push_str(&format!("**{label}:**\n\n```json\n{pretty}\n```\n\n"));
        }
    }
}

impl MarkdownDoc for ApiDesign {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["endpoints"],
            "properties": {
                "overview": {"type": "string"},
                "endpoints": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "method", "path", "description"],
                        "properties": {
                            "name": {"type": "string"},
                            "method": {"type": "string"},
                            "path": {"type": "string"},
                            "description": {"type": "string"},
                            "auth": {"type": "boolean"},
                            "request": {},
                            "response": {}
                        }
                    }
                }
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# API Design\n\n");
        if let Some(overview) = self.overview.as_deref().filter(|o| !o.trim().is_empty()) {
            section(&mut out, "Overview", overview);
        }
        out.push_str("## Endpoints\n\n");
        for ep in &self.endpoints {
            out.push_str(&format!(
                "### {}\n\n`{} {}`{}\n\n{}\n\n",
                ep.name.trim(),
                ep.method.trim().to_ascii_uppercase(),
                ep.path.trim(),
                if ep.auth { " (authenticated)" } else { "" },
                ep.description.trim()
            ));
            shape_block(&mut out, "Request", ep.request.as_ref());
            shape_block(&mut out, "Response", ep.response.as_ref());
        }
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// Component architecture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentArchitecture {
    #[serde(default)]
    pub pages: Vec<Page>,
    pub components: Vec<Component>,
    pub state_management: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub name: String,
    #[serde(default)]
    pub route: Option<String>,
    pub description: String,
    #[serde(default)]
    pub components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Component {
    pub name: String,
    pub responsibility: String,
    #[serde(default)]
    pub children: Vec<String>,
}

impl MarkdownDoc for ComponentArchitecture {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["components", "stateManagement"],
            "properties": {
                "pages": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "description"],
                        "properties": {
                            "name": {"type": "string"},
                            "route": {"type": "string"},
                            "description": {"type": "string"},
                            "components": string_array()
                        }
                    }
                },
                "components": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "responsibility"],
                        "properties": {
                            "name": {"type": "string"},
                            "responsibility": {"type": "string"},
                            "children": string_array()
                        }
                    }
                },
                "stateManagement": {"type": "string"}
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# Component Architecture\n\n");
        if !self.pages.is_empty() {
            out.push_str("## Pages\n\n");
            for page in &self.pages {
                let route = page
                    .route
                    .as_deref()
                    .filter(|r| !r.trim().is_empty())
                    .map(|r| format!(" (`{}`)", r.trim()))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "### {}{}\n\n{}\n\n",
                    page.name.trim(),
                    route,
                    page.description.trim()
                ));
                if !page.components.is_empty() {
                    out.push_str(&format!("Uses: {}\n\n", page.components.join(", ")));
                }
            }
        }
        out.push_str("## Components\n\n");
        for component in &self.components {
            out.push_str(&format!(
                "- **{}**: {}",
                component.name.trim(),
                component.responsibility.trim()
            ));
            if !component.children.is_empty() {
                out.push_str(&format!(" (children: {})", component.children.join(", ")));
            }
            out.push('\n');
        }
        out.push('\n');
        section(&mut out, "State Management", &self.state_management);
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// Tech stack rationale
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TechRationale {
    #[serde(default)]
    pub summary: Option<String>,
    pub choices: Vec<TechChoice>,
    #[serde(default)]
    pub risks: Vec<Risk>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TechChoice {
    pub technology: String,
    #[serde(default)]
    pub category: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub tradeoffs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Risk {
    pub risk: String,
    pub mitigation: String,
}

impl MarkdownDoc for TechRationale {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["choices"],
            "properties": {
                "summary": {"type": "string"},
                "choices": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["technology", "reason"],
                        "properties": {
                            "technology": {"type": "string"},
                            "category": {"type": "string"},
                            "reason": {"type": "string"},
                            "alternatives": string_array(),
                            "tradeoffs": {"type": "string"}
                        }
                    }
                },
                "risks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["risk", "mitigation"],
                        "properties": {
                            "risk": {"type": "string"},
                            "mitigation": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# Tech Stack Rationale\n\n");
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push_str(&format!("{}\n\n", summary.trim()));
        }
        for choice in &self.choices {
            match choice.category.as_deref().filter(|c| !c.trim().is_empty()) {
                Some(category) => out.push_str(&format!(
                    "## {} ({})\n\n",
                    choice.technology.trim(),
                    category.trim()
                )),
                None => out.push_str(&format!("## {}\n\n", choice.technology.trim())),
            }
            out.push_str(&format!("{}\n\n", choice.reason.trim()));
            if !choice.alternatives.is_empty() {
                out.push_str(&format!(
                    "**Alternatives considered:** {}\n\n",
                    choice.alternatives.join(", ")
                ));
            }
            if let Some(tradeoffs) = choice.tradeoffs.as_deref().filter(|t| !t.trim().is_empty()) {
                out.push_str(&format!("**Trade-offs:** {}\n\n", tradeoffs.trim()));
            }
        }
        if !self.risks.is_empty() {
            out.push_str("## Risks\n\n| Risk | Mitigation |\n|------|------------|\n");
            for risk in &self.risks {
                out.push_str(&format!("| {} | {} |\n", risk.risk.trim(), risk.mitigation.trim()));
            }
            out.push('\n');
        }
        finish(out)
    }
}

// ---------------------------------------------------------------------------
// Development roadmap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Roadmap {
    #[serde(default)]
    pub summary: Option<String>,
    pub phases: Vec<RoadmapPhase>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoadmapPhase {
    pub name: String,
    pub duration: String,
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub milestone: Option<String>,
}

impl MarkdownDoc for Roadmap {
    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["phases"],
            "properties": {
                "summary": {"type": "string"},
                "phases": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "required": ["name", "duration", "deliverables"],
                        "properties": {
                            "name": {"type": "string"},
                            "duration": {"type": "string"},
                            "deliverables": string_array(),
                            "milestone": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    fn to_markdown(&self) -> String {
        let mut out = String::from("# Development Roadmap\n\n");
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push_str(&format!("{}\n\n", summary.trim()));
        }
        for (i, phase) in self.phases.iter().enumerate() {
            out.push_str(&format!(
                "## Phase {}: {} ({})\n\n",
                i + 1,
                phase.name.trim(),
                phase.duration.trim()
            ));
            bullet_list(&mut out, &phase.deliverables);
            out.push('\n');
            if let Some(milestone) = phase.milestone.as_deref().filter(|m| !m.trim().is_empty()) {
                out.push_str(&format!("**Milestone:** {}\n\n", milestone.trim()));
            }
        }
        finish(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brief_markdown() {
        let value = json!({
            "title": "Todo",
            "summary": "A simple todo app.",
            "problemStatement": "People forget things.",
            "solution": "A list.",
            "coreFeatures": [{"name": "Add", "description": "Add a todo"}],
            "successMetrics": ["DAU > 100"]
        });
        let md = render_as::<ProjectBrief>(&value).unwrap();
        assert!(md.starts_with("# Project Brief: Todo\n\n## Summary\n\nA simple todo app."));
        assert!(md.contains("- **Add**: Add a todo"));
        assert!(md.contains("## Success Metrics\n\n- DAU > 100"));
        assert!(!md.contains("Target Audience"));
        assert!(!md.ends_with('\n'));
    }

    #[test]
    fn test_schema_markdown_table() {
        let value = json!({
            "entities": [{
                "name": "todos",
                "fields": [
                    {"name": "text", "type": "string", "required": true},
                    {"name": "done", "type": "boolean"}
                ]
            }],
            "relationships": [{"from": "todos", "to": "users", "type": "many-to-one"}],
            "indexes": [{"entity": "todos", "fields": ["userId", "done"]}]
        });
        let md = render_as::<DatabaseSchema>(&value).unwrap();
        assert!(md.contains("| text | string | yes |  |"));
        assert!(md.contains("| done | boolean | no |  |"));
        assert!(md.contains("- todos → users (many-to-one)"));
        assert!(md.contains("- `todos` on (userId, done)"));
    }

    #[test]
    fn test_api_shapes_render_as_text_or_json() {
        let value = json!({
            "endpoints": [
                {"name": "List todos", "method": "get", "path": "/todos", "description": "All todos",
                 "auth": true, "response": {"items": "Todo[]"}},
                {"name": "Health", "method": "GET", "path": "/health", "description": "Ping",
                 "request": "none"}
            ]
        });
        let md = render_as::<ApiDesign>(&value).unwrap();
        assert!(md.contains("`GET /todos` (authenticated)"));
        assert!(md.contains("```json\n{\n  \"items\": \"Todo[]\"\n}\n```"));
        assert!(md.contains("**Request:** none"));
    }

    #[test]
    fn test_roadmap_numbers_phases() {
        let value = json!({
            "phases": [
                {"name": "MVP", "duration": "2 weeks", "deliverables": ["CRUD"]},
                {"name": "Polish", "duration": "1 week", "deliverables": ["UI"], "milestone": "Launch"}
            ]
        });
        let md = render_as::<Roadmap>(&value).unwrap();
        assert!(md.contains("## Phase 1: MVP (2 weeks)"));
        assert!(md.contains("## Phase 2: Polish (1 week)"));
        assert!(md.contains("**Milestone:** Launch"));
    }

    #[test]
    fn test_wrong_shape_is_error() {
        assert!(render_as::<UserPersonas>(&json!({"people": []})).is_err());
        assert!(render_as::<UserFlow>(&json!({"flows": [{"name": "x"}]})).is_err());
    }

    #[test]
    fn test_schemas_accept_minimal_documents() {
        let minimal = [
            (ProjectBrief::schema(), json!({"title": "t", "summary": "s", "problemStatement": "p", "solution": "x", "coreFeatures": []})),
            (UserPersonas::schema(), json!({"personas": [{"name": "n", "role": "r", "goals": [], "painPoints": []}]})),
            (ComponentArchitecture::schema(), json!({"components": [{"name": "App", "responsibility": "root"}], "stateManagement": "Zustand"})),
            (TechRationale::schema(), json!({"choices": [{"technology": "React", "reason": "ecosystem"}]})),
        ];
        for (schema, value) in minimal {
            assert!(
                ideaforge_llm::json::validate_against(&value, &schema).is_ok(),
                "schema rejected {value}"
            );
        }
    }

    #[test]
    fn test_schema_rejects_missing_required() {
        let result = ideaforge_llm::json::validate_against(
            &json!({"title": "t"}),
            &ProjectBrief::schema(),
        );
        assert!(result.is_err());
    }
}
