use ideaforge_utils::error::TemplateError;
use ideaforge_utils::types::UnitName;
use std::collections::BTreeMap;

use crate::{Bindings, RenderMode, Template, TemplateId};

const PLANNER: &str = r#"You are the planning agent of a software planning tool.

A user wants to build the following product:
<idea>
{{USER_IDEA}}
</idea>

Target technology stack:
```json
{{TECH_STACK}}
```

The user requested exactly these documents:
{{REQUESTED_DOCUMENTS}}

Available generation units (unit name -> document it writes):
{{AVAILABLE_UNITS}}

Produce an ordered execution plan. Rules:
- Use only unit names from the list above, spelled exactly.
- Plan exactly one task per requested document and nothing for documents that were not requested.
- Each task has a concrete "goal" (what the document must achieve for this product) and a "focus" (the aspects of this idea and stack to emphasise).
- Order tasks so the foundational documents come first.

Respond with a JSON array only, no prose:
[{"unit": "<unit name>", "goal": "<goal>", "focus": "<focus>"}]"#;

const ASSEMBLY: &str = r#"You are the document generation agent. Package an accumulated development plan into final markdown files.

Development plan (JSON; each document field holds the generated draft):
```json
{{PLAN}}
```

Requested documents:
{{REQUESTED_DOCUMENTS}}

Emit a JSON object whose keys are filenames and whose values are complete markdown documents.
Allowed filenames, and the plan field each one is built from:
{{EXPECTED_FILES}}

Rules:
- Use only the filenames listed above.
- Build each file from its plan field; polish structure and wording, keep every fact.
- If a plan field is missing or empty, omit that file. Never invent placeholder content.

Respond with the JSON object only."#;

const UNIT_FRAME: &str = r#"Product idea:
<idea>
{{USER_IDEA}}
</idea>

Technology stack:
```json
{{TECH_STACK}}
```

Your goal: {{GOAL}}
Focus on: {{FOCUS}}

Reference documentation for this stack:
{{REFERENCE_DOCS}}

Respond with a single JSON object that validates against this JSON schema, and nothing else:
```json
{{OUTPUT_SCHEMA}}
```"#;

fn unit_preamble(unit: UnitName) -> &'static str {
    match unit {
        UnitName::ProjectBrief => {
            "You are a product strategist. Write the project brief: a crisp title, a one-paragraph summary, the problem being solved, the proposed solution, the target audience, the core features with a short rationale each, and measurable success metrics."
        }
        UnitName::Persona => {
            "You are a UX researcher. Describe 2 to 4 distinct user personas for this product: who they are, what they want to achieve, what frustrates them today, and one representative quote."
        }
        UnitName::UserFlow => {
            "You are an interaction designer. Map the primary user flows: for each flow name the actor, the entry point, the ordered steps (screen plus action), and the successful outcome."
        }
        UnitName::Schema => {
            "You are a database architect. Design the data model: entities with typed fields (mark required fields), the relationships between entities, and the indexes the main queries need. Follow the conventions of the chosen backend."
        }
        UnitName::ApiDesign => {
            "You are a backend engineer. Design the API surface: every endpoint or server function with its method, path or name, purpose, whether it requires authentication, and its request and response shapes. Use the idiom of the chosen backend."
        }
        UnitName::ComponentArchitecture => {
            "You are a frontend architect. Describe the component architecture: pages and components with their responsibilities and children, plus the state management approach for the chosen framework."
        }
        UnitName::TechRationale => {
            "You are a principal engineer. Justify each technology in the stack for this specific product: why it fits, the alternatives considered, and the trade-offs accepted. Close with the main technical risks and mitigations."
        }
        UnitName::Roadmap => {
            "You are an engineering manager. Lay out a phased development roadmap: each phase has a name, a duration estimate, the concrete deliverables and a milestone that proves it is done."
        }
    }
}

/// Built-in templates plus any per-id overrides.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: BTreeMap<TemplateId, Template>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    /// The templates shipped with ideaforge.
    #[must_use]
    pub fn builtin() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            TemplateId::Planner,
            Template::new(TemplateId::Planner, 2, PLANNER),
        );
        templates.insert(
            TemplateId::Assembly,
            Template::new(TemplateId::Assembly, 2, ASSEMBLY),
        );
        for unit in UnitName::all() {
            let body = format!("{}\n\n{}", unit_preamble(unit), UNIT_FRAME);
            templates.insert(TemplateId::Unit(unit), Template::new(TemplateId::Unit(unit), 1, body));
        }
        Self { templates }
    }

    /// Replace the body of `id`, keeping its version.
    #[must_use]
    pub fn with_override(mut self, id: TemplateId, body: impl Into<String>) -> Self {
        self.set_override(id, body);
        self
    }

    pub fn set_override(&mut self, id: TemplateId, body: impl Into<String>) {
        if let Some(existing) = self.templates.get(&id) {
            let replaced = existing.with_body(body);
            self.templates.insert(id, replaced);
        }
    }

    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownTemplate`] if `id` is not in the
    /// catalog.
    pub fn get(&self, id: TemplateId) -> Result<&Template, TemplateError> {
        self.templates
            .get(&id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.key().into_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// Render `id` in strict mode.
    ///
    /// # Errors
    ///
    /// Unknown id, or any placeholder left unbound.
    pub fn build(&self, id: TemplateId, bindings: &Bindings) -> Result<String, TemplateError> {
        self.get(id)?.render(bindings, RenderMode::Strict)
    }
}
