//! Domain value types shared across the planner, executor and aggregator.
//!
//! The two closed enumerations, [`DocumentType`] and [`UnitName`], are the
//! backbone of a run: the caller requests documents, the planner emits units,
//! and the fixed 1:1 table between them decides where each generated text
//! lands in the [`DevelopmentPlan`] and which filename it gets in the final
//! [`DocumentBundle`].

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum::{EnumIter, IntoEnumIterator};

use crate::error::NameError;

/// One of the eight planning documents a caller can request.
///
/// # Serialization
///
/// Serializes to its camelCase identifier (e.g. `"projectBrief"`), which is
/// also the field name used for the document inside a serialized
/// [`DevelopmentPlan`].
///
/// # Example
///
/// ```rust
/// use ideaforge_utils::types::{DocumentType, UnitName};
///
/// let doc: DocumentType = "brief".parse().unwrap();
/// assert_eq!(doc, DocumentType::ProjectBrief);
/// assert_eq!(doc.filename(), "Project_Brief.md");
/// assert_eq!(doc.unit(), UnitName::ProjectBrief);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "camelCase")]
pub enum DocumentType {
    ProjectBrief,
    UserPersonas,
    UserFlow,
    DatabaseSchema,
    ApiDesign,
    ComponentArchitecture,
    TechStackRationale,
    DevelopmentRoadmap,
}

impl DocumentType {
    /// Canonical camelCase identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "projectBrief",
            Self::UserPersonas => "userPersonas",
            Self::UserFlow => "userFlow",
            Self::DatabaseSchema => "databaseSchema",
            Self::ApiDesign => "apiDesign",
            Self::ComponentArchitecture => "componentArchitecture",
            Self::TechStackRationale => "techStackRationale",
            Self::DevelopmentRoadmap => "developmentRoadmap",
        }
    }

    /// Short alias accepted on the command line.
    #[must_use]
    pub const fn alias(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "brief",
            Self::UserPersonas => "personas",
            Self::UserFlow => "flow",
            Self::DatabaseSchema => "schema",
            Self::ApiDesign => "api",
            Self::ComponentArchitecture => "components",
            Self::TechStackRationale => "rationale",
            Self::DevelopmentRoadmap => "roadmap",
        }
    }

    /// Filename of this document inside a [`DocumentBundle`].
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "Project_Brief.md",
            Self::UserPersonas => "User_Personas.md",
            Self::UserFlow => "User_Flow.md",
            Self::DatabaseSchema => "Database_Schema.md",
            Self::ApiDesign => "API_Design.md",
            Self::ComponentArchitecture => "Component_Architecture.md",
            Self::TechStackRationale => "Tech_Stack_Rationale.md",
            Self::DevelopmentRoadmap => "Development_Roadmap.md",
        }
    }

    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "Project Brief",
            Self::UserPersonas => "User Personas",
            Self::UserFlow => "User Flow",
            Self::DatabaseSchema => "Database Schema",
            Self::ApiDesign => "API Design",
            Self::ComponentArchitecture => "Component Architecture",
            Self::TechStackRationale => "Tech Stack Rationale",
            Self::DevelopmentRoadmap => "Development Roadmap",
        }
    }

    /// The generation unit responsible for this document.
    #[must_use]
    pub const fn unit(&self) -> UnitName {
        match self {
            Self::ProjectBrief => UnitName::ProjectBrief,
            Self::UserPersonas => UnitName::Persona,
            Self::UserFlow => UnitName::UserFlow,
            Self::DatabaseSchema => UnitName::Schema,
            Self::ApiDesign => UnitName::ApiDesign,
            Self::ComponentArchitecture => UnitName::ComponentArchitecture,
            Self::TechStackRationale => UnitName::TechRationale,
            Self::DevelopmentRoadmap => UnitName::Roadmap,
        }
    }

    /// All document types in canonical order.
    pub fn all() -> impl Iterator<Item = DocumentType> {
        Self::iter()
    }

    /// Reverse lookup from a bundle filename.
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<DocumentType> {
        Self::iter().find(|doc| doc.filename() == filename)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = NameError;

    /// Accepts the camelCase identifier, the short alias or the filename.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::iter()
            .find(|doc| {
                doc.as_str().eq_ignore_ascii_case(needle)
                    || doc.alias().eq_ignore_ascii_case(needle)
                    || doc.filename() == needle
            })
            .ok_or_else(|| NameError::UnknownDocument(s.to_string()))
    }
}

/// One of the eight specialized generation units.
///
/// The wire names (`"ProjectBriefAgent"`, ...) are what the planning model
/// emits and what settings keys use. Parsing anything else is an error; an
/// unknown unit is never coerced to a known one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
pub enum UnitName {
    #[serde(rename = "ProjectBriefAgent")]
    ProjectBrief,
    #[serde(rename = "PersonaAgent")]
    Persona,
    #[serde(rename = "UserFlowAgent")]
    UserFlow,
    #[serde(rename = "SchemaAgent")]
    Schema,
    #[serde(rename = "ApiDesignAgent")]
    ApiDesign,
    #[serde(rename = "ComponentArchitectureAgent")]
    ComponentArchitecture,
    #[serde(rename = "TechRationaleAgent")]
    TechRationale,
    #[serde(rename = "RoadmapAgent")]
    Roadmap,
}

impl UnitName {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectBrief => "ProjectBriefAgent",
            Self::Persona => "PersonaAgent",
            Self::UserFlow => "UserFlowAgent",
            Self::Schema => "SchemaAgent",
            Self::ApiDesign => "ApiDesignAgent",
            Self::ComponentArchitecture => "ComponentArchitectureAgent",
            Self::TechRationale => "TechRationaleAgent",
            Self::Roadmap => "RoadmapAgent",
        }
    }

    /// The document this unit writes into the plan.
    #[must_use]
    pub const fn document(&self) -> DocumentType {
        match self {
            Self::ProjectBrief => DocumentType::ProjectBrief,
            Self::Persona => DocumentType::UserPersonas,
            Self::UserFlow => DocumentType::UserFlow,
            Self::Schema => DocumentType::DatabaseSchema,
            Self::ApiDesign => DocumentType::ApiDesign,
            Self::ComponentArchitecture => DocumentType::ComponentArchitecture,
            Self::TechRationale => DocumentType::TechStackRationale,
            Self::Roadmap => DocumentType::DevelopmentRoadmap,
        }
    }

    pub fn all() -> impl Iterator<Item = UnitName> {
        Self::iter()
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| NameError::UnknownUnit(s.to_string()))
    }
}

/// Optional capabilities the generated application must cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub auth: bool,
    #[serde(default)]
    pub crud: bool,
    #[serde(default)]
    pub realtime: bool,
}

impl FeatureFlags {
    /// Names of the enabled flags, in declaration order.
    #[must_use]
    pub fn enabled(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.auth {
            out.push("auth");
        }
        if self.crud {
            out.push("crud");
        }
        if self.realtime {
            out.push("realtime");
        }
        out
    }
}

/// Target platform for the generated plan. Supplied once per run and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStack {
    pub framework: String,
    pub backend: String,
    #[serde(default)]
    pub styling: String,
    #[serde(default)]
    pub ui_library: String,
    #[serde(default)]
    pub state_management: String,
    #[serde(default)]
    pub auth_provider: String,
    #[serde(default)]
    pub features: FeatureFlags,
}

impl TechStack {
    pub fn new(framework: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            backend: backend.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_styling(mut self, styling: impl Into<String>) -> Self {
        self.styling = styling.into();
        self
    }

    #[must_use]
    pub fn with_ui_library(mut self, ui_library: impl Into<String>) -> Self {
        self.ui_library = ui_library.into();
        self
    }

    #[must_use]
    pub fn with_state_management(mut self, state: impl Into<String>) -> Self {
        self.state_management = state.into();
        self
    }

    #[must_use]
    pub fn with_auth_provider(mut self, provider: impl Into<String>) -> Self {
        self.auth_provider = provider.into();
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// A stack is usable once framework and backend are named.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.framework.trim().is_empty() && !self.backend.trim().is_empty()
    }

    /// Pretty-printed JSON, as substituted into prompts.
    #[must_use]
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// One planned unit of work: which unit to run, and what to aim for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub unit: UnitName,
    pub goal: String,
    pub focus: String,
}

impl Task {
    pub fn new(unit: UnitName, goal: impl Into<String>, focus: impl Into<String>) -> Self {
        Self {
            unit,
            goal: goal.into(),
            focus: focus.into(),
        }
    }
}

/// Outcome of executing one [`Task`].
///
/// Exactly one of `output` and `error` is present; the constructors are the
/// only way to build a value, so the pairing with `success` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    unit: UnitName,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u64,
}

impl TaskResult {
    pub fn succeeded(unit: UnitName, output: impl Into<String>, duration: Duration) -> Self {
        Self {
            unit,
            success: true,
            output: Some(output.into()),
            error: None,
            duration_ms: duration_to_ms(duration),
        }
    }

    pub fn failed(unit: UnitName, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            unit,
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms: duration_to_ms(duration),
        }
    }

    #[must_use]
    pub fn unit(&self) -> UnitName {
        self.unit
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Accumulated generated text, keyed by document type.
///
/// Starts with only the user idea and tech stack; the aggregator records one
/// entry per successful unit. A document can be recorded at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevelopmentPlan {
    user_idea: String,
    tech_stack: TechStack,
    documents: BTreeMap<DocumentType, String>,
}

impl DevelopmentPlan {
    pub fn new(user_idea: impl Into<String>, tech_stack: TechStack) -> Self {
        Self {
            user_idea: user_idea.into(),
            tech_stack,
            documents: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn user_idea(&self) -> &str {
        &self.user_idea
    }

    #[must_use]
    pub fn tech_stack(&self) -> &TechStack {
        &self.tech_stack
    }

    /// Record the text for `doc`.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::DuplicateDocument`] if `doc` already has content.
    pub fn record(&mut self, doc: DocumentType, content: impl Into<String>) -> Result<(), NameError> {
        if self.documents.contains_key(&doc) {
            return Err(NameError::DuplicateDocument(doc));
        }
        self.documents.insert(doc, content.into());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, doc: DocumentType) -> Option<&str> {
        self.documents.get(&doc).map(String::as_str)
    }

    /// True when `doc` has non-blank content.
    #[must_use]
    pub fn has(&self, doc: DocumentType) -> bool {
        self.get(doc).is_some_and(|text| !text.trim().is_empty())
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocumentType, &str)> {
        self.documents.iter().map(|(doc, text)| (*doc, text.as_str()))
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

impl Serialize for DevelopmentPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.documents.len()))?;
        map.serialize_entry("userIdea", &self.user_idea)?;
        map.serialize_entry("techStack", &self.tech_stack)?;
        for (doc, text) in &self.documents {
            map.serialize_entry(doc.as_str(), text)?;
        }
        map.end()
    }
}

/// Final output of a run: filename to markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentBundle(BTreeMap<String, String>);

impl DocumentBundle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, filename: impl Into<String>, markdown: impl Into<String>) {
        self.0.insert(filename.into(), markdown.into());
    }

    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.0.get(filename).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.0.contains_key(filename)
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// How the executor schedules tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Parallel,
}

impl ExecutionMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            _ => Err(NameError::UnknownMode(s.to_string())),
        }
    }
}

/// Where the executed plan came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlanSource {
    /// The planning model produced a valid plan.
    Model,
    /// The deterministic document-to-unit plan was used.
    Fallback { reason: String },
}

impl PlanSource {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Source of a configuration value.
///
/// Precedence: CLI arguments > environment > config file > programmatic
/// overrides > built-in defaults.
///
/// ```rust
/// use ideaforge_utils::types::ConfigSource;
///
/// let json = serde_json::to_string(&ConfigSource::Env).unwrap();
/// assert_eq!(json, r#""env""#);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Env,
    Config,
    Programmatic,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unit_document_table_is_bijective() {
        let docs: HashSet<_> = UnitName::all().map(|u| u.document()).collect();
        assert_eq!(docs.len(), 8);
        for doc in DocumentType::all() {
            assert_eq!(doc.unit().document(), doc);
        }
    }

    #[test]
    fn test_document_parsing_accepts_aliases_and_filenames() {
        assert_eq!("projectBrief".parse::<DocumentType>().unwrap(), DocumentType::ProjectBrief);
        assert_eq!("api".parse::<DocumentType>().unwrap(), DocumentType::ApiDesign);
        assert_eq!(
            "Tech_Stack_Rationale.md".parse::<DocumentType>().unwrap(),
            DocumentType::TechStackRationale
        );
        assert!("readme".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        match "FooAgent".parse::<UnitName>() {
            Err(NameError::UnknownUnit(name)) => assert_eq!(name, "FooAgent"),
            other => panic!("Expected UnknownUnit, got {:?}", other),
        }
        assert_eq!("SchemaAgent".parse::<UnitName>().unwrap(), UnitName::Schema);
    }

    #[test]
    fn test_unit_serde_uses_wire_names() {
        let json = serde_json::to_string(&UnitName::TechRationale).unwrap();
        assert_eq!(json, r#""TechRationaleAgent""#);
        let unit: UnitName = serde_json::from_str(r#""PersonaAgent""#).unwrap();
        assert_eq!(unit, UnitName::Persona);
    }

    #[test]
    fn test_task_result_constructors_keep_exclusivity() {
        let ok = TaskResult::succeeded(UnitName::Roadmap, "# Roadmap", Duration::from_millis(12));
        assert!(ok.success());
        assert_eq!(ok.output(), Some("# Roadmap"));
        assert!(ok.error().is_none());
        assert_eq!(ok.duration_ms(), 12);

        let failed = TaskResult::failed(UnitName::Roadmap, "boom", Duration::ZERO);
        assert!(!failed.success());
        assert!(failed.output().is_none());
        assert_eq!(failed.error(), Some("boom"));

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("output").is_none());
        assert_eq!(json["durationMs"], 0);
    }

    #[test]
    fn test_plan_rejects_second_write() {
        let mut plan = DevelopmentPlan::new("idea", TechStack::new("React", "Convex"));
        plan.record(DocumentType::UserFlow, "first").unwrap();
        assert!(matches!(
            plan.record(DocumentType::UserFlow, "second"),
            Err(NameError::DuplicateDocument(DocumentType::UserFlow))
        ));
        assert_eq!(plan.get(DocumentType::UserFlow), Some("first"));
    }

    #[test]
    fn test_plan_serializes_flat() {
        let mut plan = DevelopmentPlan::new("A simple todo app", TechStack::new("React", "Convex"));
        plan.record(DocumentType::ProjectBrief, "brief text").unwrap();

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["userIdea"], "A simple todo app");
        assert_eq!(json["techStack"]["framework"], "React");
        assert_eq!(json["projectBrief"], "brief text");
        assert!(json.get("userPersonas").is_none());
    }

    #[test]
    fn test_execution_mode_defaults_to_parallel() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Parallel);
        assert_eq!("Sequential".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sequential);
    }

    #[test]
    fn test_feature_flags_enabled_names() {
        let flags = FeatureFlags {
            auth: true,
            crud: false,
            realtime: true,
        };
        assert_eq!(flags.enabled(), vec!["auth", "realtime"]);
    }
}
