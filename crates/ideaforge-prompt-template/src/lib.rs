//! Prompt templates for ideaforge.
//!
//! A template is a named, versioned block of text containing `{{NAME}}`
//! placeholders. Rendering is a pure string transform: no I/O, no network.
//! Every occurrence of a bound placeholder is replaced in a single pass, so
//! placeholder-looking text inside a bound value is never expanded again.

mod catalog;

pub use catalog::TemplateCatalog;

use ideaforge_utils::error::TemplateError;
use ideaforge_utils::types::UnitName;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Z0-9_]+)\}\}").expect("placeholder pattern compiles"));

/// Placeholder names used by the built-in templates.
pub mod placeholders {
    pub const USER_IDEA: &str = "USER_IDEA";
    pub const TECH_STACK: &str = "TECH_STACK";
    pub const REQUESTED_DOCUMENTS: &str = "REQUESTED_DOCUMENTS";
    pub const AVAILABLE_UNITS: &str = "AVAILABLE_UNITS";
    pub const GOAL: &str = "GOAL";
    pub const FOCUS: &str = "FOCUS";
    pub const REFERENCE_DOCS: &str = "REFERENCE_DOCS";
    pub const OUTPUT_SCHEMA: &str = "OUTPUT_SCHEMA";
    pub const PLAN: &str = "PLAN";
    pub const EXPECTED_FILES: &str = "EXPECTED_FILES";
}

/// Identifier of a template in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateId {
    Planner,
    Assembly,
    Unit(UnitName),
}

impl TemplateId {
    /// Catalog key; also the suffix of the `prompt.<key>` settings entry
    /// (`unit.SchemaAgent` becomes `prompt.SchemaAgent`).
    #[must_use]
    pub fn key(&self) -> Cow<'static, str> {
        match self {
            Self::Planner => Cow::Borrowed("planner"),
            Self::Assembly => Cow::Borrowed("assembly"),
            Self::Unit(unit) => Cow::Owned(format!("unit.{}", unit.as_str())),
        }
    }

    /// Every template id the catalog knows.
    pub fn all() -> impl Iterator<Item = TemplateId> {
        [Self::Planner, Self::Assembly]
            .into_iter()
            .chain(UnitName::all().map(Self::Unit))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for TemplateId {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planner" => Ok(Self::Planner),
            "assembly" => Ok(Self::Assembly),
            other => other
                .strip_prefix("unit.")
                .unwrap_or(other)
                .parse::<UnitName>()
                .map(Self::Unit)
                .map_err(|_| TemplateError::UnknownTemplate(s.to_string())),
        }
    }
}

/// How to treat placeholders with no binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Unbound placeholders are an error. Used by every production call site.
    #[default]
    Strict,
    /// Unbound placeholders are left verbatim as visible markers.
    Lenient,
}

/// Placeholder values for one render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
}

impl Bindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a plain string.
    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Bind a structured value as pretty-printed JSON.
    #[must_use]
    pub fn bind_json<T: Serialize + ?Sized>(self, name: &str, value: &T) -> Self {
        let rendered = serde_json::to_string_pretty(value)
            .unwrap_or_else(|err| format!("<unserializable: {err}>"));
        self.bind(name, rendered)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named, versioned prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: TemplateId,
    version: u32,
    body: Cow<'static, str>,
    overridden: bool,
}

impl Template {
    pub fn new(id: TemplateId, version: u32, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id,
            version,
            body: body.into(),
            overridden: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> TemplateId {
        self.id
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// True when the body came from a user override rather than the
    /// built-in catalog.
    #[must_use]
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Same id and version, different body.
    #[must_use]
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            id: self.id,
            version: self.version,
            body: Cow::Owned(body.into()),
            overridden: true,
        }
    }

    /// Distinct placeholder names in the body, sorted.
    #[must_use]
    pub fn placeholders(&self) -> Vec<String> {
        scan(&self.body).into_iter().collect()
    }

    /// Placeholders in the body with no binding.
    #[must_use]
    pub fn unresolved(&self, bindings: &Bindings) -> Vec<String> {
        scan(&self.body)
            .into_iter()
            .filter(|name| bindings.get(name).is_none())
            .collect()
    }

    /// Render the body with `bindings`.
    ///
    /// # Errors
    ///
    /// In [`RenderMode::Strict`], returns [`TemplateError::Unresolved`] if
    /// any placeholder has no binding.
    pub fn render(&self, bindings: &Bindings, mode: RenderMode) -> Result<String, TemplateError> {
        if mode == RenderMode::Strict {
            let missing = self.unresolved(bindings);
            if !missing.is_empty() {
                return Err(TemplateError::Unresolved {
                    template: self.id.key().into_owned(),
                    placeholders: missing,
                });
            }
        }

        let rendered = PLACEHOLDER.replace_all(&self.body, |caps: &Captures<'_>| {
            match bindings.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        });
        Ok(rendered.into_owned())
    }
}

fn scan(body: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect()
}
