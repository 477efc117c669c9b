use ideaforge_prompt_template::{TemplateCatalog, TemplateId};
use ideaforge_utils::error::StoreError;
use ideaforge_utils::types::UnitName;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

use crate::KeyValueStore;

/// A recognised settings key.
///
/// | Key | Meaning |
/// |-----|---------|
/// | `prompt.planner`, `prompt.assembly`, `prompt.<Unit>` | template body override |
/// | `unit.<Unit>.enabled` | `true`/`false` toggle, default `true` |
/// | `refdoc.<backend>.<Unit>` | reference documentation for a backend/unit pair |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsKey {
    Prompt(TemplateId),
    UnitEnabled(UnitName),
    ReferenceDoc { backend: String, unit: UnitName },
}

impl SettingsKey {
    /// Check `value` is acceptable for this key.
    ///
    /// # Errors
    ///
    /// Toggle values other than `true`/`false`.
    pub fn validate_value(&self, value: &str) -> Result<(), StoreError> {
        if let Self::UnitEnabled(_) = self {
            parse_bool(value).ok_or_else(|| StoreError::InvalidValue {
                key: self.to_string(),
                value: value.to_string(),
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prompt(TemplateId::Unit(unit)) => write!(f, "prompt.{unit}"),
            Self::Prompt(id) => write!(f, "prompt.{id}"),
            Self::UnitEnabled(unit) => write!(f, "unit.{unit}.enabled"),
            Self::ReferenceDoc { backend, unit } => write!(f, "refdoc.{backend}.{unit}"),
        }
    }
}

impl FromStr for SettingsKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidKey(s.to_string());
        let (kind, rest) = s.split_once('.').ok_or_else(invalid)?;
        match kind {
            "prompt" => rest
                .parse::<TemplateId>()
                .map(Self::Prompt)
                .map_err(|_| invalid()),
            "unit" => rest
                .strip_suffix(".enabled")
                .and_then(|unit| unit.parse::<UnitName>().ok())
                .map(Self::UnitEnabled)
                .ok_or_else(invalid),
            // The backend may itself contain dots (next.js); the unit is the
            // last segment.
            "refdoc" => {
                let (backend, unit) = rest.rsplit_once('.').ok_or_else(invalid)?;
                if backend.is_empty() {
                    return Err(invalid());
                }
                let unit = unit.parse::<UnitName>().map_err(|_| invalid())?;
                Ok(Self::ReferenceDoc {
                    backend: backend.to_ascii_lowercase(),
                    unit,
                })
            }
            _ => Err(invalid()),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Typed view over a [`KeyValueStore`].
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings").finish_non_exhaustive()
    }
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// # Errors
    ///
    /// Store failure.
    pub fn prompt_override(&self, id: TemplateId) -> Result<Option<String>, StoreError> {
        let key = SettingsKey::Prompt(id).to_string();
        Ok(self.store.get(&key)?.filter(|body| !body.trim().is_empty()))
    }

    /// # Errors
    ///
    /// Store failure.
    pub fn set_prompt_override(&self, id: TemplateId, body: &str) -> Result<(), StoreError> {
        self.store.set(&SettingsKey::Prompt(id).to_string(), body)
    }

    /// Unset toggles count as enabled. An unreadable toggle value is treated
    /// as enabled and logged.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn is_unit_enabled(&self, unit: UnitName) -> Result<bool, StoreError> {
        let key = SettingsKey::UnitEnabled(unit).to_string();
        match self.store.get(&key)? {
            None => Ok(true),
            Some(raw) => match parse_bool(&raw) {
                Some(enabled) => Ok(enabled),
                None => {
                    warn!(key = %key, value = %raw, "Ignoring unreadable unit toggle");
                    Ok(true)
                }
            },
        }
    }

    /// # Errors
    ///
    /// Store failure.
    pub fn set_unit_enabled(&self, unit: UnitName, enabled: bool) -> Result<(), StoreError> {
        self.store.set(
            &SettingsKey::UnitEnabled(unit).to_string(),
            if enabled { "true" } else { "false" },
        )
    }

    /// Units whose toggle is off.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn disabled_units(&self) -> Result<BTreeSet<UnitName>, StoreError> {
        let mut disabled = BTreeSet::new();
        for unit in UnitName::all() {
            if !self.is_unit_enabled(unit)? {
                disabled.insert(unit);
            }
        }
        Ok(disabled)
    }

    /// Custom reference documentation for `(backend, unit)`; the backend
    /// name is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn reference_doc(&self, backend: &str, unit: UnitName) -> Result<Option<String>, StoreError> {
        let key = SettingsKey::ReferenceDoc {
            backend: backend.trim().to_ascii_lowercase(),
            unit,
        };
        Ok(self
            .store
            .get(&key.to_string())?
            .filter(|doc| !doc.trim().is_empty()))
    }

    /// # Errors
    ///
    /// Store failure.
    pub fn set_reference_doc(&self, backend: &str, unit: UnitName, doc: &str) -> Result<(), StoreError> {
        let key = SettingsKey::ReferenceDoc {
            backend: backend.trim().to_ascii_lowercase(),
            unit,
        };
        self.store.set(&key.to_string(), doc)
    }

    /// The built-in catalog with every stored prompt override applied.
    ///
    /// # Errors
    ///
    /// Store failure.
    pub fn template_catalog(&self) -> Result<TemplateCatalog, StoreError> {
        let mut catalog = TemplateCatalog::builtin();
        for id in TemplateId::all() {
            if let Some(body) = self.prompt_override(id)? {
                catalog.set_override(id, body);
            }
        }
        Ok(catalog)
    }

    /// Validated write used by `ideaforge settings set`.
    ///
    /// # Errors
    ///
    /// Unknown key, invalid value or store failure.
    pub fn set_raw(&self, key: &str, value: &str) -> Result<SettingsKey, StoreError> {
        let parsed: SettingsKey = key.parse()?;
        parsed.validate_value(value)?;
        self.store.set(&parsed.to_string(), value)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn settings() -> Settings {
        Settings::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(
            "prompt.planner".parse::<SettingsKey>().unwrap(),
            SettingsKey::Prompt(TemplateId::Planner)
        );
        assert_eq!(
            "prompt.SchemaAgent".parse::<SettingsKey>().unwrap(),
            SettingsKey::Prompt(TemplateId::Unit(UnitName::Schema))
        );
        assert_eq!(
            "unit.RoadmapAgent.enabled".parse::<SettingsKey>().unwrap(),
            SettingsKey::UnitEnabled(UnitName::Roadmap)
        );
        assert_eq!(
            "refdoc.Convex.SchemaAgent".parse::<SettingsKey>().unwrap(),
            SettingsKey::ReferenceDoc {
                backend: "convex".into(),
                unit: UnitName::Schema
            }
        );
        assert!("unit.FooAgent.enabled".parse::<SettingsKey>().is_err());
        assert!("theme".parse::<SettingsKey>().is_err());
    }

    #[test]
    fn test_key_display_round_trips() {
        for key in [
            "prompt.assembly",
            "prompt.PersonaAgent",
            "unit.UserFlowAgent.enabled",
            "refdoc.supabase.ApiDesignAgent",
        ] {
            assert_eq!(key.parse::<SettingsKey>().unwrap().to_string(), key);
        }
    }

    #[test]
    fn test_backend_with_dots_in_reference_key() {
        assert_eq!(
            "refdoc.Next.js.SchemaAgent".parse::<SettingsKey>().unwrap(),
            SettingsKey::ReferenceDoc {
                backend: "next.js".into(),
                unit: UnitName::Schema
            }
        );
        assert!("refdoc..SchemaAgent".parse::<SettingsKey>().is_err());
        assert!("refdoc.SchemaAgent".parse::<SettingsKey>().is_err());

        let s = settings();
        s.set_raw("refdoc.next.js.ApiDesignAgent", "Use route handlers").unwrap();
        assert_eq!(
            s.reference_doc("Next.js", UnitName::ApiDesign).unwrap().as_deref(),
            Some("Use route handlers")
        );
    }

    #[test]
    fn test_units_enabled_by_default() {
        let s = settings();
        assert!(s.is_unit_enabled(UnitName::Persona).unwrap());
        assert!(s.disabled_units().unwrap().is_empty());

        s.set_unit_enabled(UnitName::Persona, false).unwrap();
        assert!(!s.is_unit_enabled(UnitName::Persona).unwrap());
        assert_eq!(
            s.disabled_units().unwrap().into_iter().collect::<Vec<_>>(),
            vec![UnitName::Persona]
        );
    }

    #[test]
    fn test_reference_doc_is_case_insensitive_on_backend() {
        let s = settings();
        s.set_reference_doc("Supabase", UnitName::Schema, "Use RLS").unwrap();
        assert_eq!(
            s.reference_doc("SUPABASE", UnitName::Schema).unwrap().as_deref(),
            Some("Use RLS")
        );
        assert_eq!(s.reference_doc("convex", UnitName::Schema).unwrap(), None);
    }

    #[test]
    fn test_catalog_applies_overrides() {
        let s = settings();
        s.set_prompt_override(TemplateId::Unit(UnitName::Roadmap), "Roadmap for {{USER_IDEA}}")
            .unwrap();
        let catalog = s.template_catalog().unwrap();
        let t = catalog.get(TemplateId::Unit(UnitName::Roadmap)).unwrap();
        assert!(t.is_overridden());
        assert_eq!(t.body(), "Roadmap for {{USER_IDEA}}");
        assert!(!catalog.get(TemplateId::Planner).unwrap().is_overridden());
    }

    #[test]
    fn test_set_raw_validates() {
        let s = settings();
        assert!(matches!(
            s.set_raw("unit.SchemaAgent.enabled", "maybe"),
            Err(StoreError::InvalidValue { .. })
        ));
        assert!(matches!(s.set_raw("colour", "red"), Err(StoreError::InvalidKey(_))));
        s.set_raw("unit.SchemaAgent.enabled", "off").unwrap();
        assert!(!s.is_unit_enabled(UnitName::Schema).unwrap());
    }
}
