//! The eight document generation units.
//!
//! Every unit is the same [`GenerationUnit`] parameterized by a [`UnitSpec`]:
//! an output schema, a prompt template id, a temperature and a deterministic
//! JSON to markdown formatter. [`spec_for`] is the exhaustive dispatch table
//! from [`UnitName`](ideaforge_utils::types::UnitName) to those parameters.

mod context;
pub mod documents;
pub mod reference;
mod unit;

pub use context::UnitContext;
pub use documents::MarkdownDoc;
pub use reference::NO_SPECIFIC_DOCS;
pub use unit::{GenerationUnit, UnitSpec, spec_for};
