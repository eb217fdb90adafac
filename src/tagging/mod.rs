//! Taxonomy tagging pipelines. Both are additive-only: tags may be attached
//! to entities, but no pipeline ever creates, renames, or removes a taxonomy
//! entry. That vocabulary belongs to the operators.

pub mod ai;
pub mod keywords;
