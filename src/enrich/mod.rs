//! Batch enrichment pipelines. All of them share the same run model:
//! sequential, one entity at a time, per-entity error isolation, and a
//! printed summary. Re-running any pipeline is safe: the driver criteria
//! select only entities still missing the data, and writes are keyed so they
//! update in place.

pub mod availability;
pub mod metadata;
pub mod posters;
pub mod web;
