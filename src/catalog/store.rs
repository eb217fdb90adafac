use anyhow::Result;
use async_trait::async_trait;

use super::{
    AssetWrites, AvailabilityFields, DocId, DocPatch, Documentary, NeedsCriterion, TaxonomyEntry,
    TaxonomyKind, TaxonomySeed, Upserted,
};

/// Narrow persistence contract consumed by every pipeline. Implementations
/// must make `commit_patch` atomic per entity and keep the availability
/// uniqueness key (documentary, platform); both invariants are what make
/// re-running a batch safe.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Ids of entities matching the criterion, in fixed driver order.
    /// `limit == 0` means unbounded; `force` drops the needs-filter while
    /// keeping the criterion's scope (e.g. "has a TMDB id").
    async fn find_needing(
        &self,
        criterion: NeedsCriterion,
        limit: usize,
        force: bool,
    ) -> Result<Vec<DocId>>;

    async fn load(&self, id: DocId) -> Result<Documentary>;

    /// Apply a sparse patch and any asset bytes in a single transaction.
    async fn commit_patch(&self, id: DocId, patch: &DocPatch, assets: &AssetWrites) -> Result<()>;

    /// Insert or update the (documentary, platform) availability row,
    /// refreshing url/is_free/country_codes/last_checked in place.
    async fn upsert_availability(
        &self,
        documentary_id: DocId,
        platform_id: i64,
        fields: &AvailabilityFields,
    ) -> Result<Upserted>;

    async fn list_taxonomy(&self, kind: TaxonomyKind) -> Result<Vec<TaxonomyEntry>>;

    /// Additive, idempotent M2M attach. Returns how many links were new.
    async fn attach_tags(
        &self,
        documentary_id: DocId,
        kind: TaxonomyKind,
        tag_ids: &[i64],
    ) -> Result<usize>;

    /// Operator seeding only; the pipelines never call this.
    async fn ensure_taxonomy_entry(
        &self,
        kind: TaxonomyKind,
        seed: &TaxonomySeed,
    ) -> Result<Upserted>;
}
