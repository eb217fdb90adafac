//! In-memory store used by the pipeline unit tests. Mirrors the Postgres
//! semantics the tests care about: criterion filtering, patch application,
//! the (documentary, platform) availability key, and additive tags.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::store::CatalogStore;
use super::{
    slugify, AssetWrites, AvailabilityFields, DocId, DocPatch, Documentary, NeedsCriterion,
    TaxonomyEntry, TaxonomyKind, TaxonomySeed, TranslateDirection, Upserted,
};

#[derive(Default)]
pub struct MemStore {
    pub docs: Mutex<BTreeMap<DocId, Documentary>>,
    pub availabilities: Mutex<BTreeMap<(DocId, i64), AvailabilityFields>>,
    pub taxonomy: Mutex<BTreeMap<TaxonomyKind, Vec<TaxonomyEntry>>>,
    pub tags: Mutex<BTreeMap<(DocId, TaxonomyKind), BTreeSet<i64>>>,
    pub assets_written: Mutex<Vec<(DocId, &'static str)>>,
    pub commits: Mutex<usize>,
}

impl MemStore {
    pub fn with_docs(docs: Vec<Documentary>) -> Self {
        let store = Self::default();
        {
            let mut map = store.docs.lock().unwrap();
            for doc in docs {
                map.insert(doc.id, doc);
            }
        }
        store
    }

    pub fn set_taxonomy(&self, kind: TaxonomyKind, names: &[&str]) {
        let entries = names
            .iter()
            .enumerate()
            .map(|(i, name)| TaxonomyEntry {
                id: (i + 1) as i64,
                name: (*name).to_string(),
                slug: slugify(name),
            })
            .collect();
        self.taxonomy.lock().unwrap().insert(kind, entries);
    }

    pub fn commit_count(&self) -> usize {
        *self.commits.lock().unwrap()
    }

    pub fn doc(&self, id: DocId) -> Documentary {
        self.docs.lock().unwrap().get(&id).cloned().unwrap()
    }

    pub fn tag_names(&self, id: DocId, kind: TaxonomyKind) -> Vec<String> {
        let tags = self.tags.lock().unwrap();
        let taxonomy = self.taxonomy.lock().unwrap();
        let ids = tags.get(&(id, kind)).cloned().unwrap_or_default();
        let entries = taxonomy.get(&kind).cloned().unwrap_or_default();
        entries
            .into_iter()
            .filter(|e| ids.contains(&e.id))
            .map(|e| e.name)
            .collect()
    }

    fn has_tags(&self, id: DocId, kind: TaxonomyKind) -> bool {
        self.tags
            .lock()
            .unwrap()
            .get(&(id, kind))
            .is_some_and(|s| !s.is_empty())
    }

    fn needs(&self, doc: &Documentary, criterion: NeedsCriterion, force: bool) -> bool {
        let availabilities = self.availabilities.lock().unwrap();
        let has_avail = availabilities.keys().any(|(d, _)| *d == doc.id);
        drop(availabilities);
        match criterion {
            NeedsCriterion::MissingExternalId => force || doc.tmdb_id.is_empty(),
            NeedsCriterion::MissingPoster { unpublished_only } => {
                (!unpublished_only || !doc.is_published) && (force || doc.poster.is_empty())
            }
            NeedsCriterion::ExternalIdMissingPoster => {
                !doc.tmdb_id.is_empty() && (force || doc.poster.is_empty())
            }
            NeedsCriterion::ExternalIdNoAvailability => {
                !doc.tmdb_id.is_empty() && (force || !has_avail)
            }
            NeedsCriterion::NoAvailability => force || !has_avail,
            NeedsCriterion::ExternalIdUntagged => {
                !doc.tmdb_id.is_empty()
                    && (force
                        || (!self.has_tags(doc.id, TaxonomyKind::Sport)
                            && !self.has_tags(doc.id, TaxonomyKind::Theme)))
            }
            NeedsCriterion::UntaggedWithSynopsis { unpublished_only } => {
                !doc.synopsis.is_empty()
                    && !doc.has_placeholder_synopsis()
                    && (!unpublished_only || !doc.is_published)
                    && (force
                        || (!self.has_tags(doc.id, TaxonomyKind::Sport)
                            && !self.has_tags(doc.id, TaxonomyKind::Theme)
                            && !self.has_tags(doc.id, TaxonomyKind::Region)))
            }
            NeedsCriterion::MissingTranslation(direction) => match direction {
                TranslateDirection::EnToFr => {
                    !doc.synopsis_en.is_empty() && (force || doc.synopsis.is_empty())
                }
                TranslateDirection::FrToEn => {
                    !doc.synopsis.is_empty() && (force || doc.synopsis_en.is_empty())
                }
            },
        }
    }
}

#[async_trait]
impl CatalogStore for MemStore {
    async fn find_needing(
        &self,
        criterion: NeedsCriterion,
        limit: usize,
        force: bool,
    ) -> Result<Vec<DocId>> {
        let docs: Vec<Documentary> = self.docs.lock().unwrap().values().cloned().collect();
        let mut matching: Vec<&Documentary> = docs
            .iter()
            .filter(|d| self.needs(d, criterion, force))
            .collect();
        matching.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.title.cmp(&b.title)));
        let mut ids: Vec<DocId> = matching.iter().map(|d| d.id).collect();
        if limit > 0 {
            ids.truncate(limit);
        }
        Ok(ids)
    }

    async fn load(&self, id: DocId) -> Result<Documentary> {
        self.docs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("no documentary {id}"))
    }

    async fn commit_patch(&self, id: DocId, patch: &DocPatch, assets: &AssetWrites) -> Result<()> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs.get_mut(&id).ok_or_else(|| anyhow!("no documentary {id}"))?;
        if let Some(v) = &patch.tmdb_id {
            doc.tmdb_id = v.clone();
        }
        if let Some(v) = &patch.imdb_id {
            doc.imdb_id = v.clone();
        }
        if let Some(v) = patch.imdb_rating {
            doc.imdb_rating = Some(v);
        }
        if let Some(v) = &patch.synopsis {
            doc.synopsis = v.clone();
        }
        if let Some(v) = &patch.synopsis_en {
            doc.synopsis_en = v.clone();
        }
        if let Some(v) = patch.duration_minutes {
            doc.duration_minutes = Some(v);
        }
        if let Some(v) = &patch.trailer_url {
            doc.trailer_url = v.clone();
        }
        let mut written = self.assets_written.lock().unwrap();
        if assets.poster.is_some() {
            doc.poster = format!("posters/{}-poster.jpg", doc.slug);
            written.push((id, "poster"));
        }
        if assets.backdrop.is_some() {
            doc.backdrop = format!("backdrops/{}-backdrop.jpg", doc.slug);
            written.push((id, "backdrop"));
        }
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }

    async fn upsert_availability(
        &self,
        documentary_id: DocId,
        platform_id: i64,
        fields: &AvailabilityFields,
    ) -> Result<Upserted> {
        let mut map = self.availabilities.lock().unwrap();
        let key = (documentary_id, platform_id);
        let outcome = if map.contains_key(&key) {
            Upserted::Updated
        } else {
            Upserted::Created
        };
        map.insert(key, fields.clone());
        Ok(outcome)
    }

    async fn list_taxonomy(&self, kind: TaxonomyKind) -> Result<Vec<TaxonomyEntry>> {
        Ok(self
            .taxonomy
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn attach_tags(
        &self,
        documentary_id: DocId,
        kind: TaxonomyKind,
        tag_ids: &[i64],
    ) -> Result<usize> {
        if kind == TaxonomyKind::Platform {
            bail!("platforms are linked via availabilities, not tags");
        }
        let known: BTreeSet<i64> = self
            .taxonomy
            .lock()
            .unwrap()
            .get(&kind)
            .map(|entries| entries.iter().map(|e| e.id).collect())
            .unwrap_or_default();
        for tag_id in tag_ids {
            if !known.contains(tag_id) {
                bail!("unknown {} tag id {tag_id}", kind.as_str());
            }
        }
        let mut tags = self.tags.lock().unwrap();
        let set = tags.entry((documentary_id, kind)).or_default();
        let mut added = 0usize;
        for tag_id in tag_ids {
            if set.insert(*tag_id) {
                added += 1;
            }
        }
        Ok(added)
    }

    async fn ensure_taxonomy_entry(
        &self,
        kind: TaxonomyKind,
        seed: &TaxonomySeed,
    ) -> Result<Upserted> {
        let slug = slugify(seed.name);
        let mut taxonomy = self.taxonomy.lock().unwrap();
        let entries = taxonomy.entry(kind).or_default();
        if entries.iter().any(|e| e.slug == slug) {
            return Ok(Upserted::Updated);
        }
        let id = (entries.len() + 1) as i64;
        entries.push(TaxonomyEntry {
            id,
            name: seed.name.to_string(),
            slug,
        });
        Ok(Upserted::Created)
    }
}
