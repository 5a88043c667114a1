//! Tag name → environment tag id resolution.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use flowsync_core::types::{Tag, TagId};
use flowsync_remote::{RemoteError, WorkflowStore};

/// Result of resolving a set of tag names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagResolution {
    /// One id per distinct desired name, in first-seen order.
    pub ids: Vec<TagId>,
    /// Tags that did not exist and were created.
    pub created: Vec<Tag>,
}

/// Resolve `desired` names against a catalog fetched once, creating any
/// name that is missing.
///
/// Duplicate names collapse to one id. Nothing is fetched when `desired` is
/// empty.
pub fn resolve_tags<F, C, E>(desired: &[&str], fetch: F, mut create: C) -> Result<TagResolution, E>
where
    F: FnOnce() -> Result<Vec<Tag>, E>,
    C: FnMut(&str) -> Result<Tag, E>,
{
    let mut resolution = TagResolution::default();
    if desired.is_empty() {
        return Ok(resolution);
    }

    let mut catalog: HashMap<String, TagId> =
        fetch()?.into_iter().map(|tag| (tag.name, tag.id)).collect();
    let mut seen = HashSet::new();

    for &name in desired {
        if !seen.insert(name) {
            continue;
        }
        let id = match catalog.get(name) {
            Some(id) => id.clone(),
            None => {
                let tag = create(name)?;
                tracing::info!("created tag \"{}\" ({})", tag.name, tag.id);
                catalog.insert(tag.name.clone(), tag.id.clone());
                let id = tag.id.clone();
                resolution.created.push(tag);
                id
            }
        };
        if !resolution.ids.contains(&id) {
            resolution.ids.push(id);
        }
    }
    Ok(resolution)
}

/// [`resolve_tags`] against a store, with a fresh catalog per call.
pub fn resolve_with_store(
    store: &dyn WorkflowStore,
    desired: &[&str],
) -> Result<TagResolution, RemoteError> {
    resolve_tags(desired, || store.list_tags(), |name| store.create_tag(name))
}

/// A tag catalog shared by concurrent deploys.
///
/// The catalog is fetched on first use and every resolution holds the lock
/// for its whole fetch-or-create sequence, so two workers can never both
/// create the same new tag.
#[derive(Debug, Default)]
pub struct SharedTagCatalog {
    known: Mutex<Option<HashMap<String, TagId>>>,
}

impl SharedTagCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        store: &dyn WorkflowStore,
        desired: &[&str],
    ) -> Result<TagResolution, RemoteError> {
        if desired.is_empty() {
            return Ok(TagResolution::default());
        }
        let mut guard = self.known.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.is_none() {
            let fetched: HashMap<String, TagId> = store
                .list_tags()?
                .into_iter()
                .map(|tag| (tag.name, tag.id))
                .collect();
            *guard = Some(fetched);
        }
        let catalog = guard.get_or_insert_with(HashMap::new);

        let snapshot: Vec<Tag> = catalog
            .iter()
            .map(|(name, id)| Tag {
                id: id.clone(),
                name: name.clone(),
            })
            .collect();
        // Record each creation as it happens; a later failure in this call
        // must not hide tags that already exist remotely.
        resolve_tags(desired, || Ok(snapshot), |name| {
            let tag = store.create_tag(name)?;
            catalog.insert(tag.name.clone(), tag.id.clone());
            Ok(tag)
        })
    }
}
