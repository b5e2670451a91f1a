//! Defines the sync cycle: the process by which an upstream change to an
//! external asset is carried over to the replicas that follow it.
//!
//! A cycle never edits a stored replica directly. It works on a copy from the
//! store, and only hands that copy back once every step has succeeded, so a
//! failed cycle leaves both the replica and its recorded history untouched.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    error::{ErrorDisplay, LinkStateError, SyncError},
    facet::FacetRegistry,
    link::PersistentLink,
    settings::SyncSettings,
    snapshot::{
        apply_patch_set, compute_patch_set, AppliedPatchSet, FlatIndex, NodeId, NodeSnapshot,
        NodeTree, PatchSet,
    },
    store::{AssetHandle, AssetProvider, AssetStore},
};

/// Handed to observers once per cycle, after the patch is applied and before
/// the replica is committed. Edits made through `tree` are committed along
/// with the patch.
pub struct SyncApplied<'a> {
    pub tree: &'a mut NodeTree,
    pub link_node: NodeId,
    pub link: &'a PersistentLink,
    pub touched: &'a BTreeSet<NodeId>,
}

type SyncObserver = Box<dyn FnMut(&mut SyncApplied<'_>)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub patch_set: PatchSet,
    pub applied: AppliedPatchSet,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.patch_set.needs_update()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The replica is not bound to an external asset; nothing was done.
    Unlinked,

    /// The link was recorded without touching the replica's nodes.
    Bound,

    Synced(SyncReport),

    /// Auto-sync is off for this replica, so the change is left for a manual
    /// sync.
    PendingManual,
}

pub struct SyncController<P, S> {
    provider: P,
    store: S,
    registry: FacetRegistry,
    settings: SyncSettings,
    observers: Vec<SyncObserver>,
}

impl<P: AssetProvider, S: AssetStore> SyncController<P, S> {
    pub fn new(provider: P, store: S, settings: SyncSettings) -> Self {
        SyncController {
            provider,
            store,
            registry: FacetRegistry::from_settings(&settings),
            settings,
            observers: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: FacetRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn on_sync_applied(&mut self, observer: impl FnMut(&mut SyncApplied<'_>) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn registry(&self) -> &FacetRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Runs one sync cycle for the stored replica `replica`.
    pub fn sync(&mut self, replica: &AssetHandle) -> Result<SyncOutcome, SyncError> {
        let link_type = self.registry.link_type().to_owned();

        let mut working_copy = self.store.instantiate(replica)?;
        let (link_node, mut link) = PersistentLink::locate(&working_copy, &link_type)?;

        let external = match link.external_ref.clone() {
            Some(external) => external,
            None => {
                log::debug!("{} is not bound to an external asset, skipping", replica);
                return Ok(SyncOutcome::Unlinked);
            }
        };

        let report = self.run_cycle(&mut working_copy, link_node, &mut link, &external)?;

        link.write_to(&mut working_copy, link_node, &link_type)?;
        self.store.commit(replica, working_copy)?;

        if report.changed() {
            log::info!("Synced {} from {}", replica, external);
        }

        Ok(SyncOutcome::Synced(report))
    }

    /// Binds `replica` to `external`, or unbinds it when `external` is
    /// `None`. A link facet is attached to the replica root if it has none.
    ///
    /// Unbinding keeps the link's history. Binding a replica that has never
    /// been synced records the external asset's current state as the
    /// baseline without changing the replica. Binding one that has history
    /// syncs it right away.
    pub fn bind(
        &mut self,
        replica: &AssetHandle,
        external: Option<AssetHandle>,
    ) -> Result<SyncOutcome, SyncError> {
        let link_type = self.registry.link_type().to_owned();

        let mut working_copy = self.store.instantiate(replica)?;
        let existing = working_copy.find_facet_owner(&link_type);
        let (link_node, mut link) = match existing {
            Some(id) => (id, PersistentLink::read_from(&working_copy, id, &link_type)?),
            None => (working_copy.root_id(), PersistentLink::default()),
        };

        if link.external_ref == external && (existing.is_some() || external.is_none()) {
            log::debug!("{} is already bound to {:?}", replica, external);
            return Ok(match external {
                Some(_) => SyncOutcome::Bound,
                None => SyncOutcome::Unlinked,
            });
        }

        link.external_ref = external.clone();

        let outcome = match external {
            None => {
                log::info!("Unbound {}", replica);
                SyncOutcome::Unlinked
            }
            Some(external) if link.last_synced_snapshot.trim().is_empty() => {
                let external_tree = self.provider.load(&external)?;
                let baseline =
                    NodeSnapshot::capture(&external_tree, external_tree.root_id(), &self.registry)?;
                link.last_synced_snapshot = baseline.to_text();

                log::info!("Bound {} to {}", replica, external);
                SyncOutcome::Bound
            }
            Some(external) => {
                log::info!("Bound {} to {}, syncing", replica, external);
                let report = self.run_cycle(&mut working_copy, link_node, &mut link, &external)?;
                SyncOutcome::Synced(report)
            }
        };

        link.write_to(&mut working_copy, link_node, &link_type)?;
        self.store.commit(replica, working_copy)?;

        Ok(outcome)
    }

    /// Sets the replica's auto-sync flag. Turning it on from off syncs the
    /// replica immediately, and the report of that sync is returned.
    pub fn set_auto_sync(
        &mut self,
        replica: &AssetHandle,
        enabled: bool,
    ) -> Result<Option<SyncReport>, SyncError> {
        let link_type = self.registry.link_type().to_owned();

        let mut working_copy = self.store.instantiate(replica)?;
        let (link_node, mut link) = PersistentLink::locate(&working_copy, &link_type)?;

        if link.auto_sync == enabled {
            return Ok(None);
        }

        link.auto_sync = enabled;

        let report = match link.external_ref.clone() {
            Some(external) if enabled => {
                Some(self.run_cycle(&mut working_copy, link_node, &mut link, &external)?)
            }
            _ => None,
        };

        link.write_to(&mut working_copy, link_node, &link_type)?;
        self.store.commit(replica, working_copy)?;

        log::info!(
            "Auto-sync for {} is now {}",
            replica,
            if enabled { "on" } else { "off" }
        );

        Ok(report)
    }

    /// Reacts to a change in the external asset `external`. Every stored
    /// replica that follows it is synced if auto-sync is on both globally and
    /// for that replica, and reported as pending otherwise.
    ///
    /// Each replica succeeds or fails on its own; only a failure to list the
    /// store fails the whole call.
    pub fn external_changed(
        &mut self,
        external: &AssetHandle,
    ) -> Result<Vec<(AssetHandle, Result<SyncOutcome, SyncError>)>, SyncError> {
        let link_type = self.registry.link_type().to_owned();
        let mut results = Vec::new();

        for replica in self.store.handles()? {
            let working_copy = match self.store.instantiate(&replica) {
                Ok(tree) => tree,
                Err(err) => {
                    results.push((replica, Err(err.into())));
                    continue;
                }
            };

            let link = match PersistentLink::locate(&working_copy, &link_type) {
                Ok((_, link)) => link,
                Err(LinkStateError::MissingLink { .. }) => continue,
                Err(err) => {
                    log::warn!("Skipping {}: {}", replica, ErrorDisplay(&err));
                    results.push((replica, Err(err.into())));
                    continue;
                }
            };

            if link.external_ref.as_ref() != Some(external) {
                continue;
            }

            if !(self.settings.auto_sync_enabled && link.auto_sync) {
                log::debug!("{} follows {} but auto-sync is off", replica, external);
                results.push((replica, Ok(SyncOutcome::PendingManual)));
                continue;
            }

            let outcome = self.sync(&replica);
            if let Err(err) = &outcome {
                log::error!("Could not sync {}: {}", replica, ErrorDisplay(err));
            }

            results.push((replica, outcome));
        }

        Ok(results)
    }

    /// The body of a cycle, run against a working copy. On success the
    /// working copy is patched and `link` holds the new history, but neither
    /// is stored yet.
    fn run_cycle(
        &mut self,
        working_copy: &mut NodeTree,
        link_node: NodeId,
        link: &mut PersistentLink,
        external: &AssetHandle,
    ) -> Result<SyncReport, SyncError> {
        let old = NodeSnapshot::from_text(&link.last_synced_snapshot)?;

        let external_tree = self.provider.load(external)?;
        let new = NodeSnapshot::capture(&external_tree, external_tree.root_id(), &self.registry)?;
        let current = NodeSnapshot::capture(working_copy, link_node, &self.registry)?;

        let new_index = FlatIndex::build(&new);
        let mut current_index = FlatIndex::build(&current);

        let renames = link.resolve_renames(&current_index, &new_index);
        let old = if renames.is_empty() {
            old
        } else {
            current_index = FlatIndex::build(&current.relabel(&renames));
            old.relabel(&renames)
        };
        let old_index = FlatIndex::build(&old);

        let mut patch_set = compute_patch_set(
            &old_index,
            &new_index,
            &current_index,
            self.registry.placement_type(),
        );
        patch_set.renamed_nodes = renames.into_iter().collect();

        log::debug!(
            "Patch for {}: {} created, {} destroyed, {} renamed, {} reparented, {} facets removed, {} facets updated",
            external,
            patch_set.created_nodes.len(),
            patch_set.destroyed_nodes.len(),
            patch_set.renamed_nodes.len(),
            patch_set.reparented_nodes.len(),
            patch_set.removed_facets.len(),
            patch_set.updated_facets.len(),
        );

        let kinds = self.registry.kinds_for([&old, &new]);
        let applied = apply_patch_set(working_copy, link_node, &patch_set, &kinds)?;
        let touched = applied.touched_nodes();

        for observer in &mut self.observers {
            observer(&mut SyncApplied {
                tree: &mut *working_copy,
                link_node,
                link: &*link,
                touched: &touched,
            });
        }

        // Observers may have run for a while; record the asset as it is now.
        let latest_tree = self.provider.load(external)?;
        let latest = NodeSnapshot::capture(&latest_tree, latest_tree.root_id(), &self.registry)?;

        link.last_synced_snapshot = latest.to_text();
        link.name_overrides.clear();

        Ok(SyncReport { patch_set, applied })
    }
}
