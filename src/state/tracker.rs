use std::collections::HashSet;

use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::keys::{CommandListKey, ResourceKey};

use super::flags::{ALL_SUBRESOURCES, BarrierLayout, InitialState, ResourceBarrier, ResourceState};

/// Per-resource state: an optional whole-resource value plus explicit
/// per-subresource overrides. Setting the whole-resource value drops every
/// override first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceStateEntry {
    all: Option<ResourceState>,
    subresources: SmallVec<[(u32, ResourceState); 4]>,
}

impl ResourceStateEntry {
    pub fn uniform(state: ResourceState) -> Self {
        Self {
            all: Some(state),
            subresources: SmallVec::new(),
        }
    }

    pub fn set(&mut self, subresource: u32, state: ResourceState) {
        if subresource == ALL_SUBRESOURCES {
            self.subresources.clear();
            self.all = Some(state);
            return;
        }
        match self.subresources.iter_mut().find(|(i, _)| *i == subresource) {
            Some(entry) => entry.1 = state,
            None => self.subresources.push((subresource, state)),
        }
    }

    /// Exact subresource entry, else the whole-resource fallback.
    pub fn get(&self, subresource: u32) -> Option<ResourceState> {
        if subresource != ALL_SUBRESOURCES
            && let Some((_, state)) = self.subresources.iter().find(|(i, _)| *i == subresource)
        {
            return Some(*state);
        }
        self.all
    }

    pub fn whole(&self) -> Option<ResourceState> {
        self.all
    }

    pub fn subresources(&self) -> &[(u32, ResourceState)] {
        &self.subresources
    }

    /// Replays this entry on top of `target` with the same semantics as the
    /// barriers that built it.
    fn merge_into(&self, target: &mut ResourceStateEntry) {
        if let Some(all) = self.all {
            target.set(ALL_SUBRESOURCES, all);
        }
        for &(subresource, state) in &self.subresources {
            target.set(subresource, state);
        }
    }
}

type StateTable = SecondaryMap<ResourceKey, ResourceStateEntry>;

/// Shadow copy of resource barrier state. Barriers recorded into a command list
/// live in that list's overlay until the list is executed.
#[derive(Default)]
pub struct ResourceStateTracker {
    global: StateTable,
    overlays: SecondaryMap<CommandListKey, StateTable>,
    reported_layouts: HashSet<u32>,
}

impl ResourceStateTracker {
    pub fn add_resource(&mut self, key: ResourceKey, initial: impl Into<InitialState>) {
        let state = match initial.into() {
            InitialState::State(state) => state,
            InitialState::Layout(layout) => self.layout_to_state(layout),
        };
        log::trace!("Tracking resource {:?} in {}", key, state);
        self.global.insert(key, ResourceStateEntry::uniform(state));
    }

    pub fn destroy_resource(&mut self, key: ResourceKey) {
        if self.global.remove(key).is_some() {
            log::trace!("Stopped tracking resource {:?}", key);
        }
        for (_, overlay) in self.overlays.iter_mut() {
            overlay.remove(key);
        }
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.global.contains_key(key)
    }

    pub fn resource_barrier(
        &mut self,
        command_list: Option<CommandListKey>,
        barriers: &[ResourceBarrier],
    ) {
        let table = match command_list {
            Some(list) => self
                .overlays
                .entry(list)
                .expect("stale command list key")
                .or_default(),
            None => &mut self.global,
        };

        for barrier in barriers {
            match *barrier {
                ResourceBarrier::Transition {
                    resource,
                    subresource,
                    after,
                    ..
                } => entry_mut(table, resource).set(subresource, after),
                ResourceBarrier::Uav {
                    resource: Some(resource),
                } => entry_mut(table, resource)
                    .set(ALL_SUBRESOURCES, ResourceState::UNORDERED_ACCESS),
                ResourceBarrier::Uav { resource: None } | ResourceBarrier::Aliasing { .. } => {}
            }
        }
    }

    /// Makes the overlays of `lists` real, in order, so a later list wins.
    pub fn execute_command_lists(&mut self, lists: &[CommandListKey]) {
        for &list in lists {
            let Some(overlay) = self.overlays.remove(list) else {
                continue;
            };
            log::trace!(
                "Merging {} barrier entries from command list {:?}",
                overlay.len(),
                list
            );
            for (resource, entry) in overlay.iter() {
                entry.merge_into(entry_mut(&mut self.global, resource));
            }
        }
    }

    /// Drops the speculative barriers of a list that is reset or released
    /// without having been executed.
    pub fn command_list_reset(&mut self, list: CommandListKey) {
        self.overlays.remove(list);
    }

    pub fn destroy_command_list(&mut self, list: CommandListKey) {
        self.command_list_reset(list);
    }

    /// The entry a lookup through `command_list` reads: the list's overlay
    /// entry when it has one, else the global entry.
    pub fn resource_entry(
        &self,
        command_list: Option<CommandListKey>,
        key: ResourceKey,
    ) -> Option<&ResourceStateEntry> {
        command_list
            .and_then(|list| self.overlays.get(list))
            .and_then(|overlay| overlay.get(key))
            .or_else(|| self.global.get(key))
    }

    /// Panics when the resource was never registered or the selected entry
    /// cannot answer for `subresource`; either means the shadow state no
    /// longer matches the application.
    #[track_caller]
    pub fn get_resource_state(
        &self,
        command_list: Option<CommandListKey>,
        key: ResourceKey,
        subresource: u32,
    ) -> ResourceState {
        let Some(entry) = self.resource_entry(command_list, key) else {
            panic!("no state tracked for resource {:?}", key);
        };
        match entry.get(subresource) {
            Some(state) => state,
            None => panic!(
                "resource {:?} has no state for subresource {} and no whole-resource state",
                key, subresource
            ),
        }
    }

    fn layout_to_state(&mut self, layout: BarrierLayout) -> ResourceState {
        match layout.to_resource_state() {
            Some(state) => state,
            None => {
                if self.reported_layouts.insert(layout.0) {
                    log::warn!(
                        "barrier layout {:#x} has no resource state equivalent, using COMMON",
                        layout.0
                    );
                }
                ResourceState::COMMON
            }
        }
    }
}

fn entry_mut(table: &mut StateTable, key: ResourceKey) -> &mut ResourceStateEntry {
    table
        .entry(key)
        .expect("stale resource key")
        .or_default()
}
