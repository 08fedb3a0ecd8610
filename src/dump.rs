use std::collections::HashSet;

use crate::{
    descriptor::{DescriptorHandle, ViewType},
    keys::{CommandListKey, HeapKey, ResourceKey, RootSignatureKey},
    order::UsageStamp,
    session::CaptureSession,
    state::ResourceState,
};

/// A descriptor table bound for the captured command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableBinding {
    pub param_index: usize,
    pub base: DescriptorHandle,
}

/// Bindings in effect for one captured draw or dispatch.
#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub command_list: Option<CommandListKey>,
    pub root_signature: RootSignatureKey,
    pub tables: Vec<TableBinding>,
    /// Heaps shaders may index directly through the root signature.
    pub bindless_heaps: Vec<HeapKey>,
    pub render_targets: Vec<DescriptorHandle>,
    pub depth_stencil: Option<DescriptorHandle>,
}

impl DumpRequest {
    pub fn new(command_list: Option<CommandListKey>, root_signature: RootSignatureKey) -> Self {
        Self {
            command_list,
            root_signature,
            tables: Vec::new(),
            bindless_heaps: Vec::new(),
            render_targets: Vec::new(),
            depth_stencil: None,
        }
    }

    pub fn table(mut self, param_index: usize, base: DescriptorHandle) -> Self {
        self.tables.push(TableBinding { param_index, base });
        self
    }

    pub fn bindless_heap(mut self, heap: HeapKey) -> Self {
        self.bindless_heaps.push(heap);
        self
    }

    pub fn render_target(mut self, handle: DescriptorHandle) -> Self {
        self.render_targets.push(handle);
        self
    }

    pub fn depth_stencil(mut self, handle: DescriptorHandle) -> Self {
        self.depth_stencil = Some(handle);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTarget {
    pub resource: ResourceKey,
    pub view: ViewType,
    pub handle: DescriptorHandle,
    /// Whole-resource state, `None` when only individual subresources have one.
    pub state: Option<ResourceState>,
    pub subresource_states: Vec<(u32, ResourceState)>,
    pub usage: UsageStamp,
}

/// Writable outputs of a captured command, least recently used first.
#[derive(Debug, Default)]
pub struct DumpPlan {
    pub targets: Vec<DumpTarget>,
}

impl DumpPlan {
    pub fn build(session: &CaptureSession, request: &DumpRequest) -> Self {
        #[cfg(feature = "tracing")]
        let _span = tracy_client::span!("build_dump_plan");

        let root_signatures = session.root_signatures();
        let descriptors = session.descriptors();
        let check_retrieved = session.config().check_retrieved;
        root_signatures.reset_all_retrieved();

        let mut handles: Vec<DescriptorHandle> = Vec::new();

        for table in &request.tables {
            let Some(heap) = descriptors.heap_desc(table.base.heap) else {
                log::warn!(
                    "descriptor table {} bound from untracked heap {:?}",
                    table.param_index,
                    table.base.heap
                );
                continue;
            };
            let indexes = root_signatures.get_descriptor_table_indexes(
                request.root_signature,
                table.base.heap,
                table.param_index,
                table.base.index,
                heap.num_descriptors,
                check_retrieved,
            );
            handles.extend(
                indexes
                    .into_iter()
                    .map(|index| DescriptorHandle::new(table.base.heap, index)),
            );
        }

        for &heap_key in &request.bindless_heaps {
            let Some(heap) = descriptors.heap_desc(heap_key) else {
                log::warn!("bindless access to untracked heap {:?}", heap_key);
                continue;
            };
            let indexes = root_signatures.get_bindless_descriptor_indexes(
                request.root_signature,
                heap_key,
                heap.heap_type,
                heap.num_descriptors,
                check_retrieved,
            );
            handles.extend(
                indexes
                    .into_iter()
                    .map(|index| DescriptorHandle::new(heap_key, index)),
            );
        }

        handles.extend(request.render_targets.iter().copied());
        handles.extend(request.depth_stencil);

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for handle in handles {
            let Some(info) = descriptors.get_descriptor_info(handle) else {
                continue;
            };
            let Some(resource) = info.resource else {
                continue;
            };
            if !info.view.is_writable() || !seen.insert(resource) {
                continue;
            }
            if !session.states().contains(resource) {
                log::debug!(
                    "descriptor {:?} points at destroyed resource {:?}",
                    handle,
                    resource
                );
                continue;
            }
            let Some(entry) = session
                .states()
                .resource_entry(request.command_list, resource)
            else {
                continue;
            };

            targets.push(DumpTarget {
                resource,
                view: info.view,
                handle,
                state: entry.whole(),
                subresource_states: entry.subresources().to_vec(),
                usage: session.usage().usage(resource).unwrap_or_default(),
            });
        }

        targets.sort_by_key(|target| target.usage);
        log::debug!("Dump plan has {} writable targets", targets.len());
        Self { targets }
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceKey> + '_ {
        self.targets.iter().map(|target| target.resource)
    }
}
