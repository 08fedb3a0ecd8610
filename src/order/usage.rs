use slotmap::SecondaryMap;

use crate::keys::{CallIndex, CommandListKey, FenceKey, QueueKey, ResourceKey};

use super::scheduler::ExecutionOrderTracker;

/// Position of a resource's latest GPU use. Compares by execute batch, then by
/// position inside the batch. Never-used resources hold the zero stamp.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UsageStamp {
    pub execute_number: u64,
    pub position: u32,
}

/// Resources touched by one `ExecuteCommandLists`, in recording order.
pub type UsageBatch = Vec<ResourceKey>;

/// Orders resources by when the GPU actually used them, honouring fence waits
/// between queues.
#[derive(Default)]
pub struct ResourceUsageTrackingService {
    usage: SecondaryMap<ResourceKey, UsageStamp>,
    command_lists: SecondaryMap<CommandListKey, UsageBatch>,
    scheduler: ExecutionOrderTracker<UsageBatch>,
    execute_number: u64,
}

impl ResourceUsageTrackingService {
    pub fn add_resource(&mut self, key: ResourceKey) {
        self.usage.insert(key, UsageStamp::default());
    }

    pub fn destroy_resource(&mut self, key: ResourceKey) {
        self.usage.remove(key);
    }

    pub fn usage(&self, key: ResourceKey) -> Option<UsageStamp> {
        self.usage.get(key).copied()
    }

    pub fn execute_number(&self) -> u64 {
        self.execute_number
    }

    pub fn scheduler(&self) -> &ExecutionOrderTracker<UsageBatch> {
        &self.scheduler
    }

    pub fn command_list_resource_usage(&mut self, list: CommandListKey, resource: ResourceKey) {
        self.list_log(list).push(resource);
    }

    pub fn command_list_resources_usage(
        &mut self,
        list: CommandListKey,
        resources: &[ResourceKey],
    ) {
        self.list_log(list).extend_from_slice(resources);
    }

    /// Must follow every reset of a command list so reuse starts with an empty log.
    pub fn command_list_reset(&mut self, list: CommandListKey) {
        if let Some(log) = self.command_lists.get_mut(list) {
            log.clear();
        }
    }

    pub fn destroy_command_list(&mut self, list: CommandListKey) {
        self.command_lists.remove(list);
    }

    pub fn create_fence(&mut self, fence: FenceKey, initial_value: u64) {
        self.scheduler.create_fence(fence, initial_value);
    }

    pub fn destroy_fence(&mut self, fence: FenceKey) {
        self.scheduler.destroy_fence(fence);
    }

    pub fn destroy_queue(&mut self, queue: QueueKey) {
        self.scheduler.destroy_queue(queue);
    }

    pub fn execute_command_lists(
        &mut self,
        call: CallIndex,
        queue: QueueKey,
        lists: &[CommandListKey],
    ) {
        let batch: UsageBatch = lists
            .iter()
            .filter_map(|&list| self.command_lists.get(list))
            .flatten()
            .copied()
            .collect();

        if self.scheduler.is_waiting(queue) {
            self.scheduler.execute(call, queue, batch);
        } else {
            self.update_usage(&batch);
        }
    }

    pub fn command_queue_wait(
        &mut self,
        call: CallIndex,
        queue: QueueKey,
        fence: FenceKey,
        value: u64,
    ) {
        self.scheduler.command_queue_wait(call, queue, fence, value);
        self.apply_ready();
    }

    pub fn command_queue_signal(
        &mut self,
        call: CallIndex,
        queue: QueueKey,
        fence: FenceKey,
        value: u64,
    ) {
        self.scheduler
            .command_queue_signal(call, queue, fence, value);
        self.apply_ready();
    }

    pub fn fence_signal(&mut self, call: CallIndex, fence: FenceKey, value: u64) {
        self.scheduler.fence_signal(call, fence, value);
        self.apply_ready();
    }

    /// Stamps every still-tracked resource of `batch` as one new execution.
    pub fn update_usage(&mut self, batch: &[ResourceKey]) {
        self.execute_number += 1;
        #[cfg(feature = "tracing")]
        tracy_client::plot!("execute number", self.execute_number as f64);

        for (position, &resource) in batch.iter().enumerate() {
            if let Some(stamp) = self.usage.get_mut(resource) {
                *stamp = UsageStamp {
                    execute_number: self.execute_number,
                    position: position as u32,
                };
            }
        }
    }

    /// Every tracked resource, least recently used first.
    pub fn get_ordered_resources(&self) -> Vec<ResourceKey> {
        let mut ordered: Vec<(ResourceKey, UsageStamp)> =
            self.usage.iter().map(|(key, stamp)| (key, *stamp)).collect();
        ordered.sort_by_key(|&(_, stamp)| stamp);
        ordered.into_iter().map(|(key, _)| key).collect()
    }

    fn apply_ready(&mut self) {
        for ready in self.scheduler.get_ready_executables() {
            log::trace!(
                "[{}] applying {} deferred resource uses from queue {:?}",
                ready.call,
                ready.payload.len(),
                ready.queue
            );
            self.update_usage(&ready.payload);
        }
    }

    fn list_log(&mut self, list: CommandListKey) -> &mut UsageBatch {
        self.command_lists
            .entry(list)
            .expect("stale command list key")
            .or_default()
    }
}
