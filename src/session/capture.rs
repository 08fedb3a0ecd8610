use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::{
    config::TrackerConfig,
    descriptor::{DescriptorHeapTracker, DescriptorRootSignatureService},
    keys::CallIndex,
    order::ResourceUsageTrackingService,
    state::ResourceStateTracker,
};

use super::events::{CaptureEvent, Recorded};

/// Shadow GPU state for one capture session. Routes every intercepted call to
/// each tracker that has to see it.
pub struct CaptureSession {
    config: TrackerConfig,
    states: ResourceStateTracker,
    descriptors: DescriptorHeapTracker,
    root_signatures: Arc<DescriptorRootSignatureService>,
    usage: ResourceUsageTrackingService,
    recorder_tx: Sender<Recorded>,
    recorder_rx: Receiver<Recorded>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl CaptureSession {
    pub fn new(config: TrackerConfig) -> Self {
        let (recorder_tx, recorder_rx) = unbounded();
        log::debug!(
            "Starting capture session (descriptor copies: {}, check retrieved: {})",
            config.descriptor_copy_policy,
            config.check_retrieved
        );
        Self {
            config,
            states: ResourceStateTracker::default(),
            descriptors: DescriptorHeapTracker::new(config.descriptor_copy_policy),
            root_signatures: Arc::new(DescriptorRootSignatureService::default()),
            usage: ResourceUsageTrackingService::default(),
            recorder_tx,
            recorder_rx,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn states(&self) -> &ResourceStateTracker {
        &self.states
    }

    pub fn descriptors(&self) -> &DescriptorHeapTracker {
        &self.descriptors
    }

    /// Shared handle; root signatures may be registered from any thread.
    pub fn root_signatures(&self) -> &Arc<DescriptorRootSignatureService> {
        &self.root_signatures
    }

    pub fn usage(&self) -> &ResourceUsageTrackingService {
        &self.usage
    }

    /// Sender for interception threads. Events are applied by [`pump`].
    ///
    /// [`pump`]: CaptureSession::pump
    pub fn recorder(&self) -> Sender<Recorded> {
        self.recorder_tx.clone()
    }

    /// Applies every event queued on the recorder channel, in receive order.
    pub fn pump(&mut self) -> usize {
        #[cfg(feature = "tracing")]
        let _span = tracy_client::span!("pump_capture_events");

        let mut applied = 0;
        while let Ok(recorded) = self.recorder_rx.try_recv() {
            self.apply(recorded.call, recorded.event);
            applied += 1;
        }
        applied
    }

    pub fn apply(&mut self, call: CallIndex, event: CaptureEvent) {
        log::trace!("[{}] {:?}", call, event);
        match event {
            CaptureEvent::CreateResource { resource, initial } => {
                self.states.add_resource(resource, initial);
                self.usage.add_resource(resource);
            }
            CaptureEvent::DestroyResource { resource } => {
                self.states.destroy_resource(resource);
                self.usage.destroy_resource(resource);
            }
            CaptureEvent::ResourceBarrier {
                command_list,
                barriers,
            } => self.states.resource_barrier(command_list, &barriers),
            CaptureEvent::ResourceUsage {
                command_list,
                resources,
            } => self
                .usage
                .command_list_resources_usage(command_list, &resources),
            CaptureEvent::ResetCommandList { command_list } => {
                self.states.command_list_reset(command_list);
                self.usage.command_list_reset(command_list);
            }
            CaptureEvent::DestroyCommandList { command_list } => {
                self.states.destroy_command_list(command_list);
                self.usage.destroy_command_list(command_list);
            }
            CaptureEvent::CreateHeap { heap, desc } => self.descriptors.create_heap(heap, desc),
            CaptureEvent::DestroyHeap { heap } => {
                self.descriptors.destroy_heap(heap);
                self.root_signatures.destroy_heap(heap);
            }
            CaptureEvent::CreateDescriptor { handle, info } => {
                self.descriptors.create_descriptor(handle, info)
            }
            CaptureEvent::CopyDescriptorsSimple(copy) => {
                self.descriptors.copy_descriptors_simple(&copy)
            }
            CaptureEvent::CopyDescriptors(copy) => self.descriptors.copy_descriptors(&copy),
            CaptureEvent::CreateRootSignature {
                root_signature,
                desc,
            } => self
                .root_signatures
                .create_root_signature(root_signature, desc),
            CaptureEvent::DestroyRootSignature { root_signature } => self
                .root_signatures
                .destroy_root_signature(root_signature),
            CaptureEvent::ExecuteCommandLists {
                queue,
                command_lists,
            } => {
                self.states.execute_command_lists(&command_lists);
                self.usage
                    .execute_command_lists(call, queue, &command_lists);
            }
            CaptureEvent::CommandQueueWait {
                queue,
                fence,
                value,
            } => self.usage.command_queue_wait(call, queue, fence, value),
            CaptureEvent::CommandQueueSignal {
                queue,
                fence,
                value,
            } => self.usage.command_queue_signal(call, queue, fence, value),
            CaptureEvent::DestroyQueue { queue } => self.usage.destroy_queue(queue),
            CaptureEvent::CreateFence {
                fence,
                initial_value,
            } => self.usage.create_fence(fence, initial_value),
            CaptureEvent::FenceSignal { fence, value } => {
                self.usage.fence_signal(call, fence, value)
            }
            CaptureEvent::DestroyFence { fence } => self.usage.destroy_fence(fence),
        }
    }
}
