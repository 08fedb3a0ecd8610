use crate::{
    descriptor::{
        DescriptorHandle, DescriptorInfo, HeapDesc, RangeDescriptorCopy, RootSignatureDesc,
        SimpleDescriptorCopy,
    },
    keys::{CallIndex, CommandListKey, FenceKey, HeapKey, QueueKey, ResourceKey, RootSignatureKey},
    state::{InitialState, ResourceBarrier},
};

/// One intercepted API call, reduced to what the shadow state needs.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    CreateResource {
        resource: ResourceKey,
        initial: InitialState,
    },
    DestroyResource {
        resource: ResourceKey,
    },
    ResourceBarrier {
        command_list: Option<CommandListKey>,
        barriers: Vec<ResourceBarrier>,
    },
    ResourceUsage {
        command_list: CommandListKey,
        resources: Vec<ResourceKey>,
    },
    ResetCommandList {
        command_list: CommandListKey,
    },
    DestroyCommandList {
        command_list: CommandListKey,
    },
    CreateHeap {
        heap: HeapKey,
        desc: HeapDesc,
    },
    DestroyHeap {
        heap: HeapKey,
    },
    CreateDescriptor {
        handle: DescriptorHandle,
        info: DescriptorInfo,
    },
    CopyDescriptorsSimple(SimpleDescriptorCopy),
    CopyDescriptors(RangeDescriptorCopy),
    CreateRootSignature {
        root_signature: RootSignatureKey,
        desc: RootSignatureDesc,
    },
    DestroyRootSignature {
        root_signature: RootSignatureKey,
    },
    ExecuteCommandLists {
        queue: QueueKey,
        command_lists: Vec<CommandListKey>,
    },
    CommandQueueWait {
        queue: QueueKey,
        fence: FenceKey,
        value: u64,
    },
    CommandQueueSignal {
        queue: QueueKey,
        fence: FenceKey,
        value: u64,
    },
    DestroyQueue {
        queue: QueueKey,
    },
    CreateFence {
        fence: FenceKey,
        initial_value: u64,
    },
    FenceSignal {
        fence: FenceKey,
        value: u64,
    },
    DestroyFence {
        fence: FenceKey,
    },
}

/// An event tagged with the call that produced it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub call: CallIndex,
    pub event: CaptureEvent,
}

impl Recorded {
    pub fn new(call: CallIndex, event: CaptureEvent) -> Self {
        Self { call, event }
    }
}
