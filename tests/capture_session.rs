use shadowstate::{
    CaptureEvent, CaptureSession, CommandListKey, DumpPlan, DumpRequest, FenceKey, HeapKey,
    KeyArena, QueueKey, Recorded, ResourceKey, RootSignatureKey, TrackerConfig,
    descriptor::{
        DescriptorHandle, DescriptorInfo, DescriptorRange, HeapDesc, HeapType,
        RangeDescriptorCopy, RangeType, RootParameter, RootSignatureDesc, RootSignatureFlags,
        ViewType,
    },
    order::UsageStamp,
    state::{ALL_SUBRESOURCES, ResourceBarrier, ResourceState},
};

#[derive(Default)]
struct Keys {
    resources: KeyArena<ResourceKey>,
    lists: KeyArena<CommandListKey>,
    heaps: KeyArena<HeapKey>,
    root_signatures: KeyArena<RootSignatureKey>,
    queues: KeyArena<QueueKey>,
    fences: KeyArena<FenceKey>,
}

struct Capture {
    session: CaptureSession,
    keys: Keys,
    call: u64,
}

impl Capture {
    fn new() -> Self {
        Self {
            session: CaptureSession::new(TrackerConfig::default()),
            keys: Keys::default(),
            call: 0,
        }
    }

    /// Sends through the recorder channel and pumps, like an interception
    /// thread feeding the recording thread.
    fn emit(&mut self, event: CaptureEvent) {
        self.session
            .recorder()
            .send(Recorded::new(self.call, event))
            .unwrap();
        self.call += 1;
        assert_eq!(self.session.pump(), 1);
    }

    fn resource(&mut self, state: ResourceState) -> ResourceKey {
        let resource = self.keys.resources.allocate();
        self.emit(CaptureEvent::CreateResource {
            resource,
            initial: state.into(),
        });
        resource
    }

    fn heap(&mut self, num_descriptors: u32) -> HeapKey {
        let heap = self.keys.heaps.allocate();
        self.emit(CaptureEvent::CreateHeap {
            heap,
            desc: HeapDesc {
                heap_type: HeapType::CbvSrvUav,
                num_descriptors,
                shader_visible: true,
            },
        });
        heap
    }

    fn descriptor(&mut self, heap: HeapKey, index: u32, resource: ResourceKey, view: ViewType) {
        self.emit(CaptureEvent::CreateDescriptor {
            handle: DescriptorHandle::new(heap, index),
            info: DescriptorInfo {
                resource: Some(resource),
                view,
            },
        });
    }

    fn root_signature(&mut self, desc: RootSignatureDesc) -> RootSignatureKey {
        let root_signature = self.keys.root_signatures.allocate();
        self.emit(CaptureEvent::CreateRootSignature {
            root_signature,
            desc,
        });
        root_signature
    }

    fn execute(&mut self, queue: QueueKey, list: CommandListKey) {
        self.emit(CaptureEvent::ExecuteCommandLists {
            queue,
            command_lists: vec![list],
        });
    }
}

#[test]
fn dump_plan_waits_for_cross_queue_fence() {
    let mut cap = Capture::new();
    let copy_queue = cap.keys.queues.allocate();
    let direct_queue = cap.keys.queues.allocate();
    let fence = cap.keys.fences.allocate();
    cap.emit(CaptureEvent::CreateFence {
        fence,
        initial_value: 0,
    });

    let source = cap.resource(ResourceState::COPY_SOURCE);
    let output = cap.resource(ResourceState::COMMON);
    let scratch = cap.resource(ResourceState::COMMON);
    let idle = cap.resource(ResourceState::COMMON);

    let heap = cap.heap(8);
    cap.descriptor(heap, 0, source, ViewType::Srv);
    cap.descriptor(heap, 1, output, ViewType::Uav);
    cap.descriptor(heap, 2, scratch, ViewType::Uav);

    let root_signature = cap.root_signature(RootSignatureDesc {
        flags: RootSignatureFlags::empty(),
        parameters: vec![
            RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange::bounded(RangeType::Srv, 1)],
            },
            RootParameter::DescriptorTable {
                ranges: vec![DescriptorRange::unbounded(RangeType::Uav)],
            },
        ],
    });

    // Scratch is written on the copy queue before the direct queue starts waiting.
    let scratch_list = cap.keys.lists.allocate();
    cap.emit(CaptureEvent::ResourceUsage {
        command_list: scratch_list,
        resources: vec![scratch],
    });
    cap.execute(copy_queue, scratch_list);
    let before_wait = cap.session.usage().usage(scratch).unwrap_or_default();

    let compute_list = cap.keys.lists.allocate();
    cap.emit(CaptureEvent::ResourceBarrier {
        command_list: Some(compute_list),
        barriers: vec![ResourceBarrier::transition(
            output,
            ALL_SUBRESOURCES,
            ResourceState::COMMON,
            ResourceState::UNORDERED_ACCESS,
        )],
    });
    cap.emit(CaptureEvent::ResourceUsage {
        command_list: compute_list,
        resources: vec![source, output],
    });
    cap.emit(CaptureEvent::CommandQueueWait {
        queue: direct_queue,
        fence,
        value: 5,
    });
    cap.execute(direct_queue, compute_list);
    assert!(cap.session.usage().scheduler().is_waiting(direct_queue));
    assert_eq!(cap.session.usage().scheduler().pending_count(direct_queue), 2);

    let request = DumpRequest::new(Some(compute_list), root_signature)
        .table(0, DescriptorHandle::new(heap, 0))
        .table(1, DescriptorHandle::new(heap, 1));

    // Recorded but not yet reached by the GPU.
    let plan = DumpPlan::build(&cap.session, &request);
    let planned: Vec<_> = plan.resources().collect();
    assert_eq!(planned, vec![output, scratch]);
    assert_eq!(plan.targets[0].state, Some(ResourceState::UNORDERED_ACCESS));
    assert_eq!(
        cap.session.states().get_resource_state(None, output, 0),
        ResourceState::UNORDERED_ACCESS
    );
    assert_eq!(
        cap.session.usage().usage(output).unwrap_or_default(),
        UsageStamp::default()
    );

    cap.emit(CaptureEvent::FenceSignal { fence, value: 5 });
    assert!(!cap.session.usage().scheduler().is_waiting(direct_queue));

    let stamp = cap.session.usage().usage(output).unwrap_or_default();
    assert!(stamp > before_wait);
    assert_eq!(
        cap.session.usage().get_ordered_resources(),
        vec![idle, scratch, source, output]
    );

    let plan = DumpPlan::build(&cap.session, &request);
    let planned: Vec<_> = plan.resources().collect();
    assert_eq!(planned, vec![scratch, output]);
}

#[test]
fn gathered_descriptors_resolve_through_copies() {
    let mut cap = Capture::new();
    let a = cap.resource(ResourceState::COMMON);
    let b = cap.resource(ResourceState::COMMON);
    let c = cap.resource(ResourceState::RENDER_TARGET);

    let staging = cap.heap(16);
    let visible = cap.heap(16);
    cap.descriptor(staging, 0, a, ViewType::Uav);
    cap.descriptor(staging, 5, b, ViewType::Uav);
    cap.descriptor(staging, 6, c, ViewType::Srv);

    cap.emit(CaptureEvent::CopyDescriptors(RangeDescriptorCopy {
        dest_starts: vec![DescriptorHandle::new(visible, 0)],
        dest_sizes: Some(vec![3]),
        src_starts: vec![
            DescriptorHandle::new(staging, 0),
            DescriptorHandle::new(staging, 5),
        ],
        src_sizes: Some(vec![1, 2]),
    }));

    let root_signature = cap.root_signature(RootSignatureDesc {
        flags: RootSignatureFlags::CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED,
        parameters: Vec::new(),
    });
    let request = DumpRequest::new(None, root_signature).bindless_heap(visible);
    let plan = DumpPlan::build(&cap.session, &request);

    let planned: Vec<_> = plan.resources().collect();
    assert_eq!(planned, vec![a, b]);
    assert_eq!(plan.targets[1].handle, DescriptorHandle::new(visible, 1));
}

#[test]
fn destroyed_resources_leave_the_plan() {
    let mut cap = Capture::new();
    let target = cap.resource(ResourceState::RENDER_TARGET);
    let heap = cap.heap(4);
    cap.descriptor(heap, 0, target, ViewType::Rtv);
    let root_signature = cap.root_signature(RootSignatureDesc::default());

    let request =
        DumpRequest::new(None, root_signature).render_target(DescriptorHandle::new(heap, 0));
    assert_eq!(DumpPlan::build(&cap.session, &request).targets.len(), 1);

    cap.emit(CaptureEvent::DestroyResource { resource: target });
    cap.emit(CaptureEvent::DestroyResource { resource: target });
    assert!(DumpPlan::build(&cap.session, &request).targets.is_empty());
}

#[test]
fn per_subresource_states_reach_the_plan() {
    let mut cap = Capture::new();
    let texture = cap.resource(ResourceState::COMMON);
    let heap = cap.heap(4);
    cap.descriptor(heap, 0, texture, ViewType::Uav);
    let root_signature = cap.root_signature(RootSignatureDesc {
        flags: RootSignatureFlags::empty(),
        parameters: vec![RootParameter::DescriptorTable {
            ranges: vec![DescriptorRange::bounded(RangeType::Uav, 1)],
        }],
    });

    cap.emit(CaptureEvent::ResourceBarrier {
        command_list: None,
        barriers: vec![ResourceBarrier::transition(
            texture,
            0,
            ResourceState::COMMON,
            ResourceState::UNORDERED_ACCESS,
        )],
    });

    let request =
        DumpRequest::new(None, root_signature).table(0, DescriptorHandle::new(heap, 0));
    let plan = DumpPlan::build(&cap.session, &request);
    assert_eq!(plan.targets.len(), 1);
    assert_eq!(plan.targets[0].state, Some(ResourceState::COMMON));
    assert_eq!(
        plan.targets[0].subresource_states,
        vec![(0, ResourceState::UNORDERED_ACCESS)]
    );
}
