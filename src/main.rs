use std::thread;

use anyhow::Context;
use crossbeam_channel::{Sender, unbounded};

use shadowstate::{
    CallIndex, CaptureEvent, CaptureSession, CommandListKey, DumpPlan, DumpRequest, FenceKey,
    HeapKey, KeyArena, QueueKey, Recorded, ResourceKey, RootSignatureKey, TrackerConfig,
    descriptor::{
        DescriptorHandle, DescriptorInfo, DescriptorRange, HeapDesc, HeapType, RangeType,
        RootParameter, RootSignatureDesc, RootSignatureFlags, SimpleDescriptorCopy, ViewType,
    },
    state::{ALL_SUBRESOURCES, BarrierLayout, ResourceBarrier, ResourceState},
};

fn main() -> anyhow::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default())
        .context("failed to load logging config file")?;

    #[cfg(feature = "tracing")]
    let _client = tracy_client::Client::start();

    let mut session = CaptureSession::new(TrackerConfig::default());
    let recorder = session.recorder();

    let (error_tx, error_rx) = unbounded::<(String, anyhow::Error)>();
    let (request_tx, request_rx) = unbounded::<DumpRequest>();

    let app_handle = {
        let error_tx = error_tx.clone();
        thread::Builder::new()
            .name("application".to_string())
            .spawn(move || match record_frame(Recorder::new(recorder)) {
                Ok(request) => {
                    let _ = request_tx.send(request);
                }
                Err(e) => {
                    let _ = error_tx.send(("application".to_string(), e));
                }
            })?
    };
    drop(error_tx);

    let watchdog = thread::Builder::new()
        .name("thread_watchdog".to_string())
        .spawn(move || {
            let mut failed = false;
            for (name, e) in error_rx {
                log::error!("Thread {} failed: {:?}", name, e);
                failed = true;
            }
            failed
        })?;

    app_handle
        .join()
        .map_err(|_| anyhow::anyhow!("application thread panicked"))?;

    let applied = session.pump();
    log::info!("Applied {} captured calls", applied);

    if watchdog
        .join()
        .map_err(|_| anyhow::anyhow!("watchdog thread panicked"))?
    {
        anyhow::bail!("capture recording failed");
    }

    for (i, resource) in session.usage().get_ordered_resources().iter().enumerate() {
        log::info!(
            "#{} {:?} last used at {:?}",
            i,
            resource,
            session.usage().usage(*resource).unwrap_or_default()
        );
    }

    let request = request_rx
        .try_recv()
        .context("application thread produced no dump request")?;
    let plan = DumpPlan::build(&session, &request);
    for target in &plan.targets {
        log::info!(
            "dump {:?} through {} {:?}: state {:?} {:?}, usage {:?}",
            target.resource,
            target.view,
            target.handle,
            target.state,
            target.subresource_states,
            target.usage
        );
    }

    Ok(())
}

struct Recorder {
    tx: Sender<Recorded>,
    next_call: CallIndex,
}

impl Recorder {
    fn new(tx: Sender<Recorded>) -> Self {
        Self { tx, next_call: 0 }
    }

    fn emit(&mut self, event: CaptureEvent) -> anyhow::Result<()> {
        self.tx
            .send(Recorded::new(self.next_call, event))
            .context("capture session stopped listening")?;
        self.next_call += 1;
        Ok(())
    }
}

/// Scripted frame: a copy queue uploads a texture and signals a fence, the
/// direct queue waits on it and dispatches a compute pass writing a UAV.
fn record_frame(mut rec: Recorder) -> anyhow::Result<DumpRequest> {
    let mut resources = KeyArena::<ResourceKey>::default();
    let mut lists = KeyArena::<CommandListKey>::default();
    let mut heaps = KeyArena::<HeapKey>::default();
    let mut root_signatures = KeyArena::<RootSignatureKey>::default();
    let mut queues = KeyArena::<QueueKey>::default();
    let mut fences = KeyArena::<FenceKey>::default();

    let copy_queue = queues.allocate();
    let direct_queue = queues.allocate();
    let upload_fence = fences.allocate();
    rec.emit(CaptureEvent::CreateFence {
        fence: upload_fence,
        initial_value: 0,
    })?;

    let texture = resources.allocate();
    let output = resources.allocate();
    let constants = resources.allocate();
    rec.emit(CaptureEvent::CreateResource {
        resource: texture,
        initial: ResourceState::COPY_DEST.into(),
    })?;
    rec.emit(CaptureEvent::CreateResource {
        resource: output,
        initial: BarrierLayout::UNORDERED_ACCESS.into(),
    })?;
    rec.emit(CaptureEvent::CreateResource {
        resource: constants,
        initial: ResourceState::GENERIC_READ.into(),
    })?;

    let staging_heap = heaps.allocate();
    let shader_heap = heaps.allocate();
    rec.emit(CaptureEvent::CreateHeap {
        heap: staging_heap,
        desc: HeapDesc {
            heap_type: HeapType::CbvSrvUav,
            num_descriptors: 16,
            shader_visible: false,
        },
    })?;
    rec.emit(CaptureEvent::CreateHeap {
        heap: shader_heap,
        desc: HeapDesc {
            heap_type: HeapType::CbvSrvUav,
            num_descriptors: 64,
            shader_visible: true,
        },
    })?;
    for (index, resource, view) in [
        (0, constants, ViewType::Cbv),
        (1, texture, ViewType::Srv),
        (2, output, ViewType::Uav),
    ] {
        rec.emit(CaptureEvent::CreateDescriptor {
            handle: DescriptorHandle::new(staging_heap, index),
            info: DescriptorInfo {
                resource: Some(resource),
                view,
            },
        })?;
    }
    rec.emit(CaptureEvent::CopyDescriptorsSimple(SimpleDescriptorCopy {
        num: 3,
        dest: DescriptorHandle::new(shader_heap, 8),
        src: DescriptorHandle::new(staging_heap, 0),
    }))?;

    let root_signature = root_signatures.allocate();
    rec.emit(CaptureEvent::CreateRootSignature {
        root_signature,
        desc: RootSignatureDesc {
            flags: RootSignatureFlags::empty(),
            parameters: vec![RootParameter::DescriptorTable {
                ranges: vec![
                    DescriptorRange::bounded(RangeType::Cbv, 1),
                    DescriptorRange::bounded(RangeType::Srv, 1),
                    DescriptorRange::bounded(RangeType::Uav, 1),
                ],
            }],
        },
    })?;

    let upload_list = lists.allocate();
    rec.emit(CaptureEvent::ResourceBarrier {
        command_list: Some(upload_list),
        barriers: vec![ResourceBarrier::transition(
            texture,
            ALL_SUBRESOURCES,
            ResourceState::COPY_DEST,
            ResourceState::COMMON,
        )],
    })?;
    rec.emit(CaptureEvent::ResourceUsage {
        command_list: upload_list,
        resources: vec![texture],
    })?;

    let compute_list = lists.allocate();
    rec.emit(CaptureEvent::ResourceBarrier {
        command_list: Some(compute_list),
        barriers: vec![ResourceBarrier::transition(
            texture,
            ALL_SUBRESOURCES,
            ResourceState::COMMON,
            ResourceState::NON_PIXEL_SHADER_RESOURCE,
        )],
    })?;
    rec.emit(CaptureEvent::ResourceUsage {
        command_list: compute_list,
        resources: vec![constants, texture, output],
    })?;

    rec.emit(CaptureEvent::CommandQueueWait {
        queue: direct_queue,
        fence: upload_fence,
        value: 1,
    })?;
    rec.emit(CaptureEvent::ExecuteCommandLists {
        queue: direct_queue,
        command_lists: vec![compute_list],
    })?;
    rec.emit(CaptureEvent::ExecuteCommandLists {
        queue: copy_queue,
        command_lists: vec![upload_list],
    })?;
    rec.emit(CaptureEvent::CommandQueueSignal {
        queue: copy_queue,
        fence: upload_fence,
        value: 1,
    })?;

    Ok(DumpRequest::new(Some(compute_list), root_signature)
        .table(0, DescriptorHandle::new(shader_heap, 8)))
}
