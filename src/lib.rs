//! Shadow model of GPU-side state for API capture: resource barrier states,
//! descriptor bindings, root-signature resolution and fence-ordered resource
//! usage.

pub mod config;
pub mod descriptor;
pub mod dump;
pub mod keys;
pub mod order;
pub mod session;
pub mod state;

pub use config::{DescriptorCopyPolicy, TrackerConfig};
pub use dump::{DumpPlan, DumpRequest, DumpTarget};
pub use keys::{
    CallIndex, CommandListKey, FenceKey, HeapKey, KeyArena, QueueKey, ResourceKey,
    RootSignatureKey,
};
pub use session::{CaptureEvent, CaptureSession, Recorded};
