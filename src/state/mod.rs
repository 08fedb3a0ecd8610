mod flags;
mod tracker;

pub use flags::{ALL_SUBRESOURCES, BarrierLayout, InitialState, ResourceBarrier, ResourceState};
pub use tracker::{ResourceStateEntry, ResourceStateTracker};
