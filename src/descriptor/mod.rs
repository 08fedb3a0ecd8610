mod heap;
mod root_signature;
mod spec;

pub use heap::DescriptorHeapTracker;
pub use root_signature::{
    DescriptorRange, DescriptorRootSignatureService, RangeType, RootParameter, RootSignatureDesc,
    RootSignatureFlags,
};
pub use spec::{
    DescriptorHandle, DescriptorInfo, HeapDesc, HeapType, RangeDescriptorCopy,
    SimpleDescriptorCopy, ViewType,
};
