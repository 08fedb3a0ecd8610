use std::fmt;

use crate::keys::{HeapKey, ResourceKey};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum HeapType {
    CbvSrvUav,
    Sampler,
    Rtv,
    Dsv,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HeapDesc {
    pub heap_type: HeapType,
    pub num_descriptors: u32,
    pub shader_visible: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ViewType {
    Rtv,
    Dsv,
    Srv,
    Uav,
    Cbv,
    Sampler,
}

impl ViewType {
    /// Views through which the GPU can write the underlying resource.
    pub fn is_writable(self) -> bool {
        matches!(self, ViewType::Rtv | ViewType::Dsv | ViewType::Uav)
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewType::Rtv => "RTV",
            ViewType::Dsv => "DSV",
            ViewType::Srv => "SRV",
            ViewType::Uav => "UAV",
            ViewType::Cbv => "CBV",
            ViewType::Sampler => "Sampler",
        };
        f.write_str(s)
    }
}

/// A CPU descriptor handle, already translated into heap and slot.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct DescriptorHandle {
    pub heap: HeapKey,
    pub index: u32,
}

impl DescriptorHandle {
    pub fn new(heap: HeapKey, index: u32) -> Self {
        Self { heap, index }
    }

    /// `None` once the index would leave the `u32` range.
    pub fn offset(self, by: u32) -> Option<Self> {
        Some(Self {
            heap: self.heap,
            index: self.index.checked_add(by)?,
        })
    }
}

/// What a descriptor slot exposes. Samplers and null descriptors carry no
/// resource.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DescriptorInfo {
    pub resource: Option<ResourceKey>,
    pub view: ViewType,
}

/// `num` consecutive slots from `src` to `dest`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimpleDescriptorCopy {
    pub num: u32,
    pub dest: DescriptorHandle,
    pub src: DescriptorHandle,
}

/// Scatter/gather copy. Both sides are flattened in range order and zipped
/// slot by slot; only the aggregate sizes have to agree. Missing sizes mean
/// one descriptor per range.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct RangeDescriptorCopy {
    pub dest_starts: Vec<DescriptorHandle>,
    pub dest_sizes: Option<Vec<u32>>,
    pub src_starts: Vec<DescriptorHandle>,
    pub src_sizes: Option<Vec<u32>>,
}

impl RangeDescriptorCopy {
    pub fn dest_size(&self, range: usize) -> u32 {
        range_size(self.dest_sizes.as_deref(), range)
    }

    pub fn src_size(&self, range: usize) -> u32 {
        range_size(self.src_sizes.as_deref(), range)
    }

    pub fn dest_total(&self) -> u64 {
        (0..self.dest_starts.len())
            .map(|i| self.dest_size(i) as u64)
            .sum()
    }

    pub fn src_total(&self) -> u64 {
        (0..self.src_starts.len())
            .map(|i| self.src_size(i) as u64)
            .sum()
    }
}

fn range_size(sizes: Option<&[u32]>, range: usize) -> u32 {
    match sizes {
        Some(sizes) => sizes.get(range).copied().unwrap_or(0),
        None => 1,
    }
}
