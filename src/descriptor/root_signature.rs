use std::{collections::HashSet, sync::Arc};

use bitflags::bitflags;
use parking_lot::Mutex;
use slotmap::SecondaryMap;

use crate::keys::{HeapKey, RootSignatureKey};

use super::spec::HeapType;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum RangeType {
    Srv,
    Uav,
    Cbv,
    Sampler,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DescriptorRange {
    pub range_type: RangeType,
    /// `None` extends the range to the end of the bound heap.
    pub num_descriptors: Option<u32>,
    /// Offset from the table start; `None` appends after the previous range.
    pub offset: Option<u32>,
}

impl DescriptorRange {
    pub fn bounded(range_type: RangeType, num_descriptors: u32) -> Self {
        Self {
            range_type,
            num_descriptors: Some(num_descriptors),
            offset: None,
        }
    }

    pub fn unbounded(range_type: RangeType) -> Self {
        Self {
            range_type,
            num_descriptors: None,
            offset: None,
        }
    }

    pub fn at_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RootParameter {
    DescriptorTable { ranges: Vec<DescriptorRange> },
    Constants { num_values: u32 },
    /// Root CBV/SRV/UAV bound by GPU address, no heap indirection.
    Descriptor { kind: RangeType },
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RootSignatureFlags: u32 {
        const CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED = 0x400;
        const SAMPLER_HEAP_DIRECTLY_INDEXED = 0x800;
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct RootSignatureDesc {
    pub flags: RootSignatureFlags,
    pub parameters: Vec<RootParameter>,
}

/// Heap slots already attributed to some root parameter since the last reset.
#[derive(Default)]
struct RetrievalRecord {
    bounded: HashSet<u32>,
    unbounded: HashSet<u32>,
}

impl RetrievalRecord {
    /// Filters `indexes`, keeping the ones not yet attributed and marking them.
    /// Unbounded ranges yield to anything already claimed.
    fn claim(&mut self, indexes: &mut Vec<u32>, unbounded: bool) {
        if unbounded {
            indexes.retain(|i| !self.bounded.contains(i) && self.unbounded.insert(*i));
        } else {
            indexes.retain(|i| self.bounded.insert(*i));
        }
    }
}

#[derive(Default)]
struct Inner {
    descs: SecondaryMap<RootSignatureKey, Arc<RootSignatureDesc>>,
    retrieved: SecondaryMap<HeapKey, RetrievalRecord>,
}

impl Inner {
    fn desc(&self, key: RootSignatureKey) -> &RootSignatureDesc {
        match self.descs.get(key) {
            Some(desc) => desc,
            None => panic!("root signature {:?} was never created", key),
        }
    }

    fn record(&mut self, heap: HeapKey) -> &mut RetrievalRecord {
        self.retrieved
            .entry(heap)
            .expect("stale descriptor heap key")
            .or_default()
    }
}

/// Resolves root parameters to absolute descriptor heap indexes.
///
/// Root signatures are created and tables bound from different recording
/// threads, so every table sits behind one lock.
#[derive(Default)]
pub struct DescriptorRootSignatureService {
    inner: Mutex<Inner>,
}

impl DescriptorRootSignatureService {
    pub fn create_root_signature(&self, key: RootSignatureKey, desc: RootSignatureDesc) {
        log::trace!(
            "Tracking root signature {:?} with {} parameters",
            key,
            desc.parameters.len()
        );
        self.inner.lock().descs.insert(key, Arc::new(desc));
    }

    pub fn destroy_root_signature(&self, key: RootSignatureKey) {
        self.inner.lock().descs.remove(key);
    }

    pub fn get_root_signature_desc(&self, key: RootSignatureKey) -> Arc<RootSignatureDesc> {
        let inner = self.inner.lock();
        match inner.descs.get(key) {
            Some(desc) => desc.clone(),
            None => panic!("root signature {:?} was never created", key),
        }
    }

    /// Heap indexes read through descriptor table `param_index` when the table
    /// starts at `base_index` of a heap holding `heap_num_descriptors` slots.
    pub fn get_descriptor_table_indexes(
        &self,
        root_signature: RootSignatureKey,
        heap: HeapKey,
        param_index: usize,
        base_index: u32,
        heap_num_descriptors: u32,
        check_retrieved: bool,
    ) -> Vec<u32> {
        let mut inner = self.inner.lock();
        let desc = inner.desc(root_signature);
        let Some(parameter) = desc.parameters.get(param_index) else {
            panic!(
                "root signature {:?} has no parameter {} ({} declared)",
                root_signature,
                param_index,
                desc.parameters.len()
            );
        };
        let RootParameter::DescriptorTable { ranges } = parameter else {
            return Vec::new();
        };

        let mut resolved: Vec<(Vec<u32>, bool)> = Vec::with_capacity(ranges.len());
        let mut next_offset = 0u32;
        for range in ranges {
            let start = base_index.saturating_add(range.offset.unwrap_or(next_offset));
            let end = match range.num_descriptors {
                Some(n) => start.saturating_add(n).min(heap_num_descriptors),
                None => heap_num_descriptors,
            };
            next_offset = match range.num_descriptors {
                Some(n) => (start - base_index).saturating_add(n),
                None => heap_num_descriptors,
            };
            resolved.push(((start..end).collect(), range.num_descriptors.is_none()));
        }

        let mut seen = HashSet::new();
        let mut indexes = Vec::new();
        for (mut range_indexes, unbounded) in resolved {
            if check_retrieved {
                inner.record(heap).claim(&mut range_indexes, unbounded);
            }
            indexes.extend(range_indexes.into_iter().filter(|i| seen.insert(*i)));
        }
        indexes
    }

    /// The whole heap when the root signature lets shaders index heaps of
    /// `heap_type` directly, otherwise nothing.
    pub fn get_bindless_descriptor_indexes(
        &self,
        root_signature: RootSignatureKey,
        heap: HeapKey,
        heap_type: HeapType,
        heap_num_descriptors: u32,
        check_retrieved: bool,
    ) -> Vec<u32> {
        let mut inner = self.inner.lock();
        let flags = inner.desc(root_signature).flags;
        let required = match heap_type {
            HeapType::CbvSrvUav => RootSignatureFlags::CBV_SRV_UAV_HEAP_DIRECTLY_INDEXED,
            HeapType::Sampler => RootSignatureFlags::SAMPLER_HEAP_DIRECTLY_INDEXED,
            HeapType::Rtv | HeapType::Dsv => return Vec::new(),
        };
        if !flags.contains(required) {
            return Vec::new();
        }

        let mut indexes: Vec<u32> = (0..heap_num_descriptors).collect();
        if check_retrieved {
            inner.record(heap).claim(&mut indexes, true);
        }
        indexes
    }

    pub fn reset_retrieved(&self, heap: HeapKey) {
        self.inner.lock().retrieved.remove(heap);
    }

    pub fn reset_all_retrieved(&self) {
        self.inner.lock().retrieved.clear();
    }

    pub fn destroy_heap(&self, heap: HeapKey) {
        self.reset_retrieved(heap);
    }
}
