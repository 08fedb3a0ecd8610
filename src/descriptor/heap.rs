use std::collections::HashMap;

use slotmap::SecondaryMap;

use crate::{config::DescriptorCopyPolicy, keys::HeapKey};

use super::spec::{
    DescriptorHandle, DescriptorInfo, HeapDesc, RangeDescriptorCopy, SimpleDescriptorCopy,
};

type HeapSlots = HashMap<u32, DescriptorInfo>;

/// Which resource each descriptor heap slot currently exposes.
#[derive(Default)]
pub struct DescriptorHeapTracker {
    heaps: SecondaryMap<HeapKey, HeapDesc>,
    slots: SecondaryMap<HeapKey, HeapSlots>,
    copy_policy: DescriptorCopyPolicy,
}

impl DescriptorHeapTracker {
    pub fn new(copy_policy: DescriptorCopyPolicy) -> Self {
        Self {
            copy_policy,
            ..Default::default()
        }
    }

    pub fn create_heap(&mut self, key: HeapKey, desc: HeapDesc) {
        log::trace!(
            "Tracking descriptor heap {:?} ({:?}, {} descriptors)",
            key,
            desc.heap_type,
            desc.num_descriptors
        );
        self.heaps.insert(key, desc);
        self.slots.insert(key, HeapSlots::default());
    }

    pub fn heap_desc(&self, key: HeapKey) -> Option<&HeapDesc> {
        self.heaps.get(key)
    }

    /// Drops the heap and every slot in it.
    pub fn destroy_heap(&mut self, key: HeapKey) {
        self.heaps.remove(key);
        if let Some(slots) = self.slots.remove(key) {
            log::trace!("Dropped {} descriptors of heap {:?}", slots.len(), key);
        }
    }

    pub fn create_descriptor(&mut self, handle: DescriptorHandle, info: DescriptorInfo) {
        self.slots_mut(handle.heap).insert(handle.index, info);
    }

    pub fn get_descriptor_info(&self, handle: DescriptorHandle) -> Option<DescriptorInfo> {
        self.slots
            .get(handle.heap)
            .and_then(|slots| slots.get(&handle.index))
            .copied()
    }

    pub fn copy_descriptors_simple(&mut self, copy: &SimpleDescriptorCopy) {
        for i in 0..copy.num {
            let (Some(src), Some(dest)) = (copy.src.offset(i), copy.dest.offset(i)) else {
                log::warn!(
                    "descriptor copy of {} from {:?} to {:?} overflows the heap index range, stopping at {}",
                    copy.num,
                    copy.src,
                    copy.dest,
                    i
                );
                return;
            };
            self.copy_slot(src, dest);
        }
    }

    pub fn copy_descriptors(&mut self, copy: &RangeDescriptorCopy) {
        if self.copy_policy == DescriptorCopyPolicy::Strict {
            assert_eq!(
                copy.src_total(),
                copy.dest_total(),
                "descriptor copy source and destination sizes differ"
            );
        }

        let mut dest_range = 0;
        let mut dest_offset = 0;

        for (src_range, &src_start) in copy.src_starts.iter().enumerate() {
            for src_offset in 0..copy.src_size(src_range) {
                while dest_range < copy.dest_starts.len()
                    && dest_offset >= copy.dest_size(dest_range)
                {
                    dest_range += 1;
                    dest_offset = 0;
                }

                let Some(&dest_start) = copy.dest_starts.get(dest_range) else {
                    log::warn!(
                        "descriptor copy ran out of destination ranges, dropping {} source descriptors",
                        copy.src_total().saturating_sub(copy.dest_total())
                    );
                    return;
                };

                if let (Some(src), Some(dest)) =
                    (src_start.offset(src_offset), dest_start.offset(dest_offset))
                {
                    self.copy_slot(src, dest);
                }
                dest_offset += 1;
            }
        }
    }

    /// An unset source is normal (never-written slot) and leaves the
    /// destination alone.
    fn copy_slot(&mut self, src: DescriptorHandle, dest: DescriptorHandle) {
        if let Some(info) = self.get_descriptor_info(src) {
            self.slots_mut(dest.heap).insert(dest.index, info);
        }
    }

    fn slots_mut(&mut self, heap: HeapKey) -> &mut HeapSlots {
        self.slots
            .entry(heap)
            .expect("stale descriptor heap key")
            .or_default()
    }
}
