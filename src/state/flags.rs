use std::fmt;

use bitflags::bitflags;

use crate::keys::ResourceKey;

/// Sentinel subresource index meaning "uniform state across every slice".
pub const ALL_SUBRESOURCES: u32 = 0xffff_ffff;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceState: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const RENDER_TARGET = 0x4;
        const UNORDERED_ACCESS = 0x8;
        const DEPTH_WRITE = 0x10;
        const DEPTH_READ = 0x20;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const STREAM_OUT = 0x100;
        const INDIRECT_ARGUMENT = 0x200;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
        const RESOLVE_DEST = 0x1000;
        const RESOLVE_SOURCE = 0x2000;
        const RAYTRACING_ACCELERATION_STRUCTURE = 0x40_0000;
        const SHADING_RATE_SOURCE = 0x100_0000;

        const ALL_SHADER_RESOURCE = Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits();
        const GENERIC_READ = Self::VERTEX_AND_CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl ResourceState {
    pub const COMMON: ResourceState = ResourceState::empty();
    pub const PRESENT: ResourceState = ResourceState::empty();

    /// States a shader or the output merger can write through.
    pub fn is_writable(self) -> bool {
        self.intersects(
            ResourceState::RENDER_TARGET
                | ResourceState::UNORDERED_ACCESS
                | ResourceState::DEPTH_WRITE
                | ResourceState::COPY_DEST
                | ResourceState::RESOLVE_DEST
                | ResourceState::STREAM_OUT,
        )
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("COMMON");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Enhanced-barrier layout value as passed by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierLayout(pub u32);

impl BarrierLayout {
    pub const UNDEFINED: BarrierLayout = BarrierLayout(0xffff_ffff);
    pub const COMMON: BarrierLayout = BarrierLayout(0);
    pub const PRESENT: BarrierLayout = BarrierLayout(0);
    pub const GENERIC_READ: BarrierLayout = BarrierLayout(1);
    pub const RENDER_TARGET: BarrierLayout = BarrierLayout(2);
    pub const UNORDERED_ACCESS: BarrierLayout = BarrierLayout(3);
    pub const DEPTH_STENCIL_WRITE: BarrierLayout = BarrierLayout(4);
    pub const DEPTH_STENCIL_READ: BarrierLayout = BarrierLayout(5);
    pub const SHADER_RESOURCE: BarrierLayout = BarrierLayout(6);
    pub const COPY_SOURCE: BarrierLayout = BarrierLayout(7);
    pub const COPY_DEST: BarrierLayout = BarrierLayout(8);
    pub const RESOLVE_SOURCE: BarrierLayout = BarrierLayout(9);
    pub const RESOLVE_DEST: BarrierLayout = BarrierLayout(10);
    pub const SHADING_RATE_SOURCE: BarrierLayout = BarrierLayout(11);
    pub const VIDEO_DECODE_READ: BarrierLayout = BarrierLayout(12);
    pub const VIDEO_DECODE_WRITE: BarrierLayout = BarrierLayout(13);
    pub const VIDEO_PROCESS_READ: BarrierLayout = BarrierLayout(14);
    pub const VIDEO_PROCESS_WRITE: BarrierLayout = BarrierLayout(15);
    pub const VIDEO_ENCODE_READ: BarrierLayout = BarrierLayout(16);
    pub const VIDEO_ENCODE_WRITE: BarrierLayout = BarrierLayout(17);
    pub const DIRECT_QUEUE_COMMON: BarrierLayout = BarrierLayout(18);
    pub const DIRECT_QUEUE_GENERIC_READ: BarrierLayout = BarrierLayout(19);
    pub const DIRECT_QUEUE_UNORDERED_ACCESS: BarrierLayout = BarrierLayout(20);
    pub const DIRECT_QUEUE_SHADER_RESOURCE: BarrierLayout = BarrierLayout(21);
    pub const DIRECT_QUEUE_COPY_SOURCE: BarrierLayout = BarrierLayout(22);
    pub const DIRECT_QUEUE_COPY_DEST: BarrierLayout = BarrierLayout(23);
    pub const COMPUTE_QUEUE_COMMON: BarrierLayout = BarrierLayout(24);
    pub const COMPUTE_QUEUE_GENERIC_READ: BarrierLayout = BarrierLayout(25);
    pub const COMPUTE_QUEUE_UNORDERED_ACCESS: BarrierLayout = BarrierLayout(26);
    pub const COMPUTE_QUEUE_SHADER_RESOURCE: BarrierLayout = BarrierLayout(27);
    pub const COMPUTE_QUEUE_COPY_SOURCE: BarrierLayout = BarrierLayout(28);
    pub const COMPUTE_QUEUE_COPY_DEST: BarrierLayout = BarrierLayout(29);
    pub const VIDEO_QUEUE_COMMON: BarrierLayout = BarrierLayout(30);

    /// Fixed layout to state table. `None` for layouts with no legacy equivalent.
    pub fn to_resource_state(self) -> Option<ResourceState> {
        let state = match self {
            BarrierLayout::UNDEFINED
            | BarrierLayout::COMMON
            | BarrierLayout::DIRECT_QUEUE_COMMON
            | BarrierLayout::COMPUTE_QUEUE_COMMON => ResourceState::COMMON,
            BarrierLayout::GENERIC_READ
            | BarrierLayout::DIRECT_QUEUE_GENERIC_READ
            | BarrierLayout::COMPUTE_QUEUE_GENERIC_READ => ResourceState::GENERIC_READ,
            BarrierLayout::RENDER_TARGET => ResourceState::RENDER_TARGET,
            BarrierLayout::UNORDERED_ACCESS
            | BarrierLayout::DIRECT_QUEUE_UNORDERED_ACCESS
            | BarrierLayout::COMPUTE_QUEUE_UNORDERED_ACCESS => ResourceState::UNORDERED_ACCESS,
            BarrierLayout::DEPTH_STENCIL_WRITE => ResourceState::DEPTH_WRITE,
            BarrierLayout::DEPTH_STENCIL_READ => ResourceState::DEPTH_READ,
            BarrierLayout::SHADER_RESOURCE
            | BarrierLayout::DIRECT_QUEUE_SHADER_RESOURCE
            | BarrierLayout::COMPUTE_QUEUE_SHADER_RESOURCE => ResourceState::ALL_SHADER_RESOURCE,
            BarrierLayout::COPY_SOURCE
            | BarrierLayout::DIRECT_QUEUE_COPY_SOURCE
            | BarrierLayout::COMPUTE_QUEUE_COPY_SOURCE => ResourceState::COPY_SOURCE,
            BarrierLayout::COPY_DEST
            | BarrierLayout::DIRECT_QUEUE_COPY_DEST
            | BarrierLayout::COMPUTE_QUEUE_COPY_DEST => ResourceState::COPY_DEST,
            BarrierLayout::RESOLVE_SOURCE => ResourceState::RESOLVE_SOURCE,
            BarrierLayout::RESOLVE_DEST => ResourceState::RESOLVE_DEST,
            BarrierLayout::SHADING_RATE_SOURCE => ResourceState::SHADING_RATE_SOURCE,
            _ => return None,
        };
        Some(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialState {
    State(ResourceState),
    Layout(BarrierLayout),
}

impl From<ResourceState> for InitialState {
    fn from(state: ResourceState) -> Self {
        InitialState::State(state)
    }
}

impl From<BarrierLayout> for InitialState {
    fn from(layout: BarrierLayout) -> Self {
        InitialState::Layout(layout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBarrier {
    Transition {
        resource: ResourceKey,
        subresource: u32,
        before: ResourceState,
        after: ResourceState,
    },
    /// Read/write hazard. `None` orders every UAV access and touches no state.
    Uav { resource: Option<ResourceKey> },
    Aliasing {
        before: Option<ResourceKey>,
        after: Option<ResourceKey>,
    },
}

impl ResourceBarrier {
    pub fn transition(
        resource: ResourceKey,
        subresource: u32,
        before: ResourceState,
        after: ResourceState,
    ) -> Self {
        ResourceBarrier::Transition {
            resource,
            subresource,
            before,
            after,
        }
    }

    pub fn uav(resource: ResourceKey) -> Self {
        ResourceBarrier::Uav {
            resource: Some(resource),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_specific_layouts_map_to_base_states() {
        assert_eq!(
            BarrierLayout::DIRECT_QUEUE_COPY_DEST.to_resource_state(),
            Some(ResourceState::COPY_DEST)
        );
        assert_eq!(
            BarrierLayout::COMPUTE_QUEUE_SHADER_RESOURCE.to_resource_state(),
            Some(ResourceState::ALL_SHADER_RESOURCE)
        );
        assert_eq!(
            BarrierLayout::UNDEFINED.to_resource_state(),
            Some(ResourceState::COMMON)
        );
        assert_eq!(BarrierLayout::VIDEO_DECODE_WRITE.to_resource_state(), None);
        assert_eq!(BarrierLayout(0x1234).to_resource_state(), None);
    }

    #[test]
    fn display_names_flags() {
        assert_eq!(ResourceState::COMMON.to_string(), "COMMON");
        assert_eq!(
            (ResourceState::RENDER_TARGET | ResourceState::COPY_DEST).to_string(),
            "RENDER_TARGET | COPY_DEST"
        );
    }

    #[test]
    fn writable_states() {
        assert!(ResourceState::UNORDERED_ACCESS.is_writable());
        assert!(ResourceState::DEPTH_WRITE.is_writable());
        assert!(!ResourceState::GENERIC_READ.is_writable());
        assert!(!ResourceState::COMMON.is_writable());
    }
}
