//! GPU buffer primitive interface
//!
//! The runtime never talks to a graphics API directly. A surface's
//! [`GpuContext`] allocates attribute buffers and reports whether the
//! underlying device/context has been lost; [`GpuBuffer`]s are opaque apart
//! from their size and explicit destruction.

use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

/// Per-vertex attribute channels a morph target can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeChannel {
    /// Vertex positions (xyz)
    Position,
    /// Vertex normals (xyz)
    Normal,
    /// First texture coordinate set (uv)
    Uv,
    /// Second texture coordinate set (uv)
    Uv2,
}

impl AttributeChannel {
    /// Every channel in upload order
    pub const ALL: [Self; 4] = [Self::Position, Self::Normal, Self::Uv, Self::Uv2];

    /// Float components per vertex
    pub const fn components(self) -> usize {
        match self {
            Self::Position | Self::Normal => 3,
            Self::Uv | Self::Uv2 => 2,
        }
    }

    /// Name used in logs and errors
    pub const fn name(self) -> &'static str {
        match self {
            Self::Position => "positions",
            Self::Normal => "normals",
            Self::Uv => "uv",
            Self::Uv2 => "uv2",
        }
    }

    /// Mask bit for this channel
    pub const fn mask(self) -> ChannelMask {
        match self {
            Self::Position => ChannelMask::POSITION,
            Self::Normal => ChannelMask::NORMAL,
            Self::Uv => ChannelMask::UV,
            Self::Uv2 => ChannelMask::UV2,
        }
    }
}

bitflags! {
    /// Set of attribute channels present on a target
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelMask: u8 {
        /// Positions present
        const POSITION = 1 << 0;
        /// Normals present
        const NORMAL = 1 << 1;
        /// First uv set present
        const UV = 1 << 2;
        /// Second uv set present
        const UV2 = 1 << 3;
    }
}

/// Everything a context needs to create one attribute buffer
#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    /// Attribute channel the data belongs to
    pub channel: AttributeChannel,
    /// Raw float data, `item_count * components_per_item` long
    pub data: &'a [f32],
    /// Number of vertices
    pub item_count: usize,
    /// Floats per vertex
    pub components_per_item: usize,
}

impl<'a> BufferDescriptor<'a> {
    /// Describe a vertex buffer for one channel
    pub fn vertex(channel: AttributeChannel, data: &'a [f32]) -> Self {
        let components = channel.components();
        Self {
            channel,
            data,
            item_count: data.len() / components,
            components_per_item: components,
        }
    }

    /// Data as bytes, ready for upload
    pub fn as_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.data)
    }

    /// Upload size in bytes
    pub fn byte_len(&self) -> usize {
        std::mem::size_of_val(self.data)
    }
}

/// Buffer creation failure reported by a context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The device ran out of memory
    #[error("out of device memory allocating {requested} bytes")]
    OutOfMemory {
        /// Size of the failed request
        requested: usize,
    },
    /// The context was lost while allocating
    #[error("rendering context lost")]
    ContextLost,
    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// GPU-resident buffer owned by a resource entry
pub trait GpuBuffer: fmt::Debug {
    /// Size of the uploaded data in bytes
    fn byte_len(&self) -> usize;

    /// Release the GPU-side storage
    fn destroy(self: Box<Self>);
}

/// Device/context behind one rendering surface
pub trait GpuContext: fmt::Debug {
    /// Whether the external environment destroyed this context
    fn is_lost(&self) -> bool;

    /// Create and upload one buffer
    fn allocate(&self, descriptor: &BufferDescriptor<'_>) -> Result<Box<dyn GpuBuffer>, AllocationError>;
}
