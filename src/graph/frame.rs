//! Frame Memory
//!
//! Per-frame arenas for the two kinds of streamed data: per-object const
//! buffers (256-byte aligned, bound through dynamic offsets) and vertex
//! bytes. CPU-side staging lives in a bump arena; GPU space is leased as
//! chunk buffers from the registry and bulk-released when the frame's
//! fence completes.

use bumpalo::Bump;

use crate::rhi::registry::{BufferKey, BufferRegistry};

/// Alignment of const-buffer views.
const CONST_BUFFER_ALIGN: u64 = 256;

/// Default capacity of one const-buffer chunk.
const CONST_CHUNK_SIZE: u64 = 256 * 1024;
/// Default capacity of one vertex chunk.
const VERTEX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// A leased range inside a frame-owned chunk buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLease {
    pub buffer: BufferKey,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug)]
struct ChunkedAllocator {
    chunks: Vec<BufferKey>,
    chunk_size: u64,
    used: u64,
    align: u64,
    label: &'static str,
}

impl ChunkedAllocator {
    fn new(chunk_size: u64, align: u64, label: &'static str) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_size,
            used: 0,
            align,
            label,
        }
    }

    fn alloc(&mut self, registry: &mut BufferRegistry, size: u64, pass_name: &str) -> BufferLease {
        let aligned = align_up(size, self.align);
        let needs_chunk = match self.chunks.last() {
            None => true,
            Some(_) => self.used + aligned > self.chunk_size,
        };
        if needs_chunk {
            let capacity = self.chunk_size.max(aligned);
            let key = registry.create_buffer(
                capacity,
                &format!("{} arena, pass: {pass_name}", self.label),
            );
            self.chunks.push(key);
            self.used = 0;
        }
        let offset = self.used;
        self.used += aligned;
        BufferLease {
            buffer: *self.chunks.last().expect("chunk just ensured"),
            offset,
            size,
        }
    }

    fn take_chunks(&mut self) -> Vec<BufferKey> {
        self.used = 0;
        std::mem::take(&mut self.chunks)
    }
}

#[inline]
fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

/// Arenas of one in-flight frame.
pub struct FrameMemory {
    staging: Bump,
    const_buffers: ChunkedAllocator,
    vertex_buffers: ChunkedAllocator,
    fence: u64,
}

impl FrameMemory {
    /// Starts a frame whose leases are covered by `fence`.
    #[must_use]
    pub fn begin(fence: u64) -> Self {
        Self {
            staging: Bump::new(),
            const_buffers: ChunkedAllocator::new(CONST_CHUNK_SIZE, CONST_BUFFER_ALIGN, "const"),
            vertex_buffers: ChunkedAllocator::new(VERTEX_CHUNK_SIZE, 4, "vertex"),
            fence,
        }
    }

    /// Fence value covering this frame's submissions.
    #[must_use]
    pub fn fence(&self) -> u64 {
        self.fence
    }

    /// Stages one object's const-buffer payload and leases GPU space for it.
    pub fn alloc_object_const(
        &mut self,
        registry: &mut BufferRegistry,
        bytes: &[u8],
        pass_name: &str,
    ) -> BufferLease {
        self.staging.alloc_slice_copy(bytes);
        self.const_buffers
            .alloc(registry, bytes.len() as u64, pass_name)
    }

    /// Stages streamed vertex bytes and leases GPU space for them.
    pub fn alloc_vertices(
        &mut self,
        registry: &mut BufferRegistry,
        bytes: &[u8],
        pass_name: &str,
    ) -> BufferLease {
        self.staging.alloc_slice_copy(bytes);
        self.vertex_buffers
            .alloc(registry, bytes.len() as u64, pass_name)
    }

    /// Bytes staged so far (diagnostics).
    #[must_use]
    pub fn staged_bytes(&self) -> usize {
        self.staging.allocated_bytes()
    }

    /// Hands every leased chunk to the registry's retirement queue.
    pub fn retire(mut self, registry: &mut BufferRegistry) {
        let mut keys = self.const_buffers.take_chunks();
        keys.extend(self.vertex_buffers.take_chunks());
        registry.retire_frame(self.fence, keys);
    }
}
