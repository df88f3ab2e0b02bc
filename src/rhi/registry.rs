//! Buffer Registry
//!
//! Central owner of GPU buffer handles and their descriptor-heap indices.
//! Root arguments never own GPU memory; they hold a [`BufferKey`] into this
//! registry and are considered *bound* only while the key is live.
//!
//! Frame-scoped allocations (streamed vertex data, per-object const
//! buffers) are leased per frame and retired in bulk once the fence
//! covering their last submission has passed.

use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Opaque handle to a registry-owned GPU buffer.
    pub struct BufferKey;
}

/// One registry-owned buffer.
#[derive(Debug, Clone)]
struct BufferSlot {
    size: u64,
    descriptor_index: u32,
    #[allow(dead_code)]
    debug_name: String,
}

/// Pending release of one frame's leases.
#[derive(Debug)]
struct RetiredFrame {
    fence: u64,
    keys: Vec<BufferKey>,
}

/// Central buffer/descriptor bookkeeping.
#[derive(Default)]
pub struct BufferRegistry {
    buffers: SlotMap<BufferKey, BufferSlot>,
    next_descriptor_index: u32,
    retired: Vec<RetiredFrame>,
}

impl BufferRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer and assigns it the next descriptor-heap index.
    pub fn create_buffer(&mut self, size: u64, debug_name: &str) -> BufferKey {
        let descriptor_index = self.next_descriptor_index;
        self.next_descriptor_index += 1;
        self.buffers.insert(BufferSlot {
            size,
            descriptor_index,
            debug_name: debug_name.to_string(),
        })
    }

    /// Whether `key` still refers to a live buffer.
    #[inline]
    #[must_use]
    pub fn is_live(&self, key: BufferKey) -> bool {
        self.buffers.contains_key(key)
    }

    /// Descriptor-heap index of a live buffer.
    #[must_use]
    pub fn descriptor_index(&self, key: BufferKey) -> Option<u32> {
        self.buffers.get(key).map(|slot| slot.descriptor_index)
    }

    /// Size in bytes of a live buffer.
    #[must_use]
    pub fn buffer_size(&self, key: BufferKey) -> Option<u64> {
        self.buffers.get(key).map(|slot| slot.size)
    }

    /// Queues a frame's leased buffers for release once `fence` completes.
    pub fn retire_frame(&mut self, fence: u64, keys: Vec<BufferKey>) {
        if !keys.is_empty() {
            self.retired.push(RetiredFrame { fence, keys });
        }
    }

    /// Releases every lease whose fence value is `<= completed_fence`.
    pub fn on_fence_completed(&mut self, completed_fence: u64) {
        let mut released = 0usize;
        self.retired.retain(|frame| {
            if frame.fence <= completed_fence {
                released += frame.keys.len();
                for key in &frame.keys {
                    // Double-release is a logic error upstream; tolerate it.
                    self.buffers.remove(*key);
                }
                false
            } else {
                true
            }
        });
        if released > 0 {
            log::trace!("released {released} frame-scoped buffers at fence {completed_fence}");
        }
    }

    /// Number of live buffers (diagnostics).
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.buffers.len()
    }
}
