//! Resource limits for the heap.

/// Limits the runtime enforces while allocating.
///
/// With the default (no cap) the heap grows by whole chunks whenever a
/// collection fails to free a slot. A cap turns that growth into a
/// resource error instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLimits {
    /// Maximum number of heap slots across all chunks, or `None` for
    /// unbounded growth.
    pub max_heap_slots: Option<usize>,
}

impl ResourceLimits {
    /// Unbounded limits, the default for scripts run from the CLI.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Caps the heap at `slots` total slots.
    #[must_use]
    pub fn with_max_heap_slots(slots: usize) -> Self {
        Self {
            max_heap_slots: Some(slots),
        }
    }
}
