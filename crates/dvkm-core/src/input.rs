//! Fixed-capacity fuzzer input.
//!
//! The fuzzer and the harness agree on [`INPUT_CAPACITY`] at build time. The
//! harness always decodes the whole region, regardless of how many bytes the
//! fuzzer actually wrote: the region starts zeroed and the tail keeps whatever
//! was there.

/// Size of the input region shared with the fuzzer.
pub const INPUT_CAPACITY: usize = 1024;

/// Bytes consumed by the fixed header: selector + three `i32` fields.
pub const HEADER_SIZE: usize = 1 + 3 * core::mem::size_of::<i32>();

/// Bytes left for the payload view once the header is consumed.
pub const PAYLOAD_CAPACITY: usize = INPUT_CAPACITY - HEADER_SIZE;

/// One trial's worth of raw fuzzer input.
#[derive(Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct InputBuffer([u8; INPUT_CAPACITY]);

impl InputBuffer {
    /// An all-zero buffer, matching a freshly loaded static region.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self([0; INPUT_CAPACITY])
    }

    /// Build a buffer from a prefix, zero-filling the rest.
    ///
    /// Bytes past [`INPUT_CAPACITY`] are dropped, the same way the fuzzer
    /// truncates oversized testcases before writing them.
    #[must_use]
    pub fn from_prefix(prefix: &[u8]) -> Self {
        let mut bytes = [0u8; INPUT_CAPACITY];
        let n = prefix.len().min(INPUT_CAPACITY);
        bytes[..n].copy_from_slice(&prefix[..n]);
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; INPUT_CAPACITY] {
        &self.0
    }

    #[must_use]
    pub fn as_mut_bytes(&mut self) -> &mut [u8; INPUT_CAPACITY] {
        &mut self.0
    }

    /// Start address of the region, for diagnostics.
    #[must_use]
    pub fn address(&self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl core::fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InputBuffer")
            .field("capacity", &INPUT_CAPACITY)
            .field("head", &&self.0[..HEADER_SIZE])
            .finish_non_exhaustive()
    }
}
