//! Input decoding.
//!
//! Layout of the input region (integers in native byte order):
//!
//! ```text
//! offset  0      selector   u8   -> Operation (selector % 4)
//! offset  1..5   width      i32
//! offset  5..9   height     i32
//! offset  9..13  size       i32
//! offset 13..    payload    [u8] (borrowed, PAYLOAD_CAPACITY bytes)
//! ```
//!
//! Decoding is total: every byte pattern yields a request. Field values are
//! never range-checked; negative or oversized values reach the device as-is.

use crate::input::{HEADER_SIZE, INPUT_CAPACITY, InputBuffer};

pub const SELECTOR_OFFSET: usize = 0;
pub const WIDTH_OFFSET: usize = 1;
pub const HEIGHT_OFFSET: usize = 5;
pub const SIZE_OFFSET: usize = 9;
pub const PAYLOAD_OFFSET: usize = HEADER_SIZE;

/// Device-side operation selected by the first input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operation {
    IntegerOverflow = 0,
    IntegerUnderflow = 1,
    StackBufferOverflow = 2,
    HeapBufferOverflow = 3,
}

impl Operation {
    /// Number of operations the device exposes.
    pub const COUNT: u8 = 4;

    pub const ALL: [Self; Self::COUNT as usize] = [
        Self::IntegerOverflow,
        Self::IntegerUnderflow,
        Self::StackBufferOverflow,
        Self::HeapBufferOverflow,
    ];

    /// Reduce a raw selector byte to an operation.
    #[must_use]
    pub const fn from_selector(selector: u8) -> Self {
        match selector % Self::COUNT {
            0 => Self::IntegerOverflow,
            1 => Self::IntegerUnderflow,
            2 => Self::StackBufferOverflow,
            _ => Self::HeapBufferOverflow,
        }
    }

    /// The ioctl number (`nr`) for this operation.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// Stable snake_case name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IntegerOverflow => "integer_overflow",
            Self::IntegerUnderflow => "integer_underflow",
            Self::StackBufferOverflow => "stack_buffer_overflow",
            Self::HeapBufferOverflow => "heap_buffer_overflow",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded device request.
///
/// `payload` borrows the input region; nothing is copied. The device may
/// trust `size` over `payload.len()` and read past the view. That is the
/// point of the harness, so it is not prevented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub operation: Operation,
    pub width: i32,
    pub height: i32,
    pub size: i32,
    pub payload: &'a [u8],
}

impl Request<'_> {
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.operation.opcode()
    }
}

/// Decode the input region into a request.
#[must_use]
pub fn decode_request(input: &InputBuffer) -> Request<'_> {
    let bytes = input.as_bytes();
    Request {
        operation: Operation::from_selector(bytes[SELECTOR_OFFSET]),
        width: read_i32(bytes, WIDTH_OFFSET),
        height: read_i32(bytes, HEIGHT_OFFSET),
        size: read_i32(bytes, SIZE_OFFSET),
        payload: &bytes[PAYLOAD_OFFSET..],
    }
}

fn read_i32(bytes: &[u8; INPUT_CAPACITY], offset: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_ne_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PAYLOAD_CAPACITY;

    #[test]
    fn selector_reduces_modulo_operation_count() {
        for b in 0..=u8::MAX {
            let op = Operation::from_selector(b);
            assert_eq!(op.opcode(), b % 4, "selector {b:#04x}");
        }
    }

    #[test]
    fn zero_buffer_decodes_to_integer_overflow() {
        let input = InputBuffer::zeroed();
        let req = decode_request(&input);
        assert_eq!(req.operation, Operation::IntegerOverflow);
        assert_eq!((req.width, req.height, req.size), (0, 0, 0));
        assert_eq!(req.payload.len(), PAYLOAD_CAPACITY);
        assert!(req.payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn fields_use_native_byte_order() {
        let mut prefix = vec![0x02];
        prefix.extend_from_slice(&0x0102_0304i32.to_ne_bytes());
        prefix.extend_from_slice(&(-7i32).to_ne_bytes());
        prefix.extend_from_slice(&i32::MAX.to_ne_bytes());
        prefix.extend_from_slice(b"payload");
        let input = InputBuffer::from_prefix(&prefix);

        let req = decode_request(&input);
        assert_eq!(req.operation, Operation::StackBufferOverflow);
        assert_eq!(req.width, 0x0102_0304);
        assert_eq!(req.height, -7);
        assert_eq!(req.size, i32::MAX);
        assert_eq!(&req.payload[..7], b"payload");
    }

    #[test]
    fn all_ones_width_is_minus_one() {
        let input = InputBuffer::from_prefix(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_request(&input).width, -1);
    }

    #[test]
    fn payload_borrows_the_input_region() {
        let input = InputBuffer::zeroed();
        let req = decode_request(&input);
        let base = input.as_bytes().as_ptr();
        assert_eq!(req.payload.as_ptr(), base.wrapping_add(PAYLOAD_OFFSET));
    }

    #[test]
    fn operation_names_are_stable() {
        let names: Vec<_> = Operation::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(
            names,
            [
                "integer_overflow",
                "integer_underflow",
                "stack_buffer_overflow",
                "heap_buffer_overflow"
            ]
        );
    }
}
