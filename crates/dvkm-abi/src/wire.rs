//! In-memory layout of the ioctl argument.
//!
//! The driver copies this struct from user space and then follows `data`
//! for however many bytes `datasize` claims.

use std::ffi::{c_char, c_int};

use dvkm_core::{IoctlCode, Operation, Request};

/// `struct dvkm_obj` as the driver declares it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DvkmObj {
    pub width: c_int,
    pub height: c_int,
    pub datasize: c_int,
    pub data: *const c_char,
}

/// `sizeof(struct dvkm_obj)`, baked into every request number.
pub const DVKM_OBJ_SIZE: usize = size_of::<DvkmObj>();

impl DvkmObj {
    /// Lower a decoded request. `data` points into the request's payload view.
    #[must_use]
    pub fn from_request(request: &Request<'_>) -> Self {
        Self {
            width: request.width,
            height: request.height,
            datasize: request.size,
            data: request.payload.as_ptr().cast(),
        }
    }
}

/// `_IOWR('D', op, struct dvkm_obj)`.
#[must_use]
pub const fn request_code(op: Operation) -> IoctlCode {
    IoctlCode::for_operation(op, DVKM_OBJ_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvkm_core::{InputBuffer, decode_request};

    #[test]
    fn lowering_keeps_fields_and_borrows_payload() {
        let input = InputBuffer::from_prefix(&[1, 0xFF, 0xFF, 0xFF, 0xFF]);
        let req = decode_request(&input);
        let obj = DvkmObj::from_request(&req);
        assert_eq!(obj.width, -1);
        assert_eq!(obj.height, 0);
        assert_eq!(obj.datasize, 0);
        assert_eq!(obj.data as usize, input.address() + 13);
    }

    #[test]
    fn every_operation_shares_type_and_size() {
        for op in Operation::ALL {
            let code = request_code(op);
            assert_eq!(code.ty(), b'D');
            assert_eq!(code.nr(), op.opcode());
            assert_eq!(code.size(), DVKM_OBJ_SIZE);
        }
    }
}
