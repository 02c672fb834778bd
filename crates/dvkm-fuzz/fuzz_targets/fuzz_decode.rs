#![no_main]
use libfuzzer_sys::fuzz_target;

use dvkm_core::{HEADER_SIZE, InputBuffer, IoctlCode, PAYLOAD_CAPACITY, decode_request};

// Any byte string, truncated or zero-filled to the region size, decodes.
fuzz_target!(|data: &[u8]| {
    let input = InputBuffer::from_prefix(data);
    let request = decode_request(&input);

    assert_eq!(request.opcode(), input.as_bytes()[0] % 4);
    assert_eq!(request.payload.len(), PAYLOAD_CAPACITY);
    assert_eq!(request.payload, &input.as_bytes()[HEADER_SIZE..]);

    let width = i32::from_ne_bytes([
        input.as_bytes()[1],
        input.as_bytes()[2],
        input.as_bytes()[3],
        input.as_bytes()[4],
    ]);
    assert_eq!(request.width, width);

    let code = IoctlCode::for_operation(request.operation, 24);
    assert_eq!(code.nr(), request.opcode());
});
