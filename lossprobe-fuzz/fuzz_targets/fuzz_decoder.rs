#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use lossprobe_core::buffer::SegmentedBuffer;
use lossprobe_zmtp::codec::ZmtpDecoder;
use lossprobe_zmtp::command::parse_ready;
use lossprobe_zmtp::greeting::{ZmtpGreeting, GREETING_SIZE};

fuzz_target!(|data: &[u8]| {
    if data.len() >= GREETING_SIZE {
        let _ = ZmtpGreeting::parse(&data[..GREETING_SIZE]);
    }

    let _ = parse_ready(data);

    // Feed the input in uneven segments so frames straddle them.
    let decoder = ZmtpDecoder::with_max_frame_size(Some(1 << 20));
    let mut buf = SegmentedBuffer::new();
    for chunk in data.chunks(7) {
        buf.push(Bytes::copy_from_slice(chunk));
        loop {
            let before = buf.len();
            match decoder.decode(&mut buf) {
                Ok(Some(_)) => assert!(buf.len() < before),
                Ok(None) | Err(_) => break,
            }
        }
    }
});
