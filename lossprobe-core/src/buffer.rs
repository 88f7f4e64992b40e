use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;

/// A queue of received `Bytes` segments.
///
/// Each kernel read lands as one segment. Frame decoding peeks at headers with
/// `copy_prefix` and pulls bodies out with `take_bytes`, which is a refcount
/// bump when the body sits inside one segment and a copy when it straddles
/// segments.
#[derive(Debug, Default)]
pub struct SegmentedBuffer {
    segs: VecDeque<Bytes>,
    len: usize,
}

impl SegmentedBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segs: VecDeque::new(),
            len: 0,
        }
    }

    /// Total number of buffered bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn push(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        self.segs.push_back(bytes);
    }

    /// Copy the first `dst.len()` bytes into `dst` without consuming them.
    ///
    /// Returns `false` if fewer bytes are buffered.
    pub fn copy_prefix(&self, dst: &mut [u8]) -> bool {
        if dst.len() > self.len {
            return false;
        }

        let mut filled = 0;
        for seg in &self.segs {
            if filled == dst.len() {
                break;
            }
            let take = (dst.len() - filled).min(seg.len());
            dst[filled..filled + take].copy_from_slice(&seg[..take]);
            filled += take;
        }
        true
    }

    /// Drop up to `n` bytes from the front.
    pub fn advance(&mut self, n: usize) {
        let mut n = n.min(self.len);
        self.len -= n;

        while n > 0 {
            let Some(mut front) = self.segs.pop_front() else {
                break;
            };
            if n >= front.len() {
                n -= front.len();
                continue;
            }
            front.advance(n);
            self.segs.push_front(front);
            break;
        }
    }

    /// Take exactly `n` bytes from the front.
    ///
    /// Returns `None` (and consumes nothing) if fewer than `n` bytes are buffered.
    pub fn take_bytes(&mut self, n: usize) -> Option<Bytes> {
        if n == 0 {
            return Some(Bytes::new());
        }
        if n > self.len {
            return None;
        }

        let front = self.segs.front_mut()?;
        if front.len() >= n {
            self.len -= n;
            let out = front.split_to(n);
            if front.is_empty() {
                self.segs.pop_front();
            }
            return Some(out);
        }

        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            let Some(mut seg) = self.segs.pop_front() else {
                break;
            };
            let take = (n - out.len()).min(seg.len());
            out.extend_from_slice(&seg.split_to(take));
            if !seg.is_empty() {
                self.segs.push_front(seg);
            }
        }
        self.len -= out.len();

        Some(out.freeze())
    }
}
