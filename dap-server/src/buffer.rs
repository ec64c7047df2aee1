//! Bounded single-producer/single-consumer byte ring.
//!
//! Besides plain put/get the ring supports two access patterns used by the command engine:
//!
//! - claim/commit: borrow the largest contiguous free (or filled) region, then commit how many
//!   bytes were actually produced (or consumed). Committing less than was claimed is allowed.
//! - reserve/patch: reserve bytes of a response field whose value is only known later and
//!   receive a [`Slot`] that can be written once the value is known.
use crate::error::BufferError;

/// Handle to bytes reserved with [`RingBuffer::reserve`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Slot {
    offset: usize,
    len: usize,
}

#[derive(Debug)]
pub struct RingBuffer {
    storage: Box<[u8]>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> RingBuffer {
        RingBuffer {
            storage: vec![0u8; capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of bytes available for reading
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes available for writing
    pub fn space(&self) -> usize {
        self.capacity() - self.len
    }

    /// Drops all content. The next write starts at the beginning of the storage,
    /// so a freshly reset ring always offers its full capacity as one contiguous claim.
    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn tail(&self) -> usize {
        (self.head + self.len) % self.capacity()
    }

    /// Claims up to `max` contiguous free bytes at the write position.
    pub fn put_claim(&mut self, max: usize) -> &mut [u8] {
        let tail = self.tail();
        let contiguous = if self.len == self.capacity() {
            0
        } else if tail >= self.head {
            self.capacity() - tail
        } else {
            self.head - tail
        };
        let n = contiguous.min(max);
        &mut self.storage[tail..tail + n]
    }

    /// Commits `n` bytes written into the last claim.
    pub fn put_finish(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.space() {
            return Err(BufferError::Overflow {
                needed: n,
                available: self.space(),
            });
        }
        self.len += n;
        Ok(())
    }

    /// Claims up to `max` contiguous readable bytes.
    pub fn get_claim(&self, max: usize) -> &[u8] {
        let contiguous = self.len.min(self.capacity() - self.head);
        let n = contiguous.min(max);
        &self.storage[self.head..self.head + n]
    }

    /// Consumes `n` bytes of the last read claim.
    pub fn get_finish(&mut self, n: usize) -> Result<(), BufferError> {
        if n > self.len {
            return Err(BufferError::Underflow {
                needed: n,
                available: self.len,
            });
        }
        self.head = (self.head + n) % self.capacity();
        self.len -= n;
        Ok(())
    }

    /// Writes as much of `data` as fits and returns the number of bytes written.
    pub fn put(&mut self, data: &[u8]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let claim = self.put_claim(data.len() - written);
            if claim.is_empty() {
                break;
            }
            let n = claim.len();
            claim.copy_from_slice(&data[written..written + n]);
            self.len += n;
            written += n;
        }
        written
    }

    /// Reads as many bytes as available into `out` and returns the number of bytes read.
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        let mut read = 0;
        while read < out.len() {
            let claim = self.get_claim(out.len() - read);
            if claim.is_empty() {
                break;
            }
            let n = claim.len();
            out[read..read + n].copy_from_slice(claim);
            self.head = (self.head + n) % self.capacity();
            self.len -= n;
            read += n;
        }
        read
    }

    /// Writes all of `data` or nothing.
    pub fn put_all(&mut self, data: &[u8]) -> Result<(), BufferError> {
        if data.len() > self.space() {
            return Err(BufferError::Overflow {
                needed: data.len(),
                available: self.space(),
            });
        }
        self.put(data);
        Ok(())
    }

    /// Fills all of `out` or reads nothing.
    pub fn take_exact(&mut self, out: &mut [u8]) -> Result<(), BufferError> {
        if out.len() > self.len {
            return Err(BufferError::Underflow {
                needed: out.len(),
                available: self.len,
            });
        }
        self.get(out);
        Ok(())
    }

    pub fn take_u8(&mut self) -> Result<u8, BufferError> {
        let mut buf = [0u8; 1];
        self.take_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn take_le16(&mut self) -> Result<u16, BufferError> {
        let mut buf = [0u8; 2];
        self.take_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn take_le32(&mut self) -> Result<u32, BufferError> {
        let mut buf = [0u8; 4];
        self.take_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Discards `n` bytes, or none if fewer are available.
    pub fn skip(&mut self, n: usize) -> Result<(), BufferError> {
        self.get_finish(n)
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), BufferError> {
        self.put_all(&[value])
    }

    pub fn put_le16(&mut self, value: u16) -> Result<(), BufferError> {
        self.put_all(&value.to_le_bytes())
    }

    pub fn put_le32(&mut self, value: u32) -> Result<(), BufferError> {
        self.put_all(&value.to_le_bytes())
    }

    /// Reserves `n` zeroed bytes to be filled in later with [`RingBuffer::patch`].
    pub fn reserve(&mut self, n: usize) -> Result<Slot, BufferError> {
        let offset = self.tail();
        if n > self.space() {
            return Err(BufferError::Overflow {
                needed: n,
                available: self.space(),
            });
        }
        for i in 0..n {
            let index = (offset + i) % self.capacity();
            self.storage[index] = 0;
        }
        self.len += n;
        Ok(Slot { offset, len: n })
    }

    /// Overwrites the reserved bytes of `slot`. Extra bytes in `data` are ignored.
    pub fn patch(&mut self, slot: Slot, data: &[u8]) {
        for (i, byte) in data.iter().take(slot.len).enumerate() {
            let index = (slot.offset + i) % self.capacity();
            self.storage[index] = *byte;
        }
    }

    /// Byte at position `index` from the read position, without consuming it.
    pub fn peek(&self, index: usize) -> Option<u8> {
        if index < self.len {
            Some(self.storage[(self.head + index) % self.capacity()])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn put_and_get_across_wrap() {
        let mut ring = RingBuffer::new(8);
        assert_eq!(ring.put(&[1, 2, 3, 4, 5, 6]), 6);
        let mut out = [0u8; 4];
        assert_eq!(ring.get(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(ring.put(&[7, 8, 9, 10, 11, 12]), 6);
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.put(&[13]), 0);
        let mut out = [0u8; 8];
        assert_eq!(ring.get(&mut out), 8);
        assert_eq!(out, [5, 6, 7, 8, 9, 10, 11, 12]);
        assert!(ring.is_empty());
    }

    #[test]
    fn claims_stop_at_wrap() {
        let mut ring = RingBuffer::new(8);
        ring.put(&[0; 6]);
        ring.skip(6).unwrap();
        assert_eq!(ring.put_claim(8).len(), 2);
        ring.put_claim(2).copy_from_slice(&[1, 2]);
        ring.put_finish(2).unwrap();
        assert_eq!(ring.put_claim(8).len(), 6);
        ring.put(&[3, 4, 5]);
        assert_eq!(ring.get_claim(8), &[1, 2]);
        ring.get_finish(2).unwrap();
        assert_eq!(ring.get_claim(8), &[3, 4, 5]);
    }

    #[test]
    fn commit_less_than_claimed() {
        let mut ring = RingBuffer::new(16);
        let claim = ring.put_claim(10);
        assert_eq!(claim.len(), 10);
        claim[..3].copy_from_slice(&[0xaa, 0xbb, 0xcc]);
        ring.put_finish(3).unwrap();
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.take_u8(), Ok(0xaa));
    }

    #[test]
    fn typed_reads_are_all_or_nothing() {
        let mut ring = RingBuffer::new(16);
        ring.put(&[0x20, 0x4e, 0x00]);
        assert_eq!(
            ring.take_le32(),
            Err(BufferError::Underflow {
                needed: 4,
                available: 3
            })
        );
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.take_le16(), Ok(0x4e20));
        assert!(ring.skip(2).is_err());
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn reserve_and_patch() {
        let mut ring = RingBuffer::new(6);
        ring.put(&[0; 4]);
        ring.skip(4).unwrap();
        ring.put_u8(0x05).unwrap();
        let slot = ring.reserve(2).unwrap();
        ring.put_le16(0xbeef).unwrap();
        ring.patch(slot, &[0x02, 0x01]);
        let mut out = [0u8; 5];
        assert_eq!(ring.get(&mut out), 5);
        assert_eq!(out, [0x05, 0x02, 0x01, 0xef, 0xbe]);
    }

    #[test]
    fn overflow_leaves_content() {
        let mut ring = RingBuffer::new(4);
        ring.put_le16(0x0102).unwrap();
        assert!(ring.put_le32(0).is_err());
        assert!(ring.reserve(3).is_err());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.peek(1), Some(0x01));
        assert_eq!(ring.peek(2), None);
    }
}
