//! Length-prefixed framing of DAP packets for stream transports.
//!
//! Every packet is preceded by its length as a little-endian `u16`.
use std::io::{self, Read, Write};

use crate::error::ReadError;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Largest payload a length prefix can describe
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

pub fn encode_length(len: usize) -> Result<[u8; LENGTH_PREFIX_LEN], ReadError> {
    let len = u16::try_from(len).map_err(|_| ReadError::TooManyBytes {
        max: MAX_FRAME_LEN,
        got: len,
    })?;
    Ok(len.to_le_bytes())
}

pub fn decode_length(prefix: [u8; LENGTH_PREFIX_LEN]) -> usize {
    u16::from_le_bytes(prefix) as usize
}

/// Writes `payload` preceded by its length.
pub fn write_frame(writer: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    let prefix = encode_length(payload.len())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    writer.write_all(&prefix)?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Reads one frame into `buf` and returns the payload length.
/// Frames that do not fit into `buf` are rejected before the payload is read.
pub fn read_frame_into(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, ReadError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut prefix)?;
    read_payload(reader, decode_length(prefix), buf)
}

/// Reads the payload of a frame whose length prefix was already consumed.
pub fn read_payload(reader: &mut impl Read, len: usize, buf: &mut [u8]) -> Result<usize, ReadError> {
    if len > buf.len() {
        return Err(ReadError::TooManyBytes {
            max: buf.len(),
            got: len,
        });
    }
    reader.read_exact(&mut buf[..len])?;
    Ok(len)
}

/// Reads one frame of at most `max_len` bytes.
pub fn read_frame(reader: &mut impl Read, max_len: usize) -> Result<Box<[u8]>, ReadError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut prefix)?;
    let len = decode_length(prefix);
    if len > max_len {
        return Err(ReadError::TooManyBytes { max: max_len, got: len });
    }
    let mut payload = vec![0u8; len].into_boxed_slice();
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

#[cfg(feature = "tokio")]
pub use self::tokio::DapCodec;

#[cfg(feature = "tokio")]
mod tokio {
    use bytes::{Buf, BufMut, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::{LENGTH_PREFIX_LEN, decode_length, encode_length};
    use crate::error::ReadError;

    /// [`tokio_util::codec`] implementation of the length-prefixed framing.
    ///
    /// Decoding yields the payload without the prefix.
    #[derive(Debug, Clone)]
    pub struct DapCodec {
        max_len: usize,
    }

    impl DapCodec {
        pub fn new(max_len: usize) -> DapCodec {
            DapCodec { max_len }
        }
    }

    impl Decoder for DapCodec {
        type Item = BytesMut;
        type Error = ReadError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            if src.len() < LENGTH_PREFIX_LEN {
                return Ok(None);
            }
            let len = decode_length([src[0], src[1]]);
            if len > self.max_len {
                return Err(ReadError::TooManyBytes {
                    max: self.max_len,
                    got: len,
                });
            }
            if src.len() < LENGTH_PREFIX_LEN + len {
                src.reserve(LENGTH_PREFIX_LEN + len - src.len());
                return Ok(None);
            }
            src.advance(LENGTH_PREFIX_LEN);
            Ok(Some(src.split_to(len)))
        }
    }

    impl<'a> Encoder<&'a [u8]> for DapCodec {
        type Error = ReadError;

        fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
            let prefix = encode_length(item.len())?;
            dst.reserve(LENGTH_PREFIX_LEN + item.len());
            dst.put_slice(&prefix);
            dst.put_slice(item);
            Ok(())
        }
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn decode_waits_for_complete_frame() {
            let mut codec = DapCodec::new(512);
            let mut buf = BytesMut::from(&b"\x03\x00\x02"[..]);
            assert!(codec.decode(&mut buf).unwrap().is_none());
            buf.extend_from_slice(b"\x02\x11");
            let frame = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(&frame[..], b"\x02\x02\x11");
            assert!(buf.is_empty());
        }

        #[test]
        fn decode_rejects_oversized_frame() {
            let mut codec = DapCodec::new(4);
            let mut buf = BytesMut::from(&b"\x05\x00"[..]);
            match codec.decode(&mut buf) {
                Err(ReadError::TooManyBytes { max, got }) => {
                    assert_eq!(max, 4);
                    assert_eq!(got, 5);
                }
                other => panic!("expected TooManyBytes, got {:?}", other),
            }
        }

        #[test]
        fn encode_prefixes_length() {
            let mut codec = DapCodec::new(512);
            let mut buf = BytesMut::new();
            codec.encode(&b"\x7f\x01\x09\x00"[..], &mut buf).unwrap();
            assert_eq!(&buf[..], b"\x04\x00\x7f\x01\x09\x00");
        }
    }
}
