//! Chunk framing for streamed synapse responses.
//!
//! Frame format: `[payload length varint][flags byte][sequence varint][payload bytes]`
//!
//! Flags: DATA (bit 0), END_STREAM (bit 1), CANCEL (bit 2). Exactly one bit is
//! set per frame. A DATA frame may carry an empty payload; end of stream is only
//! ever signalled by an END_STREAM frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Maximum payload size of a single frame (4MB)
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Longest valid varint encoding of a u64.
const MAX_VARINT_LEN: usize = 10;

/// Frame flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFlags(u8);

impl FrameFlags {
    pub const DATA: u8 = 0b0000_0001;
    pub const END_STREAM: u8 = 0b0000_0010;
    pub const CANCEL: u8 = 0b0000_0100;

    pub fn new(flags: u8) -> Self {
        Self(flags)
    }

    pub fn is_data(&self) -> bool {
        self.0 == Self::DATA
    }

    pub fn is_end_stream(&self) -> bool {
        self.0 == Self::END_STREAM
    }

    pub fn is_cancel(&self) -> bool {
        self.0 == Self::CANCEL
    }

    /// Whether exactly one known flag is set.
    pub fn is_valid(&self) -> bool {
        matches!(self.0, Self::DATA | Self::END_STREAM | Self::CANCEL)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// A frame in a synapse response stream.
///
/// `sequence` is the zero-based index of a DATA frame. For END_STREAM it is the
/// total number of DATA frames that preceded it, and for CANCEL the index the
/// next DATA frame would have had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: FrameFlags,
    pub sequence: u64,
    pub payload: Bytes,
}

impl Frame {
    /// Create a data frame carrying one producer chunk
    pub fn data(sequence: u64, payload: Bytes) -> Self {
        Self {
            flags: FrameFlags::new(FrameFlags::DATA),
            sequence,
            payload,
        }
    }

    /// Create an end-of-stream frame after `total_chunks` data frames
    pub fn end_stream(total_chunks: u64) -> Self {
        Self {
            flags: FrameFlags::new(FrameFlags::END_STREAM),
            sequence: total_chunks,
            payload: Bytes::new(),
        }
    }

    /// Create a cancel frame with a human-readable reason
    pub fn cancel(sequence: u64, reason: &str) -> Self {
        Self {
            flags: FrameFlags::new(FrameFlags::CANCEL),
            sequence,
            payload: Bytes::copy_from_slice(reason.as_bytes()),
        }
    }

    /// Returns the cancellation reason if this is a CANCEL frame.
    pub fn cancel_reason(&self) -> Option<String> {
        if self.flags.is_cancel() {
            Some(String::from_utf8_lossy(&self.payload).into_owned())
        } else {
            None
        }
    }

    /// Size of this frame once encoded.
    pub fn encoded_len(&self) -> usize {
        varint_len(self.payload.len() as u64) + 1 + varint_len(self.sequence) + self.payload.len()
    }

    /// Encode this frame to bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Encode this frame into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        encode_varint(self.payload.len() as u64, buf);
        buf.put_u8(self.flags.as_u8());
        encode_varint(self.sequence, buf);
        buf.put_slice(&self.payload);
    }
}

/// Frame parser for decoding frames from a chunked byte stream
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: BytesMut,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of bytes buffered but not yet returned as frames.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Try to parse a complete frame from the buffer.
    ///
    /// Returns `Ok(None)` when more data is needed.
    pub fn parse_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let mut cursor = std::io::Cursor::new(&self.buffer[..]);

        let payload_len = match decode_varint(&mut cursor)? {
            Some(len) if len > MAX_FRAME_SIZE as u64 => {
                return Err(FrameError::FrameTooLarge(len));
            }
            Some(len) => len as usize,
            None => return Ok(None),
        };

        if !cursor.has_remaining() {
            return Ok(None);
        }
        let flags = FrameFlags::new(cursor.get_u8());
        if !flags.is_valid() {
            return Err(FrameError::InvalidFlags(flags.as_u8()));
        }

        let sequence = match decode_varint(&mut cursor)? {
            Some(sequence) => sequence,
            None => return Ok(None),
        };

        let header_len = cursor.position() as usize;
        let total_len = header_len + payload_len;
        if self.buffer.len() < total_len {
            return Ok(None);
        }

        let payload = self.buffer.split_to(total_len).split_off(header_len).freeze();

        Ok(Some(Frame {
            flags,
            sequence,
            payload,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    FrameTooLarge(u64),

    #[error("invalid varint encoding")]
    InvalidVarint,

    #[error("invalid frame flags: 0b{0:08b}")]
    InvalidFlags(u8),
}

/// Encode a u64 as a protobuf-style varint
fn encode_varint(mut value: u64, buf: &mut BytesMut) {
    loop {
        if value < 0x80 {
            buf.put_u8(value as u8);
            break;
        } else {
            buf.put_u8(((value & 0x7F) | 0x80) as u8);
            value >>= 7;
        }
    }
}

fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Decode a varint. `Ok(None)` means the buffer ended mid-varint.
fn decode_varint<B: Buf>(buf: &mut B) -> Result<Option<u64>, FrameError> {
    let mut value = 0u64;

    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Ok(None);
        }

        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u64) << (7 * i);

        if byte < 0x80 {
            return Ok(Some(value));
        }
    }

    Err(FrameError::InvalidVarint)
}
