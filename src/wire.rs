//! Wire encoding for hops and program payloads.
//!
//! Everything that crosses a shard boundary is a postcard body behind a
//! fixed little-endian `u32` length prefix. The format is structural: a
//! compound type encodes as its fields in declaration order, so round-trip
//! equality is the only contract and both ends must agree on the type.
//!
//! A frame that fails to decode is dropped by the receiver; the error never
//! crosses the boundary back.

use bytes::{Buf, BufMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};

use crate::constants::MAX_HOP_MESSAGE_SIZE;
use crate::graph::RemoteNode;

/// Byte width of the frame length prefix.
pub const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Snafu)]
pub enum WireError {
    /// The encoded message does not fit in a frame.
    #[snafu(display("encoded message of {len} bytes exceeds the {limit} byte frame limit"))]
    Oversize { len: usize, limit: usize },

    /// The buffer ends before the frame does.
    #[snafu(display("truncated frame: header promises {expected} bytes, buffer holds {actual}"))]
    Truncated { expected: usize, actual: usize },

    /// Serialization failed (unrepresentable value).
    #[snafu(display("failed to encode message: {source}"))]
    Encode { source: postcard::Error },

    /// The bytes do not parse as the expected type.
    #[snafu(display("failed to decode message: {source}"))]
    Decode { source: postcard::Error },
}

/// One hop between shards.
///
/// The params stay encoded inside the envelope so the dispatch path is
/// independent of which program is running; they are decoded against the
/// program's params type at the destination.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HopEnvelope {
    /// Request this hop belongs to; also the snapshot clock.
    pub req_id: u64,
    /// Node the hop is addressed to (or the coordinator sink).
    pub dst: RemoteNode,
    /// Encoded program params (unframed postcard body).
    pub params: Vec<u8>,
}

/// Encoded size of a value's postcard body, without the frame header.
pub fn encoded_size<T: Serialize>(value: &T) -> Result<usize, WireError> {
    Ok(encode_body(value)?.len())
}

/// Encode a bare postcard body (no length prefix).
pub fn encode_body<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    postcard::to_stdvec(value).context(EncodeSnafu)
}

/// Decode a bare postcard body.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, WireError> {
    postcard::from_bytes(body).context(DecodeSnafu)
}

/// Encode a value as a length-prefixed frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let body = encode_body(value)?;
    let len = FRAME_HEADER_LEN + body.len();
    if len > MAX_HOP_MESSAGE_SIZE {
        return OversizeSnafu {
            len,
            limit: MAX_HOP_MESSAGE_SIZE,
        }
        .fail();
    }

    let mut frame = Vec::with_capacity(len);
    frame.put_u32_le(body.len() as u32);
    frame.put_slice(&body);
    Ok(frame)
}

/// Decode a length-prefixed frame produced by [`encode_frame`].
pub fn decode_frame<T: DeserializeOwned>(mut frame: &[u8]) -> Result<T, WireError> {
    if frame.len() < FRAME_HEADER_LEN {
        return TruncatedSnafu {
            expected: FRAME_HEADER_LEN,
            actual: frame.len(),
        }
        .fail();
    }
    let body_len = frame.get_u32_le() as usize;
    if frame.len() < body_len {
        return TruncatedSnafu {
            expected: body_len,
            actual: frame.len(),
        }
        .fail();
    }
    decode_body(&frame[..body_len])
}
