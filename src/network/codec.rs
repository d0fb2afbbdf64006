//! Every peer must agree on the bytes of a message, and the same bytes back
//! [`checksum`](crate::checksum), so there is exactly one bincode configuration and all
//! encoding goes through the functions here.
//!
//! # Example
//!
//! ```
//! use predictive_sync::network::codec::{decode_value, encode};
//! use predictive_sync::OverrideMessage;
//!
//! let message: OverrideMessage<u8, i32> = OverrideMessage::Client { action: 3 };
//! let bytes = encode(&message).expect("encoding should succeed");
//! let decoded: OverrideMessage<u8, i32> = decode_value(&bytes).expect("decoding should succeed");
//! assert_eq!(message, decoded);
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use crate::SyncError;

/// Largest payload the decoder will accept. Guards against length prefixes in corrupt
/// or hostile datagrams requesting huge allocations.
pub const MAX_DECODE_BYTES: usize = 1 << 20;

// Fixed-size integers keep message sizes independent of their values.
fn config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_limit::<MAX_DECODE_BYTES>()
}

/// What the codec was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecOperation {
    /// Encoding into a freshly allocated buffer.
    Encode,
    /// Encoding into a caller-provided buffer.
    EncodeIntoBuffer,
    /// Decoding from a byte slice.
    Decode,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "encoding"),
            Self::EncodeIntoBuffer => write!(f, "encoding into buffer"),
            Self::Decode => write!(f, "decoding"),
        }
    }
}

/// Errors from encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// Serialization failed.
    EncodeError {
        /// Message from bincode.
        message: String,
        /// What was being done.
        operation: CodecOperation,
    },
    /// Deserialization failed: truncated, corrupt, or oversized input.
    DecodeError {
        /// Message from bincode.
        message: String,
        /// What was being done.
        operation: CodecOperation,
    },
    /// The caller-provided buffer cannot hold the encoded value.
    BufferTooSmall {
        /// Size of the buffer that was provided.
        provided: usize,
    },
}

impl CodecError {
    fn encode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::EncodeError {
            message: message.into(),
            operation,
        }
    }

    fn decode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::DecodeError {
            message: message.into(),
            operation,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeError { message, operation } => {
                write!(f, "encoding failed while {operation}: {message}")
            },
            Self::DecodeError { message, operation } => {
                write!(f, "decoding failed while {operation}: {message}")
            },
            Self::BufferTooSmall { provided } => {
                write!(f, "buffer too small: only {provided} bytes provided")
            },
        }
    }
}

impl std::error::Error for CodecError {}

impl From<CodecError> for SyncError {
    fn from(err: CodecError) -> Self {
        SyncError::SerializationError {
            context: err.to_string(),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a value into a new `Vec<u8>`.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, config())
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::Encode))
}

/// Encodes a value into `buffer`, returning the number of bytes written.
pub fn encode_into<T: Serialize>(value: &T, buffer: &mut [u8]) -> CodecResult<usize> {
    bincode::serde::encode_into_slice(value, buffer, config()).map_err(|e| match e {
        bincode::error::EncodeError::UnexpectedEnd => CodecError::BufferTooSmall {
            provided: buffer.len(),
        },
        other => CodecError::encode(other.to_string(), CodecOperation::EncodeIntoBuffer),
    })
}

/// Decodes a value, returning it with the number of bytes consumed.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<(T, usize)> {
    bincode::serde::decode_from_slice(bytes, config())
        .map_err(|e| CodecError::decode(e.to_string(), CodecOperation::Decode))
}

/// Decodes a value, ignoring how many bytes were consumed.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    decode(bytes).map(|(value, _)| value)
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::network::messages::RollbackMessage;
    use crate::{CompoundAction, PlayerId, Tick};

    #[test]
    fn rollback_server_message_decodes_to_equal_value() {
        let mut actions = CompoundAction::new();
        actions.insert(PlayerId::from("A"), 1_u8);
        actions.insert(PlayerId::from("B"), 2_u8);
        let original: RollbackMessage<u8, Vec<f64>> = RollbackMessage::Server {
            ack_tick: Tick::new(17),
            actions,
            state: vec![1.0, -2.5],
        };

        let bytes = encode(&original).unwrap();
        let (decoded, len): (RollbackMessage<u8, Vec<f64>>, _) = decode(&bytes).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn fixed_int_encoding_has_value_independent_size() {
        let small = encode(&Tick::new(1)).unwrap();
        let large = encode(&Tick::new(u64::MAX)).unwrap();
        assert_eq!(small.len(), 8);
        assert_eq!(large.len(), 8);
    }

    #[test]
    fn encode_into_reports_small_buffer() {
        let mut buffer = [0_u8; 3];
        let result = encode_into(&0x1234_5678_u64, &mut buffer);
        assert_eq!(result, Err(CodecError::BufferTooSmall { provided: 3 }));
    }

    #[test]
    fn encode_into_round_trips() {
        let mut buffer = [0_u8; 64];
        let len = encode_into(&Tick::new(5), &mut buffer).unwrap();
        let decoded: Tick = decode_value(&buffer[..len]).unwrap();
        assert_eq!(decoded, Tick::new(5));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let original: RollbackMessage<u8, i64> = RollbackMessage::Client {
            tick: Tick::new(3),
            action: 9,
        };
        let bytes = encode(&original).unwrap();
        for cut in 0..bytes.len() {
            let result: CodecResult<RollbackMessage<u8, i64>> = decode_value(&bytes[..cut]);
            assert!(result.is_err(), "prefix of {cut} bytes decoded");
        }
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        // A Vec<u8> claiming u64::MAX elements.
        let bytes = u64::MAX.to_le_bytes();
        let result: CodecResult<Vec<u8>> = decode_value(&bytes);
        assert!(matches!(result, Err(CodecError::DecodeError { .. })));
    }

    #[test]
    fn codec_error_converts_to_sync_error() {
        let err = CodecError::BufferTooSmall { provided: 1 };
        let sync: SyncError = err.into();
        assert!(matches!(sync, SyncError::SerializationError { .. }));
    }
}
