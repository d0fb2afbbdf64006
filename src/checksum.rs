//! Deterministic snapshot checksums for divergence detection.
//!
//! A checksum is the FNV-1a hash of the snapshot's [`codec`](crate::network::codec)
//! encoding. Fixed-size integer encoding and an unseeded hash make it identical on every
//! peer and platform, so comparing a client's checksum with the server's is enough to
//! tell whether the two have diverged. [`Scenario::desynced_clients`] does exactly that.
//!
//! Floating point fields are compared bit for bit: `0.0` and `-0.0` hash differently.
//!
//! ```
//! use predictive_sync::checksum::compute_checksum;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct World {
//!     position: (f32, f32),
//! }
//!
//! let world = World { position: (1.0, 2.0) };
//! let checksum = compute_checksum(&world).expect("should serialize");
//! assert_eq!(checksum, compute_checksum(&world).unwrap());
//! ```
//!
//! [`Scenario::desynced_clients`]: crate::Scenario::desynced_clients

use crate::network::codec::{encode, CodecResult};
use serde::Serialize;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Computes the checksum of a serializable value.
pub fn compute_checksum<T: Serialize>(state: &T) -> CodecResult<u64> {
    let bytes = encode(state)?;
    Ok(fnv1a(&bytes))
}

/// FNV-1a over raw bytes.
#[inline]
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
