//! Fuzz target for protocol message decoding.
//!
//! Malformed datagrams must come back as `Err`, never a panic, and anything that
//! decodes must encode again.

#![no_main]

use libfuzzer_sys::fuzz_target;
use predictive_sync::network::codec;
use predictive_sync::{AlgebraicMessage, OverrideMessage, RollbackMessage};

type Action = Option<u8>;
type State = Vec<(String, i64)>;

fn check<M>(data: &[u8])
where
    M: serde::Serialize + serde::de::DeserializeOwned,
{
    if let Ok(message) = codec::decode_value::<M>(data) {
        let _ = codec::encode(&message);
    }
}

fuzz_target!(|data: &[u8]| {
    check::<OverrideMessage<Action, State>>(data);
    check::<RollbackMessage<Action, State>>(data);
    check::<AlgebraicMessage<Action, State>>(data);
});
