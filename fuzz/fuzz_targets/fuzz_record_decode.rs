#![no_main]

use libfuzzer_sys::fuzz_target;

use can_types::{Profile, Stake, TransactionRecord};

// Stored rows are bincode, API rows are JSON. Neither decoder may panic on
// arbitrary bytes, and a decoded row must re-encode.
fuzz_target!(|data: &[u8]| {
    if let Ok(stake) = bincode::deserialize::<Stake>(data) {
        let _ = bincode::serialize(&stake).unwrap();
    }
    if let Ok(profile) = bincode::deserialize::<Profile>(data) {
        let _ = bincode::serialize(&profile).unwrap();
    }
    let _ = bincode::deserialize::<TransactionRecord>(data);

    if let Ok(stake) = serde_json::from_slice::<Stake>(data) {
        let _ = serde_json::to_vec(&stake).unwrap();
    }
    let _ = serde_json::from_slice::<Profile>(data);
});
