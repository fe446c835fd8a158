#![no_main]

use libfuzzer_sys::fuzz_target;

use can_staking::{compute_reward, compute_reward_checked};
use can_types::{Apy, CanAmount, Timestamp};

// Reward computation must never panic, must agree with the checked variant
// whenever that one succeeds, and must not decrease as time advances.
fuzz_target!(|data: &[u8]| {
    if data.len() < 36 {
        return;
    }

    let principal = u128::from_le_bytes(data[0..16].try_into().unwrap());
    let bps = u32::from_le_bytes(data[16..20].try_into().unwrap());
    let since = u64::from_le_bytes(data[20..28].try_into().unwrap());
    let now = u64::from_le_bytes(data[28..36].try_into().unwrap());

    let Ok(apy) = Apy::from_bps(bps) else {
        return;
    };
    let principal = CanAmount::new(principal);
    let since = Timestamp::new(since);
    let now = Timestamp::new(now);

    let reward = compute_reward(principal, apy, since, now);
    if let Some(exact) = compute_reward_checked(principal, apy, since, now) {
        assert_eq!(reward, exact);
    }
    if now <= since {
        assert_eq!(reward, CanAmount::ZERO);
    }

    let later = compute_reward(principal, apy, since, now.plus_secs(1));
    assert!(later >= reward);
});
