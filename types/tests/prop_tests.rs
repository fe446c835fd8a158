use proptest::prelude::*;

use can_types::{AccountId, CanAmount, Timestamp};

proptest! {
    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Timestamp elapsed_since: elapsed_since(now) = now - self.
    #[test]
    fn timestamp_elapsed_since(base in 0u64..1_000_000, offset in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        let now = Timestamp::new(base + offset);
        prop_assert_eq!(t.elapsed_since(now), offset);
    }

    /// Timestamp elapsed_since saturates to 0 when now < self.
    #[test]
    fn timestamp_elapsed_since_saturates(
        base in 1u64..1_000_000,
        deficit in 1u64..1_000_000,
    ) {
        let later = Timestamp::new(base + deficit);
        let earlier = Timestamp::new(base);
        prop_assert_eq!(later.elapsed_since(earlier), 0);
    }

    /// Rendering an amount and parsing it back yields the same raw value.
    #[test]
    fn amount_decimal_string_parses_back(raw in 0u128..u128::MAX / 2) {
        let amount = CanAmount::new(raw);
        let parsed: CanAmount = amount.to_decimal_string().parse().unwrap();
        prop_assert_eq!(parsed, amount);
    }

    /// Any string with a leading minus sign is rejected.
    #[test]
    fn negative_amounts_never_parse(whole in 0u64..1_000_000, frac in 0u32..1_000_000) {
        let s = format!("-{}.{:06}", whole, frac);
        prop_assert!(s.parse::<CanAmount>().is_err());
    }

    /// checked_sub returns None exactly when the subtrahend is larger.
    #[test]
    fn amount_checked_sub_underflow(a in 0u128..1_000_000, b in 0u128..1_000_000) {
        let result = CanAmount::new(a).checked_sub(CanAmount::new(b));
        if b > a {
            prop_assert!(result.is_none());
        } else {
            prop_assert_eq!(result, Some(CanAmount::new(a - b)));
        }
    }

    /// Whole-token constructor and truncating accessor agree.
    #[test]
    fn amount_unit_roundtrip(units in 0u128..1_000_000_000) {
        prop_assert_eq!(CanAmount::from_can(units).to_can(), units);
    }

    /// Account ids survive a bincode round trip through the store encoding.
    #[test]
    fn account_id_bincode_roundtrip(raw in "[a-zA-Z0-9_-]{1,64}") {
        let id = AccountId::new(raw).unwrap();
        let bytes = bincode::serialize(&id).unwrap();
        let back: AccountId = bincode::deserialize(&bytes).unwrap();
        prop_assert_eq!(back, id);
    }
}
