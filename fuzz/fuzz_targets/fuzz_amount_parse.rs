#![no_main]

use libfuzzer_sys::fuzz_target;

use can_types::CanAmount;

// Any amount that parses must render back to a string that parses to the
// same value.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(amount) = CanAmount::from_decimal_str(text) {
        let rendered = amount.to_decimal_string();
        assert_eq!(CanAmount::from_decimal_str(&rendered), Ok(amount));
    }
});
