//! Property-based tests for the raw ABI helpers.

use aviutl2_sys::constants::ascii_wide;
use aviutl2_sys::prelude::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_fourcc_bytes_recoverable(code: [u8; 4]) {
        prop_assert_eq!(make_fourcc(code).to_le_bytes(), code);
    }

    #[test]
    fn test_filter_flags_truncate_to_known(bits: i32) {
        let flags = FilterPluginFlags::from_bits_truncate(bits);
        prop_assert_eq!(flags.bits() & !0xF, 0);
        prop_assert_eq!(flags.bits(), bits & 0xF);
    }

    #[test]
    fn test_input_flags_truncate_to_known(bits: i32) {
        let flags = InputPluginFlags::from_bits_truncate(bits);
        prop_assert_eq!(flags.bits(), bits & (1 | 2 | 16 | 32));
    }

    #[test]
    fn test_ascii_wide_preserves_bytes(bytes in proptest::array::uniform8(0u8..0x80)) {
        let wide = ascii_wide(&bytes);
        for (w, b) in wide.iter().zip(bytes.iter()) {
            prop_assert_eq!(*w, u16::from(*b));
        }
    }
}
