#![no_main]
use chanio_core::ModeDescriptor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Accepted strings must display back to something that parses to the
    // same descriptor, and survive the flag round trip.
    if let Ok(spec) = std::str::from_utf8(data)
        && let Ok(mode) = ModeDescriptor::parse(spec)
    {
        assert!(mode.is_readable() || mode.is_writable());
        assert_eq!(ModeDescriptor::parse(&mode.to_string()).ok(), Some(mode));
        assert_eq!(ModeDescriptor::from_flags(mode.to_flags()).ok(), Some(mode));
    }

    if data.len() >= 4 {
        let flags = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if let Ok(mode) = ModeDescriptor::from_flags(flags) {
            assert_eq!(ModeDescriptor::from_flags(mode.to_flags()).ok(), Some(mode));
        }
    }
});
