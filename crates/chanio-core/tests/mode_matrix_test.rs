use chanio_core::mode::{self, ModeDescriptor};
use chanio_core::ChannelError;

#[derive(Clone, Copy)]
struct Case {
    spec: &'static str,
    readable: bool,
    writable: bool,
    appendable: bool,
    truncate: bool,
}

fn matrix_cases() -> Vec<Case> {
    let base = [
        ("r", true, false, false, false),
        ("r+", true, true, false, false),
        ("w", false, true, false, true),
        ("w+", true, true, false, true),
        ("a", false, true, true, false),
        ("a+", true, true, true, false),
    ];
    base.iter()
        .map(|&(spec, readable, writable, appendable, truncate)| Case {
            spec,
            readable,
            writable,
            appendable,
            truncate,
        })
        .collect()
}

fn with_binary(spec: &str) -> Vec<String> {
    let (head, plus) = spec.split_at(1);
    vec![format!("{head}b{plus}"), format!("{spec}b")]
}

#[test]
fn documented_capabilities_for_every_mode_string() {
    for case in matrix_cases() {
        let plain = ModeDescriptor::parse(case.spec).unwrap();
        let mut variants = vec![(case.spec.to_string(), plain, false)];
        for b in with_binary(case.spec) {
            let parsed = ModeDescriptor::parse(&b).unwrap();
            variants.push((b, parsed, true));
        }
        for (spec, m, binary) in variants {
            assert_eq!(m.is_readable(), case.readable, "{spec} readable");
            assert_eq!(m.is_writable(), case.writable, "{spec} writable");
            assert_eq!(m.is_appendable(), case.appendable, "{spec} append");
            assert_eq!(m.should_truncate(), case.truncate, "{spec} truncate");
            assert_eq!(m.is_binary(), binary, "{spec} binary");
        }
    }
}

#[test]
fn everything_else_is_rejected() {
    for bad in [
        "", "x", "rw", "r++", "rbb", "+r", "br", "r+b+", "wx", "a b", "R", "rt", "r+x",
    ] {
        assert!(
            matches!(
                ModeDescriptor::parse(bad),
                Err(ChannelError::InvalidModeSpec { .. })
            ),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn string_modes_survive_flag_round_trip() {
    for case in matrix_cases() {
        let m = ModeDescriptor::parse(case.spec).unwrap();
        let back = ModeDescriptor::from_flags(m.to_flags()).unwrap();
        assert_eq!(back, m, "{}", case.spec);
        assert_eq!(m.to_string(), case.spec);
    }
}

#[test]
fn flag_bits_match_posix_numbering() {
    let m = ModeDescriptor::from_flags(mode::RDWR | mode::CREAT | mode::TRUNC).unwrap();
    assert!(m.is_readable() && m.is_writable() && m.should_truncate() && m.is_create());
    let m = ModeDescriptor::from_flags(mode::WRONLY | mode::APPEND | mode::NONBLOCK).unwrap();
    assert!(m.is_appendable() && m.is_nonblocking() && !m.is_readable());
    assert!(ModeDescriptor::from_flags(mode::ACCMODE).is_err());
    assert!(ModeDescriptor::from_flags(1 << 20).is_err());
}

#[test]
fn subset_checks_guard_derived_handles() {
    let rw = ModeDescriptor::parse("r+").unwrap();
    let r = ModeDescriptor::parse("r").unwrap();
    let a = ModeDescriptor::parse("a").unwrap();
    assert!(r.is_subset_of(rw));
    assert!(!rw.is_subset_of(r));
    assert!(!a.is_subset_of(rw));
    assert!(r.check_subset_of(rw).is_ok());
    assert!(matches!(
        a.check_subset_of(r),
        Err(ChannelError::PermissionViolation { .. })
    ));
}
