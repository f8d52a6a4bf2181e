use std::collections::HashMap;

use super::*;

#[test]
fn test_parse_parameters() {
    let tests = vec![
        (
            "one param",
            "key-name=value",
            vec![("key-name", "value")],
        ),
        (
            "one param with white spaces",
            "\tkey-name=value ",
            vec![("key-name", "value")],
        ),
        (
            "two params",
            "key-name=value;key2=value2",
            vec![("key-name", "value"), ("key2", "value2")],
        ),
        (
            "two params with white spaces",
            "key-name=value;  \n\tkey2=value2 ",
            vec![("key-name", "value"), ("key2", "value2")],
        ),
        (
            "uppercase key",
            "Key-Name=Value",
            vec![("key-name", "Value")],
        ),
    ];

    for (name, input, expected) in tests {
        let expected: HashMap<String, String> = expected
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        assert_eq!(parse_parameters(input), expected, "{name}");
    }
}

#[test]
fn test_generic_fmtp_match() {
    let tests = vec![
        (
            "equal",
            "key1=value1;key2=value2;key3=value3",
            "key1=value1;key2=value2;key3=value3",
            true,
        ),
        (
            "equal with white space variants",
            "key1=value1;key2=value2;key3=value3",
            "  key1=value1;  \nkey2=value2;\t\nkey3=value3",
            true,
        ),
        (
            "equal with case",
            "key1=value1;key2=value2;key3=value3",
            "key1=value1;key2=Value2;Key3=value3",
            true,
        ),
        (
            "one has extra param",
            "key1=value1;key2=value2;key3=value3",
            "key1=value1;key2=value2;key3=value3;key4=value4",
            true,
        ),
        (
            "inconsistent",
            "key1=value1;key2=value2;key3=value3",
            "key1=value1;key2=different_value;key3=value3",
            false,
        ),
        (
            "inconsistent one has extra param",
            "key1=value1;key2=value2;key3=value3;key4=value4",
            "key1=value1;key2=different_value;key3=value3",
            false,
        ),
    ];

    for (name, a, b, consistent) in tests {
        let fa = parse("audio/opus", 48000, 2, a);
        let fb = parse("audio/opus", 48000, 2, b);
        assert_eq!(fa.match_fmtp(&*fb), consistent, "{name}");
        assert_eq!(fb.match_fmtp(&*fa), consistent, "{name} reversed");
    }
}

#[test]
fn test_generic_fmtp_defaults() {
    let a = parse("audio/opus", 0, 0, "minptime=10");
    let b = parse("audio/OPUS", 48000, 2, "minptime=10");
    assert!(a.match_fmtp(&*b));

    let a = parse("audio/PCMU", 0, 0, "");
    let b = parse("audio/PCMU", 8000, 1, "");
    assert!(a.match_fmtp(&*b));

    let a = parse("audio/PCMU", 8000, 1, "");
    let b = parse("audio/PCMU", 16000, 1, "");
    assert!(!a.match_fmtp(&*b));

    let a = parse("video/VP8", 0, 0, "");
    let b = parse("video/VP8", 90000, 0, "");
    assert!(a.match_fmtp(&*b));

    let a = parse("audio/opus", 48000, 1, "");
    let b = parse("audio/opus", 48000, 0, "");
    assert!(!a.match_fmtp(&*b));
}

#[test]
fn test_mime_type_mismatch() {
    let a = parse("video/VP8", 90000, 0, "");
    let b = parse("video/rtx", 90000, 0, "");
    assert!(!a.match_fmtp(&*b));

    let a = parse("video/H264", 90000, 0, "packetization-mode=1;profile-level-id=42e01f");
    let b = parse("video/VP8", 90000, 0, "");
    assert!(!a.match_fmtp(&*b));
}

#[test]
fn test_h264_fmtp_match() {
    let tests = vec![
        (
            "level may differ",
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e029",
            true,
        ),
        (
            "profile differs",
            "packetization-mode=1;profile-level-id=42e01f",
            "packetization-mode=1;profile-level-id=64001f",
            false,
        ),
        (
            "profile iop differs",
            "packetization-mode=1;profile-level-id=42e01f",
            "packetization-mode=1;profile-level-id=42001f",
            false,
        ),
        (
            "packetization mode differs",
            "packetization-mode=1;profile-level-id=42e01f",
            "packetization-mode=0;profile-level-id=42e01f",
            false,
        ),
        (
            "packetization mode defaults to 0",
            "profile-level-id=42e01f",
            "packetization-mode=0;profile-level-id=42e01f",
            true,
        ),
        (
            "missing profile level id",
            "packetization-mode=1",
            "packetization-mode=1;profile-level-id=42e01f",
            false,
        ),
        (
            "profile level id missing on both sides",
            "packetization-mode=1",
            "packetization-mode=1",
            false,
        ),
        (
            "invalid profile level id",
            "packetization-mode=1;profile-level-id=zz",
            "packetization-mode=1;profile-level-id=42e01f",
            false,
        ),
    ];

    for (name, a, b, consistent) in tests {
        let fa = parse("video/H264", 90000, 0, a);
        let fb = parse("video/h264", 90000, 0, b);
        assert_eq!(fa.match_fmtp(&*fb), consistent, "{name}");
        assert_eq!(fb.match_fmtp(&*fa), consistent, "{name} reversed");
    }
}

#[test]
fn test_vp9_fmtp_match() {
    let a = parse("video/VP9", 90000, 0, "profile-id=0");
    let b = parse("video/VP9", 90000, 0, "");
    assert!(a.match_fmtp(&*b));

    let a = parse("video/VP9", 90000, 0, "profile-id=1");
    let b = parse("video/VP9", 90000, 0, "profile-id=0");
    assert!(!a.match_fmtp(&*b));

    let a = parse("video/VP9", 90000, 0, "profile-id=2");
    let b = parse("video/VP9", 90000, 0, "profile-id=2");
    assert!(a.match_fmtp(&*b));
}

#[test]
fn test_av1_fmtp_match() {
    let a = parse("video/AV1", 90000, 0, "profile=0");
    let b = parse("video/AV1", 90000, 0, "");
    assert!(a.match_fmtp(&*b));

    let a = parse("video/AV1", 90000, 0, "profile=1");
    let b = parse("video/AV1", 90000, 0, "");
    assert!(!a.match_fmtp(&*b));
}

#[test]
fn test_fmtp_parameter() {
    let f = parse("video/VP8", 90000, 0, "APT=96;x=y");
    assert_eq!(f.parameter("apt"), Some(&"96".to_owned()));
    assert_eq!(f.parameter("missing"), None);
    assert_eq!(f.mime_type(), "video/VP8");

    let f = parse("video/H264", 90000, 0, "packetization-mode=1");
    assert_eq!(f.mime_type(), MIME_TYPE_H264);
}
