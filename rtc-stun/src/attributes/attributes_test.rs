use super::*;

#[test]
fn test_raw_attribute_add_to() -> Result<()> {
    let v = vec![1, 2, 3, 4];
    let mut m = Message::new();
    m.build(&[Box::new(RawAttribute {
        typ: ATTR_DATA,
        value: v.clone(),
        ..Default::default()
    })])?;
    assert_eq!(m.get(ATTR_DATA)?, v);

    Ok(())
}

#[test]
fn test_attr_type_range() {
    for a in [ATTR_PRIORITY, ATTR_ERROR_CODE, ATTR_USE_CANDIDATE, ATTR_EVEN_PORT] {
        assert!(a.required() && !a.optional(), "{a}");
    }
    for a in [ATTR_SOFTWARE, ATTR_ICE_CONTROLLED, ATTR_ORIGIN] {
        assert!(!a.required() && a.optional(), "{a}");
    }
}

#[test]
fn test_attr_type_display() {
    assert_eq!(ATTR_XORMAPPED_ADDRESS.to_string(), "XOR-MAPPED-ADDRESS");
    assert_eq!(ATTR_ICE_CONTROLLING.to_string(), "ICE-CONTROLLING");
    assert_eq!(AttrType(0xffaa).to_string(), "0xffaa");
}

#[test]
fn test_padding() {
    let tt = vec![(4, 4), (2, 4), (5, 8), (8, 8), (11, 12), (1, 4), (3, 4), (6, 8), (7, 8), (0, 0), (40, 40)];
    for (i, o) in tt {
        assert_eq!(nearest_padded_value_length(i), o, "padd({i})");
    }
}

#[test]
fn test_compat_attr_type() {
    assert_eq!(compat_attr_type(0x8020), ATTR_XORMAPPED_ADDRESS);
    assert_eq!(compat_attr_type(0x0020), ATTR_XORMAPPED_ADDRESS);
    assert_eq!(compat_attr_type(0x8022), ATTR_SOFTWARE);
}

#[test]
fn test_attributes_get() {
    let attrs = Attributes(vec![
        RawAttribute {
            typ: ATTR_USERNAME,
            length: 1,
            value: vec![b'a'],
        },
        RawAttribute {
            typ: ATTR_USERNAME,
            length: 1,
            value: vec![b'b'],
        },
    ]);
    let (first, ok) = attrs.get(ATTR_USERNAME);
    assert!(ok);
    assert_eq!(first.value, vec![b'a']);
    let (missing, ok) = attrs.get(ATTR_NONCE);
    assert!(!ok);
    assert_eq!(missing, RawAttribute::default());
}
