use super::*;

#[test]
fn test_vp8_payload() -> Result<()> {
    let mut pck = Vp8Payloader::default();
    let payload = Bytes::from_static(&[0x90, 0x90, 0x90]);

    // Positive MTU, empty payload
    assert!(pck.payload(1, &Bytes::new())?.is_empty());

    // MTU too small for the descriptor
    assert!(pck.payload(1, &payload)?.is_empty());

    // One byte of payload per packet
    let result = pck.payload(2, &payload)?;
    assert_eq!(result.len(), 3);
    assert_eq!(result[0], Bytes::from_static(&[0x10, 0x90]));
    assert_eq!(result[1], Bytes::from_static(&[0x00, 0x90]));
    assert_eq!(result[2], Bytes::from_static(&[0x00, 0x90]));

    Ok(())
}

#[test]
fn test_vp8_payload_picture_id() -> Result<()> {
    let mut pck = Vp8Payloader {
        enable_picture_id: true,
        ..Default::default()
    };
    let payload = Bytes::from_static(&[0x01, 0x02, 0x03, 0x04]);

    let result = pck.payload(5, &payload)?;
    assert_eq!(result.len(), 2);
    assert_eq!(result[0], Bytes::from_static(&[0x90, 0x80, 0x00, 0x01, 0x02]));
    assert_eq!(result[1], Bytes::from_static(&[0x80, 0x80, 0x00, 0x03, 0x04]));

    // the picture id advances once per frame and switches to the 15 bit form past 127
    for _ in 1..128 {
        pck.payload(1200, &payload)?;
    }
    let result = pck.payload(1200, &payload)?;
    assert_eq!(result.len(), 1);
    assert_eq!(&result[0][..4], &[0x90, 0x80, 0x80, 0x80]);

    Ok(())
}
