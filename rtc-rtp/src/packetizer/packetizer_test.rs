use super::*;
use crate::codec::g7xx::G711Payloader;
use crate::codec::opus::OpusPayloader;
use crate::extension::abs_send_time_extension::ABS_SEND_TIME_EXTENSION_SIZE;
use crate::sequence::new_fixed_sequencer;

fn fixed_time() -> Duration {
    Duration::new(1_600_000_000, 0)
}

#[test]
fn test_packetizer() -> Result<()> {
    let multiple_payload = Bytes::from_static(&[0; 128]);
    let g722 = Box::new(G711Payloader {});
    let seq = Box::new(new_fixed_sequencer(1234));

    //use the G722 payloader here, because it's very simple and all 0s is valid G722 data.
    let mut packetizer = new_packetizer(100, 98, 0x1234ABCD, g722, seq, 90000);
    let packets = packetizer.packetize(&multiple_payload, 2000)?;

    assert_eq!(packets.len(), 2, "Generated {} packets instead of 2", packets.len());
    assert!(!packets[0].header.marker);
    assert!(packets[1].header.marker);
    assert_eq!(packets[0].header.sequence_number, 1234);
    assert_eq!(packets[1].header.sequence_number, 1235);
    assert_eq!(packets[0].header.timestamp, packets[1].header.timestamp);
    assert_eq!(packets[0].payload.len(), 88);
    assert_eq!(packets[1].payload.len(), 40);

    Ok(())
}

#[test]
fn test_packetizer_timestamp_advance_and_skip() -> Result<()> {
    let mut packetizer = PacketizerImpl {
        mtu: 1200,
        payload_type: 111,
        ssrc: 1,
        payloader: Box::new(OpusPayloader),
        sequencer: Box::new(new_fixed_sequencer(1)),
        timestamp: u32::MAX - 10,
        clock_rate: 48000,
        abs_send_time: 0,
        time_gen: fixed_time,
    };

    let first = packetizer.packetize(&Bytes::from_static(&[1, 2, 3]), 960)?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].header.timestamp, u32::MAX - 10);

    packetizer.skip_samples(960);
    let second = packetizer.packetize(&Bytes::from_static(&[4, 5]), 960)?;
    assert_eq!(
        second[0].header.timestamp,
        (u32::MAX - 10).wrapping_add(1920)
    );
    assert_eq!(second[0].header.sequence_number, 2);

    // empty payloads produce no packets but still advance the clock
    let none = packetizer.packetize(&Bytes::new(), 960)?;
    assert!(none.is_empty());

    Ok(())
}

#[test]
fn test_packetizer_abs_send_time() -> Result<()> {
    let mut packetizer = PacketizerImpl {
        mtu: 100,
        payload_type: 98,
        ssrc: 0x1234ABCD,
        payloader: Box::new(G711Payloader {}),
        sequencer: Box::new(new_fixed_sequencer(1234)),
        timestamp: 45678,
        clock_rate: 8000,
        abs_send_time: 1,
        time_gen: fixed_time,
    };

    let packets = packetizer.packetize(&Bytes::from_static(&[0x11, 0x12, 0x13, 0x14]), 2000)?;
    assert_eq!(packets.len(), 1);

    let header = &packets[0].header;
    assert!(header.extension);
    let ext = header.get_extension(1).unwrap_or_default();
    assert_eq!(ext.len(), ABS_SEND_TIME_EXTENSION_SIZE);
    let expected = AbsSendTimeExtension::new(fixed_time()).marshal()?;
    assert_eq!(ext, expected);
    assert_eq!(packets[0].payload, Bytes::from_static(&[0x11, 0x12, 0x13, 0x14]));

    Ok(())
}
