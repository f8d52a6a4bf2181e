use shared::error::*;
use std::fmt;
use stun::attributes::ATTR_CHANNEL_NUMBER;
use stun::checks::check_size;
use stun::message::*;

/// Channel numbers usable by ChannelBind, RFC 8656 Section 12.
pub const MIN_CHANNEL_NUMBER: u16 = 0x4000;
pub const MAX_CHANNEL_NUMBER: u16 = 0x4FFF;

const CHANNEL_NUMBER_SIZE: usize = 4;
const CHANNEL_DATA_HEADER_SIZE: usize = 4;
const PADDING: usize = 4;

/// CHANNEL-NUMBER attribute, RFC 5766 Section 14.1.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelNumber(pub u16);

impl fmt::Display for ChannelNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ChannelNumber {
    pub fn valid(&self) -> bool {
        (MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&self.0)
    }
}

impl Setter for ChannelNumber {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        // number followed by 16 bits RFFU
        let mut v = [0u8; CHANNEL_NUMBER_SIZE];
        v[..2].copy_from_slice(&self.0.to_be_bytes());
        m.add(ATTR_CHANNEL_NUMBER, &v);
        Ok(())
    }
}

impl Getter for ChannelNumber {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_CHANNEL_NUMBER)?;
        check_size(ATTR_CHANNEL_NUMBER, v.len(), CHANNEL_NUMBER_SIZE)?;
        self.0 = u16::from_be_bytes([v[0], v[1]]);
        Ok(())
    }
}

/// ChannelData message, RFC 5766 Section 11.4.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Channel Number        |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                       Application Data                        /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ChannelData {
    pub number: ChannelNumber,
    pub data: Vec<u8>,
}

impl ChannelData {
    /// Returns true if `buf` starts like a ChannelData message.
    pub fn is_channel_data(buf: &[u8]) -> bool {
        if buf.len() < CHANNEL_DATA_HEADER_SIZE {
            return false;
        }
        let number = ChannelNumber(u16::from_be_bytes([buf[0], buf[1]]));
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        number.valid() && buf.len() >= CHANNEL_DATA_HEADER_SIZE + length
    }

    /// Encodes the message. Streams must be padded to 4 bytes.
    pub fn encode(&self, padded: bool) -> Vec<u8> {
        let mut raw = Vec::with_capacity(CHANNEL_DATA_HEADER_SIZE + self.data.len() + PADDING);
        raw.extend_from_slice(&self.number.0.to_be_bytes());
        raw.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        raw.extend_from_slice(&self.data);
        if padded {
            let rem = raw.len() % PADDING;
            if rem != 0 {
                raw.resize(raw.len() + PADDING - rem, 0);
            }
        }
        raw
    }

    /// Decodes a message, ignoring trailing padding.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < CHANNEL_DATA_HEADER_SIZE {
            return Err(Error::ErrUnexpectedEof);
        }
        let number = ChannelNumber(u16::from_be_bytes([buf[0], buf[1]]));
        if !number.valid() {
            return Err(Error::ErrInvalidChannelNumber);
        }
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < CHANNEL_DATA_HEADER_SIZE + length {
            return Err(Error::ErrBadChannelDataLength);
        }
        Ok(ChannelData {
            number,
            data: buf[CHANNEL_DATA_HEADER_SIZE..CHANNEL_DATA_HEADER_SIZE + length].to_vec(),
        })
    }
}
