use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use std::{fmt, io};

use url::Url;

use super::common::*;
use super::media::*;
use crate::util::*;
use shared::error::{Error, Result};

/// Constants for SDP attributes used in JSEP
pub const ATTR_KEY_CANDIDATE: &str = "candidate";
pub const ATTR_KEY_END_OF_CANDIDATES: &str = "end-of-candidates";
pub const ATTR_KEY_IDENTITY: &str = "identity";
pub const ATTR_KEY_GROUP: &str = "group";
pub const ATTR_KEY_SSRC: &str = "ssrc";
pub const ATTR_KEY_SSRCGROUP: &str = "ssrc-group";
pub const ATTR_KEY_MSID: &str = "msid";
pub const ATTR_KEY_MSID_SEMANTIC: &str = "msid-semantic";
pub const ATTR_KEY_CONNECTION_SETUP: &str = "setup";
pub const ATTR_KEY_MID: &str = "mid";
pub const ATTR_KEY_ICELITE: &str = "ice-lite";
pub const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub const ATTR_KEY_ICE_OPTIONS: &str = "ice-options";
pub const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
pub const ATTR_KEY_RTCPMUX: &str = "rtcp-mux";
pub const ATTR_KEY_RTCPRSIZE: &str = "rtcp-rsize";
pub const ATTR_KEY_RTPMAP: &str = "rtpmap";
pub const ATTR_KEY_FMTP: &str = "fmtp";
pub const ATTR_KEY_RTCPFB: &str = "rtcp-fb";
pub const ATTR_KEY_INACTIVE: &str = "inactive";
pub const ATTR_KEY_RECV_ONLY: &str = "recvonly";
pub const ATTR_KEY_SEND_ONLY: &str = "sendonly";
pub const ATTR_KEY_SEND_RECV: &str = "sendrecv";
pub const ATTR_KEY_EXT_MAP: &str = "extmap";
pub const ATTR_KEY_EXTMAP_ALLOW_MIXED: &str = "extmap-allow-mixed";
pub const ATTR_KEY_SCTP_PORT: &str = "sctp-port";
pub const ATTR_KEY_MAX_MESSAGE_SIZE: &str = "max-message-size";

/// Constants for semantic tokens used in JSEP
pub const SEMANTIC_TOKEN_LIP_SYNCHRONIZATION: &str = "LS";
pub const SEMANTIC_TOKEN_FLOW_IDENTIFICATION: &str = "FID";
pub const SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION: &str = "FEC";
pub const SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION_FRAMEWORK: &str = "FEC-FR";
pub const SEMANTIC_TOKEN_WEBRTC_MEDIA_STREAMS: &str = "WMS";
pub const SEMANTIC_TOKEN_BUNDLE: &str = "BUNDLE";

/// Version describes the value provided by the "v=" field which gives
/// the version of the Session Description Protocol.
pub type Version = isize;

/// Origin defines the structure for the "o=" field which provides the
/// originator of the session plus a session identifier and version number.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub network_type: String,
    pub address_type: String,
    pub unicast_address: String,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.username,
            self.session_id,
            self.session_version,
            self.network_type,
            self.address_type,
            self.unicast_address,
        )
    }
}

impl Origin {
    pub fn new() -> Self {
        Origin {
            username: "".to_owned(),
            session_id: 0,
            session_version: 0,
            network_type: "".to_owned(),
            address_type: "".to_owned(),
            unicast_address: "".to_owned(),
        }
    }

    fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(Error::SdpInvalidSyntax(format!("`o={value}`")));
        }

        let session_id = fields[1].parse::<u64>()?;
        let session_version = fields[2].parse::<u64>()?;

        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.6
        if fields[3] != "IN" {
            return Err(Error::SdpInvalidValue(fields[3].to_owned()));
        }

        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.7
        if fields[4] != "IP4" && fields[4] != "IP6" {
            return Err(Error::SdpInvalidValue(fields[4].to_owned()));
        }

        Ok(Origin {
            username: fields[0].to_owned(),
            session_id,
            session_version,
            network_type: fields[3].to_owned(),
            address_type: fields[4].to_owned(),
            unicast_address: fields[5].to_owned(),
        })
    }
}

/// SessionName describes a structured representations for the "s=" field
/// and is the textual session name.
pub type SessionName = String;

/// EmailAddress describes a structured representations for the "e=" line
/// which specifies email contact information for the person responsible for
/// the conference.
pub type EmailAddress = String;

/// PhoneNumber describes a structured representations for the "p=" line
/// specify phone contact information for the person responsible for the
/// conference.
pub type PhoneNumber = String;

/// TimeZone defines the structured object for "z=" line which describes
/// repeated sessions scheduling.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeZone {
    pub adjustment_time: u64,
    pub offset: i64,
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.adjustment_time, self.offset)
    }
}

/// TimeDescription describes "t=", "r=" fields of the session description
/// which are used to specify the start and stop times for a session as well as
/// repeat intervals and durations for the scheduled session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeDescription {
    /// `t=<start-time> <stop-time>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.9>
    pub timing: Timing,

    /// `r=<repeat interval> <active duration> <offsets from start-time>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.10>
    pub repeat_times: Vec<RepeatTime>,
}

/// Timing defines the "t=" field's structured representation for the start and
/// stop times.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Timing {
    pub start_time: u64,
    pub stop_time: u64,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start_time, self.stop_time)
    }
}

impl Timing {
    fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(Error::SdpInvalidSyntax(format!("`t={value}`")));
        }

        Ok(Timing {
            start_time: fields[0].parse::<u64>()?,
            stop_time: fields[1].parse::<u64>()?,
        })
    }
}

/// RepeatTime describes the "r=" fields of the session description which
/// represents the intervals and durations for repeated scheduled sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepeatTime {
    pub interval: i64,
    pub duration: i64,
    pub offsets: Vec<i64>,
}

impl fmt::Display for RepeatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = vec![format!("{}", self.interval)];
        fields.push(format!("{}", self.duration));
        for value in &self.offsets {
            fields.push(format!("{value}"));
        }
        write!(f, "{}", fields.join(" "))
    }
}

impl RepeatTime {
    fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(Error::SdpInvalidSyntax(format!("`r={value}`")));
        }

        let interval = parse_time_units(fields[0])?;
        let duration = parse_time_units(fields[1])?;
        let mut offsets = vec![];
        for field in &fields[2..] {
            offsets.push(parse_time_units(field)?);
        }

        Ok(RepeatTime {
            interval,
            duration,
            offsets,
        })
    }
}

/// SessionDescription is a a well-defined format for conveying sufficient
/// information to discover and participate in a multimedia session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    /// `v=0`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.1>
    pub version: Version,

    /// `o=<username> <sess-id> <sess-version> <nettype> <addrtype> <unicast-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.2>
    pub origin: Origin,

    /// `s=<session name>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.3>
    pub session_name: SessionName,

    /// `i=<session description>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.4>
    pub session_information: Option<Information>,

    /// `u=<uri>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.5>
    pub uri: Option<Url>,

    /// `e=<email-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.6>
    pub email_address: Option<EmailAddress>,

    /// `p=<phone-number>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.6>
    pub phone_number: Option<PhoneNumber>,

    /// `c=<nettype> <addrtype> <connection-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.7>
    pub connection_information: Option<ConnectionInformation>,

    /// `b=<bwtype>:<bandwidth>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.8>
    pub bandwidth: Vec<Bandwidth>,

    /// <https://tools.ietf.org/html/rfc4566#section-5.9>
    /// <https://tools.ietf.org/html/rfc4566#section-5.10>
    pub time_descriptions: Vec<TimeDescription>,

    /// `z=<adjustment time> <offset> <adjustment time> <offset> ...`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.11>
    pub time_zones: Vec<TimeZone>,

    /// `k=<method>`
    ///
    /// `k=<method>:<encryption key>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.12>
    pub encryption_key: Option<EncryptionKey>,

    /// `a=<attribute>`
    ///
    /// `a=<attribute>:<value>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.13>
    pub attributes: Vec<Attribute>,

    /// <https://tools.ietf.org/html/rfc4566#section-5.14>
    pub media_descriptions: Vec<MediaDescription>,
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_key_value(f, "v=", Some(&self.version))?;
        write_key_value(f, "o=", Some(&self.origin))?;
        write_key_value(f, "s=", Some(&self.session_name))?;

        write_key_value(f, "i=", self.session_information.as_ref())?;

        if let Some(uri) = &self.uri {
            write_key_value(f, "u=", Some(uri))?;
        }
        write_key_value(f, "e=", self.email_address.as_ref())?;
        write_key_value(f, "p=", self.phone_number.as_ref())?;
        if let Some(connection_information) = &self.connection_information {
            write_key_value(f, "c=", Some(&connection_information))?;
        }

        for bandwidth in &self.bandwidth {
            write_key_value(f, "b=", Some(&bandwidth))?;
        }
        for time_description in &self.time_descriptions {
            write_key_value(f, "t=", Some(&time_description.timing))?;
            for repeat_time in &time_description.repeat_times {
                write_key_value(f, "r=", Some(&repeat_time))?;
            }
        }

        write_key_slice_of_values(f, "z=", &self.time_zones)?;

        write_key_value(f, "k=", self.encryption_key.as_ref())?;
        for attribute in &self.attributes {
            write_key_value(f, "a=", Some(&attribute))?;
        }

        for media_description in &self.media_descriptions {
            write!(f, "{media_description}")?;
        }

        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ParseState {
    Session,
    Media,
}

impl SessionDescription {
    /// new_jsep_session_description creates a new SessionDescription with
    /// some settings that are required by the JSEP spec.
    pub fn new_jsep_session_description(identity: bool) -> Self {
        let d = SessionDescription {
            version: 0,
            origin: Origin {
                username: "-".to_string(),
                session_id: new_session_id(),
                session_version: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.subsec_nanos() as u64)
                    .unwrap_or(0),
                network_type: "IN".to_string(),
                address_type: "IP4".to_string(),
                unicast_address: "0.0.0.0".to_string(),
            },
            session_name: "-".to_string(),
            session_information: None,
            uri: None,
            email_address: None,
            phone_number: None,
            connection_information: None,
            bandwidth: vec![],
            time_descriptions: vec![TimeDescription {
                timing: Timing {
                    start_time: 0,
                    stop_time: 0,
                },
                repeat_times: vec![],
            }],
            time_zones: vec![],
            encryption_key: None,
            attributes: vec![],
            media_descriptions: vec![],
        };

        if identity {
            d.with_property_attribute(ATTR_KEY_IDENTITY.to_string())
        } else {
            d
        }
    }

    /// WithPropertyAttribute adds a property attribute 'a=key' to the session description
    pub fn with_property_attribute(mut self, key: String) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    /// WithValueAttribute adds a value attribute 'a=key:value' to the session description
    pub fn with_value_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.push(Attribute::new(key, Some(value)));
        self
    }

    /// WithFingerprint adds a fingerprint to the session description
    pub fn with_fingerprint(self, algorithm: String, value: String) -> Self {
        self.with_value_attribute(ATTR_KEY_FINGERPRINT.to_string(), algorithm + " " + &value)
    }

    /// WithMedia adds a media description to the session description
    pub fn with_media(mut self, md: MediaDescription) -> Self {
        self.media_descriptions.push(md);
        self
    }

    fn build_codec_map(&self) -> HashMap<u8, Codec> {
        let mut codecs: HashMap<u8, Codec> = HashMap::new();

        for m in &self.media_descriptions {
            for a in &m.attributes {
                let attr = a.to_string();
                if attr.starts_with("rtpmap:") {
                    if let Ok(codec) = parse_rtpmap(&attr) {
                        merge_codecs(codec, &mut codecs);
                    }
                } else if attr.starts_with("fmtp:") {
                    if let Ok(codec) = parse_fmtp(&attr) {
                        merge_codecs(codec, &mut codecs);
                    }
                } else if attr.starts_with("rtcp-fb:") {
                    if let Ok(codec) = parse_rtcp_fb(&attr) {
                        merge_codecs(codec, &mut codecs);
                    }
                }
            }
        }

        codecs
    }

    /// get_codec_for_payload_type scans the SessionDescription for the given payload type and returns the codec
    pub fn get_codec_for_payload_type(&self, payload_type: u8) -> Result<Codec> {
        let codecs = self.build_codec_map();

        if let Some(codec) = codecs.get(&payload_type) {
            Ok(codec.clone())
        } else {
            Err(Error::PayloadTypeNotFound)
        }
    }

    /// get_payload_type_for_codec scans the SessionDescription for a codec that matches the provided codec
    /// as closely as possible and returns its payload type
    pub fn get_payload_type_for_codec(&self, wanted: &Codec) -> Result<u8> {
        let codecs = self.build_codec_map();

        for (payload_type, codec) in codecs.iter() {
            if codecs_match(wanted, codec) {
                return Ok(*payload_type);
            }
        }

        Err(Error::CodecNotFound)
    }

    /// Returns whether an attribute exists
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key == key)
    }

    /// Attribute returns the value of an attribute and if it exists
    pub fn attribute(&self, key: &str) -> Option<&String> {
        for a in &self.attributes {
            if a.key == key {
                return a.value.as_ref();
            }
        }
        None
    }

    /// Marshal takes a SDP struct to text
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5>
    ///
    /// Session description
    ///    v=  (protocol version)
    ///    o=  (originator and session identifier)
    ///    s=  (session name)
    ///    i=* (session information)
    ///    u=* (URI of description)
    ///    e=* (email address)
    ///    p=* (phone number)
    ///    c=* (connection information -- not required if included in
    ///         all media)
    ///    b=* (zero or more bandwidth information lines)
    ///    One or more time descriptions ("t=" and "r=" lines; see below)
    ///    z=* (time zone adjustments)
    ///    k=* (encryption key)
    ///    a=* (zero or more session attribute lines)
    ///    Zero or more media descriptions
    ///
    /// Time description
    ///    t=  (time the session is active)
    ///    r=* (zero or more repeat times)
    ///
    /// Media description, if present
    ///    m=  (media name and transport address)
    ///    i=* (media title)
    ///    c=* (connection information -- optional if included at
    ///         session level)
    ///    b=* (zero or more bandwidth information lines)
    ///    k=* (encryption key)
    ///    a=* (zero or more media attribute lines)
    pub fn marshal(&self) -> String {
        self.to_string()
    }

    /// Unmarshal is the primary function that deserializes the session description
    /// message and stores it inside of a structured SessionDescription object.
    ///
    /// Lines may end with CRLF or LF. The first line must be `v=`, and `o=`
    /// and `s=` must be present; everything else follows RFC 4566 section 5 ordering
    /// loosely, with unknown session-level keys rejected.
    pub fn unmarshal<R: io::BufRead>(reader: &mut R) -> Result<Self> {
        let mut sd = SessionDescription::default();
        let mut state = ParseState::Session;
        let mut has_version = false;
        let mut has_origin = false;
        let mut has_session_name = false;

        for line in io::BufRead::lines(&mut *reader) {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((key, value)) if key.len() == 1 => (key.as_bytes()[0], value),
                _ => return Err(Error::SdpInvalidSyntax(line.to_owned())),
            };

            if !has_version {
                if key != b'v' {
                    return Err(Error::SdpInvalidSyntax(format!(
                        "sdp must start with `v=`: {line}"
                    )));
                }
                sd.version = value.trim().parse::<isize>()?;
                has_version = true;
                continue;
            }

            if key == b'm' {
                sd.media_descriptions
                    .push(MediaDescription::unmarshal_media_name(value)?);
                state = ParseState::Media;
                continue;
            }

            match state {
                ParseState::Session => match key {
                    b'o' => {
                        sd.origin = Origin::unmarshal(value)?;
                        has_origin = true;
                    }
                    b's' => {
                        sd.session_name = value.to_owned();
                        has_session_name = true;
                    }
                    b'i' => sd.session_information = Some(value.to_owned()),
                    b'u' => sd.uri = Some(Url::parse(value)?),
                    b'e' => sd.email_address = Some(value.to_owned()),
                    b'p' => sd.phone_number = Some(value.to_owned()),
                    b'c' => {
                        sd.connection_information = Some(ConnectionInformation::unmarshal(value)?)
                    }
                    b'b' => sd.bandwidth.push(Bandwidth::unmarshal(value)?),
                    b't' => sd.time_descriptions.push(TimeDescription {
                        timing: Timing::unmarshal(value)?,
                        repeat_times: vec![],
                    }),
                    b'r' => match sd.time_descriptions.last_mut() {
                        Some(td) => td.repeat_times.push(RepeatTime::unmarshal(value)?),
                        None => {
                            return Err(Error::SdpInvalidSyntax(format!(
                                "`r={value}` without `t=`"
                            )));
                        }
                    },
                    b'z' => sd.time_zones.extend(unmarshal_time_zones(value)?),
                    b'k' => sd.encryption_key = Some(value.to_owned()),
                    b'a' => sd.attributes.push(Attribute::unmarshal(value)),
                    _ => return Err(Error::SdpInvalidSyntax(line.to_owned())),
                },
                ParseState::Media => {
                    let Some(md) = sd.media_descriptions.last_mut() else {
                        return Err(Error::SdpInvalidSyntax(line.to_owned()));
                    };
                    match key {
                        b'i' => md.media_title = Some(value.to_owned()),
                        b'c' => {
                            md.connection_information =
                                Some(ConnectionInformation::unmarshal(value)?)
                        }
                        b'b' => md.bandwidth.push(Bandwidth::unmarshal(value)?),
                        b'k' => md.encryption_key = Some(value.to_owned()),
                        b'a' => md.attributes.push(Attribute::unmarshal(value)),
                        _ => return Err(Error::SdpInvalidSyntax(line.to_owned())),
                    }
                }
            }
        }

        if !has_version || !has_origin || !has_session_name {
            return Err(Error::SdpInvalidSyntax(
                "sdp requires `v=`, `o=` and `s=` lines".to_owned(),
            ));
        }

        Ok(sd)
    }
}

fn unmarshal_time_zones(value: &str) -> Result<Vec<TimeZone>> {
    // These fields are transimitted in pairs
    // z=<adjustment time> <offset> <adjustment time> <offset> ....
    // so we are making sure that there are actually multiple of 2 total.
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() % 2 != 0 {
        return Err(Error::SdpInvalidSyntax(format!("`z={value}`")));
    }

    let mut time_zones = vec![];
    for pair in fields.chunks(2) {
        time_zones.push(TimeZone {
            adjustment_time: pair[0].parse::<u64>()?,
            offset: parse_time_units(pair[1])?,
        });
    }
    Ok(time_zones)
}

/// Parses a typed time such as `7d`, `-1h` or `3600` into seconds.
fn parse_time_units(value: &str) -> Result<i64> {
    // Some time offsets in the protocol can be provided with a shorthand
    // notation. This code ensures to convert it to NTP timestamp format.
    let val = value.as_bytes();
    let len = val.len();
    if len == 0 {
        return Err(Error::SdpInvalidValue(value.to_owned()));
    }
    let (num, factor) = match val[len - 1] {
        b'd' => (&value[..len - 1], 86400),
        b'h' => (&value[..len - 1], 3600),
        b'm' => (&value[..len - 1], 60),
        b's' => (&value[..len - 1], 1),
        _ => (value, 1),
    };
    num.parse::<i64>()
        .map(|num| num * factor)
        .map_err(|_| Error::SdpInvalidValue(value.to_owned()))
}

pub(crate) fn write_key_value<W: fmt::Write, V: fmt::Display>(
    writer: &mut W,
    key: &str,
    value: Option<V>,
) -> fmt::Result {
    let Some(value) = value else {
        return Ok(());
    };

    write!(writer, "{key}{value}{END_LINE}")
}

pub(crate) fn write_key_slice_of_values<W: fmt::Write, V: fmt::Display>(
    writer: &mut W,
    key: &str,
    value: &[V],
) -> fmt::Result {
    if value.is_empty() {
        return Ok(());
    }

    let mut first = true;

    write!(writer, "{key}")?;
    for val in value {
        if first {
            first = false;
            write!(writer, "{val}")?;
        } else {
            write!(writer, " {val}")?;
        }
    }
    write!(writer, "{END_LINE}")?;

    Ok(())
}
