use std::collections::HashMap;
use std::fmt;

use url::Url;

use super::common::*;
use super::session::*;
use crate::extmap::*;
use crate::util::*;
use shared::error::{Error, Result};

/// Constants for extmap key
pub const EXT_MAP_VALUE_TRANSPORT_CC_KEY: isize = 3;
pub const EXT_MAP_VALUE_TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

fn ext_map_uri() -> HashMap<isize, &'static str> {
    let mut m = HashMap::new();
    m.insert(
        EXT_MAP_VALUE_TRANSPORT_CC_KEY,
        EXT_MAP_VALUE_TRANSPORT_CC_URI,
    );
    m
}

/// MediaDescription represents a media type.
/// <https://tools.ietf.org/html/rfc4566#section-5.14>
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    /// `m=<media> <port>/<number of ports> <proto> <fmt> ...`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.14>
    pub media_name: MediaName,

    /// `i=<session description>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.4>
    pub media_title: Option<Information>,

    /// `c=<nettype> <addrtype> <connection-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.7>
    pub connection_information: Option<ConnectionInformation>,

    /// `b=<bwtype>:<bandwidth>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.8>
    pub bandwidth: Vec<Bandwidth>,

    /// `k=<method>`
    ///
    /// `k=<method>:<encryption key>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.12>
    pub encryption_key: Option<EncryptionKey>,

    /// Attributes are the primary means for extending SDP.  Attributes may
    /// be defined to be used as "session-level" attributes, "media-level"
    /// attributes, or both.
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.14>
    pub attributes: Vec<Attribute>,
}

impl fmt::Display for MediaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_key_value(f, "m=", Some(&self.media_name))?;
        write_key_value(f, "i=", self.media_title.as_ref())?;
        if let Some(connection_information) = &self.connection_information {
            write_key_value(f, "c=", Some(&connection_information))?;
        }
        for bandwidth in &self.bandwidth {
            write_key_value(f, "b=", Some(&bandwidth))?;
        }
        write_key_value(f, "k=", self.encryption_key.as_ref())?;
        for attribute in &self.attributes {
            write_key_value(f, "a=", Some(&attribute))?;
        }
        Ok(())
    }
}

impl MediaDescription {
    /// attribute returns the value of an attribute and if it exists
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        for a in &self.attributes {
            if a.key == key {
                return Some(a.value.as_ref().map(|s| s.as_ref()));
            }
        }
        None
    }

    /// Returns every value of an attribute that may repeat, such as `ssrc` or `candidate`.
    pub fn attributes_with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .filter_map(|a| a.value.as_deref())
    }

    /// new_jsep_media_description creates a new MediaName with
    /// some settings that are required by the JSEP spec.
    pub fn new_jsep_media_description(codec_type: String, _codec_prefs: Vec<&str>) -> Self {
        MediaDescription {
            media_name: MediaName {
                media: codec_type,
                port: RangedPort {
                    value: 9,
                    range: None,
                },
                protos: vec![
                    "UDP".to_string(),
                    "TLS".to_string(),
                    "RTP".to_string(),
                    "SAVPF".to_string(),
                ],
                formats: vec![],
            },
            media_title: None,
            connection_information: Some(ConnectionInformation {
                network_type: "IN".to_string(),
                address_type: "IP4".to_string(),
                address: Some(Address {
                    address: "0.0.0.0".to_string(),
                    ttl: None,
                    range: None,
                }),
            }),
            bandwidth: vec![],
            encryption_key: None,
            attributes: vec![],
        }
    }

    /// with_property_attribute adds a property attribute 'a=key' to the media description
    pub fn with_property_attribute(mut self, key: String) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    /// with_value_attribute adds a value attribute 'a=key:value' to the media description
    pub fn with_value_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.push(Attribute::new(key, Some(value)));
        self
    }

    /// with_fingerprint adds a fingerprint to the media description
    pub fn with_fingerprint(self, algorithm: String, value: String) -> Self {
        self.with_value_attribute(ATTR_KEY_FINGERPRINT.to_owned(), algorithm + " " + &value)
    }

    /// with_ice_credentials adds ICE credentials to the media description
    pub fn with_ice_credentials(self, username: String, password: String) -> Self {
        self.with_value_attribute(ATTR_KEY_ICE_UFRAG.to_string(), username)
            .with_value_attribute(ATTR_KEY_ICE_PWD.to_string(), password)
    }

    /// with_codec adds codec information to the media description
    pub fn with_codec(
        mut self,
        payload_type: u8,
        name: String,
        clockrate: u32,
        channels: u16,
        fmtp: String,
    ) -> Self {
        self.media_name.formats.push(payload_type.to_string());
        let rtpmap = if channels > 0 {
            format!("{payload_type} {name}/{clockrate}/{channels}")
        } else {
            format!("{payload_type} {name}/{clockrate}")
        };

        if !fmtp.is_empty() {
            self.with_value_attribute(ATTR_KEY_RTPMAP.to_string(), rtpmap)
                .with_value_attribute(ATTR_KEY_FMTP.to_string(), format!("{payload_type} {fmtp}"))
        } else {
            self.with_value_attribute(ATTR_KEY_RTPMAP.to_string(), rtpmap)
        }
    }

    /// with_media_source adds media source information to the media description
    pub fn with_media_source(
        self,
        ssrc: u32,
        cname: String,
        stream_label: String,
        label: String,
    ) -> Self {
        // mslabel and label are legacy but still read by some endpoints
        self.with_value_attribute(ATTR_KEY_SSRC.to_string(), format!("{ssrc} cname:{cname}"))
            .with_value_attribute(
                ATTR_KEY_SSRC.to_string(),
                format!("{ssrc} msid:{stream_label} {label}"),
            )
            .with_value_attribute(
                ATTR_KEY_SSRC.to_string(),
                format!("{ssrc} mslabel:{stream_label}"),
            )
            .with_value_attribute(ATTR_KEY_SSRC.to_string(), format!("{ssrc} label:{label}"))
    }

    /// with_candidate adds an ICE candidate to the media description
    pub fn with_candidate(self, value: String) -> Self {
        self.with_value_attribute(ATTR_KEY_CANDIDATE.to_string(), value)
    }

    /// with_extmap adds an extmap to the media description
    pub fn with_extmap(mut self, e: ExtMap) -> Self {
        self.attributes.push(e.convert());
        self
    }

    /// with_transport_cc_extmap adds an extmap to the media description
    pub fn with_transport_cc_extmap(self) -> Self {
        let uri = ext_map_uri()
            .get(&EXT_MAP_VALUE_TRANSPORT_CC_KEY)
            .and_then(|uri_str| Url::parse(uri_str).ok());

        let e = ExtMap {
            value: EXT_MAP_VALUE_TRANSPORT_CC_KEY,
            uri,
            ..Default::default()
        };

        self.with_extmap(e)
    }

    /// Parses the value of an `m=` line into an otherwise empty media description.
    pub(crate) fn unmarshal_media_name(value: &str) -> Result<Self> {
        Ok(MediaDescription {
            media_name: MediaName::unmarshal(value)?,
            ..Default::default()
        })
    }
}

/// RangedPort supports special format for the media field "m=" port value. If
/// it may be necessary to specify multiple transport ports, the protocol allows
/// to write it as: <port>/<number of ports> where number of ports is a an
/// offsetting range.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RangedPort {
    pub value: isize,
    pub range: Option<isize>,
}

impl fmt::Display for RangedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(range) = self.range {
            write!(f, "{}/{}", self.value, range)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// MediaName describes the "m=" field storage structure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaName {
    pub media: String,
    pub port: RangedPort,
    pub protos: Vec<String>,
    pub formats: Vec<String>,
}

impl fmt::Display for MediaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = [
            self.media.clone(),
            self.port.to_string(),
            self.protos.join("/"),
            self.formats.join(" "),
        ];
        write!(f, "{}", s.join(" "))
    }
}

impl MediaName {
    fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(Error::SdpInvalidSyntax(format!("`m={value}`")));
        }

        // <media>
        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-5.14
        match fields[0] {
            "audio" | "video" | "text" | "application" | "message" => {}
            other => return Err(Error::SdpInvalidValue(other.to_owned())),
        }

        // <port>
        let parts: Vec<&str> = fields[1].split('/').collect();
        let port_value = parts[0].parse::<u16>()? as isize;
        let port_range = if parts.len() > 1 {
            Some(parts[1].parse::<i32>()? as isize)
        } else {
            None
        };

        // <proto>
        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-5.14
        let mut protos = vec![];
        for proto in fields[2].split('/') {
            match proto {
                "UDP" | "RTP" | "AVP" | "SAVP" | "SAVPF" | "TLS" | "DTLS" | "SCTP" | "AVPF"
                | "TCP" => protos.push(proto.to_owned()),
                other => return Err(Error::SdpInvalidValue(other.to_owned())),
            }
        }

        // <fmt>...
        let formats = fields[3..].iter().map(|f| f.to_string()).collect();

        Ok(MediaName {
            media: fields[0].to_owned(),
            port: RangedPort {
                value: port_value,
                range: port_range,
            },
            protos,
            formats,
        })
    }
}
