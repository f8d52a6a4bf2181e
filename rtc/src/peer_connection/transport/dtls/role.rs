use std::fmt;

use sdp::description::session::SessionDescription;
use sdp::util::ConnectionRole;
use serde::{Deserialize, Serialize};

use crate::peer_connection::configuration::UNSPECIFIED_STR;

/// Which side of the DTLS handshake this peer plays.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCDtlsRole {
    #[default]
    Unspecified = 0,

    /// Resolved from the ICE role once known: the controlling agent serves,
    /// the controlled agent connects.
    #[serde(rename = "auto")]
    Auto = 1,

    #[serde(rename = "client")]
    Client = 2,

    #[serde(rename = "server")]
    Server = 3,
}

/// The answerer picks setup:active so the handshake can start as soon as
/// the answer is applied (RFC 5763 section 5).
pub(crate) const DEFAULT_DTLS_ROLE_ANSWER: RTCDtlsRole = RTCDtlsRole::Client;

/// The offerer announces setup:actpass.
pub(crate) const DEFAULT_DTLS_ROLE_OFFER: RTCDtlsRole = RTCDtlsRole::Auto;

const DTLS_ROLE_AUTO_STR: &str = "auto";
const DTLS_ROLE_CLIENT_STR: &str = "client";
const DTLS_ROLE_SERVER_STR: &str = "server";

impl From<&str> for RTCDtlsRole {
    fn from(raw: &str) -> Self {
        match raw {
            DTLS_ROLE_AUTO_STR => RTCDtlsRole::Auto,
            DTLS_ROLE_CLIENT_STR => RTCDtlsRole::Client,
            DTLS_ROLE_SERVER_STR => RTCDtlsRole::Server,
            _ => RTCDtlsRole::Unspecified,
        }
    }
}

impl fmt::Display for RTCDtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCDtlsRole::Auto => DTLS_ROLE_AUTO_STR,
            RTCDtlsRole::Client => DTLS_ROLE_CLIENT_STR,
            RTCDtlsRole::Server => DTLS_ROLE_SERVER_STR,
            RTCDtlsRole::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// The role a remote description asks for, read from the first a=setup
/// found in its media sections. Auto when it names none.
impl From<&SessionDescription> for RTCDtlsRole {
    fn from(session_description: &SessionDescription) -> Self {
        let setup = session_description
            .media_descriptions
            .iter()
            .flat_map(|media| media.attributes.iter())
            .find(|attribute| attribute.key == "setup");

        match setup.and_then(|attribute| attribute.value.as_deref()) {
            Some("active") => RTCDtlsRole::Client,
            Some("passive") => RTCDtlsRole::Server,
            _ => RTCDtlsRole::Auto,
        }
    }
}

impl RTCDtlsRole {
    pub(crate) fn to_connection_role(self) -> ConnectionRole {
        match self {
            RTCDtlsRole::Client => ConnectionRole::Active,
            RTCDtlsRole::Server => ConnectionRole::Passive,
            RTCDtlsRole::Auto => ConnectionRole::Actpass,
            RTCDtlsRole::Unspecified => ConnectionRole::Unspecified,
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use shared::error::Result;

    use super::*;

    #[test]
    fn test_dtls_role_string() {
        let tests = vec![
            (RTCDtlsRole::Unspecified, "Unspecified"),
            (RTCDtlsRole::Auto, "auto"),
            (RTCDtlsRole::Client, "client"),
            (RTCDtlsRole::Server, "server"),
        ];

        for (role, expected_string) in tests {
            assert_eq!(role.to_string(), expected_string);
            assert_eq!(RTCDtlsRole::from(expected_string), role);
        }
    }

    #[test]
    fn test_dtls_role_to_connection_role() {
        assert_eq!(
            RTCDtlsRole::Client.to_connection_role(),
            ConnectionRole::Active
        );
        assert_eq!(
            RTCDtlsRole::Server.to_connection_role(),
            ConnectionRole::Passive
        );
        assert_eq!(
            RTCDtlsRole::Auto.to_connection_role(),
            ConnectionRole::Actpass
        );
    }

    #[test]
    fn test_dtls_role_from_remote_sdp() -> Result<()> {
        const NO_MEDIA: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
";

        const MEDIA_NO_SETUP: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
m=application 47299 DTLS/SCTP 5000
c=IN IP4 192.168.20.129
";

        const MEDIA_SETUP_DECLARED: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
m=application 47299 DTLS/SCTP 5000
c=IN IP4 192.168.20.129
a=setup:";

        let tests = vec![
            ("No MediaDescriptions", NO_MEDIA.to_owned(), RTCDtlsRole::Auto),
            (
                "MediaDescription, no setup",
                MEDIA_NO_SETUP.to_owned(),
                RTCDtlsRole::Auto,
            ),
            (
                "MediaDescription, setup:actpass",
                format!("{MEDIA_SETUP_DECLARED}actpass\n"),
                RTCDtlsRole::Auto,
            ),
            (
                "MediaDescription, setup:passive",
                format!("{MEDIA_SETUP_DECLARED}passive\n"),
                RTCDtlsRole::Server,
            ),
            (
                "MediaDescription, setup:active",
                format!("{MEDIA_SETUP_DECLARED}active\n"),
                RTCDtlsRole::Client,
            ),
        ];

        for (name, session_description_str, expected_role) in tests {
            let mut reader = Cursor::new(session_description_str.as_bytes());
            let session_description = SessionDescription::unmarshal(&mut reader)?;
            assert_eq!(
                RTCDtlsRole::from(&session_description),
                expected_role,
                "{name} failed"
            );
        }

        Ok(())
    }
}
