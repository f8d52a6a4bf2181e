use std::fmt::Display;
use std::io::Cursor;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};

use super::sdp_type::RTCSdpType;
use shared::error::Result;

/// An offer, answer, pranswer or rollback together with its SDP text.
///
/// Serializes to the JSON shape used by browsers for signaling:
/// `{"type":"offer","sdp":"v=0\r\n..."}`.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,

    /// This will never be initialized by callers, internal use only
    #[serde(skip)]
    pub(crate) parsed: Option<SessionDescription>,
}

impl Display for RTCSessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl RTCSessionDescription {
    fn new(sdp_type: RTCSdpType, sdp: String) -> Result<RTCSessionDescription> {
        let mut desc = RTCSessionDescription {
            sdp,
            sdp_type,
            parsed: None,
        };

        let parsed = desc.unmarshal()?;
        desc.parsed = Some(parsed);

        Ok(desc)
    }

    /// Given SDP representing an answer, wrap it in an RTCSessionDescription
    /// that can be given to an RTCPeerConnection.
    pub fn answer(sdp: String) -> Result<RTCSessionDescription> {
        Self::new(RTCSdpType::Answer, sdp)
    }

    /// Given SDP representing an offer, wrap it in an RTCSessionDescription
    /// that can be given to an RTCPeerConnection.
    pub fn offer(sdp: String) -> Result<RTCSessionDescription> {
        Self::new(RTCSdpType::Offer, sdp)
    }

    /// Given SDP representing an answer, wrap it in an RTCSessionDescription
    /// that can be given to an RTCPeerConnection. `pranswer` is used when the
    /// answer may not be final, or when updating a previously sent pranswer.
    pub fn pranswer(sdp: String) -> Result<RTCSessionDescription> {
        Self::new(RTCSdpType::Pranswer, sdp)
    }

    /// A rollback carries no SDP.
    pub fn rollback() -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type: RTCSdpType::Rollback,
            ..Default::default()
        }
    }

    /// Unmarshal is a helper to deserialize the sdp
    pub fn unmarshal(&self) -> Result<SessionDescription> {
        let mut reader = Cursor::new(self.sdp.as_bytes());
        let parsed = SessionDescription::unmarshal(&mut reader)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL_SDP: &str = "v=0\r\n\
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0\r\n\
m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:abcd\r\n\
a=ice-pwd:0123456789abcdefghijkl\r\n\
a=mid:0\r\n\
a=sctp-port:5000\r\n";

    #[test]
    fn test_session_description_json() {
        let tests = vec![
            (RTCSdpType::Offer, r#"{"type":"offer","sdp":"sdp"}"#),
            (RTCSdpType::Pranswer, r#"{"type":"pranswer","sdp":"sdp"}"#),
            (RTCSdpType::Answer, r#"{"type":"answer","sdp":"sdp"}"#),
            (RTCSdpType::Rollback, r#"{"type":"rollback","sdp":"sdp"}"#),
            (
                RTCSdpType::Unspecified,
                r#"{"type":"Unspecified","sdp":"sdp"}"#,
            ),
        ];

        for (sdp_type, expected_string) in tests {
            let desc = RTCSessionDescription {
                sdp_type,
                sdp: "sdp".to_owned(),
                parsed: None,
            };
            let desc_data = serde_json::to_string(&desc).expect("marshal");
            assert_eq!(desc_data, expected_string, "string is not expected");

            let sd = serde_json::from_str::<RTCSessionDescription>(&desc_data).expect("unmarshal");
            assert_eq!(sd.sdp, desc.sdp);
            assert_eq!(sd.sdp_type, desc.sdp_type);
            assert!(sd.parsed.is_none());
        }
    }

    #[test]
    fn test_session_description_constructors_parse() -> Result<()> {
        let offer = RTCSessionDescription::offer(MINIMAL_SDP.to_owned())?;
        assert_eq!(offer.sdp_type, RTCSdpType::Offer);
        let parsed = offer.parsed.as_ref().expect("parsed offer");
        assert_eq!(parsed.media_descriptions.len(), 1);

        let answer = RTCSessionDescription::answer(MINIMAL_SDP.to_owned())?;
        assert_eq!(answer.sdp_type, RTCSdpType::Answer);

        let pranswer = RTCSessionDescription::pranswer(MINIMAL_SDP.to_owned())?;
        assert_eq!(pranswer.sdp_type, RTCSdpType::Pranswer);
        assert!(pranswer.parsed.is_some());

        assert!(RTCSessionDescription::offer("not sdp".to_owned()).is_err());
        Ok(())
    }

    #[test]
    fn test_session_description_unmarshal_is_stable() -> Result<()> {
        let desc = RTCSessionDescription {
            sdp_type: RTCSdpType::Offer,
            sdp: MINIMAL_SDP.to_owned(),
            ..Default::default()
        };
        assert!(desc.parsed.is_none());

        let parsed1 = desc.unmarshal()?;
        let parsed2 = desc.unmarshal()?;
        assert_eq!(parsed1.marshal(), parsed2.marshal());
        Ok(())
    }

    #[test]
    fn test_session_description_rollback() {
        let rollback = RTCSessionDescription::rollback();
        assert_eq!(rollback.sdp_type, RTCSdpType::Rollback);
        assert!(rollback.sdp.is_empty());
    }
}
