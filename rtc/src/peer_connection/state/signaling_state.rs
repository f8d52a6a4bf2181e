use std::fmt;

use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::sdp::sdp_type::RTCSdpType;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StateChangeOp {
    #[default]
    SetLocal,
    SetRemote,
}

impl fmt::Display for StateChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StateChangeOp::SetLocal => write!(f, "SetLocal"),
            StateChangeOp::SetRemote => write!(f, "SetRemote"),
        }
    }
}

/// Progress of the offer/answer exchange (RFC 3264).
///
/// ```text
/// offerer:  stable -> have-local-offer  -> stable
/// answerer: stable -> have-remote-offer -> stable
/// ```
///
/// Provisional answers pass through have-local-pranswer or
/// have-remote-pranswer. A rollback returns to stable.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCSignalingState {
    #[serde(skip)]
    Unspecified = 0,

    /// No exchange in progress. Both the initial state and the state after
    /// an answer was applied.
    #[default]
    #[serde(rename = "stable")]
    Stable,

    #[serde(rename = "have-local-offer")]
    HaveLocalOffer,

    #[serde(rename = "have-remote-offer")]
    HaveRemoteOffer,

    #[serde(rename = "have-local-pranswer")]
    HaveLocalPranswer,

    #[serde(rename = "have-remote-pranswer")]
    HaveRemotePranswer,

    #[serde(rename = "closed")]
    Closed,
}

const SIGNALING_STATE_STABLE_STR: &str = "stable";
const SIGNALING_STATE_HAVE_LOCAL_OFFER_STR: &str = "have-local-offer";
const SIGNALING_STATE_HAVE_REMOTE_OFFER_STR: &str = "have-remote-offer";
const SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR: &str = "have-local-pranswer";
const SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR: &str = "have-remote-pranswer";
const SIGNALING_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCSignalingState {
    fn from(raw: &str) -> Self {
        match raw {
            SIGNALING_STATE_STABLE_STR => RTCSignalingState::Stable,
            SIGNALING_STATE_HAVE_LOCAL_OFFER_STR => RTCSignalingState::HaveLocalOffer,
            SIGNALING_STATE_HAVE_REMOTE_OFFER_STR => RTCSignalingState::HaveRemoteOffer,
            SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR => RTCSignalingState::HaveLocalPranswer,
            SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR => RTCSignalingState::HaveRemotePranswer,
            SIGNALING_STATE_CLOSED_STR => RTCSignalingState::Closed,
            _ => RTCSignalingState::Unspecified,
        }
    }
}

impl fmt::Display for RTCSignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCSignalingState::Stable => SIGNALING_STATE_STABLE_STR,
            RTCSignalingState::HaveLocalOffer => SIGNALING_STATE_HAVE_LOCAL_OFFER_STR,
            RTCSignalingState::HaveRemoteOffer => SIGNALING_STATE_HAVE_REMOTE_OFFER_STR,
            RTCSignalingState::HaveLocalPranswer => SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR,
            RTCSignalingState::HaveRemotePranswer => SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR,
            RTCSignalingState::Closed => SIGNALING_STATE_CLOSED_STR,
            RTCSignalingState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Validates the transition caused by applying a description of `sdp_type`
/// in `cur` and returns the state to move to.
pub(crate) fn check_next_signaling_state(
    cur: RTCSignalingState,
    next: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Result<RTCSignalingState> {
    if sdp_type == RTCSdpType::Rollback {
        return match (cur, op) {
            (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetLocal)
            | (RTCSignalingState::HaveRemoteOffer, StateChangeOp::SetRemote)
                if next == RTCSignalingState::Stable =>
            {
                Ok(next)
            }
            _ => Err(Error::ErrSignalingStateCannotRollback),
        };
    }

    // W3C 4.3.1 valid state transitions
    let valid = match (cur, op, sdp_type, next) {
        (
            RTCSignalingState::Stable,
            StateChangeOp::SetLocal,
            RTCSdpType::Offer,
            RTCSignalingState::HaveLocalOffer,
        )
        | (
            RTCSignalingState::Stable,
            StateChangeOp::SetRemote,
            RTCSdpType::Offer,
            RTCSignalingState::HaveRemoteOffer,
        )
        // re-offer before the answer arrived
        | (
            RTCSignalingState::HaveLocalOffer,
            StateChangeOp::SetLocal,
            RTCSdpType::Offer,
            RTCSignalingState::HaveLocalOffer,
        )
        | (
            RTCSignalingState::HaveLocalOffer,
            StateChangeOp::SetRemote,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        )
        | (
            RTCSignalingState::HaveLocalOffer,
            StateChangeOp::SetRemote,
            RTCSdpType::Pranswer,
            RTCSignalingState::HaveRemotePranswer,
        )
        | (
            RTCSignalingState::HaveRemotePranswer,
            StateChangeOp::SetRemote,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        )
        | (
            RTCSignalingState::HaveRemoteOffer,
            StateChangeOp::SetLocal,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        )
        | (
            RTCSignalingState::HaveRemoteOffer,
            StateChangeOp::SetLocal,
            RTCSdpType::Pranswer,
            RTCSignalingState::HaveLocalPranswer,
        )
        | (
            RTCSignalingState::HaveLocalPranswer,
            StateChangeOp::SetLocal,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        ) => true,
        _ => false,
    };

    if valid {
        Ok(next)
    } else {
        Err(Error::ErrSignalingStateProposedTransitionInvalid {
            from: cur.to_string(),
            applying: sdp_type.to_string(),
            is_local: op == StateChangeOp::SetLocal,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_signaling_state() {
        let tests = vec![
            ("Unspecified", RTCSignalingState::Unspecified),
            ("stable", RTCSignalingState::Stable),
            ("have-local-offer", RTCSignalingState::HaveLocalOffer),
            ("have-remote-offer", RTCSignalingState::HaveRemoteOffer),
            ("have-local-pranswer", RTCSignalingState::HaveLocalPranswer),
            (
                "have-remote-pranswer",
                RTCSignalingState::HaveRemotePranswer,
            ),
            ("closed", RTCSignalingState::Closed),
        ];

        for (state_string, expected_state) in tests {
            assert_eq!(RTCSignalingState::from(state_string), expected_state);
        }
    }

    #[test]
    fn test_signaling_state_string() {
        let tests = vec![
            (RTCSignalingState::Unspecified, "Unspecified"),
            (RTCSignalingState::Stable, "stable"),
            (RTCSignalingState::HaveLocalOffer, "have-local-offer"),
            (RTCSignalingState::HaveRemoteOffer, "have-remote-offer"),
            (RTCSignalingState::HaveLocalPranswer, "have-local-pranswer"),
            (
                RTCSignalingState::HaveRemotePranswer,
                "have-remote-pranswer",
            ),
            (RTCSignalingState::Closed, "closed"),
        ];

        for (state, expected_string) in tests {
            assert_eq!(state.to_string(), expected_string);
        }
    }

    #[test]
    fn test_signaling_state_serde() -> Result<()> {
        let json = serde_json::to_string(&RTCSignalingState::HaveRemotePranswer)
            .map_err(|err| Error::Other(err.to_string()))?;
        assert_eq!(json, "\"have-remote-pranswer\"");

        let state: RTCSignalingState =
            serde_json::from_str("\"stable\"").map_err(|err| Error::Other(err.to_string()))?;
        assert_eq!(state, RTCSignalingState::Stable);
        Ok(())
    }

    #[test]
    fn test_signaling_state_transitions() {
        let tests = vec![
            (
                "stable->SetLocal(offer)->have-local-offer",
                RTCSignalingState::Stable,
                RTCSignalingState::HaveLocalOffer,
                StateChangeOp::SetLocal,
                RTCSdpType::Offer,
                None,
            ),
            (
                "stable->SetRemote(offer)->have-remote-offer",
                RTCSignalingState::Stable,
                RTCSignalingState::HaveRemoteOffer,
                StateChangeOp::SetRemote,
                RTCSdpType::Offer,
                None,
            ),
            (
                "have-local-offer->SetRemote(answer)->stable",
                RTCSignalingState::HaveLocalOffer,
                RTCSignalingState::Stable,
                StateChangeOp::SetRemote,
                RTCSdpType::Answer,
                None,
            ),
            (
                "have-local-offer->SetRemote(pranswer)->have-remote-pranswer",
                RTCSignalingState::HaveLocalOffer,
                RTCSignalingState::HaveRemotePranswer,
                StateChangeOp::SetRemote,
                RTCSdpType::Pranswer,
                None,
            ),
            (
                "have-remote-pranswer->SetRemote(answer)->stable",
                RTCSignalingState::HaveRemotePranswer,
                RTCSignalingState::Stable,
                StateChangeOp::SetRemote,
                RTCSdpType::Answer,
                None,
            ),
            (
                "have-remote-offer->SetLocal(answer)->stable",
                RTCSignalingState::HaveRemoteOffer,
                RTCSignalingState::Stable,
                StateChangeOp::SetLocal,
                RTCSdpType::Answer,
                None,
            ),
            (
                "have-remote-offer->SetLocal(pranswer)->have-local-pranswer",
                RTCSignalingState::HaveRemoteOffer,
                RTCSignalingState::HaveLocalPranswer,
                StateChangeOp::SetLocal,
                RTCSdpType::Pranswer,
                None,
            ),
            (
                "have-local-pranswer->SetLocal(answer)->stable",
                RTCSignalingState::HaveLocalPranswer,
                RTCSignalingState::Stable,
                StateChangeOp::SetLocal,
                RTCSdpType::Answer,
                None,
            ),
            (
                "have-local-offer->SetLocal(rollback)->stable",
                RTCSignalingState::HaveLocalOffer,
                RTCSignalingState::Stable,
                StateChangeOp::SetLocal,
                RTCSdpType::Rollback,
                None,
            ),
            (
                "have-remote-offer->SetRemote(rollback)->stable",
                RTCSignalingState::HaveRemoteOffer,
                RTCSignalingState::Stable,
                StateChangeOp::SetRemote,
                RTCSdpType::Rollback,
                None,
            ),
            (
                "(invalid) stable->SetRemote(pranswer)->have-remote-pranswer",
                RTCSignalingState::Stable,
                RTCSignalingState::HaveRemotePranswer,
                StateChangeOp::SetRemote,
                RTCSdpType::Pranswer,
                Some(Error::ErrSignalingStateProposedTransitionInvalid {
                    from: "stable".to_owned(),
                    applying: "pranswer".to_owned(),
                    is_local: false,
                }),
            ),
            (
                "(invalid) stable->SetLocal(answer)->stable",
                RTCSignalingState::Stable,
                RTCSignalingState::Stable,
                StateChangeOp::SetLocal,
                RTCSdpType::Answer,
                Some(Error::ErrSignalingStateProposedTransitionInvalid {
                    from: "stable".to_owned(),
                    applying: "answer".to_owned(),
                    is_local: true,
                }),
            ),
            (
                "(invalid) stable->SetRemote(rollback)->have-local-offer",
                RTCSignalingState::Stable,
                RTCSignalingState::HaveLocalOffer,
                StateChangeOp::SetRemote,
                RTCSdpType::Rollback,
                Some(Error::ErrSignalingStateCannotRollback),
            ),
        ];

        for (desc, cur, next, op, sdp_type, expected_err) in tests {
            let result = check_next_signaling_state(cur, next, op, sdp_type);
            match (&result, &expected_err) {
                (Ok(got), None) => {
                    assert_eq!(*got, next, "{desc} state mismatch");
                }
                (Err(got), Some(err)) => {
                    assert_eq!(got, err, "{desc} error mismatch");
                }
                _ => {
                    panic!("{desc}: expected {expected_err:?}, but got {result:?}");
                }
            };
        }
    }
}
