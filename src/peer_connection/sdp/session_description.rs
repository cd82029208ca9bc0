use std::io::Cursor;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};

use super::sdp_type::RTCSdpType;
use crate::error::Result;

/// SessionDescription is used to expose local and remote session
/// descriptions; `sdp` is the wire form carried over signaling.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,

    /// This will never be initialized by callers, internal use only
    #[serde(skip)]
    pub(crate) parsed: Option<SessionDescription>,
}

impl RTCSessionDescription {
    /// Given SDP representing an offer, wraps it in an
    /// RTCSessionDescription that can be applied with
    /// set_remote_description.
    pub fn offer(sdp: String) -> Result<RTCSessionDescription> {
        let mut desc = RTCSessionDescription {
            sdp,
            sdp_type: RTCSdpType::Offer,
            parsed: None,
        };
        let parsed = desc.unmarshal()?;
        desc.parsed = Some(parsed);
        Ok(desc)
    }

    /// Given SDP representing an answer, wraps it in an
    /// RTCSessionDescription that can be applied with
    /// set_remote_description.
    pub fn answer(sdp: String) -> Result<RTCSessionDescription> {
        let mut desc = RTCSessionDescription {
            sdp,
            sdp_type: RTCSdpType::Answer,
            parsed: None,
        };
        let parsed = desc.unmarshal()?;
        desc.parsed = Some(parsed);
        Ok(desc)
    }

    /// Given SDP representing a provisional answer, wraps it in an
    /// RTCSessionDescription.
    pub fn pranswer(sdp: String) -> Result<RTCSessionDescription> {
        let mut desc = RTCSessionDescription {
            sdp,
            sdp_type: RTCSdpType::Pranswer,
            parsed: None,
        };
        let parsed = desc.unmarshal()?;
        desc.parsed = Some(parsed);
        Ok(desc)
    }

    /// Parses the SDP body into the structured form the negotiator
    /// consumes.
    pub fn unmarshal(&self) -> Result<SessionDescription> {
        let mut reader = Cursor::new(self.sdp.as_bytes());
        let parsed = SessionDescription::unmarshal(&mut reader)?;
        Ok(parsed)
    }
}
