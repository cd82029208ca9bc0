use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines the ICE candidate policy surface the browser uses to
/// select candidates.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceTransportPolicy {
    #[default]
    Unspecified,

    /// All ICE candidates will be considered.
    #[serde(rename = "all")]
    All,

    /// Only media-relay candidates (TURN) will be considered; requires
    /// at least one configured ICE server.
    #[serde(rename = "relay")]
    Relay,
}

const ICE_TRANSPORT_POLICY_ALL_STR: &str = "all";
const ICE_TRANSPORT_POLICY_RELAY_STR: &str = "relay";

impl From<&str> for RTCIceTransportPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_TRANSPORT_POLICY_ALL_STR => RTCIceTransportPolicy::All,
            ICE_TRANSPORT_POLICY_RELAY_STR => RTCIceTransportPolicy::Relay,
            _ => RTCIceTransportPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCIceTransportPolicy::All => write!(f, "{ICE_TRANSPORT_POLICY_ALL_STR}"),
            RTCIceTransportPolicy::Relay => write!(f, "{ICE_TRANSPORT_POLICY_RELAY_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
