use std::fmt;

/// Indicates the overall state of the peer connection, aggregated from
/// the ICE and DTLS transport states. `Closed` is absorbing.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionState {
    #[default]
    Unspecified,

    /// Both ICE and DTLS are in the "new" state and no transport is in
    /// the process of connecting.
    New,

    /// One of the transports is in the "connecting" or "checking" state
    /// and none of them is in the "failed" state.
    Connecting,

    /// ICE and DTLS are both established on the nominated pair.
    Connected,

    /// ICE lost connectivity on the nominated pair; the secured
    /// transports are kept so a re-connect can resume without a new
    /// handshake.
    Disconnected,

    /// A transport is in the "failed" state: ICE gave up on every pair,
    /// the handshake failed, or the peer certificate did not match the
    /// signaled fingerprint.
    Failed,

    /// The connection has been closed and cannot leave this state.
    Closed,
}

const PEER_CONNECTION_STATE_NEW_STR: &str = "new";
const PEER_CONNECTION_STATE_CONNECTING_STR: &str = "connecting";
const PEER_CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const PEER_CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const PEER_CONNECTION_STATE_FAILED_STR: &str = "failed";
const PEER_CONNECTION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCPeerConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            PEER_CONNECTION_STATE_NEW_STR => RTCPeerConnectionState::New,
            PEER_CONNECTION_STATE_CONNECTING_STR => RTCPeerConnectionState::Connecting,
            PEER_CONNECTION_STATE_CONNECTED_STR => RTCPeerConnectionState::Connected,
            PEER_CONNECTION_STATE_DISCONNECTED_STR => RTCPeerConnectionState::Disconnected,
            PEER_CONNECTION_STATE_FAILED_STR => RTCPeerConnectionState::Failed,
            PEER_CONNECTION_STATE_CLOSED_STR => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl From<u8> for RTCPeerConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCPeerConnectionState::New,
            2 => RTCPeerConnectionState::Connecting,
            3 => RTCPeerConnectionState::Connected,
            4 => RTCPeerConnectionState::Disconnected,
            5 => RTCPeerConnectionState::Failed,
            6 => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCPeerConnectionState::New => write!(f, "{PEER_CONNECTION_STATE_NEW_STR}"),
            RTCPeerConnectionState::Connecting => {
                write!(f, "{PEER_CONNECTION_STATE_CONNECTING_STR}")
            }
            RTCPeerConnectionState::Connected => {
                write!(f, "{PEER_CONNECTION_STATE_CONNECTED_STR}")
            }
            RTCPeerConnectionState::Disconnected => {
                write!(f, "{PEER_CONNECTION_STATE_DISCONNECTED_STR}")
            }
            RTCPeerConnectionState::Failed => write!(f, "{PEER_CONNECTION_STATE_FAILED_STR}"),
            RTCPeerConnectionState::Closed => write!(f, "{PEER_CONNECTION_STATE_CLOSED_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_peer_connection_state_string() {
        let tests = vec![
            (RTCPeerConnectionState::Unspecified, "Unspecified"),
            (RTCPeerConnectionState::New, "new"),
            (RTCPeerConnectionState::Connecting, "connecting"),
            (RTCPeerConnectionState::Connected, "connected"),
            (RTCPeerConnectionState::Disconnected, "disconnected"),
            (RTCPeerConnectionState::Failed, "failed"),
            (RTCPeerConnectionState::Closed, "closed"),
        ];

        for (state, expected_string) in tests {
            assert_eq!(state.to_string(), expected_string);
        }
    }
}
