use std::fmt;

/// Indicates the DTLS transport establishment state.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCDtlsTransportState {
    #[default]
    Unspecified = 0,

    /// DTLS has not started negotiating yet.
    New = 1,

    /// DTLS is in the process of negotiating a secure connection and
    /// verifying the remote fingerprint.
    Connecting = 2,

    /// DTLS has completed negotiation of a secure connection and
    /// verified the remote fingerprint.
    Connected = 3,

    /// The transport has been closed intentionally as the result of
    /// receipt of a close_notify alert, or calling close().
    Closed = 4,

    /// The transport has failed as the result of an error (such as
    /// receipt of an error alert or failure to validate the remote
    /// fingerprint).
    Failed = 5,
}

const DTLS_TRANSPORT_STATE_NEW_STR: &str = "new";
const DTLS_TRANSPORT_STATE_CONNECTING_STR: &str = "connecting";
const DTLS_TRANSPORT_STATE_CONNECTED_STR: &str = "connected";
const DTLS_TRANSPORT_STATE_CLOSED_STR: &str = "closed";
const DTLS_TRANSPORT_STATE_FAILED_STR: &str = "failed";

impl From<&str> for RTCDtlsTransportState {
    fn from(raw: &str) -> Self {
        match raw {
            DTLS_TRANSPORT_STATE_NEW_STR => RTCDtlsTransportState::New,
            DTLS_TRANSPORT_STATE_CONNECTING_STR => RTCDtlsTransportState::Connecting,
            DTLS_TRANSPORT_STATE_CONNECTED_STR => RTCDtlsTransportState::Connected,
            DTLS_TRANSPORT_STATE_CLOSED_STR => RTCDtlsTransportState::Closed,
            DTLS_TRANSPORT_STATE_FAILED_STR => RTCDtlsTransportState::Failed,
            _ => RTCDtlsTransportState::Unspecified,
        }
    }
}

impl From<u8> for RTCDtlsTransportState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCDtlsTransportState::New,
            2 => RTCDtlsTransportState::Connecting,
            3 => RTCDtlsTransportState::Connected,
            4 => RTCDtlsTransportState::Closed,
            5 => RTCDtlsTransportState::Failed,
            _ => RTCDtlsTransportState::Unspecified,
        }
    }
}

impl fmt::Display for RTCDtlsTransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCDtlsTransportState::New => write!(f, "{DTLS_TRANSPORT_STATE_NEW_STR}"),
            RTCDtlsTransportState::Connecting => {
                write!(f, "{DTLS_TRANSPORT_STATE_CONNECTING_STR}")
            }
            RTCDtlsTransportState::Connected => {
                write!(f, "{DTLS_TRANSPORT_STATE_CONNECTED_STR}")
            }
            RTCDtlsTransportState::Closed => write!(f, "{DTLS_TRANSPORT_STATE_CLOSED_STR}"),
            RTCDtlsTransportState::Failed => write!(f, "{DTLS_TRANSPORT_STATE_FAILED_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
