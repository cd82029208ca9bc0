use std::fmt;

/// Indicates the state of the SCTP transport.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCSctpTransportState {
    #[default]
    Unspecified,

    /// The SCTP transport has not started negotiating yet.
    Closed,

    /// SCTP is in the process of negotiating an association.
    Connecting,

    /// The negotiation of an association is completed.
    Connected,
}

const SCTP_TRANSPORT_STATE_CLOSED_STR: &str = "closed";
const SCTP_TRANSPORT_STATE_CONNECTING_STR: &str = "connecting";
const SCTP_TRANSPORT_STATE_CONNECTED_STR: &str = "connected";

impl From<&str> for RTCSctpTransportState {
    fn from(raw: &str) -> Self {
        match raw {
            SCTP_TRANSPORT_STATE_CLOSED_STR => RTCSctpTransportState::Closed,
            SCTP_TRANSPORT_STATE_CONNECTING_STR => RTCSctpTransportState::Connecting,
            SCTP_TRANSPORT_STATE_CONNECTED_STR => RTCSctpTransportState::Connected,
            _ => RTCSctpTransportState::Unspecified,
        }
    }
}

impl From<u8> for RTCSctpTransportState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCSctpTransportState::Closed,
            2 => RTCSctpTransportState::Connecting,
            3 => RTCSctpTransportState::Connected,
            _ => RTCSctpTransportState::Unspecified,
        }
    }
}

impl fmt::Display for RTCSctpTransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCSctpTransportState::Closed => write!(f, "{SCTP_TRANSPORT_STATE_CLOSED_STR}"),
            RTCSctpTransportState::Connecting => {
                write!(f, "{SCTP_TRANSPORT_STATE_CONNECTING_STR}")
            }
            RTCSctpTransportState::Connected => {
                write!(f, "{SCTP_TRANSPORT_STATE_CONNECTED_STR}")
            }
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
