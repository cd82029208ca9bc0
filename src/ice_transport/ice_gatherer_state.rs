use std::fmt;

/// Describes the current gathering state of the ICE gatherer.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceGathererState {
    #[default]
    Unspecified,

    /// The gatherer has been created but gather has not been called.
    New,

    /// Gather was called and the gatherer is in the process of gathering candidates.
    Gathering,

    /// The gatherer has completed gathering.
    Complete,

    /// The closed state can only be entered when the gatherer has been closed
    /// intentionally by calling close().
    Closed,
}

impl From<u8> for RTCIceGathererState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCIceGathererState::New,
            2 => RTCIceGathererState::Gathering,
            3 => RTCIceGathererState::Complete,
            4 => RTCIceGathererState::Closed,
            _ => RTCIceGathererState::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceGathererState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCIceGathererState::New => write!(f, "new"),
            RTCIceGathererState::Gathering => write!(f, "gathering"),
            RTCIceGathererState::Complete => write!(f, "complete"),
            RTCIceGathererState::Closed => write!(f, "closed"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}
