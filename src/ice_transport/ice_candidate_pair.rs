use std::fmt;

use crate::ice_transport::ice_candidate::RTCIceCandidate;

/// Represents a combination of a local and remote candidate that the
/// agent nominated for sending and receiving.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCIceCandidatePair {
    pub local: RTCIceCandidate,
    pub remote: RTCIceCandidate,
}

impl RTCIceCandidatePair {
    pub fn new(local: RTCIceCandidate, remote: RTCIceCandidate) -> Self {
        RTCIceCandidatePair { local, remote }
    }

    /// The remote transport address packets are sent to once this pair
    /// is nominated.
    pub fn remote_endpoint(&self) -> (String, u16) {
        (self.remote.address.clone(), self.remote.port)
    }
}

impl fmt::Display for RTCIceCandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(local) {} <-> (remote) {}", self.local, self.remote)
    }
}
