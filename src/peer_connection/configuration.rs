use crate::ice_transport::ice_server::RTCIceServer;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;

/// A Configuration defines how peer-to-peer communication via
/// RTCPeerConnection is established or re-established.
///
/// Configurations may be set up once and reused across multiple
/// RTCPeerConnections.
#[derive(Default)]
pub struct RTCConfiguration {
    /// Defines a slice describing servers available to be used by
    /// ICE, such as STUN and TURN servers.
    pub ice_servers: Vec<RTCIceServer>,

    /// Indicates which candidates the ICE Agent is allowed to use.
    pub ice_transport_policy: RTCIceTransportPolicy,

    /// A set of certificates that the RTCPeerConnection uses to
    /// authenticate. An empty list means one is generated at
    /// construction. Valid values are constrained to be expiring.
    pub certificates: Vec<RTCCertificate>,

    /// Offer the AVPF transport profile (UDP/TLS/RTP/SAVPF) instead of
    /// plain SAVP in generated media sections.
    pub use_media_feedback_profile: bool,
}

impl RTCConfiguration {
    pub(crate) fn get_ice_servers(&self) -> Vec<RTCIceServer> {
        self.ice_servers.clone()
    }
}
