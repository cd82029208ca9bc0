use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use util::Conn;

use crate::error::Result;
use crate::ice_transport::ice_candidate::RTCIceCandidate;
use crate::ice_transport::ice_candidate_pair::RTCIceCandidatePair;
use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
use crate::ice_transport::ice_server::RTCIceServer;
use crate::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;

pub type OnAgentCandidateHdlrFn = Box<
    dyn (FnMut(Option<RTCIceCandidate>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnAgentConnectionStateChangeHdlrFn = Box<
    dyn (FnMut(RTCIceConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnAgentSelectedCandidatePairChangeHdlrFn = Box<
    dyn (FnMut(RTCIceCandidatePair) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

/// Everything an agent needs to know before candidate discovery starts.
#[derive(Default, Clone)]
pub struct IceAgentConfig {
    pub ice_servers: Vec<RTCIceServer>,
    pub gather_policy: RTCIceTransportPolicy,
    /// Local credentials; empty means the agent generates its own.
    pub local_ufrag: String,
    pub local_pwd: String,
    pub lite: bool,
}

/// IceAgent is the candidate-gathering and connectivity-checking
/// collaborator. Host enumeration, STUN/TURN client traffic, pair
/// priority computation and nomination all live behind this seam; the
/// transport consumes the gathered candidate stream and the nominated
/// pair events.
#[async_trait]
pub trait IceAgent: Send + Sync {
    /// Local credentials in use for the current session.
    async fn get_local_user_credentials(&self) -> (String, String);

    async fn get_remote_user_credentials(&self) -> (String, String);

    /// Install the peer's credentials before checks can succeed.
    async fn set_remote_credentials(&self, ufrag: String, pwd: String) -> Result<()>;

    /// Begin local candidate discovery. Non-blocking; discovered
    /// candidates surface through the on_candidate handler, a final
    /// None marks the end of gathering.
    async fn gather_candidates(&self) -> Result<()>;

    async fn get_local_candidates(&self) -> Result<Vec<RTCIceCandidate>>;

    /// Incorporate a candidate trickled in via signaling.
    async fn add_remote_candidate(&self, candidate: &RTCIceCandidate) -> Result<()>;

    async fn on_candidate(&self, f: OnAgentCandidateHdlrFn);

    async fn on_connection_state_change(&self, f: OnAgentConnectionStateChangeHdlrFn);

    async fn on_selected_candidate_pair_change(&self, f: OnAgentSelectedCandidatePairChangeHdlrFn);

    /// Run checks in the controlling role; resolves once a pair is
    /// nominated with the connection bound to that pair. The returned
    /// stream still carries inbound STUN, which the transport routes
    /// back through route_stun.
    async fn dial(
        &self,
        cancel_rx: mpsc::Receiver<()>,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<Arc<dyn Conn + Send + Sync>>;

    /// Run checks in the controlled role.
    async fn accept(
        &self,
        cancel_rx: mpsc::Receiver<()>,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<Arc<dyn Conn + Send + Sync>>;

    /// Consultative STUN input classified by the demultiplexer.
    async fn route_stun(&self, packet: &[u8]) -> Result<()>;

    /// Regenerate/replace local credentials and forget remote state.
    async fn restart(&self, ufrag: String, pwd: String) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds one agent per peer connection.
#[async_trait]
pub trait IceAgentFactory: Send + Sync {
    async fn create_agent(&self, config: IceAgentConfig) -> Result<Arc<dyn IceAgent + Send + Sync>>;
}
