#[cfg(test)]
pub(crate) mod peer_connection_test;

pub mod certificate;
pub mod configuration;
pub mod events;
pub mod offer_answer_options;
pub(crate) mod operation;
mod peer_connection_internal;
pub mod peer_connection_state;
pub mod policy;
pub mod sdp;
pub mod signaling_state;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use ::sdp::util::ConnectionRole;
use rand::Rng;
use rcgen::KeyPair;
use tokio::sync::{mpsc, Mutex};

use crate::api::API;
use crate::data_channel::data_channel_init::RTCDataChannelInit;
use crate::data_channel::data_channel_parameters::DataChannelParameters;
use crate::data_channel::RTCDataChannel;
use crate::dtls_transport::dtls_role::{
    DTLSRole, DEFAULT_DTLS_ROLE_ANSWER, DEFAULT_DTLS_ROLE_OFFER,
};
use crate::error::{flatten_errs, Error, Result};
use crate::ice_transport::ice_candidate::{unmarshal_candidate, RTCIceCandidate, RTCIceCandidateInit};
use crate::ice_transport::ice_candidate_type::RTCIceCandidateType;
use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
use crate::ice_transport::ice_gatherer_state::RTCIceGathererState;
use crate::ice_transport::ice_gathering_state::RTCIceGatheringState;
use crate::ice_transport::ice_role::RTCIceRole;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::events::{
    EventHandler, EventHandlerId, RTCIceCandidateErrorEvent,
};
use crate::peer_connection::offer_answer_options::{RTCAnswerOptions, RTCOfferOptions};
use crate::peer_connection::operation::Operation;
use crate::peer_connection::peer_connection_internal::PeerConnectionInternal;
use crate::peer_connection::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::sdp::sdp_type::RTCSdpType;
use crate::peer_connection::sdp::session_description::RTCSessionDescription;
use crate::peer_connection::sdp::*;
use crate::peer_connection::signaling_state::{
    check_next_signaling_state, RTCSignalingState, StateChangeOp,
};
use crate::sctp_transport::sctp_transport_state::RTCSctpTransportState;
use crate::sctp_transport::{RTCSctpTransport, DEFAULT_SCTP_PORT};
use crate::track::{MediaSink, MediaTrack};

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// math_rand_alpha generates a mathematical random alphabet sequence of
/// the requested length.
pub fn math_rand_alpha(n: usize) -> String {
    let mut rng = rand::rng();

    let rand_string: String = (0..n)
        .map(|_| {
            let idx = rng.random_range(0..RUNES_ALPHA.len());
            RUNES_ALPHA[idx] as char
        })
        .collect();

    rand_string
}

pub type OnSignalingStateChangeHdlrFn = Box<
    dyn (FnMut(RTCSignalingState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnICEConnectionStateChangeHdlrFn = Box<
    dyn (FnMut(RTCIceConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnICEGatheringStateChangeHdlrFn = Box<
    dyn (FnMut(RTCIceGatheringState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnPeerConnectionStateChangeHdlrFn = Box<
    dyn (FnMut(RTCPeerConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnLocalCandidateHdlrFn = Box<
    dyn (FnMut(Option<RTCIceCandidate>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnICECandidateErrorHdlrFn = Box<
    dyn (FnMut(RTCIceCandidateErrorEvent) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnDataChannelHdlrFn = Box<
    dyn (FnMut(Arc<RTCDataChannel>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnNegotiationNeededHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// RTCPeerConnection represents a WebRTC connection that establishes a
/// peer-to-peer communication with another RTCPeerConnection instance
/// in a browser, or to another endpoint implementing the required
/// protocols.
pub struct RTCPeerConnection {
    stats_id: String,
    configuration: RTCConfiguration,
    pub(crate) internal: Arc<PeerConnectionInternal>,
}

impl std::fmt::Debug for RTCPeerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTCPeerConnection")
            .field("stats_id", &self.stats_id)
            .finish()
    }
}

impl RTCPeerConnection {
    /// Creates a PeerConnection. Engines come from the API; use
    /// API::new_peer_connection rather than this directly.
    pub(crate) async fn new(api: &API, mut configuration: RTCConfiguration) -> Result<Arc<Self>> {
        RTCPeerConnection::init_configuration(&mut configuration)?;

        // The certificates move into the DTLS transport; everything else
        // in the configuration is kept for later reads.
        let (internal, configuration) = PeerConnectionInternal::new(api, configuration).await?;

        Ok(Arc::new(RTCPeerConnection {
            stats_id: format!("PeerConnection-{}", math_rand_alpha(16)),
            configuration,
            internal,
        }))
    }

    /// Validates the configuration: ICE servers must parse, supplied
    /// certificates must not be expired, and a certificate is generated
    /// when none was provided.
    fn init_configuration(configuration: &mut RTCConfiguration) -> Result<()> {
        let sanitized_ice_servers = configuration.get_ice_servers();
        if !sanitized_ice_servers.is_empty() {
            for server in &sanitized_ice_servers {
                server.validate()?;
            }
        }

        if !configuration.certificates.is_empty() {
            let now = std::time::SystemTime::now();
            for cert in &configuration.certificates {
                cert.expires()
                    .duration_since(now)
                    .map_err(|_| Error::ErrCertificateExpired)?;
            }
        } else {
            let kp = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
            let cert = RTCCertificate::from_key_pair(kp)?;
            configuration.certificates = vec![cert];
        };

        Ok(())
    }

    pub fn get_stats_id(&self) -> &str {
        self.stats_id.as_str()
    }

    /// Subscribes to onicecandidate. Fired for every locally gathered
    /// candidate, with a final None when gathering finished. Handlers
    /// must not block.
    pub async fn on_ice_candidate(&self, f: OnLocalCandidateHdlrFn) -> EventHandlerId {
        self.internal.events.ice_candidate.subscribe(f).await
    }

    /// Subscribes to onicecandidateerror.
    pub async fn on_ice_candidate_error(&self, f: OnICECandidateErrorHdlrFn) -> EventHandlerId {
        self.internal.events.ice_candidate_error.subscribe(f).await
    }

    /// Subscribes to oniceconnectionstatechange. Handlers must not block.
    pub async fn on_ice_connection_state_change(
        &self,
        f: OnICEConnectionStateChangeHdlrFn,
    ) -> EventHandlerId {
        self.internal
            .events
            .ice_connection_state_change
            .subscribe(f)
            .await
    }

    /// Subscribes to onicegatheringstatechange.
    pub async fn on_ice_gathering_state_change(
        &self,
        f: OnICEGatheringStateChangeHdlrFn,
    ) -> EventHandlerId {
        self.internal
            .events
            .ice_gathering_state_change
            .subscribe(f)
            .await
    }

    /// Subscribes to onconnectionstatechange. Handlers must not block.
    pub async fn on_peer_connection_state_change(
        &self,
        f: OnPeerConnectionStateChangeHdlrFn,
    ) -> EventHandlerId {
        self.internal
            .events
            .connection_state_change
            .subscribe(f)
            .await
    }

    /// Subscribes to onsignalingstatechange.
    pub async fn on_signaling_state_change(
        &self,
        f: OnSignalingStateChangeHdlrFn,
    ) -> EventHandlerId {
        self.internal
            .events
            .signaling_state_change
            .subscribe(f)
            .await
    }

    /// Subscribes to onnegotiationneeded. The event is debounced: it
    /// fires once the connection went a full quiescence window without
    /// further mutation, and only in stable signaling state.
    pub async fn on_negotiation_needed(&self, f: OnNegotiationNeededHdlrFn) -> EventHandlerId {
        let mut f = f;
        let wrapped: EventHandler<()> = Box::new(move |_| f());
        self.internal
            .events
            .negotiation_needed
            .subscribe(wrapped)
            .await
    }

    /// Subscribes to ondatachannel, fired when the remote peer opens a
    /// channel in-band. The delivered channel is already open.
    pub async fn on_data_channel(&self, f: OnDataChannelHdlrFn) -> EventHandlerId {
        self.internal.events.data_channel.subscribe(f).await
    }

    /// Removes a previously registered handler.
    pub async fn unsubscribe(&self, id: EventHandlerId) -> bool {
        self.internal.events.unsubscribe(id).await
    }

    /// create_offer starts the PeerConnection and generates the local
    /// description.
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-createoffer>
    pub async fn create_offer(
        &self,
        options: Option<RTCOfferOptions>,
    ) -> Result<RTCSessionDescription> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        let options = options.unwrap_or_default();

        if options.ice_restart && self.internal.ice_gatherer.get_agent().await.is_some() {
            self.internal.ice_transport.restart().await?;
        }

        self.start_gathering(options.wait_for_gathering_complete)
            .await;

        // A first offer describes only local state; a renegotiation
        // offer must keep the established mids and m-line order.
        let current_remote_description = {
            let current_remote_description = self.internal.current_remote_description.lock().await;
            current_remote_description.clone()
        };

        let mut d = match current_remote_description.as_ref().and_then(|d| d.parsed.as_ref()) {
            Some(remote_parsed) => {
                self.internal
                    .generate_matched_sdp(
                        remote_parsed,
                        true, /* include_unmatched */
                        DEFAULT_DTLS_ROLE_OFFER.to_connection_role(),
                        self.configuration.use_media_feedback_profile,
                        options.exclude_ice_candidates,
                    )
                    .await?
            }
            None => {
                self.internal
                    .generate_unmatched_sdp(
                        self.configuration.use_media_feedback_profile,
                        options.exclude_ice_candidates,
                    )
                    .await?
            }
        };

        {
            let mut sdp_origin = self.internal.sdp_origin.lock().await;
            update_sdp_origin(&mut sdp_origin, &mut d);
        }
        let sdp = d.marshal();

        let offer = RTCSessionDescription {
            sdp_type: RTCSdpType::Offer,
            sdp,
            parsed: Some(d),
        };

        {
            let mut last_offer = self.internal.last_offer.lock().await;
            *last_offer = offer.sdp.clone();
        }
        Ok(offer)
    }

    /// create_answer generates the local description matched to the
    /// applied remote offer.
    pub async fn create_answer(
        &self,
        options: Option<RTCAnswerOptions>,
    ) -> Result<RTCSessionDescription> {
        let remote_description = match self.remote_description().await {
            Some(desc) => desc,
            None => return Err(Error::ErrNoRemoteDescription),
        };
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        } else if self.signaling_state() != RTCSignalingState::HaveRemoteOffer
            && self.signaling_state() != RTCSignalingState::HaveLocalPranswer
        {
            return Err(Error::ErrIncorrectSignalingState);
        }

        let options = options.unwrap_or_default();
        self.start_gathering(options.wait_for_gathering_complete)
            .await;

        let mut connection_role = self
            .internal
            .setting_engine
            .answering_dtls_role
            .to_connection_role();
        if connection_role == ConnectionRole::Unspecified {
            connection_role = DEFAULT_DTLS_ROLE_ANSWER.to_connection_role();
        }

        let remote_parsed = match &remote_description.parsed {
            Some(parsed) => parsed,
            None => return Err(Error::ErrNoRemoteDescription),
        };

        let mut d = self
            .internal
            .generate_matched_sdp(
                remote_parsed,
                false, /* include_unmatched */
                connection_role,
                self.configuration.use_media_feedback_profile,
                options.exclude_ice_candidates,
            )
            .await?;

        {
            let mut sdp_origin = self.internal.sdp_origin.lock().await;
            update_sdp_origin(&mut sdp_origin, &mut d);
        }
        let sdp = d.marshal();

        let answer = RTCSessionDescription {
            sdp_type: RTCSdpType::Answer,
            sdp,
            parsed: Some(d),
        };

        {
            let mut last_answer = self.internal.last_answer.lock().await;
            *last_answer = answer.sdp.clone();
        }
        Ok(answer)
    }

    /// Kicks candidate discovery off the hot path; bounded by the
    /// configured gather timeout so a slow agent cannot stall offer
    /// generation.
    async fn start_gathering(&self, wait_for_complete: bool) {
        if self.internal.ice_gatherer.state() == RTCIceGathererState::New {
            let gather_timeout = self.internal.setting_engine.timeout.ice_gather_timeout;
            match tokio::time::timeout(gather_timeout, self.internal.ice_gatherer.gather()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::warn!("failed to start candidate gathering: {err}");
                    self.internal
                        .events
                        .ice_candidate_error
                        .emit(RTCIceCandidateErrorEvent {
                            error_text: err.to_string(),
                        })
                        .await;
                }
                Err(_) => {
                    log::warn!("candidate gathering initiation timed out; trickling instead");
                }
            }
        }

        if wait_for_complete
            && self.ice_gathering_state() != RTCIceGatheringState::Complete
        {
            let mut gathering_complete_rx = self.gathering_complete_promise().await;
            let _ = gathering_complete_rx.recv().await;
        }
    }

    // 4.4.1.6 Set the SessionDescription
    pub(crate) async fn set_description(
        &self,
        sd: &RTCSessionDescription,
        op: StateChangeOp,
    ) -> Result<()> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        } else if sd.sdp_type == RTCSdpType::Unspecified {
            return Err(Error::ErrPeerConnSDPTypeInvalidValue);
        }

        let next_state = {
            let cur = self.signaling_state();

            match op {
                StateChangeOp::SetLocal => {
                    match sd.sdp_type {
                        // stable->SetLocal(offer)->have-local-offer
                        RTCSdpType::Offer => {
                            let check = {
                                let last_offer = self.internal.last_offer.lock().await;
                                sd.sdp != *last_offer
                            };
                            if check {
                                Err(Error::ErrSDPDoesNotMatchOffer)
                            } else {
                                let next_state = check_next_signaling_state(
                                    cur,
                                    RTCSignalingState::HaveLocalOffer,
                                    StateChangeOp::SetLocal,
                                    sd.sdp_type,
                                );
                                if next_state.is_ok() {
                                    let mut pending_local_description =
                                        self.internal.pending_local_description.lock().await;
                                    *pending_local_description = Some(sd.clone());
                                }
                                next_state
                            }
                        }
                        // have-remote-offer->SetLocal(answer)->stable
                        // have-local-pranswer->SetLocal(answer)->stable
                        RTCSdpType::Answer => {
                            let check = {
                                let last_answer = self.internal.last_answer.lock().await;
                                sd.sdp != *last_answer
                            };
                            if check {
                                Err(Error::ErrSDPDoesNotMatchAnswer)
                            } else {
                                let next_state = check_next_signaling_state(
                                    cur,
                                    RTCSignalingState::Stable,
                                    StateChangeOp::SetLocal,
                                    sd.sdp_type,
                                );
                                if next_state.is_ok() {
                                    let pending_remote_description = {
                                        let mut pending_remote_description =
                                            self.internal.pending_remote_description.lock().await;
                                        pending_remote_description.take()
                                    };
                                    let _pending_local_description = {
                                        let mut pending_local_description =
                                            self.internal.pending_local_description.lock().await;
                                        pending_local_description.take()
                                    };

                                    {
                                        let mut current_local_description =
                                            self.internal.current_local_description.lock().await;
                                        *current_local_description = Some(sd.clone());
                                    }
                                    {
                                        let mut current_remote_description =
                                            self.internal.current_remote_description.lock().await;
                                        *current_remote_description = pending_remote_description;
                                    }
                                }
                                next_state
                            }
                        }
                        RTCSdpType::Rollback => {
                            let next_state = check_next_signaling_state(
                                cur,
                                RTCSignalingState::Stable,
                                StateChangeOp::SetLocal,
                                sd.sdp_type,
                            );
                            if next_state.is_ok() {
                                let mut pending_local_description =
                                    self.internal.pending_local_description.lock().await;
                                *pending_local_description = None;
                            }
                            next_state
                        }
                        // have-remote-offer->SetLocal(pranswer)->have-local-pranswer
                        RTCSdpType::Pranswer => {
                            let check = {
                                let last_answer = self.internal.last_answer.lock().await;
                                sd.sdp != *last_answer
                            };
                            if check {
                                Err(Error::ErrSDPDoesNotMatchAnswer)
                            } else {
                                let next_state = check_next_signaling_state(
                                    cur,
                                    RTCSignalingState::HaveLocalPranswer,
                                    StateChangeOp::SetLocal,
                                    sd.sdp_type,
                                );
                                if next_state.is_ok() {
                                    let mut pending_local_description =
                                        self.internal.pending_local_description.lock().await;
                                    *pending_local_description = Some(sd.clone());
                                }
                                next_state
                            }
                        }
                        _ => Err(Error::ErrPeerConnStateChangeInvalid),
                    }
                }
                StateChangeOp::SetRemote => {
                    match sd.sdp_type {
                        // stable->SetRemote(offer)->have-remote-offer
                        RTCSdpType::Offer => {
                            let next_state = check_next_signaling_state(
                                cur,
                                RTCSignalingState::HaveRemoteOffer,
                                StateChangeOp::SetRemote,
                                sd.sdp_type,
                            );
                            if next_state.is_ok() {
                                let mut pending_remote_description =
                                    self.internal.pending_remote_description.lock().await;
                                *pending_remote_description = Some(sd.clone());
                            }
                            next_state
                        }
                        // have-local-offer->SetRemote(answer)->stable
                        // have-remote-pranswer->SetRemote(answer)->stable
                        RTCSdpType::Answer => {
                            let next_state = check_next_signaling_state(
                                cur,
                                RTCSignalingState::Stable,
                                StateChangeOp::SetRemote,
                                sd.sdp_type,
                            );
                            if next_state.is_ok() {
                                let pending_local_description = {
                                    let mut pending_local_description =
                                        self.internal.pending_local_description.lock().await;
                                    pending_local_description.take()
                                };

                                let _pending_remote_description = {
                                    let mut pending_remote_description =
                                        self.internal.pending_remote_description.lock().await;
                                    pending_remote_description.take()
                                };

                                {
                                    let mut current_remote_description =
                                        self.internal.current_remote_description.lock().await;
                                    *current_remote_description = Some(sd.clone());
                                }
                                {
                                    let mut current_local_description =
                                        self.internal.current_local_description.lock().await;
                                    *current_local_description = pending_local_description;
                                }
                            }
                            next_state
                        }
                        RTCSdpType::Rollback => {
                            let next_state = check_next_signaling_state(
                                cur,
                                RTCSignalingState::Stable,
                                StateChangeOp::SetRemote,
                                sd.sdp_type,
                            );
                            if next_state.is_ok() {
                                let mut pending_remote_description =
                                    self.internal.pending_remote_description.lock().await;
                                *pending_remote_description = None;
                            }
                            next_state
                        }
                        // have-local-offer->SetRemote(pranswer)->have-remote-pranswer
                        RTCSdpType::Pranswer => {
                            let next_state = check_next_signaling_state(
                                cur,
                                RTCSignalingState::HaveRemotePranswer,
                                StateChangeOp::SetRemote,
                                sd.sdp_type,
                            );
                            if next_state.is_ok() {
                                let mut pending_remote_description =
                                    self.internal.pending_remote_description.lock().await;
                                *pending_remote_description = Some(sd.clone());
                            }
                            next_state
                        }
                        _ => Err(Error::ErrPeerConnStateChangeInvalid),
                    }
                }
            }
        };

        match next_state {
            Ok(next_state) => {
                self.internal
                    .signaling_state
                    .store(next_state as u8, Ordering::SeqCst);
                if next_state == RTCSignalingState::Stable
                    && self.internal.is_negotiation_needed.load(Ordering::SeqCst)
                {
                    // Mutations made while an exchange was in flight get
                    // their (suppressed) event once we return to stable.
                    self.internal.trigger_negotiation_needed();
                }
                log::info!("signaling state changed to {next_state}");
                self.internal
                    .events
                    .signaling_state_change
                    .emit(next_state)
                    .await;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// set_local_description sets the SessionDescription of the local
    /// peer.
    pub async fn set_local_description(&self, mut desc: RTCSessionDescription) -> Result<()> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        // JSEP 5.4: an empty SDP re-applies the last created one.
        if desc.sdp.is_empty() {
            match desc.sdp_type {
                RTCSdpType::Answer | RTCSdpType::Pranswer => {
                    let last_answer = self.internal.last_answer.lock().await;
                    desc.sdp = last_answer.clone();
                }
                RTCSdpType::Offer => {
                    let last_offer = self.internal.last_offer.lock().await;
                    desc.sdp = last_offer.clone();
                }
                _ => return Err(Error::ErrPeerConnSDPTypeInvalidValueSetLocalDescription),
            }
        }

        desc.parsed = Some(desc.unmarshal()?);
        self.set_description(&desc, StateChangeOp::SetLocal).await?;

        if self.internal.ice_gatherer.state() == RTCIceGathererState::New {
            self.internal.ice_gatherer.gather().await
        } else {
            Ok(())
        }
    }

    /// local_description returns the pending local description if it is
    /// not null and otherwise the current one, with the candidates
    /// gathered so far folded in.
    pub async fn local_description(&self) -> Option<RTCSessionDescription> {
        if let Some(pending_local_description) = self.pending_local_description().await {
            return Some(pending_local_description);
        }
        self.current_local_description().await
    }

    /// set_remote_description sets the SessionDescription of the remote
    /// peer. Protocol-input errors leave the connection state untouched.
    pub async fn set_remote_description(&self, mut desc: RTCSessionDescription) -> Result<()> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        // A second offer colliding with our own pending offer is
        // reported specifically; the caller is expected to roll back.
        if desc.sdp_type == RTCSdpType::Offer
            && self.signaling_state() == RTCSignalingState::HaveLocalOffer
        {
            return Err(Error::ErrWrongSdpTypeOfferAfterOffer);
        }

        let is_renegotiation = {
            let current_remote_description = self.internal.current_remote_description.lock().await;
            current_remote_description.is_some()
        };

        let parsed = desc.unmarshal()?;

        // Validate everything the transports will need before any state
        // mutation happens.
        let (remote_ufrag, remote_pwd, candidates) = extract_ice_details(&parsed)?;
        let fingerprint = extract_fingerprint(&parsed)?;
        let application_info = extract_application_media_info(&parsed)?;
        let remote_is_lite = remote_is_ice_lite(&parsed);
        let dtls_role = DTLSRole::from(&parsed);

        desc.parsed = Some(parsed);
        self.set_description(&desc, StateChangeOp::SetRemote)
            .await?;

        let we_offer = desc.sdp_type == RTCSdpType::Answer;

        // If one of the agents is lite and the other one is not, the
        // lite agent must be the controlling agent. If both or neither
        // agents are lite the offering agent is controlling. RFC 8445 S6.1.1
        let local_is_lite = self.internal.setting_engine.candidates.ice_lite;
        let ice_role = if (we_offer && remote_is_lite == local_is_lite)
            || (remote_is_lite && !local_is_lite)
        {
            RTCIceRole::Controlling
        } else {
            RTCIceRole::Controlled
        };

        if let Some(info) = &application_info {
            if info.sctp_port != DEFAULT_SCTP_PORT {
                self.internal.sctp_transport.set_remote_port(info.sctp_port);
            }
            let mut remote_application_info =
                self.internal.remote_application_info.lock().await;
            *remote_application_info = Some(info.clone());
        }

        if is_renegotiation {
            if self
                .internal
                .ice_transport
                .have_remote_credentials_change(&remote_ufrag, &remote_pwd)
                .await
            {
                // An ICE restart only happens implicitly for a remote offer.
                if !we_offer {
                    self.internal.ice_transport.restart().await?;
                }
                self.internal
                    .ice_transport
                    .set_remote_credentials(remote_ufrag.clone(), remote_pwd.clone())
                    .await?;
            }

            for candidate in candidates {
                self.internal
                    .ice_transport
                    .add_remote_candidate(Some(candidate))
                    .await?;
            }

            return Ok(());
        }

        for candidate in candidates {
            self.internal
                .ice_transport
                .add_remote_candidate(Some(candidate))
                .await?;
        }

        let have_application = application_info.is_some();
        let pci = Arc::clone(&self.internal);
        self.internal
            .ops
            .enqueue(Operation(Box::new(move || {
                let pc = Arc::clone(&pci);
                let ru = remote_ufrag.clone();
                let rp = remote_pwd.clone();
                let fp = fingerprint.clone();
                Box::pin(async move {
                    log::trace!("start_transports: ice_role={ice_role}, dtls_role={dtls_role}");
                    pc.start_transports(ice_role, dtls_role, ru, rp, fp).await;

                    if have_application {
                        pc.start_sctp().await;
                    }
                })
            })))
            .await?;

        // Host candidates ride inside the SDP; everything else is
        // surfaced for trickling now that signaling can carry it.
        if let Ok(local_candidates) = self.internal.ice_gatherer.get_local_candidates().await {
            for candidate in local_candidates {
                if candidate.typ != RTCIceCandidateType::Host {
                    self.internal
                        .events
                        .ice_candidate
                        .emit(Some(candidate))
                        .await;
                }
            }
        }

        Ok(())
    }

    /// remote_description returns the pending remote description if it
    /// is not null and otherwise the current one.
    pub async fn remote_description(&self) -> Option<RTCSessionDescription> {
        self.internal.remote_description().await
    }

    /// add_ice_candidate accepts an ICE candidate string trickled from
    /// the remote and adds it to the existing set of candidates.
    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        if self.remote_description().await.is_none() {
            return Err(Error::ErrNoRemoteDescription);
        }

        let candidate_value = match candidate.candidate.strip_prefix("candidate:") {
            Some(s) => s,
            None => candidate.candidate.as_str(),
        };

        let ice_candidate = if !candidate_value.is_empty() {
            Some(unmarshal_candidate(candidate_value)?)
        } else {
            None
        };

        self.internal
            .ice_transport
            .add_remote_candidate(ice_candidate)
            .await
    }

    /// Registers a local media source; its identity and capabilities
    /// shape the next offer. Fires onnegotiationneeded.
    pub async fn add_track(&self, track: MediaTrack) -> Result<()> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        {
            let mut media_tracks = self.internal.media_tracks.lock().await;
            if media_tracks.iter().any(|t| t.id == track.id) {
                return Err(Error::ErrExistingTrack);
            }
            media_tracks.push(track);
        }

        self.internal.trigger_negotiation_needed();
        Ok(())
    }

    /// Removes a previously added track by id. Fires onnegotiationneeded.
    pub async fn remove_track(&self, track_id: &str) -> Result<()> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        {
            let mut media_tracks = self.internal.media_tracks.lock().await;
            let before = media_tracks.len();
            media_tracks.retain(|t| t.id != track_id);
            if media_tracks.len() == before {
                return Err(Error::ErrTrackNotFound);
            }
        }

        self.internal.trigger_negotiation_needed();
        Ok(())
    }

    /// create_data_channel creates a new DataChannel object with the
    /// given label and optional options.
    ///
    /// Channels created before the SCTP association exists are held
    /// pending and open when it comes up; on an already-connected peer
    /// connection this call waits for the association, bounded by the
    /// associate timeout.
    pub async fn create_data_channel(
        &self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<Arc<RTCDataChannel>> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        if label.len() > 65535 {
            return Err(Error::ErrStringSizeLimit);
        }

        let mut params = DataChannelParameters {
            label: label.to_owned(),
            ordered: true,
            ..Default::default()
        };

        if let Some(options) = options {
            if let Some(id) = options.id {
                params.id = id;
            }
            if let Some(ordered) = options.ordered {
                params.ordered = ordered;
            }
            if let Some(max_packet_life_time) = options.max_packet_life_time {
                params.max_packet_life_time = max_packet_life_time;
            }
            if let Some(max_retransmits) = options.max_retransmits {
                params.max_retransmits = max_retransmits;
            }
            if let Some(protocol) = options.protocol {
                params.protocol = protocol;
            }
            if params.protocol.len() > 65535 {
                return Err(Error::ErrProtocolTooLarge);
            }
            if let Some(negotiated) = options.negotiated {
                params.negotiated = negotiated;
                if negotiated && options.id.is_none() {
                    return Err(Error::ErrNegotiatedWithoutID);
                }
            }
        }

        if params.max_packet_life_time != 0 && params.max_retransmits != 0 {
            return Err(Error::ErrRetransmitsOrPacketLifeTime);
        }

        let d = Arc::new(RTCDataChannel::new(
            params,
            Arc::clone(&self.internal.setting_engine),
        ));

        self.internal
            .sctp_transport
            .data_channels_requested
            .fetch_add(1, Ordering::SeqCst);

        if self.internal.sctp_transport.state() == RTCSctpTransportState::Connected {
            self.internal.sctp_transport.open_channel_now(&d).await?;
        } else if self.connection_state() == RTCPeerConnectionState::Connected {
            // The peer is up, the association is still coming up (or
            // never will): wait, bounded.
            let timeout = self.internal.setting_engine.timeout.sctp_associate_timeout;
            self.internal
                .sctp_transport
                .wait_until_connected(timeout)
                .await?;
            self.internal.sctp_transport.open_channel_now(&d).await?;
        } else {
            self.internal
                .sctp_transport
                .register_pending_channel(Arc::clone(&d))
                .await;
        }

        self.internal.trigger_negotiation_needed();

        Ok(d)
    }

    /// Regenerates ICE credentials and fires onnegotiationneeded; the
    /// next offer carries the new credentials.
    pub async fn restart_ice(&self) -> Result<()> {
        if self.internal.is_closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }

        if self.internal.ice_gatherer.get_agent().await.is_some() {
            self.internal.ice_transport.restart().await?;
        }

        self.internal.trigger_negotiation_needed();
        Ok(())
    }

    /// Routes demultiplexed SRTP/SRTCP to an external media stack.
    pub fn set_media_sink(&self, sink: Box<dyn MediaSink + Send + Sync>) {
        self.internal.dtls_transport.set_media_sink(sink);
    }

    /// close ends the PeerConnection. The first invocation tears
    /// everything down; subsequent calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.internal.is_closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.internal.cancel_negotiation_debounce();

        self.internal
            .signaling_state
            .store(RTCSignalingState::Closed as u8, Ordering::SeqCst);

        let mut close_errs = vec![];

        // Channels first so their streams reset before the association
        // goes away underneath them.
        {
            let channels = {
                let registry = self.internal.sctp_transport.registry.lock().await;
                registry.all()
            };
            for d in channels {
                if let Err(err) = d.close().await {
                    close_errs.push(Error::new(format!("data_channels: {err}")));
                }
            }
            let mut registry = self.internal.sctp_transport.registry.lock().await;
            registry.pending.clear();
            registry.active.clear();
        }

        if let Err(err) = self.internal.sctp_transport.stop().await {
            close_errs.push(Error::new(format!("sctp_transport: {err}")));
        }

        if let Err(err) = self.internal.dtls_transport.stop().await {
            close_errs.push(Error::new(format!("dtls_transport: {err}")));
        }

        if let Err(err) = self.internal.ice_transport.stop().await {
            close_errs.push(Error::new(format!("ice_transport: {err}")));
        }

        PeerConnectionInternal::update_connection_state(
            &self.internal.events,
            &self.internal.is_closed,
            &self.internal.peer_connection_state,
            self.ice_connection_state(),
            self.internal.dtls_transport.state(),
        )
        .await;

        if let Err(err) = self.internal.ops.close().await {
            close_errs.push(Error::new(format!("ops: {err}")));
        }

        self.internal.events.clear().await;

        flatten_errs(close_errs)
    }

    /// The local description last negotiated to stable, with gathered
    /// candidates folded in.
    pub async fn current_local_description(&self) -> Option<RTCSessionDescription> {
        let local_description = {
            let current_local_description = self.internal.current_local_description.lock().await;
            current_local_description.clone()
        };
        let ice_gatherer = Some(self.internal.ice_gatherer.as_ref());
        let ice_gathering_state = self.ice_gathering_state();

        populate_local_candidates(local_description.as_ref(), ice_gatherer, ice_gathering_state)
            .await
    }

    /// A local description still in negotiation, with gathered
    /// candidates folded in; None in stable state.
    pub async fn pending_local_description(&self) -> Option<RTCSessionDescription> {
        let local_description = {
            let pending_local_description = self.internal.pending_local_description.lock().await;
            pending_local_description.clone()
        };
        let ice_gatherer = Some(self.internal.ice_gatherer.as_ref());
        let ice_gathering_state = self.ice_gathering_state();

        populate_local_candidates(local_description.as_ref(), ice_gatherer, ice_gathering_state)
            .await
    }

    /// The remote description last negotiated to stable.
    pub async fn current_remote_description(&self) -> Option<RTCSessionDescription> {
        let current_remote_description = self.internal.current_remote_description.lock().await;
        current_remote_description.clone()
    }

    /// A remote description still in negotiation; None in stable state.
    pub async fn pending_remote_description(&self) -> Option<RTCSessionDescription> {
        let pending_remote_description = self.internal.pending_remote_description.lock().await;
        pending_remote_description.clone()
    }

    /// Returns the signaling state of the PeerConnection instance.
    pub fn signaling_state(&self) -> RTCSignalingState {
        self.internal.signaling_state.load(Ordering::SeqCst).into()
    }

    /// Returns the ICE connection state of the PeerConnection instance.
    pub fn ice_connection_state(&self) -> RTCIceConnectionState {
        self.internal
            .ice_connection_state
            .load(Ordering::SeqCst)
            .into()
    }

    /// Returns the ICE gathering state of the PeerConnection instance.
    pub fn ice_gathering_state(&self) -> RTCIceGatheringState {
        self.internal.ice_gathering_state()
    }

    /// Returns the connection state of the PeerConnection instance.
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.internal
            .peer_connection_state
            .load(Ordering::SeqCst)
            .into()
    }

    /// Returns the SCTPTransport for this PeerConnection.
    pub fn sctp(&self) -> Arc<RTCSctpTransport> {
        Arc::clone(&self.internal.sctp_transport)
    }

    /// Returns a channel that is closed when gathering is complete.
    /// Prefer trickling candidates; waiting here lengthens connection
    /// startup.
    pub async fn gathering_complete_promise(&self) -> mpsc::Receiver<()> {
        let (gathering_complete_tx, gathering_complete_rx) = mpsc::channel(1);

        // It's possible to miss the gathering-complete event if the
        // promise is created after gathering already finished, so check
        // the state afterwards to avoid blocking the caller forever.
        let done = Arc::new(Mutex::new(Some(gathering_complete_tx)));
        let done2 = Arc::clone(&done);
        self.internal
            .set_gather_complete_handler(Box::new(move || {
                let done3 = Arc::clone(&done2);
                Box::pin(async move {
                    let mut d = done3.lock().await;
                    d.take();
                })
            }))
            .await;

        if self.ice_gathering_state() == RTCIceGatheringState::Complete {
            let mut d = done.lock().await;
            d.take();
        }

        gathering_complete_rx
    }
}
