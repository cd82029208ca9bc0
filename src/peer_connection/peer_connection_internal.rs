use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use sdp::description::session::{Origin, SessionDescription};
use sdp::util::ConnectionRole;
use tokio::sync::Mutex;

use crate::api::media_engine::MediaEngine;
use crate::api::setting_engine::SettingEngine;
use crate::api::API;
use crate::dtls_transport::dtls_fingerprint::RTCDtlsFingerprint;
use crate::dtls_transport::dtls_parameters::DTLSParameters;
use crate::dtls_transport::dtls_role::DTLSRole;
use crate::dtls_transport::dtls_transport_state::RTCDtlsTransportState;
use crate::dtls_transport::RTCDtlsTransport;
use crate::error::{Error, Result};
use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
use crate::ice_transport::ice_gatherer::{RTCIceGatherOptions, RTCIceGatherer};
use crate::ice_transport::ice_gatherer_state::RTCIceGathererState;
use crate::ice_transport::ice_gathering_state::RTCIceGatheringState;
use crate::ice_transport::ice_parameters::RTCIceParameters;
use crate::ice_transport::ice_role::RTCIceRole;
use crate::ice_transport::RTCIceTransport;
use crate::peer_connection::events::EventHandlers;
use crate::peer_connection::operation::Operations;
use crate::peer_connection::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::sdp::session_description::RTCSessionDescription;
use crate::peer_connection::sdp::*;
use crate::peer_connection::signaling_state::RTCSignalingState;
use crate::sctp_transport::sctp_transport_capabilities::SCTPTransportCapabilities;
use crate::sctp_transport::{RTCSctpTransport, DEFAULT_SCTP_PORT};
use crate::track::{MediaKind, MediaTrack, RTCRtpTransceiverDirection};

pub(crate) struct PeerConnectionInternal {
    /// The last known greater mid value. Mids are generated as numbers;
    /// JSEP requires a fresh unique mid when a media section is reused.
    pub(super) greater_mid: AtomicIsize,
    pub(super) sdp_origin: Mutex<Origin>,
    pub(super) last_offer: Mutex<String>,
    pub(super) last_answer: Mutex<String>,

    pub(super) is_closed: Arc<AtomicBool>,

    /// ops is an operations queue which will ensure the enqueued actions
    /// are executed in order. It is used for asynchronously, but
    /// serially processing remote and local descriptions.
    pub(crate) ops: Arc<Operations>,
    pub(super) is_negotiation_needed: Arc<AtomicBool>,
    pub(super) negotiation_debounce_gen: Arc<AtomicU64>,
    pub(super) signaling_state: Arc<AtomicU8>,
    pub(super) peer_connection_state: Arc<AtomicU8>,
    pub(super) ice_connection_state: Arc<AtomicU8>,

    pub(super) ice_gatherer: Arc<RTCIceGatherer>,
    pub(super) ice_transport: Arc<RTCIceTransport>,
    pub(super) dtls_transport: Arc<RTCDtlsTransport>,
    pub(super) sctp_transport: Arc<RTCSctpTransport>,

    pub(super) current_local_description: Arc<Mutex<Option<RTCSessionDescription>>>,
    pub(super) current_remote_description: Arc<Mutex<Option<RTCSessionDescription>>>,
    pub(super) pending_local_description: Arc<Mutex<Option<RTCSessionDescription>>>,
    pub(super) pending_remote_description: Arc<Mutex<Option<RTCSessionDescription>>>,

    pub(super) media_tracks: Arc<Mutex<Vec<MediaTrack>>>,
    pub(super) track_mids: Mutex<HashMap<String, String>>,
    pub(super) remote_application_info: Mutex<Option<ApplicationMediaInfo>>,

    pub(crate) events: Arc<EventHandlers>,

    pub(super) setting_engine: Arc<SettingEngine>,
    pub(crate) media_engine: Arc<MediaEngine>,
}

impl PeerConnectionInternal {
    pub(super) async fn new(
        api: &API,
        mut configuration: crate::peer_connection::configuration::RTCConfiguration,
    ) -> Result<(Arc<Self>, crate::peer_connection::configuration::RTCConfiguration)> {
        let ice_gatherer = Arc::new(api.new_ice_gatherer(RTCIceGatherOptions {
            ice_servers: configuration.get_ice_servers(),
            ice_gather_policy: configuration.ice_transport_policy,
        })?);

        let ice_transport = Arc::new(api.new_ice_transport(Arc::clone(&ice_gatherer)));

        let certificates = configuration.certificates.drain(..).collect();
        let dtls_transport =
            Arc::new(api.new_dtls_transport(Arc::clone(&ice_transport), certificates)?);

        let sctp_transport = Arc::new(api.new_sctp_transport(Arc::clone(&dtls_transport))?);

        let pc = Arc::new(PeerConnectionInternal {
            greater_mid: AtomicIsize::new(-1),
            sdp_origin: Mutex::new(Default::default()),
            last_offer: Mutex::new("".to_owned()),
            last_answer: Mutex::new("".to_owned()),
            is_closed: Arc::new(AtomicBool::new(false)),
            ops: Arc::new(Operations::new()),
            is_negotiation_needed: Arc::new(AtomicBool::new(false)),
            negotiation_debounce_gen: Arc::new(AtomicU64::new(0)),
            signaling_state: Arc::new(AtomicU8::new(RTCSignalingState::Stable as u8)),
            peer_connection_state: Arc::new(AtomicU8::new(RTCPeerConnectionState::New as u8)),
            ice_connection_state: Arc::new(AtomicU8::new(RTCIceConnectionState::New as u8)),
            ice_gatherer,
            ice_transport,
            dtls_transport,
            sctp_transport,
            current_local_description: Arc::new(Default::default()),
            current_remote_description: Arc::new(Default::default()),
            pending_local_description: Arc::new(Default::default()),
            pending_remote_description: Arc::new(Default::default()),
            media_tracks: Arc::new(Default::default()),
            track_mids: Mutex::new(HashMap::new()),
            remote_application_info: Mutex::new(None),
            events: Arc::new(EventHandlers::new()),
            setting_engine: Arc::clone(&api.setting_engine),
            media_engine: Arc::clone(&api.media_engine),
        });

        pc.wire_transport_events().await;

        Ok((pc, configuration))
    }

    /// Connects the transports' handler surfaces to the observer
    /// registries and the connection-state machine. Handlers capture
    /// field Arcs (or a Weak of self), never an owning self reference.
    async fn wire_transport_events(self: &Arc<Self>) {
        // Remote-opened data channels
        {
            let events = Arc::clone(&self.events);
            self.sctp_transport
                .on_data_channel(Box::new(move |d| {
                    let events = Arc::clone(&events);
                    Box::pin(async move {
                        events.data_channel.emit(d).await;
                    })
                }))
                .await;
        }

        // Trickled local candidates
        {
            let events = Arc::clone(&self.events);
            self.ice_gatherer
                .on_local_candidate(Box::new(move |candidate| {
                    let events = Arc::clone(&events);
                    Box::pin(async move {
                        events.ice_candidate.emit(candidate).await;
                    })
                }))
                .await;
        }

        // Gathering state
        {
            let events = Arc::clone(&self.events);
            self.ice_gatherer
                .on_state_change(Box::new(move |state| {
                    let events = Arc::clone(&events);
                    let gathering_state = match state {
                        RTCIceGathererState::Gathering => RTCIceGatheringState::Gathering,
                        RTCIceGathererState::Complete => RTCIceGatheringState::Complete,
                        _ => RTCIceGatheringState::New,
                    };
                    Box::pin(async move {
                        events
                            .ice_gathering_state_change
                            .emit(gathering_state)
                            .await;
                    })
                }))
                .await;
        }

        // ICE connection state feeds the connection-state machine; the
        // ice event always precedes the connection event it causes.
        {
            let events = Arc::clone(&self.events);
            let ice_connection_state = Arc::clone(&self.ice_connection_state);
            let peer_connection_state = Arc::clone(&self.peer_connection_state);
            let is_closed = Arc::clone(&self.is_closed);
            let dtls_state = Arc::clone(&self.dtls_transport.state);
            self.ice_transport
                .on_connection_state_change(Box::new(move |state| {
                    let events = Arc::clone(&events);
                    let ice_connection_state = Arc::clone(&ice_connection_state);
                    let peer_connection_state = Arc::clone(&peer_connection_state);
                    let is_closed = Arc::clone(&is_closed);
                    let dtls_state = Arc::clone(&dtls_state);
                    Box::pin(async move {
                        ice_connection_state.store(state as u8, Ordering::SeqCst);
                        log::info!("ICE connection state changed: {state}");
                        events.ice_connection_state_change.emit(state).await;

                        PeerConnectionInternal::update_connection_state(
                            &events,
                            &is_closed,
                            &peer_connection_state,
                            state,
                            dtls_state.load(Ordering::SeqCst).into(),
                        )
                        .await;
                    })
                }))
                .await;
        }

        // DTLS state: close_notify from the peer cascades into a close
        // of the secured transports; failures surface as `failed`.
        {
            let weak = Arc::downgrade(self);
            self.dtls_transport
                .on_state_change(Box::new(move |state| {
                    let weak: Weak<PeerConnectionInternal> = weak.clone();
                    Box::pin(async move {
                        let Some(pc) = weak.upgrade() else { return };
                        log::info!("DTLS transport state changed: {state}");

                        if state == RTCDtlsTransportState::Closed
                            && !pc.is_closed.load(Ordering::SeqCst)
                        {
                            pc.handle_remote_close().await;
                            return;
                        }

                        PeerConnectionInternal::update_connection_state(
                            &pc.events,
                            &pc.is_closed,
                            &pc.peer_connection_state,
                            pc.ice_connection_state.load(Ordering::SeqCst).into(),
                            state,
                        )
                        .await;
                    })
                }))
                .await;
        }
    }

    /// The peer closed the secured transports underneath us (DTLS
    /// close_notify or socket teardown): SCTP goes down, ICE goes down,
    /// the connection ends in `closed`.
    pub(super) async fn handle_remote_close(&self) {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_negotiation_debounce();

        self.signaling_state
            .store(RTCSignalingState::Closed as u8, Ordering::SeqCst);

        if let Err(err) = self.sctp_transport.stop().await {
            log::warn!("failed to stop SCTP transport on remote close: {err}");
        }
        if let Err(err) = self.ice_transport.stop().await {
            log::warn!("failed to stop ICE transport on remote close: {err}");
        }

        PeerConnectionInternal::update_connection_state(
            &self.events,
            &self.is_closed,
            &self.peer_connection_state,
            self.ice_connection_state.load(Ordering::SeqCst).into(),
            self.dtls_transport.state(),
        )
        .await;

        self.events.clear().await;
    }

    /// Maps the transport states onto the connection state, emitting
    /// connectionstatechange when the aggregate moved.
    pub(super) async fn update_connection_state(
        events: &Arc<EventHandlers>,
        is_closed: &Arc<AtomicBool>,
        peer_connection_state: &Arc<AtomicU8>,
        ice_connection_state: RTCIceConnectionState,
        dtls_transport_state: RTCDtlsTransportState,
    ) {
        let ice_up = ice_connection_state == RTCIceConnectionState::Connected
            || ice_connection_state == RTCIceConnectionState::Completed;

        let connection_state = if is_closed.load(Ordering::SeqCst) {
            RTCPeerConnectionState::Closed
        } else if ice_connection_state == RTCIceConnectionState::Failed
            || dtls_transport_state == RTCDtlsTransportState::Failed
        {
            RTCPeerConnectionState::Failed
        } else if ice_connection_state == RTCIceConnectionState::Disconnected {
            RTCPeerConnectionState::Disconnected
        } else if ice_up && dtls_transport_state == RTCDtlsTransportState::Connected {
            RTCPeerConnectionState::Connected
        } else if ice_up && dtls_transport_state == RTCDtlsTransportState::Connecting {
            RTCPeerConnectionState::Connecting
        } else {
            RTCPeerConnectionState::New
        };

        if peer_connection_state.load(Ordering::SeqCst) == connection_state as u8 {
            return;
        }

        log::info!("peer connection state changed: {connection_state}");
        peer_connection_state.store(connection_state as u8, Ordering::SeqCst);

        events.connection_state_change.emit(connection_state).await;
    }

    pub(super) fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state.load(Ordering::SeqCst).into()
    }

    pub(super) fn ice_gathering_state(&self) -> RTCIceGatheringState {
        match self.ice_gatherer.state() {
            RTCIceGathererState::New => RTCIceGatheringState::New,
            RTCIceGathererState::Gathering => RTCIceGatheringState::Gathering,
            _ => RTCIceGatheringState::Complete,
        }
    }

    pub(super) async fn remote_description(&self) -> Option<RTCSessionDescription> {
        let pending_remote_description = self.pending_remote_description.lock().await;
        if pending_remote_description.is_some() {
            pending_remote_description.clone()
        } else {
            let current_remote_description = self.current_remote_description.lock().await;
            current_remote_description.clone()
        }
    }

    pub(super) async fn set_gather_complete_handler(
        &self,
        f: crate::ice_transport::ice_gatherer::OnGatheringCompleteHdlrFn,
    ) {
        self.ice_gatherer.on_gathering_complete(f).await;
    }

    /// Arms (or re-arms) the renegotiation debounce: the event fires
    /// after the quiescence window passed with no further mutation, the
    /// signaling state is stable and the connection is still open.
    pub(super) fn trigger_negotiation_needed(self: &Arc<Self>) {
        if self.is_closed.load(Ordering::SeqCst) {
            return;
        }
        self.is_negotiation_needed.store(true, Ordering::SeqCst);

        let generation = self.negotiation_debounce_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let debounce = self.setting_engine.timeout.negotiation_needed_debounce;
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;

            let Some(pc) = weak.upgrade() else { return };
            if pc.negotiation_debounce_gen.load(Ordering::SeqCst) != generation {
                // A later mutation rescheduled the window.
                return;
            }
            if pc.is_closed.load(Ordering::SeqCst) {
                return;
            }
            if pc.signaling_state() != RTCSignalingState::Stable {
                // Suppressed; set_description re-arms on return to stable.
                return;
            }
            if pc.events.negotiation_needed.is_empty().await {
                return;
            }
            if !pc.is_negotiation_needed.swap(false, Ordering::SeqCst) {
                return;
            }

            pc.events.negotiation_needed.emit(()).await;
        });
    }

    /// Invalidates any armed debounce window.
    pub(super) fn cancel_negotiation_debounce(&self) {
        self.negotiation_debounce_gen.fetch_add(1, Ordering::SeqCst);
    }

    /// Brings ICE then DTLS up; runs on the operations queue because the
    /// connectivity checks and the handshake both block.
    pub(super) async fn start_transports(
        self: &Arc<Self>,
        ice_role: RTCIceRole,
        dtls_role: DTLSRole,
        remote_ufrag: String,
        remote_pwd: String,
        fingerprint: RTCDtlsFingerprint,
    ) {
        if let Err(err) = self
            .ice_transport
            .start(
                &RTCIceParameters {
                    username_fragment: remote_ufrag,
                    password: remote_pwd,
                    ice_lite: false,
                },
                Some(ice_role),
            )
            .await
        {
            log::warn!("Failed to start ice transport: {err}");
            return;
        }

        let result = self
            .dtls_transport
            .start(DTLSParameters {
                role: dtls_role,
                fingerprints: vec![fingerprint],
            })
            .await;

        PeerConnectionInternal::update_connection_state(
            &self.events,
            &self.is_closed,
            &self.peer_connection_state,
            self.ice_connection_state.load(Ordering::SeqCst).into(),
            self.dtls_transport.state(),
        )
        .await;

        if let Err(err) = result {
            log::warn!("Failed to start dtls transport: {err}");
        }
    }

    /// Starts SCTP over the established DTLS stream and flushes every
    /// channel created before the transport existed.
    pub(super) async fn start_sctp(&self) {
        if self.dtls_transport.state() != RTCDtlsTransportState::Connected {
            log::warn!("not starting SCTP, DTLS is not established");
            return;
        }

        let capabilities = {
            let remote_application_info = self.remote_application_info.lock().await;
            SCTPTransportCapabilities {
                max_message_size: remote_application_info
                    .as_ref()
                    .and_then(|info| info.max_message_size)
                    .unwrap_or(0),
            }
        };

        if let Err(err) = self.sctp_transport.start(capabilities).await {
            log::warn!("Failed to start SCTP: {err}");
            if let Err(err) = self.sctp_transport.stop().await {
                log::warn!("Failed to stop SCTPTransport: {err}");
            }
        }
    }

    /// Builds an SDP that doesn't take remote state into account; used
    /// for the initial create_offer.
    pub(super) async fn generate_unmatched_sdp(
        &self,
        use_feedback_profile: bool,
        exclude_ice_candidates: bool,
    ) -> Result<SessionDescription> {
        let d = SessionDescription::new_jsep_session_description(false);

        let ice_params = self.ice_gatherer.get_local_parameters().await?;
        let fingerprints = self.dtls_transport.certificates[0].get_fingerprints()?;

        let mut media_sections = vec![];
        {
            let media_tracks = self.media_tracks.lock().await;
            let mut track_mids = self.track_mids.lock().await;
            for track in media_tracks.iter() {
                let mid = match track_mids.get(&track.id) {
                    Some(mid) => mid.clone(),
                    None => {
                        let mid =
                            (self.greater_mid.fetch_add(1, Ordering::SeqCst) + 1).to_string();
                        track_mids.insert(track.id.clone(), mid.clone());
                        mid
                    }
                };

                media_sections.push(MediaSection {
                    id: mid,
                    kind: track.kind,
                    direction: track.direction,
                    codecs: codecs_for_track(&self.media_engine, track),
                    extmaps: self.media_engine.header_extensions_for(track.kind),
                    track: Some(track.clone()),
                    data: false,
                });
            }
        }

        if self.has_data_channels().await {
            let mid = (self.greater_mid.fetch_add(1, Ordering::SeqCst) + 1).to_string();
            media_sections.push(MediaSection {
                id: mid,
                kind: MediaKind::Unspecified,
                direction: RTCRtpTransceiverDirection::Unspecified,
                codecs: vec![],
                extmaps: vec![],
                track: None,
                data: true,
            });
        }

        let candidates = if exclude_ice_candidates {
            vec![]
        } else {
            self.ice_gatherer
                .get_local_candidates()
                .await
                .unwrap_or_default()
        };

        populate_sdp(
            d,
            &fingerprints,
            &ice_params,
            &media_sections,
            PopulateSdpParams {
                connection_role: ConnectionRole::Actpass,
                ice_gathering_state: self.ice_gathering_state(),
                candidates,
                sctp_port: DEFAULT_SCTP_PORT,
                max_message_size: self.sctp_transport.max_message_size(),
                use_feedback_profile,
            },
        )
    }

    /// Builds an SDP aligned section-by-section with the remote
    /// description: same mids, same m-line order, intersected codecs,
    /// remote extmap ids. `include_unmatched` appends local sections
    /// the remote has not seen yet (renegotiation offers).
    pub(super) async fn generate_matched_sdp(
        &self,
        remote_description: &SessionDescription,
        include_unmatched: bool,
        connection_role: ConnectionRole,
        use_feedback_profile: bool,
        exclude_ice_candidates: bool,
    ) -> Result<SessionDescription> {
        let d = SessionDescription::new_jsep_session_description(false);

        let ice_params = self.ice_gatherer.get_local_parameters().await?;
        let fingerprints = self.dtls_transport.certificates[0].get_fingerprints()?;

        let mut media_sections = vec![];
        let mut matched_track_ids = vec![];

        {
            let media_tracks = self.media_tracks.lock().await;
            let mut track_mids = self.track_mids.lock().await;

            for media in &remote_description.media_descriptions {
                let mid_value = get_mid_value(media)
                    .ok_or(Error::ErrPeerConnRemoteDescriptionWithoutMidValue)?
                    .to_owned();

                if media.media_name.media == MEDIA_SECTION_APPLICATION {
                    media_sections.push(MediaSection {
                        id: mid_value,
                        kind: MediaKind::Unspecified,
                        direction: RTCRtpTransceiverDirection::Unspecified,
                        codecs: vec![],
                        extmaps: vec![],
                        track: None,
                        data: true,
                    });
                    continue;
                }

                let kind = MediaKind::from(media.media_name.media.as_str());
                if kind == MediaKind::Unspecified {
                    continue;
                }

                let remote_direction = get_peer_direction(media);
                let local_track = {
                    // Prefer the track already negotiated under this mid,
                    // then any unmatched track of the right kind.
                    media_tracks
                        .iter()
                        .find(|t| track_mids.get(&t.id) == Some(&mid_value))
                        .or_else(|| {
                            media_tracks.iter().find(|t| {
                                t.kind == kind
                                    && !track_mids.contains_key(&t.id)
                                    && !matched_track_ids.contains(&t.id)
                            })
                        })
                        .cloned()
                };

                if let Some(track) = &local_track {
                    track_mids.insert(track.id.clone(), mid_value.clone());
                    matched_track_ids.push(track.id.clone());
                }

                let remote_codecs = codecs_from_media_description(media)?;
                let codecs = self.media_engine.intersect_codecs(kind, &remote_codecs);

                // Echo back the ids the remote advertised for the
                // extensions we also support.
                let our_uris: Vec<String> = self
                    .media_engine
                    .header_extensions_for(kind)
                    .into_iter()
                    .map(|ext| ext.uri)
                    .collect();
                let extmaps = extmaps_from_media_description(media)
                    .into_iter()
                    .filter(|ext| our_uris.contains(&ext.uri))
                    .collect();

                media_sections.push(MediaSection {
                    id: mid_value,
                    kind,
                    direction: answer_direction(remote_direction, local_track.is_some()),
                    codecs,
                    extmaps,
                    track: local_track,
                    data: false,
                });
            }

            if include_unmatched {
                for track in media_tracks.iter() {
                    if track_mids.contains_key(&track.id) {
                        continue;
                    }
                    let mid = (self.greater_mid.fetch_add(1, Ordering::SeqCst) + 1).to_string();
                    track_mids.insert(track.id.clone(), mid.clone());
                    media_sections.push(MediaSection {
                        id: mid,
                        kind: track.kind,
                        direction: track.direction,
                        codecs: codecs_for_track(&self.media_engine, track),
                        extmaps: self.media_engine.header_extensions_for(track.kind),
                        track: Some(track.clone()),
                        data: false,
                    });
                }
            }
        }

        if include_unmatched
            && self.has_data_channels().await
            && !media_sections.iter().any(|section| section.data)
        {
            let mid = (self.greater_mid.fetch_add(1, Ordering::SeqCst) + 1).to_string();
            media_sections.push(MediaSection {
                id: mid,
                kind: MediaKind::Unspecified,
                direction: RTCRtpTransceiverDirection::Unspecified,
                codecs: vec![],
                extmaps: vec![],
                track: None,
                data: true,
            });
        }

        let candidates = if exclude_ice_candidates {
            vec![]
        } else {
            self.ice_gatherer
                .get_local_candidates()
                .await
                .unwrap_or_default()
        };

        populate_sdp(
            d,
            &fingerprints,
            &ice_params,
            &media_sections,
            PopulateSdpParams {
                connection_role,
                ice_gathering_state: self.ice_gathering_state(),
                candidates,
                sctp_port: DEFAULT_SCTP_PORT,
                max_message_size: self.sctp_transport.max_message_size(),
                use_feedback_profile,
            },
        )
    }

    pub(super) async fn has_data_channels(&self) -> bool {
        let registry = self.sctp_transport.registry.lock().await;
        !registry.all().is_empty()
    }
}

/// The direction of an answer section given the offered direction and
/// whether a local track feeds it.
fn answer_direction(
    remote: RTCRtpTransceiverDirection,
    have_track: bool,
) -> RTCRtpTransceiverDirection {
    match remote {
        RTCRtpTransceiverDirection::Sendrecv => {
            if have_track {
                RTCRtpTransceiverDirection::Sendrecv
            } else {
                RTCRtpTransceiverDirection::Recvonly
            }
        }
        RTCRtpTransceiverDirection::Sendonly => RTCRtpTransceiverDirection::Recvonly,
        RTCRtpTransceiverDirection::Recvonly => {
            if have_track {
                RTCRtpTransceiverDirection::Sendonly
            } else {
                RTCRtpTransceiverDirection::Inactive
            }
        }
        _ => RTCRtpTransceiverDirection::Inactive,
    }
}
