
pub mod dtls_engine;
pub mod dtls_fingerprint;
pub mod dtls_parameters;
pub mod dtls_role;
pub mod dtls_transport_state;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use tokio::sync::Mutex;
use util::Conn;

use crate::api::setting_engine::SettingEngine;
use crate::dtls_transport::dtls_engine::{
    DtlsEngine, DtlsEngineConfig, DtlsEngineSession, SrtpKeyingMaterial, SrtpProtectionProfile,
};
use crate::dtls_transport::dtls_parameters::DTLSParameters;
use crate::dtls_transport::dtls_role::{DTLSRole, DEFAULT_DTLS_ROLE_ANSWER};
use crate::dtls_transport::dtls_transport_state::RTCDtlsTransportState;
use crate::error::{Error, Result};
use crate::ice_transport::ice_role::RTCIceRole;
use crate::ice_transport::RTCIceTransport;
use crate::mux::endpoint::Endpoint;
use crate::mux::mux_func::{match_dtls, match_srtcp, match_srtp};
use crate::peer_connection::certificate::RTCCertificate;
use crate::track::MediaSink;
use crate::RECEIVE_MTU;

pub type OnDtlsStateChangeHdlrFn = Box<
    dyn (FnMut(RTCDtlsTransportState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub(crate) fn default_srtp_protection_profiles() -> Vec<SrtpProtectionProfile> {
    vec![
        SrtpProtectionProfile::AeadAes128Gcm,
        SrtpProtectionProfile::Aes128CmHmacSha1_80,
    ]
}

/// RTCDtlsTransport runs the handshake over the nominated ICE path,
/// binds the peer certificate to the fingerprint advertised in SDP and
/// hands the secured stream to SCTP and the SRTP keys to the media
/// stack.
pub struct RTCDtlsTransport {
    pub(crate) ice_transport: Arc<RTCIceTransport>,
    pub(crate) certificates: Vec<RTCCertificate>,
    pub(crate) engine: Arc<dyn DtlsEngine + Send + Sync>,
    pub(crate) setting_engine: Arc<SettingEngine>,

    pub(crate) remote_parameters: Mutex<DTLSParameters>,
    pub(crate) remote_certificate: Mutex<Bytes>,
    pub(crate) state: Arc<AtomicU8>, // RTCDtlsTransportState
    pub(crate) srtp_protection_profile: Mutex<SrtpProtectionProfile>,
    pub(crate) on_state_change_handler: Arc<Mutex<Option<OnDtlsStateChangeHdlrFn>>>,

    pub(crate) session: Mutex<Option<Arc<dyn DtlsEngineSession + Send + Sync>>>,
    pub(crate) srtp_keying_material: Mutex<Option<SrtpKeyingMaterial>>,

    pub(crate) srtp_endpoint: Mutex<Option<Arc<Endpoint>>>,
    pub(crate) srtcp_endpoint: Mutex<Option<Arc<Endpoint>>>,
    pub(crate) media_sink: Arc<ArcSwapOption<Box<dyn MediaSink + Send + Sync>>>,
}

impl RTCDtlsTransport {
    pub(crate) fn new(
        ice_transport: Arc<RTCIceTransport>,
        certificates: Vec<RTCCertificate>,
        engine: Arc<dyn DtlsEngine + Send + Sync>,
        setting_engine: Arc<SettingEngine>,
    ) -> Self {
        RTCDtlsTransport {
            ice_transport,
            certificates,
            engine,
            setting_engine,
            remote_parameters: Mutex::new(Default::default()),
            remote_certificate: Mutex::new(Bytes::new()),
            state: Arc::new(AtomicU8::new(RTCDtlsTransportState::New as u8)),
            srtp_protection_profile: Mutex::new(Default::default()),
            on_state_change_handler: Arc::new(Default::default()),
            session: Mutex::new(None),
            srtp_keying_material: Mutex::new(None),
            srtp_endpoint: Mutex::new(None),
            srtcp_endpoint: Mutex::new(None),
            media_sink: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Returns the RTCIceTransport this DTLS transport runs over.
    pub fn ice_transport(&self) -> &RTCIceTransport {
        &self.ice_transport
    }

    pub(crate) async fn state_change(&self, state: RTCDtlsTransportState) {
        self.state.store(state as u8, Ordering::SeqCst);
        let mut handler = self.on_state_change_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(state).await;
        }
    }

    /// Sets a handler that is fired when the DTLS connection state changes.
    pub async fn on_state_change(&self, f: OnDtlsStateChangeHdlrFn) {
        let mut on_state_change_handler = self.on_state_change_handler.lock().await;
        *on_state_change_handler = Some(f);
    }

    /// Returns the current DTLS transport state.
    pub fn state(&self) -> RTCDtlsTransportState {
        self.state.load(Ordering::SeqCst).into()
    }

    /// Registers the sink receiving demultiplexed (still protected)
    /// SRTP/SRTCP packets together with the exported keying material.
    pub fn set_media_sink(&self, sink: Box<dyn MediaSink + Send + Sync>) {
        self.media_sink.store(Some(Arc::new(sink)));
    }

    /// Returns the certificate chain in use by the remote side.
    /// Empty prior to selection of the remote certificate.
    pub async fn get_remote_certificate(&self) -> Bytes {
        let remote_certificate = self.remote_certificate.lock().await;
        remote_certificate.clone()
    }

    /// Key material exported once the handshake completed; None before.
    pub async fn srtp_keying_material(&self) -> Option<SrtpKeyingMaterial> {
        let srtp_keying_material = self.srtp_keying_material.lock().await;
        srtp_keying_material.clone()
    }

    /// The application-data stream of the established session.
    pub(crate) async fn conn(&self) -> Option<Arc<dyn Conn + Send + Sync>> {
        let session = self.session.lock().await;
        session.as_ref().map(|s| s.conn())
    }

    /// Resolves the local DTLS role against the remote's explicit role,
    /// the setting-engine override and finally the ICE role.
    pub(crate) async fn role(&self) -> DTLSRole {
        // If remote has an explicit role use the inverse
        {
            let remote_parameters = self.remote_parameters.lock().await;
            match remote_parameters.role {
                DTLSRole::Client => return DTLSRole::Server,
                DTLSRole::Server => return DTLSRole::Client,
                _ => {}
            };
        }

        // If SettingEngine has an explicit role
        match self.setting_engine.answering_dtls_role {
            DTLSRole::Server => return DTLSRole::Server,
            DTLSRole::Client => return DTLSRole::Client,
            _ => {}
        };

        // Remote was auto and no explicit role was configured
        if self.ice_transport.role().await == RTCIceRole::Controlling {
            return DTLSRole::Server;
        }

        DEFAULT_DTLS_ROLE_ANSWER
    }

    async fn prepare_transport(
        &self,
        remote_parameters: DTLSParameters,
    ) -> Result<(DTLSRole, DtlsEngineConfig)> {
        self.ensure_ice_conn()?;

        if self.state() != RTCDtlsTransportState::New {
            return Err(Error::ErrInvalidDTLSStart);
        }

        {
            let mut srtp_endpoint = self.srtp_endpoint.lock().await;
            *srtp_endpoint = self.ice_transport.new_endpoint(Box::new(match_srtp)).await;
        }
        {
            let mut srtcp_endpoint = self.srtcp_endpoint.lock().await;
            *srtcp_endpoint = self.ice_transport.new_endpoint(Box::new(match_srtcp)).await;
        }
        {
            let mut rp = self.remote_parameters.lock().await;
            *rp = remote_parameters;
        }

        let certificate = &self.certificates[0];
        self.state_change(RTCDtlsTransportState::Connecting).await;

        let role = self.role().await;
        Ok((
            role,
            DtlsEngineConfig {
                role,
                certificate_der: certificate.der(),
                private_key_der: certificate.private_key_der(),
                extended_master_secret: true,
                srtp_protection_profiles: if !self
                    .setting_engine
                    .srtp_protection_profiles
                    .is_empty()
                {
                    self.setting_engine.srtp_protection_profiles.clone()
                } else {
                    default_srtp_protection_profiles()
                },
            },
        ))
    }

    /// Starts DTLS transport negotiation with the parameters of the
    /// remote DTLS transport. Blocks until the handshake completed or
    /// failed; the caller runs this on the transport bring-up task.
    pub async fn start(&self, remote_parameters: DTLSParameters) -> Result<()> {
        let dtls_endpoint = self
            .ice_transport
            .new_endpoint(Box::new(match_dtls))
            .await
            .ok_or(Error::ErrICEConnectionNotStarted)?;

        let (role, engine_config) = self.prepare_transport(remote_parameters).await?;
        log::trace!("dtls transport connecting as {role}");

        let session = match self
            .engine
            .connect(dtls_endpoint as Arc<dyn Conn + Send + Sync>, engine_config)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                self.state_change(RTCDtlsTransportState::Failed).await;
                return Err(err);
            }
        };

        let srtp_profile = session.selected_srtp_protection_profile();
        if srtp_profile == SrtpProtectionProfile::Unsupported {
            self.state_change(RTCDtlsTransportState::Failed).await;
            return Err(Error::ErrNoSRTPProtectionProfile);
        }
        {
            let mut srtp_protection_profile = self.srtp_protection_profile.lock().await;
            *srtp_protection_profile = srtp_profile;
        }

        if !self
            .setting_engine
            .disable_certificate_fingerprint_verification
        {
            // Check the fingerprint if a certificate was exchanged
            let remote_certs = session.peer_certificate_chain();
            if remote_certs.is_empty() {
                self.state_change(RTCDtlsTransportState::Failed).await;
                return Err(Error::ErrNoRemoteCertificate);
            }

            if let Err(err) = self.validate_fingerprint(&remote_certs[0]).await {
                let _ = session.close().await;
                self.state_change(RTCDtlsTransportState::Failed).await;
                return Err(err);
            }

            {
                let mut remote_certificate = self.remote_certificate.lock().await;
                *remote_certificate = remote_certs[0].clone();
            }
        }

        match session.export_srtp_keying_material() {
            Ok(keying_material) => {
                let mut srtp_keying_material = self.srtp_keying_material.lock().await;
                *srtp_keying_material = Some(keying_material);
            }
            Err(err) => {
                log::warn!("failed to export SRTP keying material: {err}");
            }
        }

        // close_notify tears the secured transports down; any other
        // alert is surfaced in the log and the connection stays up.
        let state = Arc::clone(&self.state);
        let on_state_change_handler = Arc::clone(&self.on_state_change_handler);
        session
            .on_alert(Box::new(move |alert| {
                let state = Arc::clone(&state);
                let on_state_change_handler = Arc::clone(&on_state_change_handler);
                Box::pin(async move {
                    if alert.is_close_notify() {
                        log::info!("dtls: received close_notify from peer");
                        state.store(RTCDtlsTransportState::Closed as u8, Ordering::SeqCst);
                        let mut handler = on_state_change_handler.lock().await;
                        if let Some(f) = &mut *handler {
                            f(RTCDtlsTransportState::Closed).await;
                        }
                    } else {
                        log::warn!("dtls: {alert}");
                    }
                })
            }))
            .await;

        {
            let mut current = self.session.lock().await;
            *current = Some(Arc::clone(&session));
        }
        self.state_change(RTCDtlsTransportState::Connected).await;

        self.start_media_forwarding().await;

        Ok(())
    }

    /// Forwards demultiplexed SRTP/SRTCP to the registered media sink.
    /// Decryption belongs to the external RTP stack, keyed by
    /// srtp_keying_material.
    async fn start_media_forwarding(&self) {
        let srtp_endpoint = {
            let srtp_endpoint = self.srtp_endpoint.lock().await;
            srtp_endpoint.clone()
        };
        let srtcp_endpoint = {
            let srtcp_endpoint = self.srtcp_endpoint.lock().await;
            srtcp_endpoint.clone()
        };

        for (endpoint, is_rtcp) in [(srtp_endpoint, false), (srtcp_endpoint, true)] {
            let Some(endpoint) = endpoint else { continue };

            let media_sink = Arc::clone(&self.media_sink);
            tokio::spawn(async move {
                let mut buf = vec![0u8; RECEIVE_MTU];
                while let Ok(n) = endpoint.recv(&mut buf).await {
                    let sink = media_sink.load_full();
                    if let Some(sink) = sink {
                        let packet = Bytes::copy_from_slice(&buf[..n]);
                        if is_rtcp {
                            sink.deliver_rtcp(packet).await;
                        } else {
                            sink.deliver_rtp(packet).await;
                        }
                    }
                }
            });
        }
    }

    /// Stops and closes the RTCDtlsTransport object.
    pub async fn stop(&self) -> Result<()> {
        let session = {
            let mut session = self.session.lock().await;
            session.take()
        };

        let result = if let Some(session) = session {
            session.close().await
        } else {
            Ok(())
        };

        self.state_change(RTCDtlsTransportState::Closed).await;
        result
    }

    pub(crate) async fn validate_fingerprint(&self, remote_cert: &[u8]) -> Result<()> {
        let remote_parameters = self.remote_parameters.lock().await;
        for fp in &remote_parameters.fingerprints {
            if fp.matches_certificate(remote_cert)? {
                return Ok(());
            }
        }

        Err(Error::ErrDtlsFingerprintMismatch)
    }

    pub(crate) fn ensure_ice_conn(&self) -> Result<()> {
        use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
        if self.ice_transport.state() == RTCIceConnectionState::New {
            Err(Error::ErrICEConnectionNotStarted)
        } else {
            Ok(())
        }
    }
}
