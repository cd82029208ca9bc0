
pub mod media_engine;
pub mod setting_engine;

use std::sync::Arc;
use std::time::SystemTime;

use media_engine::MediaEngine;
use rcgen::KeyPair;
use setting_engine::SettingEngine;

use crate::dtls_transport::dtls_engine::DtlsEngine;
use crate::dtls_transport::RTCDtlsTransport;
use crate::error::{Error, Result};
use crate::ice_transport::ice_agent::IceAgentFactory;
use crate::ice_transport::ice_gatherer::{RTCIceGatherOptions, RTCIceGatherer};
use crate::ice_transport::RTCIceTransport;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::RTCPeerConnection;
use crate::sctp_transport::sctp_engine::SctpEngine;
use crate::sctp_transport::RTCSctpTransport;

/// API bundles the engines and per-process settings a peer connection
/// is built from. Construct it once per configuration with APIBuilder
/// and mint peer connections from it.
pub struct API {
    pub(crate) setting_engine: Arc<SettingEngine>,
    pub(crate) media_engine: Arc<MediaEngine>,
    pub(crate) ice_agent_factory: Option<Arc<dyn IceAgentFactory>>,
    pub(crate) dtls_engine: Option<Arc<dyn DtlsEngine + Send + Sync>>,
    pub(crate) sctp_engine: Option<Arc<dyn SctpEngine + Send + Sync>>,
}

impl API {
    /// Creates a new RTCPeerConnection with the provided configuration
    /// against the received API object.
    pub async fn new_peer_connection(
        &self,
        configuration: RTCConfiguration,
    ) -> Result<Arc<RTCPeerConnection>> {
        RTCPeerConnection::new(self, configuration).await
    }

    pub(crate) fn ice_agent_factory(&self) -> Result<Arc<dyn IceAgentFactory>> {
        self.ice_agent_factory
            .clone()
            .ok_or(Error::ErrMissingIceAgentFactory)
    }

    pub(crate) fn dtls_engine(&self) -> Result<Arc<dyn DtlsEngine + Send + Sync>> {
        self.dtls_engine.clone().ok_or(Error::ErrMissingDtlsEngine)
    }

    pub(crate) fn sctp_engine(&self) -> Result<Arc<dyn SctpEngine + Send + Sync>> {
        self.sctp_engine.clone().ok_or(Error::ErrMissingSctpEngine)
    }

    /// Creates a new ice gatherer. Part of the ORTC-flavoured API; the
    /// basic WebRTC API wires this up internally.
    pub fn new_ice_gatherer(&self, opts: RTCIceGatherOptions) -> Result<RTCIceGatherer> {
        let mut validated_servers = vec![];
        if !opts.ice_servers.is_empty() {
            for server in &opts.ice_servers {
                server.validate()?;
                validated_servers.push(server.clone());
            }
        }

        Ok(RTCIceGatherer::new(
            validated_servers,
            opts.ice_gather_policy,
            Arc::clone(&self.setting_engine),
            self.ice_agent_factory()?,
        ))
    }

    /// Creates a new ice transport over a gatherer.
    pub fn new_ice_transport(&self, gatherer: Arc<RTCIceGatherer>) -> RTCIceTransport {
        RTCIceTransport::new(gatherer)
    }

    /// Creates a new DTLS transport over an ICE transport.
    pub fn new_dtls_transport(
        &self,
        ice_transport: Arc<RTCIceTransport>,
        mut certificates: Vec<RTCCertificate>,
    ) -> Result<RTCDtlsTransport> {
        if !certificates.is_empty() {
            let now = SystemTime::now();
            for cert in &certificates {
                cert.expires()
                    .duration_since(now)
                    .map_err(|_| Error::ErrCertificateExpired)?;
            }
        } else {
            let kp = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
            let cert = RTCCertificate::from_key_pair(kp)?;
            certificates = vec![cert];
        };

        Ok(RTCDtlsTransport::new(
            ice_transport,
            certificates,
            self.dtls_engine()?,
            Arc::clone(&self.setting_engine),
        ))
    }

    /// Creates a new SCTP transport over a DTLS transport.
    pub fn new_sctp_transport(
        &self,
        dtls_transport: Arc<RTCDtlsTransport>,
    ) -> Result<RTCSctpTransport> {
        Ok(RTCSctpTransport::new(
            dtls_transport,
            self.sctp_engine()?,
            Arc::clone(&self.setting_engine),
        ))
    }
}

/// APIBuilder provides an interface for defining the engines a peer
/// connection runs on top of.
#[derive(Default)]
pub struct APIBuilder {
    setting_engine: Option<Arc<SettingEngine>>,
    media_engine: Option<Arc<MediaEngine>>,
    ice_agent_factory: Option<Arc<dyn IceAgentFactory>>,
    dtls_engine: Option<Arc<dyn DtlsEngine + Send + Sync>>,
    sctp_engine: Option<Arc<dyn SctpEngine + Send + Sync>>,
}

impl APIBuilder {
    pub fn new() -> Self {
        APIBuilder::default()
    }

    pub fn build(self) -> API {
        API {
            setting_engine: self
                .setting_engine
                .unwrap_or_else(|| Arc::new(SettingEngine::default())),
            media_engine: self
                .media_engine
                .unwrap_or_else(|| Arc::new(MediaEngine::default())),
            ice_agent_factory: self.ice_agent_factory,
            dtls_engine: self.dtls_engine,
            sctp_engine: self.sctp_engine,
        }
    }

    /// Allows providing a SettingEngine to the API. Settings should not
    /// be changed after passing the engine to an API.
    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.setting_engine = Some(Arc::new(setting_engine));
        self
    }

    /// Allows providing a MediaEngine to the API. After this the codecs
    /// are no longer modifiable.
    pub fn with_media_engine(mut self, media_engine: MediaEngine) -> Self {
        self.media_engine = Some(Arc::new(media_engine));
        self
    }

    /// Supplies the candidate-gathering/connectivity collaborator.
    pub fn with_ice_agent_factory(mut self, factory: Arc<dyn IceAgentFactory>) -> Self {
        self.ice_agent_factory = Some(factory);
        self
    }

    /// Supplies the DTLS record-layer collaborator.
    pub fn with_dtls_engine(mut self, engine: Arc<dyn DtlsEngine + Send + Sync>) -> Self {
        self.dtls_engine = Some(engine);
        self
    }

    /// Supplies the SCTP collaborator.
    pub fn with_sctp_engine(mut self, engine: Arc<dyn SctpEngine + Send + Sync>) -> Self {
        self.sctp_engine = Some(engine);
        self
    }
}
