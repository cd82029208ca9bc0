use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use util::Conn;

use crate::dtls_transport::dtls_role::DTLSRole;
use crate::error::Result;

/// SRTP protection profiles negotiated through the use_srtp extension.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SrtpProtectionProfile {
    #[default]
    Unsupported,
    Aes128CmHmacSha1_80,
    AeadAes128Gcm,
}

/// Key material exported from the handshake for SRTP/SRTCP protection,
/// already split into the per-direction keys and salts.
#[derive(Default, Debug, Clone)]
pub struct SrtpKeyingMaterial {
    pub profile: SrtpProtectionProfile,
    pub local_key: Bytes,
    pub local_salt: Bytes,
    pub remote_key: Bytes,
    pub remote_salt: Bytes,
}

/// TLS alert severity as carried by on_alert.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtlsAlertLevel {
    Warning,
    Fatal,
}

/// A TLS alert received from the peer.
#[derive(Debug, Clone)]
pub struct DtlsAlert {
    pub level: DtlsAlertLevel,
    pub description: u8,
    pub message: String,
}

impl DtlsAlert {
    pub fn is_close_notify(&self) -> bool {
        self.description == 0
    }
}

impl fmt::Display for DtlsAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert({:?}, {}): {}", self.level, self.description, self.message)
    }
}

pub type OnDtlsAlertHdlrFn =
    Box<dyn (FnMut(DtlsAlert) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// Everything the engine needs to run a handshake.
#[derive(Default, Clone)]
pub struct DtlsEngineConfig {
    /// Client or Server; Auto must be resolved by the driver before
    /// the engine is started.
    pub role: DTLSRole,
    /// Local leaf certificate, DER.
    pub certificate_der: Bytes,
    /// Matching PKCS#8 private key, DER.
    pub private_key_der: Bytes,
    /// Negotiate the extended master secret extension (RFC 7627).
    pub extended_master_secret: bool,
    pub srtp_protection_profiles: Vec<SrtpProtectionProfile>,
}

/// DtlsEngine is the record-layer collaborator. Ciphertext flows over
/// the `Conn` handed to connect (a demultiplexer endpoint); the engine
/// performs the handshake in the configured role and hands back a
/// session carrying the peer identity and keying material.
#[async_trait]
pub trait DtlsEngine: Send + Sync {
    /// Runs the handshake to completion. Blocking; the driver is
    /// expected to call this from the transport bring-up task.
    async fn connect(
        &self,
        conn: Arc<dyn Conn + Send + Sync>,
        config: DtlsEngineConfig,
    ) -> Result<Arc<dyn DtlsEngineSession + Send + Sync>>;
}

/// An established DTLS session.
#[async_trait]
pub trait DtlsEngineSession: Send + Sync {
    /// The certificate chain presented by the peer during the
    /// handshake, DER encoded, leaf first.
    fn peer_certificate_chain(&self) -> Vec<Bytes>;

    fn selected_srtp_protection_profile(&self) -> SrtpProtectionProfile;

    /// Exports RFC 5764 key material for SRTP/SRTCP.
    fn export_srtp_keying_material(&self) -> Result<SrtpKeyingMaterial>;

    /// Application-data stream over the session; SCTP runs on this.
    fn conn(&self) -> Arc<dyn Conn + Send + Sync>;

    async fn on_alert(&self, f: OnDtlsAlertHdlrFn);

    async fn close(&self) -> Result<()>;
}
