use std::time::Duration;

use crate::dtls_transport::dtls_engine::SrtpProtectionProfile;
use crate::dtls_transport::dtls_role::DTLSRole;
use crate::error::{Error, Result};

/// Default wait for gathering to have produced something usable before
/// create_offer/create_answer return.
pub(crate) const DEFAULT_ICE_GATHER_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on active SCTP association bring-up.
pub(crate) const DEFAULT_SCTP_ASSOCIATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default quiescence window before onnegotiationneeded fires.
pub(crate) const DEFAULT_NEGOTIATION_NEEDED_DEBOUNCE: Duration = Duration::from_millis(100);

const DEFAULT_RECEIVE_MTU: usize = 8192;
const DEFAULT_SCTP_MAX_RECEIVE_BUFFER_SIZE: u32 = 1024 * 1024;

#[derive(Clone)]
pub struct Timeout {
    /// How long create_offer/create_answer wait for gathering initiation.
    pub ice_gather_timeout: Duration,
    /// Bound on the active SCTP association attempt.
    pub sctp_associate_timeout: Duration,
    /// Quiescence window for the renegotiation debounce.
    pub negotiation_needed_debounce: Duration,
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout {
            ice_gather_timeout: DEFAULT_ICE_GATHER_TIMEOUT,
            sctp_associate_timeout: DEFAULT_SCTP_ASSOCIATE_TIMEOUT,
            negotiation_needed_debounce: DEFAULT_NEGOTIATION_NEEDED_DEBOUNCE,
        }
    }
}

#[derive(Default, Clone)]
pub struct Candidates {
    pub ice_lite: bool,
    /// Fixed credentials; empty lets the agent generate per-session ones.
    pub username_fragment: String,
    pub password: String,
}

/// SettingEngine allows influencing behavior in ways that are not
/// supported by the WebRTC API. This allows us to support additional
/// use-cases without deviating from the WebRTC API elsewhere.
#[derive(Default, Clone)]
pub struct SettingEngine {
    pub(crate) timeout: Timeout,
    pub(crate) candidates: Candidates,
    pub(crate) answering_dtls_role: DTLSRole,
    pub(crate) disable_certificate_fingerprint_verification: bool,
    pub(crate) srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    pub(crate) receive_mtu: usize,
    pub(crate) sctp_max_receive_buffer_size: u32,
}

impl SettingEngine {
    pub(crate) fn get_receive_mtu(&self) -> usize {
        if self.receive_mtu != 0 {
            self.receive_mtu
        } else {
            DEFAULT_RECEIVE_MTU
        }
    }

    pub(crate) fn get_sctp_max_receive_buffer_size(&self) -> u32 {
        if self.sctp_max_receive_buffer_size != 0 {
            self.sctp_max_receive_buffer_size
        } else {
            DEFAULT_SCTP_MAX_RECEIVE_BUFFER_SIZE
        }
    }

    /// Sets the role our DTLS transport takes when answering. Auto (the
    /// default) follows RFC 5763 and answers active.
    pub fn set_answering_dtls_role(&mut self, role: DTLSRole) -> Result<()> {
        if role != DTLSRole::Client && role != DTLSRole::Server {
            return Err(Error::new(
                "answering role must be either client or server".to_owned(),
            ));
        }

        self.answering_dtls_role = role;
        Ok(())
    }

    /// Overrides the default SRTP protection profiles offered in the
    /// use_srtp extension.
    pub fn set_srtp_protection_profiles(&mut self, profiles: Vec<SrtpProtectionProfile>) {
        self.srtp_protection_profiles = profiles;
    }

    /// Controls how long create_offer and create_answer block waiting
    /// for candidate gathering to have started.
    pub fn set_ice_gather_timeout(&mut self, t: Duration) {
        self.timeout.ice_gather_timeout = t;
    }

    /// Bounds the active SCTP association bring-up.
    pub fn set_sctp_associate_timeout(&mut self, t: Duration) {
        self.timeout.sctp_associate_timeout = t;
    }

    /// Adjusts the quiescence window before onnegotiationneeded fires.
    pub fn set_negotiation_needed_debounce(&mut self, t: Duration) {
        self.timeout.negotiation_needed_debounce = t;
    }

    /// Sets fixed ICE credentials instead of per-session random ones.
    pub fn set_ice_credentials(&mut self, username_fragment: String, password: String) {
        self.candidates.username_fragment = username_fragment;
        self.candidates.password = password;
    }

    /// Advertises ice-lite; the full-implementation peer then controls.
    pub fn set_lite(&mut self, lite: bool) {
        self.candidates.ice_lite = lite;
    }

    /// Disables fingerprint verification after the DTLS handshake.
    /// Test-only escape hatch; never disable this against real peers.
    pub fn disable_certificate_fingerprint_verification(&mut self, disable: bool) {
        self.disable_certificate_fingerprint_verification = disable;
    }

    /// Sets the size of the buffers the demultiplexer and data channels
    /// read into.
    pub fn set_receive_mtu(&mut self, mtu: usize) {
        self.receive_mtu = mtu;
    }

    pub fn set_sctp_max_receive_buffer_size(&mut self, size: u32) {
        self.sctp_max_receive_buffer_size = size;
    }
}
