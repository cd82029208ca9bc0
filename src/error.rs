use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// ErrConnectionClosed indicates an operation executed after connection
    /// has already been closed.
    #[error("connection closed")]
    ErrConnectionClosed,

    /// ErrDataChannelNotOpen indicates an operation executed when the data
    /// channel is not (yet) open.
    #[error("data channel not open")]
    ErrDataChannelNotOpen,

    /// ErrCertificateExpired indicates that an x509 certificate has expired.
    #[error("x509Cert expired")]
    ErrCertificateExpired,

    /// ErrNoTurnCredentials indicates that a TURN server URL was provided
    /// without required credentials.
    #[error("turn server credentials required")]
    ErrNoTurnCredentials,

    /// ErrTurnCredentials indicates that provided TURN credentials are partial
    /// or malformed.
    #[error("invalid turn server credentials")]
    ErrTurnCredentials,

    /// ErrExistingTrack indicates that a track already exists.
    #[error("track already exists")]
    ErrExistingTrack,

    /// ErrPrivateKeyType indicates that a particular private key encryption
    /// chosen to generate a certificate is not supported.
    #[error("private key type not supported")]
    ErrPrivateKeyType,

    /// ErrStringSizeLimit indicates that the character size limit of string is
    /// exceeded. The limit is hardcoded to 65535 according to specifications.
    #[error("data channel label exceeds size limit")]
    ErrStringSizeLimit,

    /// ErrMaxDataChannelID indicates that the maximum number ID that could be
    /// specified for a data channel has been exceeded.
    #[error("maximum number ID for datachannel specified")]
    ErrMaxDataChannelID,

    /// ErrNegotiatedWithoutID indicates that an attempt to create a data channel
    /// was made while setting the negotiated option to true without providing
    /// the negotiated channel ID.
    #[error("negotiated set without channel id")]
    ErrNegotiatedWithoutID,

    /// ErrRetransmitsOrPacketLifeTime indicates that an attempt to create a data
    /// channel was made with both options max_packet_life_time and max_retransmits
    /// set together. Such configuration is not supported by the specification
    /// and is mutually exclusive.
    #[error("both max_packet_life_time and max_retransmits was set")]
    ErrRetransmitsOrPacketLifeTime,

    /// ErrNoRemoteDescription indicates that an operation was rejected because
    /// the remote description is not set
    #[error("remote description is not set")]
    ErrNoRemoteDescription,

    /// ErrIncorrectSignalingState indicates that the signaling state of PeerConnection is not correct
    #[error("operation can not be run in current signaling state")]
    ErrIncorrectSignalingState,

    /// ErrProtocolTooLarge indicates that value given for a DataChannelInit protocol is
    /// longer then 65535 bytes
    #[error("protocol is larger then 65535 bytes")]
    ErrProtocolTooLarge,

    /// ErrWrongSdpTypeOfferAfterOffer indicates that a remote offer was applied
    /// while a local offer is still pending.
    #[error("offer applied while a local offer is pending")]
    ErrWrongSdpTypeOfferAfterOffer,

    /// ErrDtlsFingerprintMissing indicates a remote description without any
    /// usable fingerprint attribute.
    #[error("remote description has no DTLS fingerprint")]
    ErrDtlsFingerprintMissing,

    /// ErrDtlsFingerprintDigestNotSupported indicates a fingerprint attribute whose
    /// digest algorithm this implementation cannot compute.
    #[error("remote DTLS fingerprint digest not supported")]
    ErrDtlsFingerprintDigestNotSupported,

    /// ErrDtlsFingerprintMismatch indicates the certificate presented during the
    /// DTLS handshake does not hash to the fingerprint advertised in SDP.
    #[error("dtls fingerprint mismatch")]
    ErrDtlsFingerprintMismatch,

    /// ErrDataChannelTransportNotSupported indicates an application media section
    /// with a transport other than UDP/DTLS/SCTP or the legacy DTLS/SCTP.
    #[error("data channel transport not supported")]
    ErrDataChannelTransportNotSupported,

    /// ErrSessionDescriptionInvalidFingerprint indicates set_remote_description was
    /// called with a SessionDescription that has a malformed fingerprint
    #[error("set_remote_description called with an invalid fingerprint")]
    ErrSessionDescriptionInvalidFingerprint,

    /// ErrSessionDescriptionConflictingFingerprints indicates set_remote_description
    /// was called with a SessionDescription that has conflicting fingerprints
    #[error("set_remote_description called with multiple conflicting fingerprint")]
    ErrSessionDescriptionConflictingFingerprints,

    /// ErrSessionDescriptionMissingIceUfrag indicates set_remote_description was
    /// called with a SessionDescription that is missing an ice-ufrag value
    #[error("set_remote_description called with no ice-ufrag")]
    ErrSessionDescriptionMissingIceUfrag,

    /// ErrSessionDescriptionMissingIcePwd indicates set_remote_description was
    /// called with a SessionDescription that is missing an ice-pwd value
    #[error("set_remote_description called with no ice-pwd")]
    ErrSessionDescriptionMissingIcePwd,

    /// ErrSessionDescriptionConflictingIceUfrag indicates set_remote_description was
    /// called with a SessionDescription that contains multiple conflicting ice-ufrag values
    #[error("set_remote_description called with multiple conflicting ice-ufrag values")]
    ErrSessionDescriptionConflictingIceUfrag,

    /// ErrSessionDescriptionConflictingIcePwd indicates set_remote_description was
    /// called with a SessionDescription that contains multiple conflicting ice-pwd values
    #[error("set_remote_description called with multiple conflicting ice-pwd values")]
    ErrSessionDescriptionConflictingIcePwd,

    /// ErrNoSRTPProtectionProfile indicates that the DTLS handshake completed and
    /// no SRTP Protection Profile was chosen
    #[error("DTLS Handshake completed and no SRTP Protection Profile was chosen")]
    ErrNoSRTPProtectionProfile,

    /// ErrSctpAssociationTimeout indicates the SCTP association did not come up
    /// within the configured bring-up window.
    #[error("SCTP association timed out after {0}ms")]
    ErrSctpAssociationTimeout(u64),

    /// ErrSctpNotEstablished indicates a send was attempted before the SCTP
    /// association reached the connected state.
    #[error("SCTP association not established")]
    ErrSctpNotEstablished,

    /// ErrOutboundPacketTooLarge indicates a data channel message exceeding the
    /// negotiated maximum message size.
    #[error("outbound packet larger than maximum message size")]
    ErrOutboundPacketTooLarge,

    #[error("the DTLS transport has not started yet")]
    ErrDtlsTransportNotStarted,
    #[error("attempted to start DTLSTransport that is not in new state")]
    ErrInvalidDTLSStart,
    #[error("peer didn't provide certificate via DTLS")]
    ErrNoRemoteCertificate,
    #[error("ICE connection not started")]
    ErrICEConnectionNotStarted,
    #[error("unknown candidate type")]
    ErrICECandidateTypeUnknown,
    #[error("ICEAgent does not exist")]
    ErrICEAgentNotExist,
    #[error("unknown ICE Role")]
    ErrICERoleUnknown,
    #[error("unknown protocol")]
    ErrICEProtocolUnknown,
    #[error("gatherer not started")]
    ErrICEGathererNotStarted,
    #[error("relay-only transport policy requires at least one ICE server")]
    ErrICEServersRequiredForRelayPolicy,
    #[error("new sdp does not match previous offer")]
    ErrSDPDoesNotMatchOffer,
    #[error("new sdp does not match previous answer")]
    ErrSDPDoesNotMatchAnswer,
    #[error("provided value is not a valid enum value of type SDPType")]
    ErrPeerConnSDPTypeInvalidValue,
    #[error("invalid state change op")]
    ErrPeerConnStateChangeInvalid,
    #[error("invalid SDP type supplied to set_local_description()")]
    ErrPeerConnSDPTypeInvalidValueSetLocalDescription,
    #[error("remote description contained media section without mid value")]
    ErrPeerConnRemoteDescriptionWithoutMidValue,
    #[error("API missing an ICE agent factory")]
    ErrMissingIceAgentFactory,
    #[error("API missing a DTLS engine")]
    ErrMissingDtlsEngine,
    #[error("API missing an SCTP engine")]
    ErrMissingSctpEngine,
    #[error("can't rollback from stable state")]
    ErrSignalingStateCannotRollback,
    #[error("invalid proposed signaling state transition from {from} (local={is_local}) applying {applying}")]
    ErrSignalingStateProposedTransitionInvalid {
        from: crate::peer_connection::signaling_state::RTCSignalingState,
        applying: crate::peer_connection::sdp::sdp_type::RTCSdpType,
        is_local: bool,
    },
    #[error("ICETransport can only be called in ICETransportStateNew")]
    ErrICETransportNotInNew,
    #[error("bad Certificate PEM format")]
    ErrCertificatePEMFormatError,
    #[error("sender with provided track id not found")]
    ErrTrackNotFound,

    #[error("IoError: {0}")]
    ErrIoError(#[from] std::io::Error),

    #[error("SdpError: {0}")]
    ErrSdpError(#[from] sdp::Error),
    #[error("UtilError: {0}")]
    ErrUtilError(#[from] util::Error),
    #[error("RcgenError: {0}")]
    ErrRcgenError(#[from] rcgen::Error),

    #[error("{0}")]
    ErrOthers(String),
}

impl Error {
    pub fn new(msg: String) -> Self {
        Error::ErrOthers(msg)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

pub(crate) fn flatten_errs(errs: Vec<Error>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.to_string()).collect();
        Err(Error::new(errs_strs.join("\n")))
    }
}
