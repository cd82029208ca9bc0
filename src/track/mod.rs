use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::api::media_engine::RTCRtpCodecCapability;

/// The media kind of a track or media section.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    #[default]
    Unspecified,
    Audio,
    Video,
}

impl From<&str> for MediaKind {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            _ => MediaKind::Unspecified,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

/// The direction a media section negotiates.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCRtpTransceiverDirection {
    #[default]
    Unspecified,
    Sendrecv,
    Sendonly,
    Recvonly,
    Inactive,
}

impl RTCRtpTransceiverDirection {
    /// The direction the remote sees for our direction.
    pub fn reverse(&self) -> RTCRtpTransceiverDirection {
        match *self {
            RTCRtpTransceiverDirection::Sendonly => RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Recvonly => RTCRtpTransceiverDirection::Sendonly,
            other => other,
        }
    }
}

impl From<&str> for RTCRtpTransceiverDirection {
    fn from(raw: &str) -> Self {
        match raw {
            "sendrecv" => RTCRtpTransceiverDirection::Sendrecv,
            "sendonly" => RTCRtpTransceiverDirection::Sendonly,
            "recvonly" => RTCRtpTransceiverDirection::Recvonly,
            "inactive" => RTCRtpTransceiverDirection::Inactive,
            _ => RTCRtpTransceiverDirection::Unspecified,
        }
    }
}

impl fmt::Display for RTCRtpTransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCRtpTransceiverDirection::Sendrecv => write!(f, "sendrecv"),
            RTCRtpTransceiverDirection::Sendonly => write!(f, "sendonly"),
            RTCRtpTransceiverDirection::Recvonly => write!(f, "recvonly"),
            RTCRtpTransceiverDirection::Inactive => write!(f, "inactive"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

/// A local media source registered with add_track. Only the identity
/// and capabilities matter to this crate: they shape the offered and
/// answered media sections. Sample production stays with the caller.
#[derive(Default, Debug, Clone)]
pub struct MediaTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
    pub direction: RTCRtpTransceiverDirection,
    /// Overrides the media engine's codec list when non-empty.
    pub codec_preferences: Vec<RTCRtpCodecCapability>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, stream_id: impl Into<String>, kind: MediaKind) -> Self {
        MediaTrack {
            id: id.into(),
            stream_id: stream_id.into(),
            kind,
            direction: RTCRtpTransceiverDirection::Sendrecv,
            codec_preferences: vec![],
        }
    }
}

/// Receives the SRTP/SRTCP packets matched by the demultiplexer,
/// still protected. Decrypt with the keying material exported by the
/// DTLS transport; RTP parsing, jitter buffering and rendering are
/// external concerns.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn deliver_rtp(&self, packet: Bytes);
    async fn deliver_rtcp(&self, packet: Bytes);
}
