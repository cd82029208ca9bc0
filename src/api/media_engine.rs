use crate::error::{Error, Result};
use crate::track::MediaKind;

/// MIME_TYPE_H264 H264 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_H264: &str = "video/h264";
/// MIME_TYPE_OPUS Opus MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_OPUS: &str = "audio/opus";
/// MIME_TYPE_VP8 VP8 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_VP8: &str = "video/vp8";
/// MIME_TYPE_VP9 VP9 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_VP9: &str = "video/vp9";
/// MIME_TYPE_G722 G722 MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_G722: &str = "audio/g722";
/// MIME_TYPE_PCMU PCMU MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_PCMU: &str = "audio/pcmu";
/// MIME_TYPE_PCMA PCMA MIME type.
/// Note: Matching should be case insensitive.
pub const MIME_TYPE_PCMA: &str = "audio/pcma";

/// The negotiable facts about one codec. Payload framing stays with the
/// external media stack; this crate only matches and re-emits these in
/// SDP.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    /// Audio channel count; 0 when not applicable.
    pub channels: u16,
    pub sdp_fmtp_line: String,
}

impl RTCRtpCodecCapability {
    /// The <encoding name> part of rtpmap, e.g. "PCMU" for audio/pcmu.
    pub(crate) fn encoding_name(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(self.mime_type.as_str())
    }

    /// rtpmap encoding parameters: "PCMU/8000" or "opus/48000/2".
    pub(crate) fn rtpmap_line(&self) -> String {
        if self.channels > 0 {
            format!(
                "{}/{}/{}",
                self.encoding_name(),
                self.clock_rate,
                self.channels
            )
        } else {
            format!("{}/{}", self.encoding_name(), self.clock_rate)
        }
    }

    pub(crate) fn matches(&self, other: &RTCRtpCodecCapability) -> bool {
        self.mime_type.eq_ignore_ascii_case(&other.mime_type)
            && self.clock_rate == other.clock_rate
            && (self.channels == other.channels || self.channels == 0 || other.channels == 0)
    }
}

/// A codec capability bound to a payload type.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodecParameters {
    pub capability: RTCRtpCodecCapability,
    pub payload_type: u8,
}

/// A negotiated RTP header extension: id as it appears in a=extmap.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpHeaderExtensionParameters {
    pub id: usize,
    pub uri: String,
}

pub(crate) struct MediaEngineHeaderExtension {
    pub(crate) uri: String,
    pub(crate) is_audio: bool,
    pub(crate) is_video: bool,
}

/// A MediaEngine defines the codecs supported by a PeerConnection, and
/// the configuration of those codecs; the negotiator intersects these
/// against remote media sections. A MediaEngine must not be shared
/// between PeerConnections.
#[derive(Default)]
pub struct MediaEngine {
    pub(crate) video_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) audio_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) header_extensions: Vec<MediaEngineHeaderExtension>,
}

impl MediaEngine {
    /// Registers the default codec set. Not safe for concurrent use.
    pub fn register_default_codecs(&mut self) -> Result<()> {
        // Default Audio Codecs
        for codec in [
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                },
                payload_type: 111,
            },
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_G722.to_owned(),
                    clock_rate: 8000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                },
                payload_type: 9,
            },
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_PCMU.to_owned(),
                    clock_rate: 8000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                },
                payload_type: 0,
            },
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_PCMA.to_owned(),
                    clock_rate: 8000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                },
                payload_type: 8,
            },
        ] {
            self.register_codec(codec, MediaKind::Audio)?;
        }

        // Default Video Codecs
        for codec in [
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: String::new(),
                },
                payload_type: 96,
            },
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP9.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "profile-id=0".to_owned(),
                },
                payload_type: 98,
            },
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line:
                        "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f"
                            .to_owned(),
                },
                payload_type: 102,
            },
        ] {
            self.register_codec(codec, MediaKind::Video)?;
        }

        Ok(())
    }

    /// Adds a codec to the list of available codecs for the given kind.
    pub fn register_codec(
        &mut self,
        codec: RTCRtpCodecParameters,
        kind: MediaKind,
    ) -> Result<()> {
        match kind {
            MediaKind::Audio => self.audio_codecs.push(codec),
            MediaKind::Video => self.video_codecs.push(codec),
            _ => return Err(Error::new("unknown media kind".to_owned())),
        }
        Ok(())
    }

    /// Registers a header extension for the given kinds.
    pub fn register_header_extension(
        &mut self,
        uri: impl Into<String>,
        audio: bool,
        video: bool,
    ) {
        self.header_extensions.push(MediaEngineHeaderExtension {
            uri: uri.into(),
            is_audio: audio,
            is_video: video,
        });
    }

    pub(crate) fn codecs_for(&self, kind: MediaKind) -> &[RTCRtpCodecParameters] {
        match kind {
            MediaKind::Audio => &self.audio_codecs,
            MediaKind::Video => &self.video_codecs,
            _ => &[],
        }
    }

    /// The extmap entries offered for a kind, ids assigned in
    /// registration order starting at 1.
    pub(crate) fn header_extensions_for(
        &self,
        kind: MediaKind,
    ) -> Vec<RTCRtpHeaderExtensionParameters> {
        self.header_extensions
            .iter()
            .enumerate()
            .filter(|(_, ext)| match kind {
                MediaKind::Audio => ext.is_audio,
                MediaKind::Video => ext.is_video,
                _ => false,
            })
            .map(|(i, ext)| RTCRtpHeaderExtensionParameters {
                id: i + 1,
                uri: ext.uri.clone(),
            })
            .collect()
    }

    /// The codecs both sides can use: our capabilities for `kind`,
    /// restricted to those the remote offered, with the remote's
    /// payload types so the answer lines up with the offer.
    pub(crate) fn intersect_codecs(
        &self,
        kind: MediaKind,
        remote_codecs: &[RTCRtpCodecParameters],
    ) -> Vec<RTCRtpCodecParameters> {
        let ours = self.codecs_for(kind);
        remote_codecs
            .iter()
            .filter(|remote| {
                ours.iter()
                    .any(|local| local.capability.matches(&remote.capability))
            })
            .cloned()
            .collect()
    }
}
