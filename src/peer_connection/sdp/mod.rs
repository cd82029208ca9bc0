#[cfg(test)]
pub(crate) mod sdp_test;

pub mod sdp_type;
pub mod session_description;

use sdp::description::common::{Address, ConnectionInformation};
use sdp::description::media::{MediaDescription, MediaName, RangedPort};
use sdp::description::session::{Origin, SessionDescription};
use sdp::util::ConnectionRole;

use crate::api::media_engine::{
    MediaEngine, RTCRtpCodecCapability, RTCRtpCodecParameters, RTCRtpHeaderExtensionParameters,
};
use crate::dtls_transport::dtls_fingerprint::RTCDtlsFingerprint;
use crate::error::{Error, Result};
use crate::ice_transport::ice_candidate::{unmarshal_candidate, RTCIceCandidate};
use crate::ice_transport::ice_gatherer::RTCIceGatherer;
use crate::ice_transport::ice_gathering_state::RTCIceGatheringState;
use crate::ice_transport::ice_parameters::RTCIceParameters;
use crate::peer_connection::sdp::session_description::RTCSessionDescription;
use crate::sctp_transport::DEFAULT_SCTP_PORT;
use crate::track::{MediaKind, MediaTrack, RTCRtpTransceiverDirection};

pub(crate) const ATTR_KEY_CANDIDATE: &str = "candidate";
pub(crate) const ATTR_KEY_END_OF_CANDIDATES: &str = "end-of-candidates";
pub(crate) const ATTR_KEY_ICELITE: &str = "ice-lite";
pub(crate) const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub(crate) const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub(crate) const ATTR_KEY_ICE_OPTIONS: &str = "ice-options";
pub(crate) const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
pub(crate) const ATTR_KEY_CONNECTION_SETUP: &str = "setup";
pub(crate) const ATTR_KEY_MID: &str = "mid";
pub(crate) const ATTR_KEY_GROUP: &str = "group";
pub(crate) const ATTR_KEY_RTCPMUX: &str = "rtcp-mux";
pub(crate) const ATTR_KEY_RTCP: &str = "rtcp";
pub(crate) const ATTR_KEY_MSID: &str = "msid";
pub(crate) const ATTR_KEY_EXTMAP: &str = "extmap";
pub(crate) const ATTR_KEY_SCTP_PORT: &str = "sctp-port";
pub(crate) const ATTR_KEY_MAX_MESSAGE_SIZE: &str = "max-message-size";

pub(crate) const MEDIA_SECTION_APPLICATION: &str = "application";
pub(crate) const MEDIA_FORMAT_DATA_CHANNEL: &str = "webrtc-datachannel";

const ICE_OPTIONS_VALUE: &str = "ice2,trickle";
const RTCP_UNSPECIFIED: &str = "9 IN IP4 0.0.0.0";

/// One m-section to generate: either a media (audio/video) section
/// backed by a track, or the application (data channel) section.
pub(crate) struct MediaSection {
    pub(crate) id: String,
    pub(crate) kind: MediaKind,
    pub(crate) direction: RTCRtpTransceiverDirection,
    pub(crate) codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) extmaps: Vec<RTCRtpHeaderExtensionParameters>,
    pub(crate) track: Option<MediaTrack>,
    pub(crate) data: bool,
}

pub(crate) struct PopulateSdpParams {
    pub(crate) connection_role: ConnectionRole,
    pub(crate) ice_gathering_state: RTCIceGatheringState,
    pub(crate) candidates: Vec<RTCIceCandidate>,
    pub(crate) sctp_port: u16,
    pub(crate) max_message_size: u32,
    pub(crate) use_feedback_profile: bool,
}

/// Builds a complete JSEP session description: one m-section per entry
/// in `media_sections`, a BUNDLE group over all mids, rtcp-mux
/// everywhere, candidates attached to the first section only.
pub(crate) fn populate_sdp(
    mut d: SessionDescription,
    dtls_fingerprints: &[RTCDtlsFingerprint],
    ice_params: &RTCIceParameters,
    media_sections: &[MediaSection],
    params: PopulateSdpParams,
) -> Result<SessionDescription> {
    let mut bundle_value = "BUNDLE".to_owned();

    for (i, section) in media_sections.iter().enumerate() {
        bundle_value += format!(" {}", section.id).as_str();

        let media = if section.data {
            populate_application_section(section, ice_params, dtls_fingerprints, &params)
        } else {
            populate_media_section(section, ice_params, dtls_fingerprints, &params)
        };

        let media = if i == 0 {
            add_candidates_to_media_description(
                media,
                &params.candidates,
                params.ice_gathering_state,
            )
        } else {
            media
        };

        d = d.with_media(media);
    }

    if ice_params.ice_lite {
        d = d.with_property_attribute(ATTR_KEY_ICELITE.to_owned());
    }

    Ok(d.with_value_attribute(ATTR_KEY_GROUP.to_owned(), bundle_value))
}

fn new_media_description(media: String, protos: Vec<String>, formats: Vec<String>) -> MediaDescription {
    MediaDescription {
        media_name: MediaName {
            media,
            port: RangedPort {
                value: 9,
                range: None,
            },
            protos,
            formats,
        },
        media_title: None,
        connection_information: Some(ConnectionInformation {
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            address: Some(Address {
                address: "0.0.0.0".to_owned(),
                ttl: None,
                range: None,
            }),
        }),
        bandwidth: vec![],
        encryption_key: None,
        attributes: vec![],
    }
}

fn populate_media_section(
    section: &MediaSection,
    ice_params: &RTCIceParameters,
    dtls_fingerprints: &[RTCDtlsFingerprint],
    params: &PopulateSdpParams,
) -> MediaDescription {
    let profile = if params.use_feedback_profile {
        "SAVPF"
    } else {
        "SAVP"
    };
    let protos = vec![
        "UDP".to_owned(),
        "TLS".to_owned(),
        "RTP".to_owned(),
        profile.to_owned(),
    ];

    let mut media = new_media_description(section.kind.to_string(), protos, vec![])
        .with_value_attribute(
            ATTR_KEY_CONNECTION_SETUP.to_owned(),
            params.connection_role.to_string(),
        )
        .with_value_attribute(ATTR_KEY_MID.to_owned(), section.id.clone())
        .with_property_attribute(section.direction.to_string())
        .with_ice_credentials(
            ice_params.username_fragment.clone(),
            ice_params.password.clone(),
        )
        .with_value_attribute(ATTR_KEY_ICE_OPTIONS.to_owned(), ICE_OPTIONS_VALUE.to_owned())
        .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
        .with_value_attribute(ATTR_KEY_RTCP.to_owned(), RTCP_UNSPECIFIED.to_owned());

    for codec in &section.codecs {
        media = media.with_codec(
            codec.payload_type,
            codec.capability.encoding_name().to_owned(),
            codec.capability.clock_rate,
            codec.capability.channels,
            codec.capability.sdp_fmtp_line.clone(),
        );
    }

    for extmap in &section.extmaps {
        media = media.with_value_attribute(
            ATTR_KEY_EXTMAP.to_owned(),
            format!("{} {}", extmap.id, extmap.uri),
        );
    }

    if let Some(track) = &section.track {
        if section.direction == RTCRtpTransceiverDirection::Sendrecv
            || section.direction == RTCRtpTransceiverDirection::Sendonly
        {
            media = media
                .with_value_attribute(
                    ATTR_KEY_MSID.to_owned(),
                    format!("{} {}", track.stream_id, track.id),
                )
                .with_media_source(
                    rand::random::<u32>(),
                    track.stream_id.clone(), /* cname */
                    track.stream_id.clone(), /* streamLabel */
                    track.id.clone(),
                );
        }
    }

    for fingerprint in dtls_fingerprints {
        media = media.with_fingerprint(fingerprint.algorithm.clone(), fingerprint.value.clone());
    }

    media
}

fn populate_application_section(
    section: &MediaSection,
    ice_params: &RTCIceParameters,
    dtls_fingerprints: &[RTCDtlsFingerprint],
    params: &PopulateSdpParams,
) -> MediaDescription {
    let protos = vec!["UDP".to_owned(), "DTLS".to_owned(), "SCTP".to_owned()];
    let formats = vec![MEDIA_FORMAT_DATA_CHANNEL.to_owned()];

    let mut media = new_media_description(MEDIA_SECTION_APPLICATION.to_owned(), protos, formats)
        .with_value_attribute(
            ATTR_KEY_CONNECTION_SETUP.to_owned(),
            params.connection_role.to_string(),
        )
        .with_value_attribute(ATTR_KEY_MID.to_owned(), section.id.clone())
        .with_ice_credentials(
            ice_params.username_fragment.clone(),
            ice_params.password.clone(),
        )
        .with_value_attribute(ATTR_KEY_ICE_OPTIONS.to_owned(), ICE_OPTIONS_VALUE.to_owned())
        .with_value_attribute(ATTR_KEY_SCTP_PORT.to_owned(), params.sctp_port.to_string())
        .with_value_attribute(
            ATTR_KEY_MAX_MESSAGE_SIZE.to_owned(),
            params.max_message_size.to_string(),
        );

    for fingerprint in dtls_fingerprints {
        media = media.with_fingerprint(fingerprint.algorithm.clone(), fingerprint.value.clone());
    }

    media
}

fn add_candidates_to_media_description(
    mut media: MediaDescription,
    candidates: &[RTCIceCandidate],
    gathering_state: RTCIceGatheringState,
) -> MediaDescription {
    for candidate in candidates {
        media = media.with_value_attribute(ATTR_KEY_CANDIDATE.to_owned(), candidate.marshal());
    }

    if gathering_state == RTCIceGatheringState::Complete
        && !media.has_attribute(ATTR_KEY_END_OF_CANDIDATES)
    {
        media = media.with_property_attribute(ATTR_KEY_END_OF_CANDIDATES.to_owned());
    }

    media
}

/// Folds ICE credentials and candidates across the session and every
/// media section; the first non-empty credential wins, a differing
/// later one is an error.
pub(crate) fn extract_ice_details(
    parsed: &SessionDescription,
) -> Result<(String, String, Vec<RTCIceCandidate>)> {
    let mut ufrag = parsed
        .attribute(ATTR_KEY_ICE_UFRAG)
        .map(|s| s.to_owned());
    let mut pwd = parsed.attribute(ATTR_KEY_ICE_PWD).map(|s| s.to_owned());
    let mut candidates = vec![];

    for media in &parsed.media_descriptions {
        if let Some(Some(media_ufrag)) = media.attribute(ATTR_KEY_ICE_UFRAG) {
            match &ufrag {
                Some(existing) if existing.as_str() != media_ufrag => {
                    return Err(Error::ErrSessionDescriptionConflictingIceUfrag)
                }
                Some(_) => {}
                None => ufrag = Some(media_ufrag.to_owned()),
            }
        }
        if let Some(Some(media_pwd)) = media.attribute(ATTR_KEY_ICE_PWD) {
            match &pwd {
                Some(existing) if existing.as_str() != media_pwd => {
                    return Err(Error::ErrSessionDescriptionConflictingIcePwd)
                }
                Some(_) => {}
                None => pwd = Some(media_pwd.to_owned()),
            }
        }

        for attribute in &media.attributes {
            if attribute.key == ATTR_KEY_CANDIDATE {
                if let Some(value) = &attribute.value {
                    candidates.push(unmarshal_candidate(value)?);
                }
            }
        }
    }

    let ufrag = ufrag.ok_or(Error::ErrSessionDescriptionMissingIceUfrag)?;
    let pwd = pwd.ok_or(Error::ErrSessionDescriptionMissingIcePwd)?;

    Ok((ufrag, pwd, candidates))
}

const SUPPORTED_FINGERPRINT_ALGORITHMS: [&str; 3] = ["sha-256", "sha-384", "sha-512"];

/// Finds the DTLS fingerprint the remote advertised, session level or
/// media level; every occurrence must agree.
pub(crate) fn extract_fingerprint(parsed: &SessionDescription) -> Result<RTCDtlsFingerprint> {
    let mut raw_fingerprints = vec![];

    if let Some(fingerprint) = parsed.attribute(ATTR_KEY_FINGERPRINT) {
        raw_fingerprints.push(fingerprint.clone());
    }

    for media in &parsed.media_descriptions {
        if let Some(Some(fingerprint)) = media.attribute(ATTR_KEY_FINGERPRINT) {
            raw_fingerprints.push(fingerprint.to_owned());
        }
    }

    if raw_fingerprints.is_empty() {
        return Err(Error::ErrDtlsFingerprintMissing);
    }

    raw_fingerprints.dedup();
    if raw_fingerprints.len() != 1 {
        return Err(Error::ErrSessionDescriptionConflictingFingerprints);
    }

    let fingerprint = RTCDtlsFingerprint::try_from_attribute(&raw_fingerprints[0])?;
    if !SUPPORTED_FINGERPRINT_ALGORITHMS.contains(&fingerprint.algorithm.as_str()) {
        return Err(Error::ErrDtlsFingerprintDigestNotSupported);
    }

    Ok(fingerprint)
}

/// The advertised SCTP parameters of an application media section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApplicationMediaInfo {
    pub(crate) sctp_port: u16,
    pub(crate) max_message_size: Option<u32>,
}

/// Locates the application section, validating its transport: only
/// UDP/DTLS/SCTP and the legacy DTLS/SCTP spelling are accepted.
pub(crate) fn extract_application_media_info(
    parsed: &SessionDescription,
) -> Result<Option<ApplicationMediaInfo>> {
    for media in &parsed.media_descriptions {
        if media.media_name.media != MEDIA_SECTION_APPLICATION {
            continue;
        }

        let proto = media.media_name.protos.join("/");
        if proto != "UDP/DTLS/SCTP" && proto != "DTLS/SCTP" {
            return Err(Error::ErrDataChannelTransportNotSupported);
        }

        let mut info = ApplicationMediaInfo {
            sctp_port: DEFAULT_SCTP_PORT,
            max_message_size: None,
        };

        if proto == "DTLS/SCTP" {
            // Legacy spelling carries the port as the format.
            if let Some(port) = media.media_name.formats.first() {
                if let Ok(port) = port.parse::<u16>() {
                    info.sctp_port = port;
                }
            }
        }

        if let Some(Some(port)) = media.attribute(ATTR_KEY_SCTP_PORT) {
            info.sctp_port = port
                .parse::<u16>()
                .map_err(|e| Error::new(format!("invalid sctp-port: {e}")))?;
        }

        if let Some(Some(size)) = media.attribute(ATTR_KEY_MAX_MESSAGE_SIZE) {
            info.max_message_size = Some(
                size.parse::<u32>()
                    .map_err(|e| Error::new(format!("invalid max-message-size: {e}")))?,
            );
        }

        return Ok(Some(info));
    }

    Ok(None)
}

pub(crate) fn get_mid_value(media: &MediaDescription) -> Option<&str> {
    for attribute in &media.attributes {
        if attribute.key == ATTR_KEY_MID {
            return attribute.value.as_deref();
        }
    }
    None
}

pub(crate) fn get_peer_direction(media: &MediaDescription) -> RTCRtpTransceiverDirection {
    for attribute in &media.attributes {
        let direction = RTCRtpTransceiverDirection::from(attribute.key.as_str());
        if direction != RTCRtpTransceiverDirection::Unspecified {
            return direction;
        }
    }
    RTCRtpTransceiverDirection::Unspecified
}

pub(crate) fn have_application_media_section(parsed: &SessionDescription) -> bool {
    parsed
        .media_descriptions
        .iter()
        .any(|media| media.media_name.media == MEDIA_SECTION_APPLICATION)
}

pub(crate) fn remote_is_ice_lite(parsed: &SessionDescription) -> bool {
    parsed
        .attributes
        .iter()
        .any(|a| a.key.trim() == ATTR_KEY_ICELITE)
}

/// Well-known static payload types that need no rtpmap line.
fn static_codec(payload_type: u8) -> Option<RTCRtpCodecCapability> {
    let (mime_type, clock_rate) = match payload_type {
        0 => ("audio/pcmu", 8000),
        8 => ("audio/pcma", 8000),
        9 => ("audio/g722", 8000),
        _ => return None,
    };
    Some(RTCRtpCodecCapability {
        mime_type: mime_type.to_owned(),
        clock_rate,
        channels: 0,
        sdp_fmtp_line: String::new(),
    })
}

/// Rebuilds the codec list of a remote media section from its formats
/// and rtpmap/fmtp attributes.
pub(crate) fn codecs_from_media_description(
    media: &MediaDescription,
) -> Result<Vec<RTCRtpCodecParameters>> {
    let mut codecs = vec![];

    for format in &media.media_name.formats {
        let payload_type: u8 = match format.parse() {
            Ok(pt) => pt,
            Err(_) => continue,
        };

        let mut capability = None;
        for attribute in &media.attributes {
            if attribute.key != "rtpmap" {
                continue;
            }
            let Some(value) = &attribute.value else { continue };
            let Some((pt, mapping)) = value.split_once(' ') else {
                continue;
            };
            if pt.parse::<u8>() != Ok(payload_type) {
                continue;
            }

            let mut parts = mapping.split('/');
            let name = parts.next().unwrap_or_default();
            let clock_rate: u32 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);
            let channels: u16 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);

            capability = Some(RTCRtpCodecCapability {
                mime_type: format!("{}/{}", media.media_name.media, name),
                clock_rate,
                channels,
                sdp_fmtp_line: String::new(),
            });
            break;
        }

        let Some(mut capability) = capability.or_else(|| static_codec(payload_type)) else {
            continue;
        };

        for attribute in &media.attributes {
            if attribute.key != "fmtp" {
                continue;
            }
            let Some(value) = &attribute.value else { continue };
            if let Some((pt, line)) = value.split_once(' ') {
                if pt.parse::<u8>() == Ok(payload_type) {
                    capability.sdp_fmtp_line = line.to_owned();
                }
            }
        }

        codecs.push(RTCRtpCodecParameters {
            capability,
            payload_type,
        });
    }

    Ok(codecs)
}

/// The a=extmap entries of a remote media section.
pub(crate) fn extmaps_from_media_description(
    media: &MediaDescription,
) -> Vec<RTCRtpHeaderExtensionParameters> {
    let mut extmaps = vec![];

    for attribute in &media.attributes {
        if attribute.key != ATTR_KEY_EXTMAP {
            continue;
        }
        let Some(value) = &attribute.value else { continue };
        let Some((id, uri)) = value.split_once(' ') else {
            continue;
        };
        // The id may carry a direction suffix, e.g. "2/recvonly".
        let id = id.split('/').next().unwrap_or(id);
        if let Ok(id) = id.parse::<usize>() {
            extmaps.push(RTCRtpHeaderExtensionParameters {
                id,
                uri: uri.to_owned(),
            });
        }
    }

    extmaps
}

/// Keeps the session id stable and bumps the version for every
/// description generated after the first.
pub(crate) fn update_sdp_origin(origin: &mut Origin, d: &mut SessionDescription) {
    if origin.session_version == 0 {
        // First description: adopt the randomly generated origin.
        *origin = d.origin.clone();
    } else {
        origin.session_version += 1;
        d.origin = origin.clone();
    }
}

/// Appends the candidates gathered since the description was created to
/// its first media section, so late readers of local_description see
/// the full set without trickling.
pub(crate) async fn populate_local_candidates(
    orig: Option<&RTCSessionDescription>,
    ice_gatherer: Option<&RTCIceGatherer>,
    ice_gathering_state: RTCIceGatheringState,
) -> Option<RTCSessionDescription> {
    let (desc, gatherer) = match (orig, ice_gatherer) {
        (Some(desc), Some(gatherer)) => (desc, gatherer),
        _ => return orig.cloned(),
    };

    let candidates = match gatherer.get_local_candidates().await {
        Ok(candidates) => candidates,
        Err(_) => return Some(desc.clone()),
    };

    let mut parsed = match desc.unmarshal() {
        Ok(parsed) => parsed,
        Err(_) => return Some(desc.clone()),
    };
    if parsed.media_descriptions.is_empty() {
        return Some(desc.clone());
    }

    let mut media = parsed.media_descriptions.remove(0);
    for candidate in candidates {
        let marshaled = candidate.marshal();
        let already_present = media.attributes.iter().any(|a| {
            a.key == ATTR_KEY_CANDIDATE && a.value.as_deref() == Some(marshaled.as_str())
        });
        if !already_present {
            media = media.with_value_attribute(ATTR_KEY_CANDIDATE.to_owned(), marshaled);
        }
    }
    if ice_gathering_state == RTCIceGatheringState::Complete
        && !media.has_attribute(ATTR_KEY_END_OF_CANDIDATES)
    {
        media = media.with_property_attribute(ATTR_KEY_END_OF_CANDIDATES.to_owned());
    }
    parsed.media_descriptions.insert(0, media);

    Some(RTCSessionDescription {
        sdp_type: desc.sdp_type,
        sdp: parsed.marshal(),
        parsed: Some(parsed),
    })
}

/// Offer-side helper: the media engine's full capability set for a
/// track's kind, or its preferences when set.
pub(crate) fn codecs_for_track(media_engine: &MediaEngine, track: &MediaTrack) -> Vec<RTCRtpCodecParameters> {
    if !track.codec_preferences.is_empty() {
        return track
            .codec_preferences
            .iter()
            .enumerate()
            .map(|(i, capability)| RTCRtpCodecParameters {
                capability: capability.clone(),
                // Dynamic payload types; remote answers with its own.
                payload_type: 96 + i as u8,
            })
            .collect();
    }

    media_engine.codecs_for(track.kind).to_vec()
}

