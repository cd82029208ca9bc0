/// Configuration of the channel negotiated in the DCEP OPEN message
/// (or out-of-band for negotiated channels).
///
/// ## Specifications
///
/// * [W3C]
///
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannelinit
#[derive(Default, Debug, Clone)]
pub struct RTCDataChannelInit {
    /// ordered indicates if data is allowed to be delivered out of order. The
    /// default value of true, guarantees that data will be delivered in order.
    pub ordered: Option<bool>,

    /// max_packet_life_time limits the time (in milliseconds) during which the
    /// channel will transmit or retransmit data if not acknowledged.
    /// Mutually exclusive with max_retransmits.
    pub max_packet_life_time: Option<u16>,

    /// max_retransmits limits the number of times a channel will retransmit data
    /// if not successfully delivered. Mutually exclusive with max_packet_life_time.
    pub max_retransmits: Option<u16>,

    /// protocol describes the subprotocol name used for this channel.
    pub protocol: Option<String>,

    /// negotiated, when true, skips DCEP: the application declares the channel
    /// on both sides out-of-band and must supply the same id on each.
    pub negotiated: Option<bool>,

    /// id overrides the stream id. Required when negotiated is set; otherwise
    /// ids are allocated at open time per the DTLS role parity rule.
    pub id: Option<u16>,
}
