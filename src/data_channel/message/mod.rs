
use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

// Message type bytes on a PPID 50 (DCEP) chunk.
pub(crate) const MESSAGE_TYPE_ACK: u8 = 0x02;
pub(crate) const MESSAGE_TYPE_OPEN: u8 = 0x03;
const MESSAGE_TYPE_LEN: usize = 1;

const CHANNEL_TYPE_RELIABLE: u8 = 0x00;
const CHANNEL_TYPE_RELIABLE_UNORDERED: u8 = 0x80;
const CHANNEL_TYPE_PARTIAL_RELIABLE_REXMIT: u8 = 0x01;
const CHANNEL_TYPE_PARTIAL_RELIABLE_REXMIT_UNORDERED: u8 = 0x81;
const CHANNEL_TYPE_PARTIAL_RELIABLE_TIMED: u8 = 0x02;
const CHANNEL_TYPE_PARTIAL_RELIABLE_TIMED_UNORDERED: u8 = 0x82;

const CHANNEL_OPEN_HEADER_LEN: usize = 11;

pub const CHANNEL_PRIORITY_NORMAL: u16 = 256;

fn unexpected_end_of_buffer(expected: usize, actual: usize) -> util::Error {
    util::Error::Other(format!(
        "unexpected end of buffer: expected {expected}, got {actual}"
    ))
}

/// The channel-type byte of an OPEN message, RFC 8832 section 5.1.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChannelType {
    /// In-order, reliable bi-directional communication.
    #[default]
    Reliable,
    /// Unordered, reliable bi-directional communication.
    ReliableUnordered,
    /// In-order communication, retransmitted at most
    /// reliability-parameter times.
    PartialReliableRexmit,
    PartialReliableRexmitUnordered,
    /// In-order communication, (re)transmitted only within a
    /// reliability-parameter lifetime in milliseconds.
    PartialReliableTimed,
    PartialReliableTimedUnordered,
}

impl ChannelType {
    /// Derives the channel type from the reliability knobs of a channel
    /// configuration. At most one of `max_packet_life_time` and
    /// `max_retransmits` is set; the caller has validated that.
    pub(crate) fn from_reliability(
        ordered: bool,
        max_packet_life_time: u16,
        max_retransmits: u16,
    ) -> Self {
        match (ordered, max_packet_life_time, max_retransmits) {
            (true, 0, 0) => ChannelType::Reliable,
            (false, 0, 0) => ChannelType::ReliableUnordered,
            (true, 0, _) => ChannelType::PartialReliableRexmit,
            (false, 0, _) => ChannelType::PartialReliableRexmitUnordered,
            (true, _, _) => ChannelType::PartialReliableTimed,
            (false, _, _) => ChannelType::PartialReliableTimedUnordered,
        }
    }

    pub(crate) fn is_ordered(&self) -> bool {
        matches!(
            self,
            ChannelType::Reliable
                | ChannelType::PartialReliableRexmit
                | ChannelType::PartialReliableTimed
        )
    }
}

impl MarshalSize for ChannelType {
    fn marshal_size(&self) -> usize {
        1
    }
}

impl Marshal for ChannelType {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        if buf.remaining_mut() < 1 {
            return Err(unexpected_end_of_buffer(1, buf.remaining_mut()));
        }

        let byte = match self {
            Self::Reliable => CHANNEL_TYPE_RELIABLE,
            Self::ReliableUnordered => CHANNEL_TYPE_RELIABLE_UNORDERED,
            Self::PartialReliableRexmit => CHANNEL_TYPE_PARTIAL_RELIABLE_REXMIT,
            Self::PartialReliableRexmitUnordered => CHANNEL_TYPE_PARTIAL_RELIABLE_REXMIT_UNORDERED,
            Self::PartialReliableTimed => CHANNEL_TYPE_PARTIAL_RELIABLE_TIMED,
            Self::PartialReliableTimedUnordered => CHANNEL_TYPE_PARTIAL_RELIABLE_TIMED_UNORDERED,
        };
        buf.put_u8(byte);

        Ok(1)
    }
}

impl Unmarshal for ChannelType {
    fn unmarshal<B>(buf: &mut B) -> Result<Self, util::Error>
    where
        B: Buf,
    {
        if buf.remaining() < 1 {
            return Err(unexpected_end_of_buffer(1, buf.remaining()));
        }

        match buf.get_u8() {
            CHANNEL_TYPE_RELIABLE => Ok(Self::Reliable),
            CHANNEL_TYPE_RELIABLE_UNORDERED => Ok(Self::ReliableUnordered),
            CHANNEL_TYPE_PARTIAL_RELIABLE_REXMIT => Ok(Self::PartialReliableRexmit),
            CHANNEL_TYPE_PARTIAL_RELIABLE_REXMIT_UNORDERED => {
                Ok(Self::PartialReliableRexmitUnordered)
            }
            CHANNEL_TYPE_PARTIAL_RELIABLE_TIMED => Ok(Self::PartialReliableTimed),
            CHANNEL_TYPE_PARTIAL_RELIABLE_TIMED_UNORDERED => {
                Ok(Self::PartialReliableTimedUnordered)
            }
            b => Err(util::Error::Other(format!("invalid channel type {b:#04x}"))),
        }
    }
}

/// The data-part of a DATA_CHANNEL_OPEN message without the message type.
///
/// ```plain
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | (Message Type)|  Channel Type |            Priority           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Reliability Parameter                      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Label Length          |       Protocol Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             Label                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            Protocol                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct DataChannelOpen {
    pub channel_type: ChannelType,
    pub priority: u16,
    pub reliability_parameter: u32,
    pub label: Vec<u8>,
    pub protocol: Vec<u8>,
}

impl MarshalSize for DataChannelOpen {
    fn marshal_size(&self) -> usize {
        CHANNEL_OPEN_HEADER_LEN + self.label.len() + self.protocol.len()
    }
}

impl Marshal for DataChannelOpen {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        let required_len = self.marshal_size();
        if buf.remaining_mut() < required_len {
            return Err(unexpected_end_of_buffer(required_len, buf.remaining_mut()));
        }

        let n = self.channel_type.marshal_to(buf)?;
        buf = &mut buf[n..];
        buf.put_u16(self.priority);
        buf.put_u32(self.reliability_parameter);
        buf.put_u16(self.label.len() as u16);
        buf.put_u16(self.protocol.len() as u16);
        buf.put_slice(&self.label);
        buf.put_slice(&self.protocol);

        Ok(required_len)
    }
}

impl Unmarshal for DataChannelOpen {
    fn unmarshal<B>(buf: &mut B) -> Result<Self, util::Error>
    where
        B: Buf,
    {
        if buf.remaining() < CHANNEL_OPEN_HEADER_LEN {
            return Err(unexpected_end_of_buffer(
                CHANNEL_OPEN_HEADER_LEN,
                buf.remaining(),
            ));
        }

        let channel_type = ChannelType::unmarshal(buf)?;
        let priority = buf.get_u16();
        let reliability_parameter = buf.get_u32();
        let label_len = buf.get_u16() as usize;
        let protocol_len = buf.get_u16() as usize;

        if buf.remaining() < label_len + protocol_len {
            return Err(unexpected_end_of_buffer(
                label_len + protocol_len,
                buf.remaining(),
            ));
        }

        let mut label = vec![0; label_len];
        let mut protocol = vec![0; protocol_len];
        buf.copy_to_slice(&mut label[..]);
        buf.copy_to_slice(&mut protocol[..]);

        Ok(Self {
            channel_type,
            priority,
            reliability_parameter,
            label,
            protocol,
        })
    }
}

/// A parsed DCEP message: DATA_CHANNEL_OPEN or DATA_CHANNEL_ACK.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Message {
    DataChannelAck,
    DataChannelOpen(DataChannelOpen),
}

impl MarshalSize for Message {
    fn marshal_size(&self) -> usize {
        match self {
            Message::DataChannelAck => MESSAGE_TYPE_LEN,
            Message::DataChannelOpen(open) => MESSAGE_TYPE_LEN + open.marshal_size(),
        }
    }
}

impl Marshal for Message {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize, util::Error> {
        if buf.remaining_mut() < MESSAGE_TYPE_LEN {
            return Err(unexpected_end_of_buffer(MESSAGE_TYPE_LEN, buf.remaining_mut()));
        }

        match self {
            Message::DataChannelAck => {
                buf.put_u8(MESSAGE_TYPE_ACK);
                Ok(MESSAGE_TYPE_LEN)
            }
            Message::DataChannelOpen(open) => {
                buf.put_u8(MESSAGE_TYPE_OPEN);
                let n = open.marshal_to(&mut buf[..])?;
                Ok(MESSAGE_TYPE_LEN + n)
            }
        }
    }
}

impl Unmarshal for Message {
    fn unmarshal<B>(buf: &mut B) -> Result<Self, util::Error>
    where
        B: Buf,
    {
        if buf.remaining() < MESSAGE_TYPE_LEN {
            return Err(unexpected_end_of_buffer(MESSAGE_TYPE_LEN, buf.remaining()));
        }

        match buf.get_u8() {
            MESSAGE_TYPE_ACK => Ok(Self::DataChannelAck),
            MESSAGE_TYPE_OPEN => Ok(Self::DataChannelOpen(DataChannelOpen::unmarshal(buf)?)),
            b => Err(util::Error::Other(format!("invalid message type {b:#04x}"))),
        }
    }
}
