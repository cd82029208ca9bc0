use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use util::Conn;

use crate::error::Result;

/// PayloadProtocolIdentifier is an enum for DataChannel payload types.
/// <https://www.iana.org/assignments/sctp-parameters/sctp-parameters.xhtml#sctp-parameters-25>
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum PayloadProtocolIdentifier {
    #[default]
    Unknown = 0,
    Dcep = 50,
    String = 51,
    /// Deprecated by RFC 8831, still recognized on receive.
    BinaryPartial = 52,
    Binary = 53,
    /// Deprecated by RFC 8831, still recognized on receive.
    StringPartial = 54,
    StringEmpty = 56,
    BinaryEmpty = 57,
}

impl From<u32> for PayloadProtocolIdentifier {
    fn from(v: u32) -> Self {
        match v {
            50 => PayloadProtocolIdentifier::Dcep,
            51 => PayloadProtocolIdentifier::String,
            52 => PayloadProtocolIdentifier::BinaryPartial,
            53 => PayloadProtocolIdentifier::Binary,
            54 => PayloadProtocolIdentifier::StringPartial,
            56 => PayloadProtocolIdentifier::StringEmpty,
            57 => PayloadProtocolIdentifier::BinaryEmpty,
            _ => PayloadProtocolIdentifier::Unknown,
        }
    }
}

impl fmt::Display for PayloadProtocolIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            PayloadProtocolIdentifier::Dcep => "WebRTC DCEP",
            PayloadProtocolIdentifier::String => "WebRTC String",
            PayloadProtocolIdentifier::BinaryPartial => "WebRTC Binary Partial (deprecated)",
            PayloadProtocolIdentifier::Binary => "WebRTC Binary",
            PayloadProtocolIdentifier::StringPartial => "WebRTC String Partial (deprecated)",
            PayloadProtocolIdentifier::StringEmpty => "WebRTC String (Empty)",
            PayloadProtocolIdentifier::BinaryEmpty => "WebRTC Binary (Empty)",
            _ => "Unknown Payload Protocol Identifier",
        };
        write!(f, "{s}")
    }
}

/// Partial-reliability policy of an outbound stream, RFC 3758.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReliabilityType {
    /// Reliable transmission.
    #[default]
    Reliable = 0,
    /// Retransmission limited by lifetime in milliseconds.
    Timed = 1,
    /// Retransmission limited by count.
    Rexmit = 2,
}

pub type OnBufferedAmountLowFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// Parameters for bringing an association up over the secured transport.
#[derive(Debug, Clone)]
pub struct SctpAssociationConfig {
    /// true sends the INIT (we have local channels waiting); false
    /// waits for the remote INIT.
    pub is_client: bool,
    pub source_port: u16,
    pub destination_port: u16,
    pub max_receive_buffer_size: u32,
    pub max_message_size: u32,
}

/// SctpEngine is the chunk-level collaborator: INIT/SACK handling,
/// congestion control and reassembly live behind this seam.
#[async_trait]
pub trait SctpEngine: Send + Sync {
    /// Brings the association up over `conn` (the DTLS application
    /// stream). Blocks until the handshake finished; bring-up timeout
    /// policy belongs to the caller.
    async fn associate(
        &self,
        conn: Arc<dyn Conn + Send + Sync>,
        config: SctpAssociationConfig,
    ) -> Result<Arc<dyn SctpAssociation + Send + Sync>>;
}

/// An established SCTP association.
#[async_trait]
pub trait SctpAssociation: Send + Sync {
    /// Opens an outbound stream with the given identifier.
    async fn open_stream(
        &self,
        stream_identifier: u16,
        default_payload_type: PayloadProtocolIdentifier,
    ) -> Result<Arc<dyn SctpStream + Send + Sync>>;

    /// Resolves with the next stream opened by the remote; None once
    /// the association closed.
    async fn accept_stream(&self) -> Option<Arc<dyn SctpStream + Send + Sync>>;

    /// Largest message this association accepts for send.
    fn max_message_size(&self) -> u32;

    async fn shutdown(&self) -> Result<()>;
}

/// A single SCTP stream of an association.
#[async_trait]
pub trait SctpStream: Send + Sync {
    fn stream_identifier(&self) -> u16;

    fn set_default_payload_type(&self, ppid: PayloadProtocolIdentifier);

    fn set_reliability_params(&self, unordered: bool, rel_type: ReliabilityType, rel_val: u32);

    /// Writes `data` as one message with the given PPID; the message is
    /// delivered (or expired) according to the stream's reliability
    /// parameters, in order iff the stream is ordered.
    async fn write_sctp(&self, data: &Bytes, ppid: PayloadProtocolIdentifier) -> Result<usize>;

    /// Reads the next message; (0, Unknown) signals a reset stream.
    async fn read_sctp(&self, buf: &mut [u8]) -> Result<(usize, PayloadProtocolIdentifier)>;

    fn buffered_amount(&self) -> usize;

    fn set_buffered_amount_low_threshold(&self, threshold: usize);

    async fn on_buffered_amount_low(&self, f: OnBufferedAmountLowFn);

    async fn close(&self) -> Result<()>;
}
