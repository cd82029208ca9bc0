
pub mod data_channel_init;
pub mod data_channel_message;
pub mod data_channel_parameters;
pub mod data_channel_state;
pub mod message;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use portable_atomic::AtomicUsize;
use tokio::sync::Mutex;
use util::marshal::{Marshal, Unmarshal};

use crate::api::setting_engine::SettingEngine;
use crate::data_channel::data_channel_message::DataChannelMessage;
use crate::data_channel::data_channel_parameters::DataChannelParameters;
use crate::data_channel::data_channel_state::RTCDataChannelState;
use crate::data_channel::message::{
    ChannelType, DataChannelOpen, Message, CHANNEL_PRIORITY_NORMAL,
};
use crate::error::{Error, Result};
use crate::sctp_transport::sctp_engine::{
    PayloadProtocolIdentifier, ReliabilityType, SctpStream,
};
use crate::sctp_transport::RTCSctpTransport;

pub type OnMessageHdlrFn = Box<
    dyn (FnMut(DataChannelMessage) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnOpenHdlrFn =
    Box<dyn (FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

pub type OnCloseHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

pub type OnErrorHdlrFn = Box<
    dyn (FnMut(Error) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

pub type OnBufferedAmountLowFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// RTCDataChannel represents a bi-directional data channel between two
/// peers, multiplexed as one SCTP stream of the association.
impl std::fmt::Debug for RTCDataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTCDataChannel")
            .field("stats_id", &self.stats_id)
            .field("label", &self.label)
            .finish()
    }
}

pub struct RTCDataChannel {
    pub(crate) stats_id: String,

    pub(crate) label: String,
    pub(crate) protocol: String,
    pub(crate) ordered: bool,
    pub(crate) max_packet_lifetime: u16,
    pub(crate) max_retransmits: u16,
    pub(crate) negotiated: bool,

    pub(crate) id: AtomicU16,
    pub(crate) ready_state: Arc<AtomicU8>, // RTCDataChannelState
    pub(crate) max_message_size: AtomicUsize,

    pub(crate) stream: Mutex<Option<Arc<dyn SctpStream + Send + Sync>>>,
    /// Back-reference for deregistering on close; weak, the transport
    /// owns the registry which owns the channels.
    pub(crate) sctp_transport: Mutex<Option<Weak<RTCSctpTransport>>>,
    pub(crate) buffered_amount_low_threshold: AtomicUsize,

    pub(crate) on_message_handler: Arc<Mutex<Option<OnMessageHdlrFn>>>,
    pub(crate) on_open_handler: Arc<Mutex<Option<OnOpenHdlrFn>>>,
    pub(crate) on_close_handler: Arc<Mutex<Option<OnCloseHdlrFn>>>,
    pub(crate) on_error_handler: Arc<Mutex<Option<OnErrorHdlrFn>>>,
    pub(crate) on_buffered_amount_low: Mutex<Option<OnBufferedAmountLowFn>>,

    pub(crate) setting_engine: Arc<SettingEngine>,

    // stats
    pub(crate) messages_sent: Arc<AtomicUsize>,
    pub(crate) messages_received: Arc<AtomicUsize>,
    pub(crate) bytes_sent: Arc<AtomicUsize>,
    pub(crate) bytes_received: Arc<AtomicUsize>,
}

impl RTCDataChannel {
    pub(crate) fn new(params: DataChannelParameters, setting_engine: Arc<SettingEngine>) -> Self {
        RTCDataChannel {
            stats_id: format!("DataChannel-{}", params.label),
            label: params.label,
            protocol: params.protocol,
            ordered: params.ordered,
            max_packet_lifetime: params.max_packet_life_time,
            max_retransmits: params.max_retransmits,
            negotiated: params.negotiated,
            id: AtomicU16::new(params.id),
            ready_state: Arc::new(AtomicU8::new(RTCDataChannelState::Connecting as u8)),
            max_message_size: AtomicUsize::new(0),
            stream: Mutex::new(None),
            sctp_transport: Mutex::new(None),
            buffered_amount_low_threshold: AtomicUsize::new(0),
            on_message_handler: Arc::new(Default::default()),
            on_open_handler: Arc::new(Default::default()),
            on_close_handler: Arc::new(Default::default()),
            on_error_handler: Arc::new(Default::default()),
            on_buffered_amount_low: Mutex::new(None),
            setting_engine,
            messages_sent: Arc::new(AtomicUsize::new(0)),
            messages_received: Arc::new(AtomicUsize::new(0)),
            bytes_sent: Arc::new(AtomicUsize::new(0)),
            bytes_received: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opens this channel over an established SCTP association. Called
    /// for locally-created channels once the transport is connected.
    pub(crate) async fn open(
        self: &Arc<Self>,
        sctp_transport: Arc<RTCSctpTransport>,
    ) -> Result<()> {
        if self.ready_state() != RTCDataChannelState::Connecting {
            return Ok(());
        }

        let association = sctp_transport
            .association()
            .await
            .ok_or(Error::ErrSctpNotEstablished)?;

        {
            let mut transport = self.sctp_transport.lock().await;
            *transport = Some(Arc::downgrade(&sctp_transport));
        }

        if !self.negotiated {
            sctp_transport
                .generate_and_set_data_channel_id(self)
                .await?;
        }

        let stream = association
            .open_stream(self.id(), PayloadProtocolIdentifier::Binary)
            .await?;

        self.configure_reliability(&stream);
        self.max_message_size
            .store(association.max_message_size() as usize, Ordering::SeqCst);

        if self.negotiated {
            // Out-of-band negotiated channels skip DCEP and are usable
            // as soon as the stream exists.
            self.set_stream(Arc::clone(&stream)).await;
            self.set_ready_state(RTCDataChannelState::Open);
            self.start_read_loop(stream);
            self.do_open().await;
        } else {
            let open = Message::DataChannelOpen(DataChannelOpen {
                channel_type: ChannelType::from_reliability(
                    self.ordered,
                    self.max_packet_lifetime,
                    self.max_retransmits,
                ),
                priority: CHANNEL_PRIORITY_NORMAL,
                reliability_parameter: self.reliability_parameter(),
                label: self.label.bytes().collect(),
                protocol: self.protocol.bytes().collect(),
            });

            let raw = open.marshal()?;
            stream
                .write_sctp(&raw, PayloadProtocolIdentifier::Dcep)
                .await?;

            // Stays connecting until the remote confirms with DCEP ACK.
            self.set_stream(Arc::clone(&stream)).await;
            self.start_read_loop(stream);
        }

        Ok(())
    }

    /// Builds a channel for a stream the remote opened: the OPEN message
    /// has been parsed, the channel starts out open and the ACK goes out
    /// before the caller announces it.
    pub(crate) async fn accept_stream(
        stream: Arc<dyn SctpStream + Send + Sync>,
        open: DataChannelOpen,
        max_message_size: usize,
        setting_engine: Arc<SettingEngine>,
    ) -> Result<Arc<Self>> {
        let (max_packet_lifetime, max_retransmits) = match open.channel_type {
            ChannelType::PartialReliableTimed | ChannelType::PartialReliableTimedUnordered => {
                (open.reliability_parameter as u16, 0)
            }
            ChannelType::PartialReliableRexmit | ChannelType::PartialReliableRexmitUnordered => {
                (0, open.reliability_parameter as u16)
            }
            _ => (0, 0),
        };

        let params = DataChannelParameters {
            label: String::from_utf8(open.label.clone())
                .map_err(|e| Error::new(format!("invalid UTF-8 in channel label: {e}")))?,
            protocol: String::from_utf8(open.protocol.clone())
                .map_err(|e| Error::new(format!("invalid UTF-8 in channel protocol: {e}")))?,
            ordered: open.channel_type.is_ordered(),
            max_packet_life_time: max_packet_lifetime,
            max_retransmits,
            negotiated: false,
            id: stream.stream_identifier(),
        };

        let channel = Arc::new(RTCDataChannel::new(params, setting_engine));
        channel.configure_reliability(&stream);
        channel
            .max_message_size
            .store(max_message_size, Ordering::SeqCst);

        let ack = Message::DataChannelAck.marshal()?;
        stream
            .write_sctp(&ack, PayloadProtocolIdentifier::Dcep)
            .await?;

        channel.set_stream(Arc::clone(&stream)).await;
        channel.set_ready_state(RTCDataChannelState::Open);
        // The reader is spawned by the transport once ondatachannel ran,
        // so handlers registered there cannot miss early messages.

        Ok(channel)
    }

    /// Starts consuming the stream. Split from construction so the
    /// transport can announce the channel before any message is read.
    pub(crate) async fn spawn_read_loop(self: &Arc<Self>) {
        let stream = {
            let stream = self.stream.lock().await;
            stream.clone()
        };
        if let Some(stream) = stream {
            self.start_read_loop(stream);
        }
    }

    fn configure_reliability(&self, stream: &Arc<dyn SctpStream + Send + Sync>) {
        let (rel_type, rel_val) = if self.max_packet_lifetime != 0 {
            (ReliabilityType::Timed, u32::from(self.max_packet_lifetime))
        } else if self.max_retransmits != 0 {
            (ReliabilityType::Rexmit, u32::from(self.max_retransmits))
        } else {
            (ReliabilityType::Reliable, 0)
        };

        stream.set_reliability_params(!self.ordered, rel_type, rel_val);
    }

    fn reliability_parameter(&self) -> u32 {
        if self.max_packet_lifetime != 0 {
            u32::from(self.max_packet_lifetime)
        } else {
            u32::from(self.max_retransmits)
        }
    }

    async fn set_stream(&self, stream: Arc<dyn SctpStream + Send + Sync>) {
        let threshold = self.buffered_amount_low_threshold.load(Ordering::SeqCst);
        stream.set_buffered_amount_low_threshold(threshold);

        let pending_handler = {
            let mut handler = self.on_buffered_amount_low.lock().await;
            handler.take()
        };
        if let Some(f) = pending_handler {
            stream.on_buffered_amount_low(f).await;
        }

        let mut current = self.stream.lock().await;
        *current = Some(stream);
    }

    fn start_read_loop(self: &Arc<Self>, stream: Arc<dyn SctpStream + Send + Sync>) {
        let channel = Arc::clone(self);
        let receive_mtu = self.setting_engine.get_receive_mtu();
        tokio::spawn(async move {
            let mut buf = vec![0u8; receive_mtu];
            loop {
                let (n, ppid) = match stream.read_sctp(&mut buf).await {
                    Ok((0, PayloadProtocolIdentifier::Unknown)) => {
                        // Stream reset by the remote or shutdown of the
                        // reading half.
                        break;
                    }
                    Ok((n, ppid)) => (n, ppid),
                    Err(err) => {
                        log::warn!(
                            "datachannel {} read loop exiting: {err}",
                            channel.label
                        );
                        channel.do_error(err).await;
                        break;
                    }
                };

                match ppid {
                    PayloadProtocolIdentifier::Dcep => {
                        let mut data = &buf[..n];
                        if let Err(err) = channel.handle_dcep(&mut data).await {
                            log::warn!("failed to handle DCEP: {err}");
                        }
                    }
                    PayloadProtocolIdentifier::String
                    | PayloadProtocolIdentifier::StringPartial => {
                        channel
                            .do_message(true, Bytes::copy_from_slice(&buf[..n]))
                            .await;
                    }
                    PayloadProtocolIdentifier::StringEmpty => {
                        channel.do_message(true, Bytes::new()).await;
                    }
                    PayloadProtocolIdentifier::Binary
                    | PayloadProtocolIdentifier::BinaryPartial => {
                        channel
                            .do_message(false, Bytes::copy_from_slice(&buf[..n]))
                            .await;
                    }
                    PayloadProtocolIdentifier::BinaryEmpty => {
                        channel.do_message(false, Bytes::new()).await;
                    }
                    PayloadProtocolIdentifier::Unknown => {
                        log::warn!(
                            "datachannel {}: dropping chunk with unknown PPID",
                            channel.label
                        );
                    }
                }
            }

            channel.set_ready_state(RTCDataChannelState::Closed);
            channel.deregister().await;
            channel.do_close().await;
        });
    }

    pub(crate) async fn set_sctp_transport(&self, transport: Weak<RTCSctpTransport>) {
        let mut sctp_transport = self.sctp_transport.lock().await;
        *sctp_transport = Some(transport);
    }

    /// Drops the channel from the transport registry; further inbound
    /// chunks for the stream id are warned about and discarded.
    async fn deregister(self: &Arc<Self>) {
        let transport = {
            let sctp_transport = self.sctp_transport.lock().await;
            sctp_transport.clone()
        };
        if let Some(transport) = transport.and_then(|weak| weak.upgrade()) {
            transport.remove_data_channel(self).await;
        }
    }

    async fn handle_dcep(self: &Arc<Self>, data: &mut &[u8]) -> Result<()> {
        let msg = Message::unmarshal(data)?;
        match msg {
            Message::DataChannelAck => {
                if self.ready_state() == RTCDataChannelState::Connecting {
                    self.set_ready_state(RTCDataChannelState::Open);
                    self.do_open().await;
                } else {
                    log::debug!(
                        "datachannel {}: ignoring ACK in state {}",
                        self.label,
                        self.ready_state()
                    );
                }
            }
            Message::DataChannelOpen(_) => {
                log::warn!(
                    "datachannel {}: unexpected DATA_CHANNEL_OPEN on established stream",
                    self.label
                );
            }
        }

        Ok(())
    }

    async fn do_open(&self) {
        let on_open_handler = {
            let mut handler = self.on_open_handler.lock().await;
            handler.take()
        };
        if let Some(f) = on_open_handler {
            f().await;
        }
    }

    async fn do_message(&self, is_string: bool, data: Bytes) {
        self.messages_received.fetch_add(1, Ordering::SeqCst);
        self.bytes_received.fetch_add(data.len(), Ordering::SeqCst);

        let mut handler = self.on_message_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(DataChannelMessage { is_string, data }).await;
        }
    }

    async fn do_close(&self) {
        let mut handler = self.on_close_handler.lock().await;
        if let Some(f) = &mut *handler {
            f().await;
        }
    }

    async fn do_error(&self, err: Error) {
        let mut handler = self.on_error_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(err).await;
        }
    }

    /// Sets a handler which fires when the channel transitions to open.
    /// For channels announced by the remote the channel is already open
    /// when ondatachannel delivers it.
    pub async fn on_open(&self, f: OnOpenHdlrFn) {
        if self.ready_state() == RTCDataChannelState::Open {
            f().await;
        } else {
            let mut handler = self.on_open_handler.lock().await;
            *handler = Some(f);
        }
    }

    /// Sets a handler which is invoked on every inbound message, in
    /// arrival order.
    pub async fn on_message(&self, f: OnMessageHdlrFn) {
        let mut handler = self.on_message_handler.lock().await;
        *handler = Some(f);
    }

    /// Sets a handler which fires when the channel has fully closed.
    pub async fn on_close(&self, f: OnCloseHdlrFn) {
        let mut handler = self.on_close_handler.lock().await;
        *handler = Some(f);
    }

    /// Sets a handler which fires on transport errors; close follows.
    pub async fn on_error(&self, f: OnErrorHdlrFn) {
        let mut handler = self.on_error_handler.lock().await;
        *handler = Some(f);
    }

    /// Sends binary data to the remote peer. Fails synchronously if the
    /// message exceeds the negotiated maximum message size.
    pub async fn send(&self, data: &Bytes) -> Result<usize> {
        self.ensure_open()?;

        let stream = self.require_stream().await?;
        self.check_size(data.len())?;

        let ppid = if data.is_empty() {
            PayloadProtocolIdentifier::BinaryEmpty
        } else {
            PayloadProtocolIdentifier::Binary
        };

        self.write_chunk(&stream, data, ppid).await
    }

    /// Sends `text` as a UTF-8 string message.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<usize> {
        self.ensure_open()?;

        let text = text.into();
        let stream = self.require_stream().await?;
        self.check_size(text.len())?;

        let data = Bytes::from(text);
        let ppid = if data.is_empty() {
            PayloadProtocolIdentifier::StringEmpty
        } else {
            PayloadProtocolIdentifier::String
        };

        self.write_chunk(&stream, &data, ppid).await
    }

    async fn write_chunk(
        &self,
        stream: &Arc<dyn SctpStream + Send + Sync>,
        data: &Bytes,
        ppid: PayloadProtocolIdentifier,
    ) -> Result<usize> {
        // SCTP cannot carry a zero length chunk; the empty PPIDs mark a
        // single padding byte that the receiver discards.
        let n = if data.is_empty() {
            stream
                .write_sctp(&Bytes::from_static(&[0]), ppid)
                .await?;
            0
        } else {
            stream.write_sctp(data, ppid).await?
        };

        self.messages_sent.fetch_add(1, Ordering::SeqCst);
        self.bytes_sent.fetch_add(n, Ordering::SeqCst);

        Ok(n)
    }

    fn check_size(&self, len: usize) -> Result<()> {
        let max = self.max_message_size.load(Ordering::SeqCst);
        if max != 0 && len > max {
            return Err(Error::ErrOutboundPacketTooLarge);
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.ready_state() != RTCDataChannelState::Open {
            Err(Error::ErrDataChannelNotOpen)
        } else {
            Ok(())
        }
    }

    async fn require_stream(&self) -> Result<Arc<dyn SctpStream + Send + Sync>> {
        let stream = self.stream.lock().await;
        stream.clone().ok_or(Error::ErrDataChannelNotOpen)
    }

    /// Closes the channel; the remote observes a stream reset.
    pub async fn close(self: &Arc<Self>) -> Result<()> {
        let state = self.ready_state();
        if state == RTCDataChannelState::Closing || state == RTCDataChannelState::Closed {
            return Ok(());
        }

        let stream = {
            let stream = self.stream.lock().await;
            stream.clone()
        };

        match stream {
            Some(stream) => {
                self.set_ready_state(RTCDataChannelState::Closing);
                // The read loop observes the reset, deregisters the
                // stream id and completes the transition to closed.
                stream.close().await
            }
            None => {
                // Never attached to a stream; nothing in flight.
                self.set_ready_state(RTCDataChannelState::Closed);
                self.deregister().await;
                self.do_close().await;
                Ok(())
            }
        }
    }

    /// The label agreed at creation; not required to be unique.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true if data on this channel arrives in issue order.
    pub fn ordered(&self) -> bool {
        self.ordered
    }

    pub fn max_packet_lifetime(&self) -> u16 {
        self.max_packet_lifetime
    }

    pub fn max_retransmits(&self) -> u16 {
        self.max_retransmits
    }

    /// The subprotocol name agreed at creation.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Whether the channel was negotiated out-of-band by the application.
    pub fn negotiated(&self) -> bool {
        self.negotiated
    }

    /// The SCTP stream id; 0 is a valid id, inspect ready_state to know
    /// whether the channel has been assigned one.
    pub fn id(&self) -> u16 {
        self.id.load(Ordering::SeqCst)
    }

    pub fn ready_state(&self) -> RTCDataChannelState {
        self.ready_state.load(Ordering::SeqCst).into()
    }

    pub(crate) fn set_ready_state(&self, state: RTCDataChannelState) {
        self.ready_state.store(state as u8, Ordering::SeqCst);
    }

    /// The number of bytes queued for sending on the underlying stream.
    pub async fn buffered_amount(&self) -> usize {
        let stream = self.stream.lock().await;
        stream.as_ref().map(|s| s.buffered_amount()).unwrap_or(0)
    }

    pub fn buffered_amount_low_threshold(&self) -> usize {
        self.buffered_amount_low_threshold.load(Ordering::SeqCst)
    }

    /// Sets the threshold below which buffered_amount is considered low;
    /// on_buffered_amount_low fires when crossing it downwards.
    pub async fn set_buffered_amount_low_threshold(&self, threshold: usize) {
        self.buffered_amount_low_threshold
            .store(threshold, Ordering::SeqCst);
        let stream = self.stream.lock().await;
        if let Some(stream) = &*stream {
            stream.set_buffered_amount_low_threshold(threshold);
        }
    }

    pub async fn on_buffered_amount_low(&self, f: OnBufferedAmountLowFn) {
        let stream = {
            let stream = self.stream.lock().await;
            stream.clone()
        };
        if let Some(stream) = stream {
            stream.on_buffered_amount_low(f).await;
        } else {
            let mut handler = self.on_buffered_amount_low.lock().await;
            *handler = Some(f);
        }
    }
}
