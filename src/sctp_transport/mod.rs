
pub mod sctp_engine;
pub mod sctp_transport_capabilities;
pub mod sctp_transport_state;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use util::marshal::Unmarshal;

use crate::data_channel::message::Message;
use crate::data_channel::data_channel_state::RTCDataChannelState;
use crate::data_channel::RTCDataChannel;
use crate::api::setting_engine::SettingEngine;
use crate::dtls_transport::dtls_role::DTLSRole;
use crate::dtls_transport::RTCDtlsTransport;
use crate::error::{Error, Result};
use crate::sctp_transport::sctp_engine::{
    PayloadProtocolIdentifier, SctpAssociation, SctpAssociationConfig, SctpEngine, SctpStream,
};
use crate::sctp_transport::sctp_transport_capabilities::SCTPTransportCapabilities;
use crate::sctp_transport::sctp_transport_state::RTCSctpTransportState;

/// Both sides of the association default to this port unless the SDP
/// advertises otherwise.
pub(crate) const DEFAULT_SCTP_PORT: u16 = 5000;

/// The message size this side advertises in a=max-message-size.
pub(crate) const DEFAULT_MAX_MESSAGE_SIZE: u32 = 262_144;

/// Assumed remote limit when the peer's SDP does not advertise one
/// (RFC 8841, section 6.1).
pub(crate) const DEFAULT_REMOTE_MAX_MESSAGE_SIZE: u32 = 65_536;

pub type OnDataChannelHdlrFn = Box<
    dyn (FnMut(Arc<RTCDataChannel>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnDataChannelOpenedHdlrFn = Box<
    dyn (FnMut(Arc<RTCDataChannel>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnSctpStateChangeHdlrFn = Box<
    dyn (FnMut(RTCSctpTransportState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnErrorHdlrFn = Box<
    dyn (FnMut(Error) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

/// Channels created before the association exists wait in `pending`;
/// once a stream id is assigned they live in `active`, keyed by it.
#[derive(Default)]
pub(crate) struct DataChannelRegistry {
    pub(crate) pending: Vec<Arc<RTCDataChannel>>,
    pub(crate) active: HashMap<u16, Arc<RTCDataChannel>>,
}

impl DataChannelRegistry {
    fn stream_id_in_use(&self, id: u16) -> bool {
        self.active.contains_key(&id)
            || self
                .pending
                .iter()
                .any(|d| d.negotiated() && d.id() == id)
    }

    pub(crate) fn all(&self) -> Vec<Arc<RTCDataChannel>> {
        self.pending
            .iter()
            .chain(self.active.values())
            .cloned()
            .collect()
    }
}

/// RTCSctpTransport brings the association up over the established DTLS
/// stream, owns the data-channel registry and bridges inbound streams
/// to channel objects.
pub struct RTCSctpTransport {
    pub(crate) dtls_transport: Arc<RTCDtlsTransport>,
    pub(crate) engine: Arc<dyn SctpEngine + Send + Sync>,
    pub(crate) setting_engine: Arc<SettingEngine>,

    state: Arc<AtomicU8>, // RTCSctpTransportState
    state_tx: watch::Sender<RTCSctpTransportState>,
    is_started: AtomicBool,

    source_port: AtomicU16,
    destination_port: AtomicU16,
    max_message_size: u32,
    remote_max_message_size: AtomicU32,

    association: Mutex<Option<Arc<dyn SctpAssociation + Send + Sync>>>,

    pub(crate) registry: Arc<Mutex<DataChannelRegistry>>,

    on_state_change_handler: Arc<Mutex<Option<OnSctpStateChangeHdlrFn>>>,
    on_error_handler: Arc<Mutex<Option<OnErrorHdlrFn>>>,
    on_data_channel_handler: Arc<Mutex<Option<OnDataChannelHdlrFn>>>,
    on_data_channel_opened_handler: Arc<Mutex<Option<OnDataChannelOpenedHdlrFn>>>,

    // stats
    pub(crate) data_channels_requested: Arc<AtomicU32>,
    pub(crate) data_channels_accepted: Arc<AtomicU32>,
    pub(crate) data_channels_opened: Arc<AtomicU32>,
}

impl RTCSctpTransport {
    pub(crate) fn new(
        dtls_transport: Arc<RTCDtlsTransport>,
        engine: Arc<dyn SctpEngine + Send + Sync>,
        setting_engine: Arc<SettingEngine>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(RTCSctpTransportState::Closed);
        RTCSctpTransport {
            dtls_transport,
            engine,
            setting_engine,
            state: Arc::new(AtomicU8::new(RTCSctpTransportState::Closed as u8)),
            state_tx,
            is_started: AtomicBool::new(false),
            source_port: AtomicU16::new(DEFAULT_SCTP_PORT),
            destination_port: AtomicU16::new(DEFAULT_SCTP_PORT),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            remote_max_message_size: AtomicU32::new(DEFAULT_REMOTE_MAX_MESSAGE_SIZE),
            association: Mutex::new(None),
            registry: Arc::new(Mutex::new(Default::default())),
            on_state_change_handler: Arc::new(Default::default()),
            on_error_handler: Arc::new(Default::default()),
            on_data_channel_handler: Arc::new(Default::default()),
            on_data_channel_opened_handler: Arc::new(Default::default()),
            data_channels_requested: Arc::new(AtomicU32::new(0)),
            data_channels_accepted: Arc::new(AtomicU32::new(0)),
            data_channels_opened: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Returns the RTCDtlsTransport the association runs over.
    pub fn transport(&self) -> Arc<RTCDtlsTransport> {
        Arc::clone(&self.dtls_transport)
    }

    /// Returns the current SCTP transport state.
    pub fn state(&self) -> RTCSctpTransportState {
        self.state.load(Ordering::SeqCst).into()
    }

    async fn set_state(&self, state: RTCSctpTransportState) {
        self.state.store(state as u8, Ordering::SeqCst);
        let _ = self.state_tx.send(state);

        let mut handler = self.on_state_change_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(state).await;
        }
    }

    /// The message size advertised in a=max-message-size.
    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub(crate) fn set_remote_port(&self, port: u16) {
        self.destination_port.store(port, Ordering::SeqCst);
    }

    pub(crate) fn remote_port(&self) -> u16 {
        self.destination_port.load(Ordering::SeqCst)
    }

    pub(crate) async fn association(&self) -> Option<Arc<dyn SctpAssociation + Send + Sync>> {
        let association = self.association.lock().await;
        association.clone()
    }

    /// Starts the association once DTLS completed. Bring-up is active
    /// (we send the INIT, bounded by the associate timeout) iff at least
    /// one channel is waiting; otherwise we sit passive for the remote
    /// INIT.
    pub async fn start(
        self: &Arc<Self>,
        remote_caps: SCTPTransportCapabilities,
    ) -> Result<()> {
        if self.is_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let dtls_conn = match self.dtls_transport.conn().await {
            Some(conn) => conn,
            None => {
                self.is_started.store(false, Ordering::SeqCst);
                return Err(Error::ErrDtlsTransportNotStarted);
            }
        };

        if remote_caps.max_message_size != 0 {
            self.remote_max_message_size
                .store(remote_caps.max_message_size, Ordering::SeqCst);
        }

        let has_pending = {
            let registry = self.registry.lock().await;
            !registry.pending.is_empty()
        };

        let config = SctpAssociationConfig {
            is_client: has_pending,
            source_port: self.source_port.load(Ordering::SeqCst),
            destination_port: self.destination_port.load(Ordering::SeqCst),
            max_receive_buffer_size: self.setting_engine.get_sctp_max_receive_buffer_size(),
            max_message_size: self.remote_max_message_size.load(Ordering::SeqCst),
        };

        self.set_state(RTCSctpTransportState::Connecting).await;

        if has_pending {
            let timeout = self.setting_engine.timeout.sctp_associate_timeout;
            match tokio::time::timeout(timeout, self.engine.associate(dtls_conn, config)).await {
                Ok(Ok(association)) => {
                    self.finish_start(association).await;
                    Ok(())
                }
                Ok(Err(err)) => {
                    self.set_state(RTCSctpTransportState::Closed).await;
                    self.is_started.store(false, Ordering::SeqCst);
                    Err(err)
                }
                Err(_) => {
                    self.set_state(RTCSctpTransportState::Closed).await;
                    self.is_started.store(false, Ordering::SeqCst);
                    Err(Error::ErrSctpAssociationTimeout(timeout.as_millis() as u64))
                }
            }
        } else {
            let transport = Arc::clone(self);
            tokio::spawn(async move {
                match transport.engine.associate(dtls_conn, config).await {
                    Ok(association) => transport.finish_start(association).await,
                    Err(err) => {
                        log::warn!("passive SCTP association failed: {err}");
                        transport.set_state(RTCSctpTransportState::Closed).await;
                        transport.is_started.store(false, Ordering::SeqCst);
                        transport.do_error(err).await;
                    }
                }
            });
            Ok(())
        }
    }

    async fn finish_start(self: &Arc<Self>, association: Arc<dyn SctpAssociation + Send + Sync>) {
        {
            let mut current = self.association.lock().await;
            *current = Some(Arc::clone(&association));
        }

        self.set_state(RTCSctpTransportState::Connected).await;
        self.start_accept_loop(Arc::clone(&association));
        self.flush_pending_channels().await;
    }

    /// Moves every waiting channel out of pending and opens it.
    /// Channels opened here enter the active set with their assigned
    /// stream id; a failed open is logged and the channel dropped.
    async fn flush_pending_channels(self: &Arc<Self>) {
        let pending = {
            let mut registry = self.registry.lock().await;
            std::mem::take(&mut registry.pending)
        };

        let mut opened_count = 0u32;
        for channel in pending {
            if channel.ready_state() != RTCDataChannelState::Connecting {
                continue;
            }

            if let Err(err) = channel.open(Arc::clone(self)).await {
                log::warn!("failed to open data channel: {err}");
                continue;
            }

            {
                let mut registry = self.registry.lock().await;
                registry.active.insert(channel.id(), Arc::clone(&channel));
            }

            opened_count += 1;
            self.do_data_channel_opened(channel).await;
        }

        self.data_channels_opened
            .fetch_add(opened_count, Ordering::SeqCst);
    }

    /// Registers a channel created before the association is connected.
    pub(crate) async fn register_pending_channel(&self, channel: Arc<RTCDataChannel>) {
        let mut registry = self.registry.lock().await;
        registry.pending.push(channel);
    }

    /// Opens a channel right away; the association must be connected.
    pub(crate) async fn open_channel_now(
        self: &Arc<Self>,
        channel: &Arc<RTCDataChannel>,
    ) -> Result<()> {
        channel.open(Arc::clone(self)).await?;

        {
            let mut registry = self.registry.lock().await;
            registry.active.insert(channel.id(), Arc::clone(channel));
        }

        self.data_channels_opened.fetch_add(1, Ordering::SeqCst);
        self.do_data_channel_opened(Arc::clone(channel)).await;
        Ok(())
    }

    fn start_accept_loop(
        self: &Arc<Self>,
        association: Arc<dyn SctpAssociation + Send + Sync>,
    ) {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(stream) = association.accept_stream().await {
                if let Err(err) = transport.handle_inbound_stream(stream).await {
                    log::warn!("failed to accept remote data channel: {err}");
                }
            }
            log::trace!("sctp accept loop exited");
        });
    }

    async fn handle_inbound_stream(
        self: &Arc<Self>,
        stream: Arc<dyn SctpStream + Send + Sync>,
    ) -> Result<()> {
        let stream_id = stream.stream_identifier();

        // A negotiated channel already claimed this id; the inbound
        // stream belongs to it and no DCEP handshake happens.
        let existing = {
            let registry = self.registry.lock().await;
            registry.active.get(&stream_id).cloned()
        };
        if let Some(_channel) = existing {
            stream.set_default_payload_type(PayloadProtocolIdentifier::Binary);
            return Ok(());
        }

        // In-band channels announce themselves with DATA_CHANNEL_OPEN.
        let mut buf = vec![0u8; self.setting_engine.get_receive_mtu()];
        let (n, ppid) = stream.read_sctp(&mut buf).await?;
        if ppid != PayloadProtocolIdentifier::Dcep {
            return Err(Error::new(format!(
                "first chunk on stream {stream_id} has PPID {ppid}, expected DCEP"
            )));
        }

        let mut raw = &buf[..n];
        let msg = Message::unmarshal(&mut raw)?;
        let Message::DataChannelOpen(open) = msg else {
            return Err(Error::new(format!(
                "first DCEP message on stream {stream_id} is not DATA_CHANNEL_OPEN"
            )));
        };

        let max_message_size = self
            .association()
            .await
            .map(|a| a.max_message_size() as usize)
            .unwrap_or(DEFAULT_REMOTE_MAX_MESSAGE_SIZE as usize);

        let channel = RTCDataChannel::accept_stream(
            stream,
            open,
            max_message_size,
            Arc::clone(&self.setting_engine),
        )
        .await?;

        channel.set_sctp_transport(Arc::downgrade(self)).await;

        {
            let mut registry = self.registry.lock().await;
            registry.active.insert(stream_id, Arc::clone(&channel));
        }
        self.data_channels_accepted.fetch_add(1, Ordering::SeqCst);

        {
            let mut handler = self.on_data_channel_handler.lock().await;
            if let Some(f) = &mut *handler {
                f(Arc::clone(&channel)).await;
            }
        }

        // Only start reading once the announcement ran: handlers set up
        // in ondatachannel must observe every message.
        channel.spawn_read_loop().await;

        Ok(())
    }

    /// Allocates the lowest unused stream id whose parity matches the
    /// DTLS role: client even, server odd.
    pub(crate) async fn generate_and_set_data_channel_id(
        &self,
        channel: &RTCDataChannel,
    ) -> Result<()> {
        let role = self.dtls_transport.role().await;
        let mut id: u16 = if role == DTLSRole::Client { 0 } else { 1 };

        let registry = self.registry.lock().await;
        while registry.stream_id_in_use(id) {
            id = id.checked_add(2).ok_or(Error::ErrMaxDataChannelID)?;
        }

        channel.id.store(id, Ordering::SeqCst);
        Ok(())
    }

    /// Removes a channel from the registry; subsequent sends on it fail.
    pub(crate) async fn remove_data_channel(&self, channel: &Arc<RTCDataChannel>) {
        let mut registry = self.registry.lock().await;
        registry.active.remove(&channel.id());
        registry
            .pending
            .retain(|d| !Arc::ptr_eq(d, channel));
    }

    /// Blocks until the association reaches connected, bounded by
    /// `timeout`. Used by create_data_channel on an already-connected
    /// peer connection.
    pub(crate) async fn wait_until_connected(&self, timeout: Duration) -> Result<()> {
        if self.state() == RTCSctpTransportState::Connected {
            return Ok(());
        }

        let mut state_rx = self.state_tx.subscribe();
        let wait = async {
            loop {
                if *state_rx.borrow_and_update() == RTCSctpTransportState::Connected {
                    return Ok(());
                }
                if state_rx.changed().await.is_err() {
                    return Err(Error::ErrSctpNotEstablished);
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(Error::ErrSctpAssociationTimeout(timeout.as_millis() as u64)),
        }
    }

    /// Stops the SCTPTransport.
    pub async fn stop(&self) -> Result<()> {
        let association = {
            let mut association = self.association.lock().await;
            association.take()
        };

        if let Some(association) = association {
            association.shutdown().await?;
        }

        self.set_state(RTCSctpTransportState::Closed).await;
        Ok(())
    }

    async fn do_error(&self, err: Error) {
        let mut handler = self.on_error_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(err).await;
        }
    }

    async fn do_data_channel_opened(&self, channel: Arc<RTCDataChannel>) {
        let mut handler = self.on_data_channel_opened_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(channel).await;
        }
    }

    /// Sets a handler which fires when the remote announces a channel.
    pub async fn on_data_channel(&self, f: OnDataChannelHdlrFn) {
        let mut handler = self.on_data_channel_handler.lock().await;
        *handler = Some(f);
    }

    /// Sets a handler which fires when a locally-created channel is
    /// opened over the association.
    pub async fn on_data_channel_opened(&self, f: OnDataChannelOpenedHdlrFn) {
        let mut handler = self.on_data_channel_opened_handler.lock().await;
        *handler = Some(f);
    }

    pub async fn on_state_change(&self, f: OnSctpStateChangeHdlrFn) {
        let mut handler = self.on_state_change_handler.lock().await;
        *handler = Some(f);
    }

    pub async fn on_error(&self, f: OnErrorHdlrFn) {
        let mut handler = self.on_error_handler.lock().await;
        *handler = Some(f);
    }
}
