//! In-memory engines for exercising the peer connection end-to-end:
//! an ICE agent pair joined by a conn pipe, a DTLS engine whose
//! "handshake" is a certificate rendezvous plus a one-byte record
//! header, and an SCTP engine speaking a tiny framed protocol over the
//! secured stream.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::sync::{mpsc, Mutex, Notify};
use util::conn::conn_pipe::pipe;
use util::Conn;

use crate::api::{APIBuilder, API};
use crate::dtls_transport::dtls_engine::{
    DtlsEngine, DtlsEngineConfig, DtlsEngineSession, OnDtlsAlertHdlrFn, SrtpKeyingMaterial,
    SrtpProtectionProfile,
};
use crate::error::{Error, Result};
use crate::ice_transport::ice_agent::{
    IceAgent, IceAgentConfig, IceAgentFactory, OnAgentCandidateHdlrFn,
    OnAgentConnectionStateChangeHdlrFn, OnAgentSelectedCandidatePairChangeHdlrFn,
};
use crate::ice_transport::ice_candidate::RTCIceCandidate;
use crate::ice_transport::ice_candidate_pair::RTCIceCandidatePair;
use crate::ice_transport::ice_candidate_type::RTCIceCandidateType;
use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
use crate::ice_transport::ice_protocol::RTCIceProtocol;
use crate::peer_connection::math_rand_alpha;
use crate::sctp_transport::sctp_engine::{
    OnBufferedAmountLowFn, PayloadProtocolIdentifier, ReliabilityType, SctpAssociation,
    SctpAssociationConfig, SctpEngine, SctpStream,
};

/// Builds two APIs whose engines are cross-wired, ready to connect two
/// peer connections to each other in memory.
pub(crate) fn connected_api_pair() -> (API, API) {
    let ice = MockIceAgentFactory::pair();
    let dtls = MockDtlsEngine::pair();
    let sctp = MockSctpEngine::new();

    let api_a = APIBuilder::new()
        .with_ice_agent_factory(ice.0)
        .with_dtls_engine(dtls.0)
        .with_sctp_engine(Arc::clone(&sctp) as Arc<dyn SctpEngine + Send + Sync>)
        .build();
    let api_b = APIBuilder::new()
        .with_ice_agent_factory(ice.1)
        .with_dtls_engine(dtls.1)
        .with_sctp_engine(sctp)
        .build();

    (api_a, api_b)
}

fn host_candidate(port: u16) -> RTCIceCandidate {
    RTCIceCandidate {
        foundation: "mock".to_owned(),
        component: 1,
        protocol: RTCIceProtocol::Udp,
        priority: 2_130_706_431,
        address: "127.0.0.1".to_owned(),
        port,
        typ: RTCIceCandidateType::Host,
        ..Default::default()
    }
}

struct IcePairState {
    conn_a: Mutex<Option<Arc<dyn Conn + Send + Sync>>>,
    conn_b: Mutex<Option<Arc<dyn Conn + Send + Sync>>>,
}

pub(crate) struct MockIceAgentFactory {
    is_side_a: bool,
    local_port: u16,
    remote_port: u16,
    pair_state: Arc<IcePairState>,
    agents: Mutex<Vec<Arc<MockIceAgent>>>,
}

impl MockIceAgentFactory {
    /// Two factories joined by an in-memory pipe.
    pub(crate) fn pair() -> (Arc<MockIceAgentFactory>, Arc<MockIceAgentFactory>) {
        let (conn_a, conn_b) = pipe();
        let conn_a: Arc<dyn Conn + Send + Sync> = Arc::new(conn_a);
        let conn_b: Arc<dyn Conn + Send + Sync> = Arc::new(conn_b);
        let pair_state = Arc::new(IcePairState {
            conn_a: Mutex::new(Some(conn_a)),
            conn_b: Mutex::new(Some(conn_b)),
        });

        let a = Arc::new(MockIceAgentFactory {
            is_side_a: true,
            local_port: 40001,
            remote_port: 40002,
            pair_state: Arc::clone(&pair_state),
            agents: Mutex::new(vec![]),
        });
        let b = Arc::new(MockIceAgentFactory {
            is_side_a: false,
            local_port: 40002,
            remote_port: 40001,
            pair_state,
            agents: Mutex::new(vec![]),
        });

        (a, b)
    }

    pub(crate) async fn last_agent(&self) -> Option<Arc<MockIceAgent>> {
        let agents = self.agents.lock().await;
        agents.last().cloned()
    }
}

#[async_trait]
impl IceAgentFactory for MockIceAgentFactory {
    async fn create_agent(&self, config: IceAgentConfig) -> Result<Arc<dyn IceAgent + Send + Sync>> {
        let (ufrag, pwd) = if config.local_ufrag.is_empty() {
            (math_rand_alpha(8), math_rand_alpha(24))
        } else {
            (config.local_ufrag.clone(), config.local_pwd.clone())
        };

        let agent = Arc::new(MockIceAgent {
            is_side_a: self.is_side_a,
            local_port: self.local_port,
            remote_port: self.remote_port,
            pair_state: Arc::clone(&self.pair_state),
            local_credentials: Mutex::new((ufrag, pwd)),
            remote_credentials: Mutex::new((String::new(), String::new())),
            remote_candidates: Mutex::new(vec![]),
            on_candidate_handler: Mutex::new(None),
            on_state_change_handler: Mutex::new(None),
            on_selected_pair_handler: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let mut agents = self.agents.lock().await;
        agents.push(Arc::clone(&agent));

        Ok(agent)
    }
}

pub(crate) struct MockIceAgent {
    is_side_a: bool,
    local_port: u16,
    remote_port: u16,
    pair_state: Arc<IcePairState>,
    local_credentials: Mutex<(String, String)>,
    remote_credentials: Mutex<(String, String)>,
    remote_candidates: Mutex<Vec<RTCIceCandidate>>,
    on_candidate_handler: Mutex<Option<OnAgentCandidateHdlrFn>>,
    on_state_change_handler: Mutex<Option<OnAgentConnectionStateChangeHdlrFn>>,
    on_selected_pair_handler: Mutex<Option<OnAgentSelectedCandidatePairChangeHdlrFn>>,
    closed: AtomicBool,
}

impl MockIceAgent {
    pub(crate) async fn received_remote_candidates(&self) -> Vec<RTCIceCandidate> {
        let remote_candidates = self.remote_candidates.lock().await;
        remote_candidates.clone()
    }

    async fn fire_state(&self, state: RTCIceConnectionState) {
        let mut handler = self.on_state_change_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(state).await;
        }
    }

    async fn take_conn(&self) -> Result<Arc<dyn Conn + Send + Sync>> {
        let slot = if self.is_side_a {
            &self.pair_state.conn_a
        } else {
            &self.pair_state.conn_b
        };
        let mut slot = slot.lock().await;
        slot.take()
            .ok_or_else(|| Error::new("mock ice pipe already taken".to_owned()))
    }

    async fn establish(&self, _remote_ufrag: String, _remote_pwd: String) -> Result<Arc<dyn Conn + Send + Sync>> {
        self.fire_state(RTCIceConnectionState::Checking).await;

        let conn = self.take_conn().await?;

        self.fire_state(RTCIceConnectionState::Connected).await;

        let pair = RTCIceCandidatePair::new(
            host_candidate(self.local_port),
            host_candidate(self.remote_port),
        );
        let mut handler = self.on_selected_pair_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(pair).await;
        }

        Ok(conn)
    }
}

#[async_trait]
impl IceAgent for MockIceAgent {
    async fn get_local_user_credentials(&self) -> (String, String) {
        let local_credentials = self.local_credentials.lock().await;
        local_credentials.clone()
    }

    async fn get_remote_user_credentials(&self) -> (String, String) {
        let remote_credentials = self.remote_credentials.lock().await;
        remote_credentials.clone()
    }

    async fn set_remote_credentials(&self, ufrag: String, pwd: String) -> Result<()> {
        let mut remote_credentials = self.remote_credentials.lock().await;
        *remote_credentials = (ufrag, pwd);
        Ok(())
    }

    async fn gather_candidates(&self) -> Result<()> {
        let candidate = host_candidate(self.local_port);
        let mut handler = self.on_candidate_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(Some(candidate)).await;
            f(None).await;
        }
        Ok(())
    }

    async fn get_local_candidates(&self) -> Result<Vec<RTCIceCandidate>> {
        Ok(vec![host_candidate(self.local_port)])
    }

    async fn add_remote_candidate(&self, candidate: &RTCIceCandidate) -> Result<()> {
        let mut remote_candidates = self.remote_candidates.lock().await;
        remote_candidates.push(candidate.clone());
        Ok(())
    }

    async fn on_candidate(&self, f: OnAgentCandidateHdlrFn) {
        let mut handler = self.on_candidate_handler.lock().await;
        *handler = Some(f);
    }

    async fn on_connection_state_change(&self, f: OnAgentConnectionStateChangeHdlrFn) {
        let mut handler = self.on_state_change_handler.lock().await;
        *handler = Some(f);
    }

    async fn on_selected_candidate_pair_change(&self, f: OnAgentSelectedCandidatePairChangeHdlrFn) {
        let mut handler = self.on_selected_pair_handler.lock().await;
        *handler = Some(f);
    }

    async fn dial(
        &self,
        _cancel_rx: mpsc::Receiver<()>,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<Arc<dyn Conn + Send + Sync>> {
        self.set_remote_credentials(remote_ufrag.clone(), remote_pwd.clone())
            .await?;
        self.establish(remote_ufrag, remote_pwd).await
    }

    async fn accept(
        &self,
        _cancel_rx: mpsc::Receiver<()>,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<Arc<dyn Conn + Send + Sync>> {
        self.set_remote_credentials(remote_ufrag.clone(), remote_pwd.clone())
            .await?;
        self.establish(remote_ufrag, remote_pwd).await
    }

    async fn route_stun(&self, _packet: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn restart(&self, ufrag: String, pwd: String) -> Result<()> {
        let mut local_credentials = self.local_credentials.lock().await;
        *local_credentials = (ufrag, pwd);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// DTLS record header byte used by the mock "cipher": plaintext frames
/// ride behind an application-data first byte so the demultiplexer
/// classifies them as DTLS.
const MOCK_DTLS_RECORD_HEADER: u8 = 23;

struct DtlsPairState {
    cert_a: Mutex<Option<Bytes>>,
    cert_b: Mutex<Option<Bytes>>,
    notify: Notify,
}

pub(crate) struct MockDtlsEngine {
    is_side_a: bool,
    pair_state: Arc<DtlsPairState>,
    fixed_peer_certificate: Mutex<Option<Bytes>>,
}

impl MockDtlsEngine {
    pub(crate) fn pair() -> (Arc<MockDtlsEngine>, Arc<MockDtlsEngine>) {
        let pair_state = Arc::new(DtlsPairState {
            cert_a: Mutex::new(None),
            cert_b: Mutex::new(None),
            notify: Notify::new(),
        });

        let a = Arc::new(MockDtlsEngine {
            is_side_a: true,
            pair_state: Arc::clone(&pair_state),
            fixed_peer_certificate: Mutex::new(None),
        });
        let b = Arc::new(MockDtlsEngine {
            is_side_a: false,
            pair_state,
            fixed_peer_certificate: Mutex::new(None),
        });

        (a, b)
    }

    /// Overrides the certificate this side observes from its peer,
    /// regardless of what the peer actually presented.
    pub(crate) fn set_fixed_peer_certificate(&self, cert: Bytes) {
        let mut fixed = self.fixed_peer_certificate.try_lock().expect("no contention in setup");
        *fixed = Some(cert);
    }
}

#[async_trait]
impl DtlsEngine for MockDtlsEngine {
    async fn connect(
        &self,
        conn: Arc<dyn Conn + Send + Sync>,
        config: DtlsEngineConfig,
    ) -> Result<Arc<dyn DtlsEngineSession + Send + Sync>> {
        // Publish our certificate, then wait for the peer's: the mock
        // handshake completes when both ends arrived.
        {
            let slot = if self.is_side_a {
                &self.pair_state.cert_a
            } else {
                &self.pair_state.cert_b
            };
            let mut slot = slot.lock().await;
            *slot = Some(config.certificate_der.clone());
        }
        self.pair_state.notify.notify_waiters();

        let peer_cert = {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
            loop {
                {
                    let slot = if self.is_side_a {
                        &self.pair_state.cert_b
                    } else {
                        &self.pair_state.cert_a
                    };
                    let slot = slot.lock().await;
                    if let Some(cert) = &*slot {
                        break cert.clone();
                    }
                }

                if tokio::time::Instant::now() >= deadline {
                    return Err(Error::new("mock dtls handshake timed out".to_owned()));
                }
                let _ =
                    tokio::time::timeout(Duration::from_millis(50), self.pair_state.notify.notified())
                        .await;
            }
        };

        let peer_cert = {
            let fixed = self.fixed_peer_certificate.lock().await;
            fixed.clone().unwrap_or(peer_cert)
        };

        Ok(Arc::new(MockDtlsSession {
            peer_certificate: peer_cert,
            conn: Arc::new(MockDtlsConn { inner: conn }),
            on_alert_handler: Mutex::new(None),
        }))
    }
}

/// The "record layer": one header byte per datagram.
struct MockDtlsConn {
    inner: Arc<dyn Conn + Send + Sync>,
}

type UtilResult<T> = std::result::Result<T, util::Error>;

#[async_trait]
impl Conn for MockDtlsConn {
    async fn connect(&self, _addr: SocketAddr) -> UtilResult<()> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    async fn recv(&self, buf: &mut [u8]) -> UtilResult<usize> {
        let mut inner_buf = vec![0u8; buf.len() + 1];
        loop {
            let n = self.inner.recv(&mut inner_buf).await?;
            if n == 0 || inner_buf[0] != MOCK_DTLS_RECORD_HEADER {
                continue;
            }
            buf[..n - 1].copy_from_slice(&inner_buf[1..n]);
            return Ok(n - 1);
        }
    }

    async fn recv_from(&self, _buf: &mut [u8]) -> UtilResult<(usize, SocketAddr)> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    async fn send(&self, buf: &[u8]) -> UtilResult<usize> {
        let mut framed = Vec::with_capacity(buf.len() + 1);
        framed.push(MOCK_DTLS_RECORD_HEADER);
        framed.extend_from_slice(buf);
        let n = self.inner.send(&framed).await?;
        Ok(n.saturating_sub(1))
    }

    async fn send_to(&self, _buf: &[u8], _target: SocketAddr) -> UtilResult<usize> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    fn local_addr(&self) -> UtilResult<SocketAddr> {
        self.inner.local_addr()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr()
    }

    async fn close(&self) -> UtilResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &(dyn std::any::Any + Send + Sync) {
        self
    }
}

struct MockDtlsSession {
    peer_certificate: Bytes,
    conn: Arc<MockDtlsConn>,
    on_alert_handler: Mutex<Option<OnDtlsAlertHdlrFn>>,
}

#[async_trait]
impl DtlsEngineSession for MockDtlsSession {
    fn peer_certificate_chain(&self) -> Vec<Bytes> {
        vec![self.peer_certificate.clone()]
    }

    fn selected_srtp_protection_profile(&self) -> SrtpProtectionProfile {
        SrtpProtectionProfile::Aes128CmHmacSha1_80
    }

    fn export_srtp_keying_material(&self) -> Result<SrtpKeyingMaterial> {
        Ok(SrtpKeyingMaterial {
            profile: SrtpProtectionProfile::Aes128CmHmacSha1_80,
            local_key: Bytes::from_static(&[1u8; 16]),
            local_salt: Bytes::from_static(&[2u8; 14]),
            remote_key: Bytes::from_static(&[3u8; 16]),
            remote_salt: Bytes::from_static(&[4u8; 14]),
        })
    }

    fn conn(&self) -> Arc<dyn Conn + Send + Sync> {
        Arc::clone(&self.conn) as Arc<dyn Conn + Send + Sync>
    }

    async fn on_alert(&self, f: OnDtlsAlertHdlrFn) {
        let mut handler = self.on_alert_handler.lock().await;
        *handler = Some(f);
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// Frame types of the mock SCTP wire protocol.
const SCTP_FRAME_INIT: u8 = 0;
const SCTP_FRAME_INIT_ACK: u8 = 1;
const SCTP_FRAME_DATA: u8 = 2;
const SCTP_FRAME_RESET: u8 = 3;

pub(crate) struct MockSctpEngine;

impl MockSctpEngine {
    pub(crate) fn new() -> Arc<MockSctpEngine> {
        Arc::new(MockSctpEngine)
    }
}

#[async_trait]
impl SctpEngine for MockSctpEngine {
    async fn associate(
        &self,
        conn: Arc<dyn Conn + Send + Sync>,
        config: SctpAssociationConfig,
    ) -> Result<Arc<dyn SctpAssociation + Send + Sync>> {
        let mut buf = vec![0u8; 65536 + 16];

        if config.is_client {
            conn.send(&[SCTP_FRAME_INIT]).await?;
            // Wait for the INIT ACK (or a colliding INIT, which is as
            // good as one).
            loop {
                let n = conn.recv(&mut buf).await?;
                if n == 0 {
                    continue;
                }
                match buf[0] {
                    SCTP_FRAME_INIT_ACK => break,
                    SCTP_FRAME_INIT => {
                        conn.send(&[SCTP_FRAME_INIT_ACK]).await?;
                        break;
                    }
                    _ => continue,
                }
            }
        } else {
            loop {
                let n = conn.recv(&mut buf).await?;
                if n != 0 && buf[0] == SCTP_FRAME_INIT {
                    conn.send(&[SCTP_FRAME_INIT_ACK]).await?;
                    break;
                }
            }
        }

        Ok(MockSctpAssociation::start(conn, config.max_message_size))
    }
}

struct InboundStreamState {
    tx: mpsc::UnboundedSender<(Bytes, PayloadProtocolIdentifier)>,
    reset: Arc<Notify>,
}

pub(crate) struct MockSctpAssociation {
    conn: Arc<dyn Conn + Send + Sync>,
    max_message_size: u32,
    streams: Mutex<HashMap<u16, InboundStreamState>>,
    accept_tx: mpsc::UnboundedSender<Arc<dyn SctpStream + Send + Sync>>,
    accept_rx: Mutex<mpsc::UnboundedReceiver<Arc<dyn SctpStream + Send + Sync>>>,
    shutdown: Arc<Notify>,
    is_shutdown: AtomicBool,
}

impl MockSctpAssociation {
    fn start(conn: Arc<dyn Conn + Send + Sync>, max_message_size: u32) -> Arc<Self> {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let association = Arc::new(MockSctpAssociation {
            conn,
            max_message_size,
            streams: Mutex::new(HashMap::new()),
            accept_tx,
            accept_rx: Mutex::new(accept_rx),
            shutdown: Arc::new(Notify::new()),
            is_shutdown: AtomicBool::new(false),
        });

        let rx_association = Arc::clone(&association);
        tokio::spawn(async move {
            rx_association.receive_loop().await;
        });

        association
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 65536 + 16];
        loop {
            let n = tokio::select! {
                _ = self.shutdown.notified() => break,
                result = self.conn.recv(&mut buf) => match result {
                    Ok(n) => n,
                    Err(_) => break,
                },
            };

            if n == 0 {
                continue;
            }

            match buf[0] {
                SCTP_FRAME_DATA if n >= 7 => {
                    let mut header = &buf[1..7];
                    let stream_id = header.get_u16();
                    let ppid = PayloadProtocolIdentifier::from(header.get_u32());
                    let payload = Bytes::copy_from_slice(&buf[7..n]);
                    self.deliver(stream_id, ppid, payload).await;
                }
                SCTP_FRAME_RESET if n >= 3 => {
                    let mut header = &buf[1..3];
                    let stream_id = header.get_u16();
                    let streams = self.streams.lock().await;
                    if let Some(state) = streams.get(&stream_id) {
                        state.reset.notify_waiters();
                    }
                }
                SCTP_FRAME_INIT => {
                    // Late INIT from a peer that missed our ACK.
                    let _ = self.conn.send(&[SCTP_FRAME_INIT_ACK]).await;
                }
                _ => {}
            }
        }
    }

    async fn deliver(
        self: &Arc<Self>,
        stream_id: u16,
        ppid: PayloadProtocolIdentifier,
        payload: Bytes,
    ) {
        let mut streams = self.streams.lock().await;
        if let Some(state) = streams.get(&stream_id) {
            let _ = state.tx.send((payload, ppid));
            return;
        }

        // First chunk on an unknown stream: the remote opened it.
        let stream = register_stream(Arc::clone(&self.conn), &mut streams, stream_id);
        let _ = streams
            .get(&stream_id)
            .expect("just registered")
            .tx
            .send((payload, ppid));
        let _ = self.accept_tx.send(stream);
    }
}

fn register_stream(
    conn: Arc<dyn Conn + Send + Sync>,
    streams: &mut HashMap<u16, InboundStreamState>,
    stream_id: u16,
) -> Arc<dyn SctpStream + Send + Sync> {
    let (tx, rx) = mpsc::unbounded_channel();
    let reset = Arc::new(Notify::new());
    streams.insert(
        stream_id,
        InboundStreamState {
            tx,
            reset: Arc::clone(&reset),
        },
    );

    Arc::new(MockSctpStream {
        stream_id,
        conn,
        inbox: Mutex::new(rx),
        reset,
        closed: AtomicBool::new(false),
        default_ppid: AtomicU16::new(PayloadProtocolIdentifier::Binary as u16),
    })
}

#[async_trait]
impl SctpAssociation for MockSctpAssociation {
    async fn open_stream(
        &self,
        stream_identifier: u16,
        _default_payload_type: PayloadProtocolIdentifier,
    ) -> Result<Arc<dyn SctpStream + Send + Sync>> {
        let mut streams = self.streams.lock().await;
        if streams.contains_key(&stream_identifier) {
            return Err(Error::new(format!(
                "stream {stream_identifier} already open"
            )));
        }
        Ok(register_stream(
            Arc::clone(&self.conn),
            &mut streams,
            stream_identifier,
        ))
    }

    async fn accept_stream(&self) -> Option<Arc<dyn SctpStream + Send + Sync>> {
        let mut accept_rx = self.accept_rx.lock().await;
        tokio::select! {
            _ = self.shutdown.notified() => None,
            stream = accept_rx.recv() => stream,
        }
    }

    fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    async fn shutdown(&self) -> Result<()> {
        self.is_shutdown.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        Ok(())
    }
}

struct MockSctpStream {
    stream_id: u16,
    conn: Arc<dyn Conn + Send + Sync>,
    inbox: Mutex<mpsc::UnboundedReceiver<(Bytes, PayloadProtocolIdentifier)>>,
    reset: Arc<Notify>,
    closed: AtomicBool,
    default_ppid: AtomicU16,
}

#[async_trait]
impl SctpStream for MockSctpStream {
    fn stream_identifier(&self) -> u16 {
        self.stream_id
    }

    fn set_default_payload_type(&self, ppid: PayloadProtocolIdentifier) {
        self.default_ppid.store(ppid as u16, Ordering::SeqCst);
    }

    fn set_reliability_params(&self, _unordered: bool, _rel_type: ReliabilityType, _rel_val: u32) {}

    async fn write_sctp(&self, data: &Bytes, ppid: PayloadProtocolIdentifier) -> Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrDataChannelNotOpen);
        }

        let mut frame = BytesMut::with_capacity(7 + data.len());
        frame.put_u8(SCTP_FRAME_DATA);
        frame.put_u16(self.stream_id);
        frame.put_u32(ppid as u32);
        frame.put_slice(data);
        self.conn.send(&frame).await?;

        Ok(data.len())
    }

    async fn read_sctp(&self, buf: &mut [u8]) -> Result<(usize, PayloadProtocolIdentifier)> {
        let mut inbox = self.inbox.lock().await;
        tokio::select! {
            _ = self.reset.notified() => Ok((0, PayloadProtocolIdentifier::Unknown)),
            message = inbox.recv() => match message {
                Some((data, ppid)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok((n, ppid))
                }
                None => Ok((0, PayloadProtocolIdentifier::Unknown)),
            },
        }
    }

    fn buffered_amount(&self) -> usize {
        0
    }

    fn set_buffered_amount_low_threshold(&self, _threshold: usize) {}

    async fn on_buffered_amount_low(&self, _f: OnBufferedAmountLowFn) {}

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut frame = BytesMut::with_capacity(3);
        frame.put_u8(SCTP_FRAME_RESET);
        frame.put_u16(self.stream_id);
        let _ = self.conn.send(&frame).await;

        // Unblock the local reader too.
        self.reset.notify_waiters();
        Ok(())
    }
}
