
pub mod ice_agent;
pub mod ice_candidate;
pub mod ice_candidate_pair;
pub mod ice_candidate_type;
pub mod ice_connection_state;
pub mod ice_gatherer;
pub mod ice_gatherer_state;
pub mod ice_gathering_state;
pub mod ice_parameters;
pub mod ice_protocol;
pub mod ice_role;
pub mod ice_server;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::{mpsc, Mutex};
use util::Conn;

use crate::error::{Error, Result};
use crate::ice_transport::ice_agent::IceAgent;
use crate::ice_transport::ice_candidate::RTCIceCandidate;
use crate::ice_transport::ice_candidate_pair::RTCIceCandidatePair;
use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
use crate::ice_transport::ice_gatherer::RTCIceGatherer;
use crate::ice_transport::ice_parameters::RTCIceParameters;
use crate::ice_transport::ice_role::RTCIceRole;
use crate::mux::endpoint::Endpoint;
use crate::mux::mux_func::{match_stun, MatchFunc};
use crate::mux::{Config, Mux};
use crate::RECEIVE_MTU;

pub type OnConnectionStateChangeHdlrFn = Box<
    dyn (FnMut(RTCIceConnectionState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnNominatedPairHdlrFn = Box<
    dyn (FnMut(RTCIceCandidatePair) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

#[derive(Default)]
struct ICETransportInternal {
    role: RTCIceRole,
    conn: Option<Arc<dyn Conn + Send + Sync>>,
    mux: Option<Mux>,
    cancel_tx: Option<mpsc::Sender<()>>,
}

/// RTCIceTransport owns the single packet path of the peer connection:
/// it drives the agent's connectivity checks and, once a pair is
/// nominated, exposes that path to DTLS/SRTP/SRTCP through the
/// demultiplexer.
pub struct RTCIceTransport {
    gatherer: Arc<RTCIceGatherer>,
    on_connection_state_change_handler: Arc<Mutex<Option<OnConnectionStateChangeHdlrFn>>>,
    on_nominated_handler: Arc<Mutex<Option<OnNominatedPairHdlrFn>>>,
    state: Arc<AtomicU8>, // RTCIceConnectionState
    nominated_pair: Arc<ArcSwapOption<RTCIceCandidatePair>>,
    internal: Mutex<ICETransportInternal>,
}

impl RTCIceTransport {
    pub(crate) fn new(gatherer: Arc<RTCIceGatherer>) -> Self {
        RTCIceTransport {
            state: Arc::new(AtomicU8::new(RTCIceConnectionState::New as u8)),
            gatherer,
            on_connection_state_change_handler: Arc::new(Default::default()),
            on_nominated_handler: Arc::new(Default::default()),
            nominated_pair: Arc::new(ArcSwapOption::empty()),
            internal: Mutex::new(Default::default()),
        }
    }

    /// The pair the agent nominated, if checks have succeeded.
    pub fn nominated_pair(&self) -> Option<Arc<RTCIceCandidatePair>> {
        self.nominated_pair.load_full()
    }

    /// Starts connectivity checks based on its configured role. Resolves
    /// when the agent nominates a pair and the muxed packet path is up.
    pub async fn start(&self, params: &RTCIceParameters, role: Option<RTCIceRole>) -> Result<()> {
        if self.state() != RTCIceConnectionState::New {
            return Err(Error::ErrICETransportNotInNew);
        }

        self.ensure_gatherer().await?;

        if let Some(agent) = self.gatherer.get_agent().await {
            let state = Arc::clone(&self.state);

            let on_connection_state_change_handler =
                Arc::clone(&self.on_connection_state_change_handler);
            agent
                .on_connection_state_change(Box::new(move |ice_state: RTCIceConnectionState| {
                    let on_connection_state_change_handler_clone =
                        Arc::clone(&on_connection_state_change_handler);
                    state.store(ice_state as u8, Ordering::SeqCst);
                    Box::pin(async move {
                        let mut handler = on_connection_state_change_handler_clone.lock().await;
                        if let Some(f) = &mut *handler {
                            f(ice_state).await;
                        }
                    })
                }))
                .await;

            let nominated_pair = Arc::clone(&self.nominated_pair);
            let on_nominated_handler = Arc::clone(&self.on_nominated_handler);
            agent
                .on_selected_candidate_pair_change(Box::new(move |pair: RTCIceCandidatePair| {
                    let on_nominated_handler_clone = Arc::clone(&on_nominated_handler);
                    nominated_pair.store(Some(Arc::new(pair.clone())));
                    Box::pin(async move {
                        let mut handler = on_nominated_handler_clone.lock().await;
                        if let Some(f) = &mut *handler {
                            f(pair).await;
                        }
                    })
                }))
                .await;

            let role = if let Some(role) = role {
                role
            } else {
                RTCIceRole::Controlled
            };

            let (cancel_tx, cancel_rx) = mpsc::channel(1);

            let conn: Arc<dyn Conn + Send + Sync> = match role {
                RTCIceRole::Controlling => {
                    agent
                        .dial(
                            cancel_rx,
                            params.username_fragment.clone(),
                            params.password.clone(),
                        )
                        .await?
                }

                RTCIceRole::Controlled => {
                    agent
                        .accept(
                            cancel_rx,
                            params.username_fragment.clone(),
                            params.password.clone(),
                        )
                        .await?
                }

                _ => return Err(Error::ErrICERoleUnknown),
            };

            let config = Config {
                conn: Arc::clone(&conn),
                buffer_size: RECEIVE_MTU,
            };
            let mux = Mux::new(config);

            // STUN on the nominated path stays authoritative with the agent:
            // the demultiplexer only classifies, the agent validates.
            let stun_endpoint = mux.new_endpoint(Box::new(match_stun)).await;
            let stun_agent = Arc::clone(&agent);
            tokio::spawn(async move {
                let mut buf = vec![0u8; RECEIVE_MTU];
                while let Ok(n) = stun_endpoint.recv(&mut buf).await {
                    if let Err(err) = stun_agent.route_stun(&buf[..n]).await {
                        log::warn!("failed to route STUN packet to agent: {err}");
                    }
                }
            });

            {
                let mut internal = self.internal.lock().await;
                internal.role = role;
                internal.cancel_tx = Some(cancel_tx);
                internal.conn = Some(conn);
                internal.mux = Some(mux);
            }

            Ok(())
        } else {
            Err(Error::ErrICEAgentNotExist)
        }
    }

    /// Regenerates local credentials and restarts connectivity checks;
    /// candidate-pair optimization beyond that is out of scope.
    pub(crate) async fn restart(&self) -> Result<()> {
        if let Some(agent) = self.gatherer.get_agent().await {
            let (ufrag, pwd) = if !self
                .gatherer
                .setting_engine
                .candidates
                .username_fragment
                .is_empty()
            {
                (
                    self.gatherer.setting_engine.candidates.username_fragment.clone(),
                    self.gatherer.setting_engine.candidates.password.clone(),
                )
            } else {
                (
                    crate::peer_connection::math_rand_alpha(16),
                    crate::peer_connection::math_rand_alpha(32),
                )
            };
            agent.restart(ufrag, pwd).await?;
        } else {
            return Err(Error::ErrICEAgentNotExist);
        }
        self.gatherer.gather().await
    }

    /// Irreversibly stops the RTCIceTransport.
    pub async fn stop(&self) -> Result<()> {
        self.set_state(RTCIceConnectionState::Closed);

        {
            let mut internal = self.internal.lock().await;
            internal.cancel_tx.take();
            if let Some(mut mux) = internal.mux.take() {
                mux.close().await;
            }
        }

        self.gatherer.close().await?;

        Ok(())
    }

    /// Sets a handler that is invoked when the agent nominates a
    /// candidate pair; the orchestrator uses this to kick off DTLS.
    pub async fn on_nominated(&self, f: OnNominatedPairHdlrFn) {
        let mut on_nominated_handler = self.on_nominated_handler.lock().await;
        *on_nominated_handler = Some(f);
    }

    /// Sets a handler that is fired when the ICE connection state changes.
    pub async fn on_connection_state_change(&self, f: OnConnectionStateChangeHdlrFn) {
        let mut on_connection_state_change_handler =
            self.on_connection_state_change_handler.lock().await;
        *on_connection_state_change_handler = Some(f);
    }

    /// Indicates the current role of the ICE transport.
    pub async fn role(&self) -> RTCIceRole {
        let internal = self.internal.lock().await;
        internal.role
    }

    /// Adds a candidate associated with the remote RTCIceTransport.
    pub async fn add_remote_candidate(
        &self,
        remote_candidate: Option<RTCIceCandidate>,
    ) -> Result<()> {
        self.ensure_gatherer().await?;

        if let Some(agent) = self.gatherer.get_agent().await {
            if let Some(r) = remote_candidate {
                agent.add_remote_candidate(&r).await?;
            }

            Ok(())
        } else {
            Err(Error::ErrICEAgentNotExist)
        }
    }

    /// Returns the current ice transport state.
    pub fn state(&self) -> RTCIceConnectionState {
        RTCIceConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, s: RTCIceConnectionState) {
        self.state.store(s as u8, Ordering::SeqCst)
    }

    /// Registers a protocol with the demultiplexer running on the
    /// nominated path.
    pub(crate) async fn new_endpoint(&self, f: MatchFunc) -> Option<Arc<Endpoint>> {
        let internal = self.internal.lock().await;
        if let Some(mux) = &internal.mux {
            Some(mux.new_endpoint(f).await)
        } else {
            None
        }
    }

    /// Raw send on the nominated path.
    pub(crate) async fn send(&self, b: &[u8]) -> Result<usize> {
        let conn = {
            let internal = self.internal.lock().await;
            internal.conn.clone()
        };

        if let Some(conn) = conn {
            Ok(conn.send(b).await?)
        } else {
            Err(Error::ErrICEConnectionNotStarted)
        }
    }

    pub(crate) async fn ensure_gatherer(&self) -> Result<()> {
        if self.gatherer.get_agent().await.is_none() {
            self.gatherer.create_agent().await
        } else {
            Ok(())
        }
    }

    pub(crate) async fn have_remote_credentials_change(
        &self,
        new_ufrag: &str,
        new_pwd: &str,
    ) -> bool {
        if let Some(agent) = self.gatherer.get_agent().await {
            let (ufrag, upwd) = agent.get_remote_user_credentials().await;
            ufrag != new_ufrag || upwd != new_pwd
        } else {
            false
        }
    }

    pub(crate) async fn set_remote_credentials(
        &self,
        new_ufrag: String,
        new_pwd: String,
    ) -> Result<()> {
        if let Some(agent) = self.gatherer.get_agent().await {
            agent.set_remote_credentials(new_ufrag, new_pwd).await
        } else {
            Err(Error::ErrICEAgentNotExist)
        }
    }
}
