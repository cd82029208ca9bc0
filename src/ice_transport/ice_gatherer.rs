use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::api::setting_engine::SettingEngine;
use crate::error::{Error, Result};
use crate::ice_transport::ice_agent::{
    IceAgent, IceAgentConfig, IceAgentFactory, OnAgentCandidateHdlrFn,
};
use crate::ice_transport::ice_candidate::RTCIceCandidate;
use crate::ice_transport::ice_candidate_type::RTCIceCandidateType;
use crate::ice_transport::ice_gatherer_state::RTCIceGathererState;
use crate::ice_transport::ice_parameters::RTCIceParameters;
use crate::ice_transport::ice_server::RTCIceServer;
use crate::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;

/// Options to configure gathering behavior.
#[derive(Default, Debug, Clone)]
pub struct RTCIceGatherOptions {
    pub ice_servers: Vec<RTCIceServer>,
    pub ice_gather_policy: RTCIceTransportPolicy,
}

pub type OnLocalCandidateHdlrFn = Box<
    dyn (FnMut(Option<RTCIceCandidate>) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnICEGathererStateChangeHdlrFn = Box<
    dyn (FnMut(RTCIceGathererState) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>)
        + Send
        + Sync,
>;

pub type OnGatheringCompleteHdlrFn =
    Box<dyn (FnMut() -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// RTCIceGatherer gathers local host, server reflexive and relay candidates,
/// as well as enabling the retrieval of local Interactive Connectivity
/// Establishment (ICE) parameters which can be exchanged in signaling.
pub struct RTCIceGatherer {
    pub(crate) validated_servers: Vec<RTCIceServer>,
    pub(crate) gather_policy: RTCIceTransportPolicy,
    pub(crate) setting_engine: Arc<SettingEngine>,
    pub(crate) agent_factory: Arc<dyn IceAgentFactory>,

    pub(crate) state: Arc<AtomicU8>, // RTCIceGathererState
    pub(crate) agent: Mutex<Option<Arc<dyn IceAgent + Send + Sync>>>,

    pub(crate) on_local_candidate_handler: Arc<Mutex<Option<OnLocalCandidateHdlrFn>>>,
    pub(crate) on_state_change_handler: Arc<Mutex<Option<OnICEGathererStateChangeHdlrFn>>>,

    // Used for gathering_complete_promise
    pub(crate) on_gathering_complete_handler: Arc<Mutex<Option<OnGatheringCompleteHdlrFn>>>,
}

impl RTCIceGatherer {
    pub(crate) fn new(
        validated_servers: Vec<RTCIceServer>,
        gather_policy: RTCIceTransportPolicy,
        setting_engine: Arc<SettingEngine>,
        agent_factory: Arc<dyn IceAgentFactory>,
    ) -> Self {
        RTCIceGatherer {
            gather_policy,
            validated_servers,
            setting_engine,
            agent_factory,
            state: Arc::new(AtomicU8::new(RTCIceGathererState::New as u8)),
            agent: Mutex::new(None),
            on_local_candidate_handler: Arc::new(Default::default()),
            on_state_change_handler: Arc::new(Default::default()),
            on_gathering_complete_handler: Arc::new(Default::default()),
        }
    }

    pub(crate) async fn create_agent(&self) -> Result<()> {
        {
            let agent = self.agent.lock().await;
            if agent.is_some() || self.state() != RTCIceGathererState::New {
                return Ok(());
            }
        }

        if self.gather_policy == RTCIceTransportPolicy::Relay && self.validated_servers.is_empty() {
            return Err(Error::ErrICEServersRequiredForRelayPolicy);
        }

        let config = IceAgentConfig {
            ice_servers: self.validated_servers.clone(),
            gather_policy: self.gather_policy,
            local_ufrag: self.setting_engine.candidates.username_fragment.clone(),
            local_pwd: self.setting_engine.candidates.password.clone(),
            lite: self.setting_engine.candidates.ice_lite,
        };

        let agent = self.agent_factory.create_agent(config).await?;

        {
            let mut agent_slot = self.agent.lock().await;
            *agent_slot = Some(agent);
        }

        Ok(())
    }

    /// Initiates the process of candidate gathering off the hot path;
    /// candidates surface via on_local_candidate.
    pub async fn gather(&self) -> Result<()> {
        self.create_agent().await?;
        self.set_state(RTCIceGathererState::Gathering).await;

        if let Some(agent) = self.get_agent().await {
            let state = Arc::clone(&self.state);
            let on_local_candidate_handler = Arc::clone(&self.on_local_candidate_handler);
            let on_state_change_handler = Arc::clone(&self.on_state_change_handler);
            let on_gathering_complete_handler = Arc::clone(&self.on_gathering_complete_handler);
            let gather_policy = self.gather_policy;

            agent
                .on_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                    let state_clone = Arc::clone(&state);
                    let on_local_candidate_handler_clone = Arc::clone(&on_local_candidate_handler);
                    let on_state_change_handler_clone = Arc::clone(&on_state_change_handler);
                    let on_gathering_complete_handler_clone =
                        Arc::clone(&on_gathering_complete_handler);

                    Box::pin(async move {
                        match candidate {
                            Some(candidate) => {
                                if gather_policy == RTCIceTransportPolicy::Relay
                                    && candidate.typ != RTCIceCandidateType::Relay
                                {
                                    log::trace!(
                                        "dropping non-relay candidate under relay-only policy: {candidate}"
                                    );
                                    return;
                                }

                                let mut handler = on_local_candidate_handler_clone.lock().await;
                                if let Some(f) = &mut *handler {
                                    f(Some(candidate)).await;
                                }
                            }
                            None => {
                                state_clone
                                    .store(RTCIceGathererState::Complete as u8, Ordering::SeqCst);

                                {
                                    let mut handler = on_state_change_handler_clone.lock().await;
                                    if let Some(f) = &mut *handler {
                                        f(RTCIceGathererState::Complete).await;
                                    }
                                }

                                {
                                    let mut handler =
                                        on_gathering_complete_handler_clone.lock().await;
                                    if let Some(f) = &mut *handler {
                                        f().await;
                                    }
                                }

                                {
                                    let mut handler = on_local_candidate_handler_clone.lock().await;
                                    if let Some(f) = &mut *handler {
                                        f(None).await;
                                    }
                                }
                            }
                        }
                    }) as Pin<Box<dyn Future<Output = ()> + Send>>
                }) as OnAgentCandidateHdlrFn)
                .await;

            agent.gather_candidates().await?;
        }

        Ok(())
    }

    /// Closes the gatherer and prunes all local candidates.
    pub async fn close(&self) -> Result<()> {
        self.set_state(RTCIceGathererState::Closed).await;

        let agent = {
            let mut agent_opt = self.agent.lock().await;
            agent_opt.take()
        };

        if let Some(agent) = agent {
            agent.close().await?;
        }

        Ok(())
    }

    /// Returns the ICE parameters of the gatherer.
    pub async fn get_local_parameters(&self) -> Result<RTCIceParameters> {
        self.create_agent().await?;

        let (frag, pwd) = if let Some(agent) = self.get_agent().await {
            agent.get_local_user_credentials().await
        } else {
            return Err(Error::ErrICEAgentNotExist);
        };

        Ok(RTCIceParameters {
            username_fragment: frag,
            password: pwd,
            ice_lite: self.setting_engine.candidates.ice_lite,
        })
    }

    /// Returns the sequence of valid local candidates associated with the gatherer.
    pub async fn get_local_candidates(&self) -> Result<Vec<RTCIceCandidate>> {
        self.create_agent().await?;

        if let Some(agent) = self.get_agent().await {
            agent.get_local_candidates().await
        } else {
            Err(Error::ErrICEAgentNotExist)
        }
    }

    /// Sets an event handler which fires when a new ICE candidate is gathered;
    /// a None candidate signals that gathering finished.
    pub async fn on_local_candidate(&self, f: OnLocalCandidateHdlrFn) {
        let mut on_local_candidate_handler = self.on_local_candidate_handler.lock().await;
        *on_local_candidate_handler = Some(f);
    }

    /// Sets an event handler which fires any time the ICEGatherer state changes.
    pub async fn on_state_change(&self, f: OnICEGathererStateChangeHdlrFn) {
        let mut on_state_change_handler = self.on_state_change_handler.lock().await;
        *on_state_change_handler = Some(f);
    }

    /// Sets an event handler which fires any time the ICEGatherer is finished.
    pub async fn on_gathering_complete(&self, f: OnGatheringCompleteHdlrFn) {
        let mut on_gathering_complete_handler = self.on_gathering_complete_handler.lock().await;
        *on_gathering_complete_handler = Some(f);
    }

    /// Returns the current state of the ICE gatherer.
    pub fn state(&self) -> RTCIceGathererState {
        self.state.load(Ordering::SeqCst).into()
    }

    pub(crate) async fn set_state(&self, s: RTCIceGathererState) {
        self.state.store(s as u8, Ordering::SeqCst);

        let mut handler = self.on_state_change_handler.lock().await;
        if let Some(f) = &mut *handler {
            f(s).await;
        }
    }

    pub(crate) async fn get_agent(&self) -> Option<Arc<dyn IceAgent + Send + Sync>> {
        let agent = self.agent.lock().await;
        agent.clone()
    }
}
