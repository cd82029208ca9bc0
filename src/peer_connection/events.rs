use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::data_channel::RTCDataChannel;
use crate::ice_transport::ice_candidate::RTCIceCandidate;
use crate::ice_transport::ice_connection_state::RTCIceConnectionState;
use crate::ice_transport::ice_gathering_state::RTCIceGatheringState;
use crate::peer_connection::peer_connection_state::RTCPeerConnectionState;
use crate::peer_connection::signaling_state::RTCSignalingState;

/// The event surfaces a peer connection exposes to observers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    IceCandidate,
    IceCandidateError,
    IceConnectionStateChange,
    IceGatheringStateChange,
    ConnectionStateChange,
    SignalingStateChange,
    NegotiationNeeded,
    DataChannel,
}

/// Identifies a subscription; pass back to unsubscribe.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EventHandlerId {
    pub(crate) kind: EventKind,
    pub(crate) seq: u64,
}

/// Reported through on_ice_candidate_error when gathering hits a
/// non-fatal problem (an unreachable STUN/TURN server, for example).
#[derive(Debug, Clone)]
pub struct RTCIceCandidateErrorEvent {
    pub error_text: String,
}

pub(crate) type EventHandler<Args> = Box<
    dyn (FnMut(Args) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync,
>;

/// One event's subscriber list. Handlers run in registration order;
/// they must not block (documented on the public subscribe methods).
pub(crate) struct HandlerRegistry<Args> {
    kind: EventKind,
    next_seq: AtomicU64,
    handlers: Mutex<Vec<(u64, EventHandler<Args>)>>,
}

impl<Args: Clone> HandlerRegistry<Args> {
    pub(crate) fn new(kind: EventKind) -> Self {
        HandlerRegistry {
            kind,
            next_seq: AtomicU64::new(1),
            handlers: Mutex::new(vec![]),
        }
    }

    pub(crate) async fn subscribe(&self, f: EventHandler<Args>) -> EventHandlerId {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let mut handlers = self.handlers.lock().await;
        handlers.push((seq, f));
        EventHandlerId {
            kind: self.kind,
            seq,
        }
    }

    pub(crate) async fn unsubscribe(&self, id: EventHandlerId) -> bool {
        if id.kind != self.kind {
            return false;
        }
        let mut handlers = self.handlers.lock().await;
        let before = handlers.len();
        handlers.retain(|(seq, _)| *seq != id.seq);
        handlers.len() != before
    }

    pub(crate) async fn emit(&self, args: Args) {
        let mut handlers = self.handlers.lock().await;
        for (_, f) in handlers.iter_mut() {
            f(args.clone()).await;
        }
    }

    pub(crate) async fn is_empty(&self) -> bool {
        let handlers = self.handlers.lock().await;
        handlers.is_empty()
    }

    pub(crate) async fn clear(&self) {
        let mut handlers = self.handlers.lock().await;
        handlers.clear();
    }
}

/// All subscriber lists of one peer connection.
pub(crate) struct EventHandlers {
    pub(crate) ice_candidate: HandlerRegistry<Option<RTCIceCandidate>>,
    pub(crate) ice_candidate_error: HandlerRegistry<RTCIceCandidateErrorEvent>,
    pub(crate) ice_connection_state_change: HandlerRegistry<RTCIceConnectionState>,
    pub(crate) ice_gathering_state_change: HandlerRegistry<RTCIceGatheringState>,
    pub(crate) connection_state_change: HandlerRegistry<RTCPeerConnectionState>,
    pub(crate) signaling_state_change: HandlerRegistry<RTCSignalingState>,
    pub(crate) negotiation_needed: HandlerRegistry<()>,
    pub(crate) data_channel: HandlerRegistry<Arc<RTCDataChannel>>,
}

impl EventHandlers {
    pub(crate) fn new() -> Self {
        EventHandlers {
            ice_candidate: HandlerRegistry::new(EventKind::IceCandidate),
            ice_candidate_error: HandlerRegistry::new(EventKind::IceCandidateError),
            ice_connection_state_change: HandlerRegistry::new(EventKind::IceConnectionStateChange),
            ice_gathering_state_change: HandlerRegistry::new(EventKind::IceGatheringStateChange),
            connection_state_change: HandlerRegistry::new(EventKind::ConnectionStateChange),
            signaling_state_change: HandlerRegistry::new(EventKind::SignalingStateChange),
            negotiation_needed: HandlerRegistry::new(EventKind::NegotiationNeeded),
            data_channel: HandlerRegistry::new(EventKind::DataChannel),
        }
    }

    pub(crate) async fn unsubscribe(&self, id: EventHandlerId) -> bool {
        match id.kind {
            EventKind::IceCandidate => self.ice_candidate.unsubscribe(id).await,
            EventKind::IceCandidateError => self.ice_candidate_error.unsubscribe(id).await,
            EventKind::IceConnectionStateChange => {
                self.ice_connection_state_change.unsubscribe(id).await
            }
            EventKind::IceGatheringStateChange => {
                self.ice_gathering_state_change.unsubscribe(id).await
            }
            EventKind::ConnectionStateChange => self.connection_state_change.unsubscribe(id).await,
            EventKind::SignalingStateChange => self.signaling_state_change.unsubscribe(id).await,
            EventKind::NegotiationNeeded => self.negotiation_needed.unsubscribe(id).await,
            EventKind::DataChannel => self.data_channel.unsubscribe(id).await,
        }
    }

    /// Drops every subscription; part of close().
    pub(crate) async fn clear(&self) {
        self.ice_candidate.clear().await;
        self.ice_candidate_error.clear().await;
        self.ice_connection_state_change.clear().await;
        self.ice_gathering_state_change.clear().await;
        self.connection_state_change.clear().await;
        self.signaling_state_change.clear().await;
        self.negotiation_needed.clear().await;
        self.data_channel.clear().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let registry: HandlerRegistry<u32> = HandlerRegistry::new(EventKind::NegotiationNeeded);
        let seen = Arc::new(Mutex::new(Vec::<(u32, u32)>::new()));

        for tag in 0..3u32 {
            let seen = Arc::clone(&seen);
            registry
                .subscribe(Box::new(move |value: u32| {
                    let seen = Arc::clone(&seen);
                    Box::pin(async move {
                        seen.lock().await.push((tag, value));
                    })
                }))
                .await;
        }

        registry.emit(7).await;
        assert_eq!(&*seen.lock().await, &[(0, 7), (1, 7), (2, 7)]);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_handler() {
        let registry: HandlerRegistry<u32> = HandlerRegistry::new(EventKind::DataChannel);
        let count = Arc::new(Mutex::new(0u32));

        let count2 = Arc::clone(&count);
        let id = registry
            .subscribe(Box::new(move |_| {
                let count2 = Arc::clone(&count2);
                Box::pin(async move {
                    *count2.lock().await += 1;
                })
            }))
            .await;

        registry.emit(1).await;
        assert!(registry.unsubscribe(id).await);
        registry.emit(2).await;
        assert!(!registry.unsubscribe(id).await);

        assert_eq!(*count.lock().await, 1);
    }
}
