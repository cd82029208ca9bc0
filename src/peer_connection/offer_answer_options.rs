/// Options to control offer generation.
#[derive(Default, Debug, Clone)]
pub struct RTCOfferOptions {
    /// Leave the candidates gathered so far out of the SDP; the caller
    /// commits to trickling every candidate over signaling.
    pub exclude_ice_candidates: bool,

    /// Block until gathering completed so the offer carries the full
    /// candidate set. Trickling is faster; this exists for signaling
    /// channels that can only carry one message.
    pub wait_for_gathering_complete: bool,

    /// Regenerate ICE credentials before building the offer.
    pub ice_restart: bool,
}

/// Options to control answer generation.
#[derive(Default, Debug, Clone)]
pub struct RTCAnswerOptions {
    pub exclude_ice_candidates: bool,
    pub wait_for_gathering_complete: bool,
}
