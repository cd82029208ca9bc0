use serde::{Deserialize, Serialize};

/// Describes the configuration of a data channel as carried in the
/// DCEP OPEN message.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct DataChannelParameters {
    pub label: String,
    pub protocol: String,
    pub ordered: bool,
    pub max_packet_life_time: u16,
    pub max_retransmits: u16,
    pub negotiated: bool,
    pub id: u16,
}
