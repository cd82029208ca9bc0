use serde::{Deserialize, Serialize};

/// Indicates the capabilities of the SCTPTransport.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SCTPTransportCapabilities {
    pub max_message_size: u32,
}
