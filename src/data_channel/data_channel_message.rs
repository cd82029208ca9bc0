use bytes::Bytes;

/// A message received on a data channel. `is_string` reflects the PPID
/// the remote sent with (51/56 string, 53/57 binary).
#[derive(Default, Debug, Clone)]
pub struct DataChannelMessage {
    pub is_string: bool,
    pub data: Bytes,
}
