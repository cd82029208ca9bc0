use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use util::conn::conn_pipe::pipe;

use super::*;
use crate::error::Result;
use crate::mux::mux_func::{
    match_all, match_dtls, match_srtp, match_srtp_or_srtcp, match_srtcp, match_stun,
};

const TEST_PIPE_BUFFER_SIZE: usize = 8192;

async fn pipe_memory() -> (Arc<Endpoint>, impl Conn) {
    // In memory pipe
    let (ca, cb) = pipe();

    let mut m = Mux::new(Config {
        conn: Arc::new(ca),
        buffer_size: TEST_PIPE_BUFFER_SIZE,
    });

    let e = m.new_endpoint(Box::new(match_all)).await;
    m.remove_endpoint(&e).await;
    let e = m.new_endpoint(Box::new(match_all)).await;

    (e, cb)
}

#[tokio::test]
async fn test_no_endpoints() -> Result<()> {
    // In memory pipe
    let (ca, _) = pipe();

    let mut m = Mux::new(Config {
        conn: Arc::new(ca),
        buffer_size: TEST_PIPE_BUFFER_SIZE,
    });

    Mux::dispatch(&[0], &m.endpoints).await?;
    m.close().await;

    Ok(())
}

#[tokio::test]
async fn test_dispatch_to_matching_endpoint() -> Result<()> {
    let (e, cb) = pipe_memory().await;

    let msg = b"test".to_vec();
    cb.send(&msg).await?;

    let mut buf = vec![0u8; TEST_PIPE_BUFFER_SIZE];
    let n = e.recv(&mut buf).await?;
    assert_eq!(&buf[..n], &msg[..]);

    Ok(())
}

struct MuxErrorConn {
    idx: AtomicUsize,
    data: Vec<Vec<u8>>,
}

type UtilResult<T> = std::result::Result<T, util::Error>;

#[async_trait]
impl Conn for MuxErrorConn {
    async fn connect(&self, _addr: SocketAddr) -> UtilResult<()> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    async fn recv(&self, buf: &mut [u8]) -> UtilResult<usize> {
        let idx = self.idx.fetch_add(1, Ordering::SeqCst);
        if idx < self.data.len() {
            let n = std::cmp::min(buf.len(), self.data[idx].len());
            buf[..n].copy_from_slice(&self.data[idx][..n]);
            Ok(n)
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("idx {} >= data.len {}", idx, self.data.len()),
            )
            .into())
        }
    }

    async fn recv_from(&self, _buf: &mut [u8]) -> UtilResult<(usize, SocketAddr)> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    async fn send(&self, _buf: &[u8]) -> UtilResult<usize> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    async fn send_to(&self, _buf: &[u8], _target: SocketAddr) -> UtilResult<usize> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    fn local_addr(&self) -> UtilResult<SocketAddr> {
        Err(util::Error::Other("Not applicable".to_owned()))
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }

    async fn close(&self) -> UtilResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &(dyn std::any::Any + Send + Sync) {
        self
    }
}

#[tokio::test]
async fn test_non_fatal_read() -> Result<()> {
    let expected_data = b"expected_data".to_vec();

    let conn = Arc::new(MuxErrorConn {
        idx: AtomicUsize::new(0),
        data: vec![
            expected_data.clone(),
            expected_data.clone(),
            expected_data.clone(),
        ],
    });

    let mut m = Mux::new(Config {
        conn,
        buffer_size: TEST_PIPE_BUFFER_SIZE,
    });

    let e = m.new_endpoint(Box::new(match_all)).await;
    let mut buff = vec![0u8; TEST_PIPE_BUFFER_SIZE];

    let n = e.recv(&mut buff).await?;
    assert_eq!(&buff[..n], expected_data);

    let n = e.recv(&mut buff).await?;
    assert_eq!(&buff[..n], expected_data);

    let n = e.recv(&mut buff).await?;
    assert_eq!(&buff[..n], expected_data);

    m.close().await;

    Ok(())
}

#[test]
fn test_match_funcs_classify_first_byte() {
    // RFC 5764 ranges: STUN, DTLS, SRTP/SRTCP, unknown
    assert!(match_stun(&[0x00, 0x01]));
    assert!(match_stun(&[0x01]));
    // 2 and 3 carry no STUN message type; they fall to the drop path.
    assert!(!match_stun(&[0x02]));
    assert!(!match_stun(&[0x03]));
    assert!(!match_stun(&[0x14]));

    assert!(match_dtls(&[0x14])); // 20, change_cipher_spec
    assert!(match_dtls(&[0x3f])); // 63
    assert!(!match_dtls(&[0x40]));
    assert!(!match_dtls(&[]));

    // RTP packet: version 2, payload type 0, full 12 byte header + payload
    let mut rtp = vec![0x80, 0x00, 0x00, 0x01];
    rtp.resize(20, 0);
    assert!(match_srtp(&rtp));

    // RTCP sender report: payload type 200
    let mut rtcp = vec![0x80, 0xc8, 0x00, 0x06];
    rtcp.resize(28, 0);
    assert!(match_srtcp(&rtcp));
    assert!(!match_srtp(&rtcp));

    // Too short to carry an RTP header
    assert!(!match_srtp_or_srtcp(&[0x80, 0x00, 0x00, 0x01]));

    // Unknown leading byte matches nothing
    let unknown = [0x45u8; 20];
    assert!(!match_stun(&unknown) && !match_dtls(&unknown) && !match_srtp_or_srtcp(&unknown));
}
