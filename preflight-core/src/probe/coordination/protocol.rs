//! Minimal ZooKeeper wire encoding: connect handshake, digest auth, close.
//!
//! Every packet is a big-endian `i32` length followed by the record. Only the
//! records the session probe needs are implemented.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted from a server.
pub(crate) const MAX_FRAME: usize = 1 << 20;

/// Request `xid` reserved for authentication packets.
pub(crate) const AUTH_XID: i32 = -4;
/// `OpCode.auth`
pub(crate) const OP_AUTH: i32 = 100;
/// `OpCode.closeSession`
pub(crate) const OP_CLOSE: i32 = -11;

/// Server answer to the connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectResponse {
    pub protocol_version: i32,
    pub timeout_ms: i32,
    pub session_id: i64,
}

/// Header of every reply after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReplyHeader {
    pub xid: i32,
    pub zxid: i64,
    pub err: i32,
}

fn put_buffer(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = i32::try_from(bytes.len()).unwrap_or(i32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
}

fn frame(body: Vec<u8>) -> Vec<u8> {
    let len = i32::try_from(body.len()).unwrap_or(i32::MAX);
    let mut packet = Vec::with_capacity(body.len().saturating_add(4));
    packet.extend_from_slice(&len.to_be_bytes());
    packet.extend(body);
    packet
}

/// Connect request for a brand-new session.
pub(crate) fn connect_request(session_timeout_ms: i32) -> Vec<u8> {
    let mut body = Vec::with_capacity(45);
    body.extend_from_slice(&0i32.to_be_bytes()); // protocolVersion
    body.extend_from_slice(&0i64.to_be_bytes()); // lastZxidSeen
    body.extend_from_slice(&session_timeout_ms.to_be_bytes());
    body.extend_from_slice(&0i64.to_be_bytes()); // sessionId
    put_buffer(&mut body, &[0u8; 16]); // passwd
    body.push(0); // readOnly
    frame(body)
}

/// Digest authentication packet for `user:password`.
pub(crate) fn auth_request(username: &str, password: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&AUTH_XID.to_be_bytes());
    body.extend_from_slice(&OP_AUTH.to_be_bytes());
    body.extend_from_slice(&0i32.to_be_bytes()); // type
    put_buffer(&mut body, b"digest");
    let auth = zeroize::Zeroizing::new(format!("{}:{}", username, password));
    put_buffer(&mut body, auth.as_bytes());
    frame(body)
}

/// Close-session request.
pub(crate) fn close_request(xid: i32) -> Vec<u8> {
    let mut body = Vec::with_capacity(8);
    body.extend_from_slice(&xid.to_be_bytes());
    body.extend_from_slice(&OP_CLOSE.to_be_bytes());
    frame(body)
}

fn take<const N: usize>(bytes: &[u8], offset: usize) -> std::io::Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated server record")
        })
}

/// Parses a connect response body (without the length prefix).
pub(crate) fn parse_connect_response(body: &[u8]) -> std::io::Result<ConnectResponse> {
    Ok(ConnectResponse {
        protocol_version: i32::from_be_bytes(take(body, 0)?),
        timeout_ms: i32::from_be_bytes(take(body, 4)?),
        session_id: i64::from_be_bytes(take(body, 8)?),
    })
}

/// Parses a reply header (without the length prefix).
pub(crate) fn parse_reply_header(body: &[u8]) -> std::io::Result<ReplyHeader> {
    Ok(ReplyHeader {
        xid: i32::from_be_bytes(take(body, 0)?),
        zxid: i64::from_be_bytes(take(body, 4)?),
        err: i32::from_be_bytes(take(body, 12)?),
    })
}

/// Reads one length-prefixed frame.
pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let len = reader.read_i32().await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| *len <= MAX_FRAME)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid frame length {}", len),
            )
        })?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Writes one already-framed packet.
pub(crate) async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &[u8],
) -> std::io::Result<()> {
    writer.write_all(packet).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_rejects_out_of_range_offsets() {
        let body = [0u8; 16];
        assert!(take::<4>(&body, 12).is_ok());
        assert!(take::<4>(&body, 13).is_err());
        assert!(take::<8>(&body, usize::MAX).is_err());
        assert!(parse_reply_header(&body[..15]).is_err());
    }

    #[test]
    fn test_connect_request_layout() {
        let packet = connect_request(4000);
        assert_eq!(packet.len(), 4 + 45);
        assert_eq!(&packet[0..4], &45i32.to_be_bytes());
        // timeout sits after protocolVersion and lastZxidSeen
        assert_eq!(&packet[16..20], &4000i32.to_be_bytes());
        // passwd length prefix
        assert_eq!(&packet[28..32], &16i32.to_be_bytes());
        assert_eq!(packet[packet.len() - 1], 0);
    }

    #[test]
    fn test_auth_request_layout() {
        let packet = auth_request("svc", "pw");
        let body = &packet[4..];
        assert_eq!(&body[0..4], &AUTH_XID.to_be_bytes());
        assert_eq!(&body[4..8], &OP_AUTH.to_be_bytes());
        assert_eq!(&body[12..16], &6i32.to_be_bytes());
        assert_eq!(&body[16..22], b"digest");
        assert_eq!(&body[22..26], &6i32.to_be_bytes());
        assert_eq!(&body[26..32], b"svc:pw");
    }

    #[test]
    fn test_close_request_layout() {
        let packet = close_request(1);
        assert_eq!(packet, [0, 0, 0, 8, 0, 0, 0, 1, 0xff, 0xff, 0xff, 0xf5]);
    }

    #[test]
    fn test_parse_connect_response() {
        let mut body = Vec::new();
        body.extend_from_slice(&0i32.to_be_bytes());
        body.extend_from_slice(&4000i32.to_be_bytes());
        body.extend_from_slice(&42i64.to_be_bytes());
        let response = parse_connect_response(&body).unwrap();
        assert_eq!(response.timeout_ms, 4000);
        assert_eq!(response.session_id, 42);

        assert!(parse_connect_response(&body[..6]).is_err());
    }

    #[test]
    fn test_parse_reply_header() {
        let mut body = Vec::new();
        body.extend_from_slice(&AUTH_XID.to_be_bytes());
        body.extend_from_slice(&0i64.to_be_bytes());
        body.extend_from_slice(&(-115i32).to_be_bytes());
        let header = parse_reply_header(&body).unwrap();
        assert_eq!(header.xid, AUTH_XID);
        assert_eq!(header.err, -115);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized() {
        let mut input: &[u8] = &i32::MAX.to_be_bytes();
        assert!(read_frame(&mut input).await.is_err());

        let mut input: &[u8] = &[0, 0, 0, 2, 7, 9];
        assert_eq!(read_frame(&mut input).await.unwrap(), vec![7, 9]);
    }
}
