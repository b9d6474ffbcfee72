//! End-to-end over the socket transport against a TCP device.

use crate::*;

use ffs_core::codec::{from_bytes, to_bytes};
use ffs_core::config::{TransportConfig, TransportKind};
use ffs_core::wire::{StatusCode, SOCKET_CMD_DATA, SOCKET_CMD_STATUS, STATUS_LENGTH};
use ffs_core::Endpoint;
use ffs_session::OutboundState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Outbox = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// Serve the device side of the read port: hand out queued frames (or a
/// void packet) and collect acknowledgments for real frames.
async fn serve_read_port(mut stream: TcpStream, outbox: Outbox, acks: Arc<Mutex<Vec<u8>>>) {
    let mut cmd = [0u8; 1];
    while stream.read_exact(&mut cmd).await.is_ok() {
        assert_eq!(cmd[0], SOCKET_CMD_DATA);
        let frame = outbox.lock().unwrap().pop_front();
        match frame {
            Some(frame) => {
                stream.write_all(&frame).await.unwrap();
                let mut ack = [0u8; STATUS_LENGTH];
                if stream.read_exact(&mut ack).await.is_err() {
                    return;
                }
                acks.lock().unwrap().push(ack[0]);
            }
            None => stream.write_all(&[0u8; PACKET_LENGTH]).await.unwrap(),
        }
    }
}

/// Serve the write port: accept packets, answer connect requests with
/// session 3, echo everything else, and report success for the last nonce.
async fn serve_write_port(mut stream: TcpStream, outbox: Outbox) {
    let mut last_nonce = 0u8;
    let mut reply_nonce = 0x80u8;
    let mut cmd = [0u8; 1];
    while stream.read_exact(&mut cmd).await.is_ok() {
        match cmd[0] {
            SOCKET_CMD_DATA => {
                let mut packet = vec![0u8; PACKET_LENGTH];
                stream.read_exact(&mut packet).await.unwrap();
                let (header, payload) = decode_packet(&packet).unwrap();
                last_nonce = header.nonce;
                reply_nonce = reply_nonce.wrapping_add(1).max(1);
                let reply = if header.session_id() == CONTROL_SESSION_ID {
                    let _: ConnectRequest = from_bytes(payload).unwrap();
                    encode_packet(CONTROL_SESSION_ID, reply_nonce, &3u16.to_be_bytes())
                } else {
                    encode_packet(header.session_id(), reply_nonce, payload)
                };
                outbox.lock().unwrap().push_back(reply.unwrap());
            }
            SOCKET_CMD_STATUS => {
                let mut block = [0u8; STATUS_LENGTH];
                block[0] = StatusCode::Success.into();
                block[1] = last_nonce;
                stream.write_all(&block).await.unwrap();
            }
            other => panic!("unexpected command byte {other:#x}"),
        }
    }
}

#[tokio::test]
async fn test_socket_transport_end_to_end() -> Result<()> {
    let read_listener = TcpListener::bind("127.0.0.1:0").await?;
    let write_listener = TcpListener::bind("127.0.0.1:0").await?;
    let config = TransportConfig {
        kind: TransportKind::Socket,
        host: "127.0.0.1".into(),
        read_port: read_listener.local_addr()?.port(),
        write_port: write_listener.local_addr()?.port(),
        ..TransportConfig::default()
    };

    let outbox: Outbox = Arc::default();
    let acks = Arc::new(Mutex::new(Vec::new()));
    {
        let outbox = outbox.clone();
        let acks = acks.clone();
        tokio::spawn(async move {
            let (stream, _) = read_listener.accept().await.unwrap();
            serve_read_port(stream, outbox, acks).await;
        });
    }
    {
        let outbox = outbox.clone();
        tokio::spawn(async move {
            let (stream, _) = write_listener.accept().await.unwrap();
            serve_write_port(stream, outbox).await;
        });
    }

    let (read, write) = ffs_session::transport::connect(&config).await?;
    let manager = SessionManager::with_timing(read, write, fast_timing());

    let session = manager
        .new_session(Endpoint::from_content(b"echo", 0))
        .get_session()
        .await
        .expect("device accepts");
    assert_eq!(session.id(), 3);

    let state = session.write_blocking(to_bytes("over tcp")?).await?;
    assert_eq!(state, OutboundState::SentAck);
    let echoed: String = from_bytes(&session.read().await?)?;
    assert_eq!(echoed, "over tcp");

    // Connect reply and echo were both acknowledged with READY.
    for _ in 0..2000 {
        if acks.lock().unwrap().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(*acks.lock().unwrap(), vec![0x10, 0x10]);

    manager.shutdown().await;
    Ok(())
}
