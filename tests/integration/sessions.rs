use crate::*;

use ffs_core::codec::to_bytes;
use ffs_core::Endpoint;
use ffs_session::{OutboundState, PreSessionState};

fn endpoint(name: &str) -> Endpoint {
    Endpoint::from_content(name.as_bytes(), 1)
}

#[tokio::test]
async fn test_new_session_gets_device_assigned_id() -> Result<()> {
    let device = SimDevice::new(7);
    let manager = device.manager();

    let pre = manager.new_session(endpoint("echo"));
    assert_eq!(pre.endpoint(), &endpoint("echo"));
    let session = pre.get_session().await.expect("device accepts");

    assert_eq!(session.id(), 7);
    assert_eq!(pre.state(), PreSessionState::Ok);
    assert_eq!(manager.session_ids(), vec![0, 7]);
    assert_eq!(manager.sessions().len(), 2);
    assert_eq!(manager.session(7).map(|s| s.id()), Some(7));

    // The connect request went out on session 0: open command + endpoint.
    let written = device.written();
    let (header, payload) = decode_packet(&written[0]).unwrap();
    assert_eq!(header.session_id(), CONTROL_SESSION_ID);
    assert_eq!(payload[0], 0x01);
    assert_eq!(&payload[1..33], endpoint("echo").hash());
    assert_eq!(&payload[33..35], &[0x00, 0x01]);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_rejected_connect_request_fails() -> Result<()> {
    let device = SimDevice::new(7);
    device.script([ChannelStatus::Error]);
    let manager = device.manager();

    let pre = manager.new_session(endpoint("closed"));
    assert!(pre.get_session().await.is_none());
    assert_eq!(pre.state(), PreSessionState::Fail);
    assert_eq!(manager.session_ids(), vec![0]);

    // Control worker survives and serves the next request.
    let next = manager.new_session(endpoint("open"));
    assert_eq!(next.get_session().await.map(|s| s.id()), Some(7));

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_get_distinct_sessions() -> Result<()> {
    let device = SimDevice::new(20);
    let manager = device.manager();

    let requests: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| manager.new_session(endpoint(name)))
        .collect();

    let mut ids = Vec::new();
    for pre in &requests {
        ids.push(pre.get_session().await.expect("device accepts").id());
    }
    assert_eq!(ids, vec![20, 21, 22, 23]);
    assert_eq!(manager.session_ids(), vec![0, 20, 21, 22, 23]);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_echo_round_trip_on_opened_session() -> Result<()> {
    let device = SimDevice::new(3);
    let manager = device.manager();
    let session = manager
        .new_session(endpoint("echo"))
        .get_session()
        .await
        .expect("device accepts");

    let message = to_bytes("are you there?")?;
    assert_eq!(session.write_blocking(message).await?, OutboundState::SentAck);

    let reply = session.read().await?;
    let echoed: String = ffs_core::codec::from_bytes(&reply)?;
    assert_eq!(echoed, "are you there?");

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_pending_request_fails_locally_on_shutdown() -> Result<()> {
    let device = SimDevice::new(3);
    device.refuse_connects();
    let manager = device.manager();

    let pre = manager.new_session(endpoint("silent"));
    // Acknowledged, but the device never answers.
    while device.written().is_empty() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(pre.state(), PreSessionState::InNegotiation);

    manager.shutdown().await;
    assert!(pre.get_session().await.is_none());
    assert_eq!(pre.state(), PreSessionState::LocalFail);
    Ok(())
}

#[tokio::test]
async fn test_control_session_is_reserved() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    assert_eq!(manager.session_ids(), vec![CONTROL_SESSION_ID]);
    assert!(manager.add_session(CONTROL_SESSION_ID).is_err());
    assert!(manager.session(CONTROL_SESSION_ID).is_none());
    manager.shutdown().await;
    Ok(())
}
