use crate::*;

use ffs_core::wire::MAX_PAYLOAD;
use ffs_session::{OutboundState, SessionError};

#[tokio::test]
async fn test_acknowledged_write_resolves_sent_ack() -> Result<()> {
    let device = SimDevice::new(1);
    device.set_echo(false);
    let manager = device.manager();
    let session = manager.add_session(4)?;

    let handle = session.write(&b"hello device"[..])?;
    assert_eq!(handle.session_id(), 4);
    assert_eq!(handle.block_until().await, OutboundState::SentAck);
    // Terminal state is stable for late observers.
    assert_eq!(handle.block_until().await, OutboundState::SentAck);
    assert_eq!(handle.state(), OutboundState::SentAck);

    let written = device.written();
    assert_eq!(written.len(), 1);
    let (header, payload) = decode_packet(&written[0]).unwrap();
    assert_eq!(header.session_id(), 4);
    assert_ne!(header.nonce, 0);
    assert_eq!(&payload[..12], b"hello device");

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_largest_payload_is_accepted() -> Result<()> {
    let device = SimDevice::new(1);
    device.set_echo(false);
    let manager = device.manager();
    let session = manager.add_session(2)?;

    let payload = vec![0xabu8; MAX_PAYLOAD];
    assert_eq!(session.write_blocking(payload).await?, OutboundState::SentAck);
    let written = device.written();
    let (_, on_wire) = decode_packet(&written[0]).unwrap();
    assert!(on_wire.iter().all(|b| *b == 0xab));

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_oversized_write_fails_and_never_reaches_device() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    let session = manager.add_session(2)?;

    let err = session.write(vec![0u8; MAX_PAYLOAD + 1]).unwrap_err();
    assert_eq!(err, SessionError::TooMuchData(MAX_PAYLOAD + 1));
    let err = session
        .write_blocking(vec![0u8; MAX_PAYLOAD + 100])
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::TooMuchData(MAX_PAYLOAD + 100));

    // Give the writer a chance to misbehave.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(device.written().is_empty());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_device_rejection_resolves_sent_fail_err() -> Result<()> {
    let device = SimDevice::new(1);
    device.script([ChannelStatus::Error]);
    let manager = device.manager();
    let session = manager.add_session(3)?;

    assert_eq!(session.write_blocking(&b"bad"[..]).await?, OutboundState::SentFailErr);
    assert_eq!(device.written().len(), 1);
    // Pump keeps going after a rejection.
    assert_eq!(session.write_blocking(&b"good"[..]).await?, OutboundState::SentAck);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_one_outbound_in_flight_across_sessions() -> Result<()> {
    let device = SimDevice::new(1);
    device.set_echo(false);
    // Slow verdicts so deliveries overlap in time if they could.
    device.script(
        [ChannelStatus::Wait, ChannelStatus::Wait, ChannelStatus::Ok]
            .into_iter()
            .cycle()
            .take(60),
    );
    let manager = device.manager();

    let mut handles = Vec::new();
    for id in 1..=4u16 {
        let session = manager.add_session(id)?;
        for i in 0..5u8 {
            handles.push(session.write(vec![id as u8, i])?);
        }
    }

    loop {
        let active = handles
            .iter()
            .filter(|h| {
                matches!(
                    h.state(),
                    OutboundState::InDelivery | OutboundState::SentWaiting
                )
            })
            .count();
        assert!(active <= 1, "{active} outbounds in delivery at once");
        if handles.iter().all(|h| h.state().is_terminal()) {
            break;
        }
        tokio::task::yield_now().await;
    }

    for handle in &handles {
        assert_eq!(handle.block_until().await, OutboundState::SentAck);
    }
    assert_eq!(device.written().len(), 20);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_writes_on_one_session_keep_their_order() -> Result<()> {
    let device = SimDevice::new(1);
    device.set_echo(false);
    let manager = device.manager();
    let session = manager.add_session(9)?;

    let handles: Vec<_> = (0..10u8)
        .map(|i| session.write(vec![i]))
        .collect::<Result<_, _>>()?;
    for handle in &handles {
        assert_eq!(handle.block_until().await, OutboundState::SentAck);
    }

    let order: Vec<u8> = device
        .written()
        .iter()
        .map(|p| decode_packet(p).unwrap().1[0])
        .collect();
    assert_eq!(order, (0..10).collect::<Vec<u8>>());

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_fails_outstanding_writes() -> Result<()> {
    let device = SimDevice::new(1);
    device.script(std::iter::repeat(ChannelStatus::Wait).take(100_000));
    let manager = device.manager_with(PumpTiming {
        max_status_waits: u32::MAX,
        ..fast_timing()
    });
    let session = manager.add_session(5)?;

    let stuck = session.write(&b"stuck"[..])?;
    let queued = session.write(&b"queued"[..])?;
    stuck.wait_for_state(OutboundState::SentWaiting).await;

    manager.shutdown().await;
    assert_eq!(stuck.block_until().await, OutboundState::LocalFail);
    assert_eq!(queued.block_until().await, OutboundState::LocalFail);
    Ok(())
}
