use crate::*;

use ffs_core::wire::MAX_PAYLOAD;

#[tokio::test]
async fn test_inbound_frame_reaches_its_session_padded() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    let session = manager.add_session(6)?;

    device.send(6, b"from the device");
    let payload = session.read().await?;
    assert_eq!(payload.len(), MAX_PAYLOAD);
    assert_eq!(&payload[..15], b"from the device");
    assert!(payload[15..].iter().all(|b| *b == 0));
    assert_eq!(device.wait_for_acks(1).await?, vec![AckStatus::Acknowledge]);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_nonce_delivered_once() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    let session = manager.add_session(2)?;

    let frame = encode_packet(2, 0x5a, b"once").unwrap();
    device.send_raw(frame.clone());
    device.send_raw(frame);
    device.send_raw(encode_packet(2, 0x5b, b"twice").unwrap());

    assert_eq!(&session.read().await?[..4], b"once");
    assert_eq!(&session.read().await?[..5], b"twice");
    // All three frames were acknowledged, the duplicate included.
    assert_eq!(device.wait_for_acks(3).await?, vec![AckStatus::Acknowledge; 3]);

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_frame_for_unknown_session_is_refused() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    let session = manager.add_session(3)?;

    device.send(44, b"nobody home");
    device.send(3, b"somebody home");

    assert_eq!(&session.read().await?[..13], b"somebody home");
    assert_eq!(
        device.wait_for_acks(2).await?,
        vec![AckStatus::Error, AckStatus::Acknowledge]
    );

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_interleaved_sessions_each_see_their_own_order() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    let a = manager.add_session(10)?;
    let b = manager.add_session(11)?;

    for i in 0..6u8 {
        device.send(if i % 2 == 0 { 10 } else { 11 }, &[i]);
    }

    for expected in [0u8, 2, 4] {
        assert_eq!(a.read().await?[0], expected);
    }
    for expected in [1u8, 3, 5] {
        assert_eq!(b.read().await?[0], expected);
    }

    manager.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_reads_fail_after_shutdown_once_drained() -> Result<()> {
    let device = SimDevice::new(1);
    let manager = device.manager();
    let session = manager.add_session(8)?;

    device.send(8, b"last words");
    device.wait_for_acks(1).await?;
    manager.shutdown().await;

    assert_eq!(&session.read().await?[..10], b"last words");
    assert!(session.read().await.is_err());
    Ok(())
}
