//! In-memory device used by the unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ffs_core::wire::{AckStatus, ChannelStatus, DEFAULT_NONCE_SEED};

use crate::channel::{ReadChannel, WriteChannel};
use crate::manager::PumpTiming;

pub(crate) fn fast_timing() -> PumpTiming {
    PumpTiming {
        poll_interval: Duration::from_millis(1),
        retry_backoff: Duration::from_millis(1),
        max_status_waits: 8,
        nonce_seed: DEFAULT_NONCE_SEED,
    }
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

#[derive(Default)]
struct Device {
    inbound: VecDeque<Vec<u8>>,
    acks: Vec<AckStatus>,
    written: Vec<Vec<u8>>,
    polled: Vec<u8>,
    statuses: VecDeque<ChannelStatus>,
    fail_next_write: bool,
    fail_next_read: bool,
    fail_next_ack: bool,
    responder: Option<Responder>,
}

/// Both channel halves backed by shared state the test can script and inspect.
/// Unscripted status polls answer `Ok`; an empty inbound queue reads as a
/// void packet.
#[derive(Clone, Default)]
pub(crate) struct MockDevice {
    inner: Arc<Mutex<Device>>,
}

impl MockDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn channels(&self) -> (MockRead, MockWrite) {
        (MockRead(self.clone()), MockWrite(self.clone()))
    }

    pub(crate) fn push_inbound(&self, frame: Vec<u8>) {
        self.inner.lock().unwrap().inbound.push_back(frame);
    }

    pub(crate) fn script_status(&self, statuses: impl IntoIterator<Item = ChannelStatus>) {
        self.inner.lock().unwrap().statuses.extend(statuses);
    }

    pub(crate) fn fail_next_write(&self) {
        self.inner.lock().unwrap().fail_next_write = true;
    }

    pub(crate) fn fail_next_read(&self) {
        self.inner.lock().unwrap().fail_next_read = true;
    }

    pub(crate) fn fail_next_ack(&self) {
        self.inner.lock().unwrap().fail_next_ack = true;
    }

    /// Called with every written packet; returned frames become readable.
    pub(crate) fn respond_with(&self, f: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static) {
        self.inner.lock().unwrap().responder = Some(Box::new(f));
    }

    pub(crate) fn written(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().written.clone()
    }

    pub(crate) fn polled(&self) -> Vec<u8> {
        self.inner.lock().unwrap().polled.clone()
    }

    pub(crate) fn acks(&self) -> Vec<AckStatus> {
        self.inner.lock().unwrap().acks.clone()
    }

    pub(crate) async fn wait_for_acks(&self, count: usize) -> Vec<AckStatus> {
        loop {
            let acks = self.acks();
            if acks.len() >= count {
                return acks;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

pub(crate) struct MockRead(MockDevice);

impl ReadChannel for MockRead {
    async fn read(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let frame = {
            let mut device = self.0.inner.lock().unwrap();
            if std::mem::take(&mut device.fail_next_read) {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read channel hung up"));
            }
            device.inbound.pop_front()
        };
        let mut buf = frame.unwrap_or_default();
        buf.resize(length, 0);
        Ok(buf)
    }

    async fn acknowledge(&mut self, status: AckStatus) -> io::Result<()> {
        let mut device = self.0.inner.lock().unwrap();
        if std::mem::take(&mut device.fail_next_ack) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "ack not delivered"));
        }
        device.acks.push(status);
        Ok(())
    }
}

pub(crate) struct MockWrite(MockDevice);

impl WriteChannel for MockWrite {
    async fn write(&mut self, packet: &[u8]) -> io::Result<()> {
        let mut device = self.0.inner.lock().unwrap();
        if std::mem::take(&mut device.fail_next_write) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        device.written.push(packet.to_vec());
        if let Some(mut responder) = device.responder.take() {
            let replies = responder(packet);
            device.inbound.extend(replies);
            device.responder = Some(responder);
        }
        Ok(())
    }

    async fn status(&mut self, nonce: u8) -> io::Result<ChannelStatus> {
        let mut device = self.0.inner.lock().unwrap();
        device.polled.push(nonce);
        Ok(device.statuses.pop_front().unwrap_or(ChannelStatus::Ok))
    }
}
