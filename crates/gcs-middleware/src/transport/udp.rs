//! Datagram transport for the fixed binary framing.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use gcs_types::GcsError;
use tracing::{debug, info, warn};

use super::{ReceiveCallback, Transport, join_with_timeout};

const MAX_DATAGRAM: usize = 2048;
/// Read timeout; bounds how long the reader takes to notice shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl UdpTransport {
    /// Bind `bind`, remember `peer` as the send target, and start the
    /// reader thread.
    pub fn open(bind: SocketAddr, peer: SocketAddr, on_receive: ReceiveCallback) -> Result<Self, GcsError> {
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));

        let reader = {
            let socket = Arc::clone(&socket);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("gcs-udp-rx".to_string())
                .spawn(move || read_loop(&socket, &running, &on_receive))?
        };

        info!(local = %socket.local_addr()?, %peer, "UDP link open");
        Ok(Self {
            socket,
            peer,
            running,
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GcsError> {
        Ok(self.socket.local_addr()?)
    }
}

fn read_loop(socket: &UdpSocket, running: &AtomicBool, on_receive: &ReceiveCallback) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((n, _from)) => on_receive("", &buf[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) => {}
            Err(e) => {
                warn!(error = %e, "UDP receive failed");
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
    debug!("UDP reader stopped");
}

impl Transport for UdpTransport {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn send(&self, _key: &str, bytes: &[u8]) -> Result<(), GcsError> {
        self.socket.send_to(bytes, self.peer)?;
        Ok(())
    }

    fn close(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let handle = self.reader.lock().ok().and_then(|mut g| g.take());
        if let Some(handle) = handle
            && !join_with_timeout(handle, JOIN_TIMEOUT)
        {
            warn!("UDP reader did not stop in time");
        }
        info!("UDP link closed");
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn receives_datagrams_on_reader_thread() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let tx = Mutex::new(tx);
        let cb: ReceiveCallback = Arc::new(move |_key, bytes| {
            let _ = tx.lock().unwrap().send(bytes.to_vec());
        });
        let transport = UdpTransport::open(loopback(), loopback(), cb).unwrap();
        let target = transport.local_addr().unwrap();

        let sender = UdpSocket::bind(loopback()).unwrap();
        sender.send_to(b"RE\x01\x00\x00", target).unwrap();

        let got = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, b"RE\x01\x00\x00");
        transport.close();
    }

    #[test]
    fn send_reaches_peer() {
        let peer = UdpSocket::bind(loopback()).unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let cb: ReceiveCallback = Arc::new(|_, _| {});
        let transport = UdpTransport::open(loopback(), peer.local_addr().unwrap(), cb).unwrap();

        transport.send("HB", b"HB-test").unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"HB-test");
    }

    #[test]
    fn close_is_idempotent() {
        let cb: ReceiveCallback = Arc::new(|_, _| {});
        let transport = UdpTransport::open(loopback(), loopback(), cb).unwrap();
        transport.close();
        transport.close();
    }
}
