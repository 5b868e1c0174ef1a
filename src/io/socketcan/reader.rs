// src/io/socketcan/reader.rs
//
// SocketCAN port and worker thread.
//
// The socket is blocking with a short read timeout. One blocking task owns
// it: between reads it drains pending transmit requests, so a single socket
// serves both directions without locking. The loop itself is in worker.rs.
//
// The port is only functional on Linux.

#[cfg(target_os = "linux")]
mod linux_impl {
    use socketcan::{
        CanDataFrame, CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame, Id, Socket,
        SocketOptions, StandardId,
    };
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use crate::io::socketcan::worker::{run_worker_loop, FramePort};
    use crate::io::socketcan::{device_label, is_valid_interface_name, SocketCanConfig};
    use crate::io::{CanEvent, CanMessage, IoError, TransmitRequest, TransmitSender};
    use crate::tlog;

    /// Pending transmit requests buffered ahead of the worker
    const TRANSMIT_QUEUE: usize = 32;

    // ============================================================================
    // Interface Configuration
    // ============================================================================

    /// Bring the interface down, set its bitrate and bring it back up.
    pub fn configure_interface(interface: &str, bitrate: u32) -> Result<(), IoError> {
        use std::process::Command;

        let device = device_label(interface);
        if !is_valid_interface_name(interface) {
            return Err(IoError::configuration(&device, "invalid interface name"));
        }

        tlog!("[socketcan] Configuring {} with bitrate {}", interface, bitrate);

        let script = format!(
            "ip link set {iface} down && ip link set {iface} type can bitrate {bitrate} && ip link set {iface} up",
            iface = interface,
            bitrate = bitrate
        );

        let output = Command::new("sh")
            .args(["-c", &script])
            .output()
            .map_err(|e| IoError::configuration(&device, format!("failed to run ip: {}", e)))?;

        if output.status.success() {
            tlog!("[socketcan] Interface {} configured", interface);
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.contains("Operation not permitted") {
            "not permitted (needs CAP_NET_ADMIN)".to_string()
        } else if !stderr.trim().is_empty() {
            stderr.trim().to_string()
        } else {
            format!("exit code: {:?}", output.status.code())
        };
        Err(IoError::configuration(&device, detail))
    }

    // ============================================================================
    // Frame Conversion
    // ============================================================================

    /// Received frame to bridge format. Remote and error frames are skipped.
    fn convert_frame(frame: CanFrame) -> Option<CanMessage> {
        match frame {
            CanFrame::Data(f) => Some(CanMessage {
                id: f.raw_id() & 0x1FFF_FFFF,
                extended: f.is_extended(),
                data: f.data().to_vec(),
            }),
            CanFrame::Remote(_) => None,
            CanFrame::Error(_) => None,
        }
    }

    fn build_data_frame(msg: &CanMessage) -> Result<CanDataFrame, String> {
        let id = if msg.extended {
            Id::Extended(
                ExtendedId::new(msg.id)
                    .ok_or_else(|| format!("invalid extended ID: 0x{:08X}", msg.id))?,
            )
        } else {
            let raw = u16::try_from(msg.id).map_err(|_| format!("invalid standard ID: 0x{:X}", msg.id))?;
            Id::Standard(
                StandardId::new(raw).ok_or_else(|| format!("invalid standard ID: 0x{:03X}", msg.id))?,
            )
        };
        CanDataFrame::new(id, &msg.data).ok_or_else(|| "failed to build data frame".to_string())
    }

    // ============================================================================
    // Port
    // ============================================================================

    /// Raw classic CAN socket bound to one interface
    pub struct SocketCanPort {
        socket: CanSocket,
        device: String,
    }

    impl SocketCanPort {
        pub fn open(interface: &str, read_timeout: Duration) -> Result<Self, IoError> {
            let device = device_label(interface);
            let socket = CanSocket::open(interface)
                .map_err(|e| IoError::connection(&device, e.to_string()))?;

            // Frames we send must not come back as state updates.
            if let Err(e) = socket.set_recv_own_msgs(false) {
                tlog!(warn: "[socketcan] {}: could not disable own-message reception: {}", device, e);
            }

            socket
                .set_read_timeout(read_timeout)
                .map_err(|e| IoError::configuration(&device, format!("set read timeout: {}", e)))?;

            Ok(Self { socket, device })
        }

        pub fn device(&self) -> &str {
            &self.device
        }

        pub fn send(&self, msg: &CanMessage) -> Result<(), IoError> {
            let frame = build_data_frame(msg).map_err(|e| IoError::protocol(&self.device, e))?;
            self.socket
                .write_frame(&frame)
                .map_err(|e| IoError::write(&self.device, e.to_string()))
        }

        /// Next data frame, or None on timeout or a skipped frame
        pub fn recv(&self) -> Result<Option<CanMessage>, IoError> {
            match self.socket.read_frame() {
                Ok(frame) => Ok(convert_frame(frame)),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
                Err(e) => Err(IoError::read(&self.device, e.to_string())),
            }
        }
    }

    impl FramePort for SocketCanPort {
        fn send(&self, msg: &CanMessage) -> Result<(), IoError> {
            SocketCanPort::send(self, msg)
        }

        fn recv(&self) -> Result<Option<CanMessage>, IoError> {
            SocketCanPort::recv(self)
        }
    }

    // ============================================================================
    // Worker
    // ============================================================================

    /// Handle to the blocking socket task
    pub struct CanWorker {
        stop_flag: Arc<AtomicBool>,
        handle: JoinHandle<()>,
        transmit_tx: TransmitSender,
    }

    impl CanWorker {
        pub fn transmitter(&self) -> TransmitSender {
            self.transmit_tx.clone()
        }

        /// Ask the worker to stop and wait for it. Returns within one read
        /// timeout, provided the event receiver is drained or dropped.
        pub async fn stop(self) {
            self.stop_flag.store(true, Ordering::Relaxed);
            let _ = self.handle.await;
        }
    }

    /// Open the interface and start the worker. Must be called inside a tokio runtime.
    pub fn spawn_worker(
        config: &SocketCanConfig,
        events: mpsc::Sender<CanEvent>,
    ) -> Result<CanWorker, IoError> {
        if let Some(bitrate) = config.bitrate {
            configure_interface(&config.interface, bitrate)?;
        }

        let port = SocketCanPort::open(&config.interface, Duration::from_millis(config.read_timeout_ms))?;
        tlog!("[socketcan] Opened {}", port.device());

        let (transmit_tx, transmit_rx) = mpsc::channel::<TransmitRequest>(TRANSMIT_QUEUE);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let handle = tokio::task::spawn_blocking(move || {
            run_worker_loop(port, stop_flag_clone, transmit_rx, events);
        });

        Ok(CanWorker {
            stop_flag,
            handle,
            transmit_tx,
        })
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::{configure_interface, spawn_worker, CanWorker, SocketCanPort};

// ============================================================================
// Non-Linux Stub
// ============================================================================

#[cfg(not(target_os = "linux"))]
mod stub {
    use std::time::Duration;
    use tokio::sync::mpsc;

    use crate::io::socketcan::{device_label, SocketCanConfig};
    use crate::io::{CanEvent, CanMessage, IoError, TransmitSender};

    const UNSUPPORTED: &str = "SocketCAN is only available on Linux";

    pub fn configure_interface(interface: &str, _bitrate: u32) -> Result<(), IoError> {
        Err(IoError::configuration(&device_label(interface), UNSUPPORTED))
    }

    pub struct SocketCanPort {
        device: String,
    }

    impl SocketCanPort {
        pub fn open(interface: &str, _read_timeout: Duration) -> Result<Self, IoError> {
            Err(IoError::connection(&device_label(interface), UNSUPPORTED))
        }

        pub fn device(&self) -> &str {
            &self.device
        }

        pub fn send(&self, _msg: &CanMessage) -> Result<(), IoError> {
            Err(IoError::write(&self.device, UNSUPPORTED))
        }

        pub fn recv(&self) -> Result<Option<CanMessage>, IoError> {
            Err(IoError::read(&self.device, UNSUPPORTED))
        }
    }

    pub struct CanWorker {
        transmit_tx: TransmitSender,
    }

    impl CanWorker {
        pub fn transmitter(&self) -> TransmitSender {
            self.transmit_tx.clone()
        }

        pub async fn stop(self) {}
    }

    pub fn spawn_worker(
        config: &SocketCanConfig,
        _events: mpsc::Sender<CanEvent>,
    ) -> Result<CanWorker, IoError> {
        Err(IoError::connection(&device_label(&config.interface), UNSUPPORTED))
    }
}

#[cfg(not(target_os = "linux"))]
pub use stub::{configure_interface, spawn_worker, CanWorker, SocketCanPort};
