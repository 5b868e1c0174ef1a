// src/io/socketcan/worker.rs
//
// Blocking loop shared by the SocketCAN worker: drain transmit requests,
// read one frame, forward it, repeat until stopped.
//
// Exits when the stop flag is set, when the event receiver is gone or on a
// read error. It never blocks on a full event queue once the receiver has
// been dropped.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;

use crate::io::{CanEvent, CanMessage, IoError, TransmitRequest};

/// A blocking frame source and sink with a bounded read timeout
pub trait FramePort: Send + 'static {
    fn send(&self, msg: &CanMessage) -> Result<(), IoError>;
    /// Next data frame, or None on timeout
    fn recv(&self) -> Result<Option<CanMessage>, IoError>;
}

/// Run on a blocking thread (`spawn_blocking` or `std::thread`).
pub fn run_worker_loop<P: FramePort>(
    port: P,
    stop_flag: Arc<AtomicBool>,
    mut transmit_rx: mpsc::Receiver<TransmitRequest>,
    events: mpsc::Sender<CanEvent>,
) {
    while !stop_flag.load(Ordering::Relaxed) {
        while let Ok(req) = transmit_rx.try_recv() {
            let result = port.send(&req.frame);
            let _ = req.result_tx.send(result);
        }

        match port.recv() {
            Ok(Some(frame)) => {
                if events.blocking_send(CanEvent::Frame(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                let _ = events.try_send(CanEvent::Error(e));
                return;
            }
        }
    }
    let _ = events.try_send(CanEvent::Ended("stopped".to_string()));
}
