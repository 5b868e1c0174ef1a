// src/io/types.rs
//
// Messages passed between the CAN worker thread and the async bridge loop.

use tokio::sync::{mpsc, oneshot};

use super::{CanMessage, IoError};

/// Events produced by the CAN worker
#[derive(Debug)]
pub enum CanEvent {
    /// A data frame was received
    Frame(CanMessage),
    /// The worker stopped on request
    Ended(String),
    /// The worker stopped on a socket error
    Error(IoError),
}

/// A frame to transmit, answered once the socket write completes
#[derive(Debug)]
pub struct TransmitRequest {
    pub frame: CanMessage,
    pub result_tx: oneshot::Sender<Result<(), IoError>>,
}

pub type TransmitSender = mpsc::Sender<TransmitRequest>;
