//! Controls sent from the connection handle to the connection engine

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::channel::{self, shared::ChannelShared};

#[derive(Debug)]
pub(crate) enum ConnectionControl {
    /// Close the connection with reply code 200
    Close,

    /// Allocate and register the next channel number
    CreateChannel {
        responder: oneshot::Sender<Result<Arc<ChannelShared>, channel::Error>>,
    },
}
