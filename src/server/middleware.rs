//! Middleware flow control.
//!
//! Each middleware runs in its own task and receives a [`Next`]. The dispatcher
//! does not start the next middleware until this one has either handed the
//! writer back with [`Next::proceed`] or taken over the response.

use log::debug;
use tokio::sync::oneshot;

use crate::server::writer::ResponseWriter;

/// What a middleware told the dispatcher.
#[derive(Debug)]
pub(crate) enum Flow {
    /// Keep going with this writer.
    Continue(ResponseWriter),
    /// The middleware answers the request itself; skip everything after it.
    Handled,
}

/// The signal a middleware sends to the dispatcher.
///
/// A middleware that writes its response without calling either method, or
/// drops the `Next`, is treated as having handled the request.
#[derive(Debug)]
pub struct Next {
    flow: oneshot::Sender<Flow>,
}

impl Next {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Flow>) {
        let (flow, flow_rx) = oneshot::channel();
        (Self { flow }, flow_rx)
    }

    /// Give the writer back and let the chain continue.
    ///
    /// The middleware may keep running afterwards, but it can no longer touch
    /// the response.
    pub fn proceed(self, res: ResponseWriter) {
        if self.flow.send(Flow::Continue(res)).is_err() {
            debug!("dispatcher stopped waiting before the middleware proceeded");
        }
    }

    /// Announce that this middleware answers the request. The caller keeps the
    /// writer and must write it.
    pub fn handled(self) {
        if self.flow.send(Flow::Handled).is_err() {
            debug!("dispatcher stopped waiting before the middleware short-circuited");
        }
    }
}
