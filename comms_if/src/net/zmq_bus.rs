//! # ZMQ Message Bus
//!
//! A [`MessageBus`] carried over a ZMQ PUB socket, which peers subscribe to. Each message is sent
//! as two frames, the channel name followed by the payload.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
};

use super::{
    bus::HandlerMap, BusError, BusParams, MessageBus, MonitoredSocket, MonitoredSocketError,
    RawHandler, SocketOptions,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive timeout of the subscriber socket, the background thread checks for shutdown at least
/// this often.
///
/// Units: milliseconds
const SUB_RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A message bus over ZMQ PUB/SUB sockets.
pub struct ZmqBus {
    pub_socket: Mutex<MonitoredSocket>,

    handlers: Arc<HandlerMap>,

    bg_run: Arc<AtomicBool>,

    bg_jh: Option<thread::JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqBus {
    /// Create a new bus, binding the publisher and connecting to every subscription endpoint.
    ///
    /// Received messages are dispatched to handlers from a background thread.
    pub fn new(ctx: &zmq::Context, params: &BusParams) -> Result<Self, BusError> {
        let pub_options = SocketOptions {
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };
        let pub_socket = MonitoredSocket::new(ctx, zmq::PUB, pub_options, &params.pub_endpoint)?;
        debug!("Bus publishing on {}", params.pub_endpoint);

        let handlers = Arc::new(HandlerMap::default());
        let bg_run = Arc::new(AtomicBool::new(true));

        let bg_jh = match params.sub_endpoints.split_first() {
            Some((first, rest)) => {
                let sub_options = SocketOptions {
                    linger: 1,
                    recv_timeout: SUB_RECV_TIMEOUT_MS,
                    ..Default::default()
                };
                let sub_socket = MonitoredSocket::new(ctx, zmq::SUB, sub_options, first)?;

                for endpoint in rest {
                    sub_socket
                        .connect(endpoint)
                        .map_err(|e| MonitoredSocketError::CouldNotConnect(Some(e)))?;
                }
                sub_socket.set_subscribe(b"").map_err(|e| {
                    MonitoredSocketError::SocketOptionError("set_subscribe".into(), e)
                })?;
                debug!("Bus subscribed to {:?}", params.sub_endpoints);

                let handlers_clone = handlers.clone();
                let bg_run_clone = bg_run.clone();

                Some(thread::spawn(move || {
                    bg_recv(sub_socket, handlers_clone, bg_run_clone)
                }))
            }
            None => None,
        };

        Ok(Self {
            pub_socket: Mutex::new(pub_socket),
            handlers,
            bg_run,
            bg_jh,
        })
    }

    /// True if at least one peer is connected to the publisher.
    pub fn connected(&self) -> bool {
        self.pub_socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected()
    }
}

impl MessageBus for ZmqBus {
    fn publish_raw(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        let socket = self.pub_socket.lock().unwrap_or_else(PoisonError::into_inner);

        socket
            .send_multipart(vec![channel.as_bytes(), payload], 0)
            .map_err(|e| BusError::SendError(channel.to_string(), e))
    }

    fn subscribe_raw(&self, channel: &str, handler: RawHandler) -> Result<(), BusError> {
        self.handlers.add(channel, handler);
        Ok(())
    }
}

impl Drop for ZmqBus {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().ok();
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn bg_recv(socket: MonitoredSocket, handlers: Arc<HandlerMap>, run: Arc<AtomicBool>) {
    while run.load(Ordering::Relaxed) {
        match socket.recv_multipart(0) {
            Ok(frames) if frames.len() == 2 => {
                let channel = String::from_utf8_lossy(&frames[0]);
                handlers.dispatch(&channel, &frames[1]);
            }
            Ok(frames) => warn!("Dropping bus message with {} frames", frames.len()),
            Err(zmq::Error::EAGAIN) => (),
            Err(zmq::Error::ETERM) => break,
            Err(e) => warn!("Bus receive error: {}", e),
        }
    }
}
