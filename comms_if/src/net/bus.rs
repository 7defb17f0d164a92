//! # Message Bus
//!
//! A publish/subscribe abstraction over the transport used between executables. Components are
//! handed a bus at construction rather than reaching for a global one, so the same component can
//! run over ZMQ in deployment and over a [`LocalBus`] in tests or single-process simulation.
//!
//! Handlers are called on whichever thread delivers the message and must not block, they should
//! only store the message in a cache or queue.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use super::MonitoredSocketError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Names of the channels used by the arm software.
pub mod channel {
    /// High level [`ArmCmd`](crate::tc::arm_ctrl::ArmCmd)s to the arm controller.
    pub const ARM_CMD: &str = "ARM_CMD";

    /// [`ArmStatus`](crate::tm::ArmStatus) telemetry from the arm controller.
    pub const ARM_TM: &str = "ARM_TM";

    /// [`JointCommandList`](crate::eqpt::mech::JointCommandList)s from the controller to the
    /// servo driver.
    pub const JOINT_DEMANDS: &str = "JOINT_DEMANDS";

    /// [`JointStatusList`](crate::eqpt::mech::JointStatusList)s from the servo driver.
    pub const JOINT_STATUS: &str = "JOINT_STATUS";
}

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// A handler for raw message payloads.
pub type RawHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A publish/subscribe message transport.
pub trait MessageBus: Send + Sync {
    /// Publish a raw payload on a channel.
    fn publish_raw(&self, channel: &str, payload: &[u8]) -> Result<(), BusError>;

    /// Register a handler for every payload published on a channel.
    fn subscribe_raw(&self, channel: &str, handler: RawHandler) -> Result<(), BusError>;
}

/// Typed helpers over any [`MessageBus`], encoding messages as JSON.
pub trait BusExt: MessageBus {
    /// Serialize and publish a message.
    fn publish<T: Serialize>(&self, channel: &str, msg: &T) -> Result<(), BusError> {
        let payload = serde_json::to_vec(msg).map_err(BusError::SerializationError)?;
        self.publish_raw(channel, &payload)
    }

    /// Subscribe to decoded messages on a channel.
    ///
    /// Payloads which cannot be decoded are logged and dropped, they never reach the handler.
    fn subscribe<T, F>(&self, channel: &str, handler: F) -> Result<(), BusError>
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let channel_name = channel.to_string();

        self.subscribe_raw(
            channel,
            Box::new(move |payload: &[u8]| match serde_json::from_slice::<T>(payload) {
                Ok(msg) => handler(msg),
                Err(e) => warn!("Dropping undecodable message on {}: {}", channel_name, e),
            }),
        )
    }
}

impl<B: MessageBus + ?Sized> BusExt for B {}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handlers registered against each channel.
#[derive(Default)]
pub(crate) struct HandlerMap {
    handlers: Mutex<HashMap<String, Vec<Arc<RawHandler>>>>,
}

/// An in-process bus which delivers messages synchronously on the publishing thread.
#[derive(Default)]
pub struct LocalBus {
    handlers: HandlerMap,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send message on {0}: {1}")]
    SendError(String, zmq::Error),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HandlerMap {
    pub(crate) fn add(&self, channel: &str, handler: RawHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.to_string())
            .or_insert_with(Vec::new)
            .push(Arc::new(handler));
    }

    /// Call every handler for the channel.
    ///
    /// The handlers are called after the lock is released so that a handler may itself publish
    /// or subscribe.
    pub(crate) fn dispatch(&self, channel: &str, payload: &[u8]) {
        let handlers: Vec<Arc<RawHandler>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
            .unwrap_or_default();

        for handler in handlers.iter() {
            handler(payload);
        }
    }
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageBus for LocalBus {
    fn publish_raw(&self, channel: &str, payload: &[u8]) -> Result<(), BusError> {
        self.handlers.dispatch(channel, payload);
        Ok(())
    }

    fn subscribe_raw(&self, channel: &str, handler: RawHandler) -> Result<(), BusError> {
        self.handlers.add(channel, handler);
        Ok(())
    }
}

impl From<MonitoredSocketError> for BusError {
    fn from(e: MonitoredSocketError) -> Self {
        BusError::SocketError(e)
    }
}
