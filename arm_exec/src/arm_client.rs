//! # Arm Client
//!
//! Receives joint status and arm commands from the bus. Both arrive on the bus's receive thread,
//! so they are stored in a cache and a queue respectively, to be picked up by the control loop
//! on its own thread.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::Arc;

use log::{trace, warn};

use crate::cmd_queue::CmdQueue;
use comms_if::{
    eqpt::mech::{oldest_timestamp, JointStatusList, JointStatusSet},
    net::{channel, BusError, BusExt, MessageBus},
    tc::arm_ctrl::ArmCmd,
};
use util::cache::{CacheParams, TimedCache};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Inputs to the arm controller, filled in from the bus.
pub struct ArmClient {
    /// Latest joint status, timestamped with its oldest joint reading.
    pub status_cache: Arc<TimedCache<JointStatusSet>>,

    /// Commands waiting to be executed.
    pub queue: Arc<CmdQueue>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl ArmClient {
    /// Create a new client, subscribing to joint status and arm commands on the bus.
    pub fn new(bus: &dyn MessageBus, status_cache_params: &CacheParams) -> Result<Self, BusError> {
        let status_cache = Arc::new(TimedCache::from_params(status_cache_params));
        let queue = Arc::new(CmdQueue::new());

        let cache = status_cache.clone();
        bus.subscribe(channel::JOINT_STATUS, move |list: JointStatusList| {
            match list.into_set() {
                Ok(set) => {
                    let timestamp = oldest_timestamp(&set);
                    cache.put(set, timestamp)
                }
                Err(e) => warn!("Dropping joint status: {}", e),
            }
        })?;

        let cmds = queue.clone();
        bus.subscribe(channel::ARM_CMD, move |cmd: ArmCmd| {
            if !cmds.push(cmd) {
                trace!("ArmCmd {} is a repeat, not queued", cmd.cmd_id);
            }
        })?;

        Ok(Self {
            status_cache,
            queue,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, Utc};
    use comms_if::{eqpt::mech::JointStatus, net::LocalBus, tc::arm_ctrl::ArmAction};
    use util::cache::CacheMode;

    fn params() -> CacheParams {
        CacheParams {
            max_age_s: 0.2,
            mode: CacheMode::Latching,
        }
    }

    fn status_list(n: usize) -> JointStatusList {
        let now = Utc::now();
        JointStatusList {
            statuses: (0..n)
                .map(|i| JointStatus {
                    joint_idx: i,
                    pos_rad: 0.1 * i as f64,
                    speed: 0.0,
                    load: 0.0,
                    voltage: 12.0,
                    temperature: 30.0,
                    error_flags: 0,
                    timestamp: now - Duration::milliseconds(i as i64),
                })
                .collect(),
        }
    }

    #[test]
    fn test_status_cached() {
        let bus = LocalBus::new();
        let client = ArmClient::new(&bus, &params()).unwrap();

        let list = status_list(6);
        bus.publish(channel::JOINT_STATUS, &list).unwrap();

        let now = Utc::now();
        let set = client.status_cache.get_at(now).unwrap();
        assert_eq!(set[5].pos_rad, 0.5);

        // Stamped with the oldest reading
        let age = client.status_cache.age_at(now).unwrap();
        assert!(age >= now - list.statuses[5].timestamp);
    }

    #[test]
    fn test_short_status_dropped() {
        let bus = LocalBus::new();
        let client = ArmClient::new(&bus, &params()).unwrap();

        bus.publish(channel::JOINT_STATUS, &status_list(5)).unwrap();
        assert!(client.status_cache.get_at(Utc::now()).is_none());
    }

    #[test]
    fn test_cmds_queued_once() {
        let bus = LocalBus::new();
        let client = ArmClient::new(&bus, &params()).unwrap();

        let cmd = ArmCmd {
            cmd_id: 3,
            action: ArmAction::Reset,
        };
        bus.publish(channel::ARM_CMD, &cmd).unwrap();
        bus.publish(channel::ARM_CMD, &cmd).unwrap();

        assert_eq!(client.queue.len(), 1);
        assert_eq!(client.queue.peek(), Some(cmd));
    }
}
