//! # Arm driver
//!
//! Writes joint demands received from the bus to the servos, and publishes the servos' status at
//! a fixed rate. Demands are only written to a servo when they change, or when the last write is
//! older than the refresh period, so the servo bus is not flooded with identical goals.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use log::{debug, info, trace, warn};
use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::{Duration, Instant},
};

use crate::{params::MechExecParams, servo_ctrl::{JointHandle, ServoBus}};
use comms_if::{
    eqpt::mech::{JointCommand, JointCommandList, JointCommandSet, JointStatus, JointStatusList, NUM_JOINTS},
    net::{channel, BusError, BusExt, MessageBus},
};
use util::{
    cache::TimedCache,
    time::{end_cycle, seconds_to_duration, CycleEnd},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Drives the arm's servos from the joint demands on the bus.
pub struct ArmDriver {
    joints: Vec<Arc<dyn JointHandle>>,

    /// Latest demands, stamped with their arrival time.
    cmd_cache: Arc<TimedCache<JointCommandSet>>,

    signal: Arc<CmdSignal>,

    /// Last demand written to each servo.
    last_cmds: [Option<JointCommand>; NUM_JOINTS],

    refresh_period: chrono::Duration,

    cmd_wait_period: Duration,
}

/// Reads the servos' status and publishes it at a fixed rate.
pub struct StatusPoller {
    joints: Vec<Arc<dyn JointHandle>>,
    bus: Arc<dyn MessageBus>,
    period: Duration,
}

/// Wakes the command loop when new demands arrive.
#[derive(Default)]
struct CmdSignal {
    /// Incremented for every received set of demands.
    generation: Mutex<u64>,
    cvar: Condvar,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Could not communicate with the servo of joint {0}")]
    MissingJoint(usize),

    #[error("Status frequency must be positive, found {0} Hz")]
    InvalidStatusFrequency(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmDriver {
    /// Create a new driver, checking every joint's servo is present on the bus.
    pub fn new(servo_bus: &dyn ServoBus, params: &MechExecParams) -> Result<Self, DriverError> {
        let mut joints = Vec::with_capacity(NUM_JOINTS);

        // Self test
        for i in 0..NUM_JOINTS {
            match servo_bus.get_joint(i) {
                Some(j) => {
                    info!("Joint {}: {} present", i, j.model());
                    joints.push(j);
                }
                None => return Err(DriverError::MissingJoint(i)),
            }
        }

        Ok(Self {
            joints,
            cmd_cache: Arc::new(TimedCache::from_params(&params.cmd_cache)),
            signal: Arc::new(CmdSignal::default()),
            last_cmds: [None; NUM_JOINTS],
            refresh_period: seconds_to_duration(params.refresh_period_s),
            cmd_wait_period: Duration::from_secs_f64(params.cmd_wait_period_s.max(0.0)),
        })
    }

    /// Subscribe to joint demands on the bus.
    pub fn subscribe(&self, bus: &dyn MessageBus) -> Result<(), BusError> {
        let cache = self.cmd_cache.clone();
        let signal = self.signal.clone();

        bus.subscribe(channel::JOINT_DEMANDS, move |list: JointCommandList| {
            match list.into_set() {
                Ok(set) => {
                    cache.put(set, Utc::now());
                    signal.notify();
                }
                Err(e) => warn!("Dropping joint demands: {}", e),
            }
        })
    }

    /// Create the poller publishing the status of this driver's servos.
    pub fn status_poller(
        &self,
        bus: Arc<dyn MessageBus>,
        status_frequency_hz: f64,
    ) -> Result<StatusPoller, DriverError> {
        if !(status_frequency_hz > 0.0) || !status_frequency_hz.is_finite() {
            return Err(DriverError::InvalidStatusFrequency(status_frequency_hz));
        }

        Ok(StatusPoller {
            joints: self.joints.clone(),
            bus,
            period: Duration::from_secs_f64(1.0 / status_frequency_hz),
        })
    }

    /// Wait for new demands, or for the wait period to pass, then get the demands from the cache.
    ///
    /// `seen_generation` tracks which demands have already been waited for.
    pub fn wait_for_cmds(&self, seen_generation: &mut u64) -> Option<JointCommandSet> {
        self.signal.wait_newer(seen_generation, self.cmd_wait_period);
        self.cmd_cache.get()
    }

    /// Write demands to the servos, returning the number written.
    ///
    /// A demand is written if nothing has been written to the servo before, if its position, speed
    /// or torque differs from the last demand written, or if it is more than the refresh period
    /// newer than the last demand written.
    pub fn apply(&mut self, cmds: &JointCommandSet) -> usize {
        let mut num_written = 0;

        for (i, ((cmd, joint), last)) in cmds
            .iter()
            .zip(self.joints.iter())
            .zip(self.last_cmds.iter_mut())
            .enumerate()
        {
            let cmd = cmd.clamped();

            let update = match last {
                None => true,
                Some(l) => {
                    cmd.timestamp - l.timestamp > self.refresh_period || cmd.demand_differs(l)
                }
            };

            if !update {
                continue;
            }

            match joint.set_goal(cmd.pos_rad, cmd.speed, cmd.torque) {
                Ok(()) => {
                    *last = Some(cmd);
                    num_written += 1;
                }
                Err(e) => warn!("Could not set the goal of joint {}: {}", i, e),
            }
        }

        num_written
    }

    /// Run the command loop forever.
    pub fn run(&mut self) {
        let mut seen_generation = 0;
        let mut safe_mode = true;

        loop {
            match self.wait_for_cmds(&mut seen_generation) {
                Some(cmds) => {
                    if safe_mode {
                        info!("Received valid demands, exiting safe mode");
                        safe_mode = false;
                    }

                    let num_written = self.apply(&cmds);
                    if num_written > 0 {
                        trace!("Wrote {} joint demands", num_written);
                    }
                }
                None => {
                    if !safe_mode {
                        warn!("Joint demands expired, entering safe mode");
                        safe_mode = true;
                    }
                }
            }
        }
    }
}

impl StatusPoller {
    /// Read the status of every servo.
    ///
    /// Returns `None` if any servo could not be read, a partial status is never published.
    pub fn poll(&self) -> Option<JointStatusList> {
        let mut statuses = Vec::with_capacity(self.joints.len());

        for (i, joint) in self.joints.iter().enumerate() {
            match joint.get_status() {
                Ok(s) => statuses.push(JointStatus {
                    joint_idx: i,
                    pos_rad: s.pos_rad,
                    speed: s.speed,
                    load: s.load,
                    voltage: s.voltage,
                    temperature: s.temperature,
                    error_flags: s.error_flags,
                    timestamp: Utc::now(),
                }),
                Err(e) => {
                    warn!("Could not read the status of joint {}: {}", i, e);
                    return None;
                }
            }
        }

        Some(JointStatusList { statuses })
    }

    /// Poll and publish the status forever.
    pub fn run(&self) {
        debug!("Status poller running at {:.01} Hz", 1.0 / self.period.as_secs_f64());

        loop {
            let cycle_start = Instant::now();

            if let Some(list) = self.poll() {
                if let Err(e) = self.bus.publish(channel::JOINT_STATUS, &list) {
                    warn!("Could not publish joint status: {}", e);
                }
            }

            if let CycleEnd::Overran(d) = end_cycle(cycle_start, self.period) {
                warn!("Status cycle overran by {:.06} s", d.as_secs_f64());
            }
        }
    }
}

impl CmdSignal {
    fn notify(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.cvar.notify_all();
    }

    /// Block until the generation differs from `seen`, or the timeout passes.
    fn wait_newer(&self, seen: &mut u64, timeout: Duration) {
        let generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);

        let (generation, _) = self
            .cvar
            .wait_timeout_while(generation, timeout, |g| *g == *seen)
            .unwrap_or_else(PoisonError::into_inner);

        *seen = *generation;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::servo_ctrl::{
        sim::{test::sim_params, SimServoBus},
        ServoError, ServoStatus,
    };
    use chrono::{DateTime, Duration as ChronoDuration};
    use comms_if::net::{BusParams, LocalBus};
    use util::cache::{CacheMode, CacheParams};

    /// Goals written to a servo
    type Writes = Arc<Mutex<Vec<(usize, f64, f64, f64)>>>;

    struct RecordingJoint {
        idx: usize,
        writes: Writes,
    }

    struct RecordingBus {
        writes: Writes,
        missing: Option<usize>,
    }

    impl JointHandle for RecordingJoint {
        fn model(&self) -> &str {
            "Recording"
        }

        fn set_goal(&self, pos_rad: f64, speed: f64, torque: f64) -> Result<(), ServoError> {
            self.writes
                .lock()
                .unwrap()
                .push((self.idx, pos_rad, speed, torque));
            Ok(())
        }

        fn get_status(&self) -> Result<ServoStatus, ServoError> {
            Err(ServoError::NotResponding)
        }
    }

    impl ServoBus for RecordingBus {
        fn get_joint(&self, joint_idx: usize) -> Option<Arc<dyn JointHandle>> {
            if self.missing == Some(joint_idx) {
                return None;
            }

            Some(Arc::new(RecordingJoint {
                idx: joint_idx,
                writes: self.writes.clone(),
            }))
        }
    }

    fn params() -> MechExecParams {
        MechExecParams {
            status_frequency_hz: 15.0,
            refresh_period_s: 1.0,
            cmd_wait_period_s: 0.01,
            cmd_cache: CacheParams {
                max_age_s: 0.25,
                mode: CacheMode::Expiring,
            },
            bus: BusParams {
                pub_endpoint: "inproc://unused".into(),
                sub_endpoints: vec![],
            },
            sim: sim_params(),
        }
    }

    fn recording_driver() -> (ArmDriver, Writes) {
        let writes: Writes = Arc::new(Mutex::new(Vec::new()));
        let bus = RecordingBus {
            writes: writes.clone(),
            missing: None,
        };
        (ArmDriver::new(&bus, &params()).unwrap(), writes)
    }

    fn cmds(pos_rad: f64, timestamp: DateTime<Utc>) -> JointCommandSet {
        let mut set = [JointCommand::new(0, pos_rad, 0.5, 0.5, timestamp); NUM_JOINTS];
        for (i, c) in set.iter_mut().enumerate() {
            c.joint_idx = i;
        }
        set
    }

    #[test]
    fn test_missing_joint() {
        let bus = RecordingBus {
            writes: Arc::new(Mutex::new(Vec::new())),
            missing: Some(3),
        };

        assert!(matches!(
            ArmDriver::new(&bus, &params()),
            Err(DriverError::MissingJoint(3))
        ));
    }

    #[test]
    fn test_unchanged_demands_not_rewritten() {
        let (mut driver, writes) = recording_driver();
        let t0 = Utc::now();

        assert_eq!(driver.apply(&cmds(0.5, t0)), NUM_JOINTS);
        assert_eq!(driver.apply(&cmds(0.5, t0 + ChronoDuration::milliseconds(100))), 0);

        // One joint changes
        let mut set = cmds(0.5, t0 + ChronoDuration::milliseconds(200));
        set[2].pos_rad = 0.6;
        assert_eq!(driver.apply(&set), 1);
        assert_eq!(writes.lock().unwrap().last(), Some(&(2, 0.6, 0.5, 0.5)));
    }

    #[test]
    fn test_old_demands_refreshed() {
        let (mut driver, _) = recording_driver();
        let t0 = Utc::now();

        driver.apply(&cmds(0.5, t0));
        assert_eq!(driver.apply(&cmds(0.5, t0 + ChronoDuration::milliseconds(900))), 0);
        assert_eq!(
            driver.apply(&cmds(0.5, t0 + ChronoDuration::milliseconds(1100))),
            NUM_JOINTS
        );
    }

    #[test]
    fn test_demands_clamped() {
        let (mut driver, writes) = recording_driver();

        let mut set = cmds(0.5, Utc::now());
        set[0].speed = 1.5;
        set[0].torque = -0.2;
        driver.apply(&set);

        assert_eq!(writes.lock().unwrap()[0], (0, 0.5, 1.0, 0.0));
    }

    #[test]
    fn test_demands_from_bus() {
        let (driver, _) = recording_driver();
        let bus = LocalBus::new();
        driver.subscribe(&bus).unwrap();

        let mut seen = 0;
        assert!(driver.wait_for_cmds(&mut seen).is_none());

        // Wrong length, dropped
        let mut list = JointCommandList::from(&cmds(0.5, Utc::now()));
        list.commands.pop();
        bus.publish(channel::JOINT_DEMANDS, &list).unwrap();
        assert!(driver.wait_for_cmds(&mut seen).is_none());
        assert_eq!(seen, 0);

        bus.publish(
            channel::JOINT_DEMANDS,
            &JointCommandList::from(&cmds(0.5, Utc::now())),
        )
        .unwrap();
        let set = driver.wait_for_cmds(&mut seen).unwrap();
        assert_eq!(seen, 1);
        assert_eq!(set[4].joint_idx, 4);
    }

    #[test]
    fn test_wakes_on_new_demands() {
        let (driver, _) = recording_driver();
        let signal = driver.signal.clone();
        let cache = driver.cmd_cache.clone();

        let jh = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(2));
            cache.put(cmds(0.5, Utc::now()), Utc::now());
            signal.notify();
        });

        // Wait long enough that only the notification can end it in time
        let mut seen = 0;
        driver.signal.wait_newer(&mut seen, Duration::from_secs(5));
        assert_eq!(seen, 1);
        assert!(driver.cmd_cache.get().is_some());

        jh.join().unwrap();
    }

    #[test]
    fn test_status_poller() {
        let sim = SimServoBus::manual(&sim_params());
        let driver = ArmDriver::new(&sim, &params()).unwrap();

        let bus = Arc::new(LocalBus::new());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        bus.subscribe(channel::JOINT_STATUS, move |l: JointStatusList| {
            sink.lock().unwrap().push(l)
        })
        .unwrap();

        assert!(driver.status_poller(bus.clone(), 0.0).is_err());

        let poller = driver.status_poller(bus.clone(), 15.0).unwrap();
        let list = poller.poll().unwrap();
        assert_eq!(list.statuses.len(), NUM_JOINTS);
        assert!(list.statuses.iter().all(|s| s.voltage == 12.0));

        bus.publish(channel::JOINT_STATUS, &list).unwrap();
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_status_not_published() {
        let (driver, _) = recording_driver();
        let poller = driver
            .status_poller(Arc::new(LocalBus::new()), 15.0)
            .unwrap();

        assert!(poller.poll().is_none());
    }
}
