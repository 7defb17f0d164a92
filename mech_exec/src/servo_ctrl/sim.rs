//! # Simulated servos
//!
//! Each servo moves towards its goal at its demanded speed. The gripper can be given a contact
//! angle, past which it cannot close, standing in for an object in the hand. While pressed
//! against the object the gripper reports a load proportional to how far beyond the contact
//! angle its goal is.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use super::{JointHandle, ServoBus, ServoError, ServoStatus};
use comms_if::eqpt::mech::{GRIPPER_IDX, NUM_JOINTS};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tolerance on the gripper being at its contact angle.
const CONTACT_TOL_RAD: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SimServoParams {
    /// Rate of a servo moving at full speed.
    ///
    /// Units: radians/second
    pub max_rate_rads: f64,

    /// Angle at which the gripper meets the simulated object.
    ///
    /// Units: radians
    pub gripper_contact_rad: f64,

    /// Load per radian of gripper goal beyond the contact angle.
    pub load_gain: f64,

    /// Units: volts
    pub voltage: f64,

    /// Units: degrees celsius
    pub temperature: f64,
}

/// A bus of simulated servos, one per joint.
pub struct SimServoBus {
    servos: Vec<Arc<SimServo>>,
}

pub struct SimServo {
    params: SimServoParams,

    /// Set on the gripper only.
    contact_rad: Option<f64>,

    /// If set the servo advances with the wall clock, otherwise only by calls to `step`.
    real_time: bool,

    state: Mutex<SimState>,
}

#[derive(Debug)]
struct SimState {
    pos_rad: f64,
    goal_rad: f64,
    speed: f64,
    rate_rads: f64,
    load: f64,
    last_update: Instant,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServoBus {
    /// Create a bus whose servos move in real time.
    pub fn new(params: &SimServoParams) -> Self {
        Self::build(params, true)
    }

    /// Create a bus whose servos only move when stepped.
    pub fn manual(params: &SimServoParams) -> Self {
        Self::build(params, false)
    }

    fn build(params: &SimServoParams, real_time: bool) -> Self {
        let servos = (0..NUM_JOINTS)
            .map(|i| {
                let contact_rad = if i == GRIPPER_IDX {
                    Some(params.gripper_contact_rad)
                } else {
                    None
                };
                Arc::new(SimServo::new(*params, contact_rad, real_time))
            })
            .collect();

        Self { servos }
    }

    /// Advance every servo by `dt_s` seconds.
    pub fn step(&self, dt_s: f64) {
        for s in &self.servos {
            s.step(dt_s);
        }
    }
}

impl ServoBus for SimServoBus {
    fn get_joint(&self, joint_idx: usize) -> Option<Arc<dyn JointHandle>> {
        self.servos
            .get(joint_idx)
            .map(|s| s.clone() as Arc<dyn JointHandle>)
    }
}

impl SimServo {
    pub fn new(params: SimServoParams, contact_rad: Option<f64>, real_time: bool) -> Self {
        Self {
            params,
            contact_rad,
            real_time,
            state: Mutex::new(SimState {
                pos_rad: 0.0,
                goal_rad: 0.0,
                speed: 0.0,
                rate_rads: 0.0,
                load: 0.0,
                last_update: Instant::now(),
            }),
        }
    }

    /// Advance the servo by `dt_s` seconds.
    pub fn step(&self, dt_s: f64) {
        let mut state = self.lock();
        self.advance(&mut state, dt_s);
    }

    /// Advance a real time servo to the current time.
    fn catch_up(&self, state: &mut SimState) {
        if !self.real_time {
            return;
        }

        let now = Instant::now();
        let dt_s = (now - state.last_update).as_secs_f64();
        state.last_update = now;

        self.advance(state, dt_s);
    }

    fn advance(&self, state: &mut SimState, dt_s: f64) {
        if dt_s <= 0.0 {
            return;
        }

        let target = match self.contact_rad {
            Some(c) if state.pos_rad <= c + CONTACT_TOL_RAD => state.goal_rad.min(c),
            _ => state.goal_rad,
        };

        let max_step = self.params.max_rate_rads * state.speed * dt_s;
        let step = (target - state.pos_rad).max(-max_step).min(max_step);

        state.pos_rad += step;
        state.rate_rads = step / dt_s;

        state.load = match self.contact_rad {
            Some(c)
                if state.goal_rad > c + CONTACT_TOL_RAD
                    && (state.pos_rad - c).abs() < CONTACT_TOL_RAD =>
            {
                -self.params.load_gain * (state.goal_rad - c)
            }
            _ => 0.0,
        };
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JointHandle for SimServo {
    fn model(&self) -> &str {
        if self.contact_rad.is_some() {
            "SimGripper"
        } else {
            "SimServo"
        }
    }

    fn set_goal(&self, pos_rad: f64, speed: f64, _torque: f64) -> Result<(), ServoError> {
        if !pos_rad.is_finite() {
            return Err(ServoError::InvalidGoal(pos_rad));
        }

        let mut state = self.lock();
        self.catch_up(&mut state);

        state.goal_rad = pos_rad;
        state.speed = speed;

        Ok(())
    }

    fn get_status(&self) -> Result<ServoStatus, ServoError> {
        let mut state = self.lock();
        self.catch_up(&mut state);

        let speed = if self.params.max_rate_rads > 0.0 {
            state.rate_rads / self.params.max_rate_rads
        } else {
            0.0
        };

        Ok(ServoStatus {
            pos_rad: state.pos_rad,
            speed,
            load: state.load,
            voltage: self.params.voltage,
            temperature: self.params.temperature,
            error_flags: 0,
        })
    }
}
