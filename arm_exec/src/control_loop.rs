//! # Control loop
//!
//! Runs [`ArmCtrl`] at a fixed rate, feeding it from the [`ArmClient`] and publishing the joint
//! demands and telemetry it produces.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::{
    arm_client::ArmClient,
    arm_ctrl::{ArmCtrl, ArmCtrlError, InputData, StatusReport},
};
use comms_if::{
    eqpt::mech::JointCommandList,
    net::{channel, BusExt, MessageBus},
    tm::ActionMode,
};
use util::{
    module::State,
    time::{end_cycle, CycleEnd},
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

pub struct ControlLoop {
    arm_ctrl: ArmCtrl,
    client: ArmClient,
    bus: Arc<dyn MessageBus>,
    period: Duration,

    /// Set while the joint status is older than the status cache's maximum age.
    status_stale: bool,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl ControlLoop {
    pub fn new(
        arm_ctrl: ArmCtrl,
        client: ArmClient,
        bus: Arc<dyn MessageBus>,
        cycle_frequency_hz: f64,
    ) -> Result<Self, ArmCtrlError> {
        if !(cycle_frequency_hz > 0.0) || !cycle_frequency_hz.is_finite() {
            return Err(ArmCtrlError::InvalidCycleFrequency(cycle_frequency_hz));
        }

        Ok(Self {
            arm_ctrl,
            client,
            bus,
            period: Duration::from_secs_f64(1.0 / cycle_frequency_hz),
            status_stale: false,
        })
    }

    /// Run a single cycle of the loop at the given time.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<StatusReport, ArmCtrlError> {
        let stale = self.client.status_cache.is_stale_at(now);
        if stale != self.status_stale {
            if stale {
                warn!("Joint status is stale, arm position cannot be tracked");
            } else {
                info!("Joint status recovered");
            }
            self.status_stale = stale;
        }

        let input = InputData {
            now,
            status: self.client.status_cache.get_at(now),
            cmd: self.client.queue.peek(),
        };

        let (demands, report) = self.arm_ctrl.proc(&input)?;

        // The head of the queue is only discarded once it has finished
        if report.mode == ActionMode::Wait {
            if let Some(cmd) = report
                .cmd_id
                .and_then(|id| self.client.queue.pop_completed(id))
            {
                debug!("ArmCmd {} complete, {} remaining", cmd.cmd_id, self.client.queue.len());
            }
        }

        if let Err(e) = self
            .bus
            .publish(channel::JOINT_DEMANDS, &JointCommandList::from(&demands))
        {
            warn!("Could not publish joint demands: {}", e);
        }

        if let Err(e) = self
            .bus
            .publish(channel::ARM_TM, &report.to_arm_status(now))
        {
            warn!("Could not publish arm telemetry: {}", e);
        }

        Ok(report)
    }

    /// Run the loop forever, or until ArmCtrl fails.
    pub fn run(&mut self) -> Result<(), ArmCtrlError> {
        info!("Control loop running at {:.01} Hz", 1.0 / self.period.as_secs_f64());

        loop {
            let cycle_start = Instant::now();

            self.tick(Utc::now())?;

            if let CycleEnd::Overran(d) = end_cycle(cycle_start, self.period) {
                warn!("Cycle overran by {:.06} s", d.as_secs_f64());
            }
        }
    }
}
