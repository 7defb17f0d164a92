//! Sweep action calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::*;
use comms_if::{eqpt::mech::BASE_IDX, tm::ActionMode};
use std::f64::consts::PI;
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Perform the sweep action calculations.
    ///
    /// The arm approaches the goal from one side, with the base yawed away from the goal's
    /// bearing, then drops to the sweep height so the hand is pushed through the goal as the
    /// base swings back.
    ///
    /// 0. Lift over the previous goal
    /// 1. Move over the goal, yawed to one side
    /// 2. Descend to the sweep height, still yawed
    /// 3. Swing through the goal at the sweep height
    /// 4. Done
    pub(crate) fn calc_sweep(&mut self) {
        let goal = match self.ctx.goal_xy_m {
            Some(g) => g,
            None => return,
        };

        let sweep_complex_m = self.params.sweep_height_m * self.params.sweep_complex_height_factor;

        match self.ctx.state {
            0 => {
                let prev = match self.ctx.prev_goal_xy_m {
                    Some(p) => p,
                    None => {
                        self.set_state(1);
                        return;
                    }
                };

                self.move_to(prev, self.params.transit_height_m);

                if self.is_stable() {
                    self.set_state(1);
                }
            }
            1 => {
                self.move_to(goal, self.params.transit_height_m);
                self.set_joint(BASE_IDX, self.sweep_yaw_rad(goal));

                if self.is_stable() {
                    self.set_state(2);
                }
            }
            2 => {
                self.move_to_split(goal, self.params.sweep_height_m, sweep_complex_m);
                self.set_joint(BASE_IDX, self.sweep_yaw_rad(goal));

                if self.is_stable() {
                    self.set_state(3);
                }
            }
            3 => {
                self.move_to_split(goal, self.params.sweep_height_m, sweep_complex_m);

                if self.is_stable() {
                    self.set_state(4);
                }
            }
            _ => self.ctx.mode = ActionMode::Wait,
        }
    }

    /// Base yaw offset from the goal's bearing, to whichever side stays within +/- pi.
    fn sweep_yaw_rad(&self, goal_xy_m: [f64; 2]) -> f64 {
        let bearing_rad = goal_xy_m[1].atan2(goal_xy_m[0]);
        let neg_rad = bearing_rad - self.params.sweep_yaw_offset_rad;

        if neg_rad >= -PI {
            neg_rad
        } else {
            wrap_pi(bearing_rad + self.params.sweep_yaw_offset_rad)
        }
    }
}
