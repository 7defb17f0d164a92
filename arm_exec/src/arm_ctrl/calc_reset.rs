//! Reset action calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::*;
use comms_if::{eqpt::mech::GRIPPER_IDX, tm::ActionMode};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Return all joints to zero and the gripper to its default position.
    ///
    /// There is no sequence, the reset completes on the cycle it is received. The goal is
    /// forgotten so the next action starts from its transit state.
    pub(crate) fn calc_reset(&mut self) {
        for i in 0..self.joints.len() {
            self.set_joint(i, 0.0);
        }
        self.set_joint(GRIPPER_IDX, self.params.default_grip_rad);

        self.ctx.goal_xy_m = None;
        self.ctx.mode = ActionMode::Wait;
    }
}
