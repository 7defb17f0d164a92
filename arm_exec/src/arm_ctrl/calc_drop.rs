//! Drop action calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::*;
use comms_if::{eqpt::mech::GRIPPER_IDX, tm::ActionMode};
use log::info;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Perform the drop action calculations.
    ///
    /// The first three states are shared with the point action, after which the hand is opened
    /// and the held object released.
    pub(crate) fn calc_drop(&mut self) {
        match self.ctx.state {
            0..=2 => self.calc_point(),
            3 => {
                self.set_joint(GRIPPER_IDX, self.params.default_grip_rad);

                if let Some(gripper) = self.gripper_status() {
                    if (gripper.pos_rad - self.params.default_grip_rad).abs()
                        < self.params.grip_tolerance_rad
                    {
                        self.set_state(4);
                    }
                }
            }
            _ => {
                if self.ctx.held_obj_id != 0 {
                    info!("Released object {}", self.ctx.held_obj_id);
                }

                self.ctx.held_obj_id = 0;
                self.ctx.mode = ActionMode::Wait;
            }
        }
    }
}
