//! Grab action calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::*;
use comms_if::{eqpt::mech::GRIPPER_IDX, tm::ActionMode};
use log::{debug, info};
use nalgebra::{Rotation2, Vector2};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Perform the grab action calculations.
    ///
    /// The hand approaches the object from a point just behind it in gripper space, descends
    /// over it and then closes until it makes contact. The grip is then adjusted until the
    /// load on the gripper is within the configured band:
    ///
    /// 0. Open the hand and lift over the previous goal
    /// 1. Move behind the object at the transit height
    /// 2. Descend to the pre-grab height behind the object
    /// 3. Descend to the grab height over the object
    /// 4. Start closing the hand
    /// 5. Wait for the hand to stop moving
    /// 6. Adjust the grip until the load is in band
    /// 7. Decide if the object is held
    pub(crate) fn calc_grab(&mut self) {
        let goal = match self.ctx.goal_xy_m {
            Some(g) => g,
            None => return,
        };

        // Gripper speed thresholds are half the nominal closing speed
        let min_speed = self.gripper_speed() / 2.0;

        match self.ctx.state {
            0 => {
                self.set_joint(GRIPPER_IDX, self.params.default_grip_rad);

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
                self.move_to(self.behind(goal), self.params.transit_height_m);

                if self.is_stable() {
                    self.set_state(2);
                }
            }
            2 => {
                self.move_to(self.behind(goal), self.params.pre_grab_height_m);

                if self.is_stable() {
                    self.set_state(3);
                }
            }
            3 => {
                self.move_to_split(
                    goal,
                    self.params.grab_height_m,
                    self.params.grab_height_m * self.params.grab_complex_height_factor,
                );

                if self.is_stable() {
                    self.set_state(4);
                }
            }
            4..=6 => {
                let gripper = match self.gripper_status() {
                    Some(s) => s,
                    None => {
                        self.set_joint(GRIPPER_IDX, self.params.default_grip_rad);
                        return;
                    }
                };

                match self.ctx.state {
                    4 => {
                        self.set_joint(GRIPPER_IDX, self.params.closed_grip_rad);

                        if gripper.speed > min_speed {
                            self.set_state(5);
                        }
                    }
                    5 => {
                        // Stopped against something, or fully closed
                        if gripper.speed.abs() < min_speed {
                            self.set_joint(GRIPPER_IDX, gripper.pos_rad);
                            self.set_state(6);
                        }
                    }
                    _ => {
                        let load = gripper.load.abs();

                        if load < self.params.min_grip_load {
                            if gripper.pos_rad
                                >= self.params.closed_grip_rad - self.params.grip_tolerance_rad
                            {
                                debug!("Gripper closed without finding any load");
                                self.ctx.grip_missed = true;
                                self.set_state(7);
                            } else {
                                self.set_joint(
                                    GRIPPER_IDX,
                                    gripper.pos_rad + self.params.grip_increment_rad,
                                );
                            }
                        } else if load > self.params.max_grip_load {
                            self.set_joint(
                                GRIPPER_IDX,
                                gripper.pos_rad - self.params.grip_increment_rad,
                            );
                        } else {
                            self.set_state(7);
                        }
                    }
                }
            }
            7 => {
                // Nothing is held unless the closure was measured
                self.ctx.held_obj_id = match self.gripper_status() {
                    Some(gripper) => {
                        let open = (gripper.pos_rad - self.params.default_grip_rad).abs()
                            < self.params.grip_tolerance_rad;

                        if self.ctx.grip_missed || open {
                            0
                        } else {
                            self.ctx.target_obj_id
                        }
                    }
                    None => 0,
                };

                if self.ctx.held_obj_id == 0 {
                    info!("Failed to grab object {}", self.ctx.target_obj_id);
                } else {
                    info!("Holding object {}", self.ctx.held_obj_id);
                }

                self.ctx.target_obj_id = 0;
                self.ctx.mode = ActionMode::Wait;
                self.set_state(8);
            }
            _ => (),
        }
    }

    /// Approach point offset from the goal along the gripper's facing direction.
    fn behind(&self, goal_xy_m: [f64; 2]) -> [f64; 2] {
        let bearing_rad = goal_xy_m[1].atan2(goal_xy_m[0]);
        let wrist_rad = self.ctx.cmd.map(|c| c.action.wrist_rad()).unwrap_or(0.0);

        let facing = Rotation2::new(bearing_rad - wrist_rad) * Vector2::new(0.0, 1.0);

        [
            goal_xy_m[0] + self.params.grab_offset_m * facing.x,
            goal_xy_m[1] + self.params.grab_offset_m * facing.y,
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::state::test::{grab, states, Harness};
    use chrono::Utc;
    use comms_if::{eqpt::mech::JointStatus, tc::arm_ctrl::ArmCmd};
    use util::module::State;

    #[test]
    fn test_grab_holds_object() {
        let mut h = Harness::new(Some(1.1));
        let reports = h.run(grab(1, [0.2, 0.0], 7));

        assert_eq!(states(&reports), vec![1, 2, 3, 4, 5, 6, 7, 8]);

        let last = reports.last().unwrap();
        assert_eq!(last.mode, ActionMode::Wait);
        assert_eq!(last.held_obj_id, 7);
        assert_eq!(h.ctrl.ctx.target_obj_id, 0);

        // The grip was tightened onto the object
        assert!(h.arm.pos_rad[GRIPPER_IDX] > 1.09);
        assert!(h.arm.gripper_load.abs() >= 0.2);
    }

    #[test]
    fn test_grab_stopped_near_default_is_miss() {
        let mut h = Harness::new(Some(0.56));
        let reports = h.run(grab(1, [0.2, 0.0], 7));

        assert_eq!(reports.last().unwrap().held_obj_id, 0);
    }

    #[test]
    fn test_grab_fully_closed_is_miss() {
        let mut h = Harness::new(None);
        let reports = h.run(grab(1, [0.2, 0.0], 7));

        assert!(h.ctrl.ctx.grip_missed);
        assert_eq!(reports.last().unwrap().held_obj_id, 0);
    }

    #[test]
    fn test_behind_point() {
        let mut h = Harness::new(None);
        h.tick(Some(grab(1, [0.2, 0.0], 7)));

        // Facing along +Y with the object straight ahead along +X
        let b = h.ctrl.behind([0.2, 0.0]);
        assert!((b[0] - 0.2).abs() < 1e-12);
        assert!((b[1] - 0.03).abs() < 1e-12);

        let b = h.ctrl.behind([0.0, 0.2]);
        assert!((b[0] + 0.03).abs() < 1e-12);
        assert!((b[1] - 0.2).abs() < 1e-12);
    }

    fn grabbing(state: usize, gripper: Option<(f64, f64, f64)>) -> (f64, usize) {
        let mut h = Harness::new(None);
        let cmd: ArmCmd = grab(1, [0.2, 0.0], 7);
        h.tick(Some(cmd));
        h.ctrl.set_state(state);

        let now = Utc::now();
        let status = gripper.map(|(pos_rad, speed, load)| {
            let mut set = h.arm.status(now);
            set[GRIPPER_IDX] = JointStatus {
                pos_rad,
                speed,
                load,
                ..set[GRIPPER_IDX]
            };
            set
        });

        let (out, report) = h
            .ctrl
            .proc(&InputData {
                now,
                status,
                cmd: Some(cmd),
            })
            .unwrap();

        (out[GRIPPER_IDX].pos_rad, report.state_idx)
    }

    #[test]
    fn test_no_status_holds_default_grip() {
        let default = default_grip();
        for &state in &[4, 5, 6] {
            assert_eq!(grabbing(state, None), (default, state));
        }
    }

    #[test]
    fn test_grip_adjustment() {
        let incr = 0.052360;

        // Too little load, tighten
        let (pos, state) = grabbing(6, Some((1.0, 0.0, -0.1)));
        assert!((pos - (1.0 + incr)).abs() < 1e-9);
        assert_eq!(state, 6);

        // Too much load in either direction, loosen
        let (pos, state) = grabbing(6, Some((1.0, 0.0, -0.5)));
        assert!((pos - (1.0 - incr)).abs() < 1e-9);
        assert_eq!(state, 6);

        let (pos, _) = grabbing(6, Some((1.0, 0.0, 0.5)));
        assert!((pos - (1.0 - incr)).abs() < 1e-9);

        // In band
        let (_, state) = grabbing(6, Some((1.0, 0.0, -0.3)));
        assert_eq!(state, 7);
    }

    #[test]
    fn test_closing_guards() {
        let closed = 1.954769;

        let (pos, state) = grabbing(4, Some((0.6, 0.1, 0.0)));
        assert_eq!((pos, state), (closed, 4));

        let (_, state) = grabbing(4, Some((0.6, 0.3, 0.0)));
        assert_eq!(state, 5);

        let (_, state) = grabbing(5, Some((0.9, 0.3, 0.0)));
        assert_eq!(state, 5);

        let (pos, state) = grabbing(5, Some((0.9, -0.1, 0.0)));
        assert_eq!((pos, state), (0.9, 6));
    }

    #[test]
    fn test_unmeasured_grip_holds_nothing() {
        let mut h = Harness::new(None);
        let cmd: ArmCmd = grab(2, [0.2, 0.0], 7);
        h.tick(Some(cmd));

        // Still holding an object from an earlier grab
        h.ctrl.ctx.held_obj_id = 9;
        h.ctrl.set_state(7);

        let (_, report) = h
            .ctrl
            .proc(&InputData {
                now: Utc::now(),
                status: None,
                cmd: Some(cmd),
            })
            .unwrap();

        assert_eq!(report.held_obj_id, 0);
        assert_eq!(report.mode, ActionMode::Wait);
        assert_eq!(report.state_idx, 8);
    }

    fn default_grip() -> f64 {
        crate::arm_ctrl::params::test_params().default_grip_rad
    }
}
