//! Point action calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::*;
use comms_if::tm::ActionMode;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Perform the point action calculations.
    ///
    /// The arm is lifted to the transit height over the previous goal, moved across to the new
    /// goal at the same height, and then lowered to the goal height:
    ///
    /// 0. Lift over the previous goal, skipped if there is none
    /// 1. Translate over the new goal
    /// 2. Descend to the goal height
    /// 3. Done
    pub(crate) fn calc_point(&mut self) {
        let goal = match self.ctx.goal_xy_m {
            Some(g) => g,
            None => return,
        };

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

                if self.is_stable() {
                    self.set_state(2);
                }
            }
            2 => {
                self.move_to(goal, self.params.goal_height_m);

                if self.is_stable() {
                    self.set_state(3);
                }
            }
            _ => self.ctx.mode = ActionMode::Wait,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::arm_ctrl::state::test::{point, states, Harness};
    use comms_if::tm::{ActionMode, PlanKind};

    #[test]
    fn test_point_from_previous_goal() {
        let mut h = Harness::new(None);
        h.run(point(0, [0.0, 0.0]));

        let reports = h.run(point(1, [0.15, 0.05]));

        assert_eq!(states(&reports), vec![0, 1, 2, 3]);
        assert!(reports.iter().all(|r| r.cmd_id == Some(1)));

        // Settled before leaving the descent
        let first_done = reports.iter().find(|r| r.state_idx == 3).unwrap();
        assert!(first_done.pos_error_m.unwrap() < 0.0005);

        let last = reports.last().unwrap();
        assert_eq!(last.mode, ActionMode::Wait);

        let ee = last.ee_pos_m.unwrap();
        assert!((ee[0] - 0.15).abs() < 1e-6);
        assert!((ee[1] - 0.05).abs() < 1e-6);
        assert!((ee[2] - 0.08).abs() < 1e-6);
    }

    #[test]
    fn test_point_without_previous_goal() {
        let mut h = Harness::new(None);
        let reports = h.run(point(0, [0.15, 0.05]));

        assert_eq!(states(&reports), vec![1, 2, 3]);
        // Transit height needs the wrist free, the goal height is reached wrist down
        assert!(reports.iter().any(|r| r.plan == Some(PlanKind::WristFree)));
        assert!(reports.iter().any(|r| r.plan == Some(PlanKind::WristDown)));
    }

    #[test]
    fn test_point_too_close_holds() {
        let mut h = Harness::new(None);
        let (out, report) = h.tick(Some(point(0, [0.01, 0.0])));

        assert_eq!(report.plan, None);
        for i in 0..5 {
            assert_eq!(out[i].pos_rad, 0.0);
        }
    }
}
