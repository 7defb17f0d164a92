//! Implementations for the ArmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

// Internal
use super::{
    calc_inverse_kinematics, forward_kinematics, ArmCtrlError, ArmGeometry, Joint, JointKind,
    Params, PlanKind, PositionTracker,
};
use comms_if::{
    eqpt::mech::{JointCommandList, JointCommandSet, JointStatus, JointStatusSet, GRIPPER_IDX, NUM_JOINTS},
    tc::arm_ctrl::{ArmAction, ArmCmd},
    tm::{ActionMode, ArmStatus},
};
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm control module state
#[derive(Default)]
pub struct ArmCtrl {
    pub(crate) params: Params,

    pub(crate) geom: ArmGeometry,

    /// Demanded state of each joint, output every cycle.
    pub(crate) joints: Vec<Joint>,

    pub(crate) tracker: PositionTracker,

    pub(crate) ctx: ActionContext,

    pub(crate) report: StatusReport,

    /// Joint status for the current cycle.
    pub(crate) status: Option<JointStatusSet>,

    /// Stability error of the end effector for the current cycle.
    pub(crate) pos_error_m: f64,
}

/// Progress through the current action.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionContext {
    /// The command being executed.
    pub cmd: Option<ArmCmd>,

    /// Index of the state within the action's sequence.
    pub state: usize,

    /// Goal of the previous command, the arm is lifted clear of it before moving on.
    pub prev_goal_xy_m: Option<[f64; 2]>,

    pub goal_xy_m: Option<[f64; 2]>,

    pub mode: ActionMode,

    /// Object currently held, 0 if none.
    pub held_obj_id: u32,

    /// Object the current grab is reaching for.
    pub target_obj_id: u32,

    /// Set if the gripper closed fully without finding any load.
    pub grip_missed: bool,
}

/// Initialisation data for ArmCtrl.
pub struct InitData {
    /// Path to the parameter file, relative to the params directory.
    pub params_file: String,

    /// Rate at which `proc` will be called.
    pub cycle_frequency_hz: f64,
}

/// Input data to Arm Control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Time of this cycle.
    pub now: DateTime<Utc>,

    /// The latest joint status, or `None` if none has ever been received.
    pub status: Option<JointStatusSet>,

    /// The command at the head of the queue, if any.
    ///
    /// The same command is expected to be given on every cycle until it has completed, it is
    /// only restarted if its ID changes.
    pub cmd: Option<ArmCmd>,
}

/// Status report for ArmCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Deserialize, Debug, PartialEq)]
pub struct StatusReport {
    pub mode: ActionMode,

    pub held_obj_id: u32,

    pub cmd_id: Option<u64>,

    pub state_idx: usize,

    /// Position of the end effector computed from the joint status.
    pub ee_pos_m: Option<[f64; 3]>,

    /// Stability error, `None` until enough history has been gathered.
    pub pos_error_m: Option<f64>,

    /// Planner used this cycle, `None` if the arm was not repositioned.
    pub plan: Option<PlanKind>,

    /// Joints whose demand was limited this cycle.
    pub pos_limited: [bool; NUM_JOINTS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for ArmCtrl {
    type InitData = InitData;
    type InitError = ArmCtrlError;

    type InputData = InputData;
    type OutputData = JointCommandSet;
    type StatusReport = StatusReport;
    type ProcError = ArmCtrlError;

    /// Initialise the ArmCtrl module.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        let params: Params = params::load(&init_data.params_file)?;

        *self = Self::new(params, init_data.cycle_frequency_hz)?;

        Ok(())
    }

    /// Perform cyclic processing of Arm Control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if self.joints.len() != NUM_JOINTS {
            return Err(ArmCtrlError::NotInitialised);
        }

        // Clear the status report
        self.report = StatusReport::default();
        self.status = input_data.status;

        // Track the end effector
        if let Some(status) = &input_data.status {
            let angles: Vec<f64> = status.iter().map(|s| s.pos_rad).collect();
            let ee = forward_kinematics(self.params.base_height_m, &self.joints, &angles);

            self.tracker.add(ee, input_data.now);
            self.report.ee_pos_m = Some([ee.x, ee.y, ee.z]);
        }

        // Check for a new command
        if let Some(cmd) = input_data.cmd {
            if self.ctx.cmd.map(|c| c.cmd_id) != Some(cmd.cmd_id) {
                self.accept(cmd);
            }
        }

        // Must come after any new command, which clears the tracker
        self.pos_error_m = self.tracker.error_at(input_data.now);

        if let Some(cmd) = self.ctx.cmd {
            match cmd.action {
                ArmAction::Point { .. } => self.calc_point(),
                ArmAction::Grab { .. } => self.calc_grab(),
                ArmAction::Drop { .. } => self.calc_drop(),
                ArmAction::Sweep { .. } => self.calc_sweep(),
                ArmAction::Reset => self.calc_reset(),
            }
        }

        self.report.mode = self.ctx.mode;
        self.report.held_obj_id = self.ctx.held_obj_id;
        self.report.cmd_id = self.ctx.cmd.map(|c| c.cmd_id);
        self.report.state_idx = self.ctx.state;
        if self.pos_error_m.is_finite() {
            self.report.pos_error_m = Some(self.pos_error_m);
        }

        trace!("ArmCtrl report: {:?}", self.report);

        let output = JointCommandList {
            commands: self
                .joints
                .iter()
                .enumerate()
                .map(|(i, j)| j.to_command(i, input_data.now))
                .collect(),
        }
        .into_set()
        .map_err(|e| ArmCtrlError::InvalidJointCount(e.0))?;

        Ok((output, self.report))
    }
}

impl ArmCtrl {
    /// Create a new initialised instance from its parameters.
    pub fn new(params: Params, cycle_frequency_hz: f64) -> Result<Self, ArmCtrlError> {
        if !(cycle_frequency_hz > 0.0) {
            return Err(ArmCtrlError::InvalidCycleFrequency(cycle_frequency_hz));
        }

        if params.joints.len() != NUM_JOINTS {
            return Err(ArmCtrlError::InvalidJointCount(params.joints.len()));
        }

        for (i, j) in params.joints.iter().enumerate() {
            if (j.kind == JointKind::Gripper) != (i == GRIPPER_IDX) {
                return Err(ArmCtrlError::InvalidJointKind(i));
            }
        }

        let mut joints: Vec<Joint> = params.joints.iter().map(Joint::from_params).collect();
        if let Some(g) = joints.get_mut(GRIPPER_IDX) {
            g.set(params.default_grip_rad);
        }

        let geom = ArmGeometry::from_joints(params.base_height_m, &joints);
        let tracker = PositionTracker::new(params.hold_time_s, cycle_frequency_hz);

        debug!(
            "ArmCtrl geometry: {:?}, settling needs {} samples",
            geom,
            tracker.min_history()
        );

        Ok(Self {
            params,
            geom,
            joints,
            tracker,
            ctx: ActionContext::default(),
            report: StatusReport::default(),
            status: None,
            pos_error_m: f64::INFINITY,
        })
    }

    pub fn mode(&self) -> ActionMode {
        self.ctx.mode
    }

    pub fn held_obj_id(&self) -> u32 {
        self.ctx.held_obj_id
    }

    /// Start executing a new command from its first state.
    fn accept(&mut self, cmd: ArmCmd) {
        info!("New ArmCmd {}: {:?}", cmd.cmd_id, cmd.action);

        self.ctx.prev_goal_xy_m = self.ctx.goal_xy_m;
        self.ctx.goal_xy_m = cmd.action.target_xy_m();
        self.ctx.mode = match cmd.action {
            ArmAction::Point { .. } => ActionMode::Point,
            ArmAction::Grab { .. } => ActionMode::Grab,
            ArmAction::Drop { .. } => ActionMode::Drop,
            ArmAction::Sweep { .. } => ActionMode::Sweep,
            ArmAction::Reset => ActionMode::Wait,
        };
        if let ArmAction::Grab { obj_id, .. } = cmd.action {
            self.ctx.target_obj_id = obj_id;
        }
        self.ctx.grip_missed = false;
        self.ctx.cmd = Some(cmd);

        self.set_state(0);
    }

    /// Move to the given state of the current action, the arm must settle again before the next
    /// transition.
    pub(crate) fn set_state(&mut self, state: usize) {
        if let Some(cmd) = &self.ctx.cmd {
            info!("{:?} {}: [{}]", self.ctx.mode, cmd.cmd_id, state);
        }

        self.ctx.state = state;
        self.tracker.clear();
    }

    /// True if the end effector has settled.
    pub(crate) fn is_stable(&self) -> bool {
        self.pos_error_m < self.params.stable_error_m
    }

    /// Position the end effector over `goal_xy_m` at the given height.
    pub(crate) fn move_to(&mut self, goal_xy_m: [f64; 2], height_m: f64) {
        self.move_to_split(goal_xy_m, height_m, height_m)
    }

    /// Position the end effector, giving separate heights to the wrist-down and wrist-free
    /// planners.
    pub(crate) fn move_to_split(
        &mut self,
        goal_xy_m: [f64; 2],
        height_simple_m: f64,
        height_complex_m: f64,
    ) {
        let wrist_rad = self.ctx.cmd.map(|c| c.action.wrist_rad()).unwrap_or(0.0);

        match calc_inverse_kinematics(
            &self.geom,
            &self.params,
            goal_xy_m,
            height_simple_m,
            height_complex_m,
            wrist_rad,
        ) {
            Some(sol) => {
                for (i, angle_rad) in sol.pos_rad.iter().enumerate() {
                    self.set_joint(i, *angle_rad);
                }
                self.report.plan = Some(sol.plan);
            }
            None => trace!("{:?} is too close to the base to plan, holding", goal_xy_m),
        }
    }

    pub(crate) fn set_joint(&mut self, joint_idx: usize, angle_rad: f64) {
        if let Some(j) = self.joints.get_mut(joint_idx) {
            if j.set(angle_rad) {
                self.report.pos_limited[joint_idx] = true;
            }
        }
    }

    pub(crate) fn gripper_status(&self) -> Option<JointStatus> {
        self.status.map(|s| s[GRIPPER_IDX])
    }

    /// Nominal closing speed of the gripper.
    pub(crate) fn gripper_speed(&self) -> f64 {
        self.joints
            .get(GRIPPER_IDX)
            .map(Joint::speed)
            .unwrap_or_default()
    }
}

impl StatusReport {
    /// Build the telemetry message for this report.
    pub fn to_arm_status(&self, timestamp: DateTime<Utc>) -> ArmStatus {
        ArmStatus {
            timestamp,
            mode: self.mode,
            held_obj_id: self.held_obj_id,
            ee_pos_m: self.ee_pos_m,
            cmd_id: self.cmd_id,
            state_idx: self.state_idx,
            pos_error_m: self.pos_error_m,
            plan: self.plan,
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::arm_ctrl::params::test_params;
    use chrono::Duration;

    /// Gripper movement per cycle at full speed
    const GRIPPER_MAX_STEP_RAD: f64 = 0.08;

    /// A simulated arm. Joints 0 to 4 reach their demand within one cycle, the gripper moves at
    /// its demanded speed and stops against an object at the contact angle.
    pub(crate) struct SimArm {
        pub pos_rad: [f64; NUM_JOINTS],
        pub gripper_speed: f64,
        pub gripper_load: f64,
        pub contact_rad: Option<f64>,
    }

    pub(crate) struct Harness {
        pub ctrl: ArmCtrl,
        pub arm: SimArm,
        pub now: DateTime<Utc>,
    }

    impl SimArm {
        pub fn new(gripper_rad: f64, contact_rad: Option<f64>) -> Self {
            let mut pos_rad = [0.0; NUM_JOINTS];
            pos_rad[GRIPPER_IDX] = gripper_rad;
            Self {
                pos_rad,
                gripper_speed: 0.0,
                gripper_load: 0.0,
                contact_rad,
            }
        }

        pub fn step(&mut self, cmds: &JointCommandSet) {
            for i in 0..GRIPPER_IDX {
                self.pos_rad[i] = cmds[i].pos_rad;
            }

            let g = &cmds[GRIPPER_IDX];
            let pos = self.pos_rad[GRIPPER_IDX];
            let max_step = g.speed * GRIPPER_MAX_STEP_RAD;

            // The object stops the gripper closing past the contact angle
            let target = match self.contact_rad {
                Some(c) if pos <= c + 1e-9 => g.pos_rad.min(c),
                _ => g.pos_rad,
            };
            let step = (target - pos).max(-max_step).min(max_step);

            self.pos_rad[GRIPPER_IDX] = pos + step;
            self.gripper_speed = step / GRIPPER_MAX_STEP_RAD;
            self.gripper_load = match self.contact_rad {
                Some(c)
                    if g.pos_rad > c + 1e-9 && (self.pos_rad[GRIPPER_IDX] - c).abs() < 1e-9 =>
                {
                    -5.0 * (g.pos_rad - c)
                }
                _ => 0.0,
            };
        }

        pub fn status(&self, now: DateTime<Utc>) -> JointStatusSet {
            let mut set = [JointStatus {
                joint_idx: 0,
                pos_rad: 0.0,
                speed: 0.0,
                load: 0.0,
                voltage: 12.0,
                temperature: 30.0,
                error_flags: 0,
                timestamp: now,
            }; NUM_JOINTS];

            for (i, s) in set.iter_mut().enumerate() {
                s.joint_idx = i;
                s.pos_rad = self.pos_rad[i];
            }
            set[GRIPPER_IDX].speed = self.gripper_speed;
            set[GRIPPER_IDX].load = self.gripper_load;

            set
        }
    }

    impl Harness {
        pub fn new(contact_rad: Option<f64>) -> Self {
            let params = test_params();
            let arm = SimArm::new(params.default_grip_rad, contact_rad);
            Self {
                ctrl: ArmCtrl::new(params, 25.0).unwrap(),
                arm,
                now: Utc::now(),
            }
        }

        pub fn tick(&mut self, cmd: Option<ArmCmd>) -> (JointCommandSet, StatusReport) {
            let input = InputData {
                now: self.now,
                status: Some(self.arm.status(self.now)),
                cmd,
            };
            let (out, report) = self.ctrl.proc(&input).unwrap();

            self.arm.step(&out);
            self.now = self.now + Duration::milliseconds(40);

            (out, report)
        }

        /// Give the command every cycle until it completes, returning every report.
        pub fn run(&mut self, cmd: ArmCmd) -> Vec<StatusReport> {
            let mut reports = Vec::new();

            for _ in 0..1000 {
                let (_, report) = self.tick(Some(cmd));
                reports.push(report);

                if report.mode == ActionMode::Wait {
                    return reports;
                }
            }

            panic!(
                "Command {:?} did not complete, stuck in state {}",
                cmd,
                self.ctrl.ctx.state
            );
        }
    }

    /// The distinct states visited, in order.
    pub(crate) fn states(reports: &[StatusReport]) -> Vec<usize> {
        let mut states: Vec<usize> = reports.iter().map(|r| r.state_idx).collect();
        states.dedup();
        states
    }

    pub(crate) fn point(cmd_id: u64, target_xy_m: [f64; 2]) -> ArmCmd {
        ArmCmd {
            cmd_id,
            action: ArmAction::Point {
                target_xy_m,
                wrist_rad: 0.0,
            },
        }
    }

    pub(crate) fn grab(cmd_id: u64, target_xy_m: [f64; 2], obj_id: u32) -> ArmCmd {
        ArmCmd {
            cmd_id,
            action: ArmAction::Grab {
                target_xy_m,
                wrist_rad: 0.0,
                obj_id,
            },
        }
    }

    #[test]
    fn test_invalid_params() {
        let mut params = test_params();
        params.joints.pop();
        assert!(matches!(
            ArmCtrl::new(params, 25.0),
            Err(ArmCtrlError::InvalidJointCount(5))
        ));

        let mut params = test_params();
        params.joints.swap(4, 5);
        assert!(matches!(
            ArmCtrl::new(params, 25.0),
            Err(ArmCtrlError::InvalidJointKind(4))
        ));

        assert!(matches!(
            ArmCtrl::new(test_params(), 0.0),
            Err(ArmCtrlError::InvalidCycleFrequency(_))
        ));
    }

    #[test]
    fn test_proc_before_init() {
        let mut ctrl = ArmCtrl::default();
        let input = InputData {
            now: Utc::now(),
            status: None,
            cmd: None,
        };

        assert!(matches!(ctrl.proc(&input), Err(ArmCtrlError::NotInitialised)));
    }

    #[test]
    fn test_idle_output() {
        let mut h = Harness::new(None);
        let (out, report) = h.tick(None);

        assert_eq!(report.mode, ActionMode::Wait);
        assert_eq!(report.cmd_id, None);
        for i in 0..GRIPPER_IDX {
            assert_eq!(out[i].pos_rad, 0.0);
            assert_eq!(out[i].joint_idx, i);
        }
        assert_eq!(out[GRIPPER_IDX].pos_rad, h.ctrl.params.default_grip_rad);
    }

    #[test]
    fn test_repeated_command_not_restarted() {
        let mut h = Harness::new(None);
        h.run(point(0, [0.0, 0.0]));

        let cmd = point(1, [0.15, 0.05]);
        while h.ctrl.ctx.state < 2 {
            h.tick(Some(cmd));
        }

        // The same command again mid-motion
        let (_, report) = h.tick(Some(cmd));
        assert_eq!(report.state_idx, 2);
        assert_eq!(report.mode, ActionMode::Point);

        // A new ID supersedes it
        let (_, report) = h.tick(Some(point(2, [0.1, 0.1])));
        assert_eq!(report.cmd_id, Some(2));
        assert_eq!(report.state_idx, 0);
        assert_eq!(h.ctrl.ctx.prev_goal_xy_m, Some([0.15, 0.05]));
    }

    #[test]
    fn test_reset() {
        let mut h = Harness::new(None);
        h.run(point(0, [0.15, 0.05]));

        let reset = ArmCmd {
            cmd_id: 1,
            action: ArmAction::Reset,
        };
        let (out, report) = h.tick(Some(reset));

        assert_eq!(report.mode, ActionMode::Wait);
        for i in 0..GRIPPER_IDX {
            assert_eq!(out[i].pos_rad, 0.0);
        }
        assert_eq!(out[GRIPPER_IDX].pos_rad, h.ctrl.params.default_grip_rad);
        assert_eq!(h.ctrl.ctx.goal_xy_m, None);

        // With no previous goal the next point goes straight to the transit state
        let (_, report) = h.tick(Some(point(2, [0.15, 0.05])));
        assert_eq!(report.state_idx, 1);
    }

    #[test]
    fn test_status_report_to_arm_status() {
        let mut h = Harness::new(None);
        let (_, report) = h.tick(Some(point(4, [0.15, 0.05])));
        let now = Utc::now();
        let tm = report.to_arm_status(now);

        assert_eq!(tm.timestamp, now);
        assert_eq!(tm.mode, ActionMode::Point);
        assert_eq!(tm.cmd_id, Some(4));
        assert!(tm.ee_pos_m.is_some());
        assert_eq!(tm.pos_error_m, None);
    }
}
