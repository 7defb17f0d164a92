//! # Arm command queue
//!
//! Commands arrive from the bus faster than they can be executed, so they are queued here until
//! the controller completes them. The head of the queue is the command in progress.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use comms_if::tc::arm_ctrl::ArmCmd;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// FIFO of pending arm commands, shared between the bus receive thread and the control loop.
#[derive(Debug, Default)]
pub struct CmdQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cmds: VecDeque<ArmCmd>,

    /// Highest ID ever queued. IDs increase with every new logical command, so anything at or
    /// below this is a repeat.
    highest_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl CmdQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command to the back of the queue.
    ///
    /// Returns `false` if the command's ID is not newer than every ID queued before, including
    /// those already completed. Such a command is a repeat and is not queued again.
    pub fn push(&self, cmd: ArmCmd) -> bool {
        let mut inner = self.lock();

        if matches!(inner.highest_id, Some(id) if cmd.cmd_id <= id) {
            return false;
        }

        inner.highest_id = Some(cmd.cmd_id);
        inner.cmds.push_back(cmd);
        true
    }

    /// The command at the head of the queue.
    pub fn peek(&self) -> Option<ArmCmd> {
        self.lock().cmds.front().copied()
    }

    /// Remove the head of the queue if it is the command with the given ID.
    ///
    /// Returns the removed command.
    pub fn pop_completed(&self, cmd_id: u64) -> Option<ArmCmd> {
        let mut inner = self.lock();

        if inner.cmds.front().map(|c| c.cmd_id) == Some(cmd_id) {
            inner.cmds.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.lock().cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().cmds.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
