//! # Mechanisms Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::servo_ctrl::sim::SimServoParams;
use comms_if::net::BusParams;
use util::cache::CacheParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MechExecParams {
    /// Rate at which the joint status is read and published.
    ///
    /// Units: hertz
    pub status_frequency_hz: f64,

    /// Demands older than this are rewritten to a servo even if they have not changed.
    ///
    /// Units: seconds
    pub refresh_period_s: f64,

    /// Longest time to wait for new demands before checking the cache again.
    ///
    /// Units: seconds
    pub cmd_wait_period_s: f64,

    /// Cache of received joint demands.
    pub cmd_cache: CacheParams,

    pub bus: BusParams,

    /// Simulated servos, only used when the sim device is selected.
    pub sim: SimServoParams,
}

#[cfg(test)]
mod test {
    use super::*;
    use util::cache::CacheMode;

    #[test]
    fn test_load_params() {
        let params: MechExecParams =
            util::params::from_toml_str(include_str!("../../params/mech_exec.toml")).unwrap();

        assert_eq!(params.status_frequency_hz, 15.0);
        assert_eq!(params.cmd_cache.mode, CacheMode::Expiring);
        assert_eq!(params.sim.gripper_contact_rad, 1.1);
    }
}
