//! # Arm executable parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::net::BusParams;
use util::cache::CacheParams;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Parameters for the arm executable as a whole, the controller's own parameters are loaded
/// separately.
#[derive(Debug, Clone, Deserialize)]
pub struct ArmExecParams {
    /// Rate of the control loop.
    ///
    /// Units: hertz
    pub cycle_frequency_hz: f64,

    /// Cache holding the latest joint status.
    pub status_cache: CacheParams,

    pub bus: BusParams,
}

#[cfg(test)]
mod test {
    use super::*;
    use util::cache::CacheMode;

    #[test]
    fn test_load_exec_params() {
        let params: ArmExecParams =
            util::params::from_toml_str(include_str!("../../params/arm_exec.toml")).unwrap();

        assert_eq!(params.cycle_frequency_hz, 25.0);
        assert_eq!(params.status_cache.mode, CacheMode::Latching);
        assert_eq!(params.bus.sub_endpoints.len(), 2);
    }
}
