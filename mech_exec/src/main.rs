//! # Mechanisms Control Executable
//!
//! This executable is responsible for controlling the arm's servos:
//! - Writing the joint demands from the arm controller to the servos
//! - Publishing the servos' status back to the arm controller

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::info;
use std::{sync::Arc, thread};
use structopt::StructOpt;

// Internal
use comms_if::net::{zmq, MessageBus, ZmqBus};
use mech_lib::{driver::ArmDriver, params::MechExecParams, servo_ctrl::sim::SimServoBus};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "mech_exec", about = "Arm servo driver")]
struct Opts {
    /// Servo device to drive, only "sim" is available
    #[structopt(short, long, default_value = "sim")]
    device: String,

    /// Parameter file, relative to the params directory
    #[structopt(short, long, default_value = "mech_exec.toml")]
    params: String,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mech_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Mechanisms Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: MechExecParams =
        util::params::load(&opts.params).wrap_err("Could not load mech exec params")?;

    info!("Parameters loaded");

    // ---- SERVO INITIALISATION ----

    let servo_bus = match opts.device.as_str() {
        "sim" => SimServoBus::new(&params.sim),
        d => return Err(eyre!("Unsupported servo device \"{}\"", d)),
    };

    let mut driver = ArmDriver::new(&servo_bus, &params).wrap_err("Servo self test failed")?;

    info!("Servos initialised");

    // ---- NETWORK INITIALISATION ----

    let zmq_ctx = zmq::Context::new();

    let bus: Arc<dyn MessageBus> = Arc::new(
        ZmqBus::new(&zmq_ctx, &params.bus).wrap_err("Failed to initialise the bus")?,
    );

    driver
        .subscribe(bus.as_ref())
        .wrap_err("Failed to subscribe to joint demands")?;

    let poller = driver
        .status_poller(bus.clone(), params.status_frequency_hz)
        .wrap_err("Failed to create the status poller")?;

    info!("Network initialised");

    // ---- MAIN LOOP ----

    thread::Builder::new()
        .name("status".into())
        .spawn(move || poller.run())
        .wrap_err("Failed to start the status thread")?;

    info!("Initialisation complete, entering main loop in safe mode");

    driver.run();

    Ok(())
}
