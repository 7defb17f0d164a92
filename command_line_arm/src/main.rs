//! # Arm command line
//!
//! An interactive console which sends arm commands to the arm executable and shows its
//! telemetry.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Result};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::sync::{Arc, Mutex};
use structopt::{clap::AppSettings, StructOpt};

use comms_if::{
    net::{channel, zmq, BusExt, BusParams, ZmqBus},
    tc::arm_ctrl::{ArmAction, ArmCmd},
    tm::ArmStatus,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "Arm $ ";
const HISTORY_PATH: &str = "data/arm_history.txt";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "command_line_arm", about = "Interactive arm console")]
struct Opts {
    /// Endpoint commands are published on
    #[structopt(long, default_value = "tcp://*:5130")]
    pub_endpoint: String,

    /// Endpoint of the arm executable's telemetry
    #[structopt(long, default_value = "tcp://localhost:5110")]
    arm_endpoint: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A line entered at the console.
#[derive(Debug, PartialEq, StructOpt)]
#[structopt(
    name = "arm",
    no_version,
    global_settings = &[AppSettings::AllowNegativeNumbers]
)]
enum Line {
    /// Point at a location
    Point {
        x_m: f64,
        y_m: f64,
        #[structopt(short, long, default_value = "0.0")]
        wrist_rad: f64,
    },

    /// Grab the object at a location
    Grab {
        x_m: f64,
        y_m: f64,
        obj_id: u32,
        #[structopt(short, long, default_value = "0.0")]
        wrist_rad: f64,
    },

    /// Drop the held object at a location
    Drop {
        x_m: f64,
        y_m: f64,
        #[structopt(short, long, default_value = "0.0")]
        wrist_rad: f64,
    },

    /// Sweep through a location
    Sweep {
        x_m: f64,
        y_m: f64,
        #[structopt(short, long, default_value = "0.0")]
        wrist_rad: f64,
    },

    /// Return the arm to its rest position
    Reset,

    /// Show the latest arm telemetry
    Status,

    /// Leave the console
    Exit,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Line {
    fn parse(line: &str) -> Result<Self, structopt::clap::Error> {
        Self::from_iter_safe(std::iter::once("arm").chain(line.split_whitespace()))
    }

    /// The arm action this line requests, if any.
    fn action(&self) -> Option<ArmAction> {
        match *self {
            Line::Point { x_m, y_m, wrist_rad } => Some(ArmAction::Point {
                target_xy_m: [x_m, y_m],
                wrist_rad,
            }),
            Line::Grab {
                x_m,
                y_m,
                obj_id,
                wrist_rad,
            } => Some(ArmAction::Grab {
                target_xy_m: [x_m, y_m],
                wrist_rad,
                obj_id,
            }),
            Line::Drop { x_m, y_m, wrist_rad } => Some(ArmAction::Drop {
                target_xy_m: [x_m, y_m],
                wrist_rad,
            }),
            Line::Sweep { x_m, y_m, wrist_rad } => Some(ArmAction::Sweep {
                target_xy_m: [x_m, y_m],
                wrist_rad,
            }),
            Line::Reset => Some(ArmAction::Reset),
            Line::Status | Line::Exit => None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let zmq_ctx = zmq::Context::new();
    let bus = ZmqBus::new(
        &zmq_ctx,
        &BusParams {
            pub_endpoint: opts.pub_endpoint.clone(),
            sub_endpoints: vec![opts.arm_endpoint.clone()],
        },
    )
    .wrap_err("Failed to initialise the bus")?;

    let latest_tm: Arc<Mutex<Option<ArmStatus>>> = Arc::new(Mutex::new(None));
    let tm_sink = latest_tm.clone();
    bus.subscribe(channel::ARM_TM, move |tm: ArmStatus| {
        if let Ok(mut latest) = tm_sink.lock() {
            *latest = Some(tm);
        }
    })
    .wrap_err("Failed to subscribe to arm telemetry")?;

    // IDs start from the current time so a restarted console never repeats one
    let mut next_cmd_id = chrono::Utc::now().timestamp_millis().max(0) as u64;

    let mut rl = DefaultEditor::new()?;
    if rl.load_history(HISTORY_PATH).is_err() {
        println!("No history detected");
    }

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("Unhandled Error: {:?}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        rl.add_history_entry(line.as_str())?;

        let parsed = match Line::parse(&line) {
            Ok(p) => p,
            Err(e) => {
                println!("{}", e.message);
                continue;
            }
        };

        match parsed.action() {
            Some(action) => {
                let cmd = ArmCmd {
                    cmd_id: next_cmd_id,
                    action,
                };
                next_cmd_id += 1;

                match bus.publish(channel::ARM_CMD, &cmd) {
                    Ok(()) => println!("Sent command {}", cmd.cmd_id),
                    Err(e) => println!("Could not send the command: {}", e),
                }
            }
            None if parsed == Line::Exit => break,
            None => match latest_tm.lock().ok().and_then(|tm| tm.clone()) {
                Some(tm) => println!("{:#?}", tm),
                None => println!("No telemetry received"),
            },
        }
    }

    if let Err(e) = rl.save_history(HISTORY_PATH) {
        println!("Could not save history: {}", e);
    }

    println!("Exiting...");

    Ok(())
}
