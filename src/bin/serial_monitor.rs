use microbit_orientation::pipeline::Pipeline;
use microbit_orientation::scrollback::LineSink;
use microbit_orientation::serial_link::ConsolePortPicker;
use microbit_orientation::settings::{BaudRate, SettingsStore};

use anyhow::Result;
use clap::Parser;
use log::*;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

const FRAME_PERIOD: Duration = Duration::from_millis(30);
const FRAMES_PER_REPORT: u32 = 33;

#[derive(Parser)]
#[command(name = "serial_monitor")]
#[command(about = "Print micro:bit telemetry and the rotation it produces, without a window")]
struct Args {
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<BaudRate>,
    /// Use the first valid sample as the zero orientation
    #[arg(long)]
    calibrate: bool,
    #[arg(short, long)]
    verbose: bool,
}

struct ConsoleSink;

impl LineSink for ConsoleSink {
    fn append_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)?;

    let baud_rate = match args.baud {
        Some(baud_rate) => baud_rate,
        None => SettingsStore::default_location()
            .and_then(|store| store.load().ok())
            .map(|settings| settings.baud_rate)
            .unwrap_or_default(),
    };

    let mut pipeline = Pipeline::new(Arc::new(Mutex::new(ConsoleSink)));
    pipeline.connect(&mut ConsolePortPicker::new(args.port), baud_rate)?;

    let mut needs_calibration = args.calibrate;
    let mut frame = 0_u32;
    while pipeline.poll_link() {
        sleep(FRAME_PERIOD);
        if needs_calibration && pipeline.calibrate().is_ok() {
            needs_calibration = false;
        }
        frame = frame.wrapping_add(1);
        if frame % FRAMES_PER_REPORT == 0 {
            let rotation = pipeline.next_rotation();
            info!(
                "roll {:7.2} pitch {:7.2} yaw {:7.2}",
                rotation.roll.to_degrees(),
                rotation.pitch.to_degrees(),
                rotation.yaw.to_degrees()
            );
        }
    }
    info!("Device disconnected");
    Ok(())
}
