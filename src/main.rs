use microbit_orientation::cube_view::{add_world_axes, CubeView};
use microbit_orientation::orientation::OrientationRenderer;
use microbit_orientation::pipeline::Pipeline;
use microbit_orientation::scrollback::{Scrollback, MAX_LOG_LENGTH};
use microbit_orientation::serial_link::ConsolePortPicker;
use microbit_orientation::settings::{BaudRate, Settings, SettingsStore, AUTOSCROLL_KEY, BAUDRATE_KEY};

use anyhow::Result;
use clap::Parser;
use kiss3d::camera::ArcBall;
use kiss3d::event::{Action, Key, WindowEvent};
use kiss3d::light::Light;
use kiss3d::text::Font;
use kiss3d::window::Window;
use log::*;
use nalgebra as na;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const LOG_ROWS: usize = 20;
const SCROLL_ROWS: usize = 5;

#[derive(Parser)]
#[command(name = "orientation_viewer")]
#[command(about = "Rotate a cube to match a micro:bit streaming its orientation over serial")]
#[command(version)]
struct Args {
    /// Serial port to open, asked for on the console when omitted
    #[arg(long)]
    port: Option<String>,
    /// Baud rate, remembered for the next start
    #[arg(long)]
    baud: Option<BaudRate>,
    /// Settings file instead of the one in the user config directory
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Connect right away instead of waiting for Space
    #[arg(long)]
    connect: bool,
    #[arg(short, long)]
    verbose: bool,
}

fn default_camera() -> ArcBall {
    ArcBall::new(na::Point3::new(0.0, 1.5, 5.0), na::Point3::origin())
}

fn load_settings(store: Option<&SettingsStore>) -> Settings {
    match store.map(SettingsStore::load) {
        Some(Ok(settings)) => settings,
        Some(Err(error)) => {
            warn!("Failed loading settings, using defaults: {}", error);
            Settings::default()
        }
        None => Settings::default(),
    }
}

fn save_setting<T: serde::Serialize>(store: Option<&SettingsStore>, key: &str, value: &T) {
    if let Some(store) = store {
        if let Err(error) = store.save_setting(key, value) {
            warn!("Failed saving {}: {}", key, error);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    let store = args
        .settings
        .clone()
        .map(SettingsStore::new)
        .or_else(SettingsStore::default_location);
    let settings = load_settings(store.as_ref());
    let baud_rate = match args.baud {
        Some(baud_rate) => {
            save_setting(store.as_ref(), BAUDRATE_KEY, &baud_rate);
            baud_rate
        }
        None => settings.baud_rate,
    };

    let scrollback = Arc::new(Mutex::new(Scrollback::new(
        MAX_LOG_LENGTH,
        settings.autoscroll,
    )));
    let mut pipeline = Pipeline::new(scrollback.clone());
    let mut picker = ConsolePortPicker::new(args.port.clone());

    let mut window = Window::new("micro:bit orientation");
    window.set_background_color(0.0, 0.0, 0.0);
    window.set_light(Light::StickToCamera);
    let mut camera = default_camera();
    let _axes = add_world_axes(&mut window, 2.5);
    let mut renderer = OrientationRenderer::new(CubeView::new(&mut window, 1.0));

    if args.connect {
        if let Err(error) = pipeline.connect(&mut picker, baud_rate) {
            error!("Failed to connect: {}", error);
        }
    }

    let white = na::Point3::new(1.0, 1.0, 1.0);
    let grey = na::Point3::new(0.6, 0.6, 0.6);
    info!("Space connects, C calibrates, R resets calibration, A toggles autoscroll");

    while window.render_with_camera(&mut camera) {
        let connected = pipeline.poll_link();

        for event in window.events().iter() {
            if let WindowEvent::Key(key, Action::Press, _) = event.value {
                match key {
                    Key::Space if connected => pipeline.disconnect(),
                    Key::Space => {
                        if let Err(error) = pipeline.connect(&mut picker, baud_rate) {
                            error!("Failed to connect: {}", error);
                        }
                    }
                    Key::C => match pipeline.calibrate() {
                        Ok(()) => camera = default_camera(),
                        Err(error) => warn!("Calibration skipped: {}", error),
                    },
                    Key::R => pipeline.reset_calibration(),
                    Key::A => {
                        if let Ok(mut log) = scrollback.lock() {
                            let autoscroll = !log.autoscroll();
                            log.set_autoscroll(autoscroll);
                            save_setting(store.as_ref(), AUTOSCROLL_KEY, &autoscroll);
                        }
                    }
                    Key::Up => {
                        if let Ok(mut log) = scrollback.lock() {
                            log.scroll_up(SCROLL_ROWS);
                        }
                    }
                    Key::Down => {
                        if let Ok(mut log) = scrollback.lock() {
                            log.scroll_down(SCROLL_ROWS);
                        }
                    }
                    Key::Delete => {
                        if let Ok(mut log) = scrollback.lock() {
                            log.clear();
                        }
                    }
                    _ => {}
                }
            }
        }

        let sample = pipeline.latest_sample();
        let rotation = renderer.render_frame(sample.as_ref(), pipeline.calibration());

        let status = match pipeline.link() {
            Some(link) => format!("Connected to {} at {}", link.port_name(), link.baud_rate()),
            None => format!("Disconnected ({}), press Space to connect", baud_rate),
        };
        let calibrated = if pipeline.calibration().is_calibrated() {
            "calibrated"
        } else {
            "uncalibrated"
        };
        let header = format!(
            "{}\nroll {:7.2}  pitch {:7.2}  yaw {:7.2}  ({})",
            status,
            rotation.roll.to_degrees(),
            rotation.pitch.to_degrees(),
            rotation.yaw.to_degrees(),
            calibrated
        );
        window.draw_text(
            &header,
            &na::Point2::new(10.0, 10.0),
            40.0,
            &Font::default(),
            &white,
        );

        if let Ok(log) = scrollback.lock() {
            let lines = log.visible(LOG_ROWS).collect::<Vec<_>>().join("\n");
            window.draw_text(
                &lines,
                &na::Point2::new(10.0, 120.0),
                30.0,
                &Font::default(),
                &grey,
            );
        }
    }

    pipeline.disconnect();
    Ok(())
}
