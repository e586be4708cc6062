use std::{path::PathBuf, process};

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use log::info;
use u810::{CalibratedBounds, CalibrationSnapshot, Orientation, ParamStore, Params};

use u810_touchd::settings::{FileParamStore, DEFAULT_CALIBRATION_PATH, DEFAULT_PARAMS_PATH};

/// Edits the parameters the touch panel daemon polls.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    #[arg(long, default_value = DEFAULT_PARAMS_PATH)]
    params: PathBuf,
    #[arg(long, default_value = DEFAULT_CALIBRATION_PATH)]
    calibration: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current parameters and the last calibration range
    Show,
    /// Set the screen orientation (0 normal, 1 left, 2 inverted, 3 right)
    Orientation {
        #[arg(required_unless_present = "from_xrandr")]
        value: Option<i32>,
        /// Follow the current rotation of an xrandr output instead
        #[arg(long, conflicts_with = "value")]
        from_xrandr: bool,
        /// The xrandr output the panel sits on
        #[arg(long, default_value = "LVDS", requires = "from_xrandr")]
        output: String,
    },
    /// Enter (1) or leave (0) calibration mode
    Calibrate {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        enabled: u8,
    },
    /// Clear the recorded calibration range
    #[command(name = "resetcalibrate")]
    ResetCalibrate,
    /// Write the raw bounds used to scale samples
    #[command(name = "writecalibrate")]
    WriteCalibrate {
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
    },
    /// Use the recorded calibration range as the bounds and leave calibration mode
    #[command(name = "applycalibrate")]
    ApplyCalibrate,
}

fn show(store: &FileParamStore) -> anyhow::Result<()> {
    let params = store.load()?;
    let orientation = Orientation::try_from(params.orientation)
        .map(|o| o.to_string())
        .unwrap_or_else(|e| e.to_string());
    println!("orientation:    {} ({orientation})", params.orientation);
    println!("calibrate:      {}", u8::from(params.calibrate));
    println!("print_position: {}", u8::from(params.print_position));
    println!(
        "bounds:         x[{},{}] y[{},{}]",
        params.touch_min_x, params.touch_max_x, params.touch_min_y, params.touch_max_y
    );
    match store.load_calibration()? {
        Some(range) if !range.is_unset() => println!(
            "recorded:       x[{},{}] y[{},{}]",
            range.min_x, range.max_x, range.min_y, range.max_y
        ),
        _ => println!("recorded:       none"),
    }
    Ok(())
}

/// Reads the rotation of `name` out of `xrandr` query output.
///
/// The rotation follows the mode geometry on the output's line; a missing
/// rotation word means the output is not rotated.
fn orientation_from_xrandr(query: &str, name: &str) -> Option<Orientation> {
    let line = query
        .lines()
        .find(|line| line.split_whitespace().next() == Some(name))?;
    let rotation = line
        .split_whitespace()
        .skip(2)
        .take_while(|word| !word.starts_with('('))
        .find_map(|word| match word {
            "left" => Some(Orientation::RotatedLeft),
            "inverted" => Some(Orientation::Inverted),
            "right" => Some(Orientation::RotatedRight),
            "normal" => Some(Orientation::Normal),
            _ => None,
        });
    Some(rotation.unwrap_or_default())
}

fn xrandr_orientation(output: &str) -> anyhow::Result<Orientation> {
    let query = process::Command::new("xrandr")
        .arg("--query")
        .output()
        .context("can't run xrandr")?;
    if !query.status.success() {
        bail!("xrandr exited with {}", query.status);
    }
    let query = String::from_utf8_lossy(&query.stdout);
    orientation_from_xrandr(&query, output)
        .with_context(|| format!("xrandr has no output named {output}"))
}

fn recorded_bounds(range: &CalibrationSnapshot) -> anyhow::Result<CalibratedBounds> {
    let field = |v: u32| i32::try_from(v).context("recorded value out of range");
    Ok(CalibratedBounds::new(
        field(range.min_x)?,
        field(range.min_y)?,
        field(range.max_x)?,
        field(range.max_y)?,
    )?)
}

fn set_bounds(params: &mut Params, bounds: &CalibratedBounds) {
    params.touch_min_x = bounds.min_x();
    params.touch_min_y = bounds.min_y();
    params.touch_max_x = bounds.max_x();
    params.touch_max_y = bounds.max_y();
}

fn run(store: &FileParamStore, command: Command) -> anyhow::Result<()> {
    let mut params = store.load()?;
    match command {
        Command::Show => return show(store),
        Command::Orientation {
            value,
            from_xrandr,
            output,
        } => {
            let orientation = match value {
                Some(value) if !from_xrandr => Orientation::try_from(value)?,
                _ => xrandr_orientation(&output)?,
            };
            params.orientation = orientation as i32;
            info!("Orientation set to {orientation}");
        }
        Command::Calibrate { enabled } => {
            params.calibrate = enabled == 1;
            info!(
                "Calibration mode {}",
                if params.calibrate { "on" } else { "off" }
            );
        }
        Command::ResetCalibrate => {
            // the daemon may still be writing the old range until it sees the bump
            params.calibration_reset = params.calibration_reset.wrapping_add(1);
            store.save(&params)?;
            store.store_calibration(&CalibrationSnapshot::default())?;
            info!("Calibration range cleared");
            return Ok(());
        }
        Command::WriteCalibrate {
            min_x,
            min_y,
            max_x,
            max_y,
        } => {
            let bounds = CalibratedBounds::new(min_x, min_y, max_x, max_y)?;
            set_bounds(&mut params, &bounds);
            info!("Bounds set to x[{min_x},{max_x}] y[{min_y},{max_y}]");
        }
        Command::ApplyCalibrate => {
            let range = match store.load_calibration()? {
                Some(range) if !range.is_unset() => range,
                _ => bail!("no calibration range recorded, run `calibrate 1` first"),
            };
            let bounds = recorded_bounds(&range)?;
            set_bounds(&mut params, &bounds);
            params.calibrate = false;
            info!(
                "Bounds set to x[{},{}] y[{},{}], calibration mode off",
                bounds.min_x(),
                bounds.max_x(),
                bounds.min_y(),
                bounds.max_y()
            );
        }
    }
    store.save(&params)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = FileParamStore::new(cli.params, cli.calibration);
    run(&store, cli.command)
}
