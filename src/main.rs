use std::{path::PathBuf, thread, time::Duration};

use clap::Parser;
use log::info;

use u810_touchd::{
    settings::{FileParamStore, DEFAULT_CALIBRATION_PATH, DEFAULT_PARAMS_PATH},
    supervisor::Supervisor,
    uinput::UinputHost,
    usb::UsbBus,
};

/// Userspace driver for the Fujitsu U810 USB touch panel.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Parameters written by `touchctl`.
    #[arg(long, default_value = DEFAULT_PARAMS_PATH)]
    params: PathBuf,
    /// Where the calibration range is written while calibrating.
    #[arg(long, default_value = DEFAULT_CALIBRATION_PATH)]
    calibration: PathBuf,
    /// Parameter store poll period, in milliseconds.
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
    /// Delay between scans for newly plugged panels, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    rescan_ms: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let store = FileParamStore::new(args.params, args.calibration);
    info!("Following parameters in {}", store.params_path().display());
    let mut supervisor = Supervisor::new(
        UsbBus::new()?,
        UinputHost,
        store,
        Duration::from_millis(args.rescan_ms),
    );
    info!("Waiting for touch panels");

    let tick = Duration::from_millis(args.tick_ms);
    loop {
        supervisor.tick();
        thread::sleep(tick);
    }
}
