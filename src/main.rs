//! Command-line frontend for laser-ctl.
//!
//! Connects to the laser named in the config file and runs one operation:
//!
//! ```bash
//! laser-ctl --config config/default info
//! laser-ctl --config config/default set-wavelength 1550.0
//! laser-ctl --config config/default sweep 1540.0 1560.0 --interval-us 100 --seconds 10
//! laser-ctl --config config/default manual-set 0 12.5
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use laser_ctl::comm::SerialGateway;
use laser_ctl::components::HeaterChannel;
use laser_ctl::config::Settings;
use laser_ctl::{Laser, LaserMode};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "laser-ctl")]
#[command(about = "Calibrated wavelength control for Chilas tunable lasers", long_about = None)]
struct Cli {
    /// Config file (TOML) with port, baud rate, and calibration path.
    #[arg(long, default_value = "config/default")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print device identity, uptime, and calibration summary.
    Info,

    /// Switch to steady mode and move to a wavelength (nanometers).
    SetWavelength {
        /// Target wavelength in nanometers.
        nm: f64,
    },

    /// Sweep a wavelength range for a fixed duration.
    Sweep {
        /// Sweep start in nanometers.
        start_nm: f64,
        /// Sweep end in nanometers.
        end_nm: f64,
        /// Dwell time per calibration entry, in microseconds.
        #[arg(long, default_value = "100")]
        interval_us: u64,
        /// How long to sweep before stopping.
        #[arg(long, default_value = "10")]
        seconds: u64,
    },

    /// Switch to manual mode and write one heater channel directly.
    ManualSet {
        /// Heater channel (0 = phase, 1 = large ring, 2 = small ring, 3 = coupler).
        channel: u8,
        /// Drive value.
        value: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading config '{}'", cli.config))?;
    laser_ctl::logging::init(&settings.log_level);

    let gateway = SerialGateway::open(&settings.port, settings.baud_rate, settings.timeout())
        .with_context(|| format!("opening serial port '{}'", settings.port))?;

    let mut laser = match &settings.calibration_file {
        Some(path) => Laser::connect_with_calibration(Box::new(gateway), path).await?,
        None => Laser::connect(Box::new(gateway)).await?,
    };

    match cli.command {
        Commands::Info => {
            let identity = laser.identity().await?;
            println!("hardware:  {}", identity.hw_version);
            println!("firmware:  {}", identity.fw_version);
            println!("serial no: {}", identity.serial_no);
            println!("uptime:    {} s", laser.uptime_secs().await?);
            match laser.wavelength_bounds() {
                Ok((min, max)) => println!("calibrated range: {min:.3} - {max:.3} nm"),
                Err(_) => println!("no calibration loaded"),
            }
        }

        Commands::SetWavelength { nm } => {
            laser.turn_on().await?;
            laser.set_mode(LaserMode::Steady).await?;
            laser.set_wavelength(nm).await?;
            println!(
                "wavelength set to {:.4} nm (entry {})",
                laser.wavelength().await.unwrap_or(f64::NAN),
                laser.cycler_index().await.map_or(-1, |i| i as i64),
            );
        }

        Commands::Sweep {
            start_nm,
            end_nm,
            interval_us,
            seconds,
        } => {
            laser.turn_on().await?;
            laser.set_mode(LaserMode::Sweep).await?;
            laser.set_sweep_bounds(start_nm, end_nm)?;
            laser.set_sweep_interval(Duration::from_micros(interval_us))?;
            laser.start_sweep().await?;
            println!("sweeping {start_nm:.3} - {end_nm:.3} nm for {seconds} s");
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            laser.stop_sweep().await;
            println!(
                "stopped at {:.4} nm",
                laser.wavelength().await.unwrap_or(f64::NAN)
            );
        }

        Commands::ManualSet { channel, value } => {
            let channel = HeaterChannel::try_from(channel)?;
            laser.turn_on().await?;
            laser.set_mode(LaserMode::Manual).await?;
            laser.set_heater(channel, value).await?;
            println!("{channel} set to {value:.4}");
        }
    }

    Ok(())
}
