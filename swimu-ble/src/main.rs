//! BLE tool for SwIMU devices
//!
//! Finds a SwIMU device and runs whichever mode it advertises: configure it,
//! stream live samples, or download its recorded files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use swimu_ble::ble::{self, BleTransport};
use swimu_ble::{Config, DirectorySink, swimu_home};
use swimu_client::{
    Clock, ConfigPayload, ConnectionHandle, Driver, Mode, Session, SystemClock,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "swimu-ble")]
#[command(about = "BLE tool for SwIMU wearable IMU sensors")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for SwIMU devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Connect to a device and run the mode it advertises
    Run {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
        /// Person name written in configuration mode
        #[arg(short, long)]
        name: Option<String>,
        /// Activity written in configuration mode
        #[arg(short, long)]
        activity: Option<String>,
        /// Directory for received files
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .init();

    let home = swimu_home()?;
    let config = Config::load_or_create(&home)?;
    let adapter = ble::get_adapter().await?;

    match cli.command {
        Commands::Scan { duration } => {
            let secs = duration.unwrap_or(config.scan_secs);
            scan_devices(&adapter, &config, secs).await?;
        }
        Commands::Run {
            device,
            name,
            activity,
            output,
        } => {
            let target = device.unwrap_or_else(|| config.target_name.clone());
            let run = RunArgs {
                name,
                activity,
                output: output.unwrap_or_else(|| config.output_dir(&home)),
            };
            run_device(&adapter, &config, &target, run).await?;
        }
    }

    Ok(())
}

async fn scan_devices(
    adapter: &btleplug::platform::Adapter,
    config: &Config,
    secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for SwIMU devices ({} seconds)...", secs);
    let devices = ble::scan(adapter, Duration::from_secs(secs)).await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.matches(&config.target_name) {
            match Mode::select(&device.services) {
                Ok(mode) => format!(" [SWIMU {mode}]"),
                Err(_) => " [SWIMU]".to_string(),
            }
        } else {
            String::new()
        };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }
    Ok(())
}

struct RunArgs {
    name: Option<String>,
    activity: Option<String>,
    output: PathBuf,
}

async fn run_device(
    adapter: &btleplug::platform::Adapter,
    config: &Config,
    target: &str,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for {target}...");
    let (peripheral, device) =
        ble::find_device(adapter, target, Duration::from_secs(config.scan_secs)).await?;
    println!("Found device: {} ({})", device.name, device.address);

    println!("Connecting...");
    let transport = BleTransport::connect(adapter, peripheral).await?;
    println!("Connected!");

    // some stacks report no services in the advertisement
    let advertised: Vec<Uuid> = if device.services.is_empty() {
        transport.services()
    } else {
        device.services.clone()
    };

    let monitor = transport.monitor();
    let mut session = Session::new(ConnectionHandle::new(transport, monitor, config.timeouts()));
    let result = drive(&mut session, &advertised, args).await;

    let conn = session.into_connection();
    if conn.is_connected() {
        let _ = conn.transport().disconnect().await;
    }
    result
}

async fn drive(
    session: &mut Session<BleTransport>,
    advertised: &[Uuid],
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    match session.dispatch(advertised)? {
        Driver::Configuration(driver) => {
            let (Some(name), Some(activity)) = (args.name, args.activity) else {
                return Err("configuration mode needs --name and --activity".into());
            };
            let payload = ConfigPayload::new(name, activity, SystemClock.now());

            println!("Configuring {} / {}...", payload.person_name(), payload.activity());
            driver.configure(&payload, &SystemClock).await?;
            let file = driver.read_configured_file_name().await?;
            println!("Configured! Device will record to {file}");
        }
        Driver::Streaming(driver) => {
            println!("Streaming samples, Ctrl-C to stop");
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            let stats = driver.run_until(|sample| println!("{sample}"), shutdown).await?;
            println!(
                "Stopped: {} samples, {} dropped, {:.1} Hz",
                stats.samples,
                stats.dropped,
                stats.rate_hz()
            );
        }
        Driver::FileTransfer(driver) => {
            println!("Receiving files into {}", args.output.display());
            let mut sink = DirectorySink::new(&args.output);
            let report = driver.receive_all(&mut sink).await?;
            print_report(&args.output, &report);
        }
    }
    Ok(())
}

fn print_report(dir: &Path, report: &swimu_client::TransferReport) {
    println!("\nReceived {} files ({} bytes):", report.files.len(), report.total_bytes());
    for file in &report.files {
        println!(
            "  {} ({} bytes, {:.1}s)",
            dir.join(&file.name).display(),
            file.len,
            file.elapsed.as_secs_f64()
        );
    }
}
