use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shuttlebot_runtime::config::{MOTOR_BAUDRATE, TICK_PERIOD};
use shuttlebot_runtime::runtime::{self, BenchOptions};
use shuttlebot_runtime::sensor::Timing;

/// Drive the shuttle course against the bench plant
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Also send drive commands to the motor controller on this serial port
    #[arg(long)]
    port: Option<String>,

    #[arg(long, default_value_t = MOTOR_BAUDRATE)]
    baud: u32,

    /// Abort the course after this many ticks
    #[arg(long, default_value_t = 2000)]
    max_ticks: u64,

    #[arg(long)]
    skip_calibration: bool,

    /// Tick every millisecond and skip the power-up and settle delays
    #[arg(long)]
    fast: bool,
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let options = BenchOptions {
        port: args.port,
        baudrate: args.baud,
        calibrate: !args.skip_calibration,
        timing: if args.fast {
            Timing::immediate()
        } else {
            Timing::default()
        },
        ..BenchOptions::default()
    };
    let period = if args.fast {
        Duration::from_millis(1)
    } else {
        TICK_PERIOD
    };

    // Bring-up sleeps through the sensor delays
    let control = tokio::task::spawn_blocking(move || runtime::build_bench(&options)).await??;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let summary = runtime::run(control, period, Some(args.max_ticks), shutdown).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=debug for per-tick state)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
