use clap::Parser;
use gyro_bridge::BridgeReader;
use motion::swing::{power_level_from_rate, SwingDetector};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Listens for bridged gyro frames and turns swing gestures into throw
/// roll times.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on for the sensor stream.
    #[arg(long, default_value = "127.0.0.1:65432")]
    listen: String,

    /// Print the power level derived from every frame.
    #[arg(long)]
    show_levels: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let bridge = BridgeReader::bind(&args.listen)?;
    info!("listening for gyro frames on {}", bridge.local_addr());

    let mut detector = SwingDetector::new();

    // The detector reports on every tick while a swing sits in its window;
    // suppressing repeats while a throw is in flight is this side's job.
    let mut throw_done_at: Option<Instant> = None;

    loop {
        if let Ok(frame) = bridge.latest() {
            let level = power_level_from_rate(frame.y);
            if args.show_levels {
                println!("gyro_y: {: >8.2}  level: {: >2}", frame.y, level);
            }

            if let Some(event) = detector.push(level) {
                let in_flight = throw_done_at.map_or(false, |done| Instant::now() < done);
                if in_flight {
                    debug!("throw in flight, ignoring {}", event);
                } else {
                    println!(
                        "swing: avg power {:.2}, scaled {:.2}, roll time {:.2}s",
                        event.avg_power, event.scaled_power, event.roll_time
                    );
                    throw_done_at =
                        Some(Instant::now() + Duration::from_secs_f32(event.roll_time));
                }
            }
        }

        thread::sleep(Duration::from_millis(10));
    }
}
