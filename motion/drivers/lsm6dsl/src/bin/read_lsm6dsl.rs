use linux_lsm6dsl::Lsm6dslReader;
use motion::fusion::{FusionConfig, FusionEngine};
use motion::SampleSource;
use std::fs::File;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = Lsm6dslReader::new("/dev/i2c-1")?;
    let mut engine = FusionEngine::new(FusionConfig::default());

    // Log every fused tick for offline analysis.
    let mut file = File::create("imu_data.csv")?;
    writeln!(
        file,
        "timestamp,acc_x,acc_y,acc_z,gyro_x,gyro_y,gyro_z,angle_x,angle_y"
    )?;

    println!("Reading LSM6DSL data...");
    println!("Press Ctrl+C to exit");

    let mut last_tick = Instant::now();

    loop {
        match reader.read_sample() {
            Ok(raw) => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;

                match engine.update(&raw, dt) {
                    Ok(angles) => {
                        let timestamp = SystemTime::now()
                            .duration_since(UNIX_EPOCH)
                            .map(|d| d.as_secs_f64())
                            .unwrap_or(0.0);

                        writeln!(
                            file,
                            "{:.6},{},{},{},{},{},{},{:.4},{:.4}",
                            timestamp,
                            raw.acc_x,
                            raw.acc_y,
                            raw.acc_z,
                            raw.gyro_x,
                            raw.gyro_y,
                            raw.gyro_z,
                            angles.x,
                            angles.y
                        )?;

                        println!("angle_x: {: >8.2}  angle_y: {: >8.2}", angles.x, angles.y);
                    }
                    Err(e) => eprintln!("Skipping tick: {}", e),
                }
            }
            Err(_) => {
                // No new sample this tick; skip without touching the filter.
            }
        }

        thread::sleep(Duration::from_millis(10));
    }
}
