mod config; // brings `config.rs` in as `crate::config`
mod sim; // brings `sim.rs` in as `crate::sim`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sonar_hcsr04::DriverSlot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sim::SimDevice;

/// The one ranging device of this process.
static DRIVER: DriverSlot<SimDevice> = DriverSlot::new();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Sonar ranging driver starting...");

    let settings = config::load_config().context("loading configuration")?;
    let ticks_per_unit = settings.ranging.ticks_per_unit;
    let device = sonar_hcsr04::start(
        &DRIVER,
        || sim::hardware(&settings.simulation, ticks_per_unit),
        settings.ranging,
    )
    .context("starting HC-SR04 driver")?;

    let interval = Duration::from_millis(settings.app.read_interval_ms.max(1));
    let mut ticker = tokio::time::interval(interval);
    let mut reads = 0u32;
    loop {
        ticker.tick().await;

        // Each read blocks its own worker thread until the echo or the timeout.
        let reader = Arc::clone(&device);
        let line = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let mut buf = [0u8; 32];
            let n = reader.read(&mut buf)?;
            Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
        })
        .await??;
        print!("{line}");

        reads += 1;
        if settings.app.reads != 0 && reads >= settings.app.reads {
            break;
        }
    }

    device.print_info();
    info!("Sonar ranging driver finished after {} reads", reads);
    Ok(())
}
