//! RTL-SDR Session Probe
//!
//! Lists attached receivers, opens one, prints its gain and frequency
//! settings as JSON, and closes it again. Useful for checking that a dongle
//! and its driver are healthy before starting a decoder.

mod settings;

use std::sync::Arc;

use anyhow::Context;
use sdr_detect::{CatalogConfig, DeviceCatalog};
use sdr_model::RadioTransport;
use sdr_session::SessionManager;
use sdr_sim::SimTransport;
use serde::Serialize;
use settings::{Backend, Settings};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sdr_probe=info,sdr_model=info,sdr_detect=info,sdr_session=info,sdr_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load();
    info!("Starting sdr-probe with {:?} backend", settings.backend);
    if let Some(path) = Settings::settings_path() {
        info!("Config: {}", path.display());
    }

    let catalog = DeviceCatalog::with_config(
        transport(&settings)?,
        CatalogConfig {
            skip_serials: settings.skip_serials.clone(),
        },
    );
    let manager = SessionManager::with_config(catalog, settings.session.clone());

    let devices = manager
        .list_devices()
        .await
        .context("listing RTL-SDR devices")?;
    print_json(&devices)?;

    if devices.is_empty() {
        warn!("Nothing to open");
        return Ok(());
    }

    let index = settings.device_index;
    manager
        .open(index, settings.auto_gain_control)
        .await
        .with_context(|| format!("opening device #{}", index))?;

    let report = async {
        print_json(&manager.gain_settings().await?)?;
        print_json(&manager.freq_settings().await?)?;
        anyhow::Ok(())
    }
    .await;

    manager.close().await.context("closing device")?;
    report
}

fn transport(settings: &Settings) -> anyhow::Result<Arc<dyn RadioTransport>> {
    match settings.backend {
        Backend::Simulated => Ok(Arc::new(SimTransport::with_dongles(
            settings.virtual_dongles.iter().cloned(),
        ))),
        #[cfg(feature = "librtlsdr")]
        Backend::Librtlsdr => Ok(Arc::new(
            sdr_detect::LibRtlSdr::load().context("loading librtlsdr")?,
        )),
        #[cfg(not(feature = "librtlsdr"))]
        Backend::Librtlsdr => anyhow::bail!(
            "built without librtlsdr support; set {}=simulated",
            settings::BACKEND_ENV
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
