// bluepulse - command-line driver
//
// Runs the peripheral and central roles against each other over the
// in-process radio and prints what each side observes.

use anyhow::{bail, Context, Result};
use bluepulse::gap::adv_data;
use bluepulse::relay::RelayReceiver;
use bluepulse::sim::SimAir;
use bluepulse::{
    AdapterState, AdvertisementData, Central, CentralConfig, CentralUpdate, PeerId, Peripheral, PeripheralConfig,
    ScanStrategy, ServiceDescriptor, SessionState, SubscriberId, WireFormat,
};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "bluepulse")]
#[command(about = "Button and slider events over a BLE notify characteristic", long_about = None)]
#[command(version)]
struct Cli {
    /// Log link activity at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link one peripheral to centrals and push events across
    Demo {
        #[arg(short, long, default_value = "3")]
        presses: usize,
        #[arg(short, long, default_value = "200")]
        slider: u8,
        #[arg(short, long, default_value = "1")]
        centrals: usize,
        /// Use the two-byte tagged payload format on both ends
        #[arg(long)]
        tagged: bool,
    },
    /// List every advertiser in range without connecting
    Scan {
        #[arg(short, long, default_value = "3")]
        peripherals: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Demo {
            presses,
            slider,
            centrals,
            tagged,
        } => cmd_demo(presses, slider, centrals, tagged).await,
        Commands::Scan { peripherals } => cmd_scan(peripherals).await,
    }
}

async fn settle<D, C: Clone>(updates: &mut RelayReceiver<D, C>, predicate: impl FnMut(&C) -> bool) -> Result<C> {
    let value = timeout(WAIT, updates.wait_for(predicate))
        .await
        .context("timed out waiting for the link")??;
    Ok(value)
}

fn print_update(id: &SubscriberId, update: &CentralUpdate) {
    match update {
        CentralUpdate::AdapterChanged(state) => println!("  [{}] adapter {}", id, state),
        CentralUpdate::SessionChanged { state, peer: Some(peer) } => println!("  [{}] {} ({})", id, state, peer),
        CentralUpdate::SessionChanged { state, peer: None } => println!("  [{}] {}", id, state),
        CentralUpdate::PeerDiscovered(peer) => println!("  [{}] found {}", id, peer),
        CentralUpdate::ButtonToggled(on) => println!("  [{}] button -> {}", id, if *on { "ON" } else { "OFF" }),
        CentralUpdate::SessionFailed(err) => println!("  [{}] session failed: {}", id, err),
        CentralUpdate::ScanFailed(err) => println!("  [{}] scan failed: {}", id, err),
    }
}

async fn cmd_demo(presses: usize, slider: u8, centrals: usize, tagged: bool) -> Result<()> {
    if centrals == 0 {
        bail!("at least one central is needed");
    }
    let format = if tagged { WireFormat::Tagged } else { WireFormat::Compact };
    let descriptor = ServiceDescriptor::DEMO;
    let air = SimAir::new();

    let (radio, events) = air.add_peripheral(-45);
    let peer = radio.peer_id();
    let (peripheral, mut peripheral_updates) =
        Peripheral::spawn(radio, events, PeripheralConfig::default().with_wire_format(format));
    air.set_peripheral_power(&peer, AdapterState::PoweredOn);
    peripheral
        .start_advertising(descriptor)
        .await
        .context("starting the advertisement")?;
    println!("Peripheral {} advertising service {}", peer, descriptor.service_uuid);

    let mut nodes = Vec::with_capacity(centrals);
    for _ in 0..centrals {
        let (radio, events) = air.add_central();
        let id = radio.subscriber_id();
        let (central, mut updates) =
            Central::spawn(radio, events, CentralConfig::default().with_wire_format(format));
        air.set_central_power(&id, AdapterState::PoweredOn);
        central.start_scan().await.context("starting the scan")?;

        settle(&mut updates, |s| s.session == SessionState::Subscribed).await?;
        for update in updates.drain_events() {
            print_update(&id, &update);
        }
        nodes.push((id, central, updates));
    }

    let snapshot = settle(&mut peripheral_updates, |s| s.subscriber_count == centrals).await?;
    println!("{} subscriber(s) on {}", snapshot.subscriber_count, descriptor.characteristic_uuid);

    for press in 1..=presses {
        let report = peripheral.button_press().await?;
        info!(press, delivered = report.delivered, failed = report.failed, "button press published");
    }
    let slider_sent = match peripheral.set_slider(slider).await {
        Ok(report) => {
            println!("Slider {} sent to {} subscriber(s)", slider, report.delivered);
            true
        }
        Err(err) => {
            println!("Slider {} not sent: {}", slider, err);
            false
        }
    };

    for (id, central, mut updates) in nodes {
        let mut toggles = 0;
        while toggles < presses {
            let update = timeout(WAIT, updates.next_event())
                .await
                .context("timed out waiting for button presses")?;
            match update {
                Some(update) => {
                    if matches!(update, CentralUpdate::ButtonToggled(_)) {
                        toggles += 1;
                    }
                    print_update(&id, &update);
                }
                None => bail!("central {} stopped", id),
            }
        }
        if slider_sent {
            settle(&mut updates, |s| s.observed.last_slider_value == Some(slider)).await?;
        }

        let snapshot = updates.latest();
        println!(
            "  [{}] connected={} button={} slider={} malformed={}",
            id,
            snapshot.observed.connected,
            snapshot.observed.last_button_toggle,
            snapshot
                .observed
                .last_slider_value
                .map_or_else(|| "-".to_string(), |value| value.to_string()),
            snapshot.malformed_payloads,
        );
        central.shutdown().await?;
    }

    peripheral.shutdown().await?;
    debug!("demo finished");
    Ok(())
}

/// Each simulated advertiser is heard 5 dB weaker than the previous one,
/// bottoming out at -100 dBm.
fn advertiser_rssi(index: usize) -> i16 {
    let step = i16::try_from(index).unwrap_or(i16::MAX).min(12);
    -40 - 5 * step
}

async fn cmd_scan(peripherals: usize) -> Result<()> {
    let air = SimAir::new();

    let mut handles = Vec::with_capacity(peripherals);
    for index in 0..peripherals {
        let (radio, events) = air.add_peripheral(advertiser_rssi(index));
        let peer = radio.peer_id();
        let config = PeripheralConfig::default().with_manufacturer_data(format!("node{}", index).into_bytes());
        let (peripheral, mut updates) = Peripheral::spawn(radio, events, config);
        air.set_peripheral_power(&peer, AdapterState::PoweredOn);
        peripheral.start_advertising(ServiceDescriptor::DEMO).await?;
        settle(&mut updates, |s| s.advertising.is_active()).await?;
        handles.push(peripheral);
    }

    let (radio, events) = air.add_central();
    let id = radio.subscriber_id();
    let config = CentralConfig::default().with_strategy(ScanStrategy::CollectAll);
    let (central, mut updates) = Central::spawn(radio, events, config);
    air.set_central_power(&id, AdapterState::PoweredOn);
    central.start_scan().await.context("starting the scan")?;

    // One nameless advertiser, heard directly.
    let anonymous = adv_data::encode(&AdvertisementData::new())?;
    settle(&mut updates, |s| s.session == SessionState::Scanning).await?;
    air.inject_advertisement(&id, PeerId::new_random(), -90, &anonymous);

    let snapshot = settle(&mut updates, |s| s.discovered_peers.len() == peripherals + 1).await?;
    for peer in &snapshot.discovered_peers {
        println!("{}", peer);
        for (key, value) in peer.advertisement.entries() {
            println!("    {}: {}", key, value);
        }
        // Rebuilt from the decoded fields; the bytes heard on air are not kept.
        match adv_data::encode(&peer.advertisement) {
            Ok(payload) => println!("    re-encoded: {}", hex::encode(payload)),
            Err(err) => println!("    re-encoded: unavailable ({})", err),
        }
    }

    central.shutdown().await?;
    for peripheral in handles {
        peripheral.shutdown().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertiser_rssi_is_bounded() {
        assert_eq!(advertiser_rssi(0), -40);
        assert_eq!(advertiser_rssi(3), -55);
        assert_eq!(advertiser_rssi(12), -100);
        assert_eq!(advertiser_rssi(13), -100);
        assert_eq!(advertiser_rssi(70_000), -100);
        assert_eq!(advertiser_rssi(usize::MAX), -100);
    }

    #[test]
    fn test_scan_arguments_parse() {
        let cli = Cli::try_parse_from(["bluepulse", "scan", "--peripherals", "20"]).unwrap();
        assert!(matches!(cli.command, Commands::Scan { peripherals: 20 }));
    }
}
