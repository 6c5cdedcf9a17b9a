use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use keybridge_core::{
    ui_loop, BridgeSettings, ConfigManager, CrossThreadRelay, DispatchOutcome, EventDispatcher,
    LogChannel, MidiInputBackend, RawMidiPacket, SimulatedBackend, SimulatedDevice, UiMessage,
    UiPoster, UiReceiver, UiSender,
};

/// Relays notes played on a MIDI keyboard to a UI command channel.
#[derive(Parser, Debug)]
#[command(name = "keybridge")]
#[command(about = "MIDI keyboard to UI command bridge")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a simulated keyboard that plays a short phrase, then exits
    #[arg(long)]
    simulate: bool,

    /// Bound the UI message queue (events beyond it are dropped and counted)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Run without opening any MIDI input
    #[arg(long)]
    no_midi: bool,

    /// List MIDI input devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    // Listing devices is read-only: don't leave a config file behind
    let loaded = if args.list_devices {
        config.read()
    } else {
        config.load()
    };
    let mut settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("{}. Using default settings.", e);
            BridgeSettings::default()
        }
    };
    if args.queue_capacity.is_some() {
        settings.queue_capacity = args.queue_capacity;
    }
    if args.no_midi {
        settings.midi_enabled = false;
    }
    ConfigManager::validate_settings(&settings)
        .map_err(|errors| anyhow!("invalid settings: {}", errors.join(", ")))?;

    let (backend, simulated) = select_backend(&args, &settings)?;

    if args.list_devices {
        let count = backend.enumerate_devices()?;
        println!("{} MIDI input device(s)", count);
        for index in 0..count {
            let name = backend
                .device_name(index)
                .unwrap_or_else(|| "<unknown>".to_string());
            println!("  {}: {}", index, name);
        }
        return Ok(());
    }

    // The main thread plays the UI thread: it owns the channel and runs the loop
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(backend, simulated, settings));
    Ok(())
}

fn select_backend(
    args: &Args,
    settings: &BridgeSettings,
) -> Result<(Box<dyn MidiInputBackend>, Option<SimulatedDevice>), anyhow::Error> {
    if args.simulate {
        let simulated = SimulatedBackend::new(1);
        let device = simulated.device();
        let backend: Box<dyn MidiInputBackend> = Box::new(simulated);
        return Ok((backend, Some(device)));
    }

    Ok((hardware_backend(settings)?, None))
}

#[cfg(feature = "midi-io")]
fn hardware_backend(settings: &BridgeSettings) -> Result<Box<dyn MidiInputBackend>, anyhow::Error> {
    let backend = keybridge_core::MidirBackend::new(settings.client_name.clone());
    Ok(Box::new(backend) as Box<dyn MidiInputBackend>)
}

#[cfg(not(feature = "midi-io"))]
fn hardware_backend(_settings: &BridgeSettings) -> Result<Box<dyn MidiInputBackend>, anyhow::Error> {
    Err(anyhow!(
        "built without hardware MIDI support; run with --simulate"
    ))
}

async fn run(
    backend: Box<dyn MidiInputBackend>,
    simulated: Option<SimulatedDevice>,
    settings: BridgeSettings,
) {
    let (sender, mut receiver) = ui_loop(settings.queue_policy());
    let mut relay = CrossThreadRelay::new(backend, sender.clone());
    let channel = LogChannel::new(settings.channel_name.clone());
    let dispatcher = EventDispatcher::new(&channel);

    if settings.midi_enabled {
        match relay.open() {
            Ok(device) => log::info!("Listening on '{}'", device.name()),
            // The relay has already logged why
            Err(_) => log::info!("Running without MIDI input"),
        }
    } else {
        log::info!("MIDI input disabled");
    }

    let player = simulated.map(|device| spawn_player(device, sender.clone()));
    drop(sender);

    tokio::select! {
        invoked = dispatcher.run(&mut receiver) => {
            log::info!("Message loop finished after {} command(s)", invoked);
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                log::error!("Failed to listen for Ctrl-C: {}", e);
            }
            log::info!("Interrupted, shutting down");
        }
    }

    relay.close();
    drain(&dispatcher, &mut receiver);

    let stats = relay.stats();
    log::info!(
        "Relayed {} event(s), dropped {}, late {}",
        stats.forwarded,
        stats.dropped,
        stats.late
    );

    if let Some(player) = player {
        if player.join().is_err() {
            log::warn!("Simulated keyboard thread panicked");
        }
    }
}

/// Deliver whatever was queued before the close, so no release is lost.
fn drain(dispatcher: &EventDispatcher<&LogChannel>, receiver: &mut UiReceiver) {
    let outcomes = dispatcher.pump(receiver);
    let stale = outcomes
        .iter()
        .filter(|outcome| **outcome == DispatchOutcome::Stale)
        .count();
    if stale > 0 {
        log::debug!("Discarded {} event(s) that arrived after close", stale);
    }
}

/// Plays a C major arpeggio on the simulated keyboard from its own thread,
/// then asks the message loop to stop.
fn spawn_player(device: SimulatedDevice, sender: UiSender) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for note in [60u8, 64, 67, 72] {
            device.send(RawMidiPacket::new(0x90, note, 100));
            thread::sleep(Duration::from_millis(150));
            device.send(RawMidiPacket::new(0x90, note, 0));
        }
        // Sustain pedal, ignored by the bridge
        device.send(RawMidiPacket::new(0xB0, 64, 127));
        device.send(RawMidiPacket::new(0x80, 72, 0));

        if let Err(e) = sender.post(UiMessage::Shutdown) {
            log::debug!("Message loop already gone: {}", e);
        }
    })
}
