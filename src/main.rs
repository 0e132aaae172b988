use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use cadence_coach::sequencer::ScheduledClick;
use cadence_coach::{
    AudioClock, ClickSink, CoachConfig, CoachSession, ConfigError, DirectoryAssetProvider,
    HostClock, MixBus, OutputStream, create_click_channel,
};

// Sized for several seconds of beats at 300 BPM; the scheduler only commits
// 100ms ahead, so the audio callback drains it long before it fills
const CLICK_RINGBUFFER_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Click sink used without an output device
struct LoggedClicks;

impl ClickSink for LoggedClicks {
    fn commit(&mut self, click: ScheduledClick) {
        log::debug!("{:?} click at {:.3}s", click.kind, click.at);
    }
}

/// Stand-in for the device callback: keeps the music bus consuming its
/// commands, with the rendered audio discarded
fn spawn_discarding_render(
    runtime: &tokio::runtime::Runtime,
    bus: MixBus,
    clock: Arc<dyn AudioClock>,
) {
    const SAMPLE_RATE: f64 = 48000.0;
    const BLOCK: Duration = Duration::from_millis(50);

    runtime.spawn(async move {
        let mut scratch = vec![0.0f32; (SAMPLE_RATE * BLOCK.as_secs_f64()) as usize * 2];
        let mut ticker = tokio::time::interval(BLOCK);
        loop {
            ticker.tick().await;
            scratch.fill(0.0);
            bus.render(&mut scratch, 2, clock.now(), SAMPLE_RATE);
            if bus.is_released() {
                break;
            }
        }
    });
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            CoachConfig::load(path)?
        }
        None => CoachConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let music_output = MixBus::new();
    let (click_tx, click_rx) = create_click_channel(CLICK_RINGBUFFER_CAPACITY);

    // Without a device the host clock stands in and clicks are only logged
    let (_output, clock, clicks) =
        match OutputStream::open(click_rx, config.scheduler.click_volume, music_output.clone()) {
            Ok(output) => {
                let clock: Arc<dyn AudioClock> = Arc::new(output.clock());
                let clicks: Box<dyn ClickSink> = Box::new(click_tx);
                (Some(output), clock, clicks)
            }
            Err(e) => {
                log::warn!("No audio output ({}), running on the host clock", e);
                let clock: Arc<dyn AudioClock> = Arc::new(HostClock::new());
                let clicks: Box<dyn ClickSink> = Box::new(LoggedClicks);
                spawn_discarding_render(&runtime, music_output.clone(), Arc::clone(&clock));
                (None, clock, clicks)
            }
        };

    let provider = DirectoryAssetProvider::from_config(&config.assets);
    log::info!("Music loops from {}", provider.directory().display());

    let session = CoachSession::new(
        &config,
        provider,
        clock,
        clicks,
        music_output,
        runtime.handle().clone(),
    );

    println!("=== Cadence Coach ===");
    println!("Commands: <bpm> [delay_s] | music <bpm> | start | stop | status | quit\n");

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();

        match words.next() {
            None => continue,
            Some("quit") | Some("exit") => break,
            Some("start") => session.beats().start(),
            Some("stop") => session.stop(),
            Some("status") => {
                let music = session.music();
                println!(
                    "metronome: {} ({}), music: {} [{}], pending: {:?}",
                    session.beats().current_tempo(),
                    if session.beats().is_running() { "running" } else { "stopped" },
                    music
                        .current_tempo()
                        .map_or_else(|| "none".to_string(), |bpm| bpm.to_string()),
                    music.phase(),
                    music.pending_tempo(),
                );
            }
            Some("music") => {
                let Some(bpm) = words.next().and_then(|w| w.parse::<i32>().ok()) else {
                    println!("usage: music <bpm>");
                    continue;
                };
                match runtime.block_on(session.music().set_tempo(bpm)) {
                    Ok(outcome) => println!("music {}: {:?}", bpm, outcome),
                    Err(e) => println!("music {}: {}", bpm, e),
                }
            }
            Some(word) => {
                let Ok(bpm) = word.parse::<i32>() else {
                    println!("unknown command: {}", word);
                    continue;
                };
                let delay = words.next().and_then(|w| w.parse::<f64>().ok()).unwrap_or(0.0);
                match runtime.block_on(session.set_tempo(bpm, delay)) {
                    Ok(outcome) => println!("tempo {}: {:?}", bpm, outcome),
                    Err(e) => println!("tempo {}: {}", bpm, e),
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}
