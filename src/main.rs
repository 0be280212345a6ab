use ringbuf::traits::Consumer;
use rhythm_playback::messaging::channels::NotificationSender;
use rhythm_playback::{
    CommandSink, EventPlayhead, MidiEvent, PlaybackClock, PlaybackConfig, PlaybackResult,
    Scheduling, TimedEvent, create_command_channel, create_notification_channel,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// Sized for a dense chart: a few hundred events per second with room to spare
const COMMAND_RINGBUFFER_CAPACITY: usize = 1024;
const NOTIFICATION_RINGBUFFER_CAPACITY: usize = 256;

/// C major scale, one note per 25 ticks, each held for 20 ticks
fn demo_chart() -> Vec<TimedEvent<MidiEvent>> {
    let scale = [60u8, 62, 64, 65, 67, 69, 71, 72];
    let mut events = Vec::with_capacity(scale.len() * 2);
    for (i, note) in scale.iter().enumerate() {
        let start = i as f64 * 25.0;
        events.push(TimedEvent::note_on(start, *note, 100));
        events.push(TimedEvent::note_off(start + 20.0, *note));
    }
    events
}

fn load_config() -> PlaybackResult<PlaybackConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => PlaybackConfig::load(Path::new(&path))?,
        None => PlaybackConfig {
            initial_leadup_ms: 500.0,
            ..Default::default()
        },
    };
    config.scheduling = Scheduling::Threaded;
    Ok(config)
}

fn run() -> PlaybackResult<()> {
    let config = load_config()?;
    log::info!(
        "tick length {}ms, leadup {}ms, speed {}x",
        config.tick_length_ms,
        config.initial_leadup_ms,
        config.playback_speed
    );

    let (command_tx, mut command_rx) = create_command_channel(COMMAND_RINGBUFFER_CAPACITY);
    let (notification_tx, mut notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    let notification_tx: NotificationSender = Arc::new(Mutex::new(notification_tx));

    let clock = PlaybackClock::from_config(&config)?;
    let playhead = EventPlayhead::new(demo_chart(), clock, CommandSink::new(command_tx))?;
    playhead.set_notification_sender(notification_tx);

    let started = Instant::now();
    let mut rewound = false;
    playhead.start();

    while playhead.pending_count() > 0 && started.elapsed() < Duration::from_secs(10) {
        while let Some(command) = command_rx.try_pop() {
            println!(
                "[{:>8.1} ms] {:?}",
                playhead.clock().current_time_ms(),
                command
            );
        }
        while let Some(notification) = notification_rx.try_pop() {
            eprintln!("{:?}: {}", notification.level, notification.message);
        }

        // Scrub back once halfway through to exercise the un-fire path
        if !rewound && playhead.fired_count() >= 8 {
            rewound = true;
            log::info!("rewinding to tick 0 at double speed");
            playhead.clock().overwrite_tick(0.0)?;
            playhead.clock().set_speed(config.playback_speed * 2.0)?;
        }

        thread::sleep(Duration::from_millis(5));
    }

    playhead.pause();
    while let Some(command) = command_rx.try_pop() {
        println!("[   pause  ] {:?}", command);
    }

    log::info!(
        "finished in {:.2}s at tick {:.1}",
        started.elapsed().as_secs_f64(),
        playhead.clock().current_tick()
    );
    playhead.dispose();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Rhythm Playback demo ===\n");

    if let Err(e) = run() {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
