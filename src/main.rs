use drone_sequencer::engine::NodeKind;
use drone_sequencer::{
    EffectKind, HeadlessEngine, Session, SessionConfig, SessionError, TrackId,
};
use ringbuf::traits::Consumer;
use std::sync::Arc;

// Virtual playback length and edit point of the demo run, in seconds
const PLAY_SECONDS: f64 = 30.0;
const EDIT_AT_SECONDS: f64 = 12.0;
const STEP_SECONDS: f64 = 0.5;

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Drone Sequencer ===");
    println!("Version 0.1.0 - headless engine\n");

    let config = match std::env::args().nth(1) {
        Some(path) => match SessionConfig::load(&path) {
            Ok(config) => {
                println!("Configuration loaded from {}", path);
                config
            }
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return;
            }
        },
        None => SessionConfig::default(),
    };

    let engine = HeadlessEngine::new();
    let (mut session, mut notifications) = Session::new(Arc::new(engine.clone()), config);

    if let Err(e) = run(&mut session, &engine) {
        eprintln!("ERROR: {}", e);
    }

    while let Some(notification) = notifications.try_pop() {
        println!(
            "[{:?}/{:?}] {}",
            notification.level, notification.category, notification.message
        );
    }
}

fn run(session: &mut Session, engine: &HeadlessEngine) -> Result<(), SessionError> {
    let drone = session.add_track()?;
    let pad = session.add_track()?;

    let filter = session.add_effect(drone, EffectKind::AutoFilter)?;
    session.add_effect(drone, EffectKind::Reverb)?;
    session.add_effect(pad, EffectKind::Delay)?;
    session.set_scale(pad, "A", 3, "minor pentatonic")?;

    for track in session.track_ids() {
        print_routing(session, engine, track);
    }

    session.set_playing(true)?;
    println!("\nPlaying for {} virtual seconds...", PLAY_SECONDS);

    let mut elapsed = 0.0;
    while elapsed < PLAY_SECONDS {
        engine.advance(STEP_SECONDS);
        elapsed += STEP_SECONDS;

        if (elapsed - EDIT_AT_SECONDS).abs() < f64::EPSILON {
            session.set_module_field(drone, &filter, "options.frequency", 0.5)?;
            session.set_track_field(pad, "interval", 4.0)?;
            println!("Edited filter rate and pad interval at {}s", elapsed);
        }
    }

    session.set_playing(false)?;

    for track in session.track_ids() {
        let Some(voice) = session.audio(track).and_then(|a| a.voice()) else {
            continue;
        };
        let notes = engine.notes(voice.id());
        let sounding = notes.iter().filter(|n| n.is_active(engine.now())).count();
        println!(
            "Track {}: {} notes scheduled, {} still sounding",
            track,
            notes.len(),
            sounding
        );
    }

    println!("\nSaved tracks:\n{}", session.encode_tracks()?);
    Ok(())
}

fn print_routing(session: &Session, engine: &HeadlessEngine, track: TrackId) {
    let Some(voice) = session.audio(track).and_then(|a| a.voice()) else {
        return;
    };
    let route: Vec<String> = engine
        .chain_kinds(voice.id())
        .iter()
        .map(NodeKind::to_string)
        .collect();

    let scale = session
        .track(track)
        .map(|t| t.composition.notes.scale_name.clone())
        .unwrap_or_default();
    println!("Track {} ({}): {}", track, scale, route.join(" -> "));
}
