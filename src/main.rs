use std::env;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use deckplay::config::Config;
use deckplay::playback::{CpalMediaSource, CpalSourceOptions, PlaybackHandle, PlaybackService};
use deckplay::ui::NowPlayingView;

/// One line of stdin input
#[derive(Debug, PartialEq)]
enum Input {
    TogglePlay,
    Seek(f64),
    Volume(f64),
    Mute,
    Repeat,
    Shuffle,
    Like,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut parts = line.split_whitespace();
    let input = match parts.next()? {
        "p" => Input::TogglePlay,
        "s" => Input::Seek(parts.next()?.parse().ok()?),
        "v" => Input::Volume(parts.next()?.parse().ok()?),
        "m" => Input::Mute,
        "r" => Input::Repeat,
        "h" => Input::Shuffle,
        "l" => Input::Like,
        "q" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

fn apply_input(playback: &PlaybackHandle, input: Input) {
    match input {
        Input::TogglePlay => playback.toggle_play_pause(),
        Input::Seek(seconds) => playback.seek(seconds),
        Input::Volume(level) => playback.set_volume(level),
        Input::Mute => playback.toggle_mute(),
        Input::Repeat => playback.toggle_repeat(),
        Input::Shuffle => playback.toggle_shuffle(),
        Input::Like => playback.toggle_liked(),
        Input::Quit => {}
    }
}

fn print_view(view: &NowPlayingView) {
    match serde_json::to_string(view) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize state: {}", e),
    }
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    // Logs go to stderr so stdout stays machine readable
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = env::args().collect();
    let track_path = match args.get(1).map(String::as_str) {
        Some("-h") | Some("--help") => {
            print_usage(&args[0]);
            return;
        }
        Some(path) => PathBuf::from(path),
        None => match config.track_path.clone() {
            Some(path) => path,
            None => {
                error!("No track given and DECKPLAY_TRACK_PATH is not set");
                print_usage(&args[0]);
                std::process::exit(1);
            }
        },
    };

    info!("Playing {}", track_path.display());

    let source = CpalMediaSource::open(&track_path, CpalSourceOptions::from(&config));
    let playback = PlaybackService::start(
        source,
        config.track.clone(),
        tokio::runtime::Handle::current(),
    );

    let mut subscription = match playback.watch().await {
        Ok((state, subscription)) => {
            print_view(&NowPlayingView::from_state(&state));
            subscription
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let printer = tokio::spawn(async move {
        while let Some(state) = subscription.recv().await {
            print_view(&NowPlayingView::from_state(&state));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_input(&line) {
                Some(Input::Quit) => break,
                Some(input) => apply_input(&playback, input),
                None => warn!("Unknown command: {:?}", line.trim()),
            },
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }

    if let Err(e) = playback.shutdown().await {
        warn!("Shutdown: {}", e);
    }
    let _ = printer.await;
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [PATH]", program);
    eprintln!();
    eprintln!("Plays PATH (or DECKPLAY_TRACK_PATH) and prints one JSON line per state change.");
    eprintln!();
    eprintln!("Commands on stdin:");
    eprintln!("  p          - play/pause");
    eprintln!("  s <secs>   - seek");
    eprintln!("  v <0..1>   - volume");
    eprintln!("  m          - mute/unmute");
    eprintln!("  r          - repeat on/off");
    eprintln!("  h          - shuffle on/off");
    eprintln!("  l          - like/unlike");
    eprintln!("  q          - quit");
}
