use serde::Serialize;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use vpiano::{resolve, LogAudio, Note, Piano, PianoConfig, PianoError, PlaybackState, Token};

const USAGE: &str = "\
Usage: vpiano [--config <file.yaml>] keys
       vpiano [--config <file.yaml>] decode <sheet-file | ->
       vpiano [--config <file.yaml>] play <sheet-file | -> [--bpm N]
       vpiano [--config <file.yaml>] record";

#[derive(Serialize)]
struct DecodedToken {
    #[serde(flatten)]
    token: Token,
    notes: Vec<Option<Note>>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let config_path = take_option(&mut args, "--config");
    let bpm = take_option(&mut args, "--bpm");

    let config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["keys"] => keys(&config),
        ["decode", path] => decode(&config, path),
        ["play", path] => play(&config, path, bpm.as_deref()).await,
        ["record"] => record(&config).await,
        _ => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Remove `flag <value>` from the argument list.
fn take_option(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let i = args.iter().position(|a| a == flag)?;
    if i + 1 >= args.len() {
        eprintln!("Missing value for {}", flag);
        eprintln!("{}", USAGE);
        process::exit(1);
    }
    let value = args.remove(i + 1);
    args.remove(i);
    Some(value)
}

fn load_config(path: Option<&str>) -> Result<PianoConfig, PianoError> {
    match path {
        Some(path) => PianoConfig::from_yaml(&fs::read_to_string(path)?),
        None => Ok(PianoConfig::default()),
    }
}

fn read_sheet(path: &str) -> Result<String, PianoError> {
    let text = if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        text
    } else {
        fs::read_to_string(path)?
    };
    // Line breaks are not part of the notation
    Ok(text.lines().collect())
}

fn keys(config: &PianoConfig) -> Result<(), PianoError> {
    let keymap = vpiano::KeyMap::build(&config.keymap)?;
    for binding in keymap.bindings() {
        println!("{}\t{}\t{}", binding.label, binding.note, binding.color);
    }
    Ok(())
}

fn decode(config: &PianoConfig, path: &str) -> Result<(), PianoError> {
    let keymap = vpiano::KeyMap::build(&config.keymap)?;
    let text = read_sheet(path)?;
    let tokens: Vec<DecodedToken> = resolve(&text, &keymap)
        .into_iter()
        .map(|(token, notes)| DecodedToken { token, notes })
        .collect();
    let json = serde_json::to_string_pretty(&tokens).map_err(io::Error::from)?;
    println!("{}", json);
    Ok(())
}

async fn play(config: &PianoConfig, path: &str, bpm: Option<&str>) -> Result<(), PianoError> {
    let piano = Piano::new(config, Arc::new(LogAudio))?;
    piano.replace_sheet(&read_sheet(path)?);

    if let Some(bpm) = bpm {
        piano.tempo_focus();
        if !piano.tempo_input(bpm) {
            log::warn!("ignoring tempo {:?}: digits only", bpm);
        }
        piano.tempo_commit();
    }

    let mut state = piano.playback().subscribe();
    piano.play();
    while *state.borrow_and_update() != PlaybackState::Idle {
        if state.changed().await.is_err() {
            break;
        }
    }
    Ok(())
}

async fn record(config: &PianoConfig) -> Result<(), PianoError> {
    let piano = Piano::new(config, Arc::new(LogAudio))?;
    let settle = config.chord_window() + Duration::from_millis(10);

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    // Every line is one burst of keys pressed together
    for line in input.lines() {
        let codes: Vec<(String, char)> = line
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| (format!("Key:{}", c), c))
            .collect();
        for (code, label) in &codes {
            piano.key_down(code, *label, false);
        }
        for (code, _) in &codes {
            piano.key_up(code);
        }
        tokio::time::sleep(settle).await;
    }
    piano.flush_chord();

    println!("{}", piano.sheet_text());
    Ok(())
}
