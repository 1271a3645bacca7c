mod command;

use std::{
    io::{self, BufRead},
    process, thread,
};

use airwave_core::{
    audio::output::{AudioOutput, AudioSink, DefaultAudioOutput},
    backend::stream::StreamBackend,
    config::{Config, ConfigPaths},
    error::Error,
    player::{Player, PlayerCommand, PlayerEvent},
};
use crossbeam_channel::{select, unbounded, Receiver};
use env_logger::{Builder, Env};

use crate::command::{ConfAction, Input, Query, HELP};

#[cfg(not(feature = "cpal"))]
compile_error!("airwave-cli needs an audio output, enable the `cpal` feature");

const ENV_LOG: &str = "AIRWAVE_LOG";
const ENV_LOG_STYLE: &str = "AIRWAVE_LOG_STYLE";

fn main() {
    Builder::from_env(
        Env::new()
            .filter_or(ENV_LOG, "info")
            .write_style(ENV_LOG_STYLE),
    )
    .init();

    if let Err(err) = run() {
        log::error!("{}", err);
        process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let paths = ConfigPaths::default_location()
        .ok_or_else(|| Error::ConfigError("cannot find the config directory".into()))?;
    let output = DefaultAudioOutput::open()?;
    let backend = StreamBackend::new(output.sink());
    let mut player = Player::with_storage(Box::new(backend), paths)?;

    let input = spawn_input_thread();
    let events = player.receiver();
    player.autoplay();

    while player.is_running() {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else {
                    break;
                };
                print_notification(&event);
                player.handle(event);
            }
            recv(input) -> line => match line {
                Ok(input) => handle_input(&mut player, input),
                // Standard input is closed.
                Err(_) => player.shutdown(),
            }
        }
    }
    output.sink().close();

    Ok(())
}

fn spawn_input_thread() -> Receiver<Input> {
    let (sender, receiver) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match command::parse(&line) {
                Ok(input) => {
                    if sender.send(input).is_err() {
                        break;
                    }
                }
                Err(msg) => eprintln!("{msg}"),
            }
        }
    });
    receiver
}

fn handle_input(player: &mut Player, input: Input) {
    match input {
        Input::Command(mut cmd) => {
            resolve_station_number(player, &mut cmd);
            player.handle(PlayerEvent::Command(cmd));
        }
        Input::Show(query) => show(player, query),
        Input::Conf(action) => configure(player, action),
        Input::Help => println!("{HELP}"),
        Input::Nothing => {}
    }
}

/// Stations can be given by their position in `list`.
fn resolve_station_number(player: &Player, cmd: &mut PlayerCommand) {
    let station = match cmd {
        PlayerCommand::PlayStation { station }
        | PlayerCommand::Remove { station }
        | PlayerCommand::Rename { station, .. }
        | PlayerCommand::SetUri { station, .. }
        | PlayerCommand::Move { station, .. } => station,
        _ => return,
    };
    let Ok(number) = station.parse::<usize>() else {
        return;
    };
    let found = number
        .checked_sub(1)
        .and_then(|index| player.stations().get(index));
    if let Some(found) = found {
        *station = found.uid().to_string();
    }
}

fn show(player: &Player, query: Query) {
    match query {
        Query::List => {
            let current = player.current_station().map(|station| station.uid());
            for (index, station) in player.stations().iter().enumerate() {
                let marker = if Some(station.uid()) == current { '*' } else { ' ' };
                println!(
                    "{marker} {:>2}. {}  <{}>",
                    index + 1,
                    station.display_name(),
                    station.uri()
                );
            }
        }
        Query::Current => match player.current_station() {
            Some(station) => {
                println!("{} [{}]", station.display_name(), player.state());
                if let Some(metadata) = player.metadata() {
                    println!("  {metadata}");
                    if let Some(bitrate) = metadata.bitrate {
                        println!("  {bitrate} kbit/s");
                    }
                }
            }
            None => println!("no station"),
        },
        Query::Volume => println!("volume: {:.0}", player.volume() * 100.0),
        Query::Mute => println!("mute: {}", on_off(player.mute())),
        Query::Repeat => println!("repeat: {}", on_off(player.repeat())),
        Query::Shuffle => println!("shuffle: {}", on_off(player.shuffle())),
    }
}

fn configure(player: &mut Player, action: ConfAction) {
    let result = match action {
        ConfAction::Get(key) => player.config().get(&key).map(|value| println!("{value}")),
        ConfAction::Set(key, value) => player.set_config(&key, &value).map(|_| ()),
        ConfAction::ListKeys => {
            for key in Config::list_keys() {
                println!("{key}");
            }
            Ok(())
        }
        ConfAction::Describe(key) => Config::describe(&key).map(|text| println!("{text}")),
    };
    if let Err(err) = result {
        eprintln!("{err}");
    }
}

fn print_notification(event: &PlayerEvent) {
    match event {
        PlayerEvent::StateChanged { state } => println!("[{state}]"),
        PlayerEvent::StationChanged {
            station: Some(station),
        } => println!("station: {}", station.display_name()),
        PlayerEvent::MetadataChanged {
            metadata: Some(metadata),
        } => println!("now playing: {metadata}"),
        PlayerEvent::Error { error } => eprintln!("error: {error}"),
        _ => {}
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
