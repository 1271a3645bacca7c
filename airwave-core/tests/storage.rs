use std::{
    fs,
    sync::{Arc, Mutex},
};

use airwave_core::{
    backend::{Backend, Reporter},
    config::{Config, ConfigPaths},
    player::{Player, PlayerCommand, PlayerEvent, Wish},
    station_list::StationList,
};

/// Backend that only remembers the URIs it was asked to play.
#[derive(Clone, Default)]
struct SilentBackend {
    played: Arc<Mutex<Vec<String>>>,
}

impl Backend for SilentBackend {
    fn play(&mut self, uri: &str, _reporter: Reporter) {
        self.played.lock().unwrap().push(uri.to_owned());
    }

    fn stop(&mut self) {}

    fn set_volume(&mut self, _volume: f32) {}
}

fn command(player: &mut Player, cmd: PlayerCommand) {
    player.handle(PlayerEvent::Command(cmd));
}

#[test]
fn first_start_uses_default_stations() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    let mut player = Player::with_storage(Box::new(SilentBackend::default()), paths.clone()).unwrap();
    assert!(!player.stations().is_empty());

    command(&mut player, PlayerCommand::Quit);
    assert!(!player.is_running());
    // Nothing changed, so nothing was written.
    assert!(!paths.stations_file.exists());
    assert!(!paths.config_file.exists());
}

#[test]
fn edits_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    fs::write(
        &paths.stations_file,
        "<Stations><Station><name>One</name><uri>http://one.invalid/stream</uri></Station></Stations>",
    )
    .unwrap();

    let backend = SilentBackend::default();
    let mut player = Player::with_storage(Box::new(backend.clone()), paths.clone()).unwrap();
    command(
        &mut player,
        PlayerCommand::Add {
            uri: "http://two.invalid/stream".into(),
            name: Some("Two".into()),
            position: None,
        },
    );
    command(
        &mut player,
        PlayerCommand::Move {
            station: "Two".into(),
            position: 0,
        },
    );
    command(&mut player, PlayerCommand::SetShuffle { shuffle: true });
    command(&mut player, PlayerCommand::SetVolume { volume: 0.4 });
    command(
        &mut player,
        PlayerCommand::PlayStation {
            station: "http://one.invalid/stream".into(),
        },
    );
    assert_eq!(player.wish(), Wish::Play);
    command(&mut player, PlayerCommand::Quit);

    assert_eq!(
        *backend.played.lock().unwrap(),
        vec!["http://one.invalid/stream".to_string()]
    );

    let stations = StationList::load(&paths.stations_file).unwrap();
    let names: Vec<_> = stations.iter().map(|s| s.display_name().to_owned()).collect();
    assert_eq!(names, vec!["Two", "One"]);

    let config = Config::load(&paths.config_file).unwrap();
    assert!(config.shuffle);
    assert_eq!(config.volume, 0.4);
    assert_eq!(
        config.last_station.as_deref(),
        Some("http://one.invalid/stream")
    );
}

#[test]
fn autoplay_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());

    let mut player = Player::with_storage(Box::new(SilentBackend::default()), paths.clone()).unwrap();
    let last = player.stations().last().unwrap().uid().clone();
    player.play_station(&last);
    player.set_config("autoplay", "true").unwrap();
    player.shutdown();

    let backend = SilentBackend::default();
    let mut player = Player::with_storage(Box::new(backend.clone()), paths).unwrap();
    player.autoplay();
    let current = player.current_station().unwrap().uri().to_owned();
    assert_eq!(current, player.stations().last().unwrap().uri());
    player.shutdown();
}

#[test]
fn broken_station_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ConfigPaths::in_dir(dir.path());
    let broken = "<Stations><Station><uri>http://x/</name></Station></Stations>";
    fs::write(&paths.stations_file, broken).unwrap();
    fs::write(&paths.config_file, "not json").unwrap();

    assert!(Player::with_storage(Box::new(SilentBackend::default()), paths.clone()).is_err());
    // The broken file is left alone.
    assert_eq!(fs::read_to_string(&paths.stations_file).unwrap(), broken);
}
