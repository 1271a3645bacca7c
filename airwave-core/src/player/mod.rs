mod saver;

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::{
    actor::ActorHandle,
    backend::{Backend, BackendEvent},
    config::{Config, ConfigKey, ConfigPaths},
    engine::{Engine, EngineEvent, EngineState},
    error::Error,
    metadata::Metadata,
    playlist,
    station::{Station, StationUid},
    station_list::StationList,
    util::default_ureq_agent,
};

use self::saver::{SaveMsg, Saver};

/// What the user asked for, as opposed to what the engine is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wish {
    Play,
    Stop,
}

pub struct Player {
    engine: Engine,
    stations: StationList,
    current: Option<StationUid>,
    /// Index into the stream URIs of the current station.
    stream_index: usize,
    /// Playlist download in flight, as (station, playlist uri).
    downloading: Option<(StationUid, String)>,
    wish: Wish,
    config: Config,
    agent: ureq::Agent,
    saver: Option<ActorHandle<SaveMsg>>,
    running: bool,
    sender: Sender<PlayerEvent>,
    receiver: Receiver<PlayerEvent>,
}

impl Player {
    /// Player without persistence.
    pub fn new(backend: Box<dyn Backend>, config: Config, stations: StationList) -> Self {
        let (sender, receiver) = unbounded();
        let mut engine = Engine::new(backend, sender.clone());
        engine.set_volume(config.volume);
        engine.set_mute(config.mute);
        Self {
            engine,
            stations,
            current: None,
            stream_index: 0,
            downloading: None,
            wish: Wish::Stop,
            config,
            agent: default_ureq_agent(),
            saver: None,
            running: true,
            sender,
            receiver,
        }
    }

    /// Player that loads its config and stations from `paths`, and saves them
    /// back there on change.  A broken config is replaced by the defaults, but
    /// a broken station list is an error, so it never gets overwritten.
    pub fn with_storage(backend: Box<dyn Backend>, paths: ConfigPaths) -> Result<Self, Error> {
        let config = Config::load_or_default(&paths.config_file);
        let stations = StationList::load(&paths.stations_file)?;
        log::info!("loaded {} stations", stations.len());
        let mut player = Self::new(backend, config, stations);
        player.saver = Some(Saver::start(paths));
        Ok(player)
    }

    pub fn sender(&self) -> Sender<PlayerEvent> {
        self.sender.clone()
    }

    pub fn receiver(&self) -> Receiver<PlayerEvent> {
        self.receiver.clone()
    }

    /// False once `Quit` was handled.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn handle(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Command(cmd) => {
                self.handle_command(cmd);
            }
            PlayerEvent::PlaylistDownloaded {
                station,
                uri,
                result,
            } => {
                self.handle_playlist_downloaded(station, uri, result);
            }
            PlayerEvent::Backend(event) => {
                self.handle_backend(event);
            }
            PlayerEvent::StateChanged { .. }
            | PlayerEvent::StationChanged { .. }
            | PlayerEvent::MetadataChanged { .. }
            | PlayerEvent::StationListChanged
            | PlayerEvent::RepeatChanged { .. }
            | PlayerEvent::ShuffleChanged { .. }
            | PlayerEvent::VolumeChanged { .. }
            | PlayerEvent::MuteChanged { .. }
            | PlayerEvent::Error { .. } => {}
        };
    }

    fn handle_command(&mut self, cmd: PlayerCommand) {
        let result = match cmd {
            PlayerCommand::Play => {
                self.play();
                Ok(())
            }
            PlayerCommand::PlayStation { station } => self
                .lookup(&station)
                .map(|uid| self.play_station(&uid)),
            PlayerCommand::Stop => {
                self.stop();
                Ok(())
            }
            PlayerCommand::Toggle => {
                self.toggle();
                Ok(())
            }
            PlayerCommand::Next => {
                self.next();
                Ok(())
            }
            PlayerCommand::Previous => {
                self.previous();
                Ok(())
            }
            PlayerCommand::Add {
                uri,
                name,
                position,
            } => {
                self.add(uri, name, position);
                Ok(())
            }
            PlayerCommand::Remove { station } => self.lookup(&station).map(|uid| {
                self.remove(&uid);
            }),
            PlayerCommand::Rename { station, name } => self
                .lookup(&station)
                .map(|uid| self.rename(&uid, name)),
            PlayerCommand::SetUri { station, uri } => self
                .lookup(&station)
                .map(|uid| self.set_uri(&uid, uri)),
            PlayerCommand::Move { station, position } => self
                .lookup(&station)
                .map(|uid| self.move_station(&uid, position)),
            PlayerCommand::SetRepeat { repeat } => {
                self.set_repeat(repeat);
                Ok(())
            }
            PlayerCommand::SetShuffle { shuffle } => {
                self.set_shuffle(shuffle);
                Ok(())
            }
            PlayerCommand::SetVolume { volume } => {
                self.set_volume(volume);
                Ok(())
            }
            PlayerCommand::SetMute { mute } => {
                self.set_mute(mute);
                Ok(())
            }
            PlayerCommand::Quit => {
                self.shutdown();
                Ok(())
            }
        };
        if let Err(err) = result {
            log::warn!("command failed: {}", err);
            self.notify(PlayerEvent::Error { error: err });
        }
    }

    fn handle_backend(&mut self, event: BackendEvent) {
        match self.engine.handle_backend(event) {
            Some(EngineEvent::Failed(err)) => {
                self.notify(PlayerEvent::Error { error: err });
                self.stop();
            }
            Some(EngineEvent::EndOfStream) => {
                self.advance_stream();
            }
            None => {}
        }
    }

    fn handle_playlist_downloaded(
        &mut self,
        uid: StationUid,
        uri: String,
        result: Result<Vec<String>, Error>,
    ) {
        if self.downloading.as_ref() == Some(&(uid.clone(), uri.clone())) {
            self.downloading = None;
        }
        let is_current = self.current.as_ref() == Some(&uid);
        let Some(station) = self.stations.find_mut(&uid) else {
            log::info!("station removed while downloading its playlist, ignoring");
            return;
        };
        if station.uri() != uri {
            log::info!("station changed while downloading its playlist, ignoring");
            return;
        }
        let error = match result {
            Ok(stream_uris) if stream_uris.is_empty() => Error::PlaylistEmpty,
            Ok(stream_uris) => {
                log::info!(
                    "{} resolved to {} streams",
                    station.display_name(),
                    stream_uris.len()
                );
                station.set_stream_uris(stream_uris);
                if is_current && self.wish == Wish::Play {
                    self.start_current();
                }
                return;
            }
            Err(err) => err,
        };
        log::error!("failed to resolve {}: {}", uri, error);
        self.notify(PlayerEvent::Error { error });
        if is_current {
            self.stop();
        }
    }

    /// Start the current station, or the first one if there is none.
    pub fn play(&mut self) {
        self.wish = Wish::Play;
        if self.current_station().is_none() {
            match self.stations.first().map(|station| station.uid().clone()) {
                Some(uid) => self.set_current(Some(uid)),
                None => {
                    log::warn!("no stations to play");
                    return;
                }
            }
        }
        self.engine.stop();
        self.start_current();
    }

    pub fn play_station(&mut self, uid: &StationUid) {
        if self.stations.find(uid).is_none() {
            log::warn!("cannot play unknown station {}", uid);
            return;
        }
        self.set_current(Some(uid.clone()));
        self.play();
    }

    pub fn stop(&mut self) {
        self.wish = Wish::Stop;
        self.engine.stop();
    }

    pub fn toggle(&mut self) {
        match self.wish {
            Wish::Play => self.stop(),
            Wish::Stop => self.play(),
        }
    }

    pub fn next(&mut self) {
        let next = self
            .stations
            .next(self.current.as_ref(), self.config.repeat, self.config.shuffle)
            .map(|station| station.uid().clone());
        self.go_to(next);
    }

    pub fn previous(&mut self) {
        let prev = self
            .stations
            .prev(self.current.as_ref(), self.config.repeat, self.config.shuffle)
            .map(|station| station.uid().clone());
        self.go_to(prev);
    }

    fn go_to(&mut self, uid: Option<StationUid>) {
        let Some(uid) = uid else {
            log::info!("no station in that direction");
            return;
        };
        self.set_current(Some(uid));
        if self.wish == Wish::Play {
            self.engine.stop();
            self.start_current();
        }
    }

    /// Start playing the station played last, if so configured.
    pub fn autoplay(&mut self) {
        if !self.config.autoplay {
            return;
        }
        let last = self
            .config
            .last_station
            .as_deref()
            .and_then(|uri| self.stations.find_by_uri(uri))
            .map(|station| station.uid().clone());
        match last {
            Some(uid) => {
                log::info!("autoplay");
                self.play_station(&uid);
            }
            None => log::info!("autoplay enabled, but the last station is gone"),
        }
    }

    /// Add a station at `position`, or at the end.
    pub fn add(&mut self, uri: String, name: Option<String>, position: Option<usize>) -> StationUid {
        let station = Station::new(name, uri);
        log::info!("adding station {}", station);
        let uid = match position {
            Some(position) => self.stations.insert(position, station),
            None => self.stations.append(station),
        };
        self.stations_changed();
        uid
    }

    pub fn remove(&mut self, uid: &StationUid) -> Option<Station> {
        if self.current.as_ref() == Some(uid) {
            self.stop();
            self.set_current(None);
        }
        let removed = self.stations.remove(uid)?;
        log::info!("removed station {}", removed);
        self.stations_changed();
        Some(removed)
    }

    pub fn rename(&mut self, uid: &StationUid, name: Option<String>) {
        let Some(station) = self.stations.find_mut(uid) else {
            return;
        };
        station.set_name(name);
        self.stations_changed();
        if self.current.as_ref() == Some(uid) {
            self.notify_station();
        }
    }

    /// Point a station to a new URI.  The current station restarts if it is
    /// supposed to be playing.
    pub fn set_uri(&mut self, uid: &StationUid, uri: String) {
        let Some(station) = self.stations.find_mut(uid) else {
            return;
        };
        if station.uri() == uri {
            return;
        }
        station.set_uri(uri);
        self.stations_changed();
        if self.current.as_ref() == Some(uid) {
            self.remember_current();
            self.notify_station();
            if self.wish == Wish::Play {
                self.play();
            }
        }
    }

    pub fn move_station(&mut self, uid: &StationUid, position: usize) {
        if self.stations.move_to(uid, position) {
            self.stations_changed();
        }
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        if self.config.repeat != repeat {
            self.config.repeat = repeat;
            self.notify(PlayerEvent::RepeatChanged { repeat });
            self.config_changed();
        }
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        if self.config.shuffle != shuffle {
            self.config.shuffle = shuffle;
            self.notify(PlayerEvent::ShuffleChanged { shuffle });
            self.config_changed();
        }
    }

    /// Change playback volume to a value in 0.0..=1.0 range.
    pub fn set_volume(&mut self, volume: f64) {
        if self.engine.set_volume(volume) {
            self.config.volume = self.engine.volume();
            self.notify(PlayerEvent::VolumeChanged {
                volume: self.config.volume,
            });
            self.config_changed();
        }
    }

    pub fn set_mute(&mut self, mute: bool) {
        if self.engine.set_mute(mute) {
            self.config.mute = mute;
            self.notify(PlayerEvent::MuteChanged { mute });
            self.config_changed();
        }
    }

    /// Set a config value by name, applying it right away.
    pub fn set_config(&mut self, key: &str, value: &str) -> Result<ConfigKey, Error> {
        let mut config = self.config.clone();
        let key = config.set(key, value)?;
        match key {
            ConfigKey::Repeat => self.set_repeat(config.repeat),
            ConfigKey::Shuffle => self.set_shuffle(config.shuffle),
            ConfigKey::Volume => self.set_volume(config.volume),
            ConfigKey::Mute => self.set_mute(config.mute),
            ConfigKey::Autoplay | ConfigKey::LastStation => {
                self.config = config;
                self.config_changed();
            }
        }
        Ok(key)
    }

    /// Stop playback and write out pending changes.
    pub fn shutdown(&mut self) {
        log::info!("shutting down");
        self.running = false;
        self.stop();
        if let Some(saver) = self.saver.take() {
            saver.join();
        }
    }

    pub fn stations(&self) -> &StationList {
        &self.stations
    }

    pub fn current_station(&self) -> Option<&Station> {
        self.current.as_ref().and_then(|uid| self.stations.find(uid))
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.state() == EngineState::Playing
    }

    pub fn wish(&self) -> Wish {
        self.wish
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.engine.metadata()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repeat(&self) -> bool {
        self.config.repeat
    }

    pub fn shuffle(&self) -> bool {
        self.config.shuffle
    }

    pub fn volume(&self) -> f64 {
        self.engine.volume()
    }

    pub fn mute(&self) -> bool {
        self.engine.mute()
    }

    fn lookup(&self, text: &str) -> Result<StationUid, Error> {
        self.stations
            .guess(text)
            .map(|station| station.uid().clone())
            .ok_or_else(|| Error::StationNotFound(text.to_owned()))
    }

    /// Play the current station, resolving its stream URIs first if needed.
    fn start_current(&mut self) {
        let Some(uid) = self.current.clone() else {
            return;
        };
        let Some(station) = self.stations.find_mut(&uid) else {
            return;
        };
        self.stream_index = 0;
        if station.stream_uris().is_empty() && !station.playlist_format().is_playlist() {
            let uri = station.uri().to_owned();
            station.set_stream_uris(vec![uri]);
        }
        if let Some(stream_uri) = station.first_stream_uri() {
            let stream_uri = stream_uri.to_owned();
            self.engine.play(&stream_uri);
            return;
        }

        let uri = station.uri().to_owned();
        let download = (uid, uri);
        if self.downloading.as_ref() == Some(&download) {
            log::debug!("playlist download already in progress");
            return;
        }
        self.downloading = Some(download.clone());
        thread::spawn({
            let (station, uri) = download;
            let sender = self.sender.clone();
            let agent = self.agent.clone();
            move || {
                let result = playlist::resolve(&agent, &uri);
                let _ = sender.send(PlayerEvent::PlaylistDownloaded {
                    station,
                    uri,
                    result,
                });
            }
        });
    }

    /// The stream ended, continue with the next stream of the station.
    fn advance_stream(&mut self) {
        let next = self.current_station().and_then(|station| {
            station
                .stream_uris()
                .get(self.stream_index + 1)
                .map(String::to_owned)
        });
        match next {
            Some(stream_uri) if self.wish == Wish::Play => {
                self.stream_index += 1;
                log::info!("continuing with stream {}", stream_uri);
                self.engine.play(&stream_uri);
            }
            _ => {
                log::info!("no more streams, stopping");
                self.stop();
            }
        }
    }

    fn set_current(&mut self, uid: Option<StationUid>) {
        if self.current == uid {
            return;
        }
        self.current = uid;
        self.stream_index = 0;
        self.remember_current();
        self.notify_station();
    }

    fn remember_current(&mut self) {
        let Some(uri) = self.current_station().map(|station| station.uri().to_owned()) else {
            return;
        };
        if self.config.last_station.as_deref() != Some(uri.as_str()) {
            self.config.last_station = Some(uri);
            self.config_changed();
        }
    }

    fn notify_station(&self) {
        self.notify(PlayerEvent::StationChanged {
            station: self.current_station().cloned(),
        });
    }

    fn stations_changed(&mut self) {
        self.notify(PlayerEvent::StationListChanged);
        if let Some(saver) = &self.saver {
            let _ = saver.send(SaveMsg::Stations(self.stations.clone()));
        }
    }

    fn config_changed(&mut self) {
        if let Some(saver) = &self.saver {
            let _ = saver.send(SaveMsg::Config(self.config.clone()));
        }
    }

    fn notify(&self, event: PlayerEvent) {
        if self.sender.send(event).is_err() {
            log::warn!("player channel closed, dropping notification");
        }
    }
}

#[derive(Debug)]
pub enum PlayerCommand {
    Play,
    /// Stations are named by uid, name, or URI.
    PlayStation {
        station: String,
    },
    Stop,
    Toggle,
    Next,
    Previous,
    Add {
        uri: String,
        name: Option<String>,
        /// Index to insert at, the end if missing.
        position: Option<usize>,
    },
    Remove {
        station: String,
    },
    Rename {
        station: String,
        name: Option<String>,
    },
    SetUri {
        station: String,
        uri: String,
    },
    Move {
        station: String,
        position: usize,
    },
    SetRepeat {
        repeat: bool,
    },
    SetShuffle {
        shuffle: bool,
    },
    /// Change playback volume to a value in 0.0..=1.0 range.
    SetVolume {
        volume: f64,
    },
    SetMute {
        mute: bool,
    },
    Quit,
}

#[derive(Debug)]
pub enum PlayerEvent {
    Command(PlayerCommand),
    /// Result of a background playlist download.
    PlaylistDownloaded {
        station: StationUid,
        uri: String,
        result: Result<Vec<String>, Error>,
    },
    Backend(BackendEvent),
    /// Engine state changed.
    StateChanged {
        state: EngineState,
    },
    /// A different station became current, or the current one was edited.
    StationChanged {
        station: Option<Station>,
    },
    MetadataChanged {
        metadata: Option<Metadata>,
    },
    StationListChanged,
    RepeatChanged {
        repeat: bool,
    },
    ShuffleChanged {
        shuffle: bool,
    },
    VolumeChanged {
        volume: f64,
    },
    MuteChanged {
        mute: bool,
    },
    Error {
        error: Error,
    },
}
