use std::{path::Path, time::Duration};

use crate::{
    actor::{Act, Actor, ActorHandle},
    config::{Config, ConfigPaths},
    error::Error,
    station_list::StationList,
};

/// Quiet period after the last change before anything is written.
const SAVE_DELAY: Duration = Duration::from_millis(500);

pub enum SaveMsg {
    Config(Config),
    Stations(StationList),
    Flush,
}

/// Writes snapshots of the config and the station list to disk, coalescing
/// bursts of changes into one write.  Pending snapshots are written when all
/// senders are gone.
pub struct Saver {
    paths: ConfigPaths,
    config: Option<Config>,
    stations: Option<StationList>,
}

impl Saver {
    pub fn start(paths: ConfigPaths) -> ActorHandle<SaveMsg> {
        Self::spawn_default("saver", move |_| Self {
            paths,
            config: None,
            stations: None,
        })
    }

    fn flush(&mut self) {
        if let Some(config) = self.config.take() {
            report(&self.paths.config_file, config.save(&self.paths.config_file));
        }
        if let Some(stations) = self.stations.take() {
            report(
                &self.paths.stations_file,
                stations.save(&self.paths.stations_file),
            );
        }
    }
}

fn report(path: &Path, result: Result<(), Error>) {
    if let Err(err) = result {
        log::error!("failed to save {:?}: {}", path, err);
    }
}

impl Actor for Saver {
    type Message = SaveMsg;
    type Error = Error;

    fn handle(&mut self, msg: SaveMsg) -> Result<Act<Self>, Self::Error> {
        match msg {
            SaveMsg::Config(config) => self.config = Some(config),
            SaveMsg::Stations(stations) => self.stations = Some(stations),
            SaveMsg::Flush => {
                self.flush();
                return Ok(Act::Continue);
            }
        }
        Ok(Act::WaitOr {
            timeout: SAVE_DELAY,
            timeout_msg: SaveMsg::Flush,
        })
    }

    fn finish(&mut self) {
        self.flush();
    }
}
