use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::playlist::PlaylistFormat;

/// Process-unique station identifier.  Never persisted, stations get a fresh
/// one every time they are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationUid(String);

impl StationUid {
    fn generate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(format!("station-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Station {
    uid: StationUid,
    name: Option<String>,
    uri: String,
    stream_uris: Vec<String>,
}

impl Station {
    pub fn new(name: Option<String>, uri: impl Into<String>) -> Self {
        Self {
            uid: StationUid::generate(),
            name: name.filter(|name| !name.trim().is_empty()),
            uri: uri.into(),
            stream_uris: Vec::new(),
        }
    }

    pub fn uid(&self) -> &StationUid {
        &self.uid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.filter(|name| !name.trim().is_empty());
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Point the station somewhere else.  Previously resolved streams belong to
    /// the old URI, so they are dropped.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        let uri = uri.into();
        if uri != self.uri {
            self.uri = uri;
            self.stream_uris.clear();
        }
    }

    /// Name if the station has one, URI otherwise.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(&self.uri)
    }

    pub fn stream_uris(&self) -> &[String] {
        &self.stream_uris
    }

    pub fn set_stream_uris(&mut self, stream_uris: Vec<String>) {
        self.stream_uris = stream_uris;
    }

    pub fn first_stream_uri(&self) -> Option<&str> {
        self.stream_uris.first().map(String::as_str)
    }

    pub fn playlist_format(&self) -> PlaylistFormat {
        PlaylistFormat::from_uri(&self.uri)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_unique() {
        let a = Station::new(None, "http://a");
        let b = Station::new(None, "http://a");
        assert_ne!(a.uid(), b.uid());
    }

    #[test]
    fn changing_uri_drops_resolved_streams() {
        let mut station = Station::new(Some("Groove".into()), "http://a/list.pls");
        station.set_stream_uris(vec!["http://a/stream".into()]);

        station.set_uri("http://a/list.pls");
        assert_eq!(station.stream_uris().len(), 1);

        station.set_uri("http://b/list.m3u");
        assert!(station.stream_uris().is_empty());
    }

    #[test]
    fn blank_name_falls_back_to_uri() {
        let station = Station::new(Some("  ".into()), "http://a/stream");
        assert_eq!(station.name(), None);
        assert_eq!(station.display_name(), "http://a/stream");
    }
}
