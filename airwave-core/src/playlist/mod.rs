mod asx;
mod m3u;
mod pls;
mod xspf;

use std::fs;

use url::Url;

use crate::error::Error;

/// Upper bound on the size of a playlist file.  Anything bigger is certainly
/// not a playlist, most likely the audio stream itself.
const MAX_PLAYLIST_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    M3u,
    Pls,
    Asx,
    Xspf,
    /// Not a playlist, the URI points to the stream directly.
    Unknown,
}

impl PlaylistFormat {
    /// Detect the format by the extension of the URI path.  Query and fragment
    /// are ignored, and so is the case of the extension.
    pub fn from_uri(uri: &str) -> Self {
        let path = match Url::parse(uri) {
            Ok(url) => url.path().to_owned(),
            Err(_) => uri
                .split(|c: char| c == '?' || c == '#')
                .next()
                .unwrap_or_default()
                .to_owned(),
        };
        let file_name = path.rsplit('/').next().unwrap_or_default();
        let Some((_, extension)) = file_name.rsplit_once('.') else {
            return Self::Unknown;
        };
        match extension.to_ascii_lowercase().as_str() {
            "m3u" | "m3u8" | "ram" => Self::M3u,
            "pls" => Self::Pls,
            "asx" => Self::Asx,
            "xspf" => Self::Xspf,
            _ => Self::Unknown,
        }
    }

    pub fn is_playlist(self) -> bool {
        self != Self::Unknown
    }

    /// Extract stream URIs from playlist text.  Malformed input produces an
    /// empty list, never an error.
    pub fn parse(self, text: &str) -> Vec<String> {
        let text = text.trim_start_matches('\u{feff}');
        match self {
            Self::M3u => m3u::parse(text),
            Self::Pls => pls::parse(text),
            Self::Asx => asx::parse(text),
            Self::Xspf => xspf::parse(text),
            Self::Unknown => Vec::new(),
        }
    }
}

/// A remote playlist, alive only until its streams are resolved.
pub struct Playlist {
    uri: String,
    format: PlaylistFormat,
    stream_uris: Vec<String>,
}

impl Playlist {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let format = PlaylistFormat::from_uri(&uri);
        Self {
            uri,
            format,
            stream_uris: Vec::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn format(&self) -> PlaylistFormat {
        self.format
    }

    pub fn stream_uris(&self) -> &[String] {
        &self.stream_uris
    }

    pub fn into_stream_uris(self) -> Vec<String> {
        self.stream_uris
    }

    /// Fetch and parse the playlist.  URIs that are not stream URIs (direct
    /// links) resolve to themselves without touching the network.
    pub fn download(&mut self, agent: &ureq::Agent) -> Result<(), Error> {
        if !self.format.is_playlist() {
            self.stream_uris = vec![self.uri.clone()];
            return Ok(());
        }
        log::info!("downloading playlist: {}", self.uri);
        let text = fetch_text(agent, &self.uri)?;
        self.stream_uris = self
            .format
            .parse(&text)
            .into_iter()
            .filter_map(|stream_uri| absolutize(&self.uri, &stream_uri))
            .collect();
        log::debug!(
            "playlist {} resolved to {} streams",
            self.uri,
            self.stream_uris.len()
        );
        Ok(())
    }
}

/// Resolve a station URI into its stream URIs.
pub fn resolve(agent: &ureq::Agent, uri: &str) -> Result<Vec<String>, Error> {
    let mut playlist = Playlist::new(uri);
    playlist.download(agent)?;
    Ok(playlist.into_stream_uris())
}

fn fetch_text(agent: &ureq::Agent, uri: &str) -> Result<String, Error> {
    if let Ok(url) = Url::parse(uri) {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| Error::PlaylistParseError(format!("invalid file URI: {uri}")))?;
            return Ok(fs::read_to_string(path)?);
        }
    }
    let mut response = agent
        .get(uri)
        .header("User-Agent", crate::util::USER_AGENT)
        .call()
        .map_err(|err| Error::from_request(uri, err))?;
    let text = response
        .body_mut()
        .with_config()
        .limit(MAX_PLAYLIST_SIZE)
        .read_to_string()?;
    Ok(text)
}

/// Playlists sometimes list streams relative to their own location.
fn absolutize(base: &str, stream_uri: &str) -> Option<String> {
    match Url::parse(stream_uri) {
        Ok(_) => Some(stream_uri.to_owned()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = Url::parse(base).and_then(|base| base.join(stream_uri));
            match joined {
                Ok(url) => Some(url.into()),
                Err(err) => {
                    log::warn!("dropping unusable stream uri {:?}: {}", stream_uri, err);
                    None
                }
            }
        }
        Err(err) => {
            log::warn!("dropping unusable stream uri {:?}: {}", stream_uri, err);
            None
        }
    }
}
