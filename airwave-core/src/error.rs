use std::{error, fmt, io, net::ToSocketAddrs};

use url::{Host, Url};

#[derive(Debug)]
pub enum Error {
    StationNotFound(String),
    StreamUnavailable(Box<dyn error::Error + Send>),
    ServerUnresolved(String),
    FormatUnrecognized,
    PlaylistParseError(String),
    PlaylistEmpty,
    ConfigError(String),
    XmlError(Box<dyn error::Error + Send>),
    JsonError(Box<dyn error::Error + Send>),
    AudioDecodingError(Box<dyn error::Error + Send>),
    AudioOutputError(Box<dyn error::Error + Send>),
    ResamplingError(i32),
    InvalidStateError(String),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StationNotFound(station) => write!(f, "No such station: {station}"),
            Self::ServerUnresolved(host) => write!(f, "Could not resolve server: {host}"),
            Self::FormatUnrecognized => write!(f, "Stream format not recognized"),
            Self::PlaylistParseError(msg) => write!(f, "Failed to parse playlist: {msg}"),
            Self::PlaylistEmpty => write!(f, "Playlist contained no streams"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::ResamplingError(code) => write!(f, "Resampling failed with error code {code}"),
            Self::StreamUnavailable(err) => write!(f, "Stream unavailable: {err}"),
            Self::XmlError(err)
            | Self::JsonError(err)
            | Self::AudioDecodingError(err)
            | Self::AudioOutputError(err) => err.fmt(f),
            Self::InvalidStateError(msg) => f.write_str(msg),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl Error {
    /// Classify a failed request to `uri`.  ureq reports failed lookups as
    /// plain I/O errors, so on connection failures the host is looked up once
    /// more to tell an unknown server from an unreachable one.
    pub fn from_request(uri: &str, err: ureq::Error) -> Error {
        let host = Url::parse(uri).ok().and_then(|url| {
            let port = url.port_or_known_default().unwrap_or(80);
            url.host().map(|host| (host.to_owned(), port))
        });
        match err {
            ureq::Error::HostNotFound | ureq::Error::Timeout(ureq::Timeout::Resolve) => {
                let host = host.map_or_else(|| uri.to_owned(), |(host, _)| host.to_string());
                Error::ServerUnresolved(host)
            }
            ureq::Error::Io(_) | ureq::Error::ConnectionFailed | ureq::Error::Timeout(_) => {
                match host {
                    Some((host, port)) if !resolves(&host, port) => {
                        Error::ServerUnresolved(host.to_string())
                    }
                    _ => Error::StreamUnavailable(Box::new(err)),
                }
            }
            err => Error::StreamUnavailable(Box::new(err)),
        }
    }
}

fn resolves(host: &Host<String>, port: u16) -> bool {
    match host {
        Host::Domain(domain) => (domain.as_str(), port)
            .to_socket_addrs()
            .is_ok_and(|mut addrs| addrs.next().is_some()),
        Host::Ipv4(_) | Host::Ipv6(_) => true,
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Error {
        match err {
            ureq::Error::Io(err) => Error::IoError(err),
            err => Error::StreamUnavailable(Box::new(err)),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Error {
        Error::XmlError(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Error::InvalidStateError("channel disconnected".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_hosts_are_unresolved() {
        let err = Error::from_request(
            "http://no-such-host.invalid/stream",
            ureq::Error::Io(io::Error::other("failed to lookup address information")),
        );
        assert!(matches!(err, Error::ServerUnresolved(host) if host == "no-such-host.invalid"));

        let err = Error::from_request("http://radio.invalid:8000/", ureq::Error::HostNotFound);
        assert!(matches!(err, Error::ServerUnresolved(host) if host == "radio.invalid"));
    }

    #[test]
    fn refused_connections_are_unavailable() {
        let err = Error::from_request(
            "http://127.0.0.1:9/",
            ureq::Error::Io(io::ErrorKind::ConnectionRefused.into()),
        );
        assert!(matches!(err, Error::StreamUnavailable(_)));

        let err = Error::from_request("http://[::1]:9/", ureq::Error::ConnectionFailed);
        assert!(matches!(err, Error::StreamUnavailable(_)));

        let err = Error::from_request("http://radio.invalid/", ureq::Error::StatusCode(404));
        assert!(matches!(err, Error::StreamUnavailable(_)));
    }
}
