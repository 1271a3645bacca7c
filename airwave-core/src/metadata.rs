use std::fmt;

/// Tags describing what's on air right now.  Two tag sets compare equal when
/// all fields are equal, which is how redundant updates get suppressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
    /// Nominal bitrate in kbit/s.
    pub bitrate: Option<u32>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set the bitrate from a bit/s value, as reported by decoders and servers.
    /// Values are rounded to whole kbit/s, so jitter in the low digits doesn't
    /// register as a change.
    pub fn set_bitrate_bps(&mut self, bps: u32) {
        self.bitrate = (bps > 0).then(|| (bps + 500) / 1000);
    }

    /// Build tags from an ICY `StreamTitle`.  Stations mostly use the
    /// `Artist - Title` convention, anything else is taken as a bare title.
    pub fn from_stream_title(stream_title: &str) -> Self {
        let stream_title = stream_title.trim();
        let (artist, title) = match stream_title.split_once(" - ") {
            Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
                (Some(artist.trim().to_owned()), Some(title.trim().to_owned()))
            }
            _ if stream_title.is_empty() => (None, None),
            _ => (None, Some(stream_title.to_owned())),
        };
        Self {
            artist,
            title,
            ..Self::default()
        }
    }

    /// Fill in fields from `other` that are set there and missing here.
    pub fn merge(&mut self, other: &Metadata) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.artist, &other.artist);
        fill(&mut self.title, &other.title);
        fill(&mut self.album, &other.album);
        fill(&mut self.genre, &other.genre);
        fill(&mut self.year, &other.year);
        fill(&mut self.comment, &other.comment);
        fill(&mut self.bitrate, &other.bitrate);
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => write!(f, "{artist} - {title}")?,
            (Some(artist), None) => write!(f, "{artist}")?,
            (None, Some(title)) => write!(f, "{title}")?,
            (None, None) => write!(f, "(no title)")?,
        }
        if let Some(album) = &self.album {
            write!(f, " ({album}")?;
            if let Some(year) = &self.year {
                write!(f, ", {year}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
