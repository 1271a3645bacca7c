use quick_xml::{events::Event, Reader};

use crate::xml::OpenElements;

/// XSPF ("spiff") lists tracks in `<trackList>`, each `<track>` carrying the
/// stream in a `<location>` element.
pub fn parse(text: &str) -> Vec<String> {
    match try_parse(text) {
        Ok(uris) => uris,
        Err(err) => {
            log::warn!("malformed xspf playlist: {}", err);
            Vec::new()
        }
    }
}

fn try_parse(text: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut open = OpenElements::new();
    let mut uris = Vec::new();
    let mut in_track = false;
    let mut in_location = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                open.start(&e);
                match e.local_name().as_ref() {
                    b"track" => in_track = true,
                    b"location" if in_track => in_location = true,
                    _ => {}
                }
            }
            Event::End(e) => {
                open.end(&e)?;
                match e.local_name().as_ref() {
                    b"track" => in_track = false,
                    b"location" => in_location = false,
                    _ => {}
                }
            }
            Event::Text(e) if in_location => {
                let location = e.unescape()?;
                let location = location.trim();
                if !location.is_empty() {
                    uris.push(location.to_owned());
                }
            }
            Event::CData(e) if in_location => {
                let location = String::from_utf8_lossy(&e);
                let location = location.trim();
                if !location.is_empty() {
                    uris.push(location.to_owned());
                }
            }
            Event::Eof => {
                open.finish()?;
                break;
            }
            _ => {}
        }
    }

    Ok(uris)
}
