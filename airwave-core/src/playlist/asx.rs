use quick_xml::{events::Event, Reader};

use crate::xml::OpenElements;

/// ASX is Microsoft's XML playlist.  Every `<entry>` holds one or more `<ref
/// href="..."/>` elements.  Element and attribute names are case-insensitive,
/// and real-world files are all over the place in that regard.
pub fn parse(text: &str) -> Vec<String> {
    match try_parse(text) {
        Ok(uris) => uris,
        Err(err) => {
            log::warn!("malformed asx playlist: {}", err);
            Vec::new()
        }
    }
}

fn try_parse(text: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    // Uppercase and lowercase tags get mixed freely, so end tags can't be matched
    // byte-for-byte by the reader.
    reader.config_mut().check_end_names = false;

    let mut open = OpenElements::ignoring_case();
    let mut uris = Vec::new();
    let mut entry_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                open.start(&e);
                let name = e.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"entry") {
                    entry_depth += 1;
                } else if entry_depth > 0 && name.as_ref().eq_ignore_ascii_case(b"ref") {
                    uris.extend(href(&e)?);
                }
            }
            Event::Empty(e) => {
                if entry_depth > 0 && e.local_name().as_ref().eq_ignore_ascii_case(b"ref") {
                    uris.extend(href(&e)?);
                }
            }
            Event::End(e) => {
                open.end(&e)?;
                if e.local_name().as_ref().eq_ignore_ascii_case(b"entry") {
                    entry_depth = entry_depth.saturating_sub(1);
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

fn href(e: &quick_xml::events::BytesStart) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref().eq_ignore_ascii_case(b"href") {
            let value = attr.unescape_value()?;
            let value = value.trim();
            if !value.is_empty() {
                return Ok(Some(value.to_owned()));
            }
        }
    }
    Ok(None)
}
