use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::{error::Error, station::Station, util::mkdir_if_not_exists, xml::OpenElements};

use super::StationList;

const ROOT_ELEMENT: &str = "Stations";
const STATION_ELEMENT: &str = "Station";
const NAME_ELEMENT: &str = "name";
const URI_ELEMENT: &str = "uri";

/// Stations offered on the very first start, before the user had a chance to
/// save a list of their own.
pub fn default_stations() -> Vec<Station> {
    [
        (
            "SomaFM - Groove Salad",
            "https://somafm.com/groovesalad.pls",
        ),
        ("SomaFM - Drone Zone", "https://somafm.com/dronezone.pls"),
        ("FIP", "http://direct.fipradio.fr/live/fip-midfi.mp3"),
        (
            "Radio Paradise - Main Mix",
            "http://stream.radioparadise.com/mp3-192",
        ),
        ("Nova", "http://novazz.ice.infomaniak.ch/novazz-128.mp3"),
    ]
    .into_iter()
    .map(|(name, uri)| Station::new(Some(name.to_string()), uri))
    .collect()
}

impl StationList {
    /// Load the list from `path`.  A missing file yields the default stations.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match fs::read_to_string(path) {
            Ok(text) => {
                log::info!("loading stations: {:?}", path);
                Self::from_xml(&text)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("no station file at {:?}, using defaults", path);
                Ok(Self::from_stations(default_stations()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write the list to `path`, through a temporary file so a crash mid-write
    /// never leaves a truncated list behind.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent() {
            mkdir_if_not_exists(dir)?;
        }
        let xml = self.to_xml()?;
        let tmp_path = path.with_extension("xml.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(xml.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        log::debug!("saved {} stations to {:?}", self.len(), path);
        Ok(())
    }

    pub fn from_xml(text: &str) -> Result<Self, Error> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut open = OpenElements::new();
        let mut stations = Vec::new();
        let mut in_station = false;
        let mut current_tag: Option<String> = None;
        let mut name: Option<String> = None;
        let mut uri: Option<String> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    open.start(&e);
                    let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if tag == STATION_ELEMENT {
                        in_station = true;
                        name = None;
                        uri = None;
                    } else if in_station {
                        current_tag = Some(tag);
                    }
                }
                Event::Text(e) => {
                    if let Some(tag) = &current_tag {
                        let text = e.unescape()?.into_owned();
                        match tag.as_str() {
                            NAME_ELEMENT => name = Some(text),
                            URI_ELEMENT => uri = Some(text),
                            _ => {}
                        }
                    }
                }
                Event::CData(e) => {
                    if let Some(tag) = &current_tag {
                        let text = String::from_utf8_lossy(&e).into_owned();
                        match tag.as_str() {
                            NAME_ELEMENT => name = Some(text),
                            URI_ELEMENT => uri = Some(text),
                            _ => {}
                        }
                    }
                }
                Event::End(e) => {
                    open.end(&e)?;
                    if e.local_name().as_ref() == STATION_ELEMENT.as_bytes() {
                        in_station = false;
                        match uri.take() {
                            Some(uri) if !uri.trim().is_empty() => {
                                stations.push(Station::new(name.take(), uri.trim()));
                            }
                            _ => {
                                log::warn!("skipping station without uri: {:?}", name.take());
                            }
                        }
                    }
                    current_tag = None;
                }
                Event::Eof => {
                    open.finish()?;
                    break;
                }
                _ => {}
            }
        }

        Ok(Self::from_stations(stations))
    }

    pub fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
        for station in self.iter() {
            writer.write_event(Event::Start(BytesStart::new(STATION_ELEMENT)))?;
            if let Some(name) = station.name() {
                write_text_element(&mut writer, NAME_ELEMENT, name)?;
            }
            write_text_element(&mut writer, URI_ELEMENT, station.uri())?;
            writer.write_event(Event::End(BytesEnd::new(STATION_ELEMENT)))?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|err| Error::XmlError(Box::new(err)))?;
        xml.push('\n');
        Ok(xml)
    }
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), Error> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
