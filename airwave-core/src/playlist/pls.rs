/// PLS is a key-file with a single `[playlist]` group, where stream locations
/// are stored under `File1`, `File2`, ... keys.
pub fn parse(text: &str) -> Vec<String> {
    let mut in_playlist = false;
    let mut entries: Vec<(u32, String)> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(group) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_playlist = group.trim().eq_ignore_ascii_case("playlist");
            continue;
        }
        if !in_playlist {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::debug!("ignoring pls line without a value: {:?}", line);
            continue;
        };
        if let Some(index) = file_index(key.trim()) {
            let value = value.trim();
            if !value.is_empty() {
                entries.push((index, value.to_owned()));
            }
        }
    }

    // Entries are usually in order already, but nothing guarantees it.
    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, uri)| uri).collect()
}

fn file_index(key: &str) -> Option<u32> {
    let prefix = key.get(..4)?;
    if !prefix.eq_ignore_ascii_case("file") {
        return None;
    }
    key[4..].parse().ok()
}
