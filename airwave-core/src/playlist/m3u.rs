/// M3U is a plain list of locations, one per line.  Lines starting with `#` are
/// either comments or extended M3U directives, neither of which we need.
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_m3u() {
        let text = "#EXTM3U\r\n\
                    #EXTINF:-1,Groove Salad\r\n\
                    http://ice1.somafm.com/groovesalad-128-mp3\r\n\
                    \r\n\
                    #EXTINF:-1,Groove Salad (backup)\r\n\
                    \t http://ice2.somafm.com/groovesalad-128-mp3  \r\n";
        assert_eq!(
            parse(text),
            vec![
                "http://ice1.somafm.com/groovesalad-128-mp3",
                "http://ice2.somafm.com/groovesalad-128-mp3",
            ]
        );
    }

    #[test]
    fn only_comments() {
        assert!(parse("#EXTM3U\n# nothing here\n\n").is_empty());
        assert!(parse("").is_empty());
    }
}
