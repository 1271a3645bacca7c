use airwave_core::player::PlayerCommand;

pub const HELP: &str = "\
commands:
  play [station]            play the current or the given station
  stop                      stop playing
  toggle                    play or stop
  next, prev                go to the next or previous station
  volume [0-100]            show or set the volume
  mute [on|off]             show or set mute
  repeat [on|off]           show or set repeat
  shuffle [on|off]          show or set shuffle
  list                      list the stations
  current                   show the current station
  add <uri> [name]          add a station at the end
  remove <station>          remove a station
  rename <station> <name>   rename a station
  move <station> <pos>      move a station to position <pos>
  conf get <key>            show a config value
  conf set <key> <value>    change a config value
  conf list-keys            list config keys
  conf describe <key>       describe a config key
  help                      show this
  quit                      exit
stations are named by number, name, or uri; quote arguments with spaces";

/// One line of user input.
#[derive(Debug)]
pub enum Input {
    Command(PlayerCommand),
    Show(Query),
    Conf(ConfAction),
    Help,
    Nothing,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Query {
    List,
    Current,
    Volume,
    Mute,
    Repeat,
    Shuffle,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfAction {
    Get(String),
    Set(String, String),
    ListKeys,
    Describe(String),
}

pub fn parse(line: &str) -> Result<Input, String> {
    let args = split_args(line)?;
    let Some((name, args)) = args.split_first() else {
        return Ok(Input::Nothing);
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("play", []) => PlayerCommand::Play,
        ("play", [station]) => PlayerCommand::PlayStation {
            station: station.to_string(),
        },
        ("stop", []) => PlayerCommand::Stop,
        ("toggle", []) => PlayerCommand::Toggle,
        ("next", []) => PlayerCommand::Next,
        ("prev" | "previous", []) => PlayerCommand::Previous,
        ("volume", []) => return Ok(Input::Show(Query::Volume)),
        ("volume", [level]) => {
            let level = level
                .trim_end_matches('%')
                .parse::<f64>()
                .ok()
                .filter(|level| (0.0..=100.0).contains(level))
                .ok_or_else(|| format!("volume must be between 0 and 100, not {level:?}"))?;
            PlayerCommand::SetVolume {
                volume: level / 100.0,
            }
        }
        ("mute", []) => return Ok(Input::Show(Query::Mute)),
        ("mute", [flag]) => PlayerCommand::SetMute {
            mute: parse_flag(flag)?,
        },
        ("repeat", []) => return Ok(Input::Show(Query::Repeat)),
        ("repeat", [flag]) => PlayerCommand::SetRepeat {
            repeat: parse_flag(flag)?,
        },
        ("shuffle", []) => return Ok(Input::Show(Query::Shuffle)),
        ("shuffle", [flag]) => PlayerCommand::SetShuffle {
            shuffle: parse_flag(flag)?,
        },
        ("list" | "ls", []) => return Ok(Input::Show(Query::List)),
        ("current", []) => return Ok(Input::Show(Query::Current)),
        ("add", [uri, name @ ..]) => PlayerCommand::Add {
            uri: uri.to_string(),
            name: (!name.is_empty()).then(|| name.join(" ")),
            position: None,
        },
        ("remove" | "rm", [station]) => PlayerCommand::Remove {
            station: station.to_string(),
        },
        ("rename", [station, name @ ..]) if !name.is_empty() => PlayerCommand::Rename {
            station: station.to_string(),
            name: Some(name.join(" ")),
        },
        ("move", [station, position]) => PlayerCommand::Move {
            station: station.to_string(),
            position: parse_position(position)?,
        },
        ("conf", ["get", key]) => return Ok(Input::Conf(ConfAction::Get(key.to_string()))),
        ("conf", ["set", key, value @ ..]) if !value.is_empty() => {
            return Ok(Input::Conf(ConfAction::Set(key.to_string(), value.join(" "))))
        }
        ("conf", ["list-keys"]) => return Ok(Input::Conf(ConfAction::ListKeys)),
        ("conf", ["describe", key]) => {
            return Ok(Input::Conf(ConfAction::Describe(key.to_string())))
        }
        ("help" | "?", _) => return Ok(Input::Help),
        ("quit" | "exit", []) => PlayerCommand::Quit,
        (name, _) => return Err(format!("bad command: {name}, try `help`")),
    };
    Ok(Input::Command(cmd))
}

fn parse_flag(flag: &str) -> Result<bool, String> {
    match flag.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected on or off, not {flag:?}")),
    }
}

/// Positions are shown and entered counting from 1.
fn parse_position(position: &str) -> Result<usize, String> {
    match position.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position - 1),
        _ => Err(format!("bad position: {position:?}")),
    }
}

/// Split on whitespace, keeping double-quoted parts together.
fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                in_arg = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if quoted {
        return Err("unterminated quote".to_string());
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> PlayerCommand {
        match parse(line) {
            Ok(Input::Command(cmd)) => cmd,
            other => panic!("{line:?} parsed to {other:?}"),
        }
    }

    #[test]
    fn quoted_arguments() {
        assert_eq!(
            split_args(r#"rename "Groove Salad" "Soma  FM""#).unwrap(),
            vec!["rename", "Groove Salad", "Soma  FM"]
        );
        assert_eq!(split_args(r#"play """#).unwrap(), vec!["play", ""]);
        assert!(split_args(r#"play "open"#).is_err());
        assert!(split_args("   ").unwrap().is_empty());
    }

    #[test]
    fn playback_commands() {
        assert!(matches!(command("play"), PlayerCommand::Play));
        assert!(matches!(
            command("play 3"),
            PlayerCommand::PlayStation { station } if station == "3"
        ));
        assert!(matches!(command("PREV"), PlayerCommand::Previous));
        assert!(matches!(
            command("volume 40"),
            PlayerCommand::SetVolume { volume } if volume == 0.4
        ));
        assert!(matches!(
            command("mute on"),
            PlayerCommand::SetMute { mute: true }
        ));
        assert!(parse("volume 140").is_err());
        assert!(parse("repeat sometimes").is_err());
    }

    #[test]
    fn station_commands() {
        assert!(matches!(
            command("add http://radio/stream Late Night Jazz"),
            PlayerCommand::Add { uri, name: Some(name), position: None }
                if uri == "http://radio/stream" && name == "Late Night Jazz"
        ));
        assert!(matches!(
            command("add http://radio/stream"),
            PlayerCommand::Add { name: None, .. }
        ));
        assert!(matches!(
            command("move FIP 1"),
            PlayerCommand::Move { station, position: 0 } if station == "FIP"
        ));
        assert!(parse("move FIP 0").is_err());
        assert!(parse("rename FIP").is_err());
    }

    #[test]
    fn queries_and_config() {
        assert!(matches!(parse("list"), Ok(Input::Show(Query::List))));
        assert!(matches!(parse("shuffle"), Ok(Input::Show(Query::Shuffle))));
        assert!(matches!(
            parse("conf set last-station http://radio/stream"),
            Ok(Input::Conf(ConfAction::Set(key, value)))
                if key == "last-station" && value == "http://radio/stream"
        ));
        assert!(matches!(
            parse("conf list-keys"),
            Ok(Input::Conf(ConfAction::ListKeys))
        ));
        assert!(matches!(parse(""), Ok(Input::Nothing)));
        assert!(parse("dance").is_err());
    }
}
