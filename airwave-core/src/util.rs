use std::{fs, io, path::Path, time::Duration};

pub const NET_CONNECT_TIMEOUT: Duration = Duration::from_millis(8 * 1000);

pub const NET_IO_TIMEOUT: Duration = Duration::from_millis(16 * 1000);

pub const USER_AGENT: &str = concat!("airwave/", env!("CARGO_PKG_VERSION"));

/// Agent for short request/response exchanges, like playlist downloads.
pub fn default_ureq_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(NET_IO_TIMEOUT))
        .timeout_connect(Some(NET_CONNECT_TIMEOUT))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Agent for endless audio streams.  There is no global deadline, only the
/// connection and the response head are bounded.
pub fn streaming_ureq_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(NET_CONNECT_TIMEOUT))
        .timeout_send_request(Some(NET_IO_TIMEOUT))
        .timeout_recv_response(Some(NET_IO_TIMEOUT))
        .build();
    ureq::Agent::new_with_config(config)
}

pub fn mkdir_if_not_exists(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).or_else(|err| {
        if err.kind() == io::ErrorKind::AlreadyExists {
            Ok(())
        } else {
            Err(err)
        }
    })
}
