use crate::error::RtmpError;
use std::fmt;

pub const DEFAULT_PORT: u16 = 1935;

/// Destination of a publish, `rtmp://host[:port]/app[/...]/stream-key`.
///
/// The application is everything between the authority and the last path
/// segment, the stream key is the last segment (query string included, which
/// is where services put their auth tokens).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub host: String,
    pub port: u16,
    pub app: String,
    pub stream_key: String,
}

impl RtmpUrl {
    pub fn parse(url: &str) -> Result<Self, RtmpError> {
        let invalid = || RtmpError::InvalidUrl(url.to_string());

        let rest = url
            .strip_prefix("rtmp://")
            .or_else(|| url.strip_prefix("RTMP://"))
            .ok_or_else(invalid)?;

        let (authority, path) = rest.split_once('/').ok_or_else(invalid)?;
        let (host, port) = match authority.strip_prefix('[') {
            // bracketed IPv6 literal
            Some(bracketed) => {
                let (host, after) = bracketed.split_once(']').ok_or_else(invalid)?;
                match after.strip_prefix(':') {
                    Some(port) => (host, port.parse::<u16>().map_err(|_| invalid())?),
                    None if after.is_empty() => (host, DEFAULT_PORT),
                    None => return Err(invalid()),
                }
            }
            None => match authority.split_once(':') {
                Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
                None => (authority, DEFAULT_PORT),
            },
        };
        if host.is_empty() {
            return Err(invalid());
        }

        let path = path.trim_end_matches('/');
        let (app, stream_key) = path.rsplit_once('/').ok_or_else(invalid)?;
        if app.is_empty() || stream_key.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_string(),
            port,
            app: app.to_string(),
            stream_key: stream_key.to_string(),
        })
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The `tcUrl` sent with `connect`: the URL without the stream key.
    pub fn tc_url(&self) -> String {
        format!("rtmp://{}/{}", self.address(), self.app)
    }
}

impl fmt::Display for RtmpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_default_port() {
        let url = RtmpUrl::parse("rtmp://live.example.com/app/key123").unwrap();
        assert_eq!(url.host, "live.example.com");
        assert_eq!(url.port, 1935);
        assert_eq!(url.app, "app");
        assert_eq!(url.stream_key, "key123");
        assert_eq!(url.tc_url(), "rtmp://live.example.com:1935/app");
    }

    #[test]
    fn test_parse_nested_app_and_port() {
        let url = RtmpUrl::parse("rtmp://127.0.0.1:19350/live/sub/stream?token=abc").unwrap();
        assert_eq!(url.address(), "127.0.0.1:19350");
        assert_eq!(url.app, "live/sub");
        assert_eq!(url.stream_key, "stream?token=abc");
    }

    #[test]
    fn test_parse_ipv6_host() {
        let url = RtmpUrl::parse("rtmp://[::1]:1936/live/s").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 1936);
        assert_eq!(url.address(), "[::1]:1936");
    }

    #[test]
    fn test_invalid_urls() {
        for bad in [
            "http://host/app/key",
            "rtmp://host",
            "rtmp://host/app",
            "rtmp://host:notaport/app/key",
            "rtmp:///app/key",
        ] {
            assert!(
                matches!(RtmpUrl::parse(bad), Err(RtmpError::InvalidUrl(_))),
                "{bad} should be rejected"
            );
        }
    }
}
