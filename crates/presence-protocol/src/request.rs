//! Client requests and their parsing.

use thiserror::Error;

/// A request sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `login <name>`
    Login {
        /// Second whitespace-separated token of the line (empty if missing)
        name: String,
    },

    /// `ping`
    Ping,

    /// `client_list`
    ClientList,
}

/// Errors produced while interpreting a protocol line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line does not start with any known command.
    #[error("invalid msg {0}")]
    UnknownCommand(String),

    /// A server line that is not a known response.
    #[error("unknown response {0}")]
    UnknownResponse(String),
}

impl Request {
    /// Parses a single line (newline already stripped).
    ///
    /// Commands are matched by prefix, so `pingpong` is a `ping` and
    /// `client_list please` is a `client_list`.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        if line.starts_with("login ") {
            let name = line.split_whitespace().nth(1).unwrap_or_default();
            Ok(Request::Login {
                name: name.to_string(),
            })
        } else if line.starts_with("ping") {
            Ok(Request::Ping)
        } else if line.starts_with("client_list") {
            Ok(Request::ClientList)
        } else {
            Err(ProtocolError::UnknownCommand(line.to_string()))
        }
    }

    /// Parses raw line bytes, replacing invalid UTF-8 sequences.
    pub fn parse_bytes(line: &[u8]) -> Result<Self, ProtocolError> {
        Self::parse(&String::from_utf8_lossy(line))
    }

    /// Encodes the request as it travels on the wire, newline included.
    pub fn to_wire(&self) -> String {
        match self {
            Request::Login { name } => format!("login {name}\n"),
            Request::Ping => "ping\n".to_string(),
            Request::ClientList => "client_list\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Request::parse("login Alice"),
            Ok(Request::Login {
                name: "Alice".to_string()
            })
        );
    }

    #[test]
    fn test_parse_login_takes_second_token_only() {
        assert_eq!(
            Request::parse("login  Bob  extra words"),
            Ok(Request::Login {
                name: "Bob".to_string()
            })
        );
    }

    #[test]
    fn test_parse_login_without_name() {
        assert_eq!(
            Request::parse("login "),
            Ok(Request::Login {
                name: String::new()
            })
        );
    }

    #[test]
    fn test_login_requires_separator() {
        // "loginAlice" is not a login command
        assert!(Request::parse("loginAlice").is_err());
        assert!(Request::parse("login").is_err());
    }

    #[test]
    fn test_parse_ping_and_client_list_by_prefix() {
        assert_eq!(Request::parse("ping"), Ok(Request::Ping));
        assert_eq!(Request::parse("ping\r"), Ok(Request::Ping));
        assert_eq!(Request::parse("client_list"), Ok(Request::ClientList));
        assert_eq!(Request::parse("client_list now"), Ok(Request::ClientList));
    }

    #[test]
    fn test_parse_unknown() {
        let err = Request::parse("bogus").unwrap_err();
        assert_eq!(err, ProtocolError::UnknownCommand("bogus".to_string()));
        assert!(err.to_string().contains("bogus"));

        assert!(Request::parse("").is_err());
        assert!(Request::parse(" ping").is_err());
    }

    #[test]
    fn test_parse_bytes_lossy() {
        assert_eq!(Request::parse_bytes(b"ping\xff"), Ok(Request::Ping));
        assert!(Request::parse_bytes(b"\xffping").is_err());
    }

    #[test]
    fn test_to_wire() {
        let login = Request::Login {
            name: "Alice".to_string(),
        };
        assert_eq!(login.to_wire(), "login Alice\n");
        assert_eq!(Request::Ping.to_wire(), "ping\n");
        assert_eq!(Request::ClientList.to_wire(), "client_list\n");
    }
}
