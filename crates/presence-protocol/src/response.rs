//! Server responses.

use std::fmt;

use crate::request::ProtocolError;

/// A response written back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `login ok`
    LoginOk,

    /// `ping ok`
    PingOk,

    /// `ping client_list_changed`
    PingClientListChanged,

    /// `clients <name1> <name2> ...`
    ///
    /// Sessions that have not logged in yet appear as empty names.
    Clients(Vec<String>),
}

impl Response {
    /// Encodes the response for the wire, newline included.
    ///
    /// Every client name is followed by a single space, so a list
    /// always ends in `" \n"` unless it is empty.
    pub fn to_wire(&self) -> String {
        format!("{self}\n")
    }

    /// Parses a response line received from the server (newline stripped).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        match line {
            "login ok" => Ok(Response::LoginOk),
            "ping ok" => Ok(Response::PingOk),
            "ping client_list_changed" => Ok(Response::PingClientListChanged),
            _ => match line.strip_prefix("clients ") {
                Some(rest) => {
                    let mut names: Vec<String> = rest.split(' ').map(str::to_string).collect();
                    // The trailing separator leaves one empty piece behind.
                    names.pop();
                    Ok(Response::Clients(names))
                }
                None => Err(ProtocolError::UnknownResponse(line.to_string())),
            },
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::LoginOk => write!(f, "login ok"),
            Response::PingOk => write!(f, "ping ok"),
            Response::PingClientListChanged => write!(f, "ping client_list_changed"),
            Response::Clients(names) => {
                write!(f, "clients ")?;
                for name in names {
                    write!(f, "{name} ")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_responses() {
        assert_eq!(Response::LoginOk.to_wire(), "login ok\n");
        assert_eq!(Response::PingOk.to_wire(), "ping ok\n");
        assert_eq!(
            Response::PingClientListChanged.to_wire(),
            "ping client_list_changed\n"
        );
    }

    #[test]
    fn test_clients_trailing_space() {
        let resp = Response::Clients(vec!["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(resp.to_wire(), "clients Alice Bob \n");
    }

    #[test]
    fn test_clients_with_anonymous_session() {
        let resp = Response::Clients(vec!["Alice".to_string(), String::new()]);
        assert_eq!(resp.to_wire(), "clients Alice  \n");
        assert_eq!(Response::parse("clients Alice  "), Ok(resp));
    }

    #[test]
    fn test_clients_empty() {
        assert_eq!(Response::Clients(Vec::new()).to_wire(), "clients \n");
        assert_eq!(Response::parse("clients "), Ok(Response::Clients(Vec::new())));
    }

    #[test]
    fn test_parse_responses() {
        assert_eq!(Response::parse("login ok"), Ok(Response::LoginOk));
        assert_eq!(Response::parse("ping ok"), Ok(Response::PingOk));
        assert_eq!(
            Response::parse("ping client_list_changed"),
            Ok(Response::PingClientListChanged)
        );
        assert_eq!(
            Response::parse("clients Alice Bob "),
            Ok(Response::Clients(vec!["Alice".to_string(), "Bob".to_string()]))
        );
    }

    #[test]
    fn test_parse_unknown_response() {
        let err = Response::parse("pong").unwrap_err();
        assert_eq!(err, ProtocolError::UnknownResponse("pong".to_string()));
        assert_eq!(err.to_string(), "unknown response pong");

        // Requests are not responses
        assert!(matches!(
            Response::parse("ping"),
            Err(ProtocolError::UnknownResponse(_))
        ));
    }
}
