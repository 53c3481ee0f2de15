use crate::server::IncomingRequest;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Header a client or proxy can use to supply its own request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ULID-backed identifier attached to every log line of a request.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Id from the `x-request-id` header when it holds a valid ULID,
    /// otherwise a fresh one.
    pub fn for_request(req: &IncomingRequest) -> Self {
        req.header(REQUEST_ID_HEADER)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_id_is_kept() {
        let id = RequestId::new();
        let req = IncomingRequest::new("GET", "/").with_header("X-Request-Id", id.to_string());
        assert_eq!(RequestId::for_request(&req), id);
    }

    #[test]
    fn test_invalid_header_gets_fresh_id() {
        let req = IncomingRequest::new("GET", "/").with_header("x-request-id", "not-a-ulid");
        let id = RequestId::for_request(&req);
        assert_eq!(id.to_string().len(), 26);
    }

    #[test]
    fn test_serde() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<RequestId>("\"nope\"").is_err());
    }
}
