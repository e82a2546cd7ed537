use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A complete HTTP response as stored in (or served from) the asset cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(serialize_with = "encode_body", deserialize_with = "decode_body")]
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl ProxyResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Utc::now(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn encode_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(body))
}

fn decode_body<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// How a request was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Served from the asset cache.
    Cached(ProxyResponse),
    /// Cached placeholder with the query substituted.
    Placeholder(ProxyResponse),
    /// Intercepted, but the cache missed and the network answered.
    Network(ProxyResponse),
    /// Not intercepted.
    PassThrough,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache_version: String,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_stored_as_base64() {
        let response = ProxyResponse::new(200, vec![], vec![0xff, 0x00, b'a']);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["body"], "/wBh");

        let back: ProxyResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.body, vec![0xff, 0x00, b'a']);
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = ProxyResponse::new(
            200,
            vec![("Content-Type".into(), "text/html".into())],
            vec![],
        );
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert!(response.header("etag").is_none());
    }
}
