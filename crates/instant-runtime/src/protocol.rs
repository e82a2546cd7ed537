//! Wire types for the search event stream and the paginated result files.
//!
//! Stream frames are JSON objects tagged by their `Type` field. Frames are
//! validated here, at the transport boundary: an unknown tag is a protocol
//! defect and never reaches the session as data.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Rows per flat result page, and the size of the streaming window.
pub const RESULTS_PER_PAGE: usize = 10;
/// Packages per grouped result page.
pub const PACKAGES_PER_PAGE: usize = 5;
/// Rows kept per package on a grouped page.
pub const RESULTS_PER_PACKAGE: usize = 2;

/// A single matching line with its surrounding context.
///
/// The context strings arrive HTML-escaped from the server and are passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "Path", alias = "path")]
    pub path: String,
    #[serde(rename = "Line", alias = "line")]
    pub line: u32,
    #[serde(rename = "PathRank", alias = "pathrank", default)]
    pub path_rank: f64,
    #[serde(rename = "Ranking", alias = "ranking", default)]
    pub ranking: f64,
    #[serde(rename = "Ctxp2", alias = "ctxp2", default)]
    pub context_before2: String,
    #[serde(rename = "Ctxp1", alias = "ctxp1", default)]
    pub context_before1: String,
    #[serde(rename = "Context", alias = "context", default)]
    pub matched_text: String,
    #[serde(rename = "Ctxn1", alias = "ctxn1", default)]
    pub context_after1: String,
    #[serde(rename = "Ctxn2", alias = "ctxn2", default)]
    pub context_after2: String,
}

/// One line of rendered context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine<'a> {
    pub text: &'a str,
    pub matched: bool,
}

impl ResultRow {
    /// Source package portion of the path (`i3-wm_4.8-1/src/main.c` -> `i3-wm`).
    pub fn source_package(&self) -> &str {
        match self.path.find('_') {
            Some(idx) => &self.path[..idx],
            None => &self.path,
        }
    }

    /// Context lines in display order with blank lines dropped.
    pub fn context_lines(&self) -> Vec<ContextLine<'_>> {
        [
            (&self.context_before2, false),
            (&self.context_before1, false),
            (&self.matched_text, true),
            (&self.context_after1, false),
            (&self.context_after2, false),
        ]
        .into_iter()
        .filter(|(text, _)| !text.trim().is_empty())
        .map(|(text, matched)| ContextLine {
            text: text.as_str(),
            matched,
        })
        .collect()
    }

    /// Relative link to the file viewer for this match.
    pub fn show_url(&self) -> String {
        format!(
            "show?file={}&line={}",
            urlencoding::encode(&self.path),
            self.line
        )
    }
}

/// A source package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Package {
    pub name: String,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One package block of a grouped result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagePage {
    #[serde(rename = "Package")]
    pub package: Package,
    #[serde(rename = "Results", default)]
    pub rows: Vec<ResultRow>,
}

/// Body of `/results/{queryId}/packages.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagesResponse {
    #[serde(rename = "Packages", default)]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "QueryId", default)]
    pub query_id: String,
    #[serde(rename = "FilesProcessed")]
    pub files_processed: u64,
    #[serde(rename = "FilesTotal")]
    pub files_total: u64,
    #[serde(rename = "Results")]
    pub results: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(rename = "QueryId")]
    pub query_id: String,
    #[serde(rename = "ResultPages")]
    pub result_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct StreamError {
    #[serde(rename = "ErrorType")]
    kind: ErrorKind,
}

/// Server-reported error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum ErrorKind {
    BackendUnavailable,
    Cancelled,
    Failed,
    InvalidQuery,
    Other(String),
}

impl From<String> for ErrorKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "backendunavailable" => Self::BackendUnavailable,
            "cancelled" => Self::Cancelled,
            "failed" => Self::Failed,
            "invalidquery" => Self::InvalidQuery,
            _ => Self::Other(value),
        }
    }
}

impl ErrorKind {
    /// Wire name, also used as the notice uniqueness key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::BackendUnavailable => "backendunavailable",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::InvalidQuery => "invalidquery",
            Self::Other(kind) => kind,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::BackendUnavailable => "The results may be incomplete, not all Debian Code Search servers are okay right now.".to_string(),
            Self::Cancelled => "This query has been cancelled by the server administrator (to preserve overall service health).".to_string(),
            Self::Failed => "This query failed due to an unexpected internal server error.".to_string(),
            Self::InvalidQuery => "This query was refused by the server, because it is too short or malformed.".to_string(),
            Self::Other(kind) => kind.clone(),
        }
    }

    /// Kinds after which the query will not make further progress.
    pub fn halts_progress(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Failed | Self::InvalidQuery)
    }
}

/// A validated stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Progress(ProgressUpdate),
    Pagination(Pagination),
    Result(ResultRow),
    Error(ErrorKind),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("frame has no Type tag")]
    MissingTag,
    #[error("unknown message type {0:?}")]
    UnknownTag(String),
    #[error("invalid {tag} payload: {source}")]
    InvalidPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

fn decode<T: DeserializeOwned>(tag: &str, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload {
        tag: tag.to_string(),
        source,
    })
}

/// Parse one stream frame.
pub fn parse_message(data: &str) -> Result<StreamMessage, ProtocolError> {
    let value: Value = serde_json::from_str(data.trim())?;
    let tag = value
        .get("Type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingTag)?
        .to_string();

    match tag.as_str() {
        "progress" => Ok(StreamMessage::Progress(decode(&tag, value)?)),
        "pagination" => Ok(StreamMessage::Pagination(decode(&tag, value)?)),
        "result" => Ok(StreamMessage::Result(decode(&tag, value)?)),
        "error" => {
            let err: StreamError = decode(&tag, value)?;
            Ok(StreamMessage::Error(err.kind))
        }
        _ => Err(ProtocolError::UnknownTag(tag)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress() {
        let data = r#"{"Type":"progress","QueryId":"abc","FilesProcessed":50,"FilesTotal":100,"Results":7}"#;
        match parse_message(data).unwrap() {
            StreamMessage::Progress(p) => {
                assert_eq!(p.query_id, "abc");
                assert_eq!(p.files_processed, 50);
                assert_eq!(p.files_total, 100);
                assert_eq!(p.results, 7);
            }
            other => panic!("Expected Progress, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pagination() {
        let data = r#"{"Type":"pagination","QueryId":"abc","ResultPages":12}"#;
        assert_eq!(
            parse_message(data).unwrap(),
            StreamMessage::Pagination(Pagination {
                query_id: "abc".into(),
                result_pages: 12
            })
        );
    }

    #[test]
    fn test_parse_result_row() {
        let data = r#"{"Type":"result","Path":"i3-wm_4.8-1/src/main.c","Line":42,"Ranking":0.75,"PathRank":0.5,"Ctxp2":"a","Ctxp1":"","Context":"match","Ctxn1":"b","Ctxn2":" "}"#;
        let StreamMessage::Result(row) = parse_message(data).unwrap() else {
            panic!("Expected Result");
        };
        assert_eq!(row.line, 42);
        assert_eq!(row.ranking, 0.75);
        assert_eq!(row.source_package(), "i3-wm");

        let lines = row.context_lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text, "match");
        assert!(lines[1].matched);
        assert_eq!(
            row.show_url(),
            "show?file=i3-wm_4.8-1%2Fsrc%2Fmain.c&line=42"
        );
    }

    #[test]
    fn test_parse_error_kinds() {
        let known = r#"{"Type":"error","ErrorType":"backendunavailable"}"#;
        assert_eq!(
            parse_message(known).unwrap(),
            StreamMessage::Error(ErrorKind::BackendUnavailable)
        );

        let other = r#"{"Type":"error","ErrorType":"toomanyresults"}"#;
        let StreamMessage::Error(kind) = parse_message(other).unwrap() else {
            panic!("Expected Error");
        };
        assert_eq!(kind.as_str(), "toomanyresults");
        assert_eq!(kind.message(), "toomanyresults");
        assert!(!kind.halts_progress());
        assert!(ErrorKind::Cancelled.halts_progress());
    }

    #[test]
    fn test_unknown_tag_is_defect() {
        let err = parse_message(r#"{"Type":"telemetry","Foo":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag(ref t) if t == "telemetry"));
    }

    #[test]
    fn test_missing_tag_and_garbage() {
        assert!(matches!(
            parse_message(r#"{"QueryId":"x"}"#),
            Err(ProtocolError::MissingTag)
        ));
        assert!(matches!(
            parse_message("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            parse_message(r#"{"Type":"progress","QueryId":"x"}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_package_page_shape() {
        let data = r#"[{"Package":"i3-wm","Results":[{"Path":"i3-wm_4.8-1/x.c","Line":1,"Ranking":0.1}]}]"#;
        let pages: Vec<PackagePage> = serde_json::from_str(data).unwrap();
        assert_eq!(pages[0].package.name, "i3-wm");
        assert_eq!(pages[0].rows.len(), 1);
    }
}
