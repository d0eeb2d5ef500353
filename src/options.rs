use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::coercion::UdtParsers;
use crate::materializer::RequestEvent;

/// Per-request execution options.
///
/// # Examples
/// ```rust
/// use mssql_request::prelude::*;
///
/// let options = RequestOptions::default().with_parse_json(true);
/// assert!(options.parse_json);
/// assert!(!options.is_streaming());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Parse reassembled `FOR JSON` payloads into row fields.
    pub parse_json: bool,
    /// When set, rows are delivered as [`RequestEvent`]s instead of being collected.
    pub stream: Option<UnboundedSender<RequestEvent>>,
    pub udt_parsers: Arc<UdtParsers>,
}

impl RequestOptions {
    #[must_use]
    pub fn with_parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = parse_json;
        self
    }

    #[must_use]
    pub fn with_stream(mut self, sink: UnboundedSender<RequestEvent>) -> Self {
        self.stream = Some(sink);
        self
    }

    #[must_use]
    pub fn with_udt_parsers(mut self, udt_parsers: UdtParsers) -> Self {
        self.udt_parsers = Arc::new(udt_parsers);
        self
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Same options without a streaming sink (used for internal statements).
    #[must_use]
    pub(crate) fn batch(&self) -> Self {
        Self {
            parse_json: self.parse_json,
            stream: None,
            udt_parsers: Arc::clone(&self.udt_parsers),
        }
    }
}
