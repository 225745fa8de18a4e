//! Page tokens and pagination contexts.
//!
//! A page token is opaque to consumers: for the offset strategy it is a
//! decimal integer, for the cursor strategy it is the stringified
//! `primary_key` value of the last row of the previous page. An empty
//! token means the first page. A context exists for a single call.

use std::collections::HashMap;

use sqlbridge_core::config::{OffsetTokenMode, Pagination, PaginationStrategy};
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::value::SqlValue;

const MIN_PAGE_SIZE: i64 = 1;
const MAX_PAGE_SIZE: i64 = 1000;
const DEFAULT_PAGE_SIZE: i64 = 100;

/// An opaque continuation token plus the caller's requested page size.
#[derive(Debug, Clone, Default)]
pub struct PageToken {
    /// Continuation marker; empty means the first page.
    pub token: String,
    /// Requested page size; 0 means the default.
    pub size: u32,
}

impl PageToken {
    /// Token for the first page.
    #[must_use]
    pub fn start(size: u32) -> Self {
        Self {
            token: String::new(),
            size,
        }
    }

    /// Continuation token.
    #[must_use]
    pub fn new(token: impl Into<String>, size: u32) -> Self {
        Self {
            token: token.into(),
            size,
        }
    }
}

fn clamp_page_size(size: u32) -> i64 {
    if size == 0 {
        return DEFAULT_PAGE_SIZE;
    }
    i64::from(size).clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Decoded pagination state for one call.
#[derive(Debug, Clone)]
pub struct PaginationContext {
    strategy: PaginationStrategy,
    limit: i64,
    offset: i64,
    cursor: String,
    primary_key: String,
    offset_mode: OffsetTokenMode,
}

impl PaginationContext {
    /// Translate an opaque token into a context for the configured
    /// strategy. Absent pagination settings yield `None` (unpaginated
    /// traversal).
    pub fn setup(
        opts: Option<&Pagination>,
        token: &PageToken,
    ) -> ConnectorResult<Option<Self>> {
        let Some(opts) = opts else {
            return Ok(None);
        };

        let limit = clamp_page_size(token.size);

        let mut ctx = Self {
            strategy: opts.strategy,
            limit,
            offset: 0,
            cursor: String::new(),
            primary_key: opts.primary_key.clone(),
            offset_mode: opts.offset_mode,
        };

        match opts.strategy {
            PaginationStrategy::Offset => {
                if !token.token.is_empty() {
                    ctx.offset = token.token.parse().map_err(|e| {
                        ConnectorError::config(format!(
                            "failed to parse offset token '{}': {e}",
                            token.token
                        ))
                    })?;
                }
            }
            PaginationStrategy::Cursor => {
                ctx.cursor = token.token.clone();
            }
        }

        Ok(Some(ctx))
    }

    /// The per-page row quota.
    #[must_use]
    pub fn page_size(&self) -> i64 {
        self.limit
    }

    /// The column that uniquely identifies a row, when configured.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The pagination strategy in play.
    #[must_use]
    pub fn strategy(&self) -> PaginationStrategy {
        self.strategy
    }

    /// Template bindings for this page.
    ///
    /// `limit` binds `page_size + 1` so the runner can distinguish the
    /// final page from one more page without a count query.
    #[must_use]
    pub fn bindings(&self) -> HashMap<String, SqlValue> {
        HashMap::from([
            ("limit".to_string(), SqlValue::Int(self.limit + 1)),
            ("offset".to_string(), SqlValue::Int(self.offset)),
            ("cursor".to_string(), SqlValue::Text(self.cursor.clone())),
        ])
    }

    /// Produce the next-page token from the last observed row id.
    pub fn next_page_token(&self, last_row_id: &SqlValue) -> ConnectorResult<String> {
        match self.strategy {
            PaginationStrategy::Offset => {
                let next = match self.offset_mode {
                    OffsetTokenMode::Rows => self.offset + self.limit,
                    OffsetTokenMode::LegacyPages => self.offset * self.limit + self.limit,
                };
                Ok(next.to_string())
            }
            PaginationStrategy::Cursor => match last_row_id {
                SqlValue::Text(s) => Ok(s.clone()),
                SqlValue::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
                SqlValue::Int(i) => Ok(i.to_string()),
                other => Err(ConnectorError::type_error(
                    "string or integer primary key",
                    other.type_name(),
                )),
            },
        }
    }
}
