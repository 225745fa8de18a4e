//! Streaming row runner.
//!
//! Executes a templated query for one page and feeds each row to a
//! callback. The engine requests `page_size + 1` rows (the read-ahead
//! invariant) so it can tell a final page from one that is followed by
//! another without a separate count query.

use tracing::debug;

use sqlbridge_core::config::{Pagination, PaginationStrategy};
use sqlbridge_core::error::{ConnectorError, ConnectorResult};
use sqlbridge_core::value::{Row, SqlValue};

use crate::database::{Database, PreparedQuery};
use crate::pagination::{PageToken, PaginationContext};
use crate::template;

/// Run one page of a templated query, invoking `on_row` per row.
///
/// The callback returns `Ok(false)` to stop iterating early; an error
/// aborts the call. Returns the next-page token, or an empty string on
/// the terminal page. Rows are delivered in the exact order the database
/// returned them; for cursor pagination the configured SQL must order by
/// the primary-key column.
pub async fn run_query<F>(
    db: &dyn Database,
    token: &PageToken,
    query: &str,
    pagination: Option<&Pagination>,
    mut on_row: F,
) -> ConnectorResult<String>
where
    F: FnMut(&Row) -> ConnectorResult<bool>,
{
    let mut ctx = PaginationContext::setup(pagination, token)?;

    let prepared = match &ctx {
        Some(active) => {
            let rendered = template::render(db.engine(), query, &active.bindings())?;
            if !rendered.bound {
                // The query carries no pagination tokens; treat the
                // traversal as unpaginated for this call.
                debug!("query has no pagination tokens, downgrading to unpaginated");
                ctx = None;
            }
            PreparedQuery::with_params(rendered.sql, rendered.params)
        }
        None => PreparedQuery::new(query),
    };

    let rows = db.fetch(&prepared).await?;

    let page_size = ctx.as_ref().map(PaginationContext::page_size);
    let mut last_row_id: Option<SqlValue> = None;
    let mut row_count: i64 = 0;

    for row in &rows {
        row_count += 1;
        if let Some(size) = page_size {
            if row_count > size {
                break;
            }
        }

        if let Some(active) = &ctx {
            let key = active.primary_key();
            if !key.is_empty() {
                match row.get(key) {
                    Some(value) => last_row_id = Some(value.clone()),
                    None => {
                        return Err(ConnectorError::MissingPrimaryKey {
                            column: key.to_string(),
                        })
                    }
                }
            } else if active.strategy() == PaginationStrategy::Cursor {
                return Err(ConnectorError::MissingPrimaryKey {
                    column: String::new(),
                });
            }
        }

        if !on_row(row)? {
            break;
        }
    }

    if let (Some(active), Some(size)) = (&ctx, page_size) {
        if row_count > size {
            let last = last_row_id.unwrap_or(SqlValue::Null);
            return active.next_page_token(&last);
        }
    }

    Ok(String::new())
}
