//! Keyset pagination shared by the full-table listings.
//!
//! A listing is a lazy stream that fetches one fixed-size page at a time,
//! resuming after the key of the last row it yielded. A page shorter than
//! [`PAGE_SIZE`] ends the stream. Rows inserted or deleted while a listing is
//! in progress may or may not be observed: a row whose key sorts after the
//! cursor shows up, one that sorts before it does not.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::gateway::RowStream;
use devbridge_core::db::StorageError;

/// Rows fetched per page.
pub const PAGE_SIZE: usize = 10;

/// `PAGE_SIZE` as bound into `LIMIT ?`.
#[allow(clippy::cast_possible_wrap)]
pub(super) const PAGE_LIMIT: i64 = PAGE_SIZE as i64;

/// Drive `fetch_page` until a short page, yielding every row.
///
/// `fetch_page` receives `None` for the first page and afterwards the key of
/// the last row of the previous page. `cancel` is checked before each fetch;
/// cancellation ends the stream with [`StorageError::Cancelled`]. Any fetch
/// error is yielded once and ends the stream.
pub(super) fn paginate<'a, T, K, F, Fut>(
    cancel: CancellationToken,
    cursor_of: fn(&T) -> K,
    mut fetch_page: F,
) -> RowStream<'a, T>
where
    T: Send + 'a,
    K: Send + 'a,
    F: FnMut(Option<K>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Vec<T>, StorageError>> + Send + 'a,
{
    Box::pin(async_stream::stream! {
        let mut cursor: Option<K> = None;
        let mut pages = 0usize;

        loop {
            if cancel.is_cancelled() {
                debug!(pages, "Paged listing cancelled");
                yield Err(StorageError::Cancelled);
                return;
            }

            let page = match fetch_page(cursor.take()).await {
                Ok(page) => page,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            pages += 1;

            let exhausted = page.len() < PAGE_SIZE;
            debug!(page = pages, rows = page.len(), "Fetched page");
            cursor = page.last().map(cursor_of);

            for row in page {
                yield Ok(row);
            }

            if exhausted {
                return;
            }
        }
    })
}
