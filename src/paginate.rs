//! Sequential retrieval of every page of a finished query.
//!
//! The page count is fixed up front from the handle's row total. Pages are
//! fetched one after another starting at 1; an empty page does not end the
//! loop early. The first failing fetch aborts the whole operation and no
//! partial result is returned. There is no retry here: when the service
//! rejects large pages, rerun with a smaller page size.

use crate::{FlipsideError, PageRequest, QueryHandle, Record, Result};

/// Page size used by the bundled script.
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;

/// Something that can return one page of a query result.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<Record>>;
}

/// Number of pages needed to cover `total_rows`; zero rows need zero pages.
///
/// `page_size` must be positive.
pub fn page_count(total_rows: u64, page_size: u64) -> u64 {
    total_rows.div_ceil(page_size)
}

/// Fetches all pages of `handle` and concatenates their records in order.
pub async fn paginate<S>(source: &S, handle: &QueryHandle, page_size: u64) -> Result<Vec<Record>>
where
    S: PageSource + ?Sized,
{
    if page_size == 0 {
        return Err(FlipsideError::InvalidArgument(
            "page size must be greater than zero".to_owned(),
        ));
    }

    let pages = page_count(handle.total_rows, page_size);
    let mut all_rows = Vec::new();

    for page_number in 1..=pages {
        let records = source
            .fetch_page(PageRequest {
                query_id: &handle.query_id,
                page_number,
                page_size,
            })
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            query_id = %handle.query_id,
            page = page_number,
            of = pages,
            records = records.len(),
            "fetched result page"
        );

        all_rows.extend(records);
    }

    #[cfg(feature = "tracing")]
    tracing::info!(
        query_id = %handle.query_id,
        pages,
        rows = all_rows.len(),
        "pagination complete"
    );

    Ok(all_rows)
}
