// Page-by-page walker shared by the group and voucher listings.
//
// Omada pages are 1-based. The walk ends when
// `currentPage * currentSize >= totalRows`, when the controller returns
// an empty page, after `ceil(totalRows / pageSize) + 1` pages, when the
// caller cancels, or on the first page that still fails after one retry
// of a transient error. A failure never discards what was already
// collected.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;
use crate::types::Page;

/// Page size for voucher-group listings.
pub const GROUP_PAGE_SIZE: u32 = 100;

/// Page size for voucher listings inside a group (controller maximum).
pub const VOUCHER_PAGE_SIZE: u32 = 1000;

/// Pause before re-requesting a page that failed with a transient error.
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Result of walking every page of a listing.
#[derive(Debug)]
pub struct PageWalk<T> {
    /// Items in page order.
    pub items: Vec<T>,
    /// Number of page requests issued.
    pub pages_fetched: u32,
    /// The error that cut the walk short, if any.
    pub error: Option<Error>,
}

impl<T> PageWalk<T> {
    /// `true` if every page was fetched.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    fn empty() -> Self {
        Self {
            items: Vec::new(),
            pages_fetched: 0,
            error: None,
        }
    }
}

/// Collect all pages into a single [`PageWalk`].
///
/// `fetch(page, page_size)` issues one request. `label` only feeds log lines.
pub async fn collect_pages<T, F, Fut>(
    label: &str,
    page_size: u32,
    cancel: &CancellationToken,
    mut fetch: F,
) -> PageWalk<T>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, Error>>,
{
    let mut walk = PageWalk::empty();
    let mut page_no: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            debug!(resource = label, page = page_no, "page walk cancelled");
            walk.error = Some(Error::Cancelled);
            break;
        }

        let mut result = fetch(page_no, page_size).await;
        if result.as_ref().is_err_and(Error::is_transient) && !cancel.is_cancelled() {
            warn!(resource = label, page = page_no, "transient page failure, retrying once");
            tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
            result = fetch(page_no, page_size).await;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    resource = label,
                    page = page_no,
                    collected = walk.items.len(),
                    error = %e,
                    "page fetch failed, keeping partial results"
                );
                walk.error = Some(e);
                break;
            }
        };
        walk.pages_fetched += 1;

        let received = page.data.len();
        let more = page.has_more();
        // Guards against a controller whose page counters never add up.
        let ceiling = page.total_rows.div_ceil(u64::from(page_size.max(1))) + 1;
        walk.items.extend(page.data);

        debug!(
            resource = label,
            page = page_no,
            received,
            total_rows = page.total_rows,
            "fetched page"
        );

        if !more || received == 0 {
            break;
        }
        if u64::from(page_no) >= ceiling {
            warn!(
                resource = label,
                page = page_no,
                total_rows = page.total_rows,
                "page count exceeds totalRows, stopping walk"
            );
            break;
        }
        page_no += 1;
    }

    walk
}
