//! Hands a chosen candidate to the host page's own compose flow.
//!
//! Upload procedures fetch the full-resolution media, assign it to the site's
//! hidden file input, wait for the page's upload pipeline to settle, then
//! activate the send control. Text procedures append a reference to the
//! composer instead.

use std::time::Duration;

use async_trait::async_trait;
use sticker_protocol::FailureKind;

use crate::adapters::InsertionProcedure;
use crate::adapters::SendActivation;
use crate::adapters::SiteAdapter;
use crate::adapters::UploadSteps;
use crate::page::ElementId;
use crate::page::KeyPress;
use crate::page::Page;
use crate::page::SyntheticEvent;
use crate::page::SyntheticFile;

pub const GIF_MIME_TYPE: &str = "image/gif";
/// Upper bound on downloading one candidate, body included.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("media fetch returned HTTP {status}")]
    Status { status: u16 },
    #[error("media fetch timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },
    #[error("media fetch failed: {0}")]
    Transport(#[source] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("{what} not found (tried {selectors})")]
    SelectorNotFound {
        what: &'static str,
        selectors: String,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("page refused the synthetic file")]
    UploadRejected,
    #[error("composer does not accept text")]
    TextRejected,
}

impl InsertError {
    pub fn kind(&self) -> FailureKind {
        match self {
            InsertError::SelectorNotFound { .. } => FailureKind::SelectorNotFound,
            InsertError::Fetch(_) | InsertError::UploadRejected | InsertError::TextRejected => {
                FailureKind::UploadFailed
            }
        }
    }

    fn not_found(what: &'static str, selectors: &[&str]) -> Self {
        InsertError::SelectorNotFound {
            what,
            selectors: selectors.join(" | "),
        }
    }
}

/// Downloads candidate media.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpMediaFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smart-sticker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Transport)?;
        Ok(Self { http, timeout })
    }

    fn request_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                after: self.timeout,
            }
        } else {
            FetchError::Transport(err)
        }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.request_error(err))?;
        Ok(bytes.to_vec())
    }
}

/// Runs the adapter's insertion procedure for `url`.
pub async fn insert<P: Page>(
    page: &P,
    fetcher: &dyn MediaFetcher,
    adapter: &SiteAdapter,
    active_input: Option<ElementId>,
    url: &str,
) -> Result<(), InsertError> {
    match adapter.insertion {
        InsertionProcedure::PlainText => {
            let input = composer(page, adapter, active_input)?;
            append_reference(page, input, url)
        }
        InsertionProcedure::MarkdownImage => {
            let input = composer(page, adapter, active_input)?;
            append_reference(page, input, &format!("![GIF]({url})"))
        }
        InsertionProcedure::Upload(steps) => {
            let result = upload(page, fetcher, adapter, &steps, active_input, url).await;
            if let Err(err) = &result
                && steps.text_fallback
            {
                tracing::warn!(
                    site = adapter.site_name,
                    "upload failed ({err}); inserting the link as text"
                );
                if let Err(fallback_err) = composer(page, adapter, active_input)
                    .and_then(|input| append_reference(page, input, url))
                {
                    tracing::warn!("text fallback failed: {fallback_err}");
                }
            }
            result
        }
    }
}

async fn upload<P: Page>(
    page: &P,
    fetcher: &dyn MediaFetcher,
    adapter: &SiteAdapter,
    steps: &UploadSteps,
    active_input: Option<ElementId>,
    url: &str,
) -> Result<(), InsertError> {
    let container = container(page, adapter, active_input);
    let file_input = find_first(page, container, steps.file_input_selectors)
        .ok_or_else(|| InsertError::not_found("file input", steps.file_input_selectors))?;

    let bytes = fetcher.fetch(url).await?;
    let file = SyntheticFile {
        name: steps.file_name.to_string(),
        mime_type: GIF_MIME_TYPE.to_string(),
        bytes,
    };
    if !page.assign_files(file_input, vec![file]) {
        return Err(InsertError::UploadRejected);
    }
    page.dispatch(file_input, SyntheticEvent::Change);

    tokio::time::sleep(steps.settle_delay).await;

    match steps.send {
        SendActivation::Click(selectors) => {
            let button = find_first(page, container, selectors)
                .ok_or_else(|| InsertError::not_found("send control", selectors))?;
            page.click(button);
        }
        SendActivation::EnterKey(selectors) => {
            let editable = find_first(page, container, selectors)
                .or(active_input)
                .ok_or_else(|| InsertError::not_found("editable input", selectors))?;
            page.dispatch(editable, SyntheticEvent::KeyDown(KeyPress::enter()));
        }
    }

    tracing::info!(site = adapter.site_name, "sticker sent");
    Ok(())
}

/// The compose container around the active input, or the first one in the
/// document.
fn container<P: Page>(
    page: &P,
    adapter: &SiteAdapter,
    active_input: Option<ElementId>,
) -> Option<ElementId> {
    active_input
        .and_then(|input| page.closest(input, adapter.container_selector))
        .or_else(|| page.query_selector(adapter.container_selector))
}

/// First match across `selectors`, looked up inside `scope` before falling
/// back to the whole document.
fn find_first<P: Page>(
    page: &P,
    scope: Option<ElementId>,
    selectors: &[&str],
) -> Option<ElementId> {
    let scoped = scope.and_then(|scope| {
        selectors
            .iter()
            .find_map(|selector| page.query_selector_within(scope, selector))
    });
    scoped.or_else(|| {
        selectors
            .iter()
            .find_map(|selector| page.query_selector(selector))
    })
}

fn composer<P: Page>(
    page: &P,
    adapter: &SiteAdapter,
    active_input: Option<ElementId>,
) -> Result<ElementId, InsertError> {
    active_input
        .filter(|input| page.is_connected(*input))
        .or_else(|| page.query_selector(adapter.input_selector))
        .ok_or_else(|| InsertError::not_found("text input", &[adapter.input_selector]))
}

fn append_reference<P: Page>(page: &P, input: ElementId, reference: &str) -> Result<(), InsertError> {
    let existing = page.text_value(input).ok_or(InsertError::TextRejected)?;
    let separator = if existing.is_empty() || existing.ends_with(char::is_whitespace) {
        ""
    } else {
        " "
    };
    if !page.append_text(input, &format!("{separator}{reference}")) {
        return Err(InsertError::TextRejected);
    }
    page.dispatch(input, SyntheticEvent::Input);
    Ok(())
}
