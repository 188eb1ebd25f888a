use std::sync::Arc;
use std::time::Duration;

use sticker_media_search::DEFAULT_RESULT_LIMIT;
use sticker_media_search::MediaSearch;
use sticker_media_search::SearchError;
use sticker_media_search::strip_links;
use sticker_protocol::analysis::AnalysisResponse;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::adapters::Site;
use crate::adapters::SiteAdapter;
use crate::adapters::X_DM_SEND_BUTTON;
use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::background;
use crate::background::BackgroundChannel;
use crate::insertion;
use crate::insertion::MediaFetcher;
use crate::page::ElementId;
use crate::page::KeyPress;
use crate::page::Page;
use crate::panel::ERROR_DISMISS_DELAY;
use crate::panel::SuggestionPanel;
use crate::watcher::Debouncer;
use crate::watcher::InputWatcher;

pub const SEARCH_ERROR_MESSAGE: &str = "Failed to load suggestions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentConfig {
    /// Trimmed text shorter than this hides the panel instead of analyzing.
    pub min_trigger_chars: usize,
    pub typing_debounce: Duration,
    pub search_limit: usize,
    /// A search still pending after this ends the cycle with a timeout, so a
    /// stalled backend cannot hold `is_processing` forever.
    pub search_deadline: Duration,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_trigger_chars: 3,
            typing_debounce: Duration::from_millis(500),
            search_limit: DEFAULT_RESULT_LIMIT,
            search_deadline: Duration::from_secs(15),
        }
    }
}

/// Out-of-page collaborators the pipeline calls into.
#[derive(Clone)]
pub struct Services {
    pub background: Arc<dyn BackgroundChannel>,
    pub search: Arc<dyn MediaSearch>,
    pub fetcher: Arc<dyn MediaFetcher>,
}

/// Owns every piece of mutable pipeline state for one page.
///
/// All mutation happens in [`ContentApp::handle_event`] (and
/// [`ContentApp::handle_key`]) on the task that drives the app; spawned work
/// reports back exclusively through [`AppEvent`]s.
pub struct ContentApp<P: Page> {
    page: P,
    adapter: SiteAdapter,
    config: ContentConfig,
    services: Services,
    app_event_tx: AppEventSender,

    watcher: InputWatcher<P>,
    panel: SuggestionPanel,
    typing: Debouncer,
    active_input: Option<ElementId>,

    /// Set while an analysis-and-search cycle is in flight.
    is_processing: bool,
    current_cycle: Option<u64>,
    next_cycle: u64,
}

impl<P: Page> ContentApp<P> {
    pub fn new(
        page: P,
        adapter: SiteAdapter,
        config: ContentConfig,
        services: Services,
        app_event_tx: AppEventSender,
    ) -> Self {
        let watcher = InputWatcher::new(page.clone(), adapter.input_selector, app_event_tx.clone());
        Self {
            page,
            adapter,
            config,
            services,
            app_event_tx,
            watcher,
            panel: SuggestionPanel::new(adapter.theme),
            typing: Debouncer::new(config.typing_debounce),
            active_input: None,
            is_processing: false,
            current_cycle: None,
            next_cycle: 1,
        }
    }

    pub fn adapter(&self) -> &SiteAdapter {
        &self.adapter
    }

    pub fn panel(&self) -> &SuggestionPanel {
        &self.panel
    }

    pub fn active_input(&self) -> Option<ElementId> {
        self.active_input
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// Probes the background service and attaches to the inputs already on
    /// the page.
    pub async fn initialize(&mut self) {
        match background::ping(self.services.background.as_ref()).await {
            Ok(message) => tracing::debug!("background service: {message}"),
            Err(err) => tracing::warn!("background service did not answer ping: {err}"),
        }
        let attached = self.watcher.rescan();
        tracing::info!(
            site = self.adapter.site_name,
            inputs = attached.len(),
            "suggestion pipeline ready"
        );
    }

    /// Drives the app until every sender is gone.
    pub async fn run(mut self, mut app_event_rx: UnboundedReceiver<AppEvent>) {
        self.initialize().await;
        while let Some(event) = app_event_rx.recv().await {
            self.handle_event(event);
        }
        self.panel.close(&self.page);
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::NodesAdded(nodes) => self.watcher.on_nodes_added(&nodes),
            AppEvent::RescanInputs => {
                self.watcher.rescan();
            }
            AppEvent::InputChanged { element, text } => self.on_input_changed(element, &text),
            AppEvent::InputSessionEnded { element } => {
                self.watcher.end_session(element);
                if self.active_input == Some(element) {
                    self.active_input = None;
                }
                if self.panel.anchor() == Some(element) {
                    self.panel.close(&self.page);
                }
            }
            AppEvent::TypingSettled { element, text } => self.start_cycle(element, text),
            AppEvent::AnalysisFinished {
                cycle,
                element,
                response,
            } => self.on_analysis_finished(cycle, element, response),
            AppEvent::SearchFinished {
                cycle,
                generation,
                result,
            } => {
                if self.current_cycle == Some(cycle) {
                    self.finish_cycle();
                }
                match result {
                    Ok(candidates) => {
                        self.panel
                            .show_candidates(&self.page, generation, candidates);
                    }
                    Err(err) => {
                        tracing::warn!(kind = %err.kind(), "image search failed: {err}");
                        if self
                            .panel
                            .show_error(&self.page, generation, SEARCH_ERROR_MESSAGE)
                        {
                            self.send_after(
                                ERROR_DISMISS_DELAY,
                                AppEvent::ErrorPanelExpired { generation },
                            );
                        }
                    }
                }
            }
            AppEvent::ErrorPanelExpired { generation } => {
                self.panel.expire_error(&self.page, generation);
            }
            AppEvent::CandidateClicked { generation, index } => {
                if let Some(candidate) = self.panel.select(&self.page, generation, index) {
                    self.spawn_insertion(candidate.full_url);
                }
            }
            AppEvent::InputClicked { element } => {
                if self.watcher.is_attached(element) {
                    self.active_input = Some(element);
                }
            }
            AppEvent::DocumentClicked { target } => {
                self.panel
                    .close_on_outside_click(&self.page, target, self.active_input);
            }
            AppEvent::KeyPressed { target, key } => {
                self.handle_key(target, &key);
            }
            AppEvent::ViewportChanged => self.panel.reposition(&self.page),
            AppEvent::InsertionFinished { url, result } => match result {
                Ok(()) => tracing::info!(site = self.adapter.site_name, "inserted {url}"),
                Err(err) => tracing::error!(
                    site = self.adapter.site_name,
                    kind = %err.kind(),
                    "failed to insert {url}: {err}"
                ),
            },
        }
    }

    /// Handles a keydown. Returns `true` when the host should suppress the
    /// key's default action.
    pub fn handle_key(&mut self, target: ElementId, key: &KeyPress) -> bool {
        if key.is_escape() && self.panel.is_open() {
            self.panel.close(&self.page);
            return true;
        }

        // The X direct-message composer ignores synthetic input; Enter has to
        // go through its send button.
        if self.adapter.site == Site::XDirectMessages
            && key.is_plain_enter()
            && self.watcher.is_attached(target)
        {
            if let Some(button) = self.page.query_selector(X_DM_SEND_BUTTON) {
                self.page.click(button);
            }
            return true;
        }
        false
    }

    fn on_input_changed(&mut self, element: ElementId, text: &str) {
        self.active_input = Some(element);
        let text = text.trim();
        if text.chars().count() < self.config.min_trigger_chars {
            self.typing.cancel();
            self.panel.close(&self.page);
            return;
        }
        self.typing.schedule(
            &self.app_event_tx,
            AppEvent::TypingSettled {
                element,
                text: text.to_string(),
            },
        );
    }

    fn start_cycle(&mut self, element: ElementId, text: String) {
        if self.is_processing {
            tracing::debug!("suggestion cycle in flight; dropping settled text");
            return;
        }
        self.is_processing = true;
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        self.current_cycle = Some(cycle);

        let text = strip_links(&text);
        let background = Arc::clone(&self.services.background);
        let app_event_tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let response = background::analyze(background.as_ref(), &text).await;
            app_event_tx.send(AppEvent::AnalysisFinished {
                cycle,
                element,
                response,
            });
        });
    }

    fn on_analysis_finished(&mut self, cycle: u64, element: ElementId, response: AnalysisResponse) {
        if self.current_cycle != Some(cycle) {
            return;
        }
        if !response.success {
            tracing::debug!(
                error = response.error.as_deref().unwrap_or_default(),
                "analysis fell back to keywords"
            );
        }

        let Some(query) = response.data.search_query() else {
            tracing::debug!("no usable search query; skipping search");
            self.finish_cycle();
            self.panel.close(&self.page);
            return;
        };

        let generation = self.panel.begin_loading(&self.page, element);
        let search = Arc::clone(&self.services.search);
        let limit = self.config.search_limit;
        let deadline = self.config.search_deadline;
        let app_event_tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(deadline, search.search(&query, limit))
                .await
                .unwrap_or(Err(SearchError::Timeout { after: deadline }));
            app_event_tx.send(AppEvent::SearchFinished {
                cycle,
                generation,
                result,
            });
        });
    }

    fn finish_cycle(&mut self) {
        self.is_processing = false;
        self.current_cycle = None;
    }

    fn spawn_insertion(&self, url: String) {
        let page = self.page.clone();
        let fetcher = Arc::clone(&self.services.fetcher);
        let adapter = self.adapter;
        let active_input = self.active_input;
        let app_event_tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let result =
                insertion::insert(&page, fetcher.as_ref(), &adapter, active_input, &url).await;
            app_event_tx.send(AppEvent::InsertionFinished { url, result });
        });
    }

    fn send_after(&self, delay: Duration, event: AppEvent) {
        let app_event_tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            app_event_tx.send(event);
        });
    }
}
