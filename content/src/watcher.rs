//! Discovery and polling of the page's text inputs.
//!
//! Target sites routinely swallow native `input` events, so each attached
//! element gets its own polling task that re-reads the value on a fixed
//! interval and reports differences. DOM churn is coalesced: mutation reports
//! only arm a debounced rescan instead of attaching immediately.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::page::ElementId;
use crate::page::Page;

pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const RESCAN_DEBOUNCE: Duration = Duration::from_millis(500);

/// A restartable one-shot timer: scheduling again cancels the pending event.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, app_event_tx: &AppEventSender, event: AppEvent) {
        self.cancel();
        let app_event_tx = app_event_tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            app_event_tx.send(event);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One attached input. The last observed value lives in the polling task.
#[derive(Debug)]
pub struct WatcherSession {
    poller: JoinHandle<()>,
}

impl WatcherSession {
    fn spawn<P: Page>(page: P, element: ElementId, app_event_tx: AppEventSender) -> Self {
        let mut last_value = page.text_value(element).unwrap_or_default();
        let poller = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !page.is_connected(element) {
                    app_event_tx.send(AppEvent::InputSessionEnded { element });
                    break;
                }
                let Some(current) = page.text_value(element) else {
                    continue;
                };
                if current != last_value {
                    last_value.clone_from(&current);
                    app_event_tx.send(AppEvent::InputChanged {
                        element,
                        text: current,
                    });
                }
            }
        });
        Self { poller }
    }
}

impl Drop for WatcherSession {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

pub struct InputWatcher<P: Page> {
    page: P,
    input_selector: &'static str,
    sessions: HashMap<ElementId, WatcherSession>,
    rescan: Debouncer,
    app_event_tx: AppEventSender,
}

impl<P: Page> InputWatcher<P> {
    pub fn new(page: P, input_selector: &'static str, app_event_tx: AppEventSender) -> Self {
        Self {
            page,
            input_selector,
            sessions: HashMap::new(),
            rescan: Debouncer::new(RESCAN_DEBOUNCE),
            app_event_tx,
        }
    }

    pub fn is_attached(&self, element: ElementId) -> bool {
        self.sessions.contains_key(&element)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Arms the rescan debounce when any added subtree contains an input.
    pub fn on_nodes_added(&mut self, added: &[ElementId]) {
        let has_input = added
            .iter()
            .any(|node| self.page.subtree_matches(*node, self.input_selector));
        if has_input {
            self.rescan.schedule(&self.app_event_tx, AppEvent::RescanInputs);
        }
    }

    /// Attaches to every matching input not already watched. Returns the
    /// newly attached elements.
    pub fn rescan(&mut self) -> Vec<ElementId> {
        let inputs = self.page.query_selector_all(self.input_selector);
        tracing::debug!(
            found = inputs.len(),
            attached = self.sessions.len(),
            "scanning for inputs"
        );

        let mut attached = Vec::new();
        for element in inputs {
            if self.sessions.contains_key(&element) {
                continue;
            }
            let session =
                WatcherSession::spawn(self.page.clone(), element, self.app_event_tx.clone());
            self.sessions.insert(element, session);
            attached.push(element);
        }
        attached
    }

    /// Drops the session for an element that left the document.
    pub fn end_session(&mut self, element: ElementId) {
        if self.sessions.remove(&element).is_some() {
            tracing::debug!(element = element.0, "input detached; polling stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_page::TestPage;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;

    const INPUT: &str = "textarea";

    fn watcher(page: &TestPage) -> (InputWatcher<TestPage>, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel();
        (
            InputWatcher::new(page.clone(), INPUT, AppEventSender::new(tx)),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn reports_polled_value_changes() {
        let page = TestPage::new();
        let input = page.add_input(&[INPUT], "");
        let (mut watcher, mut rx) = watcher(&page);

        assert_eq!(watcher.rescan(), vec![input]);
        page.set_text(input, "good morning");

        let Some(AppEvent::InputChanged { element, text }) = rx.recv().await else {
            panic!("expected input change");
        };
        assert_eq!((element, text.as_str()), (input, "good morning"));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_value_is_not_reported() {
        let page = TestPage::new();
        let input = page.add_input(&[INPUT], "same");
        let (mut watcher, mut rx) = watcher(&page);
        watcher.rescan();

        tokio::time::sleep(POLL_INTERVAL * 4).await;
        assert!(rx.try_recv().is_err());
        page.set_text(input, "same");
        tokio::time::sleep(POLL_INTERVAL * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rescan_never_attaches_twice() {
        let page = TestPage::new();
        let first = page.add_input(&[INPUT], "");
        let (mut watcher, _rx) = watcher(&page);

        assert_eq!(watcher.rescan(), vec![first]);
        assert_eq!(watcher.rescan(), Vec::<ElementId>::new());

        let second = page.add_input(&[INPUT], "");
        assert_eq!(watcher.rescan(), vec![second]);
        assert_eq!(watcher.session_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_input_ends_its_session() {
        let page = TestPage::new();
        let input = page.add_input(&[INPUT], "");
        let (mut watcher, mut rx) = watcher(&page);
        watcher.rescan();

        page.remove(input);
        let Some(AppEvent::InputSessionEnded { element }) = rx.recv().await else {
            panic!("expected session end");
        };
        assert_eq!(element, input);

        watcher.end_session(element);
        assert!(!watcher.is_attached(input));
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_bursts_collapse_into_one_rescan() {
        let page = TestPage::new();
        let (mut watcher, mut rx) = watcher(&page);
        let container = page.add_element(None, &["div"]);
        page.add_input_within(Some(container), &[INPUT], "");
        let unrelated = page.add_element(None, &["span"]);

        watcher.on_nodes_added(&[unrelated]);
        for _ in 0..5 {
            watcher.on_nodes_added(&[container]);
            tokio::time::advance(Duration::from_millis(100)).await;
        }

        assert!(matches!(rx.recv().await, Some(AppEvent::RescanInputs)));
        tokio::time::sleep(RESCAN_DEBOUNCE * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_mutations_do_not_rescan() {
        let page = TestPage::new();
        let (mut watcher, mut rx) = watcher(&page);
        let unrelated = page.add_element(None, &["span"]);

        watcher.on_nodes_added(&[unrelated]);
        tokio::time::sleep(RESCAN_DEBOUNCE * 2).await;
        assert!(rx.try_recv().is_err());
    }
}
