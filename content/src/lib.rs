//! Page-resident half of the sticker suggestion pipeline.
//!
//! The host document is reached only through the [`page::Page`] trait. A
//! [`ContentApp`] resolved for the page's [`adapters::SiteAdapter`] watches the
//! page's inputs, runs analysis-and-search cycles, renders the suggestion
//! panel, and hands picked candidates to the insertion executor.

pub mod adapters;
mod app;
pub mod app_event;
mod app_event_sender;
pub mod background;
pub mod insertion;
pub mod page;
pub mod panel;
#[cfg(test)]
mod test_page;
pub mod watcher;

pub use app::ContentApp;
pub use app::ContentConfig;
pub use app::SEARCH_ERROR_MESSAGE;
pub use app::Services;
pub use app_event::AppEvent;
pub use app_event_sender::AppEventSender;
