//! The three data tabs.

pub mod builds;
pub mod dashboard;
pub mod views;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use throbber_widgets_tui::{Throbber, ThrobberState};

use crate::theme;

/// Data tagged with the selection it was fetched for. A slot only renders
/// while its key matches the current selection, so a response that arrives
/// after the user moved on is kept but never shown against the wrong item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed<K, T> {
    pub key: K,
    pub data: T,
}

impl<K: PartialEq, T> Keyed<K, T> {
    pub fn new(key: K, data: T) -> Self {
        Self { key, data }
    }

    /// The data, if it belongs to `key`.
    pub fn get(&self, key: &K) -> Option<&T> {
        (self.key == *key).then_some(&self.data)
    }
}

/// Read an optional keyed slot against an optional current key.
pub fn keyed<'a, K: PartialEq, T>(slot: Option<&'a Keyed<K, T>>, key: Option<&K>) -> Option<&'a T> {
    slot.zip(key).and_then(|(slot, key)| slot.get(key))
}

/// Fetch failures, each stored under the request that produced it.
///
/// Like [`Keyed`] data, a failure is only reported while its request is the
/// one on screen. Re-issuing or completing the same request clears it.
#[derive(Debug)]
pub struct Failures<K> {
    by_request: HashMap<K, Arc<jenkins_api::Error>>,
}

impl<K> Default for Failures<K> {
    fn default() -> Self {
        Self {
            by_request: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> Failures<K> {
    pub fn record(&mut self, request: K, err: Arc<jenkins_api::Error>) {
        self.by_request.insert(request, err);
    }

    pub fn clear(&mut self, request: &K) {
        self.by_request.remove(request);
    }

    pub fn get(&self, request: &K) -> Option<&Arc<jenkins_api::Error>> {
        self.by_request.get(request)
    }

    /// The first failure among `requests`, in the order given.
    pub fn first<'a>(
        &self,
        requests: impl IntoIterator<Item = &'a K>,
    ) -> Option<&Arc<jenkins_api::Error>>
    where
        K: 'a,
    {
        requests.into_iter().find_map(|r| self.get(r))
    }
}

/// Spinner line shown while a fetch is outstanding.
pub fn render_loading(frame: &mut Frame, area: Rect, label: &str, state: &ThrobberState) {
    let throbber = Throbber::default()
        .label(label.to_owned())
        .style(Style::default().fg(theme::DIM_WHITE))
        .throbber_style(Style::default().fg(theme::ELECTRIC_PURPLE));
    frame.render_stateful_widget(throbber, area, &mut state.clone());
}

/// One-line error banner.
pub fn render_error(frame: &mut Frame, area: Rect, err: &Arc<jenkins_api::Error>) {
    let line = Line::from(vec![
        Span::styled(" ✗ ", theme::error_text()),
        Span::styled(err.to_string(), Style::default().fg(theme::ERROR_RED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Case-insensitive substring filter.
pub fn matches_filter(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}

/// Client pointing at a closed local port; commands built from it are
/// inspected, never awaited.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn offline_client() -> Arc<jenkins_api::Client> {
    let session = jenkins_config::Profile::new("http://127.0.0.1:9", "bob", "tok")
        .to_session()
        .unwrap();
    Arc::new(jenkins_api::Client::new(session).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_slot_only_matches_its_key() {
        let slot = Keyed::new("release".to_owned(), vec![1, 2]);
        assert_eq!(slot.get(&"release".to_owned()), Some(&vec![1, 2]));
        assert_eq!(slot.get(&"nightly".to_owned()), None);
        assert_eq!(keyed(Some(&slot), None), None);
    }

    #[test]
    fn failures_are_reported_per_request() {
        let mut failures = Failures::default();
        failures.record("a", Arc::new(jenkins_api::Error::RateLimit));
        assert!(failures.first(&["b"]).is_none());
        assert!(failures.first(&["b", "a"]).is_some());

        failures.clear(&"a");
        assert!(failures.get(&"a").is_none());
    }

    #[test]
    fn filter_ignores_case() {
        assert!(matches_filter("Deploy-Prod", "prod"));
        assert!(matches_filter("anything", ""));
        assert!(!matches_filter("build", "deploy"));
    }
}
