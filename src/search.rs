use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{find_magic, CampaignApi, MagicFilter};
use crate::debounce::Debouncer;
use crate::dnd::Magic;

pub(crate) const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SearchState {
    pub loading: bool,
    pub spells: Vec<Magic>,
    /// Why the latest search came back empty, if it failed.
    pub error: Option<String>,
}

/// Catalogue search driven by filter edits.
///
/// Requests carry a sequence number; an answer that is not for the newest request is
/// thrown away, so a slow old search cannot overwrite a newer result.
pub(crate) struct SpellSearch {
    api: Arc<dyn CampaignApi>,
    filter: MagicFilter,
    issued: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState>>,
    debounce: Debouncer,
}

impl SpellSearch {
    pub fn new(api: Arc<dyn CampaignApi>) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            api,
            filter: MagicFilter::default(),
            issued: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            debounce: Debouncer::new(SEARCH_DEBOUNCE),
        }
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Stores the filter and searches once edits go quiet.
    pub fn set_filter(&mut self, filter: MagicFilter) {
        self.filter = filter;
        self.state.send_modify(|state| state.loading = true);
        let request = self.request(self.filter.clone());
        self.debounce.schedule(request.run());
    }

    /// Searches with `filter` right away, skipping the debounce.
    pub fn issue(&mut self, filter: MagicFilter) -> JoinHandle<()> {
        self.debounce.cancel();
        self.filter = filter;
        self.state.send_modify(|state| state.loading = true);
        tokio::spawn(self.request(self.filter.clone()).run())
    }

    fn request(&self, filter: MagicFilter) -> Request {
        Request {
            api: Arc::clone(&self.api),
            filter,
            sequence: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
            issued: Arc::clone(&self.issued),
            state: Arc::clone(&self.state),
        }
    }
}

struct Request {
    api: Arc<dyn CampaignApi>,
    filter: MagicFilter,
    sequence: u64,
    issued: Arc<AtomicU64>,
    state: Arc<watch::Sender<SearchState>>,
}

impl Request {
    async fn run(self) {
        let sequence = self.sequence;
        log::debug!("Search #{} for {:?}", sequence, self.filter);
        let (spells, error) = match find_magic(self.api.as_ref(), &self.filter).await {
            Ok(spells) => (spells, None),
            Err(e) => {
                log::error!("Spell search failed: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };
        if self.issued.load(Ordering::SeqCst) != sequence {
            log::debug!("Discarding stale search #{}", sequence);
            return;
        }
        self.state.send_replace(SearchState {
            loading: false,
            spells,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnd::SpellLevel;
    use crate::testing::{spell, FakeApi};

    fn catalogue() -> Arc<FakeApi> {
        Arc::new(FakeApi::with_magic(vec![
            spell("Bola de Fogo", SpellLevel::Level(3), "fogo"),
            spell("Raio de Gelo", SpellLevel::Cantrip, "frio"),
            spell("Misseis Magicos", SpellLevel::Level(1), "energia"),
        ]))
    }

    fn named(name: &str) -> MagicFilter {
        MagicFilter {
            name: name.to_string(),
            ..MagicFilter::default()
        }
    }

    fn names(state: &SearchState) -> Vec<&str> {
        state.spells.iter().map(|m| m.name.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn typing_searches_once_after_quiet_period() {
        let api = catalogue();
        let mut search = SpellSearch::new(api.clone());

        for typed in ["b", "bo", "bol"] {
            search.set_filter(named(typed));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(search.state().loading);

        tokio::time::sleep(SEARCH_DEBOUNCE).await;
        tokio::task::yield_now().await;
        let state = search.state();
        assert!(!state.loading);
        assert_eq!(names(&state), vec!["Bola de Fogo"]);
        assert_eq!(search.issued.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_filter_lists_everything() {
        let api = catalogue();
        let mut search = SpellSearch::new(api);
        search.issue(MagicFilter::default()).await.unwrap();
        assert_eq!(search.state().spells.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn filters_by_level_and_type() {
        let api = catalogue();
        let mut search = SpellSearch::new(api);
        search
            .issue(MagicFilter {
                level: "Truque".to_string(),
                ..MagicFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(names(&search.state()), vec!["Raio de Gelo"]);

        search
            .issue(MagicFilter {
                kind: "energia".to_string(),
                ..MagicFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(names(&search.state()), vec!["Misseis Magicos"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_is_discarded() {
        let api = catalogue();
        api.slow_names
            .lock()
            .unwrap()
            .push(("raio".to_string(), Duration::from_secs(3)));
        let mut search = SpellSearch::new(api.clone());

        let slow = search.issue(named("raio"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = search.issue(named("bola"));
        fast.await.unwrap();
        assert_eq!(names(&search.state()), vec!["Bola de Fogo"]);

        slow.await.unwrap();
        assert_eq!(names(&search.state()), vec!["Bola de Fogo"]);
        assert_eq!(search.filter, named("bola"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_search_reports_error() {
        let api = catalogue();
        *api.fail_list.lock().unwrap() = true;
        let mut search = SpellSearch::new(api.clone());
        search.issue(MagicFilter::default()).await.unwrap();
        let state = search.state();
        assert!(state.spells.is_empty());
        assert!(state.error.is_some());

        *api.fail_list.lock().unwrap() = false;
        search.issue(named("bola")).await.unwrap();
        let state = search.state();
        assert_eq!(names(&state), vec!["Bola de Fogo"]);
        assert_eq!(state.error, None);
    }
}
