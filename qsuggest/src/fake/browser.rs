use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use qsuggest_config::configuration::BrowserConfig;
use qsuggest_core::{SignedState, Snapshot, SnapshotKind};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{
    search_url, AddonHandle, AddonManager, BrowserError, HistoryStore, NamedKey, NavigationObserver,
    PrefValue, PreferenceStore, ResultRow, RowSource, SnapshotSource, UiDriver, WindowId,
    ABOUT_BLANK, ATTRIBUTION_URL_PREF, PRIVATE_SUGGESTIONS_PREF, SEARCH_TERMS, SUGGESTIONS_PREF,
};
use crate::fake::addon::AddonRegistry;
use crate::fake::prefs::FakePrefs;
use crate::fake::telemetry::FakeTelemetry;
use crate::fake::urlbar::{EngagementEnd, Urlbar};

/// Upper bound for [`NavigationObserver::await_load`].
const LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// In-process browser with just enough behaviour for the quick suggest scenarios.
///
/// Every window has one tab and one address bar. Typing queries the installed add-ons for a
/// quick suggestion, picking a row navigates the tab asynchronously and engagements feed the
/// telemetry store. Cloning is cheap, clones share all state.
#[derive(Clone)]
pub struct FakeBrowser {
    inner: Arc<BrowserInner>,
}

struct BrowserInner {
    search_url_template: String,
    load_latency: Duration,
    main: WindowId,
    next_window: AtomicU64,
    windows: DashMap<WindowId, WindowState>,
    prefs: FakePrefs,
    addons: AddonRegistry,
    telemetry: FakeTelemetry,
    history: RwLock<Vec<Url>>,
    bookmarks: RwLock<Vec<Url>>,
    http: reqwest::Client,
}

struct WindowState {
    private: bool,
    urlbar: Urlbar,
    load: Arc<watch::Sender<LoadState>>,
}

impl WindowState {
    fn new(private: bool) -> Self {
        let (load, _) = watch::channel(LoadState::default());
        WindowState {
            private,
            urlbar: Urlbar::default(),
            load: Arc::new(load),
        }
    }
}

/// Navigation state of a tab. Navigations are numbered, a tab is loaded once the last
/// requested navigation completed.
#[derive(Clone, Debug)]
struct LoadState {
    requested: u64,
    completed: u64,
    uri: Url,
}

impl Default for LoadState {
    fn default() -> Self {
        LoadState {
            requested: 0,
            completed: 0,
            uri: blank(),
        }
    }
}

impl LoadState {
    fn is_loaded(&self) -> bool {
        self.completed == self.requested
    }
}

fn blank() -> Url {
    Url::parse(ABOUT_BLANK).expect("hard-coded blank uri should be valid")
}

impl FakeBrowser {
    pub fn new(config: &BrowserConfig) -> Result<FakeBrowser> {
        if !config.search_url_template.contains(SEARCH_TERMS) {
            bail!(
                "search url template {:?} lacks {SEARCH_TERMS}",
                config.search_url_template
            );
        }
        Url::parse(&config.search_url_template.replace(SEARCH_TERMS, "test"))
            .context("invalid search url template")?;

        let main = WindowId::new(1);
        let windows = DashMap::new();
        windows.insert(main, WindowState::new(false));

        Ok(FakeBrowser {
            inner: Arc::new(BrowserInner {
                search_url_template: config.search_url_template.clone(),
                load_latency: config.load_latency(),
                main,
                next_window: AtomicU64::new(main.raw() + 1),
                windows,
                prefs: FakePrefs::default(),
                addons: AddonRegistry::default(),
                telemetry: FakeTelemetry::new(config.content_latency()),
                history: RwLock::new(Vec::new()),
                bookmarks: RwLock::new(Vec::new()),
                http: reqwest::Client::new(),
            }),
        })
    }

    pub fn search_url(&self, term: &str) -> Result<Url, BrowserError> {
        search_url(&self.inner.search_url_template, term)
    }

    #[cfg(test)]
    pub async fn bookmark(&self, url: Url) {
        self.inner.bookmarks.write().await.push(url);
    }

    #[cfg(test)]
    pub async fn bookmarks(&self) -> Vec<Url> {
        self.inner.bookmarks.read().await.clone()
    }

    fn window(&self, window: WindowId) -> Result<RefMut<'_, WindowId, WindowState>, BrowserError> {
        self.inner
            .windows
            .get_mut(&window)
            .ok_or(BrowserError::UnknownWindow(window))
    }

    fn provider_active(&self, private: bool) -> bool {
        let prefs = &self.inner.prefs;
        prefs.get_bool(SUGGESTIONS_PREF) && (!private || prefs.get_bool(PRIVATE_SUGGESTIONS_PREF))
    }

    /// Popup rows for the typed text: the heuristic search row, followed by a quick suggestion
    /// when the provider is active and knows the text.
    fn rows_for(&self, text: &str, private: bool) -> Result<Vec<ResultRow>, BrowserError> {
        let term = text.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = vec![ResultRow {
            source: RowSource::Heuristic,
            title: term.to_owned(),
            url: self.search_url(term)?,
        }];
        if self.provider_active(private) {
            if let Some((provider, suggested)) = self.inner.addons.suggestion_for(term) {
                rows.push(ResultRow {
                    url: self.search_url(&suggested)?,
                    source: RowSource::QuickSuggest { provider },
                    title: suggested,
                });
            }
        }
        Ok(rows)
    }

    fn end_engagement(&self, end: Option<EngagementEnd>) {
        if let Some(end) = end {
            self.inner.telemetry.record_engagement(end);
        }
    }

    /// Requests a navigation and completes it in the background after the load latency. A
    /// newer request supersedes this one.
    fn navigate(&self, load: Arc<watch::Sender<LoadState>>, uri: Url, ping: Option<String>) {
        let mut navigation = 0;
        load.send_modify(|state| {
            state.requested += 1;
            navigation = state.requested;
        });
        debug!(%uri, navigation, "navigation requested");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            if let Some(ping) = ping {
                match inner.http.get(&ping).send().await {
                    Ok(response) => debug!(%ping, status = %response.status(), "attribution sent"),
                    Err(error) => warn!(%ping, "attribution request failed: {error}"),
                }
            }

            tokio::time::sleep(inner.load_latency).await;

            // The visit is recorded under the history lock before waiters see the completion.
            let mut history = inner.history.write().await;
            let mut current = false;
            load.send_modify(|state| {
                if state.requested == navigation {
                    if uri.scheme() != "about" {
                        history.push(uri.clone());
                    }
                    state.completed = navigation;
                    state.uri = uri.clone();
                    current = true;
                }
            });
            if current {
                debug!(%uri, navigation, "navigation completed");
            }
        });
    }

    fn attribution_ping(&self, row: &ResultRow) -> Option<String> {
        row.provider()?;
        let url = self.inner.prefs.get_char(ATTRIBUTION_URL_PREF);
        (!url.is_empty()).then_some(url)
    }

    /// Picks the selected row of the window's popup, if any.
    fn pick(&self, window: WindowId) -> Result<(), BrowserError> {
        let (end, load) = {
            let mut state = self.window(window)?;
            (state.urlbar.pick(), state.load.clone())
        };
        let Some(mut end) = end else {
            return Ok(());
        };

        if let Some(row) = end.picked.take() {
            info!(%window, url = %row.url, provider = row.provider(), "picked result");
            let ping = self.attribution_ping(&row);
            self.navigate(load, row.url.clone(), ping);
            end.picked = Some(row);
        }
        self.end_engagement(Some(end));
        Ok(())
    }
}

#[async_trait]
impl UiDriver for FakeBrowser {
    fn main_window(&self) -> WindowId {
        self.inner.main
    }

    async fn open_window(&self, private: bool) -> Result<WindowId> {
        let window = WindowId::new(self.inner.next_window.fetch_add(1, Ordering::SeqCst));
        self.inner
            .windows
            .insert(window, WindowState::new(private));
        info!(%window, private, "window opened");
        Ok(window)
    }

    async fn close_window(&self, window: WindowId) -> Result<()> {
        if window == self.inner.main {
            return Err(BrowserError::MainWindow.into());
        }
        let (_, mut state) = self
            .inner
            .windows
            .remove(&window)
            .ok_or(BrowserError::UnknownWindow(window))?;
        self.end_engagement(state.urlbar.blur());
        info!(%window, "window closed");
        Ok(())
    }

    async fn load_uri(&self, window: WindowId, uri: &str) -> Result<()> {
        let uri = Url::parse(uri).with_context(|| format!("invalid uri {uri:?}"))?;
        let load = self.window(window)?.load.clone();
        self.navigate(load, uri, None);
        Ok(())
    }

    async fn focus_urlbar(&self, window: WindowId) -> Result<()> {
        self.window(window)?.urlbar.focus();
        Ok(())
    }

    async fn blur_urlbar(&self, window: WindowId) -> Result<()> {
        let end = self.window(window)?.urlbar.blur();
        self.end_engagement(end);
        Ok(())
    }

    async fn send_keys(&self, window: WindowId, text: &str) -> Result<()> {
        let mut state = self.window(window)?;
        if !state.urlbar.is_focused() {
            return Err(BrowserError::UrlbarNotFocused(window).into());
        }
        let typed = state.urlbar.type_text(text).to_owned();
        let rows = self.rows_for(&typed, state.private)?;
        debug!(%window, typed, rows = rows.len(), "address bar updated");
        state.urlbar.show(rows);
        Ok(())
    }

    async fn send_key(&self, window: WindowId, key: NamedKey) -> Result<()> {
        debug!(%window, %key, "key");
        match key {
            NamedKey::ArrowDown => self.window(window)?.urlbar.select_next(),
            NamedKey::ArrowUp => self.window(window)?.urlbar.select_previous(),
            NamedKey::Enter => self.pick(window)?,
            NamedKey::Escape => {
                let end = self.window(window)?.urlbar.abandon();
                self.end_engagement(end);
            }
        }
        Ok(())
    }

    async fn result_rows(&self, window: WindowId) -> Result<Vec<ResultRow>> {
        Ok(self.window(window)?.urlbar.rows().to_vec())
    }

    async fn current_uri(&self, window: WindowId) -> Result<Url> {
        Ok(self.window(window)?.load.borrow().uri.clone())
    }
}

#[async_trait]
impl NavigationObserver for FakeBrowser {
    async fn await_load(&self, window: WindowId) -> Result<Url> {
        let mut receiver = self.window(window)?.load.subscribe();
        let state = tokio::time::timeout(LOAD_TIMEOUT, receiver.wait_for(LoadState::is_loaded))
            .await
            .with_context(|| format!("timeout waiting for {window} to load"))?
            .map_err(|_| BrowserError::WindowClosed(window))?;
        Ok(state.uri.clone())
    }
}

#[async_trait]
impl AddonManager for FakeBrowser {
    async fn install(&self, path: &Path, expected: SignedState) -> Result<AddonHandle> {
        Ok(self.inner.addons.install(path, expected).await?)
    }

    async fn uninstall(&self, handle: &AddonHandle) -> Result<()> {
        Ok(self.inner.addons.uninstall(handle)?)
    }

    async fn installed(&self) -> Vec<AddonHandle> {
        self.inner.addons.installed()
    }
}

impl PreferenceStore for FakeBrowser {
    fn get(&self, name: &str) -> Option<PrefValue> {
        self.inner.prefs.get(name)
    }

    fn set(&self, name: &str, value: PrefValue) {
        self.inner.prefs.set(name, value)
    }

    fn clear(&self, name: &str) {
        self.inner.prefs.clear(name)
    }
}

#[async_trait]
impl HistoryStore for FakeBrowser {
    async fn clear_history(&self) -> Result<()> {
        self.inner.history.write().await.clear();
        Ok(())
    }

    async fn erase_bookmarks(&self) -> Result<()> {
        self.inner.bookmarks.write().await.clear();
        Ok(())
    }

    async fn visits(&self) -> Vec<Url> {
        self.inner.history.read().await.clone()
    }
}

#[async_trait]
impl SnapshotSource for FakeBrowser {
    async fn snapshot(&self, kind: SnapshotKind, clear: bool) -> Result<Snapshot> {
        Ok(self.inner.telemetry.snapshot(kind, clear).await)
    }

    async fn clear_scalars(&self) -> Result<()> {
        self.inner.telemetry.clear().await;
        Ok(())
    }
}
