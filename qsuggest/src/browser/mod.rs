//! Interfaces through which scenarios reach the browser.
//!
//! The scenarios never touch browser internals. Everything they do goes through one of these
//! traits, which keeps them runnable against any implementation, the in-process
//! [`crate::fake::FakeBrowser`] included.

mod types;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use qsuggest_core::{SignedState, Snapshot, SnapshotKind};
use url::form_urlencoded::byte_serialize;
use url::Url;

pub use types::{AddonHandle, BrowserError, NamedKey, PrefValue, ResultRow, RowSource, WindowId};

pub const SUGGESTIONS_PREF: &str = "browser.search.suggest.enabled";
pub const PRIVATE_SUGGESTIONS_PREF: &str = "browser.search.suggest.enabled.private";
pub const ATTRIBUTION_URL_PREF: &str = "browser.partnerlink.attributionURL";

pub const ABOUT_BLANK: &str = "about:blank";

/// Placeholder for the form-urlencoded search terms in a search URL template.
pub const SEARCH_TERMS: &str = "{searchTerms}";

/// Search URL for `term` from a template containing [`SEARCH_TERMS`].
pub fn search_url(template: &str, term: &str) -> Result<Url, BrowserError> {
    let encoded: String = byte_serialize(term.as_bytes()).collect();
    Url::parse(&template.replace(SEARCH_TERMS, &encoded)).map_err(|source| {
        BrowserError::InvalidSearchUrl {
            term: term.to_owned(),
            source,
        }
    })
}

/// Read access to recorded telemetry.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Current scalars of the given kind. With `clear` the returned scalars are removed from the
    /// store.
    async fn snapshot(&self, kind: SnapshotKind, clear: bool) -> Result<Snapshot>;

    async fn clear_scalars(&self) -> Result<()>;
}

/// Simulated user input and the visible state it produces.
#[async_trait]
pub trait UiDriver: Send + Sync {
    fn main_window(&self) -> WindowId;

    async fn open_window(&self, private: bool) -> Result<WindowId>;

    async fn close_window(&self, window: WindowId) -> Result<()>;

    /// Starts loading `uri` in the selected tab of `window`.
    async fn load_uri(&self, window: WindowId, uri: &str) -> Result<()>;

    async fn focus_urlbar(&self, window: WindowId) -> Result<()>;

    /// Moves focus away from the address bar, closing its popup.
    async fn blur_urlbar(&self, window: WindowId) -> Result<()>;

    async fn send_keys(&self, window: WindowId, text: &str) -> Result<()>;

    async fn send_key(&self, window: WindowId, key: NamedKey) -> Result<()>;

    /// Rows currently shown by the address bar popup.
    async fn result_rows(&self, window: WindowId) -> Result<Vec<ResultRow>>;

    async fn current_uri(&self, window: WindowId) -> Result<Url>;
}

#[async_trait]
pub trait NavigationObserver: Send + Sync {
    /// Resolves once the most recently requested navigation of the window's selected tab has
    /// completed, with the URI it landed on.
    async fn await_load(&self, window: WindowId) -> Result<Url>;
}

#[async_trait]
pub trait AddonManager: Send + Sync {
    async fn install(&self, path: &Path, expected: SignedState) -> Result<AddonHandle>;

    async fn uninstall(&self, handle: &AddonHandle) -> Result<()>;

    async fn installed(&self) -> Vec<AddonHandle>;
}

pub trait PreferenceStore: Send + Sync {
    fn get(&self, name: &str) -> Option<PrefValue>;

    fn set(&self, name: &str, value: PrefValue);

    /// Drops the user value, falling back to the default.
    fn clear(&self, name: &str);

    fn get_bool(&self, name: &str) -> bool {
        self.get(name)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    fn get_char(&self, name: &str) -> String {
        self.get(name)
            .and_then(|value| value.as_str().map(str::to_owned))
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn clear_history(&self) -> Result<()>;

    async fn erase_bookmarks(&self) -> Result<()>;

    async fn visits(&self) -> Vec<Url>;
}
