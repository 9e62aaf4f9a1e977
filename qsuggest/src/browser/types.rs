use std::fmt;

use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Non-printable keys the scenarios press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum NamedKey {
    #[strum(serialize = "KEY_ArrowDown")]
    ArrowDown,
    #[strum(serialize = "KEY_ArrowUp")]
    ArrowUp,
    #[strum(serialize = "KEY_Enter")]
    Enter,
    #[strum(serialize = "KEY_Escape")]
    Escape,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrefValue {
    Bool(bool),
    Char(String),
    Int(i64),
}

impl PrefValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::Char(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        PrefValue::Bool(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::Char(value.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AddonHandle {
    pub id: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowSource {
    /// The "search for what I typed" row the address bar always shows first.
    Heuristic,
    QuickSuggest { provider: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRow {
    pub source: RowSource,
    pub title: String,
    pub url: Url,
}

impl ResultRow {
    pub fn provider(&self) -> Option<&str> {
        match &self.source {
            RowSource::QuickSuggest { provider } => Some(provider),
            RowSource::Heuristic => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("{0} does not exist")]
    UnknownWindow(WindowId),

    #[error("the main window can not be closed")]
    MainWindow,

    #[error("address bar of {0} is not focused")]
    UrlbarNotFocused(WindowId),

    #[error("invalid search url for {term:?}")]
    InvalidSearchUrl {
        term: String,
        source: url::ParseError,
    },

    #[error("{0} closed while waiting for a page load")]
    WindowClosed(WindowId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_row_provider() -> Result<(), url::ParseError> {
        let row = ResultRow {
            source: RowSource::QuickSuggest {
                provider: "frabbits".to_owned(),
            },
            title: "frabbits".to_owned(),
            url: Url::parse("https://example.com/frabbits")?,
        };
        assert_eq!(Some("frabbits"), row.provider());

        let heuristic = ResultRow {
            source: RowSource::Heuristic,
            ..row.clone()
        };
        assert_eq!(None, heuristic.provider());
        assert_ne!(row, heuristic);
        Ok(())
    }

    #[test]
    fn test_pref_value_accessors() {
        assert_eq!(Some(true), PrefValue::from(true).as_bool());
        assert_eq!(Some("x"), PrefValue::from("x").as_str());
        assert_eq!(None, PrefValue::Int(1).as_bool());
    }
}
