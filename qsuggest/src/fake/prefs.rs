use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use crate::browser::{
    PrefValue, PreferenceStore, ATTRIBUTION_URL_PREF, PRIVATE_SUGGESTIONS_PREF, SUGGESTIONS_PREF,
};

/// Preference branch with built-in defaults and a layer of user values on top.
pub struct FakePrefs {
    defaults: HashMap<&'static str, PrefValue>,
    user: DashMap<String, PrefValue>,
}

impl Default for FakePrefs {
    fn default() -> Self {
        let defaults = HashMap::from([
            (SUGGESTIONS_PREF, PrefValue::Bool(true)),
            (PRIVATE_SUGGESTIONS_PREF, PrefValue::Bool(false)),
            (ATTRIBUTION_URL_PREF, PrefValue::Char(String::new())),
        ]);
        FakePrefs {
            defaults,
            user: DashMap::new(),
        }
    }
}

impl PreferenceStore for FakePrefs {
    fn get(&self, name: &str) -> Option<PrefValue> {
        self.user
            .get(name)
            .map(|value| value.clone())
            .or_else(|| self.defaults.get(name).cloned())
    }

    fn set(&self, name: &str, value: PrefValue) {
        debug!(name, ?value, "set pref");
        self.user.insert(name.to_owned(), value);
    }

    fn clear(&self, name: &str) {
        if self.user.remove(name).is_some() {
            debug!(name, "cleared pref");
        }
    }
}
