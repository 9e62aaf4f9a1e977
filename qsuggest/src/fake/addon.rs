use std::io;
use std::path::{Path, PathBuf};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use qsuggest_core::SignedState;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::browser::AddonHandle;

#[derive(Debug, Error)]
pub enum AddonError {
    #[error("reading add-on manifest {}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("parsing add-on manifest {}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("add-on {id} is signed as {actual}, expected {expected}")]
    SignatureMismatch {
        id: String,
        expected: SignedState,
        actual: SignedState,
    },

    #[error("add-on {0} is already installed")]
    AlreadyInstalled(String),

    #[error("add-on {0} is not installed")]
    NotInstalled(String),
}

/// Add-on package description, read from a JSON file.
#[derive(Clone, Debug, Deserialize)]
pub struct AddonManifest {
    pub id: String,
    pub version: String,
    pub signed_state: SignedState,
    #[serde(default)]
    pub provider: Option<ProviderManifest>,
}

/// Address bar provider an add-on registers.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderManifest {
    pub name: String,
    pub suggestions: Vec<SuggestionManifest>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SuggestionManifest {
    pub keywords: Vec<String>,
    /// Search term the suggestion navigates to.
    pub term: String,
}

impl AddonManifest {
    pub async fn load(path: &Path) -> Result<AddonManifest, AddonError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| AddonError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| AddonError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    pub fn handle(&self) -> AddonHandle {
        AddonHandle {
            id: self.id.clone(),
            version: self.version.clone(),
        }
    }
}

impl ProviderManifest {
    /// First suggestion with a keyword equal to the trimmed, lowercased text.
    pub fn lookup(&self, text: &str) -> Option<&SuggestionManifest> {
        let text = text.trim().to_lowercase();
        self.suggestions.iter().find(|suggestion| {
            suggestion
                .keywords
                .iter()
                .any(|keyword| keyword.to_lowercase() == text)
        })
    }
}

/// Installed add-ons by id.
#[derive(Default)]
pub struct AddonRegistry {
    installed: DashMap<String, AddonManifest>,
}

impl AddonRegistry {
    pub async fn install(
        &self,
        path: &Path,
        expected: SignedState,
    ) -> Result<AddonHandle, AddonError> {
        let manifest = AddonManifest::load(path).await?;
        if manifest.signed_state != expected {
            return Err(AddonError::SignatureMismatch {
                id: manifest.id,
                expected,
                actual: manifest.signed_state,
            });
        }

        let handle = manifest.handle();
        match self.installed.entry(manifest.id.clone()) {
            Entry::Occupied(_) => return Err(AddonError::AlreadyInstalled(manifest.id)),
            Entry::Vacant(entry) => {
                entry.insert(manifest);
            }
        }
        info!(id = %handle.id, version = %handle.version, "add-on installed");
        Ok(handle)
    }

    pub fn uninstall(&self, handle: &AddonHandle) -> Result<(), AddonError> {
        self.installed
            .remove(&handle.id)
            .ok_or_else(|| AddonError::NotInstalled(handle.id.clone()))?;
        info!(id = %handle.id, "add-on uninstalled");
        Ok(())
    }

    pub fn installed(&self) -> Vec<AddonHandle> {
        self.installed
            .iter()
            .map(|entry| entry.value().handle())
            .collect()
    }

    /// Provider name and suggested term for the typed text, from any installed add-on.
    pub fn suggestion_for(&self, text: &str) -> Option<(String, String)> {
        self.installed.iter().find_map(|entry| {
            let provider = entry.value().provider.as_ref()?;
            let suggestion = provider.lookup(text)?;
            Some((provider.name.clone(), suggestion.term.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use tempfile::NamedTempFile;

    use super::*;

    const MANIFEST: &str = r#"{
        "id": "test@addons.qsuggest.test",
        "version": "2.1.0",
        "signed_state": "privileged",
        "provider": {
            "name": "TestProvider",
            "suggestions": [{ "keywords": ["ab", "abc"], "term": "abcdef" }]
        }
    }"#;

    fn manifest_file(contents: &str) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    #[tokio::test]
    async fn test_install_and_lookup() -> Result<()> {
        let file = manifest_file(MANIFEST)?;
        let registry = AddonRegistry::default();

        let handle = registry.install(file.path(), SignedState::Privileged).await?;
        assert_eq!("test@addons.qsuggest.test", handle.id);
        assert_eq!("2.1.0", handle.version);
        assert_eq!(vec![handle.clone()], registry.installed());

        assert_eq!(
            Some(("TestProvider".to_owned(), "abcdef".to_owned())),
            registry.suggestion_for(" ABC ")
        );
        assert_eq!(None, registry.suggestion_for("abcd"));
        assert_eq!(None, registry.suggestion_for("a"));

        assert!(matches!(
            registry.install(file.path(), SignedState::Privileged).await,
            Err(AddonError::AlreadyInstalled(_))
        ));

        registry.uninstall(&handle)?;
        assert!(registry.installed().is_empty());
        assert_eq!(None, registry.suggestion_for("abc"));
        assert!(matches!(
            registry.uninstall(&handle),
            Err(AddonError::NotInstalled(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_bad_manifests() -> Result<()> {
        let registry = AddonRegistry::default();

        let file = manifest_file(MANIFEST)?;
        assert!(matches!(
            registry.install(file.path(), SignedState::Missing).await,
            Err(AddonError::SignatureMismatch {
                expected: SignedState::Missing,
                actual: SignedState::Privileged,
                ..
            })
        ));

        let broken = manifest_file("{ \"id\": ")?;
        assert!(matches!(
            registry.install(broken.path(), SignedState::Missing).await,
            Err(AddonError::Parse { .. })
        ));

        assert!(matches!(
            registry
                .install(Path::new("/nonexistent/addon.json"), SignedState::Missing)
                .await,
            Err(AddonError::Read { .. })
        ));
        assert!(registry.installed().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_ignores_keyword_case() -> Result<()> {
        let file = manifest_file(
            r#"{
                "id": "mixed@addons.qsuggest.test",
                "version": "1.0.0",
                "signed_state": "privileged",
                "provider": {
                    "name": "MixedProvider",
                    "suggestions": [{ "keywords": ["Frab"], "term": "Frabbits" }]
                }
            }"#,
        )?;
        let registry = AddonRegistry::default();
        registry.install(file.path(), SignedState::Privileged).await?;

        let expected = Some(("MixedProvider".to_owned(), "Frabbits".to_owned()));
        assert_eq!(expected, registry.suggestion_for("Frab"));
        assert_eq!(expected, registry.suggestion_for("frab"));
        assert_eq!(expected, registry.suggestion_for("FRAB"));
        Ok(())
    }
}
