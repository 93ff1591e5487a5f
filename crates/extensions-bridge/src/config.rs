//! Injection allow-list and plan.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::BridgeError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// URL prefixes that receive the injection
    pub allow_prefixes: Vec<String>,
    pub styles: Vec<String>,
    /// Injected strictly after `styles`, in order
    pub scripts: Vec<String>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            allow_prefixes: vec![
                "https://miyabi381.github.io/Scheduler-test.html".into(),
                "https://web.drm.ddreams.jp/drm/page2/schedule".into(),
                "https://web.drm.ddreams.jp/drm/api/schedule".into(),
            ],
            styles: vec!["main.css".into()],
            scripts: vec!["common.js".into(), "main.js".into()],
        }
    }
}

impl InjectionConfig {
    pub fn is_target(&self, state: &str) -> bool {
        self.allow_prefixes
            .iter()
            .any(|prefix| state.starts_with(prefix.as_str()))
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.allow_prefixes.is_empty() {
            return Err(BridgeError::InvalidConfig("allow_prefixes is empty".into()));
        }
        for prefix in &self.allow_prefixes {
            let url = Url::parse(prefix).map_err(|err| {
                BridgeError::InvalidConfig(format!("allow prefix {prefix:?}: {err}"))
            })?;
            if !is_web_scheme(&url) {
                return Err(BridgeError::InvalidConfig(format!(
                    "allow prefix {prefix:?} is not http(s)"
                )));
            }
        }
        if self.scripts.is_empty() && self.styles.is_empty() {
            return Err(BridgeError::InvalidConfig("injection plan is empty".into()));
        }
        Ok(())
    }
}

pub(crate) fn is_web_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
