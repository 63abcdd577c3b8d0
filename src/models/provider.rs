//! Provider records for the model catalog.
//!
//! Providers are a closed set of known vendor kinds with a `Custom` escape
//! hatch. Each provider row is validated at ingestion time, not at call time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// AI vendor kinds supported by ModelSwapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    Mistral,
    Groq,
    Custom(String),
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Mistral => write!(f, "mistral"),
            ProviderKind::Groq => write!(f, "groq"),
            ProviderKind::Custom(name) => write!(f, "custom-{}", name),
        }
    }
}

/// Who owns a provider entry and whose credentials it runs on.
///
/// System providers are available to every user and billed against the
/// platform. User-owned providers exist only for the owning user and are
/// selectable only when the request opts into user credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderScope {
    System,
    UserOwned { user_id: String },
}

impl ProviderScope {
    pub fn is_system(&self) -> bool {
        matches!(self, ProviderScope::System)
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            ProviderScope::System => None,
            ProviderScope::UserOwned { user_id } => Some(user_id),
        }
    }
}

/// A named AI vendor endpoint known to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub kind: ProviderKind,
    pub display_name: String,
    pub base_url: String,
    pub scope: ProviderScope,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    /// Convenience constructor for a system-scoped provider
    pub fn system(id: &str, kind: ProviderKind, display_name: &str, base_url: &str) -> Self {
        Self {
            id: id.to_string(),
            kind,
            display_name: display_name.to_string(),
            base_url: base_url.to_string(),
            scope: ProviderScope::System,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Convenience constructor for a user-owned provider
    pub fn user_owned(
        id: &str,
        kind: ProviderKind,
        display_name: &str,
        base_url: &str,
        user_id: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            display_name: display_name.to_string(),
            base_url: base_url.to_string(),
            scope: ProviderScope::UserOwned {
                user_id: user_id.to_string(),
            },
            active: true,
            created_at: Utc::now(),
        }
    }
}
