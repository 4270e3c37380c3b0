//! Accounts the bots log in with.

use md5::{Digest, Md5};
use uuid::{Builder, Uuid};

use crate::config::AccountSection;

/// How an account proves its identity to the session service.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthKind {
    Offline,
    Online { access_token: String },
}

impl std::fmt::Debug for AuthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthKind::Offline => f.write_str("Offline"),
            AuthKind::Online { .. } => f.write_str("Online { .. }"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub profile_id: Uuid,
    pub name: String,
    pub auth: AuthKind,
}

impl Account {
    pub fn offline(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            profile_id: offline_uuid(&name),
            name,
            auth: AuthKind::Offline,
        }
    }

    pub fn online(name: impl Into<String>, profile_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            profile_id,
            name: name.into(),
            auth: AuthKind::Online {
                access_token: access_token.into(),
            },
        }
    }

    /// Build from a config entry. A malformed uuid falls back to the offline id.
    pub fn from_config(section: &AccountSection) -> Self {
        let profile_id = section
            .uuid
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .unwrap_or_else(|| offline_uuid(&section.name));
        match &section.access_token {
            Some(token) => Self::online(section.name.clone(), profile_id, token.clone()),
            None => Self {
                profile_id,
                name: section.name.clone(),
                auth: AuthKind::Offline,
            },
        }
    }

    /// Whether the account can answer an authenticated encryption request.
    pub fn can_authenticate(&self) -> bool {
        matches!(self.auth, AuthKind::Online { .. })
    }
}

/// Name based profile id servers assign in offline mode.
pub fn offline_uuid(name: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{name}").as_bytes());
    Builder::from_md5_bytes(digest.into()).into_uuid()
}
