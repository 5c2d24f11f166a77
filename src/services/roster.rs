// SPDX-License-Identifier: MIT

//! Roster of target users.
//!
//! Which people count as "presales staff" is an external input: the
//! deployment supplies the id list, and this service only resolves those
//! ids against the portal's `user.get` method when profile data is needed.

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::services::bitrix::BitrixClient;

/// Portal user profile as shown in the dashboard's user picker.
#[derive(Debug, Clone, Serialize)]
pub struct RosterUser {
    pub id: String,
    pub name: String,
    pub last_name: String,
    pub position: String,
    pub email: String,
}

#[derive(Clone)]
pub struct RosterService {
    target_ids: Vec<String>,
    bitrix: BitrixClient,
}

impl RosterService {
    pub fn new(config: &Config, bitrix: BitrixClient) -> Self {
        Self {
            target_ids: config.presales_user_ids.clone(),
            bitrix,
        }
    }

    /// The configured target user ids; the default user set for queries
    /// that omit one.
    pub fn target_user_ids(&self) -> &[String] {
        &self.target_ids
    }

    /// Resolve the configured ids to portal profiles.
    ///
    /// A user that cannot be resolved is logged and skipped; the roster is
    /// display data, not a correctness input.
    pub async fn list_users(&self) -> Result<Vec<RosterUser>> {
        let mut users = Vec::with_capacity(self.target_ids.len());
        for user_id in &self.target_ids {
            match self.bitrix.get_user(user_id).await {
                Ok(Some(profile)) => users.push(roster_user(user_id, &profile)),
                Ok(None) => {
                    tracing::warn!(user_id, "Roster user not found in portal");
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Failed to resolve roster user");
                }
            }
        }
        Ok(users)
    }
}

fn roster_user(user_id: &str, profile: &Value) -> RosterUser {
    let field = |key: &str| {
        profile
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    RosterUser {
        id: user_id.to_string(),
        name: field("NAME"),
        last_name: field("LAST_NAME"),
        position: field("WORK_POSITION"),
        email: field("EMAIL"),
    }
}
