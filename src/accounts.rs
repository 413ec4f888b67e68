//! Multi-account token storage.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::api::TelegramSession;
use crate::cache::{KeyValueStore, StorageKey};

/// A signed-in account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub access_token: String,
  /// User payload as returned by the auth endpoint
  #[serde(default)]
  pub user: serde_json::Value,
  pub added_at: DateTime<Utc>,
}

/// Known accounts and which one is active.
pub struct AccountStore<S: KeyValueStore> {
  storage: Arc<S>,
}

impl<S: KeyValueStore> AccountStore<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self { storage }
  }

  pub fn accounts(&self) -> Result<BTreeMap<String, Account>> {
    Ok(
      self
        .storage
        .get_json(&StorageKey::Accounts)?
        .unwrap_or_default(),
    )
  }

  /// Store the session under its account name and make it active.
  pub fn add_session(&self, session: &TelegramSession) -> Result<String> {
    let name = session.account_name();
    let mut accounts = self.accounts()?;
    accounts.insert(
      name.clone(),
      Account {
        access_token: session.access_token.clone(),
        user: session.user.clone(),
        added_at: Utc::now(),
      },
    );
    self.storage.set_json(&StorageKey::Accounts, &accounts)?;
    self.storage.set_json(&StorageKey::ActiveAccount, &name)?;
    info!(account = %name, "Signed in");
    Ok(name)
  }

  pub fn switch(&self, name: &str) -> Result<()> {
    if !self.accounts()?.contains_key(name) {
      return Err(eyre!("Unknown account: {}", name));
    }
    self.storage.set_json(&StorageKey::ActiveAccount, &name)
  }

  /// Forget `name`; if it was active, no account is active afterwards.
  pub fn remove(&self, name: &str) -> Result<bool> {
    let mut accounts = self.accounts()?;
    if accounts.remove(name).is_none() {
      return Ok(false);
    }
    self.storage.set_json(&StorageKey::Accounts, &accounts)?;

    if self.active_name()?.as_deref() == Some(name) {
      self
        .storage
        .delete(&StorageKey::ActiveAccount.render())?;
    }
    Ok(true)
  }

  pub fn active_name(&self) -> Result<Option<String>> {
    self.storage.get_json(&StorageKey::ActiveAccount)
  }

  pub fn active(&self) -> Result<Option<(String, Account)>> {
    let Some(name) = self.active_name()? else {
      return Ok(None);
    };
    Ok(self.accounts()?.remove(&name).map(|account| (name, account)))
  }

  pub fn active_token(&self) -> Result<Option<String>> {
    Ok(self.active()?.map(|(_, account)| account.access_token))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use serde_json::json;

  fn session(user: serde_json::Value, token: &str) -> TelegramSession {
    TelegramSession {
      user,
      access_token: token.to_string(),
    }
  }

  #[test]
  fn test_add_switch_remove() {
    let store = AccountStore::new(Arc::new(SqliteStorage::in_memory().unwrap()));
    assert!(store.active_token().unwrap().is_none());

    let alice = store
      .add_session(&session(json!({"id": 1, "username": "alice"}), "t-alice"))
      .unwrap();
    let bob = store
      .add_session(&session(json!({"id": 2, "first_name": "Bob"}), "t-bob"))
      .unwrap();
    assert_eq!(alice, "alice");
    assert_eq!(bob, "Bob");
    assert_eq!(store.active_token().unwrap().as_deref(), Some("t-bob"));

    store.switch("alice").unwrap();
    assert_eq!(store.active_token().unwrap().as_deref(), Some("t-alice"));
    assert!(store.switch("carol").is_err());

    assert!(store.remove("alice").unwrap());
    assert!(store.active().unwrap().is_none());
    assert_eq!(store.accounts().unwrap().len(), 1);
  }

  #[test]
  fn test_numeric_user_id_names_account() {
    let store = AccountStore::new(Arc::new(SqliteStorage::in_memory().unwrap()));
    let name = store.add_session(&session(json!({"id": 77}), "t")).unwrap();
    assert_eq!(name, "77");
  }
}
