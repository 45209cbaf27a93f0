use serde::{Deserialize, Serialize};

use crate::cache_key::CachePrefixer;

pub const DEFAULT_INSTANCE: &str = "https://lemmy.world";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("account {0} not found")]
    AccountNotFound(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub instance: String,
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Account {
    pub fn new(instance: &str) -> Self {
        Self {
            instance: normalize_instance(instance),
            jwt: None,
            uuid: None,
            username: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.jwt.as_deref().is_some_and(|jwt| !jwt.is_empty())
    }
}

/// Partial update applied by [`AccountStore::update_account`]. `None` leaves
/// a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub instance: Option<String>,
    pub jwt: Option<Option<String>>,
    pub username: Option<Option<String>>,
}

impl AccountUpdate {
    fn apply(self, account: &mut Account) {
        if let Some(instance) = self.instance {
            account.instance = normalize_instance(&instance);
        }
        if let Some(jwt) = self.jwt {
            account.jwt = jwt;
        }
        if let Some(username) = self.username {
            account.username = username;
        }
    }
}

/// Ordered account slots plus the selected index. Never empty.
#[derive(Debug, Clone)]
pub struct AccountStore {
    accounts: Vec<Account>,
    selected: usize,
    default_instance: String,
}

impl AccountStore {
    pub fn new(default_instance: &str) -> Self {
        let default_instance = normalize_instance(default_instance);
        Self {
            accounts: vec![Account::new(&default_instance)],
            selected: 0,
            default_instance,
        }
    }

    /// Restores persisted state; an empty list falls back to the default slot
    /// and an out-of-range selection is clamped.
    pub fn from_parts(default_instance: &str, accounts: Vec<Account>, selected: usize) -> Self {
        let mut store = Self::new(default_instance);
        if !accounts.is_empty() {
            store.selected = selected.min(accounts.len() - 1);
            store.accounts = accounts;
        }
        store
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_account(&self) -> &Account {
        &self.accounts[self.selected]
    }

    pub fn is_logged_in(&self) -> bool {
        self.selected_account().is_logged_in()
    }

    pub fn cache_prefixer(&self) -> CachePrefixer {
        CachePrefixer::for_account(self.selected_account())
    }

    /// Appends an account slot and selects it. Returns the new index.
    pub fn add_account(&mut self, mut account: Account) -> usize {
        account.instance = normalize_instance(&account.instance);
        if account.uuid.is_none() {
            account.uuid = Some(uuid::Uuid::new_v4().to_string());
        }
        self.accounts.push(account);
        self.selected = self.accounts.len() - 1;
        self.selected
    }

    pub fn update_account(&mut self, index: usize, update: AccountUpdate) -> Result<(), SessionError> {
        let account = self
            .accounts
            .get_mut(index)
            .ok_or(SessionError::AccountNotFound(index))?;
        update.apply(account);
        Ok(())
    }

    pub fn update_selected_account(&mut self, update: AccountUpdate) {
        update.apply(&mut self.accounts[self.selected]);
    }

    pub fn select(&mut self, index: usize) -> Result<&Account, SessionError> {
        if index >= self.accounts.len() {
            return Err(SessionError::AccountNotFound(index));
        }
        self.selected = index;
        Ok(&self.accounts[index])
    }

    /// Removes the slot at `index`. Removing the last slot leaves a single
    /// credential-less account on the default instance.
    pub fn logout(&mut self, index: usize) -> Result<Account, SessionError> {
        if index >= self.accounts.len() {
            return Err(SessionError::AccountNotFound(index));
        }
        let removed = self.accounts.remove(index);
        if self.accounts.is_empty() {
            self.accounts.push(Account::new(&self.default_instance));
            self.selected = 0;
        } else if index < self.selected {
            self.selected -= 1;
        } else {
            self.selected = self.selected.min(self.accounts.len() - 1);
        }
        Ok(removed)
    }
}

pub fn normalize_instance(instance: &str) -> String {
    instance.trim().trim_end_matches('/').to_string()
}
