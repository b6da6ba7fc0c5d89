//! User registry: identities, display names and mute sets.
//!
//! The registry is a plain data structure; [`crate::chat::ChatService`]
//! owns it behind a single lock so every operation here is atomic with
//! respect to concurrent sessions.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::message::{UserId, SYSTEM_USER_ID, SYSTEM_USER_NAME};

/// Prefix of the fallback name shown for users without a chosen name.
const ANON_PREFIX: &str = "Anon";

/// Errors returned by registry operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Another user already holds the name.
    #[error("the name [{0}] has already been taken")]
    NameTaken(String),
    /// The name is empty or reserved.
    #[error("[{0}] is not a valid name")]
    InvalidName(String),
    /// No user is known by that name.
    #[error("no user named [{0}]")]
    UnknownUser(String),
}

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    /// Stable numeric id.
    pub id: UserId,
    /// Chosen name, empty until set.
    pub name: String,
    /// Authors this user does not want to see.
    pub muted: HashSet<UserId>,
}

impl User {
    fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            muted: HashSet::new(),
        }
    }

    /// Chosen name, or `Anon<id>` when none is set.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            anon_name(self.id)
        } else {
            self.name.clone()
        }
    }
}

/// Outcome of a successful rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Display name before the rename.
    pub old_name: String,
    /// Name now held.
    pub new_name: String,
}

/// Fallback display name for a user id.
pub fn anon_name(id: UserId) -> String {
    format!("{ANON_PREFIX}{id}")
}

fn parse_anon_name(name: &str) -> Option<UserId> {
    let digits = name.strip_prefix(ANON_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Trim a requested name and reject empty or reserved ones.
pub fn validate_name(name: &str) -> Result<&str, RegistryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return Err(RegistryError::InvalidName(trimmed.to_string()));
    }
    if parse_anon_name(trimmed).is_some() {
        return Err(RegistryError::InvalidName(trimmed.to_string()));
    }
    Ok(trimmed)
}

/// Store of every user seen during the process lifetime.
///
/// Invariant: for each user with a non-empty name, `names[name] == id`, and
/// no two users share a non-empty name.
#[derive(Debug)]
pub struct UserRegistry {
    /// Users indexed by id.
    users: Vec<User>,
    /// Name Index: chosen name to id.
    names: HashMap<String, UserId>,
}

impl UserRegistry {
    /// Create a registry holding only the system user.
    pub fn new() -> Self {
        let mut names = HashMap::new();
        names.insert(SYSTEM_USER_NAME.to_string(), SYSTEM_USER_ID);
        Self {
            users: vec![User::new(SYSTEM_USER_ID, SYSTEM_USER_NAME)],
            names,
        }
    }

    /// Number of users ever created, including the system user.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Look up a user by id.
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(usize::try_from(id).ok()?)
    }

    fn get_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(usize::try_from(id).ok()?)
    }

    /// Create a user without a chosen name.
    pub fn create_user(&mut self) -> UserId {
        let id = self.users.len() as UserId;
        self.users.push(User::new(id, ""));
        id
    }

    /// Create a user holding `name`.
    pub fn create_named(&mut self, name: &str) -> Result<UserId, RegistryError> {
        let name = validate_name(name)?;
        if self.names.contains_key(name) {
            return Err(RegistryError::NameTaken(name.to_string()));
        }
        let id = self.users.len() as UserId;
        self.users.push(User::new(id, name));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Display name for `id`; unknown ids get the anonymous form.
    pub fn display_name(&self, id: UserId) -> String {
        self.get(id)
            .map(User::display_name)
            .unwrap_or_else(|| anon_name(id))
    }

    /// Resolve a registered name, or the `Anon<id>` name of a user who has
    /// not chosen one.
    pub fn resolve(&self, name: &str) -> Option<UserId> {
        let name = name.trim();
        if let Some(&id) = self.names.get(name) {
            return Some(id);
        }
        let id = parse_anon_name(name)?;
        self.get(id).filter(|user| user.name.is_empty()).map(|u| u.id)
    }

    /// Resolve `name`, creating a user with that name if nobody holds it.
    pub fn resolve_or_create(&mut self, name: &str) -> Result<UserId, RegistryError> {
        match self.resolve(name) {
            Some(id) => Ok(id),
            None => self.create_named(name),
        }
    }

    /// Give `id` a new name, releasing the previous one.
    pub fn rename(&mut self, id: UserId, new_name: &str) -> Result<Rename, RegistryError> {
        let new_name = validate_name(new_name)?;
        if self.names.contains_key(new_name) {
            return Err(RegistryError::NameTaken(new_name.to_string()));
        }

        let user = self
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownUser(anon_name(id)))?;
        let old_name = user.display_name();
        let previous = std::mem::replace(&mut user.name, new_name.to_string());

        if !previous.is_empty() {
            self.names.remove(&previous);
        }
        self.names.insert(new_name.to_string(), id);

        Ok(Rename {
            old_name,
            new_name: new_name.to_string(),
        })
    }

    /// Add the user named `target` to `id`'s mute set.
    pub fn mute(&mut self, id: UserId, target: &str) -> Result<UserId, RegistryError> {
        let target_id = self
            .resolve(target)
            .ok_or_else(|| RegistryError::UnknownUser(target.trim().to_string()))?;
        let user = self
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownUser(anon_name(id)))?;
        user.muted.insert(target_id);
        Ok(target_id)
    }

    /// Remove the user named `target` from `id`'s mute set.
    pub fn unmute(&mut self, id: UserId, target: &str) -> Result<UserId, RegistryError> {
        let target_id = self
            .resolve(target)
            .ok_or_else(|| RegistryError::UnknownUser(target.trim().to_string()))?;
        let user = self
            .get_mut(id)
            .ok_or_else(|| RegistryError::UnknownUser(anon_name(id)))?;
        user.muted.remove(&target_id);
        Ok(target_id)
    }

    /// Whether `viewer` has muted `author`.
    pub fn is_muted(&self, viewer: UserId, author: UserId) -> bool {
        self.get(viewer)
            .is_some_and(|user| user.muted.contains(&author))
    }
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
