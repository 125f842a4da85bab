use std::{
    borrow::Borrow,
    collections::BTreeSet,
    fmt::{Debug, Display},
};

/// Names a single capability, for example `customers.read`. The backend owns
/// the list of valid keys so the client treats them as opaque
#[derive(
    Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct PermissionKey(String);

/// Set of permission keys, order is irrelevant
#[derive(serde::Serialize, serde::Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionKey>);

/// Per user adjustments applied on top of the permissions derived from the
/// user's role
///
/// A key is never in both sets at the same time. Use [`Self::toggle`],
/// [`Self::grant`] or [`Self::revoke`] to edit so that stays true
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOverrides {
    #[serde(default)]
    pub granted: PermissionSet,
    #[serde(default)]
    pub revoked: PermissionSet,
}

impl PermissionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PermissionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PermissionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for PermissionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PermissionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn contains_key(&self, key: &PermissionKey) -> bool {
        self.0.contains(key)
    }

    /// True if every key in `keys` is present
    pub fn includes(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.contains(key))
    }

    /// Returns true if the key was not already present
    pub fn insert(&mut self, key: PermissionKey) -> bool {
        self.0.insert(key)
    }

    /// Returns true if the key was present
    pub fn remove(&mut self, key: &PermissionKey) -> bool {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionKey> {
        self.0.iter()
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.0.is_disjoint(&other.0)
    }
}

impl<K: Into<PermissionKey>> FromIterator<K> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<PermissionKey>> From<Vec<K>> for PermissionSet {
    fn from(value: Vec<K>) -> Self {
        value.into_iter().collect()
    }
}

impl Debug for PermissionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.iter().map(|x| x.as_str())).finish()
    }
}

impl PermissionOverrides {
    /// `(role ∪ granted) − revoked`
    pub fn effective(&self, role_permissions: &PermissionSet) -> PermissionSet {
        debug_assert!(self.is_consistent());
        role_permissions
            .iter()
            .chain(self.granted.iter())
            .filter(|key| !self.revoked.contains_key(key))
            .cloned()
            .collect()
    }

    pub fn is_effective(&self, key: &PermissionKey, role_permissions: &PermissionSet) -> bool {
        !self.revoked.contains_key(key)
            && (role_permissions.contains_key(key) || self.granted.contains_key(key))
    }

    /// Flips whether `key` is effective using the smallest change to the
    /// overrides. Returns whether the key is effective afterwards
    ///
    /// A key provided by the role moves into `revoked` and toggling it again
    /// removes it from `revoked` (back to what the role provides). A key not
    /// provided by the role moves into `granted` and back out again.
    #[tracing::instrument(ret, skip(role_permissions))]
    pub fn toggle(&mut self, key: &PermissionKey, role_permissions: &PermissionSet) -> bool {
        if self.is_effective(key, role_permissions) {
            self.revoke(key.clone(), role_permissions);
            false
        } else {
            self.grant(key.clone(), role_permissions);
            true
        }
    }

    /// Ensures `key` is effective
    pub fn grant(&mut self, key: PermissionKey, role_permissions: &PermissionSet) {
        self.revoked.remove(&key);
        if !role_permissions.contains_key(&key) {
            self.granted.insert(key);
        }
    }

    /// Ensures `key` is not effective
    pub fn revoke(&mut self, key: PermissionKey, role_permissions: &PermissionSet) {
        self.granted.remove(&key);
        if role_permissions.contains_key(&key) {
            self.revoked.insert(key);
        }
    }

    /// A key may not be both granted and revoked
    pub fn is_consistent(&self) -> bool {
        self.granted.is_disjoint(&self.revoked)
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.revoked.is_empty()
    }
}
