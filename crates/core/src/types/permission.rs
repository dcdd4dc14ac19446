//! Permission labels and permission sets.
//!
//! Permissions form a closed set. Anything outside it is rejected when parsed
//! from a string, deserialized from JSON, or decoded from the database.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown permission label.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown permission: {0}")]
pub struct PermissionError(pub String);

/// A permission label attached to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    /// Full administrative access.
    Admin,
    /// Baseline permission every account holds.
    User,
    /// May create items.
    ItemCreate,
    /// May update items.
    ItemUpdate,
    /// May delete items.
    ItemDelete,
    /// May change other users' permissions.
    PermissionUpdate,
}

impl Permission {
    /// Every permission, in display order.
    pub const ALL: [Self; 6] = [
        Self::Admin,
        Self::User,
        Self::ItemCreate,
        Self::ItemUpdate,
        Self::ItemDelete,
        Self::PermissionUpdate,
    ];

    /// The wire/database label for this permission.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
            Self::ItemCreate => "ITEMCREATE",
            Self::ItemUpdate => "ITEMUPDATE",
            Self::ItemDelete => "ITEMDELETE",
            Self::PermissionUpdate => "PERMISSIONUPDATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PermissionError(s.to_owned()))
    }
}

/// An ordered set of permissions.
///
/// Always contains [`Permission::User`]; constructors add it when missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Permission>", into = "Vec<Permission>")]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    /// Build a set from the given permissions, adding `USER` if absent.
    #[must_use]
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut set: BTreeSet<Permission> = permissions.into_iter().collect();
        set.insert(Permission::User);
        Self(set)
    }

    /// Whether the set holds `permission`.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Whether the set holds at least one of `required`.
    #[must_use]
    pub fn contains_any(&self, required: &[Permission]) -> bool {
        required.iter().any(|p| self.0.contains(p))
    }

    /// Iterate in order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Labels in order, for storage.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|p| p.as_str().to_owned()).collect()
    }

    /// Parse a list of labels, rejecting unknown ones.
    ///
    /// # Errors
    ///
    /// Returns `PermissionError` for the first unknown label.
    pub fn parse_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self, PermissionError> {
        let permissions = labels
            .iter()
            .map(|l| l.as_ref().parse())
            .collect::<Result<Vec<Permission>, _>>()?;
        Ok(Self::new(permissions))
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::new([])
    }
}

impl From<Vec<Permission>> for PermissionSet {
    fn from(permissions: Vec<Permission>) -> Self {
        Self::new(permissions)
    }
}

impl From<PermissionSet> for Vec<Permission> {
    fn from(set: PermissionSet) -> Self {
        set.0.into_iter().collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels();
        write!(f, "[{}]", labels.join(", "))
    }
}

// SQLx support (with postgres feature): stored as TEXT[]
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PermissionSet {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Vec<String> as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Vec<String> as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PermissionSet {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let labels = <Vec<String> as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse_labels(&labels)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PermissionSet {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Vec<String> as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.labels(), buf)
    }
}
