//! Access-control entries forwarded to the service.
//!
//! The client never evaluates these; they are opaque payload for the
//! `acl.*` calls and the service is the only authority on access decisions.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Set of permission bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(0b0001);
    pub const WRITE: Self = Self(0b0010);
    pub const EXECUTE: Self = Self(0b0100);
    pub const ADMIN: Self = Self(0b1000);
    pub const ALL: Self = Self(0b1111);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits, dropping unknown ones.
    pub fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Self::READ, 'r'),
            (Self::WRITE, 'w'),
            (Self::EXECUTE, 'x'),
            (Self::ADMIN, 'a'),
        ];
        for (flag, c) in flags {
            let c = if self.contains(flag) { c } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Who an entry applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Principal {
    User(String),
    Role(String),
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(name) => write!(f, "user:{name}"),
            Self::Role(name) => write!(f, "role:{name}"),
        }
    }
}

/// Node kind an entry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    File,
    Directory,
}

/// A single access-control entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclEntry {
    pub principal: Principal,
    pub permissions: Permissions,
    pub applies_to: AppliesTo,
}

impl AclEntry {
    pub fn new(principal: Principal, permissions: Permissions, applies_to: AppliesTo) -> Self {
        Self {
            principal,
            permissions,
            applies_to,
        }
    }
}
