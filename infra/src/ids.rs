use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use anyhow::{bail, Error};
use err_derive::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Row identifier for an entity of type `T`.
///
/// Backed by the store's `SERIAL` column, so the raw value is an `i32`. The
/// phantom type keeps a drink id from being handed to an ingredient lookup.
pub struct Id<T> {
    val: i32,
    phantom: PhantomData<T>,
}

#[derive(Debug, Clone, Error)]
enum IdParseError {
    #[error(display = "Invalid prefix")]
    InvalidPrefix,
    #[error(display = "Unparseable Id")]
    Unparseable,
}

pub trait Entity {
    const PREFIX: &'static str;
}

const DIVIDER: &str = "-";

impl<T> Id<T> {
    pub fn from_raw(val: i32) -> Self {
        Id {
            val,
            phantom: PhantomData,
        }
    }

    pub fn raw(&self) -> i32 {
        self.val
    }
}

impl<T: Entity> fmt::Display for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}{}{}", T::PREFIX, DIVIDER, self.val)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_tuple("Id").field(&self.val).finish()
    }
}

/// Accepts either the bare number (`42`) or the prefixed form that
/// `Display` produces (`drink-42`).
impl<T: Entity> std::str::FromStr for Id<T> {
    type Err = Error;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let digits = if src.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            src
        } else {
            if !src.starts_with(T::PREFIX) {
                bail!(IdParseError::InvalidPrefix);
            }
            let remainder = &src[T::PREFIX.len()..];
            if !remainder.starts_with(DIVIDER) {
                bail!(IdParseError::Unparseable);
            }
            &remainder[DIVIDER.len()..]
        };

        match digits.parse::<i32>() {
            Ok(val) => Ok(Id::from_raw(val)),
            Err(_) => bail!(IdParseError::Unparseable),
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val.hash(state)
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.val.cmp(&other.val)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Id {
            val: self.val,
            phantom: self.phantom,
        }
    }
}

impl<T> Copy for Id<T> {}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.val)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(Id::from_raw)
    }
}
