//! Person domain model

use serde::{Deserialize, Serialize};

use super::money::Money;
use super::nullable::default_on_null;

/// A member account held by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    #[serde(rename = "nick_name")]
    pub nickname: String,
    #[serde(default, deserialize_with = "default_on_null")]
    pub first_name: String,
    #[serde(default, deserialize_with = "default_on_null")]
    pub last_name: String,
    #[serde(default, deserialize_with = "default_on_null")]
    pub balance: Money,
}

impl Person {
    pub fn new(id: i64, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            first_name: String::new(),
            last_name: String::new(),
            balance: Money::ZERO,
        }
    }

    /// Name used when greeting the member and on receipts
    ///
    /// First name when known (nickname otherwise), followed by the last name
    /// when known.
    pub fn display_name(&self) -> String {
        let mut name = if self.first_name.is_empty() {
            self.nickname.clone()
        } else {
            self.first_name.clone()
        };
        if !self.last_name.is_empty() {
            name.push(' ');
            name.push_str(&self.last_name);
        }
        name
    }
}

/// Person group; every product carries one price per group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonGroup {
    pub id: i64,
    pub name: String,
}
