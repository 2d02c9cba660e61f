//! Data models for the property-management backend.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a backend record: numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{}", id),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        id.parse::<i64>()
            .map(Self::Int)
            .unwrap_or_else(|_| Self::Text(id.to_string()))
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Tenant,
    PropertyManager,
    Landlord,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Admin => "admin",
            Self::Tenant => "tenant",
            Self::PropertyManager => "property manager",
            Self::Landlord => "landlord",
        };
        f.write_str(label)
    }
}

/// The signed-in user, from the `/me` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub role: Role,
    #[serde(default, alias = "name", alias = "full_name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Get the best available display name.
    pub fn display_name_or_username(&self) -> String {
        if let Some(name) = self.display_name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }

        let full: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !full.is_empty() {
            return full.join(" ");
        }

        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("User {}", self.id))
    }

    /// Get the best available email.
    pub fn email(&self) -> String {
        self.email.clone().unwrap_or_else(|| "No email".to_string())
    }
}

/// Backend resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tenants,
    Properties,
    Units,
    Offices,
    Invoices,
    Payments,
    Receipts,
    BillingPeriods,
    Transactions,
    UtilityCharges,
}

impl Resource {
    pub const ALL: [Resource; 10] = [
        Self::Tenants,
        Self::Properties,
        Self::Units,
        Self::Offices,
        Self::Invoices,
        Self::Payments,
        Self::Receipts,
        Self::BillingPeriods,
        Self::Transactions,
        Self::UtilityCharges,
    ];

    /// Collection name as used in URLs and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Tenants => "tenants",
            Self::Properties => "properties",
            Self::Units => "units",
            Self::Offices => "offices",
            Self::Invoices => "invoices",
            Self::Payments => "payments",
            Self::Receipts => "receipts",
            Self::BillingPeriods => "billing-periods",
            Self::Transactions => "transactions",
            Self::UtilityCharges => "utility-charges",
        }
    }

    /// Collection path relative to the API base URL.
    pub fn collection_path(self) -> String {
        format!("api/{}/", self.name())
    }

    /// Path of one record.
    pub fn record_path(self, id: &RecordId) -> String {
        format!(
            "api/{}/{}/",
            self.name(),
            urlencoding::encode(&id.to_string())
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|r| r.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|r| r.name()).collect();
                format!("unknown resource {:?}, expected one of: {}", s, names.join(", "))
            })
    }
}

/// A list response: either a bare array or a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse {
    Page { results: Vec<serde_json::Value> },
    Plain(Vec<serde_json::Value>),
}

impl ListResponse {
    pub(crate) fn into_records(self) -> Vec<serde_json::Value> {
        match self {
            Self::Page { results } => results,
            Self::Plain(records) => records,
        }
    }
}
