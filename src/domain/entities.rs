//! Domain entities: snapshot records and the derived distributor node

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rank::Rank;

/// Enrollment status of a distributor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl Status {
    pub fn is_active(self) -> bool {
        self == Status::Active
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Active => write!(f, "active"),
            Status::Inactive => write!(f, "inactive"),
        }
    }
}

/// Distributor as delivered by the document store.
///
/// Derived fields (`rank`, `recruits`, `children`) that may be present in a
/// stored document are not declared here and are dropped on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributorRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Enrolling sponsor (lineage only, never drives structure)
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Node this distributor is placed under; `None` designates a root
    #[serde(default)]
    pub placement_id: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub personal_volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub join_date: DateTime<Utc>,
}

/// Customer as delivered by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: String,
    pub distributor_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Immutable purchase ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub id: String,
    pub customer_id: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
}

/// Complete point-in-time snapshot of all source records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub distributors: Vec<DistributorRecord>,
    pub customers: Vec<CustomerRecord>,
    pub purchases: Vec<PurchaseRecord>,
}

/// Customer with its purchase total resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: String,
    pub distributor_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Sum of all purchase amounts for this customer
    pub total_purchases: f64,
}

impl Customer {
    pub fn from_record(record: &CustomerRecord, total_purchases: f64) -> Self {
        Self {
            id: record.id.clone(),
            distributor_id: record.distributor_id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            total_purchases,
        }
    }
}

/// Distributor with all derived attributes populated by the tree manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Distributor {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub parent_id: Option<String>,
    pub placement_id: Option<String>,
    pub status: Status,
    /// Own volume plus the purchase totals of attached customers
    pub personal_volume: f64,
    pub group_volume: f64,
    pub generational_volume: f64,
    pub avatar_url: Option<String>,
    pub join_date: DateTime<Utc>,
    /// Number of direct children in the placement tree
    pub recruits: usize,
    pub rank: Rank,
    /// Depth from the root (root = 0)
    pub level: usize,
    pub can_recruit: bool,
    pub customers: Vec<Customer>,
}

impl Distributor {
    /// Create a node from its record with every derived field reset.
    pub fn from_record(record: &DistributorRecord, customers: Vec<Customer>) -> Self {
        let customer_volume: f64 = customers.iter().map(|c| c.total_purchases).sum();
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            email: record.email.clone(),
            parent_id: record.parent_id.clone(),
            placement_id: record.placement_id.clone(),
            status: record.status,
            personal_volume: record.personal_volume + customer_volume,
            group_volume: 0.0,
            generational_volume: 0.0,
            avatar_url: record.avatar_url.clone(),
            join_date: record.join_date,
            recruits: 0,
            rank: Rank::LOWEST,
            level: 0,
            can_recruit: false,
            customers,
        }
    }

    pub fn is_root(&self) -> bool {
        self.placement_id.is_none()
    }
}

impl fmt::Display for Distributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// Input for growing the tree outside of a full snapshot replacement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDistributor {
    pub name: String,
    pub email: Option<String>,
    /// Enrolling sponsor; defaults to the placement parent when absent
    pub sponsor_id: Option<String>,
    pub status: Status,
    pub personal_volume: f64,
    pub avatar_url: Option<String>,
}

impl NewDistributor {
    /// Turn the request into a stored record placed under `parent_id`.
    pub fn into_record(self, id: String, parent_id: &str, join_date: DateTime<Utc>) -> DistributorRecord {
        DistributorRecord {
            id,
            name: self.name,
            email: self.email,
            parent_id: Some(self.sponsor_id.unwrap_or_else(|| parent_id.to_string())),
            placement_id: Some(parent_id.to_string()),
            status: self.status,
            personal_volume: self.personal_volume,
            avatar_url: self.avatar_url,
            join_date,
        }
    }
}
