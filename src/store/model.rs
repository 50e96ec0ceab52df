use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a painting job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    InProgress,
    Completed,
}

/// A painting job for one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub client_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: ProjectStatus,

    /// Price agreed with the client for the whole job
    pub total_agreed_price: f64,

    /// Day the job was registered
    pub start_date: NaiveDate,
}

/// A materials purchase booked against a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,

    /// Unit cost
    pub cost: f64,
    pub quantity: f64,
    pub date: DateTime<Utc>,
}

impl Material {
    /// Line total for this purchase.
    pub fn total(&self) -> f64 {
        self.cost * self.quantity
    }
}

/// A client payment received against a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub amount: f64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub note: String,
}

/// Money view of one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFinancials {
    /// Sum of material line totals
    pub materials_cost: f64,

    /// Sum of payments received
    pub total_paid: f64,

    /// Agreed price minus payments received
    pub balance_due: f64,

    /// Agreed price minus materials cost
    pub net_result: f64,
}

/// Business-wide totals for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_projects: usize,
    pub pending_projects: usize,
    pub active_projects: usize,
    pub completed_projects: usize,

    /// All payments received
    pub total_income: f64,

    /// All material spending
    pub total_expenses: f64,

    /// Income minus expenses
    pub profit: f64,
}
