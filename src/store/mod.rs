//! Business records for the painting contractor
//!
//! A single JSON file holds projects, their material purchases, and the
//! payments received against them. The ledger owns the file and derives
//! the per-project and business-wide financial views from it.

pub mod ledger;
pub mod model;

pub use ledger::Ledger;
pub use model::{
    DashboardSummary, Material, Payment, Project, ProjectFinancials, ProjectStatus,
};
