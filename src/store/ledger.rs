use super::model::{
    DashboardSummary, Material, Payment, Project, ProjectFinancials, ProjectStatus,
};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// The persisted document: every business record in one file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerData {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    materials: Vec<Material>,
    #[serde(default)]
    payments: Vec<Payment>,
}

/// File-backed business ledger.
///
/// Every mutation rewrites the whole document before returning. The file
/// stays small for a one-person business, and the rewrite keeps restarts
/// lossless without a migration story.
pub struct Ledger {
    path: PathBuf,
    data: LedgerData,
}

impl Ledger {
    /// Load the ledger, or start empty when the file does not exist yet.
    /// A file that exists but does not parse is an error: silently
    /// discarding the books is worse than refusing to start.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read ledger file: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse ledger file: {}", path.display()))?
        } else {
            info!("No ledger file at {}, starting empty", path.display());
            LedgerData::default()
        };

        let ledger = Self { path, data };
        info!(
            "Ledger loaded: {} project(s), {} material(s), {} payment(s)",
            ledger.data.projects.len(),
            ledger.data.materials.len(),
            ledger.data.payments.len()
        );
        Ok(ledger)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create ledger directory: {}", parent.display())
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write ledger file: {}", self.path.display()))?;
        Ok(())
    }

    // ========================================================================
    // Projects
    // ========================================================================

    /// Register a new job: pending, dated today, newest first.
    pub fn add_project(
        &mut self,
        client_name: &str,
        title: &str,
        description: &str,
        total_agreed_price: f64,
    ) -> Result<Project> {
        let project = Project {
            id: Uuid::new_v4(),
            client_name: client_name.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            status: ProjectStatus::Pending,
            total_agreed_price,
            start_date: Utc::now().date_naive(),
        };
        self.data.projects.insert(0, project.clone());
        self.persist()?;
        info!("Project added: {} ({})", project.title, project.id);
        Ok(project)
    }

    pub fn projects(&self) -> &[Project] {
        &self.data.projects
    }

    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.data.projects.iter().find(|p| p.id == id)
    }

    /// Move a job through its lifecycle. Returns the updated project, or
    /// None when the id is unknown.
    pub fn update_project_status(
        &mut self,
        id: Uuid,
        status: ProjectStatus,
    ) -> Result<Option<Project>> {
        let Some(project) = self.data.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        project.status = status;
        let updated = project.clone();
        self.persist()?;
        Ok(Some(updated))
    }

    /// Delete a job and everything booked against it.
    pub fn remove_project(&mut self, id: Uuid) -> Result<bool> {
        let before = self.data.projects.len();
        self.data.projects.retain(|p| p.id != id);
        if self.data.projects.len() == before {
            return Ok(false);
        }
        // Materials and payments must not outlive their project.
        self.data.materials.retain(|m| m.project_id != id);
        self.data.payments.retain(|p| p.project_id != id);
        self.persist()?;
        info!("Project removed: {}", id);
        Ok(true)
    }

    // ========================================================================
    // Materials
    // ========================================================================

    /// Book a materials purchase. Returns None when the project is gone.
    pub fn add_material(
        &mut self,
        project_id: Uuid,
        name: &str,
        cost: f64,
        quantity: f64,
    ) -> Result<Option<Material>> {
        if self.project(project_id).is_none() {
            return Ok(None);
        }
        let material = Material {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_string(),
            cost,
            quantity,
            date: Utc::now(),
        };
        self.data.materials.insert(0, material.clone());
        self.persist()?;
        Ok(Some(material))
    }

    pub fn materials_for(&self, project_id: Uuid) -> Vec<Material> {
        self.data
            .materials
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn remove_material(&mut self, id: Uuid) -> Result<bool> {
        let before = self.data.materials.len();
        self.data.materials.retain(|m| m.id != id);
        if self.data.materials.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Record a payment received. Returns None when the project is gone.
    pub fn add_payment(
        &mut self,
        project_id: Uuid,
        amount: f64,
        note: &str,
    ) -> Result<Option<Payment>> {
        if self.project(project_id).is_none() {
            return Ok(None);
        }
        let payment = Payment {
            id: Uuid::new_v4(),
            project_id,
            amount,
            date: Utc::now(),
            note: note.to_string(),
        };
        self.data.payments.insert(0, payment.clone());
        self.persist()?;
        Ok(Some(payment))
    }

    pub fn payments_for(&self, project_id: Uuid) -> Vec<Payment> {
        self.data
            .payments
            .iter()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn remove_payment(&mut self, id: Uuid) -> Result<bool> {
        let before = self.data.payments.len();
        self.data.payments.retain(|p| p.id != id);
        if self.data.payments.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    /// Money view of one project.
    pub fn financials(&self, project_id: Uuid) -> ProjectFinancials {
        let materials_cost: f64 = self
            .data
            .materials
            .iter()
            .filter(|m| m.project_id == project_id)
            .map(|m| m.total())
            .sum();
        let total_paid: f64 = self
            .data
            .payments
            .iter()
            .filter(|p| p.project_id == project_id)
            .map(|p| p.amount)
            .sum();
        let agreed = self
            .project(project_id)
            .map(|p| p.total_agreed_price)
            .unwrap_or(0.0);

        ProjectFinancials {
            materials_cost,
            total_paid,
            balance_due: agreed - total_paid,
            net_result: agreed - materials_cost,
        }
    }

    /// Business-wide totals.
    pub fn dashboard(&self) -> DashboardSummary {
        let total_income: f64 = self.data.payments.iter().map(|p| p.amount).sum();
        let total_expenses: f64 = self.data.materials.iter().map(|m| m.total()).sum();
        let count = |status: ProjectStatus| {
            self.data
                .projects
                .iter()
                .filter(|p| p.status == status)
                .count()
        };

        DashboardSummary {
            total_projects: self.data.projects.len(),
            pending_projects: count(ProjectStatus::Pending),
            active_projects: count(ProjectStatus::InProgress),
            completed_projects: count(ProjectStatus::Completed),
            total_income,
            total_expenses,
            profit: total_income - total_expenses,
        }
    }

    /// Compact JSON the chat assistant receives as business context.
    pub fn assistant_context(&self) -> String {
        let projects: Vec<serde_json::Value> = self
            .data
            .projects
            .iter()
            .map(|p| {
                serde_json::json!({
                    "title": p.title,
                    "client": p.client_name,
                    "status": p.status,
                    "financials": self.financials(p.id),
                })
            })
            .collect();
        serde_json::json!({ "projects": projects }).to_string()
    }
}
