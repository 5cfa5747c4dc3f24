//! Lead assignment engine.
//!
//! Owns manual assignment, bulk assignment, first-contact marking and the
//! periodic auto-reassignment sweep. Writes go through the repository;
//! cache invalidation and notifications follow every successful commit.
//! History and notification failures degrade (logged) without rolling back
//! a committed assignment.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::authz::PermissionResolver;
use crate::cache::TtlCache;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    BulkAssignOutcome, Employee, Lead, LeadHistoryAction, SweepLeadResult, SweepOutcome,
    SweepReport,
};
use crate::notify::Notifier;

/// Reason tag attached to sweep-driven reassignments.
const REASON_AUTO_REASSIGNED: &str = "auto_reassigned_no_contact";

pub struct LeadEngine {
    repo: Arc<Repository>,
    cache: Arc<TtlCache>,
    authz: PermissionResolver,
    notifier: Arc<Notifier>,
}

impl LeadEngine {
    pub fn new(
        repo: Arc<Repository>,
        cache: Arc<TtlCache>,
        authz: PermissionResolver,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            repo,
            cache,
            authz,
            notifier,
        }
    }

    /// Manually assign a lead. Reassigning to the current assignee is
    /// permitted and still refreshes `assignedAt`.
    pub async fn assign_lead(
        &self,
        principal_id: &str,
        lead_id: &str,
        employee_id: &str,
        note: Option<&str>,
    ) -> Result<Lead, AppError> {
        if !self.authz.authorize(principal_id, "lead", "UPDATE").await? {
            return Err(AppError::Forbidden(
                "Missing UPDATE permission on lead".to_string(),
            ));
        }

        let lead = self
            .repo
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;
        let employee = self
            .repo
            .get_employee(employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))?;

        self.apply_assignment(
            &lead,
            &employee,
            LeadHistoryAction::Assigned,
            Some(principal_id),
            note,
            None,
        )
        .await?;

        self.repo
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::Internal("Lead vanished after assignment".to_string()))
    }

    /// Assign a batch of leads to one employee. Missing or inactive lead ids
    /// are silently dropped; a failure on one lead never aborts the others.
    /// One notification describes the whole batch.
    pub async fn bulk_assign(
        &self,
        principal_id: &str,
        lead_ids: &[String],
        employee_id: &str,
    ) -> Result<BulkAssignOutcome, AppError> {
        if !self.authz.authorize(principal_id, "lead", "UPDATE").await? {
            return Err(AppError::Forbidden(
                "Missing UPDATE permission on lead".to_string(),
            ));
        }
        if lead_ids.is_empty() {
            return Err(AppError::Validation("No lead ids provided".to_string()));
        }

        let employee = self
            .repo
            .get_employee(employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))?;

        let now = Utc::now();
        let mut assigned = 0usize;

        for lead_id in lead_ids {
            let lead = match self.repo.get_lead(lead_id).await {
                Ok(Some(lead)) if lead.active => lead,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(lead_id = %lead_id, "Bulk assign lookup failed: {}", e);
                    continue;
                }
            };

            if let Err(e) = self.repo.set_lead_assignee(&lead.id, &employee.id, now).await {
                tracing::warn!(lead_id = %lead.id, "Bulk assign write failed: {}", e);
                continue;
            }
            assigned += 1;

            if let Err(e) = self
                .repo
                .append_history(
                    &lead.id,
                    LeadHistoryAction::BulkAssigned,
                    Some(principal_id),
                    lead.assigned_to_id.as_deref(),
                    Some(&employee.id),
                    None,
                )
                .await
            {
                tracing::warn!(lead_id = %lead.id, "Bulk assign history append failed: {}", e);
            }
        }

        self.cache
            .invalidate_by_prefix("lead", Some(&employee.company_id));

        if assigned > 0 {
            self.cache
                .invalidate_by_prefix("notification", Some(&employee.company_id));
            // One batch notification, not one per lead
            if let Err(e) = self
                .notifier
                .notify(
                    Some(&employee.id),
                    &employee.company_id,
                    "Leads assigned",
                    &format!("{} leads have been assigned to you", assigned),
                    "lead",
                    "bulk_assignment",
                    Some(json!({ "count": assigned })),
                )
                .await
            {
                tracing::warn!("Bulk assign notification failed: {}", e);
            }
        }

        Ok(BulkAssignOutcome {
            assigned_count: assigned,
            employee_name: employee.name,
        })
    }

    /// Record first contact. Permitted for the current assignee or an
    /// elevated role. Idempotent: `contactedAt` is set exactly once.
    pub async fn mark_contacted(
        &self,
        principal_id: &str,
        lead_id: &str,
    ) -> Result<Lead, AppError> {
        let lead = self
            .repo
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead_id)))?;

        let is_assignee = lead.assigned_to_id.as_deref() == Some(principal_id);
        if !is_assignee && !self.authz.is_elevated(principal_id).await? {
            return Err(AppError::Forbidden(
                "Only the assignee or an elevated role may mark a lead contacted".to_string(),
            ));
        }

        let first_contact = lead.contacted_at.is_none();
        self.repo.mark_lead_contacted(lead_id, Utc::now()).await?;
        self.cache
            .invalidate_by_prefix("lead", Some(&lead.company_id));

        if first_contact {
            if let Err(e) = self
                .repo
                .append_history(
                    lead_id,
                    LeadHistoryAction::Contacted,
                    Some(principal_id),
                    lead.assigned_to_id.as_deref(),
                    lead.assigned_to_id.as_deref(),
                    None,
                )
                .await
            {
                tracing::warn!(lead_id = %lead_id, "Contact history append failed: {}", e);
            }
        }

        self.repo
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::Internal("Lead vanished after contact".to_string()))
    }

    /// One sweep over all currently eligible leads: assigned at least
    /// `threshold_hours` ago, never contacted, still in the active status
    /// set. Sequential by design so the load tallies stay internally
    /// consistent within the sweep; callers must not overlap invocations.
    pub async fn run_reassignment_sweep(&self, threshold_hours: i64) -> SweepReport {
        let cutoff = Utc::now() - Duration::hours(threshold_hours);

        let leads = match self.repo.stale_assigned_leads(cutoff).await {
            Ok(leads) => leads,
            Err(e) => {
                tracing::error!("Sweep lead selection failed: {}", e);
                return SweepReport {
                    reassigned_count: 0,
                    results: Vec::new(),
                };
            }
        };

        tracing::info!(candidates = leads.len(), "Starting reassignment sweep");

        let mut results = Vec::with_capacity(leads.len());
        let mut reassigned_count = 0usize;

        for lead in &leads {
            // One bad record never halts the batch
            let result = match self.sweep_one(lead).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(lead_id = %lead.id, "Sweep failed for lead: {}", e);
                    SweepLeadResult {
                        lead_id: lead.id.clone(),
                        outcome: SweepOutcome::Error,
                        new_assignee_id: None,
                        detail: Some(e.message()),
                    }
                }
            };
            if result.outcome == SweepOutcome::Reassigned {
                reassigned_count += 1;
            }
            results.push(result);
        }

        tracing::info!(reassigned = reassigned_count, "Reassignment sweep finished");
        SweepReport {
            reassigned_count,
            results,
        }
    }

    async fn sweep_one(&self, lead: &Lead) -> Result<SweepLeadResult, AppError> {
        let current_id = lead
            .assigned_to_id
            .as_deref()
            .ok_or_else(|| AppError::Internal("Stale lead without assignee".to_string()))?;

        // An assignee without a department yields no eligible pool.
        let department = match self.repo.get_employee(current_id).await? {
            Some(assignee) => assignee.department_id,
            None => None,
        };
        let Some(department) = department else {
            return Ok(SweepLeadResult {
                lead_id: lead.id.clone(),
                outcome: SweepOutcome::NoAvailableEmployees,
                new_assignee_id: None,
                detail: None,
            });
        };

        let pool = self
            .repo
            .eligible_pool(&lead.company_id, &department)
            .await?;
        if pool.is_empty() {
            return Ok(SweepLeadResult {
                lead_id: lead.id.clone(),
                outcome: SweepOutcome::NoAvailableEmployees,
                new_assignee_id: None,
                detail: None,
            });
        }

        let selected = self.least_loaded(&pool).await?;

        if selected.id == current_id {
            // Self-reassignment would only produce a spurious history entry
            // and notification.
            return Ok(SweepLeadResult {
                lead_id: lead.id.clone(),
                outcome: SweepOutcome::AlreadyLeastLoaded,
                new_assignee_id: None,
                detail: None,
            });
        }

        self.apply_assignment(
            lead,
            &selected,
            LeadHistoryAction::AutoReassigned,
            None,
            None,
            Some(REASON_AUTO_REASSIGNED),
        )
        .await?;

        Ok(SweepLeadResult {
            lead_id: lead.id.clone(),
            outcome: SweepOutcome::Reassigned,
            new_assignee_id: Some(selected.id.clone()),
            detail: None,
        })
    }

    /// Strictly smallest active-lead count wins; ties resolve to the first
    /// candidate in pool iteration order.
    async fn least_loaded(&self, pool: &[Employee]) -> Result<Employee, AppError> {
        let mut best: Option<(&Employee, i64)> = None;
        for candidate in pool {
            let count = self.repo.count_active_leads(&candidate.id).await?;
            match best {
                Some((_, best_count)) if count >= best_count => {}
                _ => best = Some((candidate, count)),
            }
        }
        best.map(|(e, _)| e.clone())
            .ok_or_else(|| AppError::Internal("Empty candidate pool".to_string()))
    }

    /// Shared write path for manual and automatic reassignment: commit the
    /// assignee change, invalidate caches, then degrade-tolerant history
    /// and notifications.
    async fn apply_assignment(
        &self,
        lead: &Lead,
        employee: &Employee,
        action: LeadHistoryAction,
        performed_by: Option<&str>,
        note: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), AppError> {
        let previous = lead.assigned_to_id.clone();
        let now = Utc::now();

        self.repo
            .set_lead_assignee(&lead.id, &employee.id, now)
            .await?;
        self.cache
            .invalidate_by_prefix("lead", Some(&lead.company_id));
        self.cache
            .invalidate_by_prefix("notification", Some(&lead.company_id));

        if let Err(e) = self
            .repo
            .append_history(
                &lead.id,
                action,
                performed_by,
                previous.as_deref(),
                Some(&employee.id),
                note,
            )
            .await
        {
            tracing::warn!(lead_id = %lead.id, "History append failed: {}", e);
        }

        let metadata = json!({
            "leadId": lead.id,
            "reason": reason,
        });

        if let Err(e) = self
            .notifier
            .notify(
                Some(&employee.id),
                &lead.company_id,
                "Lead assigned",
                &format!("Lead {} has been assigned to you", lead.name),
                "lead",
                "assignment",
                Some(metadata.clone()),
            )
            .await
        {
            tracing::warn!(lead_id = %lead.id, "Assignee notification failed: {}", e);
        }

        // The previous holder is told only when the assignee actually changed
        if let Some(prev) = previous.filter(|p| p != &employee.id) {
            if let Err(e) = self
                .notifier
                .notify(
                    Some(&prev),
                    &lead.company_id,
                    "Lead reassigned",
                    &format!("Lead {} has been reassigned to {}", lead.name, employee.name),
                    "lead",
                    "assignment",
                    Some(metadata),
                )
                .await
            {
                tracing::warn!(lead_id = %lead.id, "Previous assignee notification failed: {}", e);
            }
        }

        Ok(())
    }
}
