//! Database repository for CRUD operations and the engine's queries.
//!
//! Uses prepared statements; every method is an independent, short-lived
//! unit of work with no cross-request locking.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Attendance, AttendanceStatus, CreateEmployeeRequest, CreateGeofenceRequest, CreateLeadRequest,
    CreatePermissionRequest, CreateRoleRequest, Employee, EmployeeStatus, GeofenceLocation, Lead,
    LeadHistoryAction, LeadHistoryEntry, LeadMetadata, LeadStatus, Notification, Permission, Role,
    RoleKind, UpdateEmployeeRequest,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== EMPLOYEE OPERATIONS ====================

    /// Onboard a new employee.
    pub async fn create_employee(
        &self,
        request: &CreateEmployeeRequest,
    ) -> Result<Employee, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO employees
               (id, company_id, name, email, department_id, role_id, manager_id,
                status, auto_assign_enabled, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, 'ACTIVE', ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.company_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.department_id)
        .bind(&request.role_id)
        .bind(&request.manager_id)
        .bind(request.auto_assign_enabled as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Employee {
            id,
            company_id: request.company_id.clone(),
            name: request.name.clone(),
            email: request.email.clone(),
            department_id: request.department_id.clone(),
            role_id: request.role_id.clone(),
            manager_id: request.manager_id.clone(),
            status: EmployeeStatus::Active,
            auto_assign_enabled: request.auto_assign_enabled,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an employee by ID.
    pub async fn get_employee(&self, id: &str) -> Result<Option<Employee>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, company_id, name, email, department_id, role_id, manager_id,
                      status, auto_assign_enabled, created_at, updated_at
               FROM employees WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(employee_from_row))
    }

    /// List all employees of a tenant.
    pub async fn list_employees(&self, company_id: &str) -> Result<Vec<Employee>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, company_id, name, email, department_id, role_id, manager_id,
                      status, auto_assign_enabled, created_at, updated_at
               FROM employees WHERE company_id = ? ORDER BY name"#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(employee_from_row).collect())
    }

    /// Update an employee. Employees are soft-deactivated via `status`,
    /// never deleted.
    pub async fn update_employee(
        &self,
        id: &str,
        request: &UpdateEmployeeRequest,
    ) -> Result<Employee, AppError> {
        let existing = self
            .get_employee(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))?;

        let now = Utc::now();
        let status = request.status.unwrap_or(existing.status);
        let auto_assign = request
            .auto_assign_enabled
            .unwrap_or(existing.auto_assign_enabled);
        let department_id = request
            .department_id
            .clone()
            .or(existing.department_id.clone());
        let role_id = request.role_id.clone().or(existing.role_id.clone());
        let manager_id = request.manager_id.clone().or(existing.manager_id.clone());

        sqlx::query(
            r#"UPDATE employees
               SET status = ?, auto_assign_enabled = ?, department_id = ?,
                   role_id = ?, manager_id = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(status.as_str())
        .bind(auto_assign as i32)
        .bind(&department_id)
        .bind(&role_id)
        .bind(&manager_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Employee {
            status,
            auto_assign_enabled: auto_assign,
            department_id,
            role_id,
            manager_id,
            updated_at: now,
            ..existing
        })
    }

    /// Eligible pool for auto-reassignment: active employees of the given
    /// department with auto-assign enabled, excluding administrators.
    /// Ordered by creation time for stable tie-breaking.
    pub async fn eligible_pool(
        &self,
        company_id: &str,
        department_id: &str,
    ) -> Result<Vec<Employee>, AppError> {
        let rows = sqlx::query(
            r#"SELECT e.id, e.company_id, e.name, e.email, e.department_id, e.role_id,
                      e.manager_id, e.status, e.auto_assign_enabled, e.created_at, e.updated_at
               FROM employees e
               LEFT JOIN roles r ON e.role_id = r.id
               WHERE e.company_id = ?
                 AND e.department_id = ?
                 AND e.status = 'ACTIVE'
                 AND e.auto_assign_enabled = 1
                 AND (r.kind IS NULL OR r.kind != 'ADMINISTRATOR')
               ORDER BY e.created_at, e.id"#,
        )
        .bind(company_id)
        .bind(department_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(employee_from_row).collect())
    }

    /// Count the currently active leads held by an employee.
    pub async fn count_active_leads(&self, employee_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS n FROM leads
               WHERE assigned_to_id = ? AND active = 1 AND status IN ('NEW', 'CONTACTED')"#,
        )
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    // ==================== ROLE & PERMISSION OPERATIONS ====================

    /// Create a role.
    pub async fn create_role(&self, request: &CreateRoleRequest) -> Result<Role, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO roles (id, company_id, name, kind, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.company_id)
        .bind(&request.name)
        .bind(request.kind.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Role {
            id,
            company_id: request.company_id.clone(),
            name: request.name.clone(),
            kind: request.kind,
            created_at: now,
        })
    }

    /// Get a role by ID.
    pub async fn get_role(&self, id: &str) -> Result<Option<Role>, AppError> {
        let row = sqlx::query("SELECT id, company_id, name, kind, created_at FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(role_from_row))
    }

    /// Create a permission. Duplicate (tenant, resource, action) tuples
    /// surface as `Conflict` through the unique index.
    pub async fn create_permission(
        &self,
        request: &CreatePermissionRequest,
    ) -> Result<Permission, AppError> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO permissions (id, company_id, resource, action, active) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.company_id)
        .bind(&request.resource)
        .bind(&request.action)
        .bind(request.active as i32)
        .execute(&self.pool)
        .await?;

        Ok(Permission {
            id,
            company_id: request.company_id.clone(),
            resource: request.resource.clone(),
            action: request.action.clone(),
            active: request.active,
        })
    }

    /// Attach a permission to a role.
    pub async fn grant_permission(
        &self,
        role_id: &str,
        permission_id: &str,
    ) -> Result<(), AppError> {
        self.get_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", role_id)))?;

        let exists = sqlx::query("SELECT id FROM permissions WHERE id = ?")
            .bind(permission_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!(
                "Permission {} not found",
                permission_id
            )));
        }

        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Resolve the full permission set of an employee through its role.
    pub async fn permissions_for_employee(
        &self,
        employee_id: &str,
    ) -> Result<Vec<Permission>, AppError> {
        let rows = sqlx::query(
            r#"SELECT p.id, p.company_id, p.resource, p.action, p.active
               FROM employees e
               JOIN roles r ON e.role_id = r.id
               JOIN role_permissions rp ON rp.role_id = r.id
               JOIN permissions p ON p.id = rp.permission_id
               WHERE e.id = ?"#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(permission_from_row).collect())
    }

    /// The role of an employee, if any.
    pub async fn role_of_employee(&self, employee_id: &str) -> Result<Option<Role>, AppError> {
        let row = sqlx::query(
            r#"SELECT r.id, r.company_id, r.name, r.kind, r.created_at
               FROM employees e JOIN roles r ON e.role_id = r.id
               WHERE e.id = ?"#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(role_from_row))
    }

    // ==================== LEAD OPERATIONS ====================

    /// Create a lead.
    pub async fn create_lead(&self, request: &CreateLeadRequest) -> Result<Lead, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let metadata = request.metadata.clone().unwrap_or_default();
        let metadata_json = serde_json::to_string(&metadata)?;

        sqlx::query(
            r#"INSERT INTO leads
               (id, company_id, name, phone, email, source, status, priority,
                assigned_to_id, assigned_at, contacted_at, metadata, active,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, 'NEW', ?, NULL, NULL, NULL, ?, 1, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.company_id)
        .bind(&request.name)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&request.source)
        .bind(request.priority)
        .bind(&metadata_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Lead {
            id,
            company_id: request.company_id.clone(),
            name: request.name.clone(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            source: request.source.clone(),
            status: LeadStatus::New,
            priority: request.priority,
            assigned_to_id: None,
            assigned_at: None,
            contacted_at: None,
            metadata,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a lead by ID.
    pub async fn get_lead(&self, id: &str) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, company_id, name, phone, email, source, status, priority,
                      assigned_to_id, assigned_at, contacted_at, metadata, active,
                      created_at, updated_at
               FROM leads WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(lead_from_row))
    }

    /// List all leads of a tenant.
    pub async fn list_leads(&self, company_id: &str) -> Result<Vec<Lead>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, company_id, name, phone, email, source, status, priority,
                      assigned_to_id, assigned_at, contacted_at, metadata, active,
                      created_at, updated_at
               FROM leads WHERE company_id = ? ORDER BY created_at DESC"#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(lead_from_row).collect())
    }

    /// Set the assignee of a lead, refreshing `assigned_at`. Same-assignee
    /// reassigns still refresh the timestamp.
    pub async fn set_lead_assignee(
        &self,
        lead_id: &str,
        employee_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE leads SET assigned_to_id = ?, assigned_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(employee_id)
        .bind(at)
        .bind(at)
        .bind(lead_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", lead_id)));
        }
        Ok(())
    }

    /// Record first contact. `contacted_at` is monotonic: once set it is
    /// never overwritten, so repeated calls are idempotent.
    pub async fn mark_lead_contacted(
        &self,
        lead_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE leads
               SET contacted_at = COALESCE(contacted_at, ?), status = 'CONTACTED', updated_at = ?
               WHERE id = ?"#,
        )
        .bind(at)
        .bind(at)
        .bind(lead_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", lead_id)));
        }
        Ok(())
    }

    /// Persist merged lead metadata. The merge itself happens in the model
    /// layer and never touches `contacted_at`.
    pub async fn update_lead_metadata(
        &self,
        lead_id: &str,
        metadata: &LeadMetadata,
    ) -> Result<(), AppError> {
        let metadata_json = serde_json::to_string(metadata)?;
        let result = sqlx::query("UPDATE leads SET metadata = ?, updated_at = ? WHERE id = ?")
            .bind(&metadata_json)
            .bind(Utc::now())
            .bind(lead_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Lead {} not found", lead_id)));
        }
        Ok(())
    }

    /// Leads eligible for the auto-reassignment sweep: assigned before the
    /// cutoff, never contacted, still in the active status set.
    pub async fn stale_assigned_leads(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lead>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, company_id, name, phone, email, source, status, priority,
                      assigned_to_id, assigned_at, contacted_at, metadata, active,
                      created_at, updated_at
               FROM leads
               WHERE assigned_to_id IS NOT NULL
                 AND contacted_at IS NULL
                 AND active = 1
                 AND status IN ('NEW', 'CONTACTED')
                 AND datetime(assigned_at) <= datetime(?)
               ORDER BY assigned_at"#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(lead_from_row).collect())
    }

    // ==================== LEAD HISTORY OPERATIONS ====================

    /// Append an audit entry. Entries are write-once.
    pub async fn append_history(
        &self,
        lead_id: &str,
        action: LeadHistoryAction,
        performed_by: Option<&str>,
        previous_assignee_id: Option<&str>,
        new_assignee_id: Option<&str>,
        note: Option<&str>,
    ) -> Result<LeadHistoryEntry, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO lead_history
               (id, lead_id, action, performed_by, previous_assignee_id, new_assignee_id, note, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(lead_id)
        .bind(action.as_str())
        .bind(performed_by)
        .bind(previous_assignee_id)
        .bind(new_assignee_id)
        .bind(note)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(LeadHistoryEntry {
            id,
            lead_id: lead_id.to_string(),
            action,
            performed_by: performed_by.map(String::from),
            previous_assignee_id: previous_assignee_id.map(String::from),
            new_assignee_id: new_assignee_id.map(String::from),
            note: note.map(String::from),
            created_at: now,
        })
    }

    /// History of a lead, oldest first.
    pub async fn list_history(&self, lead_id: &str) -> Result<Vec<LeadHistoryEntry>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, lead_id, action, performed_by, previous_assignee_id,
                      new_assignee_id, note, created_at
               FROM lead_history WHERE lead_id = ? ORDER BY created_at, id"#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(history_from_row).collect())
    }

    // ==================== NOTIFICATION OPERATIONS ====================

    /// Persist a notification.
    pub async fn insert_notification(&self, notification: &Notification) -> Result<(), AppError> {
        let metadata_json = serde_json::to_string(&notification.metadata)?;

        sqlx::query(
            r#"INSERT INTO notifications
               (id, company_id, employee_id, title, message, type, category, is_read, metadata, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&notification.id)
        .bind(&notification.company_id)
        .bind(&notification.employee_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.notification_type)
        .bind(&notification.category)
        .bind(notification.is_read as i32)
        .bind(&metadata_json)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Notifications visible to an employee: their own plus tenant
    /// broadcasts. Without an employee filter, everything in the tenant.
    pub async fn list_notifications(
        &self,
        company_id: &str,
        employee_id: Option<&str>,
    ) -> Result<Vec<Notification>, AppError> {
        let rows = match employee_id {
            Some(emp) => {
                sqlx::query(
                    r#"SELECT id, company_id, employee_id, title, message, type, category,
                              is_read, metadata, created_at
                       FROM notifications
                       WHERE company_id = ? AND (employee_id IS NULL OR employee_id = ?)
                       ORDER BY created_at DESC"#,
                )
                .bind(company_id)
                .bind(emp)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT id, company_id, employee_id, title, message, type, category,
                              is_read, metadata, created_at
                       FROM notifications WHERE company_id = ? ORDER BY created_at DESC"#,
                )
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(notification_from_row).collect())
    }

    /// Flip `is_read`; the only mutation notifications ever receive.
    pub async fn mark_notification_read(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    // ==================== GEOFENCE OPERATIONS ====================

    /// Create a geofence.
    pub async fn create_geofence(
        &self,
        request: &CreateGeofenceRequest,
    ) -> Result<GeofenceLocation, AppError> {
        let id = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            r#"INSERT INTO geofence_locations
               (id, company_id, name, latitude, longitude, radius_meters, active)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.company_id)
        .bind(&request.name)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.radius_meters)
        .bind(request.active as i32)
        .execute(&self.pool)
        .await?;

        Ok(GeofenceLocation {
            id,
            company_id: request.company_id.clone(),
            name: request.name.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
            radius_meters: request.radius_meters,
            active: request.active,
        })
    }

    /// All geofences of a tenant; containment checks filter on `active`.
    pub async fn list_geofences(&self, company_id: &str) -> Result<Vec<GeofenceLocation>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, company_id, name, latitude, longitude, radius_meters, active
               FROM geofence_locations WHERE company_id = ? ORDER BY name"#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(geofence_from_row).collect())
    }

    // ==================== ATTENDANCE OPERATIONS ====================

    /// The attendance record for one employee on one office-local day.
    pub async fn attendance_for_day(
        &self,
        employee_id: &str,
        day: NaiveDate,
    ) -> Result<Option<Attendance>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, company_id, employee_id, day, check_in_at, check_out_at,
                      check_in_lat, check_in_lng, check_out_lat, check_out_lng,
                      address, notes, status, total_hours, break_minutes, is_verified
               FROM attendance WHERE employee_id = ? AND day = ?"#,
        )
        .bind(employee_id)
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(attendance_from_row))
    }

    /// Insert a check-in record. The UNIQUE (employee_id, day) index is the
    /// actual guard against concurrent double check-in; a violation decodes
    /// as `Conflict`.
    pub async fn insert_attendance(&self, attendance: &Attendance) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO attendance
               (id, company_id, employee_id, day, check_in_at, check_out_at,
                check_in_lat, check_in_lng, check_out_lat, check_out_lng,
                address, notes, status, total_hours, break_minutes, is_verified)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&attendance.id)
        .bind(&attendance.company_id)
        .bind(&attendance.employee_id)
        .bind(attendance.day)
        .bind(attendance.check_in_at)
        .bind(attendance.check_out_at)
        .bind(attendance.check_in_lat)
        .bind(attendance.check_in_lng)
        .bind(attendance.check_out_lat)
        .bind(attendance.check_out_lng)
        .bind(&attendance.address)
        .bind(&attendance.notes)
        .bind(attendance.status.as_str())
        .bind(attendance.total_hours)
        .bind(attendance.break_minutes)
        .bind(attendance.is_verified as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Complete an attendance record on check-out.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_attendance(
        &self,
        id: &str,
        check_out_at: DateTime<Utc>,
        check_out_lat: Option<f64>,
        check_out_lng: Option<f64>,
        total_hours: f64,
        notes: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE attendance
               SET check_out_at = ?, check_out_lat = ?, check_out_lng = ?,
                   total_hours = ?, notes = COALESCE(?, notes)
               WHERE id = ?"#,
        )
        .bind(check_out_at)
        .bind(check_out_lat)
        .bind(check_out_lng)
        .bind(total_hours)
        .bind(notes)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Attendance {} not found", id)));
        }
        Ok(())
    }

    /// Attendance records of a tenant, optionally filtered by employee.
    pub async fn list_attendance(
        &self,
        company_id: &str,
        employee_id: Option<&str>,
    ) -> Result<Vec<Attendance>, AppError> {
        let rows = match employee_id {
            Some(emp) => {
                sqlx::query(
                    r#"SELECT id, company_id, employee_id, day, check_in_at, check_out_at,
                              check_in_lat, check_in_lng, check_out_lat, check_out_lng,
                              address, notes, status, total_hours, break_minutes, is_verified
                       FROM attendance WHERE company_id = ? AND employee_id = ?
                       ORDER BY day DESC"#,
                )
                .bind(company_id)
                .bind(emp)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"SELECT id, company_id, employee_id, day, check_in_at, check_out_at,
                              check_in_lat, check_in_lng, check_out_lat, check_out_lng,
                              address, notes, status, total_hours, break_minutes, is_verified
                       FROM attendance WHERE company_id = ? ORDER BY day DESC"#,
                )
                .bind(company_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(attendance_from_row).collect())
    }
}

// Helper functions for row conversion

fn employee_from_row(row: &sqlx::sqlite::SqliteRow) -> Employee {
    let status: String = row.get("status");
    let auto_assign: i32 = row.get("auto_assign_enabled");
    Employee {
        id: row.get("id"),
        company_id: row.get("company_id"),
        name: row.get("name"),
        email: row.get("email"),
        department_id: row.get("department_id"),
        role_id: row.get("role_id"),
        manager_id: row.get("manager_id"),
        status: EmployeeStatus::parse(&status).unwrap_or(EmployeeStatus::Inactive),
        auto_assign_enabled: auto_assign != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn role_from_row(row: &sqlx::sqlite::SqliteRow) -> Role {
    let kind: String = row.get("kind");
    Role {
        id: row.get("id"),
        company_id: row.get("company_id"),
        name: row.get("name"),
        kind: RoleKind::parse(&kind).unwrap_or(RoleKind::Employee),
        created_at: row.get("created_at"),
    }
}

fn permission_from_row(row: &sqlx::sqlite::SqliteRow) -> Permission {
    let active: i32 = row.get("active");
    Permission {
        id: row.get("id"),
        company_id: row.get("company_id"),
        resource: row.get("resource"),
        action: row.get("action"),
        active: active != 0,
    }
}

fn lead_from_row(row: &sqlx::sqlite::SqliteRow) -> Lead {
    let status: String = row.get("status");
    let metadata_str: String = row.get("metadata");
    let active: i32 = row.get("active");
    Lead {
        id: row.get("id"),
        company_id: row.get("company_id"),
        name: row.get("name"),
        phone: row.get("phone"),
        email: row.get("email"),
        source: row.get("source"),
        status: LeadStatus::parse(&status).unwrap_or(LeadStatus::New),
        priority: row.get("priority"),
        assigned_to_id: row.get("assigned_to_id"),
        assigned_at: row.get("assigned_at"),
        contacted_at: row.get("contacted_at"),
        metadata: serde_json::from_str(&metadata_str).unwrap_or_default(),
        active: active != 0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn history_from_row(row: &sqlx::sqlite::SqliteRow) -> LeadHistoryEntry {
    let action: String = row.get("action");
    LeadHistoryEntry {
        id: row.get("id"),
        lead_id: row.get("lead_id"),
        action: LeadHistoryAction::parse(&action).unwrap_or(LeadHistoryAction::Assigned),
        performed_by: row.get("performed_by"),
        previous_assignee_id: row.get("previous_assignee_id"),
        new_assignee_id: row.get("new_assignee_id"),
        note: row.get("note"),
        created_at: row.get("created_at"),
    }
}

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> Notification {
    let is_read: i32 = row.get("is_read");
    let metadata_str: String = row.get("metadata");
    Notification {
        id: row.get("id"),
        company_id: row.get("company_id"),
        employee_id: row.get("employee_id"),
        title: row.get("title"),
        message: row.get("message"),
        notification_type: row.get("type"),
        category: row.get("category"),
        is_read: is_read != 0,
        metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
        created_at: row.get("created_at"),
    }
}

fn geofence_from_row(row: &sqlx::sqlite::SqliteRow) -> GeofenceLocation {
    let active: i32 = row.get("active");
    GeofenceLocation {
        id: row.get("id"),
        company_id: row.get("company_id"),
        name: row.get("name"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        radius_meters: row.get("radius_meters"),
        active: active != 0,
    }
}

fn attendance_from_row(row: &sqlx::sqlite::SqliteRow) -> Attendance {
    let status: String = row.get("status");
    let is_verified: i32 = row.get("is_verified");
    Attendance {
        id: row.get("id"),
        company_id: row.get("company_id"),
        employee_id: row.get("employee_id"),
        day: row.get("day"),
        check_in_at: row.get("check_in_at"),
        check_out_at: row.get("check_out_at"),
        check_in_lat: row.get("check_in_lat"),
        check_in_lng: row.get("check_in_lng"),
        check_out_lat: row.get("check_out_lat"),
        check_out_lng: row.get("check_out_lng"),
        address: row.get("address"),
        notes: row.get("notes"),
        status: AttendanceStatus::parse(&status).unwrap_or(AttendanceStatus::Present),
        total_hours: row.get("total_hours"),
        break_minutes: row.get("break_minutes"),
        is_verified: is_verified != 0,
    }
}
