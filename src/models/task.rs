use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use validator::{Validate, ValidationError};

use crate::error::{AppError, FieldErrors};

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_status")]
pub enum TaskStatus {
    /// Task is yet to be started.
    #[default]
    #[serde(rename = "To Do")]
    #[sqlx(rename = "To Do")]
    ToDo,
    /// Task is currently being worked on.
    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,
    /// Task is completed.
    #[serde(rename = "Done")]
    #[sqlx(rename = "Done")]
    Done,
    /// Task cannot progress until something else happens.
    #[serde(rename = "Blocked")]
    #[sqlx(rename = "Blocked")]
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::ToDo,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Blocked => "Blocked",
        }
    }
}

/// Represents the category of a task.
/// Corresponds to the `task_category` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(type_name = "task_category")]
pub enum TaskCategory {
    #[serde(rename = "Work")]
    #[sqlx(rename = "Work")]
    Work,
    #[default]
    #[serde(rename = "Personal")]
    #[sqlx(rename = "Personal")]
    Personal,
    #[serde(rename = "Study")]
    #[sqlx(rename = "Study")]
    Study,
    #[serde(rename = "Shopping")]
    #[sqlx(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Other")]
    #[sqlx(rename = "Other")]
    Other,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 5] = [
        TaskCategory::Work,
        TaskCategory::Personal,
        TaskCategory::Study,
        TaskCategory::Shopping,
        TaskCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Work => "Work",
            TaskCategory::Personal => "Personal",
            TaskCategory::Study => "Study",
            TaskCategory::Shopping => "Shopping",
            TaskCategory::Other => "Other",
        }
    }
}

/// Error returned when a string is not one of an enum's allowed values.
/// The message names the rejected value and the full allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChoice(pub String);

impl fmt::Display for InvalidChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn invalid_choice(value: &str, allowed: &[&str]) -> InvalidChoice {
    InvalidChoice(format!(
        "\"{}\" is not a valid choice. Allowed values: {}.",
        value,
        allowed.join(", ")
    ))
}

impl FromStr for TaskStatus {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| invalid_choice(s, &TaskStatus::ALL.map(|v| v.as_str())))
    }
}

impl FromStr for TaskCategory {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| invalid_choice(s, &TaskCategory::ALL.map(|v| v.as_str())))
    }
}

const TITLE_MAX_CHARS: usize = 200;
const ASSIGNED_USERS_MAX_CHARS: usize = 255;

/// One member of a JSON request body.
///
/// Deserializing never fails: a value of the wrong JSON type is kept as `Invalid` so it can
/// be reported against its field together with every other field error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Field<T> {
    Absent,
    Null,
    Value(T),
    Invalid(Value),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => Field::Null,
            raw => match T::deserialize(&raw) {
                Ok(value) => Field::Value(value),
                Err(_) => Field::Invalid(raw),
            },
        })
    }
}

fn push_error(errors: &mut FieldErrors, name: &str, message: String) {
    errors.entry(name.to_string()).or_default().push(message);
}

impl<T> Field<T> {
    /// Value of a non-nullable field. `required` makes absence an error.
    fn into_required(
        self,
        name: &str,
        required: bool,
        invalid: fn(&Value) -> String,
        errors: &mut FieldErrors,
    ) -> Option<T> {
        match self {
            Field::Value(value) => return Some(value),
            Field::Absent if required => {
                push_error(errors, name, "This field is required.".to_string())
            }
            Field::Absent => {}
            Field::Null => push_error(errors, name, "This field may not be null.".to_string()),
            Field::Invalid(raw) => push_error(errors, name, invalid(&raw)),
        }
        None
    }

    /// Value of a nullable field: outer `None` when absent, `Some(None)` for `null`.
    fn into_nullable(
        self,
        name: &str,
        invalid: fn(&Value) -> String,
        errors: &mut FieldErrors,
    ) -> Option<Option<T>> {
        match self {
            Field::Absent => None,
            Field::Null => Some(None),
            Field::Value(value) => Some(Some(value)),
            Field::Invalid(raw) => {
                push_error(errors, name, invalid(&raw));
                None
            }
        }
    }
}

fn not_a_string(_: &Value) -> String {
    "Not a valid string.".to_string()
}

fn not_a_boolean(_: &Value) -> String {
    "Must be a valid boolean.".to_string()
}

fn not_a_datetime(_: &Value) -> String {
    "Datetime has wrong format. Use one of these formats instead: \
     YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z]."
        .to_string()
}

fn raw_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn not_a_status(raw: &Value) -> String {
    invalid_choice(&raw_text(raw), &TaskStatus::ALL.map(|v| v.as_str())).0
}

fn not_a_category(raw: &Value) -> String {
    invalid_choice(&raw_text(raw), &TaskCategory::ALL.map(|v| v.as_str())).0
}

fn message_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

fn validate_status(value: &Field<String>) -> Result<(), ValidationError> {
    match value {
        Field::Value(s) => s
            .parse::<TaskStatus>()
            .map(|_| ())
            .map_err(|e| message_error("invalid_choice", e.0)),
        _ => Ok(()),
    }
}

fn validate_category(value: &Field<String>) -> Result<(), ValidationError> {
    match value {
        Field::Value(s) => s
            .parse::<TaskCategory>()
            .map(|_| ())
            .map_err(|e| message_error("invalid_choice", e.0)),
        _ => Ok(()),
    }
}

// Titles are stored trimmed, so both checks apply to the trimmed text.
fn validate_title(value: &Field<String>) -> Result<(), ValidationError> {
    let title = match value {
        Field::Value(s) => s.trim(),
        _ => return Ok(()),
    };
    if title.is_empty() {
        Err(message_error("blank", "This field may not be blank.".to_string()))
    } else if title.chars().count() > TITLE_MAX_CHARS {
        Err(message_error(
            "max_length",
            format!("Ensure this field has no more than {} characters.", TITLE_MAX_CHARS),
        ))
    } else {
        Ok(())
    }
}

fn validate_assigned_users(value: &Field<String>) -> Result<(), ValidationError> {
    match value {
        Field::Value(s) if s.chars().count() > ASSIGNED_USERS_MAX_CHARS => Err(message_error(
            "max_length",
            format!(
                "Ensure this field has no more than {} characters.",
                ASSIGNED_USERS_MAX_CHARS
            ),
        )),
        _ => Ok(()),
    }
}

/// Request body for creating or updating a task.
///
/// Every field is optional at the parsing stage so that create, full update and partial
/// update can share one shape; which fields are required is decided by the operation.
/// Fields the server owns (`id`, `owner`, `createdAt`) are not part of this struct and are
/// dropped silently if a client sends them.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct TaskPayload {
    #[validate(custom = "validate_title")]
    pub title: Field<String>,

    pub description: Field<String>,

    #[serde(rename = "startTime")]
    pub start_time: Field<DateTime<Utc>>,

    #[serde(rename = "endTime")]
    pub end_time: Field<DateTime<Utc>>,

    #[validate(custom = "validate_status")]
    pub status: Field<String>,

    #[validate(custom = "validate_category")]
    pub category: Field<String>,

    pub completed: Field<bool>,

    #[serde(rename = "assignedUsers")]
    #[validate(custom = "validate_assigned_users")]
    pub assigned_users: Field<String>,

    #[serde(rename = "isUrgent")]
    pub is_urgent: Field<bool>,
}

/// The client-editable columns of a task, fully resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub category: TaskCategory,
    pub completed: bool,
    pub assigned_users: Option<String>,
    pub is_urgent: bool,
}

impl TaskPayload {
    /// Resolves the payload for a create: `title` and `description` are required, the rest
    /// falls back to column defaults.
    pub fn into_new(self) -> Result<TaskFields, AppError> {
        self.resolve(TaskFields::default(), true)
    }

    /// Resolves the payload for a full update (`PUT`) of `current`.
    pub fn into_replacement(self, current: TaskFields) -> Result<TaskFields, AppError> {
        self.resolve(current, true)
    }

    /// Resolves the payload for a partial update (`PATCH`) of `current`.
    pub fn into_patch(self, current: TaskFields) -> Result<TaskFields, AppError> {
        self.resolve(current, false)
    }

    fn resolve(self, base: TaskFields, require_full: bool) -> Result<TaskFields, AppError> {
        let mut errors: FieldErrors = match self.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => match AppError::from(e) {
                AppError::ValidationError(fields) => fields,
                other => return Err(other),
            },
        };

        let title = self.title.into_required("title", require_full, not_a_string, &mut errors);
        let description =
            self.description
                .into_required("description", require_full, not_a_string, &mut errors);
        let start_time = self.start_time.into_nullable("startTime", not_a_datetime, &mut errors);
        let end_time = self.end_time.into_nullable("endTime", not_a_datetime, &mut errors);
        let status = self.status.into_required("status", false, not_a_status, &mut errors);
        let category = self.category.into_required("category", false, not_a_category, &mut errors);
        let completed = self.completed.into_required("completed", false, not_a_boolean, &mut errors);
        let assigned_users =
            self.assigned_users
                .into_nullable("assignedUsers", not_a_string, &mut errors);
        let is_urgent = self.is_urgent.into_required("isUrgent", false, not_a_boolean, &mut errors);

        if !errors.is_empty() {
            return Err(AppError::ValidationError(errors));
        }

        let status: TaskStatus = match status {
            Some(s) => s
                .parse::<TaskStatus>()
                .map_err(|e| AppError::field("status", e.0))?,
            None => base.status,
        };
        let category: TaskCategory = match category {
            Some(c) => c
                .parse::<TaskCategory>()
                .map_err(|e| AppError::field("category", e.0))?,
            None => base.category,
        };

        Ok(TaskFields {
            title: title.map(|t| t.trim().to_string()).unwrap_or(base.title),
            description: description.unwrap_or(base.description),
            start_time: start_time.unwrap_or(base.start_time),
            end_time: end_time.unwrap_or(base.end_time),
            status,
            category,
            completed: completed.unwrap_or(base.completed),
            assigned_users: assigned_users.unwrap_or(base.assigned_users),
            is_urgent: is_urgent.unwrap_or(base.is_urgent),
        })
    }
}

/// Represents a task as stored in the database and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i32,
    /// The owning user's id. Set once from the caller at creation.
    #[sqlx(rename = "owner_id")]
    pub owner: i32,
    pub title: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub category: TaskCategory,
    pub completed: bool,
    pub assigned_users: Option<String>,
    /// Server-assigned at insert; never updated.
    pub created_at: DateTime<Utc>,
    pub is_urgent: bool,
}

const TASK_COLUMNS: &str = "id, owner_id, title, description, start_time, end_time, status, \
                            category, completed, assigned_users, created_at, is_urgent";

impl Task {
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            category: self.category,
            completed: self.completed,
            assigned_users: self.assigned_users.clone(),
            is_urgent: self.is_urgent,
        }
    }

    /// All tasks of `owner_id`, newest first. Tasks created at the same instant keep their
    /// insertion order.
    pub async fn list_for_owner(pool: &PgPool, owner_id: i32) -> Result<Vec<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE owner_id = $1 ORDER BY created_at DESC, id ASC",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(owner_id)
            .fetch_all(pool)
            .await?;
        Ok(tasks)
    }

    /// Looks up a task by id, but only among the tasks of `owner_id`.
    pub async fn find_owned(
        pool: &PgPool,
        id: i32,
        owner_id: i32,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND owner_id = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;
        Ok(task)
    }

    pub async fn insert(pool: &PgPool, owner_id: i32, fields: &TaskFields) -> Result<Task, AppError> {
        let sql = format!(
            "INSERT INTO tasks (owner_id, title, description, start_time, end_time, status, \
             category, completed, assigned_users, created_at, is_urgent) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(owner_id)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(fields.start_time)
            .bind(fields.end_time)
            .bind(fields.status)
            .bind(fields.category)
            .bind(fields.completed)
            .bind(&fields.assigned_users)
            .bind(Utc::now())
            .bind(fields.is_urgent)
            .fetch_one(pool)
            .await?;
        Ok(task)
    }

    /// Overwrites the editable columns of an owned task. `owner_id` and `created_at` are
    /// never written. Returns `None` when no such task is owned by `owner_id`.
    pub async fn update_owned(
        pool: &PgPool,
        id: i32,
        owner_id: i32,
        fields: &TaskFields,
    ) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET title = $1, description = $2, start_time = $3, end_time = $4, \
             status = $5, category = $6, completed = $7, assigned_users = $8, is_urgent = $9 \
             WHERE id = $10 AND owner_id = $11 \
             RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(fields.start_time)
            .bind(fields.end_time)
            .bind(fields.status)
            .bind(fields.category)
            .bind(fields.completed)
            .bind(&fields.assigned_users)
            .bind(fields.is_urgent)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await?;
        Ok(task)
    }

    /// Deletes an owned task. Returns whether a row was removed.
    pub async fn delete_owned(pool: &PgPool, id: i32, owner_id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
