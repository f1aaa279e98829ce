//! Database operations for `collection_plans` and `collection_plan_tasks`.

use async_trait::async_trait;
use bikefmv_core::{
    CollectionPlan, CollectionStats, PlanError, PlanRecorder, PlanTask, Source, TaskStatus,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `collection_plans` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionPlanRow {
    pub id: i64,
    pub public_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_tasks: i32,
    pub completed_tasks: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `collection_plan_tasks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionPlanTaskRow {
    pub id: i64,
    pub collection_plan_id: i64,
    pub position: i32,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub source: String,
    pub url: String,
    pub records_target: i32,
    pub status: String,
    pub collected: Option<i32>,
    pub duplicates: Option<i32>,
    pub errors: Option<i32>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionPlanTaskRow {
    fn into_task(self) -> Result<PlanTask, DbError> {
        let source: Source = self.source.parse()?;
        let status: TaskStatus = self.status.parse()?;
        let result = match (self.collected, self.duplicates, self.errors) {
            (Some(collected), Some(duplicates), Some(errors)) => Some(CollectionStats {
                collected: non_negative(collected),
                duplicates: non_negative(duplicates),
                errors: non_negative(errors),
            }),
            _ => None,
        };
        Ok(PlanTask {
            brand: self.brand,
            model: self.model,
            year: self.year,
            source,
            url: self.url,
            records_target: non_negative(self.records_target),
            status,
            result,
            error: self.error_message,
        })
    }
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn sql_int<T: TryInto<i32>>(value: T) -> i32 {
    value.try_into().unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Persists a whole plan and its tasks in one transaction.
///
/// Task `position` is the index in `plan.tasks`. Returns the plan row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is written then.
pub async fn create_collection_plan(
    pool: &PgPool,
    plan: &CollectionPlan,
) -> Result<CollectionPlanRow, DbError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, CollectionPlanRow>(
        "INSERT INTO collection_plans (public_id, generated_at, total_tasks, completed_tasks) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, public_id, generated_at, total_tasks, completed_tasks, \
                   created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(plan.generated_at)
    .bind(sql_int(plan.total_tasks))
    .bind(sql_int(plan.completed_tasks))
    .fetch_one(&mut *tx)
    .await?;

    for (position, task) in plan.tasks.iter().enumerate() {
        let stats = task.result.unwrap_or_default();
        let has_result = task.result.is_some();
        sqlx::query(
            "INSERT INTO collection_plan_tasks ( \
                 collection_plan_id, position, brand, model, year, source, url, \
                 records_target, status, collected, duplicates, errors, error_message \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(row.id)
        .bind(sql_int(position))
        .bind(&task.brand)
        .bind(&task.model)
        .bind(task.year)
        .bind(task.source.as_str())
        .bind(&task.url)
        .bind(sql_int(task.records_target))
        .bind(task.status.as_str())
        .bind(has_result.then(|| sql_int(stats.collected)))
        .bind(has_result.then(|| sql_int(stats.duplicates)))
        .bind(has_result.then(|| sql_int(stats.errors)))
        .bind(task.error.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(row)
}

/// Fetches a plan row by its `public_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no plan has that id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_plan(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<CollectionPlanRow, DbError> {
    sqlx::query_as::<_, CollectionPlanRow>(
        "SELECT id, public_id, generated_at, total_tasks, completed_tasks, created_at, updated_at \
         FROM collection_plans \
         WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Rebuilds the full [`CollectionPlan`] for a stored plan.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] for an unknown id, [`DbError::Core`] if a
/// stored source or status no longer parses, or [`DbError::Sqlx`].
pub async fn load_collection_plan(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<(CollectionPlanRow, CollectionPlan), DbError> {
    let plan_row = get_collection_plan(pool, public_id).await?;

    let task_rows = sqlx::query_as::<_, CollectionPlanTaskRow>(
        "SELECT id, collection_plan_id, position, brand, model, year, source, url, \
                records_target, status, collected, duplicates, errors, error_message, updated_at \
         FROM collection_plan_tasks \
         WHERE collection_plan_id = $1 \
         ORDER BY position",
    )
    .bind(plan_row.id)
    .fetch_all(pool)
    .await?;

    let tasks = task_rows
        .into_iter()
        .map(CollectionPlanTaskRow::into_task)
        .collect::<Result<Vec<_>, _>>()?;

    let completed_tasks = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let plan = CollectionPlan {
        generated_at: plan_row.generated_at,
        total_tasks: tasks.len(),
        completed_tasks,
        tasks,
    };
    Ok((plan_row, plan))
}

/// Writes one task's status, result and error, and refreshes the plan's
/// completed counter.
///
/// A task may only be written while it is `pending` or `failed` in the
/// database; `completed` tasks are final.
///
/// # Errors
///
/// Returns [`DbError::InvalidPlanTaskTransition`] if the stored task is
/// already completed or missing, or [`DbError::Sqlx`].
pub async fn update_plan_task(
    pool: &PgPool,
    plan_id: i64,
    position: i32,
    task: &PlanTask,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    let has_result = task.result.is_some();
    let stats = task.result.unwrap_or_default();

    let result = sqlx::query(
        "UPDATE collection_plan_tasks \
         SET status = $1, collected = $2, duplicates = $3, errors = $4, \
             error_message = $5, updated_at = NOW() \
         WHERE collection_plan_id = $6 AND position = $7 AND status <> 'completed'",
    )
    .bind(task.status.as_str())
    .bind(has_result.then(|| sql_int(stats.collected)))
    .bind(has_result.then(|| sql_int(stats.duplicates)))
    .bind(has_result.then(|| sql_int(stats.errors)))
    .bind(task.error.as_deref())
    .bind(plan_id)
    .bind(position)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidPlanTaskTransition { plan_id, position });
    }

    sqlx::query(
        "UPDATE collection_plans \
         SET completed_tasks = ( \
                 SELECT COUNT(*) FROM collection_plan_tasks \
                 WHERE collection_plan_id = $1 AND status = 'completed' \
             ), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(plan_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// [`PlanRecorder`] that writes task transitions to Postgres.
#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
    plan_id: i64,
    public_id: Uuid,
}

impl PgPlanStore {
    /// Stores a freshly generated plan and returns a recorder for it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the plan cannot be written.
    pub async fn create(pool: PgPool, plan: &CollectionPlan) -> Result<Self, DbError> {
        let row = create_collection_plan(&pool, plan).await?;
        tracing::info!(plan_id = %row.public_id, tasks = plan.tasks.len(), "collection plan stored");
        Ok(Self {
            pool,
            plan_id: row.id,
            public_id: row.public_id,
        })
    }

    /// Loads a stored plan for resumption.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] for an unknown id, or any load error.
    pub async fn resume(pool: PgPool, public_id: Uuid) -> Result<(Self, CollectionPlan), DbError> {
        let (row, plan) = load_collection_plan(&pool, public_id).await?;
        Ok((
            Self {
                pool,
                plan_id: row.id,
                public_id: row.public_id,
            },
            plan,
        ))
    }

    #[must_use]
    pub fn public_id(&self) -> Uuid {
        self.public_id
    }
}

#[async_trait]
impl PlanRecorder for PgPlanStore {
    async fn record_task(&self, plan: &CollectionPlan, index: usize) -> Result<(), PlanError> {
        let task = plan.tasks.get(index).ok_or(PlanError::TaskOutOfRange {
            index,
            len: plan.tasks.len(),
        })?;
        update_plan_task(&self.pool, self.plan_id, sql_int(index), task)
            .await
            .map_err(|e| PlanError::Store(e.to_string()))
    }
}
