//! MariaDB storage adapter.
//!
//! Owns one connection and a current-thread runtime, presenting the
//! blocking [`Storage`] facade over async sqlx calls. Every write runs in
//! an explicit transaction: either every row of a submission lands, or
//! none do.

use std::cell::RefCell;

use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{JdbcUrl, Storage, StorageError};
use crate::core::{
    Data, DataId, DriverId, Job, JobId, JobStatus, TaskGraph, TaskId, TaskInputValue, TaskResult,
};

/// Language tag recorded for every task this client submits.
const TASK_LANGUAGE: &str = "rust";

const INSERT_DRIVER: &str = "INSERT INTO `drivers` (`id`) VALUES (?)";

const INSERT_JOB: &str = "INSERT INTO `jobs` (`id`, `client_id`) VALUES (?, ?)";

const INSERT_TASK: &str = "INSERT INTO `tasks` \
    (`id`, `job_id`, `func_name`, `language`, `state`, `timeout`, `max_retry`) \
    VALUES (?, ?, ?, ?, ?, ?, ?)";

const INSERT_TASK_DEPENDENCY: &str =
    "INSERT INTO `task_dependencies` (`parent`, `child`) VALUES (?, ?)";

const INSERT_INPUT_TASK: &str =
    "INSERT INTO `input_tasks` (`job_id`, `task_id`, `position`) VALUES (?, ?, ?)";

const INSERT_OUTPUT_TASK: &str =
    "INSERT INTO `output_tasks` (`job_id`, `task_id`, `position`) VALUES (?, ?, ?)";

const INSERT_TASK_OUTPUT: &str =
    "INSERT INTO `task_outputs` (`task_id`, `position`, `type`) VALUES (?, ?, ?)";

const INSERT_TASK_INPUT_VALUE: &str =
    "INSERT INTO `task_inputs` (`task_id`, `position`, `type`, `value`) VALUES (?, ?, ?, ?)";

const INSERT_TASK_INPUT_DATA: &str =
    "INSERT INTO `task_inputs` (`task_id`, `position`, `type`, `data_id`) VALUES (?, ?, ?, ?)";

const INSERT_TASK_INPUT_OUTPUT: &str = "INSERT INTO `task_inputs` \
    (`task_id`, `position`, `type`, `output_task_id`, `output_task_position`) \
    VALUES (?, ?, ?, ?, ?)";

const GET_JOB_STATUS: &str = "SELECT `state` FROM `jobs` WHERE `id` = ?";

const GET_OUTPUT_TASKS: &str =
    "SELECT `task_id` FROM `output_tasks` WHERE `job_id` = ? ORDER BY `position`";

const GET_TASK_OUTPUTS: &str =
    "SELECT `type`, `value`, `data_id` FROM `task_outputs` WHERE `task_id` = ? ORDER BY `position`";

const INSERT_DATA: &str =
    "INSERT INTO `data` (`id`, `value`, `hard_locality`, `persisted`) VALUES (?, ?, ?, ?)";

const INSERT_DATA_LOCALITY: &str = "INSERT INTO `data_locality` (`id`, `address`) VALUES (?, ?)";

const INSERT_DATA_REF_DRIVER: &str =
    "INSERT INTO `data_ref_driver` (`id`, `driver_id`) VALUES (?, ?)";

const INSERT_DATA_REF_TASK: &str = "INSERT INTO `data_ref_task` (`id`, `task_id`) VALUES (?, ?)";

const GET_DATA: &str = "SELECT `value`, `hard_locality`, `persisted` FROM `data` WHERE `id` = ?";

const GET_DATA_LOCALITY: &str = "SELECT `address` FROM `data_locality` WHERE `id` = ?";

/// Blocking MariaDB-backed storage session.
///
/// Deliberately neither `Send` nor `Sync`: one session, one caller. The
/// driver and its job/data handles share the session through `Rc`.
pub struct MariaDbStorage {
    runtime: tokio::runtime::Runtime,
    conn: RefCell<MySqlConnection>,
}

impl MariaDbStorage {
    /// Connects to the database described by `params`.
    pub fn connect(params: &JdbcUrl) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .database(&params.database);
        if let Some(port) = params.port {
            options = options.port(port);
        }
        if let Some(user) = &params.user {
            options = options.username(user);
        }
        if let Some(password) = &params.password {
            options = options.password(password);
        }

        let conn = runtime.block_on(options.connect())?;
        debug!(host = %params.host, database = %params.database, "storage session opened");
        Ok(MariaDbStorage {
            runtime,
            conn: RefCell::new(conn),
        })
    }
}

impl Storage for MariaDbStorage {
    fn create_driver(&self, driver_id: DriverId) -> Result<(), StorageError> {
        let mut conn = self.conn.borrow_mut();
        self.runtime.block_on(async {
            sqlx::query(INSERT_DRIVER)
                .bind(driver_id.as_bytes().to_vec())
                .execute(&mut *conn)
                .await?;
            Ok(())
        })
    }

    fn submit_jobs(
        &self,
        driver_id: DriverId,
        task_graphs: &[TaskGraph],
    ) -> Result<Vec<Job>, StorageError> {
        if task_graphs.is_empty() {
            return Ok(Vec::new());
        }

        // Ids are issued here, once, immutably per submission.
        let job_ids: Vec<JobId> = task_graphs.iter().map(|_| Uuid::new_v4()).collect();
        let task_ids: Vec<Vec<TaskId>> = task_graphs
            .iter()
            .map(|graph| graph.tasks.iter().map(|_| Uuid::new_v4()).collect())
            .collect();

        let mut conn = self.conn.borrow_mut();
        self.runtime.block_on(async {
            let mut tx = conn.begin().await?;
            match insert_graphs(&mut tx, driver_id, task_graphs, &job_ids, &task_ids).await {
                Ok(()) => {
                    tx.commit().await?;
                    Ok(())
                }
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        debug!(error = %rollback_err, "rollback after failed submission failed");
                    }
                    Err(StorageError::from(err))
                }
            }
        })?;

        debug!(jobs = job_ids.len(), "submitted jobs");
        Ok(job_ids.into_iter().map(Job::new).collect())
    }

    fn get_job_status(&self, job_id: JobId) -> Result<JobStatus, StorageError> {
        let mut conn = self.conn.borrow_mut();
        self.runtime
            .block_on(async { fetch_job_status(&mut conn, job_id).await })
    }

    fn get_job_results(&self, job_id: JobId) -> Result<Option<Vec<TaskResult>>, StorageError> {
        let mut conn = self.conn.borrow_mut();
        self.runtime.block_on(async {
            if fetch_job_status(&mut conn, job_id).await? != JobStatus::Succeeded {
                return Ok(None);
            }

            let output_task_rows = sqlx::query(GET_OUTPUT_TASKS)
                .bind(job_id.as_bytes().to_vec())
                .fetch_all(&mut *conn)
                .await?;

            let mut results = Vec::new();
            for task_row in output_task_rows {
                let task_id_bytes: Vec<u8> = task_row.try_get("task_id")?;
                let task_id = uuid_from_bytes(&task_id_bytes)?;
                let output_rows = sqlx::query(GET_TASK_OUTPUTS)
                    .bind(task_id_bytes)
                    .fetch_all(&mut *conn)
                    .await?;
                for (position, output_row) in output_rows.iter().enumerate() {
                    let tdl_type: String = output_row.try_get("type")?;
                    let value: Option<Vec<u8>> = output_row.try_get("value")?;
                    let data_id: Option<Vec<u8>> = output_row.try_get("data_id")?;
                    match (value, data_id) {
                        (Some(payload), None) => {
                            results.push(TaskResult::Value { tdl_type, payload });
                        }
                        (None, Some(data_id_bytes)) => {
                            let data_id = uuid_from_bytes(&data_id_bytes)?;
                            results.push(TaskResult::Data(fetch_data(&mut conn, data_id).await?));
                        }
                        (Some(_), Some(_)) => {
                            return Err(StorageError::AmbiguousTaskOutput { task_id, position });
                        }
                        (None, None) => {
                            return Err(StorageError::EmptyTaskOutput { task_id, position });
                        }
                    }
                }
            }
            Ok(Some(results))
        })
    }

    fn create_data_with_driver_ref(
        &self,
        driver_id: DriverId,
        data: &Data,
    ) -> Result<(), StorageError> {
        self.create_data(data, INSERT_DATA_REF_DRIVER, driver_id)
    }

    fn create_data_with_task_ref(&self, task_id: TaskId, data: &Data) -> Result<(), StorageError> {
        self.create_data(data, INSERT_DATA_REF_TASK, task_id)
    }

    fn get_data(&self, data_id: DataId) -> Result<Data, StorageError> {
        let mut conn = self.conn.borrow_mut();
        self.runtime
            .block_on(async { fetch_data(&mut conn, data_id).await })
    }
}

impl MariaDbStorage {
    /// Inserts a data row, its localities, and one reference row.
    fn create_data(&self, data: &Data, ref_sql: &str, ref_id: Uuid) -> Result<(), StorageError> {
        let mut conn = self.conn.borrow_mut();
        self.runtime.block_on(async {
            let mut tx = conn.begin().await?;
            let outcome: Result<(), sqlx::Error> = async {
                sqlx::query(INSERT_DATA)
                    .bind(data.id.as_bytes().to_vec())
                    .bind(data.value.clone())
                    .bind(data.hard_locality)
                    .bind(data.persisted)
                    .execute(&mut *tx)
                    .await?;
                for address in &data.localities {
                    sqlx::query(INSERT_DATA_LOCALITY)
                        .bind(data.id.as_bytes().to_vec())
                        .bind(address.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
                sqlx::query(ref_sql)
                    .bind(data.id.as_bytes().to_vec())
                    .bind(ref_id.as_bytes().to_vec())
                    .execute(&mut *tx)
                    .await?;
                Ok(())
            }
            .await;

            match outcome {
                Ok(()) => {
                    tx.commit().await?;
                    Ok(())
                }
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        debug!(error = %rollback_err, "rollback after failed data creation failed");
                    }
                    Err(StorageError::from(err))
                }
            }
        })
    }
}

async fn insert_graphs(
    tx: &mut Transaction<'_, MySql>,
    driver_id: DriverId,
    task_graphs: &[TaskGraph],
    job_ids: &[JobId],
    task_ids: &[Vec<TaskId>],
) -> Result<(), sqlx::Error> {
    for (graph_index, (job_id, graph)) in job_ids.iter().zip(task_graphs).enumerate() {
        let ids = &task_ids[graph_index];

        sqlx::query(INSERT_JOB)
            .bind(job_id.as_bytes().to_vec())
            .bind(driver_id.as_bytes().to_vec())
            .execute(&mut **tx)
            .await?;

        for (task_index, task) in graph.tasks.iter().enumerate() {
            sqlx::query(INSERT_TASK)
                .bind(ids[task_index].as_bytes().to_vec())
                .bind(job_id.as_bytes().to_vec())
                .bind(task.function_name.as_str())
                .bind(TASK_LANGUAGE)
                .bind(task.state.as_state_str())
                .bind(task.timeout)
                .bind(task.max_retries)
                .execute(&mut **tx)
                .await?;
        }

        for &(parent, child) in &graph.dependencies {
            sqlx::query(INSERT_TASK_DEPENDENCY)
                .bind(ids[parent].as_bytes().to_vec())
                .bind(ids[child].as_bytes().to_vec())
                .execute(&mut **tx)
                .await?;
        }

        for (position, &task_index) in graph.input_task_indices.iter().enumerate() {
            sqlx::query(INSERT_INPUT_TASK)
                .bind(job_id.as_bytes().to_vec())
                .bind(ids[task_index].as_bytes().to_vec())
                .bind(position as u32)
                .execute(&mut **tx)
                .await?;
        }

        for (position, &task_index) in graph.output_task_indices.iter().enumerate() {
            sqlx::query(INSERT_OUTPUT_TASK)
                .bind(job_id.as_bytes().to_vec())
                .bind(ids[task_index].as_bytes().to_vec())
                .bind(position as u32)
                .execute(&mut **tx)
                .await?;
        }

        for (task_index, task) in graph.tasks.iter().enumerate() {
            for (position, output) in task.task_outputs.iter().enumerate() {
                sqlx::query(INSERT_TASK_OUTPUT)
                    .bind(ids[task_index].as_bytes().to_vec())
                    .bind(position as u32)
                    .bind(output.tdl_type.as_str())
                    .execute(&mut **tx)
                    .await?;
            }
        }

        // Bound inputs: inline bytes or data references. Inputs wired to
        // another task's output are written from the graph's refs below.
        for (task_index, task) in graph.tasks.iter().enumerate() {
            for (position, input) in task.task_inputs.iter().enumerate() {
                match &input.value {
                    Some(TaskInputValue::Inline(payload)) => {
                        sqlx::query(INSERT_TASK_INPUT_VALUE)
                            .bind(ids[task_index].as_bytes().to_vec())
                            .bind(position as u32)
                            .bind(input.tdl_type.as_str())
                            .bind(payload.clone())
                            .execute(&mut **tx)
                            .await?;
                    }
                    Some(TaskInputValue::Data(data_id)) => {
                        sqlx::query(INSERT_TASK_INPUT_DATA)
                            .bind(ids[task_index].as_bytes().to_vec())
                            .bind(position as u32)
                            .bind(input.tdl_type.as_str())
                            .bind(data_id.as_bytes().to_vec())
                            .execute(&mut **tx)
                            .await?;
                    }
                    None => {}
                }
            }
        }

        for r in &graph.task_input_output_refs {
            let declared = &graph.tasks[r.consumer].task_inputs[r.input_position].tdl_type;
            sqlx::query(INSERT_TASK_INPUT_OUTPUT)
                .bind(ids[r.consumer].as_bytes().to_vec())
                .bind(r.input_position as u32)
                .bind(declared.as_str())
                .bind(ids[r.producer].as_bytes().to_vec())
                .bind(r.output_position as u32)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}

async fn fetch_job_status(
    conn: &mut MySqlConnection,
    job_id: JobId,
) -> Result<JobStatus, StorageError> {
    let row = sqlx::query(GET_JOB_STATUS)
        .bind(job_id.as_bytes().to_vec())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StorageError::JobNotFound(job_id))?;
    let state: String = row.try_get("state")?;
    JobStatus::from_state_str(&state).ok_or(StorageError::UnknownJobState(state))
}

async fn fetch_data(conn: &mut MySqlConnection, data_id: DataId) -> Result<Data, StorageError> {
    let row = sqlx::query(GET_DATA)
        .bind(data_id.as_bytes().to_vec())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(StorageError::DataNotFound(data_id))?;

    let mut data = Data::new(data_id, row.try_get("value")?);
    data.hard_locality = row.try_get("hard_locality")?;
    data.persisted = row.try_get("persisted")?;

    let locality_rows = sqlx::query(GET_DATA_LOCALITY)
        .bind(data_id.as_bytes().to_vec())
        .fetch_all(&mut *conn)
        .await?;
    for locality_row in locality_rows {
        data.localities.push(locality_row.try_get("address")?);
    }
    Ok(data)
}

fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid, StorageError> {
    Uuid::from_slice(bytes).map_err(|_| StorageError::MalformedId(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_from_bytes_requires_sixteen() {
        let id = Uuid::new_v4();
        assert_eq!(uuid_from_bytes(id.as_bytes()).unwrap(), id);
        assert!(matches!(
            uuid_from_bytes(&[0u8; 4]),
            Err(StorageError::MalformedId(4))
        ));
    }
}
