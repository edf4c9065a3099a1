//! [apps/control-plane/src/services/scheduler.rs]
//! Nightly cron-like coordinator. A 30-second tick checks every job's
//! (hour, minute) against local time; a job whose last run is not today
//! fires once. Each handler is a boxed async closure rather than a plain
//! callback, so jobs can own the repositories and paths they need.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, Timelike, Utc};
use nyx_infra_store::{CorrectionRepository, StorePool};
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

pub type JobOutcome = Result<Value, String>;
pub type JobHandler = Box<dyn Fn() -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync>;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

struct Job {
    name: String,
    hour: u32,
    minute: u32,
    handler: Arc<JobHandler>,
    enabled: bool,
    last_run: Option<NaiveDate>,
    run_count: u64,
    error_count: u64,
}

impl Job {
    fn should_run(&self, now: chrono::DateTime<Local>) -> bool {
        if !self.enabled {
            return false;
        }
        if now.hour() != self.hour || now.minute() != self.minute {
            return false;
        }
        self.last_run.map_or(true, |last| last < now.date_naive())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStats {
    pub name: String,
    pub schedule: String,
    pub enabled: bool,
    pub last_run: Option<NaiveDate>,
    pub run_count: u64,
    pub error_count: u64,
}

pub struct Scheduler {
    jobs: Mutex<Vec<Job>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: Mutex::new(Vec::new()) }
    }

    pub async fn add_job(&self, name: &str, hour: u32, minute: u32, handler: JobHandler) {
        let mut jobs = self.jobs.lock().await;
        jobs.push(Job {
            name: name.to_string(),
            hour,
            minute,
            handler: Arc::new(handler),
            enabled: true,
            last_run: None,
            run_count: 0,
            error_count: 0,
        });
        info!("🗓️ [SCHEDULER]: registered job '{name}' @ {hour:02}:{minute:02}");
    }

    /// Runs the 30-second check loop forever; intended to be spawned once
    /// at kernel ignition.
    pub async fn run_forever(self: Arc<Self>) {
        let mut interval = tokio::time::interval(CHECK_INTERVAL);
        loop {
            interval.tick().await;
            self.tick(Local::now()).await;
        }
    }

    #[instrument(skip(self))]
    async fn tick(&self, now: chrono::DateTime<Local>) {
        let due: Vec<usize> = {
            let jobs = self.jobs.lock().await;
            jobs.iter().enumerate().filter(|(_, j)| j.should_run(now)).map(|(i, _)| i).collect()
        };
        for index in due {
            self.execute(index, now).await;
        }
    }

    async fn execute(&self, index: usize, now: chrono::DateTime<Local>) {
        let (name, handler) = {
            let jobs = self.jobs.lock().await;
            let job = &jobs[index];
            (job.name.clone(), job.handler.clone())
        };
        info!("🚀 [SCHEDULER]: running job '{name}'");
        // The handler runs with the lock released — I/O never runs under a
        // mutex — I/O never runs while a lock is held.
        let outcome = handler().await;

        let mut jobs = self.jobs.lock().await;
        let job = &mut jobs[index];
        match outcome {
            Ok(result) => {
                job.run_count += 1;
                info!("✅ [SCHEDULER]: job '{name}' finished: {result}");
            }
            Err(err) => {
                job.error_count += 1;
                error!("❌ [SCHEDULER]: job '{name}' failed: {err}");
            }
        }
        job.last_run = Some(now.date_naive());
    }

    pub async fn run_now(&self, name: &str) -> Option<JobOutcome> {
        let index = {
            let jobs = self.jobs.lock().await;
            jobs.iter().position(|j| j.name == name)
        };
        match index {
            Some(index) => {
                self.execute(index, Local::now()).await;
                let jobs = self.jobs.lock().await;
                Some(Ok(serde_json::json!({"run_count": jobs[index].run_count, "error_count": jobs[index].error_count})))
            }
            None => None,
        }
    }

    pub async fn stats(&self) -> Vec<JobStats> {
        let jobs = self.jobs.lock().await;
        jobs.iter()
            .map(|j| JobStats {
                name: j.name.clone(),
                schedule: format!("{:02}:{:02}", j.hour, j.minute),
                enabled: j.enabled,
                last_run: j.last_run,
                run_count: j.run_count,
                error_count: j.error_count,
            })
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn handler(f: impl Fn() -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync + 'static) -> JobHandler {
    Box::new(f)
}

/// Registers the three default nightly jobs. Called once from the
/// kernel with the dependencies each job needs.
pub async fn register_default_jobs(
    scheduler: &Scheduler,
    correction_repo: Arc<CorrectionRepository>,
    pool: StorePool,
    dpo_dir: PathBuf,
    backup_dir: PathBuf,
    log_dir: PathBuf,
) {
    scheduler
        .add_job(
            "nightly_dpo_export",
            2,
            0,
            handler(move || {
                let correction_repo = correction_repo.clone();
                let dpo_dir = dpo_dir.clone();
                Box::pin(async move { nightly_dpo_export(&correction_repo, &dpo_dir).await })
            }),
        )
        .await;

    scheduler
        .add_job(
            "nightly_backup",
            3,
            0,
            handler(move || {
                let pool = pool.clone();
                let backup_dir = backup_dir.clone();
                Box::pin(async move { nightly_backup(&pool, &backup_dir).await })
            }),
        )
        .await;

    scheduler
        .add_job(
            "log_pruning",
            5,
            0,
            handler(move || {
                let log_dir = log_dir.clone();
                Box::pin(async move { prune_old_logs(&log_dir).await })
            }),
        )
        .await;
}

/// Preference-pair training data: one JSONL row per correction made today,
/// `{rejected: original_konto, chosen: corrected_konto, ...}`, written under
/// `data/dpo_datasets/`.
async fn nightly_dpo_export(correction_repo: &CorrectionRepository, dpo_dir: &Path) -> JobOutcome {
    let today = Utc::now().date_naive();
    let corrections = correction_repo.list_for_date(today).await.map_err(|e| e.to_string())?;

    fs::create_dir_all(dpo_dir).await.map_err(|e| e.to_string())?;
    let path = dpo_dir.join(format!("pairs_{today}.jsonl"));

    let mut lines = String::new();
    for correction in &corrections {
        let mut row = BTreeMap::new();
        row.insert("booking_id", correction.booking_id.clone());
        row.insert("doc_type", correction.doc_type.clone());
        row.insert("rejected", correction.original_konto.clone());
        row.insert("chosen", correction.corrected_konto.clone());
        row.insert("supplier", correction.supplier.clone());
        lines.push_str(&serde_json::to_string(&row).map_err(|e| e.to_string())?);
        lines.push('\n');
    }
    fs::write(&path, lines).await.map_err(|e| e.to_string())?;

    Ok(serde_json::json!({"pairs_written": corrections.len(), "path": path.display().to_string()}))
}

async fn nightly_backup(pool: &StorePool, backup_dir: &Path) -> JobOutcome {
    fs::create_dir_all(backup_dir).await.map_err(|e| e.to_string())?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let dest = backup_dir.join(format!("nyx_light_{stamp}.db"));
    pool.backup_to(&dest.display().to_string()).await.map_err(|e| e.to_string())?;
    prune_old_backups(backup_dir).await.ok();
    Ok(serde_json::json!({"path": dest.display().to_string()}))
}

const BACKUP_RETENTION: usize = 30;

async fn prune_old_backups(backup_dir: &Path) -> Result<(), String> {
    let mut entries = fs::read_dir(backup_dir).await.map_err(|e| e.to_string())?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| e.to_string())? {
        if entry.path().extension().is_some_and(|ext| ext == "db") {
            files.push(entry.path());
        }
    }
    files.sort();
    if files.len() > BACKUP_RETENTION {
        for stale in &files[..files.len() - BACKUP_RETENTION] {
            let _ = fs::remove_file(stale).await;
        }
    }
    Ok(())
}

const LOG_MAX_AGE_DAYS: i64 = 90;

async fn prune_old_logs(log_dir: &Path) -> JobOutcome {
    let cutoff = Utc::now() - chrono::Duration::days(LOG_MAX_AGE_DAYS);
    let mut removed = 0u64;

    let mut entries = match fs::read_dir(log_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(serde_json::json!({"removed_logs": 0}));
        }
        Err(e) => return Err(e.to_string()),
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| e.to_string())? {
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(_) => continue,
        };
        if let Ok(modified) = metadata.modified() {
            let modified: chrono::DateTime<Utc> = modified.into();
            if modified < cutoff {
                if fs::remove_file(entry.path()).await.is_ok() {
                    removed += 1;
                } else {
                    warn!("⚠️ [SCHEDULER]: failed to prune stale log {:?}", entry.path());
                }
            }
        }
    }

    Ok(serde_json::json!({"removed_logs": removed}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn a_job_runs_once_when_hour_and_minute_match_and_last_run_is_stale() {
        let job = Job {
            name: "t".to_string(),
            hour: 2,
            minute: 0,
            handler: Arc::new(Box::new(|| Box::pin(async { Ok(serde_json::json!({})) }))),
            enabled: true,
            last_run: Some(NaiveDate::from_ymd_opt(2026, 7, 25).unwrap()),
            run_count: 0,
            error_count: 0,
        };
        let now = Local.with_ymd_and_hms(2026, 7, 26, 2, 0, 0).unwrap();
        assert!(job.should_run(now));
    }

    #[test]
    fn a_job_does_not_run_twice_on_the_same_day() {
        let job = Job {
            name: "t".to_string(),
            hour: 2,
            minute: 0,
            handler: Arc::new(Box::new(|| Box::pin(async { Ok(serde_json::json!({})) }))),
            enabled: true,
            last_run: Some(NaiveDate::from_ymd_opt(2026, 7, 26).unwrap()),
            run_count: 1,
            error_count: 0,
        };
        let now = Local.with_ymd_and_hms(2026, 7, 26, 2, 0, 0).unwrap();
        assert!(!job.should_run(now));
    }

    #[tokio::test]
    async fn run_now_executes_a_registered_job_by_name() {
        let scheduler = Scheduler::new();
        scheduler.add_job("manual", 0, 0, Box::new(|| Box::pin(async { Ok(serde_json::json!({"ok": true})) }))).await;
        let outcome = scheduler.run_now("manual").await;
        assert!(outcome.is_some());
        let stats = scheduler.stats().await;
        assert_eq!(stats[0].run_count, 1);
    }
}
