//! Job orchestrator: runs the five extraction phases in order.
//!
//! Phase sequencing and the progress contract:
//! ```text
//! acquire (→10) → extract (10..70) → assemble → persist (→95) → summarize (→100, done)
//! ```
//! Fatal conditions (indexing timeout or failure, zero passages, store
//! errors) abort the job with status `errored`. A single batch's extraction
//! failure never does: it is logged, its activity marked, and the job
//! continues with whatever the other batches produced. A failed summary
//! call degrades to a completed job without a summary.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clients::extraction::ClauseExtractionClient;
use crate::clients::indexing::{DocumentIndexClient, IndexState};
use crate::config::PipelineConfig;
use crate::db::repository::{activity as activity_repo, clause as clause_repo, document as document_repo, progress as progress_repo};
use crate::db::Db;
use crate::models::{
    Activity, ActivityStatus, ActivityType, BatchProgress, ClauseFilter, ClauseRecord, Document,
    DocumentStatus,
    ExtractedClause, JobStatus, Passage, PassageBatch, PassageStats, ProgressPatch,
    ProgressSnapshot, SourceRef,
};
use crate::pipeline::activity::ActivityLog;
use crate::pipeline::batcher::PassageBatcher;
use crate::pipeline::error::PipelineError;
use crate::pipeline::extract::extract_batch;
use crate::pipeline::progress::ProgressTracker;
use crate::pipeline::review::collapse_duplicates;

const PROGRESS_AFTER_READ: u8 = 10;
const PROGRESS_EXTRACT_SPAN: u8 = 60;
const PROGRESS_AFTER_STORE: u8 = 95;

const SUMMARY_QUESTION: &str =
    "In two or three sentences, what kind of agreement is this and what are its most significant risk areas?";

/// Everything needed to start one extraction job.
#[derive(Debug, Clone)]
pub struct ExtractionJobInput {
    pub owner_user_id: String,
    pub document_name: String,
    pub source_file_id: String,
    /// Optional analysis perspective ("customer", "vendor", ...) passed
    /// through to every extraction call.
    pub perspective: Option<String>,
}

/// Result of a completed job.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub document_id: Uuid,
    pub clause_count: u32,
    pub summary: Option<String>,
}

/// Handle to a spawned job: cancel it or await its outcome.
pub struct JobHandle {
    job_id: String,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<Result<ExtractionOutcome, PipelineError>>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Request cancellation. The job observes the flag between phases and
    /// between extraction batches, then finishes with status `cancelled`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub async fn join(self) -> Result<ExtractionOutcome, PipelineError> {
        self.task
            .await
            .map_err(|e| PipelineError::JobTask(e.to_string()))?
    }
}

/// The clause extraction pipeline over an indexing client, an extraction
/// client and a store. Cheap to clone; clones share the store handle and
/// the clients.
pub struct ClausePipeline<I, C> {
    db: Db,
    index: Arc<I>,
    extraction: Arc<C>,
    config: PipelineConfig,
}

impl<I, C> Clone for ClausePipeline<I, C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            index: Arc::clone(&self.index),
            extraction: Arc::clone(&self.extraction),
            config: self.config.clone(),
        }
    }
}

/// Mutable per-job state shared by the phase methods. The counters are
/// atomic because batch completions land concurrently during extraction.
struct JobContext {
    document: Document,
    perspective: Option<String>,
    activity: ActivityLog,
    progress: ProgressTracker,
    cancel: Arc<AtomicBool>,
    stats: PassageStats,
    processed_passages: AtomicU32,
    clauses_found: AtomicU32,
    completed_batches: AtomicU32,
}

impl JobContext {
    fn current_stats(&self) -> PassageStats {
        PassageStats {
            processed_passages: self.processed_passages.load(Ordering::Relaxed),
            clauses_found: self.clauses_found.load(Ordering::Relaxed),
            ..self.stats
        }
    }
}

fn check_cancelled(ctx: &JobContext) -> Result<(), PipelineError> {
    if ctx.cancel.load(Ordering::Relaxed) {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn batch_progress(completed_batches: usize, total_batches: usize) -> u8 {
    let span = (completed_batches * PROGRESS_EXTRACT_SPAN as usize) / total_batches.max(1);
    PROGRESS_AFTER_READ + span as u8
}

fn batch_label(batch: &PassageBatch, total: usize) -> String {
    if let Some(header) = &batch.section_header {
        return header.clone();
    }
    if let Some(range) = batch.page_range {
        return if range.start == range.end {
            format!("Page {}", range.start)
        } else {
            format!("Pages {}-{}", range.start, range.end)
        };
    }
    format!("Batch {}/{}", batch.index + 1, total)
}

/// Flatten per-batch results back into batch order, regardless of the
/// order extraction calls completed in.
fn assemble_in_batch_order(
    mut results: Vec<(usize, Vec<ExtractedClause>)>,
) -> Vec<ExtractedClause> {
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().flat_map(|(_, clauses)| clauses).collect()
}

fn digest(clauses: &[ExtractedClause]) -> String {
    clauses
        .iter()
        .map(|c| {
            format!(
                "[{}] {}: {}",
                c.risk_level.as_str().to_uppercase(),
                c.title,
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl<I: DocumentIndexClient, C: ClauseExtractionClient> ClausePipeline<I, C> {
    pub fn new(db: Db, index: I, extraction: C, config: PipelineConfig) -> Self {
        Self {
            db,
            index: Arc::new(index),
            extraction: Arc::new(extraction),
            config,
        }
    }

    /// Spawn a job onto the runtime and return a handle to it.
    pub fn start(&self, input: ExtractionJobInput) -> JobHandle {
        let document = Document::new(&input.owner_user_id, &input.document_name, &input.source_file_id);
        let job_id = document.id.to_string();
        let cancel = Arc::new(AtomicBool::new(false));

        let pipeline = self.clone();
        let flag = Arc::clone(&cancel);
        let task = tokio::spawn(async move {
            pipeline.run_job(document, input.perspective, flag).await
        });

        JobHandle { job_id, cancel, task }
    }

    /// Run a job to completion on the current task.
    pub async fn run(&self, input: ExtractionJobInput) -> Result<ExtractionOutcome, PipelineError> {
        let document = Document::new(&input.owner_user_id, &input.document_name, &input.source_file_id);
        self.run_job(document, input.perspective, Arc::new(AtomicBool::new(false)))
            .await
    }

    async fn run_job(
        &self,
        document: Document,
        perspective: Option<String>,
        cancel: Arc<AtomicBool>,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let job_id = document.id.to_string();
        tracing::info!(%job_id, name = %document.name, "Starting clause extraction job");

        self.db.with(|conn| document_repo::insert_document(conn, &document))?;

        let mut ctx = JobContext {
            activity: ActivityLog::new(self.db.clone(), &job_id, &document.owner_user_id),
            progress: ProgressTracker::new(self.db.clone(), &job_id, &document.owner_user_id),
            document,
            perspective,
            cancel,
            stats: PassageStats::default(),
            processed_passages: AtomicU32::new(0),
            clauses_found: AtomicU32::new(0),
            completed_batches: AtomicU32::new(0),
        };
        // Seed the snapshot so observers see the job before phase 1 reports
        ctx.progress.update(ProgressPatch::default())?;

        match self.execute(&mut ctx).await {
            Ok(outcome) => {
                tracing::info!(%job_id, clause_count = outcome.clause_count, "Job complete");
                Ok(outcome)
            }
            Err(PipelineError::Cancelled) => {
                tracing::info!(%job_id, "Job cancelled");
                if let Err(db_err) = ctx.progress.update(ProgressPatch::status(JobStatus::Cancelled)) {
                    tracing::error!(%job_id, error = %db_err, "Failed to record cancellation");
                }
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Job failed");
                if let Err(db_err) = self.db.with(|conn| {
                    document_repo::update_document_status(
                        conn,
                        &ctx.document.id,
                        DocumentStatus::Error,
                        0,
                    )
                }) {
                    tracing::error!(%job_id, error = %db_err, "Failed to mark document errored");
                }
                let mut patch = ProgressPatch::status(JobStatus::Errored);
                patch.error = Some(e.to_string());
                if let Err(db_err) = ctx.progress.update(patch) {
                    tracing::error!(%job_id, error = %db_err, "Failed to record job error");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, ctx: &mut JobContext) -> Result<ExtractionOutcome, PipelineError> {
        let batches = self.acquire_and_segment(ctx).await?;
        check_cancelled(ctx)?;

        let results = self.extract_batches(ctx, &batches).await?;
        check_cancelled(ctx)?;

        let clauses = self.assemble(ctx, results)?;
        check_cancelled(ctx)?;

        let clause_count = self.persist(ctx, &clauses)?;
        check_cancelled(ctx)?;

        let summary = self.summarize(ctx, &clauses).await?;

        Ok(ExtractionOutcome {
            document_id: ctx.document.id,
            clause_count,
            summary,
        })
    }

    /// Phase 1: wait for indexing, fetch every passage page, batch.
    async fn acquire_and_segment(
        &self,
        ctx: &mut JobContext,
    ) -> Result<Vec<PassageBatch>, PipelineError> {
        let activity_id = ctx.activity.append(
            ActivityType::Reading,
            &format!("Reading {}", ctx.document.name),
            "reading",
        )?;

        self.wait_until_indexed(ctx).await?;
        let passages = self.fetch_all_passages(ctx).await?;
        if passages.is_empty() {
            ctx.activity.mark_error(&activity_id, "Document produced no passages")?;
            return Err(PipelineError::NoPassages);
        }

        let outcome = PassageBatcher::from_config(&self.config).batch(&passages);
        if outcome.batches.is_empty() {
            ctx.activity.mark_error(&activity_id, "Every passage was filtered out")?;
            return Err(PipelineError::NoPassages);
        }

        ctx.stats = PassageStats {
            total_passages: outcome.stats.total_passages,
            processed_passages: 0,
            skipped_passages: outcome.stats.skipped_passages,
            batch_count: outcome.stats.batch_count,
            clauses_found: 0,
        };

        ctx.activity.mark_done(
            &activity_id,
            &format!(
                "Read {} passages into {} batches",
                outcome.stats.batched_passages, outcome.stats.batch_count
            ),
        )?;

        let mut patch = ProgressPatch::progress(PROGRESS_AFTER_READ);
        patch.sources = vec![SourceRef {
            id: ctx.document.source_file_id.clone(),
            name: ctx.document.name.clone(),
        }];
        patch.passage_stats = Some(ctx.stats);
        ctx.progress.update(patch)?;

        Ok(outcome.batches)
    }

    async fn wait_until_indexed(&self, ctx: &JobContext) -> Result<(), PipelineError> {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.index_timeout_secs);
        loop {
            check_cancelled(ctx)?;
            let status = self.index.status(&ctx.document.source_file_id).await?;
            match status.state {
                IndexState::Ready => return Ok(()),
                IndexState::Failed => {
                    return Err(PipelineError::IndexingFailed(
                        status
                            .reason
                            .unwrap_or_else(|| "unspecified indexing failure".into()),
                    ));
                }
                IndexState::Pending => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(PipelineError::IndexingTimeout(self.config.index_timeout_secs));
                    }
                    tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
                }
            }
        }
    }

    async fn fetch_all_passages(&self, ctx: &JobContext) -> Result<Vec<Passage>, PipelineError> {
        let mut passages = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .index
                .passages(&ctx.document.source_file_id, token.as_deref())
                .await?;
            passages.extend(page.passages);
            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(passages)
    }

    /// Phase 2: extraction calls with bounded concurrency. Dispatch is in
    /// batch order; completion order is whatever the calls' latencies make
    /// it, which is why results carry their batch index.
    async fn extract_batches(
        &self,
        ctx: &JobContext,
        batches: &[PassageBatch],
    ) -> Result<Vec<(usize, Vec<ExtractedClause>)>, PipelineError> {
        let total = batches.len();
        let futures: Vec<_> = batches
            .iter()
            .map(|batch| self.extract_one(ctx, batch, total))
            .collect();
        let results: Vec<Result<(usize, Vec<ExtractedClause>), PipelineError>> =
            stream::iter(futures)
                .buffer_unordered(self.config.max_concurrent_extractions.max(1))
                .collect()
                .await;
        results.into_iter().collect()
    }

    fn extract_one<'a>(
        &'a self,
        ctx: &'a JobContext,
        batch: &'a PassageBatch,
        total: usize,
    ) -> impl Future<Output = Result<(usize, Vec<ExtractedClause>), PipelineError>> + Send + 'a
    {
        async move {
            check_cancelled(ctx)?;

            let label = batch_label(batch, total);
            let activity_id = ctx.activity.append(
                ActivityType::Extracting,
                &format!("Extracting: {label}"),
                &format!("extract-batch-{}", batch.index),
            )?;

            // Announce the batch before the call so observers see what is
            // currently in flight
            let mut patch = ProgressPatch::progress(batch_progress(batch.index, total));
            patch.current_batch = Some(BatchProgress {
                index: batch.index,
                total,
                label: label.clone(),
            });
            ctx.progress.update(patch)?;

            let result =
                extract_batch(self.extraction.as_ref(), batch, ctx.perspective.as_deref()).await;

            let clauses = match result {
                Ok(clauses) => {
                    ctx.processed_passages
                        .fetch_add(batch.passages.len() as u32, Ordering::Relaxed);
                    ctx.clauses_found
                        .fetch_add(clauses.len() as u32, Ordering::Relaxed);
                    ctx.activity.mark_done(
                        &activity_id,
                        &format!("Extracted {} clauses from {label}", clauses.len()),
                    )?;
                    clauses
                }
                Err(e) => {
                    // One failed batch costs its clauses, never the job
                    tracing::warn!(
                        job_id = %ctx.document.id,
                        batch = batch.index,
                        error = %e,
                        "Batch extraction failed, continuing"
                    );
                    ctx.activity
                        .mark_error(&activity_id, &format!("Extraction failed for {label}"))?;
                    let error_id = ctx.activity.append(
                        ActivityType::Extracting,
                        &format!("Extraction failed for {label}"),
                        &format!("extract-batch-{}-error", batch.index),
                    )?;
                    ctx.activity.update(&error_id, Some(ActivityStatus::Error), None)?;
                    Vec::new()
                }
            };

            let completed = ctx.completed_batches.fetch_add(1, Ordering::Relaxed) + 1;
            let mut patch = ProgressPatch::progress(batch_progress(completed as usize, total));
            patch.passage_stats = Some(ctx.current_stats());
            ctx.progress.update(patch)?;

            Ok((batch.index, clauses))
        }
    }

    /// Phase 3: order results by batch index and flatten. The optional
    /// review pass collapses exact duplicates across batch boundaries.
    fn assemble(
        &self,
        ctx: &JobContext,
        results: Vec<(usize, Vec<ExtractedClause>)>,
    ) -> Result<Vec<ExtractedClause>, PipelineError> {
        let mut clauses = assemble_in_batch_order(results);

        if self.config.review_pass {
            let activity_id =
                ctx.activity
                    .append(ActivityType::Reviewing, "Reviewing clauses", "reviewing")?;
            let (kept, dropped) = collapse_duplicates(clauses);
            clauses = kept;
            ctx.activity.mark_done(
                &activity_id,
                &format!("Review dropped {dropped} duplicate clauses"),
            )?;
        }

        Ok(clauses)
    }

    /// Phase 4: chunked insert plus the document's completion, then the
    /// 95% snapshot carrying the full clause list.
    fn persist(
        &self,
        ctx: &JobContext,
        clauses: &[ExtractedClause],
    ) -> Result<u32, PipelineError> {
        let activity_id = ctx.activity.append(
            ActivityType::Storing,
            &format!("Storing {} clauses", clauses.len()),
            "storing",
        )?;

        let records: Vec<ClauseRecord> = clauses
            .iter()
            .cloned()
            .map(|c| ClauseRecord::from_extracted(ctx.document.id, &ctx.document.owner_user_id, c))
            .collect();
        let count = records.len() as u32;

        self.db.with(|conn| {
            clause_repo::insert_clauses_chunked(conn, &records, self.config.insert_chunk_size)?;
            document_repo::update_document_status(
                conn,
                &ctx.document.id,
                DocumentStatus::Completed,
                count,
            )
        })?;

        ctx.activity.mark_done(&activity_id, &format!("Stored {count} clauses"))?;

        let mut patch = ProgressPatch::progress(PROGRESS_AFTER_STORE);
        patch.clauses = Some(clauses.to_vec());
        patch.passage_stats = Some(ctx.current_stats());
        ctx.progress.update(patch)?;

        Ok(count)
    }

    /// Phase 5: risk-prefixed digest through the answer call, then the
    /// terminal snapshot. The summary is best-effort.
    async fn summarize(
        &self,
        ctx: &JobContext,
        clauses: &[ExtractedClause],
    ) -> Result<Option<String>, PipelineError> {
        let activity_id = ctx.activity.append(
            ActivityType::Summarizing,
            "Summarizing findings",
            "summarizing",
        )?;
        ctx.progress.update(ProgressPatch::status(JobStatus::Summarizing))?;

        let summary = if clauses.is_empty() {
            None
        } else {
            match self.extraction.answer(&digest(clauses), SUMMARY_QUESTION).await {
                Ok(answer) if !answer.trim().is_empty() => Some(answer),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(
                        job_id = %ctx.document.id,
                        error = %e,
                        "Summary call failed, finishing without a summary"
                    );
                    None
                }
            }
        };

        match &summary {
            Some(text) => {
                self.db.with(|conn| {
                    document_repo::set_document_summary(conn, &ctx.document.id, text)
                })?;
                ctx.activity.mark_done(&activity_id, "Summary ready")?;
            }
            None => ctx.activity.mark_done(&activity_id, "Summary unavailable")?,
        }

        let complete_id =
            ctx.activity
                .append(ActivityType::Complete, "Analysis complete", "complete")?;
        ctx.activity.mark_done(&complete_id, "Analysis complete")?;

        let mut patch = ProgressPatch::progress(100);
        patch.status = Some(JobStatus::Done);
        patch.summary = summary.clone();
        ctx.progress.update(patch)?;

        Ok(summary)
    }

    // ---- read side ----

    pub fn progress_snapshot(
        &self,
        job_id: &str,
        owner_user_id: &str,
    ) -> Result<ProgressSnapshot, PipelineError> {
        Ok(ProgressTracker::new(self.db.clone(), job_id, owner_user_id).snapshot()?)
    }

    pub fn activities(
        &self,
        job_id: &str,
        owner_user_id: &str,
    ) -> Result<Vec<Activity>, PipelineError> {
        Ok(self
            .db
            .with(|conn| activity_repo::list_activities(conn, job_id, owner_user_id))?)
    }

    pub fn document(
        &self,
        id: &Uuid,
        owner_user_id: &str,
    ) -> Result<Option<Document>, PipelineError> {
        Ok(self.db.with(|conn| document_repo::get_document(conn, id, owner_user_id))?)
    }

    pub fn documents(
        &self,
        owner_user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Document>, PipelineError> {
        Ok(self
            .db
            .with(|conn| document_repo::list_documents(conn, owner_user_id, limit, offset))?)
    }

    pub fn clauses(
        &self,
        document_id: &Uuid,
        owner_user_id: &str,
        filter: &ClauseFilter,
    ) -> Result<Vec<ClauseRecord>, PipelineError> {
        Ok(self
            .db
            .with(|conn| clause_repo::list_clauses(conn, document_id, owner_user_id, filter))?)
    }

    /// Delete a document with everything attached to it: clauses via the FK
    /// cascade, activities and the progress snapshot by job id.
    pub fn delete_document(
        &self,
        id: &Uuid,
        owner_user_id: &str,
    ) -> Result<bool, PipelineError> {
        let job_id = id.to_string();
        Ok(self.db.with(|conn| {
            let deleted = document_repo::delete_document(conn, id, owner_user_id)?;
            if deleted {
                activity_repo::delete_activities(conn, &job_id)?;
                progress_repo::delete_snapshot(conn, &job_id)?;
            }
            Ok(deleted)
        })?)
    }
}
