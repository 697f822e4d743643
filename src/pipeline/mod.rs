//! End-to-end orchestration: premise in, chaptered story out.
//!
//! The pipeline runs the three stages in order and persists each stage's
//! artifact before starting the next. A rerun over the same directory
//! loads whatever is already there, validates it, and continues from the
//! first missing piece, so an interrupted writing stage resumes at the
//! exact passage it stopped at without re-spending outline or planning
//! calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::artifacts::{ArtifactError, RunStore};
use crate::client::{GenerationClient, RetryPolicy};
use crate::outline::{Outline, OutlineBuilder, OutlineConfig, OutlineError};
use crate::plan::{ChapterWeaver, EventDecomposer, PlanError, StoryPlan, WeaveConfig, validate_plan};
use crate::writing::{
    ChapterSet, ContextAssembler, SnapshotConfig, WriteError, WritingAgent,
};

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Outline(#[from] OutlineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    /// chapters.json no longer agrees with story_plan.json.
    #[error("chapters artifact in {run_dir} does not match the stored story plan")]
    #[diagnostic(
        code(storyloom::pipeline::artifact_mismatch),
        help("Delete chapters.json (or the whole run directory) to rebuild from the plan.")
    )]
    ArtifactMismatch { run_dir: PathBuf },
}

/// Knobs for every stage, grouped so callers can override one stage
/// without spelling out the rest.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub outline: OutlineConfig,
    pub weave: WeaveConfig,
    pub snapshot: SnapshotConfig,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    #[must_use]
    pub fn with_outline(mut self, outline: OutlineConfig) -> Self {
        self.outline = outline;
        self
    }

    #[must_use]
    pub fn with_weave(mut self, weave: WeaveConfig) -> Self {
        self.weave = weave;
        self
    }

    #[must_use]
    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// The full premise-to-story pipeline.
pub struct StoryWriter {
    client: Arc<dyn GenerationClient>,
    config: PipelineConfig,
}

impl StoryWriter {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(client: Arc<dyn GenerationClient>, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// Run a fresh story under `output_dir/<run-id>/` and return the
    /// completed chapters with the run directory.
    pub async fn write(
        &self,
        premise: &str,
        output_dir: impl AsRef<Path>,
    ) -> Result<(ChapterSet, PathBuf), PipelineError> {
        let run_dir = output_dir.as_ref().join(Uuid::new_v4().to_string());
        let set = self.run(premise, &run_dir).await?;
        Ok((set, run_dir))
    }

    /// Run (or resume) a story in `run_dir`.
    #[instrument(skip_all, fields(run_dir = %run_dir.as_ref().display()))]
    pub async fn run(
        &self,
        premise: &str,
        run_dir: impl AsRef<Path>,
    ) -> Result<ChapterSet, PipelineError> {
        let store = RunStore::new(run_dir.as_ref());
        store.ensure_root().await?;

        let outline = self.outline_stage(premise, &store).await?;
        let plan = self.planning_stage(premise, &outline, &store).await?;
        self.writing_stage(premise, &outline, &plan, &store).await
    }

    async fn outline_stage(
        &self,
        premise: &str,
        store: &RunStore,
    ) -> Result<Outline, PipelineError> {
        if let Some(outline) = store.load_outline().await? {
            outline.validate()?;
            info!(events = outline.len(), "outline loaded from artifact");
            return Ok(outline);
        }
        let builder = OutlineBuilder::new(
            self.client.clone(),
            self.config.outline.clone(),
            self.config.retry.clone(),
        );
        let outline = builder.build_outline(premise).await?;
        store.save_outline(&outline).await?;
        Ok(outline)
    }

    async fn planning_stage(
        &self,
        premise: &str,
        outline: &Outline,
        store: &RunStore,
    ) -> Result<StoryPlan, PipelineError> {
        if let Some(plan) = store.load_story_plan().await? {
            validate_plan(&plan, outline)?;
            info!(
                chapters = plan.chapters.len(),
                sub_events = plan.sub_events.len(),
                "story plan loaded from artifact"
            );
            return Ok(plan);
        }
        let decomposer = EventDecomposer::new(self.client.clone(), self.config.retry.clone());
        let sub_events = decomposer.decompose_all(premise, outline).await?;
        let weaver = ChapterWeaver::new(
            self.client.clone(),
            self.config.weave.clone(),
            self.config.retry.clone(),
        );
        let plan = weaver.weave(premise, outline, sub_events).await?;
        store.save_story_plan(&plan).await?;
        Ok(plan)
    }

    async fn writing_stage(
        &self,
        premise: &str,
        outline: &Outline,
        plan: &StoryPlan,
        store: &RunStore,
    ) -> Result<ChapterSet, PipelineError> {
        let mut set = match store.load_chapter_set().await? {
            Some(set) => {
                if !set.matches_plan(plan) {
                    return Err(PipelineError::ArtifactMismatch {
                        run_dir: store.root().to_path_buf(),
                    });
                }
                info!(
                    committed = set.committed_count(),
                    total = plan.total_entries(),
                    "chapters loaded from artifact"
                );
                set
            }
            None => {
                let set = ChapterSet::from_plan(plan);
                store.save_chapter_set(&set).await?;
                set
            }
        };

        let assembler =
            ContextAssembler::new(plan, outline, self.config.snapshot.clone())
                .map_err(WriteError::from)?;
        let agent = WritingAgent::new(self.client.clone(), self.config.retry.clone());

        while let Some((chapter_index, _, position)) = set.next_position() {
            let snapshot = {
                let committed = set.committed_passages();
                assembler.snapshot(&committed, position)?
            };
            let passage = agent.write_passage(premise, snapshot).await?;
            set.commit(chapter_index, passage)?;
            store.save_chapter_set(&set).await?;
        }

        info!(passages = set.committed_count(), "story complete");
        Ok(set)
    }
}
