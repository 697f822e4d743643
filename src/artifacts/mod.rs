//! On-disk run artifacts.
//!
//! Each pipeline run owns a directory holding three JSON files, one per
//! stage. Writes go through a temp file plus rename so a crash mid-write
//! never leaves a truncated artifact, and a missing file loads as `None`
//! so resume can tell "stage not reached" apart from "stage corrupt".

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::outline::Outline;
use crate::plan::StoryPlan;
use crate::writing::ChapterSet;

pub const OUTLINE_FILE: &str = "outline.json";
pub const STORY_PLAN_FILE: &str = "story_plan.json";
pub const CHAPTERS_FILE: &str = "chapters.json";

#[derive(Debug, Error, Diagnostic)]
pub enum ArtifactError {
    #[error("artifact io failure at {path}")]
    #[diagnostic(
        code(storyloom::artifacts::io),
        help("Check that the run directory exists and is writable.")
    )]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact at {path} is not valid JSON for its stage")]
    #[diagnostic(
        code(storyloom::artifacts::malformed),
        help("Delete or move the file to regenerate that stage from scratch.")
    )]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Directory-backed store for one run's artifacts.
#[derive(Clone, Debug)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| ArtifactError::Io {
                path: self.root.clone(),
                source,
            })
    }

    pub fn outline_path(&self) -> PathBuf {
        self.root.join(OUTLINE_FILE)
    }

    pub fn story_plan_path(&self) -> PathBuf {
        self.root.join(STORY_PLAN_FILE)
    }

    pub fn chapters_path(&self) -> PathBuf {
        self.root.join(CHAPTERS_FILE)
    }

    pub async fn save_outline(&self, outline: &Outline) -> Result<(), ArtifactError> {
        self.write_json(self.outline_path(), outline).await
    }

    pub async fn load_outline(&self) -> Result<Option<Outline>, ArtifactError> {
        self.read_json(self.outline_path()).await
    }

    pub async fn save_story_plan(&self, plan: &StoryPlan) -> Result<(), ArtifactError> {
        self.write_json(self.story_plan_path(), plan).await
    }

    pub async fn load_story_plan(&self) -> Result<Option<StoryPlan>, ArtifactError> {
        self.read_json(self.story_plan_path()).await
    }

    pub async fn save_chapter_set(&self, set: &ChapterSet) -> Result<(), ArtifactError> {
        self.write_json(self.chapters_path(), set).await
    }

    pub async fn load_chapter_set(&self) -> Result<Option<ChapterSet>, ArtifactError> {
        self.read_json(self.chapters_path()).await
    }

    #[instrument(skip(self, value), fields(path = %path.display()))]
    async fn write_json<T: Serialize>(&self, path: PathBuf, value: &T) -> Result<(), ArtifactError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Malformed {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| ArtifactError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(bytes = bytes.len(), "artifact written");
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: PathBuf,
    ) -> Result<Option<T>, ArtifactError> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ArtifactError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ArtifactError::Malformed { path, source })
    }
}
