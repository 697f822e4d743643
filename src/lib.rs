//! # Storyloom: Premise-to-Novel Generation Pipeline
//!
//! Storyloom turns a short natural-language premise into a long-form,
//! multi-chapter story through three cooperating stages:
//!
//! - **Outline**: a causal event graph (a DAG of [`outline::Event`]s) is
//!   grown from the premise by a seed/validate/revise loop.
//! - **Planning**: each event is decomposed into narratable
//!   [`plan::SubEvent`]s, which a weaving pass arranges into chapters whose
//!   reveal order may deliberately differ from causal order (flashbacks and
//!   planted mysteries are first-class, tracked per entry).
//! - **Writing**: each sub-event is rendered into a [`writing::Passage`] in
//!   strict reveal order, with a [`writing::ContextSnapshot`] supplying
//!   exactly the prior information the reader has at that point in the
//!   telling.
//!
//! ## Two orderings, kept apart
//!
//! Every sub-event carries a `causal_rank` (derived from the event graph,
//! immutable) and occupies one reveal position (assigned by the weaver).
//! Prerequisite logic keys off causal rank; all continuity logic keys off
//! reveal position. An entry scheduled before its causal prerequisites must
//! carry an early-reveal flag, which the writing stage treats as a planted
//! mystery rather than a coherence error.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use storyloom::client::OpenAiCompatClient;
//! use storyloom::pipeline::StoryWriter;
//!
//! # async fn example() -> miette::Result<()> {
//! let client = Arc::new(OpenAiCompatClient::from_env()?);
//! let writer = StoryWriter::new(client);
//! let (story, run_dir) = writer
//!     .write("two rivals must cooperate to survive a storm", Path::new("./output"))
//!     .await?;
//! println!("{} chapters in {}", story.chapters.len(), run_dir.display());
//! # Ok(())
//! # }
//! ```
//!
//! Re-invoking [`pipeline::StoryWriter::run`] against an existing run
//! directory resumes: completed stages are skipped and writing continues at
//! the first missing passage.
//!
//! ## Module Guide
//!
//! - [`client`] - Generation capability: trait, retry policy, OpenAI-compatible client
//! - [`prompts`] - Prompt templates for every agent role
//! - [`outline`] - Event graph model and the outline building loop
//! - [`plan`] - Sub-events, chapters, decomposition and weaving
//! - [`writing`] - Passages, context snapshots and the writing agent
//! - [`artifacts`] - Run-directory persistence for the three JSON artifacts
//! - [`pipeline`] - Orchestration, configuration and resumption

pub mod artifacts;
pub mod client;
pub mod outline;
pub mod pipeline;
pub mod plan;
pub mod prompts;
pub mod telemetry;
pub mod utils;
pub mod writing;
