//! End-to-end run against a live OpenAI-compatible endpoint.
//!
//! Requires STORYLOOM_API_KEY (and optionally STORYLOOM_BASE_URL,
//! STORYLOOM_MODEL). Artifacts land under ./output/<run-id>/.
//!
//! Run with: cargo run --example storm_demo

use std::path::Path;
use std::sync::Arc;

use storyloom::client::OpenAiCompatClient;
use storyloom::pipeline::StoryWriter;
use storyloom::telemetry;

#[tokio::main]
async fn main() -> miette::Result<()> {
    telemetry::init();

    let client = Arc::new(OpenAiCompatClient::from_env()?);
    let writer = StoryWriter::new(client);

    let premise = "Two lifelong rivals, a lighthouse keeper and a smuggler, \
                   are stranded together by the storm of the century and must \
                   cooperate to survive it.";

    let (story, run_dir) = writer.write(premise, Path::new("./output")).await?;

    println!("run directory: {}", run_dir.display());
    for chapter in &story.chapters {
        println!("\n== Chapter {}: {} ==", chapter.chapter_id, chapter.title);
        for passage in &chapter.passages {
            println!("\n{}", passage.canonical_text());
        }
    }
    Ok(())
}
