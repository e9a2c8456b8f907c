//! `vegancheck check`: run the pipeline locally.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use vegancheck_core::{
    Classifier, DiskMemory, InMemoryMemory, KnowledgeBase, MemoryCache, Oracle,
    StaticKnowledgeBase,
};

pub struct CheckOptions {
    pub knowledge_base: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub offline: bool,
}

/// Ingredient text from the argument, a file, or stdin, in that order.
pub fn read_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read ingredients from stdin")?;
    Ok(input)
}

pub fn build_classifier(options: &CheckOptions) -> Result<Classifier> {
    let knowledge_base: Arc<dyn KnowledgeBase> = match &options.knowledge_base {
        Some(path) => Arc::new(
            StaticKnowledgeBase::from_json_file(path)
                .with_context(|| format!("Failed to load knowledge base {}", path.display()))?,
        ),
        None => Arc::new(StaticKnowledgeBase::bundled()),
    };

    let memory: Arc<dyn MemoryCache> = if options.no_cache {
        Arc::new(InMemoryMemory::new())
    } else {
        let dir = options
            .cache_dir
            .clone()
            .unwrap_or_else(DiskMemory::default_dir);
        tracing::debug!(dir = %dir.display(), "Using disk memory");
        Arc::new(DiskMemory::new(dir))
    };

    let classifier = Classifier::new(knowledge_base, memory);
    if options.offline {
        return Ok(classifier);
    }

    match Oracle::from_env().context("Invalid oracle configuration")? {
        Some(oracle) => Ok(classifier.with_oracle(oracle)),
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set, running without the oracle");
            Ok(classifier)
        }
    }
}

pub async fn run(input: &str, options: &CheckOptions) -> Result<()> {
    let classifier = build_classifier(options)?;
    let result = classifier.classify(input).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
