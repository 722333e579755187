use anyhow::{Context, Result, bail};
use ragroute_retrieval::IndexedDocument;
use std::path::Path;

/// Load passages from a JSON array, or one JSON object per line for `.jsonl`.
pub fn load_corpus(path: &Path) -> Result<Vec<IndexedDocument>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus {}", path.display()))?;

    let documents = if path.extension().is_some_and(|ext| ext == "jsonl") {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<IndexedDocument>(line)
                    .with_context(|| format!("{}:{}: invalid document", path.display(), i + 1))
            })
            .collect::<Result<Vec<_>>>()?
    } else {
        serde_json::from_str::<Vec<IndexedDocument>>(&text)
            .with_context(|| format!("Failed to parse corpus {}", path.display()))?
    };

    if documents.is_empty() {
        bail!("Corpus {} contains no documents", path.display());
    }
    Ok(documents)
}
