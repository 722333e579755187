use serde::{Deserialize, Serialize};

/// Configuration for rule-based query routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Estimated complexity at or above which a query goes to the agent (0.0-1.0)
    #[serde(default = "default_complexity_threshold")]
    pub complexity_threshold: f64,

    /// Phrases marking a broad, topical question answered at file granularity
    #[serde(default = "default_broad_keywords")]
    pub broad_keywords: Vec<String>,

    /// File extensions (without the dot) that mark a token as a file name
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
}

fn default_complexity_threshold() -> f64 {
    0.5
}

fn default_broad_keywords() -> Vec<String> {
    [
        "overview",
        "summarize",
        "summary",
        "which files",
        "list files",
        "all files",
        "architecture",
        "概述",
        "总结",
        "哪些文件",
        "所有文件",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_file_extensions() -> Vec<String> {
    [
        "md", "txt", "rst", "pdf", "rs", "py", "ts", "tsx", "js", "jsx", "go", "java", "c", "cpp",
        "h", "hpp", "toml", "yaml", "yml", "json", "csv", "html",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: default_complexity_threshold(),
            broad_keywords: default_broad_keywords(),
            file_extensions: default_file_extensions(),
        }
    }
}

impl RouterConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.complexity_threshold) {
            return Err(format!(
                "complexity_threshold must be between 0.0 and 1.0, got {}",
                self.complexity_threshold
            ));
        }

        if self.broad_keywords.iter().any(|kw| kw.trim().is_empty()) {
            return Err("broad_keywords must not contain empty entries".to_string());
        }

        for ext in &self.file_extensions {
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(format!(
                    "file extension {ext:?} must be ASCII alphanumeric without a dot"
                ));
            }
        }

        Ok(())
    }
}
