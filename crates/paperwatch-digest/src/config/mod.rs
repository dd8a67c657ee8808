//! Configuration loading for paperwatch.
//! Reads paperwatch.toml from the current directory or the path in the
//! PAPERWATCH_CONFIG env var; `--config` overrides both.

use std::path::Path;

use serde::{Deserialize, Serialize};

use paperwatch_ranker::DimensionWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub llm: LlmConfig,
    pub filter: FilterConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_days_back")]
    pub days_back: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_days_back()    -> u32 { 1 }
fn default_timeout_secs() -> u64 { 900 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
}

fn default_reports_dir() -> String { "./reports".to_string() }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_concurrent_batches")]
    pub max_concurrent_batches: usize,
    #[serde(default = "default_max_abstract_chars")]
    pub max_abstract_chars: usize,
}

fn default_llm_base_url() -> String { "https://openrouter.ai/api/v1".to_string() }
fn default_api_key_env()  -> String { "OPENROUTER_API_KEY".to_string() }
fn default_max_tokens()   -> u32   { 2048 }
fn default_cache_dir()    -> String { ".cache/llm".to_string() }
fn default_max_attempts() -> u32   { 3 }
fn default_base_delay_ms() -> u64  { 1000 }
fn default_max_delay_ms()  -> u64  { 8000 }
fn default_batch_size()    -> usize { 15 }
fn default_max_concurrent_batches() -> usize { 4 }
fn default_max_abstract_chars()     -> usize { 1600 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Reader interests, quoted verbatim in the scoring prompt.
    pub interests: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: DimensionWeights,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub arxiv: ArxivSourceConfig,
    #[serde(default)]
    pub biorxiv: BiorxivSourceConfig,
    #[serde(default)]
    pub chemrxiv: ChemrxivSourceConfig,
    #[serde(default)]
    pub adaptive_scope: AdaptiveScopeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivSourceConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_category_tiers")]
    pub category_tiers: Vec<Vec<String>>,
    #[serde(default)]
    pub query_terms: Vec<String>,
    #[serde(default = "default_max_results_per_category")]
    pub max_results_per_category: usize,
    #[serde(default = "default_submitted_date_offset_hours")]
    pub submitted_date_offset_hours: i64,
}

fn default_category_tiers() -> Vec<Vec<String>> { vec![vec!["cs.CV".to_string()]] }
fn default_max_results_per_category()     -> usize { 300 }
fn default_submitted_date_offset_hours()  -> i64   { -6 }

impl Default for ArxivSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            category_tiers: default_category_tiers(),
            query_terms: vec![],
            max_results_per_category: default_max_results_per_category(),
            submitted_date_offset_hours: default_submitted_date_offset_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiorxivSourceConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_biorxiv_server")]
    pub server: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_biorxiv_server() -> String { "biorxiv".to_string() }

impl Default for BiorxivSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: default_biorxiv_server(),
            categories: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChemrxivSourceConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_doi_prefix")]
    pub doi_prefix: String,
    #[serde(default = "default_crossref_rows")]
    pub crossref_rows: usize,
    #[serde(default = "default_crossref_base_url")]
    pub crossref_base_url: String,
    #[serde(default = "default_openalex_base_url")]
    pub openalex_base_url: String,
}

fn default_doi_prefix()        -> String { "10.26434".to_string() }
fn default_crossref_rows()     -> usize  { 1000 }
fn default_crossref_base_url() -> String { "https://api.crossref.org".to_string() }
fn default_openalex_base_url() -> String { "https://api.openalex.org".to_string() }

impl Default for ChemrxivSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            doi_prefix: default_doi_prefix(),
            crossref_rows: default_crossref_rows(),
            crossref_base_url: default_crossref_base_url(),
            openalex_base_url: default_openalex_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveScopeConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_min_candidates")]
    pub min_candidates_after_prefilter: usize,
    #[serde(default = "default_max_tiers")]
    pub max_tiers: usize,
}

fn bool_true() -> bool { true }
fn default_min_candidates() -> usize { 120 }
fn default_max_tiers()      -> usize { 3 }

impl Default for AdaptiveScopeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_candidates_after_prefilter: default_min_candidates(),
            max_tiers: default_max_tiers(),
        }
    }
}

mod tests;

impl Config {
    /// Load configuration. The explicit path wins, then PAPERWATCH_CONFIG,
    /// then paperwatch.toml in the current directory.
    pub fn load(path_override: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path_override {
            Some(p) => p.to_path_buf(),
            None => std::env::var("PAPERWATCH_CONFIG")
                .unwrap_or_else(|_| "paperwatch.toml".to_string())
                .into(),
        };

        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy paperwatch.example.toml to paperwatch.toml and edit it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Checks that must pass before any network call.
    pub fn validate(&self) -> Result<(), String> {
        if self.filter.interests.iter().all(|i| i.trim().is_empty()) {
            return Err("filter.interests must not be empty".to_string());
        }
        if !self.sources.arxiv.enabled
            && !self.sources.biorxiv.enabled
            && !self.sources.chemrxiv.enabled
        {
            return Err("at least one source must be enabled".to_string());
        }
        if self.sources.arxiv.enabled
            && self.sources.arxiv.category_tiers.iter().flatten().count() == 0
        {
            return Err("sources.arxiv.category_tiers must name at least one category".to_string());
        }
        if self.sources.biorxiv.enabled {
            let server = self.sources.biorxiv.server.trim().to_lowercase();
            if server != "biorxiv" && server != "medrxiv" {
                return Err(format!(
                    "sources.biorxiv.server must be \"biorxiv\" or \"medrxiv\", got {:?}",
                    self.sources.biorxiv.server
                ));
            }
        }
        if self.llm.model.trim().is_empty() {
            return Err("llm.model must not be empty".to_string());
        }
        if self.llm.batch_size == 0 {
            return Err("llm.batch_size must be at least 1".to_string());
        }
        if self.llm.max_attempts == 0 {
            return Err("llm.max_attempts must be at least 1".to_string());
        }
        if self.run.timeout_secs == 0 {
            return Err("run.timeout_secs must be positive".to_string());
        }
        if !self.scoring.weights.validate() {
            return Err("scoring.weights must be non-negative with a positive sum".to_string());
        }
        Ok(())
    }
}
