#[cfg(test)]
mod tests {
    use super::super::*;

    const MINIMAL: &str = r#"
    [llm]
    model = "qwen/qwen3-30b"

    [filter]
    interests = ["protein design", "electrocatalysis"]
    "#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let cfg: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.run.days_back, 1);
        assert_eq!(cfg.run.timeout_secs, 900);
        assert_eq!(cfg.output.reports_dir, "./reports");
        assert_eq!(cfg.llm.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(cfg.llm.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(cfg.llm.batch_size, 15);
        assert!(cfg.sources.arxiv.enabled);
        assert_eq!(cfg.sources.arxiv.category_tiers, vec![vec!["cs.CV".to_string()]]);
        assert_eq!(cfg.sources.biorxiv.server, "biorxiv");
        assert_eq!(cfg.sources.chemrxiv.doi_prefix, "10.26434");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_full_config_overrides() {
        let cfg: Config = toml::from_str(
            r#"
    [run]
    days_back = 3
    timeout_secs = 120

    [output]
    reports_dir = "/srv/digest"

    [llm]
    base_url = "http://localhost:11434/v1"
    model = "llama3:8b"
    api_key_env = "LOCAL_KEY"
    batch_size = 5
    max_attempts = 5

    [filter]
    interests = ["zeolites"]
    include = ["catalysis"]
    exclude = ["survey", "review"]

    [scoring.weights]
    relevance = 0.5
    novelty = 0.2
    clarity = 0.1
    impact = 0.2

    [sources.arxiv]
    enabled = false

    [sources.biorxiv]
    server = "medrxiv"
    categories = ["infectious diseases"]

    [sources.chemrxiv]
    crossref_rows = 200

    [sources.adaptive_scope]
    enabled = false
    "#,
        )
        .unwrap();

        assert_eq!(cfg.run.days_back, 3);
        assert_eq!(cfg.output.reports_dir, "/srv/digest");
        assert_eq!(cfg.llm.batch_size, 5);
        assert_eq!(cfg.filter.exclude, vec!["survey", "review"]);
        assert!((cfg.scoring.weights.relevance - 0.5).abs() < 1e-9);
        assert!(!cfg.sources.arxiv.enabled);
        assert_eq!(cfg.sources.biorxiv.server, "medrxiv");
        assert_eq!(cfg.sources.chemrxiv.crossref_rows, 200);
        assert!(!cfg.sources.adaptive_scope.enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_required_sections_fail() {
        // No [llm] at all.
        assert!(toml::from_str::<Config>("[filter]\ninterests = [\"x\"]").is_err());
        // No model under [llm].
        assert!(toml::from_str::<Config>("[llm]\n[filter]\ninterests = [\"x\"]").is_err());
        // No interests under [filter].
        assert!(toml::from_str::<Config>("[llm]\nmodel = \"m\"\n[filter]").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_interests() {
        let cfg: Config = toml::from_str(
            "[llm]\nmodel = \"m\"\n[filter]\ninterests = [\"  \"]",
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_all_sources_disabled() {
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        cfg.sources.arxiv.enabled = false;
        cfg.sources.biorxiv.enabled = false;
        cfg.sources.chemrxiv.enabled = false;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_server() {
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        cfg.sources.biorxiv.server = "psyarxiv".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        cfg.llm.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_weights() {
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        cfg.scoring.weights.novelty = -1.0;
        assert!(cfg.validate().is_err());
    }
}
