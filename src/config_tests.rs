//! Unit tests for configuration module
//!
//! These tests validate configuration parsing, defaults, and validation.

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::config::*;
    use crate::errors::LoiLibreError;

    const MINIMAL: &str = r#"
[logging]
level = "debug"

[llm]
endpoint = "http://localhost:8000/v1"
model = "legal-instruct"

[embeddings]
provider = "ollama"
endpoint = "http://localhost:11434"
model = "multi-qa-mpnet-base-dot-v1"

[retrieval]
backend = "index"
"#;

    // ====== Default Value Tests ======

    #[test]
    fn test_minimal_config_gets_pipeline_defaults() {
        let config = AppConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.retrieval.k_summary, 3);
        assert_eq!(config.retrieval.k_total, 10);
        assert_eq!(config.retrieval.max_k, 100);
        assert!((config.retrieval.threshold - 0.555).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.similarity, Similarity::Dot);
        assert_eq!(config.retrieval.summary_report_types, vec!["SPM", "TS"]);
        assert_eq!(config.llm.reformulation_max_tokens, 128);
        assert_eq!(config.llm.answer_max_tokens, 1024);
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.server.max_concurrent_requests, 16);
        assert!(config.conversation_log.enabled);
    }

    #[test]
    fn test_default_source_selectors() {
        let sources = default_sources();
        assert_eq!(sources.get("code civil").map(String::as_str), Some("codecivil"));
        assert_eq!(sources.get("ipbes").map(String::as_str), Some("IPBES"));
    }

    #[test]
    fn test_default_app_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    // ====== Validation Tests ======

    #[test]
    fn test_max_k_must_exceed_k_total() {
        let mut config = AppConfig::default();
        config.retrieval.max_k = 10;
        config.retrieval.k_total = 10;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, LoiLibreError::ConfigError(_)));
    }

    #[test]
    fn test_zero_k_total_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.k_total = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_case_colliding_source_selectors_rejected() {
        let mut config = AppConfig::default();
        config
            .retrieval
            .sources
            .insert("IPBES".to_string(), "other".to_string());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, LoiLibreError::ConfigError(msg) if msg.contains("ipbes")));
    }

    #[test]
    fn test_http_backend_requires_endpoint() {
        let mut config = AppConfig::default();
        config.retrieval.backend = RetrievalBackend::Http;
        assert!(config.validate().is_err());

        config.retrieval.endpoint = Some("http://index:9000".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_embedding_provider_rejected() {
        let mut config = AppConfig::default();
        config.embeddings.provider = "word2vec".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_fails_to_parse() {
        let content = MINIMAL.replace("backend = \"index\"", "backend = \"faiss\"");
        let err = AppConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, LoiLibreError::TomlParsing(_)));
    }

    // ====== File Loading Tests ======

    #[test]
    fn test_from_file_reads_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            "{MINIMAL}\n[server]\nport = 9090\nmax_concurrent_requests = 4\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.llm_model(), "legal-instruct");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.max_concurrent_requests, 4);
        assert_eq!(config.server_addr(), "127.0.0.1:9090");
    }
}
