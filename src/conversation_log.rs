//! Best-effort JSON records of answered questions and user feedback

use std::path::Path;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use crate::config::ConversationLogConfig;
use crate::errors::LoiLibreError;
use crate::errors::Result;
use crate::models::Message;
use crate::models::Passage;

/// Record written once an answer has been fully generated
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub user_id: String,
    pub prompt: String,
    pub retrieved: Vec<Passage>,
    pub report_type: String,
    pub prompt_eng: Message,
    pub answer: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize)]
struct FeedbackRecord<'a> {
    user_id: &'a str,
    feedback: &'a str,
    time: String,
}

/// Seconds since the epoch with microsecond precision
pub fn timestamp() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

const MAX_USER_ID_LEN: usize = 128;

/// User ids become file names: only ASCII letters, digits, `-` and `_`
pub fn validate_user_id(user_id: &str) -> Result<()> {
    let well_formed = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if well_formed {
        Ok(())
    } else {
        Err(LoiLibreError::InvalidInput(format!(
            "user_id must be 1-{MAX_USER_ID_LEN} characters of [A-Za-z0-9_-], got {user_id:?}"
        )))
    }
}

/// Writes one JSON file per record into a directory
#[derive(Debug, Clone)]
pub struct ConversationLogger {
    directory: PathBuf,
}

impl ConversationLogger {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `None` when logging is disabled
    pub fn from_config(config: &ConversationLogConfig) -> Option<Self> {
        config.enabled.then(|| Self::new(&config.directory))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn write_record<T: Serialize + Sync>(
        &self,
        user_id: &str,
        time: &str,
        record: &T,
    ) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        let file_name = format!("{user_id}{time}.json");
        let path = self.directory.join(&file_name);
        if path.file_name().and_then(|n| n.to_str()) != Some(file_name.as_str())
            || path.parent() != Some(self.directory.as_path())
        {
            return Err(LoiLibreError::InvalidInput(format!(
                "conversation record name escapes the log directory: {file_name:?}"
            )));
        }
        tokio::fs::create_dir_all(&self.directory).await?;
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, body).await?;
        debug!("Wrote conversation record {}", path.display());
        Ok(path)
    }

    /// Write `record` from a detached task; failures are only logged
    pub fn spawn_answer_log(&self, record: AnswerRecord) -> JoinHandle<()> {
        let logger = self.clone();
        tokio::spawn(async move {
            if let Err(e) = logger
                .write_record(&record.user_id, &record.time, &record)
                .await
            {
                warn!("Failed to write conversation log: {}", e);
            }
        })
    }

    /// Store user feedback; feedback of one character or less is ignored
    /// and reported as `false`. A malformed `user_id` is `InvalidInput`.
    pub async fn save_feedback(&self, user_id: &str, feedback: &str) -> Result<bool> {
        validate_user_id(user_id)?;
        if feedback.chars().count() <= 1 {
            return Ok(false);
        }
        let time = timestamp();
        let record = FeedbackRecord {
            user_id,
            feedback,
            time: time.clone(),
        };
        self.write_record(user_id, &time, &record).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answer_log_written() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ConversationLogger::new(dir.path().join("logs"));

        let record = AnswerRecord {
            user_id: "abc123".to_string(),
            prompt: "divorce ?".to_string(),
            retrieved: Vec::new(),
            report_type: "all".to_string(),
            prompt_eng: Message::system("sys"),
            answer: "Le délai est de 30 jours.".to_string(),
            time: "1700000000.000001".to_string(),
        };
        logger.spawn_answer_log(record).await.unwrap();

        let path = dir.path().join("logs").join("abc1231700000000.000001.json");
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(written["answer"], "Le délai est de 30 jours.");
        assert_eq!(written["prompt_eng"]["role"], "system");
    }

    #[tokio::test]
    async fn test_feedback_saved_and_short_feedback_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ConversationLogger::new(dir.path());

        assert!(!logger.save_feedback("abc", "x").await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        assert!(logger.save_feedback("abc", "Très utile").await.unwrap());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_user_id_validation() {
        assert!(validate_user_id("abc-123_XYZ").is_ok());
        for bad in ["", "../escaped", "/tmp/abs", "a/b", "a\\b", "..", "é", "a b"] {
            assert!(
                matches!(validate_user_id(bad), Err(LoiLibreError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_user_id(&"a".repeat(129)).is_err());
    }

    #[tokio::test]
    async fn test_records_stay_inside_log_directory() {
        let root = tempfile::tempdir().unwrap();
        let logger = ConversationLogger::new(root.path().join("logs"));

        for user_id in ["../escaped", "/tmp/escaped", "sub/escaped"] {
            let err = logger.save_feedback(user_id, "hello there").await.unwrap_err();
            assert!(matches!(err, LoiLibreError::InvalidInput(_)));
        }

        let record = AnswerRecord {
            user_id: "../escaped".to_string(),
            prompt: "q".to_string(),
            retrieved: Vec::new(),
            report_type: "all".to_string(),
            prompt_eng: Message::system("sys"),
            answer: "a".to_string(),
            time: timestamp(),
        };
        logger.spawn_answer_log(record).await.unwrap();

        let outside: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name != "logs")
            .collect();
        assert!(outside.is_empty(), "files written outside the log dir: {outside:?}");
        let logs = root.path().join("logs");
        assert!(!logs.exists() || std::fs::read_dir(logs).unwrap().count() == 0);
    }

    #[test]
    fn test_disabled_logger() {
        let config = ConversationLogConfig {
            enabled: false,
            directory: "unused".to_string(),
        };
        assert!(ConversationLogger::from_config(&config).is_none());
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        let (secs, micros) = ts.split_once('.').unwrap();
        assert!(secs.parse::<i64>().unwrap() > 1_600_000_000);
        assert_eq!(micros.len(), 6);
    }
}
