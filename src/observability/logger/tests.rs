use super::*;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_logger_creation() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");

    let logger = RunLogger::new(Some(&log_path), Some("DEBUG"));
    assert!(logger.is_ok());

    let logger = logger.unwrap();
    assert_eq!(logger.log_file(), &log_path);
    assert_eq!(logger.log_level(), "DEBUG");
}

#[test]
fn test_log_file_creation() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("logs").join("test.md");

    let _logger = RunLogger::new(Some(&log_path), None).unwrap();
    assert!(log_path.exists());

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("# Agent Run Log"));
    assert!(content.contains("Log started:"));
}

#[test]
fn test_run_lifecycle_entries() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");
    let logger = RunLogger::new(Some(&log_path), None).unwrap();

    logger
        .log_run_start("run-1", "support-agent", "Summarize the logs")
        .unwrap();
    logger
        .log_event("step:started", &json!({"step": 1}))
        .unwrap();
    logger
        .log_model_exchange("gpt-4o", "The logs show two failures.", 120, 18)
        .unwrap();
    logger.log_run_end("run-1", "completed", 1).unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("Run Started"));
    assert!(content.contains("Summarize the logs"));
    assert!(content.contains("step:started"));
    assert!(content.contains("\"step\": 1"));
    assert!(content.contains("Model Exchange"));
    assert!(content.contains("120 in / 18 out"));
    assert!(content.contains("Run Finished"));
    assert!(content.contains("**Status:** completed"));
}

#[test]
fn test_empty_model_response_skipped() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");
    let logger = RunLogger::new(Some(&log_path), None).unwrap();

    logger.log_model_exchange("gpt-4o", "   \n", 5, 0).unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(!content.contains("Model Exchange"));
}

#[test]
fn test_reopening_appends() {
    let temp_dir = tempdir().unwrap();
    let log_path = temp_dir.path().join("test.md");

    {
        let logger = RunLogger::new(Some(&log_path), None).unwrap();
        logger.log_run_start("run-1", "agent", "first").unwrap();
    }
    {
        let logger = RunLogger::new(Some(&log_path), None).unwrap();
        logger.log_run_start("run-2", "agent", "second").unwrap();
    }

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("run-1"));
    assert!(content.contains("run-2"));
    // The header is written once.
    assert_eq!(content.matches("# Agent Run Log").count(), 1);
}
