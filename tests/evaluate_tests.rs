use logpt::client::{CompletionError, CompletionSource, FewShot};
use logpt::dataset::LogRecord;
use logpt::evaluate;
use logpt::pipeline::{Pipeline, PipelineConfig};

struct Fixed;

impl CompletionSource for Fixed {
    fn complete(&self, prompt: &str, _t: f32, _ex: &[FewShot]) -> Result<String, CompletionError> {
        let line = prompt.trim_matches('\'');
        if line.starts_with("Returning") {
            return Ok("code = '500'\ntemplate = f'Returning {code} to user'".into());
        }
        if line.starts_with("Deleting") {
            // too specific: keeps the file name literal
            return Ok(format!("template = '{line}'"));
        }
        Err(CompletionError::Timeout)
    }
}

fn record(log: &str, template: &str) -> LogRecord {
    LogRecord {
        project: "Test".into(),
        log: log.into(),
        template: template.into(),
        is_static: log == template,
    }
}

#[test]
fn scores_claimed_logs_against_ground_truth() {
    let records = vec![
        record("Returning 500 to user", "Returning <*> to user"),
        record("Returning 404 to user", "Returning <*> to user"),
        record("Deleting file a.txt", "Deleting file <*>"),
        record("Kernel panic", "Kernel panic"),
    ];
    let logs: Vec<String> = records.iter().map(|r| r.log.clone()).collect();
    let config = PipelineConfig { max_passes: 1, ..Default::default() };
    let run = Pipeline::new(&Fixed, config).run(logs);

    let eval = evaluate::evaluate(&records, &run.groups);
    assert_eq!(eval.total, 4);
    assert_eq!(eval.correct, 2);
    assert_eq!(eval.unparsed, 1);
    assert!((eval.accuracy - 0.5).abs() < 1e-9);
    assert_eq!(eval.outcomes[2].predicted.as_deref(), Some("Deleting file a.txt"));
    assert!(!eval.outcomes[2].correct);
    assert!(eval.outcomes[3].predicted.is_none());
}

#[test]
fn empty_dataset_scores_zero() {
    let eval = evaluate::evaluate(&[], &Default::default());
    assert_eq!(eval.total, 0);
    assert_eq!(eval.accuracy, 0.0);
}
