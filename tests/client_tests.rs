use logpt::client::{ClientConfig, CompletionError, CompletionSource, OpenAiClient};
use logpt::{decoder, prompts, template};
use std::time::Duration;

#[test]
fn messages_are_system_examples_then_prompt() {
    let client = OpenAiClient::new(ClientConfig::new("sk-test")).unwrap();
    let examples = prompts::default_examples();
    let messages = client.build_messages(&prompts::user_prompt("Listener started"), &examples);

    assert_eq!(messages.len(), examples.len() * 2 + 2);
    assert_eq!(messages[0].role, "system");
    assert_eq!(messages[0].content, prompts::SYSTEM_PROMPT);
    assert_eq!(messages[1].role, "user");
    assert_eq!(messages[1].content, "'Returning 500 to user'");
    assert_eq!(messages[2].role, "assistant");
    let last = messages.last().unwrap();
    assert_eq!(last.role, "user");
    assert_eq!(last.content, "'Listener started'");
}

#[test]
fn default_examples_decode_and_reproduce_their_logs() {
    for ex in prompts::default_examples() {
        let log = ex.prompt.trim_matches('\'');
        let decoded = decoder::decode_strict(&ex.reply).unwrap();
        assert!(template::is_reversible(&decoded.template, &decoded.variables, log), "{log}");
    }
}

#[test]
fn config_debug_hides_api_key() {
    let config = ClientConfig::new("sk-secret").with_model("gpt-4o-mini");
    let shown = format!("{config:?}");
    assert!(!shown.contains("sk-secret"));
    assert!(shown.contains("gpt-4o-mini"));
}

#[test]
fn unreachable_endpoint_is_a_completion_error() {
    let mut config = ClientConfig::new("sk-test");
    config.base_url = "http://127.0.0.1:9/v1".into();
    config.timeout = Duration::from_millis(500);
    let client = OpenAiClient::new(config).unwrap();
    let err = client.complete("'x'", 0.0, &[]).unwrap_err();
    assert!(matches!(err, CompletionError::Transport(_) | CompletionError::Timeout));
}

struct Echo;

impl CompletionSource for Echo {
    fn complete(
        &self,
        prompt: &str,
        _temperature: f32,
        examples: &[logpt::client::FewShot],
    ) -> Result<String, CompletionError> {
        assert!(examples.is_empty());
        Ok(prompt.to_string())
    }
}

#[test]
fn system_instruction_is_prepended_without_a_system_role() {
    let prompt = prompts::refine_prompt("job {id} done", &["job 1 done", "job 2 done"]);
    let sent = Echo.complete_with_system(prompts::REFINE_PROMPT, &prompt, 0.0).unwrap();
    assert!(sent.starts_with(prompts::REFINE_PROMPT));
    assert!(sent.ends_with("SAMPLED LOGS:\njob 1 done\njob 2 done\nEND SAMPLED LOGS\n"));
}
