use crate::client::FewShot;

pub const SYSTEM_PROMPT: &str = "This is a log parser that parses a log line into a template and variables if variables exist. \
You should produce variable assigning lines and template assigning line using python syntax, specially f-string syntax. \
The generated code should generate the user's input log.";

pub const REFINE_PROMPT: &str = "You are an AI log analysis expert. You should look at sample log templates with variables and corresponding log messages, \
and update the templates where possible to make them more generic and meaningful. \
Sample logs should still be identifiable after template modifications. If you already have a well-made template, don't update it. \
Answer in the same form as the original: variable assigning lines for the first sampled log, then a template assigning line in f-string syntax.";

const EXAMPLES: &[(&str, &str)] = &[
    (
        "Returning 500 to user",
        "status_code = '500'\ntemplate = f'Returning {status_code} to user'",
    ),
    (
        "Listing instance in cell 949e1227",
        "cell_id = '949e1227'\ntemplate = f'Listing instance in cell {cell_id}'",
    ),
    (
        "onReceive action: android.intent.action.SCREEN_ON",
        "template = 'onReceive action: android.intent.action.SCREEN_ON'",
    ),
    (
        "[instance: d96a117b-0193-4549-bdcc-63b917273d1d] Deleting instance files /var/lib/nova/instances/d96a117b-0193-4549-bdcc-63b917273d1d_del",
        "instance_id = 'd96a117b-0193-4549-bdcc-63b917273d1d'\npath = '/var/lib/nova/instances/d96a117b-0193-4549-bdcc-63b917273d1d_del'\ntemplate = f'[instance: {instance_id}] Deleting instance files {path}'",
    ),
];

/// Log lines are sent quoted, the same way the worked examples are.
pub fn user_prompt(line: &str) -> String {
    format!("'{line}'")
}

pub fn default_examples() -> Vec<FewShot> {
    EXAMPLES
        .iter()
        .map(|(log, reply)| FewShot::new(user_prompt(log), *reply))
        .collect()
}

/// User input for a refinement request: the template and the logs it matched.
pub fn refine_prompt<S: AsRef<str>>(template: &str, samples: &[S]) -> String {
    let logs = samples.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("\n");
    format!("ORIGINAL TEMPLATE: {template}\nSAMPLED LOGS:\n{logs}\nEND SAMPLED LOGS\n")
}
