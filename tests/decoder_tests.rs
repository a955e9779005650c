use logpt::decoder::{self, DecodeError};
use logpt::matcher::Pattern;
use logpt::template;

#[test]
fn decodes_variables_and_fstring_template() {
    let out = decoder::decode("status_code = '500'\ntemplate = f'Returning {status_code} to user'").unwrap();
    assert_eq!(out.template, "Returning {status_code} to user");
    assert_eq!(out.variables.len(), 1);
    assert_eq!(out.variables["status_code"], "500");
    assert_eq!(out.positional(), "Returning <*> to user");
}

#[test]
fn keeps_assignment_order() {
    let reply = "instance_id = 'd96a117b'\npath = '/var/lib/nova/instances/d96a117b_del'\ntemplate = f'[instance: {instance_id}] Deleting instance files {path}'";
    let out = decoder::decode(reply).unwrap();
    assert_eq!(out.variable_names(), vec!["instance_id", "path"]);
    assert_eq!(out.variables["path"], "/var/lib/nova/instances/d96a117b_del");
}

#[test]
fn static_template_without_variables() {
    let out = decoder::decode("template = 'onReceive action: android.intent.action.SCREEN_ON'").unwrap();
    assert!(out.variables.is_empty());
    assert_eq!(out.template, "onReceive action: android.intent.action.SCREEN_ON");
}

#[test]
fn template_may_contain_equals_and_escaped_quotes() {
    let out = decoder::decode("key = 'a'\ntemplate = f'set {key}=on for user\\'s session'").unwrap();
    assert_eq!(out.template, "set {key}=on for user's session");
}

#[test]
fn strips_assistant_marker_and_blank_lines() {
    let reply = "ASSISTANT:\ncell_id = '949e1227'\n\ntemplate = f'Listing instance in cell {cell_id}'\n\n";
    let out = decoder::decode(reply).unwrap();
    assert_eq!(out.variables["cell_id"], "949e1227");
    assert_eq!(out.template, "Listing instance in cell {cell_id}");
}

#[test]
fn bare_and_double_quoted_values() {
    let out = decoder::decode("port = 37999\nhost = \"ss.bdimg.com\"\ntemplate = f'{host}:{port}'").unwrap();
    assert_eq!(out.variables["port"], "37999");
    assert_eq!(out.variables["host"], "ss.bdimg.com");
}

#[test]
fn values_are_never_evaluated() {
    let out = decoder::decode("x = __import__('os').system('id')\ntemplate = f'{x}'").unwrap();
    assert_eq!(out.variables["x"], "__import__('os').system('id')");
}

#[test]
fn failures() {
    assert_eq!(decoder::decode(""), Err(DecodeError::Empty));
    assert_eq!(decoder::decode("  \n\n"), Err(DecodeError::Empty));
    assert!(matches!(
        decoder::decode("user = 'root'\nFailed password for root"),
        Err(DecodeError::MissingTemplateAssignment(_))
    ));
    assert!(matches!(
        decoder::decode("just some text\ntemplate = 'x'"),
        Err(DecodeError::MissingAssignment(_))
    ));
    assert!(matches!(
        decoder::decode("user = 'root\ntemplate = f'{user}'"),
        Err(DecodeError::InvalidLiteral(_))
    ));
}

#[test]
fn strict_mode_requires_bound_placeholders() {
    // the model misspelled error_code
    let reply = "error_cde = '11001'\ntemplate = f'resolve proxy error {error_code}'";
    assert!(decoder::decode(reply).is_ok());
    assert_eq!(
        decoder::decode_strict(reply),
        Err(DecodeError::UnboundPlaceholder("error_code".into()))
    );
    assert!(decoder::decode_strict("code = '1'\ntemplate = f'error {code}'").is_ok());
}

#[test]
fn fstring_doubled_braces_become_literal_braces() {
    let out = decoder::decode("v = '1'\ntemplate = f'payload {{\"a\": {v}}} ok'").unwrap();
    assert_eq!(out.template, "payload {\"a\": {v}} ok");
    assert_eq!(out.positional(), "payload {\"a\": <*>} ok");
    assert_eq!(template::render(&out.template, &out.variables), "payload {\"a\": 1} ok");

    let pattern = Pattern::from_template(&out.template).unwrap();
    assert!(pattern.is_match("payload {\"a\": 1} ok"));
    assert_eq!(pattern.extract("payload {\"a\": 42} ok"), Some(vec!["42".to_string()]));
}

#[test]
fn plain_string_template_keeps_doubled_braces() {
    let out = decoder::decode("template = 'set {{x}}'").unwrap();
    assert_eq!(out.template, "set {{x}}");
}

#[test]
fn empty_template_is_rejected() {
    for reply in ["template = ''", "template = f''", "template = '   '", "v = '1'\ntemplate = \"\""] {
        assert!(
            matches!(decoder::decode(reply), Err(DecodeError::EmptyTemplate(_))),
            "{reply:?} should not decode"
        );
    }
    assert!(matches!(decoder::decode_strict("template = ''"), Err(DecodeError::EmptyTemplate(_))));
}
