use logpt::matcher::{self, Pattern};

#[test]
fn matches_only_lines_with_the_same_shape() {
    let pool = vec!["Failed password for root".to_string(), "Accepted password for root".to_string()];
    let pattern = Pattern::from_positional("Failed password for <*>").unwrap();
    assert_eq!(matcher::match_lines(&pool, &pattern), vec!["Failed password for root".to_string()]);
}

#[test]
fn prefix_match_is_anchored_at_start_only() {
    let pattern = Pattern::from_template("Listener started").unwrap();
    assert!(pattern.is_match("Listener started"));
    assert!(pattern.is_match("Listener started on port 80"));
    assert!(!pattern.is_match("Old Listener started"));
}

#[test]
fn wildcard_spans_newlines_but_needs_one_char() {
    let pattern = Pattern::from_positional("Exception: <*>").unwrap();
    assert!(pattern.is_match("Exception: boom\n\tat Foo.bar(Foo.java:1)"));
    assert!(!pattern.is_match("Exception: "));
}

#[test]
fn preserves_pool_order() {
    let pool: Vec<String> = (0..50).map(|i| format!("job {i} done")).collect();
    let pattern = Pattern::from_template("job {id} done").unwrap();
    assert_eq!(matcher::match_lines(&pool, &pattern), pool);
}

#[test]
fn extracts_wildcard_values() {
    let pattern = Pattern::from_template("Failed password for {user} from {ip} port {port} ssh2").unwrap();
    let values = pattern.extract("Failed password for root from 183.62.140.253 port 37999 ssh2").unwrap();
    assert_eq!(values, vec!["root", "183.62.140.253", "37999"]);
    assert!(pattern.extract("Accepted password for root").is_none());
    assert_eq!(pattern.as_str(), r"Failed password for (.+) from (.+) port (.+) ssh2");
}
