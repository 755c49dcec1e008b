//! Tests for rule file compilation

use filter_proxy::policy::{Action, PolicyError, PolicySet};

#[test]
fn test_parse_keeps_file_order() {
    let policy = PolicySet::parse(
        "ALLOW GET /public/*\n\
         DENY GET /public/secret\n\
         ALLOW POST /api/items\n",
    )
    .unwrap();

    let rules = policy.rules();
    assert_eq!(rules.len(), 3);
    assert_eq!(rules[0].action, Action::Allow);
    assert_eq!(rules[1].action, Action::Deny);
    assert_eq!(rules[1].path.as_str(), "/public/secret");
    assert_eq!(rules[2].method, "POST");
}

#[test]
fn test_parse_skips_comments_and_blank_lines() {
    let policy = PolicySet::parse(
        "# header comment\n\
         \n\
         \t   \n\
         \x20  # indented comment\n\
         ALLOW GET /\n",
    )
    .unwrap();

    assert_eq!(policy.len(), 1);
    assert_eq!(policy.rules()[0].line_number, 5);
}

#[test]
fn test_parse_empty_file() {
    let policy = PolicySet::parse("").unwrap();
    assert!(policy.is_empty());

    let policy = PolicySet::parse("# nothing here\n# at all\n").unwrap();
    assert!(policy.is_empty());
}

#[test]
fn test_parse_normalizes_case() {
    let policy = PolicySet::parse("allow get /Mixed/Case\n").unwrap();
    let rule = &policy.rules()[0];

    assert_eq!(rule.action, Action::Allow);
    assert_eq!(rule.method, "GET");
    // Paths keep their case
    assert_eq!(rule.path.as_str(), "/Mixed/Case");
}

#[test]
fn test_parse_tolerates_extra_whitespace() {
    let policy = PolicySet::parse("  DENY \t DELETE    /api/*   \r\n").unwrap();
    let rule = &policy.rules()[0];

    assert_eq!(rule.action, Action::Deny);
    assert_eq!(rule.method, "DELETE");
    assert_eq!(rule.path.as_str(), "/api/*");
}

#[test]
fn test_two_fields_is_fatal() {
    let err = PolicySet::parse("ALLOW GET /ok\nALLOW GET\n").unwrap_err();

    match err {
        PolicyError::InvalidRule { line_number, line } => {
            assert_eq!(line_number, 2);
            assert_eq!(line, "ALLOW GET");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_four_fields_is_fatal() {
    let err = PolicySet::parse("ALLOW GET /a /b\n").unwrap_err();
    assert!(matches!(err, PolicyError::InvalidRule { line_number: 1, .. }));
    assert!(err.to_string().contains("ALLOW GET /a /b"));
}

#[test]
fn test_unknown_action_is_fatal() {
    let err = PolicySet::parse("ALOW GET /typo\n").unwrap_err();

    match err {
        PolicyError::UnknownAction { action, line_number, .. } => {
            assert_eq!(action, "ALOW");
            assert_eq!(line_number, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_load_missing_file() {
    let err = PolicySet::load("/nonexistent/filter-proxy/rules.txt").unwrap_err();
    assert!(matches!(err, PolicyError::Io { .. }));
}

#[test]
fn test_load_from_disk() {
    let path = std::env::temp_dir().join(format!("filter-proxy-rules-{}.txt", std::process::id()));
    std::fs::write(&path, "# allowlist\nALLOW GET /health\n").unwrap();

    let policy = PolicySet::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(policy.len(), 1);
    assert_eq!(policy.rules()[0].to_string(), "ALLOW GET /health (line 2)");
}

#[test]
fn test_from_str() {
    let policy: PolicySet = "DENY PUT /x".parse().unwrap();
    assert_eq!(policy.len(), 1);
}
