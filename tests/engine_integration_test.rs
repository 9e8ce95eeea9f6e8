use chrono::{DateTime, TimeZone, Utc};
use logalert::{
    compile_rules, AlertEngine, AlertEngineBuilder, CompareOp, EngineConfig, LogEntry, Rule,
    RuleSpec, Severity, Value,
};
use std::time::Duration;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn error_entry(message: &str) -> LogEntry {
    LogEntry::new("error", message)
}

#[test]
fn test_config_document_to_firing_pipeline() {
    let document = r#"
- name: fatal
  type: pattern
  pattern: "FATAL"
  severity: critical
  notify: [email, webhook]
- name: errs
  type: threshold
  field: level
  value: error
  threshold: 3
  window: 5m
- name: http5xx
  type: expression
  expression: "http_status >= 500 && uri startsWith '/api'"
  aggregation:
    function: rate
    operator: ">="
    threshold: 2.5
    window: 1m
  labels:
    env: prod
"#;
    let specs: Vec<RuleSpec> = serde_yaml::from_str(document).unwrap();
    let rules = compile_rules(&specs).unwrap();
    assert_eq!(rules.len(), 3);

    let engine = AlertEngineBuilder::new().with_rules(rules).build().unwrap();

    // Pattern rule fires with the configured severity and notify list.
    let alerts = engine.evaluate(&LogEntry::new("ERROR", "FATAL: disk full"), at(0));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert_eq!(alerts[0].notify, vec!["email", "webhook"]);

    // Expression rule only sees entries matching its label selector.
    let unlabeled = LogEntry::new("ERROR", "api down")
        .with_field("status", 503i64)
        .with_field("uri", "/api/users");
    for i in 0..5 {
        assert!(engine
            .evaluate(&unlabeled.clone().with_timestamp(at(i)), at(i))
            .is_empty());
    }

    let labeled = unlabeled.with_label("env", "prod");
    assert!(engine.evaluate(&labeled, at(10)).is_empty());
    assert!(engine.evaluate(&labeled, at(11)).is_empty());
    let alerts = engine.evaluate(&labeled, at(12));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].rule_name, "http5xx");
}

#[test]
fn test_threshold_edge_and_window_reset() {
    let engine = AlertEngine::new();
    engine
        .add_rule(
            Rule::threshold(
                "errs",
                Some("level".to_string()),
                Value::from("error"),
                CompareOp::Eq,
                3,
                Duration::from_secs(300),
            )
            .unwrap(),
        )
        .unwrap();

    assert!(engine.evaluate(&error_entry("one"), at(0)).is_empty());
    assert!(engine.evaluate(&error_entry("two"), at(1)).is_empty());

    // Fires exactly at count == threshold, not before.
    let alerts = engine.evaluate(&error_entry("three"), at(2));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].count, Some(3));
    assert_eq!(alerts[0].threshold, Some(3.0));

    // The pile was drained on fire; the next matching entry is count 1.
    assert!(engine.evaluate(&error_entry("four"), at(3)).is_empty());
}

#[test]
fn test_cooldown_suppression_arithmetic() {
    let engine = AlertEngine::new();
    engine
        .add_rule(
            Rule::pattern("e", "ERROR", false)
                .unwrap()
                .with_cooldown(Duration::from_secs(10)),
        )
        .unwrap();
    let entry = LogEntry::new("ERROR", "ERROR: boom");

    assert_eq!(engine.evaluate(&entry, at(0)).len(), 1);
    assert!(engine.evaluate(&entry, at(5)).is_empty());
    assert_eq!(engine.stats().alerts_suppressed, 1);
    assert_eq!(engine.evaluate(&entry, at(11)).len(), 1);
}

#[test]
fn test_threshold_cooldown_keeps_events_buffered() {
    let engine = AlertEngine::new();
    engine
        .add_rule(
            Rule::threshold(
                "t",
                Some("level".to_string()),
                Value::from("error"),
                CompareOp::Eq,
                2,
                Duration::from_secs(300),
            )
            .unwrap()
            .with_cooldown(Duration::from_secs(60)),
        )
        .unwrap();

    assert!(engine.evaluate(&error_entry("a"), at(0)).is_empty());
    assert_eq!(engine.evaluate(&error_entry("b"), at(1)).len(), 1);

    // On cooldown: firings suppressed, but events keep accumulating.
    assert!(engine.evaluate(&error_entry("c"), at(2)).is_empty());
    assert!(engine.evaluate(&error_entry("d"), at(3)).is_empty());
    assert_eq!(engine.stats().alerts_suppressed, 1);
    assert!(engine.buffered_events() >= 2);

    // First match after expiry fires with the accumulated count.
    let alerts = engine.evaluate(&error_entry("e"), at(62));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].count, Some(3));
}

#[test]
fn test_global_eviction_scaled() {
    let engine = AlertEngine::with_config(EngineConfig {
        alert_buffer: 100,
        max_events_per_rule: 100,
        max_total_events: 10,
    });
    for name in ["old", "new"] {
        engine
            .add_rule(
                Rule::threshold(
                    name,
                    Some("bucket".to_string()),
                    Value::from(name),
                    CompareOp::Eq,
                    1_000,
                    Duration::from_secs(3600),
                )
                .unwrap(),
            )
            .unwrap();
    }

    let mut t = 0;
    for _ in 0..6 {
        engine.evaluate(&error_entry("x").with_field("bucket", "old"), at(t));
        t += 1;
    }
    for _ in 0..5 {
        engine.evaluate(&error_entry("x").with_field("bucket", "new"), at(t));
        t += 1;
    }

    // Eleven events against a budget of ten: the window holding the
    // globally oldest entries shed half; the bound holds.
    assert!(engine.buffered_events() <= 10);
}

#[test]
fn test_rate_exactly_at_threshold_fires() {
    let engine = AlertEngine::new();
    engine
        .add_rule(
            Rule::expression(
                "r",
                "http_status >= 500",
                logalert::Aggregation::new(
                    logalert::AggregateFn::Rate,
                    2.0,
                    Duration::from_secs(60),
                )
                .unwrap(),
            )
            .unwrap(),
        )
        .unwrap();

    let entry = LogEntry::new("ERROR", "bad gateway").with_field("status", 502i64);
    assert!(engine.evaluate(&entry, at(0)).is_empty());
    // Two events over one minute reach rate 2.0, which satisfies `>= 2`.
    let alerts = engine.evaluate(&entry, at(10));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].count, Some(2));
}

#[test]
fn test_entries_evaluated_is_exact() {
    let engine = AlertEngine::new();
    engine
        .add_rule(Rule::pattern("p", "x", false).unwrap())
        .unwrap();
    let before = engine.stats().entries_evaluated;
    for i in 0..7 {
        engine.evaluate(&LogEntry::new("INFO", "nothing"), at(i));
    }
    assert_eq!(engine.stats().entries_evaluated, before + 7);
}

#[test]
fn test_log_type_filter_routing() {
    let engine = AlertEngine::new();
    engine
        .add_rule(
            Rule::pattern("nginx-only", "ERROR", false)
                .unwrap()
                .with_log_type("nginx"),
        )
        .unwrap();

    let nginx = LogEntry::new("ERROR", "ERROR upstream").with_kind("nginx");
    let syslog = LogEntry::new("ERROR", "ERROR kernel").with_kind("syslog");
    assert_eq!(engine.evaluate(&nginx, at(0)).len(), 1);
    assert!(engine.evaluate(&syslog, at(1)).is_empty());
}

#[test]
fn test_alert_json_shape() {
    let engine = AlertEngine::new();
    engine
        .add_rule(
            Rule::threshold(
                "errs",
                Some("level".to_string()),
                Value::from("error"),
                CompareOp::Eq,
                1,
                Duration::from_secs(300),
            )
            .unwrap()
            .with_description("error volume")
            .with_notify(vec!["email".to_string()]),
        )
        .unwrap();

    let alerts = engine.evaluate(&error_entry("boom"), at(0));
    let json: serde_json::Value =
        serde_json::from_str(&alerts[0].to_json().unwrap()).unwrap();
    assert_eq!(json["rule_name"], "errs");
    assert_eq!(json["description"], "error volume");
    assert_eq!(json["count"], 1);
    assert_eq!(json["window"], "5m");
    assert_eq!(json["notify"][0], "email");
    // Pattern-only field omitted for aggregating rules.
    assert!(json.get("triggering_entry").is_none());
}
