use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use affilink_cli::commands::{counters, doctor, link, migrate, repair, sequential, subids, suggest};
use serde_json::Value;

const CATALOG: &str = r#"[
    {"id": 1, "name": "Eletrônicos", "sigla": "ELE", "keywords": ["fone", "celular", "bluetooth"]},
    {"id": 2, "name": "Moda Feminina Esportiva", "sigla": "MFE", "keywords": ["legging", "top fitness"]}
]"#;

const PRODUCTS: &str = r#"[
    {"itemId": 101, "productName": "Fone Bluetooth TWS", "price": 79.9,
     "offerLink": "https://shope.ee/fone101"},
    {"itemId": 102, "productName": "Legging Suplex Cintura Alta", "price": 59.9,
     "offerLink": "https://shope.ee/legging102"},
    {"itemId": 103, "productName": "Panela de Pressão", "price": 129.0}
]"#;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("AFFILINK_DATABASE_URL", "postgres://localhost/affilink")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_without_catalog_and_skips_catalog_check() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let report: Value =
            serde_json::from_str(&doctor::run(true)).expect("doctor output should be JSON");

        assert_eq!(report["overall_status"], "pass");
        let catalog = report["checks"]
            .as_array()
            .and_then(|checks| checks.iter().find(|check| check["name"] == "catalog_load"))
            .expect("catalog check");
        assert_eq!(catalog["status"], "skipped");
    });
}

#[test]
fn doctor_fails_for_invalid_template_prefix() {
    with_env(
        &[("AFFILINK_DATABASE_URL", "sqlite::memory:"), ("AFFILINK_TEMPLATE_PREFIX", "sm-1")],
        || {
            let output = doctor::run(false);
            assert!(output.starts_with("doctor: one or more readiness checks failed"));
        },
    );
}

#[test]
fn suggest_uses_configured_catalog() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_path = dir.path().join("categorias.json");
    fs::write(&catalog_path, CATALOG).expect("write catalog");
    let catalog_path = catalog_path.display().to_string();

    with_env(&[("AFFILINK_CATALOG_PATH", catalog_path.as_str())], || {
        let result = suggest::run("Fone bluetooth com microfone");
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["suggestion"]["category_id"], "1");
        assert_eq!(payload["data"]["suggestion"]["sigla"], "ELE");
    });
}

#[test]
fn suggest_reports_missing_catalog_file() {
    with_env(&[("AFFILINK_CATALOG_PATH", "/nonexistent/categorias.json")], || {
        let result = suggest::run("fone");
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "catalog");
    });
}

#[test]
fn subids_issues_first_values_for_a_category() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = subids::run("Eletrônicos", Some("ELE"));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        let sub_ids = &payload["data"]["sub_ids"];
        assert_eq!(sub_ids["s1"], "salesmartins");
        assert_eq!(sub_ids["s2"], "sentinnellanalytics");
        assert_eq!(sub_ids["s3"], "eletr_nicos");
        assert_eq!(sub_ids["s4"], "SM00001");
        assert_eq!(sub_ids["s5"], "SM_ELE00001");
        assert_eq!(payload["data"]["breakdown"]["campaign_code"], "SM_ELE00001");
    });
}

#[test]
fn subids_rejects_short_derived_sigla() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = subids::run("Eletrônicos", None);
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "domain");
        assert!(payload["message"].as_str().unwrap_or_default().contains("s5"));
    });
}

#[test]
fn link_appends_sub_ids_to_offer_url() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = link::run("https://shope.ee/abc?ref=feed", "Casa e Cozinha", None);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        let url = payload["data"]["affiliate_url"].as_str().expect("url");
        assert!(url.starts_with("https://shope.ee/abc?ref=feed&subids="));
        assert!(url.ends_with("SM00001%2CSM_CEC00001"));
    });
}

#[test]
fn link_rejects_relative_url() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = link::run("shope.ee/abc", "Casa e Cozinha", None);
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "domain");
    });
}

#[test]
fn counters_reset_requires_sigla_for_category_scope() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = counters::reset("category", None);
        assert_eq!(result.exit_code, 7);

        let ok = counters::reset("category", Some("ele"));
        assert_eq!(ok.exit_code, 0);
        assert_eq!(parse_payload(&ok.output)["data"]["categories"]["ELE"], 1);
    });
}

#[test]
fn counters_show_starts_at_one() {
    with_env(&[("AFFILINK_DATABASE_URL", "sqlite::memory:")], || {
        let result = counters::show();
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["data"]["global"], 1);
    });
}

#[test]
fn repair_reports_updated_and_failed_products() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_path = dir.path().join("categorias.json");
    let products_path = dir.path().join("produtos.json");
    fs::write(&catalog_path, CATALOG).expect("write catalog");
    fs::write(&products_path, PRODUCTS).expect("write products");
    let catalog_path = catalog_path.display().to_string();

    with_env(&[("AFFILINK_CATALOG_PATH", catalog_path.as_str())], || {
        let result = repair::run(&products_path, false);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["total"], 3);
        assert_eq!(payload["data"]["applied"], false);
        assert_eq!(payload["data"]["updated"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["data"]["failed"][0]["product_id"], "103");
    });
}

#[test]
fn sequential_generates_links_and_reports_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_path = dir.path().join("categorias.json");
    let products_path = dir.path().join("produtos.json");
    fs::write(&catalog_path, CATALOG).expect("write catalog");
    fs::write(&products_path, PRODUCTS).expect("write products");
    let catalog_path = catalog_path.display().to_string();

    with_env(
        &[
            ("AFFILINK_DATABASE_URL", "sqlite::memory:"),
            ("AFFILINK_CATALOG_PATH", catalog_path.as_str()),
        ],
        || {
            let result = sequential::run(&products_path, 7, Some("black-friday"));
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            let data = &payload["data"];
            assert_eq!(data["total_processed"], 3);
            assert_eq!(data["success_count"], 2);
            assert_eq!(data["error_count"], 1);
            assert_eq!(data["next_sequence"], 10);
            assert_eq!(data["links"][0]["sub_id"], "seq007");
            assert_eq!(data["links"][0]["sub_ids"]["s5"], "SM_ELE00001");
            assert_eq!(data["links"][1]["sub_ids"]["s4"], "SM00002");
            assert_eq!(data["links"][2]["sub_id"], "seq009");
            assert_eq!(data["links"][2]["success"], false);
        },
    );
}

#[test]
fn counters_issued_by_sequential_runs_are_never_issued_again() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog_path = dir.path().join("categorias.json");
    let products_path = dir.path().join("produtos.json");
    fs::write(&catalog_path, CATALOG).expect("write catalog");
    fs::write(&products_path, PRODUCTS).expect("write products");
    let catalog_path = catalog_path.display().to_string();
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("affilink.db").display());

    with_env(
        &[
            ("AFFILINK_DATABASE_URL", database_url.as_str()),
            ("AFFILINK_CATALOG_PATH", catalog_path.as_str()),
        ],
        || {
            let batch = sequential::run(&products_path, 1, None);
            assert_eq!(batch.exit_code, 0, "unexpected output: {}", batch.output);

            let first = subids::run("Eletrônicos", Some("ELE"));
            assert_eq!(first.exit_code, 0, "unexpected output: {}", first.output);
            let second = subids::run("Eletrônicos", Some("ELE"));
            assert_eq!(second.exit_code, 0, "unexpected output: {}", second.output);

            let first = parse_payload(&first.output);
            let second = parse_payload(&second.output);
            assert_eq!(first["data"]["sub_ids"]["s4"], "SM00003");
            assert_eq!(first["data"]["sub_ids"]["s5"], "SM_ELE00002");
            assert_eq!(second["data"]["sub_ids"]["s4"], "SM00004");

            let shown = parse_payload(&counters::show().output);
            assert_eq!(shown["data"]["global"], 5);
        },
    );
}

#[test]
fn sequential_rejects_zero_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let products_path = dir.path().join("produtos.json");
    fs::write(&products_path, PRODUCTS).expect("write products");

    with_env(&[], || {
        let result = sequential::run(&products_path, 0, None);
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "input");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "AFFILINK_DATABASE_URL",
        "AFFILINK_DATABASE_MAX_CONNECTIONS",
        "AFFILINK_DATABASE_TIMEOUT_SECS",
        "AFFILINK_CATALOG_PATH",
        "AFFILINK_TEMPLATE_NAME",
        "AFFILINK_TEMPLATE_PLATFORM_TOKEN",
        "AFFILINK_TEMPLATE_PARTNER_TOKEN",
        "AFFILINK_TEMPLATE_PREFIX",
        "AFFILINK_MATCHING_BASE_WEIGHT",
        "AFFILINK_MATCHING_EARLY_BONUS",
        "AFFILINK_MATCHING_EARLY_WINDOW",
        "AFFILINK_LOGGING_LEVEL",
        "AFFILINK_LOGGING_FORMAT",
        "AFFILINK_LOG_LEVEL",
        "AFFILINK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
