//! ---
//! airlift_section: "15-testing-qa"
//! airlift_subsection: "integration-tests"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Consistency checks for the schema, compose file, config and adapters."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use airlift_common::StackConfig;

fn read(path: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let full = Path::new(manifest_dir).join("..").join(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

const TARGETS: [&str; 7] = [
    "down-airflow",
    "reset-airflow",
    "init-airflow",
    "create-schema",
    "up-airflow",
    "ver-db",
    "start",
];

#[test]
fn schema_is_idempotent_and_linked() {
    let schema = read("sql/schema.sql");
    assert_eq!(
        schema.matches("CREATE TABLE IF NOT EXISTS").count(),
        2,
        "schema must declare exactly two tables, both guarded"
    );
    assert_eq!(
        schema.matches("CREATE TABLE").count(),
        2,
        "unguarded CREATE TABLE would fail on re-application"
    );
    assert!(schema.contains("CREATE TABLE IF NOT EXISTS regulations ("));
    assert!(schema.contains("CREATE TABLE IF NOT EXISTS regulations_component ("));
    assert!(
        schema.contains("REFERENCES regulations(id)"),
        "regulations_component must reference regulations"
    );
}

#[test]
fn compose_defines_services_from_default_config() {
    let compose = read("docker-compose.yaml");
    let config = StackConfig::default();
    for service in [
        &config.services.webserver,
        &config.services.scheduler,
        &config.services.database,
    ] {
        assert!(
            compose.contains(&format!("\n  {service}:\n")),
            "compose file must define service {service}"
        );
    }
    for mount in ["./dags:", "./logs:", "./plugins:", "./scripts:"] {
        assert!(compose.contains(mount), "compose must bind mount {mount}");
    }
    assert!(
        compose.contains("postgres-db-volume:/var/lib/postgresql/data"),
        "database state must live in a named volume so down --volumes drops it"
    );
}

#[test]
fn example_configuration_parses_and_matches_defaults() {
    let example: StackConfig = read("configs/airlift.example.toml")
        .parse()
        .expect("example config is valid");
    let defaults = StackConfig::default();
    assert_eq!(example.services.database, defaults.services.database);
    assert_eq!(example.directories.mode, 0o777);
    assert_eq!(example.readiness.max_wait, defaults.readiness.max_wait);
    assert_eq!(example.database.schema_file, defaults.database.schema_file);
}

#[test]
fn adapters_delegate_every_target() {
    let makefile = read("Makefile");
    let batch = read("airflow.bat");
    for target in TARGETS {
        assert!(
            makefile.contains(&format!("{target}:\n\t$(AIRLIFTCTL) {target}\n")),
            "Makefile must delegate {target}"
        );
        assert!(
            batch.contains(&format!(":{target}\n%AIRLIFTCTL% {target}\n")),
            "batch file must delegate {target}"
        );
    }
}
