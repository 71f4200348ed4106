//! ---
//! airlift_section: "05-external-interfaces"
//! airlift_subsection: "test"
//! airlift_type: "test"
//! airlift_scope: "code"
//! airlift_description: "End-to-end checks of the control CLI binary."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::fs;

use assert_cmd::Command;

fn airliftctl() -> Command {
    let mut command = Command::cargo_bin("airliftctl").expect("binary built");
    command
        .env_remove("AIRLIFT_CONFIG")
        .env_remove("AIRLIFT_PROJECT_DIR")
        .env_remove("AIRLIFT_ADMIN_PASSWORD")
        .env("AIRLIFT_LOG", "warn");
    command
}

#[test]
fn help_lists_every_lifecycle_command() {
    let output = airliftctl().arg("--help").assert().success().get_output().clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "down-airflow",
        "reset-airflow",
        "init-airflow",
        "create-schema",
        "up-airflow",
        "ver-db",
        "start",
        "show-config",
        "scripts",
    ] {
        assert!(stdout.contains(name), "help is missing {name}");
    }
}

#[test]
fn create_schema_without_schema_file_fails_before_any_database_call() {
    let project = tempfile::tempdir().expect("tempdir");
    // A compose program that cannot exist proves no command was attempted.
    fs::write(
        project.path().join("airlift.toml"),
        "[compose]\nprogram = \"airlift-missing-compose\"\n",
    )
    .expect("config");

    let output = airliftctl()
        .arg("--project-dir")
        .arg(project.path())
        .arg("create-schema")
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "stderr was: {stderr}");
    assert!(stderr.contains("locate-schema"), "stderr was: {stderr}");
    assert!(!stderr.contains("failed to launch"), "stderr was: {stderr}");
}

#[test]
fn missing_compose_program_is_reported() {
    let project = tempfile::tempdir().expect("tempdir");
    fs::write(
        project.path().join("airlift.toml"),
        "[compose]\nprogram = \"airlift-missing-compose\"\nbase_args = []\n",
    )
    .expect("config");

    let output = airliftctl()
        .arg("--project-dir")
        .arg(project.path())
        .arg("down-airflow")
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to launch"), "stderr was: {stderr}");
    assert!(stderr.contains("stack-down"), "stderr was: {stderr}");
}

#[cfg(unix)]
#[test]
fn create_schema_with_relative_project_dir_feeds_the_schema_file() {
    let root = tempfile::tempdir().expect("tempdir");
    let project = root.path().join("deploy");
    fs::create_dir_all(project.join("sql")).expect("sql dir");
    fs::write(
        project.join("sql/schema.sql"),
        "CREATE TABLE IF NOT EXISTS regulations (id SERIAL PRIMARY KEY);\n",
    )
    .expect("schema");
    // `true` accepts any arguments and stdin, standing in for docker compose.
    fs::write(
        project.join("airlift.toml"),
        "[compose]\nprogram = \"true\"\nbase_args = []\n",
    )
    .expect("config");

    let output = airliftctl()
        .current_dir(root.path())
        .arg("--project-dir")
        .arg("deploy")
        .arg("create-schema")
        .output()
        .expect("runs");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr was: {stderr}");
    assert!(!stderr.contains("unable to open"), "stderr was: {stderr}");
}

#[test]
fn show_config_reads_project_file_and_hides_password() {
    let project = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(project.path().join("configs")).expect("configs dir");
    fs::write(
        project.path().join("configs/airlift.toml"),
        "[admin]\nusername = \"etl-admin\"\npassword = \"hunter2\"\n",
    )
    .expect("config");

    let output = airliftctl()
        .arg("--project-dir")
        .arg(project.path())
        .arg("show-config")
        .assert()
        .success()
        .get_output()
        .clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# source: "));
    assert!(stdout.contains("username: etl-admin"));
    assert!(!stdout.contains("hunter2"));
}

#[test]
fn invalid_configuration_is_rejected() {
    let project = tempfile::tempdir().expect("tempdir");
    fs::write(
        project.path().join("airlift.toml"),
        "[services]\nwebserver = \"\"\n",
    )
    .expect("config");

    let output = airliftctl()
        .arg("--project-dir")
        .arg(project.path())
        .arg("show-config")
        .assert()
        .code(1)
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("services.webserver"), "stderr was: {stderr}");
}

#[test]
fn scripts_render_both_adapters() {
    let output = airliftctl()
        .args(["scripts", "--variant", "posix"])
        .assert()
        .success()
        .get_output()
        .clone();
    let makefile = String::from_utf8_lossy(&output.stdout);
    assert!(makefile.contains("reset-airflow:\n\t$(AIRLIFTCTL) reset-airflow"));

    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("airflow.bat");
    airliftctl()
        .args(["scripts", "--variant", "windows", "--output"])
        .arg(&target)
        .assert()
        .success();
    let batch = fs::read_to_string(&target).expect("batch written");
    assert!(batch.contains(":ver-db\n%AIRLIFTCTL% ver-db\n"));
}
