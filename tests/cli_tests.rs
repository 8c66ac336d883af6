//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the tutor-factory binary
fn tutor_cmd() -> Command {
    Command::cargo_bin("tutor-factory").unwrap()
}

/// Command isolated to a temporary data directory with no API keys
fn isolated_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = tutor_cmd();
    cmd.env("TUTOR_DATA_DIR", data_dir.path())
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("TUTOR_ANTHROPIC_API_KEY")
        .env_remove("TUTOR_CONFIG");
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    tutor_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tutor Factory"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("lesson"))
        .stdout(predicate::str::contains("preset"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    tutor_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tutor-factory"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"));
}

#[test]
fn test_version_reports_model_and_presets() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .env("TUTOR_MODEL", "claude-from-env")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Model:          claude-from-env"))
        .stdout(predicate::str::contains("biology-doctor"));
}

#[test]
fn test_short_version_flag() {
    tutor_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tutor-factory"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_sections() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[app]"))
        .stdout(predicate::str::contains("[anthropic]"))
        .stdout(predicate::str::contains("[limits]"))
        .stdout(predicate::str::contains("[storage]"));
}

#[test]
fn test_config_show_masks_api_key() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .env("TUTOR_ANTHROPIC_API_KEY", "sk-secret-value")
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("sk-secret-value").not())
        .stdout(predicate::str::contains("********"));
}

#[test]
fn test_config_validate_fixture() {
    tutor_cmd()
        .arg("--config")
        .arg(common::valid_config_fixture())
        .arg("config")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_invalid_fixture() {
    tutor_cmd()
        .arg("--config")
        .arg(common::invalid_config_fixture())
        .arg("config")
        .arg("validate")
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E102"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    tutor_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/path/config.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found").or(predicate::str::contains("Error")));
}

#[test]
fn test_config_init_writes_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tutor.toml");

    tutor_cmd()
        .arg("config")
        .arg("init")
        .arg("--path")
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    tutor_cmd()
        .arg("config")
        .arg("init")
        .arg("--path")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ─────────────────────────────────────────────────────────────────
// Preset Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_preset_list_includes_bundled() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["preset", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("physics-professor"))
        .stdout(predicate::str::contains("chemistry-lab-assistant"))
        .stdout(predicate::str::contains("[builtin]"));
}

#[test]
fn test_preset_show_profile() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["preset", "show", "physics-professor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Physics Professor"))
        .stdout(predicate::str::contains("Humor tendency:      serious"));
}

#[test]
fn test_preset_show_unknown() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["preset", "show", "no-such-preset"])
        .assert()
        .failure()
        .code(70)
        .stderr(predicate::str::contains("E700"));
}

#[test]
fn test_preset_save_show_delete() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args([
            "preset",
            "save",
            "my-chem",
            "--from",
            "chemistry-lab-assistant",
            "--set",
            "humor_level=95",
            "--display-name",
            "Lab Buddy",
        ])
        .assert()
        .success();

    isolated_cmd(&dir)
        .args(["preset", "show", "my-chem", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"humor_level\": 95"))
        .stdout(predicate::str::contains("Lab Buddy"));

    isolated_cmd(&dir)
        .args(["preset", "delete", "my-chem"])
        .assert()
        .success();

    isolated_cmd(&dir)
        .args(["preset", "show", "my-chem"])
        .assert()
        .failure();
}

#[test]
fn test_preset_save_rejects_out_of_range_trait() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["preset", "save", "bad", "--set", "humor_level=101"])
        .assert()
        .failure()
        .code(30)
        .stderr(predicate::str::contains("traits.humor_level"));
}

#[test]
fn test_preset_delete_bundled_is_read_only() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["preset", "delete", "biology-doctor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E701"));
}

#[test]
fn test_preset_import_fixture() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["preset", "import"])
        .arg(common::fixture_path("custom_preset.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported preset 'space-explorer'"));

    isolated_cmd(&dir)
        .args(["preset", "suggest", "--subject", "earth_science"])
        .assert()
        .success()
        .stdout(predicate::str::contains("space-explorer"));
}

// ─────────────────────────────────────────────────────────────────
// Offline Prompt and Render Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_prompt_lesson_json() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args([
            "prompt",
            "--preset",
            "friendly-math-teacher",
            "--topic",
            "fractions",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fingerprint\""))
        .stdout(predicate::str::contains("fractions"));
}

#[test]
fn test_prompt_requires_request() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["prompt"])
        .assert()
        .failure()
        .code(30);
}

#[test]
fn test_prompt_with_material() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.md");
    std::fs::write(&notes, "Ohm's law: V = IR").unwrap();

    isolated_cmd(&dir)
        .args(["prompt", "--message", "explain resistance", "-m"])
        .arg(&notes)
        .assert()
        .success()
        .stdout(predicate::str::contains("### notes.md"))
        .stdout(predicate::str::contains("V = IR"));
}

#[test]
fn test_prompt_rejects_pdf() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("paper.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").unwrap();

    isolated_cmd(&dir)
        .args(["prompt", "--message", "hi", "-m"])
        .arg(&pdf)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E301"));
}

#[test]
fn test_render_plain_fixture() {
    tutor_cmd()
        .args(["render", "--plain", "--file"])
        .arg(common::fixture_path("lesson_response.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("(( inertia ))"))
        .stdout(predicate::str::contains("[red]").not());
}

#[test]
fn test_render_json_from_stdin() {
    tutor_cmd()
        .args(["render", "--json"])
        .write_stdin("Force is [blue]F = ma[/blue]")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"color\": \"blue\""))
        .stdout(predicate::str::contains("\"plain_text\": \"Force is F = ma\""));
}

// ─────────────────────────────────────────────────────────────────
// Tutor Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_tutor_create_list_delete() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "Mitochondria make ATP.").unwrap();

    let output = isolated_cmd(&dir)
        .args(["tutor", "create", "--preset", "biology-doctor", "-m"])
        .arg(&notes)
        .output()
        .unwrap();
    assert!(output.status.success());
    let id = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert_eq!(id.len(), 36);

    isolated_cmd(&dir)
        .args(["tutor", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("1 file(s)"));

    isolated_cmd(&dir)
        .args(["tutor", "show", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("notes.txt"));

    isolated_cmd(&dir)
        .args(["tutor", "delete", &id])
        .assert()
        .success();

    isolated_cmd(&dir)
        .args(["tutor", "show", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E702"));
}

// ─────────────────────────────────────────────────────────────────
// Network Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_lesson_without_api_key() {
    let dir = TempDir::new().unwrap();
    isolated_cmd(&dir)
        .args(["-q", "lesson", "gravity"])
        .assert()
        .failure()
        .code(60)
        .stderr(predicate::str::contains("no API key configured"));
}

// ─────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_command() {
    tutor_cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    tutor_cmd().assert().failure();
}

#[test]
fn test_verbose_flags() {
    tutor_cmd().arg("-v").arg("version").assert().success();
    tutor_cmd().arg("-vv").arg("version").assert().success();
    tutor_cmd().arg("--quiet").arg("version").assert().success();
}
