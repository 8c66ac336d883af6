//! Integration test harness
//!
//! End-to-end tests across personas, prompt compilation, sessions with a
//! mock client, the blackboard and persistence.

mod common;

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tutor_factory::blackboard::{ChalkColor, ResponseParser};
use tutor_factory::client::{MockClient, MockConfig};
use tutor_factory::error::{Error, UpstreamKind};
use tutor_factory::materials::{ReferenceMaterial, UploadLimits};
use tutor_factory::persona::{EducationLevel, PersonaConfig, Subject, Trait};
use tutor_factory::prompt::{PromptCompiler, PromptSettings, TurnRequest};
use tutor_factory::session::{Role, SessionContext, SessionSettings};
use tutor_factory::speech::speech_text;
use tutor_factory::storage::{PresetStore, TutorStore};

// ─────────────────────────────────────────────────────────────────
// Test Fixtures
// ─────────────────────────────────────────────────────────────────

/// Temporary data directory with a config pointing at it
pub struct TestEnvironment {
    pub root: TempDir,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let data_dir = root.path().join("data");
        let config_path = root.path().join("config.toml");
        fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        let config = format!(
            r#"
[app]
max_history = 4
max_saved_tutors = 3

[logging]
level = "debug"
file = "{}"

[storage]
data_dir = "{}"
"#,
            root.path().join("logs").join("test.log").display(),
            data_dir.display()
        );
        fs::write(&config_path, config).expect("Failed to write config");

        Self {
            root,
            config_path,
            data_dir,
        }
    }

    pub fn config(&self) -> &str {
        self.config_path.to_str().unwrap()
    }

    /// Command configured with this environment
    pub fn tutor_cmd(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("tutor-factory").unwrap();
        cmd.arg("--config")
            .arg(self.config())
            .env_remove("TUTOR_DATA_DIR");
        cmd
    }

    pub fn presets(&self) -> PresetStore {
        PresetStore::open(self.data_dir.join("presets.json")).unwrap()
    }

    pub fn write_material(&self, name: &str, text: &str) -> PathBuf {
        let path = self.root.path().join(name);
        fs::write(&path, text).expect("Failed to write material");
        path
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

fn physics_professor() -> PersonaConfig {
    PresetStore::open(TempDir::new().unwrap().path().join("p.json"))
        .unwrap()
        .load("physics-professor")
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────
// Prompt Compilation
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_compilation_is_deterministic() {
    let persona = physics_professor();
    let compiler = PromptCompiler::new(PromptSettings::default());
    let request = TurnRequest::Message("What is momentum?".to_string());

    let a = compiler.compile(&persona, &[], &[], &request).unwrap();
    let b = compiler.compile(&persona, &[], &[], &request).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.fingerprint.len(), 64);
}

#[test]
fn test_humor_band_changes_prompt() {
    let compiler = PromptCompiler::new(PromptSettings::default());
    let request = TurnRequest::Message("hi".to_string());

    let serious = PersonaConfig::builder("T")
        .trait_value(Trait::HumorLevel, 10)
        .build()
        .unwrap();
    let funny = serious
        .to_builder()
        .trait_value(Trait::HumorLevel, 90)
        .build()
        .unwrap();

    let a = compiler.compile(&serious, &[], &[], &request).unwrap();
    let b = compiler.compile(&funny, &[], &[], &request).unwrap();
    assert_ne!(a.fingerprint, b.fingerprint);
    assert!(a.system_prompt.contains("avoid jokes"));
    assert!(b.system_prompt.contains("frequent light humor"));
}

#[test]
fn test_bundled_personas_compile() {
    let dir = TempDir::new().unwrap();
    let store = PresetStore::open(dir.path().join("presets.json")).unwrap();
    let compiler = PromptCompiler::default();

    for preset in store.list().unwrap() {
        let persona = store.load(&preset.name).unwrap();
        let prompt = compiler
            .compile(
                &persona,
                &[],
                &[],
                &TurnRequest::Lesson {
                    topic: "energy".to_string(),
                },
            )
            .unwrap();
        assert!(prompt.system_prompt.contains(persona.name()));
        assert!(prompt.user_turn.contains("energy"));
    }
}

// ─────────────────────────────────────────────────────────────────
// Sessions with a Mock Client
// ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_multi_turn_session() {
    let client = MockClient::with_responses([
        "Momentum is [red]p = mv[/red].",
        "Yes, [circle]mass[/circle] matters too.",
    ]);
    let mut session = SessionContext::new(physics_professor(), SessionSettings::default());

    session
        .take_turn(&client, TurnRequest::Message("What is momentum?".into()))
        .await
        .unwrap();
    session
        .take_turn(&client, TurnRequest::Message("Does mass matter?".into()))
        .await
        .unwrap();

    let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Tutor, Role::User, Role::Tutor]);

    let second_user_turn = client.last_user_turn().unwrap();
    assert!(second_user_turn.contains("What is momentum?"));
    assert!(second_user_turn.contains("Momentum is p = mv."));
    assert!(second_user_turn.ends_with("Student: Does mass matter?"));

    let circled: Vec<_> = session
        .blackboard()
        .segments()
        .iter()
        .filter(|s| s.style.circled)
        .collect();
    assert_eq!(circled.len(), 1);
    assert_eq!(circled[0].text, "mass");
}

#[tokio::test]
async fn test_history_window_limits_transcript() {
    let client = MockClient::new();
    let mut settings = SessionSettings::default();
    settings.prompt.max_history = 2;
    let mut session = SessionContext::new(physics_professor(), settings);

    for i in 0..4 {
        session
            .take_turn(&client, TurnRequest::Message(format!("question {i}")))
            .await
            .unwrap();
    }

    let last = client.last_user_turn().unwrap();
    assert!(!last.contains("question 1"));
    assert!(last.contains("question 2"));
    assert_eq!(session.history().len(), 8);
}

#[tokio::test]
async fn test_streaming_session_with_small_chunks() {
    let reply = "Take [yellow]care[/yellow]: $$E = \\frac{1}{2}mv^2$$ [u]always[/u]";
    let client = MockClient::with_config(MockConfig {
        fixed_response: Some(reply.to_string()),
        chunk_size: 1,
        ..Default::default()
    });
    let mut session = SessionContext::new(physics_professor(), SessionSettings::default());

    let mut count = 0;
    let outcome = session
        .take_turn_streaming(&client, TurnRequest::Message("x".into()), |_| {
            count += 1;
            true
        })
        .await
        .unwrap();

    let expected = ResponseParser::parse(reply, 16).unwrap();
    assert_eq!(session.blackboard().segments(), expected.segments.as_slice());
    assert_eq!(count, expected.segments.len());
    assert_eq!(outcome.plain_text, expected.plain_text);
    assert_eq!(
        session.blackboard().segments()[1].style.color,
        Some(ChalkColor::Yellow)
    );
}

#[tokio::test]
async fn test_rate_limit_leaves_session_untouched() {
    let client = MockClient::failing(UpstreamKind::RateLimited);
    let mut session = SessionContext::new(physics_professor(), SessionSettings::default());

    let err = session
        .take_turn(&client, TurnRequest::Message("hi".into()))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, Error::Upstream { .. }));
    assert!(session.history().is_empty());
    assert!(session.blackboard().is_empty());
}

#[tokio::test]
async fn test_reference_material_reaches_system_prompt() {
    let client = MockClient::new();
    let material = ReferenceMaterial::from_upload(
        "syllabus.md",
        "Week 1: kinematics".as_bytes(),
        Some("text/markdown"),
        &UploadLimits::default(),
    )
    .unwrap();
    let mut session = SessionContext::with_materials(
        physics_professor(),
        vec![material],
        SessionSettings::default(),
    )
    .unwrap();

    session
        .take_turn(&client, TurnRequest::Message("what's first?".into()))
        .await
        .unwrap();

    let system = client.last_system_prompt().unwrap();
    assert!(system.contains("### syllabus.md"));
    assert!(system.contains("Week 1: kinematics"));
}

// ─────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_preset_round_trip_through_file() {
    let env = TestEnvironment::new();
    let persona = PersonaConfig::builder("Dr. Ray")
        .subject(Subject::Medicine)
        .level(EducationLevel::Graduate)
        .trait_value(Trait::SafetyEmphasis, 100)
        .trait_value(Trait::HumorLevel, 0)
        .build()
        .unwrap();

    env.presets().save("clinic", "ward rounds", persona.clone()).unwrap();
    assert_eq!(env.presets().load("clinic").unwrap(), persona);

    let exported = env.presets().export("clinic").unwrap();
    let other = TestEnvironment::new();
    other.presets().import(&exported).unwrap();
    assert_eq!(other.presets().load("clinic").unwrap(), persona);
}

#[test]
fn test_import_fixture_validates() {
    let env = TestEnvironment::new();
    let mut presets = env.presets();
    let name = presets
        .import_file(&common::fixture_path("custom_preset.json"))
        .unwrap();
    let persona = presets.load(&name).unwrap();
    assert_eq!(persona.subject(), Subject::EarthScience);
    assert_eq!(persona.profile().humor_tendency, "humorous");
}

#[test]
fn test_corrupted_preset_file() {
    let env = TestEnvironment::new();
    fs::write(env.data_dir.join("presets.json"), "[1, 2").unwrap();
    assert!(matches!(
        PresetStore::open(env.data_dir.join("presets.json")),
        Err(Error::StorageCorrupted { .. })
    ));
}

#[test]
fn test_saved_tutor_restores_session() {
    let env = TestEnvironment::new();
    let path = env.data_dir.join("tutors.json");
    let material = ReferenceMaterial::from_upload(
        "lab.txt",
        b"Wear goggles.",
        None,
        &UploadLimits::default(),
    )
    .unwrap();

    let id = {
        let mut store = TutorStore::open(&path, 3).unwrap();
        store
            .create(physics_professor(), vec![material])
            .unwrap()
            .id
    };

    let store = TutorStore::open(&path, 3).unwrap();
    let record = store.get(&id.to_string()).unwrap();
    let session = SessionContext::with_materials(
        record.persona.clone(),
        record.materials.clone(),
        SessionSettings::default(),
    )
    .unwrap();
    assert_eq!(session.materials().len(), 1);
    assert_eq!(session.persona().name(), "Physics Professor");
}

// ─────────────────────────────────────────────────────────────────
// Speech Text
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_lesson_fixture_speech_text() {
    let raw = fs::read_to_string(common::fixture_path("lesson_response.txt")).unwrap();
    let text = speech_text(&raw, 16);
    assert!(text.starts_with("Newton's First Law Today we meet inertia"));
    assert!(!text.contains('['));
    assert!(!text.contains("  "));
}

// ─────────────────────────────────────────────────────────────────
// End-to-End CLI
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_cli_tutor_workflow() {
    let env = TestEnvironment::new();
    let notes = env.write_material("notes.md", "# Optics\nLight bends.");

    let output = env
        .tutor_cmd()
        .args(["tutor", "create", "--preset", "physics-professor", "-m"])
        .arg(&notes)
        .output()
        .unwrap();
    assert!(output.status.success());
    let id = String::from_utf8(output.stdout).unwrap().trim().to_string();

    env.tutor_cmd()
        .args(["prompt", "--tutor", &id, "--message", "why does light bend?"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Light bends."));

    assert!(env.data_dir.join("tutors.json").exists());
}
