//! End-to-end runs of the hello formula.

use kiln_lib::env::EnvError;
use kiln_lib::execute::{StepError, StepIndex, StepState};
use kiln_lib::install::{InstallError, InstallPrefix, Receipt};
use kiln_lib::platform::HostFacts;
use kiln_lib::verify::VerifyError;
use kiln_lib::{ExecutionResult, KilnError, Stage};

use super::common::{HELLO_FORMULA, Workspace, formula};

fn host() -> HostFacts {
  HostFacts::new("linux", "x86_64")
}

#[tokio::test]
async fn installs_and_verifies_hello() {
  let ws = Workspace::new();
  let orchestrator = ws.orchestrator();

  let summary = orchestrator
    .run(&formula(HELLO_FORMULA), &host(), &ws.source(), true)
    .await
    .into_result()
    .unwrap();

  let prefix = ws.prefix();
  assert!(prefix.join("bin/hello").is_file());
  assert!(prefix.join("lib/libhello.a").is_file());
  assert!(prefix.join("share/man/man1/hello.1").is_file());
  assert!(prefix.join("share/doc/hello/greet.hl").is_file());
  assert!(prefix.join("share/doc/hello/bye.hl").is_file());

  let test = summary.test.unwrap();
  assert_eq!(test.runs, 3);
  assert_eq!(test.assertions, 2);
  assert!(summary.build_steps.iter().all(|r| r.state == StepState::Succeeded));
  assert_eq!(summary.build_steps[2].index, StepIndex::top(2).child(1));

  // Build and test directories are gone after a clean run.
  assert_eq!(std::fs::read_dir(ws.work_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn receipt_lists_installed_files() {
  let ws = Workspace::new();
  ws.orchestrator()
    .run(&formula(HELLO_FORMULA), &host(), &ws.source(), false)
    .await
    .into_result()
    .unwrap();

  let receipt = Receipt::read(&InstallPrefix::new(ws.prefix(), "hello")).unwrap().unwrap();
  let paths: Vec<&str> = receipt.files.iter().map(|f| f.path.as_str()).collect();
  assert_eq!(
    paths,
    vec![
      "bin/hello",
      "lib/libhello.a",
      "share/doc/hello/bye.hl",
      "share/doc/hello/greet.hl",
      "share/man/man1/hello.1",
    ]
  );
  assert_eq!(receipt.version, "1.0");
}

#[tokio::test]
async fn reinstall_is_byte_identical() {
  let ws = Workspace::new();
  let orchestrator = ws.orchestrator();
  let hello = formula(HELLO_FORMULA);

  orchestrator.run(&hello, &host(), &ws.source(), false).await.into_result().unwrap();
  let receipt = std::fs::read(ws.prefix().join(".kiln/receipts/hello.json")).unwrap();
  let binary = std::fs::read(ws.prefix().join("bin/hello")).unwrap();

  orchestrator.run(&hello, &host(), &ws.source(), false).await.into_result().unwrap();
  assert_eq!(std::fs::read(ws.prefix().join(".kiln/receipts/hello.json")).unwrap(), receipt);
  assert_eq!(std::fs::read(ws.prefix().join("bin/hello")).unwrap(), binary);
}

#[tokio::test]
async fn missing_artifact_fails_install_stage() {
  let ws = Workspace::new();
  let broken = HELLO_FORMULA.replace(r#""from": "hello", "to": "bin""#, r#""from": "hello.bin", "to": "bin""#);

  let failure = ws
    .orchestrator()
    .run(&formula(&broken), &host(), &ws.source(), true)
    .await
    .into_result()
    .unwrap_err();

  assert_eq!(failure.stage, Some(Stage::Install));
  match &failure.error {
    KilnError::Install(StepError::Copy { index, source }) => {
      assert_eq!(index, &StepIndex::top(1));
      assert!(matches!(source, InstallError::MissingArtifact { pattern, .. } if pattern == "hello.bin"));
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(failure.detail().contains("hello.bin"));
  assert_eq!(failure.steps[1].state, StepState::Pending);

  // The build directory is kept for inspection, nothing reached the prefix.
  assert!(ws.work_dir().join("hello-1.0/hello").is_file());
  assert!(!ws.prefix().join("bin").exists());
}

#[tokio::test]
async fn wrong_expected_output_fails_test_stage() {
  let ws = Workspace::new();
  let broken = HELLO_FORMULA.replace(r#""equals": "Hello, World!""#, r#""equals": "Hello, Worlld!""#);

  let failure = ws
    .orchestrator()
    .run(&formula(&broken), &host(), &ws.source(), true)
    .await
    .into_result()
    .unwrap_err();

  assert_eq!(failure.stage, Some(Stage::Test));
  assert!(matches!(
    &failure.error,
    KilnError::Verification(VerifyError::Mismatch { index: 6, expected, actual, .. })
      if expected == "Hello, Worlld!" && actual == "Hello, World!"
  ));
  // The install itself stays in place.
  assert!(ws.prefix().join("bin/hello").is_file());
}

#[tokio::test]
async fn failing_build_step_halts_with_stderr() {
  let ws = Workspace::new();
  let broken = HELLO_FORMULA.replace(
    "cp src/hello.sh hello && chmod +x hello",
    "echo 'hello.sh: syntax error' >&2; exit 3",
  );

  let orchestrator = ws.orchestrator();
  let failure = orchestrator
    .run(&formula(&broken), &host(), &ws.source(), true)
    .await
    .into_result()
    .unwrap_err();

  assert_eq!(failure.stage, Some(Stage::Build));
  match &failure.error {
    KilnError::Build(StepError::Failed { index, code, stderr, .. }) => {
      assert_eq!(index, &StepIndex::top(1));
      assert_eq!(*code, Some(3));
      assert_eq!(stderr.trim_end(), "hello.sh: syntax error");
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(orchestrator.runner().invocations(), 1);
}

#[tokio::test]
async fn unsupported_architecture_launches_nothing() {
  let ws = Workspace::new();
  let orchestrator = ws.orchestrator();

  let result = orchestrator
    .run(
      &formula(HELLO_FORMULA),
      &HostFacts::new("linux", "riscv64"),
      &ws.source(),
      true,
    )
    .await;

  let ExecutionResult::Failure(failure) = result else {
    panic!("expected failure");
  };
  assert_eq!(failure.stage, Some(Stage::Environment));
  assert!(matches!(&failure.error, KilnError::UnsupportedArchitecture { cpu } if cpu == "riscv64"));
  assert_eq!(orchestrator.runner().invocations(), 0);
  assert!(!ws.work_dir().exists());
}

#[tokio::test]
async fn missing_build_dependency_is_an_environment_failure() {
  let ws = Workspace::new();
  let with_dep = HELLO_FORMULA.replace(
    r#""version": "1.0","#,
    r#""version": "1.0", "depends_on": [{ "name": "kiln-no-such-tool", "phase": "build" }],"#,
  );

  let orchestrator = ws.orchestrator();
  let failure = orchestrator
    .run(&formula(&with_dep), &host(), &ws.source(), true)
    .await
    .into_result()
    .unwrap_err();

  assert!(matches!(
    failure.error,
    KilnError::Environment(EnvError::MissingDependency { ref name }) if name == "kiln-no-such-tool"
  ));
  assert_eq!(orchestrator.runner().invocations(), 0);
}

#[tokio::test]
async fn verify_installed_reruns_tests_only() {
  let ws = Workspace::new();
  let orchestrator = ws.orchestrator();
  let hello = formula(HELLO_FORMULA);

  orchestrator.run(&hello, &host(), &ws.source(), false).await.into_result().unwrap();
  let before = orchestrator.runner().invocations();

  let report = orchestrator.verify_installed(&hello, &host()).await.unwrap().unwrap();
  assert_eq!(report.runs, 3);
  assert_eq!(orchestrator.runner().invocations() - before, 3);
}

#[tokio::test]
async fn concurrent_verifications_use_separate_directories() {
  let ws = Workspace::new();
  let orchestrator = ws.orchestrator();
  let hello = formula(HELLO_FORMULA);
  orchestrator.run(&hello, &host(), &ws.source(), false).await.into_result().unwrap();

  let host = host();
  let (a, b) = tokio::join!(
    orchestrator.verify_installed(&hello, &host),
    orchestrator.verify_installed(&hello, &host),
  );
  assert_eq!(a.unwrap().unwrap().runs, 3);
  assert_eq!(b.unwrap().unwrap().runs, 3);
  assert_eq!(std::fs::read_dir(ws.work_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_verification_keeps_its_directory() {
  let ws = Workspace::new();
  let broken = HELLO_FORMULA.replace(r#""equals": "Hello, World!""#, r#""equals": "Hello, Worlld!""#);

  ws.orchestrator()
    .run(&formula(&broken), &host(), &ws.source(), true)
    .await
    .into_result()
    .unwrap_err();

  let kept: Vec<_> = std::fs::read_dir(ws.work_dir())
    .unwrap()
    .map(|entry| entry.unwrap().path())
    .collect();
  assert_eq!(kept.len(), 1);
  let name = kept[0].file_name().unwrap().to_string_lossy().into_owned();
  assert!(name.starts_with("hello-1.0-test-"), "{name}");
  assert!(kept[0].join("hello.hl").is_file());
}

#[tokio::test]
async fn build_copy_is_recorded_in_receipt() {
  let ws = Workspace::new();
  let staged = HELLO_FORMULA.replace(
    r#"] } }
  ],"#,
    r#"] } },
    { "copy": { "from": "src/hello.sh", "to": "share/hello", "rename": "compiler.sh" } }
  ],"#,
  );

  let summary = ws
    .orchestrator()
    .run(&formula(&staged), &host(), &ws.source(), false)
    .await
    .into_result()
    .unwrap();

  assert!(ws.prefix().join("share/hello/compiler.sh").is_file());
  assert_eq!(summary.build_steps[3].state, StepState::Succeeded);
  let receipt = Receipt::read(&InstallPrefix::new(ws.prefix(), "hello")).unwrap().unwrap();
  assert!(receipt.files.iter().any(|f| f.path == "share/hello/compiler.sh"));
}
