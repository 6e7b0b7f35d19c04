use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn install_builds_installs_and_tests() {
  let env = TestEnv::hello();

  env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed hello 1.0"))
    .stdout(predicate::str::contains("3 runs, 2 assertions passed"));

  assert!(env.prefix_path().join("bin/hello").is_file());
  assert!(env.prefix_path().join("share/doc/hello/greet.hl").is_file());
  assert!(env.prefix_path().join(".kiln/receipts/hello.json").is_file());
}

#[test]
fn prefix_flag_overrides_environment() {
  let env = TestEnv::hello();
  let other = env.temp.path().join("elsewhere");

  env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .arg("--prefix")
    .arg(&other)
    .arg("--no-test")
    .assert()
    .success()
    .stdout(predicate::str::contains("skipped"));

  assert!(other.join("bin/hello").is_file());
  assert!(!env.prefix_path().join("bin").exists());
}

#[test]
fn install_json_output() {
  let env = TestEnv::hello();

  let output = env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .arg("-o")
    .arg("json")
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["name"], "hello");
  assert_eq!(json["build_steps"][2]["index"], "2.1");
  assert_eq!(json["build_steps"][2]["state"], "succeeded");
  assert_eq!(json["test"]["runs"], 3);
}

#[test]
fn keep_build_retains_build_dir() {
  let env = TestEnv::hello();

  env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .arg("--keep-build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Build directory kept"));

  assert!(env.work_path().join("hello-1.0/hello").is_file());
}

#[test]
fn failed_test_exits_nonzero_with_stage() {
  let env = TestEnv::hello();
  let formula = std::fs::read_to_string(env.formula_path())
    .unwrap()
    .replace(r#""equals": "Hello, World!""#, r#""equals": "Hello, Worlld!""#);
  env.write_file("formula/hello.json", &formula);

  env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .assert()
    .code(1)
    .stderr(predicate::str::contains("test stage failed"))
    .stderr(predicate::str::contains("Hello, Worlld!"));
}

#[test]
fn missing_source_is_environment_failure() {
  let env = TestEnv::hello();

  env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.temp.path().join("nope"))
    .assert()
    .code(1)
    .stderr(predicate::str::contains("environment stage failed"));
}

#[test]
fn test_command_reruns_recipe() {
  let env = TestEnv::hello();

  env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .arg("--no-test")
    .assert()
    .success();

  env
    .kiln()
    .arg("test")
    .arg(env.formula_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("hello 1.0: 3 runs, 2 assertions passed"));
}

#[test]
fn test_command_requires_install() {
  let env = TestEnv::hello();

  env
    .kiln()
    .arg("test")
    .arg(env.formula_path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("hello is not installed"));
}

#[test]
fn env_prints_build_environment() {
  let env = TestEnv::hello();

  env
    .kiln()
    .arg("env")
    .arg(env.formula_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("KILN_NAME=hello"))
    .stdout(predicate::str::contains("SOURCE_DATE_EPOCH=315532800"));

  assert!(!env.work_path().exists());
}

#[test]
fn build_copy_lands_in_prefix_and_receipt() {
  let env = TestEnv::hello();
  env.write_file("formula/stage.json", &super::common::fixture_content("build_copy.json"));
  env.write_file("stage-src/.keep", "");

  env
    .kiln()
    .arg("install")
    .arg(env.temp.path().join("formula/stage.json"))
    .arg("--source")
    .arg(env.temp.path().join("stage-src"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed stage 1.0"));

  assert!(env.prefix_path().join("bin/stage").is_file());
  let receipt = std::fs::read_to_string(env.prefix_path().join(".kiln/receipts/stage.json")).unwrap();
  let receipt: serde_json::Value = serde_json::from_str(&receipt).unwrap();
  assert_eq!(receipt["files"][0]["path"], "bin/stage");
}

#[test]
fn failed_build_json_carries_stderr() {
  let env = TestEnv::hello();
  let formula = std::fs::read_to_string(env.formula_path())
    .unwrap()
    .replace("cp src/hello.sh hello && chmod +x hello", "echo 'hello.sh: syntax error' >&2; exit 3");
  env.write_file("formula/hello.json", &formula);

  let output = env
    .kiln()
    .arg("install")
    .arg(env.formula_path())
    .arg("--source")
    .arg(env.source_path())
    .arg("-o")
    .arg("json")
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(1));

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["stage"], "build");
  assert_eq!(json["stderr"], "hello.sh: syntax error\n");
  assert_eq!(json["steps"][0]["state"], "failed");
}
