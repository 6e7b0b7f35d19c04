//! Shared fixtures: a tiny "hello" language whose compiler is a shell script.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use kiln_lib::Formula;
use kiln_lib::config::RunConfig;
use kiln_lib::env::SearchPathLocator;
use kiln_lib::execute::actions::{CommandOutput, CommandRunner, Invocation, ProcessRunner, RunError};
use kiln_lib::orchestrator::Orchestrator;
use tempfile::TempDir;

pub const SEARCH_PATH: &str = "/usr/bin:/bin";

/// `hello --version` prints its version; `hello SRC -o OUT` turns a
/// `print '<text>'` line into an executable that echoes `<text>`.
pub const COMPILER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "hello version 1.0"
  exit 0
fi
text=$(sed -n "s/^print '\(.*\)'\$/\1/p" "$1")
printf '#!/bin/sh\necho "%s"\n' "$text" > "$3"
chmod +x "$3"
"#;

pub const HELLO_FORMULA: &str = r#"{
  "name": "hello",
  "desc": "Compiler for the hello language",
  "version": "1.0",
  "sha256": "0000000000000000000000000000000000000000000000000000000000000000",
  "build": [
    { "exec": { "bin": "/bin/sh", "args": ["-c", "cp src/hello.sh hello && chmod +x hello"] } },
    { "cd": { "dir": "runtime", "steps": [
      { "exec": { "bin": "/bin/sh", "args": ["-c", "printf 'runtime\\n' > libhello.a"] } }
    ] } }
  ],
  "install": [
    { "copy": { "from": "hello", "to": "bin" } },
    { "copy": { "from": "runtime/libhello.a", "to": "lib" } },
    { "copy": { "from": "doc/hello.1", "to": "man1" } },
    { "copy": { "from": "examples/*.hl", "to": "doc" } }
  ],
  "test": [
    { "run": { "bin": "hello", "args": ["--version"] } },
    { "assert": { "contains": "hello version" } },
    { "write": { "path": "hello.hl", "content": "print 'Hello, World!'\n" } },
    { "run": { "bin": "hello", "args": ["hello.hl", "-o", "hello"] } },
    { "run": { "bin": "./hello" } },
    { "assert": { "equals": "Hello, World!" } }
  ]
}"#;

pub fn formula(json: &str) -> Formula {
  Formula::from_json_str(json, Path::new("hello.json")).unwrap()
}

/// Isolated source tree, prefix and work directory.
pub struct Workspace {
  pub temp: TempDir,
}

impl Workspace {
  pub fn new() -> Self {
    let ws = Self {
      temp: TempDir::new().unwrap(),
    };
    let source = ws.source();
    for (path, content) in [
      ("src/hello.sh", COMPILER),
      ("runtime/.keep", ""),
      ("doc/hello.1", ".TH HELLO 1\n"),
      ("examples/greet.hl", "print 'hi'\n"),
      ("examples/bye.hl", "print 'bye'\n"),
    ] {
      let path = source.join(path);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(path, content).unwrap();
    }
    ws
  }

  pub fn source(&self) -> PathBuf {
    self.temp.path().join("source")
  }

  pub fn prefix(&self) -> PathBuf {
    self.temp.path().join("prefix")
  }

  pub fn work_dir(&self) -> PathBuf {
    self.temp.path().join("work")
  }

  pub fn config(&self) -> RunConfig {
    RunConfig {
      prefix: self.prefix(),
      work_dir: self.work_dir(),
      search_path: SEARCH_PATH.to_string(),
      ..Default::default()
    }
  }

  pub fn orchestrator(&self) -> Orchestrator<CountingRunner, SearchPathLocator> {
    let config = self.config();
    Orchestrator::new(CountingRunner::default(), config.locator(), config)
  }
}

/// Spawns real processes and counts them.
#[derive(Debug, Default)]
pub struct CountingRunner {
  inner: ProcessRunner,
  count: AtomicUsize,
}

impl CountingRunner {
  pub fn invocations(&self) -> usize {
    self.count.load(Ordering::SeqCst)
  }
}

impl CommandRunner for CountingRunner {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput, RunError>> + Send {
    self.count.fetch_add(1, Ordering::SeqCst);
    self.inner.run(invocation)
  }
}
