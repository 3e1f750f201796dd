use std::io::Write;
use std::process::{Command, Stdio};

use pretty_assertions::assert_eq;
use serial_test::serial;

struct Outcome {
    stdout: String,
    stderr: String,
    status: i32,
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Outcome {
    let mut child = Command::new(env!("CARGO_BIN_EXE_plush"))
        .args(args)
        .env_remove("PLUSH_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn plush");
    child
        .stdin
        .take()
        .expect("stdin pipe")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait for plush");
    Outcome {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(-1),
    }
}

fn run(command: &str) -> Outcome {
    run_with_stdin(&["-c", command], "")
}

macro_rules! output_test {
    ($name:ident, $cmd:expr, $expected:expr) => {
        #[test]
        fn $name() {
            let outcome = run($cmd);
            assert_eq!(outcome.stdout, $expected, "command: {}", $cmd);
        }
    };
}

macro_rules! status_test {
    ($name:ident, $cmd:expr, $status:expr) => {
        #[test]
        fn $name() {
            assert_eq!(run($cmd).status, $status, "command: {}", $cmd);
        }
    };
}

// ── Expansion ──

output_test!(brace_expansion, "echo a{b,c}", "ab ac\n");
output_test!(brace_range, "echo {1..3}", "1 2 3\n");
output_test!(arithmetic_expansion, "X=3; echo $((X+2))", "5\n");
output_test!(command_substitution, "echo \"[$(echo inner)]\"", "[inner]\n");
output_test!(default_value, "unset U; echo ${U:-fallback}", "fallback\n");
output_test!(suffix_removal, "F=archive.tar.gz; echo ${F%%.*} ${F#*.}", "archive tar.gz\n");
output_test!(field_splitting, "V='a  b'; for w in $V; do echo \"<$w>\"; done", "<a>\n<b>\n");
output_test!(quoted_no_split, "V='a  b'; echo \"$V\"", "a  b\n");
output_test!(array_elements, "A=(x y z); echo ${A[1]} ${#A[@]}", "y 3\n");

// ── Control flow ──

output_test!(
    case_fall_through,
    "case a in a) echo one ;& b) echo two ;; c) echo three ;; esac",
    "one\ntwo\n"
);
output_test!(
    break_two_levels,
    "for i in 1 2; do for j in 1 2; do break 2; done; echo no; done; echo out",
    "out\n"
);
output_test!(
    function_with_local,
    "V=outer; f() { local V=inner; echo $V; }; f; echo $V",
    "inner\nouter\n"
);
output_test!(
    substring_huge_offset,
    "x=abc; echo \"[${x:9223372036854775807:9223372036854775807}]\"",
    "[]\n"
);
output_test!(
    case_in_command_substitution,
    "x=$(case a in a) echo yes;; esac); echo $x",
    "yes\n"
);
output_test!(empty_array_assignment, "arr=(x); arr=(); echo ${#arr[@]}", "0\n");
output_test!(and_or_chain, "false && echo no || echo yes", "yes\n");
output_test!(conditional_pattern, "[[ hello == h*o ]] && echo match", "match\n");

// ── Status ──

status_test!(exit_status, "exit 7", 7);
status_test!(syntax_error, "if true", 2);
status_test!(errexit_stops, "set -e; false; exit 9", 1);

#[test]
fn command_not_found() {
    let outcome = run("no_such_command_plush_test");
    assert_eq!(outcome.status, 127);
    assert!(outcome.stderr.contains("command not found"), "stderr: {}", outcome.stderr);
}

output_test!(pipefail_off, "false | true; echo $?", "0\n");
output_test!(pipefail_on, "set -o pipefail; false | true; echo $?", "1\n");
output_test!(pipe_status, "true | false | true; echo ${PIPESTATUS[@]}", "0 1 0\n");

// ── Processes ──

#[test]
#[serial]
fn background_job_and_wait() {
    let outcome = run("echo bg & wait; echo fg");
    assert_eq!(outcome.stdout, "bg\nfg\n");
    assert_eq!(outcome.status, 0);
}

output_test!(subshell_isolation, "X=1; (X=2); echo $X", "1\n");
output_test!(external_pipeline, "echo piped | cat", "piped\n");
output_test!(exit_trap, "trap 'echo bye' EXIT; echo hi", "hi\nbye\n");

#[test]
#[serial]
fn redirection_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("out.txt");
    let command = format!("echo saved > {0}; echo more >> {0}; cat < {0}", file.display());
    assert_eq!(run(&command).stdout, "saved\nmore\n");
}

// ── Input modes ──

#[test]
fn command_positional_parameters() {
    let outcome = run_with_stdin(&["-c", "echo $0 $1 $#", "name", "x", "y"], "");
    assert_eq!(outcome.stdout, "name x 2\n");
}

#[test]
#[serial]
fn script_file_with_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("greet.sh");
    std::fs::write(
        &script,
        "greet() {\n  echo \"hello $1\"\n}\nfor name in \"$@\"; do\n  greet \"$name\"\ndone\nexit 3\n",
    )
    .unwrap();
    let path = script.display().to_string();
    let outcome = run_with_stdin(&[path.as_str(), "ann", "bo"], "");
    assert_eq!(outcome.stdout, "hello ann\nhello bo\n");
    assert_eq!(outcome.status, 3);
}

#[test]
fn commands_from_stdin() {
    let outcome = run_with_stdin(&[], "X=4\nif [[ $X -gt 3 ]]; then\n  echo big\nfi\nexit 5\necho unreachable\n");
    assert_eq!(outcome.stdout, "big\n");
    assert_eq!(outcome.status, 5);
}

#[test]
fn here_document_from_stdin() {
    let outcome = run_with_stdin(&[], "NAME=world\ncat <<EOF\nhello $NAME\nEOF\n");
    assert_eq!(outcome.stdout, "hello world\n");
}

#[test]
fn alias_cycle_is_reported() {
    let outcome = run_with_stdin(&[], "alias a=b b=a\na\necho after\n");
    assert_eq!(outcome.stdout, "after\n");
    assert!(outcome.stderr.contains("expands recursively"), "stderr: {}", outcome.stderr);
}

#[test]
fn unknown_option_is_rejected() {
    let outcome = run_with_stdin(&["-o", "bogus", "-c", "true"], "");
    assert_eq!(outcome.status, 2);
    assert!(outcome.stderr.contains("bogus"));
}
