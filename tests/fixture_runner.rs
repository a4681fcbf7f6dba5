use lox::session::run_source;
use std::fs;
use std::path::Path;

/// Each fixture is a directory holding `main.lox`, the expected `stdout.txt`
/// and, for failing programs, the expected `stderr.txt`.
#[test]
fn run_fixtures() {
    let fixtures_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    assert!(fixtures_dir.exists(), "Fixtures directory not found at {:?}", fixtures_dir);

    let mut count = 0;
    let mut failures = Vec::new();
    run_fixtures_in_dir(&fixtures_dir, &mut count, &mut failures);
    eprintln!("Fixture run complete. Processed {} tests.", count);

    assert!(count > 0, "No fixtures found");
    assert!(failures.is_empty(), "Failing fixtures:\n{}", failures.join("\n"));
}

fn run_fixtures_in_dir(dir: &Path, count: &mut usize, failures: &mut Vec<String>) {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .expect("Failed to read fixtures directory")
        .map(|entry| entry.expect("Failed to read entry").path())
        .collect();
    entries.sort();

    for path in entries {
        if !path.is_dir() {
            continue;
        }
        if path.join("main.lox").exists() {
            *count += 1;
            if let Err(message) = run_test_case(&path) {
                failures.push(message);
            }
        } else {
            run_fixtures_in_dir(&path, count, failures);
        }
    }
}

fn run_test_case(test_dir: &Path) -> Result<(), String> {
    let test_name = test_dir.file_name().unwrap().to_string_lossy();

    let source = fs::read_to_string(test_dir.join("main.lox")).expect("Failed to read main.lox");
    let expected_stdout =
        fs::read_to_string(test_dir.join("stdout.txt")).expect("Failed to read stdout.txt");
    let expected_stderr = fs::read_to_string(test_dir.join("stderr.txt")).unwrap_or_default();

    let outcome = run_source(&source);
    let actual_stderr = outcome.rendered_errors();

    if outcome.output != expected_stdout {
        return Err(format!(
            "{}: stdout mismatch\n  expected: {:?}\n  actual:   {:?}",
            test_name, expected_stdout, outcome.output
        ));
    }
    if actual_stderr != expected_stderr {
        return Err(format!(
            "{}: stderr mismatch\n  expected: {:?}\n  actual:   {:?}",
            test_name, expected_stderr, actual_stderr
        ));
    }
    Ok(())
}
