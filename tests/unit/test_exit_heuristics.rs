//! Unit tests for heuristic exit-code resolution
//!
//! When a host cannot report an exit code, the history ledger falls back
//! to scanning captured output for failure text. These tests pin down
//! which shapes of output count as failures.

use shellgate::history::{heuristic_exit_code, output_indicates_failure};

#[cfg(test)]
mod failure_detection_tests {
    use super::*;

    #[test]
    fn test_command_not_found_is_failure() {
        assert!(output_indicates_failure("bash: foobar: command not found\n"));
        assert!(output_indicates_failure(
            "'foobar' is not recognized as an internal or external command\n"
        ));
    }

    #[test]
    fn test_permission_errors_are_failures() {
        assert!(output_indicates_failure(
            "cat: /etc/shadow: Permission denied\n"
        ));
        assert!(output_indicates_failure("Access denied.\n"));
    }

    #[test]
    fn test_missing_file_errors_are_failures() {
        assert!(output_indicates_failure(
            "ls: cannot access 'nope': No such file or directory\n"
        ));
        assert!(output_indicates_failure("File not found\n"));
    }

    #[test]
    fn test_generic_error_markers_are_failures() {
        assert!(output_indicates_failure("error: expected expression\n"));
        assert!(output_indicates_failure("Build failed after 2.3s\n"));
        assert!(output_indicates_failure("unable to resolve host\n"));
    }

    #[test]
    fn test_detection_is_case_insensitive() {
        assert!(output_indicates_failure("COMMAND NOT FOUND"));
        assert!(output_indicates_failure("Permission Denied"));
        assert!(output_indicates_failure("ERROR: out of memory"));
    }

    #[test]
    fn test_marker_buried_in_long_output_is_found() {
        let mut output = "compiling...\n".repeat(200);
        output.push_str("linker error: undefined symbol\n");
        output.push_str("done\n");
        assert!(output_indicates_failure(&output));
    }

    #[test]
    fn test_clean_output_is_not_failure() {
        assert!(!output_indicates_failure("total 16\ndrwxr-xr-x  4 user\n"));
        assert!(!output_indicates_failure("hello world\n"));
        assert!(!output_indicates_failure(""));
    }

    #[test]
    fn test_success_wording_is_not_failure() {
        assert!(!output_indicates_failure("All 42 tests passed\n"));
        assert!(!output_indicates_failure("Successfully installed 3 packages\n"));
    }
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;

    #[test]
    fn test_failure_text_maps_to_one() {
        assert_eq!(heuristic_exit_code("zsh: command not found: foo\n"), 1);
        assert_eq!(heuristic_exit_code("fatal error: something broke"), 1);
    }

    #[test]
    fn test_clean_output_maps_to_zero() {
        assert_eq!(heuristic_exit_code("ok\n"), 0);
        assert_eq!(heuristic_exit_code(""), 0);
    }

    #[test]
    fn test_quoted_error_text_still_reads_as_failure() {
        // `grep error: log.txt` echoes "error:" on success; the scan
        // cannot tell the difference
        assert_eq!(heuristic_exit_code("searching for error: in log.txt"), 1);
    }
}
