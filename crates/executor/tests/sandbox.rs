#[cfg(test)]
mod sandbox_tests {
    use deskpilot_executor::*;
    use std::time::Duration;

    fn request(executable: &str, args: &[&str]) -> TerminalRequest {
        TerminalRequest {
            executable: executable.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_denylisted_executables_always_rejected() {
        let executor = CommandExecutor::default();
        for name in ["osascript", "xdotool", "cliclick", "/usr/bin/ydotool"] {
            for args in [vec![], vec!["--help"], vec!["-e", "display dialog \"hi\""]] {
                let result = executor.execute(&request(name, &args)).await;
                assert!(
                    matches!(result, Err(SandboxError::PolicyViolation(_))),
                    "{} {:?} was not rejected",
                    name,
                    args
                );
            }
        }
    }

    #[tokio::test]
    async fn test_ui_keywords_rejected() {
        let executor = CommandExecutor::default();
        let result = executor
            .execute(&request("python3", &["-c", "print('Mouse moved')"]))
            .await;
        assert!(matches!(result, Err(SandboxError::PolicyViolation(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_echo_hello_succeeds() {
        let executor = CommandExecutor::default();
        let output = executor.execute(&request("echo", &["hello"])).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_requested_timeout_respected() {
        let executor = CommandExecutor::default();
        let mut req = request("sleep", &["10"]);
        req.timeout = Some(Duration::from_millis(300));
        let output = executor.execute(&req).await.unwrap();
        assert!(output.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_and_stderr_drained_concurrently() {
        let executor = CommandExecutor::default();
        let script = "head -c 150000 /dev/zero | tr '\\0' o; head -c 150000 /dev/zero | tr '\\0' e >&2";
        let output = executor.execute(&request("sh", &["-c", script])).await.unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert!(output.truncated);
        assert!(output.stdout.chars().all(|c| c == 'o'));
        assert!(output.stderr.chars().all(|c| c == 'e'));
    }
}
