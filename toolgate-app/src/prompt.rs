use std::io::{self, Write};

use serde_json::{Map, Value};
use toolgate_interfaces::FallbackPrompt;
use toolgate_protocol::Decision;

/// Blocking terminal prompt, the fallback when no front-end dialog is
/// registered. Surfaces the file path and command inputs prominently since
/// those are what an operator actually weighs.
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }

    fn decide(line: &str) -> i64 {
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => Decision::Allow.code(),
            "a" | "always" => Decision::AllowAlways.code(),
            _ => Decision::Deny.code(),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackPrompt for TerminalPrompt {
    fn prompt(&self, tool_name: &str, inputs: &Map<String, Value>) -> i64 {
        println!("\nPermission request");
        println!("Tool: {}", tool_name);
        if let Some(path) = inputs.get("file_path").and_then(Value::as_str) {
            println!("File: {}", path);
        }
        if let Some(command) = inputs.get("command").and_then(Value::as_str) {
            println!("Command: {}", command);
        }
        print!("Allow? [y]es / [a]lways / [N]o: ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return Decision::Deny.code();
        }
        Self::decide(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_answers() {
        assert_eq!(TerminalPrompt::decide("y\n"), Decision::Allow.code());
        assert_eq!(TerminalPrompt::decide("YES\n"), Decision::Allow.code());
        assert_eq!(TerminalPrompt::decide("a\n"), Decision::AllowAlways.code());
        assert_eq!(TerminalPrompt::decide("n\n"), Decision::Deny.code());
        assert_eq!(TerminalPrompt::decide("\n"), Decision::Deny.code());
        assert_eq!(TerminalPrompt::decide("whatever"), Decision::Deny.code());
    }
}
