use std::io;

/// Line-oriented user interaction used by the login flow.
pub trait Console {
    /// Print one line of output.
    fn say(&mut self, line: &str);

    /// Prompt and read one line. The trailing newline is removed.
    fn ask(&mut self, prompt: &str) -> io::Result<String>;

    /// Prompt and read one line without echoing it.
    fn ask_secret(&mut self, prompt: &str) -> io::Result<String>;
}

/// Accepts `yes` or `y` in any case.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "yes" | "y")
}
