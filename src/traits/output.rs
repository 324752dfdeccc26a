use crate::plan::ResourceChange;

/// One captured call on `MockOutput`
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMessage {
    Success(String),
    Error(String),
    Warning(String),
    Info(String),
    Section(String),
    KeyValue(String, String),
    Dimmed(String),
    ResourceChange(String, String),
    Blank,
}

/// Where commands report progress and results. Swapped for `MockOutput` in tests.
pub trait Output: Send + Sync {
    fn success(&self, message: &str);
    /// Goes to stderr
    fn error(&self, message: &str);
    fn warning(&self, message: &str);
    fn info(&self, message: &str);
    fn section(&self, title: &str);
    fn key_value(&self, key: &str, value: &str);
    fn dimmed(&self, message: &str);
    /// One planned change, styled by its kind
    fn resource_change(&self, change: &ResourceChange);
    fn blank(&self);
}

/// Styled output on the real terminal
pub struct TerminalOutput;

impl Output for TerminalOutput {
    fn success(&self, message: &str) {
        crate::output::success(message);
    }

    fn error(&self, message: &str) {
        crate::output::error(message);
    }

    fn warning(&self, message: &str) {
        crate::output::warning(message);
    }

    fn info(&self, message: &str) {
        crate::output::info(message);
    }

    fn section(&self, title: &str) {
        crate::output::section(title);
    }

    fn key_value(&self, key: &str, value: &str) {
        crate::output::key_value(key, value);
    }

    fn dimmed(&self, message: &str) {
        crate::output::dimmed(message);
    }

    fn resource_change(&self, change: &ResourceChange) {
        crate::output::resource_change(
            change.kind(),
            &change.address,
            &change.actions.to_string(),
        );
    }

    fn blank(&self) {
        crate::output::blank();
    }
}

/// Captures everything printed so tests can assert on it
#[cfg(test)]
#[derive(Default)]
pub struct MockOutput {
    messages: std::sync::Mutex<Vec<OutputMessage>>,
}

#[cfg(test)]
impl OutputMessage {
    /// Unstyled terminal line for this message
    fn line(&self) -> String {
        match self {
            Self::Success(s) => format!("✓ {}", s),
            Self::Error(s) => format!("✗ {}", s),
            Self::Warning(s) => format!("⚠ {}", s),
            Self::Section(s) => format!("\n=== {} ===", s),
            Self::KeyValue(k, v) => format!("{}: {}", k, v),
            Self::ResourceChange(address, actions) => format!("{} {}", address, actions),
            Self::Info(s) | Self::Dimmed(s) => s.clone(),
            Self::Blank => String::new(),
        }
    }
}

#[cfg(test)]
impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_messages(&self) -> Vec<OutputMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Error lines in the order they were printed
    pub fn errors(&self) -> Vec<String> {
        self.get_messages()
            .into_iter()
            .filter_map(|m| match m {
                OutputMessage::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    pub fn to_text(&self) -> String {
        self.get_messages()
            .iter()
            .map(OutputMessage::line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&self, message: OutputMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

#[cfg(test)]
impl Output for MockOutput {
    fn success(&self, message: &str) {
        self.push(OutputMessage::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(OutputMessage::Error(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(OutputMessage::Warning(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.push(OutputMessage::Info(message.to_string()));
    }

    fn section(&self, title: &str) {
        self.push(OutputMessage::Section(title.to_string()));
    }

    fn key_value(&self, key: &str, value: &str) {
        self.push(OutputMessage::KeyValue(key.to_string(), value.to_string()));
    }

    fn dimmed(&self, message: &str) {
        self.push(OutputMessage::Dimmed(message.to_string()));
    }

    fn resource_change(&self, change: &ResourceChange) {
        self.push(OutputMessage::ResourceChange(
            change.address.clone(),
            change.actions.to_string(),
        ));
    }

    fn blank(&self) {
        self.push(OutputMessage::Blank);
    }
}
