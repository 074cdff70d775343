//! Built-in, always-available local tool domains.
//!
//! - [`filesystem`]: directory listing, file read/write, search
//! - [`terminal`]: shell command execution
//! - [`calendar`]: in-process event book

pub mod calendar;
pub mod filesystem;
pub mod terminal;

pub use calendar::{CalendarEvent, EventBook};
pub use terminal::TerminalConfig;

use crate::registry::ToolRegistry;

/// A local, in-process capability domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalDomain {
    /// Filesystem tools.
    Filesystem,
    /// Terminal tools.
    Terminal,
    /// Calendar tools.
    Calendar,
}

impl LocalDomain {
    /// Every local domain.
    pub const ALL: [LocalDomain; 3] = [Self::Filesystem, Self::Terminal, Self::Calendar];

    /// Registry key for this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filesystem => filesystem::DOMAIN,
            Self::Terminal => terminal::DOMAIN,
            Self::Calendar => calendar::DOMAIN,
        }
    }

    /// Pick the domain an endpoint refers to.
    ///
    /// Substring match on the endpoint; anything unrecognised maps to
    /// [`LocalDomain::Filesystem`].
    pub fn from_endpoint(endpoint: &str) -> Self {
        let endpoint = endpoint.to_ascii_lowercase();
        if endpoint.contains("filesystem") {
            Self::Filesystem
        } else if endpoint.contains("terminal") {
            Self::Terminal
        } else if endpoint.contains("calendar") {
            Self::Calendar
        } else {
            Self::Filesystem
        }
    }
}

impl std::fmt::Display for LocalDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for the built-in domains.
#[derive(Debug, Clone, Default)]
pub struct BuiltinConfig {
    /// Terminal execution settings.
    pub terminal: TerminalConfig,
    /// Event book shared by the calendar tools.
    pub calendar: EventBook,
}

/// Register every built-in tool.
pub fn register_all(registry: &mut ToolRegistry, config: &BuiltinConfig) {
    registry.register(filesystem::DOMAIN, filesystem::ListDirectoryTool);
    registry.register(filesystem::DOMAIN, filesystem::ReadFileTool);
    registry.register(filesystem::DOMAIN, filesystem::WriteFileTool);
    registry.register(filesystem::DOMAIN, filesystem::CreateDirectoryTool);
    registry.register(filesystem::DOMAIN, filesystem::DeleteFileTool);
    registry.register(filesystem::DOMAIN, filesystem::GetFileInfoTool);
    registry.register(filesystem::DOMAIN, filesystem::SearchFilesTool);

    registry.register(
        terminal::DOMAIN,
        terminal::ExecuteCommandTool::with_config(config.terminal.clone()),
    );
    registry.register(
        terminal::DOMAIN,
        terminal::WorkingDirectoryTool::with_config(config.terminal.clone()),
    );

    registry.register(
        calendar::DOMAIN,
        calendar::CreateEventTool::new(config.calendar.clone()),
    );
    registry.register(
        calendar::DOMAIN,
        calendar::ListEventsTool::new(config.calendar.clone()),
    );
    registry.register(
        calendar::DOMAIN,
        calendar::DeleteEventTool::new(config.calendar.clone()),
    );
}
