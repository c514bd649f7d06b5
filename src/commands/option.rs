use crate::llm::CommandOption;
use crate::safety::RiskInfo;

/// A proposed command the user can pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOption {
    /// Brief title for this option.
    pub title: String,
    /// The actual shell command.
    pub command: String,
    /// Explanation of what this command does.
    pub description: String,
    /// Risk warning; absent means nothing to flag (or not evaluated yet).
    pub risk: Option<RiskInfo>,
}

impl From<CommandOption> for CandidateOption {
    fn from(option: CommandOption) -> Self {
        Self {
            title: option.title,
            command: option.command,
            description: option.description,
            risk: None,
        }
    }
}
