/// Console actions triggered by slash commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Show help message
    Help,
    /// Reset the console to idle
    Clear,
    /// Toggle raw/rendered narrative
    ToggleRawMarkdown,
    /// Copy narrative to the clipboard
    CopyNarrative,
    /// Show the configured endpoint
    ShowEndpoint,
    /// Quit application
    Quit,
}
