//! Error handling for the getphylo CLI

use thiserror::Error;

use getphylo_core::GetphyloError;

/// Main error type for getphylo CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] GetphyloError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    /// Short name of the failure, as reported in the log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(err) => err.kind(),
            Self::Config { .. } => "Config",
            Self::Validation { .. } => "Validation",
            Self::Io { .. } => "Io",
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(format!("TOML serialization error: {}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

fn pipeline_suggestions(error: &GetphyloError) -> Option<String> {
    let text = match error {
        GetphyloError::BadInput { .. } => "• Quote the --gbks pattern so the shell does not expand it\n\
             • At least three input files with distinct names are needed"
            .to_string(),
        GetphyloError::BadSeed { .. } => "• Pass --seed with the name of one input file (without extension)\n\
             • Resuming a run always needs the seed that started it"
            .to_string(),
        GetphyloError::BadAnnotation { .. } => {
            "• Use --ignore-bad-annotations to drop duplicated identifiers".to_string()
        }
        GetphyloError::BadRecord { .. } => {
            "• Use --ignore-bad-records to skip files that cannot be read".to_string()
        }
        GetphyloError::MissingPrerequisite { stage, .. } => format!(
            "• Resume from {} or earlier with --checkpoint\n\
             • Check that --output points at the directory of the original run",
            stage.previous()
        ),
        GetphyloError::AlreadyExists { path, stage } => format!(
            "• Remove {} and resume with --checkpoint {}\n\
             • Or choose a fresh --output directory",
            path.display(),
            stage
        ),
        GetphyloError::InsufficientMarkers { .. } => "• Lower --presence or --min-loci\n\
             • Raise --find so more candidates are screened\n\
             • Check the presence/absence table for organisms lacking most markers"
            .to_string(),
        GetphyloError::ToolFailure { tool, .. } => format!(
            "• Install {} and make sure it is on your PATH\n\
             • Or point at the executable with --{}",
            tool, tool
        ),
        GetphyloError::Config { .. } => config_suggestions().to_string(),
        _ => return None,
    };
    Some(text)
}

fn config_suggestions() -> &'static str {
    "• Check your getphylo.toml configuration file\n\
     • Use --print-config to see the settings that would be used"
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    let suggestions = match error {
        CliError::Pipeline(err) => pipeline_suggestions(err),
        CliError::Config { .. } | CliError::Validation { .. } => {
            Some(config_suggestions().to_string())
        }
        CliError::Io { .. } => None,
    };

    if let Some(suggestions) = suggestions {
        message.push_str("\n\nSuggestions:\n");
        message.push_str(&suggestions);
    }
    message
}

/// Log the error with suggestions and exit with status 1
pub fn print_error_and_exit(error: &CliError) -> ! {
    log::error!("{}: {}", error.kind(), format_error_with_suggestions(error));
    std::process::exit(1);
}
