//! Command-line parsing and command routing.

use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use crate::commands;
use crate::logging;

/// Record voice messages from the terminal
#[derive(Parser)]
#[command(name = "vmsg")]
#[command(version)]
#[command(about = "Record voice messages from the terminal")]
#[command(long_about = "Record voice messages from the terminal.\n\nPress r to record; the recording stops by itself when the countdown reaches zero.\nPreview it with p and add it to the attachment list with k. Audio files can be\nadded with o, passed on the command line, or dropped onto the terminal window.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nEXAMPLES:\n    # Open the widget with a one minute limit\n    $ vmsg --max-duration 60\n\n    # Start with existing audio files attached\n    $ vmsg memo.ogg interview.mp3\n\n    # Edit configuration file\n    $ vmsg config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/vmsg/vmsg.toml\n    Logs:               ~/.local/state/vmsg/vmsg.log.*"
)]
struct Cli {
    #[command(flatten)]
    record: RecordArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone, Default)]
struct RecordArgs {
    /// Maximum recording length in seconds (overrides the config file)
    #[arg(
        short = 'd',
        long,
        value_name = "SECONDS",
        env = "VMSG_MAX_RECORDING_SECS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_duration: Option<u32>,

    /// Audio files to attach at startup; non-audio files are skipped
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the voice message widget (default)
    ///
    /// r records, s or space stops, p previews, k keeps the recording,
    /// o adds audio files, Enter plays the selected attachment, q quits.
    #[command(visible_alias = "r")]
    Record(RecordArgs),

    /// Open configuration file in your preferred editor
    ///
    /// Writes the default configuration first if there is none yet.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in vmsg.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   vmsg completions bash > vmsg.bash
    ///   vmsg completions zsh > _vmsg
    ///   vmsg completions fish > vmsg.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the command selected on the command line.
///
/// # Errors
/// - If logging initialization fails
/// - If the command fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // These print to the terminal and need neither logging nor config.
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "vmsg", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return commands::handle_list_devices(),
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None => commands::handle_record(cli.record.max_duration, cli.record.files).await,
        Some(Commands::Record(args)) => {
            // Options given after `record` win over top-level ones.
            let max_duration = args.max_duration.or(cli.record.max_duration);
            let mut files = cli.record.files;
            files.extend(args.files);
            commands::handle_record(max_duration, files).await
        }
        Some(Commands::Config) => commands::handle_config(),
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_takes_files_and_duration() {
        let cli = Cli::try_parse_from(["vmsg", "--max-duration", "5", "a.wav", "b.ogg"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.record.max_duration, Some(5));
        assert_eq!(cli.record.files.len(), 2);
    }

    #[test]
    fn test_record_subcommand() {
        let cli = Cli::try_parse_from(["vmsg", "record", "-d", "30", "memo.mp3"]).unwrap();
        match cli.command {
            Some(Commands::Record(args)) => {
                assert_eq!(args.max_duration, Some(30));
                assert_eq!(args.files, vec![PathBuf::from("memo.mp3")]);
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_zero_duration_rejected() {
        assert!(Cli::try_parse_from(["vmsg", "--max-duration", "0"]).is_err());
    }
}
