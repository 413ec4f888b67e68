use clap::Subcommand;
use std::path::PathBuf;

/// Language assumed for dictated entries
pub const DEFAULT_ENTRY_LANGUAGE: &str = "ru-RU";

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Sync pending entries, then list all entries
  #[command(alias = "ls")]
  List,

  /// Save a typed entry
  Save {
    text: String,
    #[arg(short, long, default_value = DEFAULT_ENTRY_LANGUAGE)]
    language: String,
    /// Recording length in seconds
    #[arg(short, long)]
    duration: Option<f64>,
    /// Recording to keep alongside the entry
    #[arg(short, long)]
    audio: Option<PathBuf>,
  },

  /// Transcribe a recording and save the text as an entry
  Dictate {
    audio: PathBuf,
    #[arg(short, long, default_value = DEFAULT_ENTRY_LANGUAGE)]
    language: String,
    #[arg(short, long)]
    duration: Option<f64>,
  },

  /// Delete an entry with its reviews and audio
  #[command(alias = "rm")]
  Delete { id: String },

  /// Upload entries saved while offline
  Sync,

  /// Show entries still waiting for the server
  Pending,

  /// Show the grammar review of an entry in the current UI language
  Review { id: String },

  /// Show or change the UI language
  Lang { language: Option<String> },

  /// Transcribe a recording without saving it
  Transcribe {
    audio: PathBuf,
    #[arg(short, long, default_value = "auto")]
    language: String,
  },

  /// Translate text
  Translate {
    text: String,
    #[arg(short, long)]
    to: String,
  },

  /// Export the recording kept for an entry
  Audio {
    id: String,
    #[arg(short, long)]
    out: PathBuf,
  },

  /// Check that the backend answers
  Health,

  /// Sign in with Telegram web-app init data
  Login {
    #[arg(long)]
    init_data: String,
  },

  /// Manage signed-in accounts
  #[command(subcommand)]
  Accounts(AccountCommand),

  /// Move legacy reviews under the current UI language
  RetireLegacy,

  /// Stay running and sync whenever the backend comes back
  Watch {
    /// Seconds between connectivity probes
    #[arg(short, long, default_value_t = 15)]
    interval: u64,
  },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
  /// List accounts
  List,
  /// Make an account active
  Use { name: String },
  /// Forget an account
  Remove { name: String },
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(subcommand)]
    command: Command,
  }

  #[test]
  fn test_save_defaults_language() {
    let cli = Cli::try_parse_from(["vdiary", "save", "Hello"]).unwrap();
    match cli.command {
      Command::Save { text, language, .. } => {
        assert_eq!(text, "Hello");
        assert_eq!(language, DEFAULT_ENTRY_LANGUAGE);
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn test_alias_match() {
    let cli = Cli::try_parse_from(["vdiary", "rm", "42"]).unwrap();
    assert!(matches!(cli.command, Command::Delete { id } if id == "42"));
  }

  #[test]
  fn test_accounts_subcommand() {
    let cli = Cli::try_parse_from(["vdiary", "accounts", "use", "alice"]).unwrap();
    assert!(matches!(
      cli.command,
      Command::Accounts(AccountCommand::Use { name }) if name == "alice"
    ));
  }

  #[test]
  fn test_translate_requires_target() {
    assert!(Cli::try_parse_from(["vdiary", "translate", "hi"]).is_err());
  }
}
