use crate::accounts::AccountStore;
use crate::api::{ClientContext, DiaryApi, DiaryClient, Entry};
use crate::cache::{CacheSource, SqliteStorage};
use crate::commands::{AccountCommand, Command};
use crate::config::Config;
use crate::event::{ConnectivityWatcher, Event};
use crate::prefs::Preferences;
use crate::sync::{OfflineSyncCache, ReviewTier, SaveOutcome};
use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Main application state
pub struct App {
  /// Application configuration
  config: Config,

  /// Entries, queue and caches for this session
  diary: OfflineSyncCache<DiaryClient, SqliteStorage>,

  /// Signed-in accounts
  accounts: AccountStore<SqliteStorage>,
}

impl App {
  pub async fn new(config: Config) -> Result<Self> {
    let storage = Arc::new(SqliteStorage::open(&SqliteStorage::path_in(
      &config.data_dir()?,
    ))?);
    let accounts = AccountStore::new(storage.clone());

    let ui_language = match &config.ui_language {
      Some(lang) => lang.clone(),
      None => Preferences::new(storage.clone()).ui_language()?,
    };
    let token = match Config::env_token() {
      Some(token) => Some(token),
      None => accounts.active_token()?,
    };

    let ctx = ClientContext::new(&config.api.url, token, &ui_language)?.with_timeout(config.timeout());
    let client = DiaryClient::new(&ctx)?;
    let diary = OfflineSyncCache::new(client, storage, ctx)?.with_page_size(config.per_page);

    Ok(Self {
      config,
      diary,
      accounts,
    })
  }

  pub async fn run(&mut self, command: Command) -> Result<()> {
    match command {
      Command::List => {
        self.mount().await?;
      }
      Command::Save {
        text,
        language,
        duration,
        audio,
      } => {
        let audio = audio.as_deref().map(read_file).transpose()?;
        let outcome = self
          .diary
          .save_entry(&text, &language, duration, audio.as_deref())
          .await?;
        print_saved(&outcome);
      }
      Command::Dictate {
        audio,
        language,
        duration,
      } => {
        let bytes = read_file(&audio)?;
        let transcription = self
          .diary
          .api()
          .transcribe(bytes.clone(), &file_name(&audio), &language)
          .await
          .map_err(|e| eyre!("Transcription failed: {}", e))?;
        println!("{}", transcription.text);

        let language = transcription.language.unwrap_or(language);
        let outcome = self
          .diary
          .save_entry(&transcription.text, &language, duration, Some(&bytes))
          .await?;
        print_saved(&outcome);
      }
      Command::Delete { id } => {
        self.diary.load_from_server().await?;
        self.diary.delete_entry(&id).await?;
        println!("Deleted {}", id);
      }
      Command::Sync => {
        let report = self.diary.sync().await?;
        for (offline_id, server_id) in &report.synced {
          println!("{} -> {}", offline_id, server_id);
        }
        println!(
          "{} synced, {} failed, {} skipped (another sync has them), {} still pending",
          report.synced.len(),
          report.failed,
          report.skipped,
          self.diary.pending()?.len()
        );
      }
      Command::Pending => {
        let pending = self.diary.pending()?;
        if pending.is_empty() {
          println!("Nothing pending");
        }
        for entry in &pending {
          print_entry(entry);
        }
      }
      Command::Review { id } => {
        self.diary.load_from_server().await?;
        match self.diary.review_entry(&id).await? {
          Some(review) => {
            if review.tier == ReviewTier::Legacy {
              println!("(cached before per-language reviews; may be in another language)");
            }
            println!("{}", strip_tags(&review.record.corrected_html));
            let explanations = strip_tags(&review.record.explanations_html);
            if !explanations.is_empty() {
              println!();
              println!("{}", explanations);
            }
          }
          None => println!("No review available, the entry keeps its original text"),
        }
      }
      Command::Lang { language } => match language {
        Some(language) => {
          self.diary.load_from_server().await?;
          let report = self.diary.set_ui_language(&language).await?;
          if let Some(warning) = language_override(self.config.ui_language.as_deref(), &language) {
            warn!(saved = %language, "{}", warning);
            eprintln!("Warning: {}", warning);
          }
          println!(
            "UI language: {} ({} cached, {} reviewed, {} unavailable)",
            language, report.cached, report.fetched, report.failed
          );
        }
        None => println!("{}", self.diary.ui_language()?),
      },
      Command::Transcribe { audio, language } => {
        let transcription = self
          .diary
          .api()
          .transcribe(read_file(&audio)?, &file_name(&audio), &language)
          .await
          .map_err(|e| eyre!("Transcription failed: {}", e))?;
        println!("{}", transcription.text);
      }
      Command::Translate { text, to } => {
        let translated = self
          .diary
          .api()
          .translate(&text, &to)
          .await
          .map_err(|e| eyre!("Translation failed: {}", e))?;
        println!("{}", translated);
      }
      Command::Audio { id, out } => {
        let audio = self
          .diary
          .audio_for(&id)?
          .ok_or_else(|| eyre!("No recording kept for entry {}", id))?;
        std::fs::write(&out, &audio)
          .map_err(|e| eyre!("Failed to write {}: {}", out.display(), e))?;
        println!("Wrote {} bytes to {}", audio.len(), out.display());
      }
      Command::Health => match self.diary.api().health().await {
        Ok(status) => println!("{}: {}", self.config.api.url, status),
        Err(e) => return Err(eyre!("{} is unreachable: {}", self.config.api.url, e)),
      },
      Command::Login { init_data } => {
        let session = self
          .diary
          .api()
          .telegram_auth(&init_data)
          .await
          .map_err(|e| eyre!("Login failed: {}", e))?;
        let name = self.accounts.add_session(&session)?;
        println!("Signed in as {}", name);
      }
      Command::Accounts(command) => self.run_accounts(command)?,
      Command::RetireLegacy => {
        self.diary.load_from_server().await?;
        let retired = self.diary.retire_legacy_reviews()?;
        println!("Retired {} legacy reviews", retired);
      }
      Command::Watch { interval } => self.watch(Duration::from_secs(interval.max(1))).await?,
    }

    Ok(())
  }

  fn run_accounts(&self, command: AccountCommand) -> Result<()> {
    match command {
      AccountCommand::List => {
        let active = self.accounts.active_name()?;
        for (name, account) in self.accounts.accounts()? {
          let marker = if active.as_deref() == Some(name.as_str()) {
            "*"
          } else {
            " "
          };
          println!(
            "{} {}  (added {})",
            marker,
            name,
            account.added_at.format("%Y-%m-%d")
          );
        }
      }
      AccountCommand::Use { name } => {
        self.accounts.switch(&name)?;
        println!("Active account: {}", name);
      }
      AccountCommand::Remove { name } => {
        if !self.accounts.remove(&name)? {
          return Err(eyre!("Unknown account: {}", name));
        }
        println!("Removed {}", name);
      }
    }
    Ok(())
  }

  /// Sync what is pending, then show everything.
  async fn mount(&self) -> Result<()> {
    let report = self.diary.sync().await?;
    if !report.synced.is_empty() {
      println!("Synced {} offline entries", report.synced.len());
    }

    let loaded = self.diary.load_from_server().await?;
    if loaded.source == CacheSource::Offline {
      println!("Offline: showing cached entries");
    }
    print_entries(&loaded.data);
    Ok(())
  }

  /// Mount, then sync again every time the backend comes back.
  async fn watch(&self, interval: Duration) -> Result<()> {
    self.mount().await?;

    let online = self.diary.api().health().await.is_ok();
    let probe = DiaryClient::new(&ClientContext::new(
      &self.config.api.url,
      None,
      &self.diary.ui_language()?,
    )?
    .with_timeout(self.config.timeout()))?;
    let mut watcher = ConnectivityWatcher::spawn(probe, interval, online);
    info!(online, "Watching connectivity");

    loop {
      tokio::select! {
        event = watcher.next() => match event {
          Some(Event::Online) => {
            println!("Back online");
            self.mount().await?;
          }
          Some(Event::Offline) => println!("Offline, new entries will be queued"),
          None => break,
        },
        _ = tokio::signal::ctrl_c() => break,
      }
    }
    Ok(())
  }
}

/// Why a saved UI language will not stick, if the config file pins another one.
fn language_override(configured: Option<&str>, saved: &str) -> Option<String> {
  configured.filter(|c| *c != saved).map(|c| {
    format!(
      "ui_language: {} in the config file takes precedence on the next run",
      c
    )
  })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
  std::fs::read(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "record.webm".to_string())
}

fn print_saved(outcome: &SaveOutcome) {
  match outcome {
    SaveOutcome::Saved(entry) => println!("Saved as {}", entry.id),
    SaveOutcome::Offline(entry) => println!(
      "Saved offline as {}. It will sync when the connection is back.",
      entry.id
    ),
  }
}

fn print_entries(entries: &[Entry]) {
  if entries.is_empty() {
    println!("No entries yet");
    return;
  }

  let mut current_date = None;
  for entry in entries {
    let date = entry.timestamp.date_naive();
    if current_date != Some(date) {
      println!("{}", date.format("%Y-%m-%d"));
      current_date = Some(date);
    }
    print_entry(entry);
  }
}

fn print_entry(entry: &Entry) {
  let duration = entry
    .duration
    .map(|d| format!("{:.0}s", d))
    .unwrap_or_default();
  let status = if entry.is_offline { " (offline)" } else { "" };
  println!(
    "  {:<20} {} {:<6} {:>4}{}",
    entry.id,
    entry.timestamp.format("%H:%M"),
    entry.language,
    duration,
    status
  );
  println!("      {}", entry.text);
  if let Some(html) = &entry.corrected_html {
    println!("    ✎ {}", strip_tags(html));
  }
}

/// Drop HTML tags for terminal output.
fn strip_tags(html: &str) -> String {
  let mut out = String::with_capacity(html.len());
  let mut in_tag = false;
  for c in html.chars() {
    match c {
      '<' => in_tag = true,
      '>' if in_tag => in_tag = false,
      _ if !in_tag => out.push(c),
      _ => {}
    }
  }
  out
    .replace("&nbsp;", " ")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&amp;", "&")
    .trim()
    .to_string()
}
