use crate::clock::Clock;
use crate::config::Settings;
use crate::orchestrator::DebugOrchestrator;
use crate::recorder::EventRecorder;
use chrono::DateTime;
use logtrace_common::event::LogEvent;
use logtrace_common::snapshot::{Position, describe};
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Clone, Copy)]
pub struct OutputHandlers {
    pub out: fn(&str),
    pub err: fn(&str),
}

pub struct ReplOptions<'a> {
    pub banner_lines: &'a [&'a str],
    pub prompt: &'a str,
    pub exit_commands: &'a [&'a str],
    pub handle_ctrl_c: bool,
    pub ctrl_c_message: Option<&'a str>,
}

pub const HELP: &str = "\
Commands:
  events [N]        list the N most recent events (default 20)
  export [dated]    write the event log to a JSON file
  clear             clear the event log
  analyze <prompt>  ask the AI about the last element in the log
  settings          show the current settings
  help              show this help
  exit              leave the terminal";

/// One line per event: `HH:MM:SS.mmm type element (x, y)`.
pub fn format_event(event: &LogEvent) -> String {
    let time = DateTime::parse_from_rfc3339(&event.timestamp)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|_| event.timestamp.clone());
    let mut line = format!("{} {:<12}", time, event.event_type.as_str());
    if let Some(element) = &event.element {
        line.push(' ');
        line.push_str(&describe(&element.tag, &element.id, &element.classes));
    }
    if let Some(position) = event.position {
        line.push_str(&format!(" ({}, {})", position.x, position.y));
    }
    if let Some(prompt) = &event.prompt {
        line.push_str(&format!(" \"{}\"", prompt));
    }
    line
}

/// Commands understood by the interactive terminal.
pub struct Terminal {
    recorder: EventRecorder,
    orchestrator: DebugOrchestrator,
    clock: Rc<dyn Clock>,
    settings: Settings,
    export_dir: PathBuf,
}

impl Terminal {
    pub fn new(
        recorder: EventRecorder,
        orchestrator: DebugOrchestrator,
        clock: Rc<dyn Clock>,
        settings: Settings,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            recorder,
            orchestrator,
            clock,
            settings,
            export_dir,
        }
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    pub async fn execute_line(&self, line: &str) -> Result<String, String> {
        let (command, rest) = match line.trim().split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line.trim(), ""),
        };

        match command {
            "events" => {
                let limit = if rest.is_empty() {
                    20
                } else {
                    rest.parse::<usize>()
                        .map_err(|_| format!("'{}' is not a number", rest))?
                };
                Ok(self.list_events(limit))
            }
            "export" => self.export(rest == "dated").await,
            "clear" => {
                self.recorder.clear().await;
                Ok("Event log cleared.".to_string())
            }
            "analyze" => {
                if rest.is_empty() {
                    return Err("Usage: analyze <prompt>".to_string());
                }
                self.analyze(rest).await
            }
            "settings" => serde_json::to_string_pretty(&self.settings).map_err(|e| e.to_string()),
            "help" => Ok(HELP.to_string()),
            other => Err(format!("Unknown command '{}'. Type 'help'.", other)),
        }
    }

    pub fn list_events(&self, limit: usize) -> String {
        let events = self.recorder.events();
        if events.is_empty() {
            return "No events recorded.".to_string();
        }
        events
            .iter()
            .take(limit)
            .map(format_event)
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn export(&self, dated: bool) -> Result<String, String> {
        let blob = if dated {
            self.recorder.export_dated()
        } else {
            self.recorder.export()
        }
        .map_err(|e| e.to_string())?;
        let path = self.export_dir.join(&blob.filename);
        tokio::fs::write(&path, &blob.contents)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        Ok(format!("Exported {} events to {}", self.recorder.len(), path.display()))
    }

    /// Uses the element of the most recent event that carries one.
    async fn analyze(&self, prompt: &str) -> Result<String, String> {
        let latest = self
            .recorder
            .events()
            .into_iter()
            .find(|e| e.element.is_some());
        let (element, position) = match &latest {
            Some(event) => (
                event.element.as_ref().map(|summary| logtrace_common::ElementSnapshot {
                    tag: summary.tag.clone(),
                    id: summary.id.clone(),
                    classes: summary.classes.clone(),
                    text: summary.text.clone(),
                    ..Default::default()
                }),
                event.position.unwrap_or_default(),
            ),
            None => (None, Position::default()),
        };
        self.orchestrator
            .analyze(prompt, element.as_ref(), position)
            .await
            .map_err(|e| {
                let note = e.notification();
                format!("{}: {}", note.title, note.description)
            })
    }

    /// Milliseconds until the pending auto-save is due.
    fn autosave_wait(&self) -> Option<u64> {
        self.recorder
            .pending_save_at()
            .map(|at| at.saturating_sub(self.clock.now_ms()))
    }
}

/// Possible outcomes from reading a single REPL line.
enum ReadLineResult {
    /// A non-empty input line to process.
    Input(String),
    /// Empty line or no input yet -- skip and re-prompt.
    Skip,
    /// EOF or exit command -- terminate the loop.
    Exit,
    /// The auto-save deadline passed while waiting for input.
    SaveDue,
    /// I/O error while reading.
    Error(io::Error),
}

async fn read_line(
    reader: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
    terminal: &Terminal,
    options: &ReplOptions<'_>,
    output: OutputHandlers,
) -> ReadLineResult {
    let save_wait = terminal.autosave_wait();
    let save_due = async {
        match save_wait {
            Some(ms) => terminal.clock.sleep(ms).await,
            None => std::future::pending::<()>().await,
        }
    };
    let ctrl_c = async {
        if options.handle_ctrl_c {
            let _ = tokio::signal::ctrl_c().await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        line = reader.next_line() => classify_line(line, options.exit_commands),
        _ = save_due => ReadLineResult::SaveDue,
        _ = ctrl_c => {
            if let Some(message) = options.ctrl_c_message {
                (output.out)(message);
            }
            ReadLineResult::Exit
        }
    }
}

fn classify_line(
    result: Result<Option<String>, io::Error>,
    exit_commands: &[&str],
) -> ReadLineResult {
    match result {
        Ok(Some(input)) => {
            let trimmed = input.trim().to_string();
            if trimmed.is_empty() {
                ReadLineResult::Skip
            } else if exit_commands.contains(&trimmed.as_str()) {
                ReadLineResult::Exit
            } else {
                ReadLineResult::Input(trimmed)
            }
        }
        Ok(None) => ReadLineResult::Exit,
        Err(e) => ReadLineResult::Error(e),
    }
}

pub async fn run_repl(
    terminal: &Terminal,
    output: OutputHandlers,
    options: ReplOptions<'_>,
) -> Result<(), Box<dyn Error>> {
    for line in options.banner_lines {
        (output.out)(line);
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin).lines();
    let mut stdout = io::stdout();
    let mut prompt_shown = false;

    loop {
        if !prompt_shown {
            print!("{}", options.prompt);
            stdout.flush()?;
            prompt_shown = true;
        }

        match read_line(&mut reader, terminal, &options, output).await {
            ReadLineResult::Input(line) => {
                prompt_shown = false;
                match terminal.execute_line(&line).await {
                    Ok(result) => (output.out)(&result),
                    Err(err) => (output.err)(&format!("Error: {}", err)),
                }
            }
            ReadLineResult::SaveDue => {
                terminal.recorder.flush_due().await;
            }
            ReadLineResult::Skip => prompt_shown = false,
            ReadLineResult::Exit => break,
            ReadLineResult::Error(e) => return Err(e.into()),
        }
    }

    terminal.recorder.flush().await;
    Ok(())
}
