//! Line-oriented REPL over the persistent link
//!
//! Reads stdin lines, streams agent responses to stdout as they arrive, and
//! prints connection transitions as dim notices. Slash commands reach the
//! HTTP collaborators without going through the link.

use std::io::{self, Write};

use crossterm::style::Stylize;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use warlink_core::{
    format_uptime, AgentLink, AudioClip, BackendClient, ChatRole, HealthMonitor, LinkPhase,
    LinkState, Transcript, WhisperClient,
};

/// Retained transcript entries
const TRANSCRIPT_CAP: usize = 500;

/// Default entry count for `/history`
const HISTORY_DEFAULT: usize = 10;

/// Exchange results forwarded from the link callbacks
enum Outcome {
    Complete(String),
    Error(String),
}

/// Interactive console session
pub struct Console {
    link: AgentLink,
    backend: BackendClient,
    whisper: WhisperClient,
    health: Option<HealthMonitor>,
    transcript: Transcript,
    profile: String,
    /// Prefix of the streaming buffer already written to stdout
    printed: usize,
    last_phase: LinkPhase,
}

impl Console {
    pub fn new(
        link: AgentLink,
        backend: BackendClient,
        whisper: WhisperClient,
        health: Option<HealthMonitor>,
        profile: String,
    ) -> Self {
        Self {
            link,
            backend,
            whisper,
            health,
            transcript: Transcript::new(TRANSCRIPT_CAP),
            profile,
            printed: 0,
            last_phase: LinkPhase::Connecting,
        }
    }

    /// Run the console until `/quit`, EOF, or Ctrl-C
    pub async fn run(mut self) -> anyhow::Result<()> {
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        let tx = outcome_tx.clone();
        self.link.on_message_complete(move |text| {
            let _ = tx.send(Outcome::Complete(text.to_string()));
        });
        let tx = outcome_tx;
        self.link.on_error(move |message| {
            let _ = tx.send(Outcome::Error(message.to_string()));
        });

        let mut state_rx = self.link.subscribe();
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

        println!(
            "{}",
            "warlink console - type a message, /help for commands".dark_grey()
        );
        self.prompt();

        let mut result = Ok(());
        loop {
            // Outcomes render before state so a completed response is never
            // raced by the buffer clearing underneath it
            tokio::select! {
                biased;

                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
                outcome = outcome_rx.recv() => {
                    match outcome {
                        Some(Outcome::Complete(text)) => self.render_complete(&text),
                        Some(Outcome::Error(message)) => self.render_error(&message),
                        None => {}
                    }
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    self.render_state(&state);
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.handle_line(&line).await {
                                break;
                            }
                        }
                        Ok(None) => {
                            println!();
                            break;
                        }
                        Err(e) => {
                            result = Err(e.into());
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
        result
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Dispatch one input line; returns whether to keep running
    async fn handle_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            self.prompt();
            return true;
        }

        if let Some(command) = trimmed.strip_prefix('/') {
            return self.handle_command(command).await;
        }

        self.send_message(line);
        true
    }

    async fn handle_command(&mut self, command: &str) -> bool {
        let (name, rest) = split_command(command);

        match name {
            "quit" | "exit" => return false,
            "help" => self.render_help(),
            "status" => self.render_status(),
            "health" => self.render_health(),
            "history" => {
                let count = rest.parse().unwrap_or(HISTORY_DEFAULT);
                self.render_history(count);
            }
            "profile" => {
                if rest.is_empty() {
                    println!("current profile: {}", self.profile);
                } else {
                    self.profile = rest.to_string();
                    self.link.set_profile(rest);
                    println!("{}", format!("profile switched to {rest}").dark_grey());
                }
            }
            "run" => self.run_command(rest).await,
            "transcribe" => self.transcribe(rest).await,
            other => {
                println!("{}", format!("unknown command: /{other} (try /help)").dark_grey());
            }
        }

        self.prompt();
        true
    }

    /// Hand a message to the link and record it
    fn send_message(&mut self, text: &str) {
        self.transcript.push_user(text);
        self.printed = 0;
        self.link.send(text);
    }

    /// One-shot command over HTTP, bypassing the link
    async fn run_command(&mut self, text: &str) {
        if text.is_empty() {
            println!("usage: /run <text>");
            return;
        }

        self.transcript.push_user(text);
        match self.backend.run_command(text, &self.profile).await {
            Ok(response) => {
                self.transcript.push_agent(&response);
                println!("{response}");
            }
            Err(e) => println!("{}", format!("command failed: {e}").red()),
        }
    }

    /// Transcribe an audio file and send the text over the link
    async fn transcribe(&mut self, path: &str) {
        if path.is_empty() {
            println!("usage: /transcribe <path>");
            return;
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("{}", format!("could not read {path}: {e}").red());
                return;
            }
        };

        match self.whisper.transcribe(AudioClip::wav(bytes), &self.profile).await {
            Ok(text) => {
                println!("{}", format!("transcribed: {text}").dark_grey());
                self.send_message(&text);
            }
            Err(e) => println!("{}", format!("transcription failed: {e}").red()),
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn prompt(&self) {
        print!("> ");
        let _ = io::stdout().flush();
    }

    /// Render a state snapshot: streamed text deltas, then phase notices
    fn render_state(&mut self, state: &LinkState) {
        let text = &state.streaming_text;
        if text.is_empty() {
            self.printed = 0;
        } else if text.len() > self.printed {
            print!("{}", &text[self.printed..]);
            let _ = io::stdout().flush();
            self.printed = text.len();
        }

        if state.phase != self.last_phase {
            match state.phase {
                LinkPhase::Open => self.notice("connected"),
                // Failed retries cycle Connecting/Backoff; only a live
                // transport going away is worth a line
                LinkPhase::Backoff if self.last_phase == LinkPhase::Open => {
                    self.notice("connection lost, retrying");
                }
                _ => {}
            }
            self.last_phase = state.phase;
        }
    }

    fn render_complete(&mut self, text: &str) {
        if text.len() > self.printed {
            print!("{}", &text[self.printed..]);
        }
        println!();
        self.printed = text.len();
        self.transcript.push_agent(text);
        self.prompt();
    }

    fn render_error(&mut self, message: &str) {
        if self.printed > 0 {
            println!();
        }
        println!("{}", format!("error: {message}").red());
        self.prompt();
    }

    /// A dim one-line notice, on its own line
    fn notice(&mut self, text: &str) {
        if self.printed > 0 {
            println!();
            self.printed = 0;
        }
        println!("{}", text.dark_grey());
        self.prompt();
    }

    fn render_help(&self) {
        println!("/health              latest backend system stats");
        println!("/run <text>          one-shot command over HTTP instead of the link");
        println!("/transcribe <path>   transcribe an audio file and send the text");
        println!("/profile <name>      switch the persona profile");
        println!("/status              link phase and exchange flags");
        println!("/history [n]         recent transcript entries");
        println!("/quit                tear the link down and exit");
    }

    fn render_status(&self) {
        let state = self.link.state();
        println!("phase     {:?}", state.phase);
        println!("sending   {}", state.sending);
        println!("streaming {}", state.streaming);
        println!("profile   {}", self.profile);
        if let Some(gpu) = state.gpu {
            println!(
                "gpu       {:.1} / {:.1} GiB vram ({:.0}%), {:.0}C",
                gpu.vram_used_gb, gpu.vram_total_gb, gpu.vram_percent, gpu.temperature_c
            );
        }
    }

    fn render_health(&self) {
        let Some(monitor) = &self.health else {
            println!("{}", "health polling disabled (--no-health)".dark_grey());
            return;
        };

        let snapshot = monitor.snapshot();
        match snapshot.stats {
            Some(stats) => {
                println!(
                    "cpu      {:.1}% of {} cores (load {:.2} {:.2} {:.2})",
                    stats.cpu_percent,
                    stats.cpu_count,
                    stats.load_average[0],
                    stats.load_average[1],
                    stats.load_average[2]
                );
                println!(
                    "ram      {:.1} / {:.1} GiB ({:.0}%)",
                    stats.ram_used_gb, stats.ram_total_gb, stats.ram_percent
                );
                println!(
                    "disk     {:.1} / {:.1} GiB ({:.0}%)",
                    stats.disk_used_gb, stats.disk_total_gb, stats.disk_percent
                );
                println!("uptime   {}", format_uptime(stats.uptime_seconds));
                if let Some(gpu) = &stats.gpu {
                    println!(
                        "gpu      {}: {:.1} / {:.1} GiB vram ({:.0}%), {:.0}C, {:.0}% util",
                        gpu.name,
                        gpu.vram_used_gb,
                        gpu.vram_total_gb,
                        gpu.vram_percent,
                        gpu.temperature_c,
                        gpu.gpu_util_percent
                    );
                }
                if let Some(updated) = snapshot.last_updated {
                    println!("{}", format!("updated  {}", updated.format("%H:%M:%S UTC")).dark_grey());
                }
                if let Some(error) = snapshot.error {
                    println!("{}", format!("last poll failed: {error} (stats are stale)").red());
                }
            }
            None => {
                match snapshot.error {
                    Some(error) => println!("{}", format!("health poll failing: {error}").red()),
                    None => println!("{}", "no health data yet".dark_grey()),
                }
            }
        }
    }

    fn render_history(&self, count: usize) {
        if self.transcript.is_empty() {
            println!("{}", "no messages yet".dark_grey());
            return;
        }

        for message in self.transcript.recent(count) {
            let speaker = match message.role {
                ChatRole::User => "you",
                ChatRole::Agent => "agent",
            };
            println!("{}  {}", format!("{speaker:>5}").dark_grey(), message.content);
        }
    }

    async fn shutdown(&mut self) {
        if let Some(health) = &self.health {
            health.stop();
        }
        self.link.close().await;
        println!("{}", "link closed".dark_grey());
    }
}

/// Split a command into its name and trimmed argument remainder
fn split_command(command: &str) -> (&str, &str) {
    match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    }
}
