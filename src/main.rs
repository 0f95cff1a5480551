use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use voice_agent::voice::{
    AudioBlob, AudioCapture, AudioSink, CpalPlayback, CpalSource, HttpTextToSpeech,
    SilentPlayback, TextToSpeech,
};
use voice_agent::{
    ChatMessage, Config, ConversationController, ConversationEvent, DropReason, ProxyServer, Role,
    Services, TranscriptLog, TurnOutcome,
};

/// Voice Agent - voice and text chat with a workflow-driven assistant
#[derive(Parser)]
#[command(name = "voice-agent", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Send requests through a proxy at this base URL instead of the origins
    #[arg(long)]
    api_base: Option<String>,

    /// Append STT transcripts to this file
    #[arg(long)]
    transcript_log: Option<PathBuf>,

    /// Don't play synthesized replies (for machines without audio output)
    #[arg(long)]
    no_playback: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// Send one text message
    Send {
        /// Message text
        text: String,
    },
    /// Send one recorded audio file
    SendAudio {
        /// Audio file (wav, webm, ogg, mp3, ...)
        path: PathBuf,
    },
    /// Speak the backend's preset TTS phrase
    SpeakPreset,
    /// Run the forwarding proxy for the routing table
    Proxy {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the routing table
    Routes,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,voice_agent=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(base) = &cli.api_base {
        config.set_api_base(base)?;
    }
    if let Some(path) = cli.transcript_log {
        config.client.transcript_log = Some(path);
    }
    if cli.no_playback {
        config.client.playback = false;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&config).await,
        Command::Send { text } => send_text(&config, &text).await,
        Command::SendAudio { path } => send_audio(&config, &path).await,
        Command::SpeakPreset => speak_preset(&config).await,
        Command::Proxy { host, port } => {
            let host = host.unwrap_or_else(|| config.proxy.host.clone());
            let port = port.unwrap_or(config.proxy.port);
            ProxyServer::new(config.route_table(), host, port).run().await?;
            Ok(())
        }
        Command::Routes => {
            print_routes(&config);
            Ok(())
        }
    }
}

/// Interactive chat loop
#[allow(clippy::future_not_send)]
async fn chat(config: &Config) -> anyhow::Result<()> {
    let (controller, printer) = build_controller(config);
    let mut capture = AudioCapture::new(CpalSource);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type a message and press Enter. Commands: /rec, /history, /quit");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        if capture.is_recording() {
            if line.is_empty() || line == "/stop" {
                match capture.stop() {
                    Ok(Some(blob)) if !blob.is_empty() => {
                        let turn = controller.submit_audio(blob);
                        if drive_turn(&controller, &mut lines, turn).await? {
                            break;
                        }
                    }
                    Ok(_) => println!("nothing was recorded"),
                    Err(e) => eprintln!("error: {e}"),
                }
            } else {
                println!("recording... press Enter to stop");
            }
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/rec" => match capture.start() {
                Ok(()) => println!("recording... press Enter to stop"),
                Err(e) => eprintln!("error: {e}"),
            },
            "/history" => print_history(&controller),
            "" => {}
            text => {
                let turn = controller.submit_text(text);
                if drive_turn(&controller, &mut lines, turn).await? {
                    break;
                }
            }
        }
    }

    // Releases the microphone if a recording is still open
    drop(capture);
    drop(controller);
    printer.await?;
    Ok(())
}

/// Run a turn to completion while still reading input
///
/// Lines typed during the turn are submitted at once and dropped by the
/// busy controller. Returns `true` if input ended or `/quit` was typed.
#[allow(clippy::future_not_send)]
async fn drive_turn<R: AsyncBufRead + Unpin>(
    controller: &ConversationController,
    lines: &mut Lines<R>,
    turn: impl Future<Output = TurnOutcome>,
) -> anyhow::Result<bool> {
    tokio::pin!(turn);
    let mut done_reading = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut turn => return Ok(done_reading),
            line = lines.next_line(), if !done_reading => match line? {
                None => done_reading = true,
                Some(line) => match line.trim() {
                    "" => {}
                    "/quit" | "/exit" => done_reading = true,
                    text => {
                        let outcome = controller.submit_text(text).await;
                        if outcome == TurnOutcome::Dropped(DropReason::Busy) {
                            println!("still waiting for the last reply, dropped: {text}");
                        }
                    }
                },
            },
        }
    }
}

/// One text turn
#[allow(clippy::future_not_send)]
async fn send_text(config: &Config, text: &str) -> anyhow::Result<()> {
    let (controller, printer) = build_controller(config);
    let outcome = controller.submit_text(text).await;
    drop(controller);
    printer.await?;
    outcome_result(outcome)
}

/// One audio turn from a file
#[allow(clippy::future_not_send)]
async fn send_audio(config: &Config, path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        anyhow::bail!("{} is empty", path.display());
    }

    let (controller, printer) = build_controller(config);
    let outcome = controller
        .submit_audio(AudioBlob::from_file(bytes, path))
        .await;
    drop(controller);
    printer.await?;
    outcome_result(outcome)
}

/// Fetch the preset phrase and speak it
async fn speak_preset(config: &Config) -> anyhow::Result<()> {
    let endpoints = config.endpoints();
    let tts = HttpTextToSpeech::new(reqwest::Client::new(), endpoints.tts, endpoints.tts_text);

    let text = tts.preset_text().await?;
    println!("{text}");

    let audio = tts.synthesize(&text).await?;
    playback(config).play(audio).await?;
    Ok(())
}

fn outcome_result(outcome: TurnOutcome) -> anyhow::Result<()> {
    match outcome {
        TurnOutcome::Failed { message, .. } => Err(anyhow::anyhow!(message)),
        TurnOutcome::Dropped(reason) => Err(anyhow::anyhow!("nothing sent ({reason:?})")),
        TurnOutcome::NoSpeech => {
            println!("no speech detected");
            Ok(())
        }
        TurnOutcome::Completed { .. } => Ok(()),
    }
}

/// Build a controller over HTTP services and a task printing its events
fn build_controller(config: &Config) -> (ConversationController, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut controller =
        ConversationController::new(Services::http(&config.endpoints(), playback(config)))
            .with_events(tx);
    if let Some(path) = &config.client.transcript_log {
        controller = controller.with_transcript_log(TranscriptLog::new(path));
    }

    (controller, spawn_printer(rx))
}

fn playback(config: &Config) -> Arc<dyn AudioSink> {
    if !config.client.playback {
        return Arc::new(SilentPlayback);
    }

    match CpalPlayback::new() {
        Ok(playback) => Arc::new(playback),
        Err(e) => {
            tracing::warn!(error = %e, "audio output unavailable, replies will not be spoken");
            Arc::new(SilentPlayback)
        }
    }
}

fn spawn_printer(mut events: mpsc::UnboundedReceiver<ConversationEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ConversationEvent::MessageAppended(message) => print_message(&message),
                ConversationEvent::Transcribed(text) => println!("last transcript: \"{text}\""),
                ConversationEvent::Failed(message) => eprintln!("error: {message}"),
                ConversationEvent::Busy(true) => println!("assistant is thinking..."),
                ConversationEvent::Busy(false) => {}
            }
        }
    })
}

fn print_history(controller: &ConversationController) {
    let messages = controller.messages();
    if messages.is_empty() {
        println!("no messages yet");
        return;
    }

    for message in &messages {
        print_message(message);
    }

    if let Some(transcript) = controller.last_transcript() {
        println!("last transcript: \"{transcript}\"");
    }
}

fn print_message(message: &ChatMessage) {
    let who = match message.role() {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!(
        "[{}] {who}: {}",
        message.created_at().with_timezone(&Local).format("%H:%M:%S"),
        message.text()
    );
}

fn print_routes(config: &Config) {
    let table = config.route_table();
    for route in table.routes() {
        println!(
            "{:<14} -> {:<45} {}",
            route.local_path,
            table.resolve(route.local_path).unwrap_or_default(),
            route.purpose
        );
    }

    match &config.client.api_base {
        Some(base) => println!("\nclient calls the proxy at {base}"),
        None => println!("\nclient calls the origins directly"),
    }
}
