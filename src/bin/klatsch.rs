//! Interactive chat with a model served by a local Ollama instance.
//!
//! This binary provides a streaming REPL: replies are printed as they arrive, and
//! several chats can be kept open side by side.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! klatsch
//!
//! # Talk to another model on another machine
//! klatsch --host 192.168.1.20:11434 --model mistral --bot-name Mistral
//!
//! # Set a system prompt
//! klatsch --system "Antworte immer auf Deutsch."
//!
//! # Disable colors (useful for piping output)
//! klatsch --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new` - Start a new chat
//! - `/sessions` - List chats
//! - `/switch <n>` - Switch to another chat
//! - `/history` - Show the current chat again
//! - `/models` - List installed models
//! - `/stats` - Show chat statistics
//! - `/quit` - Exit the application
//!
//! Ctrl+C while a reply is streaming abandons that reply.

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use klatsch::Ollama;
use klatsch::chat::{
    ChatApp, ChatArgs, ChatCommand, ChatConfig, DisplaySink, PlainTextSink, help_text,
    parse_command,
};

/// Main entry point for the klatsch application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("klatsch [OPTIONS]");
    let config = ChatConfig::from(args);

    let mut app = ChatApp::connect(config)?;
    let mut sink = PlainTextSink::with_color(app.config().use_color)
        .with_bot_name(app.config().bot_name.clone());
    sink.set_echo_user_turns(false);
    let mut rl = DefaultEditor::new()?;

    println!(
        "Klatsch with {} (model: {})",
        app.config().bot_name,
        app.config().model
    );
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("> ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::New => {
                            app.new_session();
                            sink.show_info("Started a new chat.");
                        }
                        ChatCommand::Sessions => {
                            print_sessions(&app);
                        }
                        ChatCommand::Switch(number) => match app.switch_to(number - 1) {
                            Ok(_) => {
                                let title = app.active().map(|s| s.title()).unwrap_or_default();
                                sink.show_info(&format!("Switched to: {title}"));
                                replay(&app, &mut sink);
                            }
                            Err(err) => sink.show_error(&err.to_string()),
                        },
                        ChatCommand::History => {
                            replay(&app, &mut sink);
                        }
                        ChatCommand::Models => match app.list_models().await {
                            Ok(models) if models.is_empty() => {
                                sink.show_info("No models installed.");
                            }
                            Ok(models) => {
                                println!("    Installed models:");
                                for model in models {
                                    let modified = model
                                        .modified_at
                                        .map(|at| format!(", modified {}", at.date()))
                                        .unwrap_or_default();
                                    println!(
                                        "      {} ({:.1} GB{modified})",
                                        model.name,
                                        model.size as f64 / 1e9
                                    );
                                }
                            }
                            Err(err) if err.is_connection() => {
                                sink.show_error(&format!(
                                    "{err}\nIs the model server running? Set --host or OLLAMA_HOST."
                                ));
                            }
                            Err(err) => sink.show_error(&err.to_string()),
                        },
                        ChatCommand::Stats => {
                            print_stats(&app);
                        }
                        ChatCommand::Invalid(message) => {
                            sink.show_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to the model
                let interrupt = async {
                    let _ = tokio::signal::ctrl_c().await;
                };
                match app.send_interruptible(line, &mut sink, interrupt).await {
                    Ok(Some(_)) => {}
                    Ok(None) => sink.show_info("[interrupted]"),
                    Err(err) => sink.show_error(&err.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                sink.show_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn replay(app: &ChatApp<Ollama>, sink: &mut PlainTextSink) {
    sink.set_echo_user_turns(true);
    app.replay_active(sink);
    sink.set_echo_user_turns(false);
}

fn print_sessions(app: &ChatApp<Ollama>) {
    let active = app.active().map(|s| s.id());
    println!("    Chats:");
    for (i, session) in app.sessions().iter().enumerate() {
        let marker = if Some(session.id()) == active { "*" } else { " " };
        println!(
            "    {marker} {:>2}. {} ({} messages)",
            i + 1,
            session.title(),
            session.message_count()
        );
    }
}

fn print_stats(app: &ChatApp<Ollama>) {
    let Some(stats) = app.stats() else {
        println!("    No active chat.");
        return;
    };
    println!("    Chat Statistics:");
    println!("      Title: {}", stats.title);
    println!("      Bot: {} (model: {})", stats.bot_name, stats.model);
    println!(
        "      Messages: {} ({} from you, {} from {})",
        stats.message_count, stats.user_turns, stats.assistant_turns, stats.bot_name
    );
    println!("      Characters: {}", stats.characters);
    println!("      Started: {}", klatsch::utils::time::format(&stats.created_at));
    println!("      Open chats: {}", stats.session_count);
}
