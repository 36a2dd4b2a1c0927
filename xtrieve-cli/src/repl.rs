//! Interactive REPL.
//!
//! The REPL keeps one open file and its cursor between commands, so
//! navigation picks up where the previous command left off.

use crate::commands::{decode_arg, format_record};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use xtrieve_client::{Client, Reply};
use xtrieve_protocol::PositionBlock;

const HELP_TEXT: &str = r#"
Available commands:
  help                          Show this help

  open <path> [mode]            Open a file (mode: 0 normal, -2 read-only, -4 exclusive)
  close                         Close the open file
  stat                          Show file statistics
  key <n>                       Select the key used for navigation

  first | next | prev | last    Move along the selected key
  eq <key>                      Find the record whose key equals <key>
  step-first | step-next        Move in physical order

  insert <text>                 Insert a record
  update <text>                 Replace the current record
  delete                        Delete the current record

  pos                           Show the position block
  reconnect                     Reconnect to the engine

  quit, exit                    Exit the REPL

Records and keys starting with 0x are read as hex.
"#;

/// Client plus the file the REPL is working on.
struct ReplState {
    client: Client,
    cursor: PositionBlock,
    file: Option<String>,
    key_number: i16,
}

impl ReplState {
    fn require_open(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.file.is_none() {
            return Err("no file open (use: open <path>)".into());
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        match self.file {
            Some(ref path) => format!("{} ", format!("xtrieve:{}>", path).cyan()),
            None => format!("{} ", "xtrieve>".cyan()),
        }
    }
}

pub async fn run(client: Client, host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "xtrieve CLI".bold().cyan());
    println!("{} {}:{}", "Connected to".green(), host, port);

    let mut state = ReplState {
        client,
        cursor: PositionBlock::new(),
        file: None,
        key_number: 0,
    };

    // Create readline editor
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    // Load history
    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".xtrieve_history"))
        .unwrap_or_else(|_| ".xtrieve_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut state, line).await {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break, // Exit command
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&history_path);

    // Close the file and disconnect
    if state.file.is_some() && state.client.is_connected() {
        let _ = state.client.close(&mut state.cursor).await;
    }
    state.client.disconnect().await;
    println!("{}", "Disconnected.".dimmed());

    Ok(())
}

async fn execute_repl_command(
    state: &mut ReplState,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "open" | "o" => {
            if args.is_empty() {
                return Ok(Some("Usage: open <path> [mode]".to_string()));
            }
            let mode = args.get(1).map(|m| m.parse::<i16>()).transpose()?.unwrap_or(0);
            if state.file.is_some() {
                let _ = state.client.close(&mut state.cursor).await;
            }
            state.cursor = PositionBlock::new();
            state.file = None;

            let reply = state.client.open(&mut state.cursor, args[0], mode).await?;
            if !reply.is_success() {
                return Ok(Some(status_line(&reply)));
            }
            state.file = Some(args[0].to_string());
            state.key_number = 0;
            Ok(Some(format!("{} {}", "Opened".green(), args[0].cyan())))
        }

        "close" => {
            state.require_open()?;
            let reply = state.client.close(&mut state.cursor).await?;
            state.file = None;
            Ok(Some(status_line(&reply)))
        }

        "stat" => {
            state.require_open()?;
            let stat = state.client.file_stat(&mut state.cursor).await?;
            Ok(Some(format!(
                "  Record length: {}\n  Page size: {}\n  Keys: {}\n  Records: {}",
                stat.record_length, stat.page_size, stat.key_count, stat.record_count
            )))
        }

        "key" | "k" => {
            if args.is_empty() {
                return Ok(Some(format!("Current key: {}", state.key_number)));
            }
            state.key_number = args[0].parse()?;
            Ok(Some(format!("Using key {}", state.key_number)))
        }

        "first" | "next" | "prev" | "last" | "f" | "n" | "p" | "l" => {
            state.require_open()?;
            let key = state.key_number;
            let cursor = &mut state.cursor;
            let reply = match cmd.as_str() {
                "first" | "f" => state.client.get_first(cursor, key).await?,
                "next" | "n" => state.client.get_next(cursor, key).await?,
                "prev" | "p" => state.client.get_previous(cursor, key).await?,
                _ => state.client.get_last(cursor, key).await?,
            };
            Ok(Some(record_line(&reply)))
        }

        "step-first" | "step-next" => {
            state.require_open()?;
            let reply = if cmd == "step-first" {
                state.client.step_first(&mut state.cursor).await?
            } else {
                state.client.step_next(&mut state.cursor).await?
            };
            Ok(Some(record_line(&reply)))
        }

        "eq" | "get" => {
            state.require_open()?;
            if rest.is_empty() {
                return Ok(Some("Usage: eq <key>".to_string()));
            }
            let key = parse_value(rest)?;
            let reply = state
                .client
                .get_equal(&mut state.cursor, &key, state.key_number)
                .await?;
            Ok(Some(record_line(&reply)))
        }

        "insert" | "i" => {
            state.require_open()?;
            if rest.is_empty() {
                return Ok(Some("Usage: insert <text|0xhex>".to_string()));
            }
            let record = parse_value(rest)?;
            let reply = state.client.insert(&mut state.cursor, &record).await?;
            Ok(Some(status_line(&reply)))
        }

        "update" | "u" => {
            state.require_open()?;
            if rest.is_empty() {
                return Ok(Some("Usage: update <text|0xhex>".to_string()));
            }
            let record = parse_value(rest)?;
            let reply = state
                .client
                .update(&mut state.cursor, &record, state.key_number)
                .await?;
            Ok(Some(status_line(&reply)))
        }

        "delete" | "d" => {
            state.require_open()?;
            let reply = state
                .client
                .delete(&mut state.cursor, state.key_number)
                .await?;
            Ok(Some(status_line(&reply)))
        }

        "pos" => {
            let bytes = state.cursor.as_bytes();
            let mut output = String::new();
            for (row, chunk) in bytes.chunks(32).enumerate() {
                output.push_str(&format!("  {:>3}: {}\n", row * 32, hex::encode(chunk)));
            }
            Ok(Some(output))
        }

        "reconnect" => {
            state.client.connection_mut().reconnect().await?;
            state.cursor = PositionBlock::new();
            state.file = None;
            Ok(Some(format!(
                "{} (files must be reopened)",
                "Reconnected".green()
            )))
        }

        _ => Ok(Some(format!(
            "Unknown command: {}. Type 'help' for help.",
            cmd
        ))),
    }
}

/// Reads `0x...` as hex and anything else as text.
fn parse_value(arg: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    match arg.strip_prefix("0x") {
        Some(hex) => decode_arg(hex, true),
        None => decode_arg(arg, false),
    }
}

fn status_line(reply: &Reply) -> String {
    if reply.is_success() {
        "OK".green().to_string()
    } else {
        format!("{}: {}", "Status".yellow(), reply.status)
    }
}

fn record_line(reply: &Reply) -> String {
    if reply.is_success() {
        format_record(&reply.data)
    } else {
        status_line(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("0x4142").unwrap(), b"AB");
        assert_eq!(parse_value("hello world").unwrap(), b"hello world");
        assert!(parse_value("0xnothex").is_err());
    }
}
