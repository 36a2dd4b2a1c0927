//! Command execution.

use crate::Commands;
use colored::Colorize;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use xtrieve_client::{Client, Reply};
use xtrieve_protocol::{FileSpec, PositionBlock};

/// Open mode used by one-shot commands that only read.
const READ_ONLY: i16 = -2;

/// JSON view of one record.
#[derive(Debug, Serialize)]
pub struct RecordView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub hex: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl RecordView {
    pub fn new(data: &[u8]) -> Self {
        Self {
            index: None,
            status: None,
            hex: hex::encode(data),
            text: printable(data),
            key: None,
        }
    }
}

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &mut Client,
    cmd: Commands,
    json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl => unreachable!(),

        Commands::Create { path, spec } => {
            let spec = parse_spec_arg(&spec)?;
            client.create(&path, &spec).await?.check()?;

            if json {
                return Ok(format_json(&json!({ "created": path, "spec": spec })));
            }
            Ok(format!(
                "{} {} (record length {}, {} key(s))",
                "Created".green(),
                path.cyan(),
                spec.record_length,
                spec.key_count()
            ))
        }

        Commands::Stat { path } => {
            let mut cursor = PositionBlock::new();
            client.open(&mut cursor, &path, READ_ONLY).await?.check()?;
            let stat = client.file_stat(&mut cursor).await;
            client.close(&mut cursor).await?;
            let stat = stat?;

            if json {
                return Ok(format_json(&serde_json::to_value(stat)?));
            }
            Ok(format!(
                "{}\n  Record length: {} bytes\n  Page size: {} bytes\n  Keys: {}\n  Records: {}",
                format!("File {}", path.cyan()).bold(),
                stat.record_length,
                stat.page_size,
                stat.key_count,
                stat.record_count
            ))
        }

        Commands::Dump { path, key, limit } => {
            let mut cursor = PositionBlock::new();
            client.open(&mut cursor, &path, READ_ONLY).await?.check()?;
            let records = dump(client, &mut cursor, key, limit).await;
            client.close(&mut cursor).await?;
            let records = records?;

            if json {
                let items: Vec<RecordView> = records
                    .iter()
                    .enumerate()
                    .map(|(i, data)| RecordView {
                        index: Some(i),
                        ..RecordView::new(data)
                    })
                    .collect();
                return Ok(format_json(&serde_json::to_value(items)?));
            }
            if records.is_empty() {
                return Ok("No records".yellow().to_string());
            }

            let mut output = String::new();
            for (i, data) in records.iter().enumerate() {
                output.push_str(&format!(
                    "[{:>6}] {}\n",
                    i.to_string().cyan(),
                    format_record(data)
                ));
            }
            output.push_str(&format!("\n{}: {}", "Records".dimmed(), records.len()));
            Ok(output)
        }

        Commands::Insert { path, record, hex } => {
            let data = decode_arg(&record, hex)?;
            let mut cursor = PositionBlock::new();
            client.open(&mut cursor, &path, 0).await?.check()?;
            let inserted = client.insert(&mut cursor, &data).await;
            client.close(&mut cursor).await?;
            inserted?.check()?;

            if json {
                return Ok(format_json(&json!({ "inserted": data.len() })));
            }
            Ok(format!(
                "{} {} byte(s) into {}",
                "Inserted".green(),
                data.len(),
                path.cyan()
            ))
        }

        Commands::Get {
            path,
            key,
            key_number,
            hex,
        } => {
            let key = decode_arg(&key, hex)?;
            let mut cursor = PositionBlock::new();
            client.open(&mut cursor, &path, READ_ONLY).await?.check()?;
            let found = client.get_equal(&mut cursor, &key, key_number).await;
            client.close(&mut cursor).await?;
            let reply = found?.check()?;

            if json {
                return Ok(format_json(&serde_json::to_value(record_json(&reply))?));
            }
            Ok(format_record(&reply.data))
        }
    }
}

/// Reads records from the start of the file in physical order, or in the
/// order of `key` when given, until end of file or `limit`.
pub async fn dump(
    client: &mut Client,
    cursor: &mut PositionBlock,
    key: Option<i16>,
    limit: Option<usize>,
) -> Result<Vec<Vec<u8>>, Box<dyn std::error::Error>> {
    debug!(?key, ?limit, "Dumping records");
    let mut records = Vec::new();
    let mut reply = match key {
        Some(key_number) => client.get_first(cursor, key_number).await?,
        None => client.step_first(cursor).await?,
    };

    loop {
        if reply.status.is_end_of_file() {
            break;
        }
        let reply_ok = reply.check().map_err(|e| {
            warn!(read = records.len(), "Dump stopped early: {}", e);
            e
        })?;
        records.push(reply_ok.data.to_vec());
        if limit.is_some_and(|limit| records.len() >= limit) {
            break;
        }
        reply = match key {
            Some(key_number) => client.get_next(cursor, key_number).await?,
            None => client.step_next(cursor).await?,
        };
    }
    Ok(records)
}

/// Parses a file spec argument (either inline JSON or @file.json).
pub fn parse_spec_arg(arg: &str) -> Result<FileSpec, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Decodes a record or key argument given as text or hex.
pub fn decode_arg(arg: &str, is_hex: bool) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if is_hex {
        Ok(hex::decode(arg.trim())?)
    } else {
        Ok(arg.as_bytes().to_vec())
    }
}

/// Renders bytes as text, with `.` for anything unprintable.
pub fn printable(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Formats a record as hex followed by its printable text.
pub fn format_record(data: &[u8]) -> String {
    format!("{} |{}|", hex::encode(data).dimmed(), printable(data))
}

pub fn record_json(reply: &Reply) -> RecordView {
    RecordView {
        status: Some(reply.status.code()),
        key: Some(hex::encode(&reply.key)),
        ..RecordView::new(&reply.data)
    }
}

/// Formats JSON for display.
pub fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
