//! tablegate command line host
//!
//! Loads configuration, builds a gateway and serves JSON operation requests,
//! either one from `--request` or line by line from an interactive prompt.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use tablegate::{logging, Gateway, GatewayConfig, Outcome, Payload, RowValues, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest cell rendered before truncation
const MAX_CELL: usize = 50;

#[derive(Parser, Debug)]
#[command(name = "tablegate-cli", version, about = "Schema-agnostic table operations over a SQL warehouse")]
struct Cli {
    /// Use the embedded in-process warehouse instead of a remote account
    #[arg(long)]
    local: bool,

    /// Execute one request and exit, e.g. '{"op":"read","table":"people"}'
    #[arg(short, long, value_name = "JSON")]
    request: Option<String>,

    /// Print raw JSON responses instead of tables
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let gateway = build_gateway(cli.local)?;
    tracing::info!(backend = gateway.backend(), "gateway ready");

    match cli.request {
        Some(raw) => {
            let outcome = execute_line(&gateway, &raw).await;
            render(&outcome, cli.json)?;
            if !outcome.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        None => interactive_mode(&gateway, cli.json).await,
    }
}

fn build_gateway(local: bool) -> Result<Gateway> {
    if local {
        return Gateway::local().context("failed to start the embedded warehouse");
    }
    let config = GatewayConfig::from_env().context("cannot start without a complete configuration")?;
    Gateway::snowflake(&config).context("failed to build the warehouse connector")
}

async fn execute_line(gateway: &Gateway, raw: &str) -> Outcome {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(payload) => gateway.execute_json(&payload).await,
        Err(e) => Outcome::from(tablegate::GatewayError::from(e)),
    }
}

async fn interactive_mode(gateway: &Gateway, json: bool) -> Result<()> {
    println!("tablegate v{} ({} warehouse)", VERSION, gateway.backend());
    println!("Type '.help' for help, '.exit' to quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("tablegate> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            ".exit" | ".quit" => {
                println!("Goodbye!");
                break;
            }
            ".help" => print_interactive_help(),
            cmd if cmd.starts_with('.') => {
                eprintln!("Unknown command: {}", cmd);
                println!("Type '.help' for available commands");
            }
            request => {
                let outcome = execute_line(gateway, request).await;
                render(&outcome, json)?;
            }
        }
    }
    Ok(())
}

fn print_interactive_help() {
    println!(
        r#"
Requests are one JSON object per line, with "op" naming the operation:

  {{"op":"create","table":"people","columns":[{{"name":"id","type":"integer"}}]}}
  {{"op":"insert","table":"people","rows":[{{"id":1}}]}}
  {{"op":"read","table":"people"}}
  {{"op":"describe","table":"people"}}
  {{"op":"update","table":"people","rowIndex":0,"patch":{{"id":2}}}}
  {{"op":"delete","table":"people","rowIndex":0}}

Commands:
  .help     Show this help
  .exit     Quit
"#
    );
}

fn render(outcome: &Outcome, json: bool) -> Result<()> {
    let rows = match outcome.payload() {
        Some(Payload::Rows(rows)) | Some(Payload::Structure(rows)) if !json => rows,
        _ => {
            println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
            return Ok(());
        }
    };
    display_table(rows);
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::Float(f)) => format!("{:.2}", f),
        Some(v) => v.to_string(),
    };
    if text.chars().count() > MAX_CELL {
        let cut: String = text.chars().take(MAX_CELL - 3).collect();
        format!("{}...", cut)
    } else {
        text
    }
}

fn border(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}", left, segments.join(mid), right)
}

fn display_table(rows: &[RowValues]) {
    if rows.is_empty() {
        println!("No rows");
        return;
    }

    // Union of keys, first-seen order
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell(row.get(*c))).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, text) in row.iter().enumerate() {
            widths[i] = widths[i].max(text.chars().count());
        }
    }

    let line = |values: &[String]| {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:width$} ", v, width = w))
            .collect();
        format!("│{}│", padded.join("│"))
    };

    println!("{}", border(&widths, "┌", "┬", "┐"));
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    println!("{}", line(&header));
    println!("{}", border(&widths, "├", "┼", "┤"));
    for row in &cells {
        println!("{}", line(row));
    }
    println!("{}", border(&widths, "└", "┴", "┘"));
    println!("{} row(s)", rows.len());
}
