use std::time::Instant;

use clap::Parser;
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "analyze-cli")]
#[command(about = "Request an analysis report through the gateway", long_about = None)]
struct Cli {
    /// Domain or username to analyze
    target: String,

    #[arg(short, long, default_value = "http://localhost:8080")]
    gateway: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    println!("\nStarting scan for target: {}...", cli.target);
    let start = Instant::now();

    let res = match client
        .get(format!("{}/analyze", cli.gateway.trim_end_matches('/')))
        .query(&[("target", cli.target.as_str())])
        .send()
        .await
    {
        Ok(res) => res,
        Err(e) => {
            eprintln!("Connection error. Ensure the gateway is running at {}.", cli.gateway);
            eprintln!("Detail: {}", e);
            std::process::exit(1);
        }
    };

    let status = res.status();
    let text = res.text().await?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        eprintln!("Rate limit error (429): too many requests. Wait a few seconds and try again.");
        std::process::exit(1);
    }

    let report: Value = match serde_json::from_str(&text) {
        Ok(report) => report,
        Err(_) => {
            eprintln!("Invalid JSON response from gateway. HTTP {}", status);
            eprintln!("Response body: {}", text);
            std::process::exit(1);
        }
    };

    if !status.is_success() {
        let detail = report
            .get("detail")
            .or_else(|| report.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Service error");
        eprintln!("HTTP error {}: {}", status.as_u16(), detail);
        std::process::exit(1);
    }

    print_report(&cli.target, &report)?;
    println!("Total analysis time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn print_report(target: &str, report: &Value) -> Result<(), serde_json::Error> {
    let target = report.get("target").and_then(Value::as_str).unwrap_or(target);
    let source = match report.get("is_cached").and_then(Value::as_bool) {
        Some(true) => "CACHED",
        _ => "LIVE SCAN",
    };

    println!("\n--- Report: {} [{}] ---", target, source);
    if let Some(summary) = report.get("summary").and_then(Value::as_str) {
        println!("SUMMARY: {}", summary);
    }
    println!("{}", serde_json::to_string_pretty(report)?);
    println!("----------------------------------------");
    Ok(())
}
