//! Command-line client: verify in the browser, then receive a fresh database.
//!
//! Usage: create-postgres [--api-url URL] [--frontend-url URL] [--poll-interval MS] [--max-attempts N]

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use pgdrop::models::tenant::CreateDatabaseResponse;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "create-postgres", about = "Create a temporary PostgreSQL database")]
struct Args {
    /// Backend API URL
    #[arg(short = 'a', long, default_value = "http://localhost:3000")]
    api_url: String,

    /// Frontend URL hosting the verification page
    #[arg(short = 'f', long, default_value = "http://localhost:5173")]
    frontend_url: String,

    /// Polling interval in milliseconds
    #[arg(short = 'p', long, default_value_t = 2000)]
    poll_interval: u64,

    /// Maximum poll attempts
    #[arg(short = 'm', long, default_value_t = 30)]
    max_attempts: u32,
}

#[derive(Deserialize)]
struct VerifyStatus {
    verified: bool,
}

async fn check_verification_status(client: &reqwest::Client, api_url: &str, session: &str) -> bool {
    let response = client
        .get(format!("{api_url}/verify-status"))
        .query(&[("session", session)])
        .send()
        .await
        .and_then(|r| r.error_for_status());
    match response {
        Ok(r) => r.json::<VerifyStatus>().await.map(|s| s.verified).unwrap_or(false),
        Err(e) => {
            eprintln!("Error checking verification status: {e}");
            false
        }
    }
}

async fn wait_for_verification(client: &reqwest::Client, args: &Args, session: &str) -> bool {
    for _ in 0..args.max_attempts {
        if check_verification_status(client, &args.api_url, session).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(args.poll_interval)).await;
    }
    false
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let api_url = args.api_url.trim_end_matches('/').to_string();
    let args = Args { api_url, ..args };
    let client = reqwest::Client::new();

    println!("Welcome to create-postgres!");

    let session = Uuid::new_v4().simple().to_string();
    println!(
        "Please open this URL in your browser to verify:\n{}/verify?session={}",
        args.frontend_url.trim_end_matches('/'),
        session
    );

    println!("Waiting for verification...");
    if !wait_for_verification(&client, &args, &session).await {
        println!("Verification timed out. Please try again.");
        return Ok(());
    }

    println!("Verification successful! Creating database...");
    let response = client
        .post(format!("{}/create-database", args.api_url))
        .json(&json!({ "sessionId": session }))
        .send()
        .await
        .context("could not reach the API")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Failed to create database ({status}): {body}");
    }

    let created: CreateDatabaseResponse = response.json().await.context("unexpected response body")?;
    println!("\nYour database has been created!");
    println!("Database Name: {}", created.db_name);
    println!("Username: {}", created.username);
    println!("Password: {}", created.password);
    println!("URL: {}", created.direct_connection_url);
    if let Some(pooled) = &created.pooled_connection_url {
        println!("Pooled URL: {pooled}");
    }
    match (&created.size, created.size_bytes) {
        (Some(size), Some(bytes)) => println!("Current size: {size} ({bytes} bytes)"),
        (Some(size), None) => println!("Current size: {size}"),
        _ => {}
    }
    println!("\nThis database will be reset at {}", created.reset_time);

    Ok(())
}
