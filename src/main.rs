use std::io::{BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use eduportal::config::{Config, InstitutionRegistry};
use eduportal::logging::setup_logging;
use eduportal::portal::crypto::decode_bytes;
use eduportal::portal::{Envelope, LoginOutcome, LoginReport, PortalClient};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{Args, Command};

mod cli;

const CAPTCHA_FILE: &str = "captcha.png";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Config is loaded before logging so a bad config is still reported.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        school = ?args.school,
        "starting eduportal"
    );

    match run(&config, args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = ?e, "eduportal failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, args: Args) -> anyhow::Result<ExitCode> {
    let registry = InstitutionRegistry::load(&config.institutions_file)?;
    info!(institutions = registry.len(), "institution registry loaded");

    let mut client = PortalClient::new(
        config,
        Arc::new(registry),
        args.school.as_deref(),
        args.base_url.as_deref(),
    )?;

    let password = read_password()?;
    let report = authenticate(&mut client, &args.sid, &password).await?;

    let authenticated = matches!(report.result, Ok(LoginOutcome::Authenticated { .. }));
    if !authenticated && !matches!(args.command, Command::Login) {
        warn!(stages = ?report.stages, "login did not authenticate");
        print_envelope(&report.into_envelope())?;
        return Ok(ExitCode::FAILURE);
    }

    match args.command {
        Command::Login => print_envelope(&report.into_envelope()),
        Command::Profile => print_envelope(&client.profile().await),
        Command::Grades { year, term } => print_envelope(&client.grades(year, term).await),
        Command::Exams { year, term } => print_envelope(&client.exams(year, term).await),
        Command::Schedule { year, term } => print_envelope(&client.schedule(year, term).await),
        Command::Notifications => print_envelope(&client.notifications().await),
        Command::BlockCourses { year, term, block } => {
            print_envelope(&client.block_courses(year, term, block).await)
        }
    }
}

/// Log in, asking for the captcha on the terminal when the portal wants one.
async fn authenticate(client: &mut PortalClient, sid: &str, password: &str) -> anyhow::Result<LoginReport> {
    let report = client.login(sid, password).await;
    let Ok(LoginOutcome::CaptchaRequired(challenge)) = &report.result else {
        return Ok(report);
    };

    let image = decode_bytes(&challenge.kaptcha_pic).context("Captcha image is not valid base64")?;
    std::fs::write(CAPTCHA_FILE, image).with_context(|| format!("Failed to write {CAPTCHA_FILE}"))?;
    let captcha = prompt(&format!("Captcha written to {CAPTCHA_FILE}, enter its text: "))?;

    Ok(client.login_with_captcha(challenge, password, &captcha).await)
}

fn read_password() -> anyhow::Result<String> {
    match std::env::var("EDUPORTAL_PASSWORD") {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => prompt("Password: "),
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{label}")?;
    stderr.flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

fn print_envelope<T: Serialize>(envelope: &Envelope<T>) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
