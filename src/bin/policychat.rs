use std::path::PathBuf;

use arrrg::CommandLine;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use secrecy::ExposeSecret;

use policychat::{
    ChatSession, ClaudeClassifier, Config, Dispatcher, HttpTransport, LoadOptions, Overrides,
    PolicyClient, Reply,
};

#[derive(Clone, Default, Debug, Eq, PartialEq, arrrg_derive::CommandLine)]
struct Options {
    #[arrrg(optional, "Path to a TOML configuration file")]
    config: Option<String>,
    #[arrrg(optional, "Ranger policy endpoint URL")]
    url: Option<String>,
    #[arrrg(optional, "Ranger user for basic authentication")]
    username: Option<String>,
    #[arrrg(flag, "Skip TLS certificate verification (insecure)")]
    insecure: bool,
    #[arrrg(optional, "Log filter, e.g. info or policychat=debug")]
    log_level: Option<String>,
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (options, free) =
        Options::from_command_line_relaxed("USAGE: policychat [OPTIONS] [MESSAGE...]");
    let load = LoadOptions {
        config_path: options.config.map(PathBuf::from),
        overrides: Overrides {
            url: options.url,
            username: options.username,
            insecure: options.insecure,
            log_level: options.log_level,
        },
    };
    let config = match Config::load(&load) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(&config);

    let api_key = config
        .classifier
        .api_key
        .as_ref()
        .map(|key| key.expose_secret().to_string());
    let classifier = ClaudeClassifier::new(api_key, config.classifier.max_tokens)?;
    let client = PolicyClient::new(HttpTransport::new(&config.ranger)?);
    let mut session = ChatSession::new(Dispatcher::new(classifier, client));

    if !free.is_empty() {
        let message = free.join(" ");
        println!("{}", session.respond(&message, &[]).await);
        return Ok(());
    }

    println!("Apache Ranger Policy Chatbot");
    println!("Interact with Apache Ranger Policy Manager using natural language.");
    println!("Type /history to see this conversation, /quit to leave.");
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("policychat> ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                match session.process_line(&line).await {
                    Reply::Show(text) => println!("{text}"),
                    Reply::Nothing => {}
                    Reply::Quit => break,
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
