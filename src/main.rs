use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use kafka_event_bus::builder::{ConsumerBuilder, EventBusBuilder};
use kafka_event_bus::converter::JsonConverter;
use kafka_event_bus::delivery::LoggingErrorHandler;
use kafka_event_bus::time::{SystemTimeProvider, TimeProvider};
use kafka_event_bus::topic::MessageRegistry;
use kafka_event_bus::{Config, MessageHandler};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "kafka-event-bus")]
#[command(about = "Publish and consume JSON events through a buffered Kafka event bus", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish one JSON document per stdin line
    Publish {
        /// Logical message name; resolved to a topic through [topics]
        #[arg(short, long)]
        message: String,

        /// Top-level field used as the message key (defaults to the line number)
        #[arg(short, long)]
        key_field: Option<String>,

        /// Seconds to keep flushing undelivered messages on shutdown
        #[arg(long, default_value_t = 30)]
        shutdown_timeout_secs: u64,
    },
    /// Print consumed JSON documents, one batch at a time
    Consume {
        /// Logical message name; resolved to a topic through [topics]
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting kafka-event-bus");
    info!("Loading configuration from {:?}", args.config);

    let mut config = match Config::from_file(&args.config) {
        Ok(cfg) => {
            info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        kafka_brokers = ?config.kafka.brokers,
        client_id = %config.kafka.client_id,
        buffer_length = config.producer.buffer_length.get(),
        batch_size = config.consumer.batch_size.get(),
        "Configuration summary"
    );

    match args.command {
        Command::Publish {
            message,
            key_field,
            shutdown_timeout_secs,
        } => {
            default_topic(&mut config, &message);
            publish(config, message, key_field, Duration::from_secs(shutdown_timeout_secs)).await
        }
        Command::Consume { message } => {
            default_topic(&mut config, &message);
            consume(config, message).await
        }
    }
}

/// Without an explicit override the topic is the logical message name.
fn default_topic(config: &mut Config, message: &str) {
    config
        .topics
        .entry(message.to_string())
        .or_insert_with(|| message.to_string());
}

async fn publish(
    config: Config,
    message: String,
    key_field: Option<String>,
    shutdown_timeout: Duration,
) -> anyhow::Result<()> {
    let registry = MessageRegistry::new().register::<Value>(message);
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let builder = EventBusBuilder::new(
        config,
        registry,
        JsonConverter,
        Arc::clone(&time),
        LoggingErrorHandler,
    )?;
    let (bus, service) = builder.for_message::<String, Value>()?;

    let stopping = CancellationToken::new();
    let flush_cancel = CancellationToken::new();
    let worker = tokio::spawn(service.run(stopping.clone(), flush_cancel.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping publisher");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                line_number += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let value: Value = match serde_json::from_str(&line) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(line = line_number, error = %e, "Skipping invalid JSON line");
                        continue;
                    }
                };
                let fallback = line_number.to_string();
                bus.publish(value, |value| extract_key(value, key_field.as_deref()).unwrap_or(fallback));
            }
        }
    }

    info!(published = line_number, "Input finished, shutting down");
    stopping.cancel();

    let flush_deadline = flush_cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = time.delay(shutdown_timeout, flush_deadline.clone()) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        flush_deadline.cancel();
    });

    worker.await??;
    Ok(())
}

fn extract_key(value: &Value, field: Option<&str>) -> Option<String> {
    match value.get(field?)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

struct PrintHandler;

#[async_trait]
impl MessageHandler<Option<String>, Value> for PrintHandler {
    async fn handle(
        &self,
        messages: Vec<(Option<String>, Value)>,
        _token: &CancellationToken,
    ) -> anyhow::Result<()> {
        info!(count = messages.len(), "Received batch");
        for (key, value) in messages {
            println!(
                "{}",
                serde_json::json!({ "key": key, "value": value })
            );
        }
        Ok(())
    }
}

async fn consume(config: Config, message: String) -> anyhow::Result<()> {
    let registry = MessageRegistry::new().register::<Value>(message);
    let builder = ConsumerBuilder::new(config, registry, JsonConverter)?;
    let service = builder.consumer::<Option<String>, Value, _>(PrintHandler)?;

    let stopping = CancellationToken::new();
    let worker = tokio::spawn(service.run(stopping.clone()));

    let signal_token = stopping.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping consumer");
        }
        signal_token.cancel();
    });

    worker.await??;
    Ok(())
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("kafka_event_bus=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("kafka_event_bus=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
