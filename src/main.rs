use anyhow::{bail, Context};
use clap::Parser;
use ddb_kafka_relay::stream::StreamEvent;
use ddb_kafka_relay::{Config, Relay};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "ddb-kafka-relay")]
#[command(about = "Relays DynamoDB stream upserts onto a Kafka topic", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long, value_name = "FILE", help = "Stream events, one JSON document per line (default: stdin)")]
    input: Option<PathBuf>,

    #[arg(short, long, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, help = "Exit with an error if any record failed")]
    fail_on_error: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    info!("Starting ddb-kafka-relay");
    info!("Loading configuration from {:?}", args.config);

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))?;

    info!(
        kafka_brokers = ?config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        image_path = %config.relay.image_path,
        key_attributes = ?config.relay.key_attributes,
        max_in_flight = config.relay.max_in_flight,
        batch_timeout_ms = ?config.relay.batch_timeout_ms,
        "Configuration summary"
    );

    let relay = Relay::new(&config);

    let failed_batches = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {:?}", path))?;
            relay_lines(&relay, BufReader::new(file)).await?
        }
        None => relay_lines(&relay, BufReader::new(tokio::io::stdin())).await?,
    };

    if args.fail_on_error && failed_batches > 0 {
        bail!("{} batch(es) had failed records", failed_batches);
    }

    Ok(())
}

/// Relays each input line as one batch and returns how many batches had
/// failures.
async fn relay_lines<R>(relay: &Relay, reader: R) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();
    let mut failed_batches = 0;
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let output = match StreamEvent::from_json(&line) {
            Ok(event) => {
                let result = relay.handle(event).await;
                info!(line = line_no, "{}", result.summary());
                if !result.is_success() {
                    failed_batches += 1;
                }
                serde_json::to_string(&result)?
            }
            Err(e) => {
                error!(line = line_no, "{}", e);
                failed_batches += 1;
                serde_json::json!({ "line": line_no, "error": e.to_string() }).to_string()
            }
        };

        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    stdout.flush().await?;
    Ok(failed_batches)
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("ddb_kafka_relay=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("ddb_kafka_relay=info,warn"))
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
