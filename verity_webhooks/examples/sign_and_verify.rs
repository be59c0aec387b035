use std::io::Read;

use clap::Parser;
use verity_clock::{Clock, System};
use verity_webhooks::{calculate_signature, Handler, RawWebhookRequest};

#[derive(Debug, Parser)]
struct Opts {
    /// The webhook signing secret
    #[clap(long, env = "VERITY_WEBHOOK_SECRET", hide_env_values = true)]
    secret: String,

    /// Signature header of a received delivery; when absent, the body is
    /// signed with the current time instead
    #[clap(long)]
    signature: Option<String>,

    /// Timestamp header of a received delivery
    #[clap(long)]
    timestamp: Option<String>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut body = Vec::new();
    std::io::stdin().read_to_end(&mut body)?;

    let timestamp = opts
        .timestamp
        .unwrap_or_else(|| System.now().to_string());
    let signature = match opts.signature {
        Some(signature) => signature,
        None => {
            let signature = calculate_signature(&body, &timestamp, &opts.secret);
            println!("X-Verity-Signature: t={} {}", timestamp, signature);
            signature
        }
    };

    let request = RawWebhookRequest {
        headers: [
            ("X-Verity-Signature".to_owned(), signature),
            ("X-Verity-Timestamp".to_owned(), timestamp),
        ]
        .into_iter()
        .collect(),
        body,
    };

    let event = Handler::new(&opts.secret)?.parse_and_verify(&request)?;
    tracing::info!(
        id = event.id(),
        event_type = event.raw_type(),
        record_id = event.record_id(),
        "verified delivery"
    );

    Ok(())
}
