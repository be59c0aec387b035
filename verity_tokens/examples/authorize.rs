use clap::Parser;
use verity_tokens::{OAuthClient, OAuthClientConfig, SharedToken, DEFAULT_EXPIRY_THRESHOLD};

#[derive(Debug, Parser)]
struct Opts {
    /// The client ID registered with Verity
    #[clap(long, env = "VERITY_CLIENT_ID")]
    client_id: String,

    /// The client secret registered with Verity
    #[clap(long, env = "VERITY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// The redirect URI registered with Verity
    #[clap(long, env = "VERITY_REDIRECT_URI")]
    redirect_uri: String,

    /// Scopes to request
    #[clap(
        long,
        env = "VERITY_SCOPES",
        value_delimiter = ' ',
        default_value = "record:read"
    )]
    scopes: Vec<String>,

    /// An authorization code received on the redirect URI; when absent,
    /// only the authorization URL is printed
    #[clap(long)]
    code: Option<String>,

    /// Revoke the token once it has been obtained
    #[clap(long)]
    revoke: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let config = OAuthClientConfig::new(opts.client_id, opts.client_secret, &opts.redirect_uri)?;
    let client = OAuthClient::new(config)?;

    let Some(code) = opts.code else {
        let request = client.authorization_url(&opts.scopes, None)?;
        println!("Open this URL to authorize:\n\n  {}\n", request.url);
        println!("Expect `state={}` on the redirect.", request.state);
        return Ok(());
    };

    let token = client.exchange_code_for_token(code)?;
    tracing::info!(
        token = format_args!("{:#?}", token),
        "obtained access token"
    );

    let introspection = client.introspect_token(&token)?;
    tracing::info!(
        active = introspection.active,
        scope = %introspection.scope,
        "introspected token"
    );

    let shared = SharedToken::new(token);
    let current = shared.refresh_if_expiring(DEFAULT_EXPIRY_THRESHOLD)?;
    tracing::info!(
        expires_at = current.expires_at().map(|t| t.0),
        "token ready for use"
    );

    if opts.revoke {
        let revoked = shared.revoke()?;
        tracing::info!(revoked, "requested revocation");
    }

    Ok(())
}
