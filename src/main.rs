//! # SEALCTL CLI
//!
//! Command-line driver for the sealed secret reconciler.
//!
//! Each lifecycle subcommand loads a JSON state file holding the last applied
//! specification and its reconciliation record, runs one operation, and
//! writes the state back.
//!
//! ## Usage
//!
//! ```bash
//! # Seal and apply a secret, creating the state file
//! sealctl create --spec db.yaml --state db.state.json
//!
//! # Check the applied secret still exists
//! sealctl read --state db.state.json
//!
//! # Reseal after editing the specification
//! sealctl update --spec db.yaml --state db.state.json
//!
//! # Remove the sealed secret from the cluster
//! sealctl delete --state db.state.json
//!
//! # Print a sealed manifest using a local certificate
//! sealctl seal --spec db.yaml --cert cert.pem
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kube::config::{Config, KubeConfigOptions};
use kube::Client;
use sealed_secret_reconciler::manifest::{normalize, parse_secret, render};
use sealed_secret_reconciler::seal::{key, seal, KubeCertificateFetcher};
use sealed_secret_reconciler::store::KubeManifestStore;
use sealed_secret_reconciler::{
    ReconcilerConfig, ReconciliationRecord, Reconciler, Sealer, SealingScope, SecretSpec,
    UpdateOutcome,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Sealed secret reconciler CLI
#[derive(Parser)]
#[command(name = "sealctl", version = VERSION)]
#[command(
    about = "Seal Kubernetes secrets and reconcile them against a cluster",
    long_about = None,
    after_help = "\
Examples:
  sealctl create --spec db.yaml --state db.state.json
  sealctl update --spec db.yaml --state db.state.json --retry-count 5
  sealctl seal --spec db.yaml --cert cert.pem --scope strict
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes context to use (defaults to the current context)
    #[arg(short, long, global = true)]
    context: Option<String>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Flags that take precedence over environment configuration
#[derive(Args)]
struct ConfigOverrides {
    /// Name of the SealedSecrets controller service
    #[arg(long, global = true)]
    controller_name: Option<String>,

    /// Namespace of the SealedSecrets controller service
    #[arg(long, global = true)]
    controller_namespace: Option<String>,

    /// Apply retries after the first attempt
    #[arg(long, global = true)]
    retry_count: Option<u32>,

    /// Sealing scope: strict, namespace-wide, or cluster-wide
    #[arg(long, global = true)]
    scope: Option<SealingScope>,

    /// Seal secrets that carry no data
    #[arg(long, global = true)]
    allow_empty_data: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a specification and apply it to the cluster
    Create {
        /// Secret specification (YAML)
        #[arg(long, value_name = "FILE")]
        spec: PathBuf,
        /// State file to create
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Check whether the recorded sealed secret still exists
    Read {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Reseal and reapply after the specification changed
    Update {
        /// New secret specification (YAML)
        #[arg(long, value_name = "FILE")]
        spec: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Delete the recorded sealed secret
    Delete {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Print a sealed manifest without applying it
    Seal {
        /// Secret specification (YAML)
        #[arg(long, value_name = "FILE", conflicts_with = "secret", required_unless_present = "secret")]
        spec: Option<PathBuf>,
        /// Plaintext Secret manifest (YAML) to seal as-is
        #[arg(long, value_name = "FILE")]
        secret: Option<PathBuf>,
        /// Local controller certificate instead of fetching it
        #[arg(long, value_name = "FILE")]
        cert: Option<PathBuf>,
    },
    /// Print the JSON schema of the secret specification
    Schema,
}

/// Persisted between lifecycle invocations
#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    spec: Option<SecretSpec>,
    #[serde(default)]
    record: ReconciliationRecord,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealctl=info,sealed_secret_reconciler=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.overrides.apply(ReconcilerConfig::from_env());

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Schema => schema_command(),
        Commands::Seal { spec, secret, cert } => {
            seal_command(cli.context, config, spec, secret, cert, &token).await
        }
        Commands::Create { spec, state } => {
            let reconciler = reconciler(cli.context, config).await?;
            create_command(&reconciler, &spec, &state, &token).await
        }
        Commands::Read { state } => {
            let reconciler = reconciler(cli.context, config).await?;
            read_command(&reconciler, &state, &token).await
        }
        Commands::Update { spec, state } => {
            let reconciler = reconciler(cli.context, config).await?;
            update_command(&reconciler, &spec, &state, &token).await
        }
        Commands::Delete { state } => {
            let reconciler = reconciler(cli.context, config).await?;
            delete_command(&reconciler, &state, &token).await
        }
    }
}

impl ConfigOverrides {
    fn apply(self, mut config: ReconcilerConfig) -> ReconcilerConfig {
        if let Some(name) = self.controller_name {
            config.controller_name = name;
        }
        if let Some(namespace) = self.controller_namespace {
            config.controller_namespace = namespace;
        }
        if let Some(retry_count) = self.retry_count {
            config.apply_retry_count = retry_count;
        }
        if let Some(scope) = self.scope {
            config.scope = scope;
        }
        config.allow_empty_data |= self.allow_empty_data;
        config
    }
}

async fn client(context: Option<String>) -> Result<Client> {
    let Some(context) = context else {
        return Client::try_default()
            .await
            .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.");
    };

    let options = KubeConfigOptions {
        context: Some(context.clone()),
        ..KubeConfigOptions::default()
    };
    let config = Config::from_kubeconfig(&options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context '{context}'"))?;
    Client::try_from(config).context("Failed to create Kubernetes client")
}

async fn reconciler(context: Option<String>, config: ReconcilerConfig) -> Result<Reconciler> {
    let client = client(context).await?;
    Ok(Reconciler::new(
        Arc::new(KubeCertificateFetcher::new(client.clone())),
        Arc::new(KubeManifestStore::new(client)),
        config,
    ))
}

fn load_spec(path: &Path) -> Result<SecretSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read specification {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse specification {}", path.display()))
}

fn load_state(path: &Path) -> Result<State> {
    if !path.exists() {
        return Ok(State::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse state file {}", path.display()))
}

fn save_state(path: &Path, state: &State) -> Result<()> {
    let text = serde_json::to_string_pretty(state).context("Failed to encode state")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write state file {}", path.display()))
}

async fn create_command(
    reconciler: &Reconciler,
    spec_path: &Path,
    state_path: &Path,
    token: &CancellationToken,
) -> Result<()> {
    let spec = load_spec(spec_path)?;
    let mut state = load_state(state_path)?;

    let outcome = reconciler.create(&spec, &mut state.record, token).await;
    if outcome.is_ok() {
        state.spec = Some(spec.clone());
    }
    save_state(state_path, &state)?;

    let applied = outcome.with_context(|| format!("Failed to create {}", spec.resource()))?;
    println!("{}", applied.identity);
    Ok(())
}

async fn read_command(
    reconciler: &Reconciler,
    state_path: &Path,
    token: &CancellationToken,
) -> Result<()> {
    let mut state = load_state(state_path)?;
    let outcome = reconciler.read(&mut state.record, token).await;
    save_state(state_path, &state)?;

    let exists = outcome.context("Failed to read sealed secret")?;
    println!("{exists}");
    Ok(())
}

async fn update_command(
    reconciler: &Reconciler,
    spec_path: &Path,
    state_path: &Path,
    token: &CancellationToken,
) -> Result<()> {
    let new = load_spec(spec_path)?;
    let mut state = load_state(state_path)?;
    let old = state
        .spec
        .clone()
        .context("State file has no applied specification; run create first")?;

    let outcome = reconciler.update(&old, &new, &mut state.record, token).await;
    if matches!(outcome, Ok(UpdateOutcome::Applied(_))) {
        state.spec = Some(new.clone());
    }
    save_state(state_path, &state)?;

    match outcome.with_context(|| format!("Failed to update {}", new.resource()))? {
        UpdateOutcome::Applied(applied) => println!("{}", applied.identity),
        UpdateOutcome::Unchanged => info!("Nothing to update"),
    }
    Ok(())
}

async fn delete_command(
    reconciler: &Reconciler,
    state_path: &Path,
    token: &CancellationToken,
) -> Result<()> {
    let mut state = load_state(state_path)?;
    let outcome = reconciler.delete(&mut state.record, token).await;
    if outcome.is_ok() {
        state.spec = None;
    }
    save_state(state_path, &state)?;
    outcome.context("Failed to delete sealed secret")
}

async fn seal_command(
    context: Option<String>,
    config: ReconcilerConfig,
    spec_path: Option<PathBuf>,
    secret_path: Option<PathBuf>,
    cert_path: Option<PathBuf>,
    token: &CancellationToken,
) -> Result<()> {
    let (secret, controller, allow_empty_data) = match (spec_path, secret_path) {
        (Some(path), _) => {
            let spec = load_spec(&path)?;
            let allow_empty_data = config.allow_empty_data || spec.allow_empty_data;
            sealed_secret_reconciler::manifest::validate(&spec, allow_empty_data)?;
            let controller = spec.controller_identity.clone();
            (render(&spec), controller, allow_empty_data)
        }
        (None, Some(path)) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read secret {}", path.display()))?;
            (normalize(parse_secret(&text)?), None, config.allow_empty_data)
        }
        (None, None) => anyhow::bail!("One of --spec or --secret is required"),
    };

    let key = if let Some(path) = cert_path {
        let pem = std::fs::read(&path)
            .with_context(|| format!("Failed to read certificate {}", path.display()))?;
        key::extract(&pem, &path.display().to_string())?
    } else {
        let controller = controller.unwrap_or_else(|| sealed_secret_reconciler::ControllerIdentity {
            name: config.controller_name.clone(),
            namespace: config.controller_namespace.clone(),
        });
        let fetcher = Arc::new(KubeCertificateFetcher::new(client(context).await?));
        Sealer::new(fetcher, config.request_timeout())
            .fetch_key(&controller, token)
            .await?
    };

    let manifest = seal(secret, &key, config.scope, allow_empty_data)?;
    print!("{manifest}");
    Ok(())
}

fn schema_command() -> Result<()> {
    let schema = schemars::schema_for!(SecretSpec);
    println!(
        "{}",
        serde_json::to_string_pretty(&schema).context("Failed to encode schema")?
    );
    Ok(())
}
