use std::collections::BTreeMap;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use flagpole::{bucket, Config, DocumentStore, DynamoStore, StoreDocument};

/// Manage the feature flags and throttles stored in a DynamoDB flag
/// document.
#[derive(Parser)]
#[command(name = "flagpole", version, about)]
pub struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// DynamoDB table holding the flag document
    #[arg(long, default_value = "featureFlagStore")]
    table_name: String,

    /// Partition key of the flag document
    #[arg(long, default_value = "features")]
    record_name: String,

    /// AWS region override
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// DynamoDB endpoint override, for local instances
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,
}

impl StoreArgs {
    async fn connect(self) -> DynamoStore {
        let config = Config {
            table_name: self.table_name,
            record_name: self.record_name,
            region: self.region,
            endpoint_url: self.endpoint_url,
            ..Config::default()
        };
        DynamoStore::connect(&config).await
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print every feature and throttle in the document
    Ls,

    /// Print the bucket a hash input lands in for a throttle, for
    /// constructing whitelists
    Hash {
        /// Throttle key
        throttle: String,
        /// Input to hash
        input: String,
    },

    /// Inspect or change a single feature flag
    Feature {
        #[command(subcommand)]
        cmd: FeatureCommand,
    },
}

#[derive(Subcommand)]
enum FeatureCommand {
    /// Print the stored value of a feature
    Get { name: String },

    /// Set a feature flag to true
    Enable { name: String },

    /// Set a feature flag to false
    Disable { name: String },

    /// Remove a feature flag from the document
    Rm { name: String },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let Cli { store, command } = self;
        match command {
            Commands::Hash { throttle, input } => {
                println!("{}", bucket(&throttle, input.as_bytes()));
            }
            Commands::Ls => {
                let store = store.connect().await;
                let document = store.load().await.context("loading flag document")?;
                print_document(&document);
            }
            Commands::Feature { cmd } => {
                let store = store.connect().await;
                match cmd {
                    FeatureCommand::Get { name } => {
                        let document = store.load().await.context("loading flag document")?;
                        match document.features.get(&name) {
                            Some(value) => println!("{name}: {value}"),
                            None => bail!("no feature found: {name}"),
                        }
                    }
                    FeatureCommand::Enable { name } => {
                        store
                            .set_feature(&name, true)
                            .await
                            .context("setting flag")?;
                        println!("{name}: true");
                    }
                    FeatureCommand::Disable { name } => {
                        store
                            .set_feature(&name, false)
                            .await
                            .context("setting flag")?;
                        println!("{name}: false");
                    }
                    FeatureCommand::Rm { name } => {
                        store
                            .remove_feature(&name)
                            .await
                            .context("removing flag")?;
                        println!("{name} removed");
                    }
                }
            }
        }
        Ok(())
    }
}

fn print_document(document: &StoreDocument) {
    println!("features:");
    for (name, value) in document.features.iter().collect::<BTreeMap<_, _>>() {
        println!("  {name}: {value}");
    }
    println!("throttles:");
    for (name, throttle) in document.throttles.iter().collect::<BTreeMap<_, _>>() {
        let mut whitelist: Vec<_> = throttle.whitelist.iter().copied().collect();
        whitelist.sort_unstable();
        println!(
            "  {name}: probability={} disabled={} whitelist={whitelist:?}",
            throttle.probability, throttle.disabled
        );
    }
}
