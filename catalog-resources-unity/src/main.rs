use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal as _;

use catalog_resources_unity::{
    api::{ApiConfig, CatalogApi as _, HttpCatalogApi},
    external_location::output_properties,
    logging,
    provider::ExternalLocationProvider,
};

fn main() -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    match &args.command {
        Commands::Run { connection } => {
            set_up_logging(&args)?;
            let api = HttpCatalogApi::new(connection.to_config()?)?;
            catalog_resource::framework::run_main(ExternalLocationProvider::new(api)).await;
            Ok(())
        }
        Commands::Read { connection, name } => {
            set_up_logging(&args)?;
            let api = HttpCatalogApi::new(connection.to_config()?)?;
            let info = api
                .read_external_location(name)
                .await
                .with_context(|| format!("Could not read external location {}", name))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&output_properties(&info)?)?
            );
            Ok(())
        }
        Commands::GenerateMan => {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        }
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(
                *shell,
                &mut cmd,
                "catalog-resources-unity",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

fn set_up_logging(args: &Args) -> Result<()> {
    logging::set_up(&logging::Options {
        verbose: args.verbose,
        color: std::io::stderr().is_terminal(),
    })
}

/// Catalog resource provider for external locations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log every remote call and span
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct Connection {
    /// Base URL of the workspace that hosts the catalog
    #[arg(long, env = "DATABRICKS_HOST")]
    host: String,

    /// Bearer token for the catalog API
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl Connection {
    fn to_config(&self) -> Result<ApiConfig> {
        let host = url::Url::parse(&self.host)
            .with_context(|| format!("Invalid catalog host: {}", self.host))?;
        Ok(ApiConfig {
            host,
            token: self.token.clone(),
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as resource provider, answering one request on stdin
    Run {
        #[command(flatten)]
        connection: Connection,
    },

    /// Print the current state of an external location
    Read {
        #[command(flatten)]
        connection: Connection,

        /// Name of the external location
        #[arg(long)]
        name: String,
    },

    /// Generate markdown documentation
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
