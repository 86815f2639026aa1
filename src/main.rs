use clap::{Parser, Subcommand};
use movie_chat::Result;
use movie_chat::commands::{build_index, run_chat, search, serve_web, show_status};
use movie_chat::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "movie-chat")]
#[command(about = "Chat about movies, answered from an indexed set of Wikipedia plots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the Azure OpenAI connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the movie index from the Wikipedia Movie Plots CSV
    Index {
        /// Path of the raw dataset (defaults to the configured file name)
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Where to write the filtered movie list
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a similarity search against the index
    Search {
        /// Free-text description of the movies to find
        query: String,
        /// Only return movies whose genre mentions this term
        #[arg(long)]
        genre: Option<String>,
        /// Number of results (defaults to the configured k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Chat in the terminal
    Chat,
    /// Serve the chat page in the browser
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show configuration, deployment and index health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index { dataset, output } => {
            build_index(dataset, output).await?;
        }
        Commands::Search { query, genre, k } => {
            search(query, genre, k).await?;
        }
        Commands::Chat => {
            run_chat().await?;
        }
        Commands::Serve { host, port } => {
            serve_web(host, port).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
