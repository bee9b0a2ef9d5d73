use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "media-processor",
    about = "Media Processor - transcribe, summarize, and re-voice media through a staged HTTP pipeline",
    version,
    long_about = "An HTTP pipeline service for media transformation. Accepts uploads or \
YouTube URLs and chains audio extraction, transcription, summarization, speech \
synthesis, and tempo change as independently retryable stages."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Bind port (overrides the config file)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Inspect or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
