use clap::{Parser, Subcommand};
use dotenv::dotenv;
use insight_rs::eval::openai::OpenAiEvaluator;
use insight_rs::insight::essay::EssayPipeline;
use insight_rs::insight::server;

use std::io::Read;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate one essay and print the report
    Evaluate {
        /// The essay text; read from stdin when omitted
        #[arg(short, long)]
        essay: Option<String>,

        /// The model to use
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model: String,
    },
    /// Start the evaluation HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// The model to use
        #[arg(short, long, default_value = "gpt-4o-mini")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Evaluate { essay, model } => {
            let essay = match essay {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };

            let evaluator = Arc::new(OpenAiEvaluator::new(model)?);
            let pipeline = EssayPipeline::new(evaluator)?;

            let report = pipeline.evaluate(&essay).await?;

            println!("Language:  {}", report.language_feedback);
            println!("Grammar:   {}", report.grammar_feedback);
            println!("Structure: {}", report.structured_feedback);
            println!();
            println!("Overall feedback: {}", report.overall_feedback);
            println!(
                "Scores: {:?} (average {:.2})",
                report.scores, report.average_score
            );
            // Mirrors the pipeline's branch policy exactly
            if report.approved() {
                println!("Essay approved.");
            } else {
                println!("Essay needs improvement.");
            }
        }
        Commands::Serve { port, model } => {
            let evaluator = Arc::new(OpenAiEvaluator::new(model)?);
            let pipeline = Arc::new(EssayPipeline::new(evaluator)?);
            server::serve(port, pipeline).await?;
        }
    }

    Ok(())
}
