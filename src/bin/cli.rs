#![cfg(not(tarpaulin_include))]

use clap::Parser;
use log::info;
use pkm2pred::config::PredictorConfig;
use pkm2pred::predictor::DEFAULT_PERCENTAGE;
use pkm2pred::{HttpPredictionClient, Session, ShapedResults, UploadedFile};
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pkm2pred", version, about = "Classify PKM2 modulators from the command line")]
struct Cli {
    /// Compounds separated by commas or newlines (read from stdin when neither
    /// this nor --file is given)
    #[arg(long, conflicts_with = "file")]
    smiles: Option<String>,

    /// CSV, XLS or XLSX file with compounds in the first column
    #[arg(long)]
    file: Option<PathBuf>,

    /// Confidence interval for AC50 ranges, 1 to 99
    #[arg(long, default_value_t = DEFAULT_PERCENTAGE)]
    percentage: u8,

    /// Write the results table as CSV to this path
    #[arg(long)]
    export: Option<PathBuf>,

    #[command(flatten)]
    predictor: PredictorConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let session = Session::new(cli.predictor.limits());
    session.set_percentage(cli.percentage)?;

    if let Some(path) = &cli.file {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        session.select_file(UploadedFile::new(name, std::fs::read(path)?))?;
    } else if let Some(smiles) = &cli.smiles {
        session.set_text(smiles.as_str());
    } else {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        session.set_text(text);
    }

    let client = HttpPredictionClient::new(&cli.predictor.api_url, cli.predictor.timeout())?;
    let shaped = match session.submit(&client).await {
        Ok(shaped) => shaped,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    print_results(&shaped);

    if let Some(path) = &cli.export {
        match session.export_csv()? {
            Some(csv) => {
                std::fs::write(path, csv)?;
                info!("Results written to {}", path.display());
            }
            None => eprintln!("No results to export."),
        }
    }

    Ok(())
}

fn print_results(shaped: &ShapedResults) {
    if shaped.rows.is_empty() {
        println!("No results to display.");
    } else {
        println!("{:>4}  {:<40}  {:<12}  AC50 Range", "#", "Compound (SMILES)", "Type");
        for (index, row) in shaped.rows.iter().enumerate() {
            println!(
                "{:>4}  {:<40}  {:<12}  {}",
                index + 1,
                row.identifier,
                row.category,
                row.range_text
            );
        }

        let summary: Vec<String> = shaped
            .counts
            .iter()
            .map(|(category, count)| format!("{}: {}", category.as_str(), count))
            .collect();
        println!("\n{}", summary.join(", "));
    }

    if !shaped.batch_errors.is_empty() {
        println!("\nSMILES Processing Errors:");
        for failure in &shaped.batch_errors {
            println!("  Input: \"{}\" - Error: {}", failure.input, failure.error);
        }
    }
}
