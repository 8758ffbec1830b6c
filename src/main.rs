use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hr_docfill::api::{start_server, ApiState};
use hr_docfill::azure_openai::AzureOpenAiClient;
use hr_docfill::config::Settings;
use hr_docfill::docx::TemplateDocument;
use hr_docfill::fields::{extract_fields, WeekdayLocale};
use hr_docfill::filler::{fill_document, FillValues};
use hr_docfill::service::{filled_file_name, TemplateService};
use hr_docfill::sharepoint::SharePointClient;
use hr_docfill::store::OutputDir;

#[derive(Parser, Debug)]
#[command(name = "hr-docfill")]
#[command(about = "HR document templates: field extraction, question generation and DOCX filling", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Listen address (overrides BIND_ADDR)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Config file path (default: search for hr-docfill.toml upwards)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the fillable fields of a local template as JSON
    Inspect {
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        /// Weekday language of schedule tables (de, en)
        #[arg(long, default_value = "de")]
        locale: WeekdayLocale,
    },
    /// Fill a local template from a JSON answers file
    Fill {
        #[arg(value_name = "DOCX")]
        input: PathBuf,

        /// JSON with answers, selected_checkboxes and schedule_values
        #[arg(long, value_name = "JSON")]
        answers: PathBuf,

        /// Output .docx (default: <input_stem>_Filled.docx next to the input)
        #[arg(short, long, value_name = "DOCX")]
        output: Option<PathBuf>,

        #[arg(long, default_value = "de")]
        locale: WeekdayLocale,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hr_docfill=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command.unwrap_or(Command::Serve {
        bind: None,
        config: None,
    }) {
        Command::Serve { bind, config } => serve(bind, config).await,
        Command::Inspect { input, locale } => {
            let doc = TemplateDocument::open(&input)?;
            let fields = extract_fields(&doc.document, locale);
            println!("{}", serde_json::to_string_pretty(&fields)?);
            Ok(())
        }
        Command::Fill {
            input,
            answers,
            output,
            locale,
        } => {
            let text = std::fs::read_to_string(&answers)
                .with_context(|| format!("read answers: {}", answers.display()))?;
            let values: FillValues = serde_json::from_str(&text)
                .with_context(|| format!("parse answers: {}", answers.display()))?;
            let output = match output {
                Some(p) => p,
                None => {
                    let name = input
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "output.docx".to_string());
                    input.with_file_name(filled_file_name(&name))
                }
            };
            let mut doc = TemplateDocument::open(&input)?;
            let summary = fill_document(&mut doc.document, &values, locale);
            doc.save(&output)?;
            tracing::info!(
                output = %output.display(),
                paragraphs = summary.paragraphs_rewritten,
                schedule_cells = summary.schedule_cells_set,
                "filled"
            );
            Ok(())
        }
    }
}

async fn serve(bind: Option<String>, config: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = Settings::load(config.as_deref())?;
    let store = SharePointClient::connect(settings.sharepoint.clone())
        .await
        .context("connect to sharepoint")?;
    let generator = AzureOpenAiClient::new(&settings.azure_openai)?;
    let output = OutputDir::new(settings.output_folder.clone());
    tracing::info!(
        output = %output.root().display(),
        locale = ?settings.schedule_locale,
        "template service ready"
    );
    let service = TemplateService::new(
        Arc::new(store),
        Arc::new(generator),
        output,
        settings.schedule_locale,
    );
    let addr = bind.unwrap_or(settings.bind_addr);
    start_server(&addr, ApiState::new(service)).await
}
