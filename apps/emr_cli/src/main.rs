use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use composer_core::{
    config::{apply_env_overrides, load_settings_from},
    load_settings, ClinicalNotesApi, DiagnosisCandidate, DraftCommand, HttpEmrClient,
    LookupCategory, MasterDataApi, MasterLookup, NoteComposer, OrderCandidate, PatientChart,
    PatientRegistryApi, Settings, SkipReason, SubmitOutcome,
};
use shared::{
    domain::{Gender, OrderType, PatientId},
    protocol::{MasterItem, PatientCreateRequest},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emr", about = "Clinical note composer for the EMR API")]
struct Cli {
    /// Settings file; defaults to ./emr.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Patients(PatientsCommand),
    /// One-shot master-data search.
    Search {
        #[arg(long, value_enum, default_value = "dx")]
        category: CategoryArg,
        query: String,
    },
    /// Composes one note for a patient and submits it.
    Compose {
        #[arg(long)]
        patient: i64,
        #[arg(long, default_value = "")]
        narrative: String,
        #[arg(long, default_value = "")]
        social: String,
        #[arg(long, default_value = "")]
        family: String,
        #[arg(long, value_parser = parse_visit_date)]
        visit_date: Option<DateTime<Utc>>,
        #[arg(long = "diagnosis")]
        diagnoses: Vec<String>,
        #[arg(long = "drug")]
        drugs: Vec<String>,
        #[arg(long = "test")]
        tests: Vec<String>,
        #[arg(long = "procedure")]
        procedures: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PatientsCommand {
    List,
    Show {
        id: i64,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, value_enum)]
        gender: GenderArg,
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long)]
        rrn: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        address: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Dx,
    Drug,
    Test,
    Proc,
}

impl From<CategoryArg> for LookupCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Dx => LookupCategory::Diagnosis,
            CategoryArg::Drug => LookupCategory::Order(OrderType::Drug),
            CategoryArg::Test => LookupCategory::Order(OrderType::Test),
            CategoryArg::Proc => LookupCategory::Order(OrderType::Proc),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum GenderArg {
    M,
    F,
    U,
}

impl From<GenderArg> for Gender {
    fn from(value: GenderArg) -> Self {
        match value {
            GenderArg::M => Gender::Male,
            GenderArg::F => Gender::Female,
            GenderArg::U => Gender::Other,
        }
    }
}

fn parse_visit_date(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC 3339 timestamp: {err}"))
}

fn settings_for(cli: &Cli) -> Settings {
    let mut settings = match &cli.config {
        Some(path) => {
            let mut settings = load_settings_from(path);
            apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
            settings
        }
        None => load_settings(),
    };
    if let Some(url) = &cli.api_base_url {
        settings.api_base_url = url.clone();
    }
    settings
}

/// Exact code match first, then exact name match; anything else is free text.
fn pick_match<'a>(items: &'a [MasterItem], arg: &str) -> Option<&'a MasterItem> {
    let arg = arg.trim();
    items
        .iter()
        .find(|item| item.code.eq_ignore_ascii_case(arg))
        .or_else(|| items.iter().find(|item| item.name.eq_ignore_ascii_case(arg)))
}

async fn diagnosis_candidate(lookup: &MasterLookup, arg: &str) -> DiagnosisCandidate {
    let items = lookup.resolve(LookupCategory::Diagnosis, arg).await;
    match pick_match(&items, arg) {
        Some(item) => DiagnosisCandidate::from_master(item),
        None => DiagnosisCandidate::free_text(arg),
    }
}

async fn order_candidate(
    lookup: &MasterLookup,
    item_type: OrderType,
    arg: &str,
) -> OrderCandidate {
    let items = lookup.resolve(LookupCategory::Order(item_type), arg).await;
    match pick_match(&items, arg) {
        Some(item) => OrderCandidate::from_master(item),
        None => OrderCandidate::free_text(arg),
    }
}

async fn run_patients(client: &HttpEmrClient, command: PatientsCommand) -> Result<()> {
    match command {
        PatientsCommand::List => {
            for patient in client.list_patients().await? {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    patient.id.0, patient.name, patient.gender, patient.birth_date
                );
            }
        }
        PatientsCommand::Show { id } => {
            let chart = PatientChart::load(client, PatientId(id)).await?;
            println!("{}", serde_json::to_string_pretty(chart.detail())?);
        }
        PatientsCommand::Create {
            name,
            gender,
            birth_date,
            rrn,
            phone,
            address,
        } => {
            let patient = client
                .create_patient(&PatientCreateRequest {
                    name,
                    gender: gender.into(),
                    birth_date,
                    rrn,
                    phone,
                    address,
                })
                .await?;
            println!("created patient_id={}", patient.id.0);
        }
    }
    Ok(())
}

struct ComposeArgs {
    patient: i64,
    narrative: String,
    social: String,
    family: String,
    visit_date: Option<DateTime<Utc>>,
    diagnoses: Vec<String>,
    orders: Vec<(OrderType, String)>,
}

async fn run_compose(
    client: Arc<HttpEmrClient>,
    settings: &Settings,
    args: ComposeArgs,
) -> Result<()> {
    let patient_id = PatientId(args.patient);
    let patient = client
        .find_patient(patient_id)
        .await?
        .ok_or_else(|| anyhow!("patient {} not found", args.patient))?;
    info!(patient_id = patient_id.0, name = %patient.name, "composing note");

    let composer = NoteComposer::open(
        patient_id,
        Arc::clone(&client) as Arc<dyn MasterDataApi>,
        Arc::clone(&client) as Arc<dyn ClinicalNotesApi>,
        settings.lookup_settings(),
    )
    .await;

    composer.apply(DraftCommand::SetNarrative(args.narrative)).await;
    composer.apply(DraftCommand::SetSocialHistory(args.social)).await;
    composer.apply(DraftCommand::SetFamilyHistory(args.family)).await;
    composer.apply(DraftCommand::SetVisitDate(args.visit_date)).await;

    for arg in &args.diagnoses {
        let candidate = diagnosis_candidate(composer.lookup(), arg).await;
        composer.pick_diagnosis(candidate).await;
    }
    for (item_type, arg) in &args.orders {
        let candidate = order_candidate(composer.lookup(), *item_type, arg).await;
        composer.select_order_type(*item_type).await;
        composer.pick_order(candidate).await;
    }

    let outcome = composer.submit().await;
    composer.close().await;

    match outcome {
        SubmitOutcome::Created { note: Some(note) } => {
            println!("{}", serde_json::to_string_pretty(&note)?);
            Ok(())
        }
        SubmitOutcome::Created { note: None } => {
            println!("note saved");
            Ok(())
        }
        SubmitOutcome::Failed { message } => Err(anyhow!(message)),
        SubmitOutcome::Skipped(SkipReason::EmptyNote) => {
            bail!("nothing to submit: the note is empty")
        }
        SubmitOutcome::Skipped(SkipReason::InFlight) => bail!("a submit is already in flight"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = settings_for(&cli);
    let client = Arc::new(HttpEmrClient::new(&settings).context("failed to create EMR client")?);
    debug!(base_url = %client.base_url(), "using EMR api");

    match cli.command {
        Command::Patients(command) => run_patients(&client, command).await?,
        Command::Search { category, query } => {
            let lookup = MasterLookup::new(
                Arc::clone(&client) as Arc<dyn MasterDataApi>,
                settings.lookup_settings(),
            );
            for item in lookup.resolve(category.into(), &query).await {
                println!(
                    "{}\t{}\t{}",
                    item.code,
                    item.name,
                    item.unit.as_deref().unwrap_or("")
                );
            }
        }
        Command::Compose {
            patient,
            narrative,
            social,
            family,
            visit_date,
            diagnoses,
            drugs,
            tests,
            procedures,
        } => {
            let orders = drugs
                .into_iter()
                .map(|arg| (OrderType::Drug, arg))
                .chain(tests.into_iter().map(|arg| (OrderType::Test, arg)))
                .chain(procedures.into_iter().map(|arg| (OrderType::Proc, arg)))
                .collect();
            run_compose(
                client,
                &settings,
                ComposeArgs {
                    patient,
                    narrative,
                    social,
                    family,
                    visit_date,
                    diagnoses,
                    orders,
                },
            )
            .await?;
        }
    }

    Ok(())
}
