use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use referral_assist::{AssistConfig, Assistant, Credential, GeminiClient};
use referral_core::{
    bounds, derive_graph, markers, ForceLayout, GraphConfig, LayoutEngine, PatientRecord, Sex,
    Viewport,
};
use referral_store::{apply_extraction, JsonFileStore, NewPatient, RecordStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "referral-cli",
    about = "Track patient referrals and export the referral network."
)]
struct Args {
    /// JSON file holding the patient list.
    #[arg(short, long, env = "REFERRAL_STORE", default_value = "patients.json")]
    store: PathBuf,

    /// Key for the generative-language API.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show stored patients.
    List,
    /// Register a new patient.
    Add(PatientFields),
    /// Edit an existing patient; omitted fields stay unchanged.
    Update {
        id: String,
        #[command(flatten)]
        fields: PatientFields,
    },
    Delete {
        id: String,
    },
    /// Print the referral network as JSON.
    Graph,
    /// Print the referral network with force-directed positions.
    Layout {
        #[arg(long, default_value_t = 1200.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },
    /// Print map markers for geocoded patients.
    Markers,
    /// Summarize referral trends with the AI assistant.
    Insights,
    /// Extract clinical fields from a PDF, optionally merging them into a record.
    Extract {
        pdf: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
    /// Resolve a place to coordinates, optionally storing them on a record.
    Geocode {
        place: String,
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct PatientFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    commune: Option<String>,
    #[arg(long)]
    referrer: Option<String>,
    #[arg(long)]
    relationship: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    birth_date: Option<NaiveDate>,
    /// masculino, femenino or no-especificado
    #[arg(long, value_parser = parse_sex)]
    sex: Option<Sex>,
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    medications: Option<String>,
    #[arg(long)]
    contraceptive: Option<String>,
    #[arg(long)]
    last_treatment: Option<String>,
    #[arg(long)]
    photo_url: Option<String>,
}

fn parse_sex(value: &str) -> Result<Sex, String> {
    Sex::parse(value).ok_or_else(|| format!("unknown sex category: {value}"))
}

impl PatientFields {
    fn into_draft(self) -> anyhow::Result<NewPatient> {
        let Some(name) = self.name else {
            bail!("--name is required for a new patient");
        };
        Ok(NewPatient {
            name,
            photo_url: self.photo_url,
            commune: self.commune.unwrap_or_default(),
            location_details: None,
            referrer_name: self.referrer.unwrap_or_default(),
            relationship: self.relationship.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            birth_date: self.birth_date,
            sex: self.sex,
            diagnosis: self.diagnosis.unwrap_or_default(),
            medications: self.medications.unwrap_or_default(),
            contraceptive: self.contraceptive.unwrap_or_default(),
            last_treatment: self.last_treatment.unwrap_or_default(),
        })
    }

    fn apply(self, record: &mut PatientRecord) {
        let set = |slot: &mut String, value: Option<String>| {
            if let Some(value) = value {
                *slot = value;
            }
        };
        set(&mut record.name, self.name);
        set(&mut record.commune, self.commune);
        set(&mut record.referrer_name, self.referrer);
        set(&mut record.relationship, self.relationship);
        set(&mut record.notes, self.notes);
        set(&mut record.diagnosis, self.diagnosis);
        set(&mut record.medications, self.medications);
        set(&mut record.contraceptive, self.contraceptive);
        set(&mut record.last_treatment, self.last_treatment);
        if self.birth_date.is_some() {
            record.birth_date = self.birth_date;
        }
        if self.sex.is_some() {
            record.sex = self.sex;
        }
        if let Some(photo) = self.photo_url {
            record.photo_url = Some(photo).filter(|p| !p.is_empty());
        }
    }
}

fn assistant(api_key: Option<String>) -> anyhow::Result<Assistant<GeminiClient>> {
    let key = api_key.context("An API key is required (--api-key or GEMINI_API_KEY)")?;
    let config = AssistConfig::default();
    let client = GeminiClient::new(&config, Credential::new(key))?;
    Ok(Assistant::new(client, config))
}

fn find(store: &JsonFileStore, id: &str) -> anyhow::Result<PatientRecord> {
    store
        .get(id)?
        .with_context(|| format!("No patient with id {id}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut store = JsonFileStore::new(&args.store);

    match args.command {
        Command::List => {
            let today = Utc::now().date_naive();
            for p in store
                .list()
                .with_context(|| format!("Could not read {:?}", args.store))?
            {
                let age = p
                    .age_on(today)
                    .map(|a| format!("{a} años"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{} ({})\t{}",
                    p.id, p.name, p.commune, p.referrer_name, p.relationship, age
                );
            }
        }
        Command::Add(fields) => {
            let records = store.create(fields.into_draft()?)?;
            if let Some(created) = records.last() {
                println!("{}", created.id);
            }
        }
        Command::Update { id, fields } => {
            let mut record = find(&store, &id)?;
            fields.apply(&mut record);
            store.update(record)?;
        }
        Command::Delete { id } => {
            store.delete(&id)?;
        }
        Command::Graph => {
            let graph = derive_graph(&store.list()?, &GraphConfig::default());
            print_json(&graph)?;
        }
        Command::Layout { width, height } => {
            let graph = derive_graph(&store.list()?, &GraphConfig::default());
            let layout = ForceLayout::default().layout(&graph, Viewport { width, height });
            print_json(&serde_json::json!({ "graph": graph, "layout": layout }))?;
        }
        Command::Markers => {
            let found = markers(&store.list()?);
            let extent = bounds(&found);
            print_json(&serde_json::json!({ "markers": found, "bounds": extent }))?;
        }
        Command::Insights => {
            let records = store.list()?;
            println!("{}", assistant(args.api_key)?.insights(&records));
        }
        Command::Extract { pdf, id } => {
            let bytes = std::fs::read(&pdf).with_context(|| format!("Could not read {pdf:?}"))?;
            let Some(fields) = assistant(args.api_key)?.extract_pdf(&bytes) else {
                bail!("No fields could be extracted from {pdf:?}");
            };
            if let Some(id) = id {
                let mut record = find(&store, &id)?;
                apply_extraction(&mut record, &fields);
                store.update(record)?;
                tracing::info!(%id, "merged extracted fields");
            }
            print_json(&fields)?;
        }
        Command::Geocode { place, id } => {
            let Some(coordinates) = assistant(args.api_key)?.coordinates(&place) else {
                bail!("Could not resolve {place:?}");
            };
            if let Some(id) = id {
                let mut record = find(&store, &id)?;
                record.set_coordinates(coordinates);
                store.update(record)?;
            }
            print_json(&coordinates)?;
        }
    }

    Ok(())
}
