use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use klaim_core::{
    ClaimService, CoreConfig, DiagnosisCode, FileStore, Gender, NewPatient, NonEmptyText,
    Patient, PatientStatus, ReferenceTemplate, Severity,
};
use klaim_genai::{GenAiConfig, HttpGenerativeLookup};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Service = ClaimService<FileStore, HttpGenerativeLookup>;

#[derive(Parser)]
#[command(name = "klaim")]
#[command(about = "INA-CBG claim verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    List,
    /// Register a patient
    AddPatient {
        /// Medical record number
        mrn: String,
        /// Full name
        name: String,
        /// male/female (L/P accepted)
        gender: String,
        /// Date of birth (YYYY-MM-DD)
        dob: String,
        /// BPJS card number
        #[arg(long, default_value = "")]
        bpjs: String,
    },
    /// Resolve a diagnosis code without recording it
    Resolve {
        code: String,
        /// Clinical context for the generative lookup
        #[arg(long)]
        hint: Option<String>,
    },
    /// Resolve a diagnosis code and record it for a patient
    Record {
        patient_id: String,
        code: String,
        #[arg(long)]
        hint: Option<String>,
        /// Description to record instead of the resolved one
        #[arg(long)]
        description: Option<String>,
    },
    /// Toggle a checklist item on a diagnosis
    Toggle {
        patient_id: String,
        diagnosis_id: String,
        item_id: String,
    },
    /// Set billed amount and tariff override (omitted values are cleared)
    SetCosts {
        patient_id: String,
        #[arg(long)]
        billing: Option<u64>,
        /// Manual INA-CBG tariff override
        #[arg(long)]
        tariff: Option<u64>,
    },
    /// Set the patient's care status (admitted, outpatient, discharged)
    SetStatus { patient_id: String, status: String },
    /// Show the effective tariff for a patient
    Tariff { patient_id: String },
    /// Show population totals and per-patient variance
    Summary,
    /// List the reference catalog
    Catalog,
    /// Append a reference template to the catalog
    AddTemplate {
        code: String,
        description: String,
        /// INA-CBG severity level (I, II, III)
        #[arg(long, default_value = "I")]
        severity: Severity,
        /// Catalog tariff in rupiah
        #[arg(long)]
        tariff: Option<u64>,
        /// Required claim document (repeatable)
        #[arg(long = "document")]
        documents: Vec<String>,
    },
    /// Remove every template for a code from the catalog
    RemoveTemplate { code: String },
    /// Append templates from a delimited catalog file
    ImportCatalog { file: PathBuf },
    /// Write the catalog as semicolon-separated text
    ExportCatalog {
        /// Output file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_gender(value: &str) -> Result<Gender, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "male" | "m" | "l" | "laki-laki" => Ok(Gender::Male),
        "female" | "f" | "p" | "perempuan" => Ok(Gender::Female),
        other => Err(format!("unknown gender '{other}'")),
    }
}

fn parse_status(value: &str) -> Result<PatientStatus, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "admitted" | "rawat inap" => Ok(PatientStatus::Admitted),
        "outpatient" | "rawat jalan" => Ok(PatientStatus::Outpatient),
        "discharged" | "pulang" => Ok(PatientStatus::Discharged),
        other => Err(format!("unknown status '{other}'")),
    }
}

fn print_patient(patient: &Patient) {
    println!(
        "ID: {}, MRN: {}, Name: {}, Status: {:?}, Diagnoses: {}",
        patient.id,
        patient.mrn,
        patient.name,
        patient.status,
        patient.diagnoses.len()
    );
    if let Some(diagnosis) = patient.active_diagnosis() {
        let completion = diagnosis.completion();
        println!(
            "  Active: {} {} (severity {}), documents {}%",
            diagnosis.code,
            diagnosis.description,
            diagnosis.severity,
            completion.percent()
        );
        for item in &diagnosis.checklist {
            let mark = if item.is_checked { "x" } else { " " };
            println!("    [{}] {} ({})", mark, item.name, item.id);
        }
    }
}

fn build_service() -> Result<Service, Box<dyn std::error::Error>> {
    let cfg = CoreConfig::from_env_values(
        std::env::var("KLAIM_DATA_DIR").ok(),
        std::env::var("KLAIM_LOOKUP_TIMEOUT_SECS").ok(),
        std::env::var("KLAIM_HOSPITAL_NAME").ok(),
    )?;

    let lookup = HttpGenerativeLookup::new(GenAiConfig::from_values(
        std::env::var("KLAIM_GENAI_ENDPOINT").ok(),
        std::env::var("KLAIM_GENAI_MODEL").ok(),
        std::env::var("KLAIM_GENAI_API_KEY").ok(),
        cfg.lookup_timeout(),
    ))?;

    let store = FileStore::new(cfg.data_dir());
    let service = ClaimService::new(Arc::new(cfg), store, lookup);
    service.seed_catalog_if_empty()?;
    Ok(service)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("klaim=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'klaim --help' for commands");
        return Ok(());
    };

    let service = build_service()?;

    match command {
        Commands::List => match service.list_patients() {
            Ok(patients) if patients.is_empty() => println!("No patients found."),
            Ok(patients) => patients.iter().for_each(print_patient),
            Err(e) => eprintln!("Error listing patients: {}", e),
        },
        Commands::AddPatient {
            mrn,
            name,
            gender,
            dob,
            bpjs,
        } => {
            let new_patient = NewPatient {
                mrn: NonEmptyText::new(mrn)?,
                bpjs_number: bpjs,
                name: NonEmptyText::new(name)?,
                gender: parse_gender(&gender)?,
                dob: NaiveDate::parse_from_str(dob.trim(), "%Y-%m-%d")?,
                status: PatientStatus::Admitted,
            };
            match service.add_patient(new_patient) {
                Ok(patient) => println!("Registered patient with ID: {}", patient.id),
                Err(e) => eprintln!("Error registering patient: {}", e),
            }
        }
        Commands::Resolve { code, hint } => {
            match service.resolve(&code, hint.as_deref()).await {
                Ok(resolution) => {
                    let details = resolution.details();
                    println!(
                        "{} {} (severity {}) [{}]",
                        details.code,
                        details.description,
                        details.severity,
                        resolution.source()
                    );
                    for document in &details.required_documents {
                        println!("  - {}", document);
                    }
                }
                Err(e) => eprintln!("Error resolving {}: {}", code, e),
            }
        }
        Commands::Record {
            patient_id,
            code,
            hint,
            description,
        } => match service
            .record_diagnosis(&patient_id, &code, hint.as_deref(), description.as_deref())
            .await
        {
            Ok(recorded) => {
                println!("Recorded {} ({} resolution)", code.trim(), recorded.source);
                print_patient(&recorded.patient);
            }
            Err(e) => eprintln!("Error recording diagnosis: {}", e),
        },
        Commands::Toggle {
            patient_id,
            diagnosis_id,
            item_id,
        } => match service.toggle_checklist_item(&patient_id, &diagnosis_id, &item_id) {
            Ok(patient) => print_patient(&patient),
            Err(e) => eprintln!("Error toggling checklist item: {}", e),
        },
        Commands::SetCosts {
            patient_id,
            billing,
            tariff,
        } => match service.update_costs(&patient_id, billing, tariff) {
            Ok(_) => println!("Updated costs for patient: {}", patient_id),
            Err(e) => eprintln!("Error updating costs: {}", e),
        },
        Commands::SetStatus { patient_id, status } => {
            match service.update_status(&patient_id, parse_status(&status)?) {
                Ok(patient) => println!("Patient {} is now {:?}", patient.id, patient.status),
                Err(e) => eprintln!("Error updating status: {}", e),
            }
        }
        Commands::Tariff { patient_id } => match service.patient_tariff(&patient_id) {
            Ok(tariff) => println!("Tariff: {} ({})", tariff.amount, tariff.source),
            Err(e) => eprintln!("Error computing tariff: {}", e),
        },
        Commands::Summary => match (service.cost_summary(), service.cost_breakdown()) {
            (Ok(summary), Ok(breakdown)) => {
                println!("{}", service.config().hospital_name());
                for cost in breakdown {
                    println!(
                        "  {}: billing {}, tariff {} ({}), variance {}",
                        cost.patient_id, cost.billing, cost.tariff, cost.tariff_source, cost.variance
                    );
                }
                println!(
                    "Total billing: {}, total tariff: {}, variance: {}",
                    summary.total_billing, summary.total_tariff, summary.variance
                );
            }
            (Err(e), _) | (_, Err(e)) => eprintln!("Error summarising costs: {}", e),
        },
        Commands::Catalog => match service.catalog() {
            Ok(catalog) => {
                for template in catalog.templates() {
                    let tariff = template
                        .tariff
                        .map_or_else(|| "-".to_string(), |t| t.to_string());
                    println!(
                        "{} {} (severity {}), tariff {}, documents: {}",
                        template.code,
                        template.description,
                        template.severity,
                        tariff,
                        template.required_documents.join(", ")
                    );
                }
                for duplicate in catalog.duplicate_codes() {
                    eprintln!(
                        "Warning: code {} appears at positions {:?}; the first is used",
                        duplicate.code, duplicate.positions
                    );
                }
            }
            Err(e) => eprintln!("Error reading catalog: {}", e),
        },
        Commands::AddTemplate {
            code,
            description,
            severity,
            tariff,
            documents,
        } => {
            let template = ReferenceTemplate {
                code: DiagnosisCode::parse(&code)?,
                description: NonEmptyText::new(description)?,
                severity,
                tariff,
                required_documents: documents
                    .iter()
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .collect(),
            };
            match service.add_template(template) {
                Ok(catalog) => println!("Catalog now holds {} templates", catalog.len()),
                Err(e) => eprintln!("Error adding template: {}", e),
            }
        }
        Commands::RemoveTemplate { code } => match service.remove_template(&code) {
            Ok(catalog) => println!("Removed {}; catalog now holds {} templates", code.trim(), catalog.len()),
            Err(e) => eprintln!("Error removing template: {}", e),
        },
        Commands::ImportCatalog { file } => {
            let text = std::fs::read_to_string(&file)?;
            match service.import_catalog(&text) {
                Ok(report) => {
                    println!(
                        "Imported {} templates from {}",
                        report.imported_count(),
                        file.display()
                    );
                    for row in &report.skipped {
                        println!("  skipped line {}: {}", row.line, row.reason);
                    }
                }
                Err(e) => eprintln!("Error importing catalog: {}", e),
            }
        }
        Commands::ExportCatalog { output } => match service.export_catalog() {
            Ok(text) => match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("Catalog written to {}", path.display());
                }
                None => print!("{}", text),
            },
            Err(e) => eprintln!("Error exporting catalog: {}", e),
        },
    }

    Ok(())
}
