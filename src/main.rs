use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Datelike, Local};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use inquire::error::InquireResult;
use inquire::{Confirm, CustomType, DateSelect, Select, Text};
use tracing_subscriber::EnvFilter;

use invoice_desk::api::ApiClient;
use invoice_desk::archive;
use invoice_desk::config::Settings;
use invoice_desk::entities::{EntityDraft, EntityKind, ProjectRecord, Registry, RegistryStore};
use invoice_desk::model::{ExpenseType, InvoiceDocument, InvoiceStatus, RateMode, TemplateDraft};
use invoice_desk::pdf::render::typst_available;
use invoice_desk::pdf::{HttpPdfService, PdfGenerator, TypstRenderer};
use invoice_desk::report;
use invoice_desk::split::MainEntity;
use invoice_desk::store::LocalStore;
use invoice_desk::workflow::InvoiceWorkflow;
use invoice_desk::{Error, Result};

// ==========================================
// Constants
// ==========================================
const ALL_ENTITIES_OPT: &str = "📦 All entities";
const SKIP_OPT: &str = "(skip)";

// ==========================================
// CLI Definition
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-desk", about = "Generate, edit and export invoices from entity billing chains")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List or manage invoice templates
    Templates {
        #[command(subcommand)]
        action: Option<TemplateAction>,
    },
    /// Print the entity tree of a template (mermaid)
    Tree { template: String },
    /// List the entities of a template that can be invoiced individually
    Entities { template: String },
    /// Generate one invoice covering every chain of a template
    Bulk {
        template: String,
        /// Only show main entities on the invoice
        #[arg(long)]
        no_hierarchy: bool,
        /// Save without asking
        #[arg(long)]
        save: bool,
    },
    /// Generate one invoice per entity
    Individual {
        template: String,
        /// `all` or an entity index (prompted when omitted)
        #[arg(long)]
        entity: Option<String>,
        #[arg(long)]
        no_hierarchy: bool,
        #[arg(long)]
        save: bool,
    },
    /// List saved invoices
    List,
    /// Show one invoice with its totals
    Show { id: String },
    /// Edit a saved invoice
    Edit { id: String },
    /// Delete a saved invoice
    Delete { id: String },
    /// Render one invoice to PDF
    Pdf {
        id: String,
        /// Output directory (defaults to <data_root>/output)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Render with the local typst template even when a PDF service is configured
        #[arg(long)]
        local: bool,
        /// Reveal the generated file
        #[arg(long)]
        open: bool,
    },
    /// Render every entity invoice of a template into one zip.
    ///
    /// Always compiles locally with typst, even when a PDF service is
    /// configured; only `pdf` goes through the service.
    PdfAll {
        template: String,
        #[arg(long)]
        no_hierarchy: bool,
        /// Also save the generated invoices
        #[arg(long)]
        save: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show summary of invoices
    Summary {
        /// Year to summarize (defaults to current year)
        year: Option<i32>,
    },
    /// Manage local clients, vendors, companies, consultants and projects
    Registry {
        kind: RegistryKind,
        #[command(subcommand)]
        action: Option<RegistryAction>,
    },
    /// Configure backend URL, data directory and PDF options
    Config,
}

#[derive(Subcommand)]
enum TemplateAction {
    List,
    Create,
    Update { id: String },
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum RegistryKind {
    Client,
    Vendor,
    Company,
    Consultant,
    Project,
}

impl RegistryKind {
    fn entity_kind(self) -> Option<EntityKind> {
        match self {
            RegistryKind::Client => Some(EntityKind::Client),
            RegistryKind::Vendor => Some(EntityKind::Vendor),
            RegistryKind::Company => Some(EntityKind::Company),
            RegistryKind::Consultant => Some(EntityKind::Consultant),
            RegistryKind::Project => None,
        }
    }
}

#[derive(Subcommand)]
enum RegistryAction {
    List,
    Add,
    Remove { id: u64 },
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        if Cli::command().print_help().is_err() {
            std::process::exit(1);
        }
        return;
    };

    if let Err(e) = run(command) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("invoice_desk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    let settings = Settings::load()?;
    let data_dir = settings.data_dir();
    fs::create_dir_all(&data_dir)?;

    let api = ApiClient::new(&settings.base_url)?;
    let mut workflow = InvoiceWorkflow::new(api, LocalStore::new(&data_dir), settings.tax_rate);

    match command {
        Commands::Templates { action } => template_command(&workflow, action.unwrap_or(TemplateAction::List))?,
        Commands::Tree { template } => {
            let script = workflow.backend().template_tree(&template)?;
            println!("{}", script);
        }
        Commands::Entities { template } => {
            let entities = workflow.main_entities(&template)?;
            if entities.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::entities_table(&entities));
            }
        }
        Commands::Bulk { template, no_hierarchy, save } => {
            let invoice = workflow.generate_bulk(&template, !no_hierarchy)?;
            print_preview(&workflow, &invoice);
            if save || ask(Confirm::new("Save this invoice?").with_default(false).prompt()) {
                let saved = workflow.save(&invoice)?;
                println!("✅ Invoice saved: {}", saved.invoice_id);
            }
        }
        Commands::Individual { template, entity, no_hierarchy, save } => {
            let selection = match entity {
                Some(s) => s,
                None => select_entity(&workflow.main_entities(&template)?),
            };
            let generated = workflow.generate_individual(&template, &selection, !no_hierarchy)?;
            for invoice in &generated.invoices {
                print_preview(&workflow, invoice);
            }
            let prompt = format!("Save {} invoice(s)?", generated.invoices.len());
            if save || ask(Confirm::new(&prompt).with_default(false).prompt()) {
                let saved = workflow.save_all(&generated.invoices)?;
                println!("✅ Saved {} invoice(s).", saved.len());
            }
        }
        Commands::List => {
            let invoices = workflow.list_invoices()?;
            if invoices.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::invoice_list_table(&invoices));
            }
        }
        Commands::Show { id } => {
            let invoice = workflow.find_invoice(&id)?;
            print_preview(&workflow, &invoice);
        }
        Commands::Edit { id } => edit_wizard(&mut workflow, &id)?,
        Commands::Delete { id } => {
            let confirmed = ask(Confirm::new(&format!("Delete invoice {}?", id)).with_default(false).prompt());
            if confirmed {
                workflow.delete(&id)?;
                println!("🗑️  Invoice deleted.");
            } else {
                println!("Cancelled");
            }
        }
        Commands::Pdf { id, out, local, open } => {
            let invoice = workflow.find_invoice(&id)?;
            let out_dir = out.unwrap_or_else(|| data_dir.join("output"));
            let path = render_single(&settings, &data_dir, &invoice, &out_dir, local)?;
            println!("✅ PDF Generated: {:?}", path);
            if open {
                open_and_reveal(&path);
            }
        }
        Commands::PdfAll { template, no_hierarchy, save, out } => {
            if !typst_available() {
                return Err(Error::PdfService("'typst' is not installed. Please install it first.".to_string()));
            }
            let generated = workflow.generate_individual(&template, "all", !no_hierarchy)?;
            if save {
                let saved = workflow.save_all(&generated.invoices)?;
                println!("✅ Saved {} invoice(s).", saved.len());
            }

            let renderer = TypstRenderer::load(&data_dir, settings.tax_rate)?;
            let work_dir = data_dir.join("output").join(".render");
            let out_dir = out.unwrap_or_else(|| data_dir.join("output"));
            println!("\n🔨 Compiling {} PDF(s)...", generated.invoices.len());
            let path = archive::export_invoices(&generated.invoices, &out_dir, |invoice| {
                renderer.render_pdf(invoice, &work_dir, &invoice.invoice_id)
            })?;
            println!("✅ Archive Generated: {:?}", path);
        }
        Commands::Summary { year } => show_summary(&workflow, year)?,
        Commands::Registry { kind, action } => {
            registry_command(&data_dir, kind, action.unwrap_or(RegistryAction::List))?
        }
        Commands::Config => {
            setup_config_wizard()?;
        }
    }
    Ok(())
}

/// Exits quietly when the user aborts a prompt.
fn ask<T>(answer: InquireResult<T>) -> T {
    match answer {
        Ok(value) => value,
        Err(_) => {
            println!("Cancelled");
            std::process::exit(0);
        }
    }
}

fn optional(input: String) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

// ==========================================
// 1. Templates & Generation
// ==========================================

fn template_command(workflow: &InvoiceWorkflow<ApiClient>, action: TemplateAction) -> Result<()> {
    match action {
        TemplateAction::List => {
            let templates = workflow.templates()?;
            if templates.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::templates_table(&templates));
            }
        }
        TemplateAction::Create => {
            let draft = template_wizard(None);
            workflow.backend().create_template(&draft)?;
            println!("✅ Template created: {}", draft.name);
        }
        TemplateAction::Update { id } => {
            let current = workflow.templates()?.into_iter().find(|t| t.id_string() == id);
            let draft = template_wizard(current.as_ref().map(|t| t.name.as_str()));
            workflow.backend().update_template(&id, &draft)?;
            println!("✅ Template updated.");
        }
        TemplateAction::Delete { id } => {
            if ask(Confirm::new(&format!("Delete template {}?", id)).with_default(false).prompt()) {
                workflow.backend().delete_template(&id)?;
                println!("🗑️  Template deleted.");
            }
        }
    }
    Ok(())
}

fn template_wizard(current_name: Option<&str>) -> TemplateDraft {
    println!("\n--- Template ---");
    let mut name_prompt = Text::new("Template Name:");
    if let Some(name) = current_name {
        name_prompt = name_prompt.with_default(name);
    }
    let name = ask(name_prompt.prompt());
    let description = optional(ask(Text::new("Description (Optional):").prompt()));
    TemplateDraft { name, description, ..Default::default() }
}

fn select_entity(entities: &[MainEntity]) -> String {
    let mut options = vec![ALL_ENTITIES_OPT.to_string()];
    options.extend(entities.iter().map(|e| format!("{}. {}", e.index, e.label())));

    let choice = ask(Select::new("Select Entity (Type to Filter):", options).raw_prompt());
    if choice.index == 0 {
        "all".to_string()
    } else {
        (choice.index - 1).to_string()
    }
}

fn print_preview(workflow: &InvoiceWorkflow<ApiClient>, invoice: &InvoiceDocument) {
    let totals = workflow.totals(invoice);
    println!(
        "\n--- {} | {} | {} ---",
        invoice.display_number(),
        invoice.invoice_type.as_str().to_uppercase(),
        invoice.billed_to()
    );
    println!("🆔 {}", invoice.invoice_id);
    println!(
        "📅 {} → {}",
        invoice.invoice_date.as_deref().unwrap_or("-"),
        invoice.due_date.as_deref().unwrap_or("-")
    );
    println!("{}", report::preview_table(invoice, &totals));
}

// ==========================================
// 2. Edit Session
// ==========================================

const EDIT_DURATION: &str = "⏱️  Set duration";
const EDIT_RATE: &str = "💲 Set rate";
const EDIT_EXPENSE: &str = "🧾 Add / replace expense";
const EDIT_REMOVE_EXPENSE: &str = "➖ Remove expense";
const EDIT_DATES: &str = "📅 Change dates";
const EDIT_HIERARCHY: &str = "🌳 Toggle project hierarchy";
const EDIT_STATUS: &str = "🏷️  Change status";
const EDIT_PREVIEW: &str = "👀 Preview";
const EDIT_SAVE: &str = "✅ Save changes";
const EDIT_CANCEL: &str = "❌ Discard changes";

fn edit_wizard(workflow: &mut InvoiceWorkflow<ApiClient>, invoice_id: &str) -> Result<()> {
    workflow.begin_edit(invoice_id)?;
    println!("\n✏️  Editing {}", invoice_id);

    loop {
        let options = vec![
            EDIT_DURATION,
            EDIT_RATE,
            EDIT_EXPENSE,
            EDIT_REMOVE_EXPENSE,
            EDIT_DATES,
            EDIT_HIERARCHY,
            EDIT_STATUS,
            EDIT_PREVIEW,
            EDIT_SAVE,
            EDIT_CANCEL,
        ];
        let choice = ask(Select::new("What do you want to change?", options).prompt());
        let session = workflow.session_mut()?;

        // Input mistakes are reported and the loop continues.
        let outcome: Result<()> = match choice {
            EDIT_DURATION | EDIT_RATE => {
                let forms = session.form_values();
                let labels: Vec<String> = forms
                    .iter()
                    .map(|f| {
                        let indent = if f.node_index == 0 { "" } else { "  ↳ " };
                        format!("{}. {}{} ({} × {:.2})", f.chain_index + 1, indent, f.name, f.duration, f.rate)
                    })
                    .collect();
                let picked = ask(Select::new("Line item:", labels).raw_prompt());
                let form = &forms[picked.index];
                if choice == EDIT_DURATION {
                    let value = ask(CustomType::<f64>::new("Duration:").with_default(form.duration).prompt());
                    session.set_duration(form.chain_index, form.node_index, value)
                } else {
                    let value = ask(CustomType::<f64>::new("Rate:").with_default(form.rate).prompt());
                    session.set_rate(form.chain_index, form.node_index, value)
                }
            }
            EDIT_EXPENSE | EDIT_REMOVE_EXPENSE => {
                let chain_index = pick_chain(session.invoice());
                let kind = ask(Select::new("Expense type:", ExpenseType::ALL.to_vec()).prompt());
                if choice == EDIT_EXPENSE {
                    let amount = ask(CustomType::<f64>::new("Amount:").prompt());
                    let description = optional(ask(Text::new("Description (Optional):").prompt()));
                    session.upsert_expense(chain_index, kind, amount, description)
                } else {
                    session.remove_expense(chain_index, kind).map(|removed| {
                        if !removed {
                            println!("(No {} expense to remove)", kind);
                        }
                    })
                }
            }
            EDIT_DATES => {
                let today = Local::now().date_naive();
                let issued = ask(DateSelect::new("Invoice Date:").with_default(today).prompt());
                let due = ask(DateSelect::new("Due Date:").with_default(issued + chrono::Days::new(30)).prompt());
                session.set_invoice_date(issued.format("%d-%m-%Y").to_string());
                session.set_due_date(due.format("%d-%m-%Y").to_string());
                Ok(())
            }
            EDIT_HIERARCHY => {
                let show = !session.invoice().show_project_hierarchy;
                session.set_show_hierarchy(show);
                println!("🌳 Project hierarchy {}", if show { "shown" } else { "hidden" });
                Ok(())
            }
            EDIT_STATUS => {
                let statuses = vec![
                    InvoiceStatus::Draft,
                    InvoiceStatus::Issued,
                    InvoiceStatus::Paid,
                    InvoiceStatus::Overdue,
                    InvoiceStatus::Void,
                ];
                let labels: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
                let picked = ask(Select::new("Status:", labels).raw_prompt());
                session.set_status(statuses[picked.index]);
                Ok(())
            }
            EDIT_PREVIEW => {
                let totals = session.totals();
                println!("{}", report::preview_table(session.invoice(), &totals));
                Ok(())
            }
            EDIT_SAVE => match workflow.commit_edit() {
                Ok(invoice) => {
                    println!("✅ Saved. New total: ${:.2}", invoice.total_amount);
                    return Ok(());
                }
                Err(e) => Err(e),
            },
            _ => {
                if session.is_dirty()
                    && !ask(Confirm::new("Discard unsaved changes?").with_default(false).prompt())
                {
                    continue;
                }
                workflow.cancel_edit();
                println!("Cancelled");
                return Ok(());
            }
        };

        if let Err(e) = outcome {
            println!("❌ {}", e);
        }
    }
}

fn pick_chain(invoice: &InvoiceDocument) -> usize {
    if invoice.invoice_items.len() == 1 {
        return 0;
    }
    let labels: Vec<String> = invoice
        .invoice_items
        .iter()
        .enumerate()
        .map(|(i, chain)| format!("{}. {}", i + 1, chain.main().entity_label()))
        .collect();
    ask(Select::new("Entity:", labels).raw_prompt()).index
}

// ==========================================
// 3. PDF Output
// ==========================================

fn render_single(
    settings: &Settings,
    data_dir: &Path,
    invoice: &InvoiceDocument,
    out_dir: &Path,
    force_local: bool,
) -> Result<PathBuf> {
    let file_name = archive::entry_name(invoice, Local::now().date_naive());
    let stem = file_name.trim_end_matches(".pdf");

    match settings.pdf_service_url.as_deref() {
        Some(url) if !force_local => {
            println!("📤 Sending to PDF service...");
            let service = HttpPdfService::new(url)?;
            let mut generator = PdfGenerator::new(
                service,
                settings.queue_config(),
                settings.pdf_cache_max_entries,
                settings.tax_rate,
            );
            let pdf = generator.generate(invoice)?;
            fs::create_dir_all(out_dir)?;
            let path = out_dir.join(&file_name);
            fs::write(&path, pdf)?;
            Ok(path)
        }
        _ => {
            if !typst_available() {
                return Err(Error::PdfService("'typst' is not installed. Please install it first.".to_string()));
            }
            println!("\n🔨 Compiling PDF...");
            TypstRenderer::load(data_dir, settings.tax_rate)?.render_to_file(invoice, out_dir, stem)
        }
    }
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

// ==========================================
// 4. Summary
// ==========================================

fn show_summary(workflow: &InvoiceWorkflow<ApiClient>, year: Option<i32>) -> Result<()> {
    let target_year = year.unwrap_or_else(|| Local::now().year());
    println!("🔍 Scanning invoices for summary (Year: {})...", target_year);

    let invoices = workflow.list_invoices()?;
    let summary = report::summarize(&invoices, target_year);
    if summary.months.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }

    println!("\n--- Monthly Invoice Summary ({}) ---", target_year);
    println!("{}", report::monthly_table(&summary, target_year));
    println!("\n--- Client Summary ({}) ---", target_year);
    println!("{}", report::client_table(&summary));
    Ok(())
}

// ==========================================
// 5. Local Registry
// ==========================================

fn registry_command(data_dir: &Path, kind: RegistryKind, action: RegistryAction) -> Result<()> {
    let store = RegistryStore::new(data_dir);
    let mut registry = store.load()?;

    match (kind.entity_kind(), action) {
        (Some(entity_kind), RegistryAction::List) => {
            let entities = registry.list(entity_kind);
            if entities.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::registry_table(entities));
            }
        }
        (None, RegistryAction::List) => {
            if registry.projects.is_empty() {
                println!("(None found)");
            } else {
                println!("{}", report::projects_table(&registry.projects));
            }
        }
        (Some(entity_kind), RegistryAction::Add) => {
            let draft = entity_wizard(entity_kind);
            let created = registry.create(entity_kind, draft)?;
            println!("✅ {} created successfully: {} (#{})", entity_kind.label(), created.name, created.id);
            store.save(&registry)?;
        }
        (None, RegistryAction::Add) => {
            let project = project_wizard(&registry);
            let created = registry.create_project(project)?;
            println!("✅ Project created successfully: {} (#{})", created.name, created.id);
            store.save(&registry)?;
        }
        (Some(entity_kind), RegistryAction::Remove { id }) => {
            registry.delete(entity_kind, id)?;
            store.save(&registry)?;
            println!("🗑️  {} deleted.", entity_kind.label());
        }
        (None, RegistryAction::Remove { id }) => {
            registry.delete_project(id)?;
            store.save(&registry)?;
            println!("🗑️  Project deleted.");
        }
    }
    Ok(())
}

fn entity_wizard(kind: EntityKind) -> EntityDraft {
    println!("\n--- Creating New {} ---", kind.label());
    let name = ask(Text::new(&format!("{} Name:", kind.label())).prompt());
    let email = optional(ask(Text::new("Email (Optional):").prompt()));
    let country = optional(ask(Text::new("Country (Optional):").prompt()));
    let mobile = optional(ask(Text::new("Mobile (Optional):").prompt()));

    let type2_options = match kind {
        EntityKind::Client | EntityKind::Vendor => vec!["Company", "Individual"],
        EntityKind::Company => vec!["Technology", "Consulting", "Services", "Other"],
        EntityKind::Consultant => vec!["Individual", "Agency"],
    };
    let type2 = ask(Select::new("Type:", type2_options).prompt()).to_string();
    let type3 = match kind {
        EntityKind::Consultant => Some(
            ask(Select::new("Engagement:", vec!["InHouse", "Outsourced", "FullTime", "PartTime"]).prompt())
                .to_string(),
        ),
        _ => None,
    };
    let address = optional(ask(Text::new("Address (Optional):").prompt()));

    EntityDraft { name, email, country, mobile, type2: Some(type2), type3, address }
}

fn project_wizard(registry: &Registry) -> ProjectRecord {
    println!("\n--- Creating New Project ---");
    let name = ask(Text::new("Project Name:").prompt());
    let description = optional(ask(Text::new("Description (Optional):").prompt()));
    let start_date = optional(ask(Text::new("Start Date (Optional, YYYY-MM-DD):").prompt()));
    let end_date = optional(ask(Text::new("End Date (Optional, YYYY-MM-DD):").prompt()));

    let entities = registry.all_entities();
    let mut options = vec![SKIP_OPT.to_string()];
    options.extend(entities.iter().map(|(kind, e)| format!("{} ({} #{})", e.name, kind.label(), e.id)));

    let given = ask(Select::new("Given By:", options.clone()).raw_prompt()).index;
    let given_by = given.checked_sub(1).map(|i| entities[i]);
    // The taker cannot be the giver.
    let taken_options: Vec<String> = options
        .iter()
        .enumerate()
        .filter(|(i, _)| *i == 0 || *i != given)
        .map(|(_, o)| o.clone())
        .collect();
    let taken_pick = ask(Select::new("Taken By:", taken_options).raw_prompt());
    let taken_by = options
        .iter()
        .position(|o| *o == taken_pick.value)
        .and_then(|i| i.checked_sub(1))
        .map(|i| entities[i]);

    let modes = vec!["Hourly", "Daily", "Weekly", "Monthly", "Milestone", "Fixed"];
    let rate_mode = RateMode::parse(ask(Select::new("Rate Mode:", modes).prompt()));
    let rate_amount = ask(CustomType::<f64>::new("Rate Amount:").prompt());
    let currency = ask(Text::new("Currency:").with_default("USD").prompt());

    ProjectRecord {
        id: 0,
        name,
        description,
        start_date,
        end_date,
        given_by: given_by.map(|(_, e)| e.name.clone()),
        given_by_id: given_by.map(|(_, e)| e.id),
        taken_by: taken_by.map(|(_, e)| e.name.clone()),
        taken_by_id: taken_by.map(|(_, e)| e.id),
        rate_mode: Some(rate_mode),
        rate_amount: Some(rate_amount),
        currency,
    }
}

// ==========================================
// 6. Config
// ==========================================

fn setup_config_wizard() -> Result<Settings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = Settings::load_from(&Settings::config_path())?;

    let base_url = ask(Text::new("Backend URL:").with_default(&current.base_url).prompt());
    let data_root = ask(Text::new("Root Data Directory:").with_default(&current.data_root).prompt());
    let tax_rate = ask(CustomType::<f64>::new("Tax Rate (%):").with_default(current.tax_rate).prompt());
    let pdf_service_url = optional(ask(
        Text::new("PDF Service URL (Optional, empty renders locally with typst):")
            .with_default(current.pdf_service_url.as_deref().unwrap_or(""))
            .prompt(),
    ));

    let settings = Settings { base_url, data_root, tax_rate, pdf_service_url, ..current };
    let path = settings.save()?;
    println!("✅ Settings saved to {:?}", path);
    Ok(settings)
}
