use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};

use ch4mon_service::analysis::{self, AnalysisRequest, AnalysisResponse, HistoryInput};
use ch4mon_service::config::{self, DEFAULT_CONFIG_PATH, ServiceConfig, StrategyChoice};
use ch4mon_service::dev_mode::FixtureSource;
use ch4mon_service::ingest::ObservationSource;
use ch4mon_service::ingest::earth_engine::EarthEngineClient;
use ch4mon_service::logging::{self, DataSource};
use ch4mon_service::model::RiskLevel;
use ch4mon_service::report::{self, ReportRecord};
use ch4mon_service::sites::{self, Site};
use ch4mon_service::verify;

#[derive(Parser)]
#[command(version, about = "Sentinel-5P methane monitoring for oil and gas sites", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Replay recorded images from a JSON fixture instead of Earth Engine
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SiteArgs {
    /// Site id from the registry
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    site: Option<String>,

    /// Ad-hoc site latitude
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Ad-hoc site longitude
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Ad-hoc site name
    #[arg(long, default_value = "Ad-hoc site")]
    name: String,

    /// Historical CSV with a CH4 column, for the z-score strategy
    #[arg(long)]
    history: Option<PathBuf>,

    #[arg(long, value_enum)]
    strategy: Option<CliStrategy>,

    /// Days to search back for a usable sample
    #[arg(long)]
    lookback: Option<i64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliStrategy {
    Fixed,
    Zscore,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse the latest CH4 sample for a site
    Analyze {
        #[command(flatten)]
        target: SiteArgs,

        /// Write the Markdown HSE report to this file or directory
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Ask about the latest analysis for a site
    Ask {
        #[command(flatten)]
        target: SiteArgs,

        question: String,
    },
    /// List monitored sites
    Sites {},
    /// Check every site against the observation source
    Verify {
        /// Write the verification report as Markdown
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Write the verification report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match ServiceConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    logging::init_logger(
        config.logging.min_level(),
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    if let Err(e) = run(&cli, &config) {
        logging::error(DataSource::System, None, &e.to_string());
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    let sites = sites::effective_sites(&config.sites);

    match &cli.command {
        Commands::Sites {} => {
            for site in &sites {
                println!(
                    "{:<16} {:<20} {}  {}",
                    site.id,
                    site.name,
                    site.location(),
                    site.description.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Analyze { target, report: report_path } => {
            let source = open_source(cli, config)?;
            let response = run_analysis(source.as_ref(), config, &sites, target)?;
            print_response(&response);

            if let Some(path) = report_path {
                let record = ReportRecord::from_response(&response)?;
                let path = report_destination(path, &record);
                std::fs::write(&path, report::render_markdown(&record))?;
                println!("📄 HSE report saved to {}", path.display());
            }
        }
        Commands::Ask { target, question } => {
            let source = open_source(cli, config)?;
            let response = run_analysis(source.as_ref(), config, &sites, target)?;
            println!("> {}", question);
            println!("{}", report::answer(Some(&response)));
        }
        Commands::Verify { markdown, json } => {
            let source = open_source(cli, config)?;
            let source_ref: &dyn ObservationSource = source.as_ref();
            let report = verify::run_verification(&source_ref, &sites, config.analysis.lookback_days);
            verify::print_summary(&report);

            if let Some(path) = json {
                std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
                println!("\n📄 JSON report saved to: {}", path.display());
            }
            if let Some(path) = markdown {
                std::fs::write(path, verify::render_markdown(&report))?;
                println!("📄 Markdown report saved to: {}", path.display());
            }
        }
    }

    Ok(())
}

fn open_source(cli: &Cli, config: &ServiceConfig) -> Result<Box<dyn ObservationSource>, Box<dyn Error>> {
    if let Some(path) = &cli.fixture {
        let mut source = FixtureSource::from_json_file(path)?;
        let offset = source.replay_as_of(Utc::now().date_naive());
        logging::info(
            DataSource::Fixture,
            None,
            &format!("replaying fixture shifted by {} day(s)", offset),
        );
        return Ok(Box::new(source));
    }

    let token = config::access_token()?;
    let client = EarthEngineClient::new(config.earth_engine.clone(), token)?;
    Ok(Box::new(client))
}

fn resolve_site(sites: &[Site], target: &SiteArgs) -> Result<Site, Box<dyn Error>> {
    if let (Some(lat), Some(lon)) = (target.lat, target.lon) {
        let site = Site::ad_hoc(&target.name, lat, lon);
        if !site.location().is_valid() {
            return Err(format!("invalid coordinates {}, {}", lat, lon).into());
        }
        return Ok(site);
    }

    let id = target.site.as_deref().unwrap_or(sites::DEFAULT_SITE_ID);
    sites::find_site(sites, id)
        .or_else(|| sites.first().filter(|_| target.site.is_none()))
        .cloned()
        .ok_or_else(|| format!("unknown site '{}' (see `sites`)", id).into())
}

fn run_analysis(
    source: &dyn ObservationSource,
    config: &ServiceConfig,
    sites: &[Site],
    target: &SiteArgs,
) -> Result<AnalysisResponse, Box<dyn Error>> {
    let site = resolve_site(sites, target)?;

    let mut request = AnalysisRequest::new(site, &config.analysis);
    if let Some(strategy) = target.strategy {
        request.strategy = match strategy {
            CliStrategy::Fixed => StrategyChoice::Fixed,
            CliStrategy::Zscore => StrategyChoice::Zscore,
        };
    }
    if let Some(days) = target.lookback {
        if !(1..=365).contains(&days) {
            return Err(format!("--lookback must be between 1 and 365, got {}", days).into());
        }
        request.lookback_days = days;
    }
    if let Some(path) = &target.history {
        request = request.with_history(HistoryInput::File(path.clone()));
    }

    Ok(analysis::analyze(&source, &request)?)
}

fn print_response(response: &AnalysisResponse) {
    println!("🛢️  {} ({})", response.site.name, response.site.location());
    println!("   {}", response.status_message());

    let Some(primary) = response.primary() else {
        return;
    };

    let icon = match primary.level {
        RiskLevel::Normal => "✅",
        RiskLevel::Elevated | RiskLevel::Anomaly => "⚠️",
        RiskLevel::Critical => "🚨",
    };
    println!(
        "   {} {}: {:.1} ppb ({})",
        icon, primary.level, primary.value_ppb, primary.strategy
    );
    if let Some(z) = primary.z_score {
        println!("   z-score: {:.2}", z);
    }
    println!("   Recommended action: {}", primary.recommended_action);

    if let Some(note) = response.fallback_note() {
        println!("   ⚠ {}", note);
    }
}

fn report_destination(path: &Path, record: &ReportRecord) -> PathBuf {
    if path.is_dir() {
        path.join(record.file_name())
    } else {
        path.to_path_buf()
    }
}
