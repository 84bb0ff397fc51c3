use anno_store::adapters::FileStorage;
use anno_store::config::cli::{Command, EditArgs};
use anno_store::utils::error::{AnnoError, ErrorSeverity};
use anno_store::utils::{logger, validation::Validate};
use anno_store::{
    AnnotationExporter, AnnotationService, AppConfig, BatchReport, CliConfig, PageCache,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // Fall back to local defaults when no config file exists
    let config = if std::path::Path::new(&cli.config).exists() {
        match AppConfig::from_file(&cli.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        }
    } else {
        AppConfig::local_default()
    };

    // Logging
    if config.json_logs() {
        logger::init_json_logger(config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting anno-store");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli, &config).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 2,
            ErrorSeverity::Medium => 3,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 4,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(cli: &CliConfig, config: &AppConfig) -> Result<(), AnnoError> {
    config.validate()?;

    let factory = config.adapter_factory()?;
    let cache = Arc::new(PageCache::new());
    let service = AnnotationService::new(factory.clone(), cache.clone())
        .with_session(config.session_provider());

    match &cli.command {
        Command::List(args) => {
            for canvas in args.canvases() {
                let page = service.refresh(&canvas).await?;
                println!("{}", serde_json::to_string_pretty(&page)?);
            }
        }
        Command::Get { canvases, id } => {
            for canvas in canvases.canvases() {
                let annotation = service.get(id, &canvas).await?;
                println!("{}", serde_json::to_string_pretty(&annotation)?);
            }
        }
        Command::Create(edit) => {
            edit.validate()?;
            let report = service.save(&edit.draft(None), &edit.canvases.canvases(), false).await;
            print_report("Created", &report);
            report.into_result()?;
        }
        Command::Update { edit, id } => {
            edit.validate()?;
            let canvases = edit.canvases.canvases();
            let draft = edit_draft(edit, id, &service, &canvases).await;
            let report = service.save(&draft, &canvases, true).await;
            print_report("Updated", &report);
            report.into_result()?;
        }
        Command::Delete { canvases, id } => {
            let report = service.delete(id, &canvases.canvases()).await;
            print_report("Deleted", &report);
            report.into_result()?;
        }
        Command::Export { canvases, output } => {
            if !config.export_enabled() {
                return Err(AnnoError::ConfigError {
                    message: "export is disabled, set annotation.export = true".to_string(),
                });
            }
            let exporter = AnnotationExporter::new(factory, FileStorage::new(output));
            let written = exporter.export(&canvases.canvases()).await?;
            if written.is_empty() {
                println!("No annotations stored yet.");
            }
            for file_name in written {
                println!("📁 {}/{}", output, file_name);
            }
        }
    }

    Ok(())
}

/// Fields not given on the command line keep their stored values.
async fn edit_draft(
    edit: &EditArgs,
    id: &str,
    service: &AnnotationService,
    canvases: &[anno_store::Canvas],
) -> anno_store::AnnotationDraft {
    let mut draft = edit.draft(Some(id));
    let Some(canvas) = canvases.first() else {
        return draft;
    };

    if let Ok(existing) = service.get(id, canvas).await {
        let stored = anno_store::AnnotationDraft::from_annotation(&existing);
        if edit.body.is_empty() {
            draft.body = stored.body;
        }
        if edit.tags.is_empty() {
            draft.tags = stored.tags;
        }
        if edit.xywh.is_none() {
            draft.xywh = stored.xywh;
        }
        if edit.svg.is_none() {
            draft.svg = stored.svg;
        }
    }
    draft
}

fn print_report(action: &str, report: &BatchReport) {
    for outcome in report.succeeded() {
        println!("✅ {} on {} ({})", action, outcome.canvas_id, outcome.page_id);
    }
    for (canvas_id, err) in report.failed() {
        eprintln!("❌ {} failed: {}", canvas_id, err.user_friendly_message());
    }
}
