use autoplay::capture::ImageDirectorySource;
use autoplay::common::{Point, Size, WindowRect};
use autoplay::flow::FlowClassifiers;
use autoplay::input::{DryRunInjector, FixedWindowLocator};
use autoplay::vision::{Classifier, InertClassifier, InertDetector};
use autoplay::{BotError, Orchestrator, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// Dry run: logging-only input, a fixed window and inert classifiers, fed from
// the replay directory when one is configured.
#[tokio::main]
async fn main() -> Result<(), BotError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    init_logging(&settings.log_level);

    let inert: Arc<dyn Classifier> = Arc::new(InertClassifier);
    let locator = FixedWindowLocator::new(
        settings.window.title.clone(),
        WindowRect::new(Point::new(0, 0), Size::new(1920, 1080)),
    );
    let mut builder = Orchestrator::builder(settings.clone())
        .window_locator(Arc::new(locator))
        .injector(Arc::new(DryRunInjector))
        .flow_classifiers(FlowClassifiers {
            team_select: inert.clone(),
            match_ready: inert.clone(),
            disconnected: inert.clone(),
            in_menu: inert.clone(),
            cancel_search: inert.clone(),
            start_button: inert.clone(),
            mode_indicator: inert.clone(),
        })
        .death_classifier(inert)
        .target_detector(Arc::new(InertDetector));

    match &settings.capture.replay_dir {
        Some(dir) => {
            let source = ImageDirectorySource::open(dir, true)?;
            builder = builder.frame_source(Box::new(source));
        }
        None => warn!("No replay directory configured, workers will idle"),
    }

    let mut orchestrator = builder.build()?;
    orchestrator.start()?;
    info!("Running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }

    let reader = orchestrator.reader();
    let report = orchestrator.stop().await?;
    info!("Stopped {} workers", report.exits.len());
    match reader.to_json() {
        Ok(json) => info!("Final state: {}", json),
        Err(e) => warn!("Failed to serialize final state: {}", e),
    }
    Ok(())
}
