use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use feedscout::{config, load_entities, run_with_browser, save_json, ResolverConfig};

const USAGE: &str = "usage: feedscout --input <file> --output <file> [--concurrency N] [--headful] [--config <file>]";

#[derive(Debug, Default)]
struct CliArgs {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    concurrency: Option<usize>,
    headful: bool,
}

fn flag_value(arg: &str, name: &str, args: &mut impl Iterator<Item = String>) -> Option<String> {
    if arg == name {
        return args.next();
    }
    arg.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('='))
        .map(str::to_string)
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut args = argv.into_iter();
    while let Some(a) = args.next() {
        if a == "--headful" {
            parsed.headful = true;
        } else if a.starts_with("--input") {
            parsed.input = flag_value(&a, "--input", &mut args).map(PathBuf::from);
        } else if a.starts_with("--output") {
            parsed.output = flag_value(&a, "--output", &mut args).map(PathBuf::from);
        } else if a.starts_with("--config") {
            parsed.config = flag_value(&a, "--config", &mut args).map(PathBuf::from);
        } else if a.starts_with("--concurrency") {
            let v = flag_value(&a, "--concurrency", &mut args)
                .ok_or_else(|| "--concurrency needs a value".to_string())?;
            let n = v
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid --concurrency value: {}", v))?;
            parsed.concurrency = Some(n);
        } else if a == "--help" || a == "-h" {
            return Err(USAGE.to_string());
        } else {
            return Err(format!("unknown argument: {}\n{}", a, USAGE));
        }
    }
    Ok(parsed)
}

fn resolve_config(args: &CliArgs) -> ResolverConfig {
    let mut cfg = match &args.config {
        Some(path) => {
            let mut cfg = config::load_config_from(path).unwrap_or_else(|| {
                tracing::warn!("config file {} not found; using defaults", path.display());
                ResolverConfig::default()
            });
            cfg.apply_env_overrides();
            cfg
        }
        None => config::load_config(),
    };
    if let Some(n) = args.concurrency {
        cfg.concurrency = n;
    }
    if args.headful {
        cfg.browser.headless = false;
    }
    cfg
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };
    let (Some(input), Some(output)) = (args.input.clone(), args.output.clone()) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let cfg = Arc::new(resolve_config(&args));
    info!("Starting feedscout (concurrency: {})", cfg.concurrency);

    let entities = match load_entities(&input) {
        Ok(entities) => entities,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let resolved = match run_with_browser(cfg, entities).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = save_json(resolved.iter().map(|(_, entity)| entity), &output) {
        error!("{}", e);
        std::process::exit(1);
    }
}
