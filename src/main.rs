use archdex::{
    FolderIndex,
    Settings,
    SharedIndex,
    error::{self, Error},
    index::FolderRef,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod serve;

use cli::{Cli, Command};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ARCHDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let settings = Settings::resolve(cli.root.as_deref())?;

    match cli.command {
        Command::Search(args) => cmd_search(&settings, &args)?,
        Command::Files(args) => cmd_files(&settings, &args)?,
        Command::Info(args) => cmd_info(&settings, &args)?,
        Command::Status(args) => cmd_status(&settings, args.json)?,
        Command::Watch(args) => {
            let mut settings = settings.with_poll_interval(args.interval);
            settings.include_hidden |= args.include_hidden;
            serve::run_watch(settings)?;
        }
        Command::Serve(args) => {
            let mut settings = settings.with_poll_interval(args.watch.interval);
            settings.include_hidden |= args.watch.include_hidden;
            if let Some(capacity) = args.capacity {
                settings.channel_capacity = capacity.max(1);
            }
            serve::run_serve(settings)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn open_index(settings: &Settings) -> error::Result<SharedIndex> {
    let index =
        FolderIndex::build(&settings.storage_dir, settings.include_hidden)?;
    Ok(SharedIndex::new(index))
}

fn folder_not_found(id: u64) -> Error {
    Error::NotFound {
        kind: "folder",
        name: format!("#{id} (it may have been removed)"),
    }
}

fn cmd_search(
    settings: &Settings,
    args: &cli::SearchArgs,
) -> error::Result<()> {
    let index = open_index(settings)?;
    let results = match args.by.key_kind() {
        Some(kind) => index.search_by_key(&args.query, kind),
        None => index.search_partial(&args.query),
    };

    if args.json {
        let payload = serde_json::json!({
            "query": args.query,
            "result_count": results.len(),
            "results": results,
        });
        println!("{payload}");
    } else {
        format_human(&results);
    }
    Ok(())
}

fn format_human(results: &[FolderRef]) {
    if results.is_empty() {
        println!("No folders found.");
        return;
    }

    for r in results {
        println!("{:>5}\t{}", r.id, r.name);
    }
    println!("\n{} folder(s)", results.len());
}

fn cmd_files(settings: &Settings, args: &cli::FilesArgs) -> error::Result<()> {
    let index = open_index(settings)?;
    let files = if args.images {
        index.get_images(args.id)
    } else {
        index.get_files(args.id)
    }
    .ok_or_else(|| folder_not_found(args.id))?;

    if args.json {
        let paths: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        println!("{}", serde_json::to_string(&paths)?);
    } else {
        for path in &files {
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn cmd_info(settings: &Settings, args: &cli::InfoArgs) -> error::Result<()> {
    let index = open_index(settings)?;
    let descriptor = index
        .read_descriptor(args.id)
        .ok_or_else(|| folder_not_found(args.id))?;

    if args.json {
        println!("{}", serve::descriptor_json(&descriptor));
    } else {
        if let Some(name) = index.folder_name(args.id) {
            println!("folder: {name}");
        }
        for (field, value) in descriptor.fields() {
            println!("{field}: {value}");
        }
    }
    Ok(())
}

fn cmd_status(settings: &Settings, json: bool) -> error::Result<()> {
    let stats = open_index(settings)?.stats();

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!("Storage root: {}", stats.root.display());
        println!("Folders: {}", stats.folders);
        println!("Contracts: {}", stats.contracts);
        println!("Phones: {}", stats.phones);
        println!("Addresses: {}", stats.addresses);
    }
    Ok(())
}
