use std::process;
use std::sync::Arc;

use framelink::{Caller, ChannelConfig, SaveNotebookRequest, channel_pair};
use framelink_notebook::{
    Cell, ConnectionState, Embedding, HostApp, MemoryKernel, MemoryNotebook, init_tracing,
    initialize,
};

struct Args {
    channel: Option<String>,
    filename: Option<String>,
    standalone: bool,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let args = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: framelink-demo [--channel <id>] [--filename <name>] [--standalone]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --channel <id>     Channel id [default: $FRAMELINK_CHANNEL_ID or marimo-iframe-api]");
            eprintln!("  --filename <name>  Filename to save under [default: notebook's own]");
            eprintln!("  --standalone       Run the host top-level so no handlers are installed");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(args).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        channel: None,
        filename: None,
        standalone: false,
    };

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--channel" => {
                i += 1;
                parsed.channel = Some(args.get(i).ok_or("--channel requires a value")?.clone());
            }
            "--filename" => {
                i += 1;
                parsed.filename = Some(args.get(i).ok_or("--filename requires a value")?.clone());
            }
            "--standalone" => parsed.standalone = true,
            "--help" | "-h" => return Err("".to_string()),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(parsed)
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ChannelConfig::from_env();
    if let Some(channel) = args.channel {
        config = config.with_channel_id(channel);
    }
    let (parent, child) = channel_pair(&config);

    let notebook = MemoryNotebook::new()
        .with_cell(Cell::new("Hbol", "import marimo as mo"))
        .with_cell(Cell::new("MJUe", "mo.md(\"# Hello from the embedded notebook\")"))
        .with_cell(Cell::new("vblA", "x = 1 + 1"))
        .with_filename("demo.py")
        .with_connection(ConnectionState::Open);
    let kernel = Arc::new(MemoryKernel::new("# not saved yet"));
    let app = HostApp::new(Arc::new(notebook), kernel);

    let embedding = if args.standalone {
        Embedding::TopLevel
    } else {
        Embedding::Embedded
    };
    initialize(embedding, &child, app);

    let caller = Caller::new(Arc::new(parent));
    tracing::info!(channel = caller.channel_id(), "Calling embedded notebook");

    report("readCode", caller.read_code(None).await)?;

    let mut request = SaveNotebookRequest::default();
    if let Some(filename) = args.filename {
        request = request.with_filename(filename);
    }
    report("saveNotebook", caller.save_notebook(Some(request)).await)?;

    report("readCode", caller.read_code(None).await)?;
    Ok(())
}

/// Print one call result as JSON. Call failures are printed and do not stop
/// the demo.
fn report<T: serde::Serialize>(
    operation: &str,
    result: Result<T, framelink::CallError>,
) -> anyhow::Result<()> {
    match result {
        Ok(response) => println!("{operation}: {}", serde_json::to_string_pretty(&response)?),
        Err(e) => println!("{operation} failed: {:#}", anyhow::Error::from(e)),
    }
    Ok(())
}
