use std::path::PathBuf;

use clap::Parser;

use ejslab::host;
use ejslab::session::Session;
use ejslab_store::DocumentStore;

#[derive(Parser)]
#[command(name = "ejslab", about = "Live EJS template workbench - host bridge", version)]
struct Args {
    /// Path to the document database (defaults to the per-user config dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Force embedded mode (normally detected from a piped stdin)
    #[arg(long)]
    embedded: bool,

    /// Open the print flow for the current result after the initial render
    #[arg(long)]
    print: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let path = args.db.unwrap_or_else(ejslab_store::default_store_path);
    let store = match DocumentStore::open(&path) {
        Ok(store) => store,
        Err(e) => {
            // Storage is never fatal: degrade to a process-lifetime store.
            log::warn!(
                "cannot open store at {}: {}; continuing without durability",
                path.display(),
                e
            );
            match DocumentStore::open_in_memory() {
                Ok(store) => store,
                Err(e) => {
                    eprintln!("ejslab: cannot initialize storage: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let embedded = host::detect_embedded(args.embedded);
    let mut session = Session::start(store, embedded, host::send);

    if args.print {
        session.print_current();
    }

    if embedded {
        host::run_loop(&mut session);
    } else if let Some(result) = session.result() {
        // Standalone run: emit the raw view of the current result once.
        match result.html() {
            Some(html) => println!("{}", html),
            None => eprintln!("render error: {}", result.error().unwrap_or_default()),
        }
    }
}
