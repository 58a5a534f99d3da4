use anyhow::{Context, Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
};
use tagalyst_config::Config;
use tagalyst_engine::{
    Document, Highlighter, JsonFileStore, NodeId, Page, TextProjection, marked_text,
};

const USAGE: &str = "Usage:
  tagalyst-cli [--store <path>] highlight <doc.xhtml> <identity> <start> <end> [note]
  tagalyst-cli [--store <path>] restore <doc.xhtml> <identity>
  tagalyst-cli [--store <path>] list <identity>
  tagalyst-cli [--store <path>] note <identity> <id> <note>
  tagalyst-cli [--store <path>] remove <identity> <id>";

enum Command {
    Highlight {
        document: PathBuf,
        identity: String,
        start: usize,
        end: usize,
        note: String,
    },
    Restore {
        document: PathBuf,
        identity: String,
    },
    List {
        identity: String,
    },
    Note {
        identity: String,
        id: String,
        note: String,
    },
    Remove {
        identity: String,
        id: String,
    },
}

fn parse_args(mut args: Vec<String>) -> Result<(Option<PathBuf>, Command)> {
    let mut store_path = None;
    if let Some(index) = args.iter().position(|a| a == "--store") {
        if index + 1 >= args.len() {
            bail!("--store needs a path");
        }
        store_path = Some(PathBuf::from(args.remove(index + 1)));
        args.remove(index);
    }

    let command = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["highlight", document, identity, start, end, rest @ ..] if rest.len() <= 1 => {
            Command::Highlight {
                document: PathBuf::from(document),
                identity: identity.to_string(),
                start: start.parse().context("start must be a character offset")?,
                end: end.parse().context("end must be a character offset")?,
                note: rest.first().map(|n| n.to_string()).unwrap_or_default(),
            }
        }
        ["restore", document, identity] => Command::Restore {
            document: PathBuf::from(document),
            identity: identity.to_string(),
        },
        ["list", identity] => Command::List {
            identity: identity.to_string(),
        },
        ["note", identity, id, note] => Command::Note {
            identity: identity.to_string(),
            id: id.to_string(),
            note: note.to_string(),
        },
        ["remove", identity, id] => Command::Remove {
            identity: identity.to_string(),
            id: id.to_string(),
        },
        _ => bail!("unrecognised command"),
    };
    Ok((store_path, command))
}

fn load_document(path: &Path) -> Result<(Document, NodeId)> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let doc = Document::from_bytes(&bytes).with_context(|| format!("parsing {}", path.display()))?;
    let root = doc.find_element("body").unwrap_or(doc.root());
    Ok((doc, root))
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (store_override, command) = match parse_args(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };
    let store_path = store_override.unwrap_or_else(|| config.store_path.clone());
    log::info!("using annotation store {}", store_path.display());

    let mut highlighter = Highlighter::new(JsonFileStore::new(store_path), config.engine_settings());

    match command {
        Command::Highlight {
            document,
            identity,
            start,
            end,
            note,
        } => {
            let (mut doc, root) = load_document(&document)?;
            let page = Page::new(&identity, root);
            highlighter.restore_all(&mut doc, &page)?;
            let selection = TextProjection::new(&doc, root)
                .span_for(start, end)
                .with_context(|| format!("{start}..{end} is not a range inside the document text"))?;
            let annotation = highlighter.create_annotation(&mut doc, &page, selection, &note)?;
            println!("{}", annotation.id);
            println!("{}", marked_text(&doc, root));
        }
        Command::Restore { document, identity } => {
            let (mut doc, root) = load_document(&document)?;
            let page = Page::new(&identity, root);
            let report = highlighter.restore_all(&mut doc, &page)?;
            println!("restored {}, failed {}", report.restored, report.failed);
            println!("{}", marked_text(&doc, root));
        }
        Command::List { identity } => {
            for annotation in highlighter.annotations(&identity)? {
                let note = if annotation.user_note.is_empty() {
                    String::new()
                } else {
                    format!("  # {}", annotation.user_note)
                };
                println!("{}  {:?}{}", annotation.id, annotation.text, note);
            }
        }
        Command::Note { identity, id, note } => {
            let annotation = highlighter.set_note(&identity, &id, &note)?;
            println!("{}  {:?}", annotation.id, annotation.user_note);
        }
        Command::Remove { identity, id } => {
            // nothing is painted, only the stored record goes
            let mut doc = Document::new("body");
            let page = Page::new(&identity, doc.root());
            highlighter.remove_annotation(&mut doc, &page, &id)?;
            println!("removed {id}");
        }
    }

    Ok(())
}
