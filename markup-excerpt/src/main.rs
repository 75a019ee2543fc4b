use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use markup_excerpt::{document_title, excerpt, MarkupConfig};

const HELP: &str = "Options:
  --title TEXT      Title to wrap (defaults to the document <title>)
  --config FILE     JSON MarkupConfig overriding the default bounds
  --json            Print the excerpt as JSON instead of wrapped text
  -h, --help        Show this message
  -V, --version     Print package version";

fn main() {
    if let Err(err) = run(env::args().skip(1).collect()) {
        eprintln!("markup_excerpt: {err}");
        process::exit(1);
    }
}

#[derive(Default)]
struct Options {
    source: Option<String>,
    title: Option<String>,
    config: Option<String>,
    json: bool,
}

fn run(args: Vec<String>) -> Result<(), String> {
    let Some(options) = parse_options(args)? else {
        return Ok(());
    };

    let html = match options.source.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|err| format!("failed to read stdin: {err}"))?;
            buf
        }
        Some(path) => {
            fs::read_to_string(path).map_err(|err| format!("failed to read '{path}': {err}"))?
        }
    };
    let config = match options.config.as_deref() {
        Some(path) => load_config(path)?,
        None => MarkupConfig::default(),
    };
    config.validate().map_err(|err| err.to_string())?;

    let title = options
        .title
        .or_else(|| document_title(&html))
        .unwrap_or_default();
    let result = excerpt(&title, &html, &config);
    if options.json {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|err| format!("failed to serialize excerpt: {err}"))?;
        println!("{json}");
    } else {
        println!("{}", result.render());
    }
    Ok(())
}

/// Returns `None` when the invocation only asked for help or the version.
fn parse_options(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: markup_excerpt [OPTIONS] [HTML_FILE|-]\n\n{HELP}");
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("{}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--json" => options.json = true,
            "--title" => options.title = Some(value_for(&arg, args.next())?),
            "--config" => options.config = Some(value_for(&arg, args.next())?),
            flag if flag.starts_with("--") => return Err(format!("unknown option: {flag}")),
            _ if options.source.is_some() => return Err(format!("unexpected argument: {arg}")),
            _ => options.source = Some(arg),
        }
    }
    Ok(Some(options))
}

fn value_for(flag: &str, value: Option<String>) -> Result<String, String> {
    value.ok_or_else(|| format!("{flag} needs a value"))
}

fn load_config(path: &str) -> Result<MarkupConfig, String> {
    let raw =
        fs::read_to_string(path).map_err(|err| format!("failed to read config '{path}': {err}"))?;
    serde_json::from_str(&raw).map_err(|err| format!("invalid config '{path}': {err}"))
}
