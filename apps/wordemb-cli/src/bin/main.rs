use std::env;
use std::fs;

use anyhow::Context;
use candle_core::Device;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use wordemb_core::config::Config;
use wordemb_core::device::best_available;
use wordemb_core::{DeviceSpec, Embedder};
use wordemb_embed::{from_config, AnyEmbedder, Registry, WORD_EMB};

const USAGE: &str = "Usage: wordemb <tokenize|lookup|train|variants> [args...]
  tokenize <text>            print the tokens of <text>
  lookup <token>...          print the vector of each token, or <absent>
  train <corpus> [text]      fit on each non-empty line of <corpus>, then tokenize [text]
  variants                   list the registered word_emb variants";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn load_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let mut embedder = from_config(&config.embedder_config()?)?;
    let device = match config.get::<DeviceSpec>("device") {
        Ok(spec) => spec.to_device()?,
        Err(_) => best_available(),
    };
    embedder.to(&device)?;
    info!(variant = embedder.key(), dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}

fn print_tokens(embedder: &mut AnyEmbedder, text: &str) -> anyhow::Result<()> {
    let tokens = embedder.tokenize(text)?;
    println!("{}", tokens.join(" | "));
    println!("untokenized: {}", embedder.untokenize(&tokens)?);
    Ok(())
}

fn print_lookup(embedder: &AnyEmbedder, token: &str) -> anyhow::Result<()> {
    match embedder.lookup(token)? {
        Some(v) => {
            let values: Vec<f32> = v.to_device(&Device::Cpu)?.to_vec1()?;
            let head: Vec<String> = values.iter().take(5).map(|x| format!("{x:.4}")).collect();
            println!("{token}\t{}\t[{}{}]", values.len(), head.join(", "), if values.len() > 5 { ", ..." } else { "" });
        }
        None => println!("{token}\t<absent>"),
    }
    Ok(())
}

fn train(embedder: &mut AnyEmbedder, corpus: &str) -> anyhow::Result<()> {
    if !embedder.requires_training() {
        println!("{} is pretrained; nothing to fit", embedder.key());
        return Ok(());
    }
    let content = fs::read_to_string(corpus).with_context(|| format!("reading corpus {corpus}"))?;
    let lines: Vec<&str> = content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sentences")?
            .progress_chars("#>-"),
    );
    for line in &lines {
        embedder.add_sentence(line);
        pb.inc(1);
    }
    pb.finish_and_clear();
    embedder.finalize()?;
    println!("Fitted on {} sentences", lines.len());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let (cmd, args) = parse_args();
    if cmd == "variants" {
        for key in Registry::with_defaults().keys(WORD_EMB) { println!("{key}"); }
        return Ok(());
    }

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut embedder = load_embedder(&config)?;
    match cmd.as_str() {
        "tokenize" => {
            let text = args.join(" ");
            print_tokens(&mut embedder, &text)?;
        }
        "lookup" => {
            if args.is_empty() { eprintln!("Usage: wordemb lookup <token>..."); std::process::exit(1); }
            for token in &args { print_lookup(&embedder, token)?; }
        }
        "train" => {
            let Some(corpus) = args.first() else {
                eprintln!("Usage: wordemb train <corpus> [text]"); std::process::exit(1)
            };
            train(&mut embedder, corpus)?;
            if args.len() > 1 { print_tokens(&mut embedder, &args[1..].join(" "))?; }
        }
        _ => { eprintln!("{USAGE}"); std::process::exit(1); }
    }
    Ok(())
}
