//! Inspect a realm file from the command line.
//!
//! ```text
//! realm-tool <realm.json> [tree|validate|stats|normalize <out.json>]
//! ```
//!
//! `RUST_LOG` controls log output (default `warn`).

use anyhow::{bail, Context};
use thicket_editor::prelude::*;

fn usage() -> ! {
    eprintln!("usage: realm-tool <realm.json> [tree|validate|stats|normalize <out.json>]");
    std::process::exit(2);
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else { usage() };
    let command = args.next().unwrap_or_else(|| "tree".to_owned());

    let mut realm = EditorRealmManager::new(ByteMirror::global(), EditorConfig::default());
    let warnings = realm
        .load_realm_from_file(&path)
        .with_context(|| format!("loading {path}"))?;

    match command.as_str() {
        "tree" => {
            for root in realm.get_hierarchy() {
                print!("{root}");
            }
        }
        "validate" => {
            for warning in &warnings {
                println!("repaired: {warning}");
            }
            let issues = realm.validate();
            for issue in &issues {
                println!("issue: {issue}");
            }
            if warnings.is_empty() && issues.is_empty() {
                println!("ok");
            }
        }
        "stats" => {
            let entities = realm.get_realm();
            let roots = entities.iter().filter(|e| e.is_root()).count();
            let elements: usize = entities.iter().map(|e| e.elements.len()).sum();
            let settings = realm.settings();
            println!("entities: {}", entities.len());
            println!("roots:    {roots}");
            println!("elements: {elements}");
            println!("bounds:   {} ({})", settings.use_realm_bounds, settings.realm_size);
            println!("hash:     {}", realm.snapshot().hash);
        }
        "normalize" => {
            let Some(out) = args.next() else { usage() };
            realm
                .save_realm_to_file(&out)
                .with_context(|| format!("writing {out}"))?;
            println!("wrote {out}");
        }
        other => bail!("unknown command '{other}'"),
    }
    Ok(())
}
