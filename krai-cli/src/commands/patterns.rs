use crate::config::Engine;
use clap::Args;
use krai_core::pattern::{PatternFile, PatternFileEntry, RawPattern};
use std::io::Write as _;

#[derive(Args, Debug)]
pub struct CreatePatternsArgs {
    /// Manufacturer key to create, e.g. `konica_minolta`.
    #[arg(long)]
    pub name: String,

    /// Copy an existing manufacturer's pattern set as a starting point.
    #[arg(long, conflicts_with = "interactive")]
    pub based_on: Option<String>,

    /// Build the pattern set by answering prompts instead of copying one.
    #[arg(long)]
    pub interactive: bool,
}

/// Load, mutate, and atomically persist the pattern file (write-temp,
/// fsync, rename), then reload the in-process registry so the new
/// manufacturer is immediately usable without restarting the process.
pub async fn handle_create_patterns(args: CreatePatternsArgs, engine: &Engine) -> anyhow::Result<()> {
    if args.based_on.is_none() && !args.interactive {
        anyhow::bail!("pass either --based-on <existing manufacturer> or --interactive");
    }

    let mut file = read_pattern_file(&engine.patterns_path)?;

    if file.manufacturers.contains_key(&args.name) {
        anyhow::bail!("manufacturer {:?} already has a pattern set", args.name);
    }

    let entry = if let Some(based_on) = &args.based_on {
        file.manufacturers
            .get(based_on)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no existing manufacturer {based_on:?} to copy from"))?
    } else {
        build_entry_interactively()?
    };

    file.manufacturers.insert(args.name.clone(), entry);
    write_pattern_file_atomically(&engine.patterns_path, &file)?;
    engine.registry.reload(&toml::to_string_pretty(&file)?)?;

    println!("created pattern set for {:?}", args.name);
    Ok(())
}

pub async fn handle_list_patterns(engine: &Engine) -> anyhow::Result<()> {
    let mut keys: Vec<String> = engine.registry.list_manufacturers().into_iter().collect();
    keys.sort();
    if keys.is_empty() {
        println!("no manufacturers registered");
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

fn read_pattern_file(path: &std::path::Path) -> anyhow::Result<PatternFile> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        Ok(PatternFile::parse(&contents)?)
    } else {
        Ok(PatternFile {
            manufacturers: std::collections::BTreeMap::new(),
        })
    }
}

/// Write `file` to `path` via write-temp, fsync, rename: the file never
/// observes a half-written pattern file even if the process is killed
/// mid-write (spec §6).
fn write_pattern_file_atomically(path: &std::path::Path, file: &PatternFile) -> anyhow::Result<()> {
    let contents = toml::to_string_pretty(file)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("patterns.toml"),
        std::process::id()
    ));

    let mut tmp_file = std::fs::File::create(&tmp_path)?;
    tmp_file.write_all(contents.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn build_entry_interactively() -> anyhow::Result<PatternFileEntry> {
    use dialoguer::Input;

    let validation_regex: String = Input::new()
        .with_prompt("Validation regex (whole-code shape)")
        .interact_text()?;

    let mut patterns = Vec::new();
    loop {
        let regex: String = Input::new().with_prompt("Pattern regex").interact_text()?;
        let category: String = Input::new().with_prompt("Category").interact_text()?;
        let severity_hint: String = Input::new()
            .with_prompt("Severity hint (blank for none)")
            .allow_empty(true)
            .interact_text()?;
        patterns.push(RawPattern {
            regex,
            category,
            severity_hint: if severity_hint.is_empty() { None } else { Some(severity_hint) },
        });

        let another: String = Input::new()
            .with_prompt("Add another pattern? (y/N)")
            .allow_empty(true)
            .interact_text()?;
        if !another.eq_ignore_ascii_case("y") {
            break;
        }
    }

    if patterns.is_empty() {
        anyhow::bail!("a manufacturer's pattern set cannot be empty");
    }

    Ok(PatternFileEntry {
        patterns,
        validation_regex,
        extraction_rules: Default::default(),
    })
}
