use anyhow::{bail, Context, Result};
use apk_rebrand::core::config::VERSION;
use apk_rebrand::core::logging;
use apk_rebrand::{Recipe, ShellCommandRunner};
use std::path::PathBuf;

const USAGE: &str = "Usage: rebrand_apk --recipe PATH [--verbose] [--log-tool-output]";

fn main() -> Result<()> {
    let mut recipe_path = None;
    let mut verbose = false;
    let mut log_output = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--recipe" => {
                recipe_path = Some(PathBuf::from(
                    args.next().context("`--recipe` requires a path argument")?,
                ));
            }
            "-v" | "--verbose" => verbose = true,
            "--log-tool-output" => log_output = true,
            "-V" | "--version" => {
                println!("rebrand_apk {}", VERSION);
                return Ok(());
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => bail!("unknown argument: {arg}\n{USAGE}"),
        }
    }
    let recipe_path = recipe_path.context(USAGE)?;

    logging::init(verbose);

    let recipe = Recipe::load(&recipe_path)
        .with_context(|| format!("Loading recipe `{}`", recipe_path.display()))?;
    let runner = ShellCommandRunner::new().with_log_output(log_output);
    let output = recipe
        .run(&runner)
        .with_context(|| format!("Re-branding `{}`", recipe.template.display()))?;
    log::info!("done: {}", output.display());
    println!("{}", output.display());
    Ok(())
}
