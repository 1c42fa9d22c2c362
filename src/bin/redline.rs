use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use redline_core::{docx_to_html, html_to_docx, repair_html};

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert between .docx files and editor HTML")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a .docx file to repaired editor HTML.
    Import {
        /// Input .docx path.
        file: PathBuf,

        /// Output HTML path; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Convert an HTML file back to a .docx package.
    Export {
        /// Input HTML path.
        file: PathBuf,

        /// Output .docx path.
        #[arg(long)]
        out: PathBuf,

        /// Document title metadata.
        #[arg(long)]
        title: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Import { file, out } => {
            let file_data =
                fs::read(&file).with_context(|| format!("open {}", file.display()))?;
            let converted = docx_to_html(&file_data).context("convert document")?;
            for warning in &converted.warnings {
                eprintln!("warning: {}", warning);
            }
            let html = repair_html(&converted.html);
            match out {
                Some(path) => fs::write(&path, html)
                    .with_context(|| format!("write {}", path.display()))?,
                None => println!("{}", html),
            }
        }
        Command::Export { file, out, title } => {
            let html =
                fs::read_to_string(&file).with_context(|| format!("open {}", file.display()))?;
            let file_data = html_to_docx(&html, title.as_deref()).context("build document")?;
            fs::write(&out, file_data).with_context(|| format!("write {}", out.display()))?;
        }
    }
    Ok(())
}
