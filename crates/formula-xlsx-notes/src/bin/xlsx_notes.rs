use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use formula_xlsx_notes::{AuthorMode, CorruptPartPolicy, NoteOptions, XlsxPackage};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AuthorsArg {
    Distinct,
    LatestOnly,
}

#[derive(Parser)]
#[command(about = "Add and list legacy cell notes in XLSX workbooks.")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a note to a cell and write the result to a new workbook.
    Add {
        /// Workbook to read.
        input: PathBuf,

        /// Where to write the updated workbook.
        output: PathBuf,

        /// Sheet name.
        #[arg(long)]
        sheet: String,

        /// Annotated cell (A1 notation).
        #[arg(long)]
        cell: String,

        /// JSON payload, e.g. `{"author":"Excelize: ","text":"This is a comment."}`.
        #[arg(long, default_value = "{}")]
        payload: String,

        /// 0-indexed column of the note box's top-left corner (default: one right of the cell).
        #[arg(long, requires = "row")]
        col: Option<u32>,

        /// 0-indexed row of the note box's top-left corner (default: one below the cell).
        #[arg(long, requires = "col")]
        row: Option<u32>,

        /// How the comments part tracks authors.
        #[arg(long, value_enum, default_value_t = AuthorsArg::Distinct)]
        authors: AuthorsArg,

        /// Start over when an existing comments/drawing part is unreadable instead of failing.
        #[arg(long)]
        replace_corrupt: bool,
    },
    /// Print every note in a workbook.
    List {
        /// Workbook to read.
        input: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Serialize)]
struct JsonNote<'a> {
    sheet: &'a str,
    cell: &'a str,
    author: Option<&'a str>,
    text: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Add {
            input,
            output,
            sheet,
            cell,
            payload,
            col,
            row,
            authors,
            replace_corrupt,
        } => {
            let mut pkg = read_package(&input)?;
            let options = NoteOptions {
                authors: match authors {
                    AuthorsArg::Distinct => AuthorMode::Distinct,
                    AuthorsArg::LatestOnly => AuthorMode::LatestOnly,
                },
                on_corrupt_part: if replace_corrupt {
                    CorruptPartPolicy::Replace
                } else {
                    CorruptPartPolicy::Fail
                },
            };

            let (col, row) = match (col, row) {
                (Some(col), Some(row)) => (col, row),
                _ => {
                    let target = formula_xlsx_notes::CellRef::from_a1(&cell)
                        .with_context(|| format!("invalid cell reference {cell:?}"))?;
                    (target.col.saturating_add(1), target.row.saturating_add(1))
                }
            };
            pkg.add_comment_at_with_options(&sheet, &cell, &payload, col, row, options)
                .with_context(|| format!("add note to {sheet}!{cell}"))?;

            let bytes = pkg.write_to_bytes()?;
            std::fs::write(&output, bytes)
                .with_context(|| format!("write {}", output.display()))?;
            Ok(())
        }
        Command::List { input, format } => {
            let pkg = read_package(&input)?;
            let comments = pkg.comments()?;

            let mut notes = Vec::new();
            for (sheet, fragment) in &comments {
                for record in &fragment.comments {
                    notes.push(JsonNote {
                        sheet,
                        cell: &record.cell_ref,
                        author: fragment.author_of(record),
                        text: record.text(),
                    });
                }
            }

            match format {
                OutputFormat::Text => {
                    if notes.is_empty() {
                        println!("No notes.");
                    }
                    for note in &notes {
                        println!(
                            "{}!{}\t{}\t{}",
                            note.sheet,
                            note.cell,
                            note.author.unwrap_or("(unknown author)"),
                            note.text.replace('\n', "\\n")
                        );
                    }
                }
                OutputFormat::Json => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    serde_json::to_writer(&mut handle, &notes)?;
                    handle.write_all(b"\n")?;
                }
            }
            Ok(())
        }
    }
}

fn read_package(path: &Path) -> Result<XlsxPackage> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    XlsxPackage::from_bytes(&bytes).with_context(|| format!("parse {}", path.display()))
}
