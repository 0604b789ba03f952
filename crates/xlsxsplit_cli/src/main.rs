//! `xlsxsplit` command line front end.
//!
//! ```bash
//! xlsxsplit sheets sales.xlsx                      # List sheet names
//! xlsxsplit columns sales.xlsx --sheet Data        # List usable split columns
//! xlsxsplit preview sales.xlsx --rows 5            # Show the first rows
//! xlsxsplit split sales.xlsx --key Region          # One workbook per value
//! xlsxsplit split sales.xlsx -k Region -m multi-sheet -o out/
//! ```

mod output;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use xlsxsplit::conf::{
    N_PREVIEW_COLS_DEFAULT, N_PREVIEW_ROWS_DEFAULT, derive_default_split_options,
    derive_default_xlsx_write_options,
};
use xlsxsplit::{EnumSplitMode, Session, SpecPreviewOptions, SpecXlsxWriteOptions, XlsxCodec};

use crate::output::write_artifacts;

#[derive(Parser)]
#[command(name = "xlsxsplit")]
#[command(about = "Split a spreadsheet into workbooks or sheets by one column", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Input spreadsheet (xlsx, xls, xlsm, xlsb, ods)
        input: PathBuf,
    },

    /// List the header columns usable as split key
    Columns {
        /// Input spreadsheet
        input: PathBuf,

        /// Sheet to inspect (required when the workbook has several)
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Show the first rows of a sheet
    Preview {
        /// Input spreadsheet
        input: PathBuf,

        /// Sheet to inspect (required when the workbook has several)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Data rows to show
        #[arg(long, default_value_t = N_PREVIEW_ROWS_DEFAULT)]
        rows: usize,

        /// Columns to show
        #[arg(long, default_value_t = N_PREVIEW_COLS_DEFAULT)]
        cols: usize,
    },

    /// Split a sheet by the values of one column
    Split {
        /// Input spreadsheet
        input: PathBuf,

        /// Header name of the split column
        #[arg(short, long)]
        key: String,

        /// Sheet to split (required when the workbook has several)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Output layout
        #[arg(short, long, value_enum, default_value_t = ModeArg::PerFile)]
        mode: ModeArg,

        /// Output directory
        #[arg(short, long, env = "XLSXSPLIT_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,

        /// Replace existing files in the output directory
        #[arg(long)]
        overwrite: bool,

        /// Write header rows in bold
        #[arg(long)]
        bold_header: bool,

        /// List the artifacts without writing them
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// One workbook per value
    PerFile,
    /// One workbook, one sheet per value
    MultiSheet,
}

impl From<ModeArg> for EnumSplitMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::PerFile => EnumSplitMode::PerGroupFile,
            ModeArg::MultiSheet => EnumSplitMode::SingleFileMultiSheet,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let codec = XlsxCodec::default();

    match cli.command {
        Commands::Sheets { input } => {
            let session = load_session(&input, None, &codec)?;
            for c_sheet_name in session.sheet_names() {
                println!("{c_sheet_name}");
            }
        }

        Commands::Columns { input, sheet } => {
            let session = load_selected_session(&input, sheet.as_deref(), &codec)?;
            for c_column in session.available_columns()? {
                println!("{c_column}");
            }
        }

        Commands::Preview {
            input,
            sheet,
            rows,
            cols,
        } => {
            let session = load_selected_session(&input, sheet.as_deref(), &codec)?;
            let preview = session.preview(SpecPreviewOptions {
                rows_max: rows,
                cols_max: cols,
            })?;

            println!("{}", preview.header.join("\t"));
            for row in &preview.rows {
                println!("{}", row.join("\t"));
            }
            if preview.n_rows_hidden > 0 || preview.if_cols_truncated {
                println!(
                    "... {} rows x {} columns in total ({} more rows not shown)",
                    preview.n_rows_total, preview.n_cols_total, preview.n_rows_hidden
                );
            }
        }

        Commands::Split {
            input,
            key,
            sheet,
            mode,
            output,
            overwrite,
            bold_header,
            dry_run,
        } => {
            let codec = XlsxCodec::new(SpecXlsxWriteOptions {
                if_bold_header: bold_header,
                ..derive_default_xlsx_write_options()
            });
            let session = load_selected_session(&input, sheet.as_deref(), &codec)?;
            let split_output = session.process(
                &key,
                mode.into(),
                &codec,
                derive_default_split_options(),
            )?;

            for artifact in &split_output.artifacts {
                println!(
                    "{}\t{}\t{} rows",
                    artifact.name, artifact.size_text, artifact.row_count
                );
            }

            println!("{}", split_output.report);

            if dry_run {
                info!("dry run: nothing written");
            } else {
                let l_paths = write_artifacts(&split_output.artifacts, &output, overwrite)?;
                info!("wrote {} file(s) to {}", l_paths.len(), output.display());
            }
        }
    }

    Ok(())
}

fn load_session(path: &Path, sheet: Option<&str>, codec: &XlsxCodec) -> Result<Session> {
    let v_bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let c_file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid input file name: {}", path.display()))?;

    let mut session = Session::load(c_file_name, &v_bytes, codec)?;
    if let Some(c_sheet_name) = sheet {
        session.select_sheet(c_sheet_name)?;
    }
    Ok(session)
}

fn load_selected_session(path: &Path, sheet: Option<&str>, codec: &XlsxCodec) -> Result<Session> {
    let session = load_session(path, sheet, codec)?;
    if session.needs_sheet_selection() {
        bail!(
            "{} has several sheets ({}); choose one with --sheet",
            path.display(),
            session.sheet_names().join(", ")
        );
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlsxsplit::{EnumCellValue, SpecSheetDocument, SpecWorkbookDocument, TabularCodec};

    fn write_workbook(dir: &Path, file_name: &str, sheet_names: &[&str]) -> PathBuf {
        let document = SpecWorkbookDocument {
            sheets: sheet_names
                .iter()
                .map(|c_sheet_name| SpecSheetDocument {
                    sheet_name: c_sheet_name.to_string(),
                    rows: vec![
                        vec![EnumCellValue::from("Region"), EnumCellValue::from("Amount")],
                        vec![EnumCellValue::from("North"), EnumCellValue::Number(1.0)],
                    ],
                })
                .collect(),
        };
        let path = dir.join(file_name);
        fs::write(&path, XlsxCodec::default().encode(&document).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_cli_parses_split_arguments() {
        let cli = Cli::try_parse_from([
            "xlsxsplit", "split", "sales.xlsx", "-k", "Region", "-m", "multi-sheet", "-o", "out",
        ])
        .unwrap();

        let Commands::Split {
            key, mode, output, ..
        } = cli.command
        else {
            panic!("expected split command");
        };
        assert_eq!(key, "Region");
        assert_eq!(mode, ModeArg::MultiSheet);
        assert_eq!(output, PathBuf::from("out"));
        assert_eq!(EnumSplitMode::from(mode), EnumSplitMode::SingleFileMultiSheet);
    }

    #[test]
    fn test_load_selected_session_requires_sheet_for_multi_sheet_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workbook(dir.path(), "sales.xlsx", &["Q1", "Q2"]);
        let codec = XlsxCodec::default();

        let err = load_selected_session(&path, None, &codec).unwrap_err();
        assert!(err.to_string().contains("Q1, Q2"));

        let session = load_selected_session(&path, Some("Q2"), &codec).unwrap();
        assert_eq!(session.selected_sheet(), Some("Q2"));
    }

    #[test]
    fn test_load_session_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        fs::write(&path, "Region\nNorth\n").unwrap();

        let err = load_session(&path, None, &XlsxCodec::default()).unwrap_err();
        assert!(err.to_string().contains("sales.csv"));
    }
}
