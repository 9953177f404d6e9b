use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    config::PipelineConfig,
    io_utils::{self, CsvReadOptions},
    render,
    table::Table,
};

pub fn execute(args: &PreviewArgs, config: &PipelineConfig) -> Result<()> {
    let table = load(args, config)?;
    let head = table.head(args.rows);
    print!("{}", render::render_data_table(&head));
    info!(
        "Displayed {} of {} row(s) from {:?}",
        head.row_count(),
        table.row_count(),
        args.input
    );
    Ok(())
}

fn load(args: &PreviewArgs, config: &PipelineConfig) -> Result<Table> {
    let tokens = config.null_token_refs();
    let is_binary = args
        .input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tbl"));
    if is_binary || (args.delimiter.is_none() && args.input_encoding.is_none()) {
        return io_utils::read_any_table(&args.input, &tokens)
            .with_context(|| format!("Loading {:?}", args.input));
    }
    let mut options = CsvReadOptions::new(&tokens);
    options.delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    options.encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    io_utils::read_csv_table(&args.input, &options)
}
