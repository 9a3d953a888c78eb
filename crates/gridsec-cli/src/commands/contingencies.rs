use anyhow::Result;
use gridsec_cli::ContingenciesCommands;
use gridsec_contingency::{generate_n1, save_contingency_list, GenerationOptions};
use tracing::info;

use crate::commands::util::load_network;
use crate::commands::CommandOutcome;

pub fn handle(command: &ContingenciesCommands) -> Result<CommandOutcome> {
    match command {
        ContingenciesCommands::N1 {
            case_file,
            out,
            generators,
            three_windings_transformers,
            hvdc_lines,
            include_disconnected,
        } => {
            let network = load_network(case_file)?;
            let options = GenerationOptions {
                branches: true,
                generators: *generators,
                three_windings_transformers: *three_windings_transformers,
                hvdc_lines: *hvdc_lines,
                include_disconnected: *include_disconnected,
            };
            let list = generate_n1(&network, &options);
            save_contingency_list(out, &list)?;
            info!(path = %out.display(), "contingency list written");
            println!(
                "Wrote {} contingencies to {}",
                list.contingencies.len(),
                out.display()
            );
            Ok(CommandOutcome::Success)
        }
    }
}
