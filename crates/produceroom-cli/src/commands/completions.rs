use clap::Args;
use clap_complete::{generate, Shell};

#[derive(Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(shell: Shell, command: &mut clap::Command) -> Result<(), Box<dyn std::error::Error>> {
    generate(shell, command, "produceroom", &mut std::io::stdout());
    Ok(())
}
