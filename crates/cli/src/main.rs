use std::io::Read;

use clap::{Parser, ValueEnum};

use sigil::NonceMode;

#[derive(Parser)]
#[command(name = "sicilian")]
#[command(about = "Structural signature digests for JavaScript scripts", long_about = None)]
struct Cli {
    /// Parameter-nonce policy. `random` mints fresh nonces per invocation;
    /// `derived` makes the digest reproducible across invocations.
    #[arg(long, value_enum, default_value_t = NonceArg::Random)]
    nonce_mode: NonceArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NonceArg {
    Random,
    Derived,
}

impl From<NonceArg> for NonceMode {
    fn from(arg: NonceArg) -> Self {
        match arg {
            NonceArg::Random => NonceMode::Random,
            NonceArg::Derived => NonceMode::DerivedFromPath,
        }
    }
}

/// Reads a UTF-8 JavaScript program from stdin and prints its digest.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut source = String::new();
    std::io::stdin().read_to_string(&mut source)?;

    let mut ast = arbor::parse_script(&source)?;
    let digest = sigil::sign(&mut ast, cli.nonce_mode.into())?;
    println!("{}", digest);
    Ok(())
}
