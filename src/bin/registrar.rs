#![forbid(unsafe_code)]

use anyhow::Result;

use viettype_config::{logging, platform::Overrides, registrar};

fn main() -> Result<()> {
    logging::init()?;

    let activation = Overrides::default().activation();
    let stdout = std::io::stdout();
    registrar::run(std::env::args_os(), &activation, &mut stdout.lock())?;
    Ok(())
}
