//! Key generation command.

use rgap_core::Psk;

use crate::cli::GenpskArgs;
use crate::error::CliError;

/// Print a fresh random key in the base64 form config files expect
pub fn run_genpsk(args: GenpskArgs) -> Result<(), CliError> {
    if args.bytes == 0 {
        return Err(CliError::InvalidArgument(
            "key length must be at least one byte".to_string(),
        ));
    }
    println!("{}", Psk::generate(args.bytes).to_base64());
    Ok(())
}
